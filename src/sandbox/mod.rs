pub mod proxy;

use crate::config::SecurityMode;
use anyhow::Result;
use std::path::Path;

#[cfg(target_os = "macos")]
use anyhow::Context;

/// Environment sentinel set on the macOS re-exec so the sandboxed child does
/// not try to sandbox itself again.
pub const SANDBOX_SENTINEL: &str = "NEOCLAW_SANDBOXED";

/// Read-allow list for strict mode: enough of the system to run binaries and
/// resolve configuration, nothing else.
#[cfg(any(target_os = "linux", target_os = "macos"))]
const STRICT_READ_PATHS: &[&str] = &[
    "/usr", "/lib", "/lib64", "/bin", "/sbin", "/etc", "/proc", "/sys", "/run", "/tmp",
];

/// Apply process-level filesystem restriction before the agent loop starts.
///
/// - Linux: Landlock on the current process — write access narrowed to
///   `data_dir` and `/dev`; strict mode also narrows reads to system paths.
/// - macOS: re-exec the current executable under `sandbox-exec` with a
///   generated profile, guarded by [`SANDBOX_SENTINEL`].
/// - elsewhere: no-op.
///
/// Danger mode skips restriction entirely. In strict mode an unavailable
/// sandbox primitive is a hard error; in standard mode it degrades with a
/// warning.
pub fn restrict_process(mode: SecurityMode, data_dir: &Path) -> Result<()> {
    if mode.is_danger() {
        tracing::warn!("danger mode: process sandbox disabled");
        return Ok(());
    }
    restrict_process_impl(mode, data_dir)
}

#[cfg(target_os = "linux")]
fn restrict_process_impl(mode: SecurityMode, data_dir: &Path) -> Result<()> {
    use landlock::{
        ABI, Access, AccessFs, PathBeneath, PathFd, Ruleset, RulesetAttr, RulesetCreatedAttr,
        RulesetStatus,
    };

    let abi = ABI::V5;
    let read_access = AccessFs::from_read(abi);
    let full_access = AccessFs::from_all(abi);

    let mut created = Ruleset::default()
        .handle_access(full_access)
        .map_err(|e| anyhow::anyhow!("landlock ruleset: {}", e))?
        .create()
        .map_err(|e| anyhow::anyhow!("landlock create: {}", e))?;

    let read_paths: Vec<&str> = match mode {
        SecurityMode::Strict => STRICT_READ_PATHS.to_vec(),
        _ => vec!["/"],
    };
    for path_str in read_paths {
        let path = Path::new(path_str);
        if path.exists()
            && let Ok(fd) = PathFd::new(path)
        {
            created = created
                .add_rule(PathBeneath::new(fd, read_access))
                .map_err(|e| anyhow::anyhow!("landlock read rule for {}: {}", path_str, e))?;
        }
    }

    for path in [data_dir, Path::new("/dev")] {
        if path.exists()
            && let Ok(fd) = PathFd::new(path)
        {
            created = created
                .add_rule(PathBeneath::new(fd, full_access))
                .map_err(|e| anyhow::anyhow!("landlock write rule: {}", e))?;
        }
    }

    let status = created
        .restrict_self()
        .map_err(|e| anyhow::anyhow!("landlock restrict_self: {}", e))?;

    if matches!(status.ruleset, RulesetStatus::NotEnforced) {
        if mode == SecurityMode::Strict {
            anyhow::bail!("strict mode requires Landlock but this kernel does not enforce it");
        }
        tracing::warn!("landlock not enforced on this kernel, continuing unsandboxed");
    } else {
        tracing::info!(
            "landlock active (write access: {} and /dev)",
            data_dir.display()
        );
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn restrict_process_impl(mode: SecurityMode, data_dir: &Path) -> Result<()> {
    use std::os::unix::process::CommandExt;

    if std::env::var_os(SANDBOX_SENTINEL).is_some() {
        // Already running inside the sandbox-exec re-exec.
        return Ok(());
    }

    let sandbox_exec = Path::new("/usr/bin/sandbox-exec");
    if !sandbox_exec.exists() {
        if mode == SecurityMode::Strict {
            anyhow::bail!("strict mode requires sandbox-exec but it is not present");
        }
        tracing::warn!("sandbox-exec not present, continuing unsandboxed");
        return Ok(());
    }

    let profile = build_profile(mode, data_dir);
    let exe = std::env::current_exe().context("cannot resolve current executable")?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    tracing::info!("re-executing under sandbox-exec");
    let err = std::process::Command::new(sandbox_exec)
        .arg("-p")
        .arg(profile)
        .arg(exe)
        .args(args)
        .env(SANDBOX_SENTINEL, "1")
        .exec();
    // exec only returns on failure.
    Err(anyhow::anyhow!("failed to re-exec under sandbox-exec: {}", err))
}

#[cfg(target_os = "macos")]
fn build_profile(mode: SecurityMode, data_dir: &Path) -> String {
    use std::fmt::Write;

    let escape = |p: &str| p.replace('\\', "\\\\").replace('"', "\\\"");
    let data = escape(&data_dir.to_string_lossy());
    let mut p = String::with_capacity(1024);

    if mode == SecurityMode::Strict {
        // Deny-default: enumerate what a local agent process needs.
        p.push_str("(version 1)\n(deny default)\n");
        p.push_str("(allow process-exec)\n(allow process-fork)\n(allow signal)\n");
        p.push_str("(allow sysctl-read)\n(allow mach-lookup)\n");
        p.push_str("(allow process-info* (target self))\n");
        p.push_str("(allow file-read-metadata)\n");
        p.push_str("(allow network*)\n");
        for path in STRICT_READ_PATHS {
            let _ = writeln!(p, "(allow file-read* (subpath \"{}\"))", escape(path));
        }
        for path in ["/System", "/Library", "/private/etc", "/opt/homebrew", "/usr/local"] {
            let _ = writeln!(p, "(allow file-read* (subpath \"{}\"))", path);
        }
    } else {
        // Allow-default with writes denied outside the data directory.
        p.push_str("(version 1)\n(allow default)\n(deny file-write*)\n");
    }

    let _ = writeln!(p, "(allow file-read* file-write* (subpath \"{}\"))", data);
    for rw in ["/dev", "/private/tmp", "/private/var/tmp", "/private/var/folders"] {
        let _ = writeln!(p, "(allow file-read* file-write* (subpath \"{}\"))", rw);
    }
    p
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn restrict_process_impl(_mode: SecurityMode, _data_dir: &Path) -> Result<()> {
    tracing::warn!("no process sandbox available on this platform");
    Ok(())
}

#[cfg(test)]
mod tests;
