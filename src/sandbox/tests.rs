use super::*;

#[test]
fn test_danger_mode_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    restrict_process(SecurityMode::Danger, dir.path()).unwrap();
}

#[cfg(target_os = "macos")]
#[test]
fn test_strict_profile_is_deny_default() {
    let profile = build_profile(SecurityMode::Strict, Path::new("/tmp/nc-data"));
    assert!(profile.starts_with("(version 1)\n(deny default)\n"));
    assert!(profile.contains("(allow file-read* file-write* (subpath \"/tmp/nc-data\"))"));
    assert!(profile.contains("(allow file-read* (subpath \"/usr\"))"));
}

#[cfg(target_os = "macos")]
#[test]
fn test_standard_profile_denies_writes_outside_data_dir() {
    let profile = build_profile(SecurityMode::Standard, Path::new("/tmp/nc-data"));
    assert!(profile.contains("(allow default)"));
    assert!(profile.contains("(deny file-write*)"));
    assert!(profile.contains("(subpath \"/tmp/nc-data\")"));
}

#[cfg(target_os = "macos")]
#[test]
fn test_profile_escapes_quotes() {
    let profile = build_profile(SecurityMode::Standard, Path::new("/tmp/we\"ird"));
    assert!(profile.contains("/tmp/we\\\"ird"));
}
