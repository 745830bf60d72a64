use crate::utils::ensure_dir;
use anyhow::{Context, Result};
use chrono::Local;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Markdown-file memory: a long-lived `MEMORY.md` of tagged facts plus
/// append-only daily logs under `daily/YYYY-MM-DD.md`.
pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        ensure_dir(dir.join("daily"))?;
        Ok(Self { dir })
    }

    fn memory_path(&self) -> PathBuf {
        self.dir.join("MEMORY.md")
    }

    fn daily_path(&self) -> PathBuf {
        let date = Local::now().format("%Y-%m-%d");
        self.dir.join("daily").join(format!("{}.md", date))
    }

    fn append_line(path: &Path, line: &str) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Append one fact to long-term memory, with optional `#tags`.
    pub fn append(&self, content: &str, tags: &[String]) -> Result<()> {
        let mut line = format!("- {}", content.trim());
        for tag in tags {
            let tag = tag.trim().trim_start_matches('#');
            if !tag.is_empty() {
                line.push_str(&format!(" #{}", tag));
            }
        }
        Self::append_line(&self.memory_path(), &line)
    }

    /// Distinct `#tags` appearing in long-term memory, sorted.
    pub fn tags(&self) -> Result<Vec<String>> {
        let path = self.memory_path();
        if !path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut tags = BTreeSet::new();
        for word in content.split_whitespace() {
            if let Some(tag) = word.strip_prefix('#')
                && !tag.is_empty()
                && tag.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
            {
                tags.insert(tag.to_string());
            }
        }
        Ok(tags.into_iter().collect())
    }

    /// Append a timestamped entry to today's log.
    pub fn daily_log_append(&self, content: &str) -> Result<()> {
        let time = Local::now().format("%H:%M");
        Self::append_line(&self.daily_path(), &format!("- {} {}", time, content.trim()))
    }

    /// Case-insensitive substring search across all daily logs. Results are
    /// `YYYY-MM-DD: <line>` entries in date order.
    pub fn search_logs(&self, query: &str) -> Result<Vec<String>> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        let mut entries: Vec<_> = walkdir::WalkDir::new(self.dir.join("daily"))
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
            .map(|e| e.path().to_path_buf())
            .collect();
        entries.sort();

        for path in entries {
            let date = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for line in content.lines() {
                if line.to_lowercase().contains(&needle) {
                    matches.push(format!("{}: {}", date, line));
                }
            }
        }
        Ok(matches)
    }
}
