//! Append-only audit log of relational statements.
//!
//! Every execution attempt appends one entry before the credential is
//! requested or the client spawned, whatever the outcome. Only a missing
//! client skips the log, because nothing is attempted:
//!
//! ```text
//! -- 2026-10-19T14:03:11.482+00:00
//! INSERT INTO usuarios (...) VALUES (:'nome_usuario', ...);
//!
//! ```
//!
//! Entries hold the statement template; bound values are not written.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

/// Handle to the audit log file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

/// Size and content counts for the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSummary {
    /// File size in bytes.
    pub bytes: u64,
    /// Total number of lines.
    pub lines: usize,
    /// Lines holding statement text (not blank, not a `--` comment).
    pub statements: usize,
    /// Last modification time, when the platform reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl AuditLog {
    /// Create a handle for the log at `path`. The file is created lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry for `statement_text` stamped with `at`.
    pub fn append(&self, statement_text: &str, at: DateTime<Utc>) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let entry = format!(
            "-- {}\n{statement_text};\n\n",
            at.to_rfc3339_opts(SecondsFormat::Millis, false)
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())
    }

    /// Full log contents, or an empty string when nothing was logged yet.
    pub fn read(&self) -> io::Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Statement lines in log order, comments and blanks removed.
    pub fn statement_lines(&self) -> io::Result<Vec<String>> {
        Ok(self
            .read()?
            .lines()
            .filter(|line| is_statement_line(line))
            .map(str::to_owned)
            .collect())
    }

    /// Counts for the log, or `None` when it does not exist yet.
    pub fn summary(&self) -> io::Result<Option<AuditSummary>> {
        let meta = match std::fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let contents = self.read()?;
        Ok(Some(AuditSummary {
            bytes: meta.len(),
            lines: contents.lines().count(),
            statements: contents.lines().filter(|l| is_statement_line(l)).count(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    /// The last `max_chars` characters of the log.
    pub fn tail(&self, max_chars: usize) -> io::Result<String> {
        let contents = self.read()?;
        let total = contents.chars().count();
        Ok(contents
            .chars()
            .skip(total.saturating_sub(max_chars))
            .collect())
    }
}

fn is_statement_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with("--")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn append_writes_timestamped_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("nested").join("sql_commands.sql"));
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 14, 3, 11).unwrap();

        log.append("SELECT 1", at).unwrap();
        log.append("SELECT 2", at).unwrap();

        let contents = log.read().unwrap();
        assert_eq!(
            contents,
            "-- 2026-10-19T14:03:11.000+00:00\nSELECT 1;\n\n\
             -- 2026-10-19T14:03:11.000+00:00\nSELECT 2;\n\n"
        );
        assert_eq!(log.statement_lines().unwrap(), vec!["SELECT 1;", "SELECT 2;"]);
    }

    #[test]
    fn summary_counts_statements() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("log.sql"));
        assert!(log.summary().unwrap().is_none());
        assert_eq!(log.read().unwrap(), "");

        log.append("CREATE TABLE t (id INT)", Utc::now()).unwrap();
        let summary = log.summary().unwrap().unwrap();
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.statements, 1);
        assert!(summary.bytes > 0);
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("log.sql"));
        log.append("SELECT 'João'", Utc::now()).unwrap();

        let tail = log.tail(8).unwrap();
        assert_eq!(tail, "'João';\n\n".chars().skip(1).collect::<String>());
        assert_eq!(log.tail(0).unwrap(), "");
    }
}
