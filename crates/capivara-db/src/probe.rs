//! Locating the relational client executable.
//!
//! The client is looked up at a fixed, ordered list of install locations.
//! The first path that exists wins; no `PATH` search is performed so the
//! outcome is the same regardless of the caller's shell.

use std::path::{Path, PathBuf};

/// Client versions probed, newest first.
const VERSIONS: [u8; 4] = [17, 16, 15, 14];

/// The well-known client locations, in probe order.
///
/// Windows installer locations come first, then versioned Debian-style
/// directories, then generic Unix prefixes.
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(VERSIONS.len().saturating_mul(2).saturating_add(3));
    for version in VERSIONS {
        candidates.push(PathBuf::from(format!(
            r"C:\Program Files\PostgreSQL\{version}\bin\psql.exe"
        )));
    }
    for version in VERSIONS {
        candidates.push(PathBuf::from(format!(
            "/usr/lib/postgresql/{version}/bin/psql"
        )));
    }
    candidates.extend(
        ["/usr/local/bin/psql", "/opt/homebrew/bin/psql", "/usr/bin/psql"]
            .into_iter()
            .map(PathBuf::from),
    );
    candidates
}

/// Return the first candidate that exists as a file.
pub fn probe(candidates: &[PathBuf]) -> Option<PathBuf> {
    let found = candidates.iter().find(|path| is_file(path)).cloned();
    match &found {
        Some(path) => tracing::info!(path = %path.display(), "Relational client found"),
        None => tracing::info!(
            candidates = candidates.len(),
            "Relational client not found, running document store only"
        ),
    }
    found
}

fn is_file(path: &Path) -> bool {
    path.metadata().is_ok_and(|meta| meta.is_file())
}
