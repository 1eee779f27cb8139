//! Migrations directory lookup.
//!
//! A test binary may run from any subdirectory of a project, so a single
//! fragment such as `./migrations` is searched for under each ancestor of the
//! starting directory until one contains it.
//!
//! Known limitation: the first ancestor with a directory of that name wins,
//! even if it is an unrelated folder.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Migrations path resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No ancestor of `start` contains `fragment`
    #[error(
        "migrations path not found: {} (searched upward from {})",
        .fragment.display(),
        .start.display()
    )]
    NotFound { fragment: PathBuf, start: PathBuf },

    /// The search must begin at an absolute path
    #[error("migrations search must start from an absolute path, got {}", .0.display())]
    RelativeStart(PathBuf),

    /// The fragment has no path components
    #[error("migrations path fragment is empty")]
    EmptyFragment,
}

/// Find the directory `fragment` under `start` or one of its ancestors.
///
/// Leading `/` and `.` components are ignored, so `/migrations`,
/// `./migrations` and `migrations` all search for a `migrations` directory.
/// The filesystem root itself is not searched. The process working
/// directory is never changed.
pub fn resolve_migrations_dir(start: &Path, fragment: &Path) -> Result<PathBuf, ResolveError> {
    if !start.is_absolute() {
        return Err(ResolveError::RelativeStart(start.to_path_buf()));
    }

    let relative = normalize_fragment(fragment);
    if relative.as_os_str().is_empty() {
        return Err(ResolveError::EmptyFragment);
    }

    let mut base = start;
    loop {
        let candidate = base.join(&relative);
        if candidate.is_dir() {
            debug!(path = %candidate.display(), "Resolved migrations directory");
            return Ok(candidate);
        }

        match base.parent() {
            Some(parent) if parent.parent().is_some() => base = parent,
            _ => {
                return Err(ResolveError::NotFound {
                    fragment: fragment.to_path_buf(),
                    start: start.to_path_buf(),
                })
            },
        }
    }
}

fn normalize_fragment(fragment: &Path) -> PathBuf {
    fragment
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}
