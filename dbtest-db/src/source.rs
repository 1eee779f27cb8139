//! Migration file discovery.
//!
//! A migration directory holds files named `<version>_<description>.up.sql`
//! (or `<version>_<description>.sql`). Down migrations and non-SQL files are
//! ignored.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

/// A single migration script found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Version parsed from the file name prefix
    pub version: i64,
    /// Human readable description (underscores become spaces)
    pub description: String,
    /// Full path to the script
    pub path: PathBuf,
}

impl MigrationFile {
    /// Parse a migration file path.
    ///
    /// Returns `Ok(None)` for files that are not up migrations.
    pub fn parse(path: &Path) -> Result<Option<Self>> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };

        if file_name.ends_with(".down.sql") {
            return Ok(None);
        }

        let Some(stem) = file_name
            .strip_suffix(".up.sql")
            .or_else(|| file_name.strip_suffix(".sql"))
        else {
            return Ok(None);
        };

        let (version_str, description) = stem.split_once('_').unwrap_or((stem, ""));

        if version_str.is_empty() || !version_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(MigrateError::InvalidFileName(file_name.to_string()));
        }

        let version = version_str
            .parse::<i64>()
            .map_err(|_| MigrateError::InvalidFileName(file_name.to_string()))?;

        Ok(Some(Self {
            version,
            description: description.replace('_', " "),
            path: path.to_path_buf(),
        }))
    }

    /// Read the SQL body of this migration.
    pub fn read_sql(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|source| MigrateError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// List the up migrations in `dir`, sorted by ascending version.
///
/// # Errors
/// - `Io` if the directory cannot be read
/// - `InvalidFileName` for a `.sql` file without a numeric version
/// - `DuplicateVersion` if two files share a version
pub fn discover(dir: &Path) -> Result<Vec<MigrationFile>> {
    let io_err = |source| MigrateError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        if let Some(file) = MigrationFile::parse(&entry.path())? {
            files.push(file);
        }
    }

    files.sort_by_key(|f| f.version);

    for pair in files.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(MigrateError::DuplicateVersion {
                version: pair[0].version,
                first: pair[0].file_name(),
                second: pair[1].file_name(),
            });
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_parse_up_migration() {
        let file = MigrationFile::parse(Path::new("/m/0003_add_users_table.up.sql"))
            .unwrap()
            .unwrap();

        assert_eq!(file.version, 3);
        assert_eq!(file.description, "add users table");
    }

    #[test]
    fn test_parse_plain_sql_and_bare_version() {
        let plain = MigrationFile::parse(Path::new("20240101_init.sql")).unwrap().unwrap();
        assert_eq!(plain.version, 20240101);

        let bare = MigrationFile::parse(Path::new("7.up.sql")).unwrap().unwrap();
        assert_eq!(bare.version, 7);
        assert_eq!(bare.description, "");
    }

    #[test]
    fn test_parse_ignores_down_and_non_sql() {
        assert!(MigrationFile::parse(Path::new("1_init.down.sql")).unwrap().is_none());
        assert!(MigrationFile::parse(Path::new("README.md")).unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_non_numeric_version() {
        let err = MigrationFile::parse(Path::new("init_schema.sql")).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidFileName(name) if name == "init_schema.sql"));

        let err = MigrationFile::parse(Path::new("-1_negative.sql")).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidFileName(_)));
    }

    #[test]
    fn test_discover_orders_by_version() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "10_third.up.sql", "SELECT 3;");
        touch(tmp.path(), "2_second.up.sql", "SELECT 2;");
        touch(tmp.path(), "1_first.up.sql", "SELECT 1;");
        touch(tmp.path(), "1_first.down.sql", "SELECT 0;");
        touch(tmp.path(), "notes.txt", "ignored");
        fs::create_dir(tmp.path().join("99_not_a_file.sql")).unwrap();

        let files = discover(tmp.path()).unwrap();
        let versions: Vec<i64> = files.iter().map(|f| f.version).collect();

        assert_eq!(versions, vec![1, 2, 10]);
        assert_eq!(files[1].read_sql().unwrap(), "SELECT 2;");
    }

    #[test]
    fn test_discover_rejects_duplicate_versions() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "1_a.up.sql", "");
        touch(tmp.path(), "1_b.sql", "");

        let err = discover(tmp.path()).unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateVersion { version: 1, .. }));
    }

    #[test]
    fn test_discover_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let err = discover(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, MigrateError::Io { .. }));
    }

    #[test]
    fn test_discover_empty_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(discover(tmp.path()).unwrap().is_empty());
    }
}
