//! Utility functions for directory management and file output
//!
//! Directories follow the XDG Base Directory specification:
//!
//! - Config: `~/.config/melt/` - `config.json`
//! - Data: `~/.local/share/melt/` - stored profiles

use directories::ProjectDirs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "melt", "melt")
}

pub fn get_config_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| pd.config_dir().to_path_buf())
}

pub fn get_data_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| pd.data_dir().to_path_buf())
}

/// Writes `contents` to `path` atomically.
///
/// The data goes to a temporary file in the same directory, which is
/// restricted to the owner (0o600 on unix), synced, then renamed over
/// `path`. Readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.v4");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, "*filter\nCOMMIT\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "*filter\nCOMMIT\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.v4");
        write_atomic(&path, "COMMIT\n").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
