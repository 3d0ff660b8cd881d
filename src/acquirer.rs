use std::path::Path;

use serde::Deserialize;

use crate::errors::{ConfigError, Error};
use crate::models::ReleaseInfo;

/// The boundary this crate consumes from the out-of-scope Acquirer collaborator (§6): release
/// metadata, and the expectation that the dataset XML files are already present locally.
pub trait Acquirer {
    fn get_release_info(&self) -> Result<ReleaseInfo, Error>;
}

#[derive(Debug, Deserialize)]
struct ReleaseSidecar {
    version: String,
    release_date: Option<String>,
    #[serde(default)]
    swissprot_entry_count: i32,
    #[serde(default)]
    trembl_entry_count: i32,
}

/// Reads a `release.toml` sidecar next to the source XML files instead of hitting the network,
/// so the pipeline driver and its tests can run without the real Acquirer's HTTPS download,
/// resume, and MD5-verification machinery.
pub struct FilesystemAcquirer {
    data_dir: std::path::PathBuf,
}

impl FilesystemAcquirer {
    pub fn new(data_dir: &Path) -> FilesystemAcquirer {
        FilesystemAcquirer { data_dir: data_dir.to_path_buf() }
    }
}

impl Acquirer for FilesystemAcquirer {
    fn get_release_info(&self) -> Result<ReleaseInfo, Error> {
        let path = self.data_dir.join("release.toml");
        let text = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
        let sidecar: ReleaseSidecar = toml::from_str(&text).map_err(ConfigError::Toml)?;

        Ok(ReleaseInfo {
            version: sidecar.version,
            release_date: sidecar.release_date,
            swissprot_entry_count: sidecar.swissprot_entry_count,
            trembl_entry_count: sidecar.trembl_entry_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_release_info_from_sidecar_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("release.toml"),
            r#"version = "2024_03"
release_date = "2024-03-27"
swissprot_entry_count = 570000
trembl_entry_count = 250000000"#,
        )
        .unwrap();

        let acquirer = FilesystemAcquirer::new(dir.path());
        let info = acquirer.get_release_info().unwrap();
        assert_eq!(info.version, "2024_03");
        assert_eq!(info.release_date.as_deref(), Some("2024-03-27"));
        assert_eq!(info.swissprot_entry_count, 570000);
    }

    #[test]
    fn missing_sidecar_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = FilesystemAcquirer::new(dir.path());
        assert!(acquirer.get_release_info().is_err());
    }

    #[test]
    fn entry_counts_default_to_zero_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("release.toml"), r#"version = "2024_03""#).unwrap();

        let acquirer = FilesystemAcquirer::new(dir.path());
        let info = acquirer.get_release_info().unwrap();
        assert_eq!(info.swissprot_entry_count, 0);
        assert_eq!(info.trembl_entry_count, 0);
    }
}
