// src/config/loader.rs

use std::path::Path;

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SchedulerError};

/// Read and parse a workload file without semantic validation.
pub fn load_from_path(path: &Path) -> Result<RawConfigFile> {
    debug!(path = %path.display(), "loading workload file");
    let contents = std::fs::read_to_string(path).map_err(|err| {
        SchedulerError::Config(format!("cannot read {}: {err}", path.display()))
    })?;
    let raw: RawConfigFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Read, parse, and validate a workload file.
pub fn load_and_validate(path: &Path) -> Result<ConfigFile> {
    let raw = load_from_path(path)?;
    ConfigFile::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_validates_a_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [scheduler]
            max_workers = 2

            [resources]
            cpu = 8

            [task.one]
            kind = "data_processing"
            cost = 3
            requires = {{ cpu = 2 }}
            "#
        )
        .unwrap();

        let cfg = load_and_validate(file.path()).unwrap();
        assert_eq!(cfg.scheduler().max_workers, 2);
        assert_eq!(cfg.tasks().len(), 1);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = load_from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/definitely/not/here.toml"), "got: {msg}");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[scheduler\nmax_workers = 2").unwrap();
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SchedulerError::TomlParse(_)));
    }
}
