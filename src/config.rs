//! Configuration loading for the audit store and lineage tracker
//!
//! Values are layered: built-in defaults, then an optional config file
//! (format inferred from the extension), then `PROVENANCE__*` environment
//! variables such as `PROVENANCE__AUDIT__LOG_PATH`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ProvenanceError, Result};

pub const ENV_PREFIX: &str = "PROVENANCE";
pub const DEFAULT_USER_ID: &str = "system";
/// Tracing filter used by the binaries when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "pipeline_provenance=info";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    pub audit: AuditConfig,
    pub lineage: LineageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub log_path: PathBuf,
    /// Empty means a short id is generated when the logger opens
    pub pipeline_id: String,
    pub pipeline_name: String,
    pub user_id: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("audit/audit.jsonl"),
            pipeline_id: String::new(),
            pipeline_name: String::new(),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub snapshot_path: PathBuf,
    pub pipeline_id: String,
    pub run_id: String,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("lineage/lineage.json"),
            pipeline_id: String::new(),
            run_id: String::new(),
        }
    }
}

impl ProvenanceConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ProvenanceError::Config(format!(
                    "Configuration file not found: {:?}",
                    path
                )));
            }
            info!("Loading provenance configuration from: {:?}", path);
            builder = builder.add_source(::config::File::from(path));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(false),
        );

        let loaded: ProvenanceConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.audit.log_path.as_os_str().is_empty() {
            return Err(ProvenanceError::Config(
                "audit.log_path must not be empty".to_string(),
            ));
        }
        if self.lineage.snapshot_path.as_os_str().is_empty() {
            return Err(ProvenanceError::Config(
                "lineage.snapshot_path must not be empty".to_string(),
            ));
        }
        if self.audit.user_id.trim().is_empty() {
            return Err(ProvenanceError::Config(
                "audit.user_id must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Short random identifier used for pipeline and run ids
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProvenanceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audit.user_id, "system");
        assert_eq!(config.audit.log_path, PathBuf::from("audit/audit.jsonl"));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provenance.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "audit:\n  log_path: /var/log/claims/audit.jsonl\n  pipeline_id: claims-etl\nlineage:\n  run_id: nightly"
        )
        .unwrap();

        let config = ProvenanceConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(
            config.audit.log_path,
            PathBuf::from("/var/log/claims/audit.jsonl")
        );
        assert_eq!(config.audit.pipeline_id, "claims-etl");
        assert_eq!(config.audit.user_id, "system");
        assert_eq!(config.lineage.run_id, "nightly");
        assert_eq!(
            config.lineage.snapshot_path,
            PathBuf::from("lineage/lineage.json")
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let result = ProvenanceConfig::load(Some(dir.path().join("absent.toml").as_path()));
        assert!(matches!(result, Err(ProvenanceError::Config(_))));
    }

    #[test]
    fn test_blank_user_rejected() {
        let mut config = ProvenanceConfig::default();
        config.audit.user_id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_log_filter_parses_at_info() {
        assert_eq!(DEFAULT_LOG_FILTER, "pipeline_provenance=info");
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_short_id_length() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
