//! Server configuration, read from a single TOML file.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! cors_origins = ["http://localhost:5173"]
//!
//! [storage]
//! data_dir = "/var/lib/geobuild"
//!
//! [jwt]
//! secret = "..."
//!
//! [review]
//! overdue_after_hours = 48
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use auth::AuthConfig;
use checklist::ReviewConfig;
use geobuild_core::ServiceConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    pub storage: StorageSection,
    pub jwt: AuthConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen: String,
    /// Browser origins allowed to call the API with credentials.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:5000".to_string(),
                "https://localhost:5001".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    pub data_dir: String,
    #[serde(default)]
    pub sqlite_path: Option<String>,
    #[serde(default)]
    pub upload_dir: Option<String>,
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Storage paths in the form the store constructors expect.
    /// `listen` is the CLI override when one was given.
    pub fn service_config(&self, listen: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            data_dir: Some(PathBuf::from(&self.storage.data_dir)),
            sqlite_path: self.storage.sqlite_path.as_ref().map(PathBuf::from),
            upload_dir: self.storage.upload_dir.as_ref().map(PathBuf::from),
            listen: listen.unwrap_or(&self.server.listen).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = ServerConfig::parse(
            r#"
            [storage]
            data_dir = "/data"

            [jwt]
            secret = "0123456789abcdef0123456789abcdef"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.server.cors_origins.len(), 4);
        assert_eq!(config.jwt.issuer, "geoback");
        assert_eq!(config.jwt.audience, "GeoBuildClient");
        assert_eq!(config.jwt.access_token_ttl, 604_800);
        assert_eq!(config.review.overdue_after_hours, 48);

        let svc = config.service_config(None);
        assert_eq!(svc.resolve_sqlite_path(), PathBuf::from("/data/geobuild.sqlite"));
        assert_eq!(svc.resolve_upload_dir(), PathBuf::from("/data/uploads"));
        assert_eq!(svc.listen, "0.0.0.0:8080");
    }

    #[test]
    fn explicit_values_win() {
        let config = ServerConfig::parse(
            r#"
            [server]
            listen = "127.0.0.1:9000"
            cors_origins = ["https://geobuild.example"]

            [storage]
            data_dir = "/data"
            upload_dir = "/srv/photos"

            [jwt]
            secret = "s"
            issuer = "other"

            [review]
            max_lock_minutes = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.server.cors_origins, vec!["https://geobuild.example"]);
        assert_eq!(config.jwt.issuer, "other");
        assert_eq!(config.review.max_lock_minutes, 60);
        assert_eq!(config.review.default_lock_minutes, 30);

        let svc = config.service_config(Some("0.0.0.0:1234"));
        assert_eq!(svc.resolve_upload_dir(), PathBuf::from("/srv/photos"));
        assert_eq!(svc.listen, "0.0.0.0:1234");
    }

    #[test]
    fn missing_storage_is_rejected() {
        assert!(ServerConfig::parse("[jwt]\nsecret = \"x\"\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geobuild.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"d\"\n[jwt]\nsecret = \"x\"\n").unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap().storage.data_dir, "d");
        assert!(ServerConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
