//! Bootstrap: startup checks and storage directories.
//!
//! When geobuildd starts:
//! 1. Verify the config is usable. A weak or missing JWT secret refuses to start.
//! 2. Create the data and upload directories if they are missing.

use axum::http::HeaderValue;
use geobuild_core::ServiceConfig;
use tracing::info;

use crate::config::ServerConfig;

/// HS256 keys shorter than this are refused.
pub const MIN_SECRET_BYTES: usize = 32;

/// Verify server configuration is ready for production use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration.");
    }
    if config.jwt.secret.len() < MIN_SECRET_BYTES {
        anyhow::bail!(
            "JWT secret must be at least {} bytes (got {}).",
            MIN_SECRET_BYTES,
            config.jwt.secret.len()
        );
    }
    if config.storage.data_dir.trim().is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    for origin in &config.server.cors_origins {
        if HeaderValue::from_str(origin).is_err() {
            anyhow::bail!("Invalid CORS origin {:?}.", origin);
        }
    }
    Ok(())
}

/// Create the directories the stores write into.
pub fn prepare_storage(service: &ServiceConfig) -> anyhow::Result<()> {
    if let Some(dir) = &service.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    if let Some(parent) = service.resolve_sqlite_path().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let uploads = service.resolve_upload_dir();
    std::fs::create_dir_all(&uploads)?;
    info!("Storage ready: sqlite={} uploads={}", service.resolve_sqlite_path().display(), uploads.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageSection;

    fn config(secret: &str, data_dir: &str) -> ServerConfig {
        let mut config = ServerConfig {
            storage: StorageSection {
                data_dir: data_dir.to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        config.jwt.secret = secret.to_string();
        config
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_verify_config_ok() {
        assert!(verify_config(&config(SECRET, "/data")).is_ok());
    }

    #[test]
    fn test_verify_config_empty_secret() {
        let err = verify_config(&config("", "/data")).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_verify_config_short_secret() {
        let err = verify_config(&config("too-short", "/data")).unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn test_verify_config_empty_data_dir() {
        assert!(verify_config(&config(SECRET, "  ")).is_err());
    }

    #[test]
    fn test_verify_config_bad_origin() {
        let mut cfg = config(SECRET, "/data");
        cfg.server.cors_origins = vec!["http://ok\nbad".to_string()];
        assert!(verify_config(&cfg).is_err());
    }

    #[test]
    fn test_prepare_storage_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(SECRET, &dir.path().join("data").to_string_lossy());
        let service = cfg.service_config(None);
        prepare_storage(&service).unwrap();
        assert!(dir.path().join("data").is_dir());
        assert!(dir.path().join("data/uploads").is_dir());
    }
}
