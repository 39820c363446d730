use std::path::PathBuf;

use photogate_core::AnalyzerConfig;
use photogate_storage::StorageConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Public base URL used to mint local blob URLs.
    pub app_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight pipeline runs to drain.
    pub shutdown_timeout_secs: u64,
    /// Pipeline worker pool size (default: host parallelism).
    pub worker_count: usize,
    /// Signed URL lifetime for remote storage (default: one hour).
    pub signed_url_ttl_secs: u64,
    /// Development mode: include stack/error detail in responses and records.
    pub development: bool,
    /// Record store connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    /// Blob storage backend selection.
    pub storage: StorageConfig,
    /// Analyzer tunables, optionally overridden from a JSON file.
    pub analyzers: AnalyzerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `APP_URL`               | `http://localhost:3000` |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `WORKER_COUNT`          | host parallelism        |
    /// | `SIGNED_URL_TTL_SECS`   | `3600`                  |
    /// | `DEVELOPMENT`           | `false`                 |
    /// | `DATABASE_URL`          | unset (in-memory store) |
    /// | `STORAGE_TYPE`          | `local`                 |
    /// | `UPLOAD_DIR`            | `uploads`               |
    /// | `S3_BUCKET`             | required for `s3`       |
    /// | `S3_REGION`             | `us-east-1`             |
    /// | `S3_ENDPOINT_URL`       | unset                   |
    /// | `S3_FORCE_PATH_STYLE`   | `false`                 |
    /// | `ANALYZER_CONFIG`       | unset (shipped values)  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let worker_count: usize = match std::env::var("WORKER_COUNT") {
            Ok(raw) => raw.parse().expect("WORKER_COUNT must be a valid usize"),
            Err(_) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        };

        let signed_url_ttl_secs: u64 = std::env::var("SIGNED_URL_TTL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("SIGNED_URL_TTL_SECS must be a valid u64");

        let development = matches!(
            std::env::var("DEVELOPMENT").as_deref(),
            Ok("1") | Ok("true") | Ok("TRUE")
        );

        let database_url = std::env::var("DATABASE_URL").ok();

        let storage = storage_from_env(&app_url);
        let analyzers = analyzers_from_env();

        Self {
            host,
            port,
            app_url,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            worker_count,
            signed_url_ttl_secs,
            development,
            database_url,
            storage,
            analyzers,
        }
    }
}

/// Build the blob-storage selection from `STORAGE_TYPE` and friends.
///
/// Panics on an unknown storage type or a missing S3 bucket, which is the
/// desired behaviour -- misconfiguration should fail fast at startup.
fn storage_from_env(app_url: &str) -> StorageConfig {
    let storage_type = std::env::var("STORAGE_TYPE").unwrap_or_else(|_| "local".into());
    match storage_type.as_str() {
        "local" => StorageConfig::Local {
            root: PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into())),
            public_base_url: app_url.to_string(),
        },
        "s3" => StorageConfig::S3 {
            bucket: std::env::var("S3_BUCKET").expect("S3_BUCKET must be set for s3 storage"),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            force_path_style: matches!(
                std::env::var("S3_FORCE_PATH_STYLE").as_deref(),
                Ok("1") | Ok("true") | Ok("TRUE")
            ),
        },
        other => panic!("Unknown STORAGE_TYPE '{other}'. Must be one of: local, s3"),
    }
}

/// Load analyzer tunables, optionally overridden from the JSON file named
/// by `ANALYZER_CONFIG`. Partial files override only the keys they name.
fn analyzers_from_env() -> AnalyzerConfig {
    match std::env::var("ANALYZER_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Cannot read ANALYZER_CONFIG '{path}': {e}"));
            serde_json::from_str(&raw)
                .unwrap_or_else(|e| panic!("Invalid ANALYZER_CONFIG '{path}': {e}"))
        }
        Err(_) => AnalyzerConfig::default(),
    }
}
