use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the secrets have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Dashboard origins allowed with credentials, from comma-separated
    /// `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Shared secret for editor link signatures.
    pub editor_signing_secret: String,
    /// Dashboard session token configuration.
    pub jwt: JwtConfig,
    /// Directory uploaded images are written to (default: `storage/uploads`).
    pub upload_dir: String,
    /// Public base URL used to build upload URLs (default: `http://localhost:3000`).
    pub public_base_url: String,
    /// Maximum accepted upload size in bytes (default: 5 MiB).
    pub max_upload_bytes: usize,
    /// Endpoint notified after a running experiment's variant is saved.
    /// When unset, publishes are only logged.
    pub config_publish_url: Option<String>,
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `3000`                   |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                     |
    /// | `EDITOR_SIGNING_SECRET` | **required**             |
    /// | `UPLOAD_DIR`            | `storage/uploads`        |
    /// | `PUBLIC_BASE_URL`       | `http://localhost:3000`  |
    /// | `MAX_UPLOAD_BYTES`      | `5242880`                |
    /// | `CONFIG_PUBLISH_URL`    | unset (log only)         |
    ///
    /// # Panics
    ///
    /// Panics on a missing secret or an unparseable number.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

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

        let editor_signing_secret = std::env::var("EDITOR_SIGNING_SECRET")
            .expect("EDITOR_SIGNING_SECRET must be set in the environment");
        assert!(
            !editor_signing_secret.is_empty(),
            "EDITOR_SIGNING_SECRET must not be empty"
        );

        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "storage/uploads".into());

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_BYTES.to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let config_publish_url = std::env::var("CONFIG_PUBLISH_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            editor_signing_secret,
            jwt,
            upload_dir,
            public_base_url,
            max_upload_bytes,
            config_publish_url,
        }
    }
}
