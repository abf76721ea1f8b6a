//! Server configuration.

/// Default upload limit for audio files, in megabytes.
pub const DEFAULT_MAX_UPLOAD_SIZE_MB: usize = 50;

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Root directory of the filesystem blob store.
    pub audio_storage_dir: String,
    /// Upload limit in bytes.
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "postgres://localhost/conspectium".to_string(),
            audio_storage_dir: "var/audio".to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE_MB * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `DATABASE_URL` | `postgres://localhost/conspectium` |
    /// | `AUDIO_STORAGE_DIR` | `var/audio` |
    /// | `MAX_UPLOAD_SIZE_MB` | `50` |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_upload_mb = std::env::var("MAX_UPLOAD_SIZE_MB")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|mb| *mb > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE_MB);

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            audio_storage_dir: std::env::var("AUDIO_STORAGE_DIR")
                .unwrap_or(defaults.audio_storage_dir),
            max_upload_size: max_upload_mb * 1024 * 1024,
        }
    }

    pub fn with_max_upload_size(mut self, bytes: usize) -> Self {
        self.max_upload_size = bytes;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
