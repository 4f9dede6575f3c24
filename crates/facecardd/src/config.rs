use facecard_core::{MatchPolicy, DEFAULT_TOLERANCE};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory registration images are written to.
    pub image_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Optional reward catalog overriding the embedded one.
    pub catalog_path: Option<PathBuf>,
    /// Maximum descriptor distance for a positive match.
    pub tolerance: f64,
    pub match_policy: MatchPolicy,
    pub host: String,
    pub port: u16,
    /// Request body limit in bytes. Base64 images are large.
    pub body_limit: usize,
}

impl Config {
    /// Load configuration from `FACECARD_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = facecard_core::default_data_dir();

        let db_path = std::env::var("FACECARD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("facecard.db"));
        let image_dir = std::env::var("FACECARD_IMAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("images"));
        let model_dir = std::env::var("FACECARD_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facecard_core::default_model_dir());

        let match_policy = match std::env::var("FACECARD_MATCH_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|err: String| {
                tracing::warn!(error = %err, "ignoring FACECARD_MATCH_POLICY");
                MatchPolicy::default()
            }),
            Err(_) => MatchPolicy::default(),
        };

        Self {
            db_path,
            image_dir,
            model_dir,
            catalog_path: std::env::var("FACECARD_CATALOG").ok().map(PathBuf::from),
            tolerance: env_f64("FACECARD_TOLERANCE", DEFAULT_TOLERANCE),
            match_policy,
            host: std::env::var("FACECARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_u16("FACECARD_PORT", 5000),
            body_limit: body_limit_bytes(env_usize("FACECARD_BODY_LIMIT_MB", 20)),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Megabytes to bytes, clamped at `usize::MAX`.
fn body_limit_bytes(megabytes: usize) -> usize {
    megabytes.saturating_mul(1024 * 1024)
}
