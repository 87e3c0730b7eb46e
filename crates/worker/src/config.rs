use std::path::PathBuf;

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to a local
/// engine; in deployment, override via environment variables. The
/// engine's port is fixed by convention
/// ([`wanvid_comfyui::ENGINE_PORT`]); only its host is configurable.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Intake bind address (default: `0.0.0.0`).
    pub host: String,
    /// Intake bind port (default: `8000`).
    pub port: u16,
    /// Hostname of the ComfyUI engine (default: `127.0.0.1`).
    pub engine_host: String,
    /// Directory the engine reads input images from
    /// (default: `/ComfyUI/input`).
    pub input_dir: PathBuf,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default          |
    /// |---------------------|------------------|
    /// | `HOST`              | `0.0.0.0`        |
    /// | `PORT`              | `8000`           |
    /// | `SERVER_ADDRESS`    | `127.0.0.1`      |
    /// | `COMFYUI_INPUT_DIR` | `/ComfyUI/input` |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let engine_host =
            std::env::var("SERVER_ADDRESS").unwrap_or_else(|_| "127.0.0.1".into());

        let input_dir = std::env::var("COMFYUI_INPUT_DIR")
            .unwrap_or_else(|_| "/ComfyUI/input".into())
            .into();

        Self {
            host,
            port,
            engine_host,
            input_dir,
        }
    }
}
