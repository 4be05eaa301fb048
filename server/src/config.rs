//! Server configuration
//!
//! Configuration is loaded from environment variables, falling back to
//! defaults for anything unset or unparsable.

use crate::session::SessionConfig;
use crate::solver::GrabCutSettings;
use std::env;
use std::path::PathBuf;
use std::thread;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Solver configuration
    pub solver: SolverConfig,

    /// Per-session limits
    pub session: SessionConfig,

    /// WebSocket configuration
    pub ws: WsConfig,

    /// Directory holding the browser client, served as a fallback route
    pub static_files_dir: Option<PathBuf>,
}

/// Solver-related configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum concurrent solver calls
    pub workers: usize,
    /// GrabCut iterations per call
    pub iterations: usize,
    /// Gaussian components per colour model
    pub components: usize,
    /// Smoothness weight
    pub gamma: f64,
}

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Maximum inbound message size in bytes
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            solver: SolverConfig::default(),
            session: SessionConfig::default(),
            ws: WsConfig::default(),
            static_files_dir: None,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        let settings = GrabCutSettings::default();
        Self {
            workers: default_workers(),
            iterations: settings.iterations,
            components: settings.components,
            gamma: settings.gamma,
        }
    }
}

impl SolverConfig {
    /// GrabCut settings derived from this configuration
    pub fn grabcut_settings(&self) -> GrabCutSettings {
        GrabCutSettings {
            iterations: self.iterations,
            components: self.components,
            gamma: self.gamma,
            ..GrabCutSettings::default()
        }
    }
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_message_size: 32 * 1024 * 1024, // 32 MB
        }
    }
}

/// Number of solver workers when none is configured
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST")
            && !host.is_empty()
        {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Solver config
        if let Ok(val) = env::var("SOLVER_WORKERS")
            && let Ok(v) = val.parse::<usize>()
            && v > 0
        {
            config.solver.workers = v;
        }
        if let Ok(val) = env::var("SOLVER_ITERATIONS")
            && let Ok(v) = val.parse::<usize>()
            && v > 0
        {
            config.solver.iterations = v;
        }
        if let Ok(val) = env::var("SOLVER_COMPONENTS")
            && let Ok(v) = val.parse::<usize>()
            && v > 0
        {
            config.solver.components = v;
        }
        if let Ok(val) = env::var("SOLVER_GAMMA")
            && let Ok(v) = val.parse::<f64>()
            && v.is_finite()
            && v >= 0.0
        {
            config.solver.gamma = v;
        }

        // Session config
        if let Ok(val) = env::var("MAX_IMAGE_DIMENSION")
            && let Ok(v) = val.parse::<u32>()
            && v > 0
        {
            config.session.max_image_dimension = v;
        }
        if let Ok(val) = env::var("MAX_IMAGE_PIXELS")
            && let Ok(v) = val.parse::<u64>()
            && v > 0
        {
            config.session.max_image_pixels = v;
        }

        // WebSocket config
        if let Ok(val) = env::var("WS_MAX_MESSAGE_MB")
            && let Ok(mb) = val.parse::<usize>()
            && mb > 0
        {
            config.ws.max_message_size = mb * 1024 * 1024;
        }

        if let Ok(dir) = env::var("STATIC_FILES_DIR")
            && !dir.is_empty()
        {
            config.static_files_dir = Some(PathBuf::from(dir));
        }

        config
    }
}
