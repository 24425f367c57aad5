use crate::core::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default SQL Server TCP port
pub const DEFAULT_PORT: u16 = 1433;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub sqlite: Option<SqliteConfig>,
    pub bcp: Option<BcpConfig>,
}

/// SQL Server connection settings.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Accept the server certificate without validation
    #[serde(default)]
    pub trust_cert: bool,
    /// Path or name of the bcp executable
    #[serde(default = "default_bcp_program")]
    pub bcp_program: PathBuf,
}

/// Local SQLite database settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

/// Bulk-copy tool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BcpConfig {
    pub program: Option<PathBuf>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bcp_program() -> PathBuf {
    PathBuf::from("bcp")
}

impl ServerConfig {
    /// Settings for the default port, without certificate trust overrides
    pub fn new(user: &str, password: &str, host: &str, database: &str) -> Self {
        ServerConfig {
            host: host.to_string(),
            port: DEFAULT_PORT,
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
            trust_cert: false,
            bcp_program: default_bcp_program(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

// Keeps the password out of logs and panics.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("trust_cert", &self.trust_cert)
            .field("bcp_program", &self.bcp_program)
            .finish()
    }
}

impl Config {
    /// Server settings with the `[bcp]` program override applied
    pub fn server(&self) -> Option<ServerConfig> {
        let mut server = self.server.clone()?;
        if let Some(program) = self.bcp.as_ref().and_then(|b| b.program.clone()) {
            server.bcp_program = program;
        }
        Some(server)
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
    if config.server.is_none() && config.sqlite.is_none() {
        return Err(Error::Config(
            "either a [server] or a [sqlite] section is required".to_string(),
        ));
    }
    Ok(config)
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = magical_sqlserver::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    parse_config(&content)
}

/// `<config dir>/magical-sqlserver/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("magical-sqlserver").join("config.toml"))
}
