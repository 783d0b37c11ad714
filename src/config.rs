use std::net::{AddrParseError, SocketAddr};

use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "outlay", about = "Outlay - personal expense tracker")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "outlay.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Secret used to sign session tokens (overrides config file)
    #[arg(long, env = "OUTLAY_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Print a spending summary for one user
    Report {
        /// Email of the account to summarize
        #[arg(long)]
        email: String,

        /// Restrict to a month, YYYY-MM
        #[arg(long)]
        month: Option<String>,

        /// Restrict to a category (Food, Travel, Bills, Shopping, Other)
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// SQLite database file; ignored by the memory backend.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. A random one is generated at startup
    /// when unset.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: u32,

    /// Adds the `Secure` attribute to the session cookie.
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_path() -> String {
    "outlay.db".to_string()
}

fn default_token_ttl_days() -> u32 {
    7
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: StorageKind::default(),
            path: default_storage_path(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: None,
            token_ttl_days: default_token_ttl_days(),
            cookie_secure: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            logging: default_logging(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        // Logging is not initialized yet, so problems go to stderr.
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref secret) = cli.jwt_secret {
            config.auth.jwt_secret = Some(secret.clone());
        }

        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.backend, StorageKind::Sqlite);
        assert_eq!(config.storage.path, "outlay.db");
        assert_eq!(config.auth.token_ttl_days, 7);
        assert!(config.auth.jwt_secret.is_none());
        assert!(config.metrics.enabled);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [storage]
            backend = "memory"

            [auth]
            jwt_secret = "s3cret"
            cookie_secure = true

            [metrics]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.storage.backend, StorageKind::Memory);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert!(config.auth.cookie_secure);
        assert_eq!(config.auth.token_ttl_days, 7);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(Config::parse("[storage]\nbackend = \"mongo\"").is_err());
    }

    #[test]
    fn cli_overrides_win() {
        let cli = CliArgs::parse_from([
            "outlay",
            "--config",
            "/nonexistent/outlay.toml",
            "--port",
            "9999",
            "--jwt-secret",
            "from-cli",
        ]);
        let config = Config::load(&cli);
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("from-cli"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn report_subcommand_parses() {
        let cli = CliArgs::parse_from(["outlay", "report", "--email", "a@b.c", "--month", "2024-01"]);
        assert_eq!(
            cli.command,
            Some(Command::Report {
                email: "a@b.c".to_string(),
                month: Some("2024-01".to_string()),
                category: None,
            })
        );
    }
}
