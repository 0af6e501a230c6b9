//! Configuration management

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use config::{builder::DefaultState, Config as ConfigBuilder, ConfigBuilder as Builder, ConfigError as BuilderError, Environment, File};
use clap::Parser;
use crate::auth::jwt::MAX_TOKEN_TTL_HOURS;

/// Environment variables honoured for compatibility with older deployments.
/// They sit above the `CONDUCTOR_` variables and below CLI flags.
const LEGACY_JWT_SECRET: &str = "JWT_SECRET";
const LEGACY_APP_ENV: &str = "APP_ENV";
const LEGACY_REDIS_ADDR: &str = "REDIS_ADDR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server configuration: {0}")]
    InvalidServer(String),

    #[error("Invalid database configuration: {0}")]
    InvalidDatabase(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),

    #[error("Invalid security configuration: {0}")]
    InvalidSecurity(String),

    #[error("Invalid cache configuration: {0}")]
    InvalidCache(String),

    #[error("Invalid app configuration: {0}")]
    InvalidApp(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<BuilderError> for ConfigError {
    fn from(err: BuilderError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub app: AppConfig,
}

impl Config {
    /// Load configuration with precedence: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_args(CliArgs::parse())
    }

    /// Load configuration using already-parsed command-line arguments
    pub fn load_with_args(cli_args: CliArgs) -> Result<Self, ConfigError> {
        // 1. Defaults (lowest priority)
        let mut builder = with_defaults(ConfigBuilder::builder())?;

        // 2. Config file (medium priority)
        if let Some(config_path) = &cli_args.config {
            if !config_path.exists() {
                return Err(ConfigError::FileNotFound(
                    config_path.display().to_string()
                ));
            }
            builder = builder.add_source(File::from(config_path.as_path()));
        }

        // 3. Environment variables (higher priority)
        // Prefixed with CONDUCTOR_ and using __ for nesting, e.g. CONDUCTOR_SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("CONDUCTOR")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("security.allowed_origins")
                .try_parsing(true)
        );
        builder = with_legacy_env(builder)?;

        // 4. CLI arguments (highest priority)
        if let Some(host) = &cli_args.host {
            builder = builder.set_override("server.host", host.clone())?;
        }
        if let Some(port) = cli_args.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(db_path) = &cli_args.database {
            builder = builder.set_override("database.path", db_path.display().to_string())?;
        }
        if let Some(log_level) = &cli_args.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path, on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let config: Config = with_defaults(ConfigBuilder::builder())?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.security.validate()?;
        self.cache.validate()?;
        self.app.validate()?;
        Ok(())
    }
}

/// Built-in defaults. `security.jwt_secret` has none: a missing secret fails
/// deserialization.
fn with_defaults(builder: Builder<DefaultState>) -> Result<Builder<DefaultState>, ConfigError> {
    Ok(builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 9916)?
        .set_default("server.request_timeout", 30)?
        .set_default("database.path", "./data/conductor.db")?
        .set_default("database.connection_pool_size", 10)?
        .set_default("database.busy_timeout", 5000)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "json")?
        .set_default("logging.output", "stdout")?
        .set_default("logging.max_file_size", 10485760)? // 10 MB
        .set_default("logging.max_backups", 5)?
        .set_default("security.token_ttl_hours", 24)?
        .set_default("security.bcrypt_cost", bcrypt::DEFAULT_COST as i64)?
        .set_default("security.allowed_origins", vec!["*"])?
        .set_default("cache.backend", "memory")?
        .set_default("cache.profile_ttl", 300)?
        .set_default("cache.max_entries", 10000)?
        .set_default("app.environment", "prod")?)
}

fn with_legacy_env(mut builder: Builder<DefaultState>) -> Result<Builder<DefaultState>, ConfigError> {
    if let Some(secret) = non_empty_env(LEGACY_JWT_SECRET) {
        builder = builder.set_override("security.jwt_secret", secret)?;
    }
    if let Some(env) = non_empty_env(LEGACY_APP_ENV) {
        builder = builder.set_override("app.environment", env)?;
    }
    if let Some(addr) = non_empty_env(LEGACY_REDIS_ADDR) {
        builder = builder
            .set_override("cache.backend", "redis")?
            .set_override("cache.redis_url", format!("redis://{}", addr))?;
    }
    Ok(builder)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Command-line arguments for configuration override
#[derive(Debug, Default, Parser)]
#[command(name = "conductor")]
#[command(about = "Conductor course enrollment backend", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server host address
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Database file path
    #[arg(short, long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64, // seconds
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidServer("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidServer("port must be greater than 0".to_string()));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidServer("request_timeout must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub connection_pool_size: usize,
    pub busy_timeout: u64, // milliseconds
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidDatabase("path cannot be empty".to_string()));
        }

        if self.connection_pool_size == 0 {
            return Err(ConfigError::InvalidDatabase("connection_pool_size must be greater than 0".to_string()));
        }

        if self.busy_timeout == 0 {
            return Err(ConfigError::InvalidDatabase("busy_timeout must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub log_file: Option<PathBuf>,
    pub max_file_size: usize, // bytes
    pub max_backups: usize,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(ConfigError::InvalidLogging(
                format!("level must be one of: {:?}", valid_levels)
            ));
        }

        let valid_formats = ["json", "text"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidLogging(
                format!("format must be one of: {:?}", valid_formats)
            ));
        }

        let valid_outputs = ["stdout", "file"];
        if !valid_outputs.contains(&self.output.as_str()) {
            return Err(ConfigError::InvalidLogging(
                format!("output must be one of: {:?}", valid_outputs)
            ));
        }

        if self.output == "file" && self.log_file.is_none() {
            return Err(ConfigError::InvalidLogging(
                "log_file must be specified when output is 'file'".to_string()
            ));
        }

        if self.max_file_size == 0 {
            return Err(ConfigError::InvalidLogging("max_file_size must be greater than 0".to_string()));
        }

        if self.max_backups == 0 {
            return Err(ConfigError::InvalidLogging("max_backups must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub bcrypt_cost: u32,
    pub allowed_origins: Vec<String>,
}

impl SecurityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidSecurity(
                "jwt_secret must be set (CONDUCTOR_SECURITY__JWT_SECRET or JWT_SECRET)".to_string()
            ));
        }

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return Err(ConfigError::InvalidSecurity(format!(
                "token_ttl_hours must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            )));
        }

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidSecurity("bcrypt_cost must be between 4 and 31".to_string()));
        }

        if self.allowed_origins.is_empty() {
            return Err(ConfigError::InvalidSecurity("allowed_origins cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub backend: String,
    pub redis_url: Option<String>,
    pub profile_ttl: u64, // seconds
    pub max_entries: u64,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_backends = ["memory", "redis", "none"];
        if !valid_backends.contains(&self.backend.as_str()) {
            return Err(ConfigError::InvalidCache(
                format!("backend must be one of: {:?}", valid_backends)
            ));
        }

        if self.backend == "redis" && self.redis_url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidCache(
                "redis_url must be specified when backend is 'redis'".to_string()
            ));
        }

        if self.profile_ttl == 0 {
            return Err(ConfigError::InvalidCache("profile_ttl must be greater than 0".to_string()));
        }

        if self.max_entries == 0 {
            return Err(ConfigError::InvalidCache("max_entries must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Deployment environment; development-only routes are enabled for "dev"
    pub environment: String,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.is_empty() {
            return Err(ConfigError::InvalidApp("environment cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn is_dev(&self) -> bool {
        self.environment == "dev"
    }
}
