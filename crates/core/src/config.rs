use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub providers: ProvidersConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Reasoning engine client settings, including the bounded polling policy
/// the orchestrator runs each turn under.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub tool_backoff_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ProvidersConfig {
    pub calendar: ProviderEndpoint,
    pub search: ProviderEndpoint,
    pub mail: ProviderEndpoint,
}

#[derive(Clone, Debug)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub engine_base_url: Option<String>,
    pub engine_api_key: Option<String>,
    pub engine_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://parley.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            engine: EngineConfig {
                base_url: "http://localhost:9090".to_string(),
                api_key: None,
                model: "reason-1".to_string(),
                timeout_secs: 30,
                poll_max_attempts: 40,
                poll_interval_ms: 900,
                tool_backoff_ms: 600,
            },
            providers: ProvidersConfig {
                calendar: ProviderEndpoint {
                    base_url: "http://localhost:9191".to_string(),
                    api_key: None,
                },
                search: ProviderEndpoint {
                    base_url: "http://localhost:9292".to_string(),
                    api_key: None,
                },
                mail: ProviderEndpoint {
                    base_url: "http://localhost:9393".to_string(),
                    api_key: None,
                },
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    engine: Option<EnginePatch>,
    providers: Option<ProvidersPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    poll_max_attempts: Option<u32>,
    poll_interval_ms: Option<u64>,
    tool_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProvidersPatch {
    calendar: Option<ProviderEndpointPatch>,
    search: Option<ProviderEndpointPatch>,
    mail: Option<ProviderEndpointPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderEndpointPatch {
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("parley.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(base_url) = engine.base_url {
                self.engine.base_url = base_url;
            }
            if let Some(engine_api_key_value) = engine.api_key {
                self.engine.api_key = Some(secret_value(engine_api_key_value));
            }
            if let Some(model) = engine.model {
                self.engine.model = model;
            }
            if let Some(timeout_secs) = engine.timeout_secs {
                self.engine.timeout_secs = timeout_secs;
            }
            if let Some(poll_max_attempts) = engine.poll_max_attempts {
                self.engine.poll_max_attempts = poll_max_attempts;
            }
            if let Some(poll_interval_ms) = engine.poll_interval_ms {
                self.engine.poll_interval_ms = poll_interval_ms;
            }
            if let Some(tool_backoff_ms) = engine.tool_backoff_ms {
                self.engine.tool_backoff_ms = tool_backoff_ms;
            }
        }

        if let Some(providers) = patch.providers {
            apply_endpoint_patch(&mut self.providers.calendar, providers.calendar);
            apply_endpoint_patch(&mut self.providers.search, providers.search);
            apply_endpoint_patch(&mut self.providers.mail, providers.mail);
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PARLEY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PARLEY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("PARLEY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PARLEY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PARLEY_ENGINE_BASE_URL") {
            self.engine.base_url = value;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_API_KEY") {
            self.engine.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PARLEY_ENGINE_MODEL") {
            self.engine.model = value;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_TIMEOUT_SECS") {
            self.engine.timeout_secs = parse_u64("PARLEY_ENGINE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_POLL_MAX_ATTEMPTS") {
            self.engine.poll_max_attempts =
                parse_u32("PARLEY_ENGINE_POLL_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_POLL_INTERVAL_MS") {
            self.engine.poll_interval_ms = parse_u64("PARLEY_ENGINE_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("PARLEY_ENGINE_TOOL_BACKOFF_MS") {
            self.engine.tool_backoff_ms = parse_u64("PARLEY_ENGINE_TOOL_BACKOFF_MS", &value)?;
        }

        if let Some(value) = read_env("PARLEY_CALENDAR_BASE_URL") {
            self.providers.calendar.base_url = value;
        }
        if let Some(value) = read_env("PARLEY_CALENDAR_API_KEY") {
            self.providers.calendar.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PARLEY_SEARCH_BASE_URL") {
            self.providers.search.base_url = value;
        }
        if let Some(value) = read_env("PARLEY_SEARCH_API_KEY") {
            self.providers.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PARLEY_MAIL_BASE_URL") {
            self.providers.mail.base_url = value;
        }
        if let Some(value) = read_env("PARLEY_MAIL_API_KEY") {
            self.providers.mail.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("PARLEY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PARLEY_SERVER_PORT") {
            self.server.port = parse_u16("PARLEY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PARLEY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PARLEY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("PARLEY_LOGGING_LEVEL").or_else(|| read_env("PARLEY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PARLEY_LOGGING_FORMAT").or_else(|| read_env("PARLEY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(engine_base_url) = overrides.engine_base_url {
            self.engine.base_url = engine_base_url;
        }
        if let Some(engine_api_key) = overrides.engine_api_key {
            self.engine.api_key = Some(secret_value(engine_api_key));
        }
        if let Some(engine_model) = overrides.engine_model {
            self.engine.model = engine_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_engine(&self.engine)?;
        validate_providers(&self.providers)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn apply_endpoint_patch(endpoint: &mut ProviderEndpoint, patch: Option<ProviderEndpointPatch>) {
    let Some(patch) = patch else { return };
    if let Some(base_url) = patch.base_url {
        endpoint.base_url = base_url;
    }
    if let Some(provider_api_key_value) = patch.api_key {
        endpoint.api_key = Some(secret_value(provider_api_key_value));
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("parley.toml"), PathBuf::from("config/parley.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    validate_http_url("engine.base_url", &engine.base_url)?;

    if engine.model.trim().is_empty() {
        return Err(ConfigError::Validation("engine.model must not be empty".to_string()));
    }

    if engine.timeout_secs == 0 || engine.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "engine.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if engine.poll_max_attempts == 0 || engine.poll_max_attempts > 200 {
        return Err(ConfigError::Validation(
            "engine.poll_max_attempts must be in range 1..=200".to_string(),
        ));
    }

    if let Some(api_key) = &engine.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "engine.api_key must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_providers(providers: &ProvidersConfig) -> Result<(), ConfigError> {
    validate_http_url("providers.calendar.base_url", &providers.calendar.base_url)?;
    validate_http_url("providers.search.base_url", &providers.search.base_url)?;
    validate_http_url("providers.mail.base_url", &providers.mail.base_url)?;
    Ok(())
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must be an http(s) URL, got `{url}`")))
    }
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.graceful_shutdown_secs > 120 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be at most 120".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    let level = logging.level.trim().to_ascii_lowercase();
    if LEVELS.contains(&level.as_str()) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "logging.level must be one of trace|debug|info|warn|error, got `{}`",
            logging.level
        )))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
