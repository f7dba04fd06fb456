use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parley_core::config::{AppConfig, LoadOptions, ProviderEndpoint};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "PARLEY_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "PARLEY_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "PARLEY_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "engine.base_url",
        &config.engine.base_url,
        source("engine.base_url", "PARLEY_ENGINE_BASE_URL"),
    ));
    lines.push(render_line(
        "engine.api_key",
        redact_secret(config.engine.api_key.is_some()),
        source("engine.api_key", "PARLEY_ENGINE_API_KEY"),
    ));
    lines.push(render_line(
        "engine.model",
        &config.engine.model,
        source("engine.model", "PARLEY_ENGINE_MODEL"),
    ));
    lines.push(render_line(
        "engine.poll_max_attempts",
        &config.engine.poll_max_attempts.to_string(),
        source("engine.poll_max_attempts", "PARLEY_ENGINE_POLL_MAX_ATTEMPTS"),
    ));
    lines.push(render_line(
        "engine.poll_interval_ms",
        &config.engine.poll_interval_ms.to_string(),
        source("engine.poll_interval_ms", "PARLEY_ENGINE_POLL_INTERVAL_MS"),
    ));
    lines.push(render_line(
        "engine.tool_backoff_ms",
        &config.engine.tool_backoff_ms.to_string(),
        source("engine.tool_backoff_ms", "PARLEY_ENGINE_TOOL_BACKOFF_MS"),
    ));

    push_provider_lines(&mut lines, "calendar", &config.providers.calendar, &source);
    push_provider_lines(&mut lines, "search", &config.providers.search, &source);
    push_provider_lines(&mut lines, "mail", &config.providers.mail, &source);

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "PARLEY_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "PARLEY_SERVER_PORT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "PARLEY_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "PARLEY_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn push_provider_lines(
    lines: &mut Vec<String>,
    name: &str,
    endpoint: &ProviderEndpoint,
    source: &impl Fn(&str, &str) -> String,
) {
    let env_prefix = name.to_ascii_uppercase();
    lines.push(render_line(
        &format!("providers.{name}.base_url"),
        &endpoint.base_url,
        source(&format!("providers.{name}.base_url"), &format!("PARLEY_{env_prefix}_BASE_URL")),
    ));
    lines.push(render_line(
        &format!("providers.{name}.api_key"),
        redact_secret(endpoint.api_key.is_some()),
        source(&format!("providers.{name}.api_key"), &format!("PARLEY_{env_prefix}_API_KEY")),
    ));
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("parley.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/parley.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(set: bool) -> &'static str {
    if set {
        "<redacted>"
    } else {
        "<unset>"
    }
}
