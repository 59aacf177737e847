use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use voxcrm_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let doc = load_config_file_doc(config_file_path.as_deref());
    let file = config_file_path.as_deref();

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut push = |key: &str, value: &str, env_key: &str| {
        lines.push(render_line(key, value, field_source(key, Some(env_key), doc.as_ref(), file)));
    };

    push("database.url", &config.database.url, "VOXCRM_DATABASE_URL");
    push(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        "VOXCRM_DATABASE_MAX_CONNECTIONS",
    );
    push(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        "VOXCRM_DATABASE_TIMEOUT_SECS",
    );

    push("crm.api_version", &config.crm.api_version, "VOXCRM_CRM_API_VERSION");
    push(
        "crm.static_access_token",
        &redact_optional_secret(config.crm.static_access_token.as_ref().map(|t| t.expose_secret())),
        "VOXCRM_CRM_STATIC_ACCESS_TOKEN",
    );
    push(
        "crm.static_instance_url",
        config.crm.static_instance_url.as_deref().unwrap_or("<unset>"),
        "VOXCRM_CRM_STATIC_INSTANCE_URL",
    );
    push("crm.username", config.crm.username.as_deref().unwrap_or("<unset>"), "VOXCRM_CRM_USERNAME");
    push(
        "crm.password",
        if config.crm.password.is_some() { "<redacted>" } else { "<unset>" },
        "VOXCRM_CRM_PASSWORD",
    );
    push(
        "crm.default_app_key",
        config.crm.default_app_key.as_deref().unwrap_or("<unset>"),
        "VOXCRM_CRM_DEFAULT_APP_KEY",
    );
    push(
        "crm.default_app_secret",
        if config.crm.default_app_secret.is_some() { "<redacted>" } else { "<unset>" },
        "VOXCRM_CRM_DEFAULT_APP_SECRET",
    );
    push("crm.login_url", &config.crm.login_url, "VOXCRM_CRM_LOGIN_URL");
    push(
        "crm.refresh_buffer_secs",
        &config.crm.refresh_buffer_secs.to_string(),
        "VOXCRM_CRM_REFRESH_BUFFER_SECS",
    );

    push(
        "interpreter.base_url",
        config.interpreter.base_url.as_deref().unwrap_or("<unset>"),
        "VOXCRM_INTERPRETER_BASE_URL",
    );
    push(
        "interpreter.api_key",
        if config.interpreter.api_key.is_some() { "<redacted>" } else { "<unset>" },
        "VOXCRM_INTERPRETER_API_KEY",
    );
    push("interpreter.model", &config.interpreter.model, "VOXCRM_INTERPRETER_MODEL");
    push(
        "interpreter.timeout_secs",
        &config.interpreter.timeout_secs.to_string(),
        "VOXCRM_INTERPRETER_TIMEOUT_SECS",
    );
    push(
        "interpreter.max_retries",
        &config.interpreter.max_retries.to_string(),
        "VOXCRM_INTERPRETER_MAX_RETRIES",
    );

    push("logging.level", &config.logging.level, "VOXCRM_LOGGING_LEVEL");
    push("logging.format", &format!("{:?}", config.logging.format), "VOXCRM_LOGGING_FORMAT");

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("voxcrm.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/voxcrm.toml");
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
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

fn redact_optional_secret(secret: Option<&str>) -> String {
    match secret {
        None => "<unset>".to_string(),
        Some(value) if value.trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}
