use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub crm: CrmConfig,
    pub interpreter: InterpreterConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// CRM-side settings: the fixed REST API version, the optional operator
/// override / service-account auth modes, the global default OAuth app, and
/// the refresh buffer applied before token expiry.
#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub api_version: String,
    pub static_access_token: Option<SecretString>,
    pub static_instance_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub default_app_key: Option<String>,
    pub default_app_secret: Option<SecretString>,
    pub login_url: String,
    pub refresh_buffer_secs: u64,
}

impl CrmConfig {
    /// Operator override: a verbatim token/instance pair that is never
    /// refreshed (step 1 of credential resolution).
    pub fn static_pair(&self) -> Option<(String, String)> {
        match (&self.static_access_token, &self.static_instance_url) {
            (Some(token), Some(instance)) if !instance.trim().is_empty() => {
                Some((token.expose_secret().to_string(), instance.trim().to_string()))
            }
            _ => None,
        }
    }

    pub fn service_account(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.trim().is_empty() => {
                Some((username.trim().to_string(), password.expose_secret().to_string()))
            }
            _ => None,
        }
    }

    pub fn default_app(&self) -> Option<(String, String)> {
        match (&self.default_app_key, &self.default_app_secret) {
            (Some(key), Some(secret)) if !key.trim().is_empty() => {
                Some((key.trim().to_string(), secret.expose_secret().to_string()))
            }
            _ => None,
        }
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.refresh_buffer_secs)
    }
}

#[derive(Clone, Debug)]
pub struct InterpreterConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
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
    pub crm_api_version: Option<String>,
    pub crm_static_access_token: Option<String>,
    pub crm_static_instance_url: Option<String>,
    pub crm_username: Option<String>,
    pub crm_password: Option<String>,
    pub crm_default_app_key: Option<String>,
    pub crm_default_app_secret: Option<String>,
    pub crm_refresh_buffer_secs: Option<u64>,
    pub interpreter_base_url: Option<String>,
    pub interpreter_api_key: Option<String>,
    pub interpreter_model: Option<String>,
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
                url: "sqlite://voxcrm.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            crm: CrmConfig {
                api_version: "v59.0".to_string(),
                static_access_token: None,
                static_instance_url: None,
                username: None,
                password: None,
                default_app_key: None,
                default_app_secret: None,
                login_url: "https://login.salesforce.com".to_string(),
                refresh_buffer_secs: 300,
            },
            interpreter: InterpreterConfig {
                base_url: Some("http://localhost:11434".to_string()),
                api_key: None,
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("voxcrm.toml"));
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

        if let Some(crm) = patch.crm {
            if let Some(api_version) = crm.api_version {
                self.crm.api_version = api_version;
            }
            if let Some(token) = crm.static_access_token {
                self.crm.static_access_token = Some(secret_value(token));
            }
            if let Some(instance_url) = crm.static_instance_url {
                self.crm.static_instance_url = Some(instance_url);
            }
            if let Some(username) = crm.username {
                self.crm.username = Some(username);
            }
            if let Some(password) = crm.password {
                self.crm.password = Some(secret_value(password));
            }
            if let Some(app_key) = crm.default_app_key {
                self.crm.default_app_key = Some(app_key);
            }
            if let Some(app_secret) = crm.default_app_secret {
                self.crm.default_app_secret = Some(secret_value(app_secret));
            }
            if let Some(login_url) = crm.login_url {
                self.crm.login_url = login_url;
            }
            if let Some(refresh_buffer_secs) = crm.refresh_buffer_secs {
                self.crm.refresh_buffer_secs = refresh_buffer_secs;
            }
        }

        if let Some(interpreter) = patch.interpreter {
            if let Some(base_url) = interpreter.base_url {
                self.interpreter.base_url = Some(base_url);
            }
            if let Some(api_key) = interpreter.api_key {
                self.interpreter.api_key = Some(secret_value(api_key));
            }
            if let Some(model) = interpreter.model {
                self.interpreter.model = model;
            }
            if let Some(timeout_secs) = interpreter.timeout_secs {
                self.interpreter.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = interpreter.max_retries {
                self.interpreter.max_retries = max_retries;
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
        if let Some(value) = read_env("VOXCRM_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("VOXCRM_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("VOXCRM_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("VOXCRM_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("VOXCRM_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VOXCRM_CRM_API_VERSION") {
            self.crm.api_version = value;
        }
        if let Some(value) = read_env("VOXCRM_CRM_STATIC_ACCESS_TOKEN") {
            self.crm.static_access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("VOXCRM_CRM_STATIC_INSTANCE_URL") {
            self.crm.static_instance_url = Some(value);
        }
        if let Some(value) = read_env("VOXCRM_CRM_USERNAME") {
            self.crm.username = Some(value);
        }
        if let Some(value) = read_env("VOXCRM_CRM_PASSWORD") {
            self.crm.password = Some(secret_value(value));
        }
        if let Some(value) = read_env("VOXCRM_CRM_DEFAULT_APP_KEY") {
            self.crm.default_app_key = Some(value);
        }
        if let Some(value) = read_env("VOXCRM_CRM_DEFAULT_APP_SECRET") {
            self.crm.default_app_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("VOXCRM_CRM_LOGIN_URL") {
            self.crm.login_url = value;
        }
        if let Some(value) = read_env("VOXCRM_CRM_REFRESH_BUFFER_SECS") {
            self.crm.refresh_buffer_secs = parse_u64("VOXCRM_CRM_REFRESH_BUFFER_SECS", &value)?;
        }

        if let Some(value) = read_env("VOXCRM_INTERPRETER_BASE_URL") {
            self.interpreter.base_url = Some(value);
        }
        if let Some(value) = read_env("VOXCRM_INTERPRETER_API_KEY") {
            self.interpreter.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("VOXCRM_INTERPRETER_MODEL") {
            self.interpreter.model = value;
        }
        if let Some(value) = read_env("VOXCRM_INTERPRETER_TIMEOUT_SECS") {
            self.interpreter.timeout_secs = parse_u64("VOXCRM_INTERPRETER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VOXCRM_INTERPRETER_MAX_RETRIES") {
            self.interpreter.max_retries = parse_u32("VOXCRM_INTERPRETER_MAX_RETRIES", &value)?;
        }

        let log_level = read_env("VOXCRM_LOGGING_LEVEL").or_else(|| read_env("VOXCRM_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VOXCRM_LOGGING_FORMAT").or_else(|| read_env("VOXCRM_LOG_FORMAT"));
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
        if let Some(api_version) = overrides.crm_api_version {
            self.crm.api_version = api_version;
        }
        if let Some(token) = overrides.crm_static_access_token {
            self.crm.static_access_token = Some(secret_value(token));
        }
        if let Some(instance_url) = overrides.crm_static_instance_url {
            self.crm.static_instance_url = Some(instance_url);
        }
        if let Some(username) = overrides.crm_username {
            self.crm.username = Some(username);
        }
        if let Some(password) = overrides.crm_password {
            self.crm.password = Some(secret_value(password));
        }
        if let Some(app_key) = overrides.crm_default_app_key {
            self.crm.default_app_key = Some(app_key);
        }
        if let Some(app_secret) = overrides.crm_default_app_secret {
            self.crm.default_app_secret = Some(secret_value(app_secret));
        }
        if let Some(refresh_buffer_secs) = overrides.crm_refresh_buffer_secs {
            self.crm.refresh_buffer_secs = refresh_buffer_secs;
        }
        if let Some(base_url) = overrides.interpreter_base_url {
            self.interpreter.base_url = Some(base_url);
        }
        if let Some(api_key) = overrides.interpreter_api_key {
            self.interpreter.api_key = Some(secret_value(api_key));
        }
        if let Some(model) = overrides.interpreter_model {
            self.interpreter.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_crm(&self.crm)?;
        validate_interpreter(&self.interpreter)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("voxcrm.toml"), PathBuf::from("config/voxcrm.toml")]
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

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    let version = crm.api_version.trim();
    let well_formed = version
        .strip_prefix('v')
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.'))
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "crm.api_version must look like `v59.0`".to_string(),
        ));
    }

    if crm.static_access_token.is_some() != crm.static_instance_url.is_some() {
        return Err(ConfigError::Validation(
            "crm.static_access_token and crm.static_instance_url must be set together".to_string(),
        ));
    }

    if crm.username.is_some() != crm.password.is_some() {
        return Err(ConfigError::Validation(
            "crm.username and crm.password must be set together".to_string(),
        ));
    }
    if crm.username.is_some() && crm.default_app_key.is_none() {
        return Err(ConfigError::Validation(
            "crm.username requires crm.default_app_key/crm.default_app_secret for the password grant"
                .to_string(),
        ));
    }

    if crm.default_app_key.is_some() != crm.default_app_secret.is_some() {
        return Err(ConfigError::Validation(
            "crm.default_app_key and crm.default_app_secret must be set together".to_string(),
        ));
    }

    if !crm.login_url.starts_with("http://") && !crm.login_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "crm.login_url must start with http:// or https://".to_string(),
        ));
    }

    if crm.refresh_buffer_secs == 0 || crm.refresh_buffer_secs > 3600 {
        return Err(ConfigError::Validation(
            "crm.refresh_buffer_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_interpreter(interpreter: &InterpreterConfig) -> Result<(), ConfigError> {
    if interpreter.timeout_secs == 0 || interpreter.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "interpreter.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if interpreter.model.trim().is_empty() {
        return Err(ConfigError::Validation("interpreter.model must not be empty".to_string()));
    }

    let has_endpoint = interpreter
        .base_url
        .as_ref()
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
        || interpreter.api_key.is_some();
    if !has_endpoint {
        return Err(ConfigError::Validation(
            "interpreter.base_url or interpreter.api_key is required".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    crm: Option<CrmPatch>,
    interpreter: Option<InterpreterPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    api_version: Option<String>,
    static_access_token: Option<String>,
    static_instance_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    default_app_key: Option<String>,
    default_app_secret: Option<String>,
    login_url: Option<String>,
    refresh_buffer_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct InterpreterPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
