use chrono::{Duration, Utc};

use crate::commands::CommandResult;
use voxcrm_core::config::{AppConfig, LoadOptions};
use voxcrm_core::credential::{TenantCredential, TenantOAuthApp};
use voxcrm_core::instance::normalize_instance_url;
use voxcrm_db::repositories::{
    CredentialRepository, OAuthAppRepository, SqlCredentialRepository, SqlOAuthAppRepository,
};
use voxcrm_db::{connect, migrations, DbPool};

pub struct ConnectArgs {
    pub caller_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub instance_url: String,
    pub expires_in_secs: i64,
}

/// Store (or replace) one caller's credential. The instance URL is
/// normalized to the canonical API-domain form before it is written.
pub fn run(args: ConnectArgs) -> CommandResult {
    with_store("connect", |pool| async move {
        let now = Utc::now();
        let credential = TenantCredential {
            caller_id: args.caller_id.clone(),
            access_token: args.access_token,
            refresh_token: args.refresh_token,
            instance_url: normalize_instance_url(&args.instance_url),
            expires_at: now + Duration::seconds(args.expires_in_secs),
            external_user_id: None,
        };
        SqlCredentialRepository::new(pool)
            .upsert(credential)
            .await
            .map_err(|error| ("credential_store", error.to_string(), 5u8))?;
        Ok(format!("stored CRM credential for caller `{}`", args.caller_id))
    })
}

pub fn register_app(instance_url: String, app_key: String, app_secret: String) -> CommandResult {
    with_store("register-app", |pool| async move {
        let normalized = normalize_instance_url(&instance_url);
        SqlOAuthAppRepository::new(pool)
            .upsert(TenantOAuthApp { instance_url: normalized.clone(), app_key, app_secret })
            .await
            .map_err(|error| ("credential_store", error.to_string(), 5u8))?;
        Ok(format!("registered OAuth app for instance `{normalized}`"))
    })
}

/// Shared plumbing: load config, open the pool, make sure the schema is
/// current, run the operation, close the pool.
fn with_store<F, Fut>(command: &str, operation: F) -> CommandResult
where
    F: FnOnce(DbPool) -> Fut,
    Fut: std::future::Future<Output = Result<String, (&'static str, String, u8)>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let message = operation(pool.clone()).await?;
        pool.close().await;
        Ok::<String, (&'static str, String, u8)>(message)
    });

    match result {
        Ok(message) => CommandResult::success(command, message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}
