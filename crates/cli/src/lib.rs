pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "voxcrm",
    about = "Voxcrm operator CLI",
    long_about = "Operate Voxcrm readiness checks, migrations, config inspection, and tenant credential management.",
    after_help = "Examples:\n  voxcrm doctor --json\n  voxcrm config\n  voxcrm connect --caller-id alice --access-token 00D... --refresh-token 5Aep... --instance-url https://acme.my.salesforce.com"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, CRM auth readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Store or replace a caller's CRM credential")]
    Connect {
        #[arg(long, help = "Caller identifier the credential belongs to")]
        caller_id: String,
        #[arg(long, help = "OAuth access token")]
        access_token: String,
        #[arg(long, help = "OAuth refresh token")]
        refresh_token: String,
        #[arg(long, help = "CRM instance URL (either addressable form)")]
        instance_url: String,
        #[arg(long, default_value_t = 7200, help = "Seconds until the access token expires")]
        expires_in_secs: i64,
    },
    #[command(about = "Register per-instance OAuth app credentials used for token refresh")]
    RegisterApp {
        #[arg(long, help = "CRM instance URL the app belongs to")]
        instance_url: String,
        #[arg(long, help = "OAuth consumer key")]
        app_key: String,
        #[arg(long, help = "OAuth consumer secret")]
        app_secret: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Connect { caller_id, access_token, refresh_token, instance_url, expires_in_secs } => {
            commands::connect::run(commands::connect::ConnectArgs {
                caller_id,
                access_token,
                refresh_token,
                instance_url,
                expires_in_secs,
            })
        }
        Command::RegisterApp { instance_url, app_key, app_secret } => {
            commands::connect::register_app(instance_url, app_key, app_secret)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
