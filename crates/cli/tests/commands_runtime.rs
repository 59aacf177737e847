use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use voxcrm_cli::commands::{config, connect, doctor, migrate};

#[test]
fn migrate_applies_cleanly_against_memory_database() {
    with_env(&[("VOXCRM_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_fails_with_invalid_database_url() {
    with_env(&[("VOXCRM_DATABASE_URL", "postgres://nope")], || {
        let result = migrate::run();
        assert_ne!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn connect_stores_a_credential() {
    with_env(&[("VOXCRM_DATABASE_URL", "sqlite::memory:")], || {
        let result = connect::run(connect::ConnectArgs {
            caller_id: "alice".to_string(),
            access_token: "00Dtoken".to_string(),
            refresh_token: "5Aeprefresh".to_string(),
            instance_url: "https://acme.lightning.force.com/".to_string(),
            expires_in_secs: 7200,
        });
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "connect");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().contains("alice"));
    });
}

#[test]
fn register_app_normalizes_the_instance_url() {
    with_env(&[("VOXCRM_DATABASE_URL", "sqlite::memory:")], || {
        let result = connect::register_app(
            "https://acme.lightning.force.com".to_string(),
            "key".to_string(),
            "secret".to_string(),
        );
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert!(payload["message"]
            .as_str()
            .unwrap_or_default()
            .contains("https://acme.my.salesforce.com"));
    });
}

#[test]
fn doctor_json_reports_all_checks() {
    with_env(&[("VOXCRM_DATABASE_URL", "sqlite::memory:")], || {
        let output = doctor::run(true);
        let report: Value = serde_json::from_str(&output).expect("doctor output is JSON");

        assert_eq!(report["overall_status"], "pass");
        let names: Vec<&str> = report["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(names, ["config_validation", "crm_auth_readiness", "database_connectivity"]);
    });
}

#[test]
fn config_attributes_env_overrides() {
    with_env(&[("VOXCRM_DATABASE_URL", "sqlite::memory:")], || {
        let output = config::run();
        assert!(output.contains("- database.url = sqlite::memory: (source: env (VOXCRM_DATABASE_URL))"));
        assert!(output.contains("- crm.api_version = v59.0 (source: default)"));
        assert!(output.contains("- crm.default_app_secret = <unset> (source: default)"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be JSON")
}

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const MANAGED_KEYS: &[&str] = &[
    "VOXCRM_DATABASE_URL",
    "VOXCRM_CRM_STATIC_ACCESS_TOKEN",
    "VOXCRM_CRM_STATIC_INSTANCE_URL",
    "VOXCRM_CRM_USERNAME",
    "VOXCRM_CRM_PASSWORD",
];

fn with_env(vars: &[(&str, &str)], test: impl FnOnce()) {
    let lock = ENV_LOCK.get_or_init(|| Mutex::new(()));
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    for key in MANAGED_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(test));

    for key in MANAGED_KEYS {
        env::remove_var(key);
    }

    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }
}
