pub mod config;
pub mod credential;
pub mod errors;
pub mod instance;
pub mod intent;

pub use credential::{TenantCredential, TenantOAuthApp, LEGACY_SHARED_CALLER};
pub use errors::AssistError;
pub use instance::{lookup_forms, normalize_instance_url};
pub use intent::{CannedReport, Intent, RoutingDecision};
