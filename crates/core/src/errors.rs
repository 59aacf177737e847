use thiserror::Error;

/// Failure taxonomy for the credential lifecycle and intent routing path.
///
/// Everything here is caught at the router boundary and converted into a
/// user-facing sentence via [`AssistError::speakable`]; nothing below that
/// boundary is allowed to terminate a request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssistError {
    #[error("no CRM credential is connected for this caller")]
    NotConnected,
    #[error("token refresh failed permanently: {reason}")]
    RefreshUnrecoverable { reason: String },
    #[error("token refresh failed transiently: {reason}")]
    RefreshTransient { reason: String },
    #[error("CRM API call failed with status {status}: {body}")]
    CrmApi { status: u16, body: String },
    #[error("interpreter output could not be parsed: {reason}")]
    InterpreterParse { reason: String },
    #[error("could not find {what}")]
    NotFound { what: String },
    #[error("credential store failure: {0}")]
    Store(String),
}

impl AssistError {
    /// Mark a refresh body failure with the right recoverability class.
    ///
    /// Provider error text indicating a dead refresh token (expired grant,
    /// removed connected app) can never succeed again without full
    /// re-authentication; anything else is worth retrying later.
    pub fn classify_refresh(body: impl Into<String>) -> Self {
        let reason = body.into();
        if is_unrecoverable_refresh(&reason) {
            Self::RefreshUnrecoverable { reason }
        } else {
            Self::RefreshTransient { reason }
        }
    }

    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::RefreshUnrecoverable { .. })
    }

    /// A complete, speakable sentence for the human caller.
    pub fn speakable(&self) -> String {
        match self {
            Self::NotConnected => {
                "You haven't connected a CRM account yet. Please connect one and try again."
                    .to_string()
            }
            Self::RefreshUnrecoverable { .. } => {
                "Your CRM session has expired. Please reconnect your account.".to_string()
            }
            Self::RefreshTransient { reason } => {
                format!("I couldn't reach your CRM to renew the session ({reason}). Please try again in a moment.")
            }
            Self::CrmApi { status, body } => {
                format!("Sorry, the CRM request failed ({status}): {body}")
            }
            Self::InterpreterParse { .. } => {
                "Sorry, I didn't catch that. Could you rephrase your request?".to_string()
            }
            Self::NotFound { what } => format!("I couldn't find {what}."),
            Self::Store(reason) => {
                format!("Sorry, something went wrong on my side ({reason}). Please try again.")
            }
        }
    }
}

const UNRECOVERABLE_MARKERS: &[&str] =
    &["app not found", "invalid_grant", "invalid grant", "expired", "no oauth credentials available"];

fn is_unrecoverable_refresh(body: &str) -> bool {
    let normalized = body.to_ascii_lowercase();
    UNRECOVERABLE_MARKERS.iter().any(|marker| normalized.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::AssistError;

    #[test]
    fn invalid_grant_classifies_as_unrecoverable() {
        let error = AssistError::classify_refresh(
            r#"{"error":"invalid_grant","error_description":"expired access/refresh token"}"#,
        );
        assert!(error.is_unrecoverable());
    }

    #[test]
    fn app_not_found_classifies_as_unrecoverable_case_insensitively() {
        let error = AssistError::classify_refresh("OAuth App Not Found for this org");
        assert!(error.is_unrecoverable());
    }

    #[test]
    fn network_style_failures_classify_as_transient() {
        let error = AssistError::classify_refresh("connection reset by peer");
        assert!(matches!(error, AssistError::RefreshTransient { .. }));
    }

    #[test]
    fn expired_session_speaks_reconnect_guidance() {
        let error = AssistError::classify_refresh("Session expired or invalid");
        assert_eq!(
            error.speakable(),
            "Your CRM session has expired. Please reconnect your account."
        );
    }

    #[test]
    fn crm_api_error_keeps_body_text_for_classification() {
        let error = AssistError::CrmApi { status: 400, body: "INVALID_FIELD: No such column".to_string() };
        assert!(error.speakable().contains("INVALID_FIELD"));
        assert!(error.to_string().contains("400"));
    }

    #[test]
    fn not_found_reads_conversationally() {
        let error = AssistError::NotFound { what: "an account called Initech".to_string() };
        assert_eq!(error.speakable(), "I couldn't find an account called Initech.");
    }
}
