//! Current-user placeholder substitution for SOQL strings.
//!
//! Interpreter output and canned reports refer to "whoever is speaking" via
//! a placeholder. Every spelling the interpreter has been observed to emit
//! is accepted, and the identity lookup behind the substitution runs at
//! most once per query no matter how many placeholders appear.

use std::future::Future;
use std::sync::OnceLock;

use regex::{NoExpand, Regex};

use voxcrm_core::AssistError;

/// Accepted spellings: `{{CURRENT_USER_ID}}`, `{CURRENT_USER_ID}`,
/// `$CURRENT_USER_ID`, bare `CURRENT_USER_ID` / `CURRENT_USER` (any case,
/// with or without the underscore before "id").
fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\{\{\s*current_user(?:_?id)?\s*\}\}|\{\s*current_user(?:_?id)?\s*\}|\$current_user(?:_?id)?\b|\bcurrent_user(?:_?id)?\b",
        )
        .expect("placeholder pattern is valid")
    })
}

/// Replace every current-user placeholder in `soql` with the caller's CRM
/// user id, quoted as a SOQL string literal. `resolve_self` is only awaited
/// when at least one placeholder is present, and only once.
pub async fn substitute_current_user<F, Fut>(
    soql: &str,
    resolve_self: F,
) -> Result<String, AssistError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, AssistError>>,
{
    let pattern = placeholder();
    if !pattern.is_match(soql) {
        return Ok(soql.to_string());
    }

    let user_id = resolve_self().await?;
    let literal = format!("'{}'", user_id.replace('\'', "\\'"));
    Ok(pattern.replace_all(soql, NoExpand(&literal)).into_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use voxcrm_core::AssistError;

    use super::substitute_current_user;

    async fn substitute(soql: &str) -> String {
        substitute_current_user(soql, || async { Ok("005xx000001X8zA".to_string()) })
            .await
            .expect("substitution")
    }

    #[tokio::test]
    async fn replaces_double_brace_form() {
        let out = substitute("SELECT Id FROM Task WHERE OwnerId = {{CURRENT_USER_ID}}").await;
        assert_eq!(out, "SELECT Id FROM Task WHERE OwnerId = '005xx000001X8zA'");
    }

    #[tokio::test]
    async fn replaces_single_brace_dollar_and_bare_forms() {
        for soql in [
            "WHERE OwnerId = {CURRENT_USER_ID}",
            "WHERE OwnerId = $CURRENT_USER_ID",
            "WHERE OwnerId = CURRENT_USER_ID",
            "WHERE OwnerId = current_userid",
            "WHERE OwnerId = {{ current_user }}",
        ] {
            let out = substitute(soql).await;
            assert_eq!(out, "WHERE OwnerId = '005xx000001X8zA'", "input: {soql}");
        }
    }

    #[tokio::test]
    async fn multiple_placeholders_cost_one_identity_lookup() {
        let lookups = AtomicUsize::new(0);
        let out = substitute_current_user(
            "SELECT Id FROM Opportunity WHERE OwnerId = {{CURRENT_USER_ID}} AND CreatedById = $CURRENT_USER_ID",
            || async {
                lookups.fetch_add(1, Ordering::SeqCst);
                Ok("005abc".to_string())
            },
        )
        .await
        .expect("substitution");

        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(
            out,
            "SELECT Id FROM Opportunity WHERE OwnerId = '005abc' AND CreatedById = '005abc'"
        );
    }

    #[tokio::test]
    async fn no_placeholder_means_no_lookup() {
        let lookups = AtomicUsize::new(0);
        let out = substitute_current_user("SELECT Id FROM Account LIMIT 5", || async {
            lookups.fetch_add(1, Ordering::SeqCst);
            Ok("005abc".to_string())
        })
        .await
        .expect("substitution");

        assert_eq!(lookups.load(Ordering::SeqCst), 0);
        assert_eq!(out, "SELECT Id FROM Account LIMIT 5");
    }

    #[tokio::test]
    async fn lookup_failure_propagates() {
        let result = substitute_current_user("WHERE OwnerId = {{CURRENT_USER_ID}}", || async {
            Err(AssistError::NotConnected)
        })
        .await;
        assert!(matches!(result, Err(AssistError::NotConnected)));
    }

    #[tokio::test]
    async fn does_not_touch_unrelated_identifiers() {
        let out = substitute("SELECT CurrentUserLicense FROM Foo").await;
        assert_eq!(out, "SELECT CurrentUserLicense FROM Foo");
    }
}
