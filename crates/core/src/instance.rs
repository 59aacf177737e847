//! Instance URL normalization.
//!
//! A CRM tenant can be addressed by two equivalent host forms: the
//! human-facing login domain (`acme.lightning.force.com`) and the canonical
//! API domain (`acme.my.salesforce.com`). Credential and OAuth-app lookups
//! normalize to the API form first, and fall back to the original spelling
//! for rows stored before normalization existed.

const LOGIN_DOMAIN_SUFFIX: &str = ".lightning.force.com";
const API_DOMAIN_SUFFIX: &str = ".my.salesforce.com";

/// Canonical form of an instance URL: lowercase, no trailing slash, and the
/// login-domain suffix mapped to the API-domain suffix.
pub fn normalize_instance_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/').to_ascii_lowercase();
    match trimmed.strip_suffix(LOGIN_DOMAIN_SUFFIX) {
        Some(prefix) => format!("{prefix}{API_DOMAIN_SUFFIX}"),
        None => trimmed,
    }
}

/// Lookup key candidates in priority order: the normalized form, then the
/// original form when it differs.
pub fn lookup_forms(url: &str) -> Vec<String> {
    let original = url.trim().trim_end_matches('/').to_ascii_lowercase();
    let normalized = normalize_instance_url(url);
    if normalized == original {
        vec![normalized]
    } else {
        vec![normalized, original]
    }
}

#[cfg(test)]
mod tests {
    use super::{lookup_forms, normalize_instance_url};

    #[test]
    fn login_domain_maps_to_api_domain() {
        assert_eq!(
            normalize_instance_url("https://acme.lightning.force.com"),
            "https://acme.my.salesforce.com"
        );
    }

    #[test]
    fn api_domain_is_already_canonical() {
        assert_eq!(
            normalize_instance_url("https://acme.my.salesforce.com/"),
            "https://acme.my.salesforce.com"
        );
    }

    #[test]
    fn normalization_lowercases_and_strips_trailing_slash() {
        assert_eq!(
            normalize_instance_url("https://Acme.My.Salesforce.com/"),
            "https://acme.my.salesforce.com"
        );
    }

    #[test]
    fn lookup_tries_normalized_form_first_then_original() {
        let forms = lookup_forms("https://acme.lightning.force.com");
        assert_eq!(
            forms,
            vec![
                "https://acme.my.salesforce.com".to_string(),
                "https://acme.lightning.force.com".to_string(),
            ]
        );
    }

    #[test]
    fn lookup_deduplicates_when_already_canonical() {
        let forms = lookup_forms("https://acme.my.salesforce.com");
        assert_eq!(forms, vec!["https://acme.my.salesforce.com".to_string()]);
    }
}
