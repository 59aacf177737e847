use serde_json::{Map, Value};

/// Default re-ask prompt used whenever interpreter output cannot be turned
/// into a well-formed intent.
pub const DEFAULT_CLARIFY_PROMPT: &str =
    "Sorry, I didn't catch that. Could you rephrase your request?";

/// A structured intent produced by the natural-language interpreter.
///
/// Closed sum type over the interpreter's `action` discriminant so a new
/// action kind is a compile-time-checked change, not a silently ignored
/// default branch. Ephemeral: consumed once per request, never persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    Search { object_type: Option<String>, search_term: String, response: Option<String> },
    Query { object_type: Option<String>, soql: Option<String>, response: Option<String> },
    Create { object_type: String, fields: Map<String, Value>, response: Option<String> },
    Update {
        object_type: String,
        record_id: String,
        fields: Map<String, Value>,
        response: Option<String>,
    },
    LogCall {
        subject: Option<String>,
        notes: Option<String>,
        related_record_id: Option<String>,
        response: Option<String>,
    },
    Clarify { prompt: String },
}

impl Intent {
    pub fn clarify(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let prompt = if prompt.trim().is_empty() {
            DEFAULT_CLARIFY_PROMPT.to_string()
        } else {
            prompt
        };
        Self::Clarify { prompt }
    }

    /// Total parse of raw interpreter output. Malformed JSON, an unknown
    /// action, or missing required fields all degrade to [`Intent::Clarify`]
    /// rather than propagating a parse failure.
    pub fn from_interpreter_json(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return Self::clarify(DEFAULT_CLARIFY_PROMPT);
        };
        Self::from_interpreter_value(&value)
    }

    pub fn from_interpreter_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::clarify(DEFAULT_CLARIFY_PROMPT);
        };

        let action = string_field(object, "action").unwrap_or_default().to_ascii_lowercase();
        let object_type = string_field(object, "objectType");
        let response = string_field(object, "response");

        match action.as_str() {
            "search" => match string_field(object, "searchTerm") {
                Some(search_term) => Self::Search { object_type, search_term, response },
                None => Self::clarify("What would you like me to search for?"),
            },
            "query" => Self::Query { object_type, soql: string_field(object, "soql"), response },
            "create" => match object_type {
                Some(object_type) => {
                    Self::Create { object_type, fields: map_field(object, "fields"), response }
                }
                None => Self::clarify("What kind of record should I create?"),
            },
            "update" => match (object_type, string_field(object, "recordId")) {
                (Some(object_type), Some(record_id)) => Self::Update {
                    object_type,
                    record_id,
                    fields: map_field(object, "fields"),
                    response,
                },
                _ => Self::clarify("Which record should I update?"),
            },
            "log_call" => Self::LogCall {
                subject: string_field(object, "subject"),
                notes: string_field(object, "notes"),
                related_record_id: string_field(object, "recordId"),
                response,
            },
            "clarify" => {
                let prompt = string_field(object, "clarification")
                    .or(response)
                    .unwrap_or_else(|| DEFAULT_CLARIFY_PROMPT.to_string());
                Self::clarify(prompt)
            }
            _ => Self::clarify(DEFAULT_CLARIFY_PROMPT),
        }
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(value)) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    }
}

fn map_field(object: &Map<String, Value>, key: &str) -> Map<String, Value> {
    object.get(key).and_then(Value::as_object).cloned().unwrap_or_default()
}

/// A hand-written query used instead of interpreter-generated SOQL for the
/// most common "my records" requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CannedReport {
    OpenOpportunities,
    OpenTasks,
    OpenLeads,
    MyAccounts,
}

/// The resolved operation plus the concrete parameters to execute it.
/// Derived per request, never stored.
#[derive(Clone, Debug, PartialEq)]
pub enum RoutingDecision {
    RunSoql { soql: String },
    CannedReport(CannedReport),
    FreeTextSearch { object_type: Option<String>, term: String },
    CreateRecord {
        object_type: String,
        fields: Map<String, Value>,
        link_account_by_name: Option<String>,
    },
    UpdateRecord { object_type: String, record_id: String, fields: Map<String, Value> },
    LogCall { subject: String, notes: Option<String>, related_record_id: Option<String> },
    Clarify { prompt: String },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Intent, DEFAULT_CLARIFY_PROMPT};

    #[test]
    fn parses_query_intent_with_soql() {
        let raw = json!({
            "action": "query",
            "objectType": "Lead",
            "soql": "SELECT Id, Name FROM Lead WHERE Phone = '818-558-1911'",
        })
        .to_string();

        let intent = Intent::from_interpreter_json(&raw);
        assert!(matches!(
            intent,
            Intent::Query { ref object_type, ref soql, .. }
                if object_type.as_deref() == Some("Lead")
                    && soql.as_deref().map(|s| s.contains("818-558-1911")).unwrap_or(false)
        ));
    }

    #[test]
    fn parses_create_intent_with_field_map() {
        let raw = json!({
            "action": "create",
            "objectType": "Case",
            "fields": { "Subject": "Printer on fire", "Priority": "High" },
        })
        .to_string();

        let intent = Intent::from_interpreter_json(&raw);
        let Intent::Create { object_type, fields, .. } = intent else {
            panic!("expected create intent");
        };
        assert_eq!(object_type, "Case");
        assert_eq!(fields.get("Priority").and_then(|v| v.as_str()), Some("High"));
    }

    #[test]
    fn malformed_json_degrades_to_clarify() {
        let intent = Intent::from_interpreter_json("I am not JSON {");
        assert_eq!(intent, Intent::Clarify { prompt: DEFAULT_CLARIFY_PROMPT.to_string() });
    }

    #[test]
    fn unknown_action_degrades_to_clarify() {
        let raw = json!({ "action": "teleport", "objectType": "Lead" }).to_string();
        assert!(matches!(Intent::from_interpreter_json(&raw), Intent::Clarify { .. }));
    }

    #[test]
    fn create_without_object_type_asks_for_clarification() {
        let raw = json!({ "action": "create", "fields": { "Subject": "Hello" } }).to_string();
        let intent = Intent::from_interpreter_json(&raw);
        assert!(matches!(
            intent,
            Intent::Clarify { ref prompt } if prompt.contains("What kind of record")
        ));
    }

    #[test]
    fn clarify_uses_interpreter_text_when_present() {
        let raw = json!({
            "action": "clarify",
            "clarification": "Did you mean the Acme account or the Acme lead?",
        })
        .to_string();

        let intent = Intent::from_interpreter_json(&raw);
        assert_eq!(
            intent,
            Intent::Clarify { prompt: "Did you mean the Acme account or the Acme lead?".to_string() }
        );
    }

    #[test]
    fn numeric_record_id_is_tolerated() {
        let raw = json!({
            "action": "update",
            "objectType": "Opportunity",
            "recordId": 12345,
            "fields": { "StageName": "Closed Won" },
        })
        .to_string();

        let intent = Intent::from_interpreter_json(&raw);
        assert!(matches!(
            intent,
            Intent::Update { ref record_id, .. } if record_id == "12345"
        ));
    }
}
