//! Intent-to-operation routing and execution.
//!
//! `route` is pure: it reconciles the interpreter's structured guess with
//! keyword matches in the raw user text and picks exactly one operation.
//! `execute` runs that operation against the CRM and always comes back with
//! something speakable, whatever failed underneath.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use voxcrm_core::intent::{CannedReport, Intent, RoutingDecision, DEFAULT_CLARIFY_PROMPT};
use voxcrm_core::AssistError;
use voxcrm_crm::soql::substitute_current_user;
use voxcrm_crm::{CrmClient, ResolvedAuth};

use crate::format;

/// Hand-written queries behind the canned shortcuts. Each is scoped to the
/// speaker via the current-user placeholder, resolved at execution time.
const OPEN_OPPORTUNITIES_SOQL: &str = "SELECT Id, Name, Amount, StageName, CloseDate \
     FROM Opportunity WHERE OwnerId = {{CURRENT_USER_ID}} AND IsClosed = false \
     ORDER BY CloseDate ASC LIMIT 25";
const OPEN_TASKS_SOQL: &str = "SELECT Id, Subject, ActivityDate, Status \
     FROM Task WHERE OwnerId = {{CURRENT_USER_ID}} AND Status != 'Completed' \
     ORDER BY ActivityDate ASC LIMIT 25";
const OPEN_LEADS_SOQL: &str = "SELECT Id, Name, Company, Status, Phone \
     FROM Lead WHERE OwnerId = {{CURRENT_USER_ID}} AND IsConverted = false \
     ORDER BY CreatedDate DESC LIMIT 25";
const MY_ACCOUNTS_SOQL: &str = "SELECT Id, Name, Industry, Phone \
     FROM Account WHERE OwnerId = {{CURRENT_USER_ID}} ORDER BY Name ASC LIMIT 25";

fn canned_soql(report: CannedReport) -> &'static str {
    match report {
        CannedReport::OpenOpportunities => OPEN_OPPORTUNITIES_SOQL,
        CannedReport::OpenTasks => OPEN_TASKS_SOQL,
        CannedReport::OpenLeads => OPEN_LEADS_SOQL,
        CannedReport::MyAccounts => MY_ACCOUNTS_SOQL,
    }
}

/// The router's final answer: a sentence to speak plus, when a CRM
/// operation produced structured data, the raw payload for richer surfaces.
#[derive(Clone, Debug, PartialEq)]
pub struct SpokenReply {
    pub text: String,
    pub payload: Option<Value>,
}

impl SpokenReply {
    fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into(), payload: None }
    }
}

/// Canned shortcut triggered by a keyword in the raw user text. Keyword
/// matches are trusted over everything else, including interpreter-written
/// SOQL, because the user literally said the words.
fn keyword_shortcut(raw_text: &str) -> Option<CannedReport> {
    let text = raw_text.to_ascii_lowercase();
    if text.contains("pipeline") || text.contains("my opportunit") || text.contains("my deal") {
        Some(CannedReport::OpenOpportunities)
    } else if text.contains("my task") {
        Some(CannedReport::OpenTasks)
    } else if text.contains("my lead") {
        Some(CannedReport::OpenLeads)
    } else if text.contains("my account") {
        Some(CannedReport::MyAccounts)
    } else {
        None
    }
}

/// Canned shortcut for an interpreter object-type guess. Only consulted
/// when the interpreter produced no SOQL of its own: a free-form query
/// tagged "lead" (say, a phone-number lookup) must not be hijacked into
/// the open-leads listing.
fn object_type_shortcut(object_type: Option<&str>) -> Option<CannedReport> {
    let object_type = object_type?.to_ascii_lowercase();
    match object_type.as_str() {
        "opportunity" | "deal" => Some(CannedReport::OpenOpportunities),
        "task" => Some(CannedReport::OpenTasks),
        "lead" => Some(CannedReport::OpenLeads),
        "account" => Some(CannedReport::MyAccounts),
        _ => None,
    }
}

pub struct IntentRouter {
    client: CrmClient,
}

impl IntentRouter {
    pub fn new(client: CrmClient) -> Self {
        Self { client }
    }

    /// Map one intent plus the raw text it came from to one operation.
    pub fn route(intent: Intent, raw_text: &str) -> RoutingDecision {
        match intent {
            Intent::Query { object_type, soql, .. } => match soql.filter(|s| !s.trim().is_empty())
            {
                Some(soql) => match keyword_shortcut(raw_text) {
                    Some(report) => RoutingDecision::CannedReport(report),
                    None => RoutingDecision::RunSoql { soql },
                },
                None => {
                    let report = keyword_shortcut(raw_text)
                        .or_else(|| object_type_shortcut(object_type.as_deref()));
                    match report {
                        Some(report) => RoutingDecision::CannedReport(report),
                        None => RoutingDecision::Clarify {
                            prompt: "What would you like me to look up?".to_string(),
                        },
                    }
                }
            },
            Intent::Search { object_type, search_term, .. } => match keyword_shortcut(raw_text) {
                Some(report) => RoutingDecision::CannedReport(report),
                None => RoutingDecision::FreeTextSearch { object_type, term: search_term },
            },
            Intent::Create { object_type, mut fields, .. } => {
                let link_account_by_name = case_account_link(&object_type, &mut fields);
                RoutingDecision::CreateRecord { object_type, fields, link_account_by_name }
            }
            Intent::Update { object_type, record_id, fields, .. } => {
                RoutingDecision::UpdateRecord { object_type, record_id, fields }
            }
            Intent::LogCall { subject, notes, related_record_id, .. } => RoutingDecision::LogCall {
                subject: subject.unwrap_or_else(|| "Call".to_string()),
                notes,
                related_record_id,
            },
            Intent::Clarify { prompt } => RoutingDecision::Clarify { prompt },
        }
    }

    /// Execute one decision. Never returns an error: every failure is
    /// rendered into the reply text instead, and the caller can simply
    /// repeat the request.
    pub async fn execute(&self, auth: &ResolvedAuth, decision: RoutingDecision) -> SpokenReply {
        match self.try_execute(auth, decision).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(%error, "routed operation failed");
                SpokenReply::text_only(error.speakable())
            }
        }
    }

    async fn try_execute(
        &self,
        auth: &ResolvedAuth,
        decision: RoutingDecision,
    ) -> Result<SpokenReply, AssistError> {
        debug!(?decision, "executing routing decision");
        match decision {
            RoutingDecision::RunSoql { soql } => {
                let soql =
                    substitute_current_user(&soql, || self.client.identity(auth)).await?;
                let result = self.client.run_query(auth, &soql).await?;
                Ok(SpokenReply {
                    text: format::raw_query_reply(&result),
                    payload: Some(Value::Array(result.records)),
                })
            }
            RoutingDecision::CannedReport(report) => {
                let soql =
                    substitute_current_user(canned_soql(report), || self.client.identity(auth))
                        .await?;
                let result = self.client.run_query(auth, &soql).await?;
                Ok(SpokenReply {
                    text: format::canned_report_reply(report, &result),
                    payload: Some(Value::Array(result.records)),
                })
            }
            RoutingDecision::FreeTextSearch { object_type, term } => {
                let sosl = build_sosl(object_type.as_deref(), &term);
                let records = self.client.run_search(auth, &sosl).await?;
                Ok(SpokenReply {
                    text: format::search_reply(object_type.as_deref(), &term, &records),
                    payload: Some(Value::Array(records)),
                })
            }
            RoutingDecision::CreateRecord { object_type, mut fields, link_account_by_name } => {
                if let Some(account_name) = link_account_by_name {
                    if let Some(account_id) = self.find_account_id(auth, &account_name).await {
                        fields.insert("AccountId".to_string(), Value::String(account_id));
                    }
                }
                let created =
                    self.client.create_record(auth, &object_type, Value::Object(fields)).await?;
                let record_id = created.get("id").and_then(Value::as_str).map(str::to_string);
                Ok(SpokenReply {
                    text: format::create_reply(&object_type, record_id.as_deref()),
                    payload: Some(created),
                })
            }
            RoutingDecision::UpdateRecord { object_type, record_id, fields } => {
                self.client
                    .update_record(auth, &object_type, &record_id, Value::Object(fields))
                    .await?;
                Ok(SpokenReply::text_only(format::update_reply(&object_type, &record_id)))
            }
            RoutingDecision::LogCall { subject, notes, related_record_id } => {
                let mut fields = Map::new();
                fields.insert("Subject".to_string(), Value::String(subject.clone()));
                fields.insert("Status".to_string(), Value::String("Completed".to_string()));
                fields.insert("TaskSubtype".to_string(), Value::String("Call".to_string()));
                if let Some(notes) = notes {
                    fields.insert("Description".to_string(), Value::String(notes));
                }
                if let Some(related_record_id) = related_record_id {
                    fields.insert("WhatId".to_string(), Value::String(related_record_id));
                }
                self.client.create_record(auth, "Task", Value::Object(fields)).await?;
                Ok(SpokenReply::text_only(format::log_call_reply(&subject)))
            }
            RoutingDecision::Clarify { prompt } => {
                let prompt =
                    if prompt.trim().is_empty() { DEFAULT_CLARIFY_PROMPT.to_string() } else { prompt };
                Ok(SpokenReply::text_only(prompt))
            }
        }
    }

    /// Best-effort account lookup by name for the case create recipe; a
    /// miss or a failure just means the case goes in without a link.
    async fn find_account_id(&self, auth: &ResolvedAuth, account_name: &str) -> Option<String> {
        let sosl = format!(
            "FIND {{{}}} IN NAME FIELDS RETURNING Account(Id, Name) LIMIT 1",
            sanitize_sosl_term(account_name)
        );
        match self.client.run_search(auth, &sosl).await {
            Ok(records) => records
                .first()
                .and_then(|record| record.get("Id"))
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(error) => {
                debug!(%error, account_name, "account link lookup failed, creating without link");
                None
            }
        }
    }
}

/// Cases with no explicit account link get a best-effort search-and-link by
/// account name before the create. The name hint travels out-of-band, not
/// as a CRM field.
fn case_account_link(object_type: &str, fields: &mut Map<String, Value>) -> Option<String> {
    if !object_type.eq_ignore_ascii_case("case") || fields.contains_key("AccountId") {
        return None;
    }
    match fields.remove("AccountName") {
        Some(Value::String(name)) if !name.trim().is_empty() => Some(name),
        _ => None,
    }
}

fn build_sosl(object_type: Option<&str>, term: &str) -> String {
    let term = sanitize_sosl_term(term);
    match object_type.map(sanitize_object_name).filter(|name| !name.is_empty()) {
        Some(object_type) => {
            format!("FIND {{{term}}} IN ALL FIELDS RETURNING {object_type}(Id, Name) LIMIT 10")
        }
        None => format!("FIND {{{term}}} IN ALL FIELDS LIMIT 10"),
    }
}

/// Braces delimit the search term in SOSL; strip them from user input so
/// the term cannot break out of its delimiters.
fn sanitize_sosl_term(term: &str) -> String {
    term.chars().filter(|c| *c != '{' && *c != '}').collect()
}

/// Object names land outside the brace-delimited term, in the RETURNING
/// clause. Interpreters occasionally emit punctuation there; keep only
/// identifier characters so the clause stays a single object reference.
fn sanitize_object_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
}
