//! Turning CRM results into short, speakable sentences.
//!
//! Everything here must read well over voice: no record dumps, no raw JSON,
//! dollar amounts with thousands separators and no cents.

use serde_json::Value;

use voxcrm_core::intent::CannedReport;
use voxcrm_crm::QueryResult;

/// `$1,234,568` — whole dollars, thousands-separated.
pub fn format_dollars(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}${}", thousands(rounded.unsigned_abs()))
}

fn thousands(mut value: u64) -> String {
    let mut groups = Vec::new();
    loop {
        let group = value % 1000;
        value /= 1000;
        if value == 0 {
            groups.push(group.to_string());
            break;
        }
        groups.push(format!("{group:03}"));
    }
    groups.reverse();
    groups.join(",")
}

fn field_str<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn field_f64(record: &Value, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

/// A short human label for one record: its Name, Subject, or as a last
/// resort its Id.
fn record_label(record: &Value) -> String {
    field_str(record, "Name")
        .or_else(|| field_str(record, "Subject"))
        .or_else(|| field_str(record, "Id"))
        .unwrap_or("an unnamed record")
        .to_string()
}

pub fn canned_report_reply(report: CannedReport, result: &QueryResult) -> String {
    match report {
        CannedReport::OpenOpportunities => opportunity_report(&result.records),
        CannedReport::OpenTasks => task_report(&result.records),
        CannedReport::OpenLeads => simple_listing("open leads", &result.records),
        CannedReport::MyAccounts => simple_listing("accounts", &result.records),
    }
}

/// Pipeline summary: total dollar value first, then each deal with amount
/// and stage.
fn opportunity_report(records: &[Value]) -> String {
    if records.is_empty() {
        return "You have no open opportunities right now.".to_string();
    }

    let total: f64 = records.iter().filter_map(|record| field_f64(record, "Amount")).sum();
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        let name = record_label(record);
        let stage = field_str(record, "StageName").unwrap_or("unknown stage");
        match field_f64(record, "Amount") {
            Some(amount) => {
                lines.push(format!("{name} ({}, {stage})", format_dollars(amount)))
            }
            None => lines.push(format!("{name} ({stage})")),
        }
    }

    format!(
        "You have {} open {} totaling {}: {}.",
        records.len(),
        pluralize(records.len(), "opportunity", "opportunities"),
        format_dollars(total),
        lines.join("; ")
    )
}

fn task_report(records: &[Value]) -> String {
    if records.is_empty() {
        return "You have no open tasks right now.".to_string();
    }
    let lines: Vec<String> = records
        .iter()
        .map(|record| {
            let subject = record_label(record);
            match field_str(record, "ActivityDate") {
                Some(due) => format!("{subject} (due {due})"),
                None => subject,
            }
        })
        .collect();
    format!(
        "You have {} open {}: {}.",
        records.len(),
        pluralize(records.len(), "task", "tasks"),
        lines.join("; ")
    )
}

fn simple_listing(what: &str, records: &[Value]) -> String {
    if records.is_empty() {
        return format!("You have no {what} right now.");
    }
    let names: Vec<String> = records.iter().map(record_label).collect();
    format!("You have {} {what}: {}.", records.len(), names.join(", "))
}

/// Reply for an interpreter-written query. Most results are a plain
/// listing; records carrying a lead lookup relationship get the explicit
/// "lead found" / "no lead linked" phrasing so phone-number lookups answer
/// the question that was actually asked.
pub fn raw_query_reply(result: &QueryResult) -> String {
    if result.records.is_empty() {
        return "I couldn't find anything matching that.".to_string();
    }

    let mut lines = Vec::with_capacity(result.records.len());
    for record in &result.records {
        let label = record_label(record);
        match lead_link_sentence(record) {
            Some(sentence) => lines.push(format!("{label}: {sentence}")),
            None => lines.push(label),
        }
    }
    format!(
        "I found {} {}: {}.",
        result.records.len(),
        pluralize(result.records.len(), "record", "records"),
        lines.join("; ")
    )
}

/// Inspect a queried lead lookup relationship. A selected-but-null
/// relationship comes back as an explicit JSON null under the lookup key;
/// a populated one is a nested object with its own Name.
fn lead_link_sentence(record: &Value) -> Option<String> {
    let object = record.as_object()?;
    for key in ["Lead__r", "Lead"] {
        match object.get(key) {
            Some(Value::Null) => return Some("no lead linked".to_string()),
            Some(Value::Object(nested)) => {
                let name = nested.get("Name").and_then(Value::as_str).unwrap_or("an unnamed lead");
                return Some(format!("lead found: {name}"));
            }
            _ => {}
        }
    }
    None
}

pub fn search_reply(object_type: Option<&str>, term: &str, records: &[Value]) -> String {
    let what = object_type.map(str::to_string).unwrap_or_else(|| "record".to_string());
    if records.is_empty() {
        return format!("I couldn't find any {what} matching \"{term}\".");
    }
    let names: Vec<String> = records.iter().map(record_label).collect();
    format!(
        "I found {} {} matching \"{term}\": {}.",
        records.len(),
        pluralize(records.len(), "match", "matches"),
        names.join(", ")
    )
}

pub fn create_reply(object_type: &str, record_id: Option<&str>) -> String {
    match record_id {
        Some(id) => format!("Done — I created a new {object_type} ({id})."),
        None => format!("Done — I created a new {object_type}."),
    }
}

pub fn update_reply(object_type: &str, record_id: &str) -> String {
    format!("Done — I updated {object_type} {record_id}.")
}

pub fn log_call_reply(subject: &str) -> String {
    format!("Logged the call \"{subject}\".")
}

fn pluralize<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use voxcrm_crm::QueryResult;

    use super::{format_dollars, opportunity_report, raw_query_reply};

    #[test]
    fn dollars_get_thousands_separators() {
        assert_eq!(format_dollars(0.0), "$0");
        assert_eq!(format_dollars(950.0), "$950");
        assert_eq!(format_dollars(50_000.0), "$50,000");
        assert_eq!(format_dollars(1_234_567.49), "$1,234,567");
        assert_eq!(format_dollars(-2_500.0), "-$2,500");
    }

    #[test]
    fn pipeline_summary_totals_and_names_stages() {
        let records = vec![
            json!({"Name": "Acme Renewal", "Amount": 50000.0, "StageName": "Negotiation"}),
            json!({"Name": "Globex Expansion", "Amount": 120000.0, "StageName": "Proposal"}),
        ];
        let reply = opportunity_report(&records);
        assert!(reply.contains("2 open opportunities"));
        assert!(reply.contains("$170,000"));
        assert!(reply.contains("Acme Renewal ($50,000, Negotiation)"));
        assert!(reply.contains("Globex Expansion ($120,000, Proposal)"));
    }

    #[test]
    fn missing_amounts_are_skipped_not_zeroed_in_lines() {
        let records = vec![json!({"Name": "Mystery Deal", "StageName": "Prospecting"})];
        let reply = opportunity_report(&records);
        assert!(reply.contains("Mystery Deal (Prospecting)"));
        assert!(reply.contains("totaling $0"));
    }

    #[test]
    fn null_lead_relationship_reads_as_not_linked() {
        let result = QueryResult {
            total_size: 1,
            done: true,
            records: vec![json!({"Name": "Call from 818-558-1911", "Lead__r": null})],
        };
        let reply = raw_query_reply(&result);
        assert!(reply.contains("no lead linked"));
    }

    #[test]
    fn populated_lead_relationship_names_the_lead() {
        let result = QueryResult {
            total_size: 1,
            done: true,
            records: vec![
                json!({"Name": "Call from 818-558-1911", "Lead__r": {"Name": "Dana Scully"}}),
            ],
        };
        let reply = raw_query_reply(&result);
        assert!(reply.contains("lead found: Dana Scully"));
    }

    #[test]
    fn empty_raw_query_says_nothing_found() {
        let result = QueryResult { total_size: 0, done: true, records: vec![] };
        assert_eq!(raw_query_reply(&result), "I couldn't find anything matching that.");
    }
}
