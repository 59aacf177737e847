//! Schema description handed to the interpreter.
//!
//! Assembled once per tenant and immutable afterward, so one tenant's
//! custom-object descriptions can never leak into another tenant's prompt.

const BASE_SCHEMA: &str = "\
You translate CRM requests into a single JSON object with an `action` field.
Actions: search, query, create, update, log_call, clarify.
Fields: objectType, searchTerm, soql, recordId, fields (object), subject,
notes, relatedRecordId, prompt, response.
Standard objects: Account, Contact, Lead, Opportunity, Task, Case.
When a query should be scoped to the speaker, use the placeholder
{{CURRENT_USER_ID}} in the SOQL.
If the request is ambiguous, return {\"action\": \"clarify\", \"prompt\": ...}.";

/// A tenant's complete schema prompt: the shared base plus that tenant's
/// own custom-object descriptions.
#[derive(Clone, Debug)]
pub struct SchemaGuide {
    text: String,
}

impl SchemaGuide {
    pub fn for_tenant(custom_objects: &[String]) -> Self {
        let mut text = BASE_SCHEMA.to_string();
        for description in custom_objects {
            let description = description.trim();
            if !description.is_empty() {
                text.push_str("\nCustom object: ");
                text.push_str(description);
            }
        }
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Default for SchemaGuide {
    fn default() -> Self {
        Self::for_tenant(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::SchemaGuide;

    #[test]
    fn tenant_customizations_are_appended_per_guide() {
        let plain = SchemaGuide::default();
        let custom = SchemaGuide::for_tenant(&["Invoice__c: billing records".to_string()]);

        assert!(!plain.text().contains("Invoice__c"));
        assert!(custom.text().contains("Custom object: Invoice__c: billing records"));
        // The base description is shared by both.
        assert!(custom.text().starts_with(plain.text()));
    }

    #[test]
    fn blank_customizations_are_ignored() {
        let guide = SchemaGuide::for_tenant(&["   ".to_string()]);
        assert_eq!(guide.text(), SchemaGuide::default().text());
    }
}
