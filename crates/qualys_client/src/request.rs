//! XML bodies for the QPS search endpoints.

use quick_xml::escape::escape;
use std::fmt::Write;

/// Comparison applied by a search criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    /// Exact match
    Equals,
    /// Substring match
    Contains,
    /// Strictly greater (dates, ids)
    Greater,
    /// Strictly less (dates, ids)
    Less,
    /// Value is one of a comma separated list
    In,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Criteria {
    field: String,
    operator: Operator,
    value: String,
}

/// A `<ServiceRequest>` document for QPS search calls.
///
/// # Example
///
/// ```
/// use qualys_client::{Operator, ServiceRequest};
///
/// let xml = ServiceRequest::new()
///     .criteria("webApp.id", Operator::In, "1,2")
///     .limit_results(50)
///     .to_xml();
/// assert!(xml.contains(r#"<Criteria field="webApp.id" operator="IN">1,2</Criteria>"#));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRequest {
    criteria: Vec<Criteria>,
    limit_results: Option<u32>,
    start_from_offset: Option<u64>,
    start_from_id: Option<u64>,
}

impl ServiceRequest {
    /// Empty request: no filters, server default paging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter criterion.
    pub fn criteria(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        self.criteria.push(Criteria {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Maximum records per page.
    pub fn limit_results(mut self, limit: u32) -> Self {
        self.limit_results = Some(limit);
        self
    }

    /// One-based offset of the first record (offset paging).
    pub fn start_from_offset(mut self, offset: u64) -> Self {
        self.start_from_offset = Some(offset);
        self
    }

    /// Smallest record id to return (id paging).
    pub fn start_from_id(mut self, id: u64) -> Self {
        self.start_from_id = Some(id);
        self
    }

    /// Render the document. Values and field names are escaped.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<ServiceRequest>");

        if !self.criteria.is_empty() {
            xml.push_str("<filters>");
            for c in &self.criteria {
                let _ = write!(
                    xml,
                    r#"<Criteria field="{}" operator="{}">{}</Criteria>"#,
                    escape(c.field.as_str()),
                    c.operator,
                    escape(c.value.as_str())
                );
            }
            xml.push_str("</filters>");
        }

        let has_preferences = self.limit_results.is_some()
            || self.start_from_offset.is_some()
            || self.start_from_id.is_some();
        if has_preferences {
            xml.push_str("<preferences>");
            if let Some(limit) = self.limit_results {
                let _ = write!(xml, "<limitResults>{}</limitResults>", limit);
            }
            if let Some(offset) = self.start_from_offset {
                let _ = write!(xml, "<startFromOffset>{}</startFromOffset>", offset);
            }
            if let Some(id) = self.start_from_id {
                let _ = write!(xml, "<startFromId>{}</startFromId>", id);
            }
            xml.push_str("</preferences>");
        }

        xml.push_str("</ServiceRequest>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request() {
        assert_eq!(ServiceRequest::new().to_xml(), "<ServiceRequest></ServiceRequest>");
    }

    #[test]
    fn test_values_are_escaped() {
        let xml = ServiceRequest::new()
            .criteria("name", Operator::Contains, "<R&D>")
            .to_xml();
        assert!(xml.contains("&lt;R&amp;D&gt;"));
        assert!(!xml.contains("<R&D>"));
    }

    #[test]
    fn test_preferences_rendered_in_order() {
        let xml = ServiceRequest::new()
            .criteria("lastVulnScan", Operator::Greater, "2024-01-01T00:00:00Z")
            .limit_results(100)
            .start_from_id(42)
            .to_xml();
        assert_eq!(
            xml,
            "<ServiceRequest><filters>\
             <Criteria field=\"lastVulnScan\" operator=\"GREATER\">2024-01-01T00:00:00Z</Criteria>\
             </filters><preferences><limitResults>100</limitResults>\
             <startFromId>42</startFromId></preferences></ServiceRequest>"
        );
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(Operator::In.to_string(), "IN");
        assert_eq!(Operator::Greater.to_string(), "GREATER");
        assert_eq!("EQUALS".parse::<Operator>().unwrap(), Operator::Equals);
    }
}
