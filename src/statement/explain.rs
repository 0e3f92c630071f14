//! Explain output for prepared statements
//!
//! Produces deterministic, human-readable descriptions of what a statement
//! will send to the executor, or why it was rejected.

use std::fmt;

use crate::errors::StatementError;
use crate::views::AggregatePlan;

use super::statement::PreparedQuery;

/// Explain output
#[derive(Debug, Clone, PartialEq)]
pub struct StatementExplain {
    /// Whether preparation succeeded
    pub accepted: bool,
    /// selector, procedure or aggregate
    pub mode: Option<String>,
    /// Procedure name or view names
    pub target: Option<String>,
    /// Selector document or procedure arguments as JSON
    pub payload: Option<String>,
    pub limit: Option<u64>,
    pub rejection_reason: Option<String>,
    pub rejection_code: Option<String>,
}

impl StatementExplain {
    /// Describes a successfully prepared statement
    pub fn from_prepared(prepared: &PreparedQuery) -> Self {
        let (target, payload, limit) = match prepared {
            PreparedQuery::Selector(doc) => (None, Some(doc.to_json().to_string()), doc.limit),
            PreparedQuery::Procedure(stmt) => (
                Some(stmt.procedure.as_str().to_string()),
                Some(serde_json::Value::Array(stmt.args.clone()).to_string()),
                None,
            ),
            PreparedQuery::Aggregate(plan) => {
                let views: Vec<String> = plan
                    .descriptors()
                    .iter()
                    .map(|d| format!("{}/{}", d.design_document, d.view_name))
                    .collect();
                let detail = match plan {
                    AggregatePlan::Average { attribute, .. } => format!("avg({})", attribute),
                    other => other.requested_kind().as_str().to_string(),
                };
                (Some(views.join(", ")), Some(detail), None)
            }
        };

        Self {
            accepted: true,
            mode: Some(prepared.mode().to_string()),
            target,
            payload,
            limit,
            rejection_reason: None,
            rejection_code: None,
        }
    }

    /// Describes a rejected statement
    pub fn from_error(err: &StatementError) -> Self {
        Self {
            accepted: false,
            mode: None,
            target: None,
            payload: None,
            limit: None,
            rejection_reason: Some(err.to_string()),
            rejection_code: Some(err.code().to_string()),
        }
    }
}

impl fmt::Display for StatementExplain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN ===")?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            if let Some(mode) = &self.mode {
                writeln!(f, "Mode: {}", mode)?;
            }
            if let Some(target) = &self.target {
                writeln!(f, "Target: {}", target)?;
            }
            if let Some(payload) = &self.payload {
                writeln!(f, "Payload: {}", payload)?;
            }
            if let Some(limit) = self.limit {
                writeln!(f, "Limit: {}", limit)?;
            }
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::{PreparedStatement, Procedure};
    use serde_json::json;

    #[test]
    fn test_explain_procedure() {
        let stmt =
            PreparedStatement::new(Procedure::FindBy, vec![json!("email"), json!("a@b.com")])
                .unwrap();
        let explain = StatementExplain::from_prepared(&PreparedQuery::Procedure(stmt));

        assert!(explain.accepted);
        assert_eq!(explain.target.as_deref(), Some("findBy"));

        let output = explain.to_string();
        assert!(output.contains("ACCEPTED"));
        assert!(output.contains("Mode: procedure"));
        assert!(output.contains(r#"["email","a@b.com"]"#));
    }

    #[test]
    fn test_explain_rejected() {
        let err = StatementError::unsupported("Ad-hoc queries are disabled");
        let explain = StatementExplain::from_error(&err);

        assert!(!explain.accepted);
        let output = explain.to_string();
        assert!(output.contains("REJECTED"));
        assert!(output.contains("LEDGER_QUERY_UNSUPPORTED"));
    }

    #[test]
    fn test_explain_deterministic() {
        let stmt = PreparedStatement::new(Procedure::Find, vec![json!(1)]).unwrap();
        let prepared = PreparedQuery::Procedure(stmt);
        assert_eq!(
            StatementExplain::from_prepared(&prepared).to_string(),
            StatementExplain::from_prepared(&prepared).to_string()
        );
    }
}
