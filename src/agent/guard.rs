//! SQL guard: sanitizes and domain-corrects model-generated statements
//! before they reach the warehouse

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AgentError, Result};

const ALLOW_PREFIXES: [&str; 2] = ["SELECT", "WITH"];

/// Length of the raw-input snippet carried by rejection messages
const SNIPPET_LEN: usize = 120;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```sql|```").unwrap());
static TOUCHES_CUSTOMERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfrom\s+customers\b|\bjoin\s+customers\b").unwrap());
static BARE_STATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bstate\b").unwrap());
static BARE_CITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcity\b").unwrap());
static COUNT_ROWS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcount\s*\(\s*(?:\*|1)\s*\)").unwrap());

/// A statement that has passed the guard
///
/// Only the guard constructs these, so anything the warehouse executes on
/// behalf of the model has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VettedSql(String);

impl VettedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VettedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Clean, validate, and correct a raw statement
pub fn clean_and_correct_sql(raw: &str) -> Result<VettedSql> {
    let q = strip_wrapping(raw);

    let upper = q.trim_start().to_uppercase();
    if !ALLOW_PREFIXES.iter().any(|p| upper.starts_with(p)) {
        return Err(AgentError::Validation(format!(
            "Only read-only SELECT/WITH queries are allowed. Got: {}...",
            snippet(raw)
        )));
    }

    if q.contains(';') {
        return Err(AgentError::Validation(
            "Multiple statements detected. Submit a single SELECT/WITH query.".to_string(),
        ));
    }

    let q = apply_customers_aliases(&q);
    tracing::debug!("Cleaned SQL to execute: {}", q);
    Ok(VettedSql(q))
}

/// Remove code fences, surrounding quotes, and one trailing terminator
fn strip_wrapping(raw: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(raw, "");
    let q = unquote(unquote(unfenced.trim(), '"'), '\'');
    q.strip_suffix(';').unwrap_or(q).to_string()
}

/// Drop a quote pair only when it encloses the whole statement
fn unquote(q: &str, quote: char) -> &str {
    q.strip_prefix(quote)
        .and_then(|inner| inner.strip_suffix(quote))
        .map(str::trim)
        .unwrap_or(q)
}

/// Rewrite column names and counts for statements over `customers`
///
/// The customers relation holds one row per order-customer pairing, so plain
/// row counts overcount unique customers.
pub fn apply_customers_aliases(q: &str) -> String {
    if !TOUCHES_CUSTOMERS.is_match(q) {
        return q.to_string();
    }
    let q = BARE_STATE.replace_all(q, "customer_state");
    let q = BARE_CITY.replace_all(&q, "customer_city");
    COUNT_ROWS
        .replace_all(&q, "COUNT(DISTINCT customer_unique_id)")
        .into_owned()
}

fn snippet(raw: &str) -> String {
    raw.chars().take(SNIPPET_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(q: &str) -> String {
        clean_and_correct_sql(q).unwrap().to_string()
    }

    #[test]
    fn test_rejects_non_select() {
        for q in [
            "DELETE FROM orders",
            "drop table customers",
            "  update sellers set seller_city = 'x'",
            "",
            "EXPLAIN SELECT 1",
        ] {
            assert!(
                matches!(clean_and_correct_sql(q), Err(AgentError::Validation(_))),
                "expected rejection for {:?}",
                q
            );
        }
    }

    #[test]
    fn test_trailing_string_literal_survives() {
        let q = "SELECT * FROM orders WHERE order_status = 'delivered'";
        assert_eq!(guard(q), q);
        assert_eq!(guard(&format!("\"{}\"", q)), q);
        assert_eq!(guard("'SELECT order_id FROM orders'"), "SELECT order_id FROM orders");
    }

    #[test]
    fn test_rejection_carries_truncated_snippet() {
        let raw = format!("INSERT INTO orders VALUES ({})", "1,".repeat(200));
        let err = clean_and_correct_sql(&raw).unwrap_err().to_string();
        assert!(err.starts_with("Only read-only SELECT/WITH queries are allowed. Got: INSERT"));
        assert!(err.len() < raw.len());
    }

    #[test]
    fn test_accepts_lowercase_and_with() {
        assert_eq!(guard("select 1"), "select 1");
        assert_eq!(
            guard("WITH t AS (SELECT 1 AS x) SELECT x FROM t"),
            "WITH t AS (SELECT 1 AS x) SELECT x FROM t"
        );
    }

    #[test]
    fn test_strips_fences_quotes_and_terminator() {
        assert_eq!(guard("```sql\nSELECT * FROM orders;\n```"), "SELECT * FROM orders");
        assert_eq!(guard("\"SELECT * FROM orders\""), "SELECT * FROM orders");
        assert_eq!(guard("'SELECT 1;'"), "SELECT 1");
        assert_eq!(guard("```SQL SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn test_rejects_multiple_statements() {
        let err = clean_and_correct_sql("SELECT 1; DROP TABLE orders").unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(err.to_string().contains("Multiple statements"));

        assert!(clean_and_correct_sql("SELECT 1;;").is_err());
    }

    #[test]
    fn test_customer_columns_rewritten() {
        let out = guard("SELECT state, city FROM customers");
        assert_eq!(out, "SELECT customer_state, customer_city FROM customers");
    }

    #[test]
    fn test_customer_count_rewritten() {
        assert_eq!(
            guard("SELECT COUNT(*) FROM customers"),
            "SELECT COUNT(DISTINCT customer_unique_id) FROM customers"
        );
        assert_eq!(
            guard("select count ( 1 ) from Customers"),
            "select COUNT(DISTINCT customer_unique_id) from Customers"
        );
    }

    #[test]
    fn test_join_customers_triggers_rewrite() {
        let out = guard(
            "SELECT c.state, COUNT(*) FROM orders o JOIN customers c ON o.customer_id = c.customer_id GROUP BY c.state",
        );
        assert!(out.contains("c.customer_state"));
        assert!(out.contains("COUNT(DISTINCT customer_unique_id)"));
        assert!(!out.contains("c.state"));
    }

    #[test]
    fn test_qualified_names_not_mangled() {
        let out = guard("SELECT customer_state, customer_city FROM customers");
        assert_eq!(out, "SELECT customer_state, customer_city FROM customers");

        let out = guard("SELECT statement_city FROM customers");
        assert_eq!(out, "SELECT statement_city FROM customers");
    }

    #[test]
    fn test_other_tables_unchanged() {
        assert_eq!(guard("SELECT * FROM products"), "SELECT * FROM products");
        assert_eq!(
            guard("SELECT seller_state, COUNT(*) FROM sellers GROUP BY seller_state"),
            "SELECT seller_state, COUNT(*) FROM sellers GROUP BY seller_state"
        );
    }

    #[test]
    fn test_idempotent_on_clean_statements() {
        for q in [
            "SELECT * FROM products",
            "SELECT order_id, price FROM order_items WHERE price > 100",
            "WITH x AS (SELECT 1) SELECT * FROM x",
        ] {
            let once = guard(q);
            assert_eq!(guard(&once), once);
        }
    }
}
