//! Statement classification.
//!
//! Decides whether a statement is a data-producing query, a mutating
//! statement, or an in-band `SET k = v` property directive. This is a
//! deliberate line-based heuristic, not a SQL parser: the first
//! non-comment, non-blank line is tested for a leading `SELECT`. Statements
//! like `INSERT ... SELECT` classify as updates (correct), while exotic or
//! comment-only query forms may misclassify. That limitation is accepted;
//! growing this into a parser is out of scope.

use regex::Regex;
use std::sync::OnceLock;

/// How a statement should be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `SET <name> = <value>`: applied to the session properties without
    /// submitting a job.
    PropertyDirective { key: String, value: String },
    /// A data-producing query; results must be materialized and streamed.
    Query,
    /// A mutating statement; resolved to a row-affected count.
    Update,
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(--|#)").expect("valid comment pattern"))
}

fn select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*SELECT").expect("valid select pattern"))
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Whole trimmed statement: SET <anything containing '='>. A value
    // cannot span lines; a multi-line statement is never a directive.
    RE.get_or_init(|| Regex::new(r"(?i)^set\s+(.+)$").expect("valid directive pattern"))
}

/// Classifies a statement.
///
/// Property directives are recognized first and short-circuit the
/// query/update decision.
pub fn classify(sql: &str) -> StatementKind {
    if let Some((key, value)) = parse_property_directive(sql) {
        return StatementKind::PropertyDirective { key, value };
    }
    if is_query(sql) {
        StatementKind::Query
    } else {
        StatementKind::Update
    }
}

/// Recognizes a `SET <name> = <value>` directive.
///
/// The entire trimmed statement (ignoring one optional trailing semicolon)
/// must match, case-insensitively. Key and value are split on the first
/// `=` and trimmed; any further `=` characters stay in the value.
pub fn parse_property_directive(sql: &str) -> Option<(String, String)> {
    let text = sql.trim();
    let text = text.strip_suffix(';').unwrap_or(text).trim_end();

    let captures = directive_re().captures(text)?;
    let rest = captures.get(1)?.as_str();

    let (key, value) = rest.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

/// Returns true if the first substantive line of the statement begins with
/// `SELECT` (case-insensitive).
///
/// Blank lines and lines starting with `--` or `#` are skipped. A statement
/// with no substantive line defaults to "not a query".
pub fn is_query(sql: &str) -> bool {
    for line in sql.lines() {
        if comment_re().is_match(line) {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        return select_re().is_match(line);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_is_query() {
        assert_eq!(classify("SELECT * FROM t"), StatementKind::Query);
        assert_eq!(classify("  select 1"), StatementKind::Query);
        assert_eq!(classify("\nSeLeCt id FROM t"), StatementKind::Query);
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let sql = "-- leading comment\n# another\n\n   SELECT a FROM t";
        assert_eq!(classify(sql), StatementKind::Query);
    }

    #[test]
    fn test_insert_select_is_update() {
        // First token is not SELECT; classified as update on purpose.
        assert_eq!(
            classify("INSERT INTO t SELECT * FROM s"),
            StatementKind::Update
        );
    }

    #[test]
    fn test_non_select_is_update() {
        assert_eq!(classify("CREATE TABLE t (a BIGINT)"), StatementKind::Update);
        assert_eq!(classify("DROP TABLE t"), StatementKind::Update);
        assert_eq!(classify("UPDATE t SET a = 1"), StatementKind::Update);
    }

    #[test]
    fn test_comment_only_defaults_to_update() {
        assert_eq!(classify("-- just a comment"), StatementKind::Update);
        assert_eq!(classify("   \n  \n"), StatementKind::Update);
        assert_eq!(classify(""), StatementKind::Update);
    }

    #[test]
    fn test_directive_basic() {
        assert_eq!(
            classify("SET engine.sql.x = 1"),
            StatementKind::PropertyDirective {
                key: "engine.sql.x".to_string(),
                value: "1".to_string()
            }
        );
    }

    #[test]
    fn test_directive_case_and_semicolon() {
        assert_eq!(
            classify("  set a.b=c ;  "),
            StatementKind::PropertyDirective {
                key: "a.b".to_string(),
                value: "c".to_string()
            }
        );
        assert_eq!(
            classify("SET K = V;"),
            StatementKind::PropertyDirective {
                key: "K".to_string(),
                value: "V".to_string()
            }
        );
    }

    #[test]
    fn test_directive_keeps_later_equals_in_value() {
        assert_eq!(
            parse_property_directive("SET key = a=b=c"),
            Some(("key".to_string(), "a=b=c".to_string()))
        );
    }

    #[test]
    fn test_directive_requires_equals() {
        assert_eq!(parse_property_directive("SET just_a_flag"), None);
        // `UPDATE t SET a = 1` must not be mistaken for a directive.
        assert_eq!(parse_property_directive("UPDATE t SET a = 1"), None);
    }

    #[test]
    fn test_directive_requires_key() {
        assert_eq!(parse_property_directive("SET = value"), None);
    }

    #[test]
    fn test_multi_line_statement_is_not_directive() {
        // The value must not swallow a following statement line.
        assert_eq!(parse_property_directive("SET x = 1\nSELECT 2"), None);
        assert_eq!(classify("SET x = 1\nSELECT 2"), StatementKind::Update);
    }

    #[test]
    fn test_set_in_update_statement_is_not_directive() {
        assert_eq!(
            classify("UPDATE t SET a = 1 WHERE b = 2"),
            StatementKind::Update
        );
    }
}
