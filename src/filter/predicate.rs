//! Predicate expression tree
//!
//! Built up by the filter builder and rendered to SQL only when the filter
//! runs. The same tree can be evaluated against an in-memory row with SQL
//! three-valued logic, so both paths agree on NULL handling.

use std::fmt;

use crate::store::SqlParam;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsNotNull => "IS NOT NULL",
        }
    }

    /// Text comparison of two non-null values. The null tests never hold
    /// between values.
    fn holds(self, actual: &str, expected: &str) -> bool {
        match self {
            CompareOp::Eq => actual == expected,
            CompareOp::Lt => actual < expected,
            CompareOp::Le => actual <= expected,
            CompareOp::Gt => actual > expected,
            CompareOp::Ge => actual >= expected,
            CompareOp::IsNull | CompareOp::IsNotNull => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Leaf {
        column: String,
        op: CompareOp,
        /// Compared value; `None` for the null tests
        value: Option<String>,
    },
}

impl Predicate {
    fn compare(column: &str, op: CompareOp, value: impl Into<String>) -> Self {
        Predicate::Leaf {
            column: column.to_string(),
            op,
            value: Some(value.into()),
        }
    }

    pub fn eq(column: &str, value: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn lt(column: &str, value: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: &str, value: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: &str, value: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: &str, value: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn is_null(column: &str) -> Self {
        Predicate::Leaf {
            column: column.to_string(),
            op: CompareOp::IsNull,
            value: None,
        }
    }

    pub fn is_not_null(column: &str) -> Self {
        Predicate::Leaf {
            column: column.to_string(),
            op: CompareOp::IsNotNull,
            value: None,
        }
    }

    pub fn and(parts: Vec<Predicate>) -> Self {
        Predicate::And(parts)
    }

    pub fn or(parts: Vec<Predicate>) -> Self {
        Predicate::Or(parts)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// OR of equality matches of `column` against each value.
    pub fn any_of<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::Or(values.into_iter().map(|v| Self::eq(column, v)).collect())
    }

    /// Renders the tree as a SQL condition with `?` placeholders, pushing the
    /// bound values onto `params` in placeholder order.
    ///
    /// An empty AND renders as `1 = 1` and an empty OR as `1 = 0`.
    pub fn to_sql(&self, params: &mut Vec<SqlParam>) -> String {
        match self {
            Predicate::And(parts) => Self::join(parts, "AND", "1 = 1", params),
            Predicate::Or(parts) => Self::join(parts, "OR", "1 = 0", params),
            Predicate::Not(inner) => format!("NOT ({})", inner.to_sql(params)),
            Predicate::Leaf { column, op, value } => match value {
                Some(value) => {
                    params.push(SqlParam::Text(value.clone()));
                    format!("{} {} ?", column, op.sql())
                }
                None => format!("{} {}", column, op.sql()),
            },
        }
    }

    fn join(parts: &[Predicate], keyword: &str, empty: &str, params: &mut Vec<SqlParam>) -> String {
        match parts {
            [] => empty.to_string(),
            [only] => only.to_sql(params),
            _ => {
                let rendered: Vec<String> = parts.iter().map(|p| p.to_sql(params)).collect();
                format!("({})", rendered.join(&format!(" {} ", keyword)))
            }
        }
    }

    /// Three-valued evaluation against a row; `None` is SQL UNKNOWN.
    pub fn evaluate<'r, F>(&self, row: &F) -> Option<bool>
    where
        F: Fn(&str) -> Option<&'r str>,
    {
        match self {
            Predicate::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(row) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Predicate::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(row) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::Not(inner) => inner.evaluate(row).map(|b| !b),
            Predicate::Leaf { column, op, value } => {
                let actual = row(column.as_str());
                match op {
                    CompareOp::IsNull => Some(actual.is_none()),
                    CompareOp::IsNotNull => Some(actual.is_some()),
                    _ => Some(op.holds(actual?, value.as_deref()?)),
                }
            }
        }
    }

    /// True when the row satisfies the predicate (UNKNOWN does not match).
    pub fn matches<'r, F>(&self, row: &F) -> bool
    where
        F: Fn(&str) -> Option<&'r str>,
    {
        self.evaluate(row) == Some(true)
    }
}

impl fmt::Display for Predicate {
    /// SQL rendering with values inlined as quoted literals, for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params = Vec::new();
        let sql = self.to_sql(&mut params);
        let mut values = params.into_iter();
        let mut out = String::with_capacity(sql.len());
        for c in sql.chars() {
            if c != '?' {
                out.push(c);
                continue;
            }
            match values.next() {
                Some(SqlParam::Text(v)) => {
                    out.push('\'');
                    out.push_str(&v.replace('\'', "''"));
                    out.push('\'');
                }
                Some(SqlParam::Integer(i)) => out.push_str(&i.to_string()),
                Some(SqlParam::Unbound) | None => out.push_str("NULL"),
            }
        }
        f.write_str(&out)
    }
}
