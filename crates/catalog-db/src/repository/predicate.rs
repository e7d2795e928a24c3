//! # Query Predicates
//!
//! Typed filters that the store evaluates.
//!
//! A predicate is built from an entity's column enum, so a filter on a
//! column the table doesn't have cannot be written. It renders to a
//! parameterized `WHERE` fragment; values are always bound, never spliced.
//!
//! ```rust
//! use catalog_db::repository::entity::ProductColumn;
//! use catalog_db::repository::predicate::Predicate;
//!
//! // price_cents >= 100 AND is_deleted = false AND NOT (name LIKE 'Diet%')
//! let filter = Predicate::and(vec![
//!     Predicate::ge(ProductColumn::PriceCents, 100),
//!     Predicate::eq(ProductColumn::IsDeleted, false),
//!     Predicate::not(Predicate::like(ProductColumn::Name, "Diet%")),
//! ]);
//! # let _ = filter;
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// A column of some entity table.
pub trait Column: Copy + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;
}

/// A bindable comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => " = ",
            Op::Ne => " <> ",
            Op::Lt => " < ",
            Op::Le => " <= ",
            Op::Gt => " > ",
            Op::Ge => " >= ",
        }
    }
}

/// A boolean filter over the columns `C`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<C: Column> {
    Compare(C, Op, Value),
    Like(C, String),
    IsNull(C),
    IsNotNull(C),
    And(Vec<Predicate<C>>),
    Or(Vec<Predicate<C>>),
    Not(Box<Predicate<C>>),
}

impl<C: Column> Predicate<C> {
    pub fn eq(column: C, value: impl Into<Value>) -> Self {
        Predicate::Compare(column, Op::Eq, value.into())
    }

    pub fn ne(column: C, value: impl Into<Value>) -> Self {
        Predicate::Compare(column, Op::Ne, value.into())
    }

    pub fn lt(column: C, value: impl Into<Value>) -> Self {
        Predicate::Compare(column, Op::Lt, value.into())
    }

    pub fn le(column: C, value: impl Into<Value>) -> Self {
        Predicate::Compare(column, Op::Le, value.into())
    }

    pub fn gt(column: C, value: impl Into<Value>) -> Self {
        Predicate::Compare(column, Op::Gt, value.into())
    }

    pub fn ge(column: C, value: impl Into<Value>) -> Self {
        Predicate::Compare(column, Op::Ge, value.into())
    }

    /// SQL `LIKE` with `%` and `_` wildcards.
    pub fn like(column: C, pattern: impl Into<String>) -> Self {
        Predicate::Like(column, pattern.into())
    }

    pub fn is_null(column: C) -> Self {
        Predicate::IsNull(column)
    }

    pub fn is_not_null(column: C) -> Self {
        Predicate::IsNotNull(column)
    }

    /// Conjunction. An empty list is true.
    pub fn and(predicates: Vec<Predicate<C>>) -> Self {
        Predicate::And(predicates)
    }

    /// Disjunction. An empty list is false.
    pub fn or(predicates: Vec<Predicate<C>>) -> Self {
        Predicate::Or(predicates)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate<C>) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    /// Appends this predicate to `qb`, binding every value.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Predicate::Compare(column, op, value) => {
                qb.push(column.as_str()).push(op.as_sql());
                push_value(qb, value);
            }
            Predicate::Like(column, pattern) => {
                qb.push(column.as_str())
                    .push(" LIKE ")
                    .push_bind(pattern.clone());
            }
            Predicate::IsNull(column) => {
                qb.push(column.as_str()).push(" IS NULL");
            }
            Predicate::IsNotNull(column) => {
                qb.push(column.as_str()).push(" IS NOT NULL");
            }
            Predicate::And(parts) => push_joined(qb, parts, " AND ", "1 = 1"),
            Predicate::Or(parts) => push_joined(qb, parts, " OR ", "1 = 0"),
            Predicate::Not(inner) => {
                qb.push("NOT (");
                inner.push_sql(qb);
                qb.push(")");
            }
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Int(v) => qb.push_bind(*v),
        Value::Text(v) => qb.push_bind(v.clone()),
        Value::Bool(v) => qb.push_bind(*v),
        Value::Timestamp(v) => qb.push_bind(*v),
    };
}

fn push_joined<C: Column>(
    qb: &mut QueryBuilder<'_, Sqlite>,
    parts: &[Predicate<C>],
    separator: &str,
    empty: &str,
) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }

    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        part.push_sql(qb);
    }
    qb.push(")");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::entity::{CategoryColumn, ProductColumn};

    fn render<C: Column>(predicate: &Predicate<C>) -> String {
        let mut qb = QueryBuilder::<Sqlite>::new("");
        predicate.push_sql(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn test_comparison_binds_value() {
        let sql = render(&Predicate::eq(CategoryColumn::Name, "Beverages"));
        assert_eq!(sql, "name = ?");
    }

    #[test]
    fn test_nested_composition() {
        let predicate = Predicate::and(vec![
            Predicate::eq(ProductColumn::CategoryId, 1),
            Predicate::or(vec![
                Predicate::lt(ProductColumn::Stock, 5),
                Predicate::is_null(ProductColumn::UpdatedAt),
            ]),
            Predicate::not(Predicate::like(ProductColumn::Name, "Diet%")),
        ]);

        assert_eq!(
            render(&predicate),
            "(category_id = ? AND (stock < ? OR updated_at IS NULL) AND NOT (name LIKE ?))"
        );
    }

    #[test]
    fn test_empty_groups() {
        assert_eq!(render(&Predicate::<ProductColumn>::and(vec![])), "1 = 1");
        assert_eq!(render(&Predicate::<ProductColumn>::or(vec![])), "1 = 0");
    }
}
