//! Quals pushed down from DataFusion and the API filter-string builder.

use std::collections::BTreeMap;
use std::fmt;

use datafusion::logical_expr::{BinaryExpr, Operator};
use datafusion::prelude::Expr;
use datafusion::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl QualOperator {
    fn from_operator(op: &Operator) -> Option<Self> {
        match op {
            Operator::Eq => Some(QualOperator::Eq),
            Operator::NotEq => Some(QualOperator::NotEq),
            Operator::Lt => Some(QualOperator::Lt),
            Operator::LtEq => Some(QualOperator::LtEq),
            Operator::Gt => Some(QualOperator::Gt),
            Operator::GtEq => Some(QualOperator::GtEq),
            _ => None,
        }
    }

    /// Operator as seen from the other side, for `lit op col`.
    fn flip(self) -> Self {
        match self {
            QualOperator::Lt => QualOperator::Gt,
            QualOperator::LtEq => QualOperator::GtEq,
            QualOperator::Gt => QualOperator::Lt,
            QualOperator::GtEq => QualOperator::LtEq,
            other => other,
        }
    }

    /// Filter-expression keyword, for the operators the API understands.
    fn filter_keyword(&self) -> Option<&'static str> {
        match self {
            QualOperator::Eq => Some(" eq "),
            QualOperator::NotEq => Some(" ne "),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            QualOperator::Eq => "=",
            QualOperator::NotEq => "<>",
            QualOperator::Lt => "<",
            QualOperator::LtEq => "<=",
            QualOperator::Gt => ">",
            QualOperator::GtEq => ">=",
        }
    }
}

impl fmt::Display for QualOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QualValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl QualValue {
    fn from_scalar(value: &ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Utf8(Some(s))
            | ScalarValue::LargeUtf8(Some(s))
            | ScalarValue::Utf8View(Some(s)) => Some(QualValue::String(s.clone())),
            ScalarValue::Int8(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::Int16(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::Int32(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::Int64(Some(v)) => Some(QualValue::Int(*v)),
            ScalarValue::UInt8(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::UInt16(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::UInt32(Some(v)) => Some(QualValue::Int(*v as i64)),
            ScalarValue::UInt64(Some(v)) => i64::try_from(*v).ok().map(QualValue::Int),
            ScalarValue::Float32(Some(v)) => Some(QualValue::Double(*v as f64)),
            ScalarValue::Float64(Some(v)) => Some(QualValue::Double(*v)),
            ScalarValue::Boolean(Some(v)) => Some(QualValue::Bool(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QualValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render as a query-parameter value.
    pub fn to_param(&self) -> String {
        match self {
            QualValue::String(s) => s.clone(),
            QualValue::Int(v) => v.to_string(),
            QualValue::Double(v) => v.to_string(),
            QualValue::Bool(v) => v.to_string(),
        }
    }
}

/// One predicate on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Qual {
    pub column: String,
    pub operator: QualOperator,
    pub value: QualValue,
}

impl Qual {
    pub fn new(column: impl Into<String>, operator: QualOperator, value: QualValue) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    /// Extract a qual from a `column op literal` (or `literal op column`)
    /// expression. Anything else is not a qual.
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        let Expr::BinaryExpr(BinaryExpr { left, op, right }) = expr else {
            return None;
        };
        let operator = QualOperator::from_operator(op)?;
        match (left.as_ref(), right.as_ref()) {
            (Expr::Column(col), Expr::Literal(value)) => Some(Qual::new(
                col.name.clone(),
                operator,
                QualValue::from_scalar(value)?,
            )),
            (Expr::Literal(value), Expr::Column(col)) => Some(Qual::new(
                col.name.clone(),
                operator.flip(),
                QualValue::from_scalar(value)?,
            )),
            _ => None,
        }
    }
}

/// Quals for one scan, grouped by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualMap {
    quals: BTreeMap<String, Vec<Qual>>,
}

impl QualMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the quals among the filters DataFusion pushed into a scan.
    pub fn from_filters(filters: &[Expr]) -> Self {
        let mut map = Self::new();
        for qual in filters.iter().filter_map(Qual::from_expr) {
            map.push(qual);
        }
        map
    }

    pub fn push(&mut self, qual: Qual) {
        self.quals.entry(qual.column.clone()).or_default().push(qual);
    }

    pub fn with(mut self, qual: Qual) -> Self {
        self.push(qual);
        self
    }

    pub fn get(&self, column: &str) -> &[Qual] {
        self.quals.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.quals.is_empty()
    }

    /// The value of the single `=` qual on `column`, if there is exactly one.
    pub fn equals_value(&self, column: &str) -> Option<&QualValue> {
        let mut eq = self
            .get(column)
            .iter()
            .filter(|q| q.operator == QualOperator::Eq);
        match (eq.next(), eq.next()) {
            (Some(q), None) => Some(&q.value),
            _ => None,
        }
    }

    /// Like [`equals_value`](Self::equals_value), for string values.
    pub fn equals_string(&self, column: &str) -> Option<&str> {
        self.equals_value(column).and_then(QualValue::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualType {
    String,
}

/// Maps a queried column to the field path the API filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQualMap {
    pub column_name: &'static str,
    pub property_path: &'static str,
    pub value_type: QualType,
}

impl FilterQualMap {
    pub const fn string(column_name: &'static str, property_path: &'static str) -> Self {
        Self {
            column_name,
            property_path,
            value_type: QualType::String,
        }
    }
}

/// Build the API filter expression (`field eq value and field ne value`)
/// from the quals supplied for this scan.
///
/// Clauses follow the order of `mappings`, not the order quals were
/// supplied. Only string `=` and `<>` quals are forwarded; anything else is
/// left to DataFusion's own filter. Contradictory quals on one column are
/// passed through as-is.
pub fn build_query_filter(mappings: &[FilterQualMap], quals: &QualMap) -> String {
    let mut clauses: Vec<String> = Vec::new();

    for mapping in mappings {
        for qual in quals.get(mapping.column_name) {
            let Some(keyword) = qual.operator.filter_keyword() else {
                continue;
            };
            let value = match (mapping.value_type, &qual.value) {
                (QualType::String, QualValue::String(s)) => s,
                _ => continue,
            };
            clauses.push(format!("{}{}{}", mapping.property_path, keyword, value));
        }
    }

    clauses.join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::prelude::{col, lit};

    const USER_FILTERS: &[FilterQualMap] = &[
        FilterQualMap::string("id", "id"),
        FilterQualMap::string("user_name", "userName"),
        FilterQualMap::string("display_name", "displayName"),
    ];

    fn q(column: &str, operator: QualOperator, value: &str) -> Qual {
        Qual::new(column, operator, QualValue::String(value.to_string()))
    }

    // --- build_query_filter ---
    #[test]
    fn test_single_eq() {
        let quals = QualMap::new().with(q("display_name", QualOperator::Eq, "Alice"));
        assert_eq!(build_query_filter(USER_FILTERS, &quals), "displayName eq Alice");
    }

    #[test]
    fn test_single_ne() {
        let quals = QualMap::new().with(q("user_name", QualOperator::NotEq, "bob@example.com"));
        assert_eq!(
            build_query_filter(USER_FILTERS, &quals),
            "userName ne bob@example.com"
        );
    }

    #[test]
    fn test_empty_quals() {
        assert_eq!(build_query_filter(USER_FILTERS, &QualMap::new()), "");
    }

    #[test]
    fn test_unsupported_operators_ignored() {
        let quals = QualMap::new()
            .with(q("display_name", QualOperator::Gt, "A"))
            .with(q("id", QualOperator::LtEq, "9"));
        assert_eq!(build_query_filter(USER_FILTERS, &quals), "");
    }

    #[test]
    fn test_unmapped_column_ignored() {
        let quals = QualMap::new().with(q("active", QualOperator::Eq, "true"));
        assert_eq!(build_query_filter(USER_FILTERS, &quals), "");
    }

    #[test]
    fn test_non_string_value_ignored() {
        let quals = QualMap::new().with(Qual::new("id", QualOperator::Eq, QualValue::Int(42)));
        assert_eq!(build_query_filter(USER_FILTERS, &quals), "");
    }

    #[test]
    fn test_mapping_order_wins_over_supply_order() {
        let quals = QualMap::new()
            .with(q("display_name", QualOperator::Eq, "Alice"))
            .with(q("id", QualOperator::Eq, "123"));
        assert_eq!(
            build_query_filter(USER_FILTERS, &quals),
            "id eq 123 and displayName eq Alice"
        );

        let reversed = QualMap::new()
            .with(q("id", QualOperator::Eq, "123"))
            .with(q("display_name", QualOperator::Eq, "Alice"));
        assert_eq!(
            build_query_filter(USER_FILTERS, &reversed),
            build_query_filter(USER_FILTERS, &quals)
        );
    }

    #[test]
    fn test_contradiction_passed_through() {
        let quals = QualMap::new()
            .with(q("display_name", QualOperator::Eq, "A"))
            .with(q("display_name", QualOperator::NotEq, "A"));
        assert_eq!(
            build_query_filter(USER_FILTERS, &quals),
            "displayName eq A and displayName ne A"
        );
    }

    // --- Qual::from_expr ---
    #[test]
    fn test_from_expr_col_eq_lit() {
        let qual = Qual::from_expr(&col("display_name").eq(lit("Alice"))).unwrap();
        assert_eq!(qual, q("display_name", QualOperator::Eq, "Alice"));
    }

    #[test]
    fn test_from_expr_not_eq() {
        let qual = Qual::from_expr(&col("state").not_eq(lit("RUNNING"))).unwrap();
        assert_eq!(qual.operator, QualOperator::NotEq);
    }

    #[test]
    fn test_from_expr_lit_on_left_flips() {
        let qual = Qual::from_expr(&lit(10i64).lt(col("num_workers"))).unwrap();
        assert_eq!(qual.column, "num_workers");
        assert_eq!(qual.operator, QualOperator::Gt);
        assert_eq!(qual.value, QualValue::Int(10));
    }

    #[test]
    fn test_from_expr_rejects_non_quals() {
        assert!(Qual::from_expr(&col("a").eq(col("b"))).is_none());
        assert!(Qual::from_expr(&col("a").like(lit("x%"))).is_none());
        assert!(Qual::from_expr(&col("a").is_null()).is_none());
        assert!(Qual::from_expr(&col("a").eq(lit(ScalarValue::Utf8(None)))).is_none());
    }

    #[test]
    fn test_from_filters_groups_by_column() {
        let map = QualMap::from_filters(&[
            col("id").eq(lit("1")),
            col("id").not_eq(lit("2")),
            col("display_name").eq(lit("Alice")),
            col("a").eq(col("b")),
        ]);
        assert_eq!(map.get("id").len(), 2);
        assert_eq!(map.get("display_name").len(), 1);
        assert!(map.get("a").is_empty());
    }

    // --- equals_value ---
    #[test]
    fn test_equals_string_single() {
        let map = QualMap::new().with(q("id", QualOperator::Eq, "1"));
        assert_eq!(map.equals_string("id"), Some("1"));
        assert_eq!(map.equals_string("other"), None);
    }

    #[test]
    fn test_equals_string_ambiguous() {
        let map = QualMap::new()
            .with(q("id", QualOperator::Eq, "1"))
            .with(q("id", QualOperator::Eq, "2"));
        assert_eq!(map.equals_string("id"), None);
    }

    #[test]
    fn test_equals_ignores_other_operators() {
        let map = QualMap::new()
            .with(q("id", QualOperator::NotEq, "2"))
            .with(q("id", QualOperator::Eq, "1"));
        assert_eq!(map.equals_string("id"), Some("1"));
    }

    #[test]
    fn test_to_param() {
        assert_eq!(QualValue::Int(7).to_param(), "7");
        assert_eq!(QualValue::Bool(true).to_param(), "true");
        assert_eq!(QualValue::String("x".into()).to_param(), "x");
    }
}
