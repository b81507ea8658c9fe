//! Column definitions and JSON-to-column value conversion.
//!
//! Empty strings and numeric zero read as null, matching how the API omits
//! unset fields. Booleans are taken as they come.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, TimeUnit};
use chrono::DateTime;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Bool,
    Int,
    Double,
    /// Seconds since the epoch, UTC. Numeric source values are epoch
    /// milliseconds; strings are RFC 3339.
    Timestamp,
    /// Serialized JSON text.
    Json,
}

impl ColumnType {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::String | ColumnType::Json => DataType::Utf8,
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Int => DataType::Int64,
            ColumnType::Double => DataType::Float64,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Second, Some(Arc::from("UTC"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "STRING",
            ColumnType::Bool => "BOOL",
            ColumnType::Int => "INT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Json => "JSON",
        }
    }
}

/// Where a column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Field named like the column, or its camelCase form.
    Field,
    /// Dotted path into the item.
    Path(&'static str),
    /// Dotted path into the parent item.
    Parent(&'static str),
    /// Result of a named per-row hydrate, optionally narrowed by a path.
    Hydrate {
        name: &'static str,
        path: Option<&'static str>,
    },
    /// The connection's account id.
    AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub description: &'static str,
    pub source: Source,
    /// Read from the get-endpoint shape; listed items are hydrated first.
    pub detail: bool,
}

impl ColumnDef {
    pub fn new(name: &'static str, ty: ColumnType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            source: Source::Field,
            detail: false,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::String, description)
    }

    pub fn bool(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Bool, description)
    }

    pub fn int(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Int, description)
    }

    pub fn double(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Double, description)
    }

    pub fn timestamp(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Timestamp, description)
    }

    pub fn json(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ColumnType::Json, description)
    }

    pub fn path(self, path: &'static str) -> Self {
        Self {
            source: Source::Path(path),
            ..self
        }
    }

    pub fn parent(self, path: &'static str) -> Self {
        Self {
            source: Source::Parent(path),
            ..self
        }
    }

    pub fn hydrate(self, name: &'static str) -> Self {
        Self {
            source: Source::Hydrate { name, path: None },
            ..self
        }
    }

    pub fn hydrate_path(self, name: &'static str, path: &'static str) -> Self {
        Self {
            source: Source::Hydrate {
                name,
                path: Some(path),
            },
            ..self
        }
    }

    pub fn detail(self) -> Self {
        Self {
            detail: true,
            ..self
        }
    }

    /// The common `account_id` column of account-scope tables.
    pub fn account_id() -> Self {
        Self {
            source: Source::AccountId,
            ..Self::string("account_id", "The Databricks account ID.")
        }
    }

    /// The common `title` column, read from `path`.
    pub fn title(path: &'static str) -> Self {
        Self::string("title", "The title of the resource.").path(path)
    }

    pub fn data_type(&self) -> DataType {
        self.ty.data_type()
    }

    pub fn field(&self) -> Field {
        Field::new(self.name, self.data_type(), true)
    }

    /// Name of the hydrate this column needs, if any.
    pub fn hydrate_name(&self) -> Option<&'static str> {
        match self.source {
            Source::Hydrate { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// `snake_case` to `camelCase`: `display_name` -> `displayName`.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Follow a dotted path (`spec.cluster_name`) into a JSON value. Array
/// elements are addressed by index (`emails.0.value`).
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Look a column up by its own name, falling back to the camelCase form
/// used by the SCIM endpoints.
pub fn lookup_field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    value
        .get(name)
        .filter(|v| !v.is_null())
        .or_else(|| value.get(to_camel_case(name)))
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

pub fn to_string_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Unlike the numeric and string converters, `false` is kept as a value
/// rather than turned into null.
pub fn to_bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn to_int_value(value: &Value) -> Option<i64> {
    let v = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }?;
    (v != 0).then_some(v)
}

pub fn to_double_value(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }?;
    (v != 0.0).then_some(v)
}

/// Epoch milliseconds (or an RFC 3339 string) to whole epoch seconds.
/// Milliseconds are floored; zero is null.
pub fn to_timestamp_value(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Number(n) => {
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if ms == 0 {
                return None;
            }
            ms.div_euclid(1000)
        }
        Value::String(s) if s.is_empty() => return None,
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok()?.timestamp(),
        _ => return None,
    };
    Some(secs)
}

pub fn to_json_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("display_name"), "displayName");
        assert_eq!(to_camel_case("user_name"), "userName");
        assert_eq!(to_camel_case("id"), "id");
        assert_eq!(to_camel_case("external_id_x"), "externalIdX");
        assert_eq!(to_camel_case("_private"), "private");
    }

    #[test]
    fn test_lookup_paths() {
        let v = json!({"settings": {"name": "job"}, "emails": [{"value": "a@b.c"}]});
        assert_eq!(lookup(&v, "settings.name"), Some(&json!("job")));
        assert_eq!(lookup(&v, "emails.0.value"), Some(&json!("a@b.c")));
        assert_eq!(lookup(&v, "settings.missing"), None);
        assert_eq!(lookup(&v, "emails.x"), None);
    }

    #[test]
    fn test_lookup_field_camel_fallback() {
        let v = json!({"displayName": "Alice", "id": "1"});
        assert_eq!(lookup_field(&v, "display_name"), Some(&json!("Alice")));
        assert_eq!(lookup_field(&v, "id"), Some(&json!("1")));
        assert_eq!(lookup_field(&v, "user_name"), None);
    }

    #[test]
    fn test_null_if_zero() {
        assert_eq!(to_string_value(&json!("")), None);
        assert_eq!(to_string_value(&json!(0)), None);
        assert_eq!(to_int_value(&json!(0)), None);
        assert_eq!(to_double_value(&json!(0.0)), None);
        assert_eq!(to_int_value(&json!(5)), Some(5));
        assert_eq!(to_string_value(&json!(12)), Some("12".to_string()));
    }

    #[test]
    fn test_bool_false_is_kept() {
        assert_eq!(to_bool_value(&json!(false)), Some(false));
        assert_eq!(to_bool_value(&json!("true")), Some(true));
        assert_eq!(to_bool_value(&json!(null)), None);
    }

    #[test]
    fn test_timestamp_from_millis() {
        assert_eq!(to_timestamp_value(&json!(1_700_000_000_999i64)), Some(1_700_000_000));
        assert_eq!(to_timestamp_value(&json!(0)), None);
        assert_eq!(to_timestamp_value(&json!(-1)), Some(-1));
    }

    #[test]
    fn test_timestamp_from_rfc3339() {
        assert_eq!(
            to_timestamp_value(&json!("2023-11-14T22:13:20Z")),
            Some(1_700_000_000)
        );
        assert_eq!(to_timestamp_value(&json!("yesterday")), None);
    }

    #[test]
    fn test_json_serializes() {
        assert_eq!(
            to_json_value(&json!({"a": [1, 2]})),
            Some("{\"a\":[1,2]}".to_string())
        );
        assert_eq!(to_json_value(&Value::Null), None);
    }

    #[test]
    fn test_column_builders() {
        let c = ColumnDef::string("cluster_name", "Name").path("spec.cluster_name").detail();
        assert_eq!(c.source, Source::Path("spec.cluster_name"));
        assert!(c.detail);

        let acc = ColumnDef::account_id();
        assert_eq!(acc.name, "account_id");
        assert_eq!(acc.source, Source::AccountId);

        let perms = ColumnDef::json("job_permissions", "Perms").hydrate("permissions");
        assert_eq!(perms.hydrate_name(), Some("permissions"));
    }

    #[test]
    fn test_timestamp_type_is_utc_seconds() {
        assert_eq!(
            ColumnType::Timestamp.data_type(),
            DataType::Timestamp(TimeUnit::Second, Some(Arc::from("UTC")))
        );
    }
}
