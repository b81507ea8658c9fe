//! Items produced by a scan and the per-row state built around them.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::column::{lookup, lookup_field, ColumnDef, Source};

/// One resource as returned by the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceItem {
    /// Summary shape from a list endpoint.
    Listed(Value),
    /// Detail shape from a get endpoint.
    Fetched(Value),
    /// Item listed under a parent (a secret under its scope).
    Child { parent: Arc<Value>, item: Value },
}

impl ResourceItem {
    pub fn value(&self) -> &Value {
        match self {
            ResourceItem::Listed(v) | ResourceItem::Fetched(v) => v,
            ResourceItem::Child { item, .. } => item,
        }
    }

    pub fn parent(&self) -> Option<&Value> {
        match self {
            ResourceItem::Child { parent, .. } => Some(parent),
            _ => None,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, ResourceItem::Fetched(_))
    }

    /// A field as a string, for filling request paths and parameters.
    /// Numbers are rendered in decimal.
    pub fn key(&self, path: &str) -> Option<String> {
        match lookup(self.value(), path)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// An item together with whatever was hydrated for it.
#[derive(Debug, Clone)]
pub struct Row {
    pub item: ResourceItem,
    detail: Option<Value>,
    hydrates: HashMap<&'static str, Value>,
}

impl Row {
    pub fn new(item: ResourceItem) -> Self {
        Self {
            item,
            detail: None,
            hydrates: HashMap::new(),
        }
    }

    /// Whether detail columns can be read without another request.
    pub fn has_detail(&self) -> bool {
        self.item.is_fetched() || self.detail.is_some()
    }

    pub fn set_detail(&mut self, detail: Value) {
        self.detail = Some(detail);
    }

    /// Record a hydrate result. Not-found hydrates are recorded as `Null`.
    pub fn set_hydrate(&mut self, name: &'static str, value: Value) {
        self.hydrates.insert(name, value);
    }

    /// Resolve a column's raw JSON value for this row. Missing is `Null`.
    pub fn resolve(&self, column: &ColumnDef, account_id: Option<&str>) -> Value {
        let base = match (&self.detail, column.detail) {
            (Some(detail), true) => detail,
            _ => self.item.value(),
        };

        let found = match &column.source {
            Source::Field => lookup_field(base, column.name),
            Source::Path(path) => lookup(base, path),
            Source::Parent(path) => self.item.parent().and_then(|p| lookup(p, path)),
            Source::Hydrate { name, path } => {
                let hydrated = self.hydrates.get(name);
                match path {
                    Some(path) => hydrated.and_then(|h| lookup(h, path)),
                    None => hydrated,
                }
            }
            Source::AccountId => {
                return account_id
                    .map(|id| Value::String(id.to_string()))
                    .unwrap_or(Value::Null)
            }
        };

        found.cloned().unwrap_or(Value::Null)
    }
}
