//! Declarative table definitions.
//!
//! A table is data: its columns, how to list it, how to get one item by
//! key, and which extra per-row requests can fill in columns.

use arrow::datatypes::{Schema, SchemaRef};
use std::sync::Arc;

use brickql_core::{NotFoundPredicate, Scope};

use crate::column::ColumnDef;
use crate::item::ResourceItem;
use crate::pagination::Pagination;
use crate::quals::{FilterQualMap, QualOperator};

/// Operators accepted for pushdown on key columns.
pub const EQ: &[QualOperator] = &[QualOperator::Eq];
pub const EQ_NE: &[QualOperator] = &[QualOperator::Eq, QualOperator::NotEq];

// ---------------------------------------------------------------------------
// Key columns
// ---------------------------------------------------------------------------

/// A column whose quals the list or get call can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: &'static str,
    pub operators: &'static [QualOperator],
}

impl KeyColumn {
    pub fn new(name: &'static str, operators: &'static [QualOperator]) -> Self {
        Self { name, operators }
    }

    pub fn accepts(&self, column: &str, operator: QualOperator) -> bool {
        self.name == column && self.operators.contains(&operator)
    }
}

/// An `=` qual forwarded verbatim as a query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualParam {
    pub column: &'static str,
    pub param: &'static str,
}

// ---------------------------------------------------------------------------
// List / get / hydrate / parent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConfig {
    pub path: &'static str,
    /// Field holding the item array. `None` means the response body itself
    /// is the single item.
    pub items_field: Option<&'static str>,
    pub pagination: Pagination,
    /// Largest page the endpoint accepts.
    pub max_page_size: u64,
    pub filters: Vec<FilterQualMap>,
    pub filter_param: &'static str,
    pub params: Vec<QualParam>,
    pub parent: Option<ParentConfig>,
}

impl ListConfig {
    pub fn new(path: &'static str, items_field: &'static str) -> Self {
        Self {
            path,
            items_field: Some(items_field),
            pagination: Pagination::None,
            max_page_size: 100,
            filters: Vec::new(),
            filter_param: "filter",
            params: Vec::new(),
            parent: None,
        }
    }

    /// An endpoint that answers with one object.
    pub fn single(path: &'static str) -> Self {
        Self {
            items_field: None,
            ..Self::new(path, "")
        }
    }

    pub fn paginated(self, pagination: Pagination, max_page_size: u64) -> Self {
        Self {
            pagination,
            max_page_size,
            ..self
        }
    }

    /// Forward string `=`/`<>` quals on `column` as part of the filter
    /// expression, against `property_path`.
    pub fn filter(mut self, column: &'static str, property_path: &'static str) -> Self {
        self.filters.push(FilterQualMap::string(column, property_path));
        self
    }

    pub fn param(mut self, column: &'static str, param: &'static str) -> Self {
        self.params.push(QualParam { column, param });
        self
    }

    pub fn parent(self, parent: ParentConfig) -> Self {
        Self {
            parent: Some(parent),
            ..self
        }
    }

    /// Page size for a scan: the query limit, capped at the endpoint maximum.
    pub fn page_size(&self, limit: Option<usize>) -> u64 {
        match limit {
            Some(limit) => (limit as u64).clamp(1, self.max_page_size),
            None => self.max_page_size,
        }
    }
}

/// Listing of parent items; the child list runs once per parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentConfig {
    pub path: &'static str,
    pub items_field: &'static str,
    pub pagination: Pagination,
    pub max_page_size: u64,
    /// Field of the parent item holding its key.
    pub key_field: &'static str,
    /// Query parameter the child list takes the parent key in.
    pub param: &'static str,
    /// Child column an `=` qual can restrict parents by.
    pub key_column: &'static str,
}

/// Where a get call puts the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLocation {
    /// `{key}` in the path template.
    Path,
    /// A query parameter.
    Query(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetConfig {
    pub key_column: &'static str,
    /// Item field holding the key, for detail hydration of listed items.
    pub key_field: &'static str,
    pub path: &'static str,
    pub key_location: KeyLocation,
    /// Field holding the item in the response; `None` is the whole body.
    pub item_field: Option<&'static str>,
    pub not_found_codes: Option<Vec<&'static str>>,
}

impl GetConfig {
    /// Get with the key in the path, e.g. `/api/2.0/clusters/{key}`.
    pub fn path(key_column: &'static str, path: &'static str) -> Self {
        Self {
            key_column,
            key_field: key_column,
            path,
            key_location: KeyLocation::Path,
            item_field: None,
            not_found_codes: None,
        }
    }

    /// Get with the key as a query parameter.
    pub fn query(key_column: &'static str, path: &'static str, param: &'static str) -> Self {
        Self {
            key_location: KeyLocation::Query(param),
            ..Self::path(key_column, path)
        }
    }

    pub fn key_field(self, key_field: &'static str) -> Self {
        Self { key_field, ..self }
    }

    pub fn item_field(self, field: &'static str) -> Self {
        Self {
            item_field: Some(field),
            ..self
        }
    }

    pub fn not_found(self, codes: &[&'static str]) -> Self {
        Self {
            not_found_codes: Some(codes.to_vec()),
            ..self
        }
    }

    /// The table-level not-found codes, or the connection's.
    pub fn not_found_predicate(&self, connection: NotFoundPredicate) -> NotFoundPredicate {
        match &self.not_found_codes {
            Some(codes) => NotFoundPredicate::new(codes.iter().copied()),
            None => connection,
        }
    }
}

/// A per-row GET whose path is filled from item fields: `{job_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrateConfig {
    pub name: &'static str,
    pub path: &'static str,
    /// Query parameters taken from item fields, as `(param, field)`.
    pub params: Vec<(&'static str, &'static str)>,
    pub not_found_codes: Option<Vec<&'static str>>,
}

impl HydrateConfig {
    pub fn new(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path,
            params: Vec::new(),
            not_found_codes: None,
        }
    }

    pub fn param(mut self, param: &'static str, field: &'static str) -> Self {
        self.params.push((param, field));
        self
    }

    /// Query parameters for `item`, or `None` if a field is missing.
    pub fn query(&self, item: &ResourceItem) -> Option<Vec<(String, String)>> {
        self.params
            .iter()
            .map(|(param, field)| Some((param.to_string(), item.key(field)?)))
            .collect()
    }

    pub fn not_found(self, codes: &[&'static str]) -> Self {
        Self {
            not_found_codes: Some(codes.to_vec()),
            ..self
        }
    }
}

/// Fill `{field}` placeholders in the path `template` from `item`, each value
/// percent-encoded as one path segment. `{account_id}` is left for the
/// client. Returns `None` if a field is missing.
pub fn fill_template(template: &str, item: &ResourceItem) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let end = rest[start..].find('}')? + start;
        let field = &rest[start + 1..end];
        if field == "account_id" {
            out.push_str("{account_id}");
        } else {
            out.push_str(&urlencoding::encode(&item.key(field)?));
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

// ---------------------------------------------------------------------------
// TableDef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub description: &'static str,
    pub scope: Scope,
    pub columns: Vec<ColumnDef>,
    pub list: ListConfig,
    pub get: Option<GetConfig>,
    pub hydrates: Vec<HydrateConfig>,
    pub key_columns: Vec<KeyColumn>,
}

impl TableDef {
    pub fn new(
        name: &'static str,
        description: &'static str,
        scope: Scope,
        list: ListConfig,
    ) -> Self {
        Self {
            name,
            description,
            scope,
            columns: Vec::new(),
            list,
            get: None,
            hydrates: Vec::new(),
            key_columns: Vec::new(),
        }
    }

    /// Set the columns. Account tables also get the `account_id` column.
    pub fn columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.columns = columns;
        if self.scope == Scope::Account && !self.columns.iter().any(|c| c.name == "account_id") {
            self.columns.push(ColumnDef::account_id());
        }
        self
    }

    pub fn get(self, get: GetConfig) -> Self {
        Self {
            get: Some(get),
            ..self
        }
    }

    pub fn hydrate(mut self, hydrate: HydrateConfig) -> Self {
        self.hydrates.push(hydrate);
        self
    }

    pub fn key_column(mut self, name: &'static str, operators: &'static [QualOperator]) -> Self {
        self.key_columns.push(KeyColumn::new(name, operators));
        self
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns.iter().map(ColumnDef::field).collect::<Vec<_>>(),
        ))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn hydrate_config(&self, name: &str) -> Option<&HydrateConfig> {
        self.hydrates.iter().find(|h| h.name == name)
    }

    /// Whether a qual on `column` with `operator` can narrow the API call.
    pub fn accepts_qual(&self, column: &str, operator: QualOperator) -> bool {
        self.key_columns.iter().any(|k| k.accepts(column, operator))
    }

    /// Check internal consistency: every referenced column, hydrate and get
    /// config exists.
    pub fn validate(&self) -> Result<(), String> {
        if !self.columns.iter().any(|c| c.name == "title") {
            return Err(format!("{}: missing title column", self.name));
        }
        for key in &self.key_columns {
            if self.column(key.name).is_none() {
                return Err(format!("{}: key column '{}' is not a column", self.name, key.name));
            }
        }
        for column in &self.columns {
            if column.detail && self.get.is_none() {
                return Err(format!(
                    "{}: column '{}' needs detail but the table has no get",
                    self.name, column.name
                ));
            }
            if let Some(name) = column.hydrate_name() {
                if self.hydrate_config(name).is_none() {
                    return Err(format!(
                        "{}: column '{}' uses unknown hydrate '{}'",
                        self.name, column.name, name
                    ));
                }
            }
        }
        if let Some(get) = &self.get {
            if !self.accepts_qual(get.key_column, QualOperator::Eq) {
                return Err(format!(
                    "{}: get key '{}' is not an `=` key column",
                    self.name, get.key_column
                ));
            }
        }
        for mapping in &self.list.filters {
            if self.column(mapping.column_name).is_none() {
                return Err(format!(
                    "{}: filter on unknown column '{}'",
                    self.name, mapping.column_name
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jobs() -> TableDef {
        TableDef::new(
            "databricks_job",
            "Jobs",
            Scope::Workspace,
            ListConfig::new("/api/2.1/jobs/list", "jobs").paginated(Pagination::token("limit"), 100),
        )
        .columns(vec![
            ColumnDef::int("job_id", ""),
            ColumnDef::json("job_permissions", "").hydrate("permissions"),
            ColumnDef::title("settings.name"),
        ])
        .get(GetConfig::query("job_id", "/api/2.1/jobs/get", "job_id"))
        .hydrate(HydrateConfig::new("permissions", "/api/2.0/permissions/jobs/{job_id}"))
        .key_column("job_id", EQ)
    }

    #[test]
    fn test_page_size_is_capped() {
        let list = ListConfig::new("/x", "items").paginated(Pagination::scim(), 10_000);
        assert_eq!(list.page_size(None), 10_000);
        assert_eq!(list.page_size(Some(5)), 5);
        assert_eq!(list.page_size(Some(50_000)), 10_000);
        assert_eq!(list.page_size(Some(0)), 1);
    }

    #[test]
    fn test_account_tables_get_account_id() {
        let t = TableDef::new("t", "", Scope::Account, ListConfig::new("/x", "items"))
            .columns(vec![ColumnDef::string("id", "")]);
        assert!(t.column("account_id").is_some());

        let w = TableDef::new("w", "", Scope::Workspace, ListConfig::new("/x", "items"))
            .columns(vec![ColumnDef::string("id", "")]);
        assert!(w.column("account_id").is_none());
    }

    #[test]
    fn test_accepts_qual() {
        let t = jobs();
        assert!(t.accepts_qual("job_id", QualOperator::Eq));
        assert!(!t.accepts_qual("job_id", QualOperator::NotEq));
        assert!(!t.accepts_qual("title", QualOperator::Eq));
    }

    #[test]
    fn test_validate() {
        assert!(jobs().validate().is_ok());

        let mut broken = jobs();
        broken.hydrates.clear();
        assert!(broken.validate().unwrap_err().contains("unknown hydrate"));

        let mut no_get = jobs();
        no_get.columns.push(ColumnDef::json("settings", "").detail());
        no_get.get = None;
        assert!(no_get.validate().unwrap_err().contains("needs detail"));
    }

    #[test]
    fn test_fill_template() {
        let item = ResourceItem::Listed(json!({"job_id": 7, "name": "x"}));
        assert_eq!(
            fill_template("/api/2.0/permissions/jobs/{job_id}", &item).as_deref(),
            Some("/api/2.0/permissions/jobs/7")
        );
        assert_eq!(
            fill_template("/api/2.0/accounts/{account_id}/x/{name}", &item).as_deref(),
            Some("/api/2.0/accounts/{account_id}/x/x")
        );
        assert_eq!(fill_template("/a/{missing}", &item), None);
        assert_eq!(fill_template("/a/{unclosed", &item), None);
    }

    #[test]
    fn test_fill_template_encodes_reserved_characters() {
        let item = ResourceItem::Listed(json!({"id": "../Groups/x?a=1&b#c"}));
        assert_eq!(
            fill_template("/api/2.0/preview/scim/v2/Users/{id}", &item).as_deref(),
            Some("/api/2.0/preview/scim/v2/Users/..%2FGroups%2Fx%3Fa%3D1%26b%23c")
        );
    }

    #[test]
    fn test_hydrate_query_params_come_from_item() {
        let hydrate =
            HydrateConfig::new("acls", "/api/2.0/secrets/acls/list").param("scope", "name");
        let item = ResourceItem::Listed(json!({"name": "a&scope=other"}));
        assert_eq!(
            hydrate.query(&item),
            Some(vec![("scope".to_string(), "a&scope=other".to_string())])
        );
        assert_eq!(hydrate.query(&ResourceItem::Listed(json!({}))), None);
    }

    #[test]
    fn test_get_not_found_override() {
        let get = GetConfig::path("id", "/x/{key}").not_found(&["SCIM_404"]);
        let p = get.not_found_predicate(NotFoundPredicate::default());
        assert_eq!(p.codes(), &["SCIM_404".to_string()]);

        let default = GetConfig::path("id", "/x/{key}")
            .not_found_predicate(NotFoundPredicate::default());
        assert_eq!(default, NotFoundPredicate::default());
    }
}
