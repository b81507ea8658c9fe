//! Table scans against the REST API.
//!
//! A scan picks one access path: a get by key when the quals pin the key
//! column to one value, a parent/child listing, or a plain listing. Items
//! are hydrated as the projected columns require and handed to the row
//! sink as resolved column values.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::prelude::Expr;
use serde_json::Value;
use tracing::{debug, error, info};

use brickql_core::{ApiClient, ConnectionContext, ConnectorError, NotFoundPredicate};

use crate::column::{ColumnDef, Source};
use crate::item::{ResourceItem, Row};
use crate::pagination::{stream_list, ListRequest, Page, PageSource, Pagination, RowSink, ScanOutcome};
use crate::quals::{build_query_filter, QualMap};
use crate::retry::RetryPolicy;
use crate::table::{fill_template, GetConfig, HydrateConfig, KeyLocation, TableDef};

fn log_api_error(table: &str, operation: &str, err: &ConnectorError) {
    error!(table, operation, error = %err, "api_error");
}

/// Pull the item array out of a list response.
fn extract_items(response: Value, items_field: Option<&str>) -> Result<Vec<Value>, ConnectorError> {
    let Some(field) = items_field else {
        return Ok(vec![response]);
    };
    match response {
        Value::Object(mut map) => match map.remove(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(ConnectorError::Decode(format!(
                "expected '{}' to be an array, got {}",
                field, other
            ))),
        },
        other => Err(ConnectorError::Decode(format!(
            "expected an object with '{}', got {}",
            field, other
        ))),
    }
}

// ---------------------------------------------------------------------------
// List source
// ---------------------------------------------------------------------------

/// One list endpoint as a [`PageSource`].
struct ApiListSource<'a> {
    table: &'a str,
    operation: &'static str,
    client: &'a ApiClient,
    retry: &'a RetryPolicy,
    path: &'a str,
    items_field: Option<&'a str>,
    pagination: Pagination,
    parent: Option<Arc<Value>>,
}

#[async_trait]
impl PageSource for ApiListSource<'_> {
    type Item = ResourceItem;

    async fn fetch(&self, request: &ListRequest) -> Result<Page<ResourceItem>, ConnectorError> {
        let mut query = request.params.clone();
        query.extend(self.pagination.query_params(request));

        let client = self.client;
        let path = self.path;
        let query = &query;
        let response = self
            .retry
            .run(self.operation, || client.get_json(path, query))
            .await
            .inspect_err(|e| log_api_error(self.table, self.operation, e))?;

        let count = match self.items_field {
            Some(field) => response.get(field).and_then(Value::as_array).map_or(0, Vec::len),
            None => 1,
        };
        let next = self.pagination.next_cursor(&response, request, count);
        let items = extract_items(response, self.items_field)?;
        Ok(Page {
            items: self.wrap(items),
            next,
        })
    }
}

impl ApiListSource<'_> {
    fn wrap(&self, items: Vec<Value>) -> Vec<ResourceItem> {
        items
            .into_iter()
            .map(|item| match &self.parent {
                Some(parent) => ResourceItem::Child {
                    parent: Arc::clone(parent),
                    item,
                },
                None => ResourceItem::Listed(item),
            })
            .collect()
    }
}

/// Collects every item; used for parent listings.
#[derive(Default)]
struct CollectSink {
    items: Vec<ResourceItem>,
}

#[async_trait]
impl RowSink<ResourceItem> for CollectSink {
    type Error = ConnectorError;

    async fn emit(&mut self, item: ResourceItem) -> Result<(), ConnectorError> {
        self.items.push(item);
        Ok(())
    }

    fn rows_remaining(&self) -> u64 {
        u64::MAX
    }
}

// ---------------------------------------------------------------------------
// Row filling
// ---------------------------------------------------------------------------

/// Turns items into projected column values, making whatever extra
/// requests the projected columns need.
struct RowFiller<'a> {
    table: &'a TableDef,
    client: &'a ApiClient,
    retry: &'a RetryPolicy,
    not_found: &'a NotFoundPredicate,
    columns: &'a [ColumnDef],
    account_id: Option<&'a str>,
    needs_detail: bool,
    hydrates: Vec<&'a HydrateConfig>,
}

impl RowFiller<'_> {
    async fn fill(&self, item: ResourceItem) -> Result<Vec<Value>, ConnectorError> {
        let mut row = Row::new(item);

        if self.needs_detail && !row.has_detail() {
            if let Some(get) = &self.table.get {
                if let Some(key) = row.item.key(get.key_field) {
                    if let Some(detail) = self.get_item(get, &key, "hydrate:detail").await? {
                        row.set_detail(detail);
                    }
                }
            }
        }

        for hydrate in &self.hydrates {
            let value = self.run_hydrate(hydrate, &row.item).await?;
            row.set_hydrate(hydrate.name, value);
        }

        Ok(self
            .columns
            .iter()
            .map(|c| row.resolve(c, self.account_id))
            .collect())
    }

    /// Call the get endpoint. A not-found answer is `Ok(None)`.
    async fn get_item(
        &self,
        get: &GetConfig,
        key: &str,
        operation: &str,
    ) -> Result<Option<Value>, ConnectorError> {
        let (path, query) = match get.key_location {
            KeyLocation::Path => (
                get.path.replace("{key}", &urlencoding::encode(key)),
                Vec::new(),
            ),
            KeyLocation::Query(param) => (
                get.path.to_string(),
                vec![(param.to_string(), key.to_string())],
            ),
        };

        let client = self.client;
        let (path, query) = (&path, &query);
        match self.retry.run(operation, || client.get_json(path, query)).await {
            Ok(response) => Ok(match get.item_field {
                Some(field) => response.get(field).cloned(),
                None => Some(response),
            }),
            Err(e) if get.not_found_predicate(self.not_found.clone()).matches(&e) => {
                debug!(table = self.table.name, operation, key, "not found");
                Ok(None)
            }
            Err(e) => {
                log_api_error(self.table.name, operation, &e);
                Err(e)
            }
        }
    }

    /// Run a per-row hydrate. Not-found yields `Null`.
    async fn run_hydrate(
        &self,
        hydrate: &HydrateConfig,
        item: &ResourceItem,
    ) -> Result<Value, ConnectorError> {
        let (Some(path), Some(query)) = (fill_template(hydrate.path, item), hydrate.query(item))
        else {
            return Ok(Value::Null);
        };
        let operation = format!("hydrate:{}", hydrate.name);
        let not_found = match &hydrate.not_found_codes {
            Some(codes) => NotFoundPredicate::new(codes.iter().copied()),
            None => self.not_found.clone(),
        };

        let client = self.client;
        let (path, query) = (&path, &query);
        match self.retry.run(&operation, || client.get_json(path, query)).await {
            Ok(value) => Ok(value),
            Err(e) if not_found.matches(&e) => Ok(Value::Null),
            Err(e) => {
                log_api_error(self.table.name, &operation, &e);
                Err(e)
            }
        }
    }
}

/// Adapts an output sink of column values to a sink of items.
struct FillingSink<'a, K: ?Sized> {
    filler: &'a RowFiller<'a>,
    out: &'a mut K,
}

#[async_trait]
impl<K> RowSink<ResourceItem> for FillingSink<'_, K>
where
    K: RowSink<Vec<Value>> + ?Sized,
{
    type Error = K::Error;

    async fn emit(&mut self, item: ResourceItem) -> Result<(), K::Error> {
        let values = self.filler.fill(item).await?;
        self.out.emit(values).await
    }

    fn rows_remaining(&self) -> u64 {
        self.out.rows_remaining()
    }

    async fn page_complete(&mut self) -> Result<(), K::Error> {
        self.out.page_complete().await
    }
}

// ---------------------------------------------------------------------------
// TableScan
// ---------------------------------------------------------------------------

/// Everything one scan needs, owned so it can move into a task.
#[derive(Debug, Clone)]
pub struct TableScan {
    table: Arc<TableDef>,
    connection: Arc<ConnectionContext>,
    projection: Vec<usize>,
    quals: QualMap,
    limit: Option<usize>,
}

impl TableScan {
    pub fn new(
        table: Arc<TableDef>,
        connection: Arc<ConnectionContext>,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> Self {
        let projection = match projection {
            Some(p) => p.clone(),
            None => (0..table.columns.len()).collect(),
        };
        Self {
            quals: QualMap::from_filters(filters),
            table,
            connection,
            projection,
            limit,
        }
    }

    pub fn with_quals(mut self, quals: QualMap) -> Self {
        self.quals = quals;
        self
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    pub fn quals(&self) -> &QualMap {
        &self.quals
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn projected_columns(&self) -> Vec<ColumnDef> {
        self.projection
            .iter()
            .filter_map(|&i| self.table.columns.get(i).cloned())
            .collect()
    }

    /// The get key, when the quals pin the key column to exactly one value.
    fn get_key(&self) -> Option<(&GetConfig, String)> {
        let get = self.table.get.as_ref()?;
        let value = self.quals.equals_value(get.key_column)?;
        Some((get, value.to_param()))
    }

    /// Query parameters derived from quals: the filter expression and any
    /// `=` quals forwarded as plain parameters.
    pub fn list_params(&self) -> Vec<(String, String)> {
        let list = &self.table.list;
        let mut params = Vec::new();

        let filter = build_query_filter(&list.filters, &self.quals);
        if !filter.is_empty() {
            params.push((list.filter_param.to_string(), filter));
        }
        for qp in &list.params {
            if let Some(value) = self.quals.equals_value(qp.column) {
                params.push((qp.param.to_string(), value.to_param()));
            }
        }
        params
    }

    /// Run the scan, writing projected column values to `out`.
    pub async fn run<K>(&self, out: &mut K) -> Result<ScanOutcome, K::Error>
    where
        K: RowSink<Vec<Value>> + ?Sized,
    {
        let table = self.table.as_ref();
        let columns = self.projected_columns();

        let client = self.connection.client(table.scope).await?;
        let account_id = if columns.iter().any(|c| c.source == Source::AccountId) {
            Some(self.connection.account_id()?)
        } else {
            None
        };

        let hydrate_names: BTreeSet<&str> =
            columns.iter().filter_map(ColumnDef::hydrate_name).collect();
        let retry = RetryPolicy::new(
            self.connection.retryable_predicate(),
            self.connection.retry_settings(),
        );
        let not_found = self.connection.not_found_predicate();

        let filler = RowFiller {
            table,
            client: &client,
            retry: &retry,
            not_found: &not_found,
            columns: &columns,
            account_id,
            needs_detail: columns.iter().any(|c| c.detail),
            hydrates: hydrate_names
                .iter()
                .filter_map(|name| table.hydrate_config(name))
                .collect(),
        };

        info!(
            table = table.name,
            scope = %table.scope,
            columns = columns.len(),
            limit = ?self.limit,
            "scan"
        );

        let mut sink = FillingSink {
            filler: &filler,
            out,
        };

        let outcome = if let Some((get, key)) = self.get_key() {
            self.run_get(&filler, get, &key, &mut sink).await?
        } else if table.list.parent.is_some() {
            self.run_parent_list(&client, &retry, &mut sink).await?
        } else {
            let source = ApiListSource {
                table: table.name,
                operation: "list",
                client: &client,
                retry: &retry,
                path: table.list.path,
                items_field: table.list.items_field,
                pagination: table.list.pagination,
                parent: None,
            };
            let mut request = ListRequest::new(table.list.page_size(self.limit));
            request.params = self.list_params();
            stream_list(&source, request, &mut sink).await?
        };

        debug!(table = table.name, ?outcome, "scan finished");
        Ok(outcome)
    }

    async fn run_get<K>(
        &self,
        filler: &RowFiller<'_>,
        get: &GetConfig,
        key: &str,
        sink: &mut FillingSink<'_, K>,
    ) -> Result<ScanOutcome, K::Error>
    where
        K: RowSink<Vec<Value>> + ?Sized,
    {
        debug!(table = self.table.name, key, "get by key");
        if let Some(item) = filler.get_item(get, key, "get").await? {
            sink.emit(ResourceItem::Fetched(item)).await?;
        }
        sink.page_complete().await?;
        Ok(ScanOutcome::Exhausted)
    }

    async fn run_parent_list<K>(
        &self,
        client: &ApiClient,
        retry: &RetryPolicy,
        sink: &mut FillingSink<'_, K>,
    ) -> Result<ScanOutcome, K::Error>
    where
        K: RowSink<Vec<Value>> + ?Sized,
    {
        let table = self.table.as_ref();
        let Some(parent) = &table.list.parent else {
            return Ok(ScanOutcome::Exhausted);
        };

        let parent_source = ApiListSource {
            table: table.name,
            operation: "parent",
            client,
            retry,
            path: parent.path,
            items_field: Some(parent.items_field),
            pagination: parent.pagination,
            parent: None,
        };
        let mut parents = CollectSink::default();
        stream_list(&parent_source, ListRequest::new(parent.max_page_size), &mut parents).await?;

        let wanted = self.quals.equals_string(parent.key_column);
        let params = self.list_params();

        for parent_item in parents.items {
            let Some(key) = parent_item.key(parent.key_field) else {
                continue;
            };
            if wanted.is_some_and(|w| w != key) {
                continue;
            }

            let source = ApiListSource {
                table: table.name,
                operation: "list",
                client,
                retry,
                path: table.list.path,
                items_field: table.list.items_field,
                pagination: table.list.pagination,
                parent: Some(Arc::new(parent_item.value().clone())),
            };
            let mut request = ListRequest::new(table.list.page_size(self.limit));
            request.params = params.clone();
            request.params.push((parent.param.to_string(), key));

            if stream_list(&source, request, &mut *sink).await? == ScanOutcome::Cancelled {
                return Ok(ScanOutcome::Cancelled);
            }
        }
        Ok(ScanOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::pagination::Pagination;
    use crate::quals::{Qual, QualOperator, QualValue};
    use crate::table::{GetConfig, HydrateConfig, ListConfig, ParentConfig, EQ};
    use brickql_core::{ConnectionConfig, Environment, Scope};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct VecSink {
        rows: Vec<Vec<Value>>,
        limit: Option<u64>,
    }

    impl VecSink {
        fn new() -> Self {
            Self {
                rows: Vec::new(),
                limit: None,
            }
        }
    }

    #[async_trait]
    impl RowSink<Vec<Value>> for VecSink {
        type Error = ConnectorError;

        async fn emit(&mut self, item: Vec<Value>) -> Result<(), ConnectorError> {
            self.rows.push(item);
            Ok(())
        }

        fn rows_remaining(&self) -> u64 {
            self.limit
                .map_or(u64::MAX, |l| l.saturating_sub(self.rows.len() as u64))
        }
    }

    fn connection(server: &MockServer) -> Arc<ConnectionContext> {
        Arc::new(ConnectionContext::with_environment(
            "test",
            ConnectionConfig {
                account_id: Some("acc-1".into()),
                workspace_host: Some(server.uri()),
                workspace_token: Some("dapi".into()),
                retry_min_delay_ms: Some(1),
                retry_max_delay_ms: Some(2),
                ..Default::default()
            },
            Environment::default(),
        ))
    }

    fn pipelines() -> Arc<TableDef> {
        Arc::new(
            TableDef::new(
                "databricks_pipeline",
                "",
                Scope::Workspace,
                ListConfig::new("/api/2.0/pipelines", "statuses")
                    .paginated(Pagination::token("max_results"), 100),
            )
            .columns(vec![
                ColumnDef::string("pipeline_id", ""),
                ColumnDef::string("name", ""),
                ColumnDef::json("spec", "").detail(),
                ColumnDef::json("pipeline_permissions", "").hydrate("permissions"),
                ColumnDef::title("name"),
            ])
            .get(GetConfig::path("pipeline_id", "/api/2.0/pipelines/{key}"))
            .hydrate(HydrateConfig::new(
                "permissions",
                "/api/2.0/permissions/pipelines/{pipeline_id}",
            ))
            .key_column("pipeline_id", EQ),
        )
    }

    fn secrets() -> Arc<TableDef> {
        Arc::new(
            TableDef::new(
                "databricks_workspace_secret",
                "",
                Scope::Workspace,
                ListConfig::new("/api/2.0/secrets/list", "secrets").parent(ParentConfig {
                    path: "/api/2.0/secrets/scopes/list",
                    items_field: "scopes",
                    pagination: Pagination::None,
                    max_page_size: 100,
                    key_field: "name",
                    param: "scope",
                    key_column: "scope_name",
                }),
            )
            .columns(vec![
                ColumnDef::string("key", ""),
                ColumnDef::string("scope_name", "").parent("name"),
                ColumnDef::title("key"),
            ])
            .key_column("scope_name", EQ),
        )
    }

    fn eq(column: &str, value: &str) -> QualMap {
        QualMap::new().with(Qual::new(
            column,
            QualOperator::Eq,
            QualValue::String(value.into()),
        ))
    }

    #[tokio::test]
    async fn test_list_follows_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines"))
            .and(query_param("page_token", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statuses": [{"pipeline_id": "p3", "name": "c"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines"))
            .and(query_param("max_results", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statuses": [{"pipeline_id": "p1", "name": "a"}, {"pipeline_id": "p2", "name": "b"}],
                "next_page_token": "t2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let scan = TableScan::new(pipelines(), connection(&server), Some(&vec![0, 1]), &[], None);
        let mut sink = VecSink::new();
        let outcome = scan.run(&mut sink).await.unwrap();

        assert_eq!(outcome, ScanOutcome::Exhausted);
        let ids: Vec<_> = sink.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec![json!("p1"), json!("p2"), json!("p3")]);
    }

    #[tokio::test]
    async fn test_key_qual_uses_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines/p9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pipeline_id": "p9", "name": "nine", "spec": {"continuous": true}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let scan = TableScan::new(pipelines(), connection(&server), Some(&vec![0, 2]), &[], None)
            .with_quals(eq("pipeline_id", "p9"));
        let mut sink = VecSink::new();
        scan.run(&mut sink).await.unwrap();

        assert_eq!(sink.rows, vec![vec![json!("p9"), json!({"continuous": true})]]);
    }

    #[tokio::test]
    async fn test_get_key_is_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines/..%2Fx%3Fy%3D1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pipeline_id": "../x?y=1", "name": "odd"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let scan = TableScan::new(pipelines(), connection(&server), Some(&vec![0, 1]), &[], None)
            .with_quals(eq("pipeline_id", "../x?y=1"));
        let mut sink = VecSink::new();
        scan.run(&mut sink).await.unwrap();

        assert_eq!(sink.rows, vec![vec![json!("../x?y=1"), json!("odd")]]);
    }

    #[tokio::test]
    async fn test_hydrate_query_value_is_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/scopes/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "scopes": [{"name": "a&scope=other"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/acls/list"))
            .and(query_param("scope", "a&scope=other"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"principal": "users", "permission": "READ"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let table = Arc::new(
            TableDef::new(
                "databricks_workspace_scope",
                "",
                Scope::Workspace,
                ListConfig::new("/api/2.0/secrets/scopes/list", "scopes"),
            )
            .columns(vec![
                ColumnDef::string("name", ""),
                ColumnDef::json("acls", "").hydrate_path("acls", "items"),
                ColumnDef::title("name"),
            ])
            .hydrate(
                HydrateConfig::new("acls", "/api/2.0/secrets/acls/list").param("scope", "name"),
            ),
        );
        let scan = TableScan::new(table, connection(&server), Some(&vec![0, 1]), &[], None);
        let mut sink = VecSink::new();
        scan.run(&mut sink).await.unwrap();

        assert_eq!(
            sink.rows,
            vec![vec![
                json!("a&scope=other"),
                json!([{"principal": "users", "permission": "READ"}])
            ]]
        );

        let requests = server.received_requests().await.unwrap();
        let acl_request = requests
            .iter()
            .find(|r| r.url.path() == "/api/2.0/secrets/acls/list")
            .unwrap();
        assert_eq!(acl_request.url.query_pairs().count(), 1);
    }

    #[tokio::test]
    async fn test_get_not_found_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error_code": "RESOURCE_DOES_NOT_EXIST",
                "message": "Pipeline nope does not exist"
            })))
            .mount(&server)
            .await;

        let scan = TableScan::new(pipelines(), connection(&server), None, &[], None)
            .with_quals(eq("pipeline_id", "nope"));
        let mut sink = VecSink::new();
        let outcome = scan.run(&mut sink).await.unwrap();

        assert_eq!(outcome, ScanOutcome::Exhausted);
        assert!(sink.rows.is_empty());
    }

    #[tokio::test]
    async fn test_hydrates_only_when_projected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statuses": [{"pipeline_id": "p1", "name": "a"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/permissions/pipelines/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object_id": "/pipelines/p1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pipeline_id": "p1", "spec": {"name": "a"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let conn = connection(&server);

        // no hydrated columns projected
        let mut sink = VecSink::new();
        TableScan::new(pipelines(), Arc::clone(&conn), Some(&vec![0]), &[], None)
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(sink.rows, vec![vec![json!("p1")]]);

        // detail and permissions projected
        let mut sink = VecSink::new();
        TableScan::new(pipelines(), conn, Some(&vec![2, 3]), &[], None)
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(
            sink.rows,
            vec![vec![json!({"name": "a"}), json!({"object_id": "/pipelines/p1"})]]
        );
    }

    #[tokio::test]
    async fn test_hydrate_not_found_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statuses": [{"pipeline_id": "p1"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/permissions/pipelines/p1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut sink = VecSink::new();
        TableScan::new(pipelines(), connection(&server), Some(&vec![0, 3]), &[], None)
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(sink.rows, vec![vec![json!("p1"), Value::Null]]);
    }

    #[tokio::test]
    async fn test_parent_child_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/scopes/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "scopes": [{"name": "s1"}, {"name": "s2"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/list"))
            .and(query_param("scope", "s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"key": "a"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/list"))
            .and(query_param("scope", "s2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"key": "b"}, {"key": "c"}]
            })))
            .mount(&server)
            .await;

        let mut sink = VecSink::new();
        TableScan::new(secrets(), connection(&server), Some(&vec![0, 1]), &[], None)
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(
            sink.rows,
            vec![
                vec![json!("a"), json!("s1")],
                vec![json!("b"), json!("s2")],
                vec![json!("c"), json!("s2")],
            ]
        );

        let mut sink = VecSink::new();
        TableScan::new(secrets(), connection(&server), Some(&vec![0]), &[], None)
            .with_quals(eq("scope_name", "s2"))
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(sink.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_budget_spans_parents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/scopes/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "scopes": [{"name": "s1"}, {"name": "s2"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/list"))
            .and(query_param("scope", "s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"key": "a"}, {"key": "b"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/secrets/list"))
            .and(query_param("scope", "s2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"secrets": []})))
            .expect(0)
            .mount(&server)
            .await;

        let mut sink = VecSink::new();
        sink.limit = Some(2);
        let outcome = TableScan::new(secrets(), connection(&server), None, &[], Some(2))
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::Cancelled);
        assert_eq!(sink.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error_code": "REQUEST_LIMIT_EXCEEDED", "message": "slow down"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/pipelines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statuses": [{"pipeline_id": "p1"}]
            })))
            .mount(&server)
            .await;

        let mut sink = VecSink::new();
        TableScan::new(pipelines(), connection(&server), Some(&vec![0]), &[], None)
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(sink.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unclassified_error_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error_code": "PERMISSION_DENIED", "message": "no"
            })))
            .mount(&server)
            .await;

        let mut sink = VecSink::new();
        let err = TableScan::new(pipelines(), connection(&server), None, &[], None)
            .run(&mut sink)
            .await
            .unwrap_err();
        assert_eq!(err.api_error().unwrap().error_code, "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn test_account_id_column_from_connection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/accounts/acc-1/scim/v2/Groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Resources": [{"id": "g1", "displayName": "admins"}]
            })))
            .mount(&server)
            .await;

        let table = Arc::new(
            TableDef::new(
                "groups",
                "",
                Scope::Account,
                ListConfig::new("/api/2.0/accounts/{account_id}/scim/v2/Groups", "Resources")
                    .paginated(Pagination::scim(), 10_000),
            )
            .columns(vec![
                ColumnDef::string("display_name", ""),
                ColumnDef::title("displayName"),
            ]),
        );
        let conn = Arc::new(ConnectionContext::with_environment(
            "test",
            ConnectionConfig {
                account_id: Some("acc-1".into()),
                account_host: Some(server.uri()),
                account_token: Some("t".into()),
                ..Default::default()
            },
            Environment::default(),
        ));

        let mut sink = VecSink::new();
        TableScan::new(table, conn, None, &[], None)
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(
            sink.rows,
            vec![vec![json!("admins"), json!("admins"), json!("acc-1")]]
        );
    }

    #[test]
    fn test_extract_items() {
        assert_eq!(
            extract_items(json!({"jobs": [1, 2]}), Some("jobs")).unwrap(),
            vec![json!(1), json!(2)]
        );
        assert!(extract_items(json!({}), Some("jobs")).unwrap().is_empty());
        assert!(extract_items(json!({"jobs": "x"}), Some("jobs")).is_err());
        assert_eq!(
            extract_items(json!({"userName": "me"}), None).unwrap(),
            vec![json!({"userName": "me"})]
        );
    }
}
