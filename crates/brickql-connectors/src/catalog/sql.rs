//! SQL warehouses and query history.

use brickql_core::Scope;

use crate::column::ColumnDef;
use crate::pagination::Pagination;
use crate::table::{GetConfig, ListConfig, TableDef, EQ};

const QUERY_HISTORY_MAX_PAGE_SIZE: u64 = 100;

pub fn sql_warehouse() -> TableDef {
    TableDef::new(
        "databricks_sql_warehouse",
        "List all SQL warehouses in the workspace.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/sql/warehouses", "warehouses"),
    )
    .columns(vec![
        ColumnDef::string("id", "Unique identifier for the warehouse."),
        ColumnDef::string("auto_stop_mins", "The amount of time in minutes that a SQL warehouse must be idle before it is automatically stopped."),
        ColumnDef::string("cluster_size", "Size of the clusters allocated for this warehouse."),
        ColumnDef::string("creator_name", "Warehouse creator name."),
        ColumnDef::bool("enable_photon", "Whether the warehouse should use Photon optimized clusters."),
        ColumnDef::bool("enable_serverless_compute", "Whether the warehouse should use serverless compute."),
        ColumnDef::string("jdbc_url", "The JDBC URL for the warehouse."),
        ColumnDef::int("max_num_clusters", "Maximum number of clusters that the autoscaler will create to handle concurrent queries."),
        ColumnDef::string("min_num_clusters", "Minimum number of available clusters that will be maintained for this SQL warehouse."),
        ColumnDef::string("name", "Logical name for the warehouse."),
        ColumnDef::int("num_active_sessions", "Current number of active sessions for the warehouse."),
        ColumnDef::int("num_clusters", "Current number of clusters running for the service."),
        ColumnDef::string("spot_instance_policy", "Configurations whether the warehouse should use spot instances."),
        ColumnDef::string("state", "State of the warehouse."),
        ColumnDef::string("warehouse_type", "Warehouse type."),
        ColumnDef::json("channel", "Channel details."),
        ColumnDef::json("health", "Optional health status."),
        ColumnDef::json("odbc_params", "ODBC parameters for the SQL warehouse."),
        ColumnDef::json("tags", "A set of key-value pairs that will be tagged on all resources associated with this SQL warehouse."),
        ColumnDef::title("name"),
    ])
    .get(GetConfig::path("id", "/api/2.0/sql/warehouses/{key}"))
    .key_column("id", EQ)
}

pub fn sql_query_history() -> TableDef {
    TableDef::new(
        "databricks_sql_query_history",
        "List the history of queries through SQL warehouses.",
        Scope::Workspace,
        ListConfig::new("/api/2.0/sql/history/queries", "res")
            .paginated(
                Pagination::Token {
                    size_param: Some("max_results"),
                    token_param: "page_token",
                    token_field: "next_page_token",
                    has_more_field: Some("has_next_page"),
                },
                QUERY_HISTORY_MAX_PAGE_SIZE,
            )
            .param("warehouse_id", "filter_by.warehouse_ids")
            .param("user_id", "filter_by.user_ids")
            .param("status", "filter_by.statuses"),
    )
    .columns(vec![
        ColumnDef::string("query_id", "The query ID."),
        ColumnDef::string("warehouse_id", "Warehouse ID."),
        ColumnDef::int("user_id", "The ID of the user who ran the query."),
        ColumnDef::int("duration", "Total execution time of the query from the client's point of view, in milliseconds."),
        ColumnDef::string("endpoint_id", "Alias for warehouse_id."),
        ColumnDef::string("error_message", "Message describing why the query could not complete."),
        ColumnDef::int("executed_as_user_id", "The ID of the user whose credentials were used to run the query."),
        ColumnDef::string("executed_as_user_name", "The email address or username of the user whose credentials were used to run the query."),
        ColumnDef::int("execution_end_time_ms", "The time execution of the query ended."),
        ColumnDef::bool("is_final", "Whether more updates for the query are expected."),
        ColumnDef::string("lookup_key", "A key that can be used to look up query details."),
        ColumnDef::string("plans_state", "Whether plans exist for the execution, or the reason why they are missing."),
        ColumnDef::int("query_end_time_ms", "The time the query ended."),
        ColumnDef::int("query_start_time_ms", "The time the query started."),
        ColumnDef::string("query_text", "The text of the query."),
        ColumnDef::int("rows_produced", "The number of results returned by the query."),
        ColumnDef::string("spark_ui_url", "URL to the query plan."),
        ColumnDef::string("statement_type", "Type of statement for this query."),
        ColumnDef::string("status", "Query status."),
        ColumnDef::string("user_name", "The email address or username of the user who ran the query."),
        ColumnDef::json("channel_used", "Channel information for the SQL warehouse at the time of query execution."),
        ColumnDef::json("metrics", "Metrics about query execution."),
        ColumnDef::title("query_id"),
    ])
    .key_column("warehouse_id", EQ)
    .key_column("user_id", EQ)
    .key_column("status", EQ)
}
