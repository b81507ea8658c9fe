//! brickql connectors - Databricks API resources as DataFusion tables
//!
//! This crate provides:
//! - declarative table definitions (columns, list/get endpoints, hydrates)
//! - the paginated list protocol with qual pushdown and row budgets
//! - retry with exponential backoff around every API call
//! - `ApiTable`, a DataFusion `TableProvider` streaming rows from the API

pub mod batch;
pub mod catalog;
pub mod column;
pub mod error;
pub mod item;
pub mod pagination;
pub mod provider;
pub mod quals;
pub mod retry;
pub mod scan;
pub mod table;

pub use catalog::{register_tables, TableCatalog};
pub use column::{ColumnDef, ColumnType, Source};
pub use error::ScanError;
pub use item::{ResourceItem, Row};
pub use pagination::{
    stream_list, Cursor, ListRequest, Page, PageSource, Pagination, RowSink, ScanOutcome,
};
pub use provider::{ApiScanExec, ApiTable};
pub use quals::{build_query_filter, FilterQualMap, Qual, QualMap, QualOperator, QualType, QualValue};
pub use retry::RetryPolicy;
pub use scan::TableScan;
pub use table::{
    GetConfig, HydrateConfig, KeyColumn, KeyLocation, ListConfig, ParentConfig, TableDef, EQ,
    EQ_NE,
};
