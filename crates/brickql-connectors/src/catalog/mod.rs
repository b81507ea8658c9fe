//! The Databricks tables and their registration into a [`SessionContext`].

mod account;
mod compute;
mod iam;
mod jobs;
mod sql;
mod workspace;

use std::sync::Arc;

use brickql_core::ConnectionContext;
use datafusion::error::Result as DFResult;
use datafusion::prelude::SessionContext;
use tracing::{debug, info};

use crate::provider::ApiTable;
use crate::table::TableDef;

pub struct TableCatalog {
    tables: Vec<Arc<TableDef>>,
}

impl TableCatalog {
    pub fn new() -> Self {
        let tables = vec![
            account::iam_account_user(),
            account::iam_account_group(),
            account::iam_account_service_principal(),
            account::account_budget(),
            iam::iam_user(),
            iam::iam_group(),
            iam::iam_current_user(),
            compute::compute_cluster(),
            jobs::job(),
            jobs::job_run(),
            jobs::pipeline(),
            sql::sql_warehouse(),
            sql::sql_query_history(),
            workspace::workspace_scope(),
            workspace::workspace_secret(),
            workspace::workspace_repo(),
            workspace::settings_token(),
        ];
        Self {
            tables: tables.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn tables(&self) -> &[Arc<TableDef>] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TableDef>> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Register every table against one connection.
    pub fn register(
        &self,
        ctx: &SessionContext,
        connection: Arc<ConnectionContext>,
    ) -> DFResult<()> {
        for table in &self.tables {
            let provider = ApiTable::new(table.clone(), connection.clone());
            ctx.register_table(table.name, Arc::new(provider))?;
            debug!("Registered table '{}'", table.name);
        }
        info!(
            "Registered {} tables for connection '{}'",
            self.tables.len(),
            connection.name()
        );
        Ok(())
    }
}

impl Default for TableCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the full catalog in `ctx`.
pub fn register_tables(ctx: &SessionContext, connection: Arc<ConnectionContext>) -> DFResult<()> {
    TableCatalog::new().register(ctx, connection)
}
