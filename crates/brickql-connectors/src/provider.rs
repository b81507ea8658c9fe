//! DataFusion table provider over a REST API table definition.
//!
//! Contains both `ApiTable` (the `TableProvider`) and `ApiScanExec` (the
//! lazy `ExecutionPlan` that runs one scan). Rows are streamed out one
//! batch per fetched page.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::catalog::Session;
use datafusion::datasource::TableProvider;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::execution::TaskContext;
use datafusion::logical_expr::{TableProviderFilterPushDown, TableType};
use datafusion::physical_expr::EquivalenceProperties;
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::stream::RecordBatchReceiverStreamBuilder;
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, Partitioning, PlanProperties,
    SendableRecordBatchStream,
};
use datafusion::prelude::Expr;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use brickql_core::ConnectionContext;

use crate::batch::rows_to_record_batch;
use crate::column::ColumnDef;
use crate::error::ScanError;
use crate::pagination::RowSink;
use crate::quals::Qual;
use crate::scan::TableScan;
use crate::table::TableDef;

/// Batches buffered between the scan task and the consumer.
const CHANNEL_CAPACITY: usize = 2;

// ===========================================================================
// ApiTable: the TableProvider
// ===========================================================================

/// A DataFusion `TableProvider` for one API-backed table.
///
/// No request is made until the plan is executed. Filters on the table's
/// key columns are pushed down as `Inexact`, so DataFusion re-checks them.
pub struct ApiTable {
    table: Arc<TableDef>,
    connection: Arc<ConnectionContext>,
    schema: SchemaRef,
}

impl fmt::Debug for ApiTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTable")
            .field("table", &self.table.name)
            .field("scope", &self.table.scope)
            .field("connection", &self.connection.name())
            .finish()
    }
}

impl ApiTable {
    pub fn new(table: Arc<TableDef>, connection: Arc<ConnectionContext>) -> Self {
        let schema = table.schema();
        Self {
            table,
            connection,
            schema,
        }
    }

    pub fn definition(&self) -> &TableDef {
        &self.table
    }
}

#[async_trait]
impl TableProvider for ApiTable {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> DFResult<Vec<TableProviderFilterPushDown>> {
        Ok(filters
            .iter()
            .map(|expr| match Qual::from_expr(expr) {
                Some(q) if self.table.accepts_qual(&q.column, q.operator) => {
                    TableProviderFilterPushDown::Inexact
                }
                _ => TableProviderFilterPushDown::Unsupported,
            })
            .collect())
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        let scan = TableScan::new(
            Arc::clone(&self.table),
            Arc::clone(&self.connection),
            projection,
            filters,
            limit,
        );
        let schema = match projection {
            Some(p) => Arc::new(self.schema.project(p)?),
            None => Arc::clone(&self.schema),
        };
        Ok(Arc::new(ApiScanExec::new(scan, schema)))
    }
}

// ===========================================================================
// ApiScanExec: the lazy ExecutionPlan
// ===========================================================================

/// Leaf `ExecutionPlan` with a single partition. The scan runs in a task
/// spawned by `execute()` and stops once the stream is dropped or the
/// limit is reached.
#[derive(Debug)]
pub struct ApiScanExec {
    scan: TableScan,
    schema: SchemaRef,
    properties: PlanProperties,
}

impl ApiScanExec {
    pub fn new(scan: TableScan, schema: SchemaRef) -> Self {
        let properties = PlanProperties::new(
            EquivalenceProperties::new(Arc::clone(&schema)),
            Partitioning::UnknownPartitioning(1),
            EmissionType::Incremental,
            Boundedness::Bounded,
        );
        Self {
            scan,
            schema,
            properties,
        }
    }

    pub fn scan(&self) -> &TableScan {
        &self.scan
    }
}

impl ExecutionPlan for ApiScanExec {
    fn name(&self) -> &str {
        "ApiScanExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(
        self: Arc<Self>,
        children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        if children.is_empty() {
            Ok(self)
        } else {
            Err(DataFusionError::Internal(
                "ApiScanExec is a leaf node and cannot have children".to_string(),
            ))
        }
    }

    fn execute(
        &self,
        partition: usize,
        _context: Arc<TaskContext>,
    ) -> DFResult<SendableRecordBatchStream> {
        if partition != 0 {
            return Err(DataFusionError::Internal(format!(
                "ApiScanExec only supports partition 0, got {}",
                partition
            )));
        }

        let scan = self.scan.clone();
        let schema = Arc::clone(&self.schema);
        Ok(scan_stream(Arc::clone(&self.schema), move |tx| async move {
            let mut sink = BatchSink::new(schema, scan.projected_columns(), scan.limit(), tx);
            scan.run(&mut sink).await?;
            Ok(())
        }))
    }
}

/// Runs `producer` on its own task and streams what it sends.
///
/// An error returned by the producer ends the stream with that error. A
/// panic in the producer is resumed on the consumer.
fn scan_stream<F, Fut>(schema: SchemaRef, producer: F) -> SendableRecordBatchStream
where
    F: FnOnce(mpsc::Sender<DFResult<RecordBatch>>) -> Fut,
    Fut: Future<Output = DFResult<()>> + Send + 'static,
{
    let mut builder = RecordBatchReceiverStreamBuilder::new(schema, CHANNEL_CAPACITY);
    let tx = builder.tx();
    builder.spawn(producer(tx));
    builder.build()
}

impl DisplayAs for ApiScanExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ApiScanExec: table={}", self.scan.table().name)?;
        if !self.scan.quals().is_empty() {
            write!(f, ", quals={:?}", self.scan.quals())?;
        }
        if let Some(limit) = self.scan.limit() {
            write!(f, ", limit={}", limit)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BatchSink
// ---------------------------------------------------------------------------

/// Buffers one page of rows and sends it downstream as a `RecordBatch`.
struct BatchSink {
    schema: SchemaRef,
    columns: Vec<ColumnDef>,
    buffer: Vec<Vec<Value>>,
    emitted: u64,
    limit: Option<u64>,
    tx: mpsc::Sender<DFResult<RecordBatch>>,
}

impl BatchSink {
    fn new(
        schema: SchemaRef,
        columns: Vec<ColumnDef>,
        limit: Option<usize>,
        tx: mpsc::Sender<DFResult<RecordBatch>>,
    ) -> Self {
        Self {
            schema,
            columns,
            buffer: Vec::new(),
            emitted: 0,
            limit: limit.map(|l| l as u64),
            tx,
        }
    }
}

#[async_trait]
impl RowSink<Vec<Value>> for BatchSink {
    type Error = ScanError;

    async fn emit(&mut self, row: Vec<Value>) -> Result<(), ScanError> {
        self.buffer.push(row);
        self.emitted += 1;
        Ok(())
    }

    fn rows_remaining(&self) -> u64 {
        if self.tx.is_closed() {
            return 0;
        }
        match self.limit {
            Some(limit) => limit.saturating_sub(self.emitted),
            None => u64::MAX,
        }
    }

    async fn page_complete(&mut self) -> Result<(), ScanError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buffer);
        let batch = rows_to_record_batch(Arc::clone(&self.schema), &self.columns, &rows)?;
        if self.tx.send(Ok(batch)).await.is_err() {
            debug!("scan consumer went away");
        }
        Ok(())
    }
}
