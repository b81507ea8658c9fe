//! Errors raised while scanning a table.

use std::fmt;

use brickql_core::ConnectorError;
use datafusion::error::DataFusionError;

/// A scan fails either talking to the API or building Arrow output.
#[derive(Debug)]
pub enum ScanError {
    Connector(ConnectorError),
    DataFusion(DataFusionError),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Connector(e) => write!(f, "{}", e),
            ScanError::DataFusion(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Connector(e) => Some(e),
            ScanError::DataFusion(e) => Some(e),
        }
    }
}

impl From<ConnectorError> for ScanError {
    fn from(e: ConnectorError) -> Self {
        ScanError::Connector(e)
    }
}

impl From<DataFusionError> for ScanError {
    fn from(e: DataFusionError) -> Self {
        ScanError::DataFusion(e)
    }
}

impl From<ScanError> for DataFusionError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::DataFusion(e) => e,
            ScanError::Connector(e) => DataFusionError::External(Box::new(e)),
        }
    }
}
