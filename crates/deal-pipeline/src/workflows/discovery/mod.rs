//! CSV discovery feed import: turns a listing export into property records
//! ready for `DealFlowEngine::submit_new_record`.

mod normalizer;
mod parser;

use crate::workflows::deal_flow::domain::PropertyRecord;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub enum DiscoveryImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidField {
        row: usize,
        column: &'static str,
        value: String,
    },
}

impl std::fmt::Display for DiscoveryImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryImportError::Io(err) => write!(f, "failed to read discovery feed: {}", err),
            DiscoveryImportError::Csv(err) => write!(f, "invalid discovery CSV data: {}", err),
            DiscoveryImportError::InvalidField { row, column, value } => write!(
                f,
                "row {}: unrecognized value '{}' in column '{}'",
                row, value, column
            ),
        }
    }
}

impl std::error::Error for DiscoveryImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoveryImportError::Io(err) => Some(err),
            DiscoveryImportError::Csv(err) => Some(err),
            DiscoveryImportError::InvalidField { .. } => None,
        }
    }
}

impl From<std::io::Error> for DiscoveryImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for DiscoveryImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct DiscoveryFeedImporter;

impl DiscoveryFeedImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<PropertyRecord>, DiscoveryImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<PropertyRecord>, DiscoveryImportError> {
        let records = parser::parse_records(reader)?;
        tracing::debug!(records = records.len(), "discovery feed parsed");
        Ok(records)
    }
}
