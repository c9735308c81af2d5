//! Persisted layout records, one per topology.

use super::topology::Topology;
use crate::error::Result;
use crate::service::ServiceKey;
use crate::store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Relative flex weight per service for linear topologies.
pub type LinearWeights = BTreeMap<ServiceKey, f64>;

/// Proportional column widths and row heights for the grid topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GridSizes {
    pub column_sizes: Vec<f64>,
    pub row_sizes: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutRecord {
    Linear(LinearWeights),
    Grid(GridSizes),
}

/// Reads and writes `wrapper-sizes-{topology}` records.
#[derive(Clone)]
pub struct LayoutRecords {
    store: Arc<dyn KeyValueStore>,
}

impl LayoutRecords {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored record for `topology`; unreadable records are ignored.
    pub fn load(&self, topology: Topology) -> Option<LayoutRecord> {
        let key = topology.storage_key();
        let raw = self.store.get(&key)?;
        let parsed = match topology {
            Topology::Grid => serde_json::from_str::<GridSizes>(&raw).map(LayoutRecord::Grid),
            Topology::LinearHorizontal | Topology::LinearVertical => {
                serde_json::from_str::<LinearWeights>(&raw).map(LayoutRecord::Linear)
            }
        };
        match parsed {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(key = %key, error = %err, "Ignoring unreadable layout record");
                None
            }
        }
    }

    pub fn save(&self, topology: Topology, record: &LayoutRecord) -> Result<()> {
        let raw = match record {
            LayoutRecord::Linear(weights) => serde_json::to_string(weights)?,
            LayoutRecord::Grid(sizes) => serde_json::to_string(sizes)?,
        };
        self.store.set(&topology.storage_key(), &raw)?;
        Ok(())
    }

    pub fn clear(&self, topology: Topology) {
        self.store.remove(&topology.storage_key());
    }
}
