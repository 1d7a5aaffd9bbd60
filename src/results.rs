//! Result types for recovery runs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::MetricKind;

/// Extreme value of one metric at one node, with its time of occurrence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremaRecord {
    /// Node identifier
    pub node_id: u64,
    /// Node X coordinate
    pub x: f64,
    /// Node Y coordinate
    pub y: f64,
    /// Node Z coordinate
    pub z: f64,
    /// Extreme metric value over the full time range
    pub value: f64,
    /// Time at which the extreme value occurred
    pub time: f64,
}

/// Per-node extreme values for one metric, in node order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtremaTable {
    /// Metric the table was reduced for
    pub metric: MetricKind,
    /// One record per node, written chunk by chunk
    pub records: Vec<ExtremaRecord>,
}

impl ExtremaTable {
    pub fn with_capacity(metric: MetricKind, capacity: usize) -> Self {
        Self {
            metric,
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for a given node id, if that node has been written
    pub fn record(&self, node_id: u64) -> Option<&ExtremaRecord> {
        self.records.iter().find(|r| r.node_id == node_id)
    }

    /// Record with the largest value in the table (governing node)
    pub fn governing(&self) -> Option<&ExtremaRecord> {
        self.records
            .iter()
            .max_by(|a, b| a.value.total_cmp(&b.value))
    }
}

/// Full time series of one metric at one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSeries {
    pub node_id: u64,
    pub metric: MetricKind,
    /// Time values, parallel to `values`
    pub times: Vec<f64>,
    /// Metric value at each time sample
    pub values: Vec<f64>,
}

impl MetricSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (time, value) of the series maximum
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &v)| (self.times[i], v))
    }
}

/// Outcome of a batch run: one extrema table per requested metric plus
/// completion bookkeeping for the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Extrema tables keyed by metric
    pub tables: HashMap<MetricKind, ExtremaTable>,
    /// Nodes whose records were written
    pub nodes_completed: usize,
    /// Nodes in the run's node set
    pub total_nodes: usize,
    /// Chunks fully reduced and published
    pub chunks_completed: usize,
    /// Chunks in the plan
    pub total_chunks: usize,
    /// True when the run was stopped between chunks by the caller
    pub cancelled: bool,
    /// True when the memory plan degraded to single-node chunks
    pub low_memory: bool,
}

impl BatchResults {
    /// Table for a metric, if it was requested
    pub fn table(&self, metric: MetricKind) -> Option<&ExtremaTable> {
        self.tables.get(&metric)
    }

    /// True when every chunk was reduced and written
    pub fn is_complete(&self) -> bool {
        self.chunks_completed == self.total_chunks
    }
}
