//! JSON report of one probe (and optionally benchmark) run.

use crate::core::benchmark::{BenchConfig, Measurement};
use crate::core::features::{CapabilitySet, ExecutionTimes};
use crate::core::hardware::CpuIdentity;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub identity: Option<CpuIdentity>,
    pub capabilities: CapabilitySet,
    pub execution_times: ExecutionTimes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BenchConfig>,
    pub measurements: Vec<Measurement>,
}

impl Report {
    pub fn new(identity: Option<CpuIdentity>, capabilities: CapabilitySet) -> Self {
        Self {
            identity,
            capabilities,
            execution_times: ExecutionTimes::default(),
            config: None,
            measurements: Vec::new(),
        }
    }

    /// Add a measurement. A feature's execution-time entry is its first
    /// measurement, which `Benchmarker::compare` makes the capability-selected one.
    pub fn push(&mut self, measurement: Measurement) {
        if !self.measurements.iter().any(|m| m.feature == measurement.feature) {
            self.execution_times.record(measurement.feature, measurement.micros);
        }
        self.measurements.push(measurement);
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}
