//! Comparative Benchmarker
//!
//! Times the POPCNT / ABM workloads on either the hardware or the emulated
//! bit-counting path. Each iteration draws two operands, then times:
//! 1. popcount of both operands
//! 2. Hamming distance (popcount of their XOR)
//! 3. for ABM only, leading zeros of both operands and of the distance
//!
//! The returned figure is the summed elapsed microseconds divided by a fixed
//! scale, not a per-iteration mean.

use crate::core::features::{CapabilitySet, Feature};
use crate::core::operands::InputSource;
use crate::simd::{BitCounter, BitOps, ExecutionPath};
use serde::Serialize;
use std::fmt;
use std::hint::black_box;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

pub const MEASUREMENT_ITERATIONS: u32 = 10_000;
pub const TIME_SCALE: f64 = 10.0;

/// Features that have a workload.
pub const BENCHMARKED_FEATURES: [Feature; 2] = [Feature::Abm, Feature::Popcnt];

/// What the benchmark runner measures when no feature is named.
pub const DEFAULT_FEATURES: [Feature; 1] = [Feature::Abm];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BenchError {
    #[error("no benchmark workload exists for {0}")]
    NotBenchmarkable(Feature),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchConfig {
    pub iterations: u32,
    pub scale: f64,
    pub source: InputSource,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: MEASUREMENT_ITERATIONS,
            scale: TIME_SCALE,
            source: InputSource::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workload {
    pub leading_zeros: bool,
}

impl Workload {
    pub fn for_feature(feature: Feature) -> Option<Self> {
        match feature {
            Feature::Popcnt => Some(Self { leading_zeros: false }),
            Feature::Abm => Some(Self { leading_zeros: true }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub feature: Feature,
    pub path: ExecutionPath,
    pub micros: f64,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.path {
            ExecutionPath::Hardware => "",
            ExecutionPath::Emulated => " (emulated)",
        };
        write!(f, "{}{} execution time: {:.6}", self.feature, suffix, self.micros)
    }
}

pub struct Benchmarker {
    config: BenchConfig,
}

impl Benchmarker {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run `workload` on `ops` and return the scaled elapsed time in µs.
    pub fn run<C: BitCounter + ?Sized>(&self, workload: Workload, ops: &C) -> f64 {
        let mut operands = self.config.source.operands();
        let mut total_us = 0.0;

        for _ in 0..self.config.iterations {
            let (a, b) = operands.next_pair();
            let (a, b) = (black_box(a), black_box(b));

            let start = Instant::now();
            let weight_a = ops.popcount(a);
            let weight_b = ops.popcount(b);
            let distance = ops.hamming_distance(a, b);
            if workload.leading_zeros {
                black_box((
                    ops.leading_zeros(a),
                    ops.leading_zeros(b),
                    ops.leading_zeros(distance),
                ));
            }
            black_box((weight_a, weight_b, distance));
            total_us += start.elapsed().as_secs_f64() * 1_000_000.0;
        }

        total_us / self.config.scale
    }

    /// Benchmark `feature` on the path its capability flag allows.
    pub fn measure(
        &self,
        feature: Feature,
        caps: &CapabilitySet,
    ) -> Result<Measurement, BenchError> {
        let path = if caps.has(feature) {
            ExecutionPath::Hardware
        } else {
            ExecutionPath::Emulated
        };
        self.measure_path(feature, path)
    }

    /// Benchmark `feature` on `path`. A hardware request on a processor
    /// without the instructions is measured on the emulated path instead.
    pub fn measure_path(
        &self,
        feature: Feature,
        path: ExecutionPath,
    ) -> Result<Measurement, BenchError> {
        let workload = workload_for(feature)?;
        let ops = BitOps::select(path, workload.leading_zeros);
        Ok(self.measure_ops(feature, workload, &ops))
    }

    /// The capability-selected measurement first: hardware when the flag is
    /// set and the instructions are usable, then the emulated baseline.
    pub fn compare(
        &self,
        feature: Feature,
        caps: &CapabilitySet,
    ) -> Result<Vec<Measurement>, BenchError> {
        let workload = workload_for(feature)?;
        let mut results = Vec::with_capacity(2);
        if caps.has(feature) {
            if let Some(ops) = BitOps::hardware(workload.leading_zeros) {
                results.push(self.measure_ops(feature, workload, &ops));
            }
        }
        results.push(self.measure_ops(feature, workload, &BitOps::emulated()));
        Ok(results)
    }

    fn measure_ops<C: BitCounter + ?Sized>(
        &self,
        feature: Feature,
        workload: Workload,
        ops: &C,
    ) -> Measurement {
        let micros = self.run(workload, ops);
        let path = ops.path();
        info!(%feature, ?path, micros, "measured");
        Measurement {
            feature,
            path,
            micros,
        }
    }
}

fn workload_for(feature: Feature) -> Result<Workload, BenchError> {
    Workload::for_feature(feature).ok_or(BenchError::NotBenchmarkable(feature))
}
