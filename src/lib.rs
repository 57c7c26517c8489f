pub mod core;
pub mod simd;

pub use crate::core::benchmark::{BenchConfig, BenchError, Benchmarker, Measurement, Workload};
pub use crate::core::features::{CapabilitySet, ExecutionTimes, Feature, FeatureMap};
pub use crate::core::hardware::{probe, probe_with, CpuidSource, ProbeError};
pub use crate::simd::{BitCounter, BitOps, ExecutionPath};
