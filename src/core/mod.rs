pub mod benchmark;
pub mod features;
pub mod hardware;
pub mod operands;
pub mod report;
pub mod runtime;
