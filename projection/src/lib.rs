pub mod colors;
pub mod config;
pub mod dataset;
pub mod export;
pub mod labels;
pub mod projector;
pub mod scan;
pub mod stats;

pub use readers::{PointBuffer, ScanError, ScanLayout, ScanResult};
