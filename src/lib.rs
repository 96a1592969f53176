// SCHEDLAT LIBRARY CRATE
// PURE SAMPLING ENGINE. THE BINARY (main.rs) ADDS CLI, LOGGING, SIGNALS, FAN-OUT.

pub mod affinity;
pub mod clock;
pub mod config;
pub mod histogram;
pub mod report;
pub mod sampler;
pub mod stats;
pub mod topology;
