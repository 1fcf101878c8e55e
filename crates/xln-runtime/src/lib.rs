pub mod config;
pub mod environment;
pub mod tick;

pub use config::RuntimeConfig;
pub use environment::Environment;
pub use tick::{capacity_edges, tick, Input, Output};
