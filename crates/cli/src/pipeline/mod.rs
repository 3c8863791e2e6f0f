//! Gateway host orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::GatewayHost;
