/// brandmatch - A brand and influencer marketplace backend
///
/// This library provides a request pipeline built from composable commands,
/// an object mapper with per-field override rules, and the marketplace
/// routes wired from both.

pub mod config;
pub mod executor;
pub mod handler;
pub mod hooks;
pub mod mapper;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use executor::{MiddlewarePipeline, RunReport};
pub use handler::{ApiRequest, Handler, ResponseEnvelope};
pub use mapper::{Mappable, ObjectMapper};
pub use pipeline::{Command, Context, ErrorCapsule, ExecutionError, Flow, SequenceBuilder};
pub use registry::{Registry, RegistryBuilder};
