//! Remote Job Source boundary: service traits, wire records, endpoint and
//! credential configuration, and the HTTP implementations.

pub mod config;
pub mod error;
pub mod http;
pub mod interface;

pub use config::SourceConfig;
pub use error::SourceError;
pub use http::{HttpGateway, HttpRuntime};
pub use interface::{ExecutionJobRecord, FunctionJobRecord, GatewayService, RuntimeService};
