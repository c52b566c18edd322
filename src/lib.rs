//! Code Maestro gateway: relays chat turns to a local Ollama server, either as
//! one buffered reply or as a Server-Sent Events stream.

pub mod agent;
pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod service;

pub use config::GatewayConfig;
pub use routes::router;
pub use service::chat_service::ChatService;
