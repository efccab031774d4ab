// Library root: the binary in src/main.rs and the integration tests both use it.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod relay;
pub mod shutdown;
