pub mod cli;
pub mod config;
pub mod errors;
pub mod log;
pub mod manifest;
pub mod pipeline;
pub mod policy;
pub mod prompt;
pub mod provider;
pub mod sanitize;
pub mod server;
pub mod store;
pub mod ux;
pub mod wire;
