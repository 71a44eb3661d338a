//! Command implementations for the bookshelf CLI

pub mod healthcheck;
pub mod serve;

pub use healthcheck::run_healthcheck;
pub use serve::run_serve;
