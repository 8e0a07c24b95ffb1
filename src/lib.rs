pub mod cli;
pub mod collaborators;
pub mod combat;
pub mod config;
pub mod error;
pub mod report;
pub mod server;
pub mod session;
