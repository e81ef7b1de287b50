// Deployment Queue CLI - Library root

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod http_client;
pub mod mcp;
pub mod models;
