//! MCP server for the knowledge base
//!
//! Exposes ingestion, search and topic tools over stdio.

mod server;

pub use server::{run_mcp_server, KbService};
