//! Model Context Protocol tool server for fleetsql.
//!
//! Exposes the query surface as two read-only tools over JSON-RPC 2.0, on
//! either newline-delimited stdio or HTTP.

pub mod http;
pub mod protocol;
pub mod stdio;

pub use http::{build_router, serve_http};
pub use protocol::{McpServer, QUERY_TOOL, TABLES_TOOL, tools_list};
pub use stdio::{serve_lines, serve_stdio};
