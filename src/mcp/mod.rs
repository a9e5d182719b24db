//! MCP client for the Apple Notes server, spoken over the child's stdio.

mod client;

pub use client::NotesMcpClient;
