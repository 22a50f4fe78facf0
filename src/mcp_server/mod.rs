//! Gateway surface: the tool-calling protocol spoken on this process's
//! stdio, independent of the language-server protocol behind it.

pub mod server;
pub mod tools;
pub mod types;

pub use server::McpServer;
