//! Framed JSON-RPC client for a language-server subprocess.
//!
//! Layered leaf-first: `framing` recovers message boundaries on the byte
//! stream, `client` correlates requests with responses across concurrent
//! callers, `process` owns the child process lifecycle.

pub mod client;
pub mod error;
pub mod framing;
pub mod process;
pub mod types;

pub use client::LspClient;
pub use error::LspError;
