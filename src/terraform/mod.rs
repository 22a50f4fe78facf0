//! Terraform document session: workspace initialization, document opens,
//! and the three tool-level operations over terraform-ls.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DocumentTools, TerraformClient};
pub use error::BridgeError;
