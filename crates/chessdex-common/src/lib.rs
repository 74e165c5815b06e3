//! Chessdex Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities and error handling for the chessdex workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the workspace-wide error type and result alias
//! - **Checksums**: content hashing used for document identities
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use chessdex_common::checksum::sha256_hex;
//! use chessdex_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> chessdex_common::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!(id = %sha256_hex("1. e4 e5"), "hashed");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{ChessdexError, Result};
