//! Marker Coordinate Load Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the marker coordinate load.
//!
//! # Overview
//!
//! - **Error Handling**: the run-level error taxonomy and result alias
//! - **Logging**: `tracing` subscriber configuration for every binary
//!
//! # Example
//!
//! ```no_run
//! use mrkcoord_common::{MrkCoordError, Result};
//!
//! fn open_input(path: &str) -> Result<std::fs::File> {
//!     std::fs::File::open(path).map_err(|source| MrkCoordError::InputFile {
//!         path: path.into(),
//!         source,
//!     })
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{MrkCoordError, Result};
