/// Core Module
///
/// Shared infrastructure: the value model, the error type and the database
/// layer (statement builder, backends and the connection handle).

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use value::{Condition, Record, Row, Value};
