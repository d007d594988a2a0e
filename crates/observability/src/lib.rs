//! Process-wide tracing setup.

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use self::tracing::LogFormat;
