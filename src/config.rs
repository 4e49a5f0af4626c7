//! Configuration for query construction.
//!
//! # Example
//!
//! ```
//! use photo_query::config::QueryConfig;
//!
//! // Defaults: English connectives
//! let config = QueryConfig::default();
//! assert_eq!(config.operators.or, vec![" or ".to_string()]);
//! ```

use crate::operator::OperatorTable;
use serde::Deserialize;

/// Settings a host application may load from its own configuration files.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Connectives recognized by the free-text parser.
    #[serde(default)]
    pub operators: OperatorTable,
}
