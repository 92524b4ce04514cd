//! Collector error types

use std::time::Duration;

use thiserror::Error;

use crate::schema::SubQuery;

/// Why a wallet row could not be collected.
///
/// Every variant names the sub-query that failed first; the other
/// sub-queries of the same row were abandoned.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The call did not finish within its own deadline
    #[error("{query} query timed out after {}s", .after.as_secs())]
    Timeout { query: SubQuery, after: Duration },

    /// Collection was cancelled from outside; not a backend fault
    #[error("{query} query cancelled")]
    Cancelled { query: SubQuery },

    /// Transport or backend-reported failure
    #[error("{query} query failed: {source:#}")]
    Backend {
        query: SubQuery,
        #[source]
        source: anyhow::Error,
    },
}

impl CollectError {
    pub fn query(&self) -> SubQuery {
        match self {
            CollectError::Timeout { query, .. }
            | CollectError::Cancelled { query }
            | CollectError::Backend { query, .. } => *query,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CollectError::Cancelled { .. })
    }
}
