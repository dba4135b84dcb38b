//! Query surface over the published store.

use fleetsql_shared::FleetSqlError;
use fleetsql_storage::{JsonRow, table_schemas};
use tracing::{debug, instrument, warn};

use crate::build::StoreHandle;

/// Message returned while no store has been published yet.
pub const NOT_READY_MESSAGE: &str = "database is still initializing, please retry in a moment";

/// Result of [`QuerySurface::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Rows in result order, columns in statement order.
    Rows(Vec<JsonRow>),
    /// Nothing has been published yet; retry later.
    NotReady,
    /// The store rejected the statement. The message is the engine's own.
    Failed(String),
}

/// Read-only access for query clients.
#[derive(Clone)]
pub struct QuerySurface {
    handle: StoreHandle,
}

impl QuerySurface {
    pub fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }

    /// The schema catalog: every `CREATE TABLE` statement with its column
    /// comments. Available regardless of build state.
    pub fn catalog(&self) -> String {
        table_schemas().join("\n")
    }

    /// Run `statement` against the published store. Never waits for a build.
    #[instrument(skip(self))]
    pub async fn execute(&self, statement: &str) -> QueryOutcome {
        let Some(store) = self.handle.current() else {
            debug!("query before first publish");
            return QueryOutcome::NotReady;
        };
        match store.query(statement).await {
            Ok(rows) => {
                debug!(row_count = rows.len(), "query succeeded");
                QueryOutcome::Rows(rows)
            }
            Err(e) => {
                warn!(error = %e, "query failed");
                QueryOutcome::Failed(query_message(e))
            }
        }
    }
}

fn query_message(e: FleetSqlError) -> String {
    match e {
        FleetSqlError::Query(msg) => msg,
        other => other.to_string(),
    }
}
