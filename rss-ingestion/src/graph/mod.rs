pub mod client;
pub mod migrate;
pub mod record;

pub use client::{GraphClient, GraphConfig};
pub use migrate::migrate;
pub use record::{single_node, GraphNode, GraphValue, PropertyValue, Record, Statement};

use crate::types::Result;
use async_trait::async_trait;

/// Executes parameterized statements against a graph database.
///
/// Each statement runs in its own auto-commit transaction; nothing spans
/// more than one call.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn run(&self, statement: Statement) -> Result<Vec<Record>>;
}
