use super::{GraphStore, Statement};
use crate::types::Result;
use tracing::info;

/// Uniqueness constraints backing the natural keys the repositories match on.
/// With these in place a lookup/create race between two runs fails the
/// second create instead of producing a duplicate node.
pub const CONSTRAINTS: [&str; 3] = [
    "CREATE CONSTRAINT rss_source_name IF NOT EXISTS FOR (s:Source) REQUIRE s.name IS UNIQUE",
    "CREATE CONSTRAINT rss_author_name IF NOT EXISTS FOR (a:Author) REQUIRE a.name IS UNIQUE",
    "CREATE CONSTRAINT rss_article_name_url IF NOT EXISTS FOR (a:Article) REQUIRE (a.name, a.url) IS UNIQUE",
];

/// Run idempotent schema migrations. Returns the number of statements applied.
pub async fn migrate(store: &dyn GraphStore) -> Result<usize> {
    info!("Running schema migrations...");

    for constraint in &CONSTRAINTS {
        store.run(Statement::new(constraint)).await?;
    }

    info!("Uniqueness constraints in place ({})", CONSTRAINTS.len());
    Ok(CONSTRAINTS.len())
}
