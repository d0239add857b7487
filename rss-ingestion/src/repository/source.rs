use crate::graph::{single_node, GraphNode, GraphStore, Statement};
use crate::traits::SourceStore;
use crate::types::{FeedSource, IngestError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

const ENTITY: &str = "Source";

pub struct SourceRepository {
    store: Arc<dyn GraphStore>,
}

impl SourceRepository {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

pub(crate) fn decode_source(node: &GraphNode) -> Result<FeedSource> {
    Ok(FeedSource {
        id: node.element_id.clone(),
        name: node.required_str(ENTITY, "name")?,
        url: node.required_str(ENTITY, "url")?,
        schedule: node.optional_str("scheduled_time"),
        etag: node.optional_str("etag"),
        last_updated: node.optional_str("last_updated"),
        created: node.optional_i64("created"),
    })
}

#[async_trait]
impl SourceStore for SourceRepository {
    async fn get(&self, name: &str) -> Result<FeedSource> {
        let records = self
            .store
            .run(
                Statement::new("MATCH (source:Rss_Feed:Source {name: $name}) RETURN source")
                    .param("name", name)
                    .returns(&["source"]),
            )
            .await?;

        match single_node(records, ENTITY, name)? {
            Some(node) => decode_source(&node),
            None => Err(IngestError::NotFound {
                entity: ENTITY,
                key: name.to_string(),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<FeedSource>> {
        let records = self
            .store
            .run(
                Statement::new("MATCH (source:Rss_Feed:Source) RETURN source ORDER BY source.name")
                    .returns(&["source"]),
            )
            .await?;

        let mut sources = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(node) = record.node("source") {
                sources.push(decode_source(node)?);
            }
        }

        debug!("Listed {} feed sources", sources.len());
        Ok(sources)
    }

    async fn upsert(&self, source: &FeedSource) -> Result<FeedSource> {
        let records = self
            .store
            .run(
                Statement::new(
                    r#"
                    MERGE (source:Rss_Feed:Source {name: $name})
                    ON CREATE SET
                        source.url = $url,
                        source.scheduled_time = $scheduled_time,
                        source.etag = $etag,
                        source.last_updated = $last_updated,
                        source.created = timestamp()
                    RETURN source
                    "#,
                )
                .param("name", &source.name)
                .param("url", &source.url)
                .param("scheduled_time", &source.schedule)
                .param("etag", &source.etag)
                .param("last_updated", &source.last_updated)
                .returns(&["source"]),
            )
            .await?;

        let node = single_node(records, ENTITY, &source.name)?.ok_or_else(|| {
            IngestError::Graph(format!("MERGE returned no source for {}", source.name))
        })?;
        let stored = decode_source(&node)?;

        info!("Registered feed source {} ({})", stored.name, stored.id);
        Ok(stored)
    }

    async fn update_last_modified(&self, name: &str, last_updated: &str) -> Result<()> {
        self.store
            .run(
                Statement::new(
                    r#"
                    MERGE (source:Rss_Feed:Source {name: $name})
                    SET source.last_updated = $last_updated
                    RETURN source
                    "#,
                )
                .param("name", name)
                .param("last_updated", last_updated)
                .returns(&["source"]),
            )
            .await?;

        debug!("Set last_updated of {} to {:?}", name, last_updated);
        Ok(())
    }

    async fn update_etag(&self, name: &str, etag: &str) -> Result<()> {
        self.store
            .run(
                Statement::new(
                    r#"
                    MERGE (source:Rss_Feed:Source {name: $name})
                    SET source.etag = $etag
                    RETURN source
                    "#,
                )
                .param("name", name)
                .param("etag", etag)
                .returns(&["source"]),
            )
            .await?;

        debug!("Set etag of {} to {:?}", name, etag);
        Ok(())
    }
}
