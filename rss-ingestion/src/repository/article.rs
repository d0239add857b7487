use crate::graph::{single_node, GraphNode, GraphStore, Statement};
use crate::traits::ArticleStore;
use crate::types::{Article, IngestError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const ENTITY: &str = "Article";

pub struct ArticleRepository {
    store: Arc<dyn GraphStore>,
}

impl ArticleRepository {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

fn decode_article(node: &GraphNode) -> Result<Article> {
    Ok(Article {
        id: node.element_id.clone(),
        name: node.required_str(ENTITY, "name")?,
        url: node.required_str(ENTITY, "url")?,
        description: node.optional_str("description"),
        date_posted: node.required_str(ENTITY, "date_posted")?,
        storage_url: node.optional_str("static_file_url"),
        in_storage: node.flag("in_static_file_storage"),
    })
}

#[async_trait]
impl ArticleStore for ArticleRepository {
    async fn find_by_name_and_url(&self, name: &str, url: &str) -> Result<Option<Article>> {
        let records = self
            .store
            .run(
                Statement::new(
                    "MATCH (article:Rss_Feed:Article {name: $name, url: $url}) RETURN article",
                )
                .param("name", name)
                .param("url", url)
                .returns(&["article"]),
            )
            .await?;

        let key = format!("{name} ({url})");
        single_node(records, ENTITY, &key)?
            .map(|node| decode_article(&node))
            .transpose()
    }

    async fn create(&self, article: &Article, source_name: &str, downloaded_at: &str) -> Result<Article> {
        // The source is matched first: with no source there are no rows and
        // the CREATE clauses never run.
        let records = self
            .store
            .run(
                Statement::new(
                    r#"
                    MATCH (source:Rss_Feed:Source {name: $source_name})
                    CREATE (article:Rss_Feed:Article {
                        name: $name,
                        url: $url,
                        description: $description,
                        date_posted: $date_posted,
                        static_file_url: $static_file_url,
                        in_static_file_storage: $in_static_file_storage,
                        created: timestamp()
                    })
                    CREATE (source)-[rel:CONTAINS_ARTICLE]->(article)
                    SET rel.date_downloaded = $date_downloaded
                    RETURN article
                    "#,
                )
                .param("source_name", source_name)
                .param("name", &article.name)
                .param("url", &article.url)
                .param("description", &article.description)
                .param("date_posted", &article.date_posted)
                .param("static_file_url", &article.storage_url)
                .param("in_static_file_storage", article.in_storage)
                .param("date_downloaded", downloaded_at)
                .returns(&["article"]),
            )
            .await?;

        let key = format!("{} ({})", article.name, article.url);
        let node = single_node(records, ENTITY, &key)?.ok_or_else(|| IngestError::SourceNotFound {
            name: source_name.to_string(),
        })?;

        debug!("Created article {} under {}", node.element_id, source_name);
        decode_article(&node)
    }
}
