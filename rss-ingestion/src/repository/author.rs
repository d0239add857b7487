use crate::graph::{single_node, GraphNode, GraphStore, Statement};
use crate::traits::AuthorStore;
use crate::types::{Author, IngestError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const ENTITY: &str = "Author";

pub struct AuthorRepository {
    store: Arc<dyn GraphStore>,
}

impl AuthorRepository {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

fn decode_author(node: &GraphNode) -> Result<Author> {
    Ok(Author {
        id: node.element_id.clone(),
        name: node.required_str(ENTITY, "name")?,
        email: node.optional_str("email"),
    })
}

#[async_trait]
impl AuthorStore for AuthorRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Author>> {
        let records = self
            .store
            .run(
                Statement::new("MATCH (author:Rss_Feed:Author:Person {name: $name}) RETURN author")
                    .param("name", name)
                    .returns(&["author"]),
            )
            .await?;

        single_node(records, ENTITY, name)?
            .map(|node| decode_author(&node))
            .transpose()
    }

    async fn link_existing(&self, article_name: &str, article_url: &str, author_name: &str) -> Result<()> {
        let records = self
            .store
            .run(
                Statement::new(
                    r#"
                    MATCH (article:Rss_Feed:Article {name: $article_name, url: $article_url})
                    MATCH (author:Rss_Feed:Author:Person {name: $author_name})
                    CREATE (author)-[:WROTE]->(article)
                    RETURN author, article
                    "#,
                )
                .param("article_name", article_name)
                .param("article_url", article_url)
                .param("author_name", author_name)
                .returns(&["author", "article"]),
            )
            .await?;

        if records.is_empty() {
            return Err(IngestError::NotFound {
                entity: "Article or Author",
                key: format!("{author_name} -> {article_name} ({article_url})"),
            });
        }

        debug!("Linked existing author {} to {}", author_name, article_name);
        Ok(())
    }

    async fn create_and_link(
        &self,
        article_name: &str,
        article_url: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<Author> {
        let records = self
            .store
            .run(
                Statement::new(
                    r#"
                    MATCH (article:Rss_Feed:Article {name: $article_name, url: $article_url})
                    MERGE (author:Rss_Feed:Author:Person {name: $author_name})
                    ON CREATE SET author.email = $author_email
                    CREATE (author)-[:WROTE]->(article)
                    RETURN author, article
                    "#,
                )
                .param("article_name", article_name)
                .param("article_url", article_url)
                .param("author_name", author_name)
                .param("author_email", author_email)
                .returns(&["author", "article"]),
            )
            .await?;

        let node = single_node(records, ENTITY, author_name)?.ok_or_else(|| {
            IngestError::ArticleNotFound {
                name: article_name.to_string(),
                url: article_url.to_string(),
            }
        })?;

        debug!("Created author {} ({}) for {}", author_name, node.element_id, article_name);
        decode_author(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Record;
    use crate::testing::ScriptedStore;

    #[tokio::test]
    async fn find_absent_author_is_none() {
        let store = Arc::new(ScriptedStore::new());
        store.respond(vec![]);

        let found = AuthorRepository::new(store.clone())
            .find_by_name("Jane Doe")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn find_nameless_author_is_missing_field() {
        let store = Arc::new(ScriptedStore::new());
        store.respond(vec![Record::new()
            .with_node("author", GraphNode::new("4:3").with("email", "jane@x.com"))]);

        let err = AuthorRepository::new(store.clone())
            .find_by_name("Jane Doe")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingRequiredField { entity: "Author", field: "name", .. }));
    }

    #[tokio::test]
    async fn find_defaults_missing_email() {
        let store = Arc::new(ScriptedStore::new());
        store.respond(vec![Record::new()
            .with_node("author", GraphNode::new("4:3").with("name", "Jane Doe"))]);

        let author = AuthorRepository::new(store.clone())
            .find_by_name("Jane Doe")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(author.id, "4:3");
        assert_eq!(author.email, "");
    }

    #[tokio::test]
    async fn link_existing_with_missing_endpoint_is_not_found() {
        let store = Arc::new(ScriptedStore::new());
        store.respond(vec![]);

        let err = AuthorRepository::new(store.clone())
            .link_existing("Report X", "https://x", "Jane Doe")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_and_link_reads_author_column() {
        let store = Arc::new(ScriptedStore::new());
        store.respond(vec![Record::new()
            .with_node(
                "author",
                GraphNode::new("4:5").with("name", "Jane Doe").with("email", "jane@x.com"),
            )
            .with_node("article", GraphNode::new("4:4").with("name", "Report X"))]);

        let author = AuthorRepository::new(store.clone())
            .create_and_link("Report X", "https://x", "Jane Doe", "jane@x.com")
            .await
            .unwrap();
        assert_eq!(author.id, "4:5");
        assert_eq!(author.email, "jane@x.com");

        let cypher = &store.statements()[0].cypher;
        assert!(cypher.contains("MERGE (author"));
        assert!(cypher.contains("CREATE (author)-[:WROTE]->(article)"));
    }

    #[tokio::test]
    async fn create_and_link_without_article_fails() {
        let store = Arc::new(ScriptedStore::new());
        store.respond(vec![]);

        let err = AuthorRepository::new(store.clone())
            .create_and_link("Missing", "https://nowhere", "Jane Doe", "")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ArticleNotFound { .. }));
    }
}
