use crate::types::{Article, Author, FeedSource, FetchResult, IngestError, ParsedFeed, Result};
use async_trait::async_trait;

/// Retrieves and parses a feed document.
#[async_trait]
pub trait FeedFetch: Send + Sync {
    /// Fetch the feed, sending `etag` as a cache validator when one is known.
    async fn fetch_conditional(&self, url: &str, etag: Option<&str>) -> Result<FetchResult>;

    /// Unconditional fetch.
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        match self.fetch_conditional(url, None).await? {
            FetchResult::Fetched(feed) => Ok(feed),
            FetchResult::NotModified => Err(IngestError::Http {
                url: url.to_string(),
                status: 304,
            }),
        }
    }
}

/// Storage for the feed source records.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Exactly one source named `name`; `NotFound` or `AmbiguousResult` otherwise.
    async fn get(&self, name: &str) -> Result<FeedSource>;

    async fn list(&self) -> Result<Vec<FeedSource>>;

    /// Create the source if no source has this name. An existing source is
    /// returned untouched.
    async fn upsert(&self, source: &FeedSource) -> Result<FeedSource>;

    async fn update_last_modified(&self, name: &str, last_updated: &str) -> Result<()>;

    async fn update_etag(&self, name: &str, etag: &str) -> Result<()>;
}

/// Storage for article records and their source edge.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// `Ok(None)` when no article has this (name, url) pair.
    async fn find_by_name_and_url(&self, name: &str, url: &str) -> Result<Option<Article>>;

    /// Create the article and the `CONTAINS_ARTICLE` edge from its source in
    /// one statement. Fails with `SourceNotFound` without writing anything
    /// when the source is missing.
    async fn create(&self, article: &Article, source_name: &str, downloaded_at: &str) -> Result<Article>;
}

/// Storage for author records and their `WROTE` edges.
#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Author>>;

    async fn link_existing(&self, article_name: &str, article_url: &str, author_name: &str) -> Result<()>;

    async fn create_and_link(
        &self,
        article_name: &str,
        article_url: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<Author>;
}
