use serde::{Deserialize, Serialize};

// Wire contract types shared with callers
pub use interfaces::defs::{
    ArticleExtractionSummary, AuthorExtractionSummary, AuthorOutcome, EntryOutcome,
    FeedExtractionSummary, Ingester, RunOutcome, SourceFeedSummary,
};

/// A registered RSS/Atom endpoint. `name` is the business key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: String,
    pub name: String,
    pub url: String,
    pub schedule: String,
    pub etag: String,
    pub last_updated: String,
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub date_posted: String,
    pub storage_url: String,
    pub in_storage: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: String,
    pub updated: String,
    pub authors: Vec<ParsedAuthor>,
}

impl ParsedItem {
    /// The article node this item would become, before the store assigns an id.
    pub fn to_article(&self) -> Article {
        Article {
            id: String::new(),
            name: self.title.clone(),
            url: self.link.clone(),
            description: self.description.clone(),
            date_posted: self.published.clone(),
            storage_url: String::new(),
            in_storage: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    /// Document level "updated" marker, empty when the feed publishes none.
    pub updated: String,
    pub items: Vec<ParsedItem>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Fetched(ParsedFeed),
    NotModified,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "RSS-Ingestion/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            max_feed_size_mb: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("expected one {entity} for {key}, found {count}")]
    AmbiguousResult {
        entity: &'static str,
        key: String,
        count: usize,
    },

    #[error("{entity} node {id} has no `{field}` property")]
    MissingRequiredField {
        entity: &'static str,
        id: String,
        field: &'static str,
    },

    #[error("request to {url} returned status code: {status}")]
    Http { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Feed source not found: {name}")]
    SourceNotFound { name: String },

    #[error("Article not found: {name} ({url})")]
    ArticleNotFound { name: String, url: String },

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Graph store error: {0}")]
    Graph(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed url must be http or https: {url}")]
    UnsupportedScheme { url: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<neo4rs::Error> for IngestError {
    fn from(err: neo4rs::Error) -> Self {
        IngestError::Graph(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
