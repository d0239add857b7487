pub mod types;
pub mod traits;
pub mod graph;
pub mod repository;
pub mod fetcher;
pub mod parser;
pub mod ingester;
pub mod rss_utils;
pub mod testing;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use types::*;
pub use traits::{ArticleStore, AuthorStore, FeedFetch, SourceStore};
pub use graph::{GraphClient, GraphConfig, GraphStore};
pub use repository::{ArticleRepository, AuthorRepository, SourceRepository};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use ingester::{IngestContext, RssIngester};
