use crate::graph::GraphStore;
use crate::repository::{ArticleRepository, AuthorRepository, SourceRepository};
use crate::rss_utils;
use crate::traits::{ArticleStore, AuthorStore, FeedFetch, SourceStore};
use crate::types::{
    ArticleExtractionSummary, AuthorExtractionSummary, AuthorOutcome, EntryOutcome,
    FeedExtractionSummary, FeedSource, FetchResult, Ingester, ParsedAuthor, ParsedFeed, ParsedItem,
    Result, RunOutcome, SourceFeedSummary,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// Human readable status lines carried by the summaries.
pub mod status {
    pub const SOURCE_LOOKUP_FAILED: &str = "Error in extracting an Rss Source from database";
    pub const FETCH_FAILED: &str = "Error in retrieving the Rss feed from its url";
    pub const INGESTED: &str = "Article and Author ingestion complete for the feed";
    pub const FINALIZE_FAILED: &str =
        "Unable to update the Rss Feed's last_updated value from the extracted rss feed";

    pub const LOOKUP_FAILED: &str = "Error in querying articles from the database";
    pub const ALREADY_EXISTS: &str =
        "Article already exists in the database. Skipped all functions associated with this entry";
    pub const CREATE_FAILED: &str =
        "Unable to insert new article into the database. Skipped all functions associated with this entry";
    pub const CREATED: &str =
        "Successfully inserted the Article. Check authors for further information about author connections.";

    pub const AUTHOR_LOOKUP_FAILED: &str = "Error in querying authors from the database";
    pub const LINKED_EXISTING: &str = "Existing author detected - added connection to the existing author";
    pub const CREATED_NEW: &str = "New author detected - created a new author and connected it to the article";

    pub fn no_change(source: &str, stored: &str, fetched: &str) -> String {
        format!(
            "No new Rss Feed found for {source} rss feed. DatabaseLastUpdated: {stored}, RequestLastUpdated: {fetched}"
        )
    }

    pub fn not_modified(source: &str, etag: &str) -> String {
        format!("No new Rss Feed found for {source} rss feed. Server reported not modified for etag {etag}")
    }

    pub fn link_failed(author: &str, article: &str) -> String {
        format!("Error in connecting existing author to the article. Author: {author}. Article: {article}")
    }

    pub fn create_and_link_failed(author: &str, article: &str) -> String {
        format!("Error in creating and connecting author to the article. Author: {author}. Article: {article}")
    }
}

/// Everything a run needs, passed in explicitly.
#[derive(Clone)]
pub struct IngestContext {
    pub sources: Arc<dyn SourceStore>,
    pub articles: Arc<dyn ArticleStore>,
    pub authors: Arc<dyn AuthorStore>,
    pub fetcher: Arc<dyn FeedFetch>,
}

impl IngestContext {
    /// Wire the graph-backed repositories over one store.
    pub fn from_graph(store: Arc<dyn GraphStore>, fetcher: Arc<dyn FeedFetch>) -> Self {
        Self {
            sources: Arc::new(SourceRepository::new(store.clone())),
            articles: Arc::new(ArticleRepository::new(store.clone())),
            authors: Arc::new(AuthorRepository::new(store)),
            fetcher,
        }
    }
}

/// The ingestion pipeline. Runs for different sources may proceed
/// concurrently; runs for the same source name are serialized.
pub struct RssIngester {
    ctx: IngestContext,
    source_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// An empty fetched marker carries no information and never counts as unchanged.
pub fn is_unchanged(stored: &str, fetched: &str) -> bool {
    !fetched.is_empty() && stored == fetched
}

fn source_summary(source: &FeedSource) -> SourceFeedSummary {
    SourceFeedSummary {
        id: source.id.clone(),
        url: source.url.clone(),
        title: source.name.clone(),
        etag: source.etag.clone(),
        last_updated: source.last_updated.clone(),
        execute_time: source.schedule.clone(),
    }
}

impl RssIngester {
    pub fn new(ctx: IngestContext) -> Self {
        Self {
            ctx,
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Validate and register a feed source. An existing source with the
    /// same name is returned as stored.
    pub async fn register(&self, source: FeedSource) -> Result<FeedSource> {
        rss_utils::url::validate_feed_url(&source.url)?;
        self.ctx.sources.upsert(&source).await
    }

    pub async fn list_sources(&self) -> Result<Vec<FeedSource>> {
        self.ctx.sources.list().await
    }

    /// Run every registered source, one run per source, concurrently.
    pub async fn ingest_all(&self) -> Result<Vec<FeedExtractionSummary>> {
        let sources = self.ctx.sources.list().await?;
        info!("Ingesting {} feed sources", sources.len());

        let summaries = join_all(sources.iter().map(|s| self.ingest_source(&s.name))).await;

        let failed = summaries.iter().filter(|s| s.has_error()).count();
        info!("Ingested {}/{} feed sources without run errors", summaries.len() - failed, summaries.len());
        Ok(summaries)
    }

    pub async fn ingest_source(&self, name: &str) -> FeedExtractionSummary {
        let lock = self.source_lock(name);
        let summary = {
            let _guard = lock.lock().await;
            self.run(name).await
        };

        if summary.outcome == RunOutcome::SourceLookupFailed {
            self.release_lock(name, lock);
        }
        summary
    }

    fn source_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.source_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Forget the lock for a name that did not resolve, unless another run
    /// is still holding or waiting on it.
    fn release_lock(&self, name: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.source_locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(name)
            .is_some_and(|tracked| Arc::ptr_eq(tracked, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(name);
        }
    }

    #[cfg(test)]
    fn tracked_sources(&self) -> usize {
        self.source_locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn run(&self, name: &str) -> FeedExtractionSummary {
        let mut summary = FeedExtractionSummary::new(name);
        info!("Starting ingestion for feed source {}", name);

        let source = match self.ctx.sources.get(name).await {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to load feed source {}: {}", name, e);
                summary.error = e.to_string();
                summary.status = status::SOURCE_LOOKUP_FAILED.to_string();
                summary.outcome = RunOutcome::SourceLookupFailed;
                return summary;
            }
        };
        summary.id = source.id.clone();
        summary.source_feed = source_summary(&source);

        let etag = (!source.etag.is_empty()).then_some(source.etag.as_str());
        let feed = match self.ctx.fetcher.fetch_conditional(&source.url, etag).await {
            Ok(FetchResult::Fetched(feed)) => feed,
            Ok(FetchResult::NotModified) => {
                info!("Feed {} not modified (etag {})", name, source.etag);
                summary.status = status::not_modified(&source.name, &source.etag);
                summary.outcome = RunOutcome::NoChange;
                return summary;
            }
            Err(e) => {
                error!("Failed to fetch feed {} from {}: {}", name, source.url, e);
                summary.error = e.to_string();
                summary.status = status::FETCH_FAILED.to_string();
                summary.outcome = RunOutcome::FetchFailed;
                return summary;
            }
        };

        if is_unchanged(&source.last_updated, &feed.updated) {
            info!("Feed {} unchanged since {}", name, feed.updated);
            summary.status = status::no_change(&source.name, &source.last_updated, &feed.updated);
            summary.outcome = RunOutcome::NoChange;
            return summary;
        }

        let downloaded_at = rss_utils::time::download_stamp();
        for item in &feed.items {
            let entry = self.ingest_item(&source, item, &downloaded_at).await;
            summary.entries.push(entry);
        }

        summary.status = status::INGESTED.to_string();
        summary.outcome = RunOutcome::Ingested;

        if let Err(e) = self.finalize(&source, &feed).await {
            error!("Failed to update last_updated for {}: {}", name, e);
            summary.error = e.to_string();
            summary.status = status::FINALIZE_FAILED.to_string();
            summary.outcome = RunOutcome::FinalizeFailed;
        }

        let created = summary
            .entries
            .iter()
            .filter(|e| e.outcome == EntryOutcome::Created)
            .count();
        info!(
            "Feed {}: {} items, {} new articles, run status {:?}",
            name,
            summary.entries.len(),
            created,
            summary.outcome
        );
        summary
    }

    async fn finalize(&self, source: &FeedSource, feed: &ParsedFeed) -> Result<()> {
        if feed.updated != source.last_updated {
            self.ctx
                .sources
                .update_last_modified(&source.name, &feed.updated)
                .await?;
        }

        if let Some(etag) = feed.etag.as_deref().filter(|e| !e.is_empty() && *e != source.etag) {
            self.ctx.sources.update_etag(&source.name, etag).await?;
        }
        Ok(())
    }

    async fn ingest_item(&self, source: &FeedSource, item: &ParsedItem, downloaded_at: &str) -> ArticleExtractionSummary {
        let mut entry = ArticleExtractionSummary {
            title: item.title.clone(),
            url: item.link.clone(),
            ..Default::default()
        };

        match self.ctx.articles.find_by_name_and_url(&item.title, &item.link).await {
            Err(e) => {
                warn!("Article lookup failed for {}: {}", item.title, e);
                entry.error = e.to_string();
                entry.status = status::LOOKUP_FAILED.to_string();
                entry.outcome = EntryOutcome::LookupFailed;
                return entry;
            }
            Ok(Some(existing)) => {
                entry.id = existing.id;
                entry.status = status::ALREADY_EXISTS.to_string();
                entry.outcome = EntryOutcome::AlreadyExists;
                return entry;
            }
            Ok(None) => {}
        }

        let article = match self
            .ctx
            .articles
            .create(&item.to_article(), &source.name, downloaded_at)
            .await
        {
            Ok(article) => article,
            Err(e) => {
                warn!("Failed to create article {}: {}", item.title, e);
                entry.error = e.to_string();
                entry.status = status::CREATE_FAILED.to_string();
                entry.outcome = EntryOutcome::CreateFailed;
                return entry;
            }
        };

        entry.id = article.id;
        entry.status = status::CREATED.to_string();
        entry.outcome = EntryOutcome::Created;

        for author in &item.authors {
            let author_summary = self.ingest_author(item, author).await;
            entry.authors.push(author_summary);
        }
        entry
    }

    async fn ingest_author(&self, item: &ParsedItem, author: &ParsedAuthor) -> AuthorExtractionSummary {
        let mut summary = AuthorExtractionSummary {
            name: author.name.clone(),
            ..Default::default()
        };

        let existing = match self.ctx.authors.find_by_name(&author.name).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Author lookup failed for {}: {}", author.name, e);
                summary.error = e.to_string();
                summary.status = status::AUTHOR_LOOKUP_FAILED.to_string();
                summary.outcome = AuthorOutcome::AuthorLookupFailed;
                return summary;
            }
        };

        match existing {
            Some(existing) => {
                summary.id = existing.id.clone();
                match self
                    .ctx
                    .authors
                    .link_existing(&item.title, &item.link, &existing.name)
                    .await
                {
                    Ok(()) => {
                        summary.status = status::LINKED_EXISTING.to_string();
                        summary.outcome = AuthorOutcome::LinkedExisting;
                    }
                    Err(e) => {
                        warn!("Failed to link author {} to {}: {}", existing.name, item.title, e);
                        summary.error = e.to_string();
                        summary.status = status::link_failed(&existing.name, &item.title);
                        summary.outcome = AuthorOutcome::LinkFailed;
                    }
                }
            }
            None => match self
                .ctx
                .authors
                .create_and_link(&item.title, &item.link, &author.name, &author.email)
                .await
            {
                Ok(created) => {
                    summary.id = created.id;
                    summary.status = status::CREATED_NEW.to_string();
                    summary.outcome = AuthorOutcome::CreatedNew;
                }
                Err(e) => {
                    warn!("Failed to create author {} for {}: {}", author.name, item.title, e);
                    summary.error = e.to_string();
                    summary.status = status::create_and_link_failed(&author.name, &item.title);
                    summary.outcome = AuthorOutcome::CreateAndLinkFailed;
                }
            },
        }
        summary
    }
}

impl Ingester for RssIngester {
    async fn ingest(&self, source_name: &str) -> FeedExtractionSummary {
        self.ingest_source(source_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MockFetcher, MockGraph};

    #[test]
    fn unchanged_requires_equal_non_empty_marker() {
        assert!(is_unchanged("2024-01-01", "2024-01-01"));
        assert!(!is_unchanged("", "2024-01-01"));
        assert!(!is_unchanged("2023-12-31", "2024-01-01"));
        assert!(!is_unchanged("", ""));
    }

    #[test]
    fn source_summary_maps_schedule_to_execute_time() {
        let summary = source_summary(&FeedSource {
            id: "4:1".into(),
            name: "38 North".into(),
            url: "https://www.38north.org/feed".into(),
            schedule: "18:00".into(),
            etag: "\"abc\"".into(),
            last_updated: "2023-12-31".into(),
            created: None,
        });
        assert_eq!(summary.title, "38 North");
        assert_eq!(summary.execute_time, "18:00");
        assert_eq!(summary.etag, "\"abc\"");
    }

    fn mock_ingester() -> RssIngester {
        let graph = Arc::new(
            MockGraph::new().with_source(testing::source("38 North", "https://www.38north.org/feed", "")),
        );
        let fetcher = Arc::new(MockFetcher::new().on_feed(
            "https://www.38north.org/feed",
            testing::feed("2024-01-01", vec![]),
        ));
        RssIngester::new(testing::context(&graph, &fetcher))
    }

    #[tokio::test]
    async fn unresolved_names_leave_no_lock_behind() {
        let ingester = mock_ingester();

        for name in ["ghost-1", "ghost-2", "ghost-3"] {
            let summary = ingester.ingest_source(name).await;
            assert_eq!(summary.outcome, RunOutcome::SourceLookupFailed);
        }
        assert_eq!(ingester.tracked_sources(), 0);

        ingester.ingest_source("38 North").await;
        assert_eq!(ingester.tracked_sources(), 1);
    }

    #[tokio::test]
    async fn waiting_run_keeps_the_lock_entry() {
        let ingester = mock_ingester();
        let held = ingester.source_lock("ghost");
        let _guard = held.lock().await;

        ingester.release_lock("ghost", ingester.source_lock("ghost"));
        assert_eq!(ingester.tracked_sources(), 1);
    }
}
