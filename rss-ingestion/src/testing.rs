// Test mocks for the ingestion pipeline.
//
// - ScriptedStore (GraphStore): replays queued results, records every statement
// - MockFetcher (FeedFetch): URL to canned response map
// - MockGraph (SourceStore + ArticleStore + AuthorStore): stateful in-memory graph
//
// Plus builders for feeds, items and sources.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::graph::{GraphStore, Record, Statement};
use crate::traits::{ArticleStore, AuthorStore, FeedFetch, SourceStore};
use crate::types::{
    Article, Author, FeedSource, FetchResult, IngestError, ParsedAuthor, ParsedFeed, ParsedItem,
    Result,
};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn source(name: &str, url: &str, last_updated: &str) -> FeedSource {
    FeedSource {
        name: name.to_string(),
        url: url.to_string(),
        schedule: "18:00".to_string(),
        last_updated: last_updated.to_string(),
        ..Default::default()
    }
}

pub fn item(title: &str, link: &str, authors: &[(&str, &str)]) -> ParsedItem {
    ParsedItem {
        title: title.to_string(),
        link: link.to_string(),
        description: format!("About {title}"),
        published: "2023-12-31T10:00:00+00:00".to_string(),
        updated: String::new(),
        authors: authors
            .iter()
            .map(|(name, email)| ParsedAuthor {
                name: name.to_string(),
                email: email.to_string(),
            })
            .collect(),
    }
}

pub fn feed(updated: &str, items: Vec<ParsedItem>) -> ParsedFeed {
    ParsedFeed {
        title: None,
        updated: updated.to_string(),
        items,
        etag: None,
    }
}

// ---------------------------------------------------------------------------
// ScriptedStore
// ---------------------------------------------------------------------------

/// Replays queued results in order. An empty queue answers with no rows.
#[derive(Default)]
pub struct ScriptedStore {
    responses: Mutex<VecDeque<std::result::Result<Vec<Record>, String>>>,
    statements: Mutex<Vec<Statement>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, records: Vec<Record>) {
        self.responses.lock().unwrap().push_back(Ok(records));
    }

    pub fn fail(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn run(&self, statement: Statement) -> Result<Vec<Record>> {
        self.statements.lock().unwrap().push(statement);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(records)) => Ok(records),
            Some(Err(message)) => Err(IngestError::Graph(message)),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum CannedResponse {
    Feed(ParsedFeed),
    NotModified,
    Status(u16),
    Garbage,
}

/// URL keyed fetcher. Unregistered URLs answer 404.
/// Builder pattern: `.on_feed()`, `.on_status()`, `.on_not_modified()`.
#[derive(Default)]
pub struct MockFetcher {
    responses: HashMap<String, CannedResponse>,
    latency: Option<Duration>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_feed(mut self, url: &str, feed: ParsedFeed) -> Self {
        self.responses.insert(url.to_string(), CannedResponse::Feed(feed));
        self
    }

    pub fn on_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), CannedResponse::Status(status));
        self
    }

    /// Answers 304 when the caller sends an etag, otherwise acts unregistered.
    pub fn on_not_modified(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), CannedResponse::NotModified);
        self
    }

    pub fn on_garbage(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), CannedResponse::Garbage);
        self
    }

    /// Sleep before answering so concurrent runs interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn etags_sent(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }
}

#[async_trait]
impl FeedFetch for MockFetcher {
    async fn fetch_conditional(&self, url: &str, etag: Option<&str>) -> Result<FetchResult> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), etag.map(|e| e.to_string())));

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let not_found = IngestError::Http {
            url: url.to_string(),
            status: 404,
        };
        match self.responses.get(url).cloned() {
            Some(CannedResponse::Feed(feed)) => Ok(FetchResult::Fetched(feed)),
            Some(CannedResponse::NotModified) if etag.is_some() => Ok(FetchResult::NotModified),
            Some(CannedResponse::Status(status)) => Err(IngestError::Http {
                url: url.to_string(),
                status,
            }),
            Some(CannedResponse::Garbage) => {
                Err(IngestError::Parse("Failed to parse feed: no root element".into()))
            }
            Some(CannedResponse::NotModified) | None => Err(not_found),
        }
    }
}

// ---------------------------------------------------------------------------
// MockGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredArticle {
    pub article: Article,
    pub source_name: String,
    pub downloaded_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WroteEdge {
    pub author: String,
    pub article_name: String,
    pub article_url: String,
}

#[derive(Default)]
struct MockGraphInner {
    next_id: u64,
    sources: Vec<FeedSource>,
    articles: Vec<StoredArticle>,
    authors: Vec<Author>,
    wrote: Vec<WroteEdge>,
    writes: usize,
    failing_source_lookup: bool,
    failing_finalize: bool,
    failing_article_lookups: HashSet<String>,
    failing_article_creates: HashSet<String>,
    failing_author_lookups: HashSet<String>,
    failing_links: HashSet<String>,
    failing_author_creates: HashSet<String>,
}

impl MockGraphInner {
    fn assign_id(&mut self) -> String {
        self.next_id += 1;
        format!("4:mock:{}", self.next_id)
    }

    fn has_article(&self, name: &str, url: &str) -> bool {
        self.articles
            .iter()
            .any(|a| a.article.name == name && a.article.url == url)
    }

    fn source_mut(&mut self, name: &str) -> Result<&mut FeedSource> {
        self.sources
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| IngestError::NotFound {
                entity: "Source",
                key: name.to_string(),
            })
    }
}

/// Stateful in-memory graph. Thread-safe via interior Mutex.
#[derive(Default)]
pub struct MockGraph {
    inner: Mutex<MockGraphInner>,
}

fn injected(what: &str, key: &str) -> IngestError {
    IngestError::Graph(format!("injected {what} failure for {key}"))
}

impl MockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding ---

    pub fn with_source(self, mut source: FeedSource) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            if source.id.is_empty() {
                source.id = inner.assign_id();
            }
            inner.sources.push(source);
        }
        self
    }

    pub fn with_article(self, source_name: &str, title: &str, url: &str) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.assign_id();
            inner.articles.push(StoredArticle {
                article: Article {
                    id,
                    name: title.to_string(),
                    url: url.to_string(),
                    ..Default::default()
                },
                source_name: source_name.to_string(),
                downloaded_at: "2020-01-01".to_string(),
            });
        }
        self
    }

    pub fn with_author(self, name: &str, email: &str) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.assign_id();
            inner.authors.push(Author {
                id,
                name: name.to_string(),
                email: email.to_string(),
            });
        }
        self
    }

    // --- failure injection ---

    pub fn failing_source_lookup(self) -> Self {
        self.inner.lock().unwrap().failing_source_lookup = true;
        self
    }

    pub fn failing_finalize(self) -> Self {
        self.inner.lock().unwrap().failing_finalize = true;
        self
    }

    pub fn failing_article_lookup(self, title: &str) -> Self {
        self.inner.lock().unwrap().failing_article_lookups.insert(title.to_string());
        self
    }

    pub fn failing_article_create(self, title: &str) -> Self {
        self.inner.lock().unwrap().failing_article_creates.insert(title.to_string());
        self
    }

    pub fn failing_author_lookup(self, name: &str) -> Self {
        self.inner.lock().unwrap().failing_author_lookups.insert(name.to_string());
        self
    }

    pub fn failing_link(self, name: &str) -> Self {
        self.inner.lock().unwrap().failing_links.insert(name.to_string());
        self
    }

    pub fn failing_author_create(self, name: &str) -> Self {
        self.inner.lock().unwrap().failing_author_creates.insert(name.to_string());
        self
    }

    // --- assertions ---

    /// Mutating calls that reached the graph, seeding excluded.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    pub fn source(&self, name: &str) -> Option<FeedSource> {
        self.inner.lock().unwrap().sources.iter().find(|s| s.name == name).cloned()
    }

    pub fn article_count(&self) -> usize {
        self.inner.lock().unwrap().articles.len()
    }

    pub fn article(&self, title: &str) -> Option<StoredArticle> {
        self.inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .find(|a| a.article.name == title)
            .cloned()
    }

    pub fn author_count(&self) -> usize {
        self.inner.lock().unwrap().authors.len()
    }

    pub fn author(&self, name: &str) -> Option<Author> {
        self.inner.lock().unwrap().authors.iter().find(|a| a.name == name).cloned()
    }

    pub fn wrote_edges(&self) -> Vec<WroteEdge> {
        self.inner.lock().unwrap().wrote.clone()
    }

    pub fn wrote(&self, author: &str, article_name: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .wrote
            .iter()
            .any(|w| w.author == author && w.article_name == article_name)
    }
}

#[async_trait]
impl SourceStore for MockGraph {
    async fn get(&self, name: &str) -> Result<FeedSource> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_source_lookup {
            return Err(injected("source lookup", name));
        }
        let matches: Vec<&FeedSource> = inner.sources.iter().filter(|s| s.name == name).collect();
        match matches.as_slice() {
            [] => Err(IngestError::NotFound {
                entity: "Source",
                key: name.to_string(),
            }),
            [only] => Ok((*only).clone()),
            many => Err(IngestError::AmbiguousResult {
                entity: "Source",
                key: name.to_string(),
                count: many.len(),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<FeedSource>> {
        let mut sources = self.inner.lock().unwrap().sources.clone();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn upsert(&self, source: &FeedSource) -> Result<FeedSource> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.sources.iter().find(|s| s.name == source.name) {
            return Ok(existing.clone());
        }
        let mut created = source.clone();
        created.id = inner.assign_id();
        inner.writes += 1;
        inner.sources.push(created.clone());
        Ok(created)
    }

    async fn update_last_modified(&self, name: &str, last_updated: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_finalize {
            return Err(injected("last_updated", name));
        }
        inner.writes += 1;
        inner.source_mut(name)?.last_updated = last_updated.to_string();
        Ok(())
    }

    async fn update_etag(&self, name: &str, etag: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.writes += 1;
        inner.source_mut(name)?.etag = etag.to_string();
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for MockGraph {
    async fn find_by_name_and_url(&self, name: &str, url: &str) -> Result<Option<Article>> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_article_lookups.contains(name) {
            return Err(injected("article lookup", name));
        }
        Ok(inner
            .articles
            .iter()
            .find(|a| a.article.name == name && a.article.url == url)
            .map(|a| a.article.clone()))
    }

    async fn create(&self, article: &Article, source_name: &str, downloaded_at: &str) -> Result<Article> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_article_creates.contains(&article.name) {
            return Err(injected("article create", &article.name));
        }
        if !inner.sources.iter().any(|s| s.name == source_name) {
            return Err(IngestError::SourceNotFound {
                name: source_name.to_string(),
            });
        }
        let mut created = article.clone();
        created.id = inner.assign_id();
        inner.writes += 1;
        inner.articles.push(StoredArticle {
            article: created.clone(),
            source_name: source_name.to_string(),
            downloaded_at: downloaded_at.to_string(),
        });
        Ok(created)
    }
}

#[async_trait]
impl AuthorStore for MockGraph {
    async fn find_by_name(&self, name: &str) -> Result<Option<Author>> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_author_lookups.contains(name) {
            return Err(injected("author lookup", name));
        }
        Ok(inner.authors.iter().find(|a| a.name == name).cloned())
    }

    async fn link_existing(&self, article_name: &str, article_url: &str, author_name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_links.contains(author_name) {
            return Err(injected("link", author_name));
        }
        let author_known = inner.authors.iter().any(|a| a.name == author_name);
        if !author_known || !inner.has_article(article_name, article_url) {
            return Err(IngestError::NotFound {
                entity: "Article or Author",
                key: format!("{author_name} -> {article_name} ({article_url})"),
            });
        }
        inner.writes += 1;
        inner.wrote.push(WroteEdge {
            author: author_name.to_string(),
            article_name: article_name.to_string(),
            article_url: article_url.to_string(),
        });
        Ok(())
    }

    async fn create_and_link(
        &self,
        article_name: &str,
        article_url: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<Author> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_author_creates.contains(author_name) {
            return Err(injected("author create", author_name));
        }
        if !inner.has_article(article_name, article_url) {
            return Err(IngestError::ArticleNotFound {
                name: article_name.to_string(),
                url: article_url.to_string(),
            });
        }
        let existing = inner.authors.iter().find(|a| a.name == author_name).cloned();
        let author = match existing {
            Some(existing) => existing,
            None => {
                let created = Author {
                    id: inner.assign_id(),
                    name: author_name.to_string(),
                    email: author_email.to_string(),
                };
                inner.authors.push(created.clone());
                created
            }
        };
        inner.writes += 1;
        inner.wrote.push(WroteEdge {
            author: author_name.to_string(),
            article_name: article_name.to_string(),
            article_url: article_url.to_string(),
        });
        Ok(author)
    }
}

/// Wire one mock graph behind all three repository seams.
pub fn context(graph: &std::sync::Arc<MockGraph>, fetcher: &std::sync::Arc<MockFetcher>) -> crate::ingester::IngestContext {
    crate::ingester::IngestContext {
        sources: graph.clone(),
        articles: graph.clone(),
        authors: graph.clone(),
        fetcher: fetcher.clone(),
    }
}
