use serde::{Deserialize, Serialize};
use std::future::Future;

/// Terminal state of one ingestion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunOutcome {
    #[default]
    Pending,
    SourceLookupFailed,
    FetchFailed,
    NoChange,
    Ingested,
    FinalizeFailed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EntryOutcome {
    #[default]
    Pending,
    LookupFailed,
    AlreadyExists,
    CreateFailed,
    Created,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthorOutcome {
    #[default]
    Pending,
    AuthorLookupFailed,
    LinkedExisting,
    LinkFailed,
    CreatedNew,
    CreateAndLinkFailed,
}

/// Snapshot of the feed source as it was loaded at the start of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFeedSummary {
    pub id: String,
    pub url: String,
    pub title: String,
    pub etag: String,
    pub last_updated: String,
    pub execute_time: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorExtractionSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub error: String,
    #[serde(skip)]
    pub outcome: AuthorOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleExtractionSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    pub status: String,
    pub error: String,
    pub authors: Vec<AuthorExtractionSummary>,
    #[serde(skip)]
    pub outcome: EntryOutcome,
}

/// Report of a single ingestion run. The serialized form is the wire
/// contract handed back to callers; `outcome` fields are in-process only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedExtractionSummary {
    pub id: String,
    pub title: String,
    pub status: String,
    pub error: String,
    pub source_feed: SourceFeedSummary,
    pub entries: Vec<ArticleExtractionSummary>,
    #[serde(skip)]
    pub outcome: RunOutcome,
}

impl FeedExtractionSummary {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            ..Default::default()
        }
    }

    /// True when the run itself failed. Item level failures are reported
    /// on the nested entries and do not count here.
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn entry(&self, title: &str) -> Option<&ArticleExtractionSummary> {
        self.entries.iter().find(|e| e.title == title)
    }
}

/// Runs ingestion for one named source. Failures are reported inside the
/// summary, never as an error.
pub trait Ingester {
    fn ingest(&self, source_name: &str) -> impl Future<Output = FeedExtractionSummary> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_to_wire_shape() {
        let mut summary = FeedExtractionSummary::new("38 North");
        summary.outcome = RunOutcome::Ingested;
        summary.entries.push(ArticleExtractionSummary {
            title: "Report X".to_owned(),
            url: "https://x".to_owned(),
            authors: vec![AuthorExtractionSummary {
                name: "Jane Doe".to_owned(),
                outcome: AuthorOutcome::CreatedNew,
                ..Default::default()
            }],
            ..Default::default()
        });

        let value = serde_json::to_value(&summary).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys.len(),
            6,
            "unexpected top level keys: {keys:?}"
        );
        for key in ["id", "title", "status", "error", "source_feed", "entries"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        for key in ["id", "url", "title", "etag", "last_updated", "execute_time"] {
            assert!(value["source_feed"].get(key).is_some(), "missing source_feed.{key}");
        }
        let entry = &value["entries"][0];
        assert_eq!(entry["url"], "https://x");
        assert_eq!(entry["authors"][0]["name"], "Jane Doe");
        assert!(entry.get("outcome").is_none());
    }

    #[test]
    fn has_error_ignores_entry_failures() {
        let mut summary = FeedExtractionSummary::new("feed");
        summary.entries.push(ArticleExtractionSummary {
            error: "boom".to_owned(),
            outcome: EntryOutcome::CreateFailed,
            ..Default::default()
        });
        assert!(!summary.has_error());

        summary.error = "finalize failed".to_owned();
        assert!(summary.has_error());
    }
}
