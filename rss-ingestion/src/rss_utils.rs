//! RSS-specific utility functions for the ingester

/// URL utilities for RSS feeds
pub mod url {
    use crate::types::{IngestError, Result};
    use url::Url;

    /// Validate RSS feed URL format
    pub fn validate_feed_url(url_str: &str) -> Result<Url> {
        let url = Url::parse(url_str)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(IngestError::UnsupportedScheme {
                url: url_str.to_string(),
            }),
        }
    }
}

/// Time utilities for ingestion runs
pub mod time {
    use chrono::{Local, NaiveDate};

    pub const DOWNLOAD_DATE_FORMAT: &str = "%Y-%m-%d";

    /// Calendar date stamped on `CONTAINS_ARTICLE` edges, in local time.
    pub fn download_stamp() -> String {
        format_download_date(Local::now().date_naive())
    }

    pub fn format_download_date(date: NaiveDate) -> String {
        date.format(DOWNLOAD_DATE_FORMAT).to_string()
    }
}
