use crate::parser::FeedParser;
use crate::traits::FeedFetch;
use crate::types::{FetchConfig, FetchResult, IngestError, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// HTTP feed retrieval. Redirects are never followed: any status of 300
/// or above is reported as a failure, except 304 when an etag was sent.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, config })
    }

    fn backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        let delay = Duration::from_secs(self.config.retry_delay_seconds);
        ExponentialBackoff {
            current_interval: delay,
            initial_interval: delay,
            max_interval: delay * 32,
            multiplier: 2.0,
            max_elapsed_time: Some(delay * 60),
            ..Default::default()
        }
    }

    async fn send(&self, url: &str, etag: Option<&str>) -> reqwest::Result<Response> {
        let mut request = self.client.get(url);

        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }

        request.send().await
    }

    async fn read_feed(&self, url: &str, response: Response) -> Result<FetchResult> {
        let new_etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let limit = self.config.max_feed_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(IngestError::FeedTooLarge {
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let body = response.bytes().await?;
        if body.len() > limit {
            return Err(IngestError::FeedTooLarge {
                size_mb: body.len() / (1024 * 1024),
            });
        }

        info!("Successfully fetched feed: {} ({} bytes)", url, body.len());

        let mut feed = FeedParser::parse_feed(&body)?;
        feed.etag = new_etag;
        Ok(FetchResult::Fetched(feed))
    }
}

#[async_trait]
impl FeedFetch for Fetcher {
    async fn fetch_conditional(&self, url: &str, etag: Option<&str>) -> Result<FetchResult> {
        let start_time = Instant::now();
        let etag = etag.filter(|e| !e.is_empty());
        let mut backoff = self.backoff();
        let mut attempt = 0;

        debug!("Fetching feed: {} (etag {:?})", url, etag);

        loop {
            let retry_error = match self.send(url, etag).await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::NOT_MODIFIED && etag.is_some() {
                        debug!("Feed not modified: {}", url);
                        return Ok(FetchResult::NotModified);
                    }

                    if status.is_server_error() {
                        IngestError::Http {
                            url: url.to_string(),
                            status: status.as_u16(),
                        }
                    } else if status.as_u16() >= 300 {
                        return Err(IngestError::Http {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    } else {
                        let result = self.read_feed(url, response).await;
                        debug!("Fetch of {} took {:?}", url, start_time.elapsed());
                        return result;
                    }
                }
                // Retry transport failures only; builder and decode errors are final.
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => IngestError::from(e),
                Err(e) => return Err(e.into()),
            };

            if attempt >= self.config.max_retries {
                return Err(retry_error);
            }
            match backoff.next_backoff() {
                Some(delay) => {
                    attempt += 1;
                    warn!("Attempt {} failed for {}: {}. Retrying in {:?}", attempt, url, retry_error, delay);
                    tokio::time::sleep(delay).await;
                }
                None => return Err(retry_error),
            }
        }
    }
}
