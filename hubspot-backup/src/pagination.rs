//! Pagination strategies and the immutable page job they advance.
//!
//! A strategy never performs I/O. The crawler fetches and writes a page, then
//! asks [`next_step`] whether the branch ends or which job comes next.

use crate::config::BackupConfig;
use crate::envelope::{CursorField, Envelope};
use crate::transport::Credentials;
use crate::{BackupError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How an endpoint is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Continue while `has-more` is set, resuming at the envelope's `offset`
    HasMore,
    /// Exactly one request, whatever the envelope says
    Once,
    /// Continue while pages are non-empty, advancing by the items received
    Limit,
    /// `HasMore` over `vidOffset`/`vid-offset`, with a pause between pages
    Contacts,
}

impl Strategy {
    fn offset_param(&self) -> &'static str {
        match self {
            Strategy::Contacts => "vidOffset",
            _ => "offset",
        }
    }

    fn cursor_field(&self) -> CursorField {
        match self {
            Strategy::Contacts => CursorField::VidOffset,
            _ => CursorField::Offset,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::HasMore => "has-more",
            Strategy::Once => "once",
            Strategy::Limit => "limit",
            Strategy::Contacts => "contacts",
        };
        f.write_str(name)
    }
}

/// Knobs shared by every strategy, taken from `[backup]`
#[derive(Debug, Clone)]
pub struct PagingOptions {
    pub page_size: u32,
    pub contacts_page_size: u32,
    pub contacts_delay: Duration,
    pub track_contacts_continuations: bool,
    pub max_pages: Option<u32>,
}

impl From<&BackupConfig> for PagingOptions {
    fn from(config: &BackupConfig) -> Self {
        Self {
            page_size: config.page_size,
            contacts_page_size: config.contacts_page_size,
            contacts_delay: config.contacts_delay(),
            track_contacts_continuations: config.track_contacts_continuations,
            max_pages: config.max_pages,
        }
    }
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self::from(&BackupConfig::default())
    }
}

impl PagingOptions {
    fn page_size(&self, strategy: Strategy) -> u32 {
        match strategy {
            Strategy::Contacts => self.contacts_page_size,
            _ => self.page_size,
        }
    }
}

/// One remote collection and where its files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Output directory name; also the fallback item key in responses
    pub name: String,
    pub url: String,
    pub strategy: Strategy,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            strategy,
        }
    }
}

/// A single page request. Continuations are new values, never mutations.
#[derive(Debug, Clone)]
pub struct EndpointJob {
    pub endpoint: Arc<Endpoint>,
    /// Offset sent upstream, and the index of the first item on this page
    pub offset: u64,
    /// Zero-based page number within the branch
    pub page: u32,
}

impl EndpointJob {
    pub fn first(endpoint: Arc<Endpoint>) -> Self {
        Self {
            endpoint,
            offset: 0,
            page: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.endpoint.name
    }

    /// `<url>?count=<n>&<param>=<offset>`, plus `&hapikey=` in legacy mode
    pub fn url(&self, options: &PagingOptions, credentials: &Credentials) -> String {
        let strategy = self.endpoint.strategy;
        let url = format!(
            "{}?count={}&{}={}",
            self.endpoint.url.trim(),
            options.page_size(strategy),
            strategy.offset_param(),
            self.offset
        );
        credentials.sign_url(url)
    }

    /// Offset just past the last item of a page holding `items` records
    pub fn page_end(&self, items: usize) -> Result<u64> {
        self.offset.checked_add(items as u64).ok_or_else(|| {
            BackupError::Envelope(format!(
                "{} page at offset {} with {} items runs past the largest index",
                self.name(),
                self.offset,
                items
            ))
        })
    }

    fn advance(&self, offset: u64) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            offset,
            page: self.page + 1,
        }
    }
}

/// A follow-up page and how it is to be scheduled
#[derive(Debug, Clone)]
pub struct Continuation {
    pub job: EndpointJob,
    /// Pause before the request is issued
    pub delay: Option<Duration>,
    /// Counted by the run's task tracker
    pub tracked: bool,
}

#[derive(Debug, Clone)]
pub enum Step {
    Done,
    Continue(Continuation),
}

/// Decide what follows a page that has already been written.
///
/// An empty page always ends the branch. A `has-more` page without a usable
/// cursor is an error: the branch cannot continue without guessing.
pub fn next_step(job: &EndpointJob, envelope: &Envelope, options: &PagingOptions) -> Result<Step> {
    if envelope.items.is_empty() {
        return Ok(Step::Done);
    }

    let strategy = job.endpoint.strategy;
    let next_offset = match strategy {
        Strategy::Once => return Ok(Step::Done),
        Strategy::Limit => job.page_end(envelope.items.len())?,
        Strategy::HasMore | Strategy::Contacts => {
            if !envelope.has_more {
                return Ok(Step::Done);
            }
            let field = strategy.cursor_field();
            envelope.cursor(field).ok_or_else(|| {
                BackupError::Envelope(format!(
                    "{} reports more results but has no numeric \"{}\"",
                    job.name(),
                    field.key()
                ))
            })?
        }
    };

    if let Some(max_pages) = options.max_pages {
        if job.page + 1 >= max_pages {
            warn!(
                endpoint = job.name(),
                max_pages, "Page limit reached, stopping before offset {}", next_offset
            );
            return Ok(Step::Done);
        }
    }

    let (delay, tracked) = match strategy {
        Strategy::Contacts => (
            Some(options.contacts_delay),
            options.track_contacts_continuations,
        ),
        _ => (None, true),
    };

    Ok(Step::Continue(Continuation {
        job: job.advance(next_offset),
        delay,
        tracked,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(strategy: Strategy, offset: u64) -> EndpointJob {
        EndpointJob {
            endpoint: Arc::new(Endpoint::new("widgets", "https://api.test/widgets", strategy)),
            offset,
            page: 0,
        }
    }

    fn page(items: usize, has_more: Option<bool>, offset: Option<u64>) -> Envelope {
        Envelope {
            items: (0..items).map(|i| json!({ "id": i })).collect(),
            has_more: has_more.unwrap_or(false),
            offset,
            vid_offset: offset,
        }
    }

    fn continuation(step: Step) -> Continuation {
        match step {
            Step::Continue(next) => next,
            Step::Done => panic!("expected a continuation"),
        }
    }

    #[test]
    fn test_request_urls() {
        let options = PagingOptions::default();
        let token = Credentials::app_token("t");

        assert_eq!(
            job(Strategy::Limit, 500).url(&options, &token),
            "https://api.test/widgets?count=250&offset=500"
        );
        assert_eq!(
            job(Strategy::Contacts, 9001).url(&options, &token),
            "https://api.test/widgets?count=100&vidOffset=9001"
        );
        assert_eq!(
            job(Strategy::Once, 0).url(&options, &Credentials::api_key("k")),
            "https://api.test/widgets?count=250&offset=0&hapikey=k"
        );
    }

    #[test]
    fn test_empty_page_ends_every_strategy() {
        let options = PagingOptions::default();
        for strategy in [Strategy::HasMore, Strategy::Once, Strategy::Limit, Strategy::Contacts] {
            let step = next_step(&job(strategy, 10), &page(0, Some(true), Some(20)), &options);
            assert!(matches!(step, Ok(Step::Done)), "{} should stop", strategy);
        }
    }

    #[test]
    fn test_has_more_follows_envelope_offset() {
        let options = PagingOptions::default();
        let next = continuation(
            next_step(&job(Strategy::HasMore, 0), &page(2, Some(true), Some(2)), &options).unwrap(),
        );
        assert_eq!(next.job.offset, 2);
        assert_eq!(next.job.page, 1);
        assert!(next.tracked);
        assert!(next.delay.is_none());

        let done = next_step(&job(Strategy::HasMore, 0), &page(2, Some(false), Some(2)), &options);
        assert!(matches!(done, Ok(Step::Done)));
    }

    #[test]
    fn test_has_more_without_offset_is_error() {
        let options = PagingOptions::default();
        let result = next_step(&job(Strategy::HasMore, 0), &page(1, Some(true), None), &options);
        assert!(matches!(result, Err(BackupError::Envelope(_))));
    }

    #[test]
    fn test_once_ignores_has_more() {
        let options = PagingOptions::default();
        let step = next_step(&job(Strategy::Once, 0), &page(250, Some(true), Some(250)), &options);
        assert!(matches!(step, Ok(Step::Done)));
    }

    #[test]
    fn test_limit_advances_by_items_received() {
        let options = PagingOptions::default();
        // A short page still continues: only an empty page stops the branch
        let next = continuation(
            next_step(&job(Strategy::Limit, 250), &page(3, None, Some(99_999)), &options).unwrap(),
        );
        assert_eq!(next.job.offset, 253);
    }

    #[test]
    fn test_limit_offset_overflow_is_error() {
        let options = PagingOptions::default();
        let result = next_step(&job(Strategy::Limit, u64::MAX - 1), &page(2, None, None), &options);
        assert!(matches!(result, Err(BackupError::Envelope(_))));

        assert_eq!(job(Strategy::Limit, u64::MAX - 1).page_end(1).unwrap(), u64::MAX);
    }

    #[test]
    fn test_contacts_delay_and_tracking() {
        let mut options = PagingOptions::default();
        let envelope = Envelope {
            items: vec![json!({})],
            has_more: true,
            offset: Some(1),
            vid_offset: Some(4242),
        };

        let next = continuation(next_step(&job(Strategy::Contacts, 0), &envelope, &options).unwrap());
        assert_eq!(next.job.offset, 4242);
        assert_eq!(next.delay, Some(Duration::from_secs(1)));
        assert!(next.tracked);

        options.track_contacts_continuations = false;
        let next = continuation(next_step(&job(Strategy::Contacts, 0), &envelope, &options).unwrap());
        assert!(!next.tracked);
    }

    #[test]
    fn test_max_pages_caps_branch() {
        let options = PagingOptions {
            max_pages: Some(2),
            ..PagingOptions::default()
        };
        let mut current = job(Strategy::Limit, 0);

        let next = continuation(next_step(&current, &page(5, None, None), &options).unwrap());
        current = next.job;
        assert_eq!(current.page, 1);

        let step = next_step(&current, &page(5, None, None), &options).unwrap();
        assert!(matches!(step, Step::Done));
    }
}
