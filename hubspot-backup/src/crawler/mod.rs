//! Crawl orchestrator - drives every endpoint's pagination chain to completion.
//!
//! Each page is its own task. A task fetches one page, writes its items, and
//! schedules the follow-up page as a new task. All tracked tasks belong to a
//! single `TaskTracker`, so [`Crawler::run`] returns only once every tracked
//! chain has reached a terminal state.


use crate::envelope::{Envelope, ErrorEnvelope};
use crate::pagination::{next_step, Continuation, Endpoint, EndpointJob, PagingOptions, Step};
use crate::progress::{BackupEvent, ProgressReporter};
use crate::transport::Transport;
use crate::writer::ItemWriter;
use crate::{BackupError, Result};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Where a branch ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    /// Still in flight when the run returned (untracked contacts continuation)
    Running,
    Completed,
    Failed(String),
}

/// Per-endpoint counters, final once the branch stops
#[derive(Debug, Clone)]
pub struct EndpointReport {
    pub name: String,
    pub pages: u32,
    pub items_written: u64,
    pub write_failures: u64,
    pub outcome: EndpointOutcome,
}

impl EndpointReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pages: 0,
            items_written: 0,
            write_failures: 0,
            outcome: EndpointOutcome::Running,
        }
    }
}

/// Backup execution result
#[derive(Debug, Clone)]
pub struct BackupReport {
    pub run_id: Uuid,
    pub root: PathBuf,
    pub endpoints: Vec<EndpointReport>,
    pub duration: Duration,
}

impl BackupReport {
    pub fn items_written(&self) -> u64 {
        self.endpoints.iter().map(|e| e.items_written).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &EndpointReport> {
        self.endpoints
            .iter()
            .filter(|e| matches!(e.outcome, EndpointOutcome::Failed(_)))
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointReport> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

/// Main backup orchestrator
pub struct Crawler<T: Transport> {
    transport: Arc<T>,
    writer: ItemWriter,
    reporter: Arc<dyn ProgressReporter>,
    options: PagingOptions,
}

/// State shared by every task of one run
struct CrawlRun<T: Transport> {
    transport: Arc<T>,
    writer: ItemWriter,
    reporter: Arc<dyn ProgressReporter>,
    options: PagingOptions,
    tracker: TaskTracker,
    stats: DashMap<String, EndpointReport>,
    /// `backup{run_id}`, attached to every page task
    span: Span,
}

impl<T: Transport> Crawler<T> {
    pub fn new(
        transport: Arc<T>,
        writer: ItemWriter,
        reporter: Arc<dyn ProgressReporter>,
        options: PagingOptions,
    ) -> Self {
        Self {
            transport,
            writer,
            reporter,
            options,
        }
    }

    /// Back up `endpoints` concurrently and wait for every tracked page task
    pub async fn run(&self, endpoints: Vec<Endpoint>) -> BackupReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("backup", %run_id);
        self.execute(run_id, endpoints, span.clone())
            .instrument(span)
            .await
    }

    async fn execute(&self, run_id: Uuid, endpoints: Vec<Endpoint>, span: Span) -> BackupReport {
        let start_time = Instant::now();
        let names: Vec<String> = endpoints.iter().map(|e| e.name.clone()).collect();

        info!(
            "Backing up {} endpoints into {}",
            endpoints.len(),
            self.writer.root().display()
        );

        let run = Arc::new(CrawlRun {
            transport: Arc::clone(&self.transport),
            writer: self.writer.clone(),
            reporter: Arc::clone(&self.reporter),
            options: self.options.clone(),
            tracker: TaskTracker::new(),
            stats: DashMap::new(),
            span,
        });

        for endpoint in endpoints {
            run.stats
                .insert(endpoint.name.clone(), EndpointReport::new(&endpoint.name));
            run.reporter.report(BackupEvent::EndpointStarted {
                endpoint: endpoint.name.clone(),
            });
            schedule(&run, EndpointJob::first(Arc::new(endpoint)), None, true);
        }

        // Continuations may still be spawned after close; wait() covers them too
        run.tracker.close();
        run.tracker.wait().await;

        let report = BackupReport {
            run_id,
            root: self.writer.root().to_path_buf(),
            endpoints: names
                .iter()
                .filter_map(|name| run.stats.get(name).map(|r| r.value().clone()))
                .collect(),
            duration: start_time.elapsed(),
        };

        for endpoint in &report.endpoints {
            if endpoint.outcome == EndpointOutcome::Running {
                warn!(
                    endpoint = %endpoint.name,
                    "Run finished while this endpoint is still being fetched"
                );
            }
        }

        let failed_endpoints = report.failed().count();
        info!(
            "Backup completed: {} items across {} endpoints ({} failed) in {}s",
            report.items_written(),
            report.endpoints.len(),
            failed_endpoints,
            report.duration.as_secs()
        );
        self.reporter.report(BackupEvent::RunCompleted {
            items: report.items_written(),
            failed_endpoints,
        });

        report
    }
}

/// Spawn one page task. Tracked tasks are registered before they start running.
fn schedule<T: Transport>(
    run: &Arc<CrawlRun<T>>,
    job: EndpointJob,
    delay: Option<Duration>,
    tracked: bool,
) {
    let task_run = Arc::clone(run);
    let task = async move {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(next) = task_run.process(job).await {
            schedule(&task_run, next.job, next.delay, next.tracked);
        }
    }
    .instrument(run.span.clone());

    if tracked {
        run.tracker.spawn(task);
    } else {
        tokio::spawn(task);
    }
}

impl<T: Transport> CrawlRun<T> {
    /// Run one page and settle the branch's bookkeeping.
    /// Returns the follow-up page, if any.
    async fn process(&self, job: EndpointJob) -> Option<Continuation> {
        match self.fetch_and_write(&job).await {
            Ok(Step::Continue(next)) => Some(next),
            Ok(Step::Done) => {
                let total = self.finish(job.name(), EndpointOutcome::Completed);
                self.reporter.report(BackupEvent::EndpointCompleted {
                    endpoint: job.name().to_string(),
                    total,
                });
                None
            }
            Err(e) => {
                error!(
                    endpoint = job.name(),
                    offset = job.offset,
                    "Branch aborted: {}",
                    e
                );
                self.finish(job.name(), EndpointOutcome::Failed(e.to_string()));
                self.reporter.report(BackupEvent::EndpointFailed {
                    endpoint: job.name().to_string(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    async fn fetch_and_write(&self, job: &EndpointJob) -> Result<Step> {
        let endpoint = job.name();
        let url = job.url(&self.options, self.transport.credentials());

        debug!(endpoint, page = job.page, offset = job.offset, "Requesting page");
        let response = self.transport.get(&url).await?;

        if !response.is_success() {
            let body = ErrorEnvelope::parse(&response.body);
            return Err(BackupError::Status {
                status: response.status,
                reason: response.reason().to_string(),
                message: body.message,
            });
        }

        let envelope = Envelope::parse(&response.body, endpoint)?;
        self.update(endpoint, |r| r.pages += 1);

        if envelope.items.is_empty() {
            return Ok(Step::Done);
        }

        let summary = self
            .writer
            .write_page(endpoint, job.offset, &envelope.items)
            .await;
        self.update(endpoint, |r| {
            r.items_written += summary.written as u64;
            r.write_failures += summary.failed as u64;
        });

        let page_end = job.page_end(envelope.items.len())?;
        self.reporter.report(BackupEvent::PageWritten {
            endpoint: endpoint.to_string(),
            total: page_end,
        });

        next_step(job, &envelope, &self.options)
    }

    fn update(&self, endpoint: &str, apply: impl FnOnce(&mut EndpointReport)) {
        if let Some(mut report) = self.stats.get_mut(endpoint) {
            apply(report.value_mut());
        }
    }

    /// Record the terminal outcome; returns the items written for the endpoint
    fn finish(&self, endpoint: &str, outcome: EndpointOutcome) -> u64 {
        let mut total = 0;
        self.update(endpoint, |r| {
            r.outcome = outcome;
            total = r.items_written;
        });
        total
    }
}
