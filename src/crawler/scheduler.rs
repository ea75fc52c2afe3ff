//! Bounded fetch scheduler
//!
//! This module handles:
//! - A queue of entries still to be resolved and fetched for one year
//! - At most `limit` of them in flight at once
//! - Handing finished results back to the single writer (the coordinator)
//!
//! Workers never touch the crawl state. They only report what they found.

use crate::client::{CategoryMember, ClientError, ContentSource, Metric, MetricsSource, Resolution};
use crate::crawler::retry::{with_retries, RetryPolicy};
use crate::state::MetricRange;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// One entry waiting to be resolved and fetched
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub year: i32,
    /// 1-based position within the year's category, for progress lines
    pub position: usize,
    pub total: usize,
    pub member: CategoryMember,
}

/// What a worker learned about one entry
#[derive(Debug)]
pub enum EntryOutcome {
    /// Slug resolved and the metrics API gave a definitive answer
    Fetched { slug: String, metric: Metric },

    /// No canonical identifier exists for the member
    Unresolvable,

    /// Slug resolved, metric fetch kept failing
    MetricFailed { slug: String, error: ClientError },

    /// Resolution itself kept failing
    ResolveFailed { error: ClientError },
}

#[derive(Debug)]
pub struct JobResult {
    pub job: FetchJob,
    pub outcome: EntryOutcome,
}

/// Resolves and fetches a single entry with retries
#[derive(Clone)]
pub struct FetchWorker {
    source: Arc<dyn ContentSource>,
    metrics: Arc<dyn MetricsSource>,
    retry: RetryPolicy,
    range: MetricRange,
}

impl FetchWorker {
    pub fn new(
        source: Arc<dyn ContentSource>,
        metrics: Arc<dyn MetricsSource>,
        retry: RetryPolicy,
        range: MetricRange,
    ) -> Self {
        Self {
            source,
            metrics,
            retry,
            range,
        }
    }

    pub async fn run(&self, job: FetchJob) -> JobResult {
        let outcome = self.resolve_and_fetch(&job.member).await;
        JobResult { job, outcome }
    }

    async fn resolve_and_fetch(&self, member: &CategoryMember) -> EntryOutcome {
        tracing::debug!("processing {}", member.title);

        let label = format!("resolving {}", member.title);
        let resolution = with_retries(&self.retry, &label, || {
            self.source.resolve_canonical_id(member)
        })
        .await;

        let slug = match resolution {
            Ok(Resolution::Resolved(slug)) => slug,
            Ok(Resolution::Unresolvable) => return EntryOutcome::Unresolvable,
            Err(error) => return EntryOutcome::ResolveFailed { error },
        };

        let label = format!("pageviews for {}", slug);
        let metric = with_retries(&self.retry, &label, || {
            self.metrics.fetch_metric(&slug, &self.range)
        })
        .await;

        match metric {
            Ok(metric) => EntryOutcome::Fetched { slug, metric },
            Err(error) => EntryOutcome::MetricFailed { slug, error },
        }
    }
}

/// Queue plus bounded set of in-flight workers
pub struct FetchScheduler {
    worker: FetchWorker,
    pending: VecDeque<FetchJob>,
    in_flight: JoinSet<JobResult>,
    limit: usize,
}

impl FetchScheduler {
    pub fn new(worker: FetchWorker, limit: usize) -> Self {
        Self {
            worker,
            pending: VecDeque::new(),
            in_flight: JoinSet::new(),
            limit: limit.max(1),
        }
    }

    pub fn enqueue(&mut self, job: FetchJob) {
        self.pending.push_back(job);
    }

    /// Starts queued jobs, in queue order, until the limit is reached
    pub fn fill(&mut self) {
        while self.in_flight.len() < self.limit {
            let Some(job) = self.pending.pop_front() else {
                break;
            };
            let worker = self.worker.clone();
            self.in_flight.spawn(async move { worker.run(job).await });
        }
    }

    /// Waits for the next finished job, `None` once nothing is in flight
    pub async fn next_result(&mut self) -> Option<Result<JobResult, JoinError>> {
        self.in_flight.join_next().await
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Abandons every queued and in-flight job, returning how many
    pub fn abort_all(&mut self) -> usize {
        let abandoned = self.pending.len() + self.in_flight.len();
        self.pending.clear();
        self.in_flight.abort_all();
        abandoned
    }
}
