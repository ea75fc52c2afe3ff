//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Loading (or ignoring) the checkpoint for this run
//! - Fetching the root category once per run
//! - Walking every yearly category in range and deciding per entry
//! - Applying worker results and checkpointing every N entries
//! - Handling interrupts and the final checkpoint

use crate::client::{
    build_http_client, ContentSource, MediaWikiClient, Metric, MetricsSource, PageviewsClient,
};
use crate::config::{Config, ExhaustedPolicy};
use crate::crawler::policy::{EntryDecision, ExclusionPolicy};
use crate::crawler::retry::{with_retries, RetryPolicy};
use crate::crawler::scheduler::{EntryOutcome, FetchJob, FetchScheduler, FetchWorker, JobResult};
use crate::crawler::shutdown::{is_shutdown_requested, wait_for_shutdown};
use crate::state::{CrawlPhase, CrawlState, EntryResult, RunId, RunParams};
use crate::storage::{CheckpointError, CheckpointStore, SqliteCheckpointStore};
use crate::ObitError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::Instrument;

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every year in range was processed and the final checkpoint written
    #[default]
    Completed,

    /// A shutdown signal stopped the run early
    Interrupted,
}

/// Counters describing what one invocation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub outcome: CrawlOutcome,
    pub years_processed: usize,
    /// Entries recorded by this invocation
    pub recorded: usize,
    /// Recorded entries whose value fell back to zero
    pub zeroed: usize,
    pub skipped_existing: usize,
    pub excluded: usize,
    pub unresolvable: usize,
    /// Entries left unrecorded after retries ran out
    pub failed: usize,
    pub checkpoints_written: usize,
    pub checkpoint_failures: usize,
}

/// Main crawler coordinator structure
///
/// The coordinator is the only writer of [`CrawlState`]. Workers report
/// results back and the coordinator records them and takes checkpoints.
pub struct Coordinator {
    config: Arc<Config>,
    params: RunParams,
    run_id: RunId,
    source: Arc<dyn ContentSource>,
    metrics: Arc<dyn MetricsSource>,
    store: Arc<dyn CheckpointStore>,
    policy: ExclusionPolicy,
    retry: RetryPolicy,
    fresh: bool,
    state: CrawlState,
    phase: CrawlPhase,
    report: CrawlReport,
}

impl Coordinator {
    /// Creates a coordinator over explicit collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawler configuration
    /// * `source` - Category listing and canonical-id resolution
    /// * `metrics` - Per-entry metric lookup
    /// * `store` - Checkpoint persistence
    pub fn new(
        config: Config,
        source: Arc<dyn ContentSource>,
        metrics: Arc<dyn MetricsSource>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, ObitError> {
        let params = config.run_params()?;
        let run_id = params.run_id();
        let policy = ExclusionPolicy::new(config.crawler.excluded_prefixes.clone());
        let retry = RetryPolicy::from_config(&config.crawler);

        Ok(Self {
            config: Arc::new(config),
            params,
            run_id,
            source,
            metrics,
            store,
            policy,
            retry,
            fresh: false,
            state: CrawlState::new(),
            phase: CrawlPhase::Init,
            report: CrawlReport::default(),
        })
    }

    /// Creates a coordinator talking to the configured wiki and metrics API
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fresh` - Ignore any existing checkpoint for this run
    pub fn from_config(config: Config, fresh: bool) -> Result<Self, ObitError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        let source = MediaWikiClient::new(client.clone(), &config.source);
        let metrics = PageviewsClient::new(client, &config.source);
        let store = SqliteCheckpointStore::new(&config.output.checkpoint_dir);

        let coordinator = Self::new(config, Arc::new(source), Arc::new(metrics), Arc::new(store))?;
        Ok(coordinator.with_fresh(fresh))
    }

    /// Skips loading the checkpoint; the next save overwrites it
    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn report(&self) -> &CrawlReport {
        &self.report
    }

    /// Runs the crawl until every year is done, a shutdown is requested, or
    /// a fatal error occurs
    ///
    /// On interrupt the final checkpoint is bounded by the shutdown grace
    /// period. A corrupt checkpoint aborts without writing anything.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<CrawlReport, ObitError> {
        let span = tracing::info_span!("crawl", run_id = %self.run_id);
        self.run_inner(&mut shutdown).instrument(span).await
    }

    async fn run_inner(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CrawlReport, ObitError> {
        let start_time = Instant::now();
        tracing::info!(
            "Starting crawl of {}..={} (pageviews {} to {})",
            self.params.start_year,
            self.params.stop_year,
            self.params.metric_range.start_compact(),
            self.params.metric_range.end_compact()
        );

        self.transition(CrawlPhase::LoadCheckpoint);
        if let Err(e) = self.load_checkpoint() {
            tracing::error!("Cannot resume from checkpoint: {}", e);
            self.transition(CrawlPhase::Aborted);
            return Err(e);
        }

        match self.crawl_years(shutdown).await {
            Ok(CrawlOutcome::Completed) => {
                self.transition(CrawlPhase::Finalize);
                if let Err(e) = self.checkpoint().await {
                    tracing::error!("Final checkpoint failed: {}", e);
                    self.transition(CrawlPhase::Aborted);
                    return Err(e.into());
                }
                self.transition(CrawlPhase::Completed);
                self.report.outcome = CrawlOutcome::Completed;
                tracing::info!(
                    "Crawl completed: {} entries recorded ({} total) in {:?}",
                    self.report.recorded,
                    self.state.entry_count(),
                    start_time.elapsed()
                );
            }
            Ok(CrawlOutcome::Interrupted) => {
                self.final_checkpoint_within_grace().await;
                self.transition(CrawlPhase::Interrupted);
                self.report.outcome = CrawlOutcome::Interrupted;
                tracing::info!(
                    "Crawl interrupted after {:?}, {} entries recorded",
                    start_time.elapsed(),
                    self.report.recorded
                );
            }
            Err(e) => {
                tracing::error!("Crawl aborted: {}", e);
                self.final_checkpoint_within_grace().await;
                self.transition(CrawlPhase::Aborted);
                return Err(e);
            }
        }

        Ok(self.report.clone())
    }

    fn transition(&mut self, next: CrawlPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!("Unexpected phase transition {} -> {}", self.phase, next);
        }
        tracing::debug!("Phase {} -> {}", self.phase, next);
        self.phase = next;
    }

    fn load_checkpoint(&mut self) -> Result<(), ObitError> {
        let path = self.store.path_for(&self.run_id);
        if self.fresh {
            tracing::info!(
                "Starting fresh, ignoring any checkpoint at {}",
                path.display()
            );
            self.state = CrawlState::new();
            return Ok(());
        }

        match self.store.load(&self.run_id)? {
            Some(state) => {
                tracing::info!(
                    "Resuming with {} entries across {} years",
                    state.entry_count(),
                    state.years().count()
                );
                self.state = state;
            }
            None => {
                tracing::info!("No checkpoint at {}, starting empty", path.display());
                self.state = CrawlState::new();
            }
        }
        Ok(())
    }

    async fn crawl_years(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CrawlOutcome, ObitError> {
        self.transition(CrawlPhase::EnsureRootCategory);
        self.ensure_root_category().await?;

        for year in self.params.years() {
            if is_shutdown_requested(shutdown) {
                return Ok(CrawlOutcome::Interrupted);
            }
            self.transition(CrawlPhase::Crawling { year });
            if self.process_year(year, shutdown).await? == CrawlOutcome::Interrupted {
                return Ok(CrawlOutcome::Interrupted);
            }
            self.report.years_processed += 1;
        }

        Ok(CrawlOutcome::Completed)
    }

    /// Fetches the root category unless the checkpoint already holds it
    async fn ensure_root_category(&mut self) -> Result<(), ObitError> {
        if let Some(root) = &self.state.root_category {
            tracing::debug!(
                "Reusing root category {} ({} members)",
                root.title,
                root.members.len()
            );
            return Ok(());
        }

        let title = self.config.crawler.root_category.clone();
        tracing::info!("Fetching root category {}", title);
        let source = Arc::clone(&self.source);
        let label = format!("fetching {}", title);
        let root = with_retries(&self.retry, &label, || source.fetch_category(&title))
            .await?
            .ok_or_else(|| ObitError::RootCategoryNotFound {
                title: title.clone(),
            })?;

        tracing::info!("Root category {} has {} members", title, root.members.len());
        self.state.root_category = Some(root);

        if let Err(e) = self.checkpoint().await {
            tracing::warn!("Checkpoint after root category failed: {}", e);
        }
        Ok(())
    }

    async fn process_year(
        &mut self,
        year: i32,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<CrawlOutcome, ObitError> {
        let title = self.config.crawler.year_category(year);
        let listed = self
            .state
            .root_category
            .as_ref()
            .map(|root| root.contains_subcategory(&title))
            .unwrap_or(false);
        if !listed {
            return Err(ObitError::YearNotFound { year, title });
        }

        let source = Arc::clone(&self.source);
        let label = format!("fetching {}", title);
        let category = with_retries(&self.retry, &label, || source.fetch_category(&title))
            .await?
            .ok_or_else(|| ObitError::YearNotFound {
                year,
                title: title.clone(),
            })?;

        let total = category.members.len();
        tracing::info!("Processing {} ({} members)", title, total);

        let worker = FetchWorker::new(
            Arc::clone(&self.source),
            Arc::clone(&self.metrics),
            self.retry,
            self.params.metric_range,
        );
        let mut scheduler = FetchScheduler::new(worker, self.config.crawler.max_concurrent_fetches);

        for (index, member) in category.members.into_iter().enumerate() {
            match self.policy.decide(&self.state, year, &member.title) {
                EntryDecision::AlreadyDone => {
                    tracing::debug!("Skipping existing {}", member.title);
                    self.report.skipped_existing += 1;
                }
                EntryDecision::Excluded { prefix } => {
                    tracing::info!("Skipping excluded {} (prefix {:?})", member.title, prefix);
                    self.report.excluded += 1;
                }
                EntryDecision::Fetch => scheduler.enqueue(FetchJob {
                    year,
                    position: index + 1,
                    total,
                    member,
                }),
            }
        }

        loop {
            scheduler.fill();
            tokio::select! {
                biased;

                _ = wait_for_shutdown(shutdown) => {
                    let abandoned = scheduler.abort_all();
                    tracing::info!(
                        "Shutdown requested during {}, abandoning {} pending entries",
                        year,
                        abandoned
                    );
                    return Ok(CrawlOutcome::Interrupted);
                }

                joined = scheduler.next_result() => match joined {
                    Some(Ok(result)) => self.apply(result).await?,
                    Some(Err(e)) => {
                        scheduler.abort_all();
                        return Err(ObitError::Worker(e.to_string()));
                    }
                    None => break,
                },
            }
        }

        Ok(CrawlOutcome::Completed)
    }

    /// Applies one worker result to the crawl state
    async fn apply(&mut self, result: JobResult) -> Result<(), ObitError> {
        let JobResult { job, outcome } = result;
        let name = job.member.title.as_str();

        match outcome {
            EntryOutcome::Fetched { slug, metric } => {
                if let Metric::NotFound { status } = metric {
                    tracing::warn!(
                        "Metrics API answered {} for {}, assuming 0 page views",
                        status,
                        name
                    );
                    self.report.zeroed += 1;
                }
                self.record(&job, slug, metric.value()).await;
            }
            EntryOutcome::Unresolvable => {
                tracing::error!("Assuming {} page was deleted recently - skipping", name);
                self.report.unresolvable += 1;
            }
            EntryOutcome::MetricFailed { slug, error } => {
                match self.config.crawler.on_retries_exhausted {
                    ExhaustedPolicy::Abort => {
                        return Err(ObitError::RetriesExhausted {
                            entry: name.to_string(),
                            year: job.year,
                            source: error,
                        });
                    }
                    ExhaustedPolicy::Zero => {
                        tracing::warn!(
                            "Giving up on page views for {}: {} - recording 0",
                            name,
                            error
                        );
                        self.report.zeroed += 1;
                        self.record(&job, slug, 0).await;
                    }
                    ExhaustedPolicy::Skip => {
                        tracing::error!("Giving up on page views for {}: {} - skipping", name, error);
                        self.report.failed += 1;
                    }
                }
            }
            EntryOutcome::ResolveFailed { error } => {
                if self.config.crawler.on_retries_exhausted == ExhaustedPolicy::Abort {
                    return Err(ObitError::RetriesExhausted {
                        entry: name.to_string(),
                        year: job.year,
                        source: error,
                    });
                }
                // Without a slug there is nothing to record, even under `zero`
                tracing::error!("Giving up on resolving {}: {} - skipping", name, error);
                self.report.failed += 1;
            }
        }

        Ok(())
    }

    async fn record(&mut self, job: &FetchJob, slug: String, views: u64) {
        let name = job.member.title.as_str();
        if !self.state.record(job.year, name, EntryResult { slug, views }) {
            tracing::debug!("{} already recorded for {}, keeping first value", name, job.year);
            return;
        }

        tracing::info!(
            "{} {}/{}: {} page views = {}",
            job.year,
            job.position,
            job.total,
            name,
            views
        );
        self.report.recorded += 1;

        if self.report.recorded % self.config.crawler.checkpoint_interval == 0 {
            if let Err(e) = self.checkpoint().await {
                tracing::warn!("Periodic checkpoint failed, continuing: {}", e);
            }
        }
    }

    /// Saves a snapshot of the current state
    async fn checkpoint(&mut self) -> Result<(), CheckpointError> {
        let snapshot = self.state.clone();
        let store = Arc::clone(&self.store);
        let run_id = self.run_id.clone();

        let result = tokio::task::spawn_blocking(move || store.save(&run_id, &snapshot))
            .await
            .unwrap_or_else(|e| {
                Err(CheckpointError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e,
                )))
            });

        match &result {
            Ok(()) => self.report.checkpoints_written += 1,
            Err(_) => self.report.checkpoint_failures += 1,
        }
        result
    }

    async fn final_checkpoint_within_grace(&mut self) {
        let grace = Duration::from_secs(self.config.crawler.shutdown_grace_secs);
        match tokio::time::timeout(grace, self.checkpoint()).await {
            Ok(Ok(())) => tracing::info!("Final checkpoint written"),
            Ok(Err(e)) => tracing::error!("Final checkpoint failed: {}", e),
            Err(_) => {
                self.report.checkpoint_failures += 1;
                tracing::error!("Final checkpoint did not finish within {:?}", grace);
            }
        }
    }
}

/// Runs the main crawl operation against the configured services
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `fresh` - Ignore any existing checkpoint for this run
/// * `shutdown` - Flips to `true` when the operator asks to stop
///
/// # Example
///
/// ```no_run
/// use obit_crawl::config::load_config;
/// use obit_crawl::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let (_tx, rx) = tokio::sync::watch::channel(false);
/// let report = run_crawl(config, false, rx).await?;
/// println!("{} entries recorded", report.recorded);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    fresh: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<CrawlReport, ObitError> {
    let mut coordinator = Coordinator::from_config(config, fresh)?;
    coordinator.run(shutdown).await
}
