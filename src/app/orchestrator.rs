//! Walks the roster account by account, then gates, scores and stores the
//! aggregated batch in one call.
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::app::context::AppContext;
use crate::app::fetcher::{AccountFetcher, FetchError, FetchOutcome};
use crate::app::retry::{with_retry, FailureTracker, RetryOutcome, RetryPolicy};
use crate::domain::model::{Account, PostDraft, ScoredPost};
use crate::infra::time::format_epoch_ms;
use crate::ports::{
    browser::{Browser, Page},
    clock::Clock,
    random::RandomSource,
    store::{PostStore, StoreError},
};

pub const TOP_STORIES_LIMIT: i64 = 15;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("run aborted: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Drafts returned by the fetchers.
    pub fetched: usize,
    /// Drafts that passed the batch-level quality gate.
    pub accepted: usize,
    pub stored: usize,
    /// Accepted posts the store skipped or failed to write.
    pub skipped: usize,
    pub failed_accounts: Vec<String>,
    pub escalated_accounts: Vec<String>,
}

pub struct Orchestrator<S, B, C, G>
where
    S: PostStore + ?Sized,
    B: Browser,
    C: Clock,
    G: RandomSource,
{
    ctx: AppContext<S, B, C, G>,
    tracker: FailureTracker,
}

impl<S, B, C, G> Orchestrator<S, B, C, G>
where
    S: PostStore + ?Sized,
    B: Browser,
    C: Clock,
    G: RandomSource,
{
    pub fn new(ctx: AppContext<S, B, C, G>) -> Self {
        let tracker = FailureTracker::new(ctx.cfg.retry.alert_threshold);
        Self { ctx, tracker }
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    /// One pass over the roster. Only store connectivity loss aborts the run.
    pub async fn run_once(&mut self) -> Result<RunReport, RunError> {
        let cfg = &self.ctx.cfg;
        let policy = RetryPolicy::from_config(&cfg.retry);
        let run_started = self.ctx.clock.now_epoch_ms().await;
        info!(
            started = %format_epoch_ms(run_started, &cfg.timezone),
            accounts = cfg.roster.len(),
            profile = ?cfg.profile,
            "Ingestion run start"
        );

        let mut report = RunReport::default();
        let mut drafts: Vec<PostDraft> = Vec::new();

        for (i, account) in cfg.roster.accounts().enumerate() {
            if i > 0 {
                tokio::time::sleep(cfg.retry.account_spacing).await;
            }

            let ctx = &self.ctx;
            let account_ref = &account;
            let outcome = with_retry(&policy, &account.handle, move |attempt| {
                fetch_attempt(ctx, account_ref, attempt)
            })
            .await?;

            match outcome {
                RetryOutcome::Succeeded { value, attempts } => {
                    self.tracker.record_success(&account.handle);
                    info!(
                        handle = %account.handle,
                        attempts,
                        drafts = value.drafts.len(),
                        stop = ?value.stop,
                        "Account done"
                    );
                    drafts.extend(value.drafts);
                }
                RetryOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    error!(
                        handle = %account.handle,
                        category = %account.category,
                        attempts,
                        error = %last_error,
                        "Account failed for this run"
                    );
                    report.failed_accounts.push(account.handle.clone());
                    if self.tracker.record_failure(&account.handle) {
                        report.escalated_accounts.push(account.handle.clone());
                    }
                }
            }
        }

        report.fetched = drafts.len();
        let batch: Vec<ScoredPost> = drafts
            .into_iter()
            .filter(|d| cfg.quality.accept(d))
            .map(|draft| {
                let relevance_score = cfg.scoring.score(&draft.text);
                ScoredPost {
                    draft,
                    relevance_score,
                }
            })
            .collect();
        report.accepted = batch.len();

        if !batch.is_empty() {
            let now = self.ctx.clock.now().await;
            let upsert = self.ctx.store.upsert_batch(&batch, now).await?;
            report.stored = upsert.stored;
            report.skipped = upsert.skipped + upsert.failed;
        }

        info!(
            fetched = report.fetched,
            accepted = report.accepted,
            stored = report.stored,
            skipped = report.skipped,
            failed_accounts = report.failed_accounts.len(),
            escalated = report.escalated_accounts.len(),
            "Ingestion run complete"
        );
        self.log_top_stories().await;
        Ok(report)
    }

    /// Repeats `run_once` every `interval`, keeping one failure tracker so
    /// escalation accumulates across runs.
    pub async fn run_forever(&mut self, interval: Duration) -> Result<(), RunError> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Fatal store error, stopping");
                return Err(e);
            }
        }
    }

    async fn log_top_stories(&self) {
        match self.ctx.store.top_by_engagement(TOP_STORIES_LIMIT, None).await {
            Ok(top) => {
                for (rank, post) in top.iter().enumerate() {
                    info!(
                        rank = rank + 1,
                        handle = %post.author_handle,
                        category = %post.category,
                        engagement = post.total_engagement(),
                        relevance = post.relevance_score,
                        permalink = %post.permalink,
                        "Top story"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Could not load top stories"),
        }
    }
}

/// One attempt: fresh page with a random identity, always closed afterwards.
async fn fetch_attempt<S, B, C, G>(
    ctx: &AppContext<S, B, C, G>,
    account: &Account,
    attempt: u32,
) -> Result<FetchOutcome, FetchError>
where
    S: PostStore + ?Sized,
    B: Browser,
    C: Clock,
    G: RandomSource,
{
    let agents = &ctx.cfg.browser.user_agents;
    let pick = ctx.rng.pick_index(agents.len()).await;
    let user_agent = agents.get(pick).map(String::as_str).unwrap_or_default();
    info!(handle = %account.handle, attempt = attempt + 1, "Fetching account");

    let page = ctx.browser.open_page(user_agent).await?;
    let fetcher = AccountFetcher::new(
        ctx.store.as_ref(),
        &ctx.cfg.fetch,
        &ctx.cfg.browser,
        &ctx.cfg.timezone,
    );
    let now = ctx.clock.now().await;
    let result = fetcher.fetch(&page, account, now).await;
    if let Err(e) = page.close().await {
        warn!(handle = %account.handle, error = %e, "Page close failed");
    }
    result
}
