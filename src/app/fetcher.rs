//! Drives one account's scrape session: navigate, read the rendered batch,
//! scroll, and decide when to stop.
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::engagement::{parse_label_count, parse_metric};
use crate::domain::model::{Account, BrowserConfig, FetchConfig, Interpreted, PostDraft};
use crate::domain::timeparse::{interpret, is_within_window};
use crate::ports::browser::{BrowserError, Element, Page};
use crate::ports::store::{PostStore, StoreError};

pub const POST_SELECTOR: &str = "article";
pub const TEXT_SELECTOR: &str = r#"[data-testid="tweetText"]"#;
pub const PERMALINK_SELECTOR: &str = r#"a[href*="/status/"]"#;
pub const TIME_SELECTOR: &str = "time";
pub const VERIFIED_SELECTOR: &str = r#"[data-testid="icon-verified"]"#;
pub const REPLY_SELECTOR: &str = r#"[data-testid="reply"]"#;
pub const REPOST_SELECTOR: &str = r#"[data-testid="retweet"]"#;
pub const LIKE_SELECTOR: &str = r#"[data-testid="like"]"#;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FetchError {
    /// Store connectivity loss ends the whole run; everything else is worth a retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Store(e) if e.is_connection())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxCount,
    DuplicateRun,
    StaleRun,
    EndOfFeed,
    IdleFeed,
    ScrollCap,
    NoMarkup,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub seen: usize,
    pub collected: usize,
    pub known_duplicates: u32,
    pub stale: u32,
    pub defaulted_timestamps: u32,
    pub scroll_rounds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub drafts: Vec<PostDraft>,
    pub stop: StopReason,
    pub stats: SessionStats,
}

/// Per-account state for one scroll sequence. Dropped when the fetch returns.
#[derive(Debug, Default)]
pub struct FetchSession {
    seen: HashSet<String>,
    drafts: Vec<PostDraft>,
    consecutive_duplicates: u32,
    stale: u32,
    idle_batches: u32,
    stats: SessionStats,
}

impl FetchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `post_id` was already seen in this session.
    pub fn mark_seen(&mut self, post_id: &str) -> bool {
        let fresh = self.seen.insert(post_id.to_string());
        if fresh {
            self.stats.seen += 1;
        }
        fresh
    }

    pub fn record_stale(&mut self) -> u32 {
        self.stale += 1;
        self.stats.stale = self.stale;
        self.stale
    }

    pub fn record_known(&mut self) -> u32 {
        self.consecutive_duplicates += 1;
        self.stats.known_duplicates += 1;
        self.consecutive_duplicates
    }

    pub fn keep(&mut self, draft: PostDraft) -> usize {
        self.consecutive_duplicates = 0;
        self.drafts.push(draft);
        self.stats.collected = self.drafts.len();
        self.drafts.len()
    }

    pub fn collected(&self) -> usize {
        self.drafts.len()
    }

    fn finish(self, stop: StopReason) -> FetchOutcome {
        FetchOutcome {
            drafts: self.drafts,
            stop,
            stats: self.stats,
        }
    }
}

enum BatchVerdict {
    Continue { fresh: usize },
    Stop(StopReason),
}

pub struct AccountFetcher<'a, S: PostStore + ?Sized> {
    store: &'a S,
    fetch: &'a FetchConfig,
    browser: &'a BrowserConfig,
    zone: &'a Tz,
}

impl<'a, S: PostStore + ?Sized> AccountFetcher<'a, S> {
    pub fn new(store: &'a S, fetch: &'a FetchConfig, browser: &'a BrowserConfig, zone: &'a Tz) -> Self {
        Self {
            store,
            fetch,
            browser,
            zone,
        }
    }

    /// Runs one session against `page`. Missing post markup is a clean
    /// zero-post outcome; navigation and page-level failures are errors.
    pub async fn fetch<P: Page>(
        &self,
        page: &P,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<FetchOutcome, FetchError> {
        let url = self.fetch.profile_url(&account.handle);
        debug!(handle = %account.handle, url = %url, "Navigating to profile");
        page.navigate(&url, self.browser.navigation_timeout).await?;

        match page
            .wait_for_selector(POST_SELECTOR, self.browser.selector_timeout)
            .await
        {
            Ok(()) => {}
            Err(BrowserError::Timeout(detail)) => {
                warn!(handle = %account.handle, detail = %detail, "No posts rendered");
                return Ok(FetchSession::new().finish(StopReason::NoMarkup));
            }
            Err(e) => return Err(e.into()),
        }

        let mut session = FetchSession::new();
        let mut last_extent = page.scroll_extent().await?;

        let stop = loop {
            let elements = page.query_all(POST_SELECTOR).await?;
            match self.read_batch(&elements, account, now, &mut session).await? {
                BatchVerdict::Stop(reason) => break reason,
                BatchVerdict::Continue { fresh: 0 } => {
                    session.idle_batches += 1;
                    if session.idle_batches > self.fetch.max_idle_batches {
                        break StopReason::IdleFeed;
                    }
                }
                BatchVerdict::Continue { .. } => session.idle_batches = 0,
            }

            page.scroll_by(self.fetch.scroll_pixels).await?;
            tokio::time::sleep(self.fetch.scroll_pause).await;
            session.stats.scroll_rounds += 1;

            let extent = page.scroll_extent().await?;
            if extent == last_extent {
                break StopReason::EndOfFeed;
            }
            last_extent = extent;

            if session.stats.scroll_rounds >= self.fetch.max_scroll_rounds {
                break StopReason::ScrollCap;
            }
        };

        info!(
            handle = %account.handle,
            category = %account.category,
            stop = ?stop,
            collected = session.collected(),
            seen = session.stats.seen,
            stale = session.stats.stale,
            known = session.stats.known_duplicates,
            defaulted_timestamps = session.stats.defaulted_timestamps,
            scroll_rounds = session.stats.scroll_rounds,
            "Account fetch finished"
        );
        Ok(session.finish(stop))
    }

    async fn read_batch<E: Element>(
        &self,
        elements: &[E],
        account: &Account,
        now: DateTime<Utc>,
        session: &mut FetchSession,
    ) -> Result<BatchVerdict, FetchError> {
        let mut fresh = 0;
        for element in elements {
            let href = match element.attribute(PERMALINK_SELECTOR, "href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    warn!(handle = %account.handle, error = %e, "Skipping post, permalink unreadable");
                    continue;
                }
            };
            let Some(post_id) = post_id_from_href(&href) else {
                continue;
            };
            if !session.mark_seen(&post_id) {
                continue;
            }
            fresh += 1;

            let draft = match self.extract(element, account, &post_id, &href, now, session).await {
                Ok(Some(draft)) => draft,
                Ok(None) => continue,
                Err(e) => {
                    warn!(handle = %account.handle, post_id = %post_id, error = %e, "Skipping post, extraction failed");
                    continue;
                }
            };

            if !is_within_window(draft.created_at, self.fetch.recency_window_minutes, now) {
                if session.record_stale() >= self.fetch.stale_stop_threshold {
                    return Ok(BatchVerdict::Stop(StopReason::StaleRun));
                }
                continue;
            }

            if self.store.exists(&draft.post_id).await? {
                if session.record_known() >= self.fetch.duplicate_stop_threshold {
                    debug!(handle = %account.handle, "Reached already-stored posts");
                    return Ok(BatchVerdict::Stop(StopReason::DuplicateRun));
                }
                continue;
            }

            if session.keep(draft) >= self.fetch.max_posts_per_account {
                return Ok(BatchVerdict::Stop(StopReason::MaxCount));
            }
        }
        Ok(BatchVerdict::Continue { fresh })
    }

    async fn extract<E: Element>(
        &self,
        element: &E,
        account: &Account,
        post_id: &str,
        href: &str,
        now: DateTime<Utc>,
        session: &mut FetchSession,
    ) -> Result<Option<PostDraft>, BrowserError> {
        let Some(text) = element.text(TEXT_SELECTOR).await? else {
            debug!(post_id, "Post without text, skipping");
            return Ok(None);
        };

        let raw_time = match element.attribute(TIME_SELECTOR, "datetime").await? {
            Some(dt) if !dt.trim().is_empty() => dt,
            _ => element.text(TIME_SELECTOR).await?.unwrap_or_default(),
        };
        let created = interpret(&raw_time, now, self.zone);
        if created.defaulted {
            session.stats.defaulted_timestamps += 1;
        }

        let author_verified = element.text(VERIFIED_SELECTOR).await?.is_some();
        let replies = read_metric(element, REPLY_SELECTOR).await?;
        let reposts = read_metric(element, REPOST_SELECTOR).await?;
        let likes = read_metric(element, LIKE_SELECTOR).await?;

        Ok(Some(PostDraft {
            post_id: post_id.to_string(),
            author_handle: account.handle.clone(),
            author_verified,
            category: account.category,
            text: text.trim().to_string(),
            created_at: created.value,
            likes,
            reposts,
            replies,
            permalink: absolute_permalink(&self.fetch.profile_url(&account.handle), href),
        }))
    }
}

/// Accessibility label first ("1,234 Likes. Like"), rendered text otherwise.
async fn read_metric<E: Element>(element: &E, selector: &str) -> Result<u64, BrowserError> {
    let parsed: Interpreted<u64> = match element.attribute(selector, "aria-label").await? {
        Some(label) if !label.trim().is_empty() => parse_label_count(&label),
        _ => match element.text(selector).await? {
            Some(text) => parse_metric(&text),
            None => Interpreted::exact(0),
        },
    };
    if parsed.defaulted {
        warn!(selector, "Unreadable engagement count, defaulting to 0");
    }
    Ok(parsed.value)
}

/// The path segment after `/status/`, cut at `?`, `/` or `#`.
pub fn post_id_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("/status/")?;
    let id = rest.split(['?', '/', '#']).next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

/// Resolves a page-relative href against the origin of `profile_url`.
pub fn absolute_permalink(profile_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let origin = match profile_url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or_default();
            format!("{scheme}://{host}")
        }
        None => String::new(),
    };
    if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}
