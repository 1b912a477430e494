#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use postharvest::app::fetcher::{
    LIKE_SELECTOR, PERMALINK_SELECTOR, POST_SELECTOR, REPLY_SELECTOR, REPOST_SELECTOR,
    TEXT_SELECTOR, TIME_SELECTOR, VERIFIED_SELECTOR,
};
use postharvest::domain::model::{
    AppConfig, Category, PostDraft, Roster, RosterGroup, ScoredPost, StoredPost,
};
use postharvest::ports::browser::{Browser, BrowserError, Element, Page};
use postharvest::ports::clock::Clock;
use postharvest::ports::random::RandomSource;
use postharvest::ports::store::{PostFilter, PostStats, PostStore, StoreError, UpsertReport};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn draft(post_id: &str, text: &str, likes: u64) -> PostDraft {
    PostDraft {
        post_id: post_id.to_string(),
        author_handle: "channelstv".to_string(),
        author_verified: false,
        category: Category::NewsOutlets,
        text: text.to_string(),
        created_at: fixed_now() - chrono::Duration::minutes(5),
        likes,
        reposts: 0,
        replies: 0,
        permalink: format!("https://x.com/channelstv/status/{post_id}"),
    }
}

pub fn scored(draft: PostDraft) -> ScoredPost {
    ScoredPost {
        draft,
        relevance_score: 1,
    }
}

/// Test config: roster as given, no pauses between scrolls, accounts or retries.
pub fn test_config(groups: Vec<(Category, Vec<&str>)>) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.roster = Roster::new(
        groups
            .into_iter()
            .map(|(category, handles)| RosterGroup {
                category,
                handles: handles.into_iter().map(str::to_string).collect(),
            })
            .collect(),
    );
    cfg.fetch.scroll_pause = Duration::ZERO;
    cfg.retry.account_spacing = Duration::ZERO;
    cfg.retry.base_delay = Duration::ZERO;
    cfg.browser.navigation_timeout = Duration::from_secs(1);
    cfg.browser.selector_timeout = Duration::from_secs(1);
    cfg.browser.user_agents = vec!["ua-one".to_string(), "ua-two".to_string()];
    cfg
}

pub struct FixedClock {
    ms: AtomicI64,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            ms: AtomicI64::new(now.timestamp_millis()),
        }
    }
}

#[async_trait::async_trait]
impl Clock for FixedClock {
    async fn now_epoch_ms(&self) -> i64 {
        self.ms.load(Ordering::SeqCst)
    }
}

pub struct FixedRng(pub f64);

#[async_trait::async_trait]
impl RandomSource for FixedRng {
    async fn next_f64(&self) -> f64 {
        self.0
    }
}

/// One rendered post on a fake profile page.
#[derive(Debug, Clone)]
pub struct FakePost {
    pub id: String,
    pub text: Option<String>,
    pub datetime: Option<String>,
    pub time_text: Option<String>,
    pub likes: String,
    pub reposts: String,
    pub replies: String,
    pub verified: bool,
}

impl FakePost {
    /// A post created `minutes_ago` before `fixed_now()` with plenty of engagement.
    pub fn recent(id: &str, minutes_ago: i64) -> Self {
        let at = fixed_now() - chrono::Duration::minutes(minutes_ago);
        Self {
            id: id.to_string(),
            text: Some(format!(
                "Breaking news from the government on the economy, post number {id} with details"
            )),
            datetime: Some(at.to_rfc3339()),
            time_text: None,
            likes: "1.2K Likes. Like".to_string(),
            reposts: "40 reposts. Repost".to_string(),
            replies: "7 Replies. Reply".to_string(),
            verified: true,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_likes(mut self, label: &str) -> Self {
        self.likes = label.to_string();
        self.reposts = "0".to_string();
        self.replies = "0".to_string();
        self
    }
}

/// Scripted feed: `frames[i]` is what `query_all` returns after `i` scrolls.
/// The scroll extent grows with each frame and stays put after the last one.
#[derive(Debug, Clone, Default)]
pub struct FakeFeed {
    pub frames: Vec<Vec<FakePost>>,
}

impl FakeFeed {
    pub fn single(posts: Vec<FakePost>) -> Self {
        Self {
            frames: vec![posts],
        }
    }

    /// Each frame shows everything rendered so far, like an infinite scroll.
    pub fn growing(chunks: Vec<Vec<FakePost>>) -> Self {
        let mut frames = Vec::new();
        let mut acc = Vec::new();
        for chunk in chunks {
            acc.extend(chunk);
            frames.push(acc.clone());
        }
        Self { frames }
    }
}

#[derive(Default)]
pub struct BrowserLog {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub navigations: AtomicUsize,
    pub user_agents: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    feeds: Arc<HashMap<String, FakeFeed>>,
    pub log: Arc<BrowserLog>,
}

impl FakeBrowser {
    /// Handles missing from `feeds` fail navigation with a timeout.
    pub fn new(feeds: Vec<(&str, FakeFeed)>) -> Self {
        Self {
            feeds: Arc::new(
                feeds
                    .into_iter()
                    .map(|(h, f)| (h.to_string(), f))
                    .collect(),
            ),
            log: Arc::new(BrowserLog::default()),
        }
    }

    pub fn page(&self) -> FakePage {
        FakePage {
            feeds: Arc::clone(&self.feeds),
            log: Arc::clone(&self.log),
            state: Mutex::new(PageState::default()),
        }
    }
}

#[async_trait::async_trait]
impl Browser for FakeBrowser {
    type Page = FakePage;

    async fn open_page(&self, user_agent: &str) -> Result<FakePage, BrowserError> {
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        self.log
            .user_agents
            .lock()
            .unwrap()
            .push(user_agent.to_string());
        Ok(self.page())
    }
}

#[derive(Default)]
struct PageState {
    feed: Option<FakeFeed>,
    round: usize,
}

pub struct FakePage {
    feeds: Arc<HashMap<String, FakeFeed>>,
    log: Arc<BrowserLog>,
    state: Mutex<PageState>,
}

impl FakePage {
    fn frame_index(state: &PageState) -> usize {
        let frames = state.feed.as_ref().map(|f| f.frames.len()).unwrap_or(0);
        state.round.min(frames.saturating_sub(1))
    }

    fn current(&self) -> Vec<FakePost> {
        let state = self.state.lock().unwrap();
        let idx = Self::frame_index(&state);
        state
            .feed
            .as_ref()
            .and_then(|f| f.frames.get(idx).cloned())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Page for FakePage {
    type Element = FakeElement;

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.log.navigations.fetch_add(1, Ordering::SeqCst);
        let handle = url.rsplit('/').next().unwrap_or_default();
        match self.feeds.get(handle) {
            Some(feed) => {
                let mut state = self.state.lock().unwrap();
                state.feed = Some(feed.clone());
                state.round = 0;
                Ok(())
            }
            None => Err(BrowserError::Timeout(format!("navigation to {url}"))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        assert_eq!(selector, POST_SELECTOR);
        if self.current().is_empty() {
            return Err(BrowserError::Timeout(format!("{selector} after {timeout:?}")));
        }
        Ok(())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<FakeElement>, BrowserError> {
        assert_eq!(selector, POST_SELECTOR);
        Ok(self
            .current()
            .into_iter()
            .map(|post| FakeElement { post })
            .collect())
    }

    async fn scroll_by(&self, _pixels: i64) -> Result<(), BrowserError> {
        self.state.lock().unwrap().round += 1;
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<i64, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(1000 * (Self::frame_index(&state) as i64 + 1))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeElement {
    post: FakePost,
}

#[async_trait::async_trait]
impl Element for FakeElement {
    async fn text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        Ok(match selector {
            TEXT_SELECTOR => self.post.text.clone(),
            TIME_SELECTOR => self.post.time_text.clone(),
            VERIFIED_SELECTOR => self.post.verified.then(String::new),
            _ => None,
        })
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(match (selector, name) {
            (PERMALINK_SELECTOR, "href") => Some(format!("/someone/status/{}", self.post.id)),
            (TIME_SELECTOR, "datetime") => self.post.datetime.clone(),
            (LIKE_SELECTOR, "aria-label") => Some(self.post.likes.clone()),
            (REPOST_SELECTOR, "aria-label") => Some(self.post.reposts.clone()),
            (REPLY_SELECTOR, "aria-label") => Some(self.post.replies.clone()),
            _ => None,
        })
    }
}

/// In-memory `PostStore` keyed by post id.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, StoredPost>>,
    pub exists_calls: AtomicUsize,
    pub offline: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn with_known(ids: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows.lock().unwrap();
            for id in ids {
                rows.insert(id.to_string(), stored_stub(id));
            }
        }
        store
    }

    pub fn ids(&self) -> Vec<String> {
        self.rows.lock().unwrap().keys().cloned().collect()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("store offline".into()));
        }
        Ok(())
    }

    fn sorted(&self, mut key: impl FnMut(&StoredPost) -> i64, limit: i64) -> Vec<StoredPost> {
        let mut rows: Vec<StoredPost> = self.rows.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
        rows.truncate(limit.max(0) as usize);
        rows
    }
}

fn stored_stub(id: &str) -> StoredPost {
    StoredPost {
        id: 0,
        post_id: id.to_string(),
        author_handle: "someone".to_string(),
        author_verified: false,
        category: "news_outlets".to_string(),
        text: "known".to_string(),
        created_at_ms: 0,
        created_at_text: String::new(),
        likes: 0,
        reposts: 0,
        replies: 0,
        permalink: String::new(),
        is_repost: false,
        relevance_score: 0,
        ingested_at_ms: 0,
        ingested_at_text: String::new(),
        processed: false,
    }
}

#[async_trait::async_trait]
impl PostStore for MemoryStore {
    async fn migrate(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn exists(&self, post_id: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().unwrap().contains_key(post_id))
    }

    async fn upsert_batch(
        &self,
        posts: &[ScoredPost],
        ingested_at: DateTime<Utc>,
    ) -> Result<UpsertReport, StoreError> {
        self.check_online()?;
        let mut report = UpsertReport::default();
        let mut rows = self.rows.lock().unwrap();
        for post in posts {
            let d = &post.draft;
            if d.post_id.is_empty() {
                report.skipped += 1;
                continue;
            }
            let row = rows.entry(d.post_id.clone()).or_insert_with(|| StoredPost {
                post_id: d.post_id.clone(),
                author_handle: d.author_handle.clone(),
                author_verified: d.author_verified,
                category: d.category.to_string(),
                text: d.text.clone(),
                created_at_ms: d.created_at.timestamp_millis(),
                permalink: d.permalink.clone(),
                is_repost: d.is_repost(),
                relevance_score: i64::from(post.relevance_score),
                ..stored_stub(&d.post_id)
            });
            row.likes = d.likes as i64;
            row.reposts = d.reposts as i64;
            row.replies = d.replies as i64;
            row.ingested_at_ms = ingested_at.timestamp_millis();
            report.stored += 1;
        }
        Ok(report)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.check_online()?;
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn top_by_engagement(
        &self,
        limit: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredPost>, StoreError> {
        self.check_online()?;
        let floor = since.map_or(i64::MIN, |t| t.timestamp_millis());
        let mut rows = self.sorted(|r| r.total_engagement(), i64::MAX);
        rows.retain(|r| r.created_at_ms >= floor);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<StoredPost>, StoreError> {
        self.check_online()?;
        Ok(self.sorted(|r| r.created_at_ms, limit))
    }

    async fn by_category(&self, category: &str, limit: i64) -> Result<Vec<StoredPost>, StoreError> {
        self.check_online()?;
        let mut rows = self.sorted(|r| r.created_at_ms, i64::MAX);
        rows.retain(|r| r.category == category);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn list(&self, filter: &PostFilter, _now: DateTime<Utc>) -> Result<Vec<StoredPost>, StoreError> {
        self.check_online()?;
        let mut rows = self.sorted(|r| r.created_at_ms, i64::MAX);
        if let Some(c) = &filter.category {
            rows.retain(|r| &r.category == c);
        }
        rows.truncate(filter.page_size() as usize);
        Ok(rows)
    }

    async fn stats(&self, _now: DateTime<Utc>) -> Result<PostStats, StoreError> {
        self.check_online()?;
        let rows = self.rows.lock().unwrap();
        let mut stats = PostStats {
            total_posts: rows.len() as i64,
            ..PostStats::default()
        };
        for r in rows.values() {
            *stats.categories.entry(r.category.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
