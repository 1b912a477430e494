use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::quality::QualityGate;
use crate::domain::relevance::RelevanceScorer;

/// Text prefix the source uses for reposts.
pub const REPOST_MARKER: &str = "RT @";

/// Roster bucket an account belongs to. Assigned by roster membership, never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NewsOutlets,
    Journalists,
    Activists,
    Grassroots,
    Commentary,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::NewsOutlets,
        Category::Journalists,
        Category::Activists,
        Category::Grassroots,
        Category::Commentary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::NewsOutlets => "news_outlets",
            Category::Journalists => "journalists",
            Category::Activists => "activists",
            Category::Grassroots => "grassroots",
            Category::Commentary => "commentary",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub handle: String,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterGroup {
    pub category: Category,
    pub handles: Vec<String>,
}

/// Static account roster, grouped by category, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    groups: Vec<RosterGroup>,
}

impl Roster {
    pub fn new(groups: Vec<RosterGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[RosterGroup] {
        &self.groups
    }

    pub fn accounts(&self) -> impl Iterator<Item = Account> + '_ {
        self.groups.iter().flat_map(|g| {
            g.handles.iter().map(move |h| Account {
                handle: h.clone(),
                category: g.category,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.handles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a fail-open parse. `defaulted` is set when the fallback value was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpreted<T> {
    pub value: T,
    pub defaulted: bool,
}

impl<T> Interpreted<T> {
    pub fn exact(value: T) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            defaulted: true,
        }
    }
}

/// A post as extracted from the page, before scoring and storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDraft {
    pub post_id: String,
    pub author_handle: String,
    pub author_verified: bool,
    pub category: Category,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub likes: u64,
    pub reposts: u64,
    pub replies: u64,
    pub permalink: String,
}

impl PostDraft {
    pub fn is_repost(&self) -> bool {
        self.text.starts_with(REPOST_MARKER)
    }

    pub fn total_engagement(&self) -> u64 {
        self.likes
            .saturating_add(self.reposts)
            .saturating_add(self.replies)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredPost {
    pub draft: PostDraft,
    pub relevance_score: u32,
}

/// A persisted post row, as returned by the read-side store queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPost {
    pub id: i64,
    pub post_id: String,
    pub author_handle: String,
    pub author_verified: bool,
    pub category: String,
    pub text: String,
    pub created_at_ms: i64,
    pub created_at_text: String,
    pub likes: i64,
    pub reposts: i64,
    pub replies: i64,
    pub permalink: String,
    pub is_repost: bool,
    pub relevance_score: i64,
    pub ingested_at_ms: i64,
    pub ingested_at_text: String,
    pub processed: bool,
}

impl StoredPost {
    pub fn total_engagement(&self) -> i64 {
        self.likes + self.reposts + self.replies
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineProfile {
    Primary,
    Alternate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: Option<String>,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: "admin".to_string(),
            password: "admin".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: "posts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub file_directory: PathBuf,
    pub file_name: String,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_directory: PathBuf::from("logs"),
            file_name: "postharvest.log".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    pub user_agents: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            navigation_timeout: Duration::from_secs(60),
            selector_timeout: Duration::from_secs(15),
            user_agents: vec![
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Profile URL with a `{handle}` placeholder.
    pub profile_url_template: String,
    pub max_posts_per_account: usize,
    pub recency_window_minutes: i64,
    pub duplicate_stop_threshold: u32,
    pub stale_stop_threshold: u32,
    pub scroll_pixels: i64,
    pub scroll_pause: Duration,
    pub max_idle_batches: u32,
    pub max_scroll_rounds: u32,
}

impl FetchConfig {
    pub fn profile_url(&self, handle: &str) -> String {
        self.profile_url_template.replace("{handle}", handle)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            profile_url_template: "https://x.com/{handle}".to_string(),
            max_posts_per_account: 50,
            recency_window_minutes: 60,
            duplicate_stop_threshold: 5,
            stale_stop_threshold: 10,
            scroll_pixels: 2000,
            scroll_pause: Duration::from_secs(2),
            max_idle_batches: 3,
            max_scroll_rounds: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Consecutive run-level failures above this count raise an alert.
    pub alert_threshold: u32,
    /// Minimum spacing between two accounts.
    pub account_spacing: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            alert_threshold: 3,
            account_spacing: Duration::from_secs(3),
        }
    }
}

/// Immutable, validated runtime configuration passed to the orchestrator.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: AppMode,
    pub timezone: Tz,
    pub db_dialect: SqlDialect,
    pub sqlite_path: PathBuf,
    pub postgres: PostgresConfig,
    pub logging: LoggingConfig,
    pub browser: BrowserConfig,
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
    pub profile: PipelineProfile,
    pub quality: QualityGate,
    pub scoring: RelevanceScorer,
    pub roster: Roster,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: AppMode::Prod,
            timezone: chrono_tz::UTC,
            db_dialect: SqlDialect::Sqlite,
            sqlite_path: PathBuf::from("data/posts.db"),
            postgres: PostgresConfig::default(),
            logging: LoggingConfig::default(),
            browser: BrowserConfig::default(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            profile: PipelineProfile::Primary,
            quality: QualityGate::for_profile(PipelineProfile::Primary),
            scoring: RelevanceScorer::for_profile(PipelineProfile::Primary),
            roster: Roster::default(),
        }
    }
}
