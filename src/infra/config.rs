//! Loads the TOML configuration bundle (config + roster) and normalizes it into `AppConfig`.
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono_tz::Tz;
use serde::Deserialize;
use tokio::fs;

use crate::domain::model::{
    AppConfig, AppMode, BrowserConfig, Category, FetchConfig, LogRotation, LoggingConfig,
    PipelineProfile, PostgresConfig, RetryConfig, Roster, RosterGroup, SqlDialect,
};
use crate::domain::quality::QualityGate;
use crate::domain::relevance::{RelevanceScorer, ScoringPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "res/config.toml";
pub const CONFIG_ENV: &str = "POSTHARVEST_CONFIG";
const ROSTER_FILE: &str = "roster.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawAppFile {
    app: RawApp,
    database: RawDatabase,
    sqlite: RawSqlite,
    postgres: RawPostgres,
    logging: RawLogging,
    browser: RawBrowser,
    fetch: RawFetch,
    retry: RawRetry,
    pipeline: RawPipeline,
    scoring: RawScoring,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawApp {
    mode: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawDatabase {
    dialect: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawSqlite {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawPostgres {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    db: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawLogging {
    level: Option<String>,
    file_directory: Option<String>,
    file_name: Option<String>,
    file_rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawBrowser {
    webdriver_url: Option<String>,
    headless: Option<bool>,
    navigation_timeout_ms: Option<u64>,
    selector_timeout_ms: Option<u64>,
    user_agents: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawFetch {
    profile_url_template: Option<String>,
    max_posts_per_account: Option<usize>,
    recency_window_minutes: Option<i64>,
    duplicate_stop_threshold: Option<u32>,
    stale_stop_threshold: Option<u32>,
    scroll_pixels: Option<i64>,
    scroll_pause_ms: Option<u64>,
    max_idle_batches: Option<u32>,
    max_scroll_rounds: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawRetry {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    alert_threshold: Option<u32>,
    account_spacing_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawPipeline {
    profile: Option<String>,
    min_engagement: Option<u64>,
    min_text_length: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawScoring {
    policy: Option<String>,
    keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRosterFile {
    categories: Vec<RawRosterCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRosterCategory {
    name: String,
    accounts: Vec<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `config_path` and the `roster.toml` next to it.
    pub async fn load(config_path: &Path) -> Result<AppConfig, ConfigError> {
        let base_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::Invalid("config path has no parent".into()))?;

        let app_content = fs::read_to_string(config_path).await?;
        let roster_content = fs::read_to_string(base_dir.join(ROSTER_FILE)).await?;
        Self::from_parts(&app_content, &roster_content, base_dir)
    }

    /// Parses already-read file contents; relative paths resolve against `base_dir`.
    pub fn from_parts(
        app_content: &str,
        roster_content: &str,
        base_dir: &Path,
    ) -> Result<AppConfig, ConfigError> {
        let raw: RawAppFile = toml::from_str(app_content)?;
        let raw_roster: RawRosterFile = toml::from_str(roster_content)?;
        let defaults = AppConfig::default();

        let mode = parse_mode(raw.app.mode.as_deref())?;
        let timezone = parse_timezone(raw.app.timezone.as_deref())?;
        let db_dialect = parse_dialect(raw.database.dialect.as_deref())?;
        let sqlite_path = raw
            .sqlite
            .path
            .map(|p| resolve_path(base_dir, &p))
            .unwrap_or_else(|| resolve_path(base_dir, &defaults.sqlite_path.to_string_lossy()));
        let postgres = parse_postgres(raw.postgres);
        let logging = parse_logging(raw.logging, base_dir)?;
        let browser = parse_browser(raw.browser)?;
        let fetch = parse_fetch(raw.fetch)?;
        let retry = parse_retry(raw.retry)?;

        let profile = parse_profile(raw.pipeline.profile.as_deref())?;
        let mut quality = QualityGate::for_profile(profile);
        if let Some(min) = raw.pipeline.min_engagement {
            quality.min_engagement = min;
        }
        if let Some(len) = raw.pipeline.min_text_length {
            quality.min_text_length = len;
        }
        let scoring = parse_scoring(raw.scoring, profile)?;
        let roster = parse_roster(raw_roster)?;

        Ok(AppConfig {
            mode,
            timezone,
            db_dialect,
            sqlite_path,
            postgres,
            logging,
            browser,
            fetch,
            retry,
            profile,
            quality,
            scoring,
            roster,
        })
    }
}

/// CLI flag wins, then `POSTHARVEST_CONFIG`, then the repo-local default.
pub fn pick_config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn parse_mode(s: Option<&str>) -> Result<AppMode, ConfigError> {
    match s.map(|x| x.trim().to_ascii_lowercase()) {
        None => Ok(AppMode::Prod),
        Some(m) if m == "prod" => Ok(AppMode::Prod),
        Some(m) if m == "dev" => Ok(AppMode::Dev),
        Some(other) => Err(ConfigError::Invalid(format!(
            "invalid app.mode '{other}', expected 'dev' or 'prod'"
        ))),
    }
}

fn parse_timezone(s: Option<&str>) -> Result<Tz, ConfigError> {
    let tz_str = s.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("UTC");
    tz_str
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid timezone '{tz_str}'")))
}

fn parse_dialect(s: Option<&str>) -> Result<SqlDialect, ConfigError> {
    match s.map(|x| x.trim().to_ascii_lowercase()) {
        None => Ok(SqlDialect::Sqlite),
        Some(d) if d == "sqlite" => Ok(SqlDialect::Sqlite),
        Some(d) if d == "postgres" => Ok(SqlDialect::Postgres),
        Some(other) => Err(ConfigError::Invalid(format!(
            "invalid database.dialect '{other}', expected 'sqlite' or 'postgres'"
        ))),
    }
}

fn parse_postgres(raw: RawPostgres) -> PostgresConfig {
    let defaults = PostgresConfig::default();
    PostgresConfig {
        url: raw.url.filter(|u| !u.trim().is_empty()),
        user: raw.user.unwrap_or(defaults.user),
        password: raw.password.unwrap_or(defaults.password),
        host: raw.host.unwrap_or(defaults.host),
        port: raw.port.unwrap_or(defaults.port),
        database: raw.db.unwrap_or(defaults.database),
    }
}

fn parse_logging(raw: RawLogging, base_dir: &Path) -> Result<LoggingConfig, ConfigError> {
    let defaults = LoggingConfig::default();
    let level = raw
        .level
        .map(|l| l.trim().to_ascii_lowercase())
        .unwrap_or(defaults.level);
    match level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" | "off" => {}
        _ => {
            return Err(ConfigError::Invalid(format!(
                "invalid logging.level '{level}', expected error|warn|info|debug|trace|off"
            )))
        }
    }
    let rotation = match raw.file_rotation.map(|r| r.trim().to_ascii_lowercase()) {
        None => defaults.rotation,
        Some(r) if r == "hourly" => LogRotation::Hourly,
        Some(r) if r == "daily" => LogRotation::Daily,
        Some(r) if r == "never" => LogRotation::Never,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "invalid logging.file_rotation '{other}', expected hourly|daily|never"
            )))
        }
    };
    let file_directory = raw
        .file_directory
        .map(|d| resolve_path(base_dir, &d))
        .unwrap_or_else(|| resolve_path(base_dir, &defaults.file_directory.to_string_lossy()));
    Ok(LoggingConfig {
        level,
        file_directory,
        file_name: raw.file_name.unwrap_or(defaults.file_name),
        rotation,
    })
}

fn parse_browser(raw: RawBrowser) -> Result<BrowserConfig, ConfigError> {
    let defaults = BrowserConfig::default();
    let user_agents: Vec<String> = raw
        .user_agents
        .unwrap_or(defaults.user_agents)
        .into_iter()
        .map(|ua| ua.trim().to_string())
        .filter(|ua| !ua.is_empty())
        .collect();
    if user_agents.is_empty() {
        return Err(ConfigError::Invalid(
            "browser.user_agents must list at least one user agent".into(),
        ));
    }
    let webdriver_url = raw.webdriver_url.unwrap_or(defaults.webdriver_url);
    if webdriver_url.trim().is_empty() {
        return Err(ConfigError::Invalid("browser.webdriver_url cannot be empty".into()));
    }
    Ok(BrowserConfig {
        webdriver_url,
        headless: raw.headless.unwrap_or(defaults.headless),
        navigation_timeout: raw
            .navigation_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.navigation_timeout),
        selector_timeout: raw
            .selector_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.selector_timeout),
        user_agents,
    })
}

fn parse_fetch(raw: RawFetch) -> Result<FetchConfig, ConfigError> {
    let defaults = FetchConfig::default();
    let cfg = FetchConfig {
        profile_url_template: raw
            .profile_url_template
            .unwrap_or(defaults.profile_url_template),
        max_posts_per_account: raw
            .max_posts_per_account
            .unwrap_or(defaults.max_posts_per_account),
        recency_window_minutes: raw
            .recency_window_minutes
            .unwrap_or(defaults.recency_window_minutes),
        duplicate_stop_threshold: raw
            .duplicate_stop_threshold
            .unwrap_or(defaults.duplicate_stop_threshold),
        stale_stop_threshold: raw
            .stale_stop_threshold
            .unwrap_or(defaults.stale_stop_threshold),
        scroll_pixels: raw.scroll_pixels.unwrap_or(defaults.scroll_pixels),
        scroll_pause: raw
            .scroll_pause_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.scroll_pause),
        max_idle_batches: raw.max_idle_batches.unwrap_or(defaults.max_idle_batches),
        max_scroll_rounds: raw.max_scroll_rounds.unwrap_or(defaults.max_scroll_rounds),
    };

    if !cfg.profile_url_template.contains("{handle}") {
        return Err(ConfigError::Invalid(
            "fetch.profile_url_template must contain '{handle}'".into(),
        ));
    }
    if cfg.max_posts_per_account == 0 {
        return Err(ConfigError::Invalid("fetch.max_posts_per_account must be > 0".into()));
    }
    if cfg.recency_window_minutes <= 0 {
        return Err(ConfigError::Invalid("fetch.recency_window_minutes must be > 0".into()));
    }
    if cfg.duplicate_stop_threshold == 0 || cfg.stale_stop_threshold == 0 {
        return Err(ConfigError::Invalid("fetch stop thresholds must be > 0".into()));
    }
    if cfg.max_scroll_rounds == 0 {
        return Err(ConfigError::Invalid("fetch.max_scroll_rounds must be > 0".into()));
    }
    Ok(cfg)
}

fn parse_retry(raw: RawRetry) -> Result<RetryConfig, ConfigError> {
    let defaults = RetryConfig::default();
    let max_attempts = raw.max_attempts.unwrap_or(defaults.max_attempts);
    if max_attempts == 0 {
        return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
    }
    Ok(RetryConfig {
        max_attempts,
        base_delay: raw
            .base_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay),
        alert_threshold: raw.alert_threshold.unwrap_or(defaults.alert_threshold),
        account_spacing: raw
            .account_spacing_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.account_spacing),
    })
}

fn parse_profile(s: Option<&str>) -> Result<PipelineProfile, ConfigError> {
    match s.map(|x| x.trim().to_ascii_lowercase()) {
        None => Ok(PipelineProfile::Primary),
        Some(p) if p == "primary" => Ok(PipelineProfile::Primary),
        Some(p) if p == "alternate" => Ok(PipelineProfile::Alternate),
        Some(other) => Err(ConfigError::Invalid(format!(
            "invalid pipeline.profile '{other}', expected 'primary' or 'alternate'"
        ))),
    }
}

fn parse_scoring(raw: RawScoring, profile: PipelineProfile) -> Result<RelevanceScorer, ConfigError> {
    let preset = RelevanceScorer::for_profile(profile);
    if raw.policy.is_none() && raw.keywords.is_none() {
        return Ok(preset);
    }
    let policy = match raw.policy.map(|p| p.trim().to_ascii_lowercase()) {
        None => preset.policy(),
        Some(p) if p == "flat" => ScoringPolicy::Flat,
        Some(p) if p == "weighted" => ScoringPolicy::Weighted,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "invalid scoring.policy '{other}', expected 'flat' or 'weighted'"
            )))
        }
    };
    let terms: Vec<String> = match raw.keywords {
        Some(list) => list,
        None => preset.keywords().iter().map(|k| k.term.clone()).collect(),
    };
    let scorer = RelevanceScorer::new(preset.base(), policy, &terms);
    if scorer.keywords().is_empty() {
        return Err(ConfigError::Invalid("scoring.keywords cannot be empty".into()));
    }
    Ok(scorer)
}

fn parse_roster(raw: RawRosterFile) -> Result<Roster, ConfigError> {
    let mut seen_categories = HashSet::new();
    let mut handle_to_category: HashMap<String, Category> = HashMap::new();
    let mut groups = Vec::new();

    for entry in raw.categories {
        let category: Category = entry.name.parse().map_err(ConfigError::Invalid)?;
        if !seen_categories.insert(category) {
            return Err(ConfigError::Invalid(format!(
                "duplicate roster category '{category}'"
            )));
        }
        let mut handles = Vec::new();
        for raw_handle in entry.accounts {
            let handle = raw_handle.trim().trim_start_matches('@').to_string();
            if handle.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category '{category}' has an empty account handle"
                )));
            }
            let key = handle.to_ascii_lowercase();
            if let Some(prev) = handle_to_category.insert(key, category) {
                return Err(ConfigError::Invalid(format!(
                    "account '{handle}' listed in both '{prev}' and '{category}'"
                )));
            }
            handles.push(handle);
        }
        groups.push(RosterGroup { category, handles });
    }

    let roster = Roster::new(groups);
    if roster.is_empty() {
        return Err(ConfigError::Invalid(
            "roster.toml must list at least one account".into(),
        ));
    }
    Ok(roster)
}

fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let p = Path::new(value);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
