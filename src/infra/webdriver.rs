//! W3C WebDriver client implementing the browser ports over `reqwest`.
//!
//! One WebDriver session backs one `Page`; closing the page deletes the session.
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::model::BrowserConfig;
use crate::ports::browser::{Browser, BrowserError, Element, Page};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct WebDriverBrowser {
    client: reqwest::Client,
    base_url: String,
    headless: bool,
}

impl WebDriverBrowser {
    pub fn new(cfg: &BrowserConfig) -> Result<Self, BrowserError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(120))
            .timeout(cfg.navigation_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| BrowserError::Session(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: cfg.webdriver_url.trim_end_matches('/').to_string(),
            headless: cfg.headless,
        })
    }

    fn capabilities(&self, user_agent: &str) -> Value {
        let mut args = vec![
            format!("--user-agent={user_agent}"),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--window-size=1280,2000".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl Browser for WebDriverBrowser {
    type Page = WebDriverPage;

    async fn open_page(&self, user_agent: &str) -> Result<WebDriverPage, BrowserError> {
        let url = format!("{}/session", self.base_url);
        let value = send(&self.client, Method::POST, &url, Some(self.capabilities(user_agent))).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Session("session response without sessionId".into()))?;
        debug!(session_id, "WebDriver session opened");
        Ok(WebDriverPage {
            session: Arc::new(Session {
                client: self.client.clone(),
                url: format!("{}/session/{session_id}", self.base_url),
            }),
        })
    }
}

struct Session {
    client: reqwest::Client,
    url: String,
}

impl Session {
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, BrowserError> {
        let url = format!("{}{path}", self.url);
        send(&self.client, method, &url, body).await
    }

    async fn find_all(&self, scope: Option<&str>, selector: &str) -> Result<Vec<String>, BrowserError> {
        let path = match scope {
            Some(eid) => format!("/element/{eid}/elements"),
            None => "/elements".to_string(),
        };
        let body = json!({ "using": "css selector", "value": selector });
        let value = self.command(Method::POST, &path, Some(body)).await?;
        let ids = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn execute(&self, script: &str, args: Value) -> Result<Value, BrowserError> {
        let body = json!({ "script": script, "args": args });
        self.command(Method::POST, "/execute/sync", Some(body)).await
    }
}

pub struct WebDriverPage {
    session: Arc<Session>,
}

#[async_trait::async_trait]
impl Page for WebDriverPage {
    type Element = WebDriverElement;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let timeouts = json!({ "pageLoad": timeout.as_millis() as u64 });
        self.session
            .command(Method::POST, "/timeouts", Some(timeouts))
            .await?;
        self.session
            .command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.session.find_all(None, selector).await?.is_empty() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "no '{selector}' within {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<WebDriverElement>, BrowserError> {
        let ids = self.session.find_all(None, selector).await?;
        Ok(ids
            .into_iter()
            .map(|id| WebDriverElement {
                session: Arc::clone(&self.session),
                id,
            })
            .collect())
    }

    async fn scroll_by(&self, pixels: i64) -> Result<(), BrowserError> {
        self.session
            .execute("window.scrollBy(0, arguments[0]);", json!([pixels]))
            .await?;
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<i64, BrowserError> {
        let value = self
            .session
            .execute("return document.body.scrollHeight;", json!([]))
            .await?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .ok_or_else(|| BrowserError::Protocol(format!("scroll height not a number: {value}")))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.session.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

pub struct WebDriverElement {
    session: Arc<Session>,
    id: String,
}

impl WebDriverElement {
    async fn first(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        Ok(self
            .session
            .find_all(Some(&self.id), selector)
            .await?
            .into_iter()
            .next())
    }
}

#[async_trait::async_trait]
impl Element for WebDriverElement {
    async fn text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let Some(eid) = self.first(selector).await? else {
            return Ok(None);
        };
        let value = self
            .session
            .command(Method::GET, &format!("/element/{eid}/text"), None)
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, BrowserError> {
        let Some(eid) = self.first(selector).await? else {
            return Ok(None);
        };
        let value = self
            .session
            .command(Method::GET, &format!("/element/{eid}/attribute/{name}"), None)
            .await?;
        Ok(value.as_str().map(str::to_string))
    }
}

async fn send(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, BrowserError> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await.map_err(classify_transport)?;
    let status = resp.status();
    let payload: Value = resp.json().await.map_err(classify_transport)?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }
    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
    Err(classify_command(code, &format!("{code}: {message}")))
}

fn classify_transport(e: reqwest::Error) -> BrowserError {
    if e.is_timeout() {
        BrowserError::Timeout(e.to_string())
    } else if e.is_connect() {
        BrowserError::Session(format!("webdriver unreachable: {e}"))
    } else {
        BrowserError::Protocol(e.to_string())
    }
}

fn classify_command(code: &str, detail: &str) -> BrowserError {
    match code {
        "timeout" | "script timeout" => BrowserError::Timeout(detail.to_string()),
        "invalid session id" | "session not created" => BrowserError::Session(detail.to_string()),
        _ => BrowserError::Protocol(detail.to_string()),
    }
}
