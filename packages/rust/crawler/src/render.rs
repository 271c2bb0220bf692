//! Page renderer seam and the per-run render session.
//!
//! A [`PageRenderer`] turns a URL into markup. All page loads of a run go
//! through one [`RenderSession`], which applies the settle delay and is
//! released when the run ends, however it ends.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use eventharvest_shared::{EventHarvestError, Result};

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("EventHarvest/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout for [`HttpRenderer`].
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Renderer trait
// ---------------------------------------------------------------------------

/// Anything that can produce the rendered markup of a page.
pub trait PageRenderer {
    /// Load `url` and return its markup.
    fn render(&self, url: &Url) -> impl Future<Output = Result<String>>;
}

impl<R: PageRenderer> PageRenderer for &R {
    fn render(&self, url: &Url) -> impl Future<Output = Result<String>> {
        (**self).render(url)
    }
}

// ---------------------------------------------------------------------------
// HttpRenderer
// ---------------------------------------------------------------------------

/// Renderer that fetches server-side markup with a plain GET.
///
/// Pages whose content is produced by client-side script need a scripting
/// renderer behind the same trait.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// Create a renderer with the default request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a renderer whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                EventHarvestError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }
}

impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| EventHarvestError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EventHarvestError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| EventHarvestError::Network(format!("{url}: body read failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// RenderSession
// ---------------------------------------------------------------------------

/// The single rendering session shared by every page load of a run.
///
/// Loads take `&mut self`, so two loads can never overlap on one session.
pub struct RenderSession<R: PageRenderer> {
    renderer: R,
    settle_delay: Duration,
    pages_loaded: usize,
    released: bool,
}

impl<R: PageRenderer> RenderSession<R> {
    /// Acquire a session over `renderer`.
    pub fn open(renderer: R, settle_delay: Duration) -> Self {
        debug!(settle_ms = settle_delay.as_millis() as u64, "render session opened");
        Self {
            renderer,
            settle_delay,
            pages_loaded: 0,
            released: false,
        }
    }

    /// Render `url`, wait the settle delay, and return the markup.
    pub async fn load(&mut self, url: &Url) -> Result<String> {
        debug!(%url, "loading page");
        let html = self.renderer.render(url).await?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        self.pages_loaded += 1;
        Ok(html)
    }

    /// Number of successful loads so far.
    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    /// Release the session explicitly.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            info!(pages_loaded = self.pages_loaded, "render session released");
        }
    }
}

impl<R: PageRenderer> Drop for RenderSession<R> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_renderer_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let url = Url::parse(&format!("{}/en/events", server.uri())).unwrap();
        let html = renderer.render(&url).await.unwrap();
        assert_eq!(html, "<html>ok</html>");
    }

    #[tokio::test]
    async fn http_renderer_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = renderer.render(&url).await.unwrap_err();
        assert!(matches!(err, EventHarvestError::Network(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn session_counts_successful_loads() {
        let server = MockServer::start().await;
        Mock::given(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a"))
            .mount(&server)
            .await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut session = RenderSession::open(HttpRenderer::new().unwrap(), Duration::ZERO);
        let base = Url::parse(&server.uri()).unwrap();

        assert_eq!(session.load(&base.join("/a").unwrap()).await.unwrap(), "a");
        assert!(session.load(&base.join("/missing").unwrap()).await.is_err());
        assert_eq!(session.pages_loaded(), 1);
        session.close();
    }

    #[tokio::test]
    async fn session_waits_settle_delay() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .mount(&server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let mut session = RenderSession::open(&renderer, Duration::from_millis(50));
        let url = Url::parse(&server.uri()).unwrap();

        let before = std::time::Instant::now();
        session.load(&url).await.unwrap();
        assert!(before.elapsed() >= Duration::from_millis(50));
    }
}
