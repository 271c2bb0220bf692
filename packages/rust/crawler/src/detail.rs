//! Detail resolver: category and coordinates from an event's own page.

use scraper::Html;
use tracing::{debug, instrument, warn};
use url::Url;

use eventharvest_shared::{DEFAULT_CATEGORY, DetailInfo};

use crate::extract::{Selectors, extract_category, extract_coordinates, find_marker_script};
use crate::render::{PageRenderer, RenderSession};

/// Visits detail pages and recovers the attributes the listing lacks.
#[derive(Debug, Clone)]
pub struct DetailResolver {
    selectors: Selectors,
}

impl DetailResolver {
    pub fn new(selectors: Selectors) -> Self {
        Self { selectors }
    }

    /// Resolve `detail_url`. Never fails: a page that cannot be loaded
    /// degrades to [`DetailInfo::default`].
    #[instrument(skip_all, fields(detail_url = %detail_url))]
    pub async fn resolve<R: PageRenderer>(
        &self,
        session: &mut RenderSession<R>,
        detail_url: &Url,
    ) -> DetailInfo {
        match session.load(detail_url).await {
            Ok(html) => self.resolve_from_html(&html),
            Err(e) => {
                warn!(url = %detail_url, error = %e, "detail fetch failed, using defaults");
                DetailInfo::default()
            }
        }
    }

    /// Extract category and coordinates from rendered detail markup.
    pub fn resolve_from_html(&self, html: &str) -> DetailInfo {
        let doc = Html::parse_document(html);

        let category = extract_category(&doc, &self.selectors)
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let coordinates = find_marker_script(&doc, &self.selectors)
            .and_then(|script| extract_coordinates(&script));

        debug!(%category, has_coordinates = coordinates.is_some(), "detail resolved");

        DetailInfo {
            category,
            coordinates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HttpRenderer;
    use eventharvest_shared::{Coordinates, SelectorConfig};
    use std::time::Duration;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver() -> DetailResolver {
        DetailResolver::new(Selectors::compile(&SelectorConfig::default()).unwrap())
    }

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    #[test]
    fn tags_and_coordinates() {
        let html = r#"<html><head>
            <script>var event = {"latitude":58.378, "longitude":26.729};</script>
            </head><body><ul class="tags"><li>Concert</li></ul></body></html>"#;

        let info = resolver().resolve_from_html(html);
        assert_eq!(
            info,
            DetailInfo {
                category: "Concert".into(),
                coordinates: Some(Coordinates {
                    latitude: 58.378,
                    longitude: 26.729,
                }),
            }
        );
    }

    #[test]
    fn no_tags_no_script_falls_back() {
        let info = resolver().resolve_from_html("<html><body><h1>Quiet</h1></body></html>");
        assert_eq!(info.category, "General");
        assert!(info.coordinates.is_none());
    }

    #[test]
    fn lone_latitude_yields_no_coordinates() {
        let html = r#"<script>var e = {"latitude":58.378};</script><ul class="tags"><li>Theatre</li></ul>"#;
        let info = resolver().resolve_from_html(html);
        assert_eq!(info.category, "Theatre");
        assert!(info.coordinates.is_none());
    }

    #[test]
    fn custom_marker_selects_script() {
        let config = SelectorConfig {
            script_marker: "__EVENT__".into(),
            ..SelectorConfig::default()
        };
        let resolver = DetailResolver::new(Selectors::compile(&config).unwrap());
        let html = r#"
            <script>var nearby = {"latitude":1.5, "longitude":2.5};</script>
            <script>window.__EVENT__ = {"latitude":58.38, "longitude":26.72};</script>"#;

        let coords = resolver.resolve_from_html(html).coordinates.unwrap();
        assert_eq!(coords.latitude, 58.38);
    }

    #[test]
    fn full_fixture() {
        let info = resolver().resolve_from_html(&load_fixture("detail_full.html"));
        assert_eq!(info.category, "Concert");
        let coords = info.coordinates.expect("coordinates");
        assert_eq!(coords.latitude, 58.378);
        assert_eq!(coords.longitude, 26.729);
    }

    #[test]
    fn bare_fixture() {
        let info = resolver().resolve_from_html(&load_fixture("detail_bare.html"));
        assert_eq!(info, DetailInfo::default());
    }

    #[tokio::test]
    async fn unreachable_detail_page_degrades_to_defaults() {
        let server = MockServer::start().await;
        Mock::given(path("/en/events/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut session = RenderSession::open(HttpRenderer::new().unwrap(), Duration::ZERO);
        let url = Url::parse(&format!("{}/en/events/404", server.uri())).unwrap();
        let info = resolver().resolve(&mut session, &url).await;

        assert_eq!(info, DetailInfo::default());
        assert_eq!(session.pages_loaded(), 0);
    }

    #[tokio::test]
    async fn resolves_through_session() {
        let server = MockServer::start().await;
        Mock::given(path("/en/events/42"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(load_fixture("detail_full.html")),
            )
            .mount(&server)
            .await;

        let mut session = RenderSession::open(HttpRenderer::new().unwrap(), Duration::ZERO);
        let url = Url::parse(&format!("{}/en/events/42", server.uri())).unwrap();
        let info = resolver().resolve(&mut session, &url).await;

        assert_eq!(info.category, "Concert");
        assert!(info.coordinates.is_some());
    }
}
