//! Listing walker: turns the listing page into candidate blocks.

use scraper::Html;
use tracing::{info, instrument, trace};
use url::Url;

use eventharvest_shared::{CandidateBlock, Result};

use crate::extract::{Selectors, extract_descriptions, extract_href, extract_title, resolve_detail_url};
use crate::render::{PageRenderer, RenderSession};

/// Candidate blocks of one listing fetch, in listing order.
///
/// Finite and single-pass: walking again re-fetches the live page.
#[derive(Debug)]
pub struct Candidates {
    inner: std::vec::IntoIter<CandidateBlock>,
}

impl Iterator for Candidates {
    type Item = CandidateBlock;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Candidates {}

/// Walks a listing page and yields one [`CandidateBlock`] per event container.
#[derive(Debug, Clone)]
pub struct ListingWalker {
    selectors: Selectors,
}

impl ListingWalker {
    pub fn new(selectors: Selectors) -> Self {
        Self { selectors }
    }

    /// Load `listing_url` through `session` and enumerate its candidates.
    ///
    /// A failed listing load is returned as an error; nothing can be
    /// discovered without it.
    #[instrument(skip_all, fields(listing_url = %listing_url))]
    pub async fn walk<R: PageRenderer>(
        &self,
        session: &mut RenderSession<R>,
        listing_url: &Url,
    ) -> Result<Candidates> {
        let html = session.load(listing_url).await?;
        let candidates = self.candidates_from_html(&html, listing_url);
        info!(candidates = candidates.len(), "listing walked");
        Ok(candidates)
    }

    /// Enumerate candidates in already-rendered listing markup.
    ///
    /// Containers without a titled, resolvable link or without any
    /// descriptive element are skipped.
    pub fn candidates_from_html(&self, html: &str, listing_url: &Url) -> Candidates {
        let doc = Html::parse_document(html);
        let mut blocks = Vec::new();

        for container in doc.select(&self.selectors.container) {
            let Some(title) = extract_title(container, &self.selectors) else {
                trace!("container without titled link, skipping");
                continue;
            };

            let Some(detail_url) = extract_href(container, &self.selectors)
                .and_then(|href| resolve_detail_url(listing_url, &href))
            else {
                trace!(%title, "container without usable href, skipping");
                continue;
            };

            let mut texts = extract_descriptions(container, &self.selectors).into_iter();
            let Some(raw_location_text) = texts.next() else {
                trace!(%title, "container without descriptive text, skipping");
                continue;
            };
            let raw_time_text = texts.next().unwrap_or_default();

            blocks.push(CandidateBlock {
                title,
                detail_url,
                raw_location_text,
                raw_time_text,
            });
        }

        Candidates {
            inner: blocks.into_iter(),
        }
    }
}
