//! Field extractors.
//!
//! Each extractor pulls one attribute out of a parsed document or fragment
//! and returns `None` when the attribute is absent. None of them fail:
//! missing markup is an expected outcome, not an error.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use eventharvest_shared::{Coordinates, EventHarvestError, Result, SelectorConfig};

static LATITUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""latitude"\s*:\s*([-+]?\d+(?:\.\d+)?)"#).unwrap());

static LONGITUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""longitude"\s*:\s*([-+]?\d+(?:\.\d+)?)"#).unwrap());

/// `12.09 - 14.09.2025`: the start day borrows the year of the end day.
static DAY_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.?\s*[-–]\s*\d{1,2}\.\d{1,2}\.(\d{4})\b").unwrap()
});

static DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})(?:[\s,]+(?:at\s+)?(\d{1,2})[:.](\d{2}))?").unwrap()
});

static ISO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})(?:[T\s](\d{2}):(\d{2})(?::(\d{2}))?)?").unwrap()
});

static SCRIPT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// Compiled form of [`SelectorConfig`].
#[derive(Debug, Clone)]
pub struct Selectors {
    pub container: Selector,
    pub link: Selector,
    pub description: Selector,
    pub tag_list: Selector,
    pub tag_item: Selector,
    pub script_marker: String,
}

impl Selectors {
    /// Compile every selector in `config`. An invalid selector is a config error.
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            container: compile_one("container", &config.container)?,
            link: compile_one("link", &config.link)?,
            description: compile_one("description", &config.description)?,
            tag_list: compile_one("tag_list", &config.tag_list)?,
            tag_item: compile_one("tag_item", &config.tag_item)?,
            script_marker: config.script_marker.clone(),
        })
    }
}

fn compile_one(name: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| EventHarvestError::config(format!("invalid {name} selector '{css}': {e:?}")))
}

// ---------------------------------------------------------------------------
// Listing fields
// ---------------------------------------------------------------------------

/// Whitespace-normalized text content of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title of a listing container: the text of its first link.
pub fn extract_title(container: ElementRef<'_>, selectors: &Selectors) -> Option<String> {
    let link = container.select(&selectors.link).next()?;
    let title = element_text(link);
    (!title.is_empty()).then_some(title)
}

/// Raw `href` of a listing container's first link.
pub fn extract_href(container: ElementRef<'_>, selectors: &Selectors) -> Option<String> {
    container
        .select(&selectors.link)
        .next()?
        .value()
        .attr("href")
        .map(|href| href.trim().to_string())
}

/// Texts of the container's descriptive elements, in document order.
///
/// Elements with no text still count: the first one is the location slot
/// even if it is blank.
pub fn extract_descriptions(container: ElementRef<'_>, selectors: &Selectors) -> Vec<String> {
    container
        .select(&selectors.description)
        .map(element_text)
        .collect()
}

/// Resolve a listing href to an absolute detail URL.
///
/// Absolute http(s) hrefs are used as-is; anything else is joined onto the
/// listing's origin. Fragment-only, `javascript:` and `mailto:` links resolve
/// to nothing.
pub fn resolve_detail_url(listing_url: &Url, href: &str) -> Option<Url> {
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }

    if let Ok(absolute) = Url::parse(href) {
        return matches!(absolute.scheme(), "http" | "https").then_some(absolute);
    }

    let origin = listing_url.join("/").ok()?;
    origin.join(href).ok()
}

// ---------------------------------------------------------------------------
// Detail fields
// ---------------------------------------------------------------------------

/// Category of an event: the first item of the detail page's tag list.
pub fn extract_category(doc: &Html, selectors: &Selectors) -> Option<String> {
    let list = doc.select(&selectors.tag_list).next()?;
    let first = list.select(&selectors.tag_item).next()?;
    let category = element_text(first);
    (!category.is_empty()).then_some(category)
}

/// Text of the first inline script containing the configured marker.
///
/// Later scripts are never inspected, even if they also contain the marker.
pub fn find_marker_script(doc: &Html, selectors: &Selectors) -> Option<String> {
    doc.select(&SCRIPT_SEL)
        .map(|script| script.text().collect::<String>())
        .find(|text| text.contains(selectors.script_marker.as_str()))
}

/// Latitude and longitude embedded in a script's text.
///
/// The two tokens are matched independently; a position is only returned
/// when both are present and both parse.
pub fn extract_coordinates(script_text: &str) -> Option<Coordinates> {
    Some(Coordinates {
        latitude: match_number(&LATITUDE_RE, script_text)?,
        longitude: match_number(&LONGITUDE_RE, script_text)?,
    })
}

fn match_number(re: &Regex, text: &str) -> Option<f64> {
    let caps = re.captures(text)?;
    caps.get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Best-effort ISO-8601 start timestamp from a listing's time text.
///
/// Understands `YYYY-MM-DD[THH:MM[:SS]]`, `DD.MM - DD.MM.YYYY` and
/// `DD.MM.YYYY [HH:MM]`, tried in that order. A form that matches but names
/// an impossible date or time falls through to the next one. Anything else
/// yields `None`.
pub fn parse_start_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    iso_start(raw)
        .or_else(|| day_range_start(raw))
        .or_else(|| dmy_start(raw))
        .map(format_timestamp)
}

fn iso_start(raw: &str) -> Option<NaiveDateTime> {
    let caps = ISO_RE.captures(raw)?;
    let date = ymd(&caps[1], &caps[2], &caps[3])?;
    let time = hms(caps.get(4), caps.get(5), caps.get(6))?;
    Some(date.and_time(time))
}

fn day_range_start(raw: &str) -> Option<NaiveDateTime> {
    let caps = DAY_RANGE_RE.captures(raw)?;
    let date = ymd(&caps[3], &caps[2], &caps[1])?;
    Some(date.and_time(NaiveTime::MIN))
}

fn dmy_start(raw: &str) -> Option<NaiveDateTime> {
    let caps = DMY_RE.captures(raw)?;
    let date = ymd(&caps[3], &caps[2], &caps[1])?;
    let time = hms(caps.get(4), caps.get(5), None)?;
    Some(date.and_time(time))
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn hms(
    hour: Option<regex::Match<'_>>,
    minute: Option<regex::Match<'_>>,
    second: Option<regex::Match<'_>>,
) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(
        capture_or_zero(hour)?,
        capture_or_zero(minute)?,
        capture_or_zero(second)?,
    )
}

fn capture_or_zero(m: Option<regex::Match<'_>>) -> Option<u32> {
    match m {
        Some(m) => m.as_str().parse().ok(),
        None => Some(0),
    }
}

fn format_timestamp(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors() -> Selectors {
        Selectors::compile(&SelectorConfig::default()).unwrap()
    }

    fn parse_with_selectors(html: &str) -> (Html, Selectors) {
        (Html::parse_document(html), selectors())
    }

    #[test]
    fn invalid_selector_is_config_error() {
        let config = SelectorConfig {
            container: "div[".into(),
            ..SelectorConfig::default()
        };
        let err = Selectors::compile(&config).unwrap_err();
        assert!(matches!(err, EventHarvestError::Config { .. }));
        assert!(err.to_string().contains("container"));
    }

    #[test]
    fn title_href_and_descriptions() {
        let (doc, sel) = parse_with_selectors(
            r#"<div class="col">
                <a href="/en/events/42">  Jazz
                    Night </a>
                <p> Town Square </p>
                <p>12.09.2025 19:00</p>
            </div>"#,
        );
        let container = doc.select(&sel.container).next().unwrap();

        assert_eq!(extract_title(container, &sel).as_deref(), Some("Jazz Night"));
        assert_eq!(extract_href(container, &sel).as_deref(), Some("/en/events/42"));
        assert_eq!(
            extract_descriptions(container, &sel),
            vec!["Town Square".to_string(), "12.09.2025 19:00".to_string()]
        );
    }

    #[test]
    fn blank_link_has_no_title() {
        let (doc, sel) = parse_with_selectors(r#"<div class="col"><a href="/x"> </a><p>Here</p></div>"#);
        let container = doc.select(&sel.container).next().unwrap();
        assert!(extract_title(container, &sel).is_none());
    }

    #[test]
    fn resolve_relative_and_absolute_hrefs() {
        let listing = Url::parse("https://kultuuriaken.tartu.ee/en/events?page=2").unwrap();

        assert_eq!(
            resolve_detail_url(&listing, "/en/events/42").unwrap().as_str(),
            "https://kultuuriaken.tartu.ee/en/events/42"
        );
        assert_eq!(
            resolve_detail_url(&listing, "en/events/43").unwrap().as_str(),
            "https://kultuuriaken.tartu.ee/en/events/43"
        );
        assert_eq!(
            resolve_detail_url(&listing, "https://other.example.com/e/1")
                .unwrap()
                .as_str(),
            "https://other.example.com/e/1"
        );
        assert!(resolve_detail_url(&listing, "").is_none());
        assert!(resolve_detail_url(&listing, "#top").is_none());
        assert!(resolve_detail_url(&listing, "mailto:info@tartu.ee").is_none());
        assert!(resolve_detail_url(&listing, "javascript:void(0)").is_none());
    }

    #[test]
    fn category_from_first_tag() {
        let sel = selectors();
        let doc = Html::parse_document(
            r#"<ul class="tags"><li> Concert </li><li>Jazz</li></ul>"#,
        );
        assert_eq!(extract_category(&doc, &sel).as_deref(), Some("Concert"));
    }

    #[test]
    fn category_absent_or_empty() {
        let sel = selectors();
        let none = Html::parse_document("<div><p>No tags here</p></div>");
        assert!(extract_category(&none, &sel).is_none());

        let empty = Html::parse_document(r#"<ul class="tags"></ul>"#);
        assert!(extract_category(&empty, &sel).is_none());
    }

    #[test]
    fn marker_script_first_match_only() {
        let sel = selectors();
        let doc = Html::parse_document(
            r#"<html><head>
                <script src="/app.js"></script>
                <script>window.analytics = {};</script>
                <script>var place = {"latitude":58.1, "name":"first"};</script>
                <script>var place = {"latitude":59.2, "longitude":27.3};</script>
            </head></html>"#,
        );
        let script = find_marker_script(&doc, &sel).unwrap();
        assert!(script.contains("first"));
        // The first marked block lacks a longitude, so no coordinates, even
        // though the next block has both.
        assert!(extract_coordinates(&script).is_none());
    }

    #[test]
    fn coordinates_both_present() {
        let coords =
            extract_coordinates(r#"{"latitude":58.378, "longitude":26.729}"#).unwrap();
        assert_eq!(coords.latitude, 58.378);
        assert_eq!(coords.longitude, 26.729);
    }

    #[test]
    fn coordinates_signed_integer_and_spaced() {
        let coords =
            extract_coordinates(r#"{"longitude" : -3, "latitude": +40.5}"#).unwrap();
        assert_eq!(coords.latitude, 40.5);
        assert_eq!(coords.longitude, -3.0);
    }

    #[test]
    fn coordinates_never_half_present() {
        assert!(extract_coordinates(r#"{"latitude":58.378}"#).is_none());
        assert!(extract_coordinates(r#"{"longitude":26.729}"#).is_none());
        assert!(extract_coordinates(r#"{"latitude":"58.378","longitude":26.7}"#).is_none());
        assert!(extract_coordinates("").is_none());
    }

    #[test]
    fn coordinates_reject_non_finite() {
        let huge = format!(r#"{{"latitude":1{}, "longitude":2}}"#, "0".repeat(400));
        assert!(extract_coordinates(&huge).is_none());
    }

    #[test]
    fn start_date_formats() {
        assert_eq!(
            parse_start_date("12.09.2025 19:00").as_deref(),
            Some("2025-09-12T19:00:00")
        );
        assert_eq!(
            parse_start_date("Fri 3.10.2025").as_deref(),
            Some("2025-10-03T00:00:00")
        );
        assert_eq!(
            parse_start_date("12.09 - 14.09.2025").as_deref(),
            Some("2025-09-12T00:00:00")
        );
        assert_eq!(
            parse_start_date("2025-11-01T18:30").as_deref(),
            Some("2025-11-01T18:30:00")
        );
    }

    #[test]
    fn start_date_unparseable() {
        assert!(parse_start_date("").is_none());
        assert!(parse_start_date("every Friday").is_none());
        assert!(parse_start_date("31.02.2025").is_none());
        assert!(parse_start_date("12.09.2025 25:00").is_none());
    }

    #[test]
    fn impossible_iso_match_falls_through_to_day_month_year() {
        assert_eq!(
            parse_start_date("ref 2025-13-01, 12.09.2025 19:00").as_deref(),
            Some("2025-09-12T19:00:00")
        );
        assert_eq!(
            parse_start_date("2025-09-12T25:00 / 13.09.2025").as_deref(),
            Some("2025-09-13T00:00:00")
        );
    }
}
