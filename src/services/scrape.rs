// src/services/scrape.rs

//! Chapter scraping service.
//!
//! Fetches each title's chapter list page and extracts the newest chapter
//! link using the title's configured CSS selector and chapter pattern.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ScrapeCandidate, TitleConfig, TitleId};
use crate::utils::{http, resolve_url};

/// Produces the newest chapter currently published for a title.
///
/// Implementations must be callable concurrently for distinct titles and
/// report failures as `AppError::Scrape`.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, title: &TitleId) -> Result<ScrapeCandidate>;
}

/// Where and how to find a title's newest chapter.
#[derive(Debug, Clone)]
struct TitleSource {
    source_url: Url,
    selector: String,
    link_attr: String,
    pattern: Regex,
}

impl TitleSource {
    fn from_config(title: &TitleConfig) -> Result<Self> {
        Selector::parse(&title.selector).map_err(|e| AppError::selector(&title.selector, e))?;
        Ok(Self {
            source_url: Url::parse(&title.source_url)?,
            selector: title.selector.clone(),
            link_attr: title.link_attr.clone(),
            pattern: Regex::new(&title.chapter_pattern)?,
        })
    }
}

/// Scraper for static HTML chapter lists.
pub struct HtmlScraper {
    client: reqwest::Client,
    sources: HashMap<TitleId, TitleSource>,
}

impl HtmlScraper {
    /// Create a scraper for the given titles.
    pub fn new(client: reqwest::Client, titles: &[TitleConfig]) -> Result<Self> {
        let mut sources = HashMap::with_capacity(titles.len());
        for title in titles {
            sources.insert(title.id(), TitleSource::from_config(title)?);
        }
        Ok(Self { client, sources })
    }
}

#[async_trait]
impl Scraper for HtmlScraper {
    async fn scrape(&self, title: &TitleId) -> Result<ScrapeCandidate> {
        let source = self
            .sources
            .get(title)
            .ok_or_else(|| AppError::scrape(title.as_str(), "no scraper set up for this title"))?;

        log::debug!("Fetching {} for {}", source.source_url, title);
        let html = http::fetch_text(&self.client, source.source_url.as_str())
            .await
            .map_err(|e| AppError::scrape(title.as_str(), e))?;

        let candidate = extract_candidate(&html, source)
            .map_err(|message| AppError::scrape(title.as_str(), message))?;
        log::debug!(
            "Scraped {}: chapter {}.{}",
            title,
            candidate.release_number,
            candidate.sub_release_number.unwrap_or(0)
        );
        Ok(candidate)
    }
}

/// Pull the newest chapter out of a chapter list page.
fn extract_candidate(
    html: &str,
    source: &TitleSource,
) -> std::result::Result<ScrapeCandidate, String> {
    let selector = Selector::parse(&source.selector)
        .map_err(|e| format!("invalid selector '{}': {e}", source.selector))?;
    let document = Html::parse_document(html);

    let element = document
        .select(&selector)
        .next()
        .ok_or_else(|| format!("selector '{}' matched nothing", source.selector))?;
    let href = element
        .value()
        .attr(&source.link_attr)
        .ok_or_else(|| format!("newest chapter link has no '{}' attribute", source.link_attr))?;

    let url = resolve_url(&source.source_url, href);
    let (release_number, sub_release_number) = parse_chapter_numbers(&source.pattern, &url)
        .ok_or_else(|| format!("release number could not be extracted from {url}"))?;

    Ok(ScrapeCandidate::new(release_number, sub_release_number, url))
}

/// Extract `(release_number, sub_release_number)` from a chapter link.
///
/// Group 1 holds the release number. Group 2, when present and non-empty,
/// holds the sub-number.
pub fn parse_chapter_numbers(pattern: &Regex, link: &str) -> Option<(u32, Option<u32>)> {
    let caps = pattern.captures(link)?;
    let release_number = caps.get(1)?.as_str().parse().ok()?;
    let sub_release_number = match caps.get(2).map(|m| m.as_str()) {
        Some(s) if !s.is_empty() => Some(s.parse().ok()?),
        _ => None,
    };
    Some((release_number, sub_release_number))
}
