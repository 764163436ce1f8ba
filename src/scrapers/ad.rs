use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::models::ScrapedRecord;
use crate::scrapers::sanitize::clean_text;
use crate::scrapers::traits::Scraper;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Detail label whose value lives in a nested `<time datetime>` attribute
/// rather than in the display text.
const POSTING_DATE_LABEL: &str = "Ajouté";

/// Scrapes full records from individual ad pages.
///
/// Takes a list of ad URLs and the corresponding list of ad ids; the
/// accumulated batch is keyed by ad id in input order.
pub struct AdScraper {
    client: Client,
    ads_urls: Vec<String>,
    ads_ids: Vec<String>,
    ads: Vec<(String, ScrapedRecord)>,
}

impl AdScraper {
    pub fn new(ads_urls: Vec<String>, ads_ids: Vec<String>) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Connection(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            ads_urls,
            ads_ids,
            ads: Vec::new(),
        })
    }

    /// Fetch every ad in scope, in input order. There is no per-item fault
    /// isolation: the first failing ad aborts the batch.
    pub async fn fetch_batch(&mut self) -> Result<(), ScrapeError> {
        let pairs: Vec<(String, String)> = self
            .ads_urls
            .iter()
            .cloned()
            .zip(self.ads_ids.iter().cloned())
            .collect();

        for (url, id) in pairs {
            debug!("Fetching ad page: {}", url);
            let record = self.fetch_ad(&url).await?;
            self.ads.push((id, record));
        }
        info!("Extracted {} ad records", self.ads.len());
        Ok(())
    }

    /// Fetch one ad page and extract its merged record.
    pub async fn fetch_ad(&self, url: &str) -> Result<ScrapedRecord, ScrapeError> {
        let body = self.fetch_page(url).await?;
        parse_ad_page(&body)
    }

    /// Ad records accumulated so far.
    pub fn ads(&self) -> &[(String, ScrapedRecord)] {
        &self.ads
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Connection(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ScrapeError::Connection(format!(
                "{url} returned {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ScrapeError::Connection(format!("{url}: {e}")))
    }
}

#[async_trait]
impl Scraper for AdScraper {
    type Batch = Vec<(String, ScrapedRecord)>;

    async fn scrape(&mut self) -> Result<Self::Batch, ScrapeError> {
        self.fetch_batch().await?;
        Ok(std::mem::take(&mut self.ads))
    }

    fn source_name(&self) -> &'static str {
        "Vinted ads"
    }
}

/// Extract one ad page's description, user-profile and free-form detail
/// fields and merge them into a single record with namespaced prefixes.
/// Key collisions across the three groups are not expected and not
/// defended against.
pub(crate) fn parse_ad_page(html: &str) -> Result<ScrapedRecord, ScrapeError> {
    let document = Html::parse_document(html);

    let description = component_json(&document, "ItemDescription", "content")?;
    let user_info = component_json(&document, "ItemUserInfo", "user")?;
    let details = item_details(&document)?;

    let mut record = ScrapedRecord::new();
    for (key, value) in description {
        record.insert(format!("ad_{key}"), value);
    }
    for (key, value) in user_info {
        record.insert(format!("user_{key}"), value);
    }
    for (key, value) in details {
        record.insert(format!("details_{key}"), value);
    }
    Ok(record)
}

/// Pull the JSON object embedded by a named React component script and
/// return its `key` sub-object.
fn component_json(
    document: &Html,
    component: &str,
    key: &str,
) -> Result<Map<String, Value>, ScrapeError> {
    let raw_selector = format!(r#"script[data-component-name="{component}"]"#);
    let selector = Selector::parse(&raw_selector)
        .map_err(|_| ScrapeError::Parse(format!("invalid selector {raw_selector}")))?;

    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| ScrapeError::Parse(format!("{component} script tag not found")))?;

    let raw = script.text().collect::<String>();
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| ScrapeError::Parse(format!("{component} is not valid JSON: {e}")))?;

    value
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| ScrapeError::Parse(format!("{component} has no {key} object")))
}

/// Walk the details list pairwise: each title node's sanitized text becomes
/// a key, the corresponding value node's sanitized text the value. The
/// posting-date entry instead reads the nested time element's `datetime`
/// attribute, never its display text.
fn item_details(document: &Html) -> Result<Vec<(String, Value)>, ScrapeError> {
    let list_sel = parse_selector("div.details-list.details-list--details")?;
    let title_sel = parse_selector("div.details-list__item-title")?;
    let value_sel = parse_selector("div.details-list__item-value")?;
    let time_sel = parse_selector("time")?;

    let list = document
        .select(&list_sel)
        .next()
        .ok_or_else(|| ScrapeError::Parse("details list not found".to_string()))?;

    let titles: Vec<_> = list.select(&title_sel).collect();
    let values: Vec<_> = list.select(&value_sel).collect();

    let mut details = Vec::with_capacity(titles.len());
    for (title, value) in titles.iter().zip(values.iter()) {
        let key = clean_text(&title.text().collect::<String>());
        let cell = if key == POSTING_DATE_LABEL {
            let time = value.select(&time_sel).next().ok_or_else(|| {
                ScrapeError::Parse(format!("no time element under the {key} value"))
            })?;
            time.value()
                .attr("datetime")
                .ok_or_else(|| {
                    ScrapeError::Parse("time element missing datetime attribute".to_string())
                })?
                .to_string()
        } else {
            clean_text(&value.text().collect::<String>())
        };
        details.push((key, Value::String(cell)));
    }
    Ok(details)
}

fn parse_selector(raw: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(raw).map_err(|_| ScrapeError::Parse(format!("invalid selector {raw}")))
}
