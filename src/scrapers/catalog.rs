use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::models::ScrapedRecord;
use crate::scrapers::traits::Scraper;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_MAX_PAGES: usize = 25;
const STORE_SELECTOR: &str = r#"script[data-js-react-on-rails-store="MainStore"]"#;

/// Scrapes item summaries from paginated catalog (search-result) pages.
///
/// Each catalog page embeds its item collection as JSON inside the
/// `MainStore` script tag; one page carries at most 25 items. The scraper
/// owns its accumulating batch, keyed by item id in encounter order.
pub struct CatalogScraper {
    client: Client,
    scope_url: String,
    max_pages: usize,
    items: Vec<(String, ScrapedRecord)>,
}

impl CatalogScraper {
    /// Create a catalog scraper with the default page cap (25).
    pub fn new(scope_url: &str) -> Result<Self, ScrapeError> {
        Self::with_max_pages(scope_url, DEFAULT_MAX_PAGES)
    }

    /// Create a catalog scraper fetching up to `max_pages` pages.
    pub fn with_max_pages(scope_url: &str, max_pages: usize) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Connection(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            scope_url: scope_url.to_string(),
            max_pages,
            items: Vec::new(),
        })
    }

    /// Build the page URLs in scope: page 1 is the bare scope URL, pages
    /// 2..=max_pages append `&page=N`.
    pub fn page_urls(&self) -> Vec<String> {
        let mut urls = vec![self.scope_url.clone()];
        for page in 2..=self.max_pages {
            urls.push(format!("{}&page={}", self.scope_url, page));
        }
        urls
    }

    /// Fetch every page in scope, accumulating items into one batch.
    ///
    /// The first page that fails to fetch or parse aborts the whole batch;
    /// items already gathered in this run are discarded with it.
    pub async fn fetch_all(&mut self) -> Result<(), ScrapeError> {
        for url in self.page_urls() {
            debug!("Fetching catalog page: {}", url);
            let body = self.fetch_page(&url).await?;
            let page_items = parse_catalog_page(&body)?;
            info!("Extracted {} items from {}", page_items.len(), url);
            self.items.extend(page_items);
        }
        Ok(())
    }

    /// Items accumulated so far.
    pub fn items(&self) -> &[(String, ScrapedRecord)] {
        &self.items
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
impl Scraper for CatalogScraper {
    type Batch = Vec<(String, ScrapedRecord)>;

    async fn scrape(&mut self) -> Result<Self::Batch, ScrapeError> {
        self.fetch_all().await?;
        Ok(std::mem::take(&mut self.items))
    }

    fn source_name(&self) -> &'static str {
        "Vinted catalog"
    }
}

/// Extract the item collection embedded in a catalog page: the `MainStore`
/// script holds a JSON store whose `items.catalogItems.byId` sub-object
/// maps item id → item summary.
pub(crate) fn parse_catalog_page(html: &str) -> Result<Vec<(String, ScrapedRecord)>, ScrapeError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(STORE_SELECTOR)
        .map_err(|_| ScrapeError::Parse(format!("invalid selector {STORE_SELECTOR}")))?;

    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| ScrapeError::Parse("MainStore script tag not found".to_string()))?;

    let raw = script.text().collect::<String>();
    let store: Value = serde_json::from_str(&raw)
        .map_err(|e| ScrapeError::Parse(format!("MainStore is not valid JSON: {e}")))?;

    let by_id = store
        .pointer("/items/catalogItems/byId")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ScrapeError::Parse("items.catalogItems.byId missing from MainStore".to_string())
        })?;

    let mut items = Vec::with_capacity(by_id.len());
    for (id, item) in by_id {
        let record: ScrapedRecord = item
            .as_object()
            .ok_or_else(|| ScrapeError::Parse(format!("catalog item {id} is not an object")))?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        items.push((id.clone(), record));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_one_is_bare_and_later_pages_carry_the_page_param() {
        let scraper =
            CatalogScraper::with_max_pages("https://www.vinted.fr/vetements?brand_ids[]=53", 4)
                .unwrap();
        let urls = scraper.page_urls();

        assert_eq!(urls.len(), 4);
        assert!(!urls[0].contains("page="));
        assert_eq!(
            urls[1],
            "https://www.vinted.fr/vetements?brand_ids[]=53&page=2"
        );
        assert_eq!(
            urls[3],
            "https://www.vinted.fr/vetements?brand_ids[]=53&page=4"
        );
    }

    #[test]
    fn default_page_cap_is_25() {
        let scraper = CatalogScraper::new("https://www.vinted.fr/vetements?order=newest_first")
            .unwrap();
        assert_eq!(scraper.page_urls().len(), 25);
    }

    #[test]
    fn extracts_items_from_the_main_store_script() {
        let html = r##"<html><body>
            <script data-js-react-on-rails-store="MainStore">
            {"items":{"catalogItems":{"byId":{
                "101":{"id":101,"title":"Hoodie","price":"12.0",
                       "user":{"id":7,"login":"lea"},
                       "photo":{"url":"https://img/101.jpg",
                                "high_resolution":{"timestamp":1641996821}}},
                "102":{"id":102,"title":"Sneakers","price":"40.0",
                       "user":{"id":9,"login":"marc"},
                       "photo":null}
            }}},"other":{"ignored":true}}
            </script>
        </body></html>"##;

        let items = parse_catalog_page(html).unwrap();
        assert_eq!(items.len(), 2);

        let (id, record) = &items[0];
        assert_eq!(id, "101");
        assert_eq!(record["title"], "Hoodie");
        assert_eq!(record["user"]["login"], "lea");
        assert_eq!(record["photo"]["high_resolution"]["timestamp"], 1641996821);
    }

    #[test]
    fn missing_store_script_is_a_parse_error() {
        let err = parse_catalog_page("<html><body><p>maintenance</p></body></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn malformed_store_json_is_a_parse_error() {
        let html = r#"<script data-js-react-on-rails-store="MainStore">{broken</script>"#;
        let err = parse_catalog_page(html).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }
}
