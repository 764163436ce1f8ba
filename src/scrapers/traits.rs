use async_trait::async_trait;

use crate::error::ScrapeError;

/// Common trait for the Vinted scrapers.
/// This allows easy addition of new marketplaces in the future.
#[async_trait]
pub trait Scraper {
    /// What a completed scrape yields.
    type Batch;

    /// Run the scrape to completion, returning the accumulated batch.
    /// The first failure aborts the whole batch.
    async fn scrape(&mut self) -> Result<Self::Batch, ScrapeError>;

    /// Get the name of the scraper source.
    fn source_name(&self) -> &'static str;
}
