pub mod ad;
pub mod catalog;
pub mod sanitize;
pub mod traits;

pub use ad::AdScraper;
pub use catalog::CatalogScraper;
pub use sanitize::clean_text;
pub use traits::Scraper;
