use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

/// Filesystem layout for the datasets: raw CSV batches are the scraper
/// output, GZIP Parquet tables the preprocessed interchange the dashboard
/// reads. Passed explicitly wherever paths are needed.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub raw_pages: PathBuf,
    pub raw_ads: PathBuf,
    pub prep_pages: PathBuf,
    pub prep_ads: PathBuf,
}

impl DataPaths {
    pub fn new(root: &Path) -> Self {
        let raw = root.join("raw");
        let preprocessed = root.join("preprocessed");
        Self {
            raw_pages: raw.join("pages_data.csv"),
            raw_ads: raw.join("ads_data.csv"),
            prep_pages: preprocessed.join("pages_data.parquet.gz"),
            prep_ads: preprocessed.join("ads_data.parquet.gz"),
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new(Path::new("data"))
    }
}

/// Initialize logging. JSON lines by default; `DEV_MODE=true` switches to
/// the human-readable formatter. `RUST_LOG` overrides the level filter.
pub fn init_logging(verbose: bool) {
    let dev_mode = std::env::var("DEV_MODE")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if dev_mode {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_data_layout() {
        let paths = DataPaths::new(Path::new("data"));
        assert_eq!(paths.raw_pages, Path::new("data/raw/pages_data.csv"));
        assert_eq!(
            paths.prep_ads,
            Path::new("data/preprocessed/ads_data.parquet.gz")
        );
    }
}
