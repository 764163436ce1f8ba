//! Web server for exploring the preprocessed pages table.
//!
//! Serves a single dashboard page with:
//! - Brand selection driving every figure
//! - Scraped-ads count indicator
//! - 30-day posting trend with delta vs the prior 30 days
//! - Selling-price distribution histogram

mod handlers;
mod routes;
mod templates;

pub use routes::create_router;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::models::PageSample;
use crate::store;

/// Shared state for the dashboard server: an immutable snapshot of the
/// preprocessed pages table. Every figure is a pure function of
/// (snapshot, selected brand).
#[derive(Clone)]
pub struct AppState {
    pub samples: Arc<Vec<PageSample>>,
}

impl AppState {
    /// Load the pages table; fails when the preprocess step has not run.
    pub fn load(pages_parquet: &Path) -> Result<Self> {
        let samples = store::read_page_samples(pages_parquet)?;
        info!("Loaded {} page rows for the dashboard", samples.len());
        Ok(Self {
            samples: Arc::new(samples),
        })
    }
}

/// Serve the dashboard until interrupted.
pub async fn run(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
