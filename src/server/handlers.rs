//! Request handlers: stateless, read-only recomputations over the shared
//! table snapshot.

use std::collections::HashSet;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::templates;
use super::AppState;
use crate::models::PageSample;

/// Width of the posting-trend window, in days. The current window is the
/// last 30 days before the newest photo timestamp; the reference window is
/// the 30 days before that.
const TREND_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub brand: String,
}

/// Everything the three dashboard panels need for one brand.
#[derive(Debug, PartialEq, Serialize)]
pub struct BrandSummary {
    pub brand: String,
    pub scraped_count: usize,
    pub trend_current: usize,
    pub trend_previous: usize,
    pub trend_window_days: i64,
    pub prices: Vec<f64>,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(templates::dashboard_page(&brand_list(&state.samples)))
}

pub async fn api_brands(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(brand_list(&state.samples))
}

pub async fn api_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Json<BrandSummary> {
    Json(summarize(&state.samples, &params.brand))
}

/// Distinct brands in first-seen order; drives the selector.
pub(crate) fn brand_list(samples: &[PageSample]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut brands = Vec::new();
    for sample in samples {
        if seen.insert(sample.brand.as_str()) {
            brands.push(sample.brand.clone());
        }
    }
    brands
}

/// Compute the three dashboard figures for one brand.
///
/// The window anchor is the newest photo timestamp over the whole table,
/// not the filtered subset; both window checks are inclusive at both ends.
pub(crate) fn summarize(samples: &[PageSample], brand: &str) -> BrandSummary {
    let max_ts = samples.iter().filter_map(|s| s.photo_timestamp).max();
    let filtered: Vec<&PageSample> = samples.iter().filter(|s| s.brand == brand).collect();

    let (trend_current, trend_previous) = match max_ts {
        Some(newest) => {
            let current_start = newest - Duration::days(TREND_WINDOW_DAYS);
            let previous_start = newest - Duration::days(TREND_WINDOW_DAYS * 2);
            let current = filtered
                .iter()
                .filter(|s| {
                    s.photo_timestamp
                        .map_or(false, |t| current_start <= t && t <= newest)
                })
                .count();
            let previous = filtered
                .iter()
                .filter(|s| {
                    s.photo_timestamp
                        .map_or(false, |t| previous_start <= t && t <= current_start)
                })
                .count();
            (current, previous)
        }
        None => (0, 0),
    };

    BrandSummary {
        brand: brand.to_string(),
        scraped_count: filtered.len(),
        trend_current,
        trend_previous,
        trend_window_days: TREND_WINDOW_DAYS,
        prices: filtered.iter().map(|s| s.price).collect(),
    }
}
