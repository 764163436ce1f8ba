use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use super::{cell, flatten_json, id_string, parse_bool, parse_float, truncate_at_slash};
use crate::models::{CsvRow, PageRow};
use crate::store::{self, value_to_cell};

/// Epoch value the site stores when a listing photo has no timestamp.
const NO_PHOTO_TIMESTAMP: i64 = 0;

/// Normalizes a raw catalog-pages batch into typed [`PageRow`]s.
pub struct PagesProcessor {
    rows: Vec<CsvRow>,
}

impl PagesProcessor {
    pub fn new(rows: Vec<CsvRow>) -> Self {
        Self { rows }
    }

    /// Run every stage in order and return the normalized rows.
    pub fn preprocess(mut self) -> Result<Vec<PageRow>> {
        info!("Preprocess raw pages");
        self.clean_price();
        self.clean_size()?;
        self.extract_user_data()?;
        self.extract_photo_data()?;
        self.into_rows()
    }

    /// Same as [`preprocess`](Self::preprocess), then persist the table as
    /// GZIP Parquet — the only side effect of the pages pipeline.
    pub fn preprocess_and_save(self, path: &Path) -> Result<Vec<PageRow>> {
        let rows = self.preprocess()?;
        store::write_pages_parquet(&rows, path)?;
        info!("Saved preprocessed pages");
        Ok(rows)
    }

    fn require_column(&self, col: &str) -> Result<()> {
        if self.rows.iter().any(|row| row.contains_key(col)) {
            Ok(())
        } else {
            bail!("raw pages batch has no {col:?} column");
        }
    }

    /// Missing discount means no discount.
    fn clean_price(&mut self) {
        for row in &mut self.rows {
            let discount = row.entry("discount".to_string()).or_default();
            if discount.trim().is_empty() {
                *discount = "0".to_string();
            }
        }
    }

    fn clean_size(&mut self) -> Result<()> {
        self.require_column("size_title")?;
        for row in &mut self.rows {
            if let Some(size) = row.get_mut("size_title") {
                *size = truncate_at_slash(size);
            }
        }
        Ok(())
    }

    /// Unpack the string-encoded user object into flat `user_*` columns.
    fn extract_user_data(&mut self) -> Result<()> {
        self.require_column("user")?;
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let raw = row.remove("user").unwrap_or_default();
            let user: Value = serde_json::from_str(&raw)
                .with_context(|| format!("pages row {idx}: user field is not valid JSON"))?;

            let mut flat = BTreeMap::new();
            flatten_json("", &user, &mut flat);
            for (key, value) in flat {
                row.insert(format!("user_{key}"), value_to_cell(&value));
            }
        }
        Ok(())
    }

    /// Unpack the string-encoded photo object: `url` becomes `photo_url`,
    /// `high_resolution.timestamp` becomes the `photo_timestamp` epoch
    /// (0 when absent — the "no photo timestamp" sentinel).
    fn extract_photo_data(&mut self) -> Result<()> {
        self.require_column("photo")?;
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let raw = row.remove("photo").unwrap_or_default();
            let photo: Value = if raw.trim().is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("pages row {idx}: photo field is not valid JSON"))?
            };

            let mut flat = BTreeMap::new();
            flatten_json("", &photo, &mut flat);

            let url = flat.get("url").map(value_to_cell).unwrap_or_default();
            let mut epoch = flat
                .get("high_resolution.timestamp")
                .map(value_to_cell)
                .unwrap_or_default();
            if epoch.trim().is_empty() {
                epoch = "0".to_string();
            }

            row.insert("photo_url".to_string(), url);
            row.insert("photo_timestamp".to_string(), epoch);
        }
        Ok(())
    }

    /// Projection to the relevant columns, renaming and per-column type
    /// coercion, all in one typed constructing pass.
    fn into_rows(self) -> Result<Vec<PageRow>> {
        info!("Rename columns in pages");
        info!("Fix column types in pages");
        let mut out = Vec::with_capacity(self.rows.len());
        for (idx, row) in self.rows.iter().enumerate() {
            out.push(page_row(row).with_context(|| format!("pages row {idx} failed coercion"))?);
        }
        Ok(out)
    }
}

fn page_row(row: &CsvRow) -> Result<PageRow> {
    Ok(PageRow {
        ad_id: id_string(cell(row, "id"), "id")?,
        ad_title: cell(row, "title").to_string(),
        price: parse_float(cell(row, "price"), "price")?,
        discount: parse_float(cell(row, "discount"), "discount")?,
        brand: cell(row, "brand_title").to_string(),
        is_for_swap: parse_bool(cell(row, "is_for_swap"), "is_for_swap")?,
        ad_url: cell(row, "url").to_string(),
        promoted: parse_bool(cell(row, "promoted"), "promoted")?,
        favourite_count: parse_float(cell(row, "favourite_count"), "favourite_count")?,
        view_count: parse_float(cell(row, "view_count"), "view_count")?,
        size: cell(row, "size_title").to_string(),
        user_id: id_string(cell(row, "user_id"), "user_id")?,
        user_login: cell(row, "user_login").to_string(),
        photo_url: cell(row, "photo_url").to_string(),
        photo_timestamp: photo_timestamp(cell(row, "photo_timestamp"))?,
    })
}

fn photo_timestamp(raw: &str) -> Result<Option<DateTime<Utc>>> {
    let epoch = raw
        .trim()
        .parse::<f64>()
        .with_context(|| format!("photo_timestamp: cannot parse epoch {raw:?}"))?;
    let secs = epoch as i64;
    if secs == NO_PHOTO_TIMESTAMP {
        return Ok(None);
    }
    let ts = DateTime::from_timestamp(secs, 0)
        .with_context(|| format!("photo_timestamp: epoch {secs} out of range"))?;
    Ok(Some(ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_row() -> CsvRow {
        CsvRow::from([
            ("id".to_string(), "2123001".to_string()),
            ("title".to_string(), "Hoodie".to_string()),
            ("price".to_string(), "12.0".to_string()),
            ("discount".to_string(), "".to_string()),
            ("brand_title".to_string(), "Nike".to_string()),
            ("is_for_swap".to_string(), "false".to_string()),
            ("url".to_string(), "https://www.vinted.fr/items/2123001".to_string()),
            ("promoted".to_string(), "true".to_string()),
            ("favourite_count".to_string(), "4".to_string()),
            ("view_count".to_string(), "250".to_string()),
            ("size_title".to_string(), "M / 38".to_string()),
            (
                "user".to_string(),
                r#"{"id":7,"login":"lea","profile_url":"https://www.vinted.fr/member/7"}"#
                    .to_string(),
            ),
            (
                "photo".to_string(),
                r#"{"url":"https://img/2123001.jpg","high_resolution":{"timestamp":1641996821}}"#
                    .to_string(),
            ),
        ])
    }

    #[test]
    fn normalizes_a_full_row() {
        let rows = PagesProcessor::new(vec![raw_row()]).preprocess().unwrap();
        let row = &rows[0];

        assert_eq!(row.ad_id, "2123001");
        assert_eq!(row.discount, 0.0);
        assert_eq!(row.size, "M");
        assert_eq!(row.user_id, "7");
        assert_eq!(row.user_login, "lea");
        assert_eq!(row.photo_url, "https://img/2123001.jpg");
        assert_eq!(
            row.photo_timestamp,
            Some(Utc.timestamp_opt(1641996821, 0).unwrap())
        );
    }

    #[test]
    fn zero_epoch_means_no_photo_timestamp() {
        let mut raw = raw_row();
        raw.insert("photo".to_string(), String::new());
        let rows = PagesProcessor::new(vec![raw]).preprocess().unwrap();
        assert_eq!(rows[0].photo_timestamp, None);
        assert_eq!(rows[0].photo_url, "");
    }

    #[test]
    fn id_columns_lose_decimal_noise() {
        let mut raw = raw_row();
        raw.insert("id".to_string(), "2123001.0".to_string());
        let rows = PagesProcessor::new(vec![raw]).preprocess().unwrap();
        assert_eq!(rows[0].ad_id, "2123001");
    }

    #[test]
    fn invalid_user_json_aborts_the_batch() {
        let mut raw = raw_row();
        raw.insert("user".to_string(), "{'login': 'lea'}".to_string());
        assert!(PagesProcessor::new(vec![raw]).preprocess().is_err());
    }

    #[test]
    fn normalized_output_is_not_accepted_as_input() {
        let rows = PagesProcessor::new(vec![raw_row()]).preprocess().unwrap();

        // Re-feed the normalized row as if it were a raw batch: the first
        // pass consumed size_title/user/photo, so the second pass must fail
        // rather than quietly run again.
        let refed: CsvRow = CsvRow::from([
            ("ad_id".to_string(), rows[0].ad_id.clone()),
            ("ad_title".to_string(), rows[0].ad_title.clone()),
            ("price".to_string(), rows[0].price.to_string()),
            ("brand".to_string(), rows[0].brand.clone()),
            ("size".to_string(), rows[0].size.clone()),
            ("user_id".to_string(), rows[0].user_id.clone()),
        ]);
        assert!(PagesProcessor::new(vec![refed]).preprocess().is_err());
    }
}
