use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;

use super::{cell, lenient_id_string, parse_bool, parse_float, parse_utc, truncate_at_slash};
use crate::models::{AdRow, CsvRow};
use crate::store;

/// Timestamp columns parsed up front, in raw (pre-rename) names.
const TIME_COLS: [&str; 3] = ["user_created_at", "user_last_loged_on_ts", "details_Ajouté"];

/// `ad_id` values that mean the scraper captured an error page instead of
/// ad data. The site serves the apostrophe entity-escaped or plain
/// depending on how the text was extracted.
const ERROR_AD_IDS: [&str; 2] = [
    "Je ne fais pas d&#39;échanges.",
    "Je ne fais pas d'échanges.",
];

/// Reputation is free text like the count columns and gets the same
/// placeholder defense.
const REPUTATION_COL: &str = "user_feedback_reputation";

/// Normalizes a raw ad-details batch into typed [`AdRow`]s.
pub struct AdsProcessor {
    rows: Vec<CsvRow>,
}

impl AdsProcessor {
    pub fn new(rows: Vec<CsvRow>) -> Self {
        Self { rows }
    }

    /// Run every stage in order and return the normalized rows.
    pub fn preprocess(mut self) -> Result<Vec<AdRow>> {
        info!("Preprocess raw ads");
        self.convert_time_columns()?;
        self.drop_erroneous_ad_id();
        self.clean_size()?;
        self.clean_interested_count()?;
        self.clean_bundle_status()?;
        self.clean_counts();
        self.into_rows()
    }

    /// Same as [`preprocess`](Self::preprocess), then persist the table as
    /// GZIP Parquet.
    pub fn preprocess_and_save(self, path: &Path) -> Result<Vec<AdRow>> {
        let rows = self.preprocess()?;
        store::write_ads_parquet(&rows, path)?;
        info!("Saved preprocessed ads");
        Ok(rows)
    }

    fn require_column(&self, col: &str) -> Result<()> {
        if self.rows.iter().any(|row| row.contains_key(col)) {
            Ok(())
        } else {
            bail!("raw ads batch has no {col:?} column");
        }
    }

    fn columns(&self) -> BTreeSet<String> {
        self.rows.iter().flat_map(|row| row.keys().cloned()).collect()
    }

    /// Parse the three timestamp columns as UTC and re-store them in
    /// canonical form. Empty cells stay empty.
    fn convert_time_columns(&mut self) -> Result<()> {
        for col in TIME_COLS {
            self.require_column(col)?;
            for row in &mut self.rows {
                let raw = cell(row, col).to_string();
                if raw.trim().is_empty() {
                    continue;
                }
                if let Some(ts) = parse_utc(&raw, col)? {
                    row.insert(col.to_string(), ts.to_rfc3339());
                }
            }
        }
        Ok(())
    }

    /// Drop sentinel rows where the scraper captured an error page.
    fn drop_erroneous_ad_id(&mut self) {
        let before = self.rows.len();
        self.rows
            .retain(|row| !ERROR_AD_IDS.contains(&cell(row, "ad_id").trim()));
        let dropped = before - self.rows.len();
        if dropped > 0 {
            info!("Dropped {} erroneous ad rows", dropped);
        }
    }

    fn clean_size(&mut self) -> Result<()> {
        self.require_column("details_Taille")?;
        for row in &mut self.rows {
            if let Some(size) = row.get_mut("details_Taille") {
                *size = truncate_at_slash(size);
            }
        }
        Ok(())
    }

    /// The interested-count display text sometimes embeds extra words;
    /// keep the first whitespace-delimited token only.
    fn clean_interested_count(&mut self) -> Result<()> {
        self.require_column("details_Intéressés·ées")?;
        for row in &mut self.rows {
            if let Some(count) = row.get_mut("details_Intéressés·ées") {
                *count = count.split_whitespace().next().unwrap_or("").to_string();
            }
        }
        Ok(())
    }

    /// Reduce the string-encoded bundle structure to its `enabled` flag.
    /// An absent cell means no bundle discount.
    fn clean_bundle_status(&mut self) -> Result<()> {
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let raw = row.remove("user_bundle_discount").unwrap_or_default();
            let enabled = if raw.trim().is_empty() {
                false
            } else {
                let bundle: Value = serde_json::from_str(&raw).with_context(|| {
                    format!("ads row {idx}: user_bundle_discount is not valid JSON")
                })?;
                bundle
                    .get("enabled")
                    .and_then(Value::as_bool)
                    .with_context(|| {
                        format!("ads row {idx}: bundle structure has no boolean enabled flag")
                    })?
            };
            row.insert("user_bundle_discount".to_string(), enabled.to_string());
        }
        Ok(())
    }

    /// Defend every count column (and the reputation column) against
    /// placeholder text: absent cells and cells containing alphabetic
    /// characters both become `"0"`.
    fn clean_counts(&mut self) {
        let mut cols: Vec<String> = self
            .columns()
            .into_iter()
            .filter(|col| col.contains("_count"))
            .collect();
        cols.push(REPUTATION_COL.to_string());

        for row in &mut self.rows {
            for col in &cols {
                let value = row.entry(col.clone()).or_default();
                let trimmed = value.trim();
                if trimmed.is_empty() || trimmed.chars().any(char::is_alphabetic) {
                    *value = "0".to_string();
                }
            }
        }
    }

    fn into_rows(self) -> Result<Vec<AdRow>> {
        info!("Rename columns in ads");
        info!("Fix column types in ads");
        let mut out = Vec::with_capacity(self.rows.len());
        for (idx, row) in self.rows.iter().enumerate() {
            out.push(ad_row(row).with_context(|| format!("ads row {idx} failed coercion"))?);
        }
        Ok(out)
    }
}

fn ad_row(row: &CsvRow) -> Result<AdRow> {
    let float = |col: &str| parse_float(cell(row, col), col);
    let text = |col: &str| cell(row, col).to_string();
    let boolean = |col: &str| parse_bool(cell(row, col), col);
    let time = |col: &str| parse_utc(cell(row, col), col);

    Ok(AdRow {
        ad_id: lenient_id_string(cell(row, "ad_id")),
        ad_title: text("ad_title"),
        ad_description: text("ad_description"),
        user_id: lenient_id_string(cell(row, "user_id")),
        user_login: text("user_login"),
        user_item_count: float("user_item_count")?,
        user_given_item_count: float("user_given_item_count")?,
        user_taken_item_count: float("user_taken_item_count")?,
        user_forum_msg_count: float("user_forum_msg_count")?,
        user_forum_topic_count: float("user_forum_topic_count")?,
        user_followers_count: float("user_followers_count")?,
        user_following_count: float("user_following_count")?,
        user_following_brands_count: float("user_following_brands_count")?,
        user_positive_feedback_count: float("user_positive_feedback_count")?,
        user_neutral_feedback_count: float("user_neutral_feedback_count")?,
        user_negative_feedback_count: float("user_negative_feedback_count")?,
        user_meeting_transaction_count: float("user_meeting_transaction_count")?,
        user_feedback_reputation: float(REPUTATION_COL)?,
        user_created_at: time("user_created_at")?,
        user_last_loged_on_ts: time("user_last_loged_on_ts")?,
        user_city: text("user_city"),
        user_country_id: lenient_id_string(cell(row, "user_country_id")),
        user_country_code: text("user_country_code"),
        user_country_title: text("user_country_title"),
        user_bundle_discount: boolean("user_bundle_discount")?,
        user_business: boolean("user_business")?,
        user_total_items_count: float("user_total_items_count")?,
        user_about: text("user_about"),
        user_profile_url: text("user_profile_url"),
        user_has_promoted_closet: boolean("user_has_promoted_closet")?,
        brand: text("details_Marque"),
        size: text("details_Taille"),
        condition: text("details_État"),
        color: text("details_Couleur"),
        payment_methods: text("details_Modes de paiement"),
        view_count: float("details_Nombre de vues")?,
        favourite_count: float("details_Intéressés·ées")?,
        ad_posting_date: time("details_Ajouté")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw_row() -> CsvRow {
        CsvRow::from([
            ("ad_id".to_string(), "2123001".to_string()),
            ("ad_title".to_string(), "Robe d'été".to_string()),
            ("ad_description".to_string(), "Portée une fois".to_string()),
            ("user_id".to_string(), "88.0".to_string()),
            ("user_login".to_string(), "camille".to_string()),
            ("user_item_count".to_string(), "12".to_string()),
            ("user_followers_count".to_string(), "31".to_string()),
            ("user_feedback_reputation".to_string(), "4.8".to_string()),
            (
                "user_created_at".to_string(),
                "2015-05-07T18:31:05+02:00".to_string(),
            ),
            (
                "user_last_loged_on_ts".to_string(),
                "2022-01-14T09:02:11+01:00".to_string(),
            ),
            ("user_city".to_string(), "Lyon".to_string()),
            ("user_country_id".to_string(), "20".to_string()),
            ("user_country_code".to_string(), "FR".to_string()),
            ("user_country_title".to_string(), "France".to_string()),
            (
                "user_bundle_discount".to_string(),
                r#"{"enabled":true,"minimal_item_count":2}"#.to_string(),
            ),
            ("user_business".to_string(), "false".to_string()),
            ("user_total_items_count".to_string(), "14".to_string()),
            ("details_Marque".to_string(), "Nike".to_string()),
            ("details_Taille".to_string(), "M / 38".to_string()),
            ("details_État".to_string(), "Très bon état".to_string()),
            ("details_Couleur".to_string(), "Noir".to_string()),
            ("details_Nombre de vues".to_string(), "250".to_string()),
            (
                "details_Intéressés·ées".to_string(),
                "4 utilisateurs intéressés".to_string(),
            ),
            (
                "details_Ajouté".to_string(),
                "2022-01-12T17:13:21+01:00".to_string(),
            ),
        ])
    }

    #[test]
    fn normalizes_a_full_row() {
        let rows = AdsProcessor::new(vec![raw_row()]).preprocess().unwrap();
        let row = &rows[0];

        assert_eq!(row.ad_id, "2123001");
        assert_eq!(row.user_id, "88");
        assert_eq!(row.size, "M");
        assert_eq!(row.favourite_count, 4.0);
        assert!(row.user_bundle_discount);
        assert_eq!(
            row.ad_posting_date,
            Some(Utc.with_ymd_and_hms(2022, 1, 12, 16, 13, 21).unwrap())
        );
    }

    #[test]
    fn sentinel_ad_ids_are_dropped_in_both_forms() {
        let mut escaped = raw_row();
        escaped.insert(
            "ad_id".to_string(),
            "Je ne fais pas d&#39;échanges. ".to_string(),
        );
        let mut plain = raw_row();
        plain.insert(
            "ad_id".to_string(),
            "Je ne fais pas d'échanges. ".to_string(),
        );

        let rows = AdsProcessor::new(vec![escaped, raw_row(), plain])
            .preprocess()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ad_id, "2123001");
    }

    #[test]
    fn alphabetic_count_placeholders_collapse_to_zero() {
        let mut raw = raw_row();
        raw.insert(
            "user_followers_count".to_string(),
            "Pas encore".to_string(),
        );
        raw.insert("user_item_count".to_string(), String::new());

        let rows = AdsProcessor::new(vec![raw]).preprocess().unwrap();
        assert_eq!(rows[0].user_followers_count, 0.0);
        assert_eq!(rows[0].user_item_count, 0.0);
    }

    #[test]
    fn reputation_gets_the_same_placeholder_defense() {
        let mut raw = raw_row();
        raw.insert(
            "user_feedback_reputation".to_string(),
            "Aucune évaluation".to_string(),
        );
        let rows = AdsProcessor::new(vec![raw]).preprocess().unwrap();
        assert_eq!(rows[0].user_feedback_reputation, 0.0);
    }

    #[test]
    fn missing_bundle_cell_means_no_discount() {
        let mut raw = raw_row();
        raw.remove("user_bundle_discount");
        let rows = AdsProcessor::new(vec![raw]).preprocess().unwrap();
        assert!(!rows[0].user_bundle_discount);
    }

    #[test]
    fn interested_count_keeps_the_first_token_only() {
        let rows = AdsProcessor::new(vec![raw_row()]).preprocess().unwrap();
        assert_eq!(rows[0].favourite_count, 4.0);
    }

    #[test]
    fn unparseable_time_cell_aborts_the_batch() {
        let mut raw = raw_row();
        raw.insert("details_Ajouté".to_string(), "il y a 3 jours".to_string());
        assert!(AdsProcessor::new(vec![raw]).preprocess().is_err());
    }
}
