use std::collections::BTreeMap;

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One scraped entity: field name → loosely-typed value, exactly as the
/// page embedded it. Catalog items keep their nested `user` and `photo`
/// sub-objects; ad-detail records carry namespaced `ad_*` / `user_*` /
/// `details_*` string fields.
pub type ScrapedRecord = BTreeMap<String, Value>;

/// One row of a raw CSV batch as read back for preprocessing: column →
/// cell text. An empty cell means the field was absent when scraped.
pub type CsvRow = BTreeMap<String, String>;

fn utc_millis(name: &str) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
        true,
    )
}

/// A normalized catalog listing row.
///
/// One row per item summary scraped from the search-result pages.
/// Identifier fields are integer-parsed then re-rendered so formatting
/// noise like `"123.0"` never survives; `photo_timestamp` is `None` when
/// the raw epoch carried the 0 sentinel ("no photo timestamp").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRow {
    pub ad_id: String,
    pub ad_title: String,
    pub price: f64,
    pub discount: f64,
    pub brand: String,
    pub is_for_swap: bool,
    pub ad_url: String,
    pub promoted: bool,
    pub favourite_count: f64,
    pub view_count: f64,
    pub size: String,
    pub user_id: String,
    pub user_login: String,
    pub photo_url: String,
    pub photo_timestamp: Option<DateTime<Utc>>,
}

impl PageRow {
    /// Arrow schema of the persisted pages table.
    pub fn schema() -> Schema {
        Schema::new(vec![
            Field::new("ad_id", DataType::Utf8, false),
            Field::new("ad_title", DataType::Utf8, false),
            Field::new("price", DataType::Float64, false),
            Field::new("discount", DataType::Float64, false),
            Field::new("brand", DataType::Utf8, false),
            Field::new("is_for_swap", DataType::Boolean, false),
            Field::new("ad_url", DataType::Utf8, false),
            Field::new("promoted", DataType::Boolean, false),
            Field::new("favourite_count", DataType::Float64, false),
            Field::new("view_count", DataType::Float64, false),
            Field::new("size", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("user_login", DataType::Utf8, false),
            Field::new("photo_url", DataType::Utf8, false),
            utc_millis("photo_timestamp"),
        ])
    }
}

/// A normalized ad-detail row: the retained description, seller-reputation
/// and free-form detail fields for one ad.
///
/// Count fields arrive as free text and collapse to 0 whenever the raw
/// value contained alphabetic placeholder text. The `user_last_loged_on_ts`
/// name (typo included) is the site's own field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRow {
    pub ad_id: String,
    pub ad_title: String,
    pub ad_description: String,
    pub user_id: String,
    pub user_login: String,
    pub user_item_count: f64,
    pub user_given_item_count: f64,
    pub user_taken_item_count: f64,
    pub user_forum_msg_count: f64,
    pub user_forum_topic_count: f64,
    pub user_followers_count: f64,
    pub user_following_count: f64,
    pub user_following_brands_count: f64,
    pub user_positive_feedback_count: f64,
    pub user_neutral_feedback_count: f64,
    pub user_negative_feedback_count: f64,
    pub user_meeting_transaction_count: f64,
    pub user_feedback_reputation: f64,
    pub user_created_at: Option<DateTime<Utc>>,
    pub user_last_loged_on_ts: Option<DateTime<Utc>>,
    pub user_city: String,
    pub user_country_id: String,
    pub user_country_code: String,
    pub user_country_title: String,
    pub user_bundle_discount: bool,
    pub user_business: bool,
    pub user_total_items_count: f64,
    pub user_about: String,
    pub user_profile_url: String,
    pub user_has_promoted_closet: bool,
    pub brand: String,
    pub size: String,
    pub condition: String,
    pub color: String,
    pub payment_methods: String,
    pub view_count: f64,
    pub favourite_count: f64,
    pub ad_posting_date: Option<DateTime<Utc>>,
}

impl AdRow {
    /// Arrow schema of the persisted ads table.
    pub fn schema() -> Schema {
        Schema::new(vec![
            Field::new("ad_id", DataType::Utf8, false),
            Field::new("ad_title", DataType::Utf8, false),
            Field::new("ad_description", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("user_login", DataType::Utf8, false),
            Field::new("user_item_count", DataType::Float64, false),
            Field::new("user_given_item_count", DataType::Float64, false),
            Field::new("user_taken_item_count", DataType::Float64, false),
            Field::new("user_forum_msg_count", DataType::Float64, false),
            Field::new("user_forum_topic_count", DataType::Float64, false),
            Field::new("user_followers_count", DataType::Float64, false),
            Field::new("user_following_count", DataType::Float64, false),
            Field::new("user_following_brands_count", DataType::Float64, false),
            Field::new("user_positive_feedback_count", DataType::Float64, false),
            Field::new("user_neutral_feedback_count", DataType::Float64, false),
            Field::new("user_negative_feedback_count", DataType::Float64, false),
            Field::new("user_meeting_transaction_count", DataType::Float64, false),
            Field::new("user_feedback_reputation", DataType::Float64, false),
            utc_millis("user_created_at"),
            utc_millis("user_last_loged_on_ts"),
            Field::new("user_city", DataType::Utf8, false),
            Field::new("user_country_id", DataType::Utf8, false),
            Field::new("user_country_code", DataType::Utf8, false),
            Field::new("user_country_title", DataType::Utf8, false),
            Field::new("user_bundle_discount", DataType::Boolean, false),
            Field::new("user_business", DataType::Boolean, false),
            Field::new("user_total_items_count", DataType::Float64, false),
            Field::new("user_about", DataType::Utf8, false),
            Field::new("user_profile_url", DataType::Utf8, false),
            Field::new("user_has_promoted_closet", DataType::Boolean, false),
            Field::new("brand", DataType::Utf8, false),
            Field::new("size", DataType::Utf8, false),
            Field::new("condition", DataType::Utf8, false),
            Field::new("color", DataType::Utf8, false),
            Field::new("payment_methods", DataType::Utf8, false),
            Field::new("view_count", DataType::Float64, false),
            Field::new("favourite_count", DataType::Float64, false),
            utc_millis("ad_posting_date"),
        ])
    }
}

/// The slice of the pages table the dashboard reads.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSample {
    pub brand: String,
    pub price: f64,
    pub photo_timestamp: Option<DateTime<Utc>>,
}
