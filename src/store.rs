//! Persistence: raw CSV batches on the way in, GZIP Parquet tables on the
//! way out. The Parquet tables are the only artifact the dashboard reads.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use tracing::info;

use crate::models::{AdRow, CsvRow, PageRow, PageSample, ScrapedRecord};

/// Render a JSON value the way raw CSV cells store it: strings verbatim,
/// null as an empty cell, everything else JSON-encoded.
pub(crate) fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write a scraped batch as CSV. The header is the union of all record
/// keys; an empty cell means the record had no such field.
pub fn write_raw_csv(records: &[(String, ScrapedRecord)], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let columns: Vec<&str> = records
        .iter()
        .flat_map(|(_, record)| record.keys().map(String::as_str))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .collect();

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    writer.write_record(&columns)?;
    for (_, record) in records {
        let row: Vec<String> = columns
            .iter()
            .map(|col| record.get(*col).map(value_to_cell).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!("Wrote {} raw records to {}", records.len(), path.display());
    Ok(())
}

/// Read a raw CSV batch back as stringly rows for preprocessing.
pub fn read_raw_csv(path: &Path) -> Result<Vec<CsvRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("cannot open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = CsvRow::new();
        for (col, value) in headers.iter().zip(record.iter()) {
            row.insert(col.to_string(), value.to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Persist normalized page rows as a GZIP-compressed Parquet table.
pub fn write_pages_parquet(rows: &[PageRow], path: &Path) -> Result<()> {
    let schema = Arc::new(PageRow::schema());

    let timestamps: Vec<Option<i64>> = rows
        .iter()
        .map(|r| r.photo_timestamp.map(|t| t.timestamp_millis()))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.ad_id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.ad_title.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.price))),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.discount),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.brand.as_str()),
        )),
        Arc::new(BooleanArray::from(
            rows.iter().map(|r| r.is_for_swap).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.ad_url.as_str()),
        )),
        Arc::new(BooleanArray::from(
            rows.iter().map(|r| r.promoted).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.favourite_count),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.view_count),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.size.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.user_id.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.user_login.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.photo_url.as_str()),
        )),
        Arc::new(TimestampMillisecondArray::from(timestamps).with_timezone("UTC")),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_parquet(batch, schema, path)
}

/// Persist normalized ad rows as a GZIP-compressed Parquet table.
pub fn write_ads_parquet(rows: &[AdRow], path: &Path) -> Result<()> {
    let schema = Arc::new(AdRow::schema());

    let strings = |get: fn(&AdRow) -> &str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(get)))
    };
    let floats = |get: fn(&AdRow) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from_iter_values(rows.iter().map(get)))
    };
    let bools = |get: fn(&AdRow) -> bool| -> ArrayRef {
        Arc::new(BooleanArray::from(
            rows.iter().map(get).collect::<Vec<_>>(),
        ))
    };
    let times = |get: fn(&AdRow) -> Option<i64>| -> ArrayRef {
        Arc::new(
            TimestampMillisecondArray::from(rows.iter().map(get).collect::<Vec<_>>())
                .with_timezone("UTC"),
        )
    };

    let columns: Vec<ArrayRef> = vec![
        strings(|r| &r.ad_id),
        strings(|r| &r.ad_title),
        strings(|r| &r.ad_description),
        strings(|r| &r.user_id),
        strings(|r| &r.user_login),
        floats(|r| r.user_item_count),
        floats(|r| r.user_given_item_count),
        floats(|r| r.user_taken_item_count),
        floats(|r| r.user_forum_msg_count),
        floats(|r| r.user_forum_topic_count),
        floats(|r| r.user_followers_count),
        floats(|r| r.user_following_count),
        floats(|r| r.user_following_brands_count),
        floats(|r| r.user_positive_feedback_count),
        floats(|r| r.user_neutral_feedback_count),
        floats(|r| r.user_negative_feedback_count),
        floats(|r| r.user_meeting_transaction_count),
        floats(|r| r.user_feedback_reputation),
        times(|r| r.user_created_at.map(|t| t.timestamp_millis())),
        times(|r| r.user_last_loged_on_ts.map(|t| t.timestamp_millis())),
        strings(|r| &r.user_city),
        strings(|r| &r.user_country_id),
        strings(|r| &r.user_country_code),
        strings(|r| &r.user_country_title),
        bools(|r| r.user_bundle_discount),
        bools(|r| r.user_business),
        floats(|r| r.user_total_items_count),
        strings(|r| &r.user_about),
        strings(|r| &r.user_profile_url),
        bools(|r| r.user_has_promoted_closet),
        strings(|r| &r.brand),
        strings(|r| &r.size),
        strings(|r| &r.condition),
        strings(|r| &r.color),
        strings(|r| &r.payment_methods),
        floats(|r| r.view_count),
        floats(|r| r.favourite_count),
        times(|r| r.ad_posting_date.map(|t| t.timestamp_millis())),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    write_parquet(batch, schema, path)
}

fn write_parquet(batch: RecordBatch, schema: SchemaRef, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::GZIP(GzipLevel::default()))
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    info!("Wrote {} rows to {}", batch.num_rows(), path.display());
    Ok(())
}

/// Read back the slice of the pages table the dashboard needs.
pub fn read_page_samples(path: &Path) -> Result<Vec<PageSample>> {
    let file = File::open(path).with_context(|| {
        format!(
            "cannot open {}; run the preprocess step first",
            path.display()
        )
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut samples = Vec::new();
    for batch in reader {
        let batch = batch?;
        let brands = batch
            .column_by_name("brand")
            .and_then(|a| a.as_any().downcast_ref::<StringArray>())
            .context("pages table has no brand column")?;
        let prices = batch
            .column_by_name("price")
            .and_then(|a| a.as_any().downcast_ref::<Float64Array>())
            .context("pages table has no price column")?;
        let stamps = batch
            .column_by_name("photo_timestamp")
            .and_then(|a| a.as_any().downcast_ref::<TimestampMillisecondArray>())
            .context("pages table has no photo_timestamp column")?;

        for i in 0..batch.num_rows() {
            let photo_timestamp = if stamps.is_null(i) {
                None
            } else {
                DateTime::from_timestamp_millis(stamps.value(i))
            };
            samples.push(PageSample {
                brand: brands.value(i).to_string(),
                price: prices.value(i),
                photo_timestamp,
            });
        }
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cells_keep_strings_verbatim_and_encode_the_rest() {
        assert_eq!(value_to_cell(&json!("Nike")), "Nike");
        assert_eq!(value_to_cell(&json!(null)), "");
        assert_eq!(value_to_cell(&json!(4)), "4");
        assert_eq!(
            value_to_cell(&json!({"enabled": true})),
            r#"{"enabled":true}"#
        );
    }

    #[test]
    fn raw_csv_round_trips_a_scraped_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages_data.csv");

        let mut first = ScrapedRecord::new();
        first.insert("id".to_string(), json!(101));
        first.insert("title".to_string(), json!("Hoodie"));
        first.insert("user".to_string(), json!({"id": 7, "login": "lea"}));
        let mut second = ScrapedRecord::new();
        second.insert("id".to_string(), json!(102));
        second.insert("brand_title".to_string(), json!("Nike"));

        let records = vec![("101".to_string(), first), ("102".to_string(), second)];
        write_raw_csv(&records, &path).unwrap();
        let rows = read_raw_csv(&path).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "101");
        assert_eq!(rows[0]["user"], r#"{"id":7,"login":"lea"}"#);
        // union header: fields absent from a record come back empty
        assert_eq!(rows[0]["brand_title"], "");
        assert_eq!(rows[1]["brand_title"], "Nike");
        assert_eq!(rows[1]["title"], "");
    }
}
