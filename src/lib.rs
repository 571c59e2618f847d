use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

pub mod attribution;
pub mod client;
pub mod error;
pub mod models;
pub mod report;
pub mod spend;

pub use client::GraphClient;
pub use error::{ErrorKind, GraphError};
pub use models::{Ad, Post, RunStats};
pub use spend::SpendCache;

pub const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_GRAPH_VERSION: &str = "v23.0";
pub const DEFAULT_PAGE_ID: &str = "101275806400438";

const AD_ACCOUNT_PLACEHOLDER: &str = "<AD_ACCOUNT_ID>";

const POST_FIELDS: &str = "id,created_time,permalink_url,message,story,status_type,type";
const AD_FIELDS: &str = "id,adcreatives{effective_object_story_id},creative{effective_object_story_id,id},created_time,updated_time,status";

pub async fn fetch_posts(
    client: &GraphClient,
    graph_version: &str,
    page_id: &str,
    since_unix: i64,
    until_unix: i64,
) -> Result<Vec<Post>, GraphError> {
    let path = format!("{graph_version}/{page_id}/posts");
    let params = [
        ("fields".to_string(), POST_FIELDS.to_string()),
        ("since".to_string(), since_unix.to_string()),
        ("until".to_string(), until_unix.to_string()),
        ("limit".to_string(), "100".to_string()),
    ];

    let records = client.collect(&path, &params).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Post>(record) {
            Ok(post) => Some(post),
            Err(err) => {
                debug!("skipping post record without required fields: {err}");
                None
            }
        })
        .collect())
}

pub async fn fetch_ads(
    client: &GraphClient,
    graph_version: &str,
    account_id: &str,
) -> Result<Vec<Ad>, GraphError> {
    let path = format!("{graph_version}/act_{account_id}/ads");
    let params = [
        ("fields".to_string(), AD_FIELDS.to_string()),
        ("limit".to_string(), "100".to_string()),
    ];

    let records = client.collect(&path, &params).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Ad>(record) {
            Ok(ad) => Some(ad),
            Err(err) => {
                debug!("skipping ad record without required fields: {err}");
                None
            }
        })
        .collect())
}

pub fn parse_date_to_unix(date: &str) -> Result<i64> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("invalid date {date:?}, expected YYYY-MM-DD"))?;
    Ok(day.and_time(NaiveTime::MIN).and_utc().timestamp())
}

pub fn normalize_ad_account_id(value: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = value else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == AD_ACCOUNT_PLACEHOLDER {
        return Ok(None);
    }

    let digits = trimmed.strip_prefix("act_").unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("invalid ad account id {raw:?}: expected '123' or 'act_123'");
    }

    Ok(Some(digits.to_string()))
}
