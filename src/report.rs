use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use anyhow::Result;
use csv::Writer;
use serde::Serialize;
use serde_json::Value;

use crate::models::{Post, RunStats};

const CSV_HEADERS: [&str; 11] = [
    "Post ID",
    "Title",
    "Publish time",
    "Permalink",
    "Post type",
    "Spent per post",
    "Ad IDs",
    "Ads matched",
    "Since",
    "Until",
    "Graph version",
];

const SAMPLE_MAPPING_LIMIT: usize = 10;

pub struct ReportRow {
    pub post_id: String,
    pub title: String,
    pub publish_time: String,
    pub permalink: String,
    pub post_type: String,
    pub spent: f64,
    pub ad_ids: Vec<String>,
}

pub struct ReportMeta<'a> {
    pub since: &'a str,
    pub until: &'a str,
    pub graph_version: &'a str,
}

pub fn build_rows(
    posts: &[Post],
    mapping: &BTreeMap<String, Vec<String>>,
    totals: &HashMap<String, f64>,
) -> Vec<ReportRow> {
    let mut sorted: Vec<&Post> = posts.iter().collect();
    sorted.sort_by(|a, b| (a.publish_ts(), &a.id).cmp(&(b.publish_ts(), &b.id)));

    sorted
        .into_iter()
        .map(|post| ReportRow {
            post_id: post.id.clone(),
            title: post.title().to_string(),
            publish_time: post.created_time.clone().unwrap_or_default(),
            permalink: post.permalink_url.clone().unwrap_or_default(),
            post_type: post.type_label().to_string(),
            spent: totals.get(&post.id).copied().unwrap_or(0.0),
            ad_ids: mapping.get(&post.id).cloned().unwrap_or_default(),
        })
        .collect()
}

pub fn write_csv(path: &Path, rows: &[ReportRow], meta: &ReportMeta) -> Result<()> {
    let file = File::create(path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(CSV_HEADERS)?;
    for row in rows {
        let spent = format!("{:.2}", row.spent);
        let ad_ids = row.ad_ids.join(",");
        let matched = row.ad_ids.len().to_string();
        wtr.write_record([
            row.post_id.as_str(),
            row.title.as_str(),
            row.publish_time.as_str(),
            row.permalink.as_str(),
            row.post_type.as_str(),
            spent.as_str(),
            ad_ids.as_str(),
            matched.as_str(),
            meta.since,
            meta.until,
            meta.graph_version,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
pub struct DebugArtifact<'a> {
    pub graph_version: &'a str,
    pub page_id: &'a str,
    pub ad_account_id: Option<&'a str>,
    pub counts: &'a RunStats,
    pub sample_mappings: BTreeMap<String, Vec<String>>,
    pub sample_spend_responses: &'a BTreeMap<String, Value>,
}

impl<'a> DebugArtifact<'a> {
    pub fn sample_mappings(mapping: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
        mapping
            .iter()
            .take(SAMPLE_MAPPING_LIMIT)
            .map(|(post_id, ad_ids)| (post_id.clone(), ad_ids.clone()))
            .collect()
    }
}

pub fn write_debug_artifact(path: &Path, artifact: &DebugArtifact) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, artifact)?;
    Ok(())
}
