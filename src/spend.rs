use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::warn;

use crate::client::GraphClient;
use crate::error::{ErrorKind, GraphError};

const SPEND_SAMPLE_LIMIT: usize = 10;

/// Per-run memo of ad spend. One insights request per ad id, ever; failed
/// lookups are recorded as 0.0 so a single broken ad cannot sink the run.
#[derive(Default)]
pub struct SpendCache {
    entries: HashMap<String, f64>,
    samples: BTreeMap<String, Value>,
}

impl SpendCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &mut self,
        client: &GraphClient,
        graph_version: &str,
        ad_id: &str,
        since: &str,
        until: &str,
    ) -> Result<f64, GraphError> {
        if let Some(spend) = self.entries.get(ad_id) {
            return Ok(*spend);
        }

        let path = format!("{graph_version}/{ad_id}/insights");
        let params = [
            ("fields".to_string(), "spend".to_string()),
            ("level".to_string(), "ad".to_string()),
            ("time_range[since]".to_string(), since.to_string()),
            ("time_range[until]".to_string(), until.to_string()),
        ];

        let spend = match client.get(&path, &params).await {
            Ok(payload) => {
                let spend = payload
                    .get("data")
                    .and_then(Value::as_array)
                    .and_then(|rows| rows.first())
                    .map(|row| parse_spend(row.get("spend")))
                    .unwrap_or(0.0);
                if self.samples.len() < SPEND_SAMPLE_LIMIT {
                    self.samples.insert(ad_id.to_string(), payload);
                }
                spend
            }
            Err(err) if err.kind() == ErrorKind::Fatal => return Err(err),
            Err(err) => {
                warn!("insights fetch failed for ad {ad_id}; recording 0.0 spend: {err}");
                0.0
            }
        };

        self.entries.insert(ad_id.to_string(), spend);
        Ok(spend)
    }

    /// Cached value without a fetch; unknown ad ids read as 0.0.
    pub fn cached(&self, ad_id: &str) -> f64 {
        self.entries.get(ad_id).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn samples(&self) -> &BTreeMap<String, Value> {
        &self.samples
    }

    #[cfg(test)]
    pub(crate) fn seed(&mut self, ad_id: &str, spend: f64) {
        self.entries.insert(ad_id.to_string(), spend);
    }
}

pub fn parse_spend(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(spend) => spend,
            Err(_) => {
                warn!("unparsable spend value {s:?}; treating as 0.0");
                0.0
            }
        },
        Some(other) => {
            warn!("unexpected spend value {other}; treating as 0.0");
            0.0
        }
    }
}
