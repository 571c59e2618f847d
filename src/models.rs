use chrono::DateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub permalink_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub status_type: Option<String>,
    #[serde(default, rename = "type")]
    pub post_type: Option<String>,
}

impl Post {
    pub fn title(&self) -> &str {
        self.message
            .as_deref()
            .or(self.story.as_deref())
            .unwrap_or("")
    }

    pub fn type_label(&self) -> &str {
        self.status_type
            .as_deref()
            .or(self.post_type.as_deref())
            .unwrap_or("")
    }

    // Graph timestamps come as RFC 3339 or with a `+0000` style offset.
    // Unparsable values sort first.
    pub fn publish_ts(&self) -> i64 {
        let Some(created) = self.created_time.as_deref() else {
            return 0;
        };
        DateTime::parse_from_rfc3339(created)
            .or_else(|_| DateTime::parse_from_str(created, "%Y-%m-%dT%H:%M:%S%z"))
            .map(|dt| dt.timestamp())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ad {
    pub id: String,
    #[serde(default)]
    pub adcreatives: Option<CreativeList>,
    #[serde(default)]
    pub creative: Option<Creative>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreativeList {
    #[serde(default)]
    pub data: Vec<Creative>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Creative {
    #[serde(default)]
    pub effective_object_story_id: Option<String>,
}

impl Ad {
    /// The post this ad promotes: first story id in the `adcreatives` list,
    /// falling back to the inline `creative` object.
    pub fn story_id(&self) -> Option<&str> {
        if let Some(list) = &self.adcreatives {
            for creative in &list.data {
                match creative.effective_object_story_id.as_deref() {
                    Some(story_id) if !story_id.is_empty() => return Some(story_id),
                    _ => {}
                }
            }
        }

        self.creative
            .as_ref()
            .and_then(|c| c.effective_object_story_id.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RunStats {
    pub posts_fetched: usize,
    pub ads_scanned: usize,
    pub ads_with_story_id: usize,
    pub posts_matched_to_ads: usize,
}
