use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{Ad, Post, RunStats};
use crate::spend::SpendCache;

/// Group ads by the post they promote. Ads without a story id, or whose
/// story id is not one of the fetched posts, are dropped without comment.
pub fn map_ads_to_posts(
    posts: &[Post],
    ads: &[Ad],
    stats: &mut RunStats,
) -> BTreeMap<String, Vec<String>> {
    let post_ids: HashSet<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for ad in ads {
        stats.ads_scanned += 1;

        let Some(story_id) = ad.story_id() else {
            continue;
        };
        stats.ads_with_story_id += 1;

        if post_ids.contains(story_id) {
            mapping
                .entry(story_id.to_string())
                .or_default()
                .push(ad.id.clone());
        }
    }

    stats.posts_matched_to_ads = mapping.len();
    mapping
}

/// Every post id gets exactly one entry, 0.0 when nothing maps to it.
pub fn spend_by_post(
    posts: &[Post],
    mapping: &BTreeMap<String, Vec<String>>,
    cache: &SpendCache,
) -> HashMap<String, f64> {
    posts
        .iter()
        .map(|post| {
            let total = mapping
                .get(&post.id)
                .map(|ad_ids| ad_ids.iter().map(|ad_id| cache.cached(ad_id)).sum())
                .unwrap_or(0.0);
            (post.id.clone(), round2(total))
        })
        .collect()
}

pub fn unique_ad_ids(mapping: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let mut ad_ids: Vec<String> = mapping.values().flatten().cloned().collect();
    ad_ids.sort();
    ad_ids.dedup();
    ad_ids
}

// Half-away-from-zero at two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(id: &str) -> Post {
        serde_json::from_value(json!({"id": id})).unwrap()
    }

    fn ad(id: &str, story_id: Option<&str>) -> Ad {
        let mut value = json!({"id": id});
        if let Some(story_id) = story_id {
            value["creative"] = json!({"effective_object_story_id": story_id});
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unmatched_and_keyless_ads_are_dropped() {
        let posts = vec![post("1"), post("2")];
        let ads = vec![
            ad("a1", Some("1")),
            ad("a2", Some("1")),
            ad("a3", Some("9")),
            ad("a4", None),
        ];
        let mut stats = RunStats::default();

        let mapping = map_ads_to_posts(&posts, &ads, &mut stats);

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["1"], vec!["a1".to_string(), "a2".to_string()]);
        assert!(!mapping.contains_key("2"));
        assert!(!mapping.contains_key("9"));

        assert_eq!(stats.ads_scanned, 4);
        assert_eq!(stats.ads_with_story_id, 3);
        assert_eq!(stats.posts_matched_to_ads, 1);
    }

    #[test]
    fn test_spend_totals_cover_every_post() {
        let posts = vec![post("1"), post("2")];
        let ads = vec![ad("a1", Some("1")), ad("a2", Some("1")), ad("a3", Some("9"))];
        let mut stats = RunStats::default();
        let mapping = map_ads_to_posts(&posts, &ads, &mut stats);

        let mut cache = SpendCache::new();
        cache.seed("a1", 1.005);
        cache.seed("a2", 2.004);

        let totals = spend_by_post(&posts, &mapping, &cache);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals["1"], 3.01);
        assert_eq!(totals["2"], 0.0);
    }

    #[test]
    fn test_unique_ad_ids_sorted_and_deduped() {
        let mut mapping = BTreeMap::new();
        mapping.insert("1".to_string(), vec!["b".to_string(), "a".to_string()]);
        mapping.insert("2".to_string(), vec!["a".to_string(), "c".to_string()]);

        assert_eq!(unique_ad_ids(&mapping), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_round2_is_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(3.009), 3.01);
        assert_eq!(round2(0.0), 0.0);
    }
}
