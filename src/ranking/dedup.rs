use std::collections::{BTreeMap, HashMap};

use crate::domain::FeedItem;

/// Drop reposted copies of the same content.
///
/// Items are grouped into baskets by content length; a basket of one is
/// unique by construction. Larger baskets are keyed by content digest and
/// the later item wins a collision, since later copies of a reshared item
/// carry fresher engagement counts. Survivors keep their input order.
///
/// Storage identity is by `id`; this only shapes what gets ranked.
pub fn dedup(items: Vec<FeedItem>) -> Vec<FeedItem> {
    let mut baskets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, item) in items.iter().enumerate() {
        baskets.entry(item.content.len()).or_default().push(idx);
    }

    let mut survivors: Vec<usize> = Vec::with_capacity(items.len());
    for basket in baskets.values() {
        if let [only] = basket.as_slice() {
            survivors.push(*only);
            continue;
        }
        let mut by_digest: HashMap<String, usize> = HashMap::with_capacity(basket.len());
        for &idx in basket {
            by_digest.insert(items[idx].content_digest(), idx);
        }
        survivors.extend(by_digest.into_values());
    }
    survivors.sort_unstable();

    let mut keep = vec![false; items.len()];
    for idx in survivors {
        keep[idx] = true;
    }
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, kept)| kept.then_some(item))
        .collect()
}
