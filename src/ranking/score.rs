use crate::domain::FeedItem;

pub const REPLY_WEIGHT: f64 = 1.0;
pub const RESHARE_WEIGHT: f64 = 8.0;
pub const FAVORITE_WEIGHT: f64 = 2.0;

/// Decay window in seconds (3 days).
pub const DECAY_WINDOW_SECS: i64 = 259_200;

/// Floor of the age handicap; old items stay orderable.
pub const MIN_HANDICAP: f64 = 0.02;

/// Age multiplier in `[MIN_HANDICAP, 1.0]`.
pub fn age_handicap(age_secs: i64) -> f64 {
    if age_secs <= 1 {
        1.0
    } else if age_secs >= DECAY_WINDOW_SECS {
        MIN_HANDICAP
    } else {
        (1.0 - age_secs as f64 / DECAY_WINDOW_SECS as f64).max(MIN_HANDICAP)
    }
}

/// Engagement weighted by age of the original item.
pub fn score(item: &FeedItem, now: i64) -> f64 {
    let weighted = item.reply_count as f64 * REPLY_WEIGHT
        + item.reshare_count as f64 * RESHARE_WEIGHT
        + item.favorite_count as f64 * FAVORITE_WEIGHT;
    weighted * age_handicap(now - item.created_at)
}

/// Order by descending score. Ties keep input order.
pub fn rank(items: Vec<FeedItem>, now: i64) -> Vec<FeedItem> {
    let mut scored: Vec<(f64, FeedItem)> = items
        .into_iter()
        .map(|item| (score(&item, now), item))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::item;

    const NOW: i64 = 1_704_067_200;

    fn counts(id: i64, age: i64, replies: u64, reshares: u64, favorites: u64) -> FeedItem {
        let mut it = item(id, NOW - age, "x");
        it.reply_count = replies;
        it.reshare_count = reshares;
        it.favorite_count = favorites;
        it
    }

    #[test]
    fn test_handicap_curve() {
        assert_eq!(age_handicap(-50), 1.0);
        assert_eq!(age_handicap(0), 1.0);
        assert_eq!(age_handicap(1), 1.0);
        assert!((age_handicap(129_600) - 0.5).abs() < 1e-9);
        assert_eq!(age_handicap(DECAY_WINDOW_SECS), MIN_HANDICAP);
        assert_eq!(age_handicap(DECAY_WINDOW_SECS * 10), MIN_HANDICAP);
        assert_eq!(age_handicap(DECAY_WINDOW_SECS - 1), MIN_HANDICAP);
    }

    #[test]
    fn test_weights() {
        assert_eq!(score(&counts(1, 0, 1, 0, 0), NOW), 1.0);
        assert_eq!(score(&counts(1, 0, 0, 1, 0), NOW), 8.0);
        assert_eq!(score(&counts(1, 0, 0, 0, 1), NOW), 2.0);
        assert_eq!(score(&counts(1, 0, 2, 3, 4), NOW), 2.0 + 24.0 + 8.0);
    }

    #[test]
    fn test_score_monotonic_in_reshares() {
        for age in [0, 3_600, 86_400, 300_000] {
            let mut prev = score(&counts(1, age, 3, 0, 5), NOW);
            for reshares in 1..50 {
                let next = score(&counts(1, age, 3, reshares, 5), NOW);
                assert!(next >= prev);
                prev = next;
            }
        }
    }

    #[test]
    fn test_score_non_increasing_in_age() {
        let mut prev = score(&counts(1, 0, 4, 4, 4), NOW);
        for age in (0..400_000).step_by(3_600) {
            let next = score(&counts(1, age, 4, 4, 4), NOW);
            assert!(next <= prev);
            assert!(next > 0.0);
            prev = next;
        }
    }

    #[test]
    fn test_rank_orders_by_score_with_stable_ties() {
        let items = vec![
            counts(1, 0, 1, 0, 0),
            counts(2, 0, 0, 1, 0),
            counts(3, 0, 1, 0, 0),
            counts(4, DECAY_WINDOW_SECS, 0, 10, 0),
        ];
        let ids: Vec<i64> = rank(items, NOW).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }
}
