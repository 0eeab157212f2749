// Property tests: merge ordering/idempotence and grouping as a stable partition

mod common;

use common::entity;
use fluxboard::grouping::group;
use fluxboard::models::SeriesPoint;
use fluxboard::series::SeriesBuffer;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

/// Sorted, unique timestamps split into chronological fetches. Each fetch may re-send a tail
/// of the previous one, the way overlapping query windows do.
fn chronological_fetches() -> impl Strategy<Value = (Vec<i64>, Vec<Vec<SeriesPoint>>)> {
    (
        prop::collection::btree_set(1i64..5_000, 1..80),
        prop::collection::vec((1usize..10, 0usize..5), 1..20),
    )
        .prop_map(|(ts, cuts)| {
            let ts: Vec<i64> = ts.into_iter().collect();
            let mut batches = Vec::new();
            let mut pos = 0usize;
            for (len, overlap) in cuts {
                if pos >= ts.len() {
                    break;
                }
                let from = pos.saturating_sub(overlap);
                let to = (pos + len).min(ts.len());
                batches.push(
                    ts[from..to]
                        .iter()
                        .map(|&t| SeriesPoint::new(t, t as f64))
                        .collect(),
                );
                pos = to;
            }
            if pos < ts.len() {
                batches.push(
                    ts[pos..]
                        .iter()
                        .map(|&t| SeriesPoint::new(t, t as f64))
                        .collect(),
                );
            }
            (ts, batches)
        })
}

proptest! {
    #[test]
    fn test_merge_yields_strictly_increasing_deduplicated_points((ts, batches) in chronological_fetches()) {
        let mut buf = SeriesBuffer::new(1_000_000);
        let mut last_cursor = buf.cursor();
        for batch in &batches {
            buf.merge(batch);
            prop_assert!(buf.cursor() >= last_cursor);
            last_cursor = buf.cursor();
        }
        let got: Vec<i64> = buf.points().iter().map(|p| p.timestamp).collect();
        prop_assert!(got.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(got, ts);
    }

    #[test]
    fn test_merging_a_result_twice_changes_nothing(raw in prop::collection::vec((1i64..1_000, -10.0f64..10.0), 0..50)) {
        let batch: Vec<SeriesPoint> = raw.iter().map(|&(t, v)| SeriesPoint::new(t, v)).collect();
        let mut buf = SeriesBuffer::new(300);
        buf.merge(&batch);
        let once = buf.clone();
        prop_assert_eq!(buf.merge(&batch), 0);
        prop_assert_eq!(buf, once);
    }

    #[test]
    fn test_grouping_is_a_stable_partition(
        labels in prop::collection::vec(
            (prop::option::of(0u8..3), prop::option::of(0u8..3)),
            0..40,
        ),
        keys in prop::sample::subsequence(vec!["image", "tag", "zone"], 0..=3),
    ) {
        let entities: Vec<_> = labels
            .iter()
            .enumerate()
            .map(|(i, (image, tag))| {
                let image = image.map(|v| format!("img{v}"));
                let tag = tag.map(|v| if v == 0 { String::new() } else { format!("v{v}") });
                let mut pairs: Vec<(&str, &str)> = Vec::new();
                if let Some(image) = image.as_deref() {
                    pairs.push(("image", image));
                }
                if let Some(tag) = tag.as_deref() {
                    pairs.push(("tag", tag));
                }
                entity(&format!("e{i}"), &pairs)
            })
            .collect();
        let keys: Vec<String> = keys.into_iter().map(String::from).collect();

        let grouping = group(&entities, &keys);
        let total: usize = grouping.groups.iter().map(|g| g.len()).sum();
        prop_assert_eq!(total, entities.len());

        let mut seen = HashSet::new();
        for g in &grouping.groups {
            for id in g.member_ids() {
                prop_assert!(seen.insert(id.to_string()), "{} in two groups", id);
            }
        }
        let keys_unique: BTreeSet<_> = grouping.groups.iter().map(|g| g.key.clone()).collect();
        prop_assert_eq!(keys_unique.len(), grouping.len());

        prop_assert_eq!(group(&entities, &keys), grouping);
    }
}
