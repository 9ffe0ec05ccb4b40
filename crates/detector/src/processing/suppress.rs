use super::detection::Scored;

/// Greedy cross-class non-maximum suppression.
///
/// Every item is compared against every other item of the input, including
/// ones already removed. `current` is removed when it overlaps `item` by at
/// least `overlap_threshold` and `item` ranks higher: a strictly greater
/// score, or an equal score and an earlier position. Survivors keep their
/// input order.
pub fn suppress<T: Scored>(items: Vec<T>, overlap_threshold: f32) -> Vec<T> {
    let _s = common::span_debug!("suppress");

    let mut suppressed = vec![false; items.len()];

    for (i, item) in items.iter().enumerate() {
        for (j, current) in items.iter().enumerate() {
            if i == j || suppressed[j] {
                continue;
            }

            let overlap = item.rect().overlap(current.rect());
            // NaN overlap (zero-area pair) fails the comparison
            if overlap >= overlap_threshold && outranks(i, item.score(), j, current.score()) {
                suppressed[j] = true;
            }
        }
    }

    let before = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .zip(suppressed)
        .filter_map(|(item, removed)| (!removed).then_some(item))
        .collect();

    tracing::trace!(before, after = kept.len(), "Suppression complete");
    kept
}

#[inline]
fn outranks(i: usize, item_score: f32, j: usize, current_score: f32) -> bool {
    item_score > current_score || (item_score == current_score && i < j)
}
