//! Score fusion across the two retrieval strategies.
//!
//! Raw scores from each origin are min-max normalized over this query's
//! pooled result set, then combined as a weighted sum; a passage missing
//! from one origin contributes 0 for that origin. Ordering ties are broken
//! by first-seen order, which callers arrange as dense before lexical and
//! earlier query variants first.

use std::cmp::Ordering;
use std::collections::HashMap;

use docqa_core::types::{FusedResult, RetrievalResult, SearchOrigin};

#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub dense: f32,
    pub lexical: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            dense: 0.5,
            lexical: 0.5,
        }
    }
}

struct Pooled<'a> {
    first_seen: usize,
    dense: Option<f32>,
    lexical: Option<f32>,
    hit: &'a RetrievalResult,
}

/// Fuse `hits` (in first-seen order) into at most `limit` deduplicated
/// results, one per distinct passage id.
pub fn fuse(hits: &[RetrievalResult], weights: FusionWeights, limit: usize) -> Vec<FusedResult> {
    let dense_range = score_range(hits, SearchOrigin::Dense);
    let lexical_range = score_range(hits, SearchOrigin::Lexical);

    let mut order: Vec<&str> = Vec::new();
    let mut pooled: HashMap<&str, Pooled> = HashMap::new();
    for (i, hit) in hits.iter().enumerate() {
        let norm = match hit.origin {
            SearchOrigin::Dense => normalize(hit.score, dense_range),
            SearchOrigin::Lexical => normalize(hit.score, lexical_range),
        };
        let entry = pooled.entry(hit.passage_id.as_str()).or_insert_with(|| {
            order.push(hit.passage_id.as_str());
            Pooled {
                first_seen: i,
                dense: None,
                lexical: None,
                hit,
            }
        });
        let slot = match hit.origin {
            SearchOrigin::Dense => &mut entry.dense,
            SearchOrigin::Lexical => &mut entry.lexical,
        };
        *slot = Some(slot.map_or(norm, |prev: f32| prev.max(norm)));
    }

    let mut fused: Vec<(usize, FusedResult)> = order
        .iter()
        .filter_map(|id| pooled.get(id))
        .map(|e| {
            let score =
                weights.dense * e.dense.unwrap_or(0.0) + weights.lexical * e.lexical.unwrap_or(0.0);
            (
                e.first_seen,
                FusedResult {
                    passage_id: e.hit.passage_id.clone(),
                    text: e.hit.text.clone(),
                    document_id: e.hit.document_id.clone(),
                    page_number: e.hit.page_number,
                    fused_score: score,
                },
            )
        })
        .collect();
    fused.sort_by(|a, b| {
        b.1.fused_score
            .partial_cmp(&a.1.fused_score)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    fused.truncate(limit);
    fused.into_iter().map(|(_, r)| r).collect()
}

fn score_range(hits: &[RetrievalResult], origin: SearchOrigin) -> Option<(f32, f32)> {
    let mut range: Option<(f32, f32)> = None;
    for h in hits.iter().filter(|h| h.origin == origin) {
        range = Some(match range {
            None => (h.score, h.score),
            Some((lo, hi)) => (lo.min(h.score), hi.max(h.score)),
        });
    }
    range
}

/// Min-max over `(lo, hi)`. A degenerate range maps to 1.0 so a lone hit is
/// not erased by normalization.
fn normalize(score: f32, range: Option<(f32, f32)>) -> f32 {
    match range {
        Some((lo, hi)) if hi > lo => (score - lo) / (hi - lo),
        Some(_) => 1.0,
        None => 0.0,
    }
}
