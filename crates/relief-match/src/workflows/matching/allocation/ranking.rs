use std::cmp::Ordering;
use std::collections::HashMap;

use super::super::domain::CandidateSource;
use super::AllocationDecision;

/// Largest availability first. The sort is stable, so equal pools keep resolver order.
pub(crate) fn rank_by_fulfillment(pool: &mut [CandidateSource]) {
    pool.sort_by(|a, b| b.available_quantity.cmp(&a.available_quantity));
}

/// Fewest days to ship first, unknown shipping time last, larger availability breaks ties.
pub(crate) fn rank_by_quickest(pool: &mut [CandidateSource]) {
    pool.sort_by(|a, b| {
        compare_days(a.days_to_ship, b.days_to_ship)
            .then_with(|| b.available_quantity.cmp(&a.available_quantity))
    });
}

/// Shortest distance first; donors without a known distance rank last.
pub(crate) fn rank_by_distance(pool: &mut [CandidateSource], distances: &HashMap<String, f64>) {
    let distance_of = |candidate: &CandidateSource| {
        candidate
            .donor_zipcode
            .as_ref()
            .and_then(|zip| distances.get(zip))
            .copied()
            .filter(|distance| distance.is_finite())
            .unwrap_or(f64::INFINITY)
    };

    pool.sort_by(|a, b| distance_of(a).total_cmp(&distance_of(b)));
}

fn compare_days(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Walk the ranked list taking as much as each source offers until the need is met.
pub(crate) fn assign_greedy(need: u32, ranked: &[CandidateSource]) -> Vec<AllocationDecision> {
    let mut remaining = need;
    let mut decisions = Vec::new();

    for candidate in ranked {
        if remaining == 0 {
            break;
        }
        let assign = candidate.available_quantity.min(remaining);
        if assign > 0 {
            decisions.push(AllocationDecision {
                source: candidate.source,
                quantity_assigned: assign,
            });
            remaining -= assign;
        }
    }

    decisions
}
