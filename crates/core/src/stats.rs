//! Derived statistics over a revealed vote set
//!
//! Pure functions; callers guard the empty case. The median is the true
//! statistical median: even-length inputs average the two middle elements.

use serde::{Deserialize, Serialize};

/// Statistics computed over one set of votes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteStatistics {
    pub average: f64,
    pub median: f64,
    pub mode: f64,
    pub min: f64,
    pub max: f64,
    /// Share of votes matching the modal value, 0-100.
    pub consensus_pct: f64,
}

impl VoteStatistics {
    /// Compute statistics over a vote set. Returns `None` when empty.
    pub fn compute(votes: &[f64]) -> Option<Self> {
        if votes.is_empty() {
            return None;
        }
        let mut sorted = votes.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            average: average(votes),
            median: median_sorted(&sorted),
            mode: mode_sorted(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            consensus_pct: consensus_sorted(&sorted),
        })
    }

    /// Whether the modal share reaches the given threshold (percent).
    pub fn has_strong_consensus(&self, threshold_pct: f64) -> bool {
        self.consensus_pct >= threshold_pct
    }
}

/// Arithmetic mean. `votes` must be non-empty.
pub fn average(votes: &[f64]) -> f64 {
    votes.iter().sum::<f64>() / votes.len() as f64
}

/// True statistical median. `votes` must be non-empty.
pub fn median(votes: &[f64]) -> f64 {
    let mut sorted = votes.to_vec();
    sorted.sort_by(f64::total_cmp);
    median_sorted(&sorted)
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Most frequent value; ties resolve to the lowest value.
/// `votes` must be non-empty.
pub fn mode(votes: &[f64]) -> f64 {
    let mut sorted = votes.to_vec();
    sorted.sort_by(f64::total_cmp);
    mode_sorted(&sorted)
}

fn mode_sorted(sorted: &[f64]) -> f64 {
    let mut best = sorted[0];
    let mut best_count = 0usize;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let mut count = 0;
        while i < sorted.len() && sorted[i] == value {
            count += 1;
            i += 1;
        }
        // Strictly greater only: on a tie the earlier (lower) value stays.
        if count > best_count {
            best = value;
            best_count = count;
        }
    }
    best
}

/// Share of votes matching the modal value, as a percentage.
/// `votes` must be non-empty.
pub fn consensus_percentage(votes: &[f64]) -> f64 {
    let mut sorted = votes.to_vec();
    sorted.sort_by(f64::total_cmp);
    consensus_sorted(&sorted)
}

fn consensus_sorted(sorted: &[f64]) -> f64 {
    let modal = mode_sorted(sorted);
    let count = sorted.iter().filter(|v| **v == modal).count();
    count as f64 / sorted.len() as f64 * 100.0
}

/// The member of `scale` closest to `value`.
///
/// Ties resolve to the earlier element of the ascending scale, i.e. the
/// lower value: the scan only overwrites on a strictly smaller difference.
/// `scale` must be non-empty.
pub fn nearest_allowed(value: f64, scale: &[f64]) -> f64 {
    let mut nearest = scale[0];
    let mut best_diff = (scale[0] - value).abs();
    for candidate in &scale[1..] {
        let diff = (candidate - value).abs();
        if diff < best_diff {
            nearest = *candidate;
            best_diff = diff;
        }
    }
    nearest
}
