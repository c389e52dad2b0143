//! Client-side interpretation of decrypted circuit outputs

use crate::telemetry::{
    DAY_OF_WEEK_OFFSET, DAY_OF_YEAR_OFFSET, ELEVATION_GAIN_LANE, WEEK_OF_YEAR_OFFSET, YEAR_OFFSET,
};
use serde::Serialize;

/// Lanes below this are treated as unset when reading one-hot blocks
const LANE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Seconds between first and last sample
    pub total_time_sec: f64,
    /// Sum of per-sample step lengths
    pub total_distance: f64,
    /// Sum of squared step lengths as computed under encryption
    pub squared_distance_total: Option<f64>,
    /// Seconds per distance unit
    pub average_pace: Option<f64>,
    pub movement_score: f64,
    /// Logistic of the movement score
    pub movement_probability: f64,
    pub year: Option<u32>,
    pub day_of_year: Option<u32>,
    pub elevation_gain: f64,
}

impl RunReport {
    /// Build a report from the decrypted `stats`, `summary` and movement-score vectors
    pub fn from_decrypted(stats: &[f64], summary: &[f64], ml_score: &[f64]) -> Self {
        let half = stats.len() / 2;
        let total_time_sec = half
            .checked_sub(1)
            .and_then(|i| stats.get(i))
            .copied()
            .unwrap_or_default();
        let total_distance: f64 = stats
            .iter()
            .take(half.saturating_sub(1))
            .map(|d2| d2.abs().sqrt())
            .sum();

        let year_lane = first_set(summary, YEAR_OFFSET, 100);
        let duration_lane = year_lane.map(|lane| summary[lane]);
        let elevation_gain = match (duration_lane, summary.get(ELEVATION_GAIN_LANE)) {
            (Some(weight), Some(gain)) if weight.abs() > f64::EPSILON => gain / weight,
            _ => 0.0,
        };
        let squared_distance_total = year_lane.and_then(|lane| summary.get(half + lane).copied());

        let movement_score = ml_score.first().copied().unwrap_or_default();

        Self {
            total_time_sec,
            total_distance,
            squared_distance_total,
            average_pace: (total_distance > 0.0).then(|| total_time_sec / total_distance),
            movement_score,
            movement_probability: 1.0 / (1.0 + (-movement_score).exp()),
            year: year_lane.map(|lane| 2000 + (lane - YEAR_OFFSET) as u32),
            day_of_year: first_set(summary, DAY_OF_YEAR_OFFSET, 366)
                .map(|lane| (lane - DAY_OF_YEAR_OFFSET) as u32 + 1),
            elevation_gain,
        }
    }
}

/// Per-calendar-bucket totals read from a summary, possibly the sum of many runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryBreakdown {
    /// `(duration, squared distance)` per weekday, Sunday first
    pub by_day_of_week: Vec<(f64, f64)>,
    /// `(duration, squared distance)` per week, week 1 first
    pub by_week_of_year: Vec<(f64, f64)>,
}

impl SummaryBreakdown {
    pub fn from_decrypted(summary: &[f64]) -> Self {
        let half = summary.len() / 2;
        let bucket = |offset: usize, count: usize| {
            (offset..offset + count)
                .map(|lane| {
                    (
                        summary.get(lane).copied().unwrap_or_default(),
                        summary.get(half + lane).copied().unwrap_or_default(),
                    )
                })
                .collect()
        };
        Self {
            by_day_of_week: bucket(DAY_OF_WEEK_OFFSET, 7),
            by_week_of_year: bucket(WEEK_OF_YEAR_OFFSET, 53),
        }
    }
}

fn first_set(values: &[f64], offset: usize, count: usize) -> Option<usize> {
    (offset..offset + count).find(|lane| values.get(*lane).is_some_and(|v| *v > LANE_THRESHOLD))
}
