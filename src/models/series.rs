use serde::{Deserialize, Serialize};

/// One sample of a chart series: unix seconds and a finite value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Parse a `[<unixSecs>, "<float>"]` pair as returned by the metrics store.
    /// Non-finite values ("NaN", "+Inf") are rejected.
    pub fn from_wire(ts: f64, value: &str) -> Option<Self> {
        if !ts.is_finite() {
            return None;
        }
        let value: f64 = value.parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        Some(Self {
            timestamp: ts.round() as i64,
            value,
        })
    }
}
