// Per-chart series state: cursor, bounded point buffer, and the merge step.
// A fetch result is partitioned by status code into named sub-series before merging.

use std::collections::VecDeque;

use serde::Serialize;

use crate::models::{QueryResponse, RangeSample, SeriesPoint};

/// Maps status codes onto a named sub-series (e.g. "200" -> "ok").
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, Serialize)]
pub struct SeriesCodes {
    pub name: String,
    pub codes: Vec<String>,
}

impl SeriesCodes {
    pub fn new<I, C>(name: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            name: name.into(),
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }
}

/// `ok` <- 200, `error` <- 500.
pub fn default_series_codes() -> Vec<SeriesCodes> {
    vec![
        SeriesCodes::new("ok", ["200"]),
        SeriesCodes::new("error", ["500"]),
    ]
}

/// One fetch, partitioned into named sub-series. Sub-series with no mapped entry are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    sub_series: Vec<(String, Vec<SeriesPoint>)>,
}

impl FetchResult {
    pub fn with(mut self, name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        let name = name.into();
        match self.sub_series.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.extend(points),
            None => self.sub_series.push((name, points)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&[SeriesPoint]> {
        self.sub_series
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.sub_series.iter().all(|(_, p)| p.is_empty())
    }
}

/// Splits a `query_range` response by `metric.code`. Unmapped codes are ignored; a malformed
/// entry only loses its own points.
pub fn partition_by_code(response: &QueryResponse, codes: &[SeriesCodes]) -> FetchResult {
    let mut result = FetchResult::default();
    for entry in response.entries() {
        let sample: RangeSample = match serde_json::from_value(entry.clone()) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(error = %e, operation = "partition_by_code", "malformed result entry");
                continue;
            }
        };
        let Some(code) = sample.metric.get("code") else {
            continue;
        };
        let Some(target) = codes.iter().find(|c| c.codes.iter().any(|c| c == code)) else {
            continue;
        };
        let points: Vec<SeriesPoint> = sample
            .values
            .iter()
            .filter_map(|(ts, v)| SeriesPoint::from_wire(*ts, v))
            .collect();
        result = result.with(target.name.clone(), points);
    }
    result
}

/// Cursor plus the points newer than `cursor - retention_secs`, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesBuffer {
    cursor: i64,
    retention_secs: i64,
    points: VecDeque<SeriesPoint>,
}

impl SeriesBuffer {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            cursor: 0,
            retention_secs: retention_secs as i64,
            points: VecDeque::new(),
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn points(&self) -> &VecDeque<SeriesPoint> {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends the points strictly newer than the cursor and returns how many were taken.
    /// Older-or-equal points are retransmits and are dropped silently.
    pub fn merge(&mut self, incoming: &[SeriesPoint]) -> usize {
        let mut fresh: Vec<SeriesPoint> = incoming
            .iter()
            .filter(|p| p.timestamp > self.cursor)
            .copied()
            .collect();
        if fresh.is_empty() {
            return 0;
        }
        // stable sort: the first point seen for a timestamp wins
        fresh.sort_by_key(|p| p.timestamp);
        fresh.dedup_by_key(|p| p.timestamp);

        let accepted = fresh.len();
        self.cursor = fresh[accepted - 1].timestamp;
        self.points.extend(fresh);
        self.trim();
        accepted
    }

    /// Moves the cursor forward to `ts`; never moves it back.
    pub fn seed_cursor(&mut self, ts: i64) {
        if ts > self.cursor {
            self.cursor = ts;
            self.trim();
        }
    }

    fn trim(&mut self) {
        let oldest_kept = self.cursor - self.retention_secs;
        while self
            .points
            .front()
            .is_some_and(|p| p.timestamp <= oldest_kept)
        {
            self.points.pop_front();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub name: String,
    #[serde(flatten)]
    pub buffer: SeriesBuffer,
}

/// All sub-series of one chart subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    series: Vec<NamedSeries>,
}

impl ChartSeries {
    pub fn new(codes: &[SeriesCodes], retention_secs: u64) -> Self {
        Self {
            series: codes
                .iter()
                .map(|c| NamedSeries {
                    name: c.name.clone(),
                    buffer: SeriesBuffer::new(retention_secs),
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SeriesBuffer> {
        self.series
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.buffer)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedSeries> {
        self.series.iter()
    }

    pub fn total_points(&self) -> usize {
        self.series.iter().map(|s| s.buffer.len()).sum()
    }

    /// Merges every sub-series present in `result`; absent or empty sub-series keep their history.
    pub fn merge(&mut self, result: &FetchResult) -> usize {
        self.series
            .iter_mut()
            .map(|s| match result.get(&s.name) {
                Some(points) if !points.is_empty() => s.buffer.merge(points),
                _ => 0,
            })
            .sum()
    }

    pub fn seed_cursor(&mut self, ts: i64) {
        for s in &mut self.series {
            s.buffer.seed_cursor(ts);
        }
    }
}
