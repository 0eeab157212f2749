// Label selectors and the PromQL fragments built from them.
// Values are interpolated verbatim: callers must pass values already safe for PromQL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Right-hand side of a selector clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorValue {
    Exact(String),
    AnyOf(Vec<String>),
}

/// Ordered label key -> value mapping. Clause order follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "BTreeMap<String, SelectorValue>")]
pub struct Selector {
    clauses: Vec<(String, SelectorValue)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(key, SelectorValue::Exact(value.into()))
    }

    pub fn any_of<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.with(
            key,
            SelectorValue::AnyOf(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Re-inserting a key replaces its value and keeps its position.
    pub fn with(mut self, key: impl Into<String>, value: SelectorValue) -> Self {
        let key = key.into();
        match self.clauses.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.clauses.push((key, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> impl Iterator<Item = (&str, &SelectorValue)> {
        self.clauses.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// JSON objects carry no reliable key order, so selectors read from JSON are key-sorted.
impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, SelectorValue>::deserialize(deserializer)?;
        Ok(Self {
            clauses: map.into_iter().collect(),
        })
    }
}

impl From<Selector> for BTreeMap<String, SelectorValue> {
    fn from(selector: Selector) -> Self {
        selector.clauses.into_iter().collect()
    }
}

/// `key="v"` for exact values, `key=~"a|b"` for alternations, joined by commas.
pub fn build_match_expression(selector: &Selector) -> String {
    selector
        .clauses()
        .map(|(key, value)| match value {
            SelectorValue::Exact(v) => format!("{key}=\"{v}\""),
            SelectorValue::AnyOf(vs) => format!("{key}=~\"{}\"", vs.join("|")),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// `sum(rate(<metric>{<match>}[<interval>s])) by (<by>)`
pub fn rate_query(metric: &str, selector: &Selector, interval_secs: u64, by: &str) -> String {
    format!(
        "sum(rate({metric}{{{}}}[{interval_secs}s])) by ({by})",
        build_match_expression(selector)
    )
}

/// A fully specified `query_range` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub query: String,
    pub step_secs: u64,
    pub start: i64,
    pub end: i64,
}

impl RangeQuery {
    /// Per-code request rate for `selector` over `[start, end]`, stepped at the poll interval.
    pub fn code_rates(
        metric: &str,
        selector: &Selector,
        interval_secs: u64,
        start: i64,
        end: i64,
    ) -> Self {
        Self {
            query: rate_query(metric, selector, interval_secs, "code"),
            step_secs: interval_secs,
            start,
            end,
        }
    }

    /// Query-string parameters in wire order.
    pub fn params(&self) -> [(&'static str, String); 4] {
        [
            ("query", self.query.clone()),
            ("step", format!("{}s", self.step_secs)),
            ("start", self.start.to_string()),
            ("end", self.end.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_alternation_clauses_in_insertion_order() {
        let sel = Selector::new().exact("env", "prod").any_of("name", ["a", "b"]);
        assert_eq!(build_match_expression(&sel), r#"env="prod",name=~"a|b""#);
    }

    #[test]
    fn empty_selector_builds_empty_expression() {
        assert_eq!(build_match_expression(&Selector::new()), "");
    }

    #[test]
    fn reinserted_key_keeps_position() {
        let sel = Selector::new()
            .exact("a", "1")
            .exact("b", "2")
            .any_of("a", ["x", "y"]);
        assert_eq!(build_match_expression(&sel), r#"a=~"x|y",b="2""#);
    }

    #[test]
    fn values_are_not_escaped() {
        let sel = Selector::new().exact("path", "/api/\"v1\"");
        assert_eq!(build_match_expression(&sel), r#"path="/api/"v1"""#);
    }

    #[test]
    fn range_query_uses_interval_for_window_and_step() {
        let sel = Selector::new().exact("individual", "web-1");
        let q = RangeQuery::code_rates("flux_http_total", &sel, 15, 700, 1000);
        assert_eq!(
            q.query,
            r#"sum(rate(flux_http_total{individual="web-1"}[15s])) by (code)"#
        );
        let params = q.params();
        assert_eq!(params[1], ("step", "15s".to_string()));
        assert_eq!(params[2], ("start", "700".to_string()));
        assert_eq!(params[3], ("end", "1000".to_string()));
    }

    #[test]
    fn selector_from_json_is_key_sorted() {
        let sel: Selector =
            serde_json::from_str(r#"{"name":["a","b"],"env":"prod"}"#).unwrap();
        assert_eq!(build_match_expression(&sel), r#"env="prod",name=~"a|b""#);
    }
}
