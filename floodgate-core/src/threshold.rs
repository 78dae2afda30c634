//! Threshold grammar
//!
//! A threshold attaches one or more conditions to a metric, for example
//! `http_req_failed: ["rate<0.01"]` or `http_req_duration: ["p(95) < 500", "avg<200"]`. They are
//! evaluated once, over the aggregate of the whole run.
use crate::ThresholdError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Share of transactions which returned an error.
    HttpReqFailed,
    /// Transaction durations, in milliseconds.
    HttpReqDuration,
    HttpReqs,
    Iterations,
    /// Share of passing checks.
    Checks,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Rate,
    Counter,
    Trend,
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::HttpReqFailed | Metric::Checks => MetricKind::Rate,
            Metric::HttpReqs | Metric::Iterations => MetricKind::Counter,
            Metric::HttpReqDuration => MetricKind::Trend,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::HttpReqFailed => "http_req_failed",
            Metric::HttpReqDuration => "http_req_duration",
            Metric::HttpReqs => "http_reqs",
            Metric::Iterations => "iterations",
            Metric::Checks => "checks",
        }
    }

    pub fn supports(&self, aggregation: Aggregation) -> bool {
        use Aggregation::*;
        match (self.kind(), aggregation) {
            (MetricKind::Rate, Rate) => true,
            (MetricKind::Counter, Count | Rate) => true,
            (MetricKind::Trend, Avg | Min | Max | Med | Percentile(_)) => true,
            _ => false,
        }
    }
}

impl FromStr for Metric {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "http_req_failed" => Ok(Metric::HttpReqFailed),
            "http_req_duration" => Ok(Metric::HttpReqDuration),
            "http_reqs" => Ok(Metric::HttpReqs),
            "iterations" => Ok(Metric::Iterations),
            "checks" => Ok(Metric::Checks),
            other => Err(ThresholdError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Aggregation {
    Rate,
    Count,
    Avg,
    Min,
    Max,
    Med,
    /// Percentile in the range `0..=100`
    Percentile(f64),
}

impl FromStr for Aggregation {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| ThresholdError::UnknownAggregation(s.to_string()))?;
                let pct: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| ThresholdError::InvalidPercentile(inner.to_string()))?;
                if !(0. ..=100.).contains(&pct) {
                    return Err(ThresholdError::InvalidPercentile(inner.to_string()));
                }
                Ok(Aggregation::Percentile(pct))
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // Two-character operators first so that `<=` is not read as `<`.
    const TOKENS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
        }
    }

    fn token(&self) -> &'static str {
        Self::TOKENS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(token, _)| *token)
            .unwrap_or("?")
    }
}

/// A single `<aggregation><op><value>` condition, e.g. `rate<0.01`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Condition {
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub value: f64,
}

impl Condition {
    pub fn passes(&self, observed: f64) -> bool {
        self.comparison.apply(observed, self.value)
    }
}

impl FromStr for Condition {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (idx, token, comparison) = Comparison::TOKENS
            .iter()
            .filter_map(|(token, op)| s.find(token).map(|idx| (idx, *token, *op)))
            // Leftmost match wins; on a tie the longer token is listed first.
            .min_by_key(|(idx, _, _)| *idx)
            .ok_or_else(|| ThresholdError::MissingOperator(s.to_string()))?;

        let aggregation: Aggregation = s[..idx].parse()?;
        let raw_value = s[idx + token.len()..].trim();
        let value: f64 = raw_value
            .parse()
            .map_err(|_| ThresholdError::InvalidValue(raw_value.to_string()))?;

        Ok(Condition {
            aggregation,
            comparison,
            value,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.aggregation,
            self.comparison.token(),
            self.value
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub conditions: Vec<Condition>,
}

impl Threshold {
    /// Build a threshold from a metric name and its condition strings.
    ///
    /// ```
    /// use floodgate_core::{Metric, Threshold};
    ///
    /// let threshold = Threshold::parse("http_req_failed", &["rate<0.01"]).unwrap();
    /// assert_eq!(threshold.metric, Metric::HttpReqFailed);
    /// ```
    pub fn parse<S: AsRef<str>>(metric: &str, conditions: &[S]) -> Result<Self, ThresholdError> {
        let metric: Metric = metric.parse()?;
        let conditions = conditions
            .iter()
            .map(|c| c.as_ref().parse())
            .collect::<Result<Vec<Condition>, _>>()?;

        Self::new(metric, conditions)
    }

    /// Build a threshold, rejecting aggregations the metric does not provide (`avg` of a rate,
    /// `p(95)` of a counter).
    pub fn new(metric: Metric, conditions: Vec<Condition>) -> Result<Self, ThresholdError> {
        if let Some(condition) = conditions.iter().find(|c| !metric.supports(c.aggregation)) {
            return Err(ThresholdError::Unsupported {
                metric: metric.to_string(),
                aggregation: condition.aggregation.to_string(),
            });
        }

        Ok(Threshold { metric, conditions })
    }

    /// The first condition whose aggregation `metric` does not provide, if any.
    pub fn unsupported(&self) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| !self.metric.supports(c.aggregation))
    }
}

/// Ordered set of thresholds, (de)serialized as `{ "metric": ["condition", ...] }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct Thresholds(Vec<Threshold>);

impl Thresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, threshold: Threshold) {
        self.0.push(threshold);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for Thresholds {
    type Error = ThresholdError;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        map.iter()
            .map(|(metric, conditions)| Threshold::parse(metric, conditions.as_slice()))
            .collect::<Result<Vec<_>, _>>()
            .map(Thresholds)
    }
}

impl From<Thresholds> for BTreeMap<String, Vec<String>> {
    fn from(thresholds: Thresholds) -> Self {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for threshold in thresholds.0 {
            map.entry(threshold.metric.to_string())
                .or_default()
                .extend(threshold.conditions.iter().map(Condition::to_string));
        }
        map
    }
}

impl FromIterator<Threshold> for Thresholds {
    fn from_iter<I: IntoIterator<Item = Threshold>>(iter: I) -> Self {
        Thresholds(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rate_condition() {
        let condition: Condition = "rate<0.01".parse().unwrap();
        assert_eq!(condition.aggregation, Aggregation::Rate);
        assert_eq!(condition.comparison, Comparison::Lt);
        assert_eq!(condition.value, 0.01);
    }

    #[test]
    fn parses_percentile_with_whitespace() {
        let condition: Condition = " p(99.9) >= 250 ".parse().unwrap();
        assert_eq!(condition.aggregation, Aggregation::Percentile(99.9));
        assert_eq!(condition.comparison, Comparison::Ge);
        assert_eq!(condition.value, 250.);
    }

    #[test]
    fn two_char_operators_take_precedence() {
        let condition: Condition = "count<=10".parse().unwrap();
        assert_eq!(condition.comparison, Comparison::Le);
        assert_eq!(condition.value, 10.);
    }

    #[test]
    fn rejects_malformed_conditions() {
        assert_eq!(
            "rate0.01".parse::<Condition>(),
            Err(ThresholdError::MissingOperator("rate0.01".to_string()))
        );
        assert_eq!(
            "rate<abc".parse::<Condition>(),
            Err(ThresholdError::InvalidValue("abc".to_string()))
        );
        assert_eq!(
            "p(101)<5".parse::<Condition>(),
            Err(ThresholdError::InvalidPercentile("101".to_string()))
        );
        assert_eq!(
            "mean<5".parse::<Condition>(),
            Err(ThresholdError::UnknownAggregation("mean".to_string()))
        );
    }

    #[test]
    fn rejects_unsupported_aggregation() {
        let err = Threshold::parse("http_req_failed", &["avg<3"]).unwrap_err();
        assert!(matches!(err, ThresholdError::Unsupported { .. }));

        let err = Threshold::parse("bogus_metric", &["rate<3"]).unwrap_err();
        assert_eq!(err, ThresholdError::UnknownMetric("bogus_metric".to_string()));

        let err = Threshold::new(Metric::HttpReqs, vec!["p(95)<3".parse().unwrap()]).unwrap_err();
        assert_eq!(
            err,
            ThresholdError::Unsupported {
                metric: "http_reqs".to_string(),
                aggregation: "p(95)".to_string(),
            }
        );

        let literal = Threshold {
            metric: Metric::Checks,
            conditions: vec!["rate>0.9".parse().unwrap(), "max<3".parse().unwrap()],
        };
        assert_eq!(literal.unsupported().map(|c| c.to_string()), Some("max<3".to_string()));
    }

    #[test]
    fn comparison_semantics() {
        let condition: Condition = "rate<0.01".parse().unwrap();
        assert!(condition.passes(0.));
        assert!(condition.passes(0.0099));
        assert!(!condition.passes(0.01));
        assert!(!condition.passes(0.5));
    }

    #[test]
    fn thresholds_from_map() {
        let json = r#"{
            "http_req_failed": ["rate<0.01"],
            "http_req_duration": ["p(95)<500", "avg<200"]
        }"#;
        let thresholds: Thresholds = serde_json::from_str(json).unwrap();
        assert_eq!(thresholds.len(), 2);

        let duration = thresholds
            .iter()
            .find(|t| t.metric == Metric::HttpReqDuration)
            .unwrap();
        assert_eq!(duration.conditions.len(), 2);
    }

    #[test]
    fn thresholds_reject_bad_map() {
        let json = r#"{ "http_req_failed": ["avg<0.01"] }"#;
        assert!(serde_json::from_str::<Thresholds>(json).is_err());
    }

    #[test]
    fn condition_display_is_parseable() {
        let condition: Condition = "p(95)<500".parse().unwrap();
        assert_eq!(condition.to_string(), "p(95)<500");
        assert_eq!(condition.to_string().parse::<Condition>().unwrap(), condition);
    }
}
