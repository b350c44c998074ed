use crate::config::{BiologyRule, EngineConfig};
use crate::metrics::{self, PerTestStat, OVERALL};
use crate::row::{normalize_row, ResultRow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// First run of ASCII digits in a label, e.g. `Test 12b` -> `12`.
fn label_digits(label: &str) -> Option<&str> {
    let start = label.find(|c: char| c.is_ascii_digit())?;
    let rest = &label[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Embedded integer of a label; `None` when absent or wider than `u64`.
pub fn label_number(label: &str) -> Option<u64> {
    label_digits(label)?.parse::<u64>().ok()
}

/// Numeric order of two digit runs of any width.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Chronological label order: by embedded integer, numbered labels before the rest.
pub fn compare_test_labels(a: &str, b: &str) -> Ordering {
    match (label_digits(a), label_digits(b)) {
        (Some(x), Some(y)) => compare_digit_runs(x, y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

pub fn sort_test_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut out: Vec<String> = labels.iter().map(|s| s.as_ref().to_string()).collect();
    out.sort_by(|a, b| compare_test_labels(a, b));
    out
}

/// Rows whose test label carries the given number.
pub fn filter_by_test_number(rows: &[ResultRow], number: u64) -> Vec<ResultRow> {
    rows.iter()
        .filter(|r| {
            r.explicit_test_label()
                .and_then(|l| label_number(&l))
                .map(|n| n == number)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    #[serde(default)]
    pub test: String,
    #[serde(alias = "avg", alias = "sum", default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
}

impl TrendPoint {
    pub fn new(test: impl Into<String>, value: f64) -> Self {
        Self {
            test: test.into(),
            value,
            max: None,
            min: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSeries {
    pub subject: String,
    pub points: Vec<TrendPoint>,
    /// Source subjects of a display rollup. Rollups never feed totals.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeriesMetric {
    #[default]
    Score,
    Percentage,
    Correct,
    Incorrect,
    Unattended,
}

impl SeriesMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "score" => Some(Self::Score),
            "percentage" => Some(Self::Percentage),
            "correct" => Some(Self::Correct),
            "incorrect" => Some(Self::Incorrect),
            "unattended" => Some(Self::Unattended),
            _ => None,
        }
    }
}

/// One named series per subject, one point per row in the order supplied.
pub fn subject_series(
    rows: &[ResultRow],
    subjects: &[String],
    metric: SeriesMetric,
    config: &EngineConfig,
) -> Vec<SubjectSeries> {
    let policy = config.percentage_policy();
    let mut out: Vec<SubjectSeries> = subjects
        .iter()
        .map(|s| SubjectSeries {
            subject: s.clone(),
            points: Vec::with_capacity(rows.len()),
            derived_from: Vec::new(),
        })
        .collect();
    for row in rows {
        let label = row.test_label();
        let breakdowns = normalize_row(row, subjects, config);
        for series in out.iter_mut() {
            let value = breakdowns
                .iter()
                .find(|b| b.name == series.subject)
                .map(|b| {
                    let stat = metrics::subject_stat(b, policy);
                    match metric {
                        SeriesMetric::Score => stat.score,
                        SeriesMetric::Percentage => stat.percentage,
                        SeriesMetric::Correct => stat.correct,
                        SeriesMetric::Incorrect => stat.incorrect,
                        SeriesMetric::Unattended => stat.unattended,
                    }
                })
                .unwrap_or(0.0);
            series.points.push(TrendPoint::new(label.clone(), value));
        }
    }
    out
}

/// Dense per-label values indexed by subject position.
pub type PerTestMatrix = HashMap<String, Vec<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedSubject {
    pub subject: String,
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub derived_from: Vec<String>,
}

impl AlignedSubject {
    pub fn is_rollup(&self) -> bool {
        !self.derived_from.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedSeries {
    pub labels: Vec<String>,
    pub aligned: Vec<AlignedSubject>,
}

impl AlignedSeries {
    pub fn values_for(&self, subject: &str) -> Option<&[f64]> {
        self.aligned
            .iter()
            .find(|a| a.subject == subject)
            .map(|a| a.values.as_slice())
    }

    /// Subjects that count towards totals.
    fn reported(&self) -> impl Iterator<Item = &AlignedSubject> {
        self.aligned.iter().filter(|a| !a.is_rollup())
    }
}

/// One label per row when any row is labelled; otherwise the longest series names the axis.
fn master_labels(series: &[SubjectSeries], rows: &[ResultRow]) -> Vec<String> {
    if rows.iter().any(|r| r.explicit_test_label().is_some()) {
        return rows.iter().map(|r| r.test_label()).collect();
    }

    let longest_len = series.iter().map(|s| s.points.len()).max().unwrap_or(0);
    let Some(longest) = series.iter().find(|s| s.points.len() == longest_len) else {
        return Vec::new();
    };
    let own: Vec<&str> = longest.points.iter().map(|p| p.test.trim()).collect();
    let mut labels: Vec<String> = Vec::with_capacity(longest_len);
    for (i, name) in own.iter().enumerate() {
        let label = if !name.is_empty() {
            name.to_string()
        } else {
            // Unnamed slot: borrow a name from another series at the same index
            // unless the longest series already places it elsewhere.
            series
                .iter()
                .filter_map(|s| s.points.get(i))
                .map(|p| p.test.trim())
                .find(|t| !t.is_empty() && !own.contains(t) && !labels.iter().any(|l| l == t))
                .map(|t| t.to_string())
                .unwrap_or_else(|| format!("Test {}", i + 1))
        };
        labels.push(label);
    }
    labels
}

fn matrix_value(matrix: Option<&PerTestMatrix>, label: &str, subject_index: usize) -> Option<f64> {
    matrix
        .and_then(|m| m.get(label))
        .and_then(|vals| vals.get(subject_index))
        .copied()
        .filter(|v| v.is_finite())
}

/// Value of one series at one label, or `None` when nothing supplies it.
fn series_value(series: &SubjectSeries, label_index: usize, label: &str) -> Option<f64> {
    // Positional points only count when they are unnamed or carry this label.
    if let Some(p) = series
        .points
        .get(label_index)
        .filter(|p| p.test.trim().is_empty() || p.test.trim() == label)
    {
        return Some(p.value);
    }
    series
        .points
        .iter()
        .find(|p| p.test.trim() == label)
        .map(|p| p.value)
}

/// Aligns every subject's series onto one ordered label axis.
///
/// Rollup series are recomputed from their sources' aligned values, so matrix
/// values supplied for a source carry into the rollup.
pub fn align_series(
    series: &[SubjectSeries],
    rows: &[ResultRow],
    matrix: Option<&PerTestMatrix>,
) -> AlignedSeries {
    let labels = master_labels(series, rows);
    let resolved: Vec<Vec<Option<f64>>> = series
        .iter()
        .enumerate()
        .map(|(si, s)| {
            labels
                .iter()
                .enumerate()
                .map(|(li, label)| {
                    matrix_value(matrix, label, si).or_else(|| series_value(s, li, label))
                })
                .collect()
        })
        .collect();

    let source_values = |name: &str, li: usize| -> Option<f64> {
        series
            .iter()
            .position(|s| s.subject == name && s.derived_from.is_empty())
            .and_then(|i| resolved[i][li])
    };

    let aligned = series
        .iter()
        .enumerate()
        .map(|(si, s)| {
            let values = labels
                .iter()
                .enumerate()
                .map(|(li, label)| {
                    if s.derived_from.is_empty() {
                        return resolved[si][li].unwrap_or(0.0);
                    }
                    if let Some(v) = matrix_value(matrix, label, si) {
                        return v;
                    }
                    let present: Vec<f64> = s
                        .derived_from
                        .iter()
                        .filter_map(|src| source_values(src, li))
                        .collect();
                    if present.is_empty() {
                        resolved[si][li].unwrap_or(0.0)
                    } else {
                        round_half_up(mean(&present))
                    }
                })
                .collect();
            AlignedSubject {
                subject: s.subject.clone(),
                values,
                derived_from: s.derived_from.clone(),
            }
        })
        .collect();
    AlignedSeries { labels, aligned }
}

/// Per-index sum across reported subjects; rollups are left out.
pub fn overall_series(aligned: &AlignedSeries) -> Vec<f64> {
    (0..aligned.labels.len())
        .map(|i| {
            aligned
                .reported()
                .filter_map(|a| a.values.get(i))
                .sum::<f64>()
        })
        .collect()
}

/// Per-index mean across reported subjects.
pub fn per_test_average(aligned: &AlignedSeries) -> Vec<TrendPoint> {
    let count = aligned.reported().count();
    overall_series(aligned)
        .into_iter()
        .zip(aligned.labels.iter())
        .map(|(sum, label)| {
            let avg = if count > 0 { sum / count as f64 } else { 0.0 };
            TrendPoint::new(label.clone(), avg)
        })
        .collect()
}

pub fn per_test_sum(aligned: &AlignedSeries) -> Vec<TrendPoint> {
    overall_series(aligned)
        .into_iter()
        .zip(aligned.labels.iter())
        .map(|(sum, label)| TrendPoint::new(label.clone(), sum))
        .collect()
}

/// Rounds halves towards positive infinity, so `-2.5` becomes `-2`.
pub fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

pub fn mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        0.0
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    }
}

/// Flat reference line at the mean of the whole series.
pub fn average_line(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    vec![mean(values); values.len()]
}

pub fn highest_lowest(values: &[f64]) -> Option<(f64, f64)> {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    let first = finite.next()?;
    Some(finite.fold((first, first), |(hi, lo), v| (hi.max(v), lo.min(v))))
}

/// Relative change in percent; falls back to the plain difference when `prev` is not positive.
pub fn relative_improvement(prev: f64, last: f64) -> f64 {
    if prev > 0.0 {
        (last - prev) / prev * 100.0
    } else {
        last - prev
    }
}

/// Absolute change in percentage points, rounded.
pub fn point_improvement(prev: f64, last: f64) -> f64 {
    round_half_up(last - prev)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Up
        } else if delta < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub test_count: usize,
    pub average_percentage: f64,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub latest: Option<f64>,
    /// Relative change between the two most recent tests.
    pub improvement: f64,
    /// Rounded percentage-point change between the two most recent tests.
    pub improvement_points: f64,
    pub direction: Direction,
}

pub fn summarize_trend(stats: &[PerTestStat]) -> TrendSummary {
    let pcts: Vec<f64> = stats.iter().map(|s| s.percentage).collect();
    let hl = highest_lowest(&pcts);
    let (improvement, improvement_points) = match pcts.as_slice() {
        [.., prev, last] => (
            relative_improvement(*prev, *last),
            point_improvement(*prev, *last),
        ),
        _ => (0.0, 0.0),
    };
    TrendSummary {
        test_count: stats.len(),
        average_percentage: mean(&pcts),
        highest: hl.map(|(hi, _)| hi),
        lowest: hl.map(|(_, lo)| lo),
        latest: pcts.last().copied(),
        improvement,
        improvement_points,
        direction: Direction::of(improvement),
    }
}

/// Adds a target series built from both source series when the target is missing.
/// Per label: `value` is the rounded mean of the present values, `max`/`min` the extremes.
pub fn synthesize_biology_series(series: &mut Vec<SubjectSeries>, rule: &BiologyRule) -> bool {
    if series.iter().any(|s| s.subject == rule.target) {
        return false;
    }
    let [a, b] = &rule.sources;
    let (Some(first), Some(second)) = (
        series.iter().find(|s| &s.subject == a),
        series.iter().find(|s| &s.subject == b),
    ) else {
        return false;
    };

    let mut labels: Vec<String> = Vec::new();
    for p in first.points.iter().chain(second.points.iter()) {
        if !labels.contains(&p.test) {
            labels.push(p.test.clone());
        }
    }
    labels.sort_by(|x, y| compare_test_labels(x, y));

    let points = labels
        .into_iter()
        .map(|label| {
            let found: Vec<&TrendPoint> = [first, second]
                .into_iter()
                .filter_map(|s| s.points.iter().find(|p| p.test == label))
                .collect();
            let avg = round_half_up(mean(&found.iter().map(|p| p.value).collect::<Vec<_>>()));
            let highs: Vec<f64> = found.iter().map(|p| p.max.unwrap_or(p.value)).collect();
            let lows: Vec<f64> = found.iter().map(|p| p.min.unwrap_or(p.value)).collect();
            TrendPoint {
                test: label,
                value: avg,
                max: highest_lowest(&highs).map(|(hi, _)| hi),
                min: highest_lowest(&lows).map(|(_, lo)| lo),
            }
        })
        .collect();
    series.push(SubjectSeries {
        subject: rule.target.clone(),
        points,
        derived_from: rule.sources.to_vec(),
    });
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Overall,
    Subject(String),
}

impl Selection {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case(OVERALL) {
            Selection::Overall
        } else {
            Selection::Subject(s.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Selection::Overall => OVERALL,
            Selection::Subject(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Chart payload for one selection plus its dashed average line.
pub fn build_chart(aligned: &AlignedSeries, selection: &Selection) -> ChartData {
    let values = match selection {
        Selection::Overall => overall_series(aligned),
        Selection::Subject(name) => aligned
            .values_for(name)
            .map(|v| v.to_vec())
            .unwrap_or_else(|| vec![0.0; aligned.labels.len()]),
    };
    let reference = average_line(&values);
    ChartData {
        labels: aligned.labels.clone(),
        datasets: vec![
            Dataset {
                label: selection.label().to_string(),
                data: values,
                dashed: false,
            },
            Dataset {
                label: "Average".to_string(),
                data: reference,
                dashed: true,
            },
        ],
    }
}

pub fn percentage_points(stats: &[PerTestStat]) -> Vec<TrendPoint> {
    stats
        .iter()
        .map(|s| TrendPoint::new(s.test_name.clone(), s.percentage))
        .collect()
}

/// Per-test stats in row order.
pub fn per_test_stats(rows: &[ResultRow], subjects: &[String], config: &EngineConfig) -> Vec<PerTestStat> {
    let policy = config.percentage_policy();
    rows.iter()
        .map(|r| {
            let breakdowns = normalize_row(r, subjects, config);
            metrics::compute_per_test_stat(&r.test_label(), &breakdowns, policy)
        })
        .collect()
}
