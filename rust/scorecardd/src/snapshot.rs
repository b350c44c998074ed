use crate::config::EngineConfig;
use crate::metrics::{self, PerTestStat, SubjectStat};
use crate::row::{normalize_row, ResultRow};
use crate::series::{self, AlignedSeries, ChartData, SeriesMetric, Selection, TrendSummary};
use crate::subjects;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    pub test_number: Option<u64>,
    pub metric: SeriesMetric,
    pub selection: Option<Selection>,
    pub synthesize_biology: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub stat: PerTestStat,
    pub subjects: Vec<SubjectStat>,
    pub overall: SubjectStat,
}

/// Everything one dashboard render needs, derived from one batch of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub subjects: Vec<String>,
    pub tests: Vec<TestReport>,
    pub trend: TrendSummary,
    pub series: AlignedSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartData>,
}

pub fn test_report(row: &ResultRow, subjects: &[String], config: &EngineConfig, synthesize_biology: bool) -> TestReport {
    let policy = config.percentage_policy();
    let breakdowns = normalize_row(row, subjects, config);
    let stat = metrics::compute_per_test_stat(&row.test_label(), &breakdowns, policy);
    let overall = metrics::subject_stat(&metrics::overall_breakdown(&breakdowns), policy);
    // Synthesized Biology is display-only; the stat above is computed before it exists.
    let mut shown = breakdowns;
    if synthesize_biology {
        metrics::synthesize_biology_breakdown(&mut shown, &config.biology);
    }
    TestReport {
        stat,
        subjects: metrics::subject_stats(&shown, policy),
        overall,
    }
}

pub fn build_snapshot(rows: &[ResultRow], config: &EngineConfig, opts: &SnapshotOptions) -> Snapshot {
    let filtered;
    let rows = match opts.test_number {
        Some(n) => {
            filtered = series::filter_by_test_number(rows, n);
            filtered.as_slice()
        }
        None => rows,
    };
    let discovered = subjects::discover_subjects(rows, config);
    if rows.is_empty() {
        log::debug!("building snapshot from an empty dataset");
    }

    let tests: Vec<TestReport> = rows
        .iter()
        .map(|r| test_report(r, &discovered, config, opts.synthesize_biology))
        .collect();
    let stats: Vec<PerTestStat> = tests.iter().map(|t| t.stat.clone()).collect();

    let mut per_subject = series::subject_series(rows, &discovered, opts.metric, config);
    if opts.synthesize_biology {
        series::synthesize_biology_series(&mut per_subject, &config.biology);
    }
    let aligned = series::align_series(&per_subject, rows, None);
    let chart = opts
        .selection
        .as_ref()
        .map(|sel| series::build_chart(&aligned, sel));

    let mut shown_subjects = discovered;
    if opts.synthesize_biology
        && aligned.aligned.iter().any(|a| a.subject == config.biology.target)
        && !shown_subjects.contains(&config.biology.target)
    {
        shown_subjects.push(config.biology.target.clone());
        shown_subjects = subjects::order_subjects(shown_subjects, &config.subject_order);
    }

    Snapshot {
        subjects: shown_subjects,
        trend: series::summarize_trend(&stats),
        tests,
        series: aligned,
        chart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn physics_rows() -> Vec<ResultRow> {
        [
            json!({ "Test": "Test1", "Physics__correct": 18, "Physics__incorrect": 2 }),
            json!({ "Test": "Test2", "Physics__correct": 20, "Physics__incorrect": 0 }),
            json!({ "Test": "Test3", "Physics__correct": 15, "Physics__incorrect": 5 }),
        ]
        .iter()
        .map(ResultRow::from_value)
        .collect()
    }

    #[test]
    fn three_physics_tests_end_to_end() {
        let cfg = EngineConfig::default();
        let snap = build_snapshot(&physics_rows(), &cfg, &SnapshotOptions::default());
        assert_eq!(snap.subjects, vec!["Physics"]);
        let pcts: Vec<f64> = snap.tests.iter().map(|t| t.stat.percentage).collect();
        assert_eq!(pcts, vec![87.5, 100.0, 68.75]);
        assert!((snap.trend.improvement - (-31.25)).abs() < 1e-9);
        assert_eq!(snap.trend.improvement_points, -31.0);
        assert_eq!(snap.trend.highest, Some(100.0));
        assert_eq!(snap.trend.lowest, Some(68.75));
        assert_eq!(snap.series.labels, vec!["Test1", "Test2", "Test3"]);
        assert_eq!(snap.series.values_for("Physics"), Some(&[70.0, 80.0, 55.0][..]));
    }

    #[test]
    fn test_number_filter_narrows_the_snapshot() {
        let cfg = EngineConfig::default();
        let opts = SnapshotOptions {
            test_number: Some(2),
            selection: Some(Selection::Overall),
            ..SnapshotOptions::default()
        };
        let snap = build_snapshot(&physics_rows(), &cfg, &opts);
        assert_eq!(snap.tests.len(), 1);
        assert_eq!(snap.tests[0].stat.test_name, "Test2");
        let chart = snap.chart.expect("chart");
        assert_eq!(chart.labels, vec!["Test2"]);
        assert_eq!(chart.datasets[0].data, vec![80.0]);
    }

    #[test]
    fn empty_dataset_snapshot_is_empty() {
        let cfg = EngineConfig::default();
        let snap = build_snapshot(&[], &cfg, &SnapshotOptions::default());
        assert!(snap.subjects.is_empty());
        assert!(snap.tests.is_empty());
        assert!(snap.series.labels.is_empty());
        assert_eq!(snap.trend.average_percentage, 0.0);
    }

    #[test]
    fn biology_is_shown_but_not_double_counted() {
        let cfg = EngineConfig::default();
        let rows: Vec<ResultRow> = [json!({
            "Test": "Test 1",
            "Botany__correct": 10,
            "Zoology__correct": 5,
            "Zoology__incorrect": 5
        })]
        .iter()
        .map(ResultRow::from_value)
        .collect();
        let opts = SnapshotOptions {
            synthesize_biology: true,
            ..SnapshotOptions::default()
        };
        let snap = build_snapshot(&rows, &cfg, &opts);
        assert_eq!(snap.subjects, vec!["Botany", "Zoology", "Biology"]);
        let report = &snap.tests[0];
        assert_eq!(report.stat.total_questions, 20.0);
        assert_eq!(report.stat.total_score, 55.0);
        assert_eq!(report.overall.score, 55.0);
        let bio = report
            .subjects
            .iter()
            .find(|s| s.name == "Biology")
            .expect("biology stat");
        assert_eq!(bio.score, 55.0);
        // Series rollup averages the two source scores: (40 + 15) / 2 rounded.
        assert_eq!(snap.series.values_for("Biology"), Some(&[28.0][..]));
    }

    #[test]
    fn overall_chart_matches_the_test_score_with_biology_shown() {
        let cfg = EngineConfig::default();
        let rows: Vec<ResultRow> = [json!({ "Botany__correct": 10, "Zoology__correct": 10 })]
            .iter()
            .map(ResultRow::from_value)
            .collect();
        let opts = SnapshotOptions {
            selection: Some(Selection::Overall),
            synthesize_biology: true,
            ..SnapshotOptions::default()
        };
        let snap = build_snapshot(&rows, &cfg, &opts);
        assert_eq!(snap.tests[0].stat.total_score, 80.0);
        assert_eq!(snap.series.values_for("Biology"), Some(&[40.0][..]));
        let chart = snap.chart.expect("chart");
        assert_eq!(chart.datasets[0].data, vec![80.0]);
    }

    #[test]
    fn repeated_test_labels_keep_every_row_on_the_axis() {
        let cfg = EngineConfig::default();
        let rows: Vec<ResultRow> = [
            json!({ "Test": "Test 1", "Physics__correct": 10 }),
            json!({ "Test": "Test 1", "Physics__correct": 2 }),
        ]
        .iter()
        .map(ResultRow::from_value)
        .collect();
        let snap = build_snapshot(&rows, &cfg, &SnapshotOptions::default());
        assert_eq!(snap.tests.len(), 2);
        assert_eq!(snap.series.labels.len(), snap.tests.len());
        assert_eq!(snap.series.values_for("Physics"), Some(&[40.0, 8.0][..]));
    }
}
