use crate::ipc::error::{bad_params, ok};
use crate::ipc::helpers::{
    matrix_param, metric_param, optional_bool, optional_subjects, rows_param, selection_param,
    test_number_param,
};
use crate::ipc::types::{AppState, Request};
use crate::series::{self, Selection, SubjectSeries};
use crate::snapshot::{build_snapshot, SnapshotOptions};
use crate::subjects::discover_subjects;
use serde_json::json;

fn handle_sort_labels(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("labels").and_then(|v| v.as_array()) else {
        return bad_params(&req.id, "labels must be an array");
    };
    let mut labels: Vec<String> = Vec::with_capacity(raw.len());
    for v in raw {
        match v {
            serde_json::Value::String(s) => labels.push(s.clone()),
            serde_json::Value::Number(n) => labels.push(n.to_string()),
            _ => return bad_params(&req.id, "labels must contain only strings or numbers"),
        }
    }
    ok(&req.id, json!({ "labels": series::sort_test_labels(labels.as_slice()) }))
}

/// Caller-supplied series take precedence over series derived from rows.
fn series_param(req: &Request) -> Result<Option<Vec<SubjectSeries>>, serde_json::Value> {
    let Some(raw) = req.params.get("series") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    serde_json::from_value::<Vec<SubjectSeries>>(raw.clone())
        .map(Some)
        .map_err(|e| bad_params(&req.id, format!("series: {}", e)))
}

fn handle_trends_series(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match req.params.get("rows") {
        Some(_) => match rows_param(req) {
            Ok(v) => v,
            Err(e) => return e,
        },
        None => Vec::new(),
    };
    let supplied = match series_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let metric = match metric_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let matrix = match matrix_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let selection = match selection_param(req) {
        Ok(v) => v.unwrap_or(Selection::Overall),
        Err(e) => return e,
    };
    let synthesize_biology = match optional_bool(req, "synthesizeBiology", false) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut per_subject = match supplied {
        Some(v) => v,
        None => {
            let subjects = match optional_subjects(req) {
                Ok(Some(v)) if !v.is_empty() => v,
                Ok(_) => discover_subjects(&rows, &state.config),
                Err(e) => return e,
            };
            series::subject_series(&rows, &subjects, metric, &state.config)
        }
    };
    if synthesize_biology {
        series::synthesize_biology_series(&mut per_subject, &state.config.biology);
    }

    let aligned = series::align_series(&per_subject, &rows, matrix.as_ref());
    let per_test_average = series::per_test_average(&aligned);
    let averages: Vec<f64> = per_test_average.iter().map(|p| p.value).collect();
    let (highest, lowest) = match series::highest_lowest(&averages) {
        Some((hi, lo)) => (Some(hi), Some(lo)),
        None => (None, None),
    };
    ok(
        &req.id,
        json!({
            "labels": aligned.labels,
            "aligned": aligned.aligned,
            "overall": series::overall_series(&aligned),
            "perTestAverage": per_test_average,
            "perTestSum": series::per_test_sum(&aligned),
            "highest": highest,
            "lowest": lowest,
            "chart": series::build_chart(&aligned, &selection)
        }),
    )
}

fn handle_trends_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match rows_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match optional_subjects(req) {
        Ok(Some(v)) if !v.is_empty() => v,
        Ok(_) => discover_subjects(&rows, &state.config),
        Err(e) => return e,
    };
    let stats = series::per_test_stats(&rows, &subjects, &state.config);
    ok(
        &req.id,
        json!({
            "points": series::percentage_points(&stats),
            "summary": series::summarize_trend(&stats)
        }),
    )
}

fn handle_dashboard_snapshot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match rows_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let test_number = match test_number_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let metric = match metric_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let selection = match selection_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let synthesize_biology = match optional_bool(req, "synthesizeBiology", true) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let opts = SnapshotOptions {
        test_number,
        metric,
        selection,
        synthesize_biology,
    };
    ok(
        &req.id,
        json!({ "snapshot": build_snapshot(&rows, &state.config, &opts) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "trends.sortLabels" => Some(handle_sort_labels(state, req)),
        "trends.series" => Some(handle_trends_series(state, req)),
        "trends.summary" => Some(handle_trends_summary(state, req)),
        "dashboard.snapshot" => Some(handle_dashboard_snapshot(state, req)),
        _ => None,
    }
}
