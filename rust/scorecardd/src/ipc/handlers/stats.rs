use crate::ipc::error::{bad_params, ok};
use crate::ipc::helpers::{optional_bool, optional_str, optional_subjects, rows_param};
use crate::ipc::types::{AppState, Request};
use crate::metrics::{score_totals, BiologyView};
use crate::snapshot::test_report;
use crate::subjects::discover_subjects;
use serde_json::json;

fn handle_stats_per_test(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match rows_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match optional_subjects(req) {
        Ok(Some(v)) if !v.is_empty() => v,
        Ok(_) => discover_subjects(&rows, &state.config),
        Err(e) => return e,
    };
    let synthesize_biology = match optional_bool(req, "synthesizeBiology", false) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let reports = rows
        .iter()
        .map(|r| test_report(r, &subjects, &state.config, synthesize_biology))
        .collect::<Vec<_>>();
    ok(
        &req.id,
        json!({
            "subjects": subjects,
            "tests": reports
        }),
    )
}

fn handle_stats_score_totals(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match rows_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let view = match optional_str(req, "biologyView") {
        Ok(None) => BiologyView::default(),
        Ok(Some(s)) => match BiologyView::parse(&s.to_ascii_lowercase()) {
            Some(v) => v,
            None => return bad_params(&req.id, "biologyView must be one of: unified, split"),
        },
        Err(e) => return e,
    };
    ok(&req.id, json!({ "totals": score_totals(&rows, view) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.perTest" => Some(handle_stats_per_test(state, req)),
        "stats.scoreTotals" => Some(handle_stats_score_totals(state, req)),
        _ => None,
    }
}
