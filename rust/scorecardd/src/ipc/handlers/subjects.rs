use crate::ipc::error::{bad_params, ok};
use crate::ipc::helpers::{optional_bool, optional_subjects, rows_param};
use crate::ipc::types::{AppState, Request};
use crate::row::{classify_row_shape, normalize_row, ResultRow};
use crate::subjects::{discover_subjects, order_subjects, row_subject_candidates};
use serde_json::json;

fn handle_subjects_discover(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match rows_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let use_fallback = match optional_bool(req, "useFallback", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let discovered = discover_subjects(&rows, &state.config);
    let fallback_used = use_fallback && discovered.is_empty();
    let subjects = if fallback_used {
        state.config.fallback_subjects.clone()
    } else {
        discovered
    };
    ok(
        &req.id,
        json!({
            "subjects": subjects,
            "rowCount": rows.len(),
            "fallbackUsed": fallback_used
        }),
    )
}

fn handle_rows_normalize(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("row") else {
        return bad_params(&req.id, "missing row");
    };
    if !raw.is_object() {
        return bad_params(&req.id, "row must be an object");
    }
    let row = ResultRow::from_value(raw);
    let subjects = match optional_subjects(req) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    // Classification sees the same subject list normalize_row falls back to.
    let effective = if subjects.is_empty() {
        order_subjects(row_subject_candidates(&row, &state.config), &state.config.subject_order)
    } else {
        subjects.clone()
    };
    let shape = classify_row_shape(&row, &effective);
    let breakdowns = normalize_row(&row, &subjects, &state.config);
    ok(
        &req.id,
        json!({
            "test": row.test_label(),
            "shape": shape.as_str(),
            "breakdowns": breakdowns
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.discover" => Some(handle_subjects_discover(state, req)),
        "rows.normalize" => Some(handle_rows_normalize(state, req)),
        _ => None,
    }
}
