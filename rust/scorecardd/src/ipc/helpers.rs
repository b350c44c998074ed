use crate::ipc::error::bad_params;
use crate::ipc::types::Request;
use crate::row::ResultRow;
use crate::series::{PerTestMatrix, SeriesMetric, Selection};

/// Row arrays are required; individual non-object entries degrade to empty rows.
pub fn rows_param(req: &Request) -> Result<Vec<ResultRow>, serde_json::Value> {
    let Some(raw) = req.params.get("rows") else {
        return Err(bad_params(&req.id, "missing rows"));
    };
    let Some(arr) = raw.as_array() else {
        return Err(bad_params(&req.id, "rows must be an array"));
    };
    Ok(arr.iter().map(ResultRow::from_value).collect())
}

pub fn optional_subjects(req: &Request) -> Result<Option<Vec<String>>, serde_json::Value> {
    let Some(raw) = req.params.get("subjects") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(arr) = raw.as_array() else {
        return Err(bad_params(&req.id, "subjects must be an array of strings"));
    };
    let mut out: Vec<String> = Vec::with_capacity(arr.len());
    for v in arr {
        let Some(s) = v.as_str() else {
            return Err(bad_params(&req.id, "subjects must contain only strings"));
        };
        let t = s.trim();
        if !t.is_empty() && !out.iter().any(|x| x == t) {
            out.push(t.to_string());
        }
    }
    Ok(Some(out))
}

pub fn optional_bool(req: &Request, key: &str, default: bool) -> Result<bool, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| bad_params(&req.id, format!("{} must be boolean", key))),
    }
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Result<Option<&'a str>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim()))
            .ok_or_else(|| bad_params(&req.id, format!("{} must be string", key))),
    }
}

pub fn metric_param(req: &Request) -> Result<SeriesMetric, serde_json::Value> {
    match optional_str(req, "metric")? {
        None => Ok(SeriesMetric::default()),
        Some(s) => SeriesMetric::parse(s).ok_or_else(|| {
            bad_params(
                &req.id,
                "metric must be one of: score, percentage, correct, incorrect, unattended",
            )
        }),
    }
}

pub fn selection_param(req: &Request) -> Result<Option<Selection>, serde_json::Value> {
    Ok(optional_str(req, "selection")?
        .filter(|s| !s.is_empty())
        .map(Selection::parse))
}

pub fn test_number_param(req: &Request) -> Result<Option<u64>, serde_json::Value> {
    match req.params.get("testNumber") {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| bad_params(&req.id, "testNumber must be a non-negative integer")),
    }
}

/// `{ "<label>": [v0, v1, ...] }` with values positioned by subject index.
pub fn matrix_param(req: &Request) -> Result<Option<PerTestMatrix>, serde_json::Value> {
    let Some(raw) = req.params.get("matrix") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(obj) = raw.as_object() else {
        return Err(bad_params(&req.id, "matrix must be an object"));
    };
    let mut out = PerTestMatrix::new();
    for (label, vals) in obj {
        let Some(arr) = vals.as_array() else {
            return Err(bad_params(
                &req.id,
                format!("matrix.{} must be an array", label),
            ));
        };
        out.insert(
            label.trim().to_string(),
            // null marks a missing slot so alignment falls through to the named series
            arr.iter()
                .map(|v| if v.is_null() { f64::NAN } else { crate::row::coerce_number(v) })
                .collect(),
        );
    }
    Ok(Some(out))
}
