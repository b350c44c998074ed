mod test_support;

use serde_json::json;
use test_support::spawn_sidecar;

#[test]
fn health_reports_version_and_subject_order() {
    let mut sidecar = spawn_sidecar();
    let health = sidecar.request_ok("health", json!({}));
    assert_eq!(
        health.get("version").and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert_eq!(
        health.get("subjectOrder"),
        Some(&json!(["Physics", "Chemistry", "Botany", "Zoology", "Biology"]))
    );
}

#[test]
fn unknown_method_and_bad_params_are_reported() {
    let mut sidecar = spawn_sidecar();
    assert_eq!(sidecar.request_err("grades.export", json!({})), "not_implemented");
    assert_eq!(sidecar.request_err("subjects.discover", json!({})), "bad_params");
    assert_eq!(
        sidecar.request_err("subjects.discover", json!({ "rows": "nope" })),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err("trends.series", json!({ "rows": [], "metric": "median" })),
        "bad_params"
    );
}

#[test]
fn malformed_json_gets_an_error_line_and_the_loop_continues() {
    let mut sidecar = spawn_sidecar();
    let resp = sidecar.send_line("{not json");
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_json")
    );
    let health = sidecar.request_ok("health", json!({}));
    assert!(health.get("version").is_some());
}
