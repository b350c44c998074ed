mod test_support;

use serde_json::json;
use test_support::{f64_at, spawn_sidecar, strings_at};

#[test]
fn discover_orders_canonical_subjects_first_regardless_of_row_order() {
    let mut sidecar = spawn_sidecar();
    let rows = vec![
        json!({ "Test": "Test 1", "Maths": 30, "Zoology__correct": 4, "id": 9 }),
        json!({ "Test": "Test 2", "Physics__correct": 2, "created_at": "2024-01-01" }),
        json!({ "Test": "Test 3", "subjectDetails": [{ "name": "Chemistry", "correct": 3 }] }),
        json!({ "Test": "Test 4", "English__skipped": 1, "updated_at": "2024-02-01" }),
    ];
    let expected = vec!["Physics", "Chemistry", "Zoology", "English", "Maths"];

    let forward = sidecar.request_ok("subjects.discover", json!({ "rows": rows }));
    assert_eq!(strings_at(&forward, "/subjects"), expected);
    assert_eq!(forward.get("rowCount").and_then(|v| v.as_u64()), Some(4));

    let mut reversed = rows.clone();
    reversed.reverse();
    let backward = sidecar.request_ok("subjects.discover", json!({ "rows": reversed }));
    assert_eq!(strings_at(&backward, "/subjects"), expected);
}

#[test]
fn empty_rows_discover_nothing_unless_fallback_requested() {
    let mut sidecar = spawn_sidecar();
    let plain = sidecar.request_ok("subjects.discover", json!({ "rows": [] }));
    assert!(strings_at(&plain, "/subjects").is_empty());
    assert_eq!(plain.get("fallbackUsed"), Some(&json!(false)));

    let with_fallback =
        sidecar.request_ok("subjects.discover", json!({ "rows": [], "useFallback": true }));
    assert_eq!(
        strings_at(&with_fallback, "/subjects"),
        vec!["Physics", "Chemistry", "Botany", "Zoology"]
    );
    assert_eq!(with_fallback.get("fallbackUsed"), Some(&json!(true)));
}

#[test]
fn normalize_reports_shape_for_each_row_convention() {
    let mut sidecar = spawn_sidecar();

    let detailed = sidecar.request_ok(
        "rows.normalize",
        json!({
            "row": {
                "Test": "Test 5",
                "subjectDetails": [{ "name": "Botany", "correct": 6, "incorrect": 1, "unattempted": 3 }]
            }
        }),
    );
    assert_eq!(detailed.get("shape"), Some(&json!("detailed")));
    assert_eq!(f64_at(&detailed, "/breakdowns/0/unattended"), 3.0);
    assert_eq!(f64_at(&detailed, "/breakdowns/0/total"), 10.0);

    let flattened = sidecar.request_ok(
        "rows.normalize",
        json!({
            "row": { "Physics__correct": "9", "Physics__skipped": 1, "Physics": 12 },
            "subjects": ["Physics", "Chemistry"]
        }),
    );
    assert_eq!(flattened.get("shape"), Some(&json!("flattened")));
    assert_eq!(flattened.get("test"), Some(&json!("Unknown Test")));
    assert_eq!(f64_at(&flattened, "/breakdowns/0/correct"), 9.0);
    assert_eq!(f64_at(&flattened, "/breakdowns/0/total"), 12.0);
    assert_eq!(f64_at(&flattened, "/breakdowns/1/total"), 0.0);

    let bare = sidecar.request_ok(
        "rows.normalize",
        json!({ "row": { "Test": "Test 6", "Chemistry": 45 } }),
    );
    assert_eq!(bare.get("shape"), Some(&json!("bareTotals")));
    assert_eq!(f64_at(&bare, "/breakdowns/0/total"), 45.0);
    assert_eq!(f64_at(&bare, "/breakdowns/0/correct"), 0.0);
}
