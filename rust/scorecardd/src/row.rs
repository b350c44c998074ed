use crate::config::{EngineConfig, TEST_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SUBJECT_DETAILS_KEY: &str = "subjectDetails";
pub const UNKNOWN_TEST: &str = "Unknown Test";

/// One test-result record as handed over by the fetch layer. Shape varies per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow(Map<String, Value>);

impl ResultRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Non-object values become an empty row.
    pub fn from_value(v: &Value) -> Self {
        match v.as_object() {
            Some(obj) => Self(obj.clone()),
            None => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn number(&self, key: &str) -> f64 {
        self.get(key).map(coerce_count).unwrap_or(0.0)
    }

    /// First of `keys` present in the row, coerced.
    pub fn first_number(&self, keys: &[&str]) -> f64 {
        keys.iter()
            .find_map(|k| self.get(k))
            .map(coerce_count)
            .unwrap_or(0.0)
    }

    pub fn test_label(&self) -> String {
        self.explicit_test_label()
            .unwrap_or_else(|| UNKNOWN_TEST.to_string())
    }

    pub fn explicit_test_label(&self) -> Option<String> {
        match self.get(TEST_KEY)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Lenient numeric read: numbers and numeric strings parse, everything else is 0.
pub fn coerce_number(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Counts are never negative.
pub fn coerce_count(v: &Value) -> f64 {
    coerce_number(v).max(0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectBreakdown {
    pub name: String,
    pub correct: f64,
    pub incorrect: f64,
    pub unattended: f64,
    pub total: f64,
}

impl SubjectBreakdown {
    /// Explicit non-zero totals win; otherwise the total is the attempted sum.
    pub fn new(name: impl Into<String>, correct: f64, incorrect: f64, unattended: f64, total: f64) -> Self {
        let attempted = correct + incorrect + unattended;
        Self {
            name: name.into(),
            correct,
            incorrect,
            unattended,
            total: if total > 0.0 { total } else { attempted },
        }
    }

    pub fn zeroed(name: impl Into<String>) -> Self {
        Self::new(name, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn question_count(&self) -> f64 {
        self.correct + self.incorrect + self.unattended
    }

    pub fn is_present(&self) -> bool {
        self.question_count() > 0.0
    }

    pub fn absorb(&mut self, other: &SubjectBreakdown) {
        self.correct += other.correct;
        self.incorrect += other.incorrect;
        self.unattended += other.unattended;
        self.total += other.total;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RowShape {
    /// `subjectDetails` array, authoritative.
    Detailed,
    /// `<Subject>__correct` style keys.
    Flattened,
    /// Only bare per-subject totals; no breakdown available.
    BareTotals,
}

impl RowShape {
    pub fn as_str(self) -> &'static str {
        match self {
            RowShape::Detailed => "detailed",
            RowShape::Flattened => "flattened",
            RowShape::BareTotals => "bareTotals",
        }
    }
}

pub fn classify_row_shape(row: &ResultRow, subjects: &[String]) -> RowShape {
    if row
        .get(SUBJECT_DETAILS_KEY)
        .map(|v| v.is_array())
        .unwrap_or(false)
    {
        return RowShape::Detailed;
    }
    if subjects
        .iter()
        .any(|s| row.contains_key(&format!("{}__correct", s)))
    {
        return RowShape::Flattened;
    }
    RowShape::BareTotals
}

pub(crate) fn detail_name(entry: &Value) -> Option<String> {
    ["name", "subject"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(|v| v.as_str()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn detail_number(entry: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|k| entry.get(*k).filter(|v| !v.is_null()))
        .map(coerce_count)
        .unwrap_or(0.0)
}

fn normalize_detailed(details: &[Value], subjects: &[String]) -> Vec<SubjectBreakdown> {
    let mut out: Vec<SubjectBreakdown> = Vec::new();
    for entry in details {
        let Some(name) = detail_name(entry) else {
            continue;
        };
        let b = SubjectBreakdown::new(
            name,
            detail_number(entry, &["correct", "correct_count"]),
            detail_number(entry, &["incorrect", "incorrect_count"]),
            detail_number(entry, &["unattended", "skipped", "unattempted"]),
            detail_number(entry, &["total"]),
        );
        match out.iter_mut().find(|x| x.name == b.name) {
            Some(existing) => existing.absorb(&b),
            None => out.push(b),
        }
    }
    for s in subjects {
        if !out.iter().any(|b| &b.name == s) {
            out.push(SubjectBreakdown::zeroed(s.clone()));
        }
    }
    out
}

fn normalize_flattened(row: &ResultRow, subjects: &[String]) -> Vec<SubjectBreakdown> {
    subjects
        .iter()
        .map(|s| {
            let unattempted = format!("{}__unattempted", s);
            let skipped = format!("{}__skipped", s);
            let unattended = format!("{}__unattended", s);
            SubjectBreakdown::new(
                s.clone(),
                row.number(&format!("{}__correct", s)),
                row.number(&format!("{}__incorrect", s)),
                row.first_number(&[unattempted.as_str(), skipped.as_str(), unattended.as_str()]),
                row.number(s),
            )
        })
        .collect()
}

fn normalize_bare_totals(row: &ResultRow, subjects: &[String]) -> Vec<SubjectBreakdown> {
    subjects
        .iter()
        .map(|s| SubjectBreakdown::new(s.clone(), 0.0, 0.0, 0.0, row.number(s)))
        .collect()
}

/// Uniform per-subject breakdown for one row, whatever its shape.
pub fn normalize_row(row: &ResultRow, subjects: &[String], config: &EngineConfig) -> Vec<SubjectBreakdown> {
    let own_subjects;
    let subjects = if subjects.is_empty() {
        own_subjects =
            crate::subjects::order_subjects(crate::subjects::row_subject_candidates(row, config), &config.subject_order);
        own_subjects.as_slice()
    } else {
        subjects
    };

    match classify_row_shape(row, subjects) {
        RowShape::Detailed => {
            let details = row
                .get(SUBJECT_DETAILS_KEY)
                .and_then(|v| v.as_array())
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            normalize_detailed(details, subjects)
        }
        RowShape::Flattened => normalize_flattened(row, subjects),
        RowShape::BareTotals => {
            log::debug!(
                "row {:?} has no breakdown fields; using bare totals",
                row.test_label()
            );
            normalize_bare_totals(row, subjects)
        }
    }
}
