use crate::config::BiologyRule;
use crate::row::{ResultRow, SubjectBreakdown};
use serde::{Deserialize, Serialize};

pub const OVERALL: &str = "Overall";

/// Marks per answer state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingRule {
    pub correct: f64,
    pub incorrect: f64,
    pub unattended: f64,
}

impl GradingRule {
    /// +4 correct, -1 incorrect, 0 unattended.
    pub const STANDARD: GradingRule = GradingRule {
        correct: 4.0,
        incorrect: -1.0,
        unattended: 0.0,
    };

    pub fn score(&self, b: &SubjectBreakdown) -> f64 {
        b.correct * self.correct + b.incorrect * self.incorrect + b.unattended * self.unattended
    }

    pub fn max_score(&self, questions: f64) -> f64 {
        questions * self.correct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PercentagePolicy {
    /// Formula as-is; negative scores give negative percentages (down to -25).
    #[default]
    Raw,
    Clamped,
}

impl PercentagePolicy {
    pub fn apply(self, pct: f64) -> f64 {
        match self {
            PercentagePolicy::Raw => pct,
            PercentagePolicy::Clamped => pct.clamp(0.0, 100.0),
        }
    }
}

pub fn percentage(score: f64, questions: f64, policy: PercentagePolicy) -> f64 {
    let max = GradingRule::STANDARD.max_score(questions);
    if questions > 0.0 && max > 0.0 {
        policy.apply(score / max * 100.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerTestStat {
    pub test_name: String,
    pub total_questions: f64,
    pub total_score: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStat {
    pub name: String,
    pub correct: f64,
    pub incorrect: f64,
    pub unattended: f64,
    pub total_questions: f64,
    pub score: f64,
    pub percentage: f64,
}

/// Subjects with at least one counted question; all of them when none qualify.
pub fn present_breakdowns(breakdowns: &[SubjectBreakdown]) -> Vec<&SubjectBreakdown> {
    let present: Vec<&SubjectBreakdown> = breakdowns.iter().filter(|b| b.is_present()).collect();
    if present.is_empty() {
        breakdowns.iter().collect()
    } else {
        present
    }
}

pub fn compute_per_test_stat(
    test_name: &str,
    breakdowns: &[SubjectBreakdown],
    policy: PercentagePolicy,
) -> PerTestStat {
    let present = present_breakdowns(breakdowns);
    let total_questions: f64 = present.iter().map(|b| b.question_count()).sum();
    let total_score: f64 = present
        .iter()
        .map(|b| GradingRule::STANDARD.score(b))
        .sum();
    PerTestStat {
        test_name: test_name.to_string(),
        total_questions,
        total_score,
        percentage: percentage(total_score, total_questions, policy),
    }
}

pub fn subject_stat(b: &SubjectBreakdown, policy: PercentagePolicy) -> SubjectStat {
    let questions = b.question_count();
    let score = GradingRule::STANDARD.score(b);
    SubjectStat {
        name: b.name.clone(),
        correct: b.correct,
        incorrect: b.incorrect,
        unattended: b.unattended,
        total_questions: questions,
        score,
        percentage: percentage(score, questions, policy),
    }
}

pub fn subject_stats(breakdowns: &[SubjectBreakdown], policy: PercentagePolicy) -> Vec<SubjectStat> {
    breakdowns.iter().map(|b| subject_stat(b, policy)).collect()
}

/// Raw counts summed over the present subjects. Percentages derive from this, never
/// from averaging per-subject percentages.
pub fn overall_breakdown(breakdowns: &[SubjectBreakdown]) -> SubjectBreakdown {
    let mut out = SubjectBreakdown {
        name: OVERALL.to_string(),
        correct: 0.0,
        incorrect: 0.0,
        unattended: 0.0,
        total: 0.0,
    };
    for b in present_breakdowns(breakdowns) {
        out.absorb(b);
    }
    out
}

/// Appends a combined breakdown for the rule's target when both sources are reported
/// separately and the target itself is missing.
pub fn synthesize_biology_breakdown(breakdowns: &mut Vec<SubjectBreakdown>, rule: &BiologyRule) -> bool {
    if breakdowns.iter().any(|b| b.name == rule.target) {
        return false;
    }
    let [a, b] = &rule.sources;
    let (Some(first), Some(second)) = (
        breakdowns.iter().find(|x| &x.name == a),
        breakdowns.iter().find(|x| &x.name == b),
    ) else {
        return false;
    };
    let mut combined = first.clone();
    combined.name = rule.target.clone();
    combined.absorb(second);
    breakdowns.push(combined);
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BiologyView {
    /// One Biology figure, combining Botany and Zoology when no explicit one exists.
    #[default]
    Unified,
    /// Botany and Zoology shown separately.
    Split,
}

impl BiologyView {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unified" => Some(Self::Unified),
            "split" => Some(Self::Split),
            _ => None,
        }
    }
}

/// Score-field prefixes (`phy_score`, `phy_total`, ...) and the subjects they report.
const SCORE_FIELDS: [(&str, &str); 5] = [
    ("phy", "Physics"),
    ("chem", "Chemistry"),
    ("bot", "Botany"),
    ("zoo", "Zoology"),
    ("bio", "Biology"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTotals {
    pub view: BiologyView,
    pub subjects: Vec<SubjectScore>,
    pub total_score: f64,
    pub total_max: f64,
    pub percentage: f64,
}

/// Slots of the Botany, Zoology and Biology prefixes in `SCORE_FIELDS`.
fn biology_slots() -> Option<(usize, usize, usize)> {
    let slot = |prefix: &str| SCORE_FIELDS.iter().position(|(p, _)| *p == prefix);
    Some((slot("bot")?, slot("zoo")?, slot("bio")?))
}

fn field(row: &ResultRow, prefix: &str, suffix: &str) -> Option<f64> {
    row.get(&format!("{}_{}", prefix, suffix))
        .filter(|v| !v.is_null())
        .map(crate::row::coerce_number)
}

fn ratio_pct(score: f64, max: f64) -> f64 {
    if max > 0.0 {
        score / max * 100.0
    } else {
        0.0
    }
}

/// Aggregates score-field rows. Only the subjects shown in `view` feed the grand total,
/// so a Biology figure and its Botany/Zoology parts are never summed together.
pub fn score_totals(rows: &[ResultRow], view: BiologyView) -> ScoreTotals {
    // (score, max, seen) per SCORE_FIELDS entry
    let mut acc = [(0.0_f64, 0.0_f64, false); SCORE_FIELDS.len()];
    let slots = biology_slots();

    for row in rows {
        let mut per_row = [(None, None); SCORE_FIELDS.len()];
        for (i, (prefix, _)) in SCORE_FIELDS.iter().enumerate() {
            per_row[i] = (field(row, prefix, "score"), field(row, prefix, "total"));
        }
        if let (BiologyView::Unified, Some((bot, zoo, bio))) = (view, slots) {
            if per_row[bio].0.is_none() {
                let parts = [per_row[bot].0, per_row[zoo].0];
                if parts.iter().any(|p| p.is_some()) {
                    per_row[bio].0 = Some(parts.iter().flatten().sum());
                }
            }
            if per_row[bio].1.is_none() {
                let parts = [per_row[bot].1, per_row[zoo].1];
                if parts.iter().any(|p| p.is_some()) {
                    per_row[bio].1 = Some(parts.iter().flatten().sum());
                }
            }
        }
        for (i, (score, max)) in per_row.iter().enumerate() {
            if score.is_some() || max.is_some() {
                acc[i].0 += score.unwrap_or(0.0);
                acc[i].1 += max.unwrap_or(0.0);
                acc[i].2 = true;
            }
        }
    }

    let shown = |i: usize| match (view, slots) {
        (_, None) => true,
        (BiologyView::Unified, Some((bot, zoo, _))) => i != bot && i != zoo,
        // Split keeps an explicit Biology figure only when no parts were reported.
        (BiologyView::Split, Some((bot, zoo, bio))) => i != bio || (!acc[bot].2 && !acc[zoo].2),
    };

    let subjects: Vec<SubjectScore> = SCORE_FIELDS
        .iter()
        .enumerate()
        .filter(|(i, _)| acc[*i].2 && shown(*i))
        .map(|(i, (_, name))| SubjectScore {
            name: name.to_string(),
            score: acc[i].0,
            max_score: acc[i].1,
            percentage: ratio_pct(acc[i].0, acc[i].1),
        })
        .collect();
    let total_score = subjects.iter().map(|s| s.score).sum();
    let total_max = subjects.iter().map(|s| s.max_score).sum();
    ScoreTotals {
        view,
        subjects,
        total_score,
        total_max,
        percentage: ratio_pct(total_score, total_max),
    }
}
