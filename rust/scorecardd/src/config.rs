use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Display ordering for subjects. Subjects outside this list sort lexically after it.
pub const DEFAULT_SUBJECT_ORDER: [&str; 5] = ["Physics", "Chemistry", "Botany", "Zoology", "Biology"];

/// Subjects a dashboard falls back to when a dataset has none to discover.
pub const DEFAULT_FALLBACK_SUBJECTS: [&str; 4] = ["Physics", "Chemistry", "Botany", "Zoology"];

/// Row keys that never name a subject.
pub const DEFAULT_METADATA_KEYS: [&str; 4] = ["id", "created_at", "updated_at", "subjectDetails"];

pub const TEST_KEY: &str = "Test";

pub const CONFIG_ENV_VAR: &str = "SCORECARD_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiologyRule {
    pub target: String,
    pub sources: [String; 2],
}

impl Default for BiologyRule {
    fn default() -> Self {
        Self {
            target: "Biology".to_string(),
            sources: ["Botany".to_string(), "Zoology".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub subject_order: Vec<String>,
    pub fallback_subjects: Vec<String>,
    pub metadata_keys: Vec<String>,
    pub clamp_percentage: bool,
    pub biology: BiologyRule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            subject_order: DEFAULT_SUBJECT_ORDER.iter().map(|s| s.to_string()).collect(),
            fallback_subjects: DEFAULT_FALLBACK_SUBJECTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            metadata_keys: DEFAULT_METADATA_KEYS.iter().map(|s| s.to_string()).collect(),
            clamp_percentage: false,
            biology: BiologyRule::default(),
        }
    }
}

impl EngineConfig {
    pub fn is_metadata_key(&self, key: &str) -> bool {
        key == TEST_KEY || self.metadata_keys.iter().any(|k| k == key)
    }

    pub fn percentage_policy(&self) -> crate::metrics::PercentagePolicy {
        if self.clamp_percentage {
            crate::metrics::PercentagePolicy::Clamped
        } else {
            crate::metrics::PercentagePolicy::Raw
        }
    }

    /// Reads a JSON config file; unspecified fields keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let raw: Value = serde_json::from_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        let Some(obj) = raw.as_object() else {
            anyhow::bail!("config {} must be a JSON object", path.display());
        };
        let mut cfg = Self::default();
        cfg.apply_patch(obj).map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Defaults, overlaid with `$SCORECARD_CONFIG` when it points at a readable file.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR) else {
            return Self::default();
        };
        match Self::load(Path::new(&path)) {
            Ok(cfg) => {
                log::info!("loaded engine config from {}", Path::new(&path).display());
                cfg
            }
            Err(e) => {
                log::warn!("ignoring engine config: {e:#}");
                Self::default()
            }
        }
    }

    /// Validates and applies a partial update. Nothing is applied if any field is rejected.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        let mut next = self.clone();
        for (k, v) in patch {
            match k.as_str() {
                "subjectOrder" => next.subject_order = parse_name_list(v, k, false)?,
                "fallbackSubjects" => next.fallback_subjects = parse_name_list(v, k, false)?,
                "metadataKeys" => next.metadata_keys = parse_name_list(v, k, true)?,
                "clampPercentage" => {
                    next.clamp_percentage = v
                        .as_bool()
                        .ok_or_else(|| format!("{} must be boolean", k))?;
                }
                "biology" => next.biology = parse_biology_rule(v)?,
                _ => return Err(format!("unknown config field: {}", k)),
            }
        }
        *self = next;
        Ok(())
    }
}

fn parse_name(v: &Value, key: &str) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must contain only strings", key))?
        .trim();
    if s.is_empty() {
        return Err(format!("{} must not contain empty names", key));
    }
    if s.len() > 64 {
        return Err(format!("{} names must be <= 64 chars", key));
    }
    Ok(s.to_string())
}

fn parse_name_list(v: &Value, key: &str, allow_empty: bool) -> Result<Vec<String>, String> {
    let arr = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array", key))?;
    let mut out: Vec<String> = Vec::with_capacity(arr.len());
    for item in arr {
        let name = parse_name(item, key)?;
        if out.contains(&name) {
            return Err(format!("{} contains duplicate name: {}", key, name));
        }
        out.push(name);
    }
    if out.is_empty() && !allow_empty {
        return Err(format!("{} must not be empty", key));
    }
    Ok(out)
}

fn parse_biology_rule(v: &Value) -> Result<BiologyRule, String> {
    let obj = v
        .as_object()
        .ok_or_else(|| "biology must be an object".to_string())?;
    let mut rule = BiologyRule::default();
    for (k, v) in obj {
        match k.as_str() {
            "target" => rule.target = parse_name(v, "biology.target")?,
            "sources" => {
                let names = parse_name_list(v, "biology.sources", false)?;
                let [a, b]: [String; 2] = names
                    .try_into()
                    .map_err(|_| "biology.sources must name exactly two subjects".to_string())?;
                rule.sources = [a, b];
            }
            _ => return Err(format!("unknown biology field: {}", k)),
        }
    }
    if rule.sources.contains(&rule.target) {
        return Err("biology.target must differ from its sources".into());
    }
    Ok(rule)
}
