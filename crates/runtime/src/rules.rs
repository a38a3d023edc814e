use std::fs;

use serde::Deserialize;
use types::RuleError;

const BUNDLED_RULES: &str = include_str!("../data/emotion_urgency_rules.json");
const RULES_DOCUMENT: &str = "emotion/urgency rules";

/// Keyword tables driving the emotion and urgency analyzers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleSet {
    pub emotion_rules: EmotionRules,
    pub urgency_rules: UrgencyRules,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct EmotionRules {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
    /// Accepted for document compatibility; neutral is the fallback label.
    #[serde(default)]
    pub neutral: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct UrgencyRules {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl RuleSet {
    pub fn bundled() -> Result<Self, RuleError> {
        Self::from_json(BUNDLED_RULES)
    }

    /// Loads the override at `path`, or the bundled tables when `None`.
    pub fn load(path: Option<&str>) -> Result<Self, RuleError> {
        let Some(path) = path else {
            return Self::bundled();
        };
        let raw = fs::read_to_string(path).map_err(|error| RuleError::Read {
            document: RULES_DOCUMENT,
            path: path.to_owned(),
            message: error.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, RuleError> {
        serde_json::from_str(raw).map_err(|error| RuleError::Parse {
            document: RULES_DOCUMENT,
            message: error.to_string(),
        })
    }
}

/// Lower-cases `text`, drops every character that is neither alphanumeric
/// nor whitespace, and collapses whitespace runs to single spaces.
pub fn clean_text(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans every keyword and drops the ones that end up empty.
pub(crate) fn clean_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|keyword| clean_text(keyword))
        .filter(|keyword| !keyword.is_empty())
        .collect()
}
