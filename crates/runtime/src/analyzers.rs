use std::collections::HashSet;

use types::{Emotion, Urgency};

use crate::rules::{RuleSet, clean_keywords, clean_text};

/// Keyword-rule emotion tagger.
///
/// Negative keywords win over positive ones regardless of counts; text with
/// no match is neutral.
#[derive(Debug, Clone)]
pub struct EmotionAnalyzer {
    negative: Vec<String>,
    positive: Vec<String>,
}

impl EmotionAnalyzer {
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            negative: clean_keywords(&rules.emotion_rules.negative),
            positive: clean_keywords(&rules.emotion_rules.positive),
        }
    }

    pub fn analyze(&self, text: &str) -> Emotion {
        let cleaned = clean_text(text);
        let tokens: HashSet<&str> = cleaned.split(' ').collect();
        let matches = |keyword: &String| {
            tokens.contains(keyword.as_str())
                || (keyword.contains(' ') && cleaned.contains(keyword.as_str()))
        };

        if self.negative.iter().any(matches) {
            return Emotion::Negative;
        }
        if self.positive.iter().any(matches) {
            return Emotion::Positive;
        }
        Emotion::Neutral
    }
}

/// Substring-based urgency tagger. Levels are checked high, medium, low and
/// the first level with a match wins; the default is low.
#[derive(Debug, Clone)]
pub struct UrgencyAnalyzer {
    levels: [(Urgency, Vec<String>); 3],
}

impl UrgencyAnalyzer {
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            levels: [
                (Urgency::High, clean_keywords(&rules.urgency_rules.high)),
                (Urgency::Medium, clean_keywords(&rules.urgency_rules.medium)),
                (Urgency::Low, clean_keywords(&rules.urgency_rules.low)),
            ],
        }
    }

    pub fn analyze(&self, text: &str) -> Urgency {
        let cleaned = clean_text(text);
        self.levels
            .iter()
            .find(|(_, phrases)| {
                phrases
                    .iter()
                    .any(|phrase| cleaned.contains(phrase.as_str()))
            })
            .map_or(Urgency::Low, |(level, _)| *level)
    }
}
