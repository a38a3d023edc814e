mod analyzers;
mod chat;
mod classifier;
mod policy;
mod rules;
mod search;
mod session_manager;
mod sweeper;

pub use analyzers::{EmotionAnalyzer, UrgencyAnalyzer};
pub use chat::ChatService;
pub use classifier::{CasualPatterns, Classification, IntentClassifier};
pub use policy::{ESCALATION_MESSAGE, ResponsePolicy};
pub use rules::{EmotionRules, RuleSet, UrgencyRules, clean_text};
pub use search::{SearchOutcome, SemanticSearch};
pub use session_manager::{
    MAX_FEEDBACK_CHARS, MAX_SESSION_ID_LEN, SessionManager, SessionOverview, SessionSettings,
    SessionStats, SessionView,
};
pub use sweeper::SessionSweeper;
