//! Predefined quick actions offered next to the chat input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A predefined reply the user can send without typing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    SuggestTechniques,
    RecommendBooks,
}

impl QuickAction {
    pub const ALL: [QuickAction; 2] = [QuickAction::SuggestTechniques, QuickAction::RecommendBooks];

    /// Option id sent as the message text
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuggestTechniques => "suggest_techniques",
            Self::RecommendBooks => "recommend_books",
        }
    }

    /// Button label
    pub fn label(&self) -> &'static str {
        match self {
            Self::SuggestTechniques => "Suggest Learning Techniques",
            Self::RecommendBooks => "Recommend Books",
        }
    }
}

impl fmt::Display for QuickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuickAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown quick action: {s}"))
    }
}
