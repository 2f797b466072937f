//! Conventional tool names. Tracking calls accept any string; these are the known ones.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A utility tool that reports telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    AiPromptGenerator,
    InstagramBioGenerator,
    TextRewriter,
    LoveCalculator,
    SalaryTaxCalculator,
    #[serde(rename = "celebrity_look_alike_finder")]
    CelebrityLookAlike,
}

impl Tool {
    pub const ALL: [Self; 6] = [
        Self::AiPromptGenerator,
        Self::InstagramBioGenerator,
        Self::TextRewriter,
        Self::LoveCalculator,
        Self::SalaryTaxCalculator,
        Self::CelebrityLookAlike,
    ];

    /// Name recorded as `toolName`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiPromptGenerator => "ai_prompt_generator",
            Self::InstagramBioGenerator => "instagram_bio_generator",
            Self::TextRewriter => "text_rewriter",
            Self::LoveCalculator => "love_calculator",
            Self::SalaryTaxCalculator => "salary_tax_calculator",
            Self::CelebrityLookAlike => "celebrity_look_alike_finder",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| format!("unknown tool: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for tool in Tool::ALL {
            assert_eq!(tool.as_str().parse::<Tool>().unwrap(), tool);
        }
        assert!("calculator".parse::<Tool>().is_err());
    }

    #[test]
    fn serde_matches_display() {
        for tool in Tool::ALL {
            let json = serde_json::to_value(tool).unwrap();
            assert_eq!(json, serde_json::Value::String(tool.to_string()));
        }
    }
}
