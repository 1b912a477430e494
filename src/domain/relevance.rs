//! Keyword-weighted topical relevance.
//!
//! Two profiles exist. `primary` starts at 0 and adds 1 per matched keyword.
//! `alternate` starts at 1 (the post comes from a tracked account) and weights
//! urgency terms 5, institutional terms 3, everything else 1.
use serde::{Deserialize, Serialize};

use crate::domain::model::PipelineProfile;

const URGENT_TERMS: [&str; 3] = ["breaking", "urgent", "confirmed"];
const INSTITUTIONAL_TERMS: [&str; 3] = ["security", "government", "economy"];

pub const PRIMARY_KEYWORDS: &[&str] = &[
    "breaking", "urgent", "news", "confirmed",
    "government", "president", "minister", "parliament",
    "security", "protest", "strike", "arrested",
    "economy", "inflation", "business", "deal",
    "health", "hospital", "disease", "outbreak",
    "election", "vote", "campaign", "politics",
    "corruption", "accountability", "justice",
];

pub const ALTERNATE_KEYWORDS: &[&str] = &[
    "breaking", "urgent", "news", "confirmed",
    "government", "president", "minister", "parliament",
    "security", "protest", "strike", "arrested",
    "economy", "inflation", "business", "deal",
    "health", "hospital", "disease", "outbreak",
    "election", "vote", "campaign", "politics",
    "police", "army", "kidnap", "bandit", "attack",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    Flat,
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub term: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceScorer {
    base: u32,
    policy: ScoringPolicy,
    keywords: Vec<Keyword>,
}

impl RelevanceScorer {
    pub fn new<S: AsRef<str>>(base: u32, policy: ScoringPolicy, terms: &[S]) -> Self {
        let keywords = terms
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .map(|term| {
                let weight = weight_for(&term, policy);
                Keyword { term, weight }
            })
            .collect();
        Self {
            base,
            policy,
            keywords,
        }
    }

    pub fn for_profile(profile: PipelineProfile) -> Self {
        match profile {
            PipelineProfile::Primary => Self::new(0, ScoringPolicy::Flat, PRIMARY_KEYWORDS),
            PipelineProfile::Alternate => {
                Self::new(1, ScoringPolicy::Weighted, ALTERNATE_KEYWORDS)
            }
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Case-insensitive substring match; each keyword counts once.
    pub fn score(&self, text: &str) -> u32 {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| lowered.contains(k.term.as_str()))
            .fold(self.base, |acc, k| acc.saturating_add(k.weight))
    }
}

fn weight_for(term: &str, policy: ScoringPolicy) -> u32 {
    match policy {
        ScoringPolicy::Flat => 1,
        ScoringPolicy::Weighted if URGENT_TERMS.contains(&term) => 5,
        ScoringPolicy::Weighted if INSTITUTIONAL_TERMS.contains(&term) => 3,
        ScoringPolicy::Weighted => 1,
    }
}
