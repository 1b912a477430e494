use serde::{Deserialize, Serialize};

use crate::domain::model::{PipelineProfile, PostDraft};

pub const DEFAULT_MIN_ENGAGEMENT: u64 = 30;

/// Accept/reject thresholds for a draft. Pure; engagement is recomputed on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGate {
    pub min_engagement: u64,
    pub min_text_length: usize,
}

impl QualityGate {
    pub fn for_profile(profile: PipelineProfile) -> Self {
        let min_text_length = match profile {
            PipelineProfile::Primary => 50,
            PipelineProfile::Alternate => 20,
        };
        Self {
            min_engagement: DEFAULT_MIN_ENGAGEMENT,
            min_text_length,
        }
    }

    pub fn accept(&self, draft: &PostDraft) -> bool {
        accept(draft, self.min_engagement, self.min_text_length)
    }
}

/// Rejects reposts, texts shorter than `min_text_length` characters, and drafts
/// whose likes + reposts + replies fall under `min_engagement`.
pub fn accept(draft: &PostDraft, min_engagement: u64, min_text_length: usize) -> bool {
    if draft.is_repost() {
        return false;
    }
    if draft.text.chars().count() < min_text_length {
        return false;
    }
    draft.total_engagement() >= min_engagement
}
