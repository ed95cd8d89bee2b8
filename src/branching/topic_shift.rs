//! Topic shift detection

use crate::config::{BranchConfig, TopicShiftConfig};
use crate::context::models::EnhancedMessage;
use crate::context::similarity::jaccard;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of topic change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    /// Abrupt jump to unrelated topics
    Sudden,
    /// Back to topics from earlier in the conversation
    Return,
    /// Side excursion with mostly new topics
    Tangent,
    /// Slow drift
    Gradual,
}

/// What the caller should do about a detected shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    #[default]
    Continue,
    Branch,
    Merge,
    Archive,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::Continue => "continue",
            RecommendedAction::Branch => "branch",
            RecommendedAction::Merge => "merge",
            RecommendedAction::Archive => "archive",
        }
    }
}

/// Normalized overlap signals, each 0.0-1.0
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftSignals {
    /// Overlap with the immediately prior message
    pub continuity: f32,
    /// One minus overlap with the union of recent topics
    pub divergence: f32,
    /// Share of current topics absent from recent history
    pub novelty: f32,
    /// Share of current topics seen before the recent history but not in the prior message
    pub return_signal: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicShiftAnalysis {
    pub detected: bool,
    pub shift_type: Option<ShiftType>,
    pub confidence: f32,
    pub signals: ShiftSignals,
    pub new_topics: BTreeSet<String>,
    pub recommended_action: RecommendedAction,
}

/// Branch tree facts that decide the recommended action
#[derive(Debug, Clone, Copy)]
pub struct BranchState {
    pub branch_count: usize,
    pub active_depth: usize,
    pub last_branch_at: Option<DateTime<Utc>>,
}

pub struct TopicShiftDetector {
    config: TopicShiftConfig,
    limits: BranchConfig,
}

impl TopicShiftDetector {
    pub fn new(config: TopicShiftConfig, limits: BranchConfig) -> Self {
        Self { config, limits }
    }

    /// Compare `message` with the `history` that precedes it (chronological)
    pub fn analyze(
        &self,
        message: &EnhancedMessage,
        history: &[EnhancedMessage],
        state: &BranchState,
        now: DateTime<Utc>,
    ) -> TopicShiftAnalysis {
        let current = &message.topics;
        let Some(prior) = history.last() else {
            return TopicShiftAnalysis::default();
        };
        if !self.config.enabled || current.is_empty() {
            return TopicShiftAnalysis::default();
        }

        let recent_len = self.config.history_window.max(1).min(history.len());
        let split = history.len() - recent_len;
        let recent_topics: BTreeSet<String> = history[split..]
            .iter()
            .flat_map(|m| m.topics.iter().cloned())
            .collect();
        let older_topics: BTreeSet<String> = history[..split]
            .iter()
            .flat_map(|m| m.topics.iter().cloned())
            .collect();

        let size = current.len() as f32;
        let signals = ShiftSignals {
            continuity: jaccard(current, &prior.topics),
            divergence: 1.0 - jaccard(current, &recent_topics),
            novelty: current.difference(&recent_topics).count() as f32 / size,
            return_signal: current
                .iter()
                .filter(|t| older_topics.contains(*t) && !prior.topics.contains(*t))
                .count() as f32
                / size,
        };

        let (shift_type, confidence) = classify(&signals);
        let detected = confidence > self.config.threshold;
        let recommended_action = if detected {
            self.recommend(state, now)
        } else {
            RecommendedAction::Continue
        };

        TopicShiftAnalysis {
            detected,
            shift_type: Some(shift_type),
            confidence,
            signals,
            new_topics: current.difference(&recent_topics).cloned().collect(),
            recommended_action,
        }
    }

    /// Cooldown first, then branch count, then depth
    pub fn recommend(&self, state: &BranchState, now: DateTime<Utc>) -> RecommendedAction {
        if let Some(last) = state.last_branch_at {
            if now - last < Duration::minutes(self.limits.cooldown_minutes) {
                return RecommendedAction::Continue;
            }
        }
        if state.branch_count >= self.limits.max_branches {
            RecommendedAction::Merge
        } else if state.active_depth >= self.limits.max_depth {
            RecommendedAction::Archive
        } else {
            RecommendedAction::Branch
        }
    }
}

fn classify(signals: &ShiftSignals) -> (ShiftType, f32) {
    if signals.divergence > 0.8 && signals.continuity < 0.2 {
        (
            ShiftType::Sudden,
            (signals.divergence + (1.0 - signals.continuity)) / 2.0,
        )
    } else if signals.return_signal > 0.6 {
        (ShiftType::Return, signals.return_signal)
    } else if signals.novelty > 0.5 && signals.divergence > 0.5 {
        (ShiftType::Tangent, (signals.novelty + signals.divergence) / 2.0)
    } else {
        (ShiftType::Gradual, signals.divergence * 0.7)
    }
}
