//! Branch lifecycle: create, switch, archive, merge and navigate

use super::topic_shift::BranchState;
use super::tree::{BranchInfo, BranchReason, BranchTree, BranchTreeNode, ConversationBranch};
use crate::config::BranchConfig;
use crate::context::models::{
    ContextWindow, EnhancedMessage, MessageMetadata, MessageRole, Sentiment,
};
use crate::context::similarity::jaccard;
use crate::context::token_estimator::TokenEstimator;
use crate::error::{ContextError, Result};
use crate::metrics::METRICS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

const ENGAGEMENT_STEP: f32 = 0.1;
/// Minimum topic overlap for message-level merges
const CONTENT_MERGE_OVERLAP: f32 = 0.5;
const SUMMARY_MERGE_IMPORTANCE: f32 = 0.7;
const SUMMARY_MERGE_TOPICS: usize = 3;
/// Score penalty per hop in navigation options
const DISTANCE_PENALTY: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    FullMerge,
    SelectiveMerge,
    SummaryMerge,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::FullMerge => "full_merge",
            MergeStrategy::SelectiveMerge => "selective_merge",
            MergeStrategy::SummaryMerge => "summary_merge",
        }
    }
}

/// A pair of related branches worth merging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub source_id: String,
    pub target_id: String,
    pub topic_overlap: f32,
    pub time_proximity: f32,
    pub quality: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub source_id: String,
    pub target_id: String,
    pub strategy: MergeStrategy,
    /// Messages added to the target
    pub messages_added: usize,
    /// Branch ids removed, the source last
    pub archived: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchRelation {
    Parent,
    Child,
    Sibling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationOption {
    pub branch_id: String,
    pub topic: String,
    pub relation: BranchRelation,
    pub distance: usize,
    pub relevance: f32,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSuggestion {
    pub branch_id: String,
    pub topic: String,
    pub score: f32,
}

/// Where the active branch sits and where the user could go next
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchNavigation {
    pub current_branch_id: String,
    /// Active branch first, root last
    pub path_to_root: Vec<String>,
    pub options: Vec<NavigationOption>,
    pub suggestion: Option<BranchSuggestion>,
}

/// Owns a conversation's branch tree and the policies applied to it
pub struct BranchManager {
    config: BranchConfig,
    tree: BranchTree,
    last_branch_at: Option<DateTime<Utc>>,
}

impl BranchManager {
    /// A manager whose tree holds only the main branch with `window`
    pub fn new(config: BranchConfig, window: ContextWindow) -> Self {
        Self {
            config,
            tree: BranchTree::new(window),
            last_branch_at: None,
        }
    }

    /// Rebuild from persisted parts
    pub fn from_parts(
        config: BranchConfig,
        tree: BranchTree,
        last_branch_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            config,
            tree,
            last_branch_at,
        }
    }

    pub fn tree(&self) -> &BranchTree {
        &self.tree
    }

    pub fn last_branch_at(&self) -> Option<DateTime<Utc>> {
        self.last_branch_at
    }

    pub fn active_branch_id(&self) -> &str {
        self.tree.active_id()
    }

    pub fn active_window(&self) -> Result<&ContextWindow> {
        Ok(&self.tree.active()?.branch.window)
    }

    pub fn active_window_mut(&mut self) -> Result<&mut ContextWindow> {
        Ok(&mut self.tree.active_mut()?.branch.window)
    }

    pub fn window_mut(&mut self, id: &str) -> Result<&mut ContextWindow> {
        Ok(&mut self.tree.get_mut(id)?.branch.window)
    }

    /// Facts the topic shift detector needs
    pub fn state(&self) -> BranchState {
        BranchState {
            branch_count: self.tree.len(),
            active_depth: self.tree.active().map(|n| n.depth).unwrap_or(0),
            last_branch_at: self.last_branch_at,
        }
    }

    pub fn branches(&self) -> Vec<BranchInfo> {
        self.tree.nodes().map(BranchInfo::from).collect()
    }

    /// Fork the parent's window into a new active branch.
    ///
    /// The parent defaults to the active branch and `branch_point` to the end
    /// of the parent's messages. Fails with `BranchLimit` when the tree is full
    /// or the new branch would be too deep.
    pub fn create_branch(
        &mut self,
        topic: impl Into<String>,
        reason: BranchReason,
        branch_point: Option<usize>,
        parent_id: Option<&str>,
    ) -> Result<String> {
        let topic = topic.into();
        let parent_id = parent_id.unwrap_or(self.tree.active_id()).to_string();
        let parent = self.tree.get(&parent_id)?;

        if self.tree.len() >= self.config.max_branches {
            return Err(ContextError::BranchLimit(format!(
                "at most {} branches",
                self.config.max_branches
            )));
        }
        if parent.depth + 1 > self.config.max_depth {
            return Err(ContextError::BranchLimit(format!(
                "maximum depth {} reached",
                self.config.max_depth
            )));
        }

        let mut window = parent.branch.window.clone();
        let point = branch_point
            .unwrap_or(window.messages.len())
            .min(window.messages.len());
        window.messages.truncate(point);
        window.recalculate_tokens();

        let topics = topic_labels(&topic);
        let topic_similarity = jaccard(&topics, &parent.topic_set());
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();

        let branch = ConversationBranch {
            id: id.clone(),
            parent_id: Some(parent_id.clone()),
            topic: topic.clone(),
            topics,
            reason,
            branch_point: point,
            created_at: now,
            window,
        };
        let depth = self.tree.insert(branch, topic_similarity)?;
        self.tree.set_active(&id)?;
        self.last_branch_at = Some(now);

        METRICS.record_branch_created(reason.as_str());
        info!(
            "Created branch {} ('{}') under {} at depth {} ({})",
            id,
            topic,
            parent_id,
            depth,
            reason.as_str()
        );
        Ok(id)
    }

    /// Activate `id` and bump its engagement
    pub fn switch_branch(&mut self, id: &str) -> Result<()> {
        self.tree.set_active(id)?;
        let node = self.tree.get_mut(id)?;
        node.metadata.last_activity = Utc::now();
        node.metadata.engagement = (node.metadata.engagement + ENGAGEMENT_STEP).min(1.0);
        debug!("Switched to branch {}", id);
        Ok(())
    }

    /// Remove `id` and its descendants; fails if any of them is active
    pub fn archive_branch(&mut self, id: &str) -> Result<Vec<String>> {
        let removed = self.tree.remove_subtree(id)?;
        METRICS.record_archived(removed.len());
        info!("Archived branch {} ({} branches removed)", id, removed.len());
        Ok(removed)
    }

    /// Related inactive branch pairs scoring above the quality threshold,
    /// best first
    pub fn find_merge_candidates(&self) -> Vec<MergeCandidate> {
        let inactive: Vec<_> = self.tree.nodes().filter(|n| !n.active).collect();
        let related_window = chrono::Duration::hours(self.config.related_window_hours);
        let mut candidates = Vec::new();

        for (i, a) in inactive.iter().enumerate() {
            for b in &inactive[i + 1..] {
                let a_id = a.branch.id.as_str();
                let b_id = b.branch.id.as_str();
                let gap = (a.branch.created_at - b.branch.created_at).abs();
                let same_parent = a.branch.parent_id.is_some() && a.branch.parent_id == b.branch.parent_id;
                let parent_child = a.branch.parent_id.as_deref() == Some(b_id)
                    || b.branch.parent_id.as_deref() == Some(a_id);
                let same_depth_recent = a.depth == b.depth && gap <= related_window;
                if !(same_parent || parent_child || same_depth_recent) {
                    continue;
                }

                let topic_overlap = jaccard(&a.topic_set(), &b.topic_set());
                let hours = gap.num_seconds() as f32 / 3600.0;
                let time_proximity = (1.0 - hours / 24.0).max(0.0);
                let quality = 0.7 * topic_overlap + 0.3 * time_proximity;
                if quality <= self.config.merge_quality_threshold {
                    continue;
                }

                // Ancestors absorb descendants; otherwise the smaller branch is folded in
                let (source, target) = if self.tree.is_ancestor(a_id, b_id) {
                    (b_id, a_id)
                } else if self.tree.is_ancestor(b_id, a_id) {
                    (a_id, b_id)
                } else if a.branch.window.messages.len() <= b.branch.window.messages.len() {
                    (a_id, b_id)
                } else {
                    (b_id, a_id)
                };

                candidates.push(MergeCandidate {
                    source_id: source.to_string(),
                    target_id: target.to_string(),
                    topic_overlap,
                    time_proximity,
                    quality,
                });
            }
        }

        candidates.sort_by(|x, y| {
            y.quality
                .partial_cmp(&x.quality)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.config.max_merge_candidates);
        candidates
    }

    /// Strategy for folding a source of `source_messages` messages with the
    /// given topic overlap
    pub fn merge_strategy(&self, topic_overlap: f32, source_messages: usize) -> MergeStrategy {
        if topic_overlap < CONTENT_MERGE_OVERLAP {
            MergeStrategy::SummaryMerge
        } else if source_messages <= self.config.full_merge_max_messages {
            MergeStrategy::FullMerge
        } else {
            MergeStrategy::SelectiveMerge
        }
    }

    /// Fold the candidate's source into its target, then archive the source
    pub fn merge_branches(
        &mut self,
        candidate: &MergeCandidate,
        estimator: &dyn TokenEstimator,
    ) -> Result<MergeOutcome> {
        let source = self.tree.get(&candidate.source_id)?;
        self.tree.get(&candidate.target_id)?;
        if candidate.source_id == candidate.target_id
            || self.tree.is_ancestor(&candidate.source_id, &candidate.target_id)
        {
            return Err(ContextError::Internal(format!(
                "cannot merge branch {} into {}",
                candidate.source_id, candidate.target_id
            )));
        }
        if self.tree.subtree_contains_active(&candidate.source_id) {
            return Err(ContextError::BranchActive(candidate.source_id.clone()));
        }

        let source_window = &source.branch.window;
        let strategy = self.merge_strategy(candidate.topic_overlap, source_window.messages.len());
        let incoming: Vec<EnhancedMessage> = match strategy {
            MergeStrategy::FullMerge => source_window.messages.clone(),
            MergeStrategy::SelectiveMerge => source_window
                .messages
                .iter()
                .filter(|m| m.importance > self.config.selective_importance_threshold)
                .cloned()
                .collect(),
            MergeStrategy::SummaryMerge => {
                vec![merge_summary_message(
                    &source.branch.topic,
                    source_window,
                    estimator,
                )]
            }
        };

        let messages_added = incoming.len();
        let target = self.window_mut(&candidate.target_id)?;
        target.messages.extend(incoming);
        target.messages.sort_by_key(|m| m.timestamp);
        target.recalculate_tokens();
        target.metadata.last_updated = Utc::now();

        let archived = self.tree.remove_subtree(&candidate.source_id)?;
        METRICS.record_merge(strategy.as_str());
        METRICS.record_archived(archived.len());
        info!(
            "Merged branch {} into {} ({}, {} messages)",
            candidate.source_id,
            candidate.target_id,
            strategy.as_str(),
            messages_added
        );

        Ok(MergeOutcome {
            source_id: candidate.source_id.clone(),
            target_id: candidate.target_id.clone(),
            strategy,
            messages_added,
            archived,
        })
    }

    /// Path, neighbouring branches and a resume suggestion for the active branch
    pub fn navigation(&self, now: DateTime<Utc>) -> Result<BranchNavigation> {
        let current = self.tree.active()?;
        let current_id = current.branch.id.clone();
        let current_topics = current.topic_set();

        let mut neighbours: Vec<(&BranchTreeNode, BranchRelation, usize)> = Vec::new();
        if let Some(parent) = current
            .branch
            .parent_id
            .as_deref()
            .and_then(|p| self.tree.get(p).ok())
        {
            neighbours.push((parent, BranchRelation::Parent, 1));
        }
        for child in &current.children {
            if let Ok(node) = self.tree.get(child) {
                neighbours.push((node, BranchRelation::Child, 1));
            }
        }
        for sibling in self.tree.siblings(&current_id) {
            neighbours.push((sibling, BranchRelation::Sibling, 2));
        }

        let mut options: Vec<NavigationOption> = neighbours
            .into_iter()
            .map(|(node, relation, distance)| {
                let relevance = jaccard(&current_topics, &node.topic_set());
                NavigationOption {
                    branch_id: node.branch.id.clone(),
                    topic: node.branch.topic.clone(),
                    relation,
                    distance,
                    relevance,
                    score: relevance - DISTANCE_PENALTY * distance as f32,
                }
            })
            .collect();
        options.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let suggestion = self
            .tree
            .nodes()
            .filter(|n| !n.active)
            .map(|node| {
                let similarity = jaccard(&current_topics, &node.topic_set());
                let hours = (now - node.metadata.last_activity).num_seconds().max(0) as f32 / 3600.0;
                let recency = (-hours / 24.0).exp();
                BranchSuggestion {
                    branch_id: node.branch.id.clone(),
                    topic: node.branch.topic.clone(),
                    score: 0.5 * similarity + 0.3 * node.metadata.engagement + 0.2 * recency,
                }
            })
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        Ok(BranchNavigation {
            path_to_root: self.tree.path_to_root(&current_id)?,
            current_branch_id: current_id,
            options,
            suggestion,
        })
    }
}

/// Topic labels from a comma-separated branch topic
fn topic_labels(topic: &str) -> BTreeSet<String> {
    topic
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn merge_summary_message(
    topic: &str,
    window: &ContextWindow,
    estimator: &dyn TokenEstimator,
) -> EnhancedMessage {
    let topics: Vec<String> = window.topics().into_iter().take(SUMMARY_MERGE_TOPICS).collect();
    let covering = if topics.is_empty() {
        "general discussion".to_string()
    } else {
        topics.join(", ")
    };
    let content = format!(
        "Merged branch '{}': {} messages covering {}",
        topic,
        window.messages.len(),
        covering
    );
    EnhancedMessage {
        id: uuid::Uuid::new_v4().to_string(),
        role: MessageRole::System,
        token_count: estimator.estimate(&content),
        content,
        timestamp: Utc::now(),
        importance: SUMMARY_MERGE_IMPORTANCE,
        context_relevance: 0.5,
        topics: topics.into_iter().collect(),
        entities: Vec::new(),
        sentiment: Sentiment::Neutral,
        metadata: MessageMetadata::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branching::tree::ROOT_BRANCH_ID;
    use crate::config::WindowConfig;
    use crate::context::token_estimator::HeuristicEstimator;
    use chrono::Duration;

    fn message(topics: &[&str], importance: f32) -> EnhancedMessage {
        EnhancedMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: "message".to_string(),
            timestamp: Utc::now(),
            token_count: 10,
            importance,
            context_relevance: 0.5,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            entities: Vec::new(),
            sentiment: Sentiment::Neutral,
            metadata: MessageMetadata::default(),
        }
    }

    fn manager() -> BranchManager {
        let mut window = ContextWindow::new("c1", &WindowConfig::default());
        for _ in 0..3 {
            window.push(message(&["travel"], 0.5));
        }
        BranchManager::new(BranchConfig::default(), window)
    }

    #[test]
    fn test_create_branch_snapshots_parent() {
        let mut m = manager();
        let id = m
            .create_branch("finance", BranchReason::TopicShift, None, None)
            .unwrap();
        assert_eq!(m.active_branch_id(), id);
        let node = m.tree().get(&id).unwrap();
        assert_eq!(node.depth, 1);
        assert_eq!(node.branch.window.messages.len(), 3);
        assert_eq!(node.branch.window.token_count, 30);
        assert_eq!(node.metadata.topic_similarity, 0.0);
        assert!(m.tree().is_consistent());
        assert!(m.last_branch_at().is_some());
    }

    #[test]
    fn test_branch_point_truncates_snapshot() {
        let mut m = manager();
        let id = m
            .create_branch("travel", BranchReason::Manual, Some(1), None)
            .unwrap();
        let node = m.tree().get(&id).unwrap();
        assert_eq!(node.branch.window.messages.len(), 1);
        assert_eq!(node.branch.branch_point, 1);
        assert_eq!(node.metadata.topic_similarity, 1.0);
    }

    #[test]
    fn test_create_branch_limits() {
        let mut m = manager();
        for _ in 0..3 {
            m.create_branch("deeper", BranchReason::Manual, None, None).unwrap();
        }
        assert!(matches!(
            m.create_branch("too deep", BranchReason::Manual, None, None),
            Err(ContextError::BranchLimit(_))
        ));
        assert!(matches!(
            m.create_branch("x", BranchReason::Manual, None, Some("missing")),
            Err(ContextError::BranchNotFound(_))
        ));
    }

    #[test]
    fn test_switch_bumps_engagement() {
        let mut m = manager();
        let id = m.create_branch("food", BranchReason::Manual, None, None).unwrap();
        m.switch_branch(ROOT_BRANCH_ID).unwrap();
        m.switch_branch(&id).unwrap();
        assert!((m.tree().get(&id).unwrap().metadata.engagement - 0.6).abs() < 1e-6);
        assert!(matches!(m.switch_branch("missing"), Err(ContextError::BranchNotFound(_))));
    }

    #[test]
    fn test_archive_active_branch_fails() {
        let mut m = manager();
        let id = m.create_branch("food", BranchReason::Manual, None, None).unwrap();
        assert!(matches!(m.archive_branch(&id), Err(ContextError::BranchActive(_))));
        m.switch_branch(ROOT_BRANCH_ID).unwrap();
        assert_eq!(m.archive_branch(&id).unwrap(), vec![id.clone()]);
        assert_eq!(m.branches().len(), 1);
    }

    #[test]
    fn test_merge_candidates_for_related_siblings() {
        let mut m = manager();
        let a = m.create_branch("food", BranchReason::Manual, None, None).unwrap();
        m.switch_branch(ROOT_BRANCH_ID).unwrap();
        let b = m.create_branch("food", BranchReason::Manual, None, None).unwrap();
        m.switch_branch(ROOT_BRANCH_ID).unwrap();

        let candidates = m.find_merge_candidates();
        let pair = candidates
            .iter()
            .find(|c| {
                (c.source_id == a && c.target_id == b) || (c.source_id == b && c.target_id == a)
            })
            .expect("sibling pair is a candidate");
        assert!((pair.topic_overlap - 1.0).abs() < 1e-6);
        assert!(pair.quality > 0.99);
        assert!(candidates.len() <= 5);
    }

    #[test]
    fn test_full_merge_combines_messages_and_archives_source() {
        let mut m = manager();
        let source = m.create_branch("travel", BranchReason::Manual, None, None).unwrap();
        m.window_mut(&source).unwrap().push(message(&["travel"], 0.5));
        m.switch_branch(ROOT_BRANCH_ID).unwrap();

        let target_before = m.active_window().unwrap().messages.len();
        let source_before = m.tree().get(&source).unwrap().branch.window.messages.len();
        let candidate = MergeCandidate {
            source_id: source.clone(),
            target_id: ROOT_BRANCH_ID.to_string(),
            topic_overlap: 0.8,
            time_proximity: 1.0,
            quality: 0.86,
        };
        let outcome = m.merge_branches(&candidate, &HeuristicEstimator::default()).unwrap();
        assert_eq!(outcome.strategy, MergeStrategy::FullMerge);
        assert_eq!(
            m.active_window().unwrap().messages.len(),
            target_before + source_before
        );
        assert!(m.branches().iter().all(|b| b.id != source));
        assert!(m.active_window().unwrap().is_chronological());
    }

    #[test]
    fn test_summary_and_selective_merges() {
        let mut m = manager();
        let source = m.create_branch("weather", BranchReason::Manual, Some(0), None).unwrap();
        m.window_mut(&source).unwrap().push(message(&["weather"], 0.5));
        m.switch_branch(ROOT_BRANCH_ID).unwrap();

        let candidate = MergeCandidate {
            source_id: source.clone(),
            target_id: ROOT_BRANCH_ID.to_string(),
            topic_overlap: 0.1,
            time_proximity: 1.0,
            quality: 0.37,
        };
        let outcome = m.merge_branches(&candidate, &HeuristicEstimator::default()).unwrap();
        assert_eq!(outcome.strategy, MergeStrategy::SummaryMerge);
        assert_eq!(outcome.messages_added, 1);
        let last = m.active_window().unwrap().messages.last().unwrap().clone();
        assert_eq!(last.role, MessageRole::System);
        assert!(last.content.starts_with("Merged branch 'weather': 1 messages covering weather"));

        assert_eq!(m.merge_strategy(0.9, 21), MergeStrategy::SelectiveMerge);
        assert_eq!(m.merge_strategy(0.9, 20), MergeStrategy::FullMerge);
    }

    #[test]
    fn test_selective_merge_keeps_important_messages() {
        let mut m = manager();
        let source = m.create_branch("budget", BranchReason::Manual, Some(0), None).unwrap();
        // Interleaves with the three main messages once merged
        let start = Utc::now() - Duration::hours(1);
        {
            let window = m.window_mut(&source).unwrap();
            for i in 0..24 {
                let importance = if i % 3 == 0 { 0.9 } else { 0.3 };
                let mut msg = message(&["budget"], importance);
                msg.timestamp = start + Duration::minutes(i * 5);
                window.push(msg);
            }
        }
        m.switch_branch(ROOT_BRANCH_ID).unwrap();

        let target_before = m.active_window().unwrap().messages.len();
        let candidate = MergeCandidate {
            source_id: source.clone(),
            target_id: ROOT_BRANCH_ID.to_string(),
            topic_overlap: 0.9,
            time_proximity: 1.0,
            quality: 0.93,
        };
        let outcome = m.merge_branches(&candidate, &HeuristicEstimator::default()).unwrap();

        assert_eq!(outcome.strategy, MergeStrategy::SelectiveMerge);
        assert_eq!(outcome.messages_added, 8);
        assert_eq!(outcome.archived, vec![source.clone()]);

        let target = m.active_window().unwrap();
        assert_eq!(target.messages.len(), target_before + 8);
        let merged: Vec<_> = target
            .messages
            .iter()
            .filter(|msg| msg.topics.contains("budget"))
            .collect();
        assert_eq!(merged.len(), 8);
        assert!(merged.iter().all(|msg| msg.importance > 0.6));
        assert!(target.is_chronological());
        assert_eq!(target.token_count, (target_before + 8) * 10);
        assert!(m.branches().iter().all(|b| b.id != source));
    }

    #[test]
    fn test_merge_with_active_source_fails() {
        let mut m = manager();
        let source = m.create_branch("food", BranchReason::Manual, None, None).unwrap();
        let candidate = MergeCandidate {
            source_id: source,
            target_id: ROOT_BRANCH_ID.to_string(),
            topic_overlap: 0.9,
            time_proximity: 1.0,
            quality: 0.93,
        };
        assert!(matches!(
            m.merge_branches(&candidate, &HeuristicEstimator::default()),
            Err(ContextError::BranchActive(_))
        ));
    }

    #[test]
    fn test_navigation() {
        let mut m = manager();
        let child = m.create_branch("travel", BranchReason::Manual, None, None).unwrap();
        m.switch_branch(ROOT_BRANCH_ID).unwrap();
        let _other = m.create_branch("finance", BranchReason::Manual, Some(0), None).unwrap();
        m.switch_branch(&child).unwrap();

        let nav = m.navigation(Utc::now() + Duration::minutes(1)).unwrap();
        assert_eq!(nav.current_branch_id, child);
        assert_eq!(nav.path_to_root, vec![child.clone(), ROOT_BRANCH_ID.to_string()]);
        assert_eq!(nav.options[0].relation, BranchRelation::Parent);
        assert!(nav.options.iter().any(|o| o.relation == BranchRelation::Sibling));
        assert_eq!(
            nav.suggestion.map(|s| s.branch_id),
            Some(ROOT_BRANCH_ID.to_string())
        );
    }
}
