//! Arena-backed branch tree
//!
//! Nodes live in an insertion-ordered map keyed by branch id. Parent and
//! child links are ids, so the tree serializes as plain data and cannot form
//! reference cycles.

use crate::context::models::ContextWindow;
use crate::error::{ContextError, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Id of the main conversation branch
pub const ROOT_BRANCH_ID: &str = "main";

/// Why a branch exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchReason {
    /// The main conversation
    Root,
    TopicShift,
    UserRequest,
    ContextOverflow,
    Manual,
}

impl BranchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchReason::Root => "root",
            BranchReason::TopicShift => "topic_shift",
            BranchReason::UserRequest => "user_request",
            BranchReason::ContextOverflow => "context_overflow",
            BranchReason::Manual => "manual",
        }
    }
}

/// A forked sub-conversation and its window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBranch {
    pub id: String,
    pub parent_id: Option<String>,
    pub topic: String,
    pub topics: BTreeSet<String>,
    pub reason: BranchReason,
    /// Number of parent messages the branch was forked after
    pub branch_point: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub window: ContextWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchNodeMetadata {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: DateTime<Utc>,
    /// Grows each time the branch is switched to (0.0-1.0)
    pub engagement: f32,
    /// Topic overlap with the parent at creation
    pub topic_similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchTreeNode {
    pub branch: ConversationBranch,
    pub children: Vec<String>,
    pub depth: usize,
    pub active: bool,
    pub metadata: BranchNodeMetadata,
}

impl BranchTreeNode {
    /// Branch topics together with the topics of its live messages
    pub fn topic_set(&self) -> BTreeSet<String> {
        let mut topics = self.branch.topics.clone();
        topics.extend(self.branch.window.topics());
        topics
    }
}

/// Public view of a branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchInfo {
    pub id: String,
    pub parent_id: Option<String>,
    pub topic: String,
    pub reason: BranchReason,
    pub depth: usize,
    pub active: bool,
    pub children: Vec<String>,
    pub message_count: usize,
    pub token_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub engagement: f32,
    pub topic_similarity: f32,
}

impl From<&BranchTreeNode> for BranchInfo {
    fn from(node: &BranchTreeNode) -> Self {
        Self {
            id: node.branch.id.clone(),
            parent_id: node.branch.parent_id.clone(),
            topic: node.branch.topic.clone(),
            reason: node.branch.reason,
            depth: node.depth,
            active: node.active,
            children: node.children.clone(),
            message_count: node.branch.window.messages.len(),
            token_count: node.branch.window.token_count,
            created_at: node.branch.created_at,
            last_activity: node.metadata.last_activity,
            engagement: node.metadata.engagement,
            topic_similarity: node.metadata.topic_similarity,
        }
    }
}

/// Tree of branches with exactly one active node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchTree {
    nodes: IndexMap<String, BranchTreeNode>,
    active_id: String,
}

impl BranchTree {
    /// A tree holding only the active main branch
    pub fn new(window: ContextWindow) -> Self {
        let now = Utc::now();
        let root = BranchTreeNode {
            branch: ConversationBranch {
                id: ROOT_BRANCH_ID.to_string(),
                parent_id: None,
                topic: "main".to_string(),
                topics: BTreeSet::new(),
                reason: BranchReason::Root,
                branch_point: 0,
                created_at: now,
                window,
            },
            children: Vec::new(),
            depth: 0,
            active: true,
            metadata: BranchNodeMetadata {
                last_activity: now,
                engagement: 1.0,
                topic_similarity: 1.0,
            },
        };
        let mut nodes = IndexMap::new();
        nodes.insert(ROOT_BRANCH_ID.to_string(), root);
        Self {
            nodes,
            active_id: ROOT_BRANCH_ID.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<&BranchTreeNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| ContextError::BranchNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut BranchTreeNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| ContextError::BranchNotFound(id.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &BranchTreeNode> {
        self.nodes.values()
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> Result<&BranchTreeNode> {
        self.get(&self.active_id)
    }

    pub fn active_mut(&mut self) -> Result<&mut BranchTreeNode> {
        let id = self.active_id.clone();
        self.get_mut(&id)
    }

    /// Register `branch` as a child of its parent; returns the new depth
    pub fn insert(&mut self, branch: ConversationBranch, topic_similarity: f32) -> Result<usize> {
        let parent_id = branch
            .parent_id
            .clone()
            .ok_or_else(|| ContextError::Internal("branch has no parent".to_string()))?;
        let parent = self.get_mut(&parent_id)?;
        let depth = parent.depth + 1;
        parent.children.push(branch.id.clone());

        let node = BranchTreeNode {
            metadata: BranchNodeMetadata {
                last_activity: branch.created_at,
                engagement: 0.5,
                topic_similarity,
            },
            branch,
            children: Vec::new(),
            depth,
            active: false,
        };
        self.nodes.insert(node.branch.id.clone(), node);
        Ok(depth)
    }

    /// Make `id` the single active node
    pub fn set_active(&mut self, id: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(ContextError::BranchNotFound(id.to_string()));
        }
        if let Some(current) = self.nodes.get_mut(&self.active_id) {
            current.active = false;
        }
        if let Some(target) = self.nodes.get_mut(id) {
            target.active = true;
        }
        self.active_id = id.to_string();
        Ok(())
    }

    /// Ids from `id` up to the root, inclusive
    pub fn path_to_root(&self, id: &str) -> Result<Vec<String>> {
        let mut path = Vec::new();
        let mut current = Some(self.get(id)?);
        while let Some(node) = current {
            path.push(node.branch.id.clone());
            current = node
                .branch
                .parent_id
                .as_deref()
                .and_then(|parent| self.nodes.get(parent));
        }
        Ok(path)
    }

    pub fn is_ancestor(&self, ancestor: &str, of: &str) -> bool {
        self.path_to_root(of)
            .map(|path| path.iter().skip(1).any(|id| id == ancestor))
            .unwrap_or(false)
    }

    /// Ids of all descendants of `id`, children before their parents
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(node) = self.nodes.get(id) {
            for child in &node.children {
                out.extend(self.descendants(child));
                out.push(child.clone());
            }
        }
        out
    }

    /// Whether `id` or any descendant is the active node
    pub fn subtree_contains_active(&self, id: &str) -> bool {
        id == self.active_id || self.descendants(id).iter().any(|d| *d == self.active_id)
    }

    /// Nodes sharing a parent with `id`
    pub fn siblings(&self, id: &str) -> Vec<&BranchTreeNode> {
        let Some(parent_id) = self.nodes.get(id).and_then(|n| n.branch.parent_id.as_deref()) else {
            return Vec::new();
        };
        self.nodes
            .get(parent_id)
            .map(|parent| {
                parent
                    .children
                    .iter()
                    .filter(|child| child.as_str() != id)
                    .filter_map(|child| self.nodes.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Detach `id` from its parent and remove it with all descendants.
    ///
    /// Fails if the subtree holds the active node. Returns removed ids,
    /// descendants first.
    pub fn remove_subtree(&mut self, id: &str) -> Result<Vec<String>> {
        let parent_id = self.get(id)?.branch.parent_id.clone();
        if self.subtree_contains_active(id) {
            return Err(ContextError::BranchActive(id.to_string()));
        }

        if let Some(parent) = parent_id.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| child != id);
        }

        let mut removed = self.descendants(id);
        removed.push(id.to_string());
        for node_id in &removed {
            self.nodes.shift_remove(node_id);
        }
        Ok(removed)
    }

    /// Structural invariants: one active node, consistent links
    pub fn is_consistent(&self) -> bool {
        let active = self.nodes.values().filter(|n| n.active).count();
        let links = self.nodes.values().all(|node| {
            node.children.iter().all(|child| {
                self.nodes
                    .get(child)
                    .map_or(false, |c| c.branch.parent_id.as_deref() == Some(node.branch.id.as_str()))
            })
        });
        active == 1
            && self
                .nodes
                .get(&self.active_id)
                .map_or(false, |n| n.active)
            && links
    }
}
