//! Conversation branching
//!
//! A topic shift (or an explicit request) forks the active window into a new
//! branch. Branches form a tree that can be navigated, merged and archived.

pub mod manager;
pub mod topic_shift;
pub mod tree;

pub use manager::{
    BranchManager, BranchNavigation, BranchRelation, BranchSuggestion, MergeCandidate,
    MergeOutcome, MergeStrategy, NavigationOption,
};
pub use topic_shift::{
    BranchState, RecommendedAction, ShiftSignals, ShiftType, TopicShiftAnalysis,
    TopicShiftDetector,
};
pub use tree::{
    BranchInfo, BranchNodeMetadata, BranchReason, BranchTree, BranchTreeNode,
    ConversationBranch, ROOT_BRANCH_ID,
};
