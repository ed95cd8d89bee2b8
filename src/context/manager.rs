//! Per-conversation context manager
//!
//! Owns one conversation's branch tree (each branch carries its own window)
//! and summary cache, and exposes the operations a chat application calls on
//! every turn:
//! - enhancing and appending messages, with topic shift detection
//! - optimizing windows that outgrow their budget
//! - projecting the active window into a model-ready sequence
//! - branch creation, switching, merging and archival
//!
//! State changes are persisted through the fire-and-forget writer; a
//! persistence outage is logged and never fails a call.

use super::enhancer::MessageEnhancer;
use super::models::{
    ContextStats, ContextWindow, EnhancedMessage, IncomingMessage, MessageRole, ModelMessage,
};
use super::token_estimator::build_estimator;
use super::window::OptimizeTrigger;
use crate::branching::{
    BranchInfo, BranchManager, BranchNavigation, BranchReason, MergeCandidate, MergeOutcome,
    RecommendedAction, TopicShiftAnalysis, TopicShiftDetector, ROOT_BRANCH_ID,
};
use crate::config::Config;
use crate::error::{ContextError, Result};
use crate::metrics::METRICS;
use crate::persistence::{build_store, ContextStore, PersistenceWriter, WindowState, STATE_VERSION};
use crate::summarization::{
    ConversationSummarizer, LanguageModel, LlmClient, SummaryCache, SummaryHints,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Collaborators shared by every conversation
#[derive(Clone)]
pub struct ContextServices {
    pub config: Arc<Config>,
    pub enhancer: MessageEnhancer,
    pub summarizer: Arc<ConversationSummarizer>,
    pub store: Arc<dyn ContextStore>,
    pub writer: PersistenceWriter,
}

impl ContextServices {
    /// Wire services around an explicit model and store.
    ///
    /// Spawns the persistence writer, so a tokio runtime must be running.
    pub fn new(
        config: Config,
        model: Option<Arc<dyn LanguageModel>>,
        store: Arc<dyn ContextStore>,
    ) -> Result<Self> {
        config.validate()?;
        let estimator = build_estimator(config.window.estimator)?;
        let enhancer = MessageEnhancer::with_defaults(estimator.clone());
        let summarizer = ConversationSummarizer::new(
            config.summarization.clone(),
            model,
            estimator,
            enhancer.topic_extractor().clone(),
        );
        let writer = PersistenceWriter::spawn(store.clone(), config.persistence.queue_capacity);

        Ok(Self {
            config: Arc::new(config),
            enhancer,
            summarizer: Arc::new(summarizer),
            store,
            writer,
        })
    }

    /// Model client and store as configured
    pub fn from_config(config: Config) -> Result<Self> {
        let model: Option<Arc<dyn LanguageModel>> = if config.llm.enabled {
            Some(Arc::new(LlmClient::new(&config.llm)?))
        } else {
            None
        };
        let store = build_store(&config.persistence);
        Self::new(config, model, store)
    }
}

/// Result of appending a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMessageOutcome {
    pub message: EnhancedMessage,
    /// An optimization pass ran before returning
    pub optimized: bool,
    pub topic_shift: Option<TopicShiftAnalysis>,
    /// Set when the message opened a new branch
    pub branch_created: Option<String>,
    pub recommended_action: RecommendedAction,
    pub active_branch_id: String,
}

/// What an optimization pass did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub trigger: OptimizeTrigger,
    pub summarized: usize,
    pub pruned: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub duration_ms: u64,
}

/// Full state dump for backup or analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextExport {
    pub conversation_id: String,
    pub exported_at: DateTime<Utc>,
    pub stats: ContextStats,
    pub state: WindowState,
}

pub struct ContextManager {
    conversation_id: String,
    services: ContextServices,
    detector: TopicShiftDetector,
    cache: SummaryCache,
    branches: Option<BranchManager>,
}

impl ContextManager {
    pub fn new(conversation_id: impl Into<String>, services: ContextServices) -> Self {
        let detector = TopicShiftDetector::new(
            services.config.topic_shift.clone(),
            services.config.branching.clone(),
        );
        let cache = SummaryCache::new(services.config.summarization.cache_capacity);
        Self {
            conversation_id: conversation_id.into(),
            services,
            detector,
            cache,
            branches: None,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn is_initialized(&self) -> bool {
        self.branches.is_some()
    }

    fn branches(&self) -> Result<&BranchManager> {
        self.branches.as_ref().ok_or(ContextError::NotInitialized)
    }

    fn branches_mut(&mut self) -> Result<&mut BranchManager> {
        self.branches.as_mut().ok_or(ContextError::NotInitialized)
    }

    /// The active branch's window
    pub fn active_window(&self) -> Result<&ContextWindow> {
        self.branches()?.active_window()
    }

    /// Load persisted state, or start a fresh window from `existing`.
    ///
    /// A failed load is logged and treated as absent.
    pub async fn initialize_context(
        &mut self,
        existing: Vec<IncomingMessage>,
    ) -> Result<&ContextWindow> {
        let loaded = match self.services.store.load(&self.conversation_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "Failed to load context for {}: {}, starting fresh",
                    self.conversation_id, e
                );
                METRICS.record_persistence_failure("load");
                None
            }
        };

        if let Some(state) = loaded {
            info!(
                "Restored context for {} ({} branches)",
                self.conversation_id,
                state.tree.len()
            );
            self.cache.clear();
            self.cache.restore(state.summary_cache).await;
            self.branches = Some(BranchManager::from_parts(
                self.services.config.branching.clone(),
                state.tree,
                state.last_branch_at,
            ));
            return self.active_window();
        }

        let config = &self.services.config;
        let mut window = ContextWindow::new(self.conversation_id.clone(), &config.window);
        for incoming in existing {
            let enhanced = self.services.enhancer.enhance(incoming, window.last_message());
            window.push(enhanced);
        }
        let seeded = window.messages.len();
        self.branches = Some(BranchManager::new(config.branching.clone(), window));
        info!(
            "Initialized context for {} with {} messages",
            self.conversation_id, seeded
        );

        self.optimize_if_needed(ROOT_BRANCH_ID).await?;
        self.persist();
        self.active_window()
    }

    /// Enhance and append a message, then branch and optimize as needed
    pub async fn add_message(&mut self, incoming: IncomingMessage) -> Result<AddMessageOutcome> {
        let now = Utc::now();
        let branches = self.branches.as_mut().ok_or(ContextError::NotInitialized)?;
        let state = branches.state();
        let receiving_id = branches.active_branch_id().to_string();
        let window = branches.window_mut(&receiving_id)?;

        let mut message = self.services.enhancer.enhance(incoming, window.last_message());
        let topic_shift = (message.role == MessageRole::User)
            .then(|| self.detector.analyze(&message, &window.messages, &state, now));
        let recommended_action = topic_shift
            .as_ref()
            .map(|a| a.recommended_action)
            .unwrap_or_default();
        let branch_wanted = recommended_action == RecommendedAction::Branch;
        if branch_wanted {
            message.metadata.context_switch = true;
        }

        window.push(message.clone());
        METRICS.record_message(message.role.as_str(), window.token_count);
        debug!(
            "Added {} message {} to {} ({} tokens in window)",
            message.role, message.id, self.conversation_id, window.token_count
        );

        let mut branch_created = None;
        if let Some(analysis) = topic_shift.as_ref().filter(|a| a.detected) {
            match recommended_action {
                RecommendedAction::Branch => {
                    let topics = if analysis.new_topics.is_empty() {
                        &message.topics
                    } else {
                        &analysis.new_topics
                    };
                    let topic = topics.iter().cloned().collect::<Vec<_>>().join(", ");
                    match branches.create_branch(topic, BranchReason::TopicShift, None, None) {
                        Ok(id) => branch_created = Some(id),
                        Err(e) => warn!("Topic shift branch not created: {}", e),
                    }
                }
                RecommendedAction::Merge | RecommendedAction::Archive => {
                    info!(
                        "Topic shift in {} ({:?}, confidence {:.2}): recommend {}",
                        self.conversation_id,
                        analysis.shift_type,
                        analysis.confidence,
                        recommended_action.as_str()
                    );
                }
                RecommendedAction::Continue => {}
            }
        }

        // The window that received the message, and a branch forked from it,
        // are both held to the limits
        let mut optimized = self.optimize_if_needed(&receiving_id).await?;
        if let Some(id) = branch_created.as_deref() {
            optimized |= self.optimize_if_needed(id).await?;
        }

        self.persist();
        Ok(AddMessageOutcome {
            message,
            optimized,
            topic_shift,
            branch_created,
            recommended_action,
            active_branch_id: self.branches()?.active_branch_id().to_string(),
        })
    }

    /// Optimize the active window regardless of triggers
    pub async fn force_optimization(&mut self) -> Result<OptimizationReport> {
        let active_id = self.branches()?.active_branch_id().to_string();
        let report = self
            .run_optimization(&active_id, OptimizeTrigger::Forced)
            .await?;
        self.persist();
        Ok(report)
    }

    /// Optimize `branch_id`'s window when it is over a limit; returns whether
    /// a pass ran
    async fn optimize_if_needed(&mut self, branch_id: &str) -> Result<bool> {
        let trigger = self
            .branches()?
            .tree()
            .get(branch_id)?
            .branch
            .window
            .optimization_trigger(&self.services.config.window);
        match trigger {
            Some(trigger) => {
                self.run_optimization(branch_id, trigger).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Summarize old messages, prune by importance if still over budget and
    /// recount tokens
    async fn run_optimization(
        &mut self,
        branch_id: &str,
        trigger: OptimizeTrigger,
    ) -> Result<OptimizationReport> {
        let started = Instant::now();
        let now = Utc::now();
        let Self {
            branches,
            services,
            cache,
            conversation_id,
            ..
        } = self;
        let config = &services.config.window;
        let window = branches
            .as_mut()
            .ok_or(ContextError::NotInitialized)?
            .window_mut(branch_id)?;
        let tokens_before = window.token_count;

        let candidates = window.summarization_candidates(config, now);
        let mut summarized = 0;
        if !candidates.is_empty() {
            let taken = window.take_messages(&candidates);
            let previous = window.summary.clone();
            let target = services
                .config
                .summarization
                .max_summary_tokens
                .min(window.usable_tokens(config) / 4)
                .max(1);
            let hints = SummaryHints {
                strategy: None,
                target_tokens: Some(target),
            };
            let key = SummaryCache::fingerprint(
                &taken,
                previous.as_ref(),
                services.summarizer.strategy(&hints),
            );

            let summary = match cache.get(&key).await {
                Some(summary) => {
                    debug!("Summary cache hit for {}", conversation_id);
                    summary
                }
                None => {
                    let summary = services
                        .summarizer
                        .summarize_with_previous(previous.as_ref(), &taken, &hints)
                        .await;
                    cache.insert(key, summary.clone()).await;
                    summary
                }
            };
            summarized = taken.len();
            window.set_summary(summary);
            window.recalculate_tokens();
        }

        let mut pruned = 0;
        if window.messages.len() > window.max_window_size
            || window.token_count > window.usable_tokens(config)
        {
            pruned = window.prune_by_importance(config, now);
        }

        window.finish_optimization();
        let tokens_after = window.token_count;
        let elapsed = started.elapsed();
        METRICS.record_optimization(elapsed.as_secs_f64());
        info!(
            "Optimized {} ({:?}): summarized {}, pruned {}, tokens {} -> {}",
            conversation_id, trigger, summarized, pruned, tokens_before, tokens_after
        );

        Ok(OptimizationReport {
            trigger,
            summarized,
            pruned,
            tokens_before,
            tokens_after,
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    /// Model-ready sequence for the active window
    pub fn get_context_for_model(&self) -> Result<Vec<ModelMessage>> {
        let window = self.active_window()?;
        Ok(window.model_context(
            &self.services.config.window,
            self.services.enhancer.estimator().as_ref(),
        ))
    }

    /// Fork a branch and make it active
    pub fn create_conversation_branch(
        &mut self,
        topic: impl Into<String>,
        reason: BranchReason,
        branch_point: Option<usize>,
        parent_id: Option<&str>,
    ) -> Result<String> {
        let id = self
            .branches_mut()?
            .create_branch(topic, reason, branch_point, parent_id)?;
        self.persist();
        Ok(id)
    }

    pub fn switch_to_branch(&mut self, branch_id: &str) -> Result<&ContextWindow> {
        self.branches_mut()?.switch_branch(branch_id)?;
        self.persist();
        self.active_window()
    }

    pub fn get_branches(&self) -> Result<Vec<BranchInfo>> {
        Ok(self.branches()?.branches())
    }

    /// Remove a branch and its descendants; returns removed ids
    pub fn archive_branch(&mut self, branch_id: &str) -> Result<Vec<String>> {
        let removed = self.branches_mut()?.archive_branch(branch_id)?;
        self.persist();
        Ok(removed)
    }

    pub fn find_merge_candidates(&self) -> Result<Vec<MergeCandidate>> {
        Ok(self.branches()?.find_merge_candidates())
    }

    /// Merge and, when the active window absorbed the source, re-optimize it
    pub async fn merge_branches(&mut self, candidate: &MergeCandidate) -> Result<MergeOutcome> {
        let estimator = self.services.enhancer.estimator().clone();
        let outcome = self
            .branches_mut()?
            .merge_branches(candidate, estimator.as_ref())?;

        self.optimize_if_needed(&outcome.target_id).await?;
        self.persist();
        Ok(outcome)
    }

    pub fn navigation(&self) -> Result<BranchNavigation> {
        self.branches()?.navigation(Utc::now())
    }

    pub fn get_context_stats(&self) -> Result<ContextStats> {
        let branches = self.branches()?;
        let window = branches.active_window()?;
        let token_efficiency = if window.token_count == 0 {
            0.0
        } else {
            window.metadata.tokens_ingested as f32 / window.token_count as f32
        };

        Ok(ContextStats {
            conversation_id: self.conversation_id.clone(),
            active_branch_id: Some(branches.active_branch_id().to_string()),
            message_count: window.messages.len(),
            token_count: window.token_count,
            summarized_message_count: window
                .summary
                .as_ref()
                .map_or(0, |s| s.summarized_message_ids.len()),
            summary_count: self.cache.len(),
            branch_count: branches.tree().len(),
            average_importance: window.average_importance(),
            token_efficiency,
            optimization_count: window.metadata.optimization_count,
        })
    }

    /// Delete persisted state and reset to uninitialized
    pub async fn clear_persisted_data(&mut self) -> Result<()> {
        self.services.writer.delete(self.conversation_id.clone()).await;
        self.services.writer.flush().await;
        self.cache.clear();
        self.branches = None;
        info!("Cleared context for {}", self.conversation_id);
        Ok(())
    }

    pub fn export_context(&self) -> Result<ContextExport> {
        Ok(ContextExport {
            conversation_id: self.conversation_id.clone(),
            exported_at: Utc::now(),
            stats: self.get_context_stats()?,
            state: self.snapshot()?,
        })
    }

    /// Wait for queued persistence jobs
    pub async fn flush(&self) {
        self.services.writer.flush().await;
    }

    fn snapshot(&self) -> Result<WindowState> {
        let branches = self.branches()?;
        Ok(WindowState {
            conversation_id: self.conversation_id.clone(),
            version: STATE_VERSION,
            tree: branches.tree().clone(),
            summary_cache: self.cache.snapshot(),
            last_branch_at: branches.last_branch_at(),
            saved_at: Utc::now(),
        })
    }

    fn persist(&self) {
        match self.snapshot() {
            Ok(state) => self.services.writer.save(state),
            Err(e) => debug!("Nothing to persist for {}: {}", self.conversation_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowConfig;
    use crate::persistence::MemoryStore;
    use crate::summarization::SummarizationStrategy;

    fn services(store: Arc<dyn ContextStore>) -> ContextServices {
        let mut config = Config::default();
        config.window = WindowConfig {
            max_window_size: 10,
            max_tokens: 1000,
            token_buffer: 200,
            ..WindowConfig::default()
        };
        config.summarization.strategy = SummarizationStrategy::Extractive;
        ContextServices::new(config, None, store).unwrap()
    }

    fn weather(i: usize) -> IncomingMessage {
        IncomingMessage::assistant(format!(
            "Update {i}: the weather forecast shows light rain this afternoon with temperatures \
            around fifteen degrees and clearing skies expected by the evening hours."
        ))
    }

    #[tokio::test]
    async fn test_operations_require_initialization() {
        let mut manager = ContextManager::new("c1", services(Arc::new(MemoryStore::new())));
        assert!(matches!(
            manager.add_message(IncomingMessage::user("hi")).await,
            Err(ContextError::NotInitialized)
        ));
        assert!(matches!(
            manager.force_optimization().await,
            Err(ContextError::NotInitialized)
        ));
        assert!(matches!(
            manager.get_context_for_model(),
            Err(ContextError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_initialize_with_existing_messages() {
        let mut manager = ContextManager::new("c1", services(Arc::new(MemoryStore::new())));
        let window = manager
            .initialize_context(vec![
                IncomingMessage::user("Plan a trip to Rome"),
                IncomingMessage::assistant("Sure, when would you like to travel?"),
            ])
            .await
            .unwrap();
        assert_eq!(window.messages.len(), 2);
        let sum: usize = window.messages.iter().map(|m| m.token_count).sum();
        assert_eq!(window.token_count, sum);
    }

    #[tokio::test]
    async fn test_optimizes_on_message_count() {
        let mut manager = ContextManager::new("c1", services(Arc::new(MemoryStore::new())));
        manager.initialize_context(Vec::new()).await.unwrap();

        for i in 0..10 {
            let outcome = manager.add_message(weather(i)).await.unwrap();
            assert!(!outcome.optimized);
        }
        let outcome = manager.add_message(weather(10)).await.unwrap();
        assert!(outcome.optimized);

        let window = manager.active_window().unwrap();
        assert!(window.messages.len() <= 10);
        assert!(window.summary.is_some());
        let expected: usize = window.messages.iter().map(|m| m.token_count).sum::<usize>()
            + window.summary.as_ref().map_or(0, |s| s.token_count);
        assert_eq!(window.token_count, expected);
        assert!(window.is_chronological());

        let stats = manager.get_context_stats().unwrap();
        assert_eq!(stats.summarized_message_count, 5);
        assert_eq!(stats.summary_count, 1);
        assert!(stats.token_efficiency > 0.0);
    }

    #[tokio::test]
    async fn test_topic_shift_creates_branch() {
        let mut manager = ContextManager::new("c1", services(Arc::new(MemoryStore::new())));
        manager.initialize_context(Vec::new()).await.unwrap();
        for _ in 0..5 {
            manager
                .add_message(IncomingMessage::user("Book a flight and a hotel for the trip"))
                .await
                .unwrap();
        }
        let outcome = manager
            .add_message(IncomingMessage::user("How should I invest my savings in the stock market"))
            .await
            .unwrap();

        assert_eq!(outcome.recommended_action, RecommendedAction::Branch);
        let branch_id = outcome.branch_created.clone().unwrap();
        assert_eq!(outcome.active_branch_id, branch_id);
        assert!(outcome.message.metadata.context_switch);
        assert_eq!(manager.get_branches().unwrap().len(), 2);

        // The triggering message lives in both windows
        assert_eq!(manager.active_window().unwrap().messages.len(), 6);
        manager.switch_to_branch(ROOT_BRANCH_ID).unwrap();
        assert_eq!(manager.active_window().unwrap().messages.len(), 6);
    }

    #[tokio::test]
    async fn test_branching_message_optimizes_parent_window() {
        let mut manager = ContextManager::new("c1", services(Arc::new(MemoryStore::new())));
        manager.initialize_context(Vec::new()).await.unwrap();
        for _ in 0..10 {
            let outcome = manager
                .add_message(IncomingMessage::user("Book a flight and a hotel for the trip"))
                .await
                .unwrap();
            assert!(outcome.branch_created.is_none());
            assert!(!outcome.optimized);
        }

        // The eleventh message both overflows main and opens a branch
        let outcome = manager
            .add_message(IncomingMessage::user("How should I invest my savings in the stock market"))
            .await
            .unwrap();
        let branch_id = outcome.branch_created.clone().unwrap();
        assert!(outcome.optimized);

        let branch = manager.active_window().unwrap();
        assert!(branch.messages.len() <= 10);

        manager.switch_to_branch(ROOT_BRANCH_ID).unwrap();
        let main = manager.active_window().unwrap();
        assert!(main.messages.len() <= 10, "main kept {} messages", main.messages.len());
        assert!(main.summary.is_some());
        assert!(main.is_chronological());
        let stats = manager.get_context_stats().unwrap();
        assert!(stats.optimization_count >= 1);
        assert_ne!(stats.active_branch_id.as_deref(), Some(branch_id.as_str()));
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let store: Arc<dyn ContextStore> = Arc::new(MemoryStore::new());
        let mut manager = ContextManager::new("c1", services(store.clone()));
        manager.initialize_context(Vec::new()).await.unwrap();
        manager.add_message(weather(0)).await.unwrap();
        let branch = manager
            .create_conversation_branch("side", BranchReason::UserRequest, None, None)
            .unwrap();
        manager.flush().await;

        let mut restored = ContextManager::new("c1", services(store));
        restored.initialize_context(Vec::new()).await.unwrap();
        assert_eq!(restored.get_branches().unwrap().len(), 2);
        assert_eq!(restored.get_context_stats().unwrap().active_branch_id, Some(branch));
    }

    #[tokio::test]
    async fn test_clear_persisted_data() {
        let store = Arc::new(MemoryStore::new());
        let mut manager = ContextManager::new("c1", services(store.clone()));
        manager.initialize_context(Vec::new()).await.unwrap();
        manager.add_message(weather(0)).await.unwrap();
        manager.flush().await;
        assert_eq!(store.len(), 1);

        manager.clear_persisted_data().await.unwrap();
        assert!(store.is_empty());
        assert!(!manager.is_initialized());
    }

    #[tokio::test]
    async fn test_export_contains_tree() {
        let mut manager = ContextManager::new("c1", services(Arc::new(MemoryStore::new())));
        manager.initialize_context(Vec::new()).await.unwrap();
        manager.add_message(weather(0)).await.unwrap();
        let export = manager.export_context().unwrap();
        assert_eq!(export.state.tree.len(), 1);
        assert_eq!(export.stats.message_count, 1);
        assert!(serde_json::to_string(&export).is_ok());
    }
}
