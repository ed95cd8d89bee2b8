//! Strategy dispatch for conversation summaries

use super::analysis::{cluster_messages, derive_context, MessageCluster, SummarizationContext};
use super::extractive::{best_sentence, extract, truncate_to_tokens, ExtractParams, Extraction};
use super::model::{LanguageModel, ModelError};
use super::quality::SummaryQuality;
use super::templates::SummaryTemplate;
use super::SummarizationStrategy;
use crate::config::SummarizationConfig;
use crate::context::enhancer::TopicExtractor;
use crate::context::models::{
    ContextSummary, EnhancedMessage, MessageMetadata, MessageRole, Sentiment,
};
use crate::context::token_estimator::TokenEstimator;
use crate::metrics::METRICS;
use chrono::Utc;
use futures::future::join_all;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence assigned to model-written text
const ABSTRACTIVE_CONFIDENCE: f32 = 0.8;
const TEMPLATE_CONFIDENCE: f32 = 0.6;
/// Importance given to a previous summary folded into a new one
const PREVIOUS_SUMMARY_IMPORTANCE: f32 = 0.75;
const HYBRID_KEY_CLUSTERS: usize = 3;
const HYBRID_MESSAGES_PER_CLUSTER: usize = 2;
const PROMPT_POINTS_PER_CLUSTER: usize = 3;

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct SummaryHints {
    pub strategy: Option<SummarizationStrategy>,
    pub target_tokens: Option<usize>,
}

/// Compresses message sets into a [`ContextSummary`].
///
/// Never fails: model errors and timeouts fall back to extractive output.
pub struct ConversationSummarizer {
    config: SummarizationConfig,
    model: Option<Arc<dyn LanguageModel>>,
    estimator: Arc<dyn TokenEstimator>,
    topics: Arc<dyn TopicExtractor>,
}

struct Draft {
    text: String,
    confidence: f32,
    strategy: SummarizationStrategy,
    /// A configured model failed and extractive text was used instead
    fell_back: bool,
}

impl ConversationSummarizer {
    pub fn new(
        config: SummarizationConfig,
        model: Option<Arc<dyn LanguageModel>>,
        estimator: Arc<dyn TokenEstimator>,
        topics: Arc<dyn TopicExtractor>,
    ) -> Self {
        Self {
            config,
            model,
            estimator,
            topics,
        }
    }

    pub fn config(&self) -> &SummarizationConfig {
        &self.config
    }

    /// Strategy used when `hints` do not name one
    pub fn strategy(&self, hints: &SummaryHints) -> SummarizationStrategy {
        hints.strategy.unwrap_or(self.config.strategy)
    }

    /// Summarize `messages`; an empty input yields an empty summary
    pub async fn summarize(
        &self,
        messages: &[EnhancedMessage],
        hints: &SummaryHints,
    ) -> ContextSummary {
        let strategy = self.strategy(hints);
        if messages.is_empty() {
            return ContextSummary::empty(strategy);
        }
        let target = hints
            .target_tokens
            .unwrap_or(self.config.max_summary_tokens)
            .max(1);

        if messages.len() > self.config.iterative_threshold {
            self.summarize_iterative(messages, strategy, target).await
        } else {
            self.summarize_once(messages, strategy, target).await
        }
    }

    /// Summarize `messages` together with an earlier summary they follow.
    ///
    /// The earlier summary is folded in as the first input so its content
    /// carries into the result, and its summarized ids are kept.
    pub async fn summarize_with_previous(
        &self,
        previous: Option<&ContextSummary>,
        messages: &[EnhancedMessage],
        hints: &SummaryHints,
    ) -> ContextSummary {
        let Some(previous) = previous.filter(|p| !p.is_empty()) else {
            return self.summarize(messages, hints).await;
        };

        let mut inputs = Vec::with_capacity(messages.len() + 1);
        inputs.push(previous_as_message(previous, messages));
        inputs.extend_from_slice(messages);

        let mut summary = self.summarize(&inputs, hints).await;
        summary.summarized_message_ids = previous
            .summarized_message_ids
            .iter()
            .cloned()
            .chain(messages.iter().map(|m| m.id.clone()))
            .collect();
        summary.generation = summary.generation.max(previous.generation + 1);
        summary
    }

    async fn summarize_once(
        &self,
        messages: &[EnhancedMessage],
        strategy: SummarizationStrategy,
        target: usize,
    ) -> ContextSummary {
        let Some(context) = derive_context(messages) else {
            return ContextSummary::empty(strategy);
        };
        let clusters = cluster_messages(
            messages,
            self.config.cluster_overlap,
            self.config.cluster_gap_minutes,
        );
        debug!(
            "Summarizing {} messages in {} clusters with {} strategy",
            messages.len(),
            clusters.len(),
            strategy.as_str()
        );

        let draft = self.draft(&clusters, &context, strategy, target).await;
        METRICS.record_summary(strategy.as_str(), draft.fell_back);
        self.finish(draft, &context, messages, target, 0)
    }

    async fn draft(
        &self,
        clusters: &[MessageCluster<'_>],
        context: &SummarizationContext,
        strategy: SummarizationStrategy,
        target: usize,
    ) -> Draft {
        match strategy {
            SummarizationStrategy::Extractive => {
                let extraction = self.extract(clusters, target, None);
                Draft {
                    confidence: extraction.confidence(),
                    text: extraction.text,
                    strategy,
                    fell_back: false,
                }
            }
            SummarizationStrategy::Abstractive => {
                match self.abstractive(clusters, context, target).await {
                    Some(text) => Draft {
                        text,
                        confidence: ABSTRACTIVE_CONFIDENCE,
                        strategy,
                        fell_back: false,
                    },
                    None => {
                        let extraction = self.extract(clusters, target, None);
                        Draft {
                            confidence: extraction.confidence(),
                            text: extraction.text,
                            strategy: SummarizationStrategy::Extractive,
                            fell_back: self.model.is_some(),
                        }
                    }
                }
            }
            SummarizationStrategy::Hybrid => self.hybrid(clusters, context, target).await,
            SummarizationStrategy::TemplateBased => self.template(clusters, context, target),
        }
    }

    /// Summarize fixed-size chunks, then summarize the chunk summaries
    async fn summarize_iterative(
        &self,
        messages: &[EnhancedMessage],
        strategy: SummarizationStrategy,
        target: usize,
    ) -> ContextSummary {
        let chunk_size = self.config.chunk_size.max(2);
        let chunks: Vec<&[EnhancedMessage]> = messages.chunks(chunk_size).collect();
        // Chunks are independent; model calls for them run concurrently
        let summaries = join_all(
            chunks
                .iter()
                .map(|chunk| self.summarize_once(chunk, strategy, target)),
        )
        .await;
        let partials: Vec<(ContextSummary, &[EnhancedMessage])> = summaries
            .into_iter()
            .zip(chunks)
            .filter(|(summary, _)| !summary.is_empty())
            .collect();
        info!(
            "Iterative summarization: {} messages in {} chunks",
            messages.len(),
            partials.len()
        );

        let synthetic: Vec<EnhancedMessage> = partials
            .iter()
            .map(|(summary, chunk)| chunk_as_message(summary, chunk))
            .collect();
        let merged = self.summarize_once(&synthetic, strategy, target).await;

        let Some(context) = derive_context(messages) else {
            return merged;
        };
        let mean_confidence = if partials.is_empty() {
            0.0
        } else {
            partials.iter().map(|(s, _)| s.confidence).sum::<f32>() / partials.len() as f32
        };
        let draft = Draft {
            text: merged.text,
            confidence: mean_confidence * 0.9,
            strategy: merged.strategy,
            fell_back: false,
        };
        self.finish(draft, &context, messages, target, 1)
    }

    fn finish(
        &self,
        draft: Draft,
        context: &SummarizationContext,
        messages: &[EnhancedMessage],
        target: usize,
        generation: u32,
    ) -> ContextSummary {
        let text = truncate_to_tokens(draft.text.trim(), target, self.estimator.as_ref());
        let token_count = self.estimator.estimate(&text);
        let original_tokens: usize = messages.iter().map(|m| m.token_count).sum();
        let compression_ratio = if original_tokens == 0 {
            0.0
        } else {
            token_count as f32 / original_tokens as f32
        };
        let confidence = if text.is_empty() {
            0.0
        } else {
            draft.confidence.clamp(0.0, 1.0)
        };
        let quality = SummaryQuality::assess(&text, context, confidence);

        ContextSummary {
            id: uuid::Uuid::new_v4().to_string(),
            summarized_message_ids: messages.iter().map(|m| m.id.clone()).collect(),
            text,
            key_topics: context.key_topics.clone(),
            important_entities: context.important_entities.clone(),
            token_count,
            confidence,
            strategy: draft.strategy,
            created_at: Utc::now(),
            compression_ratio,
            quality: Some(quality),
            generation,
        }
    }

    fn extract(
        &self,
        clusters: &[MessageCluster<'_>],
        target: usize,
        per_cluster_limit: Option<usize>,
    ) -> Extraction {
        extract(
            clusters,
            &ExtractParams {
                preserve_threshold: self.config.preserve_threshold,
                target_tokens: target,
                per_cluster_limit,
                estimator: self.estimator.as_ref(),
                topics: self.topics.as_ref(),
            },
        )
    }

    /// Model-written summary, or `None` when no model is configured or the
    /// call fails, times out or returns nothing
    async fn abstractive(
        &self,
        clusters: &[MessageCluster<'_>],
        context: &SummarizationContext,
        target: usize,
    ) -> Option<String> {
        let Some(model) = &self.model else {
            debug!("No language model configured, using extractive summary");
            return None;
        };

        let prompt = self.build_prompt(clusters, context, target);
        let timeout = self.config.model_timeout();
        let result = tokio::time::timeout(
            timeout,
            model.summarize(&prompt, target, self.config.temperature),
        )
        .await
        .unwrap_or_else(|_| Err(ModelError::Timeout(timeout)));
        match result {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!(
                    "Abstractive summarization failed: {}, falling back to extractive",
                    ModelError::EmptyResponse
                );
                None
            }
            Err(e) => {
                warn!("Abstractive summarization failed: {}, falling back to extractive", e);
                None
            }
        }
    }

    fn build_prompt(
        &self,
        clusters: &[MessageCluster<'_>],
        context: &SummarizationContext,
        target: usize,
    ) -> String {
        let mut prompt = format!(
            "Summarize the following conversation segments in under {} tokens. \
            Keep decisions, constraints, named entities and open questions.\n\
            Topics: {}\nEntities: {}\n",
            target,
            context.key_topics.join(", "),
            context.important_entities.join(", ")
        );

        for (i, cluster) in clusters.iter().enumerate() {
            let _ = writeln!(
                prompt,
                "\nSegment {} (topics: {}; importance: {:.2}; duration: {} min):",
                i + 1,
                cluster.topic_label(),
                cluster.importance(),
                cluster.duration_minutes()
            );

            let mut points: Vec<&EnhancedMessage> = cluster.messages.clone();
            points.sort_by(|a, b| {
                b.importance
                    .partial_cmp(&a.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            points.truncate(PROMPT_POINTS_PER_CLUSTER);
            points.sort_by_key(|m| m.timestamp);
            for message in points {
                if let Some(sentence) = best_sentence(message, &cluster.topics, self.topics.as_ref()) {
                    let _ = writeln!(prompt, "- {}: {}", message.role, sentence);
                }
            }
        }
        prompt
    }

    /// Extractive key interactions from the most important clusters plus an
    /// abstractive overview of the rest
    async fn hybrid(
        &self,
        clusters: &[MessageCluster<'_>],
        context: &SummarizationContext,
        target: usize,
    ) -> Draft {
        let mut ranked: Vec<usize> = (0..clusters.len()).collect();
        ranked.sort_by(|&a, &b| {
            clusters[b]
                .importance()
                .partial_cmp(&clusters[a].importance())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(HYBRID_KEY_CLUSTERS);

        let (key, rest): (Vec<_>, Vec<_>) = clusters
            .iter()
            .enumerate()
            .partition(|(i, _)| ranked.contains(i));
        let key: Vec<MessageCluster<'_>> = key.into_iter().map(|(_, c)| c.clone()).collect();
        let rest: Vec<MessageCluster<'_>> = rest.into_iter().map(|(_, c)| c.clone()).collect();

        let half = (target / 2).max(1);
        let key_points = self.extract(&key, half, Some(HYBRID_MESSAGES_PER_CLUSTER));

        let (overview, overview_confidence, fell_back) = if rest.is_empty() {
            (overview_line(context), None, false)
        } else {
            match self.abstractive(&rest, context, half).await {
                Some(text) => (text, Some(ABSTRACTIVE_CONFIDENCE), false),
                None => {
                    let extraction = self.extract(&rest, half, None);
                    let confidence = extraction.confidence();
                    (extraction.text, Some(confidence), self.model.is_some())
                }
            }
        };
        let confidence = match overview_confidence {
            Some(c) => (key_points.confidence() + c) / 2.0,
            None => key_points.confidence(),
        };
        Draft {
            text: format!("Overview: {}\n\nKey interactions: {}", overview, key_points.text),
            confidence,
            strategy: SummarizationStrategy::Hybrid,
            fell_back,
        }
    }

    fn template(
        &self,
        clusters: &[MessageCluster<'_>],
        context: &SummarizationContext,
        target: usize,
    ) -> Draft {
        let template = SummaryTemplate::select(context);
        let points = self.extract(clusters, (target / 2).max(1), Some(1));
        let key_points: Vec<String> = if points.text.is_empty() {
            Vec::new()
        } else {
            vec![points.text]
        };
        debug!("Using {} summary template", template.as_str());
        Draft {
            text: template.render(context, &key_points),
            confidence: TEMPLATE_CONFIDENCE,
            strategy: SummarizationStrategy::TemplateBased,
            fell_back: false,
        }
    }
}

fn overview_line(context: &SummarizationContext) -> String {
    let topics = if context.key_topics.is_empty() {
        "general matters".to_string()
    } else {
        context.key_topics.join(", ")
    };
    let participants: Vec<&str> = context.participants.iter().map(|r| r.as_str()).collect();
    format!(
        "{} messages about {} between {}.",
        context.message_count,
        topics,
        participants.join(" and ")
    )
}

/// An earlier summary as a system message preceding `messages`
fn previous_as_message(previous: &ContextSummary, messages: &[EnhancedMessage]) -> EnhancedMessage {
    let timestamp = messages
        .iter()
        .map(|m| m.timestamp)
        .min()
        .map_or(previous.created_at, |first| first.min(previous.created_at));
    EnhancedMessage {
        id: format!("summary:{}", previous.id),
        role: MessageRole::System,
        content: previous.text.clone(),
        timestamp,
        token_count: previous.token_count,
        importance: PREVIOUS_SUMMARY_IMPORTANCE,
        context_relevance: 1.0,
        topics: previous.key_topics.iter().cloned().collect(),
        entities: previous.important_entities.clone(),
        sentiment: Sentiment::Neutral,
        metadata: MessageMetadata::default(),
    }
}

/// A chunk summary as a system message positioned at the chunk's start
fn chunk_as_message(summary: &ContextSummary, chunk: &[EnhancedMessage]) -> EnhancedMessage {
    let importance = if chunk.is_empty() {
        0.5
    } else {
        chunk.iter().map(|m| m.importance).sum::<f32>() / chunk.len() as f32
    };
    EnhancedMessage {
        id: summary.id.clone(),
        role: MessageRole::System,
        content: summary.text.clone(),
        timestamp: chunk.first().map_or(summary.created_at, |m| m.timestamp),
        token_count: summary.token_count,
        importance,
        context_relevance: 1.0,
        topics: summary.key_topics.iter().cloned().collect(),
        entities: summary.important_entities.clone(),
        sentiment: Sentiment::Neutral,
        metadata: MessageMetadata::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::enhancer::{KeywordTopicExtractor, MessageEnhancer};
    use crate::context::models::IncomingMessage;
    use crate::context::token_estimator::HeuristicEstimator;
    use crate::summarization::model::ModelError;
    use async_trait::async_trait;
    use chrono::Duration;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn summarize(&self, _: &str, _: usize, _: f32) -> Result<String, ModelError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn summarize(&self, _: &str, _: usize, _: f32) -> Result<String, ModelError> {
            Err(ModelError::ApiError("service unavailable".to_string()))
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn summarize(&self, _: &str, _: usize, _: f32) -> Result<String, ModelError> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    fn summarizer(
        strategy: SummarizationStrategy,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> ConversationSummarizer {
        let config = SummarizationConfig {
            strategy,
            model_timeout_ms: 50,
            ..SummarizationConfig::default()
        };
        ConversationSummarizer::new(
            config,
            model,
            Arc::new(HeuristicEstimator::default()),
            Arc::new(KeywordTopicExtractor::default()),
        )
    }

    fn conversation(count: usize) -> Vec<EnhancedMessage> {
        let enhancer = MessageEnhancer::with_defaults(Arc::new(HeuristicEstimator::default()));
        let start = Utc::now() - Duration::hours(2);
        let lines = [
            "I want to plan a trip to Paris next month. What is a good budget for the hotel?",
            "A mid-range hotel in Paris costs around 150 dollars per night. Flights from Boston are about 700 dollars.",
            "Can you suggest a restaurant near the Louvre for dinner?",
            "Le Fumoir is a popular restaurant close to the Louvre. It serves French cuisine at moderate prices.",
        ];
        (0..count)
            .map(|i| {
                let incoming = if i % 2 == 0 {
                    IncomingMessage::user(lines[i % lines.len()])
                } else {
                    IncomingMessage::assistant(lines[i % lines.len()])
                };
                enhancer.enhance(
                    incoming
                        .with_id(format!("m{i}"))
                        .with_timestamp(start + Duration::minutes(i as i64)),
                    None,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_summary() {
        let summary = summarizer(SummarizationStrategy::Extractive, None)
            .summarize(&[], &SummaryHints::default())
            .await;
        assert!(summary.is_empty());
        assert_eq!(summary.token_count, 0);
        assert!(summary.summarized_message_ids.is_empty());
    }

    #[tokio::test]
    async fn test_extractive_summary_respects_target() {
        let messages = conversation(8);
        let summary = summarizer(SummarizationStrategy::Extractive, None)
            .summarize(
                &messages,
                &SummaryHints {
                    target_tokens: Some(60),
                    ..SummaryHints::default()
                },
            )
            .await;
        assert!(!summary.is_empty());
        assert!(summary.token_count <= 60);
        assert_eq!(summary.summarized_message_ids.len(), 8);
        assert_eq!(summary.strategy, SummarizationStrategy::Extractive);
        assert!(summary.compression_ratio > 0.0 && summary.compression_ratio < 1.0);
        assert!(summary.key_topics.contains(&"travel".to_string()));
        assert!(summary.quality.is_some());
        assert_eq!(summary.generation, 0);
    }

    #[tokio::test]
    async fn test_abstractive_uses_model_text() {
        let model: Arc<dyn LanguageModel> = Arc::new(FixedModel("The user planned a Paris trip."));
        let summary = summarizer(SummarizationStrategy::Abstractive, Some(model))
            .summarize(&conversation(4), &SummaryHints::default())
            .await;
        assert_eq!(summary.text, "The user planned a Paris trip.");
        assert_eq!(summary.strategy, SummarizationStrategy::Abstractive);
        assert!((summary.confidence - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_abstractive_failure_falls_back_to_extractive() {
        let model: Arc<dyn LanguageModel> = Arc::new(FailingModel);
        let summary = summarizer(SummarizationStrategy::Abstractive, Some(model))
            .summarize(&conversation(4), &SummaryHints::default())
            .await;
        assert!(!summary.is_empty());
        assert_eq!(summary.strategy, SummarizationStrategy::Extractive);
        assert_eq!(summary.summarized_message_ids.len(), 4);
    }

    #[tokio::test]
    async fn test_abstractive_timeout_falls_back_to_extractive() {
        let model: Arc<dyn LanguageModel> = Arc::new(SlowModel);
        let started = std::time::Instant::now();
        let summary = summarizer(SummarizationStrategy::Abstractive, Some(model))
            .summarize(&conversation(4), &SummaryHints::default())
            .await;
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(!summary.is_empty());
        assert_ne!(summary.text, "too late");
        assert_eq!(summary.strategy, SummarizationStrategy::Extractive);
    }

    #[tokio::test]
    async fn test_abstractive_without_model_is_extractive() {
        let summary = summarizer(SummarizationStrategy::Abstractive, None)
            .summarize(&conversation(4), &SummaryHints::default())
            .await;
        assert!(!summary.is_empty());
        assert_eq!(summary.strategy, SummarizationStrategy::Extractive);
    }

    #[tokio::test]
    async fn test_fallback_needs_a_configured_model() {
        let messages = conversation(4);
        let context = derive_context(&messages).unwrap();
        let clusters = cluster_messages(&messages, 0.3, 30);

        let without_model = summarizer(SummarizationStrategy::Abstractive, None);
        for strategy in [SummarizationStrategy::Abstractive, SummarizationStrategy::Hybrid] {
            let draft = without_model.draft(&clusters, &context, strategy, 100).await;
            assert!(!draft.fell_back, "{} counted a fallback", strategy.as_str());
            assert!(!draft.text.is_empty());
        }

        let model: Arc<dyn LanguageModel> = Arc::new(FailingModel);
        let draft = summarizer(SummarizationStrategy::Abstractive, Some(model))
            .draft(&clusters, &context, SummarizationStrategy::Abstractive, 100)
            .await;
        assert!(draft.fell_back);
        assert_eq!(draft.strategy, SummarizationStrategy::Extractive);
    }

    #[tokio::test]
    async fn test_hybrid_layout() {
        let summary = summarizer(SummarizationStrategy::Hybrid, None)
            .summarize(&conversation(6), &SummaryHints::default())
            .await;
        assert!(summary.text.starts_with("Overview: "));
        assert!(summary.text.contains("Key interactions: "));
        assert_eq!(summary.strategy, SummarizationStrategy::Hybrid);
    }

    #[tokio::test]
    async fn test_template_for_travel() {
        let enhancer = MessageEnhancer::with_defaults(Arc::new(HeuristicEstimator::default()));
        let messages: Vec<EnhancedMessage> = (0..3)
            .map(|_| enhancer.enhance(IncomingMessage::user("Book a flight and a hotel for the trip to Rome."), None))
            .collect();
        let summary = summarizer(SummarizationStrategy::TemplateBased, None)
            .summarize(&messages, &SummaryHints::default())
            .await;
        assert!(summary.text.starts_with("Travel planning discussion"));
        assert!((summary.confidence - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_long_input_is_summarized_iteratively() {
        let messages = conversation(45);
        let summary = summarizer(SummarizationStrategy::Extractive, None)
            .summarize(&messages, &SummaryHints::default())
            .await;
        assert_eq!(summary.generation, 1);
        assert_eq!(summary.summarized_message_ids.len(), 45);
        assert!(summary.token_count <= 500);
        assert!(!summary.is_empty());
    }

    #[tokio::test]
    async fn test_previous_summary_is_chained() {
        let s = summarizer(SummarizationStrategy::Extractive, None);
        let first_batch = conversation(4);
        let first = s.summarize(&first_batch, &SummaryHints::default()).await;

        let second_batch: Vec<EnhancedMessage> = conversation(8).split_off(4);
        let second = s
            .summarize_with_previous(Some(&first), &second_batch, &SummaryHints::default())
            .await;
        assert_eq!(second.summarized_message_ids.len(), 8);
        assert_eq!(second.summarized_message_ids[0], "m0");
        assert_eq!(second.generation, 1);
        assert!(!second.is_empty());
    }
}
