//! Message enhancement
//!
//! Turns a raw message into an [`EnhancedMessage`] by attaching a token
//! estimate, topics, entities, sentiment, importance and context relevance.
//! Topic, entity and sentiment extraction sit behind traits so a stronger NLP
//! backend can replace the keyword and pattern heuristics below without
//! touching window or branch logic.

use super::models::{
    EnhancedMessage, IncomingMessage, MessageIntent, MessageMetadata, MessageRole, Sentiment,
};
use super::similarity::{jaccard_hashed, word_set, words};
use super::token_estimator::TokenEstimator;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Estimated prompt cost per 1k tokens, USD
const COST_PER_1K_TOKENS: f64 = 0.002;

/// Relevance assigned when there is no preceding message
const DEFAULT_RELEVANCE: f32 = 0.5;

/// Half-life of context relevance across the gap between messages
const RELEVANCE_HALF_LIFE_HOURS: f64 = 1.0;

/// Extracts coarse topic labels from text
pub trait TopicExtractor: Send + Sync {
    fn extract(&self, text: &str) -> BTreeSet<String>;
}

/// Extracts entity mentions from text
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Classifies the sentiment of text
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Sentiment;
}

/// Keyword-category topic matching
pub struct KeywordTopicExtractor {
    categories: Vec<(String, Vec<String>)>,
}

const DEFAULT_TOPICS: &[(&str, &[&str])] = &[
    ("travel", &["trip", "travel", "flight", "hotel", "vacation", "airport", "booking", "itinerary", "visa", "passport", "destination", "tour"]),
    ("finance", &["money", "budget", "cost", "price", "bank", "invest", "stock", "loan", "payment", "salary", "tax", "expense", "finance", "financial", "savings", "dollar"]),
    ("location", &["city", "country", "address", "map", "near", "located", "location", "street", "region", "downtown", "neighborhood"]),
    ("planning", &["plan", "schedule", "agenda", "deadline", "calendar", "organize", "prepare", "timeline", "meeting"]),
    ("food", &["food", "restaurant", "dinner", "lunch", "breakfast", "recipe", "cook", "meal", "cuisine"]),
    ("health", &["health", "doctor", "medicine", "exercise", "sleep", "diet", "symptom", "hospital"]),
    ("technology", &["code", "software", "computer", "program", "app", "bug", "api", "database", "server", "compile"]),
    ("work", &["job", "work", "project", "team", "manager", "career", "office", "client"]),
    ("weather", &["weather", "rain", "sunny", "temperature", "forecast", "snow"]),
    ("shopping", &["buy", "shop", "store", "order", "purchase", "discount", "delivery"]),
];

impl Default for KeywordTopicExtractor {
    fn default() -> Self {
        Self {
            categories: DEFAULT_TOPICS
                .iter()
                .map(|(topic, keywords)| {
                    (
                        topic.to_string(),
                        keywords.iter().map(|k| k.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl KeywordTopicExtractor {
    /// Add or extend a topic category
    pub fn with_category(mut self, topic: impl Into<String>, keywords: &[&str]) -> Self {
        let topic = topic.into();
        let keywords = keywords.iter().map(|k| k.to_lowercase());
        match self.categories.iter_mut().find(|(name, _)| *name == topic) {
            Some((_, existing)) => existing.extend(keywords),
            None => self.categories.push((topic, keywords.collect())),
        }
        self
    }

    fn matches(word: &str, keyword: &str) -> bool {
        // Short keywords must match exactly ("app" must not match "apple")
        if keyword.len() < 4 {
            word == keyword
        } else {
            word.starts_with(keyword)
        }
    }
}

impl TopicExtractor for KeywordTopicExtractor {
    fn extract(&self, text: &str) -> BTreeSet<String> {
        let words: HashSet<String> = word_set(text);
        self.categories
            .iter()
            .filter(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|k| words.iter().any(|w| Self::matches(w, k)))
            })
            .map(|(topic, _)| topic.clone())
            .collect()
    }
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email pattern")
});
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')]+"#).expect("valid url pattern"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s().-]{7,}\d").expect("valid phone pattern"));
static PROPER_NOUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("valid proper noun pattern")
});

const NOT_ENTITIES: &[&str] = &[
    "I", "The", "This", "That", "These", "Those", "What", "When", "Where", "Which", "Who",
    "Why", "How", "Can", "Could", "Would", "Should", "Will", "Please", "Thanks", "Thank",
    "Yes", "No", "Hi", "Hello", "Hey", "It", "We", "You", "They", "He", "She", "My", "Our",
    "Your", "And", "But", "Or", "If", "So", "Also", "Then", "Is", "Are", "Do", "Does", "Let",
    "Ok", "Okay", "Sure", "Great", "Good", "A", "An", "In", "On", "At", "For", "To", "From",
];

/// Pattern-based entity extraction: emails, URLs, phone numbers, capitalized names
#[derive(Debug, Default, Clone)]
pub struct PatternEntityExtractor;

impl EntityExtractor for PatternEntityExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        let mut push = |value: &str| {
            let value = value.trim();
            if !value.is_empty() && seen.insert(value.to_string()) {
                entities.push(value.to_string());
            }
        };

        for m in EMAIL_RE.find_iter(text) {
            push(m.as_str());
        }
        for m in URL_RE.find_iter(text) {
            push(m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']));
        }
        for m in PHONE_RE.find_iter(text) {
            push(m.as_str());
        }

        // Strip URLs and emails so their fragments are not read as names
        let stripped = URL_RE.replace_all(text, " ");
        let stripped = EMAIL_RE.replace_all(&stripped, " ");
        for m in PROPER_NOUN_RE.find_iter(&stripped) {
            let candidate = m
                .as_str()
                .split_whitespace()
                .skip_while(|w| NOT_ENTITIES.contains(w))
                .collect::<Vec<_>>()
                .join(" ");
            if !candidate.is_empty() && !NOT_ENTITIES.contains(&candidate.as_str()) {
                push(&candidate);
            }
        }

        entities
    }
}

/// Keyword lexicon sentiment; ties and no matches are neutral
pub struct LexiconSentimentClassifier {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl Default for LexiconSentimentClassifier {
    fn default() -> Self {
        Self {
            positive: [
                "good", "great", "excellent", "love", "like", "happy", "thanks", "thank",
                "awesome", "perfect", "wonderful", "amazing", "helpful", "nice", "glad",
                "fantastic", "appreciate",
            ]
            .into_iter()
            .collect(),
            negative: [
                "bad", "terrible", "hate", "awful", "wrong", "problem", "issue", "error",
                "fail", "failed", "sad", "angry", "disappointed", "broken", "worst", "annoying",
                "frustrated",
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl SentimentClassifier for LexiconSentimentClassifier {
    fn classify(&self, text: &str) -> Sentiment {
        let (mut positive, mut negative) = (0usize, 0usize);
        for word in words(text) {
            if self.positive.contains(word.as_str()) {
                positive += 1;
            } else if self.negative.contains(word.as_str()) {
                negative += 1;
            }
        }
        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

/// Attaches heuristics to raw messages. Pure: no side effects.
#[derive(Clone)]
pub struct MessageEnhancer {
    estimator: Arc<dyn TokenEstimator>,
    topics: Arc<dyn TopicExtractor>,
    entities: Arc<dyn EntityExtractor>,
    sentiment: Arc<dyn SentimentClassifier>,
}

impl MessageEnhancer {
    pub fn new(
        estimator: Arc<dyn TokenEstimator>,
        topics: Arc<dyn TopicExtractor>,
        entities: Arc<dyn EntityExtractor>,
        sentiment: Arc<dyn SentimentClassifier>,
    ) -> Self {
        Self {
            estimator,
            topics,
            entities,
            sentiment,
        }
    }

    /// Keyword topics, pattern entities and lexicon sentiment
    pub fn with_defaults(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self::new(
            estimator,
            Arc::new(KeywordTopicExtractor::default()),
            Arc::new(PatternEntityExtractor),
            Arc::new(LexiconSentimentClassifier::default()),
        )
    }

    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    pub fn topic_extractor(&self) -> &Arc<dyn TopicExtractor> {
        &self.topics
    }

    /// Enhance a message relative to the most recent message in its window
    pub fn enhance(
        &self,
        message: IncomingMessage,
        previous: Option<&EnhancedMessage>,
    ) -> EnhancedMessage {
        let timestamp = message.timestamp.unwrap_or_else(Utc::now);
        let estimate = self.estimator.estimate_detailed(&message.content);
        let topics = self.topics.extract(&message.content);
        let entities = self.entities.extract(&message.content);
        let sentiment = self.sentiment.classify(&message.content);
        let importance = importance_score(
            message.role,
            &message.content,
            topics.len(),
            entities.len(),
        );
        let context_relevance = previous
            .map(|prev| relevance_to(&message.content, timestamp, prev))
            .unwrap_or(DEFAULT_RELEVANCE);

        let metadata = MessageMetadata {
            intent: infer_intent(message.role, &message.content),
            tools: message.tools,
            cost_estimate: estimate.approximate as f64 / 1000.0 * COST_PER_1K_TOKENS,
            token_confidence: estimate.confidence,
            context_switch: false,
        };

        EnhancedMessage {
            id: message
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            role: message.role,
            content: message.content,
            timestamp,
            token_count: estimate.approximate,
            importance,
            context_relevance,
            topics,
            entities,
            sentiment,
            metadata,
        }
    }
}

/// Weighted importance: base 0.5, questions, topic/entity richness and length
pub fn importance_score(
    role: MessageRole,
    content: &str,
    topic_count: usize,
    entity_count: usize,
) -> f32 {
    let mut score = 0.5f32;
    if role == MessageRole::User && content.contains('?') {
        score += 0.2;
    }
    score += (topic_count as f32 * 0.1).min(0.2);
    score += (entity_count as f32 * 0.05).min(0.1);
    let length = content.chars().count();
    if length > 200 {
        score += 0.1;
    }
    if length > 500 {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

/// Word-overlap similarity to the previous message, decayed across the time gap
fn relevance_to(content: &str, timestamp: DateTime<Utc>, previous: &EnhancedMessage) -> f32 {
    let overlap = jaccard_hashed(&word_set(content), &word_set(&previous.content));
    let gap_hours = (timestamp - previous.timestamp).num_seconds().max(0) as f64 / 3600.0;
    let decay = 0.5f64.powf(gap_hours / RELEVANCE_HALF_LIFE_HOURS);
    (overlap as f64 * decay).clamp(0.0, 1.0) as f32
}

fn infer_intent(role: MessageRole, content: &str) -> MessageIntent {
    if role == MessageRole::ToolUse {
        return MessageIntent::ToolCall;
    }
    let lowered = content.trim().to_lowercase();
    if lowered.contains('?') {
        return MessageIntent::Question;
    }
    const GREETINGS: &[&str] = &["hi", "hello", "hey", "good morning", "good evening"];
    const REQUESTS: &[&str] = &[
        "please", "can you", "could you", "would you", "help", "show", "tell", "give", "find",
        "create", "make", "book",
    ];
    let greets = |g: &str| {
        lowered
            .strip_prefix(g)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', ',', '!', '.']))
    };
    if GREETINGS.iter().any(|g| greets(g)) {
        return MessageIntent::Greeting;
    }
    if REQUESTS.iter().any(|r| lowered.starts_with(r)) {
        return MessageIntent::Request;
    }
    MessageIntent::Statement
}
