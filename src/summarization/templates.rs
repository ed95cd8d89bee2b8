//! Topic-specific summary templates

use super::analysis::SummarizationContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTemplate {
    TravelPlanning,
    Financial,
    Technical,
    General,
}

impl SummaryTemplate {
    /// Pick a template from the leading topic that has one
    pub fn select(context: &SummarizationContext) -> Self {
        context
            .key_topics
            .iter()
            .find_map(|topic| match topic.as_str() {
                "travel" | "location" | "planning" => Some(SummaryTemplate::TravelPlanning),
                "finance" | "shopping" => Some(SummaryTemplate::Financial),
                "technology" | "work" => Some(SummaryTemplate::Technical),
                _ => None,
            })
            .unwrap_or(SummaryTemplate::General)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryTemplate::TravelPlanning => "travel_planning",
            SummaryTemplate::Financial => "financial",
            SummaryTemplate::Technical => "technical",
            SummaryTemplate::General => "general",
        }
    }

    /// Fill the template with the context and extracted key points
    pub fn render(&self, context: &SummarizationContext, key_points: &[String]) -> String {
        let entities = list_or(&context.important_entities, "none noted");
        let topics = list_or(&context.key_topics, "general discussion");
        let points = if key_points.is_empty() {
            "no specific points".to_string()
        } else {
            key_points.join(" ")
        };

        match self {
            SummaryTemplate::TravelPlanning => format!(
                "Travel planning discussion over {} messages. Destinations and names: {}. Topics: {}. Key points: {}",
                context.message_count, entities, topics, points
            ),
            SummaryTemplate::Financial => format!(
                "Financial discussion over {} messages. Parties and items: {}. Topics: {}. Key points: {}",
                context.message_count, entities, topics, points
            ),
            SummaryTemplate::Technical => format!(
                "Technical discussion over {} messages. Components mentioned: {}. Topics: {}. Key points: {}",
                context.message_count, entities, topics, points
            ),
            SummaryTemplate::General => format!(
                "Conversation of {} messages about {}. Mentioned: {}. Key points: {}",
                context.message_count, topics, entities, points
            ),
        }
    }
}

fn list_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::Sentiment;
    use chrono::Utc;

    fn context(topics: &[&str]) -> SummarizationContext {
        SummarizationContext {
            start: Utc::now(),
            end: Utc::now(),
            participants: Vec::new(),
            key_topics: topics.iter().map(|t| t.to_string()).collect(),
            important_entities: vec!["Paris".to_string()],
            dominant_sentiment: Sentiment::Neutral,
            message_count: 4,
            total_tokens: 40,
        }
    }

    #[test]
    fn test_select() {
        assert_eq!(SummaryTemplate::select(&context(&["travel"])), SummaryTemplate::TravelPlanning);
        assert_eq!(SummaryTemplate::select(&context(&["food", "finance"])), SummaryTemplate::Financial);
        assert_eq!(SummaryTemplate::select(&context(&["technology"])), SummaryTemplate::Technical);
        assert_eq!(SummaryTemplate::select(&context(&["food"])), SummaryTemplate::General);
    }

    #[test]
    fn test_render_includes_entities_and_points() {
        let ctx = context(&["travel"]);
        let text = SummaryTemplate::TravelPlanning.render(&ctx, &["User: Book a hotel near the Louvre.".to_string()]);
        assert!(text.contains("Paris"));
        assert!(text.contains("4 messages"));
        assert!(text.contains("Louvre"));
    }
}
