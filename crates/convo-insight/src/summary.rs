//! Plain-text meeting summary for the current topic.

use serde::Serialize;

use convo_core::types::{Conversation, TopicId};

use crate::grouper::{group_by_topic, key_point_rollup};

/// Title passed to the native share sheet.
pub const SHARE_TITLE: &str = "Meeting Summary";

/// Exportable digest of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingSummary {
    pub title: String,
    /// De-duplicated key points in chronological order.
    pub key_points: Vec<String>,
    pub participants: Vec<String>,
    pub response_count: usize,
}

impl MeetingSummary {
    /// Summarize `topic_id`. Returns `None` when the topic does not exist.
    pub fn for_topic(conversation: &Conversation, topic_id: TopicId) -> Option<Self> {
        let topic = conversation.topic(topic_id)?;
        let groups = group_by_topic(&conversation.topics, &conversation.responses);
        let responses = groups.get(topic_id).unwrap_or_default();

        Some(Self {
            title: topic.content.clone(),
            key_points: key_point_rollup(responses),
            participants: conversation.participants.clone(),
            response_count: responses.len(),
        })
    }

    /// Render the text handed to the share sheet or clipboard.
    pub fn to_text(&self) -> String {
        let points: Vec<String> = self.key_points.iter().map(|p| format!("• {}", p)).collect();
        format!(
            "{}:\n{}\n\nKey Points:\n{}\n\nParticipants: {}\nTotal Responses: {}",
            SHARE_TITLE,
            self.title,
            points.join("\n"),
            self.participants.join(", "),
            self.response_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use convo_core::types::{Response, Topic};
    use uuid::Uuid;

    fn conversation() -> (Conversation, TopicId) {
        let budget = Topic::new("Budget");
        let hiring = Topic::new("Hiring");
        let now = Utc::now();
        let make = |topic_id, offset: i64, points: &[&str]| Response {
            id: Uuid::new_v4(),
            topic_id,
            content: "c".into(),
            timestamp: now + Duration::seconds(offset),
            key_points: points.iter().map(|s| s.to_string()).collect(),
            speaker: "Alice".into(),
            participants: "everyone".into(),
        };
        let id = budget.id;
        let conv = Conversation {
            id: Uuid::new_v4(),
            user_id: None,
            title: "Planning".into(),
            description: None,
            participants: vec!["Alice".into(), "Bob".into()],
            created_at: now,
            updated_at: None,
            scheduled_date: None,
            responses: vec![
                make(budget.id, 2, &["Review vendors", "Cut costs"]),
                make(budget.id, 1, &["Cut costs"]),
                make(hiring.id, 0, &["Hire two engineers"]),
            ],
            topics: vec![budget, hiring],
            images: vec![],
        };
        (conv, id)
    }

    #[test]
    fn test_for_topic() {
        let (conv, budget) = conversation();
        let summary = MeetingSummary::for_topic(&conv, budget).unwrap();
        assert_eq!(summary.title, "Budget");
        assert_eq!(summary.key_points, vec!["Cut costs", "Review vendors"]);
        assert_eq!(summary.participants, vec!["Alice", "Bob"]);
        assert_eq!(summary.response_count, 2);
    }

    #[test]
    fn test_unknown_topic() {
        let (conv, _) = conversation();
        assert!(MeetingSummary::for_topic(&conv, Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_to_text() {
        let (conv, budget) = conversation();
        let text = MeetingSummary::for_topic(&conv, budget).unwrap().to_text();
        assert_eq!(
            text,
            "Meeting Summary:\nBudget\n\nKey Points:\n• Cut costs\n• Review vendors\n\n\
             Participants: Alice, Bob\nTotal Responses: 2"
        );
    }
}
