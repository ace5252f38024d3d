//! Grouping of responses under their topics.

use std::collections::{HashMap, HashSet};

use convo_core::types::{Response, Topic, TopicId};

/// Responses per topic, in chronological order.
///
/// Topic order follows the input topic list. Responses whose `topic_id` does
/// not match any topic are kept aside in [`TopicGroups::orphans`].
#[derive(Debug, Clone, Default)]
pub struct TopicGroups<'a> {
    groups: Vec<(TopicId, Vec<&'a Response>)>,
    index: HashMap<TopicId, usize>,
    orphans: Vec<&'a Response>,
}

impl<'a> TopicGroups<'a> {
    /// Responses for `topic_id`, or `None` for an unknown topic.
    pub fn get(&self, topic_id: TopicId) -> Option<&[&'a Response]> {
        self.index
            .get(&topic_id)
            .map(|&i| self.groups[i].1.as_slice())
    }

    /// Iterate `(topic_id, responses)` in topic order.
    pub fn iter(&self) -> impl Iterator<Item = (TopicId, &[&'a Response])> {
        self.groups.iter().map(|(id, rs)| (*id, rs.as_slice()))
    }

    pub fn orphans(&self) -> &[&'a Response] {
        &self.orphans
    }

    /// Number of topics (including empty ones).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of grouped responses, orphans excluded.
    pub fn response_count(&self) -> usize {
        self.groups.iter().map(|(_, rs)| rs.len()).sum()
    }
}

/// Map each topic to its responses, sorted ascending by timestamp.
///
/// The sort is stable: responses with equal timestamps keep their input order.
pub fn group_by_topic<'a>(topics: &[Topic], responses: &'a [Response]) -> TopicGroups<'a> {
    let mut groups: Vec<(TopicId, Vec<&'a Response>)> = Vec::with_capacity(topics.len());
    let mut index = HashMap::with_capacity(topics.len());

    for topic in topics {
        // Duplicate topic ids collapse onto the first occurrence.
        if !index.contains_key(&topic.id) {
            index.insert(topic.id, groups.len());
            groups.push((topic.id, Vec::new()));
        }
    }

    let mut orphans = Vec::new();
    for response in responses {
        match index.get(&response.topic_id) {
            Some(&i) => groups[i].1.push(response),
            None => orphans.push(response),
        }
    }

    for (_, rs) in &mut groups {
        rs.sort_by_key(|r| r.timestamp);
    }
    orphans.sort_by_key(|r| r.timestamp);

    TopicGroups {
        groups,
        index,
        orphans,
    }
}

/// Flatten key points across `responses` in order, keeping the first
/// occurrence of each exact string.
pub fn key_point_rollup(responses: &[&Response]) -> Vec<String> {
    let mut seen = HashSet::new();
    responses
        .iter()
        .flat_map(|r| r.key_points.iter())
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn response(topic_id: TopicId, minute: i64, content: &str, key_points: &[&str]) -> Response {
        Response {
            id: Uuid::new_v4(),
            topic_id,
            content: content.to_string(),
            timestamp: at(minute),
            key_points: key_points.iter().map(|s| s.to_string()).collect(),
            speaker: "Alice".to_string(),
            participants: "everyone".to_string(),
        }
    }

    #[test]
    fn test_groups_partition_responses() {
        let budget = Topic::new("Budget");
        let hiring = Topic::new("Hiring");
        let responses = vec![
            response(hiring.id, 5, "h1", &[]),
            response(budget.id, 3, "b2", &[]),
            response(budget.id, 1, "b1", &[]),
            response(hiring.id, 2, "h0", &[]),
        ];
        let topics = vec![budget.clone(), hiring.clone()];

        let groups = group_by_topic(&topics, &responses);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups.response_count(), responses.len());
        assert!(groups.orphans().is_empty());

        let mut seen: Vec<Uuid> = groups
            .iter()
            .flat_map(|(topic_id, rs)| {
                assert!(rs.iter().all(|r| r.topic_id == topic_id));
                rs.iter().map(|r| r.id).collect::<Vec<_>>()
            })
            .collect();
        let mut expected: Vec<Uuid> = responses.iter().map(|r| r.id).collect();
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_groups_are_chronological() {
        let budget = Topic::new("Budget");
        let responses = vec![
            response(budget.id, 9, "late", &[]),
            response(budget.id, 1, "early", &[]),
            response(budget.id, 4, "middle", &[]),
        ];
        let topics = [budget.clone()];
        let groups = group_by_topic(&topics, &responses);

        let contents: Vec<&str> = groups
            .get(budget.id)
            .unwrap()
            .iter()
            .map(|r| r.content.as_str())
            .collect();
        assert_eq!(contents, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let budget = Topic::new("Budget");
        let responses = vec![
            response(budget.id, 1, "first", &[]),
            response(budget.id, 1, "second", &[]),
            response(budget.id, 0, "zeroth", &[]),
            response(budget.id, 1, "third", &[]),
        ];
        let topics = [budget.clone()];
        let groups = group_by_topic(&topics, &responses);

        let contents: Vec<&str> = groups
            .get(budget.id)
            .unwrap()
            .iter()
            .map(|r| r.content.as_str())
            .collect();
        assert_eq!(contents, vec!["zeroth", "first", "second", "third"]);
    }

    #[test]
    fn test_empty_topic_and_orphans() {
        let budget = Topic::new("Budget");
        let hiring = Topic::new("Hiring");
        let responses = vec![
            response(budget.id, 1, "b", &[]),
            response(Uuid::new_v4(), 2, "stray", &[]),
        ];
        let topics = vec![budget.clone(), hiring.clone()];
        let groups = group_by_topic(&topics, &responses);

        assert_eq!(groups.get(hiring.id).unwrap().len(), 0);
        assert!(groups.get(Uuid::new_v4()).is_none());
        assert_eq!(groups.orphans().len(), 1);
        assert_eq!(groups.orphans()[0].content, "stray");
    }

    #[test]
    fn test_topic_order_follows_input() {
        let a = Topic::new("A");
        let b = Topic::new("B");
        let topics = vec![b.clone(), a.clone()];
        let groups = group_by_topic(&topics, &[]);
        let order: Vec<TopicId> = groups.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![b.id, a.id]);
        assert!(!groups.is_empty());
    }

    #[test]
    fn test_rollup_deduplicates_in_order() {
        let budget = Topic::new("Budget");
        let responses = vec![
            response(budget.id, 2, "second", &["b", "c"]),
            response(budget.id, 1, "first", &["a", "b"]),
        ];
        let topics = [budget.clone()];
        let groups = group_by_topic(&topics, &responses);

        let rollup = key_point_rollup(groups.get(budget.id).unwrap());
        assert_eq!(rollup, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rollup_skips_empty_lists_and_strings() {
        let topic = Topic::new("T");
        let responses = vec![
            response(topic.id, 1, "none", &[]),
            response(topic.id, 2, "blank", &[""]),
            response(topic.id, 3, "x", &["x", "x"]),
        ];
        let refs: Vec<&Response> = responses.iter().collect();
        assert_eq!(key_point_rollup(&refs), vec!["x"]);
    }
}
