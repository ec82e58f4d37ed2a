use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Task priority as stored by the remote task service.
///
/// The service counts `1` as the lowest urgency and `4` as the highest, while
/// users see the inverse (`1` is the most urgent). Every conversion between
/// the two goes through this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const LOWEST: Self = Self(1);
    pub const HIGHEST: Self = Self(4);

    pub fn from_storage(level: u8) -> Option<Self> {
        (1..=4).contains(&level).then_some(Self(level))
    }

    pub fn from_display(level: u8) -> Option<Self> {
        (1..=4).contains(&level).then_some(Self(5 - level))
    }

    /// Parses human input in display terms. Anything outside `1..=4` falls
    /// back to the lowest urgency.
    pub fn parse_display(input: &str) -> Self {
        input.trim().parse::<u8>().ok().and_then(Self::from_display).unwrap_or(Self::LOWEST)
    }

    pub fn storage(self) -> u8 {
        self.0
    }

    pub fn display(self) -> u8 {
        5 - self.0
    }

    pub fn name(self) -> &'static str {
        match self.display() {
            1 => "Urgent",
            2 => "High",
            3 => "Medium",
            _ => "Normal",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::LOWEST
    }
}

impl From<u8> for Priority {
    fn from(level: u8) -> Self {
        Self::from_storage(level).unwrap_or(Self::LOWEST)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.storage()
    }
}

/// Due-date descriptor. Carries a date, a date-time, or (malformed) neither.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Due {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Due {
    /// Resolves the descriptor to a point in time. Date-only values land on
    /// 23:59:59 of that day; a descriptor with neither field resolves to
    /// `None`.
    pub fn resolve(&self) -> Option<NaiveDateTime> {
        if let Some(datetime) = self.datetime.as_deref() {
            let trimmed = datetime.trim().trim_end_matches('Z');
            return NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").ok();
        }

        let date = self.date.as_deref()?;
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?.and_hms_opt(23, 59, 59)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due: Option<Due>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
}

impl Task {
    pub fn due_datetime(&self) -> Option<NaiveDateTime> {
        self.due.as_ref().and_then(Due::resolve)
    }

    pub fn is_recurring(&self) -> bool {
        self.due.as_ref().map(|due| due.is_recurring).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::{Due, Priority, Task};

    fn parse(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").expect("valid datetime")
    }

    #[test]
    fn date_only_due_resolves_to_end_of_day() {
        let due = Due { date: Some("2024-03-01".to_owned()), ..Due::default() };
        assert_eq!(due.resolve(), Some(parse("2024-03-01T23:59:59")));
    }

    #[test]
    fn datetime_due_resolves_unchanged() {
        let due = Due {
            date: Some("2024-03-01".to_owned()),
            datetime: Some("2024-03-01T09:00:00".to_owned()),
            ..Due::default()
        };
        assert_eq!(due.resolve(), Some(parse("2024-03-01T09:00:00")));
    }

    #[test]
    fn utc_suffixed_datetime_is_accepted() {
        let due = Due { datetime: Some("2024-03-01T09:00:00Z".to_owned()), ..Due::default() };
        assert_eq!(due.resolve(), Some(parse("2024-03-01T09:00:00")));
    }

    #[test]
    fn due_without_date_or_datetime_has_no_due_date() {
        let due = Due { string: "someday".to_owned(), is_recurring: true, ..Due::default() };
        assert_eq!(due.resolve(), None);
    }

    #[test]
    fn priority_inversion_round_trips_for_every_level() {
        for display in 1..=4u8 {
            let priority = Priority::from_display(display).expect("valid display level");
            let stored = priority.storage();
            let reloaded = Priority::from_storage(stored).expect("valid storage level");
            assert_eq!(reloaded.display(), display);
        }
        assert_eq!(Priority::from_display(1).map(Priority::storage), Some(4));
        assert_eq!(Priority::from_display(4).map(Priority::storage), Some(1));
    }

    #[test]
    fn invalid_priority_input_clamps_to_lowest_urgency() {
        for input in ["0", "5", "-1", "urgent", "", " 9 "] {
            assert_eq!(Priority::parse_display(input), Priority::LOWEST, "input `{input}`");
        }
        assert_eq!(Priority::parse_display(" 1 "), Priority::HIGHEST);
    }

    #[test]
    fn task_decodes_remote_payload() {
        let task: Task = serde_json::from_str(
            r#"{
                "id": "2995104339",
                "content": "Buy milk",
                "description": "",
                "due": {"date": "2016-09-01", "is_recurring": false, "string": "tomorrow"},
                "priority": 4,
                "parent_id": null,
                "project_id": "2203306141",
                "section_id": null,
                "labels": ["food"],
                "is_completed": false,
                "created_at": "2019-12-11T22:36:50.000000Z",
                "url": "https://todoist.com/showTask?id=2995104339"
            }"#,
        )
        .expect("decode task");

        assert_eq!(task.id.as_str(), "2995104339");
        assert_eq!(task.priority.display(), 1);
        assert_eq!(task.due_datetime(), Some(parse("2016-09-01T23:59:59")));
        assert_eq!(task.labels, vec!["food".to_owned()]);
    }
}
