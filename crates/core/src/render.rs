use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};

use crate::domain::label::{decorate_label_name, Label};
use crate::domain::task::Task;
use crate::subtasks::SubtaskIndex;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const COMPLETED_MARKER: &str = "✅";
pub const OPEN_MARKER: &str = "⬜";
pub const JUMP_LINK_LABEL: &str = "Jump to message";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentSection {
    pub name: String,
    pub value: String,
}

/// Display-ready view of one task, independent of any message layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskDocument {
    pub title: String,
    pub body: String,
    pub sections: Vec<DocumentSection>,
}

impl TaskDocument {
    pub fn section(&self, name: &str) -> Option<&DocumentSection> {
        self.sections.iter().find(|section| section.name == name)
    }
}

/// Renders tasks into [`TaskDocument`]s.
///
/// Remote due times are naive; `utc_offset` places them on the timeline so
/// Slack can localise them for each viewer.
#[derive(Clone, Copy, Debug)]
pub struct TaskInfoRenderer {
    utc_offset: FixedOffset,
}

impl Default for TaskInfoRenderer {
    fn default() -> Self {
        Self { utc_offset: Utc.fix() }
    }
}

impl TaskInfoRenderer {
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self { utc_offset }
    }

    pub fn render(
        &self,
        task: &Task,
        labels: &[Label],
        subtasks: Option<&SubtaskIndex>,
    ) -> TaskDocument {
        let mut title = shorten(&strip_jump_link(&task.content), TITLE_MAX_CHARS);
        if task.is_completed {
            title = format!("{COMPLETED_MARKER} {title}");
        }

        let mut body = format!("`{}`", task.id);
        if !task.description.is_empty() {
            body.push('\n');
            body.push_str(&shorten(&task.description, DESCRIPTION_MAX_CHARS));
        }

        let mut sections = vec![
            DocumentSection { name: "Dates".to_owned(), value: self.dates(task) },
            DocumentSection { name: "Category".to_owned(), value: category(task) },
            DocumentSection { name: "Filters".to_owned(), value: filters(task, labels) },
        ];

        if let Some(index) = subtasks.filter(|index| !index.is_empty()) {
            sections.push(DocumentSection { name: "Subtasks".to_owned(), value: subtask_lines(index) });
        }

        TaskDocument { title, body, sections }
    }

    pub fn relative_due(&self, due: NaiveDateTime) -> String {
        slack_date(self.epoch(due), "{ago}", &due.format("%Y-%m-%d %H:%M").to_string())
    }

    pub fn absolute_due(&self, due: NaiveDateTime) -> String {
        slack_date(
            self.epoch(due),
            "{date_short_pretty} at {time}",
            &due.format("%Y-%m-%d %H:%M").to_string(),
        )
    }

    fn epoch(&self, local: NaiveDateTime) -> i64 {
        local.and_utc().timestamp() - i64::from(self.utc_offset.local_minus_utc())
    }

    fn dates(&self, task: &Task) -> String {
        let mut lines = Vec::new();
        if let Some(due) = task.due_datetime() {
            let mut relative = format!("Due {}", self.relative_due(due));
            if task.is_recurring() {
                relative.push_str(" Recurring");
            }
            lines.push(relative);
            lines.push(self.absolute_due(due));
        }

        let created = task.created_at;
        lines.push(format!(
            "Created: {}",
            slack_date(
                created.timestamp(),
                "{date_short_pretty} at {time}",
                &created.format("%Y-%m-%d %H:%M UTC").to_string(),
            )
        ));
        lines.join("\n")
    }
}

fn category(task: &Task) -> String {
    let mut lines = Vec::new();
    if let Some(parent_id) = &task.parent_id {
        lines.push(format!("Parent: `{parent_id}`"));
    }
    match &task.project_id {
        Some(project_id) => lines.push(format!("Project: `{project_id}`")),
        None => lines.push("Project: Inbox".to_owned()),
    }
    if let Some(section_id) = &task.section_id {
        lines.push(format!("Section: `{section_id}`"));
    }
    lines.join("\n")
}

fn filters(task: &Task, catalog: &[Label]) -> String {
    let priority = format!("P{} {}", task.priority.display(), task.priority.name());
    if task.labels.is_empty() {
        return priority;
    }

    let labels = task
        .labels
        .iter()
        .map(|name| decorate_label_name(name, catalog))
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{priority}\n{labels}")
}

fn subtask_lines(index: &SubtaskIndex) -> String {
    index
        .tree
        .walk()
        .into_iter()
        .filter_map(|(depth, id)| index.lookup.get(id).map(|task| (depth, task)))
        .map(|(depth, task)| {
            let marker = if task.is_completed { COMPLETED_MARKER } else { OPEN_MARKER };
            let content = shorten(&strip_jump_link(&task.content), TITLE_MAX_CHARS);
            format!("{}{marker} {content}", "\u{2003}".repeat(depth))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Slack date token; viewers see it in their own timezone.
pub fn slack_date(epoch: i64, format: &str, fallback: &str) -> String {
    format!("<!date^{epoch}^{format}|{fallback}>")
}

/// Truncates to `max_chars` characters, ending in `...` when cut.
pub fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }

    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Suffix appended to tasks created from a chat message.
pub fn jump_link_suffix(permalink: &str) -> String {
    format!(" | <{permalink}|{JUMP_LINK_LABEL}>")
}

pub fn strip_jump_link(content: &str) -> String {
    let closing = format!("|{JUMP_LINK_LABEL}>");
    let mut stripped = content.to_owned();

    while let Some(end) = stripped.find(&closing) {
        let Some(start) = stripped[..end].rfind(" | <") else {
            break;
        };
        stripped.replace_range(start..end + closing.len(), "");
    }

    stripped
}
