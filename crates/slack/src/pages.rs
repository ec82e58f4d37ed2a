//! Paginated task listing for `/todo list`.
//!
//! Tasks are ordered by resolved due time (undated last, ties broken by id)
//! and grouped into `All`, `Inbox` and one group per project. Each page shows
//! [`PAGE_SIZE`] tasks; sub-tasks are listed under their parent when both sit
//! on the same page.

use std::collections::HashMap;

use taskbot_core::render::{shorten, strip_jump_link};
use taskbot_core::{Project, Task, TaskInfoRenderer};

use crate::blocks::{
    encode_action_value, ActionElement, ButtonElement, MessageBuilder, MessageTemplate,
    OptionObject, SelectElement, ACTION_PAGE_NEXT, ACTION_PAGE_PREVIOUS, ACTION_SELECT_PROJECT,
    ACTION_SELECT_TASK,
};

pub const PAGE_SIZE: usize = 10;
pub const ALL_GROUP: &str = "All";
pub const INBOX_GROUP: &str = "Inbox";

const OPTION_TEXT_MAX_CHARS: usize = 75;
const ENTRY_TITLE_MAX_CHARS: usize = 256;
const ENTRY_DESCRIPTION_MAX_CHARS: usize = 300;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskGroup {
    pub name: String,
    pub tasks: Vec<Task>,
}

impl TaskGroup {
    pub fn page_count(&self) -> usize {
        self.tasks.len().div_ceil(PAGE_SIZE)
    }

    /// Tasks on `page`, clamped to the last page.
    pub fn page(&self, page: usize) -> (usize, &[Task]) {
        let last = self.page_count().saturating_sub(1);
        let page = page.min(last);
        let start = page * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.tasks.len());
        (page, &self.tasks[start.min(end)..end])
    }
}

/// Sorts `tasks` and splits them into display groups. `All` and `Inbox`
/// always come first; project groups follow in order of first appearance.
pub fn plan_groups(mut tasks: Vec<Task>, projects: &[Project]) -> Vec<TaskGroup> {
    tasks.sort_by(|left, right| {
        let left_due = left.due_datetime();
        let right_due = right.due_datetime();
        (left_due.is_none(), left_due, &left.id).cmp(&(right_due.is_none(), right_due, &right.id))
    });

    let project_names: HashMap<&str, &str> =
        projects.iter().map(|project| (project.id.as_str(), project.name.as_str())).collect();

    let mut groups = vec![
        TaskGroup { name: ALL_GROUP.to_owned(), tasks: tasks.clone() },
        TaskGroup { name: INBOX_GROUP.to_owned(), tasks: Vec::new() },
    ];

    for task in tasks {
        let name = match task.project_id.as_deref() {
            Some(project_id) => {
                project_names.get(project_id).copied().unwrap_or(project_id).to_owned()
            }
            None => INBOX_GROUP.to_owned(),
        };

        match groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.tasks.push(task),
            None => groups.push(TaskGroup { name, tasks: vec![task] }),
        }
    }

    groups
}

pub fn find_group<'a>(groups: &'a [TaskGroup], name: &str) -> Option<&'a TaskGroup> {
    let wanted = name.trim();
    groups.iter().find(|group| group.name.eq_ignore_ascii_case(wanted))
}

pub fn task_list_message(
    groups: &[TaskGroup],
    group: &TaskGroup,
    page: usize,
    renderer: &TaskInfoRenderer,
) -> MessageTemplate {
    let (page, tasks) = group.page(page);
    let page_count = group.page_count().max(1);
    let heading = format!("Your Tasks: {} ({}/{page_count})", group.name, page + 1);

    let mut builder = MessageBuilder::new(heading.clone()).header("tasks.list.header.v1", heading);

    if tasks.is_empty() {
        builder = builder.section("tasks.list.empty.v1", |section| {
            section.mrkdwn(format!("No tasks in *{}*.", group.name));
        });
    }

    for task in tasks.iter().filter(|task| task.parent_id.is_none()) {
        builder = builder.section(format!("tasks.list.entry.{}", task.id), |section| {
            section.mrkdwn(entry_text(task, tasks, renderer));
        });
    }

    builder = builder.actions("tasks.list.select.v1", |actions| {
        if !tasks.is_empty() {
            let selector = tasks.iter().fold(
                SelectElement::new(ACTION_SELECT_TASK, "Select a task for more info"),
                |select, task| {
                    let label =
                        shorten(&strip_jump_link(&task.content), OPTION_TEXT_MAX_CHARS);
                    select.option(OptionObject::new(label, task.id.as_str()), false)
                },
            );
            actions.element(ActionElement::StaticSelect(selector));
        }

        let projects = groups.iter().fold(
            SelectElement::new(ACTION_SELECT_PROJECT, "Project"),
            |select, candidate| {
                let value = encode_action_value(&[("project", &candidate.name), ("page", "0")]);
                select.option(OptionObject::new(&candidate.name, value), candidate.name == group.name)
            },
        );
        actions.element(ActionElement::StaticSelect(projects));
    });

    builder
        .actions("tasks.list.navigation.v1", |actions| {
            if page > 0 {
                let previous = (page - 1).to_string();
                actions.button(
                    ButtonElement::new(ACTION_PAGE_PREVIOUS, "Previous")
                        .value(encode_action_value(&[("project", &group.name), ("page", &previous)])),
                );
            }
            if page + 1 < group.page_count() {
                let next = (page + 1).to_string();
                actions.button(
                    ButtonElement::new(ACTION_PAGE_NEXT, "Next")
                        .value(encode_action_value(&[("project", &group.name), ("page", &next)])),
                );
            }
        })
        .build()
}

fn entry_text(task: &Task, page_tasks: &[Task], renderer: &TaskInfoRenderer) -> String {
    let title = shorten(&strip_jump_link(&task.content), ENTRY_TITLE_MAX_CHARS);
    let mut text = format!("*{title}*\n`{}`", task.id);
    if let Some(due) = task.due_datetime() {
        text.push_str(&format!(" | Due {}", renderer.relative_due(due)));
    }
    if !task.description.is_empty() {
        text.push('\n');
        text.push_str(&shorten(&task.description, ENTRY_DESCRIPTION_MAX_CHARS));
    }

    let subtasks: Vec<&Task> = page_tasks
        .iter()
        .filter(|candidate| candidate.parent_id.as_ref() == Some(&task.id))
        .collect();
    if !subtasks.is_empty() {
        text.push_str("\n*Sub-Tasks:*");
        for subtask in subtasks {
            let content = shorten(&strip_jump_link(&subtask.content), ENTRY_TITLE_MAX_CHARS);
            text.push_str(&format!("\n- {content} | <{}|{}>", subtask.url, subtask.id));
            if let Some(due) = subtask.due_datetime() {
                text.push_str(&format!(" | Due {}", renderer.relative_due(due)));
            }
        }
    }

    text
}
