//! The bot service behind every Slack interaction.
//!
//! [`TaskBotService`] owns the task store handle, the three gated caches, the
//! completion debouncer and the renderer, and implements each service trait
//! the dispatcher needs. Store failures never escape as handler errors: they
//! are mapped through [`ApplicationError`] into a user-safe error card that
//! carries the correlation id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use taskbot_core::config::AppConfig;
use taskbot_core::render::{jump_link_suffix, shorten, strip_jump_link, JUMP_LINK_LABEL};
use taskbot_core::{
    ancestor_depth, build_subtask_tree, resolve_task, ApplicationError, AutocompleteCache, Clock,
    CompletionDebouncer, DomainError, Label, LabelCache, NewTask, Priority, Task, TaskCache,
    TaskId, TaskInfoRenderer, TaskLookup, TaskStore, TaskUpdate, MAX_SUBTASK_DEPTH,
};

use crate::blocks::{
    self, LabelChoice, MessageTemplate, OptionObject, TaskCardControls, ACTION_ADD_INFO,
    ACTION_ADD_SUBTASK, ACTION_COMPLETE, ACTION_HELP, ACTION_LABELS, ACTION_LOOKUP_TASK,
    ACTION_PAGE_NEXT, ACTION_PAGE_PREVIOUS, ACTION_SELECT_PROJECT, ACTION_SELECT_TASK,
    INPUT_CONTENT, INPUT_DESCRIPTION, INPUT_DUE, INPUT_LABELS, INPUT_PRIORITY, MODAL_ADD_INFO,
    MODAL_ADD_SUBTASK,
};
use crate::commands::{
    parse_action_value, ActionValue, CommandEnvelope, CommandRouteError, TaskCommandService,
};
use crate::events::{
    BlockActionEvent, BlockActionService, BlockSuggestionEvent, EventContext, EventHandlerError,
    HandlerResult, MessageShortcutEvent, MessageShortcutService, SuggestionService,
    ViewSubmissionEvent, ViewSubmissionService,
};
use crate::pages::{find_group, plan_groups, task_list_message, ALL_GROUP};

/// Slack caps a multi-select at this many options.
pub const MAX_LABEL_CHOICES: usize = 25;
/// Longest message excerpt kept when a chat message becomes a task.
pub const SHORTCUT_EXCERPT_MAX_CHARS: usize = 100;
/// Due string that clears a task's due date.
pub const CLEAR_DUE_STRING: &str = "no due date";

const OPTION_TEXT_MAX_CHARS: usize = 75;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub autocomplete_users: usize,
    pub label_users: usize,
    pub tasks_filled: bool,
}

pub struct TaskBotService {
    store: Arc<dyn TaskStore>,
    autocomplete: AutocompleteCache,
    labels: LabelCache,
    tasks: TaskCache,
    completion: CompletionDebouncer,
    renderer: TaskInfoRenderer,
}

impl TaskBotService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        autocomplete: AutocompleteCache,
        labels: LabelCache,
        tasks: TaskCache,
        completion: CompletionDebouncer,
        renderer: TaskInfoRenderer,
    ) -> Self {
        Self { store, autocomplete, labels, tasks, completion, renderer }
    }

    pub fn from_config(
        store: Arc<dyn TaskStore>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            Arc::clone(&store),
            AutocompleteCache::new(
                Arc::clone(&store),
                config.cache.autocomplete_interval(),
                Arc::clone(&clock),
            ),
            LabelCache::new(Arc::clone(&store), config.cache.labels_interval(), Arc::clone(&clock)),
            TaskCache::new(Arc::clone(&store), config.cache.tasks_interval(), clock),
            CompletionDebouncer::new(Arc::clone(&store), config.completion.settle_delay()),
            TaskInfoRenderer::new(config.display.utc_offset()),
        )
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            autocomplete_users: self.autocomplete.cached_users(),
            label_users: self.labels.cached_users(),
            tasks_filled: self.tasks.is_filled(),
        }
    }

    pub fn pending_completions(&self) -> usize {
        self.completion.pending_count()
    }

    async fn task_card(
        &self,
        heading: &str,
        task: &Task,
        user_id: &str,
    ) -> Result<MessageTemplate, ApplicationError> {
        let labels = self.labels.get_labels(user_id).await?;
        let all_tasks = self.tasks.get_tasks().await?;
        let subtasks = build_subtask_tree(task, &all_tasks);
        let document = self.renderer.render(task, &labels, Some(&subtasks));

        let controls = TaskCardControls {
            task_id: task.id.to_string(),
            is_completed: task.is_completed,
            allow_subtask: ancestor_depth(task, &all_tasks) < MAX_SUBTASK_DEPTH,
            label_choices: label_choices(task, &labels),
        };
        Ok(blocks::task_card(heading, &document, &controls))
    }

    async fn ensure_subtask_allowed(&self, parent: &Task) -> Result<(), ApplicationError> {
        let all_tasks = self.tasks.get_tasks().await?;
        if ancestor_depth(parent, &all_tasks) >= MAX_SUBTASK_DEPTH {
            return Err(DomainError::SubtaskDepthExceeded { limit: MAX_SUBTASK_DEPTH }.into());
        }
        Ok(())
    }

    async fn list_page(
        &self,
        project: Option<&str>,
        page: usize,
    ) -> Result<MessageTemplate, ApplicationError> {
        let (tasks, projects) =
            tokio::try_join!(self.tasks.get_tasks(), self.store.list_projects())?;
        let groups = plan_groups(tasks.as_ref().clone(), &projects);
        let wanted = project.unwrap_or(ALL_GROUP);

        Ok(match find_group(&groups, wanted) {
            Some(group) => task_list_message(&groups, group, page, &self.renderer),
            None => blocks::no_tasks_found_message(wanted),
        })
    }

    async fn view_by_id(
        &self,
        task_id: &TaskId,
        user_id: &str,
    ) -> Result<MessageTemplate, ApplicationError> {
        let task = self.store.get_task(task_id).await?;
        self.task_card("Task Info", &task, user_id).await
    }

    async fn block_action(
        &self,
        event: &BlockActionEvent,
    ) -> Result<Result<HandlerResult, ApplicationError>, CommandRouteError> {
        let user_id = event.user_id.as_str();
        Ok(match event.action_id.as_str() {
            ACTION_COMPLETE => {
                let payload = parse_action_value(event.value.as_deref())?;
                let task_id = payload.task_id()?;
                let want_completed = payload.require("completed")? == "true";
                self.toggle_completion(task_id, want_completed, user_id).await
            }
            ACTION_ADD_INFO => {
                let task_id = parse_action_value(event.value.as_deref())?.task_id()?;
                self.add_info_form(&task_id).await
            }
            ACTION_ADD_SUBTASK => {
                let task_id = parse_action_value(event.value.as_deref())?.task_id()?;
                self.add_subtask_form(&task_id).await
            }
            ACTION_LABELS => {
                let task_id = parse_action_value(Some(event.block_id.as_str()))?.task_id()?;
                self.set_labels(&task_id, event.selected_values.clone(), user_id).await
            }
            ACTION_SELECT_TASK | ACTION_LOOKUP_TASK => {
                let Some(selected) = event.selected_values.first() else {
                    return Err(CommandRouteError::InvalidActionPayload(
                        "no task selected".to_owned(),
                    ));
                };
                self.view_by_id(&TaskId::from(selected.as_str()), user_id)
                    .await
                    .map(HandlerResult::Responded)
            }
            ACTION_PAGE_PREVIOUS | ACTION_PAGE_NEXT => {
                let payload = parse_action_value(event.value.as_deref())?;
                self.navigate(&payload).await
            }
            ACTION_SELECT_PROJECT => {
                let selected = event.selected_values.first().map(String::as_str);
                let payload = parse_action_value(selected)?;
                self.navigate(&payload).await
            }
            ACTION_HELP => Ok(HandlerResult::Responded(blocks::help_message())),
            other => {
                debug!(event_name = "slack.action.unhandled", action_id = other, "ignoring action");
                Ok(HandlerResult::Ignored)
            }
        })
    }

    async fn toggle_completion(
        &self,
        task_id: TaskId,
        want_completed: bool,
        user_id: &str,
    ) -> Result<HandlerResult, ApplicationError> {
        let mut task = self.store.get_task(&task_id).await?;
        task.is_completed = want_completed;
        let card = self.task_card("Task Info", &task, user_id).await?;

        self.completion.request(task_id.clone(), want_completed);
        info!(
            event_name = "task.completion.requested",
            task_id = %task_id,
            user_id,
            want_completed,
            "completion change scheduled"
        );
        Ok(HandlerResult::Responded(card))
    }

    async fn add_info_form(&self, task_id: &TaskId) -> Result<HandlerResult, ApplicationError> {
        let task = self.store.get_task(task_id).await?;
        let due_string = task.due.as_ref().map(|due| due.string.as_str()).unwrap_or_default();
        Ok(HandlerResult::OpenModal(blocks::add_info_modal(
            task.id.as_str(),
            &task.description,
            due_string,
            task.priority.display(),
            &task.labels,
        )))
    }

    async fn add_subtask_form(&self, task_id: &TaskId) -> Result<HandlerResult, ApplicationError> {
        let parent = self.store.get_task(task_id).await?;
        self.ensure_subtask_allowed(&parent).await?;
        Ok(HandlerResult::OpenModal(blocks::add_subtask_modal(parent.id.as_str())))
    }

    async fn set_labels(
        &self,
        task_id: &TaskId,
        labels: Vec<String>,
        user_id: &str,
    ) -> Result<HandlerResult, ApplicationError> {
        let update = TaskUpdate { labels: Some(labels), ..TaskUpdate::default() };
        let task = self.store.update_task(task_id, update).await?;
        self.task_card("Task Info", &task, user_id).await.map(HandlerResult::Responded)
    }

    async fn navigate(&self, payload: &ActionValue) -> Result<HandlerResult, ApplicationError> {
        let page = payload.get("page").and_then(|page| page.parse().ok()).unwrap_or(0);
        self.list_page(payload.get("project"), page).await.map(HandlerResult::Responded)
    }

    async fn view_submission(
        &self,
        event: &ViewSubmissionEvent,
    ) -> Result<Option<Result<MessageTemplate, ApplicationError>>, EventHandlerError> {
        let field = |block_id: &str| {
            event.values.get(block_id).map(|value| value.trim()).unwrap_or_default().to_owned()
        };

        match event.callback_id.as_str() {
            MODAL_ADD_INFO => {
                let task_id = parse_action_value(Some(event.private_metadata.as_str()))?.task_id()?;
                let update = add_info_update(
                    &field(INPUT_DESCRIPTION),
                    &field(INPUT_DUE),
                    &field(INPUT_PRIORITY),
                    &field(INPUT_LABELS),
                );
                let result = match self.store.update_task(&task_id, update).await {
                    Ok(task) => self.task_card("Task Info", &task, &event.user_id).await,
                    Err(error) => Err(error.into()),
                };
                Ok(Some(result))
            }
            MODAL_ADD_SUBTASK => {
                let parent_id = parse_action_value(Some(event.private_metadata.as_str()))?.task_id()?;
                let content = field(INPUT_CONTENT);
                if content.is_empty() {
                    return Err(EventHandlerError::Interaction(
                        "sub-task content is empty".to_owned(),
                    ));
                }
                Ok(Some(self.create_subtask(&parent_id, content, &event.user_id).await))
            }
            other => {
                debug!(event_name = "slack.view.unhandled", callback_id = other, "ignoring view");
                Ok(None)
            }
        }
    }

    async fn create_subtask(
        &self,
        parent_id: &TaskId,
        content: String,
        user_id: &str,
    ) -> Result<MessageTemplate, ApplicationError> {
        let parent = self.store.get_task(parent_id).await?;
        self.ensure_subtask_allowed(&parent).await?;
        let task = self.store.add_task(NewTask::new(content).child_of(parent.id.clone())).await?;
        info!(
            event_name = "task.subtask.created",
            task_id = %task.id,
            parent_id = %parent.id,
            user_id,
            "sub-task created"
        );
        self.task_card("Sub-Task Created", &task, user_id).await
    }
}

#[async_trait]
impl TaskCommandService for TaskBotService {
    async fn add_task(
        &self,
        content: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let result = match self.store.add_task(NewTask::new(content)).await {
            Ok(task) => {
                info!(
                    event_name = "task.created",
                    task_id = %task.id,
                    user_id = %envelope.user_id,
                    correlation_id = %envelope.request_id,
                    "task created from command"
                );
                self.task_card("Task Created", &task, &envelope.user_id).await
            }
            Err(error) => Err(error.into()),
        };
        Ok(or_error_card(result, &envelope.request_id))
    }

    async fn view_task(
        &self,
        lookup: TaskLookup,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let result = match resolve_task(self.store.as_ref(), &lookup).await {
            Ok(Some(task)) => self.task_card("Task Info", &task, &envelope.user_id).await,
            Ok(None) => Ok(blocks::no_tasks_found_message(&lookup_query(&lookup))),
            Err(error) => Err(error.into()),
        };
        Ok(or_error_card(result, &envelope.request_id))
    }

    async fn list_tasks(
        &self,
        project: Option<String>,
        page: usize,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let result = self.list_page(project.as_deref(), page).await;
        Ok(or_error_card(result, &envelope.request_id))
    }
}

#[async_trait]
impl BlockActionService for TaskBotService {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let result = self.block_action(event).await?;
        Ok(match result {
            Ok(outcome) => outcome,
            Err(error) => HandlerResult::Responded(error_card(error, &ctx.correlation_id)),
        })
    }
}

#[async_trait]
impl ViewSubmissionService for TaskBotService {
    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        let result = self.view_submission(event).await?;
        Ok(result.map(|result| or_error_card(result, &ctx.correlation_id)))
    }
}

#[async_trait]
impl SuggestionService for TaskBotService {
    async fn suggest_options(
        &self,
        event: &BlockSuggestionEvent,
        ctx: &EventContext,
    ) -> Result<Vec<OptionObject>, EventHandlerError> {
        if event.action_id != ACTION_LOOKUP_TASK {
            return Ok(Vec::new());
        }

        match self.autocomplete.suggest(&event.user_id, &event.value).await {
            Ok(suggestions) => Ok(suggestions
                .into_iter()
                .map(|suggestion| {
                    let label =
                        shorten(&strip_jump_link(&suggestion.content), OPTION_TEXT_MAX_CHARS);
                    OptionObject::new(label, suggestion.task_id.as_str())
                })
                .collect()),
            Err(error) => {
                warn!(
                    event_name = "task.autocomplete.failed",
                    user_id = %event.user_id,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "task suggestions unavailable"
                );
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl MessageShortcutService for TaskBotService {
    async fn mark_as_todo(
        &self,
        event: &MessageShortcutEvent,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError> {
        let content = shortcut_task_content(&event.message_text, &event.permalink);
        let result = match self.store.add_task(NewTask::new(content)).await {
            Ok(task) => {
                info!(
                    event_name = "task.created",
                    task_id = %task.id,
                    user_id = %event.user_id,
                    correlation_id = %ctx.correlation_id,
                    "task created from message shortcut"
                );
                self.task_card("Task Created", &task, &event.user_id).await
            }
            Err(error) => Err(error.into()),
        };
        Ok(or_error_card(result, &ctx.correlation_id))
    }
}

/// Label options for a task card: the task's own labels first, then
/// favorites, then the rest, capped at [`MAX_LABEL_CHOICES`].
pub fn label_choices(task: &Task, catalog: &[Label]) -> Vec<LabelChoice> {
    let is_current = |label: &&Label| task.labels.contains(&label.name);
    let current = catalog.iter().filter(is_current);
    let favorites = catalog.iter().filter(|label| !is_current(label) && label.is_favorite);
    let others = catalog.iter().filter(|label| !is_current(label) && !label.is_favorite);

    current
        .chain(favorites)
        .chain(others)
        .take(MAX_LABEL_CHOICES)
        .map(|label| LabelChoice {
            name: label.name.clone(),
            display: label.decorated(),
            selected: task.labels.contains(&label.name),
        })
        .collect()
}

/// Builds the update for an Add Info submission. A blank due string clears
/// the due date, and priority is typed in display terms.
pub fn add_info_update(description: &str, due: &str, priority: &str, labels: &str) -> TaskUpdate {
    let due_string = if due.trim().is_empty() { CLEAR_DUE_STRING } else { due.trim() };
    TaskUpdate {
        description: Some(description.trim().to_owned()),
        due_string: Some(due_string.to_owned()),
        priority: Some(Priority::parse_display(priority)),
        labels: Some(
            labels
                .split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_owned)
                .collect(),
        ),
    }
}

pub fn shortcut_task_content(message_text: &str, permalink: &str) -> String {
    let excerpt = shorten(message_text.trim(), SHORTCUT_EXCERPT_MAX_CHARS);
    if excerpt.is_empty() {
        return format!("<{permalink}|{JUMP_LINK_LABEL}>");
    }
    format!("{excerpt}{}", jump_link_suffix(permalink))
}

fn lookup_query(lookup: &TaskLookup) -> String {
    match lookup {
        TaskLookup::ById(id) => id.to_string(),
        TaskLookup::ByLabel(label) => format!("label:{label}"),
    }
}

fn or_error_card(
    result: Result<MessageTemplate, ApplicationError>,
    correlation_id: &str,
) -> MessageTemplate {
    result.unwrap_or_else(|error| error_card(error, correlation_id))
}

fn error_card(error: ApplicationError, correlation_id: &str) -> MessageTemplate {
    warn!(
        event_name = "task.request.failed",
        correlation_id,
        error = %error,
        "task request failed"
    );
    let interface = error.into_interface(correlation_id);
    blocks::error_message(interface.user_message(), interface.correlation_id())
}
