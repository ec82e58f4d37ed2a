use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use taskbot_core::{TaskId, TaskLookup};

use crate::blocks::{self, MessageTemplate};

const LABEL_LOOKUP_PREFIX: &str = "label:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub verb: String,
    pub freeform_args: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodoCommand {
    Add { content: String },
    View { lookup: Option<TaskLookup> },
    List { project: Option<String> },
    Help,
    Unknown { verb: String, freeform_args: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
    #[error("invalid action payload: {0}")]
    InvalidActionPayload(String),
}

pub fn normalize_todo_command(
    payload: SlashCommandPayload,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.command != "/todo" {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let text = payload.text.trim().to_owned();
    let (verb, freeform_args) = split_verb(&text);

    Ok(CommandEnvelope {
        command: "todo".to_owned(),
        verb,
        freeform_args,
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        trigger_ts: payload.trigger_ts,
        request_id: payload.request_id,
    })
}

pub fn parse_todo_command(input: &str) -> TodoCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return TodoCommand::Help;
    }

    let (verb, freeform_args) = split_verb(trimmed);
    classify_todo_command(&verb, freeform_args)
}

fn split_verb(text: &str) -> (String, String) {
    match text.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_ascii_lowercase(), rest.trim().to_owned()),
        None if text.is_empty() => ("help".to_owned(), String::new()),
        None => (text.to_ascii_lowercase(), String::new()),
    }
}

/// Explicit lookup for `/todo view`: `label:<name>` selects by label, any
/// other argument is a task id.
pub fn parse_task_lookup(args: &str) -> Option<TaskLookup> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.strip_prefix(LABEL_LOOKUP_PREFIX) {
        Some(label) if !label.trim().is_empty() => {
            Some(TaskLookup::ByLabel(label.trim().to_owned()))
        }
        Some(_) => None,
        None => Some(TaskLookup::ById(TaskId::from(trimmed))),
    }
}

pub struct CommandRouter<S: ?Sized> {
    service: Arc<S>,
}

impl<S> CommandRouter<S>
where
    S: TaskCommandService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match classify_todo_command(&envelope.verb, envelope.freeform_args.clone()) {
            TodoCommand::Add { content } => self.service.add_task(content, &envelope).await,
            TodoCommand::View { lookup: Some(lookup) } => {
                self.service.view_task(lookup, &envelope).await
            }
            TodoCommand::View { lookup: None } => Ok(blocks::task_lookup_message()),
            TodoCommand::List { project } => self.service.list_tasks(project, 0, &envelope).await,
            TodoCommand::Help => Ok(blocks::help_message()),
            TodoCommand::Unknown { verb, .. } => Ok(blocks::error_message(
                &format!("Unsupported command `/todo {verb}`. Try `/todo help`."),
                &envelope.request_id,
            )),
        }
    }
}

#[async_trait]
pub trait TaskCommandService: Send + Sync {
    async fn add_task(
        &self,
        content: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn view_task(
        &self,
        lookup: TaskLookup,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn list_tasks(
        &self,
        project: Option<String>,
        page: usize,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

fn classify_todo_command(verb: &str, freeform_args: String) -> TodoCommand {
    match verb {
        "add" if !freeform_args.is_empty() => TodoCommand::Add { content: freeform_args },
        "view" => TodoCommand::View { lookup: parse_task_lookup(&freeform_args) },
        "list" => TodoCommand::List {
            project: if freeform_args.is_empty() { None } else { Some(freeform_args) },
        },
        "help" => TodoCommand::Help,
        _ => TodoCommand::Unknown { verb: verb.to_owned(), freeform_args },
    }
}

/// Decoded `key=value;` action payload. Duplicate keys are rejected so a
/// tampered payload cannot shadow an earlier value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionValue {
    entries: HashMap<String, String>,
}

impl ActionValue {
    pub fn parse(value: &str) -> Option<Self> {
        let mut entries = HashMap::new();

        for segment in value.split(';') {
            if segment.trim().is_empty() {
                continue;
            }
            let (key, raw_value) = segment.split_once('=')?;
            let normalized_key = key.trim().to_ascii_lowercase();
            let decoded = decode_action_value_component(raw_value.trim())?;
            if normalized_key.is_empty() || entries.insert(normalized_key, decoded).is_some() {
                return None;
            }
        }

        Some(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str, CommandRouteError> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CommandRouteError::InvalidActionPayload(format!("missing `{key}`")))
    }

    pub fn task_id(&self) -> Result<TaskId, CommandRouteError> {
        self.require("task").map(TaskId::from)
    }
}

pub fn parse_action_value(value: Option<&str>) -> Result<ActionValue, CommandRouteError> {
    let raw = value.unwrap_or_default();
    ActionValue::parse(raw)
        .ok_or_else(|| CommandRouteError::InvalidActionPayload(format!("malformed `{raw}`")))
}

fn decode_action_value_component(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0usize;

    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                if index + 2 >= bytes.len() {
                    return None;
                }

                let high = hex_nibble(bytes[index + 1])?;
                let low = hex_nibble(bytes[index + 2])?;
                decoded.push((high << 4) | low);
                index += 3;
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }

    String::from_utf8(decoded).ok()
}

fn hex_nibble(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}
