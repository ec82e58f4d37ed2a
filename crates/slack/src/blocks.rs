use serde::Serialize;

use taskbot_core::TaskDocument;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionObject {
    pub text: TextObject,
    pub value: String,
}

impl OptionObject {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionObject>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub initial_options: Vec<OptionObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_query_length: Option<u8>,
}

impl SelectElement {
    pub fn new(action_id: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            options: Vec::new(),
            initial_options: Vec::new(),
            min_query_length: None,
        }
    }

    pub fn option(mut self, option: OptionObject, selected: bool) -> Self {
        if selected {
            self.initial_options.push(option.clone());
        }
        self.options.push(option);
        self
    }

    pub fn min_query_length(mut self, length: u8) -> Self {
        self.min_query_length = Some(length);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonElement),
    StaticSelect(SelectElement),
    MultiStaticSelect(SelectElement),
    ExternalSelect(SelectElement),
}

impl ActionElement {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(button) => &button.action_id,
            Self::StaticSelect(select)
            | Self::MultiStaticSelect(select)
            | Self::ExternalSelect(select) => &select.action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        block_id: String,
        text: TextObject,
    },
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Actions {
        block_id: String,
        elements: Vec<ActionElement>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Divider {
        block_id: String,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: InputElement,
        optional: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.block_id() == block_id)
    }
}

impl Block {
    pub fn block_id(&self) -> &str {
        match self {
            Self::Header { block_id, .. }
            | Self::Section { block_id, .. }
            | Self::Actions { block_id, .. }
            | Self::Context { block_id, .. }
            | Self::Divider { block_id }
            | Self::Input { block_id, .. } => block_id,
        }
    }
}

/// Modal view opened in response to an interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub private_metadata: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, fields) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, fields });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        let elements = builder.build();
        if !elements.is_empty() {
            self.blocks.push(Block::Actions { block_id: block_id.into(), elements });
        }
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn field(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> (TextObject, Vec<TextObject>) {
        (self.text.unwrap_or_else(|| TextObject::plain(" ")), self.fields)
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(ActionElement::Button(button));
        self
    }

    pub fn element(&mut self, element: ActionElement) -> &mut Self {
        self.elements.push(element);
        self
    }

    fn build(self) -> Vec<ActionElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub struct ModalBuilder {
    callback_id: String,
    title: String,
    submit: String,
    private_metadata: String,
    blocks: Vec<Block>,
}

impl ModalBuilder {
    pub fn new(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            callback_id: callback_id.into(),
            title: title.into(),
            submit: "Submit".to_owned(),
            private_metadata: String::new(),
            blocks: Vec::new(),
        }
    }

    pub fn private_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.private_metadata = metadata.into();
        self
    }

    pub fn text_input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        multiline: bool,
        initial_value: Option<String>,
        optional: bool,
    ) -> Self {
        let block_id = block_id.into();
        self.blocks.push(Block::Input {
            element: InputElement::PlainTextInput {
                action_id: format!("{block_id}.input"),
                multiline,
                initial_value: initial_value.filter(|value| !value.is_empty()),
            },
            block_id,
            label: TextObject::plain(label),
            optional,
        });
        self
    }

    pub fn build(self) -> ModalView {
        ModalView {
            kind: "modal",
            callback_id: self.callback_id,
            title: TextObject::plain(self.title),
            submit: TextObject::plain(self.submit),
            close: TextObject::plain("Cancel"),
            private_metadata: self.private_metadata,
            blocks: self.blocks,
        }
    }
}

pub const ACTION_COMPLETE: &str = "task.complete.v1";
pub const ACTION_ADD_INFO: &str = "task.add_info.v1";
pub const ACTION_ADD_SUBTASK: &str = "task.add_subtask.v1";
pub const ACTION_LABELS: &str = "task.labels.v1";
pub const ACTION_SELECT_TASK: &str = "tasks.select.v1";
pub const ACTION_LOOKUP_TASK: &str = "tasks.lookup.v1";
pub const ACTION_PAGE_PREVIOUS: &str = "tasks.page.previous.v1";
pub const ACTION_PAGE_NEXT: &str = "tasks.page.next.v1";
pub const ACTION_SELECT_PROJECT: &str = "tasks.project.v1";
pub const ACTION_HELP: &str = "todo.help.v1";

pub const BLOCK_LABELS: &str = "task.labels.v1";

pub const MODAL_ADD_INFO: &str = "task.add_info.modal.v1";
pub const MODAL_ADD_SUBTASK: &str = "task.add_subtask.modal.v1";

pub const INPUT_DESCRIPTION: &str = "task.description";
pub const INPUT_DUE: &str = "task.due";
pub const INPUT_PRIORITY: &str = "task.priority";
pub const INPUT_LABELS: &str = "task.labels";
pub const INPUT_CONTENT: &str = "task.content";

/// One entry of the label multi-select on a task card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelChoice {
    pub name: String,
    pub display: String,
    pub selected: bool,
}

/// Interactive controls attached to a task card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskCardControls {
    pub task_id: String,
    pub is_completed: bool,
    pub allow_subtask: bool,
    pub label_choices: Vec<LabelChoice>,
}

/// Encodes `key=value;` pairs with `%`-escaping so values may contain the
/// separators.
pub fn encode_action_value(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={};", encode_action_value_component(value)))
        .collect()
}

fn encode_action_value_component(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '%' | ';' | '=' => format!("%{:02X}", u32::from(ch)),
            other => other.to_string(),
        })
        .collect()
}

pub fn task_card(heading: &str, document: &TaskDocument, controls: &TaskCardControls) -> MessageTemplate {
    let task_value = encode_action_value(&[("task", &controls.task_id)]);
    let toggle_value = encode_action_value(&[
        ("task", &controls.task_id),
        ("completed", if controls.is_completed { "false" } else { "true" }),
    ]);
    let (toggle_label, toggle_style) = if controls.is_completed {
        ("Un-Complete", ButtonStyle::Danger)
    } else {
        ("Complete", ButtonStyle::Primary)
    };

    let mut builder = MessageBuilder::new(format!("{heading}: {}", document.title))
        .header("task.card.header.v1", heading)
        .section("task.card.summary.v1", |section| {
            section.mrkdwn(format!("*{}*\n{}", document.title, document.body));
        })
        .section("task.card.details.v1", |section| {
            section.mrkdwn(" ");
            for detail in &document.sections {
                section.field(format!("*{}*\n{}", detail.name, detail.value));
            }
        })
        .actions("task.card.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(ACTION_COMPLETE, toggle_label)
                        .style(toggle_style)
                        .value(toggle_value.clone()),
                )
                .button(ButtonElement::new(ACTION_ADD_INFO, "Add Info").value(task_value.clone()));
            if controls.allow_subtask {
                actions.button(
                    ButtonElement::new(ACTION_ADD_SUBTASK, "Add Sub-Task").value(task_value.clone()),
                );
            }
        });

    if !controls.label_choices.is_empty() {
        let label_block = encode_action_value(&[("block", BLOCK_LABELS), ("task", &controls.task_id)]);
        builder = builder.actions(label_block, |actions| {
            let select = controls.label_choices.iter().fold(
                SelectElement::new(ACTION_LABELS, "Labels"),
                |select, choice| {
                    select.option(OptionObject::new(&choice.display, &choice.name), choice.selected)
                },
            );
            actions.element(ActionElement::MultiStaticSelect(select));
        });
    }

    builder.build()
}

pub fn add_info_modal(
    task_id: &str,
    description: &str,
    due_string: &str,
    display_priority: u8,
    labels: &[String],
) -> ModalView {
    ModalBuilder::new(MODAL_ADD_INFO, "Add Task Info")
        .private_metadata(encode_action_value(&[("task", task_id)]))
        .text_input(INPUT_DESCRIPTION, "Description", true, Some(description.to_owned()), true)
        .text_input(INPUT_DUE, "Due date (e.g. tomorrow 5pm)", false, Some(due_string.to_owned()), true)
        .text_input(
            INPUT_PRIORITY,
            "Priority (1 = urgent, 4 = normal)",
            false,
            Some(display_priority.to_string()),
            true,
        )
        .text_input(INPUT_LABELS, "Labels (comma separated)", false, Some(labels.join(", ")), true)
        .build()
}

pub fn add_subtask_modal(parent_id: &str) -> ModalView {
    ModalBuilder::new(MODAL_ADD_SUBTASK, "Add Sub-Task")
        .private_metadata(encode_action_value(&[("task", parent_id)]))
        .text_input(INPUT_CONTENT, "Sub-task", false, None, false)
        .build()
}

pub fn task_lookup_message() -> MessageTemplate {
    MessageBuilder::new("Pick a task to view")
        .section("todo.lookup.prompt.v1", |section| {
            section.mrkdwn("Start typing to find one of your tasks.");
        })
        .actions("todo.lookup.actions.v1", |actions| {
            actions.element(ActionElement::ExternalSelect(
                SelectElement::new(ACTION_LOOKUP_TASK, "Search tasks").min_query_length(1),
            ));
        })
        .build()
}

pub fn no_tasks_found_message(query: &str) -> MessageTemplate {
    MessageBuilder::new("No Tasks Found")
        .section("todo.not_found.v1", |section| {
            section.mrkdwn(format!(":mag: *No Tasks Found* for `{query}`"));
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("todo.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("todo.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Todo command help")
        .section("todo.help.summary.v1", |section| {
            section.mrkdwn(
                "*Available commands*\n• `/todo add <task>`\n• `/todo view <task_id>`\n• `/todo view label:<name>`\n• `/todo list [project]`\n• `/todo help`",
            );
        })
        .context("todo.help.shortcut.v1", |context| {
            context.mrkdwn("Use the *Mark as ToDo* message shortcut to turn any message into a task.");
        })
        .build()
}
