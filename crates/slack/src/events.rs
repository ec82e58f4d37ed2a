use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    blocks::{MessageTemplate, ModalView, OptionObject},
    commands::{
        normalize_todo_command, CommandParseError, CommandRouteError, CommandRouter,
        SlashCommandPayload, TaskCommandService,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    ViewSubmission(ViewSubmissionEvent),
    BlockSuggestion(BlockSuggestionEvent),
    MessageShortcut(MessageShortcutEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::BlockSuggestion(_) => SlackEventType::BlockSuggestion,
            Self::MessageShortcut(_) => SlackEventType::MessageShortcut,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::BlockAction(event) => Some(&event.user_id),
            Self::ViewSubmission(event) => Some(&event.user_id),
            Self::BlockSuggestion(event) => Some(&event.user_id),
            Self::MessageShortcut(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    ViewSubmission,
    BlockSuggestion,
    MessageShortcut,
    Unsupported,
}

/// A button press or select change on a message the bot posted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub message_ts: String,
    pub user_id: String,
    pub action_id: String,
    pub block_id: String,
    pub value: Option<String>,
    /// Values picked in a select; empty for buttons and for a cleared
    /// multi-select.
    pub selected_values: Vec<String>,
}

/// A submitted modal. `values` maps input block ids to the raw text typed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub callback_id: String,
    pub private_metadata: String,
    pub values: HashMap<String, String>,
}

/// An options request from an external select while the user types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockSuggestionEvent {
    pub user_id: String,
    pub action_id: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageShortcutEvent {
    pub user_id: String,
    pub channel_id: String,
    pub message_text: String,
    pub permalink: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    OpenModal(ModalView),
    Options(Vec<OptionObject>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("interaction handler failure: {0}")]
    Interaction(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers one handler per interaction type, all backed by `service`.
pub fn task_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: TaskCommandService
        + BlockActionService
        + ViewSubmissionService
        + SuggestionService
        + MessageShortcutService
        + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(Arc::clone(&service)));
    dispatcher.register(BlockActionHandler::new(Arc::clone(&service)));
    dispatcher.register(ViewSubmissionHandler::new(Arc::clone(&service)));
    dispatcher.register(BlockSuggestionHandler::new(Arc::clone(&service)));
    dispatcher.register(MessageShortcutHandler::new(service));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: TaskCommandService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: TaskCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_todo_command(payload.clone())?;
        let message = self.router.route(normalized).await?;
        Ok(HandlerResult::Responded(message))
    }
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: Arc<S>,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_block_action(event, ctx).await
    }
}

#[async_trait]
pub trait ViewSubmissionService: Send + Sync {
    async fn handle_view_submission(
        &self,
        event: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

pub struct ViewSubmissionHandler<S> {
    service: Arc<S>,
}

impl<S> ViewSubmissionHandler<S>
where
    S: ViewSubmissionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ViewSubmissionHandler<S>
where
    S: ViewSubmissionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_view_submission(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest_options(
        &self,
        event: &BlockSuggestionEvent,
        ctx: &EventContext,
    ) -> Result<Vec<OptionObject>, EventHandlerError>;
}

pub struct BlockSuggestionHandler<S> {
    service: Arc<S>,
}

impl<S> BlockSuggestionHandler<S>
where
    S: SuggestionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockSuggestionHandler<S>
where
    S: SuggestionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockSuggestion
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockSuggestion(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let options = self.service.suggest_options(event, ctx).await?;
        Ok(HandlerResult::Options(options))
    }
}

#[async_trait]
pub trait MessageShortcutService: Send + Sync {
    async fn mark_as_todo(
        &self,
        event: &MessageShortcutEvent,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError>;
}

pub struct MessageShortcutHandler<S> {
    service: Arc<S>,
}

impl<S> MessageShortcutHandler<S>
where
    S: MessageShortcutService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageShortcutHandler<S>
where
    S: MessageShortcutService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::MessageShortcut
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::MessageShortcut(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.mark_as_todo(event, ctx).await?;
        Ok(HandlerResult::Responded(message))
    }
}
