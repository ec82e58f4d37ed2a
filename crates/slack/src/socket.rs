use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use taskbot_core::TaskLookup;

use crate::commands::{parse_task_lookup, ActionValue};
use crate::events::{EventContext, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("transport response delivery failed: {0}")]
    Deliver(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Hands a handler's reply back to Slack. Transports that only listen
    /// may drop it.
    async fn deliver(
        &self,
        _envelope: &SlackEnvelope,
        _result: &HandlerResult,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub fn with_dispatcher(dispatcher: EventDispatcher) -> Self {
        Self::new(Arc::new(NoopSocketTransport), dispatcher, ReconnectPolicy::default())
    }

    pub fn handler_count(&self) -> usize {
        self.dispatcher.handler_count()
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (user_id, task_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                user_id = user_id.unwrap_or("unknown"),
                task_id = task_id.as_deref().unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    user_id = user_id.unwrap_or("unknown"),
                    task_id = task_id.as_deref().unwrap_or("unknown"),
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    user_id = user_id.unwrap_or("unknown"),
                    task_id = task_id.as_deref().unwrap_or("unknown"),
                    "acknowledged slack envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Ignored | HandlerResult::Processed) => {}
                Ok(result) => {
                    if let Err(error) = self.transport.deliver(&envelope, &result).await {
                        warn!(
                            event_name = "egress.slack.delivery_failed",
                            envelope_id = %envelope.envelope_id,
                            correlation_id = %envelope.envelope_id,
                            user_id = user_id.unwrap_or("unknown"),
                            task_id = task_id.as_deref().unwrap_or("unknown"),
                            error = %error,
                            "failed to deliver handler reply"
                        );
                    }
                }
                Err(error) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        user_id = user_id.unwrap_or("unknown"),
                        task_id = task_id.as_deref().unwrap_or("unknown"),
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
            }
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<String>) {
    let task_id = match &envelope.event {
        SlackEvent::SlashCommand(payload) => {
            let args = payload
                .text
                .trim()
                .split_once(char::is_whitespace)
                .filter(|(verb, _)| verb.eq_ignore_ascii_case("view"))
                .map(|(_, args)| args)
                .unwrap_or_default();
            match parse_task_lookup(args) {
                Some(TaskLookup::ById(id)) => Some(id.0),
                _ => None,
            }
        }
        SlackEvent::BlockAction(event) => task_id_from_payload(event.value.as_deref()),
        SlackEvent::ViewSubmission(event) => task_id_from_payload(Some(event.private_metadata.as_str())),
        SlackEvent::BlockSuggestion(_)
        | SlackEvent::MessageShortcut(_)
        | SlackEvent::Unsupported { .. } => None,
    };
    (envelope.event.user_id(), task_id)
}

fn task_id_from_payload(payload: Option<&str>) -> Option<String> {
    ActionValue::parse(payload?)?.get("task").map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use super::{ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::blocks::{help_message, MessageTemplate};
    use crate::commands::{
        CommandEnvelope, CommandRouteError, SlashCommandPayload, TaskCommandService,
    };
    use crate::events::{
        BlockActionEvent, EventDispatcher, HandlerResult, SlackEnvelope, SlackEvent,
        SlashCommandHandler, ViewSubmissionEvent,
    };
    use async_trait::async_trait;
    use taskbot_core::TaskLookup;
    use tokio::sync::Mutex;

    struct HelpOnly;

    #[async_trait]
    impl TaskCommandService for HelpOnly {
        async fn add_task(
            &self,
            _content: String,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, CommandRouteError> {
            Ok(help_message())
        }

        async fn view_task(
            &self,
            _lookup: TaskLookup,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, CommandRouteError> {
            Ok(help_message())
        }

        async fn list_tasks(
            &self,
            _project: Option<String>,
            _page: usize,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, CommandRouteError> {
            Ok(help_message())
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        disconnect_results: VecDeque<Result<(), TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        deliveries: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
            disconnect_results: Vec<Result<(), TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    disconnect_results: disconnect_results.into(),
                    connect_attempts: 0,
                    acknowledgements: Vec::new(),
                    deliveries: Vec::new(),
                    disconnect_calls: 0,
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn deliveries(&self) -> Vec<String> {
            self.state.lock().await.deliveries.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            state.disconnect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn deliver(
            &self,
            envelope: &SlackEnvelope,
            _result: &HandlerResult,
        ) -> Result<(), TransportError> {
            self.state.lock().await.deliveries.push(envelope.envelope_id.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-1".to_owned(),
                    event: SlackEvent::Unsupported { event_type: "test".to_owned() },
                })),
                Ok(None),
            ],
            vec![Ok(())],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
            vec![],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn replies_are_delivered_and_silent_results_are_not() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-help".to_owned(),
                    event: SlackEvent::SlashCommand(SlashCommandPayload {
                        command: "/todo".to_owned(),
                        text: "help".to_owned(),
                        channel_id: "C1".to_owned(),
                        user_id: "U1".to_owned(),
                        trigger_ts: "1".to_owned(),
                        request_id: "req-1".to_owned(),
                    }),
                })),
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-other".to_owned(),
                    event: SlackEvent::Unsupported { event_type: "app_home".to_owned() },
                })),
                Ok(None),
            ],
            vec![Ok(())],
        ));

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(SlashCommandHandler::new(Arc::new(HelpOnly)));
        let runner = SocketModeRunner::new(
            transport.clone(),
            dispatcher,
            ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner");

        assert_eq!(transport.acknowledgements().await, vec!["env-help", "env-other"]);
        assert_eq!(transport.deliveries().await, vec!["env-help"]);
    }

    #[test]
    fn extracts_user_and_task_correlation_fields() {
        let action = SlackEnvelope {
            envelope_id: "env-2".to_owned(),
            event: SlackEvent::BlockAction(BlockActionEvent {
                user_id: "U1".to_owned(),
                action_id: "task.complete.v1".to_owned(),
                value: Some("task=2995104339;completed=true;".to_owned()),
                ..BlockActionEvent::default()
            }),
        };
        let (user_id, task_id) = super::correlation_fields(&action);
        assert_eq!(user_id, Some("U1"));
        assert_eq!(task_id.as_deref(), Some("2995104339"));

        let command = SlackEnvelope {
            envelope_id: "env-3".to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: "/todo".to_owned(),
                text: "view 42".to_owned(),
                channel_id: "C1".to_owned(),
                user_id: "U2".to_owned(),
                trigger_ts: "1".to_owned(),
                request_id: "req-3".to_owned(),
            }),
        };
        let (_, task_id) = super::correlation_fields(&command);
        assert_eq!(task_id.as_deref(), Some("42"));

        let modal = SlackEnvelope {
            envelope_id: "env-4".to_owned(),
            event: SlackEvent::ViewSubmission(ViewSubmissionEvent {
                private_metadata: "garbage".to_owned(),
                ..ViewSubmissionEvent::default()
            }),
        };
        assert_eq!(super::correlation_fields(&modal).1, None);
    }
}
