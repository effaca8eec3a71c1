use std::fmt::{self, Display};

use claim_agent_model::{
    AssistantMessage, ModelMessage, ModelRequest, ToolCallRequest,
    ToolCallResult,
};
use serde_json::Value;
use tokio::select;

use super::{Agent, FinalAnswer, OrchestrationError};
use crate::model_client::ModelClientResponse;
use crate::retry::with_retry;
use crate::tool::{Error as ToolError, ToolEnvelope, ToolKind, ToolOutput};

/// Where the tool-calling loop is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AgentStage {
    /// Waiting for the model to answer or to request tools.
    #[default]
    AwaitingModel,
    /// Running the tools requested by the model.
    ExecutingTool,
    /// The model gave its final answer.
    Done,
    /// The session stopped without a final answer.
    Failed,
}

impl Display for AgentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStage::AwaitingModel => write!(f, "AWAITING_MODEL"),
            AgentStage::ExecutingTool => write!(f, "EXECUTING_TOOL"),
            AgentStage::Done => write!(f, "DONE"),
            AgentStage::Failed => write!(f, "FAILED"),
        }
    }
}

impl Agent {
    pub(super) async fn run_loop(
        &mut self,
    ) -> Result<FinalAnswer, OrchestrationError> {
        let mut turns = 0;
        loop {
            self.set_stage(AgentStage::AwaitingModel);
            if self.cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }
            if turns >= self.loop_policy.max_turns {
                return Err(OrchestrationError::TurnBudgetExhausted {
                    max_turns: self.loop_policy.max_turns,
                });
            }
            turns += 1;

            let ModelClientResponse {
                content,
                tool_calls,
                finish_reason,
            } = self.request_model().await?;
            trace!("turn {turns} finished with {finish_reason:?}");
            self.add_message(ModelMessage::Assistant(AssistantMessage {
                content: content.clone(),
                tool_calls: tool_calls.clone(),
            }));

            if tool_calls.is_empty() {
                self.set_stage(AgentStage::Done);
                return Ok(FinalAnswer { content, turns });
            }

            self.set_stage(AgentStage::ExecutingTool);
            for call in tool_calls {
                if self.cancel.is_cancelled() {
                    return Err(OrchestrationError::Cancelled);
                }
                self.check_cycle(&call)?;

                let envelope = self.execute_call(&call).await;
                self.add_message(ModelMessage::Tool(ToolCallResult {
                    id: call.id,
                    content: envelope.to_content(),
                }));
            }
        }
    }

    #[inline]
    fn set_stage(&mut self, stage: AgentStage) {
        if self.stage != stage {
            debug!("stage: {} -> {stage}", self.stage);
            self.stage = stage;
        }
    }

    async fn request_model(
        &self,
    ) -> Result<ModelClientResponse, OrchestrationError> {
        let request = ModelRequest {
            messages: self.conversation.messages(),
            tools: self.toolbox.definitions(),
        };
        let on_delta = self.on_message_delta.clone();
        let send = with_retry(&self.retry, "model request", || {
            let on_delta = on_delta.clone();
            self.model_client.send_request(request.clone(), move |delta| {
                if let Some(on_delta) = &on_delta {
                    on_delta(&delta);
                }
            })
        });

        // The model client is cancel safe, dropping the request is fine.
        select! {
            biased;
            _ = self.cancel.cancelled() => Err(OrchestrationError::Cancelled),
            result = send => result.map_err(OrchestrationError::ModelUnavailable),
        }
    }

    /// Counts the call and fails once the same call was already made
    /// `max_identical_calls` times in this session.
    fn check_cycle(
        &mut self,
        call: &ToolCallRequest,
    ) -> Result<(), OrchestrationError> {
        let arguments = canonical_arguments(&call.arguments);
        let count = self
            .call_counts
            .entry((call.name.clone(), arguments.clone()))
            .or_default();
        if *count >= self.loop_policy.max_identical_calls {
            return Err(OrchestrationError::CycleDetected {
                tool: call.name.clone(),
                arguments,
            });
        }
        *count += 1;
        Ok(())
    }

    async fn execute_call(&mut self, call: &ToolCallRequest) -> ToolEnvelope {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            warn!("model requested an unknown tool: {}", call.name);
            let names = ToolKind::ALL.map(ToolKind::name).join(", ");
            return ToolEnvelope::failure(&ToolError::validation().with_reason(
                format!("unknown tool `{}`, available tools: {names}", call.name),
            ));
        };

        if kind == ToolKind::Save && self.case.is_none() {
            warn!("rejected `{kind}` before any case was fetched");
            return ToolEnvelope::failure(&ToolError::validation().with_reason(
                "no case was obtained in this session, call fetchNextCase first",
            ));
        }

        let output = match self.toolbox.execute(kind, call.arguments.clone()).await
        {
            Ok(output) => output,
            Err(err) => return ToolEnvelope::failure(&err),
        };
        if let ToolOutput::Case(Some(record)) = &output {
            debug!("case obtained from {}", record.file_name);
            self.case = Some(record.clone());
        }
        match output.to_data() {
            Ok(data) => ToolEnvelope::success(data),
            Err(err) => {
                error!("cannot serialize the result of {kind}: {err}");
                ToolEnvelope::failure(
                    &ToolError::io()
                        .with_reason(format!("unrepresentable result: {err}")),
                )
            }
        }
    }
}

/// Serializes arguments with object keys sorted, so that key order does
/// not make two calls different. Missing arguments count as `{}`.
fn canonical_arguments(arguments: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries = map.iter().collect::<Vec<_>>();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key.clone(), sorted(value)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            value => value.clone(),
        }
    }

    match arguments {
        Value::Null => "{}".to_owned(),
        arguments => sorted(arguments).to_string(),
    }
}
