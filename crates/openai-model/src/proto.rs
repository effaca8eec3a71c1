use claim_agent_model::{
    AssistantMessage, ModelMessage, ModelRequest, ModelTool, ToolCallRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub name: String,
    /// JSON encoded arguments, as generated by the model.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub r#type: String,
    pub function: FunctionToolCall,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub refusal: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Transcription {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ImagesResponse {
    pub data: Vec<ImageData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ImageData {
    pub url: Option<String>,
    pub b64_json: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub r#type: Option<String>,
    /// Usually a string, some compatible servers send numbers.
    pub code: Option<Value>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        temperature: config.temperature,
    }
}

#[inline]
pub fn create_image_request<'a>(
    prompt: &'a str,
    config: &'a OpenAIConfig,
) -> ImageGenerationRequest<'a> {
    ImageGenerationRequest {
        model: &config.image_model,
        prompt,
        n: 1,
        size: &config.image_size,
        quality: &config.image_quality,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(assistant) => create_assistant_message(assistant),
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
    }
}

fn create_assistant_message(msg: &AssistantMessage) -> Message {
    let tool_calls = msg
        .tool_calls
        .iter()
        .map(|req| ToolCall {
            id: req.id.clone(),
            r#type: "function".to_owned(),
            function: FunctionToolCall {
                name: req.name.clone(),
                arguments: encode_arguments(&req.arguments),
            },
        })
        .collect::<Vec<_>>();
    Message::Assistant {
        // The API rejects an empty string next to tool calls.
        content: (!msg.content.is_empty()).then(|| msg.content.clone()),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
    }
}

/// Always produces valid JSON. Arguments that failed to parse were kept
/// as a string, they are replayed as a JSON string literal.
fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::Null => "{}".to_owned(),
        arguments => arguments.to_string(),
    }
}

pub fn decode_tool_call(tool_call: ToolCall) -> ToolCallRequest {
    let raw = tool_call.function.arguments;
    let arguments = if raw.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|err| {
            debug!("tool call arguments are not valid JSON: {err}");
            Value::String(raw)
        })
    };
    ToolCallRequest {
        id: tool_call.id,
        name: tool_call.function.name,
        arguments,
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}
