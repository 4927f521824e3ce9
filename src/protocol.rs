use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// One decoded frame from the gateway. The set is closed: frames carrying an
/// unrecognized `type` tag fail to decode and are dropped at the boundary.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    UserMessage {
        message: String,
    },
    TurnStart,
    TextDelta {
        delta: String,
    },
    ToolStart {
        tool_name: String,
        tool_call_id: String,
        #[serde(default = "empty_args")]
        args: Value,
    },
    ToolUpdate {
        tool_call_id: String,
        tool_name: String,
        partial_result: String,
    },
    ToolEnd {
        tool_call_id: String,
        tool_name: String,
        result: String,
        #[serde(default)]
        is_error: bool,
    },
    TurnEnd,
    AgentEnd,
    Error {
        message: String,
    },
    ContextInfo {
        system: u64,
        tools: u64,
        user: u64,
        assistant: u64,
        tool_results: u64,
        context_window: u64,
    },
    CompactionStart,
    CompactionEnd {
        summary: String,
        #[serde(default)]
        tokens_before: u64,
    },
    ModelList {
        models: Vec<ModelEntry>,
        current: String,
        #[serde(default)]
        reasoning_effort: Option<String>,
    },
    ModelSet {
        model: String,
    },
    ModelInfo {
        model: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        context_length: Option<u64>,
        #[serde(default)]
        pricing: Pricing,
        #[serde(default)]
        max_completion_tokens: Option<u64>,
    },
    ReasoningEffortSet {
        #[serde(default)]
        effort: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Per-token prices as reported by the gateway's model catalog.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Pricing {
    #[serde(default)]
    pub prompt: Option<f64>,
    #[serde(default)]
    pub completion: Option<f64>,
}

/// User intent, produced by input classification and never mutated
/// afterward. Distinct from the wire form: some intents ride on `steer`
/// frames that the gateway parses as command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Prompt { message: String },
    Steer { message: String },
    Abort,
    ContextRequest,
    Compact,
    ModelListRequest,
    ModelInfoRequest { model_id: String },
    SelectModel { model_id: String },
    SetReasoningEffort { effort: String },
}

impl ClientCommand {
    /// Conversation content is held by the compaction barrier; everything
    /// else is a meta operation that crosses it.
    pub fn is_prompt_class(&self) -> bool {
        matches!(
            self,
            ClientCommand::Prompt { .. } | ClientCommand::Steer { .. }
        )
    }

    pub fn to_frame(&self) -> String {
        let value = match self {
            ClientCommand::Prompt { message } => json!({"type": "prompt", "message": message}),
            ClientCommand::Steer { message } => json!({"type": "steer", "message": message}),
            ClientCommand::Abort => json!({"type": "abort"}),
            ClientCommand::ContextRequest => json!({"type": "context_request"}),
            ClientCommand::Compact => json!({"type": "steer", "message": "/compact"}),
            ClientCommand::ModelListRequest => json!({"type": "model_list_request"}),
            ClientCommand::ModelInfoRequest { model_id } => {
                json!({"type": "model_info_request", "model_id": model_id})
            }
            ClientCommand::SelectModel { model_id } => {
                json!({"type": "steer", "message": format!("/model {model_id}")})
            }
            ClientCommand::SetReasoningEffort { effort } => {
                json!({"type": "steer", "message": format!("/effort {effort}")})
            }
        };
        value.to_string()
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("undecodable frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The decoder boundary: one frame in, one event or an error out. Callers
/// drop errored frames without touching connection state.
pub fn decode_event(frame: &str) -> Result<ServerEvent, DecodeError> {
    Ok(serde_json::from_str(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_streaming_events() {
        assert_eq!(
            decode_event(r#"{"type":"turn_start"}"#).unwrap(),
            ServerEvent::TurnStart
        );
        assert_eq!(
            decode_event(r#"{"type":"text_delta","delta":"Hi"}"#).unwrap(),
            ServerEvent::TextDelta {
                delta: "Hi".to_string()
            }
        );
    }

    #[test]
    fn test_decode_tool_start_defaults_args() {
        let event = decode_event(
            r#"{"type":"tool_start","tool_name":"bash","tool_call_id":"t1"}"#,
        )
        .unwrap();
        match event {
            ServerEvent::ToolStart { args, .. } => assert_eq!(args, json!({})),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_tolerates_extra_fields() {
        let event = decode_event(
            r#"{"type":"compaction_end","summary":"s","tokens_before":120,"extra":true}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::CompactionEnd {
                summary: "s".to_string(),
                tokens_before: 120,
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type_and_malformed_json() {
        assert!(decode_event(r#"{"type":"reload_start"}"#).is_err());
        assert!(decode_event("{not json").is_err());
        assert!(decode_event(r#""just a string""#).is_err());
    }

    #[test]
    fn test_abort_frame_is_exact() {
        assert_eq!(ClientCommand::Abort.to_frame(), r#"{"type":"abort"}"#);
    }

    #[test]
    fn test_prompt_frame_round_trips() {
        let frame = ClientCommand::Prompt {
            message: "list files".to_string(),
        }
        .to_frame();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "prompt");
        assert_eq!(value["message"], "list files");
    }

    #[test]
    fn test_meta_intents_ride_on_steer() {
        let frame = ClientCommand::SelectModel {
            model_id: "sonnet".to_string(),
        }
        .to_frame();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "steer");
        assert_eq!(value["message"], "/model sonnet");

        let frame = ClientCommand::Compact.to_frame();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["message"], "/compact");
    }

    #[test]
    fn test_prompt_class_split() {
        assert!(ClientCommand::Prompt {
            message: "hi".to_string()
        }
        .is_prompt_class());
        assert!(ClientCommand::Steer {
            message: "go on".to_string()
        }
        .is_prompt_class());
        assert!(!ClientCommand::Abort.is_prompt_class());
        assert!(!ClientCommand::Compact.is_prompt_class());
        assert!(!ClientCommand::ContextRequest.is_prompt_class());
    }
}
