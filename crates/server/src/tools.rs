//! Function declarations offered to the language model, and the dispatcher
//! that turns a model's call into the envelope the client renders.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shared::{
    domain::FieldSpec,
    error::{ApiError, ErrorCode},
    protocol::{InboundEvent, OPEN_FORM, SUBMIT_FORM, UPDATE_FIELD},
};
use thiserror::Error;

pub(crate) const DEFAULT_FORM_TYPE: &str = "registration";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FunctionDeclaration {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) parameters: Value,
}

pub(crate) fn declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: OPEN_FORM,
            description: "Opens a new, empty form for the user to fill out. Call this when the \
                          user asks to register, sign up or fill in a form.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "form_type": {
                        "type": "string",
                        "description": "Which form to open. Only 'registration' exists today.",
                        "enum": [DEFAULT_FORM_TYPE],
                    },
                },
                "required": [],
            }),
        },
        FunctionDeclaration {
            name: UPDATE_FIELD,
            description: "Writes a value the user provided into one field of the open form.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "field_name": {
                        "type": "string",
                        "description": "Name of the field to update, e.g. 'name' or 'email'.",
                    },
                    "field_value": {
                        "type": "string",
                        "description": "The value to place in that field, e.g. 'Jane Doe'.",
                    },
                },
                "required": ["field_name", "field_value"],
            }),
        },
        FunctionDeclaration {
            name: SUBMIT_FORM,
            description: "Submits the completed form once the user confirms.",
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
    ]
}

/// Fields of a known form, in the order the agent asks for them.
pub(crate) fn form_template(form_type: &str) -> Option<Vec<FieldSpec>> {
    match form_type {
        DEFAULT_FORM_TYPE => Some(vec![
            FieldSpec::new("name", "Full name", "text"),
            FieldSpec::new("email", "Email", "email"),
            FieldSpec::new("phone_number", "Phone number", "tel"),
        ]),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ToolCall {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolOutcome {
    /// Result text handed back to the model.
    pub(crate) status: String,
    pub(crate) message: InboundEvent,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("{tool}: missing required argument `{argument}`")]
    MissingArgument {
        tool: &'static str,
        argument: &'static str,
    },
    #[error("{tool}: argument `{argument}` must be a string")]
    InvalidArgument {
        tool: &'static str,
        argument: &'static str,
    },
    #[error("unknown form type `{0}`")]
    UnknownFormType(String),
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let code = match err {
            ToolError::UnknownTool(_) => ErrorCode::UnknownTool,
            _ => ErrorCode::InvalidArguments,
        };
        ApiError::new(code, err.to_string())
    }
}

pub(crate) fn dispatch(call: &ToolCall) -> Result<ToolOutcome, ToolError> {
    match call.name.as_str() {
        OPEN_FORM => {
            let form_type = optional_string(&call.arguments, OPEN_FORM, "form_type")?
                .unwrap_or_else(|| DEFAULT_FORM_TYPE.to_string());
            let fields =
                form_template(&form_type).ok_or(ToolError::UnknownFormType(form_type))?;
            Ok(ToolOutcome {
                status: "Form opened successfully.".to_string(),
                message: InboundEvent::OpenForm { fields },
            })
        }
        UPDATE_FIELD => {
            let field_name = required_string(&call.arguments, UPDATE_FIELD, "field_name")?;
            let field_value = required_string(&call.arguments, UPDATE_FIELD, "field_value")?;
            Ok(ToolOutcome {
                status: format!("Field '{field_name}' updated."),
                message: InboundEvent::update_field(field_name, field_value),
            })
        }
        SUBMIT_FORM => Ok(ToolOutcome {
            status: "Form submitted successfully.".to_string(),
            message: InboundEvent::SubmitForm {},
        }),
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

fn required_string(
    arguments: &Map<String, Value>,
    tool: &'static str,
    argument: &'static str,
) -> Result<String, ToolError> {
    optional_string(arguments, tool, argument)?
        .ok_or(ToolError::MissingArgument { tool, argument })
}

// Models sometimes send a phone number as a JSON number; scalars are taken
// as their text form.
fn optional_string(
    arguments: &Map<String, Value>,
    tool: &'static str,
    argument: &'static str,
) -> Result<Option<String>, ToolError> {
    match arguments.get(argument) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
        Some(_) => Err(ToolError::InvalidArgument { tool, argument }),
    }
}

#[cfg(test)]
#[path = "tests/tools_tests.rs"]
mod tests;
