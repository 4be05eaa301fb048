use crate::geometry::{GeometryError, Offset, Rect};
use crate::mask::ActionKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Top-level fields a client frame may carry
pub const KNOWN_FIELDS: [&str; 6] = ["image", "selection", "action", "path", "left", "top"];

/// Malformed or incomplete client frames
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message must be a JSON object")]
    NotAnObject,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field '{0}' must be a string")]
    ExpectedString(&'static str),

    #[error("Field '{0}' must be an object")]
    ExpectedObject(&'static str),

    #[error("Field '{0}' is required when 'action' is present")]
    MissingActionField(&'static str),

    #[error("Field '{0}' is only allowed together with 'action'")]
    UnexpectedField(&'static str),

    #[error("Binary frames are not supported")]
    BinaryFrame,

    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

/// Replace the session image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEvent {
    pub data_url: String,
}

/// Initialize segmentation from a rectangle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub rect: Rect,
}

/// Paint a stroke into the mask and refine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    pub kind: ActionKind,
    pub path: String,
    pub offset: Offset,
}

/// One client frame: up to one event of each kind, applied in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMessage {
    pub image: Option<ImageEvent>,
    pub selection: Option<SelectionEvent>,
    pub action: Option<ActionEvent>,
}

impl ClientMessage {
    /// Validate a text frame into typed events
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        Self::from_fields(&fields)
    }

    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, ProtocolError> {
        if let Some(unknown) = fields.keys().find(|k| !KNOWN_FIELDS.contains(&k.as_str())) {
            return Err(ProtocolError::UnknownField(unknown.clone()));
        }

        let image = string_field(fields, "image")?.map(|data_url| ImageEvent { data_url });

        let selection = match fields.get("selection") {
            None => None,
            Some(Value::Object(selection)) => Some(SelectionEvent {
                rect: Rect::from_fields(selection)?,
            }),
            Some(_) => return Err(ProtocolError::ExpectedObject("selection")),
        };

        let action = match string_field(fields, "action")? {
            Some(action) => {
                let path = string_field(fields, "path")?
                    .ok_or(ProtocolError::MissingActionField("path"))?;
                for key in Offset::FIELDS {
                    if !fields.contains_key(key) {
                        return Err(ProtocolError::MissingActionField(key));
                    }
                }
                Some(ActionEvent {
                    kind: ActionKind::from_wire(&action),
                    path,
                    offset: Offset::from_fields(fields)?,
                })
            }
            None => {
                for key in ["path", "left", "top"] {
                    if fields.contains_key(key) {
                        return Err(ProtocolError::UnexpectedField(key));
                    }
                }
                None
            }
        };

        Ok(Self {
            image,
            selection,
            action,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.selection.is_none() && self.action.is_none()
    }

    /// Event names carried by this frame, for logging
    pub fn event_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.image.is_some() {
            names.push("image");
        }
        if self.selection.is_some() {
            names.push("selection");
        }
        if let Some(action) = &self.action {
            names.push(action.kind.as_str());
        }
        names
    }
}

fn string_field(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, ProtocolError> {
    match fields.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ProtocolError::ExpectedString(key)),
    }
}

/// Machine-readable error category sent to clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ProtocolError,
    StateError,
    CodecError,
    BoundsError,
    SolverError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ProtocolError => "protocol_error",
            ErrorCode::StateError => "state_error",
            ErrorCode::CodecError => "codec_error",
            ErrorCode::BoundsError => "bounds_error",
            ErrorCode::SolverError => "solver_error",
        }
    }
}

/// Server to client messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Segmentation result as a PNG data URL
    Mask { data_url: String },
    /// Processing error; the connection stays open
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// Text frame for the socket. Results go out as the bare data URL so a
    /// browser can assign the frame straight to an image source.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        match self {
            ServerMessage::Mask { data_url } => Ok(data_url.clone()),
            ServerMessage::Error { .. } => serde_json::to_string(self),
        }
    }

    /// Inverse of [`ServerMessage::to_frame`]
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        if frame.starts_with("data:") {
            Ok(ServerMessage::Mask {
                data_url: frame.to_string(),
            })
        } else {
            serde_json::from_str(frame)
        }
    }

    /// Get the message type name for metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::Mask { .. } => "mask",
            ServerMessage::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_empty_object() {
        let msg = ClientMessage::parse("{}").unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn test_parse_image_and_selection() {
        let text = json!({
            "image": "data:image/png;base64,AAAA",
            "selection": {"left": 10, "top": 10.4, "width": 50, "height": 50},
        })
        .to_string();
        let msg = ClientMessage::parse(&text).unwrap();
        assert_eq!(msg.image.unwrap().data_url, "data:image/png;base64,AAAA");
        assert_eq!(msg.selection.unwrap().rect, Rect::new(10, 10, 50, 50));
        assert!(msg.action.is_none());
    }

    #[test]
    fn test_parse_action() {
        let text = json!({"action": "add", "path": "p", "left": 5, "top": 6}).to_string();
        let action = ClientMessage::parse(&text).unwrap().action.unwrap();
        assert_eq!(action.kind, ActionKind::Add);
        assert_eq!(action.path, "p");
        assert_eq!(action.offset, Offset::new(5, 6));

        let text = json!({"action": "scribble", "path": "p", "left": 0, "top": 0}).to_string();
        let action = ClientMessage::parse(&text).unwrap().action.unwrap();
        assert_eq!(action.kind, ActionKind::Remove);
    }

    #[test]
    fn test_action_requires_path_and_offset() {
        let text = json!({"action": "add", "left": 5, "top": 6}).to_string();
        assert_eq!(
            ClientMessage::parse(&text),
            Err(ProtocolError::MissingActionField("path"))
        );

        let text = json!({"action": "add", "path": "p", "left": 5}).to_string();
        assert_eq!(
            ClientMessage::parse(&text),
            Err(ProtocolError::MissingActionField("top"))
        );
    }

    #[test]
    fn test_action_fields_without_action() {
        let text = json!({"path": "p"}).to_string();
        assert_eq!(
            ClientMessage::parse(&text),
            Err(ProtocolError::UnexpectedField("path"))
        );
    }

    #[test]
    fn test_rejects_malformed_frames() {
        assert!(matches!(
            ClientMessage::parse("{not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert_eq!(ClientMessage::parse("[1, 2]"), Err(ProtocolError::NotAnObject));
        assert_eq!(
            ClientMessage::parse(r#"{"colour": "red"}"#),
            Err(ProtocolError::UnknownField("colour".to_string()))
        );
        assert_eq!(
            ClientMessage::parse(r#"{"image": 12}"#),
            Err(ProtocolError::ExpectedString("image"))
        );
        assert_eq!(
            ClientMessage::parse(r#"{"selection": [1, 2, 3, 4]}"#),
            Err(ProtocolError::ExpectedObject("selection"))
        );
        assert_eq!(
            ClientMessage::parse(r#"{"selection": {"left": 1, "top": 1, "width": 1}}"#),
            Err(ProtocolError::Geometry(GeometryError::MissingField("height")))
        );
    }

    #[test]
    fn test_event_names() {
        let text = json!({
            "image": "x",
            "action": "remove",
            "path": "p",
            "left": 0,
            "top": 0,
        })
        .to_string();
        let msg = ClientMessage::parse(&text).unwrap();
        assert_eq!(msg.event_names(), vec!["image", "remove"]);
    }

    #[test]
    fn test_server_frames() {
        let mask = ServerMessage::Mask {
            data_url: "data:image/png;base64,AAAA".to_string(),
        };
        assert_eq!(mask.to_frame().unwrap(), "data:image/png;base64,AAAA");
        assert_eq!(ServerMessage::from_frame("data:image/png;base64,AAAA").unwrap(), mask);

        let error = ServerMessage::Error {
            code: ErrorCode::StateError,
            message: "No mask yet".to_string(),
        };
        let frame = error.to_frame().unwrap();
        let json: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "state_error");
        assert_eq!(ServerMessage::from_frame(&frame).unwrap(), error);
    }
}
