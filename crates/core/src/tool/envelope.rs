use serde::Serialize;
use serde_json::Value;

use super::{Error, ErrorKind};

/// The result of a tool call as the model sees it.
///
/// Serialized as `{"ok":true,"data":...}` on success and as
/// `{"ok":false,"errorKind":"...","errorMessage":"..."}` on failure.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolEnvelope {
    /// The tool ran and produced `data`.
    Success {
        /// Always `true`.
        ok: bool,
        /// The tool payload, `null` when there is nothing to return.
        data: Value,
    },
    /// The tool did not run, or failed.
    #[serde(rename_all = "camelCase")]
    Failure {
        /// Always `false`.
        ok: bool,
        /// The error class.
        error_kind: ErrorKind,
        /// A human readable explanation for the model.
        error_message: String,
    },
}

impl ToolEnvelope {
    /// Wraps a successful payload.
    #[inline]
    pub fn success(data: Value) -> Self {
        ToolEnvelope::Success { ok: true, data }
    }

    /// Wraps an error.
    #[inline]
    pub fn failure(err: &Error) -> Self {
        ToolEnvelope::Failure {
            ok: false,
            error_kind: err.kind(),
            error_message: err.reason().into_owned(),
        }
    }

    /// Returns `true` for a successful call.
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolEnvelope::Success { .. })
    }

    /// Returns the error class of a failed call.
    #[inline]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ToolEnvelope::Success { .. } => None,
            ToolEnvelope::Failure { error_kind, .. } => Some(*error_kind),
        }
    }

    /// Serializes the envelope into the tool message content.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            error!("cannot serialize tool envelope: {err}");
            r#"{"ok":false,"errorKind":"IOError","errorMessage":"unserializable result"}"#
                .to_owned()
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_format() {
        let envelope = ToolEnvelope::success(json!({ "path": "a.md" }));
        assert!(envelope.is_ok());
        assert_eq!(envelope.to_content(), r#"{"ok":true,"data":{"path":"a.md"}}"#);

        let envelope = ToolEnvelope::success(Value::Null);
        assert_eq!(envelope.to_content(), r#"{"ok":true,"data":null}"#);

        let envelope = ToolEnvelope::failure(
            &Error::validation().with_reason("call fetchNextCase first"),
        );
        assert_eq!(envelope.error_kind(), Some(ErrorKind::ValidationError));
        let value: Value = serde_json::from_str(&envelope.to_content()).unwrap();
        assert_eq!(
            value,
            json!({
                "ok": false,
                "errorKind": "ValidationError",
                "errorMessage": "call fetchNextCase first"
            })
        );
    }
}
