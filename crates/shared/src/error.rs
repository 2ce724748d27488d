use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure fields the vehicle service attaches to error responses and to
/// `success: false` bodies. `detail` is a plain string for handled errors and a
/// list of validation entries when request validation fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceErrorBody {
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(Value::String(detail.into())),
            message: None,
        }
    }

    /// Human-readable detail, preferring `detail` over `message`.
    pub fn detail_text(&self) -> Option<String> {
        let from_detail = self.detail.as_ref().and_then(|detail| match detail {
            Value::Null => None,
            Value::String(text) => Some(text.trim().to_string()),
            Value::Array(entries) => {
                let messages: Vec<String> = entries
                    .iter()
                    .map(|entry| {
                        entry
                            .get("msg")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| entry.to_string())
                    })
                    .collect();
                Some(messages.join("; "))
            }
            other => Some(other.to_string()),
        });

        from_detail
            .filter(|text| !text.is_empty())
            .or_else(|| {
                self.message
                    .as_ref()
                    .map(|message| message.trim().to_string())
                    .filter(|message| !message.is_empty())
            })
    }
}
