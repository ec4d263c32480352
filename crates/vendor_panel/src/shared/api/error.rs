use super::transport::TransportFailureKind;
use thiserror::Error;

/// Ошибки обращения к бэкенду коммерции
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: serde_json::Value,
    },

    /// 401: результат операции неизвестен, вызывающий должен его отбросить
    #[error("Not authorized, login required")]
    Unauthorized,

    /// Отказ в соединении при активной сессии
    #[error("Connection refused while signed in, session presumed expired")]
    SessionExpired,

    #[error("Network error ({kind:?}) after {attempts} attempt(s): {message}")]
    Network {
        kind: TransportFailureKind,
        message: String,
        attempts: u32,
    },

    #[error("Failed to decode response of {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

impl GatewayError {
    /// Исход операции на бэкенде неизвестен (сессия сброшена посреди вызова)
    pub fn is_unknown_outcome(&self) -> bool {
        matches!(self, GatewayError::Unauthorized | GatewayError::SessionExpired)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            GatewayError::Unauthorized => Some(401),
            _ => None,
        }
    }
}

/// Текст ошибки из тела ответа: message, затем error, затем сырой текст
pub(crate) fn extract_message(body: &serde_json::Value, raw: &str, status: u16) -> String {
    let from_field = |field: &str| {
        body.get(field)
            .and_then(|value| value.as_str())
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
    };

    from_field("message")
        .or_else(|| from_field("error"))
        .or_else(|| {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or("Request failed")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_message_prefers_message_field() {
        let body = json!({"message": "Return not found", "error": "not_found"});
        assert_eq!(extract_message(&body, "", 404), "Return not found");
    }

    #[test]
    fn test_extract_message_falls_back_to_raw_and_reason() {
        let body = json!({"error": ""});
        assert_eq!(extract_message(&body, "  upstream down  ", 502), "upstream down");
        assert_eq!(extract_message(&serde_json::Value::Null, "", 503), "Service Unavailable");
    }
}
