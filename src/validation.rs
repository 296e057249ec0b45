use serde_json::Value;

use crate::models::chat::{ChatMessage, ChatRequest, Role, SUPPORTED_MODELS};

/// Validates a parsed request body and normalizes it into a `ChatRequest`.
///
/// Pure function, no upstream call is made on behalf of a request that
/// fails here. Checks short-circuit in a fixed order: body shape, model,
/// system type, messages-is-array, then each message's shape/role/content.
/// The returned error string names the first violated constraint.
pub fn validate_chat_request(body: &Value) -> Result<ChatRequest, String> {
    let obj = body
        .as_object()
        .ok_or_else(|| "request body must be a JSON object".to_string())?;

    let model = match obj.get("model").and_then(Value::as_str) {
        Some(m) => m,
        None => {
            return Err(format!(
                "model must be one of: {}",
                SUPPORTED_MODELS.join(", ")
            ))
        }
    };
    if !SUPPORTED_MODELS.contains(&model) {
        return Err(format!(
            "unsupported model {:?}, expected one of: {}",
            model,
            SUPPORTED_MODELS.join(", ")
        ));
    }

    // Absent system is treated as the empty string.
    let system = match obj.get("system") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err("system must be a string".to_string()),
    };

    let raw_messages = obj
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| "messages must be an array".to_string())?;

    let mut messages = Vec::with_capacity(raw_messages.len());
    for (index, raw) in raw_messages.iter().enumerate() {
        let message = raw
            .as_object()
            .ok_or_else(|| format!("messages[{}] must be an object", index))?;

        let role = match message.get("role").and_then(Value::as_str) {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            _ => {
                return Err(format!(
                    "messages[{}].role must be \"user\" or \"assistant\"",
                    index
                ))
            }
        };

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("messages[{}].content must be a string", index))?;

        messages.push(ChatMessage {
            role,
            content: content.to_string(),
        });
    }

    Ok(ChatRequest {
        model: model.to_string(),
        system,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn accepts_minimal_valid_request() {
        let body = json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "user", "content": "Test"}]
        });

        let request = validate_chat_request(&body).unwrap();
        assert_eq!(request.model, "claude-sonnet-4-5");
        assert_eq!(request.system, "");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "Test");
    }

    #[test]
    fn keeps_explicit_system_prompt() {
        let body = json!({
            "model": "claude-sonnet-4-5",
            "system": "Be terse.",
            "messages": []
        });

        let request = validate_chat_request(&body).unwrap();
        assert_eq!(request.system, "Be terse.");
    }

    #[test]
    fn rejects_non_object_body() {
        let err = validate_chat_request(&json!(["not", "an", "object"])).unwrap_err();
        assert!(err.contains("JSON object"), "got: {}", err);
    }

    #[test]
    fn rejects_missing_model() {
        let body = json!({"messages": []});
        let err = validate_chat_request(&body).unwrap_err();
        assert!(err.contains("model"), "got: {}", err);
    }

    #[test]
    fn rejects_unsupported_model() {
        let body = json!({"model": "gpt-extreme", "messages": []});
        let err = validate_chat_request(&body).unwrap_err();
        assert!(err.contains("unsupported model"), "got: {}", err);
        assert!(err.contains("gpt-extreme"), "got: {}", err);
    }

    #[test]
    fn rejects_non_string_system() {
        let body = json!({
            "model": "claude-sonnet-4-5",
            "system": 42,
            "messages": []
        });
        let err = validate_chat_request(&body).unwrap_err();
        assert_eq!(err, "system must be a string");
    }

    #[test]
    fn rejects_non_array_messages() {
        let body = json!({"model": "claude-sonnet-4-5", "messages": "hi"});
        let err = validate_chat_request(&body).unwrap_err();
        assert_eq!(err, "messages must be an array");
    }

    #[test]
    fn rejects_bad_message_role() {
        let body = json!({
            "model": "claude-sonnet-4-5",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "system", "content": "sneaky"}
            ]
        });
        let err = validate_chat_request(&body).unwrap_err();
        assert_eq!(err, "messages[1].role must be \"user\" or \"assistant\"");
    }

    #[test]
    fn rejects_non_string_message_content() {
        let body = json!({
            "model": "claude-sonnet-4-5",
            "messages": [{"role": "user", "content": {"nested": true}}]
        });
        let err = validate_chat_request(&body).unwrap_err();
        assert_eq!(err, "messages[0].content must be a string");
    }

    #[test]
    fn model_check_runs_before_messages_check() {
        // Both constraints violated; the model error must win.
        let body = json!({"model": "nope", "messages": "also nope"});
        let err = validate_chat_request(&body).unwrap_err();
        assert!(err.contains("unsupported model"), "got: {}", err);
    }
}
