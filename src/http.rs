use crate::error::{Result, SyncError};
use reqwest::Response;
use std::time::Duration;

/// Build the client shared by every source for one run.
pub fn build_client(user_agent: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Turn a non-2xx response into a fatal transport error for `source_name`.
pub fn check_ok(response: Response, source_name: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(SyncError::Transport {
        source_name: source_name.to_string(),
        url: response.url().to_string(),
        status: status.as_u16(),
    })
}

/// Decode a body that must be a JSON array of `T`.
pub fn expect_array<T: serde::de::DeserializeOwned>(
    body: serde_json::Value,
    source_name: &str,
) -> Result<Vec<T>> {
    if !body.is_array() {
        return Err(SyncError::invalid_response(source_name, "expected a JSON array"));
    }
    Ok(serde_json::from_value(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expect_array_rejects_objects() {
        let err = expect_array::<serde_json::Value>(json!({"error": "nope"}), "acp").unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse { .. }));
    }

    #[test]
    fn test_expect_array_decodes() {
        let rows: Vec<u32> = expect_array(json!([1, 2, 3]), "acp").unwrap();
        assert_eq!(rows, vec![1, 2, 3]);
    }
}
