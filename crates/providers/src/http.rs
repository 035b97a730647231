//! HTTP plumbing shared by the vendor adapters.

use std::time::Duration;
use toolrelay_core::error::ProviderError;
use tracing::warn;

/// Build the reqwest client an adapter holds for its lifetime.
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map a transport failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-200 response into the matching `ProviderError`.
pub(crate) async fn check_status(
    response: reqwest::Response,
    vendor: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "{vendor} rejected the API key (status {status})"
        )));
    }

    if status == 404 {
        let error_body = response.text().await.unwrap_or_default();
        return Err(ProviderError::ModelNotFound(error_body));
    }

    if status != 200 {
        let error_body = response.text().await.unwrap_or_default();
        warn!(vendor, status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

/// Decode a 200 body, mapping parse failures to `MalformedResponse`.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    vendor: &str,
) -> Result<T, ProviderError> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(format!("{vendor}: {e}")))
}

/// Tool result content as a vendor string field: strings pass through,
/// everything else is compact JSON.
pub(crate) fn content_to_string(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_content_passes_through() {
        assert_eq!(content_to_string(&json!("plain")), "plain");
        assert_eq!(
            content_to_string(&json!({"error": "not found"})),
            r#"{"error":"not found"}"#
        );
    }

    #[tokio::test]
    async fn rate_limit_maps() {
        let (url, _h) = test_server::respond_once(429, "{}").await;
        let response = reqwest::get(&url).await.unwrap();
        let err = check_status(response, "test").await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let (url, _h) = test_server::respond_once(500, r#"{"error":"boom"}"#).await;
        let response = reqwest::get(&url).await.unwrap();
        match check_status(response, "test").await.unwrap_err() {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 500);
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
