use crate::error::{GmaoError, UpstreamError};
use crate::types::gemini::{GeminiResponse, GenerateContentRequest};
use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::{error, warn};
use url::Url;

/// Stateless caller for `models/{model}:generateContent`.
pub struct GeminiApi;

impl GeminiApi {
    pub fn generate_url(base: &Url, model: &str) -> Result<Url, GmaoError> {
        Ok(base.join(&format!("v1beta/models/{model}:generateContent"))?)
    }

    pub fn retry_policy(max_times: usize) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(8))
            .with_max_times(max_times)
            .with_jitter()
    }

    /// POST the request, retrying transport failures and 5xx.
    /// Non-retryable upstream errors are decoded into [`UpstreamError`] when possible.
    pub async fn try_generate(
        client: &reqwest::Client,
        url: Url,
        api_key: &str,
        retry_policy: ExponentialBuilder,
        body: &GenerateContentRequest,
    ) -> Result<GeminiResponse, GmaoError> {
        (|| async {
            let resp = client
                .post(url.clone())
                .header("x-goog-api-key", api_key)
                .json(body)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                return Ok(resp.json::<GeminiResponse>().await?);
            }

            let bytes = resp.bytes().await.unwrap_or_default();
            match serde_json::from_slice::<UpstreamError>(&bytes) {
                Ok(upstream) => {
                    if status.is_server_error() {
                        error!(%status, message = %upstream.error.message, "model server error (will retry)");
                    } else {
                        warn!(%status, message = %upstream.error.message, "model request rejected");
                    }
                    Err(GmaoError::Upstream(upstream))
                }
                Err(_) => {
                    warn!(%status, "model request failed with undecodable body");
                    Err(GmaoError::UpstreamStatus(status))
                }
            }
        })
        .retry(retry_policy)
        .when(|e: &GmaoError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(error = %err, "retrying model call after {:?}", dur);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_generate_url_under_base() {
        let base = Url::parse("https://generativelanguage.googleapis.com/").unwrap();
        let url = GeminiApi::generate_url(&base, "gemini-2.5-flash").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn keeps_base_path_prefix() {
        let base = Url::parse("http://localhost:8080/proxy/").unwrap();
        let url = GeminiApi::generate_url(&base, "m").unwrap();
        assert_eq!(url.path(), "/proxy/v1beta/models/m:generateContent");
    }
}
