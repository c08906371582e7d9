use crate::report::{EmotionReport, EmotionReporter, ReportError};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use std::time::Duration;
use url::Url;

const EMOTIONS_PATH: &str = "api/emotions";

/// Posts the session's dominant emotion to the emotions endpoint as form
/// fields: `emotion` (upper-case code) and `answerType`.
#[derive(Clone)]
pub struct HttpEmotionReporter {
    base: Url,
    bearer_token: Option<String>,
    client: Client,
}

impl HttpEmotionReporter {
    pub fn new(base_url: &str) -> Result<Self, ReportError> {
        let base = Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ReportError::Http)?;

        Ok(Self {
            base,
            bearer_token: None,
            client,
        })
    }

    pub fn with_bearer_token<S: Into<String>>(mut self, token: S) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

impl EmotionReporter for HttpEmotionReporter {
    fn report(&self, report: EmotionReport) -> BoxFuture<'_, Result<(), ReportError>> {
        async move {
            let endpoint = self.base.join(EMOTIONS_PATH)?;
            let fields = [
                ("emotion", report.emotion.as_code()),
                ("answerType", report.answer_type.as_code()),
            ];

            let mut request = self.client.post(endpoint).form(&fields);
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            tracing::info!(
                emotion = report.emotion.as_code(),
                answer_type = report.answer_type.as_code(),
                "reporting session emotion"
            );

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::error!("emotion report rejected {}: {}", status, error_text);
                return Err(ReportError::HttpStatus(status.as_u16(), error_text));
            }

            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_an_invalid_base_url() {
        assert!(matches!(
            HttpEmotionReporter::new("::"),
            Err(ReportError::InvalidEndpoint(_))
        ));
    }
}
