use crate::upload::{AnswerUpload, AnswerUploader, UploadError};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

const ANSWERS_PATH: &str = "api/answers";

/// Posts finished answers to the answers endpoint as multipart form data:
/// `questionId`, `userId`, `mediaType` text fields plus the `file` part.
#[derive(Clone)]
pub struct HttpAnswerUploader {
    base: Url,
    bearer_token: Option<String>,
    client: Client,
}

impl HttpAnswerUploader {
    pub fn new(base_url: &str) -> Result<Self, UploadError> {
        let base = Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(UploadError::Http)?;

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

    fn file_name(answer: &AnswerUpload) -> String {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        answer.file.suggested_file_name(&stamp.to_string())
    }
}

impl AnswerUploader for HttpAnswerUploader {
    fn upload(&self, answer: AnswerUpload) -> BoxFuture<'_, Result<(), UploadError>> {
        async move {
            let endpoint = self.base.join(ANSWERS_PATH)?;
            let file_name = Self::file_name(&answer);

            let part = Part::bytes(answer.file.data.to_vec())
                .file_name(file_name)
                .mime_str(&answer.file.mime_type)?;
            let form = Form::new()
                .text("questionId", answer.question_id.to_string())
                .text("userId", answer.user_id.to_string())
                .text("mediaType", answer.media_type.as_str())
                .part("file", part);

            let mut request = self.client.post(endpoint).multipart(form);
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            tracing::info!(
                question_id = answer.question_id,
                user_id = answer.user_id,
                bytes = answer.file.len(),
                "uploading answer"
            );

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::error!("answer upload rejected {}: {}", status, error_text);
                return Err(UploadError::HttpStatus(status.as_u16(), error_text));
            }

            Ok(())
        }
        .boxed()
    }
}
