//! Thin client for the Telegram Bot API.
//!
//! Every call resolves to `Result<(), TelegramError>`; callers in
//! `services::telegram_service` decide how failures are logged or recorded.

use std::{path::Path, time::Duration};

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::TelegramConfig;

/// Telegram rejects media groups larger than this.
pub const MEDIA_GROUP_LIMIT: usize = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram bot token is not configured")]
    NotConfigured,

    #[error("telegram request timed out")]
    Timeout,

    #[error("telegram network error: {0}")]
    Network(String),

    #[error("telegram api error ({status}): {description}")]
    Api { status: u16, description: String },

    #[error("cannot read photo {path}: {reason}")]
    File { path: String, reason: String },
}

impl TelegramError {
    /// Category stored in the telegram error log.
    pub fn kind(&self) -> &'static str {
        match self {
            TelegramError::NotConfigured => "NotConfigured",
            TelegramError::Timeout => "Timeout",
            TelegramError::Network(_) => "NetworkError",
            TelegramError::Api { .. } => "ApiError",
            TelegramError::File { .. } => "FileError",
        }
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TelegramError::Timeout
        } else {
            TelegramError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default telegram http client");
                reqwest::Client::new()
            });
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn method_url(&self, method: &str) -> Result<String, TelegramError> {
        let token = self.token.as_deref().ok_or(TelegramError::NotConfigured)?;
        Ok(format!("{}/bot{}/{}", self.api_url, token, method))
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        let url = self.method_url("sendMessage")?;
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        let response = self.http.post(url).json(&payload).send().await?;
        check_response(response).await
    }

    pub async fn send_photo(
        &self,
        chat_id: &str,
        photo: &Path,
        caption: Option<&str>,
    ) -> Result<(), TelegramError> {
        let url = self.method_url("sendPhoto")?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", photo_part(photo).await?);
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            form = form
                .text("caption", caption.to_string())
                .text("parse_mode", "HTML");
        }
        let response = self.http.post(url).multipart(form).send().await?;
        check_response(response).await
    }

    /// Upload up to [`MEDIA_GROUP_LIMIT`] photos as one album. The caption is
    /// attached to the last item only.
    pub async fn send_media_group(
        &self,
        chat_id: &str,
        photos: &[&Path],
        caption: Option<&str>,
    ) -> Result<(), TelegramError> {
        let url = self.method_url("sendMediaGroup")?;
        let photos = &photos[..photos.len().min(MEDIA_GROUP_LIMIT)];
        let last = photos.len().saturating_sub(1);

        let mut media = Vec::with_capacity(photos.len());
        let mut form = Form::new().text("chat_id", chat_id.to_string());
        for (index, photo) in photos.iter().enumerate() {
            let attach = format!("photo{index}");
            let mut item = json!({ "type": "photo", "media": format!("attach://{attach}") });
            if index == last {
                if let Some(caption) = caption.filter(|c| !c.is_empty()) {
                    item["caption"] = json!(caption);
                    item["parse_mode"] = json!("HTML");
                }
            }
            media.push(item);
            form = form.part(attach, photo_part(photo).await?);
        }
        form = form.text("media", serde_json::Value::Array(media).to_string());

        let response = self.http.post(url).multipart(form).send().await?;
        check_response(response).await
    }
}

async fn photo_part(path: &Path) -> Result<Part, TelegramError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| TelegramError::File {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

async fn check_response(response: reqwest::Response) -> Result<(), TelegramError> {
    let status = response.status();
    let body = response.text().await?;
    let parsed: Option<BotResponse> = serde_json::from_str(&body).ok();

    match parsed {
        Some(BotResponse { ok: true, .. }) if status.is_success() => Ok(()),
        Some(BotResponse { description, .. }) => Err(TelegramError::Api {
            status: status.as_u16(),
            description: description.unwrap_or_else(|| "request rejected".to_string()),
        }),
        None => Err(TelegramError::Api {
            status: status.as_u16(),
            description: body.chars().take(200).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str, token: Option<&str>) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            bot_token: token.map(str::to_string),
            channel_id: None,
            api_url: base_url.to_string(),
        })
    }

    #[tokio::test]
    async fn send_message_posts_html_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": "42",
                "text": "<b>hi</b>",
                "parse_mode": "HTML"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri(), Some("TOKEN"))
            .send_message("42", "<b>hi</b>")
            .await
            .expect("message sent");
    }

    #[tokio::test]
    async fn api_rejection_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri(), Some("TOKEN"))
            .send_message("1", "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ApiError");
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn ok_false_with_200_is_still_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false})))
            .mount(&server)
            .await;

        let result = client(&server.uri(), Some("TOKEN")).send_message("1", "x").await;
        assert!(matches!(result, Err(TelegramError::Api { status: 200, .. })));
    }

    #[tokio::test]
    async fn missing_token_short_circuits() {
        let err = client("http://127.0.0.1:1", None)
            .send_message("1", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, TelegramError::NotConfigured));
    }

    #[tokio::test]
    async fn media_group_attaches_every_photo_and_one_caption() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.jpg");
        let second = dir.path().join("b.jpg");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMediaGroup"))
            .and(body_string_contains("attach://photo0"))
            .and(body_string_contains("attach://photo1"))
            .and(body_string_contains("\"caption\":\"Новинки\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": []})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri(), Some("TOKEN"))
            .send_media_group("@shop", &[first.as_path(), second.as_path()], Some("Новинки"))
            .await
            .expect("album sent");
    }

    #[tokio::test]
    async fn unreadable_photo_is_a_file_error() {
        let server = MockServer::start().await;
        let err = client(&server.uri(), Some("TOKEN"))
            .send_photo("1", Path::new("/definitely/missing.jpg"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "FileError");
    }
}
