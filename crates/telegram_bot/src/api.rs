use api_types::{
    ErrorBody,
    transaction::{RecognizeRequest, TransactionView},
    user::{TelegramLink, UserView},
};
use reqwest::{Client, RequestBuilder, StatusCode};

const TELEGRAM_HEADER: &str = "telegram-user-id";

#[derive(Clone, Debug)]
pub(crate) struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Server { status: StatusCode, message: String },
}

impl ApiError {
    pub(crate) fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Network(_) => None,
            Self::Server { status, .. } => Some(*status),
        }
    }
}

impl ApiClient {
    pub(crate) fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Sends `req`, acting as the account linked to `chat_id` when given.
    async fn send_json<TResp: for<'de> serde::Deserialize<'de>>(
        &self,
        chat_id: Option<i64>,
        req: RequestBuilder,
    ) -> Result<TResp, ApiError> {
        let req = match chat_id {
            Some(id) => req.header(TELEGRAM_HEADER, id.to_string()),
            None => req,
        };

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<TResp>().await?);
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(err) => err.error,
            Err(_) => "server error".to_string(),
        };
        tracing::debug!(%status, %message, "api request failed");
        Err(ApiError::Server { status, message })
    }

    /// Links `chat_id` to the account registered with `email`.
    pub(crate) async fn link_telegram(
        &self,
        chat_id: i64,
        email: &str,
    ) -> Result<UserView, ApiError> {
        let req = self.client.post(self.url("/users/telegram")).json(&TelegramLink {
            email: email.trim().to_string(),
            telegram_id: chat_id,
        });
        self.send_json(None, req).await
    }

    pub(crate) async fn whoami(&self, chat_id: i64) -> Result<UserView, ApiError> {
        let req = self.client.get(self.url("/users/me"));
        self.send_json(Some(chat_id), req).await
    }

    pub(crate) async fn recognize(
        &self,
        chat_id: i64,
        text: &str,
    ) -> Result<TransactionView, ApiError> {
        let req = self
            .client
            .post(self.url("/transactions/recognize"))
            .json(&RecognizeRequest {
                text: text.to_string(),
            });
        self.send_json(Some(chat_id), req).await
    }
}
