//! Telegram bot.
//!
//! The bot is a thin client: it talks only to the HTTP server API and never
//! accesses the database directly. Chats are linked to accounts with
//! `/login`, after which free text is sent to the server for recognition.

use std::time::Duration;

use base64::Engine;
use chrono_tz::Tz;
use reqwest::{Client, header};
use teloxide::prelude::*;
use tokio::sync::watch;

mod api;
mod handlers;
mod state;
mod ui;

#[derive(Clone)]
pub struct ConfigParameters {
    allowed_users: Option<Vec<UserId>>,
    api: api::ApiClient,
    sessions: state::SessionStore,
    timezone: Tz,
}

pub struct Bot {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    server: String,
    client: Client,
    login_ttl: Duration,
    timezone: Tz,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    /// Polls for updates until `shutdown` turns `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);
        let parameters = ConfigParameters {
            allowed_users: self.allowed_users.clone(),
            api: api::ApiClient::new(self.client.clone(), self.server.clone()),
            sessions: state::SessionStore::new(self.login_ttl),
            timezone: self.timezone,
        };

        let handler =
            dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

        let mut dispatcher = Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::debug!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .build();

        let token = dispatcher.shutdown_token();
        let stopper = tokio::spawn(async move {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                // Sender dropped: nobody can ask us to stop anymore.
                return;
            }
            tracing::info!("Stopping telegram bot...");
            // The token refuses to stop a dispatcher that has not started yet.
            loop {
                match token.shutdown() {
                    Ok(done) => {
                        done.await;
                        return;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        });

        dispatcher.dispatch().await;
        stopper.abort();
        tracing::info!("Telegram bot stopped");
    }
}

#[derive(Default, Debug)]
pub struct BotBuilder {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    server: String,
    username: String,
    password: String,
    login_ttl: Option<Duration>,
    timezone: Option<Tz>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    pub fn allowed_users(mut self, allowed_users: Vec<UserId>) -> BotBuilder {
        if !allowed_users.is_empty() {
            self.allowed_users = Some(allowed_users);
        }
        self
    }

    /// Server base URL (e.g. `http://127.0.0.1:3000/api/v1`) and the
    /// service account the bot authenticates with.
    pub fn server(mut self, server: &str, username: &str, password: &str) -> BotBuilder {
        self.server = server.to_string();
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// How long a `/login` waits for the email address.
    pub fn login_ttl(mut self, ttl: Duration) -> BotBuilder {
        self.login_ttl = Some(ttl);
        self
    }

    /// Timezone used to show transaction dates.
    pub fn timezone(mut self, tz: Tz) -> BotBuilder {
        self.timezone = Some(tz);
        self
    }

    pub fn build(self) -> Result<Bot, String> {
        tracing::info!("Initializing telegram bot...");
        if self.token.trim().is_empty() {
            return Err("missing telegram bot token".to_string());
        }

        // Basic authorization is in the form "Basic `secret`" where `secret` is
        // the base64 of the string "username:password".
        let secret = format!("{}:{}", self.username, self.password);
        let secret = format!("Basic {}", base64::prelude::BASE64_STANDARD.encode(secret));

        let mut auth = header::HeaderValue::try_from(secret)
            .map_err(|err| format!("invalid auth header value: {err}"))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;

        Ok(Bot {
            token: self.token,
            allowed_users: self.allowed_users,
            server: self.server,
            client,
            login_ttl: self.login_ttl.unwrap_or(state::DEFAULT_LOGIN_TTL),
            timezone: self.timezone.unwrap_or(chrono_tz::Asia::Jakarta),
        })
    }
}
