use reqwest::StatusCode;
use teloxide::{
    prelude::*,
    types::{ChatId, ParseMode, User},
};

use crate::{
    ConfigParameters,
    api::ApiError,
    ui,
};

const WELCOME: &str = "Welcome! Send me a message like:\n\nmakan ayam: 50000\n\nI'll track it as an expense.";
const HELP: &str = "Here are some commands you can use:\n\n\
/start - Start the bot\n\
/login - Log in to your account\n\
/cancel - Cancel the current operation\n\
/help - Show this help message";
const NOT_LOGGED_IN: &str = "You are not logged in. Please log in first.";
const GENERIC_ERROR: &str = "An error occurred while processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Login,
    Cancel,
    Help,
    Whoami,
}

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, msg.from.as_ref()) {
        tracing::debug!(chat_id = msg.chat.id.0, "ignoring message from unlisted user");
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    if let Some(cmd) = parse_command(text) {
        return handle_command(&bot, chat_id, &cfg, cmd).await;
    }

    if cfg.sessions.is_pending(chat_id).await {
        return handle_email(&bot, chat_id, &cfg, text).await;
    }

    handle_transaction_text(&bot, chat_id, &cfg, text).await
}

async fn handle_command(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    cmd: Command,
) -> ResponseResult<()> {
    let reply = match cmd {
        Command::Start => WELCOME.to_string(),
        Command::Help => HELP.to_string(),
        Command::Login => {
            if cfg.sessions.begin_login(chat_id).await {
                "You are now in the waiting room. Please send your email address to log in."
                    .to_string()
            } else {
                "You are already in the waiting room.".to_string()
            }
        }
        Command::Cancel => {
            if cfg.sessions.end_login(chat_id).await {
                "You have been removed from the waiting room.".to_string()
            } else {
                "You are not in the waiting room.".to_string()
            }
        }
        Command::Whoami => match cfg.api.whoami(chat_id.0).await {
            Ok(user) => format!("You are logged in as {} ({})", user.name, user.email),
            Err(err) if err.status() == Some(StatusCode::UNAUTHORIZED) => {
                "You are not logged in.".to_string()
            }
            Err(err) => {
                tracing::warn!(chat_id = chat_id.0, "whoami failed: {err}");
                GENERIC_ERROR.to_string()
            }
        },
    };
    bot.send_message(chat_id, reply).await?;
    Ok(())
}

async fn handle_email(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    email: &str,
) -> ResponseResult<()> {
    let reply = match cfg.api.link_telegram(chat_id.0, email).await {
        Ok(user) => {
            cfg.sessions.end_login(chat_id).await;
            tracing::info!(chat_id = chat_id.0, user_id = %user.id, "chat logged in");
            "You have been successfully logged in. You can now send me messages to track your expenses."
        }
        Err(err) => login_error_message(&err),
    };
    bot.send_message(chat_id, reply).await?;
    Ok(())
}

async fn handle_transaction_text(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    text: &str,
) -> ResponseResult<()> {
    match cfg.api.recognize(chat_id.0, text).await {
        Ok(tx) => {
            bot.send_message(chat_id, ui::render_transaction(&tx, cfg.timezone))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
        }
        Err(err) => {
            tracing::debug!(chat_id = chat_id.0, "recognition failed: {err}");
            bot.send_message(chat_id, recognize_error_message(&err)).await?;
        }
    }
    Ok(())
}

fn is_allowed(cfg: &ConfigParameters, from: Option<&User>) -> bool {
    let Some(from) = from else {
        return false;
    };
    match &cfg.allowed_users {
        None => true,
        Some(ids) => ids.contains(&from.id),
    }
}

/// Parses `/command` and `/command@botname`. Arguments are ignored.
fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let word = trimmed.split_whitespace().next().unwrap_or("");
    let cmd = word.split('@').next().unwrap_or(word);

    match cmd {
        "/start" => Some(Command::Start),
        "/login" => Some(Command::Login),
        "/cancel" => Some(Command::Cancel),
        "/help" => Some(Command::Help),
        "/whoami" => Some(Command::Whoami),
        _ => None,
    }
}

fn login_error_message(err: &ApiError) -> &'static str {
    match err.status() {
        Some(StatusCode::NOT_FOUND) => "Email not found. Please try again.",
        _ => GENERIC_ERROR,
    }
}

fn recognize_error_message(err: &ApiError) -> &'static str {
    match err.status() {
        Some(StatusCode::UNAUTHORIZED) => NOT_LOGGED_IN,
        Some(StatusCode::BAD_GATEWAY | StatusCode::UNPROCESSABLE_ENTITY) => {
            "Sorry, I couldn't understand that."
        }
        _ => "An error occurred while saving your transaction.",
    }
}
