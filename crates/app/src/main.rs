use std::{sync::Arc, time::Duration};

use engine::Recognizer;
use migration::{Migrator, MigratorTrait};
use settings::Database;
use teloxide::types::UserId;
use tokio::{signal, sync::watch};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "sparagne={level},telegram_bot={level},server={level},engine={level},recognizer={level}",
            level = settings.app.level
        ))
        .init();

    let grace = Duration::from_secs(settings.app.shutdown_grace_secs);
    let (stop_tx, stop_rx) = watch::channel(false);

    let recognizer: Option<Arc<dyn Recognizer>> = match &settings.recognizer {
        Some(cfg) => {
            let mut builder = recognizer::OpenAiRecognizer::builder().api_key(&cfg.api_key);
            if let Some(base_url) = &cfg.base_url {
                builder = builder.base_url(base_url);
            }
            if let Some(model) = &cfg.model {
                builder = builder.model(model);
            }
            if let Some(secs) = cfg.timeout_secs {
                builder = builder.timeout(Duration::from_secs(secs));
            }
            Some(Arc::new(builder.build()?))
        }
        None => {
            tracing::warn!("No recognizer settings: free text messages will be rejected");
            None
        }
    };

    // The bot's service account is the one allowed to act for linked chats.
    let chat_relay = settings.telegram.as_ref().map(|t| t.username.clone());

    if let Some(server) = settings.server {
        let shutdown = stop_rx.clone();
        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let db = match parse_database(&server.database).await {
                Ok(db) => db,
                Err(err) => {
                    tracing::error!("failed to initialize database: {err}");
                    return;
                }
            };

            let engine = match engine::Engine::builder().database(db).build().await {
                Ok(engine) => engine,
                Err(err) => {
                    tracing::error!("failed to build engine from database: {err}");
                    return;
                }
            };
            let state = server::ServerState {
                engine: Arc::new(engine),
                recognizer,
                chat_relay,
            };
            let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
            if let Err(err) = server::run(&bind, server.port, state, shutdown, grace).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    if let Some(telegram) = settings.telegram {
        let shutdown = stop_rx.clone();
        tasks.spawn(async move {
            tracing::info!("Found telegram settings...");
            let mut builder = telegram_bot::Bot::builder()
                .token(&telegram.token)
                .allowed_users(telegram.allowed_users.into_iter().map(UserId).collect())
                .server(&telegram.server, &telegram.username, &telegram.password);
            if let Some(secs) = telegram.login_ttl_secs {
                builder = builder.login_ttl(Duration::from_secs(secs));
            }
            if let Some(name) = &telegram.timezone {
                match name.parse::<chrono_tz::Tz>() {
                    Ok(tz) => builder = builder.timezone(tz),
                    Err(err) => {
                        tracing::error!("invalid telegram timezone {name}: {err}");
                        return;
                    }
                }
            }
            match builder.build() {
                Ok(bot) => bot.run(shutdown).await,
                Err(err) => tracing::error!("failed to initialize telegram bot: {err}"),
            }
        });
    }

    if tasks.is_empty() {
        tracing::warn!("Nothing to run: configure a server and/or telegram section");
        return Ok(());
    }

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown requested");
        let _ = stop_tx.send(true);
    });

    while tasks.join_next().await.is_some() {}

    tracing::info!("Bye");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::debug!("Received ctrl+c signal."),
        _ = terminate => tracing::debug!("Received terminate signal."),
    }
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
