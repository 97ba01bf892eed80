use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, EngineError, Money};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "sparagne_admin")]
#[command(about = "Admin utilities for Sparagne (bootstrap users/wallets)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./sparagne.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Wallet(Wallet),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Creates an account; the password is asked interactively.
    Create(UserCreateArgs),
    /// Lists every account, oldest first.
    List,
    /// Links a telegram chat to an account.
    Link(UserLinkArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct UserLinkArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    telegram_id: i64,
}

#[derive(Args, Debug)]
struct Wallet {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    Create(WalletCreateArgs),
}

#[derive(Args, Debug)]
struct WalletCreateArgs {
    /// Email of the owner.
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    /// Opening balance in whole units, e.g. `150000` or `1500,50`.
    #[arg(long, default_value = "0")]
    balance: String,
}

/// Keeps the terminal in raw mode while a secret is typed.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Prints `line` on a cleared line of stderr.
fn say(line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut err = std::io::stderr();
    execute!(
        err,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(line)
    )?;
    err.flush()?;
    Ok(())
}

/// Reads a line without echoing it; every typed character shows as `*`.
fn read_secret(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawMode::enable()?;
    say(prompt)?;

    let mut err = std::io::stderr();
    let mut secret = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        let control = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Enter => break,
            KeyCode::Char('c') if control => {
                execute!(err, Print("\r\n"))?;
                return Err("interrupted".into());
            }
            KeyCode::Backspace if secret.pop().is_some() => {
                execute!(err, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
            }
            KeyCode::Char(ch) if !control => {
                secret.push(ch);
                execute!(err, Print("*"))?;
            }
            _ => continue,
        }
        err.flush()?;
    }

    execute!(err, Print("\r\n"))?;
    err.flush()?;
    Ok(secret)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    const ATTEMPTS: usize = 3;

    for _ in 0..ATTEMPTS {
        let password = read_secret("Password: ")?;
        if password.is_empty() {
            say("Password must not be empty.\r\n")?;
            continue;
        }
        if read_secret("Confirm password: ")? == password {
            return Ok(password);
        }
        say("Passwords do not match. Try again.\r\n")?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            match engine.user_by_email(&args.email).await {
                Ok(_) => {
                    eprintln!("user already exists: {}", args.email);
                    std::process::exit(1);
                }
                Err(EngineError::KeyNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }

            let password = prompt_password_twice()?;
            let user = engine.new_user(&args.name, &args.email, &password).await?;
            println!("created user: {} <{}> ({})", user.name, user.email, user.id);
        }
        Command::User(User {
            command: UserCommand::List,
        }) => {
            for user in engine.users().await? {
                let telegram = user
                    .telegram_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}\t{}\t{}\t{telegram}", user.id, user.name, user.email);
            }
        }
        Command::User(User {
            command: UserCommand::Link(args),
        }) => match engine.link_telegram(&args.email, args.telegram_id).await {
            Ok(user) => println!("linked {} to chat {}", user.email, args.telegram_id),
            Err(EngineError::KeyNotFound(_)) => {
                eprintln!("user not found: {}", args.email);
                std::process::exit(1);
            }
            Err(err) => return Err(err.into()),
        },
        Command::Wallet(Wallet {
            command: WalletCommand::Create(args),
        }) => {
            let owner = match engine.user_by_email(&args.owner).await {
                Ok(owner) => owner,
                Err(EngineError::KeyNotFound(_)) => {
                    eprintln!("user not found: {}", args.owner);
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            };

            let balance = match args.balance.parse::<Money>() {
                Ok(v) => v,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };

            let wallet = engine.new_wallet(&owner.id, &args.name, balance).await?;
            println!("created wallet: {} ({})", wallet.name, wallet.id);
        }
    }

    Ok(())
}
