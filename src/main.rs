use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use markvault::app::{App, AppEvent};
use markvault::backend::BackendClient;
use markvault::config::Config;
use markvault::sync::{ChangeFeedClient, FeedConfig, HttpFeedTransport};
use markvault::util::{display_domain, format_relative};

/// Get the config directory path (~/.config/markvault/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("markvault");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "markvault", about = "Terminal bookmark manager with live sync")]
struct Args {
    /// Config file (default: ~/.config/markvault/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print your bookmarks and exit
    #[arg(long)]
    list: bool,

    /// End the current session and exit
    #[arg(long)]
    sign_out: bool,
}

/// Log to a file under the config directory when RUST_LOG is set; the
/// terminal belongs to the TUI.
fn init_tracing(config_dir: &std::path::Path) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    let log_path = config_dir.join("markvault.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Set directory permissions on Unix (user-only access); it holds tokens
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    eprintln!(
                        "Warning: failed to restrict permissions on {}: {}",
                        config_dir.display(),
                        e
                    );
                }
            }
            Err(e) => {
                eprintln!(
                    "Warning: failed to read metadata for {}: {}",
                    config_dir.display(),
                    e
                );
            }
        }
    }

    init_tracing(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();

    let backend = BackendClient::new(
        config.require_backend_url()?,
        config.require_anon_key()?,
        config.access_token(),
        config.request_timeout(),
    )
    .context("Failed to create backend client")?;

    if args.sign_out {
        backend.sign_out().await.context("Failed to sign out")?;
        println!("Signed out.");
        return Ok(());
    }

    // Without a user there is nothing to show and no feed to open
    let Some(user) = backend
        .current_user()
        .await
        .context("Failed to check the current session")?
    else {
        eprintln!("Error: not signed in.");
        eprintln!();
        eprintln!("Sign in with your browser, then set the session token:");
        eprintln!(
            "  export {}=<token>",
            markvault::config::ENV_ACCESS_TOKEN
        );
        std::process::exit(1);
    };
    tracing::info!(user = %user.id, "Signed in");

    let bookmarks = backend
        .list_by_owner(&user.id)
        .await
        .context("Failed to load bookmarks")?;

    if args.list {
        let now = Utc::now();
        for b in &bookmarks {
            println!(
                "{}\t{}\t{}\t{}",
                b.title,
                b.url,
                display_domain(&b.url),
                format_relative(b.created_at, now)
            );
        }
        return Ok(());
    }

    let mut app = App::new(user, backend.clone(), &config);
    let count = app.store.replace_all(bookmarks);
    tracing::debug!(count, "Loaded initial bookmarks");

    let mut feed = ChangeFeedClient::new(
        HttpFeedTransport::new(backend),
        FeedConfig::from(&config.feed),
    );
    feed.subscribe(app.owner().clone());

    // Create event channel for background tasks
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    // Run the TUI; it releases the feed subscription on every exit path
    markvault::ui::run(&mut app, &mut feed, event_tx, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}
