use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feedsync::auth::{AuthGate, Registration};
use feedsync::config::Config;
use feedsync::db::Database;
use feedsync::favourites::{FavouritesController, UiState};
use feedsync::feed::{FeedController, FeedState};
use feedsync::model::{AuthState, SearchState};
use feedsync::remote::HttpPostSource;
use feedsync::sync::{PostFeed, PostSynchronizer};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting feedsync");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(api_base_url = %config.api_base_url, page_size = config.page_size, "Configuration loaded");

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized");

    let auth = AuthGate::new(db.clone());
    if auth.is_logged_in().await {
        let email = auth.current_email().await.unwrap_or_default();
        info!(email = %email, "Resuming session");
    } else {
        info!("No active session; use `login <email> <password>`");
    }

    let remote = HttpPostSource::new(&config).context("Failed to build remote source")?;
    let synchronizer: Arc<dyn PostFeed> = Arc::new(PostSynchronizer::from_config(
        &config,
        Arc::new(remote),
        Arc::new(db),
    ));

    let feed = FeedController::start(Arc::clone(&synchronizer), config.search_debounce);
    let favourites = FavouritesController::start(synchronizer);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        match command {
            "" => {}
            "show" => print_feed(&feed.state()),
            "next" => {
                feed.load_next_page().await;
                print_feed(&feed.state());
            }
            "refresh" => {
                feed.refresh().await;
                print_feed(&feed.state());
            }
            "search" => feed.on_query_changed(rest),
            "fav" => match rest.trim().parse::<i64>() {
                Ok(id) => {
                    let state = feed.state();
                    match state.posts().iter().find(|p| p.id == id) {
                        Some(post) => match feed.toggle_favourite(post).await {
                            Ok(now) => println!("post {id} favourite: {now}"),
                            Err(e) => println!("error: {e}"),
                        },
                        None => println!("post {id} is not displayed"),
                    }
                }
                Err(_) => println!("usage: fav <id>"),
            },
            "favs" => print_favourites(&favourites.state()),
            "clear-favs" => match favourites.clear_all_favourites().await {
                Ok(n) => println!("cleared {n} favourites"),
                Err(e) => println!("error: {e}"),
            },
            "dismiss" => feed.clear_error(),
            "register" => {
                let mut parts = rest.split_whitespace();
                let (email, password) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
                match auth.register_validated(email, password, password).await {
                    Registration::Submitted(state) => print_auth(&state),
                    Registration::Invalid(errors) => println!("{errors:?}"),
                }
            }
            "login" => {
                let mut parts = rest.split_whitespace();
                let (email, password) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
                print_auth(&auth.login(email, password).await);
            }
            "logout" => {
                if let Err(e) = auth.logout().await {
                    warn!("Logout failed: {e:#}");
                }
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn print_feed(state: &FeedState) {
    for post in state.posts() {
        let star = if post.is_favourite { "*" } else { " " };
        println!("{star} {:>4}  {}", post.id, post.title);
    }
    match &state.search {
        SearchState::Empty { query } => println!("no cached posts match '{query}'"),
        SearchState::Error { message } => println!("search error: {message}"),
        SearchState::Idle | SearchState::Searching | SearchState::Results { .. } => {}
    }
    println!(
        "-- {:?} | page {} | more: {}{}",
        state.mode(),
        state.pagination.current_page,
        state.pagination.has_more_data,
        state
            .pagination
            .error
            .as_deref()
            .map(|e| format!(" | error: {e}"))
            .unwrap_or_default()
    );
}

fn print_favourites(state: &UiState) {
    match state {
        UiState::Loading => println!("loading favourites..."),
        UiState::Empty => println!("no favourites"),
        UiState::Success(posts) => {
            for post in posts.iter() {
                println!("* {:>4}  {}", post.id, post.title);
            }
        }
        UiState::Error(message) => println!("error: {message}"),
    }
}

fn print_auth(state: &AuthState) {
    match state {
        AuthState::Success => println!("ok"),
        AuthState::Error(message) => println!("error: {message}"),
    }
}

fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,feedsync=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Logs go to stderr so they do not interleave with command output.
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
