use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meme_feed_client::api::{ApiClient, FeedScope};
use meme_feed_client::config::Config;
use meme_feed_client::feed::{FeedSynchronizer, LoadMode, LoadOutcome};
use meme_feed_client::models::{Credentials, MemeRecord};
use meme_feed_client::notify::{NoticeLevel, Notifier};
use meme_feed_client::profile::ProfileView;
use meme_feed_client::search::UserSearch;
use meme_feed_client::session::Session;

const USAGE: &str = "usage: meme-feed <feed | user <id> | search <query> | like <meme_id> | comment <meme_id> <text>>";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(api_url = %config.api_url, "Configuration loaded");

    let session = match &config.session_file {
        Some(path) => Session::with_store(path),
        None => Session::new(),
    };
    let client = Arc::new(ApiClient::new(&config, session).context("Failed to build API client")?);
    authenticate(&client).await?;

    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice.level {
                NoticeLevel::Success => info!(notice = %notice.message),
                NoticeLevel::Error => warn!(notice = %notice.message),
            }
        }
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["feed"] => show_feed(&client, &config, notifier).await,
        ["user", user_id] => show_user(&client, &config, notifier, user_id).await,
        ["search", query @ ..] if !query.is_empty() => {
            search_users(&client, &config, notifier, &query.join(" ")).await
        }
        ["like", meme_id] => like(&client, &config, notifier, meme_id).await,
        ["comment", meme_id, text @ ..] if !text.is_empty() => {
            comment(&client, &config, notifier, meme_id, &text.join(" ")).await
        }
        _ => bail!(USAGE),
    }
}

/// Reuse a stored session, or sign in from the environment.
async fn authenticate(client: &ApiClient) -> Result<()> {
    if let Some(user) = client
        .restore_session()
        .await
        .context("Failed to restore session")?
    {
        info!(user = %user.summary.username, "Using stored session");
        return Ok(());
    }

    if let Ok(token) = std::env::var("MEME_TOKEN") {
        client.session().set_token(token);
        let user = client.me().await.context("MEME_TOKEN was rejected")?;
        info!(user = %user.summary.username, "Signed in with token");
        return Ok(());
    }

    match (std::env::var("MEME_EMAIL"), std::env::var("MEME_PASSWORD")) {
        (Ok(email), Ok(password)) => {
            let user = client
                .login(&Credentials { email, password })
                .await
                .context("Login failed")?;
            info!(user = %user.summary.username, "Signed in");
            Ok(())
        }
        _ => bail!("No session: set MEME_TOKEN or MEME_EMAIL and MEME_PASSWORD"),
    }
}

fn print_meme(meme: &MemeRecord) {
    println!(
        "{}  @{}  {} likes{}  {} comments  {}",
        meme.id,
        meme.author_name().unwrap_or("?"),
        meme.likes_count,
        if meme.liked_by_current_viewer { " (liked)" } else { "" },
        meme.comments_count,
        meme.caption.as_deref().unwrap_or(""),
    );
    for comment in &meme.recent_comments {
        println!(
            "    @{}: {}",
            comment.author_name().unwrap_or("?"),
            comment.text
        );
    }
}

async fn show_feed(client: &Arc<ApiClient>, config: &Config, notifier: Notifier) -> Result<()> {
    let feed = FeedSynchronizer::new(Arc::clone(client), FeedScope::Global, config, notifier);
    feed.load_page(LoadMode::Reset)
        .await
        .context("Failed to load feed")?;
    for meme in feed.snapshot().items {
        print_meme(&meme);
    }
    Ok(())
}

async fn show_user(
    client: &Arc<ApiClient>,
    config: &Config,
    notifier: Notifier,
    user_id: &str,
) -> Result<()> {
    let view = ProfileView::new(
        Arc::clone(client),
        Arc::clone(client),
        user_id,
        client.session().user_id(),
        config,
        notifier,
    );
    let profile = view.load().await.context("Failed to load profile")?;
    println!(
        "@{}  {} followers  {} following{}",
        profile.summary.username,
        profile.followers_count,
        profile.following_count,
        if profile.summary.is_following { "  (following)" } else { "" },
    );
    if let Some(bio) = &profile.summary.bio {
        println!("{bio}");
    }
    view.memes()
        .load_page(LoadMode::Reset)
        .await
        .context("Failed to load memes")?;
    for meme in view.memes().snapshot().items {
        print_meme(&meme);
    }
    Ok(())
}

async fn search_users(
    client: &Arc<ApiClient>,
    config: &Config,
    notifier: Notifier,
    query: &str,
) -> Result<()> {
    let search = UserSearch::new(Arc::clone(client), config, notifier);
    search.submit(query).await;
    for user in search.state().results {
        println!(
            "{}  @{}{}",
            user.id,
            user.username,
            if user.is_following { "  (following)" } else { "" }
        );
    }
    Ok(())
}

/// Page through the home feed until `meme_id` is held.
async fn load_until_held(feed: &FeedSynchronizer<ApiClient>, meme_id: &str) -> Result<()> {
    let mut mode = LoadMode::Reset;
    loop {
        let outcome = feed.load_page(mode).await.context("Failed to load feed")?;
        if feed.get(meme_id).is_some() {
            return Ok(());
        }
        if matches!(
            outcome,
            LoadOutcome::Exhausted | LoadOutcome::Loaded { has_more: false, .. }
        ) {
            bail!("Meme {meme_id} is not in your feed");
        }
        mode = LoadMode::Append;
    }
}

async fn like(
    client: &Arc<ApiClient>,
    config: &Config,
    notifier: Notifier,
    meme_id: &str,
) -> Result<()> {
    let feed = FeedSynchronizer::new(Arc::clone(client), FeedScope::Global, config, notifier);
    load_until_held(&feed, meme_id).await?;
    let liked = feed
        .toggle_like(meme_id)
        .await
        .context("Failed to update like")?;
    if let Some(meme) = feed.get(meme_id) {
        println!(
            "{} {meme_id} ({} likes)",
            if liked { "Liked" } else { "Unliked" },
            meme.likes_count
        );
    }
    Ok(())
}

async fn comment(
    client: &Arc<ApiClient>,
    config: &Config,
    notifier: Notifier,
    meme_id: &str,
    text: &str,
) -> Result<()> {
    let feed = FeedSynchronizer::new(Arc::clone(client), FeedScope::Global, config, notifier);
    load_until_held(&feed, meme_id).await?;
    let created = feed
        .add_comment(meme_id, text)
        .await
        .context("Failed to add comment")?;
    println!("Commented {} on {meme_id}", created.id);
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meme_feed_client=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
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
