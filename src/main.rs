use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;

use reachnews::app::Dashboard;
use reachnews::config::Config;
use reachnews::feed::{Article, ArticleId, FeedClient};
use reachnews::preferences::{PreferenceStore, ViewMode};
use reachnews::remote::{validate_password, AuthClient, AuthError, GraphQlClient, ProfileClient};
use reachnews::session::{Session, SessionGate};
use reachnews::storage::{Database, DatabaseError};
use reachnews::sync::{spawn_profile_sync, SyncHandle};
use reachnews::util::{pad_to_width, sanitize_for_terminal, truncate_to_width, validate_article_url};

const PASSWORD_ENV: &str = "REACHNEWS_PASSWORD";
const TITLE_WIDTH: usize = 60;

/// Get the config directory path (~/.config/reachnews/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("reachnews"))
}

#[derive(Parser, Debug)]
#[command(name = "reachnews", about = "Sentiment-tagged news reader")]
struct Args {
    /// Reset local database (signs out and forgets all local preferences)
    #[arg(long)]
    reset_db: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password (password from REACHNEWS_PASSWORD or stdin)
    SignIn {
        #[arg(long)]
        email: String,
    },
    /// Create an account (password from REACHNEWS_PASSWORD or stdin)
    SignUp {
        #[arg(long)]
        email: String,
        /// Display name for the new account
        #[arg(long)]
        name: String,
    },
    /// Sign out and clear this account's local preferences
    SignOut,
    /// Show the filtered feed
    Feed {
        /// Number of pages to reveal
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Toggle an article's read state
    Read { id: String },
    /// Toggle an article's saved state
    Save { id: String },
    /// Toggle a topic filter
    Topic { name: String },
    /// Clear all topic filters
    ClearTopics,
    /// Switch the view
    View { mode: ViewArg },
    /// Show an article and open its source link
    Open { id: String },
    /// Show the remote profile mirror
    Profile,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    Home,
    Saved,
    Read,
}

/// Dashboard interaction requested on the command line.
enum Action {
    Feed { pages: usize },
    Read(ArticleId),
    Save(ArticleId),
    Topic(String),
    ClearTopics,
    View(ViewArg),
    Open(ArticleId),
}

/// Shared handles built once per invocation.
struct Services {
    config: Config,
    db: Database,
    gate: SessionGate,
    auth: AuthClient,
    graphql: GraphQlClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access: the directory holds the session token.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    let db_path = config_dir.join("reachnews.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another instance of reachnews appears to be running. Please try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("reachnews/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let ctx = Services {
        gate: SessionGate::new(db.clone()),
        auth: AuthClient::new(http.clone(), &config.auth_url),
        graphql: GraphQlClient::new(http, &config.graphql_url).with_timeout(config.request_timeout()),
        config,
        db,
    };

    match args.command {
        Command::SignIn { email } => sign_in(&ctx, &email).await,
        Command::SignUp { email, name } => sign_up(&ctx, &email, &name).await,
        Command::SignOut => {
            ctx.gate.sign_out(&ctx.auth).await;
            println!("Signed out.");
            Ok(())
        }
        Command::Profile => show_profile(&ctx).await,
        Command::Feed { pages } => run_dashboard(&ctx, Action::Feed { pages }).await,
        Command::Read { id } => run_dashboard(&ctx, Action::Read(ArticleId::new(id))).await,
        Command::Save { id } => run_dashboard(&ctx, Action::Save(ArticleId::new(id))).await,
        Command::Topic { name } => run_dashboard(&ctx, Action::Topic(name)).await,
        Command::ClearTopics => run_dashboard(&ctx, Action::ClearTopics).await,
        Command::View { mode } => run_dashboard(&ctx, Action::View(mode)).await,
        Command::Open { id } => run_dashboard(&ctx, Action::Open(ArticleId::new(id))).await,
    }
}

// ============================================================================
// Session commands
// ============================================================================

fn read_password() -> Result<SecretString> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(password));
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(SecretString::from(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

async fn sign_in(ctx: &Services, email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }
    let password = read_password()?;

    let session = match ctx.auth.sign_in(email, &password).await {
        Ok(session) => session,
        Err(e @ AuthError::InvalidCredentials) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Sign-in failed"),
    };

    start_session(ctx, session, "Signed in").await
}

async fn sign_up(ctx: &Services, email: &str, name: &str) -> Result<()> {
    let email = email.trim();
    let name = name.trim();
    if email.is_empty() || name.is_empty() {
        anyhow::bail!("Email and name are required");
    }
    let password = read_password()?;
    if let Err(e) = validate_password(password.expose_secret()) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let session = match ctx.auth.sign_up(email, &password, name).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            println!("Account created. Verify your email, then run `reachnews sign-in --email {email}`.");
            return Ok(());
        }
        Err(e @ AuthError::Rejected(_)) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Sign-up failed"),
    };

    start_session(ctx, session, "Signed up").await
}

/// Bootstrap the profile row, then store the session in place of any
/// previous one.
async fn start_session(ctx: &Services, session: Session, verb: &str) -> Result<()> {
    let profiles = ProfileClient::new(ctx.graphql.clone(), &session);
    if let Err(e) = profiles.ensure_profile(&session).await {
        tracing::error!(identity = %session.identity, error = %e, "Profile setup failed");
        if let Err(e) = ctx.auth.sign_out(&session).await {
            tracing::warn!(identity = %session.identity, error = %e, "Remote sign-out after failed setup failed");
        }
        eprintln!("An error occurred while setting up your account. Please try again.");
        std::process::exit(1);
    }

    ctx.gate
        .establish_replacing(&ctx.auth, &session)
        .await
        .context("Failed to store session")?;

    println!("{verb} as {}.", sanitize_for_terminal(session.display_label()));
    Ok(())
}

async fn require_session(ctx: &Services) -> Session {
    match ctx.gate.ensure_authenticated().await {
        Ok(session) => session,
        Err(redirect) => {
            eprintln!("Error: {redirect}. Run `reachnews sign-in --email <EMAIL>`.");
            std::process::exit(1);
        }
    }
}

async fn show_profile(ctx: &Services) -> Result<()> {
    let session = require_session(ctx).await;
    let profile = ProfileClient::new(ctx.graphql.clone(), &session)
        .fetch_profile(&session.identity)
        .await
        .context("Failed to fetch remote profile")?;

    println!("Account:       {}", sanitize_for_terminal(&session.email));
    println!("Display mode:  {}", profile.display_mode.as_str());
    println!(
        "Topics:        {}",
        if profile.topics.is_empty() {
            "(none)".to_string()
        } else {
            sanitize_for_terminal(&profile.topics.join(", ")).into_owned()
        }
    );
    println!("Saved:         {}", profile.saved_articles.len());
    println!("Read:          {}", profile.read_articles.len());
    if !ctx.config.remote_sync {
        println!("(remote_sync is off; local changes are not mirrored)");
    }
    Ok(())
}

// ============================================================================
// Dashboard commands
// ============================================================================

async fn run_dashboard(ctx: &Services, action: Action) -> Result<()> {
    let session = require_session(ctx).await;

    let sync = if ctx.config.remote_sync {
        spawn_profile_sync(ProfileClient::new(ctx.graphql.clone(), &session))
    } else {
        SyncHandle::disabled()
    };
    let mut dashboard = Dashboard::open(
        session.identity.clone(),
        PreferenceStore::new(ctx.db.clone()),
        sync,
        ctx.config.page_size,
    )
    .await;
    let feed = FeedClient::new(ctx.graphql.clone());

    let result = apply_action(ctx, &mut dashboard, &feed, action).await;
    dashboard.close().await;
    result
}

async fn apply_action(
    ctx: &Services,
    dashboard: &mut Dashboard,
    feed: &FeedClient,
    action: Action,
) -> Result<()> {
    match action {
        Action::Feed { pages } => {
            refresh(ctx, dashboard, feed).await;
            dashboard.show_pages(pages);
            print_feed(dashboard);
        }
        Action::Read(id) => {
            let now = dashboard.toggle_read(&id).await;
            println!("Article {id} marked as {}.", if now { "read" } else { "unread" });
        }
        Action::Save(id) => {
            let now = dashboard.toggle_saved(&id).await;
            println!("Article {id} {}.", if now { "saved" } else { "removed from saved" });
        }
        Action::Topic(name) => {
            let Some(topic) = ctx.config.resolve_topic(&name) else {
                anyhow::bail!(
                    "Unknown topic '{}'. Available: {}",
                    name,
                    ctx.config.topics.join(", ")
                );
            };
            let selected = dashboard.toggle_topic(topic).await;
            println!(
                "Topic {topic} {}. {}",
                if selected { "selected" } else { "deselected" },
                dashboard.topic_label()
            );
        }
        Action::ClearTopics => {
            dashboard.clear_topics().await;
            println!("Topic filters cleared.");
        }
        Action::View(mode) => {
            let now = match mode {
                ViewArg::Home => dashboard.show_home().await,
                ViewArg::Saved => dashboard.toggle_saved_view().await,
                ViewArg::Read => dashboard.toggle_read_view().await,
            };
            println!("View: {}", view_label(now));
        }
        Action::Open(id) => {
            refresh(ctx, dashboard, feed).await;
            let Some(article) = dashboard.find_article(&id) else {
                anyhow::bail!("Article {id} is not in the current feed");
            };
            print_article(dashboard, article);
            if let Some(link) = &article.url {
                match validate_article_url(link) {
                    Ok(url) => {
                        open::that(url.as_str()).context("Failed to open browser")?;
                    }
                    Err(e) => {
                        tracing::warn!(article = %id, error = %e, "Refusing to open article link");
                        eprintln!("Not opening link: {e}");
                    }
                }
            }
        }
    }
    Ok(())
}

async fn refresh(ctx: &Services, dashboard: &mut Dashboard, feed: &FeedClient) {
    if let Err(redirect) = dashboard.refresh(&ctx.gate, feed).await {
        eprintln!("Error: {redirect}. Run `reachnews sign-in --email <EMAIL>`.");
        std::process::exit(1);
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn view_label(mode: ViewMode) -> &'static str {
    match mode {
        ViewMode::All => "all news",
        ViewMode::SavedOnly => "saved",
        ViewMode::ReadOnly => "read",
    }
}

fn print_feed(dashboard: &Dashboard) {
    let prefs = dashboard.preferences();
    println!(
        "View: {} | Topics: {} | Saved: {} | Read: {}",
        view_label(dashboard.view_mode()),
        dashboard.topic_label(),
        dashboard.saved_count(),
        dashboard.read_count()
    );

    let visible = dashboard.visible();
    if visible.is_empty() {
        println!();
        println!("{}", dashboard.empty_message());
        return;
    }

    for article in &visible {
        let flags = format!(
            "{}{}",
            if prefs.is_read(&article.id) { 'R' } else { ' ' },
            if prefs.is_saved(&article.id) { 'S' } else { ' ' }
        );
        let title = sanitize_for_terminal(&article.title);
        println!(
            "[{flags}] {:>6}  {}  {}",
            truncate_to_width(article.id.as_str(), 6),
            pad_to_width(article.sentiment.as_str(), 8),
            truncate_to_width(&title, TITLE_WIDTH)
        );
    }

    let total = dashboard.filtered().len();
    if dashboard.has_more() {
        println!(
            "Showing {} of {}. Use --pages {} to see more.",
            visible.len(),
            total,
            dashboard.pager().shown() / dashboard.pager().page_size() + 1
        );
    }
}

fn print_article(dashboard: &Dashboard, article: &Article) {
    let prefs = dashboard.preferences();
    println!("{}", sanitize_for_terminal(&article.title));
    let date = article
        .published
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "undated".to_string());
    println!("{} | {}", date, article.sentiment);
    if let Some(author) = &article.author {
        println!("By {}", sanitize_for_terminal(author));
    }
    println!();
    if let Some(summary) = &article.summary {
        println!("{}", sanitize_for_terminal(summary));
        println!();
    }
    if let Some(content) = &article.content {
        println!("{}", sanitize_for_terminal(content));
        println!();
    }
    println!(
        "Read: {} | Saved: {}",
        if prefs.is_read(&article.id) { "yes" } else { "no" },
        if prefs.is_saved(&article.id) { "yes" } else { "no" }
    );
    if let Some(url) = &article.url {
        println!("{}", sanitize_for_terminal(url));
    }
}
