//! sked-queue - Operate the Skedcast publishing queue
//!
//! Unix-style tool for inspecting posts, publishing one immediately,
//! resurrecting failed posts, and preparing vault-sealed tokens.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use libskedcast::logging::{LogFormat, LoggingConfig};
use libskedcast::scheduling::parse_schedule;
use libskedcast::vault::TokenCipher;
use libskedcast::{
    Config, Database, Lifecycle, Platform, PostStatus, QueueStats, ScheduledPost, SkedcastError,
    SkedcastService,
};
use secrecy::ExposeSecret;
use std::io::Read;

#[derive(Parser, Debug)]
#[command(name = "sked-queue")]
#[command(version)]
#[command(about = "Operate the Skedcast publishing queue")]
#[command(long_about = "\
sked-queue - Operate the Skedcast publishing queue

DESCRIPTION:
    sked-queue inspects and manages scheduled posts. Publishing failures
    are never retried automatically: a failed post keeps the platform's
    error text until an operator moves it back to ready with `retry`.

COMMANDS:
    list        List posts, newest first
    show        Show one post, including stored failure details
    now         Publish a ready post immediately
    retry       Move a failed post back to ready
    reschedule  Change a post's publish time
    stats       Show queue statistics
    keygen      Generate a new vault identity
    seal        Seal a token read from stdin with the vault identity

USAGE EXAMPLES:
    # Failed posts as JSON
    sked-queue list --status failed --format json

    # Why did it fail?
    sked-queue show <POST_ID>

    # Try again on the next dispatch cycle
    sked-queue retry <POST_ID>

    # Move a post
    sked-queue reschedule <POST_ID> \"tomorrow 3pm\"
    sked-queue reschedule <POST_ID> 2h

    # Onboard an account token
    sked-queue keygen > ~/.config/skedcast/vault.key
    printf '%s' \"$TOKEN\" | sked-queue seal

CONFIGURATION:
    Configuration file: ~/.config/skedcast/config.toml

    Override with environment variables:
        SKEDCAST_CONFIG          - Path to config file
        SKEDCAST_DB_PATH         - Path to database file
        SKEDCAST_VAULT_IDENTITY  - age identity sealing stored tokens

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database, configuration or credential error
    3 - Invalid input (unknown post, wrong state, bad time format)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List posts
    List {
        /// Only posts in this status
        #[arg(short, long)]
        status: Option<String>,

        /// Only posts for this platform
        #[arg(short, long)]
        platform: Option<String>,

        /// Maximum number of posts
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show a single post
    Show {
        post_id: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Publish a ready post now
    Now { post_id: String },

    /// Move a failed post back to ready
    Retry { post_id: String },

    /// Change a post's publish time
    Reschedule {
        post_id: String,

        /// New time: "2h", "tomorrow 3pm", RFC 3339, "random:10m-30m", or "now"
        time: String,
    },

    /// Show queue statistics
    Stats {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Generate a new vault identity
    Keygen,

    /// Seal a token read from stdin
    Seal,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = std::env::var("SKEDCAST_LOG_LEVEL").unwrap_or_else(|_| "error".to_string());
    LoggingConfig::new(LogFormat::Text, level, cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<SkedcastError>()
            .map_or(1, SkedcastError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Keygen => cmd_keygen(),
        Commands::List {
            status,
            platform,
            limit,
            format,
        } => {
            let db = open_db(&Config::load()?).await?;
            cmd_list(&db, status.as_deref(), platform.as_deref(), limit, format).await?;
        }
        Commands::Show { post_id, format } => {
            let db = open_db(&Config::load()?).await?;
            cmd_show(&db, &post_id, format).await?;
        }
        Commands::Now { post_id } => {
            let service = SkedcastService::from_config(Config::load()?).await?;
            let outcome = service.schedule_immediate(&post_id).await?;
            println!("{}", outcome.url);
        }
        Commands::Retry { post_id } => {
            let db = open_db(&Config::load()?).await?;
            let post = Lifecycle::new(db).retry(&post_id).await?;
            println!("{} {}", post.id, post.status);
        }
        Commands::Reschedule { post_id, time } => {
            let db = open_db(&Config::load()?).await?;
            cmd_reschedule(db, &post_id, &time).await?;
        }
        Commands::Stats { format } => {
            let db = open_db(&Config::load()?).await?;
            cmd_stats(&db.queue_stats().await?, format)?;
        }
        Commands::Seal => cmd_seal(&Config::load()?)?,
    }

    Ok(())
}

async fn open_db(config: &Config) -> libskedcast::Result<Database> {
    Database::new(&config.database_path()).await
}

async fn cmd_list(
    db: &Database,
    status: Option<&str>,
    platform: Option<&str>,
    limit: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let status = status.map(str::parse::<PostStatus>).transpose()?;
    let platform = platform.map(str::parse::<Platform>).transpose()?;
    let posts = db.list_posts(status, platform, limit).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&posts)?),
        OutputFormat::Text => {
            let now = chrono::Utc::now().timestamp();
            for post in &posts {
                println!(
                    "{} | {} | {} | {} | {}",
                    post.id,
                    post.status,
                    post.platform_data.target.sub_type(),
                    post.scheduled_at
                        .map_or_else(|| "immediate".to_string(), |ts| format_time_until(now, ts)),
                    truncate_content(&post.generated_content, 50)
                );
            }
        }
    }

    Ok(())
}

async fn cmd_show(db: &Database, post_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let post = db
        .get_post(post_id)
        .await?
        .ok_or_else(|| SkedcastError::NotFound(format!("Post {}", post_id)))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&post)?),
        OutputFormat::Text => print_post(&post),
    }
    Ok(())
}

fn print_post(post: &ScheduledPost) {
    println!("id:        {}", post.id);
    println!("status:    {}", post.status);
    println!(
        "platform:  {} ({})",
        post.platform,
        post.platform_data.target.sub_type()
    );
    println!("account:   {}", post.social_account_id);
    println!(
        "scheduled: {}",
        post.scheduled_at.map_or_else(|| "immediate".to_string(), format_timestamp)
    );
    if let Some(published_at) = post.published_at {
        println!("published: {}", format_timestamp(published_at));
    }
    if let (Some(id), Some(url)) = (&post.platform_post_id, &post.post_url) {
        println!("remote id: {}", id);
        println!("url:       {}", url);
    }
    if let Some(failure) = post.failure() {
        println!("failed at: {}", format_timestamp(failure.failed_at));
        println!("error:     {}", failure.message);
        if let Some(response) = &failure.platform_response {
            println!("response:  {}", response);
        }
    }
    println!();
    println!("{}", post.generated_content);
}

async fn cmd_reschedule(db: Database, post_id: &str, time: &str) -> anyhow::Result<()> {
    let when = if time.eq_ignore_ascii_case("now") {
        None
    } else {
        let latest = db
            .list_posts(Some(PostStatus::Scheduled), None, 1_000)
            .await?
            .iter()
            .filter_map(|p| p.scheduled_at)
            .max();
        Some(parse_schedule(time, latest)?.timestamp())
    };

    let post = Lifecycle::new(db).reschedule(post_id, when).await?;
    println!(
        "{} {}",
        post.id,
        post.scheduled_at.map_or_else(|| "immediate".to_string(), format_timestamp)
    );
    Ok(())
}

fn cmd_stats(stats: &QueueStats, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "total": stats.total(),
            "by_status": stats.by_status.iter()
                .map(|(s, n)| (s.to_string(), serde_json::Value::from(*n)))
                .collect::<serde_json::Map<_, _>>(),
            "by_platform": stats.by_platform.iter()
                .map(|(p, n)| (p.to_string(), serde_json::Value::from(*n)))
                .collect::<serde_json::Map<_, _>>(),
            "next_scheduled_at": stats.next_scheduled_at,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("Total posts: {}", stats.total());
    for status in PostStatus::all() {
        println!("  {:<11} {}", status.as_str(), stats.count(status));
    }
    println!("By platform:");
    for (platform, n) in &stats.by_platform {
        println!("  {:<11} {}", platform.as_str(), n);
    }
    if let Some(next) = stats.next_scheduled_at {
        println!(
            "Next scheduled: {} ({})",
            format_timestamp(next),
            format_time_until(chrono::Utc::now().timestamp(), next)
        );
    }
    Ok(())
}

fn cmd_keygen() {
    let cipher = TokenCipher::generate();
    println!("# public key: {}", cipher.public_key());
    println!("{}", cipher.identity_string().expose_secret());
}

fn cmd_seal(config: &Config) -> anyhow::Result<()> {
    let cipher = TokenCipher::from_identity_str(&config.vault.load_identity()?)?;

    let mut token = String::new();
    std::io::stdin()
        .read_to_string(&mut token)
        .context("Failed to read token from stdin")?;
    let token = token.trim_end_matches(['\r', '\n']);
    if token.is_empty() {
        return Err(SkedcastError::InvalidInput("No token on stdin".to_string()).into());
    }

    println!("{}", cipher.seal(token)?);
    Ok(())
}

/// Truncate content to max chars with ellipsis, on one line
fn truncate_content(content: &str, max_chars: usize) -> String {
    let line = content.lines().next().unwrap_or("");
    if line.chars().count() <= max_chars && !content.contains('\n') {
        line.to_string()
    } else {
        format!("{}...", line.chars().take(max_chars).collect::<String>())
    }
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}
