use std::path::PathBuf;

use anyhow::{Context, Result};
use chirp_core::{ChirpClient, LoginForm, RegistrationForm};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use self::{commands::Runner, config::Config, store::FileTokenStore, transport::Transport};

mod commands;
mod config;
mod store;
mod transport;

#[derive(Subcommand)]
enum AppSubcommand {
    /// Create an account
    Register {
        username: String,
        #[arg(long)]
        handle: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },

    /// Log in and remember the session token
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the session token
    Logout,

    /// Show the logged-in account
    Whoami,

    /// List every account
    Accounts,

    /// Show the home timeline
    Feed,

    /// Show one account's posts
    Profile { username: String },

    /// Post a tweet; `#tags` in the text become hashtags
    Post { text: String },

    /// Replace the text of one of your tweets
    Edit { tweet_id: i64, text: String },

    /// Delete one of your tweets
    Delete { tweet_id: i64 },

    /// Like a tweet
    Like { tweet_id: i64 },

    /// List tweets, optionally filtered by text
    Tweets {
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Search accounts, hashtags and tweets
    Search { query: String },
}

/// Terminal client for the chirp microblogging service
#[derive(Parser)]
#[command(about, author, version)]
struct App {
    /// Backend origin, e.g. http://localhost:8000
    #[arg(long, global = true, env = "CHIRP_ORIGIN")]
    origin: Option<String>,

    /// Config file (default: <config dir>/chirp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Token file (default: <data dir>/chirp/token)
    #[arg(long, global = true, env = "CHIRP_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[clap(subcommand)]
    subcommand: AppSubcommand,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let app = App::parse();

    let config = match app.config.or_else(Config::default_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let token_path = app
        .token_file
        .or_else(FileTokenStore::default_path)
        .context("no data directory for the token file; pass --token-file")?;

    let mut runner = Runner {
        client: ChirpClient::new(&config.origin(app.origin.as_deref())),
        transport: Transport::new(),
        store: FileTokenStore::new(token_path),
        out: std::io::stdout().lock(),
    };
    tracing::debug!(api_root = runner.client.api_root(), token_file = %runner.store.path().display(), "starting");

    match app.subcommand {
        AppSubcommand::Register {
            username,
            handle,
            email,
            password,
            confirm_password,
        } => runner.register(RegistrationForm {
            username,
            handle,
            email,
            password,
            confirm_password,
        }),
        AppSubcommand::Login { username, password } => {
            runner.login(LoginForm { username, password })
        }
        AppSubcommand::Logout => runner.logout(),
        AppSubcommand::Whoami => runner.whoami(),
        AppSubcommand::Accounts => runner.accounts(),
        AppSubcommand::Feed => runner.feed(),
        AppSubcommand::Profile { username } => runner.show_profile(&username),
        AppSubcommand::Post { text } => runner.post(&text),
        AppSubcommand::Edit { tweet_id, text } => runner.edit(tweet_id, &text),
        AppSubcommand::Delete { tweet_id } => runner.delete(tweet_id),
        AppSubcommand::Like { tweet_id } => runner.like(tweet_id),
        AppSubcommand::Tweets { query } => runner.tweets(query.as_deref()),
        AppSubcommand::Search { query } => runner.search(&query),
    }
}
