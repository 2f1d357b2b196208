use anyhow::Result;
use clap::{Parser, Subcommand};
use journal::config;
use journal::db::{Db, NowRepo, PageRepo, PostRepo, UserRepo};
use journal::service::{NowService, PageService, PostService, UserService};
use journal::{error_code, error_message};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Database file, overrides `app.data_file`
    #[arg(long)]
    file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open the database and apply pending migrations
    Migrate,
    /// List all posts
    Posts,
    /// Show one post by permalink
    Post { permalink: String },
    /// Show a page by name
    Page { name: String },
    /// Show the latest "now" entry
    Now,
    /// List all users
    Users,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = config::load(Some(&args.config))?;
    if let Some(file) = args.file {
        cfg.app.data_file = file;
    }

    let mut db = Db::new(cfg.app.data_file.clone());
    db.open().await?;

    let res = run(&db, args.command).await;
    db.close().await;

    if let Err(err) = &res {
        let code = error_code(err);
        error!(
            %code,
            status = code.http_status(),
            message = %error_message(err),
            ?err,
            "command failed"
        );
    }
    res
}

async fn run(db: &Db, command: Command) -> Result<()> {
    match command {
        Command::Migrate => {
            info!(dsn = db.dsn(), "schema up to date");
            Ok(())
        }
        Command::Posts => print(&PostRepo::new(db.clone()).find_posts().await?),
        Command::Post { permalink } => print(
            &PostRepo::new(db.clone())
                .find_post_by_permalink(&permalink)
                .await?,
        ),
        Command::Page { name } => print(&PageRepo::new(db.clone()).find_page_by_name(&name).await?),
        Command::Now => print(&NowRepo::new(db.clone()).find_latest_now().await?),
        Command::Users => print(&UserRepo::new(db.clone()).find_users().await?),
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
