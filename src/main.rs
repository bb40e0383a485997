mod cache;
mod config;
mod logging;
mod retry;
mod site;
mod store;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use cache::{CacheResult, CacheSource};

use site::types::{Image, NewImage};
use site::{Collection, SiteClient};

#[derive(Parser, Debug)]
#[command(name = "outreach")]
#[command(about = "Data tools for the community-services website and its admin area")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/outreach/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage the image library
  Images {
    #[command(subcommand)]
    action: ImageAction,
  },
  /// Read articles
  Articles {
    #[command(subcommand)]
    action: ArticleAction,
  },
  /// Manage contact form submissions
  Submissions {
    #[command(subcommand)]
    action: SubmissionAction,
  },
  /// Sign an email address up for the newsletter
  Subscribe { email: String },
  /// Check that a user has the admin role
  RequireAdmin { user_id: String },
  /// Inspect or clear cached collections
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum ImageAction {
  List,
  Add {
    /// Durable URL returned by the upload service
    #[arg(long)]
    url: String,
    #[arg(long)]
    name: String,
  },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ArticleAction {
  List {
    /// Only published articles
    #[arg(long)]
    published: bool,
  },
  Show { slug: String },
}

#[derive(Subcommand, Debug)]
enum SubmissionAction {
  List,
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Print a cached collection if it is still fresh
  Show { key: String },
  /// Drop a cached collection
  Clear { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let site = SiteClient::new(&config)?;
  run(&site, args.command).await
}

async fn run(site: &SiteClient, command: Command) -> Result<()> {
  match command {
    Command::Images { action } => match action {
      ImageAction::List => print_list(site.list_images().await?),
      ImageAction::Add { url, name } => print_json(&site.add_image(&NewImage { url, name }).await?),
      ImageAction::Delete { id } => {
        site.delete_image(&id).await?;
        print_json(&serde_json::json!({ "deleted": id, "table": Image::TABLE }))
      }
    },
    Command::Articles { action } => match action {
      ArticleAction::List { published } => print_json(&site.list_articles(published).await?),
      ArticleAction::Show { slug } => print_json(&site.get_article(&slug).await?),
    },
    Command::Submissions { action } => match action {
      SubmissionAction::List => print_list(site.list_submissions().await?),
      SubmissionAction::Delete { id } => {
        site.delete_submission(&id).await?;
        print_json(&serde_json::json!({ "deleted": id }))
      }
    },
    Command::Subscribe { email } => {
      let outcome = site.subscribe_newsletter(&email).await?;
      print_json(&serde_json::json!({ "email": email, "status": outcome }))
    }
    Command::RequireAdmin { user_id } => print_json(&site.require_admin(&user_id).await?),
    Command::Cache { action } => match action {
      CacheAction::Show { key } => {
        let cached = site.cache().local().read::<serde_json::Value>(&key);
        print_json(&cached)
      }
      CacheAction::Clear { key } => {
        site.cache().local().remove(&key);
        print_json(&serde_json::json!({ "cleared": key }))
      }
    },
  }
}

fn print_list<T: Serialize>(result: CacheResult<Vec<T>>) -> Result<()> {
  if result.source == CacheSource::Cache {
    info!(records = result.data.len(), "Served from local cache");
  }
  print_json(&result.data)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
