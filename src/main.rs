use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use storysync::cache::{
  ActivityCache, CacheContext, FormCache, ProjectCache, ProjectContextCache, ResponseCache,
};
use storysync::config::Config;
use storysync::notify::ChangeBus;
use storysync::remote::{ActivityResponseOps, HttpRemote};
use storysync::storage::{KvStore, SqliteStore};
use storysync::sync::{InflightRegistry, SliderQuestionSync, StoryQuestionSync};

#[derive(Parser, Debug)]
#[command(name = "storysync")]
#[command(about = "Inspect and exercise the story collection cache and sync layer")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storysync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List keys in the persistent local store
  Keys {
    /// Only keys starting with this prefix
    #[arg(long)]
    prefix: Option<String>,
  },
  /// Clear every cached entry for a project
  Clear {
    #[arg(long)]
    project: String,
  },
  /// Fetch one activity response from the remote store
  Fetch {
    #[arg(long)]
    project: String,
    #[arg(long)]
    phase: String,
    #[arg(long)]
    step: String,
    #[arg(long)]
    activity: String,
    /// Return only this field of the stored record
    #[arg(long)]
    key: Option<String>,
    /// Bypass the cache
    #[arg(long)]
    force: bool,
  },
  /// Run a sync read of a project's slider questions
  Sliders {
    #[arg(long)]
    project: String,
  },
  /// Run a sync read of a project's story question
  Story {
    #[arg(long)]
    project: String,
  },
}

fn init_tracing(data_dir: &std::path::Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
  std::fs::create_dir_all(data_dir)?;
  let file = tracing_appender::rolling::never(data_dir, "storysync.log");
  let (writer, guard) = tracing_appender::non_blocking(file);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let data_dir = match &config.cache.data_dir {
    Some(dir) => dir.clone(),
    None => SqliteStore::default_dir()?,
  };
  let _log_guard = init_tracing(&data_dir)?;

  let ctx = match &config.cache.data_dir {
    Some(dir) => CacheContext::open_at(dir),
    None => CacheContext::open(),
  };

  match args.command {
    Command::Keys { prefix } => {
      let store = SqliteStore::open_local_at(&data_dir.join("local.db"))?;
      let mut keys = store.keys();
      keys.sort();
      for key in keys {
        if prefix.as_deref().map_or(true, |p| key.starts_with(p)) {
          println!("{key}");
        }
      }
    }
    Command::Clear { project } => {
      FormCache::new(Arc::clone(&ctx)).clear_project(&project);
      ProjectCache::new(Arc::clone(&ctx)).clear_project(&project);
      ActivityCache::new(Arc::clone(&ctx)).clear_project(&project);
      ProjectContextCache::new(Arc::clone(&ctx)).clear_project(&project);
      ResponseCache::new(Arc::clone(&ctx)).clear_project(&project);
      storysync::sync::clear_local(&ctx, &project);
      println!("cleared cached entries for {project}");
    }
    Command::Fetch {
      project,
      phase,
      step,
      activity,
      key,
      force,
    } => {
      let remote = Arc::new(HttpRemote::new(&config.remote, Config::get_access_token())?);
      let ops = ActivityResponseOps::new(ctx, remote, ChangeBus::new());
      let value = ops
        .fetch(
          &project,
          &phase,
          &step,
          &activity,
          serde_json::Value::Null,
          key.as_deref(),
          force,
        )
        .await;
      println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Command::Sliders { project } => {
      let remote = Arc::new(HttpRemote::new(&config.remote, Config::get_access_token())?);
      let sync = SliderQuestionSync::new(ctx, remote, Arc::new(InflightRegistry::new()));
      let questions = sync.load(&project).await;
      println!("{}", serde_json::to_string_pretty(&questions)?);
    }
    Command::Story { project } => {
      let remote = Arc::new(HttpRemote::new(&config.remote, Config::get_access_token())?);
      let sync = StoryQuestionSync::new(ctx, remote, Arc::new(InflightRegistry::new()));
      let question = sync.load(&project).await;
      println!("{question}");
    }
  }

  Ok(())
}
