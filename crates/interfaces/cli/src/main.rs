mod day_cmds;
mod week_cmds;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use snippets_config::{AppConfig, StorageBackend};
use snippets_core::{Day, Identity, SnippetKey};
use snippets_remote::{
    BlobStore, DocumentStore, FsBlobStore, FsDocumentStore, MemoryBlobStore, MemoryDocumentStore, RemoteAccessor,
};
use snippets_sync::{FragmentBuilder, FragmentClock, FragmentLog, ImageResolver, Lookup, SnippetRepository};

const DEFAULT_CONFIG: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(name = "snippets", version, about = "Weekly snippets and daily fragments")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a configuration file for `--user`.
    Init {
        #[arg(long)]
        user: String,
        #[arg(long)]
        storage_root: Option<String>,
    },
    /// Read or write one week's snippet.
    Week {
        #[command(subcommand)]
        command: WeekCommands,
    },
    /// Every snippet of a year, newest week first.
    History {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Inspect or extend a day's fragments.
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },
}

/// Defaults to the current ISO week.
#[derive(Debug, Args)]
struct WeekArgs {
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    week: Option<u32>,
}

impl WeekArgs {
    fn key(&self) -> Result<SnippetKey> {
        let current = SnippetKey::containing(Day::today().date());
        match (self.year, self.week) {
            (None, None) => Ok(current),
            (year, Some(week)) => Ok(SnippetKey::new(year.unwrap_or(current.year()), week)?),
            (Some(_), None) => bail!("--year needs --week"),
        }
    }
}

#[derive(Debug, Subcommand)]
enum WeekCommands {
    Show {
        #[command(flatten)]
        at: WeekArgs,
    },
    /// Replace the week's content, going through the debounced editor.
    Set {
        content: String,
        #[command(flatten)]
        at: WeekArgs,
    },
    /// Empty the week (deletes the stored document).
    Clear {
        #[command(flatten)]
        at: WeekArgs,
    },
}

#[derive(Debug, Args)]
struct DayArgs {
    /// `YYYY-MM-DD`; defaults to today.
    #[arg(long)]
    date: Option<Day>,
}

impl DayArgs {
    fn day(&self) -> Day {
        self.date.unwrap_or_else(Day::today)
    }
}

#[derive(Debug, Subcommand)]
enum DayCommands {
    List {
        #[command(flatten)]
        at: DayArgs,
    },
    AddText {
        text: String,
        #[command(flatten)]
        at: DayArgs,
    },
    AddImage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        at: DayArgs,
    },
    AddLocation {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[command(flatten)]
        at: DayArgs,
    },
    Remove {
        #[arg(value_name = "ID")]
        id: String,
        #[command(flatten)]
        at: DayArgs,
    },
}

/// Unwrap a cache lookup, turning failures into errors.
pub(crate) fn ready<V>(lookup: Lookup<V>, what: &str) -> Result<V> {
    match lookup {
        Lookup::Ready(value) => Ok(value),
        Lookup::Failed(err) => bail!("could not load {what}: {err}"),
        Lookup::Unresolved | Lookup::Pending => bail!("{what} is not available yet"),
    }
}

/// Record `user` (validated and trimmed) as the configured principal.
fn sign_in(config: &mut AppConfig, user: &str, storage_root: Option<String>) -> Result<()> {
    let identity = Identity::new(user)?;
    config.identity.user = identity.as_str().to_string();
    if let Some(root) = storage_root {
        config.storage.root = root;
    }
    Ok(())
}

fn connect(config: &AppConfig) -> Result<RemoteAccessor> {
    if config.needs_sign_in() {
        bail!("no user configured: run `snippets init --user <name>` or set SNIPPETS_USER");
    }
    let identity = Identity::new(config.identity.user.as_str())?;

    let (documents, blobs): (Arc<dyn DocumentStore>, Arc<dyn BlobStore>) = match config.storage.backend {
        StorageBackend::Fs => (
            Arc::new(FsDocumentStore::new(&config.storage.root)),
            Arc::new(FsBlobStore::new(&config.storage.root)),
        ),
        StorageBackend::Memory => {
            warn!("memory backend selected; nothing outlives this process");
            (Arc::new(MemoryDocumentStore::new()), Arc::new(MemoryBlobStore::new()))
        }
    };
    Ok(RemoteAccessor::new(identity, documents, blobs))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = AppConfig::load_from(&cli.config)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { user, storage_root } => {
            sign_in(&mut config, &user, storage_root)?;
            config.save_to(&cli.config)?;
            println!("wrote {}", cli.config.display());
        }
        Commands::Week { command } => {
            let repo = SnippetRepository::new(connect(&config)?);
            match command {
                WeekCommands::Show { at } => week_cmds::show(&repo, at.key()?).await?,
                WeekCommands::Set { content, at } => {
                    week_cmds::set(&repo, at.key()?, content, config.sync.debounce()).await?
                }
                WeekCommands::Clear { at } => {
                    week_cmds::set(&repo, at.key()?, String::new(), config.sync.debounce()).await?
                }
            }
        }
        Commands::History { year } => {
            let repo = SnippetRepository::new(connect(&config)?);
            let year = year.unwrap_or_else(|| SnippetKey::containing(Day::today().date()).year());
            week_cmds::history(&repo, year).await?;
        }
        Commands::Day { command } => {
            let remote = connect(&config)?;
            let log = FragmentLog::new(remote.clone());
            let builder = FragmentBuilder::new(
                remote.clone(),
                Arc::new(FragmentClock::new()),
                config.sync.geohash_precision,
            );
            match command {
                DayCommands::List { at } => day_cmds::list(&log, &ImageResolver::new(remote), at.day()).await?,
                DayCommands::AddText { text, at } => {
                    day_cmds::append(&log, at.day(), builder.text(text)).await?
                }
                DayCommands::AddImage { file, at } => day_cmds::add_image(&log, &builder, at.day(), &file).await?,
                DayCommands::AddLocation { lat, lon, at } => {
                    day_cmds::add_location(&log, &builder, at.day(), lat, lon).await?
                }
                DayCommands::Remove { id, at } => day_cmds::remove(&log, at.day(), &id).await?,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_stores_the_trimmed_principal() {
        let mut config = AppConfig::default();
        sign_in(&mut config, "  alice \n", Some("/tmp/snippets".to_string())).unwrap();
        assert_eq!(config.identity.user, "alice");
        assert_eq!(config.storage.root, "/tmp/snippets");
        assert!(!config.needs_sign_in());
    }

    #[test]
    fn sign_in_rejects_unusable_principals() {
        let mut config = AppConfig::default();
        assert!(sign_in(&mut config, "   ", None).is_err());
        assert!(sign_in(&mut config, "a/b", None).is_err());
        assert!(config.needs_sign_in());
    }

    #[test]
    fn week_args_default_to_the_current_week() {
        let current = SnippetKey::containing(Day::today().date());
        let at = WeekArgs { year: None, week: None };
        assert_eq!(at.key().unwrap(), current);
        let at = WeekArgs { year: Some(2020), week: None };
        assert!(at.key().is_err());
    }
}
