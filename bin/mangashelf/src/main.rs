mod about;
mod links;
mod routes;
mod settings;
mod update;
mod version;

use std::{env, net::Ipv4Addr, path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow, bail};
use axum::Router;
use clap::{ArgAction, Parser, Subcommand};
use directories::ProjectDirs;
use mangashelf_local_server::{LocalState, notifications::NotificationKind};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    about::{AboutSettings, UpdateEvent},
    links::{Link, LinkTargets, SystemUrlOpener},
    settings::SettingsStore,
    update::{AppUpdateRepository, GithubReleases},
};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_NAME: &str = "mangashelf";
const BIN_NAME: &str = "mangashelf";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding downloaded manga
    #[arg(long, global = true, env = "MANGASHELF_LIBRARY")]
    library_dir: Option<PathBuf>,

    /// Directory holding settings.json
    #[arg(long, global = true, env = "MANGASHELF_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// GitHub repository releases are fetched from, as owner/name
    #[arg(
        long,
        global = true,
        default_value = "KotatsuApp/Kotatsu",
        env = "MANGASHELF_UPDATE_REPO"
    )]
    update_repo: String,

    /// Disables update checks (for package-managed installs)
    #[arg(long, global = true, env = "MANGASHELF_NO_UPDATE_CHECK")]
    no_update_check: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the HTTP server (default)
    Serve {
        #[arg(long, default_value = "127.0.0.1", env = "MANGASHELF_HOST")]
        host: Ipv4Addr,

        #[arg(long, default_value_t = 4570, env = "MANGASHELF_PORT")]
        port: u16,
    },
    /// Deletes downloaded chapters of a manga
    RemoveChapters {
        manga_id: i64,
        chapter_ids: Vec<i64>,
    },
    /// Shows version and update settings
    About,
    /// Follows or leaves the unstable update channel
    SetUnstable {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Checks GitHub for a newer release
    CheckUpdate,
    /// Downloads the newest release and replaces this binary
    Update,
    /// Opens one of the project links in the browser
    Open {
        #[arg(value_enum)]
        link: Link,
    },
}

struct Dirs {
    library: PathBuf,
    config: PathBuf,
}

fn resolve_dirs(cli: &Cli) -> anyhow::Result<Dirs> {
    let proj_dirs = ProjectDirs::from("", "", APP_NAME);
    let library = match (&cli.library_dir, &proj_dirs) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dirs)) => dirs.data_dir().join("library"),
        (None, None) => bail!("Could not determine home directory, pass --library-dir"),
    };
    let config = match (&cli.config_dir, &proj_dirs) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dirs)) => dirs.config_dir().to_path_buf(),
        (None, None) => bail!("Could not determine home directory, pass --config-dir"),
    };
    Ok(Dirs { library, config })
}

fn is_flatpak() -> bool {
    env::var("FLATPAK_ID").is_ok()
}

fn github_releases(update_repo: &str) -> anyhow::Result<GithubReleases> {
    let (owner, repo) = update_repo
        .split_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| anyhow!("Invalid update repository {update_repo:?}, expected owner/name"))?;
    Ok(GithubReleases::new(owner, repo))
}

fn build_about(cli: &Cli, dirs: &Dirs) -> anyhow::Result<Arc<AboutSettings>> {
    let settings = Arc::new(SettingsStore::load(dirs.config.join("settings.json")));
    let releases = Arc::new(github_releases(&cli.update_repo)?);
    let updates = AppUpdateRepository::new(releases, settings.clone(), APP_VERSION);

    Ok(Arc::new(AboutSettings::new(
        APP_VERSION,
        !cli.no_update_check && !is_flatpak(),
        settings,
        updates,
        Arc::new(SystemUrlOpener),
        LinkTargets::default(),
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let rust_log = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let env_filter = match rust_log.is_empty() {
        true => EnvFilter::builder().parse_lossy("info"),
        false => EnvFilter::builder().parse_lossy(rust_log),
    };
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let dirs = resolve_dirs(&cli)?;
    let about = build_about(&cli, &dirs)?;

    match cli.command {
        None => run_server(&dirs, about, Ipv4Addr::LOCALHOST, 4570).await,
        Some(Command::Serve { host, port }) => run_server(&dirs, about, host, port).await,
        Some(Command::RemoveChapters {
            manga_id,
            chapter_ids,
        }) => remove_chapters(&dirs, manga_id, chapter_ids).await,
        Some(Command::About) => {
            println!("{}", serde_json::to_string_pretty(&about.screen())?);
            Ok(())
        }
        Some(Command::SetUnstable { enabled }) => about.set_unstable(enabled),
        Some(Command::CheckUpdate) => {
            match about.check_for_updates().await? {
                UpdateEvent::Available { version } => {
                    println!("Update available: {} ({})", version.version, version.name);
                    println!("Run `{BIN_NAME} update` to install it.");
                }
                UpdateEvent::UpToDate { message } => println!("{message}"),
            }
            Ok(())
        }
        Some(Command::Update) => {
            let version = github_releases(&cli.update_repo)?
                .perform_update(BIN_NAME, APP_VERSION)
                .await?;
            println!("Updated to {version}. Restart to use the new version.");
            Ok(())
        }
        Some(Command::Open { link }) => {
            if !about.open_link(link) {
                bail!("Could not open {}", link.title());
            }
            Ok(())
        }
    }
}

async fn run_server(
    dirs: &Dirs,
    about: Arc<AboutSettings>,
    host: Ipv4Addr,
    port: u16,
) -> anyhow::Result<()> {
    info!("🚀 Initializing {APP_NAME} {APP_VERSION}...");
    info!("📂 Library Directory: {}", dirs.library.display());

    let local = LocalState::new(dirs.library.clone());
    let app = Router::new()
        .nest("/api/local", mangashelf_local_server::router(local))
        .nest("/api/system", routes::about_router(about))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    info!("🌍 Listening on http://{host}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for shutdown signal: {err}");
            }
            info!("🛑 Received Ctrl+C, shutting down server...");
        })
        .await
        .context("Server crashed")
}

async fn remove_chapters(dirs: &Dirs, manga_id: i64, chapter_ids: Vec<i64>) -> anyhow::Result<()> {
    let state = LocalState::new(dirs.library.clone());
    let local = state
        .repository
        .find_local(manga_id)
        .await?
        .ok_or_else(|| anyhow!("Manga {manga_id} is not stored locally"))?;

    let Some(job) = state.remover.start(local.manga, chapter_ids) else {
        info!("No chapters selected, nothing to remove");
        return Ok(());
    };
    job.await.context("Removal task panicked")?;

    if let Some(failure) = state
        .notifications
        .active()
        .into_iter()
        .find(|n| n.kind == NotificationKind::Error)
    {
        bail!("{}", failure.text.unwrap_or(failure.title));
    }
    println!("Chapters removed");
    Ok(())
}
