use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use arcdex_core::config::{resolve_with_base, Config, Settings};
use arcdex_core::traits::{ArchiveSource, SettingsStore};
use arcdex_core::types::SearchOutcome;
use arcdex_core::{DirectoryArchive, Error, IndexStore};
use arcdex_session::{IndexingEvent, IndexingSession, SearchController};
use arcdex_text::{TantivyIndexerEngine, TantivyQueryEngine};

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <index [archive_dir]|search <query>|status>", prog);
        process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let cwd = env::current_dir()?;
    let mut settings = config.settings(&cwd)?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "index" => {
            if let Some(dir) = args.first() {
                settings.archive.active_path = Some(resolve_with_base(&cwd, dir));
            }
            index(settings).await
        }
        "search" => {
            let query = args.join(" ");
            search(settings, &query)
        }
        "status" => status(&settings),
        _ => {
            eprintln!("Unknown command: {}", cmd);
            process::exit(1);
        }
    }
}

async fn index(settings: Settings) -> anyhow::Result<()> {
    let archives = Arc::new(DirectoryArchive::new());
    let engine = TantivyIndexerEngine::new(archives.clone()).with_writer_memory(settings.indexing.writer_memory_bytes);
    let session = IndexingSession::new(engine, archives, Arc::new(settings));

    let mut run = match session.start() {
        Ok(run) => run,
        Err(Error::NoActiveArchive) => {
            eprintln!("No active archive. Pass a directory or set archive.active_path.");
            process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let pb = ProgressBar::new(100);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?.progress_chars("#>-"));
    loop {
        tokio::select! {
            event = run.next_event() => match event {
                Some(IndexingEvent::StartedIndexing) => pb.set_message("indexing"),
                Some(IndexingEvent::Progress(p)) => pb.set_position(u64::from(p)),
                Some(IndexingEvent::Finished { index_path, .. }) => {
                    pb.finish_with_message("done");
                    println!("Index published at {}", index_path.display());
                    break;
                }
                Some(IndexingEvent::Cancelled) => {
                    pb.abandon_with_message("cancelled");
                    break;
                }
                Some(IndexingEvent::Error { reason }) => {
                    pb.abandon_with_message("failed");
                    anyhow::bail!("indexing failed: {}", reason);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                if session.cancel().is_ok() {
                    pb.set_message("cancelling after current unit");
                }
            }
        }
    }
    Ok(())
}

fn search(settings: Settings, query: &str) -> anyhow::Result<()> {
    let archives = Arc::new(DirectoryArchive::new());
    let controller = SearchController::new(TantivyQueryEngine::new(), archives, Arc::new(settings));
    match controller.search(query) {
        Ok(SearchOutcome::Results { best, all }) => {
            println!("Best match: {} ({})", best.title, best.archive_uri());
            for (i, hit) in all.iter().enumerate() {
                println!("{:>2}. score={:.4}  {}  {}", i + 1, hit.score, hit.title, hit.document_url);
            }
        }
        Ok(SearchOutcome::NoResults) => println!("No results for \"{}\"", query.trim()),
        Err(e @ (Error::EmptyQuery | Error::NoActiveArchive | Error::IndexNotFound(_))) => {
            eprintln!("{}", e);
            process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn status(settings: &Settings) -> anyhow::Result<()> {
    println!("Index root : {}", settings.root_path().display());
    let Some(archive) = settings.active_archive_path() else {
        println!("Archive    : (none)");
        return Ok(());
    };
    let identity = DirectoryArchive::new().resolve_identity(&archive)?;
    let store = IndexStore::new(settings.root_path());
    let final_path: PathBuf = store.final_path(&identity);
    println!("Archive    : {}", archive.display());
    println!("Identity   : {}", identity);
    println!("Index      : {} ({})", final_path.display(), if store.exists(&identity) { "ready" } else { "missing" });
    Ok(())
}
