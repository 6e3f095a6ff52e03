//! Command handlers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::{Datelike, Local, Timelike};
use mediamover_core::{
    AutoRunOutcome, AutoTransferJob, CapacityReporter, ConfigManager, ErrorKind, LocalDirectory,
    LocalMediaLibrary, MediaCatalog, MediaFilter, SelectionCache, SysinfoCapacitySource,
    ScheduleConfig, TransferEvent, TransferOptions, TransferRecord, TransferRunner, TransferSummary,
};
use tracing::{debug, info, warn};

use crate::cli::{Cli, Command, KindArgs, ScheduleArgs};
use crate::error::{CliError, CliResult};
use crate::output;

/// Run the parsed command line.
pub async fn run(cli: Cli) -> CliResult<()> {
    let mut manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };
    debug!("Using configuration at {}", manager.path().display());

    match cli.command {
        Command::Storage => storage(&manager),
        Command::Scan {
            kinds,
            save_selection,
        } => scan(&manager, kinds, save_selection.as_deref()),
        Command::Move {
            dest,
            kinds,
            selection,
        } => {
            move_media(
                &manager,
                dest,
                kinds.filter(),
                selection.as_deref(),
                cli.verbose,
                Arc::new(AtomicBool::new(false)),
            )
            .await
        }
        Command::Auto => auto(&manager, cli.verbose).await,
        Command::Schedule(args) => schedule(&mut manager, &args),
        Command::SetDestination { dir } => {
            manager.set_destination_root(dir.clone())?;
            println!("Destination set to {}", dir.display());
            Ok(())
        }
    }
}

fn storage(manager: &ConfigManager) -> CliResult<()> {
    let reporter = CapacityReporter::new(SysinfoCapacitySource::new());
    let internal = reporter.internal(&manager.config().media_root)?;
    println!("{}", output::render_storage(&internal));
    match reporter.removable() {
        Some(removable) => println!("{}", output::render_storage(&removable)),
        None => println!("No removable storage detected"),
    }
    Ok(())
}

fn scan(manager: &ConfigManager, kinds: KindArgs, save_selection: Option<&Path>) -> CliResult<()> {
    let library = LocalMediaLibrary::new(&manager.config().media_root)?;
    let records = library.query(kinds.filter())?;
    println!("{}", output::render_records(&records));

    if let Some(path) = save_selection {
        SelectionCache::new(path).save(&records)?;
        println!("Selection saved to {}", path.display());
    }
    Ok(())
}

async fn move_media(
    manager: &ConfigManager,
    dest: Option<PathBuf>,
    filter: MediaFilter,
    selection: Option<&Path>,
    verbose: bool,
    cancelled: Arc<AtomicBool>,
) -> CliResult<()> {
    let config = manager.config();
    let dest = dest
        .or_else(|| config.destination_root.clone())
        .ok_or(CliError::NoDestination)?;
    let library = LocalMediaLibrary::new(&config.media_root)?;

    let cache = selection.map(SelectionCache::new);
    let records = match &cache {
        Some(cache) => cache
            .load()?
            .ok_or_else(|| CliError::NoSelection(cache.path().to_path_buf()))?,
        None => library.query(filter)?,
    };
    if records.is_empty() {
        println!("Nothing to move");
        return Ok(());
    }

    let destination = LocalDirectory::open(&dest)?;
    let total = records.len();
    let summary = run_batch(
        records.clone(),
        library,
        destination,
        config.transfer.clone(),
        cancelled,
    )
    .await?;

    if let Some(cache) = &cache {
        settle_selection(cache, &records, &summary)?;
    }
    finish(&summary, total, verbose)
}

/// Clear the selection once everything moved, otherwise shrink it to what is left.
fn settle_selection(
    cache: &SelectionCache,
    records: &[TransferRecord],
    summary: &TransferSummary,
) -> CliResult<()> {
    let remaining = unmoved_records(records, summary);
    if remaining.is_empty() {
        cache.clear()?;
    } else {
        info!(
            "Keeping {} unmoved records in {}",
            remaining.len(),
            cache.path().display()
        );
        cache.save(&remaining)?;
    }
    Ok(())
}

/// Records still sitting in the library after a batch: the ones that failed
/// before being copied and the ones a cancellation never reached.
fn unmoved_records(records: &[TransferRecord], summary: &TransferSummary) -> Vec<TransferRecord> {
    let processed = summary.processed_count().min(records.len());
    // A failed delete leaves a finished copy behind; retrying would duplicate it.
    let retry: HashSet<u64> = summary
        .failures
        .iter()
        .filter(|failure| failure.kind != ErrorKind::SourceDeleteFailed)
        .map(|failure| failure.record_id)
        .collect();

    records[..processed]
        .iter()
        .filter(|record| retry.contains(&record.id))
        .chain(&records[processed..])
        .cloned()
        .collect()
}

/// Run a batch in the background, rendering progress and stopping on Ctrl-C.
async fn run_batch(
    records: Vec<TransferRecord>,
    library: LocalMediaLibrary,
    destination: LocalDirectory,
    options: TransferOptions,
    cancelled: Arc<AtomicBool>,
) -> CliResult<TransferSummary> {
    let runner = TransferRunner::with_cancellation(options, cancelled)?;
    let mut handle = runner.start(records, Arc::new(library), Box::new(destination))?;

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(TransferEvent::Progress(progress)) => output::print_progress(&progress),
                Some(TransferEvent::Finished(_)) | None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if let Err(e) = signal {
                    warn!("Could not listen for Ctrl-C: {}", e);
                } else {
                    eprintln!("\nStopping after the current file...");
                }
                interrupted = true;
                handle.cancel();
            }
        }
    }

    Ok(handle.wait().await?)
}

/// Print the summary and turn an unfinished batch of `total` records into an error.
fn finish(summary: &TransferSummary, total: usize, verbose: bool) -> CliResult<()> {
    println!("{}", output::render_summary(summary, verbose));
    if summary.was_cancelled {
        Err(CliError::Cancelled {
            moved: summary.moved_count,
            total,
        })
    } else if summary.failed_count > 0 {
        Err(CliError::Incomplete {
            failed: summary.failed_count,
            total,
        })
    } else {
        Ok(())
    }
}

async fn auto(manager: &ConfigManager, verbose: bool) -> CliResult<()> {
    let config = manager.config().clone();
    let job = AutoTransferJob::from_config(&config);
    let today = Local::now().weekday();

    let outcome = tokio::task::spawn_blocking(move || {
        let library = LocalMediaLibrary::new(&config.media_root)?;
        job.run(today, &library, &library, |event| {
            info!("Auto-move progress: {}", output::progress_line(event));
        })
    })
    .await
    .map_err(|e| mediamover_core::Error::TaskFailed(e.to_string()))??;

    if let Some(line) = outcome.report_line() {
        println!("{line}");
    }
    match outcome {
        AutoRunOutcome::Disabled => println!("Automatic transfer is off"),
        AutoRunOutcome::NoDestination => return Err(CliError::NoDestination),
        AutoRunOutcome::NotScheduledToday { weekday } => {
            println!("Not scheduled on {weekday}");
        }
        AutoRunOutcome::NothingToMove => println!("Nothing to move"),
        AutoRunOutcome::DestinationUnavailable { .. } => {}
        AutoRunOutcome::Completed(summary) => {
            let total = summary.processed_count();
            return finish(&summary, total, verbose);
        }
    }
    Ok(())
}

fn schedule(manager: &mut ConfigManager, args: &ScheduleArgs) -> CliResult<()> {
    if args.changes_anything() {
        let mut config = manager.config().clone();
        apply_schedule_changes(&mut config.schedule, args);
        manager.update(config)?;
        info!("Schedule updated");
    }

    let schedule = &manager.config().schedule;
    let next = schedule.next_run_after(Local::now().naive_local());
    println!("{}", output::render_schedule(schedule, next));
    Ok(())
}

fn apply_schedule_changes(schedule: &mut ScheduleConfig, args: &ScheduleArgs) {
    if args.enable {
        schedule.enabled = true;
    }
    if args.disable {
        schedule.enabled = false;
    }
    if let Some(at) = args.at {
        schedule.hour = at.hour();
        schedule.minute = at.minute();
    }
    if let Some(days) = &args.days {
        schedule.days.clone_from(days);
    }
    if args.images_only {
        schedule.include_images = true;
        schedule.include_videos = false;
    }
    if args.videos_only {
        schedule.include_images = false;
        schedule.include_videos = true;
    }
    if args.all_kinds {
        schedule.include_images = true;
        schedule.include_videos = true;
    }
}
