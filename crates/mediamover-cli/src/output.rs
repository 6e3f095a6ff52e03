//! Output renderers and formatting helpers for CLI commands.
//!
//! Results go to stdout. The live progress line goes to stderr so it never
//! ends up in redirected output.

use std::io::Write;

use chrono::NaiveDateTime;
use mediamover_core::{ProgressEvent, RecordOutcome, ScheduleConfig, StorageInfo, TransferRecord, TransferSummary};

pub(crate) fn render_storage(info: &StorageInfo) -> String {
    format!(
        "{}: {} used of {} ({}%), {} free\n  {}",
        info.label,
        format_bytes(info.used_bytes),
        format_bytes(info.total_bytes),
        info.percent_used,
        format_bytes(info.free_bytes),
        info.root.display()
    )
}

pub(crate) fn render_records(records: &[TransferRecord]) -> String {
    let mut out = format!("{:<6} {:>11} PATH\n", "KIND", "SIZE");
    for record in records {
        out.push_str(&format!(
            "{:<6} {:>11} {}{}\n",
            record.kind.to_string(),
            format_bytes(record.size_bytes),
            record.relative_path.as_deref().unwrap_or(""),
            record.display_name
        ));
    }
    let total: u64 = records.iter().map(|r| r.size_bytes).sum();
    out.push_str(&format!("{} files, {}", records.len(), format_bytes(total)));
    out
}

pub(crate) fn progress_line(event: &ProgressEvent) -> String {
    let marker = match event.outcome {
        RecordOutcome::Moved => "moved",
        RecordOutcome::Failed => "FAILED",
    };
    format!(
        "[{}/{}] {} {}",
        event.processed, event.total, marker, event.display_name
    )
}

/// Overwrite the current stderr line with the progress of `event`.
pub(crate) fn print_progress(event: &ProgressEvent) {
    let mut stderr = std::io::stderr().lock();
    let _ = write!(stderr, "\r\x1b[2K{}", progress_line(event));
    if event.processed == event.total {
        let _ = writeln!(stderr);
    }
    let _ = stderr.flush();
}

pub(crate) fn render_summary(summary: &TransferSummary, verbose: bool) -> String {
    let mut out = format!(
        "Moved {} files ({}), {} failed in {:.1}s",
        summary.moved_count,
        format_bytes(summary.total_moved_bytes),
        summary.failed_count,
        summary.duration_secs
    );
    if summary.was_cancelled {
        out.push_str("\nCancelled before all files were processed");
    }
    if verbose {
        for failure in &summary.failures {
            out.push_str(&format!(
                "\n  {} ({}, after {}): {}",
                failure.display_name, failure.kind, failure.stage, failure.error
            ));
        }
    } else if !summary.failures.is_empty() {
        out.push_str("\nRun with --verbose to list the failed files");
    }
    out
}

pub(crate) fn render_schedule(schedule: &ScheduleConfig, next_run: Option<NaiveDateTime>) -> String {
    let kinds = match (schedule.include_images, schedule.include_videos) {
        (true, true) => "photos and videos",
        (true, false) => "photos",
        (false, true) => "videos",
        (false, false) => "nothing",
    };
    let mut out = format!(
        "Automatic transfer: {}\n  at {:02}:{:02}, {}\n  moves {}",
        if schedule.enabled { "on" } else { "off" },
        schedule.hour,
        schedule.minute,
        schedule.days_label(),
        kinds
    );
    if schedule.enabled
        && let Some(next) = next_run
    {
        out.push_str(&format!("\n  next run {}", next.format("%a %Y-%m-%d %H:%M")));
    }
    out
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
