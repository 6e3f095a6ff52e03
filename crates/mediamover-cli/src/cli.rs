//! Command-line arguments.

use std::path::PathBuf;

use chrono::{NaiveTime, Weekday};
use clap::{Args, Parser, Subcommand};
use mediamover_core::MediaFilter;

/// Move photos and videos from internal storage to a removable volume.
#[derive(Debug, Parser)]
#[command(name = "mediamover", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show debug logs and list every failed file.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show internal and removable storage capacity.
    Storage,

    /// List photos and videos in the media library.
    Scan {
        #[command(flatten)]
        kinds: KindArgs,

        /// Save the scanned records as a selection for a later `move`.
        #[arg(long, value_name = "FILE")]
        save_selection: Option<PathBuf>,
    },

    /// Move media to the destination.
    Move {
        /// Destination root. Defaults to the configured destination.
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,

        #[command(flatten)]
        kinds: KindArgs,

        /// Move the records saved by `scan --save-selection` instead of scanning.
        #[arg(long, value_name = "FILE", conflicts_with_all = ["images", "videos"])]
        selection: Option<PathBuf>,
    },

    /// Run the scheduled automatic transfer once.
    Auto,

    /// Show or change the automatic transfer schedule.
    Schedule(ScheduleArgs),

    /// Remember a destination root for `move` and `auto`.
    SetDestination {
        /// Destination root, usually the mount point of a memory card.
        dir: PathBuf,
    },
}

/// Media kind selection. Neither flag means both kinds.
#[derive(Debug, Clone, Copy, Args)]
pub struct KindArgs {
    /// Include photos.
    #[arg(long)]
    pub images: bool,

    /// Include videos.
    #[arg(long)]
    pub videos: bool,
}

impl KindArgs {
    /// The filter these flags describe.
    pub const fn filter(self) -> MediaFilter {
        if !self.images && !self.videos {
            return MediaFilter::ALL;
        }
        MediaFilter {
            images: self.images,
            videos: self.videos,
        }
    }
}

/// Schedule changes. Without any flag the schedule is only shown.
#[derive(Debug, Clone, Args)]
pub struct ScheduleArgs {
    /// Turn automatic transfers on.
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    /// Turn automatic transfers off.
    #[arg(long)]
    pub disable: bool,

    /// Time of day, as HH:MM.
    #[arg(long, value_name = "HH:MM", value_parser = parse_time)]
    pub at: Option<NaiveTime>,

    /// Comma separated days, e.g. "mon,wed,fri".
    #[arg(long, value_name = "DAYS", value_delimiter = ',', value_parser = parse_weekday)]
    pub days: Option<Vec<Weekday>>,

    /// Only move photos.
    #[arg(long, conflicts_with = "videos_only")]
    pub images_only: bool,

    /// Only move videos.
    #[arg(long)]
    pub videos_only: bool,

    /// Move both photos and videos.
    #[arg(long, conflicts_with_all = ["images_only", "videos_only"])]
    pub all_kinds: bool,
}

impl ScheduleArgs {
    /// Whether any setting is being changed.
    pub const fn changes_anything(&self) -> bool {
        self.enable
            || self.disable
            || self.at.is_some()
            || self.days.is_some()
            || self.images_only
            || self.videos_only
            || self.all_kinds
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| format!("expected HH:MM ({e})"))
}

fn parse_weekday(value: &str) -> Result<Weekday, String> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| format!("unknown day '{value}'"))
}
