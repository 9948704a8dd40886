/// CLI argument definitions using Clap
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use crate::audio::DeviceKind;
use crate::sound_store::{Scope, DEFAULT_SUB_EVENT};

/// soundctl - manage Windows system sounds, sound profiles and audio endpoints
#[derive(Parser, Debug)]
#[command(name = "soundctl")]
#[command(version)]
#[command(about = "Manage Windows system sounds, sound profiles and audio endpoints")]
pub struct Cli {
    /// Logging verbosity
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Also append log lines to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Directory holding saved profiles
    #[arg(long, value_name = "DIR", global = true)]
    pub profiles_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List system sound events and their files
    List {
        /// Only show categories matching this regex (case-insensitive)
        #[arg(short = 'f', long, value_name = "CATEGORY_REGEX")]
        filter: Option<String>,
        /// Include events without a sound file
        #[arg(short = 's', long)]
        show_unset: bool,
        /// Registry hive to read from
        #[arg(long, value_name = "SCOPE", default_value = "user")]
        scope: ScopeArg,
    },
    /// Play an event's sound or a WAV file
    Play(PlayArgs),
    /// Set the sound file for an event ("" unsets it)
    Set {
        /// Event category, e.g. SystemNotification
        #[arg(value_name = "EVENT_CATEGORY")]
        category: String,
        /// Full path to a .wav file
        #[arg(value_name = "WAV_FILE_PATH")]
        path: String,
        #[arg(long, value_name = "NAME", default_value = DEFAULT_SUB_EVENT)]
        sub_event: String,
    },
    /// Show the sound file bound to an event
    Get {
        #[arg(value_name = "EVENT_CATEGORY")]
        category: String,
        #[arg(long, value_name = "NAME", default_value = DEFAULT_SUB_EVENT)]
        sub_event: String,
        #[arg(long, value_name = "SCOPE", default_value = "user")]
        scope: ScopeArg,
    },
    /// Manage sound profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Control master volume and mute
    Volume(VolumeArgs),
    /// Manage audio devices
    Device {
        #[command(subcommand)]
        action: DeviceAction,
    },
    /// Switch profiles automatically based on the focused window
    Monitor {
        /// Monitor configuration file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Play the sound bound to this event category
    #[arg(
        short = 'e',
        long,
        value_name = "EVENT_CATEGORY",
        conflicts_with = "file",
        required_unless_present = "file"
    )]
    pub event: Option<String>,
    /// Play a WAV file directly
    #[arg(short = 'f', long, value_name = "WAV_FILE_PATH")]
    pub file: Option<PathBuf>,
    /// Sub-event used with --event
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SUB_EVENT)]
    pub sub_event: String,
    /// Wait for the sound to finish
    #[arg(long)]
    pub sync: bool,
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// List saved profiles
    List,
    /// Save the current sound settings as a profile
    Save { name: String },
    /// Load and apply a profile
    Load { name: String },
    /// Print a saved profile without applying it
    Show { name: String },
    /// Delete a saved profile
    Delete {
        name: String,
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct VolumeArgs {
    /// Set volume level (0.0 to 1.0)
    #[arg(long, value_name = "LEVEL")]
    pub set: Option<f32>,
    /// Print the current volume level
    #[arg(long)]
    pub get: bool,
    #[arg(long)]
    pub mute: bool,
    #[arg(long)]
    pub unmute: bool,
    /// Print the current mute status
    #[arg(long)]
    pub get_mute: bool,
}

#[derive(Subcommand, Debug)]
pub enum DeviceAction {
    /// List active audio devices
    List {
        #[arg(long = "type", value_name = "TYPE", default_value = "output")]
        kind: DeviceTypeArg,
    },
    /// Set the default audio device (not supported; always fails)
    SetDefault {
        /// Device ID from `device list`
        id: String,
        #[arg(long = "type", value_name = "TYPE", default_value = "output")]
        kind: DeviceTypeArg,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceTypeArg {
    Output,
    Input,
}

impl From<DeviceTypeArg> for DeviceKind {
    fn from(arg: DeviceTypeArg) -> Self {
        match arg {
            DeviceTypeArg::Output => DeviceKind::Output,
            DeviceTypeArg::Input => DeviceKind::Input,
        }
    }
}

/// Registry hive: `user` (HKCU) or `machine` (HKLM).
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    User,
    Machine,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::User => Scope::CurrentUser,
            ScopeArg::Machine => Scope::LocalMachine,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
