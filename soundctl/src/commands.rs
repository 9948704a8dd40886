/// Command handlers. Result lines go to stdout; diagnostics go through `log`.
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{error, info};
use regex::RegexBuilder;

use crate::audio::{check_level, DeviceKind};
use crate::cli::{Commands, DeviceAction, PlayArgs, ProfileAction, VolumeArgs};
use crate::config;
use crate::error::ProfileError;
use crate::manager::{select_sounds, SoundManager};
use crate::paths;
use crate::player::PlayMode;
use crate::profile::{CategoryEntry, SoundValue};
use crate::sound_store::Scope;
use crate::window::ForegroundWindowInspector;

pub async fn run(manager: SoundManager, command: Commands) -> Result<()> {
    match command {
        Commands::List {
            filter,
            show_unset,
            scope,
        } => list(&manager, filter.as_deref(), show_unset, scope.into()),
        Commands::Play(args) => play(&manager, args),
        Commands::Set {
            category,
            path,
            sub_event,
        } => set(&manager, &category, &path, &sub_event),
        Commands::Get {
            category,
            sub_event,
            scope,
        } => get(&manager, &category, &sub_event, scope.into()),
        Commands::Profile { action } => profile(&manager, action),
        Commands::Volume(args) => volume(&manager, args),
        Commands::Device { action } => device(&manager, action),
        Commands::Monitor { config } => {
            let path = match config {
                Some(p) => p,
                None => paths::config_file_path()?,
            };
            monitor(manager, &path).await
        }
    }
}

fn list(
    manager: &SoundManager,
    filter: Option<&str>,
    show_unset: bool,
    scope: Scope,
) -> Result<()> {
    let filter = filter
        .map(|f| RegexBuilder::new(f).case_insensitive(true).build())
        .transpose()
        .context("Invalid filter regex")?;
    let sounds = manager
        .list_sounds(scope)
        .context("Could not retrieve any sound events")?;

    println!("Current System Sounds:");
    let rows = select_sounds(&sounds, filter.as_ref(), show_unset);
    if rows.is_empty() {
        println!("(No matching sound events found based on filter/options)");
        return Ok(());
    }
    for row in rows {
        println!("\n[{}]", row.category);
        for (sub_event, path) in row.sub_events {
            println!("  {sub_event}: {}", path.as_deref().unwrap_or("(None)"));
        }
    }
    Ok(())
}

fn play(manager: &SoundManager, args: PlayArgs) -> Result<()> {
    let mode = PlayMode::from_sync(args.sync);
    let label = if args.sync { "sync" } else { "async" };
    match (args.event, args.file) {
        (Some(event), _) => {
            println!("Playing event: {event} ({label})...");
            let path = manager
                .play_event(&event, &args.sub_event, mode)
                .context("Playback failed")?;
            info!("Played {}", path.display());
        }
        (None, Some(file)) => {
            println!("Playing file: {} ({label})...", file.display());
            manager.play_file(&file, mode).context("Playback failed")?;
        }
        (None, None) => bail!("Nothing to play: pass --event or --file"),
    }
    println!("Playback initiated.");
    Ok(())
}

fn set(manager: &SoundManager, category: &str, path: &str, sub_event: &str) -> Result<()> {
    let shown = if path.is_empty() { "(None)" } else { path };
    println!("Setting sound for event '{category}' to: '{shown}'");
    manager
        .set_sound_for_event(category, path, sub_event)
        .context("Failed to set sound")?;
    println!("Sound set successfully. Changes should take effect shortly.");
    Ok(())
}

fn get(manager: &SoundManager, category: &str, sub_event: &str, scope: Scope) -> Result<()> {
    let path = manager
        .sound_for_event(category, sub_event, scope)
        .with_context(|| format!("Failed to read sound for '{category}\\{sub_event}'"))?;
    println!("{category}\\{sub_event}: {}", path.as_deref().unwrap_or("(None)"));
    Ok(())
}

fn profile(manager: &SoundManager, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::List => {
            let names = manager.list_profiles().context("Failed to list profiles")?;
            if names.is_empty() {
                println!("(No profiles found in {})", manager.profiles_dir().display());
            } else {
                println!("Available Profiles:");
                for name in names {
                    println!("- {name}");
                }
            }
        }
        ProfileAction::Save { name } => {
            println!("Saving current sound settings to profile: '{name}'");
            manager
                .save_profile(&name)
                .map_err(hint_elevation)
                .context("Failed to save profile")?;
            println!("Profile saved successfully.");
        }
        ProfileAction::Load { name } => {
            println!("Loading and applying profile: '{name}'");
            let report = manager
                .apply_profile(&name)
                .map_err(hint_elevation)
                .context("Failed to load profile")?;
            if !report.is_complete() {
                bail!(
                    "Failed to apply profile completely: {} of {} sounds could not be set",
                    report.failed,
                    report.total()
                );
            }
            println!("Profile applied successfully ({} sounds).", report.applied);
        }
        ProfileAction::Show { name } => {
            let profile = manager.load_profile(&name).context("Failed to read profile")?;
            println!("Profile: {}", profile.name);
            if let Some(saved_at) = &profile.saved_at {
                println!("Saved at: {saved_at}");
            }
            println!("Sounds: {}", profile.binding_count());
            for (category, entry) in &profile.sounds {
                println!("\n[{category}]");
                let subs = match entry {
                    CategoryEntry::SubEvents(subs) => subs,
                    CategoryEntry::Invalid(other) => {
                        println!("  (invalid: {other})");
                        continue;
                    }
                };
                for (sub_event, value) in subs {
                    match value {
                        SoundValue::Path(path) => {
                            println!("  {sub_event}: {}", path.as_deref().unwrap_or("(None)"))
                        }
                        SoundValue::Invalid(other) => println!("  {sub_event}: (invalid: {other})"),
                    }
                }
            }
        }
        ProfileAction::Delete { name, yes } => {
            if !yes {
                let prompt = format!("Are you sure you want to delete profile '{name}'? (y/N): ");
                if !confirm(&prompt, &mut io::stdin().lock())? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
            }
            println!("Deleting profile: '{name}'");
            manager
                .delete_profile(&name)
                .map_err(hint_elevation)
                .context("Failed to delete profile")?;
            println!("Profile deleted successfully.");
        }
    }
    Ok(())
}

fn hint_elevation(e: ProfileError) -> ProfileError {
    if e.is_permission_denied() {
        error!("Permission denied: {e}. Try running as administrator if changing settings.");
    }
    e
}

/// Prints `prompt` and reads one line; only `y`/`yes` confirm.
fn confirm(prompt: &str, input: &mut impl BufRead) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn volume(manager: &SoundManager, args: VolumeArgs) -> Result<()> {
    if let Some(level) = args.set {
        check_level(level).context("Failed to set volume")?;
        println!("Setting master volume to {:.0}%", level * 100.0);
        manager.set_volume(level).context("Failed to set volume")?;
    } else if args.get {
        let level = manager.volume().context("Failed to get volume level")?;
        println!("Current master volume: {:.0}%", level * 100.0);
    } else if args.mute {
        println!("Muting master volume...");
        manager.set_mute(true).context("Failed to mute")?;
    } else if args.unmute {
        println!("Unmuting master volume...");
        manager.set_mute(false).context("Failed to unmute")?;
    } else if args.get_mute {
        let muted = manager.is_muted().context("Failed to get mute status")?;
        println!(
            "Master mute status: {}",
            if muted { "Muted" } else { "Unmuted" }
        );
    }
    Ok(())
}

fn device(manager: &SoundManager, action: DeviceAction) -> Result<()> {
    match action {
        DeviceAction::List { kind } => {
            let kind = DeviceKind::from(kind);
            println!("Listing {kind} devices...");
            let devices = manager
                .list_devices(kind)
                .with_context(|| format!("Failed to list {kind} devices"))?;
            if devices.is_empty() {
                println!("(No {kind} devices found)");
            } else {
                println!("Found {} {kind} device(s):", devices.len());
                for d in devices {
                    println!("- Name: {}\n  ID:   {}", d.name, d.id);
                }
            }
        }
        DeviceAction::SetDefault { id, kind } => {
            let kind = DeviceKind::from(kind);
            println!("Attempting to set default {kind} device to ID: {id}");
            manager
                .set_default_device(&id, kind)
                .context("Failed to set default device")?;
        }
    }
    Ok(())
}

async fn monitor(manager: SoundManager, config_path: &Path) -> Result<()> {
    let config = config::load_or_empty(config_path).mcp_profiles;
    if config.is_empty() {
        bail!(
            "No context rules or default profile in {}; nothing to monitor",
            config_path.display()
        );
    }
    let Some(inspector) = ForegroundWindowInspector::new() else {
        bail!("Foreground window inspection is not available on this platform");
    };

    let mut monitor = manager.context_monitor(config, Arc::new(inspector));
    if !monitor.start() {
        bail!("Context monitor failed to start");
    }
    println!("Monitoring active window. Press Ctrl+C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
    } else {
        println!("\nCtrl+C received. Stopping monitoring...");
    }

    // `stop` blocks for up to one interval plus grace.
    let last = tokio::task::spawn_blocking(move || {
        monitor.stop();
        monitor.current_profile().map(str::to_string)
    })
    .await
    .context("Monitor shutdown task failed")?;
    if let Some(profile) = last {
        info!("Last applied profile: '{profile}'");
    }
    println!("Monitoring stopped.");
    Ok(())
}
