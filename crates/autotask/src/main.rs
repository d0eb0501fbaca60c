//! autotask - record and replay desktop input
//!
//! Records pointer and keyboard input into named automations and plays them back
//! with a speed multiplier, repeats, pause/resume and cancellation.
//!
//! Live capture and injection need a build with `--features native`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use autotask_core::{Error, ErrorCode, Event, EventLog};
use autotask_recorder::config::{self, Config};
use autotask_recorder::storage::Automation;
use autotask_recorder::{
    AutomationStorage, AutomationStore, AutomationUpdate, InputSink, InputSource, PlaybackOutcome,
    PlaybackReport, Player, Recorder,
};

#[derive(Parser)]
#[command(name = "autotask")]
#[command(about = "Record desktop input into named automations and replay it")]
#[command(version)]
struct Cli {
    /// Print results as a JSON envelope
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (default: <config dir>/autotask/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // === Recording ===
    /// Record input until Ctrl+C or the stop key, then save it
    Record {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Also record pointer moves
        #[arg(long)]
        moves: bool,
        /// Minimum pointer move distance in pixels
        #[arg(long)]
        threshold: Option<f64>,
    },

    // === Playback ===
    /// Replay a saved automation
    Play {
        name: String,
        #[arg(short, long)]
        speed: Option<f64>,
        #[arg(short, long)]
        repeat: Option<u32>,
        /// Skip the preparation countdown
        #[arg(long)]
        no_lead_in: bool,
        /// Ignore operator commands on stdin
        #[arg(long)]
        no_stdin: bool,
    },

    // === Store ===
    /// List saved automations
    List,
    /// Show an automation's details
    Show {
        name: String,
        /// Print every event
        #[arg(long)]
        all: bool,
    },
    /// Delete an automation
    Delete { name: String },
    /// Give an automation a new name
    Rename { name: String, new_name: String },
    /// Search names, descriptions and tags
    Search { query: String },
    /// Write an automation's events as JSON
    Export {
        name: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save events from a JSON file under a new name
    Import {
        file: PathBuf,
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    // === Editing ===
    /// Rescale an automation's timing (0.5 = twice as fast)
    Retime { name: String, factor: f64 },
    /// Drop pointer moves, or thin them to a minimum distance
    StripMoves {
        name: String,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Change single events, addressed by the index `show --all` prints
    Edit {
        name: String,
        #[command(subcommand)]
        action: EditAction,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum EditAction {
    /// Remove the event at INDEX
    Delete { index: usize },
    /// Insert an event before INDEX, given as JSON like {"type":"key_press","key":"a","time":1.5}
    Insert { index: usize, event: String },
    /// Replace the event at INDEX with one given as JSON
    Modify { index: usize, event: String },
    /// Shift the event at INDEX and all later ones by SECONDS
    Delay {
        index: usize,
        #[arg(allow_negative_numbers = true)]
        seconds: f64,
    },
    /// Copy the event at INDEX to just after it
    Duplicate {
        index: usize,
        /// Seconds between the original and the copy
        #[arg(long, default_value_t = 0.1)]
        offset: f64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write the default config file
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string_pretty(output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Result printer: the JSON envelope with `--json`, plain text otherwise
#[derive(Clone, Copy)]
struct Ui {
    json: bool,
}

impl Ui {
    fn done<T: Serialize>(&self, data: T, human: impl FnOnce(&T)) {
        if self.json {
            print_json(&Output::ok(data));
        } else {
            human(&data);
        }
    }

    /// Progress text, suppressed in JSON mode
    fn note(&self, text: impl AsRef<str>) {
        if !self.json {
            eprintln!("{}", text.as_ref());
        }
    }
}

// ── Devices ─────────────────────────────────────────────────────────────────

#[cfg(feature = "native")]
fn input_source() -> Result<Arc<dyn InputSource>> {
    Ok(Arc::new(autotask_recorder::platform::NativeSource::new()))
}

#[cfg(feature = "native")]
fn input_sink() -> Result<Box<dyn InputSink>> {
    Ok(Box::new(autotask_recorder::platform::NativeSink::new()))
}

#[cfg(not(feature = "native"))]
fn input_source() -> Result<Arc<dyn InputSource>> {
    Err(no_devices().into())
}

#[cfg(not(feature = "native"))]
fn input_sink() -> Result<Box<dyn InputSink>> {
    Err(no_devices().into())
}

#[cfg(not(feature = "native"))]
fn no_devices() -> Error {
    Error::device_unavailable("This build has no live input backend")
        .with_suggestions(vec!["Rebuild with `cargo install autotask --features native`".into()])
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let ui = Ui { json: cli.json };

    if let Err(e) = run(cli, ui) {
        report(ui, e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "autotask={0},autotask_core={0},autotask_recorder={0},warn",
                log_level
            ))
        }))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli, ui: Ui) -> Result<()> {
    let config_path = cli.config.as_deref();
    let settings = || config::load_config(config_path);
    let open_store = || -> Result<AutomationStorage> {
        Ok(AutomationStorage::open(settings()?.storage_dir())?)
    };

    match cli.command {
        Commands::Record { name, description, tags, moves, threshold } => {
            let config = settings()?;
            let mut recorder = config.recorder.clone();
            recorder.record_pointer_moves |= moves;
            if let Some(threshold) = threshold {
                recorder.move_threshold = threshold;
            }
            let mut store = AutomationStorage::open(config.storage_dir())?;
            cmd_record(ui, &mut store, recorder, &name, &description, &tags)
        }
        Commands::Play { name, speed, repeat, no_lead_in, no_stdin } => {
            let config = settings()?;
            let mut player = config.player.clone();
            if let Some(speed) = speed {
                player.speed = speed;
            }
            if let Some(repeat) = repeat {
                player.repeat_count = repeat;
            }
            if no_lead_in {
                player.lead_in_ms = 0;
            }
            let store = AutomationStorage::open(config.storage_dir())?;
            cmd_play(ui, &store, player, &name, !no_stdin)
        }
        Commands::List => cmd_list(ui, &open_store()?),
        Commands::Show { name, all } => cmd_show(ui, &open_store()?, &name, all),
        Commands::Delete { name } => {
            open_store()?.delete(&name)?;
            ui.done(serde_json::json!({ "deleted": name }), |_| println!("Deleted: {}", name));
            Ok(())
        }
        Commands::Rename { name, new_name } => {
            let renamed = open_store()?.rename(&name, &new_name)?;
            ui.done(serde_json::json!({ "from": name, "to": renamed.name }), |_| {
                println!("Renamed {} to {}", name, new_name)
            });
            Ok(())
        }
        Commands::Search { query } => cmd_search(ui, &open_store()?, &query),
        Commands::Export { name, output } => cmd_export(ui, &open_store()?, &name, output.as_deref()),
        Commands::Import { file, name, description, tags } => {
            cmd_import(ui, &mut open_store()?, &file, &name, &description, &tags)
        }
        Commands::Retime { name, factor } => {
            let mut store = open_store()?;
            let events = store.load(&name)?.scale_timing(factor)?;
            let saved = rewrite(&mut store, &name, events)?;
            ui.done(saved, |s| println!("{}: {:.2}s after retiming", s.name, s.duration));
            Ok(())
        }
        Commands::StripMoves { name, threshold } => {
            let mut store = open_store()?;
            let before = store.load(&name)?;
            let events = match threshold {
                Some(threshold) => before.thin_pointer_moves(threshold),
                None => before.without_pointer_moves(),
            };
            let removed = before.len() - events.len();
            rewrite(&mut store, &name, events)?;
            ui.done(serde_json::json!({ "name": name, "removed": removed }), |_| {
                println!("{}: removed {} pointer moves", name, removed)
            });
            Ok(())
        }
        Commands::Edit { name, action } => {
            let mut store = open_store()?;
            let mut events = store.load(&name)?;
            let change = apply_edit(&mut events, action)?;
            let saved = rewrite(&mut store, &name, events)?;
            ui.done(
                serde_json::json!({ "name": name, "change": change, "events": saved.event_count }),
                |_| println!("{}: {} ({} events)", name, change, saved.event_count),
            );
            Ok(())
        }
        // Works even when the current file does not parse
        Commands::Config { action } => cmd_config(ui, action, config_path),
    }
}

/// Print an error the way the mode asks for
fn report(ui: Ui, e: anyhow::Error) {
    let err = match e.downcast::<Error>() {
        Ok(err) => err,
        Err(other) => Error::new(ErrorCode::Unknown, format!("{:#}", other)),
    };
    if ui.json {
        print_json(&Output::<()>::err(err));
        return;
    }
    eprintln!("Error: {}", err);
    for suggestion in &err.suggestions {
        eprintln!("  hint: {}", suggestion);
    }
}

// ── Recording ───────────────────────────────────────────────────────────────

fn cmd_record(
    ui: Ui,
    store: &mut AutomationStorage,
    config: autotask_recorder::RecorderConfig,
    name: &str,
    description: &str,
    tags: &[String],
) -> Result<()> {
    if store.contains(name) {
        return Err(Error::duplicate_name(name).into());
    }

    let stop_key = config.stop_key;
    let toggle_key = config.pause_toggle_key;
    let recorder = Recorder::with_config(input_source()?, config);
    recorder.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    ui.note(format!("Recording: {} (Ctrl+C to stop)", name));
    if let Some(key) = toggle_key {
        ui.note(format!("  {} pauses / resumes", key));
    }
    if let Some(key) = stop_key {
        ui.note(format!("  {} stops", key));
    }

    let mut count = 0;
    while running.load(Ordering::SeqCst) && !recorder.stop_requested() {
        let now = recorder.event_count();
        if now != count && !ui.json {
            count = now;
            eprint!("\r{} events", count);
            io::stderr().flush()?;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let events = recorder.stop();
    ui.note(format!("\n{} events recorded", events.len()));
    store.save(name, &events, description, tags)?;
    let info = store.info(name)?;
    ui.done(info, |info| println!("Saved: {}", info.path.display()));
    Ok(())
}

// ── Playback ────────────────────────────────────────────────────────────────

fn cmd_play(
    ui: Ui,
    store: &AutomationStorage,
    config: autotask_recorder::PlayerConfig,
    name: &str,
    operator: bool,
) -> Result<()> {
    let events = store.load(name)?;
    let player = Arc::new(Player::with_config(input_sink()?, config.clone())?);
    let loaded = player.load(&events)?;
    if loaded.dropped > 0 {
        ui.note(format!("Skipping {} modifier / control key events", loaded.dropped));
    }

    let p = player.clone();
    ctrlc::set_handler(move || p.cancel())?;

    ui.note(format!(
        "Playing {} ({} events) at {}x, {} time(s)",
        name, loaded.accepted, config.speed, config.repeat_count
    ));
    if config.lead_in_ms > 0 {
        ui.note(format!("Starting in {:.1}s...", config.lead_in_ms as f64 / 1000.0));
    }

    let handle = player.play()?;
    if operator {
        ui.note("Commands: p pause, r resume, u hold for input, c hold for copy/paste, q cancel");
        spawn_operator(player.clone(), config.user_input_pause(), config.copy_paste_pause());
    }
    let report = completed(handle.wait()?)?;

    ui.done(report, |report| {
        println!(
            "Done: {} events in {:.1}s ({} failed)",
            report.injected,
            report.elapsed.as_secs_f64(),
            report.failed
        )
    });
    Ok(())
}

/// A cancelled run is a failed command; the report rides along as context
fn completed(report: PlaybackReport) -> std::result::Result<PlaybackReport, Error> {
    match report.outcome {
        PlaybackOutcome::Completed => Ok(report),
        PlaybackOutcome::Cancelled => Err(Error::new(
            ErrorCode::Cancelled,
            format!(
                "Playback cancelled after {} events, {} repeat(s) completed",
                report.injected, report.repeats_completed
            ),
        )
        .with_context(serde_json::to_value(&report).unwrap_or_default())),
    }
}

/// Read operator commands from stdin for the lifetime of the process
fn spawn_operator(player: Arc<Player>, user_input: Duration, copy_paste: Duration) {
    let spawned = std::thread::Builder::new()
        .name("autotask-operator".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "p" => player.pause(),
                    "r" => player.resume(),
                    "u" => player.pause_for_user_input(user_input),
                    "c" => player.pause_for_copy_paste(copy_paste),
                    "q" => {
                        player.cancel();
                        break;
                    }
                    "" => {}
                    other => tracing::warn!("Unknown command: {}", other),
                }
                if !player.is_active() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("Operator commands unavailable: {}", e);
    }
}

// ── Store ───────────────────────────────────────────────────────────────────

fn cmd_list(ui: Ui, store: &AutomationStorage) -> Result<()> {
    let list = store.list()?;
    ui.done(list, |list| {
        if list.is_empty() {
            println!("No automations saved.");
        }
        for s in list {
            println!("{:<30} {:>6} events {:>8.1}s  {}", s.name, s.event_count, s.duration, s.description);
        }
    });
    Ok(())
}

fn cmd_show(ui: Ui, store: &AutomationStorage, name: &str, all: bool) -> Result<()> {
    let info = store.info(name)?;
    let events = store.load(name)?;
    let stats = events.stats();

    if ui.json {
        let mut data = serde_json::json!({ "info": info, "stats": stats });
        if all {
            data["events"] = serde_json::to_value(&events)?;
        }
        print_json(&Output::ok(data));
        return Ok(());
    }

    println!("Name: {}", info.summary.name);
    if !info.summary.description.is_empty() {
        println!("Description: {}", info.summary.description);
    }
    if !info.summary.tags.is_empty() {
        println!("Tags: {}", info.summary.tags.join(", "));
    }
    println!("Created: {}", info.summary.created_at.to_rfc3339());
    println!("Modified: {}", info.modified_at.to_rfc3339());
    println!("File: {} ({} bytes)", info.path.display(), info.file_size);
    println!("Events: {} over {:.2}s", stats.total_events, stats.duration);
    println!(
        "\nSummary: {} moves, {} clicks, {} scrolls, {} key presses, {} key releases",
        stats.pointer_moves,
        stats.pointer_buttons,
        stats.pointer_scrolls,
        stats.key_presses,
        stats.key_releases
    );
    if all {
        for (i, e) in events.iter().enumerate() {
            println!("{}: {}", i, e);
        }
    }
    Ok(())
}

fn cmd_search(ui: Ui, store: &AutomationStorage, query: &str) -> Result<()> {
    let hits = store.search(query)?;
    ui.done(hits, |hits| {
        if hits.is_empty() {
            println!("No automations match '{}'.", query);
        }
        for s in hits {
            println!("{:<30} {}", s.name, s.description);
        }
    });
    Ok(())
}

fn cmd_export(ui: Ui, store: &AutomationStorage, name: &str, output: Option<&Path>) -> Result<()> {
    let events = store.load(name)?;
    let Some(path) = output else {
        println!("{}", events.to_json()?);
        return Ok(());
    };
    std::fs::write(path, events.to_json()?).map_err(|e| {
        Error::storage(format!("Failed to write {}: {}", path.display(), e))
    })?;
    ui.done(
        serde_json::json!({ "name": name, "path": path, "events": events.len() }),
        |_| println!("Exported {} events to {}", events.len(), path.display()),
    );
    Ok(())
}

fn cmd_import(
    ui: Ui,
    store: &mut AutomationStorage,
    file: &Path,
    name: &str,
    description: &str,
    tags: &[String],
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| Error::storage(format!("Failed to read {}: {}", file.display(), e)))?;
    // A bare event array, or a whole stored record
    let events = match EventLog::from_json(&text) {
        Ok(events) => events,
        Err(bare) => match serde_json::from_str::<Automation>(&text) {
            Ok(record) => record.events,
            Err(_) => return Err(bare.into()),
        },
    };
    store.save(name, &events, description, tags)?;
    let info = store.info(name)?;
    ui.done(info, |info| {
        println!("Imported {} events as {}", info.summary.event_count, info.summary.name)
    });
    Ok(())
}

/// Apply one edit in place and describe it
fn apply_edit(events: &mut EventLog, action: EditAction) -> autotask_core::Result<String> {
    let parse = |json: &str| -> autotask_core::Result<Event> {
        serde_json::from_str(json).map_err(|e| Error::invalid_log(format!("Bad event JSON: {}", e)))
    };
    Ok(match action {
        EditAction::Delete { index } => {
            let removed = events.delete_event(index)?;
            format!("deleted {}: {}", index, removed.kind())
        }
        EditAction::Insert { index, event } => {
            events.insert_event(index, parse(&event)?)?;
            format!("inserted event at {}", index)
        }
        EditAction::Modify { index, event } => {
            events.modify_event(index, parse(&event)?)?;
            format!("replaced event {}", index)
        }
        EditAction::Delay { index, seconds } => {
            events.add_delay(index, seconds)?;
            format!("shifted events from {} by {}s", index, seconds)
        }
        EditAction::Duplicate { index, offset } => {
            events.duplicate_event(index, offset)?;
            format!("duplicated event {}", index)
        }
    })
}

fn rewrite(store: &mut AutomationStorage, name: &str, events: EventLog) -> Result<autotask_recorder::AutomationSummary> {
    let update = AutomationUpdate { events: Some(events), ..Default::default() };
    let saved = store.update(name, update)?;
    Ok(store.info(&saved.name)?.summary)
}

// ── Config ──────────────────────────────────────────────────────────────────

fn cmd_config(ui: Ui, action: ConfigAction, path: Option<&Path>) -> Result<()> {
    let path = path.map(PathBuf::from).or_else(Config::default_path).ok_or_else(|| {
        Error::invalid_configuration("No config directory on this system; pass --config")
    })?;

    match action {
        ConfigAction::Show => {
            let config = config::load_config(Some(&path))?;
            if ui.json {
                print_json(&Output::ok(&config));
            } else {
                println!("# {}", path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
                println!("# store: {}", config.storage_dir().display());
                let backend = if autotask_recorder::platform::native_available() { "native" } else { "none" };
                println!("# input backend: {}", backend);
            }
        }
        ConfigAction::Path => {
            ui.done(serde_json::json!({ "path": path }), |_| println!("{}", path.display()));
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(Error::invalid_configuration(format!(
                    "{} already exists",
                    path.display()
                ))
                .with_suggestions(vec!["Pass --force to overwrite it".into()])
                .into());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, config::DEFAULT_CONFIG)?;
            ui.done(serde_json::json!({ "written": path }), |_| {
                println!("Wrote {}", path.display())
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn play_overrides_parse() {
        let cli = Cli::parse_from(["autotask", "play", "demo", "-s", "2.5", "-r", "3", "--no-lead-in", "--json"]);
        assert!(cli.json);
        match cli.command {
            Commands::Play { name, speed, repeat, no_lead_in, no_stdin } => {
                assert_eq!(name, "demo");
                assert_eq!(speed, Some(2.5));
                assert_eq!(repeat, Some(3));
                assert!(no_lead_in);
                assert!(!no_stdin);
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn record_tags_split_on_commas() {
        let cli = Cli::parse_from(["autotask", "record", "login", "-t", "web,daily"]);
        match cli.command {
            Commands::Record { tags, moves, .. } => {
                assert_eq!(tags, vec!["web", "daily"]);
                assert!(!moves);
            }
            _ => panic!("expected record"),
        }
    }

    fn typed(text: &str) -> EventLog {
        let mut log = EventLog::new();
        for (i, c) in text.chars().enumerate() {
            log.push(Event::KeyPress { time: i as f64, key: autotask_core::Key::Char(c) });
        }
        log
    }

    fn edit(args: &[&str]) -> EditAction {
        let argv = ["autotask", "edit", "job"].into_iter().chain(args.iter().copied());
        match Cli::parse_from(argv).command {
            Commands::Edit { name, action } => {
                assert_eq!(name, "job");
                action
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn edit_subcommands_change_the_log() {
        let mut events = typed("abc");
        apply_edit(&mut events, edit(&["delete", "1"])).unwrap();
        assert_eq!(events.len(), 2);

        apply_edit(&mut events, edit(&["insert", "1", r#"{"type":"key_press","key":"x","time":1.5}"#])).unwrap();
        assert_eq!(events.events()[1].key(), Some(&autotask_core::Key::Char('x')));

        apply_edit(&mut events, edit(&["delay", "2", "-0.25"])).unwrap();
        assert_eq!(events.events()[2].time(), 1.75);

        apply_edit(&mut events, edit(&["duplicate", "0", "--offset", "0.5"])).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events.events()[1].time(), 0.5);

        apply_edit(&mut events, edit(&["modify", "0", r#"{"type":"key_release","key":"a","time":0}"#])).unwrap();
        assert_eq!(events.events()[0].kind(), "key_release");
    }

    #[test]
    fn bad_edits_leave_the_log_alone() {
        let mut events = typed("ab");
        let err = apply_edit(&mut events, edit(&["delete", "7"])).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = apply_edit(&mut events, edit(&["insert", "0", "{not json"])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLog);
        let err = apply_edit(&mut events, edit(&["modify", "0", r#"{"type":"key_press","key":"a","time":5}"#])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLog);
        assert_eq!(events, typed("ab"));
    }

    #[test]
    fn rename_parses_both_names() {
        let cli = Cli::parse_from(["autotask", "rename", "old", "new"]);
        assert!(matches!(cli.command, Commands::Rename { name, new_name } if name == "old" && new_name == "new"));
    }

    #[test]
    fn cancelled_playback_is_a_failure() {
        let report = |outcome| PlaybackReport {
            outcome,
            injected: 3,
            failed: 0,
            repeats_completed: 0,
            elapsed: Duration::from_millis(250),
        };
        assert!(completed(report(PlaybackOutcome::Completed)).is_ok());

        let err = completed(report(PlaybackOutcome::Cancelled)).unwrap_err();
        let value = serde_json::to_value(Output::<()>::err(err)).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "CANCELLED");
        assert_eq!(value["error"]["context"]["injected"], 3);
    }

    #[test]
    fn error_envelope_carries_code() {
        let output = Output::<()>::err(Error::not_found("missing"));
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "NOT_FOUND");
        assert!(value.get("data").is_none());
    }
}
