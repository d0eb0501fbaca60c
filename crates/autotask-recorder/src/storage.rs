//! Named automation storage - one pretty-printed JSON file per automation
//!
//! Files are indexed by the `name` stored inside them, so hand-renamed files keep
//! working. Names collide when their sanitized file names do.

use autotask_core::{Error, EventLog, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Named persistence of event logs
pub trait AutomationStore {
    /// Store a new automation. Existing names are rejected, never overwritten.
    fn save(&mut self, name: &str, events: &EventLog, description: &str, tags: &[String]) -> Result<()>;
    fn load(&self, name: &str) -> Result<EventLog>;
    fn list(&self) -> Result<Vec<AutomationSummary>>;
    fn delete(&mut self, name: &str) -> Result<()>;
}

/// Stored automation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(alias = "created_date", deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "modified_date", deserialize_with = "timestamp")]
    pub modified_at: DateTime<Utc>,
    pub event_count: usize,
    pub duration: f64,
    pub events: EventLog,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationSummary {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub event_count: usize,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

/// Listing entry plus file details
#[derive(Debug, Clone, Serialize)]
pub struct AutomationInfo {
    #[serde(flatten)]
    pub summary: AutomationSummary,
    pub modified_at: DateTime<Utc>,
    pub path: PathBuf,
    pub file_size: u64,
}

/// Fields changed by [`AutomationStorage::update`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct AutomationUpdate {
    pub events: Option<EventLog>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Automation {
    fn summary(&self) -> AutomationSummary {
        AutomationSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            event_count: self.events.len(),
            duration: self.events.duration(),
            created_at: self.created_at,
        }
    }
}

/// RFC 3339, or a naive ISO timestamp taken as UTC
fn timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(d)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(serde::de::Error::custom)
}

/// Directory-backed store
pub struct AutomationStorage {
    dir: PathBuf,
    index: BTreeMap<String, PathBuf>,
}

impl AutomationStorage {
    /// Open (creating if needed) a store in `dir` and index the files already there
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let mut storage = Self {
            dir,
            index: BTreeMap::new(),
        };
        storage.reload()?;
        Ok(storage)
    }

    /// Rebuild the index from disk. Unreadable files are skipped with a warning.
    pub fn reload(&mut self) -> Result<usize> {
        self.index.clear();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_automation(&path) {
                Ok(automation) => {
                    if let Some(previous) = self.index.insert(automation.name.clone(), path.clone()) {
                        warn!(name = %automation.name, ?previous, ?path, "Duplicate automation name on disk");
                    }
                }
                Err(e) => warn!(?path, error = %e, "Skipping unreadable automation file"),
            }
        }
        debug!(count = self.index.len(), dir = ?self.dir, "Indexed automations");
        Ok(self.index.len())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn file_for(&self, name: &str) -> Result<&PathBuf> {
        self.index.get(name).ok_or_else(|| Error::not_found(name))
    }

    /// Full stored record
    pub fn get(&self, name: &str) -> Result<Automation> {
        read_automation(self.file_for(name)?)
    }

    pub fn info(&self, name: &str) -> Result<AutomationInfo> {
        let path = self.file_for(name)?;
        let automation = read_automation(path)?;
        let file_size = fs::metadata(path)?.len();
        Ok(AutomationInfo {
            summary: automation.summary(),
            modified_at: automation.modified_at,
            path: path.clone(),
            file_size,
        })
    }

    /// Case-insensitive match on name, description or any tag
    pub fn search(&self, query: &str) -> Result<Vec<AutomationSummary>> {
        let query = query.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&query)
                    || s.description.to_lowercase().contains(&query)
                    || s.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .collect())
    }

    /// Change events, description or tags of an existing automation
    pub fn update(&mut self, name: &str, update: AutomationUpdate) -> Result<Automation> {
        let path = self.file_for(name)?.clone();
        let mut automation = read_automation(&path)?;
        if let Some(events) = update.events {
            automation.event_count = events.len();
            automation.duration = events.duration();
            automation.events = events;
        }
        if let Some(description) = update.description {
            automation.description = description;
        }
        if let Some(tags) = update.tags {
            automation.tags = tags;
        }
        automation.modified_at = Utc::now();
        write_automation(&path, &automation)?;
        info!(name, "Automation updated");
        Ok(automation)
    }
}

impl AutomationStorage {
    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_filename(name)))
    }

    /// Claim a file for a new name, rejecting names taken directly or by collision
    fn claim(&self, name: &str, current: Option<&Path>) -> Result<PathBuf> {
        if name.trim().is_empty() {
            return Err(Error::storage("automation name must not be empty"));
        }
        if self.index.contains_key(name) {
            return Err(Error::duplicate_name(name));
        }
        let path = self.file_path(name);
        if path.exists() && Some(path.as_path()) != current {
            // Another name sanitizes to the same file
            return Err(Error::duplicate_name(name).with_context(serde_json::json!({
                "path": path.display().to_string(),
            })));
        }
        Ok(path)
    }

    /// Give an automation a new name, moving it to the matching file
    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<Automation> {
        let old_path = self.file_for(name)?.clone();
        let new_path = self.claim(new_name, Some(old_path.as_path()))?;
        let mut automation = read_automation(&old_path)?;
        automation.name = new_name.to_string();
        automation.modified_at = Utc::now();
        write_automation(&new_path, &automation)?;
        if new_path != old_path {
            if let Err(e) = fs::remove_file(&old_path) {
                warn!(path = ?old_path, error = %e, "Could not remove file of renamed automation");
            }
        }
        self.index.remove(name);
        self.index.insert(new_name.to_string(), new_path);
        info!(from = name, to = new_name, "Automation renamed");
        Ok(automation)
    }
}

impl AutomationStore for AutomationStorage {
    fn save(&mut self, name: &str, events: &EventLog, description: &str, tags: &[String]) -> Result<()> {
        let path = self.claim(name, None)?;

        let now = Utc::now();
        let automation = Automation {
            name: name.to_string(),
            description: description.to_string(),
            tags: tags.to_vec(),
            created_at: now,
            modified_at: now,
            event_count: events.len(),
            duration: events.duration(),
            events: events.clone(),
        };
        write_automation(&path, &automation)?;
        self.index.insert(name.to_string(), path.clone());
        info!(name, events = events.len(), ?path, "Automation saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<EventLog> {
        Ok(self.get(name)?.events)
    }

    fn list(&self) -> Result<Vec<AutomationSummary>> {
        let mut summaries = Vec::with_capacity(self.index.len());
        for (name, path) in &self.index {
            match read_automation(path) {
                Ok(automation) => summaries.push(automation.summary()),
                Err(e) => warn!(name = %name, error = %e, "Skipping unreadable automation"),
            }
        }
        Ok(summaries)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let path = self.index.remove(name).ok_or_else(|| Error::not_found(name))?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                self.index.insert(name.to_string(), path);
                return Err(e.into());
            }
        }
        info!(name, "Automation deleted");
        Ok(())
    }
}

fn read_automation(path: &Path) -> Result<Automation> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write through a temporary file so a crash never leaves a truncated record
fn write_automation(path: &Path, automation: &Automation) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(automation)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Replace characters that are invalid in file names and cap the length
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if "<>:\"/\\|?*".contains(c) || c.is_control() { '_' } else { c })
        .take(50)
        .collect::<String>()
        .trim()
        .to_string()
}
