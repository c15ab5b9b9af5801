//! Persisted equalizer band settings
//!
//! Gains are stored as `custom{band}=<dB>` entries. Reads never fail:
//! anything missing, non-numeric or out of range reads back as 0 dB.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

/// Number of equalizer bands
pub const NUM_BANDS: usize = 10;
/// Lowest band gain in dB
pub const MIN_DB: f32 = -48.0;
/// Highest band gain in dB
pub const MAX_DB: f32 = 0.0;

/// Clamp a gain into `[MIN_DB, MAX_DB]`; NaN becomes 0 dB
pub fn clamp_gain(db: f32) -> f32 {
    if db.is_nan() {
        0.0
    } else {
        db.clamp(MIN_DB, MAX_DB)
    }
}

/// Storage key for a band
pub fn band_key(band: usize) -> String {
    format!("custom{band}")
}

/// Interpret a stored value
fn parse_gain(raw: Option<&str>) -> f32 {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| (MIN_DB..=MAX_DB).contains(v))
        .unwrap_or(0.0)
}

/// Key/value store of per-band gains
pub trait BandSettings: Send {
    /// Stored gain for `band` in dB, or 0 when unset or invalid
    fn get(&self, band: usize) -> f32;

    /// Persist a gain for `band`
    fn set(&mut self, band: usize, db: f32);

    /// Gains for every band
    fn gains(&self) -> [f32; NUM_BANDS] {
        std::array::from_fn(|band| self.get(band))
    }
}

/// Settings held in memory only
#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    values: HashMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value as-is, bypassing validation
    pub fn set_raw(&mut self, band: usize, raw: &str) {
        self.values.insert(band_key(band), raw.to_string());
    }

    /// Raw stored value
    pub fn raw(&self, band: usize) -> Option<&str> {
        self.values.get(&band_key(band)).map(String::as_str)
    }
}

impl BandSettings for MemorySettings {
    fn get(&self, band: usize) -> f32 {
        parse_gain(self.raw(band))
    }

    fn set(&mut self, band: usize, db: f32) {
        self.values.insert(band_key(band), db.to_string());
    }
}

/// Settings persisted to a `key=value` text file, rewritten on every change
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSettings {
    /// Load settings from the default location
    ///
    /// A missing or unreadable file gives empty settings.
    pub fn load() -> Self {
        Self::load_from(Self::settings_path())
    }

    /// Load settings from a specific path
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "could not read settings");
                }
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    /// Default settings file path
    pub fn settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("miso")
            .join("settings.txt")
    }

    fn parse(content: &str) -> BTreeMap<String, String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect()
    }

    fn serialize(&self) -> String {
        let mut lines = vec!["# Miso equalizer settings".to_string()];
        lines.extend(self.values.iter().map(|(k, v)| format!("{k}={v}")));
        lines.join("\n")
    }

    fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.serialize())
    }
}

impl BandSettings for FileSettings {
    fn get(&self, band: usize) -> f32 {
        parse_gain(self.values.get(&band_key(band)).map(String::as_str))
    }

    fn set(&mut self, band: usize, db: f32) {
        self.values.insert(band_key(band), db.to_string());
        if let Err(e) = self.save() {
            warn!(path = %self.path.display(), error = %e, "could not save settings");
        }
    }
}
