//! CLI defaults loaded from the user's settings file.
//!
//! Lives at `<config_dir>/celltab/settings.json`. Missing file or
//! malformed JSON falls back to defaults; flags always override.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database opened when --db is not given.
    #[serde(rename = "store.path")]
    pub db: Option<PathBuf>,

    /// Sheet opened when --sheet is not given.
    #[serde(rename = "sheet.name")]
    pub sheet: Option<String>,
}

impl Settings {
    pub fn load() -> Settings {
        let Some(path) = Settings::path() else {
            return Settings::default();
        };
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => Settings::default(),
        }
    }

    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("celltab").join("settings.json"))
    }
}
