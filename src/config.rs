use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::errors::Result;

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    pub data_path: String,
    pub dest_path: String,
    pub street_types_path: String,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default)]
    pub expected_area: ExpectedArea,

    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Re-run stages whose output already exists.
    #[serde(default)]
    pub overwrite: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Replaces the built-in street name overrides: raw name to the street
    /// type that should be appended to it.
    #[serde(default)]
    pub street_overrides: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON document per line.
    #[default]
    Ndjson,
    /// A single JSON array holding every document.
    Array,
}

impl OutputFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            OutputFormat::Ndjson => "documents.ndjson",
            OutputFormat::Array => "documents.json",
        }
    }
}

/// Rounded centre the coordinates are checked against. Latitude is compared at
/// one decimal, longitude at zero.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ExpectedArea {
    pub lat: f64,
    pub lon: f64,
}

impl Default for ExpectedArea {
    fn default() -> Self {
        ExpectedArea {
            lat: 47.5,
            lon: 19.0,
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open config file {}: {}", path.display(), err))?;
    let config = serde_json::from_reader(BufReader::new(file))?;
    Ok(config)
}
