use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub const DEFAULT_CONFIG_PATH: &str = "config/budapest.json";

/// Audit, clean up and query an OpenStreetMap extract
#[derive(Parser, Debug)]
#[command(name = "osm_audit", version, about, long_about = None)]
pub struct Cli {
    /// JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Step to run; runs every step when omitted
    #[command(subcommand)]
    pub command: Option<Step>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Report data quality problems in the extract
    Audit,
    /// Write one cleaned document per node, way and relation
    Transform,
    /// Run the canned queries over the written documents
    Query,
    /// Audit, transform, then query
    All,
}

impl Cli {
    pub fn step(&self) -> Step {
        self.command.unwrap_or(Step::All)
    }
}
