use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::error;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_audit::cli::{Cli, Step};
use osm_audit::config::{load_user_config, UserConfig};
use osm_audit::errors::Result;
use osm_audit::etl::audit::AuditEtl;
use osm_audit::etl::query::QueryEtl;
use osm_audit::etl::transform::TransformEtl;
use osm_audit::etl::Etl;

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.dest_path).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run_step<E: Etl>(etl: &mut E, dir: &Path, overwrite: bool) -> Result<()> {
    if overwrite {
        etl.clean(dir)?;
    }
    etl.process(dir)
}

fn run(config: &UserConfig, step: Step) -> Result<()> {
    let output_dir = create_output_dir(config)?;
    match step {
        Step::Audit => run_step(&mut AuditEtl::new(config), &output_dir, config.overwrite),
        Step::Transform => run_step(&mut TransformEtl::new(config), &output_dir, config.overwrite),
        Step::Query => run_step(&mut QueryEtl::new(config), &output_dir, config.overwrite),
        Step::All => {
            run_step(&mut AuditEtl::new(config), &output_dir, config.overwrite)?;
            run_step(&mut TransformEtl::new(config), &output_dir, config.overwrite)?;
            // Queries read the transform output, so they must follow a fresh transform.
            run_step(&mut QueryEtl::new(config), &output_dir, true)
        },
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_user_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        },
    };
    setup_logging(&config.log_level);

    match run(&config, cli.step()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(err = err.message; "Run failed");
            ExitCode::FAILURE
        },
    }
}
