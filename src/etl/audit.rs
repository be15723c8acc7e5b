use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::config::UserConfig;
use crate::data::AuditReport;
use crate::errors::Result;
use crate::validate::{load_street_types, Validator};

use super::parse_osm::{open_osm_file, OsmElements};
use super::{remove_if_exists, write_section, Etl};

pub const ETL_NAME: &str = "audit";
pub const OUTPUT_FILE_NAME: &str = "audit_report.txt";

pub struct AuditInput {
    pub elements: OsmElements<Box<dyn BufRead>>,
    pub validator: Validator,
}

pub struct AuditEtl<'a> {
    config: &'a UserConfig,
}

impl AuditEtl<'_> {
    pub fn new(config: &UserConfig) -> AuditEtl {
        AuditEtl {
            config
        }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }
}

/// Runs the validator over every element. The document root is counted too.
pub fn audit_elements<R: BufRead>(validator: &Validator, elements: &mut OsmElements<R>) -> Result<AuditReport> {
    let mut report = validator.audit(elements.by_ref())?;
    if let Some(root) = elements.root() {
        report.element_counts.count_one(root);
    }
    Ok(report)
}

pub fn write_report<W: Write>(out: &mut W, report: &AuditReport) -> Result<()> {
    let summary = report.summary();
    write_section(out, "TAG AND ATTRIBUTE COUNTS", &summary.tag_counts)?;
    write_section(out, "STREET NAME COUNTS", &summary.street_names)?;
    write_section(out, "UNEXPECTED STREET NAMES", &summary.unexpected_street_names)?;
    write_section(out, "UNEXPECTED POSTCODES", &summary.unexpected_postcodes)?;
    write_section(out, "UNEXPECTED COORDINATES", &summary.unexpected_coordinates)?;
    write_section(out, "INVALID EMAILS", &summary.invalid_emails)?;
    Ok(())
}

impl Etl for AuditEtl<'_> {
    type Input = AuditInput;
    type Output = AuditReport;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&Self::output_path(dir))
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        let street_types_file = File::open(&self.config.street_types_path)
            .map_err(|err| format!("Could not open {}: {}", self.config.street_types_path, err))?;
        let street_types = load_street_types(BufReader::new(street_types_file))?;
        info!(etl_name = ETL_NAME, street_types = street_types.len(); "Loaded street types");

        Ok(AuditInput {
            elements: open_osm_file(Path::new(&self.config.data_path))?,
            validator: Validator::new(street_types, self.config.expected_area)?,
        })
    }

    fn transform(&mut self, mut input: Self::Input) -> Result<Self::Output> {
        let report = audit_elements(&input.validator, &mut input.elements)?;
        info!(
            etl_name = ETL_NAME,
            findings = report.findings.len(),
            street_names = report.street_names.len();
            "Audit finished"
        );
        Ok(report)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut out = BufWriter::new(File::create(Self::output_path(dir))?);
        write_report(&mut out, &output)?;
        out.flush()?;
        Ok(())
    }
}
