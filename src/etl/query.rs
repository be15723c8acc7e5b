use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::config::{OutputFormat, UserConfig};
use crate::data::NormalizedDocument;
use crate::errors::Result;
use crate::query::QueryReport;

use super::{remove_if_exists, write_section, Etl};

pub const ETL_NAME: &str = "query";
pub const OUTPUT_FILE_NAME: &str = "query_report.txt";

/// Reads documents in the form the transform step wrote them.
pub fn read_documents<R: Read>(input: R, format: OutputFormat) -> Result<Vec<NormalizedDocument>> {
    let docs = match format {
        OutputFormat::Ndjson => serde_json::Deserializer::from_reader(input)
            .into_iter::<NormalizedDocument>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        OutputFormat::Array => serde_json::from_reader(input)?,
    };
    Ok(docs)
}

pub fn write_report<W: Write>(out: &mut W, report: &QueryReport) -> Result<()> {
    write_section(out, "COUNT OF DOCUMENTS", &report.document_count)?;
    write_section(out, "COUNT BY TYPE", &report.count_by_type)?;
    write_section(out, "TOP POSTCODES", &report.top_postcodes)?;
    write_section(out, "TOP STREETS", &report.top_streets)?;
    write_section(out, "NUMBER OF CONTRIBUTORS", &report.contributor_count)?;
    write_section(out, "TOP CONTRIBUTORS", &report.top_contributors)?;
    write_section(out, "NUMBER OF AMENITIES", &report.amenity_count)?;
    write_section(out, "TOP AMENITIES", &report.top_amenities)?;
    write_section(out, "TOP RESTAURANT CUISINES", &report.top_cuisines)?;
    Ok(())
}

pub struct QueryEtl<'a> {
    config: &'a UserConfig,
}

impl QueryEtl<'_> {
    pub fn new(config: &UserConfig) -> QueryEtl {
        QueryEtl {
            config
        }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }
}

impl Etl for QueryEtl<'_> {
    type Input = Vec<NormalizedDocument>;
    type Output = QueryReport;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&Self::output_path(dir))
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let input_path = dir.join(self.config.output_format.file_name());
        let input_file = File::open(&input_path)
            .map_err(|err| format!("Could not open {}, run the transform step first: {}", input_path.display(), err))?;
        let docs = read_documents(BufReader::new(input_file), self.config.output_format)?;
        info!(etl_name = ETL_NAME, documents = docs.len(); "Documents loaded");
        Ok(docs)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        Ok(QueryReport::run(&input, self.config.top_n))
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut out = BufWriter::new(File::create(Self::output_path(dir))?);
        write_report(&mut out, &output)?;
        out.flush()?;
        Ok(())
    }
}
