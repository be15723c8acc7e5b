use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::{OutputFormat, UserConfig};
use crate::data::NormalizedDocument;
use crate::errors::{Error, Result};
use crate::transform::Transformer;

use super::parse_osm::{open_osm_file, OsmElements};
use super::{remove_if_exists, Etl};

pub const ETL_NAME: &str = "transform";

const PROGRESS_EVERY: usize = 100_000;

/// Documents produced lazily from an element stream, one element at a time.
pub struct Documents<R: BufRead> {
    elements: OsmElements<R>,
    transformer: Transformer,
}

impl<R: BufRead> Documents<R> {
    pub fn new(elements: OsmElements<R>, transformer: Transformer) -> Documents<R> {
        Documents {
            elements,
            transformer,
        }
    }
}

impl<R: BufRead> Iterator for Documents<R> {
    type Item = Result<NormalizedDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let element = match self.elements.next()? {
                Ok(element) => element,
                Err(err) => return Some(Err(err)),
            };
            match self.transformer.transform_element(&element) {
                Ok(Some(doc)) => return Some(Ok(doc)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Writes every document in `format`, stopping at the first error. Returns the
/// number of documents written.
pub fn write_documents<W, I>(out: &mut W, docs: I, format: OutputFormat) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Result<NormalizedDocument>>,
{
    let mut written = 0;
    if format == OutputFormat::Array {
        out.write_all(b"[")?;
    }
    for doc in docs {
        let doc = doc?;
        match format {
            OutputFormat::Ndjson => {
                serde_json::to_writer(&mut *out, &doc)?;
                out.write_all(b"\n")?;
            },
            OutputFormat::Array => {
                if written > 0 {
                    out.write_all(b",")?;
                }
                out.write_all(b"\n")?;
                serde_json::to_writer(&mut *out, &doc)?;
            },
        }
        written += 1;
        if written % PROGRESS_EVERY == 0 {
            info!(etl_name = ETL_NAME, documents = written; "Progress");
        }
    }
    if format == OutputFormat::Array {
        out.write_all(b"\n]\n")?;
    }
    Ok(written)
}

/// Removes a half written output file. The write error is what gets returned;
/// a failed removal is only logged.
fn discard_partial_output(path: &Path, err: Error) -> Error {
    if let Err(cleanup_err) = remove_if_exists(path) {
        warn!(
            etl_name = ETL_NAME,
            path = path.display().to_string(),
            err = cleanup_err.message;
            "Could not remove partial output"
        );
    }
    err
}

pub struct TransformEtl<'a> {
    config: &'a UserConfig,
}

impl TransformEtl<'_> {
    pub fn new(config: &UserConfig) -> TransformEtl {
        TransformEtl {
            config
        }
    }

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.config.output_format.file_name())
    }
}

impl Etl for TransformEtl<'_> {
    type Input = OsmElements<Box<dyn BufRead>>;
    type Output = Documents<Box<dyn BufRead>>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(self.output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&self.output_path(dir))
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        open_osm_file(Path::new(&self.config.data_path))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let transformer = match &self.config.street_overrides {
            Some(overrides) => Transformer::with_street_overrides(overrides.clone())?,
            None => Transformer::new()?,
        };
        Ok(Documents::new(input, transformer))
    }

    /// Documents are shaped while they are written, so a bad postcode surfaces
    /// here and leaves a partial file behind, which is removed.
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let path = self.output_path(dir);
        let mut out = BufWriter::new(File::create(&path)?);
        let written = write_documents(&mut out, output, self.config.output_format)
            .and_then(|written| {
                out.flush()?;
                Ok(written)
            });
        match written {
            Ok(written) => {
                info!(etl_name = ETL_NAME, documents = written; "Documents written");
                Ok(())
            },
            Err(err) => {
                drop(out);
                Err(discard_partial_output(&path, err))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Postcode;
    use pretty_assertions::assert_eq;

    const OSM: &str = r#"<osm version="0.6">
  <bounds minlat="47.4" minlon="18.9" maxlat="47.6" maxlon="19.2"/>
  <node id="1" lat="47.4979" lon="19.0402" user="anna">
    <tag k="addr:street" v="kucsma"/>
    <tag k="addr:postcode" v="H-1052"/>
    <tag k="phone" v="06 1 234 5678"/>
  </node>
  <way id="2" user="bela">
    <nd ref="1"/>
    <tag k="highway" v="footway"/>
  </way>
</osm>"#;

    fn documents(xml: &str) -> Documents<&[u8]> {
        Documents::new(OsmElements::from_reader(xml.as_bytes()), Transformer::new().unwrap())
    }

    #[test]
    fn transforms_map_elements_only() {
        let docs = documents(OSM).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(docs.len(), 2);

        let address = docs[0].address.as_ref().unwrap();
        assert_eq!(address.street.as_deref(), Some("Kucsma"));
        assert_eq!(address.postcode, Some(Postcode::Code(1052)));
        assert_eq!(docs[0].property("phone"), Some("+36 1 234 5678"));

        assert_eq!(docs[1].element_type, "way");
        assert_eq!(docs[1].node_refs, Some(vec!["1".to_string()]));
        assert_eq!(docs[1].address, None);
    }

    #[test]
    fn writes_one_document_per_line() {
        let mut out = Vec::new();
        let written = write_documents(&mut out, documents(OSM), OutputFormat::Ndjson).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(written, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["address"]["postcode"], 1052);
        assert_eq!(first["created"]["user"], "anna");
    }

    #[test]
    fn writes_array() {
        let mut out = Vec::new();
        write_documents(&mut out, documents(OSM), OutputFormat::Array).unwrap();
        let docs: Vec<NormalizedDocument> = serde_json::from_slice(&out).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].property("highway"), Some("footway"));
    }

    #[test]
    fn empty_array_is_valid_json() {
        let mut out = Vec::new();
        write_documents(&mut out, documents("<osm/>"), OutputFormat::Array).unwrap();
        let docs: Vec<NormalizedDocument> = serde_json::from_slice(&out).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn keeps_write_error_when_cleanup_fails() {
        // A directory cannot be removed as a file, so the cleanup fails.
        let dir = tempfile::TempDir::new().unwrap();
        let err = discard_partial_output(dir.path(), Error::from("Postcode 'x' is not a number"));
        assert_eq!(err.message, "Postcode 'x' is not a number");
        assert!(dir.path().exists());
    }

    #[test]
    fn removes_partial_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("documents.ndjson");
        std::fs::write(&path, "{}\n").unwrap();
        let err = discard_partial_output(&path, Error::from("bad postcode"));
        assert_eq!(err.message, "bad postcode");
        assert!(!path.exists());
    }

    #[test]
    fn stops_at_unparseable_postcode() {
        let xml = r#"<osm>
  <node id="1"><tag k="addr:postcode" v="unknown"/></node>
  <node id="2"/>
</osm>"#;
        let mut out = Vec::new();
        let err = write_documents(&mut out, documents(xml), OutputFormat::Ndjson).unwrap_err();
        assert!(err.message.contains("node 1"));
        assert!(out.is_empty());
    }
}
