use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::RawElement;
use crate::errors::Result;

/// Opens an .osm file, decompressing it on the fly when it ends in `.xz`.
pub fn open_osm_file(path: &Path) -> Result<OsmElements<Box<dyn BufRead>>> {
    let file = fs::File::open(path)
        .map_err(|err| format!("Could not open {}: {}", path.display(), err))?;
    let file_reader = BufReader::new(file);
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
        Box::new(BufReader::new(XzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };
    Ok(OsmElements::from_reader(reader))
}

/// Streams the top level map elements of an .osm document.
///
/// Every child of the document root (`<osm>`) is yielded once its closing tag
/// has been read, with its `<tag>`, `<nd>` and `<member>` children attached.
/// The root itself is kept aside and available through [`OsmElements::root`].
pub struct OsmElements<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    stack: Vec<RawElement>,
    root: Option<RawElement>,
    done: bool,
}

impl<R: BufRead> OsmElements<R> {
    pub fn from_reader(inner: R) -> OsmElements<R> {
        let mut reader = Reader::from_reader(inner);
        reader.trim_text(true);
        OsmElements {
            reader,
            buf: Vec::new(),
            stack: Vec::new(),
            root: None,
            done: false,
        }
    }

    /// The document root without its children, once it has been read.
    pub fn root(&self) -> Option<&RawElement> {
        self.root.as_ref()
    }

    /// Places a finished element in the tree. Returns it if it is complete and
    /// should be handed out.
    fn close(&mut self, element: RawElement) -> Option<RawElement> {
        if self.stack.is_empty() {
            return element.kind.is_map_element().then_some(element);
        }
        if self.stack.len() == 1 && self.root.is_some() {
            return Some(element);
        }
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(element);
        }
        None
    }

    fn next_element(&mut self) -> Result<Option<RawElement>> {
        loop {
            self.buf.clear();
            let closed = match self.reader.read_event_into(&mut self.buf)? {
                Event::Eof => {
                    if !self.stack.is_empty() {
                        return Err("Unexpected end of file inside an element".into());
                    }
                    return Ok(None);
                },
                Event::Start(e) => {
                    let element = RawElement::from_start(&e)?;
                    if self.stack.is_empty() && !element.kind.is_map_element() {
                        self.root = Some(element.clone());
                    }
                    self.stack.push(element);
                    None
                },
                Event::Empty(e) => {
                    let element = RawElement::from_start(&e)?;
                    if self.stack.is_empty() && !element.kind.is_map_element() {
                        self.root = Some(element.clone());
                    }
                    Some(element)
                },
                Event::End(_e) => {
                    Some(self.stack.pop().ok_or("Closing tag without an opening tag")?)
                },
                event => {
                    debug!(event = format!("{:?}", event); "Ignoring event");
                    None
                },
            };
            if let Some(element) = closed {
                if let Some(done) = self.close(element) {
                    return Ok(Some(done));
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmElements<R> {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ElementKind;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="osmconvert">
  <bounds minlat="47.4" minlon="18.9" maxlat="47.6" maxlon="19.2"/>
  <node id="1" lat="47.4979" lon="19.0402" user="anna" uid="11"/>
  <node id="2" lat="47.5" lon="19.05" user="bela" uid="12">
    <tag k="amenity" v="restaurant"/>
    <tag k="name" v="Kis &amp; Nagy"/>
  </node>
  <way id="10" user="anna">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
  <relation id="20">
    <member type="way" ref="10" role="outer"/>
  </relation>
</osm>
"#;

    fn read_all(xml: &str) -> Vec<RawElement> {
        OsmElements::from_reader(xml.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn yields_root_children() {
        let elements = read_all(SAMPLE);
        let kinds: Vec<&str> = elements.iter().map(|el| el.kind.name()).collect();
        assert_eq!(kinds, vec!["bounds", "node", "node", "way", "relation"]);
    }

    #[test]
    fn attaches_children_in_order() {
        let elements = read_all(SAMPLE);

        let node = &elements[2];
        assert_eq!(node.attribute("id"), Some("2"));
        assert_eq!(node.tag("name"), Some("Kis & Nagy"));

        let way = &elements[3];
        let refs: Vec<&str> = way.children.iter()
            .filter(|child| child.kind == ElementKind::NdRef)
            .filter_map(|child| child.attribute("ref"))
            .collect();
        assert_eq!(refs, vec!["1", "2"]);

        let relation = &elements[4];
        assert_eq!(relation.children[0].kind, ElementKind::Member);
        assert_eq!(relation.children[0].attribute("role"), Some("outer"));
    }

    #[test]
    fn keeps_root_aside() {
        let mut elements = OsmElements::from_reader(SAMPLE.as_bytes());
        assert!(elements.next().is_some());
        let root = elements.root().unwrap();
        assert_eq!(root.kind, ElementKind::Other("osm".to_string()));
        assert_eq!(root.attribute("version"), Some("0.6"));
        assert!(root.children.is_empty());
    }

    #[test]
    fn bare_map_element_as_root() {
        let elements = read_all(r#"<node id="5" lat="47.5" lon="19.0"><tag k="a" v="b"/></node>"#);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].tag("a"), Some("b"));
    }

    #[test]
    fn truncated_document_is_an_error() {
        let results: Vec<Result<RawElement>> =
            OsmElements::from_reader(r#"<osm><node id="1">"#.as_bytes()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
