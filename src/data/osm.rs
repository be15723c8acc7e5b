use std::{collections::HashMap, str};

use quick_xml::events::BytesStart;

use crate::errors::Result;

/// Element names as they appear in the .osm file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
    Tag,
    NdRef,
    Member,
    Other(String),
}

impl ElementKind {
    pub fn from_name(name: &[u8]) -> Result<ElementKind> {
        Ok(match name {
            b"node" => ElementKind::Node,
            b"way" => ElementKind::Way,
            b"relation" => ElementKind::Relation,
            b"tag" => ElementKind::Tag,
            b"nd" => ElementKind::NdRef,
            b"member" => ElementKind::Member,
            other => ElementKind::Other(str::from_utf8(other)?.to_string()),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
            ElementKind::Tag => "tag",
            ElementKind::NdRef => "nd",
            ElementKind::Member => "member",
            ElementKind::Other(name) => name,
        }
    }

    /// Nodes, ways and relations are the only elements that become documents.
    pub fn is_map_element(&self) -> bool {
        matches!(self, ElementKind::Node | ElementKind::Way | ElementKind::Relation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub kind: ElementKind,
    pub attributes: HashMap<String, String>,
    pub children: Vec<RawElement>,
}

impl RawElement {
    pub fn new(kind: ElementKind) -> RawElement {
        RawElement {
            kind,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn from_start(el: &BytesStart) -> Result<RawElement> {
        let mut element = RawElement::new(ElementKind::from_name(el.name().as_ref())?);
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let key = str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            element.attributes.insert(key, value);
        }
        Ok(element)
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> RawElement {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_child(mut self, child: RawElement) -> RawElement {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// `(k, v)` pairs of the `<tag>` children, in document order. Tags missing
    /// either attribute are skipped.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.children.iter()
            .filter(|child| child.kind == ElementKind::Tag)
            .filter_map(|tag| Some((tag.attribute("k")?, tag.attribute("v")?)))
    }

    /// Value of the first tag with key `key`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// Keys of document fields built from more than one source value. A tag with
/// one of these keys would clash with the structured field.
pub const RESERVED_KEYS: [&str; 6] = ["type", "created", "position", "address", "node_refs", "members"];

const ADDRESS_PREFIX: &str = "addr:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKey<'a> {
    /// `addr:<component>` where the component has no further `:` segments.
    Address(&'a str),
    Scalar(&'a str),
    Unrecognized,
}

impl<'a> TagKey<'a> {
    pub fn parse(key: &'a str) -> TagKey<'a> {
        if key.is_empty() || RESERVED_KEYS.contains(&key) {
            return TagKey::Unrecognized;
        }
        match key.strip_prefix(ADDRESS_PREFIX) {
            Some(component) if !component.contains(':') => TagKey::Address(component),
            _ => TagKey::Scalar(key),
        }
    }
}
