use std::{collections::BTreeMap, fmt};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::osm::{ElementKind, RawElement, TagKey};

/// Document written for each node, way and relation. Field names and nesting
/// are what the queries group on, so they must stay stable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct NormalizedDocument {
    #[serde(rename = "type")]
    pub element_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Created>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_refs: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<BTreeMap<String, String>>>,

    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Created {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset: Option<String>,
}

impl Created {
    pub const KEYS: [&'static str; 5] = ["user", "uid", "timestamp", "version", "changeset"];

    fn field_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "user" => Some(&mut self.user),
            "uid" => Some(&mut self.uid),
            "timestamp" => Some(&mut self.timestamp),
            "version" => Some(&mut self.version),
            "changeset" => Some(&mut self.changeset),
            _ => None,
        }
    }

    fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("user", &self.user),
            ("uid", &self.uid),
            ("timestamp", &self.timestamp),
            ("version", &self.version),
            ("changeset", &self.changeset),
        ]
        .into_iter()
        .filter_map(|(key, value)| Some((key, value.as_deref()?)))
    }
}

/// `[lat, lon]`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Position(pub f64, pub f64);

impl Position {
    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lon(&self) -> f64 {
        self.1
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<Postcode>,

    #[serde(flatten)]
    pub components: BTreeMap<String, String>,
}

impl Address {
    fn insert(&mut self, component: &str, value: &str) {
        match component {
            "street" => self.street = Some(value.to_string()),
            "postcode" => self.postcode = Some(Postcode::Raw(value.to_string())),
            _ => {
                self.components.insert(component.to_string(), value.to_string());
            },
        }
    }
}

/// Postcodes are read as text and become numbers once corrected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum Postcode {
    Code(u32),
    Raw(String),
}

impl fmt::Display for Postcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Postcode::Code(code) => write!(f, "{}", code),
            Postcode::Raw(raw) => f.write_str(raw),
        }
    }
}

impl NormalizedDocument {
    /// Builds the document for a node, way or relation. Other elements have
    /// no document and give `None`.
    pub fn shape(element: &RawElement) -> Option<NormalizedDocument> {
        if !element.kind.is_map_element() {
            return None;
        }

        let mut doc = NormalizedDocument {
            element_type: element.kind.name().to_string(),
            ..Default::default()
        };

        let mut created = Created::default();
        let mut has_created = false;
        for (key, value) in &element.attributes {
            if let Some(field) = created.field_mut(key) {
                *field = Some(value.clone());
                has_created = true;
            } else if key != "lat" && key != "lon" {
                doc.properties.insert(key.clone(), value.clone());
            }
        }
        if has_created {
            doc.created = Some(created);
        }
        doc.position = Self::shape_position(element);

        for child in &element.children {
            match child.kind {
                ElementKind::Tag => doc.add_tag(child),
                ElementKind::NdRef => {
                    if let Some(node_ref) = child.attribute("ref") {
                        doc.node_refs.get_or_insert_with(Vec::new).push(node_ref.to_string());
                    }
                },
                ElementKind::Member => {
                    let member = child.attributes.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    doc.members.get_or_insert_with(Vec::new).push(member);
                },
                _ => (),
            }
        }

        Some(doc)
    }

    fn shape_position(element: &RawElement) -> Option<Position> {
        let lat = element.attribute("lat")?;
        let lon = element.attribute("lon")?;
        match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Some(Position(lat, lon)),
            _ => {
                warn!(element = element.kind.name(), lat = lat, lon = lon; "Dropping unparseable position");
                None
            },
        }
    }

    fn add_tag(&mut self, tag: &RawElement) {
        let (Some(key), Some(value)) = (tag.attribute("k"), tag.attribute("v")) else {
            return;
        };
        match TagKey::parse(key) {
            TagKey::Address(component) => {
                self.address.get_or_insert_with(Address::default).insert(component, value);
            },
            TagKey::Scalar(name) => {
                self.properties.insert(name.to_string(), value.to_string());
            },
            TagKey::Unrecognized => {
                // Nearly every relation carries `type`, so this is too common to warn about.
                debug!(element = self.element_type.as_str(), key = key; "Skipping tag with reserved or empty key");
            },
        }
    }

    /// Turns the document back into an element. Position and `created` go back
    /// to attributes, as does `id`; every other field becomes a `<tag>`.
    pub fn flatten(&self) -> RawElement {
        let kind = ElementKind::from_name(self.element_type.as_bytes())
            .unwrap_or_else(|_| ElementKind::Other(self.element_type.clone()));
        let mut element = RawElement::new(kind);

        if let Some(created) = &self.created {
            for (key, value) in created.entries() {
                element.attributes.insert(key.to_string(), value.to_string());
            }
        }
        if let Some(position) = &self.position {
            element.attributes.insert("lat".to_string(), position.lat().to_string());
            element.attributes.insert("lon".to_string(), position.lon().to_string());
        }
        for (key, value) in &self.properties {
            if key == "id" {
                element.attributes.insert(key.clone(), value.clone());
            } else {
                element.children.push(tag_element(key, value));
            }
        }
        if let Some(address) = &self.address {
            if let Some(street) = &address.street {
                element.children.push(tag_element("addr:street", street));
            }
            if let Some(postcode) = &address.postcode {
                element.children.push(tag_element("addr:postcode", &postcode.to_string()));
            }
            for (component, value) in &address.components {
                element.children.push(tag_element(&format!("addr:{}", component), value));
            }
        }
        for node_ref in self.node_refs.iter().flatten() {
            element.children.push(RawElement::new(ElementKind::NdRef).with_attribute("ref", node_ref));
        }
        for member in self.members.iter().flatten() {
            let mut member_el = RawElement::new(ElementKind::Member);
            member_el.attributes.extend(member.iter().map(|(k, v)| (k.clone(), v.clone())));
            element.children.push(member_el);
        }
        element
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

fn tag_element(key: &str, value: &str) -> RawElement {
    RawElement::new(ElementKind::Tag)
        .with_attribute("k", key)
        .with_attribute("v", value)
}
