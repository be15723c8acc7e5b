use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::osm::RawElement;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    BadStreetName,
    BadPostcode,
    BadCoordinate,
    BadEmail,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ValidationFinding {
    pub category: FindingCategory,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TagCount {
    pub count: usize,
    pub attributes: BTreeMap<String, usize>,
}

/// Occurrences of every element name in the file, with per-attribute counts.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ElementCounts(pub BTreeMap<String, TagCount>);

impl ElementCounts {
    /// Counts `element` alone, without its children.
    pub fn count_one(&mut self, element: &RawElement) {
        let entry = self.0.entry(element.kind.name().to_string()).or_default();
        entry.count += 1;
        for attribute in element.attributes.keys() {
            *entry.attributes.entry(attribute.clone()).or_default() += 1;
        }
    }

    /// Counts `element` and everything nested in it.
    pub fn count(&mut self, element: &RawElement) {
        self.count_one(element);
        for child in &element.children {
            self.count(child);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TagCount> {
        self.0.get(name)
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct PostcodeSummary {
    pub count: usize,
    pub streets: Vec<String>,
}

/// Everything one audit pass collects.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub element_counts: ElementCounts,
    pub street_names: BTreeMap<String, usize>,
    pub findings: Vec<ValidationFinding>,
}

impl AuditReport {
    pub fn record(&mut self, category: FindingCategory, value: impl Into<String>, context: Option<String>) {
        self.findings.push(ValidationFinding {
            category,
            value: value.into(),
            context,
        });
    }

    pub fn findings_of(&self, category: FindingCategory) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(move |finding| finding.category == category)
    }

    pub fn unexpected_street_names(&self) -> BTreeSet<&str> {
        self.findings_of(FindingCategory::BadStreetName)
            .map(|finding| finding.value.as_str())
            .collect()
    }

    pub fn unexpected_postcodes(&self) -> BTreeMap<&str, PostcodeSummary> {
        let mut postcodes: BTreeMap<&str, PostcodeSummary> = BTreeMap::new();
        for finding in self.findings_of(FindingCategory::BadPostcode) {
            let summary = postcodes.entry(finding.value.as_str()).or_default();
            summary.count += 1;
            if let Some(street) = &finding.context {
                summary.streets.push(street.clone());
            }
        }
        postcodes
    }

    /// Distinct bad coordinates in the order they were first seen.
    pub fn unexpected_coordinates(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.findings_of(FindingCategory::BadCoordinate)
            .map(|finding| finding.value.as_str())
            .filter(|value| seen.insert(*value))
            .collect()
    }

    pub fn invalid_emails(&self) -> BTreeSet<&str> {
        self.findings_of(FindingCategory::BadEmail)
            .map(|finding| finding.value.as_str())
            .collect()
    }

    pub fn summary(&self) -> AuditSummary<'_> {
        AuditSummary {
            tag_counts: &self.element_counts,
            street_names: &self.street_names,
            unexpected_street_names: self.unexpected_street_names(),
            unexpected_postcodes: self.unexpected_postcodes(),
            unexpected_coordinates: self.unexpected_coordinates(),
            invalid_emails: self.invalid_emails(),
        }
    }
}

/// Printable view of an [`AuditReport`], one field per report section.
#[derive(Serialize, Debug)]
pub struct AuditSummary<'a> {
    pub tag_counts: &'a ElementCounts,
    pub street_names: &'a BTreeMap<String, usize>,
    pub unexpected_street_names: BTreeSet<&'a str>,
    pub unexpected_postcodes: BTreeMap<&'a str, PostcodeSummary>,
    pub unexpected_coordinates: Vec<&'a str>,
    pub invalid_emails: BTreeSet<&'a str>,
}
