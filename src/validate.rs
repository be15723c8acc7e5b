use std::{collections::HashSet, io::BufRead};

use log::warn;
use regex::Regex;

use crate::config::ExpectedArea;
use crate::data::{AuditReport, ElementCounts, FindingCategory, RawElement};
use crate::errors::Result;

/// Reads the street-type reference list. Each line looks like
/// `utca: Váci utca, Andrássy utca`; the text before the first colon is the type.
pub fn load_street_types(reader: impl BufRead) -> Result<HashSet<String>> {
    let mut street_types = HashSet::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((street_type, _)) if !street_type.trim().is_empty() => {
                street_types.insert(street_type.trim().to_string());
            },
            _ => warn!(line = line_no + 1, content = line.as_str(); "Skipping street type line without a type"),
        }
    }
    Ok(street_types)
}

/// Tallies every element in `elements`, children included. This is the
/// standalone counting pass; [`Validator::audit_element`] counts as it audits,
/// so a full audit does not need it.
pub fn count_elements<'a>(elements: impl IntoIterator<Item = &'a RawElement>) -> ElementCounts {
    let mut counts = ElementCounts::default();
    for element in elements {
        counts.count(element);
    }
    counts
}

pub fn classify_postcode(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) || bytes[0] != b'1' {
        return false;
    }
    let district = (bytes[1] - b'0') * 10 + (bytes[2] - b'0');
    district <= 23
}

pub fn classify_coordinates(lat: f64, lon: f64, expected: &ExpectedArea) -> bool {
    (lat * 10.0).round() == (expected.lat * 10.0).round()
        && lon.round() == expected.lon.round()
}

pub struct Validator {
    street_types: HashSet<String>,
    expected_area: ExpectedArea,
    street_type_re: Regex,
    email_re: Regex,
}

impl Validator {
    pub fn new(street_types: HashSet<String>, expected_area: ExpectedArea) -> Result<Validator> {
        Ok(Validator {
            street_types,
            expected_area,
            street_type_re: Regex::new(r".*\s(.*)$")?,
            email_re: Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,5}$")?,
        })
    }

    /// A street name is proper when its last word is a known street type.
    pub fn classify_street_name(&self, name: &str) -> bool {
        match self.street_type_re.captures(name).and_then(|captures| captures.get(1)) {
            Some(street_type) => self.street_types.contains(street_type.as_str()),
            None => false,
        }
    }

    pub fn classify_email(&self, address: &str) -> bool {
        self.email_re.is_match(address)
    }

    pub fn audit<I>(&self, elements: I) -> Result<AuditReport>
    where
        I: IntoIterator<Item = Result<RawElement>>,
    {
        let mut report = AuditReport::default();
        for element in elements {
            self.audit_element(&element?, &mut report);
        }
        Ok(report)
    }

    pub fn audit_element(&self, element: &RawElement, report: &mut AuditReport) {
        report.element_counts.count(element);
        if !element.kind.is_map_element() {
            return;
        }

        for (key, value) in element.tags() {
            match key {
                "addr:street" => {
                    *report.street_names.entry(value.to_string()).or_default() += 1;
                    if !self.classify_street_name(value) {
                        report.record(FindingCategory::BadStreetName, value, None);
                    }
                },
                "addr:postcode" => {
                    if !classify_postcode(value) {
                        let street = element.tag("addr:street").map(str::to_string);
                        report.record(FindingCategory::BadPostcode, value, street);
                    }
                },
                "email" | "contact:email" => {
                    if !self.classify_email(value) {
                        report.record(FindingCategory::BadEmail, value, None);
                    }
                },
                _ => (),
            }
        }

        if let (Some(lat), Some(lon)) = (element.attribute("lat"), element.attribute("lon")) {
            let valid = match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
                (Ok(lat), Ok(lon)) => classify_coordinates(lat, lon, &self.expected_area),
                _ => false,
            };
            if !valid {
                report.record(FindingCategory::BadCoordinate, format!("{},{}", lat, lon), None);
            }
        }
    }
}
