use std::{collections::BTreeMap, fmt};

use log::warn;
use regex::Regex;

use crate::data::{NormalizedDocument, Postcode, RawElement};
use crate::errors::Result;

/// Street names in the extract that lost their street type, with the type to
/// append. Checked by exact match before the general case rule.
pub const KNOWN_STREET_OVERRIDES: &[(&str, &str)] = &[
    ("Kucsma", "utca"),
];

/// Country marker some postcodes carry, e.g. `H-1082`.
pub const POSTCODE_COUNTRY_PREFIX: &str = "H-";

/// One-off typos in the extract: the district digits were swapped.
pub const POSTCODE_REMAPS: &[(&str, u32)] = &[
    ("1503", 1053),
    ("1507", 1057),
];

const PHONE_PREFIX: &str = "+36";
const PHONE_SEPARATORS: [char; 4] = ['/', '(', ')', '-'];
const TRUNK_PREFIXES: [&str; 3] = ["0036", "+06", "06"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostcodeError {
    pub value: String,
}

impl fmt::Display for PostcodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Postcode '{}' is not a number", self.value)
    }
}

impl std::error::Error for PostcodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneFormatError {
    pub value: String,
}

impl fmt::Display for PhoneFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phone number '{}' does not fit +36 X XXX XXXX or +36 XX XXX XXXX", self.value)
    }
}

impl std::error::Error for PhoneFormatError {}

pub fn correct_postcode(raw: &str) -> std::result::Result<u32, PostcodeError> {
    let parse = |value: &str| value.trim().parse::<u32>().map_err(|_| PostcodeError {
        value: raw.to_string(),
    });

    if let Some(code) = raw.strip_prefix(POSTCODE_COUNTRY_PREFIX) {
        return parse(code);
    }
    if let Some((_, code)) = POSTCODE_REMAPS.iter().find(|(bad, _)| *bad == raw.trim()) {
        return Ok(*code);
    }
    parse(raw)
}

fn rewrite_trunk_prefix(number: &str) -> String {
    for prefix in TRUNK_PREFIXES {
        if let Some(rest) = number.strip_prefix(prefix) {
            return format!("{}{}", PHONE_PREFIX, rest);
        }
    }
    // Country code written without the plus sign.
    if let Some(rest) = number.strip_prefix("36") {
        if (rest.len() == 8 || rest.len() == 9) && rest.bytes().all(|b| b.is_ascii_digit()) {
            return format!("{}{}", PHONE_PREFIX, rest);
        }
    }
    number.to_string()
}

/// Shapes a document out of a raw element and applies the correction rules.
#[derive(Debug, Clone)]
pub struct Transformer {
    street_overrides: BTreeMap<String, String>,
    canonical_phone_re: Regex,
}

impl Transformer {
    pub fn new() -> Result<Transformer> {
        let overrides = KNOWN_STREET_OVERRIDES.iter()
            .map(|(name, street_type)| (name.to_string(), street_type.to_string()))
            .collect();
        Transformer::with_street_overrides(overrides)
    }

    pub fn with_street_overrides(street_overrides: BTreeMap<String, String>) -> Result<Transformer> {
        Ok(Transformer {
            street_overrides,
            canonical_phone_re: Regex::new(r"^\+36 (1|\d{2}) \d{3} \d{4}$")?,
        })
    }

    pub fn correct_street_name(&self, name: &str) -> String {
        if let Some(street_type) = self.street_overrides.get(name) {
            return format!("{} {}", name, street_type);
        }
        if name.to_lowercase() == name {
            let mut chars = name.chars();
            if let Some(first) = chars.next() {
                return first.to_uppercase().chain(chars).collect();
            }
        }
        name.to_string()
    }

    pub fn format_phone(&self, raw: &str) -> std::result::Result<String, PhoneFormatError> {
        if self.canonical_phone_re.is_match(raw) {
            return Ok(raw.to_string());
        }
        let fail = || PhoneFormatError { value: raw.to_string() };

        let stripped: String = raw.chars()
            .filter(|c| !c.is_whitespace() && !PHONE_SEPARATORS.contains(c))
            .collect();
        let mut number = rewrite_trunk_prefix(&stripped);
        if !number.starts_with(PHONE_PREFIX)
            && (number.len() == 8 || number.len() == 9)
            && number.bytes().all(|b| b.is_ascii_digit())
        {
            number = format!("{}{}", PHONE_PREFIX, number);
        }

        let digits = number.strip_prefix(PHONE_PREFIX).ok_or_else(fail)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail());
        }
        match number.len() {
            11 if digits.starts_with('1') => Ok(format!(
                "{} {} {} {}", PHONE_PREFIX, &digits[..1], &digits[1..4], &digits[4..],
            )),
            12 => Ok(format!(
                "{} {} {} {}", PHONE_PREFIX, &digits[..2], &digits[2..5], &digits[5..],
            )),
            _ => Err(fail()),
        }
    }

    /// Fixes street, postcode and phone in place. Only an unusable postcode is
    /// an error; a phone number that cannot be formatted is logged and kept.
    pub fn correct_document(&self, mut doc: NormalizedDocument) -> Result<NormalizedDocument> {
        if let Some(address) = doc.address.as_mut() {
            if let Some(street) = address.street.as_mut() {
                *street = self.correct_street_name(street);
            }
            let corrected = match &address.postcode {
                Some(Postcode::Raw(raw)) => Some(correct_postcode(raw).map_err(|err| {
                    format!(
                        "{} on {} {}",
                        err,
                        doc.element_type,
                        doc.properties.get("id").map(String::as_str).unwrap_or("without id"),
                    )
                })?),
                _ => None,
            };
            if let Some(code) = corrected {
                address.postcode = Some(Postcode::Code(code));
            }
        }

        if let Some(phone) = doc.properties.get_mut("phone") {
            match self.format_phone(phone) {
                Ok(formatted) => *phone = formatted,
                Err(err) => {
                    let message = err.to_string();
                    warn!(phone = phone.as_str(), err = message; "Keeping unformatted phone number");
                },
            }
        }
        Ok(doc)
    }

    /// `None` for elements that are not nodes, ways or relations.
    pub fn transform_element(&self, element: &RawElement) -> Result<Option<NormalizedDocument>> {
        match NormalizedDocument::shape(element) {
            Some(doc) => Ok(Some(self.correct_document(doc)?)),
            None => Ok(None),
        }
    }
}
