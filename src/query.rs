//! Canned aggregations over the transformed documents: counts by type,
//! busiest postcodes, contributors, amenities and restaurant cuisines.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::data::NormalizedDocument;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub key: String,
    pub count: usize,
}

/// Groups `keys` and returns the `limit` largest groups, largest first. Equal
/// counts are ordered by key.
pub fn top_n<I, K>(keys: I, limit: usize) -> Vec<GroupCount>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key.into()).or_default() += 1;
    }
    let mut groups: Vec<GroupCount> = counts.into_iter()
        .map(|(key, count)| GroupCount { key, count })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    groups.truncate(limit);
    groups
}

fn user(doc: &NormalizedDocument) -> Option<&str> {
    doc.created.as_ref()?.user.as_deref()
}

pub fn count_by_type(docs: &[NormalizedDocument]) -> Vec<GroupCount> {
    top_n(docs.iter().map(|doc| doc.element_type.as_str()), usize::MAX)
}

pub fn top_postcodes(docs: &[NormalizedDocument], limit: usize) -> Vec<GroupCount> {
    let postcodes = docs.iter()
        .filter_map(|doc| doc.address.as_ref()?.postcode.as_ref())
        .map(|postcode| postcode.to_string());
    top_n(postcodes, limit)
}

pub fn top_streets(docs: &[NormalizedDocument], limit: usize) -> Vec<GroupCount> {
    let streets = docs.iter().filter_map(|doc| doc.address.as_ref()?.street.as_deref());
    top_n(streets, limit)
}

pub fn distinct_users(docs: &[NormalizedDocument]) -> usize {
    docs.iter().filter_map(user).collect::<BTreeSet<_>>().len()
}

pub fn top_users(docs: &[NormalizedDocument], limit: usize) -> Vec<GroupCount> {
    top_n(docs.iter().filter_map(user), limit)
}

pub fn amenity_count(docs: &[NormalizedDocument]) -> usize {
    docs.iter().filter(|doc| doc.property("amenity").is_some()).count()
}

pub fn top_amenities(docs: &[NormalizedDocument], limit: usize) -> Vec<GroupCount> {
    top_n(docs.iter().filter_map(|doc| doc.property("amenity")), limit)
}

pub fn top_cuisines(docs: &[NormalizedDocument], limit: usize) -> Vec<GroupCount> {
    let cuisines = docs.iter()
        .filter(|doc| doc.property("amenity") == Some("restaurant"))
        .filter_map(|doc| doc.property("cuisine"));
    top_n(cuisines, limit)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueryReport {
    pub document_count: usize,
    pub count_by_type: Vec<GroupCount>,
    pub top_postcodes: Vec<GroupCount>,
    pub top_streets: Vec<GroupCount>,
    pub contributor_count: usize,
    pub top_contributors: Vec<GroupCount>,
    pub amenity_count: usize,
    pub top_amenities: Vec<GroupCount>,
    pub top_cuisines: Vec<GroupCount>,
}

impl QueryReport {
    pub fn run(docs: &[NormalizedDocument], limit: usize) -> QueryReport {
        QueryReport {
            document_count: docs.len(),
            count_by_type: count_by_type(docs),
            top_postcodes: top_postcodes(docs, limit),
            top_streets: top_streets(docs, limit),
            contributor_count: distinct_users(docs),
            top_contributors: top_users(docs, limit),
            amenity_count: amenity_count(docs),
            top_amenities: top_amenities(docs, limit),
            top_cuisines: top_cuisines(docs, limit),
        }
    }
}
