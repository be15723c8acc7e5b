pub mod audit;
pub mod document;
pub mod osm;

pub use self::audit::{AuditReport, ElementCounts, FindingCategory, ValidationFinding};
pub use self::document::{Address, Created, NormalizedDocument, Position, Postcode};
pub use self::osm::{ElementKind, RawElement, TagKey};
