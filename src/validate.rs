//! Per-kind validators and transformers
//!
//! Each validator type-checks a raw gateway payload and returns the canonical
//! record, or a `SchemaValidation` error the retry engine treats as a failed
//! attempt. Transformers only normalize; they never reject.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::cid::ContentIdentifier;
use crate::error::{ResolverError, Result};
use crate::types::{
    AddressRecord, LinkReference, MetadataRecord, PropertyRecord, RelationKind, RelationLinks,
    RelationshipRecord,
};

/// Kind of document fetched from a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Metadata,
    Relationship,
    Address,
    Property,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Metadata => "metadata",
            DocumentKind::Relationship => "relationship",
            DocumentKind::Address => "address",
            DocumentKind::Property => "property",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, normalized document
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Metadata(MetadataRecord),
    Relationship(RelationshipRecord),
    Address(AddressRecord),
    Property(PropertyRecord),
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Document::Metadata(_) => DocumentKind::Metadata,
            Document::Relationship(_) => DocumentKind::Relationship,
            Document::Address(_) => DocumentKind::Address,
            Document::Property(_) => DocumentKind::Property,
        }
    }
}

/// Validate and transform a payload as the given kind.
pub fn validate_document(kind: DocumentKind, value: &Value) -> Result<Document> {
    match kind {
        DocumentKind::Metadata => validate_metadata(value).map(Document::Metadata),
        DocumentKind::Relationship => validate_relationship(value).map(Document::Relationship),
        DocumentKind::Address => {
            validate_address(value).map(|a| Document::Address(normalize_address(a)))
        }
        DocumentKind::Property => {
            validate_property(value).map(|p| Document::Property(normalize_property(p)))
        }
    }
}

// ============================================================================
// Validators
// ============================================================================

pub fn validate_metadata(value: &Value) -> Result<MetadataRecord> {
    let record: MetadataRecord = parse_object(DocumentKind::Metadata, value)?;

    for (name, links) in &record.relationships {
        let Some(kind) = RelationKind::from_name(name) else {
            debug!(relation = %name, "Ignoring unknown relation");
            continue;
        };

        if links.cardinality() != kind.cardinality() {
            return Err(ResolverError::schema(
                "metadata",
                format!(
                    "relation {} expects {:?} links, got {:?}",
                    name,
                    kind.cardinality(),
                    links.cardinality()
                ),
            ));
        }

        match links {
            RelationLinks::Single(link) => check_link("metadata", link)?,
            RelationLinks::Multi(items) => {
                for link in items {
                    check_link("metadata", link)?;
                }
            }
        }
    }

    Ok(record)
}

pub fn validate_relationship(value: &Value) -> Result<RelationshipRecord> {
    let record: RelationshipRecord = parse_object(DocumentKind::Relationship, value)?;

    check_link("relationship", &record.to)?;
    if let Some(ref from) = record.from {
        check_link("relationship", from)?;
    }

    Ok(record)
}

pub fn validate_address(value: &Value) -> Result<AddressRecord> {
    let record: AddressRecord = parse_object(DocumentKind::Address, value)?;

    if let Some(lat) = record.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ResolverError::schema("address", format!("latitude {} out of range", lat)));
        }
    }
    if let Some(lon) = record.longitude {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ResolverError::schema("address", format!("longitude {} out of range", lon)));
        }
    }

    Ok(record)
}

pub fn validate_property(value: &Value) -> Result<PropertyRecord> {
    parse_object(DocumentKind::Property, value)
}

fn parse_object<T: DeserializeOwned>(kind: DocumentKind, value: &Value) -> Result<T> {
    if !value.is_object() {
        return Err(ResolverError::schema(kind.as_str(), "expected a JSON object"));
    }
    T::deserialize(value).map_err(|e| ResolverError::schema(kind.as_str(), e.to_string()))
}

fn check_link(kind: &'static str, link: &LinkReference) -> Result<()> {
    ContentIdentifier::parse(link.target.as_str())
        .map(|_| ())
        .map_err(|e| ResolverError::schema(kind, e.to_string()))
}

// ============================================================================
// Transformers
// ============================================================================

pub fn normalize_address(mut record: AddressRecord) -> AddressRecord {
    for field in [
        &mut record.street_number,
        &mut record.street_pre_directional_text,
        &mut record.street_name,
        &mut record.street_suffix_type,
        &mut record.street_post_directional_text,
        &mut record.unit_identifier,
        &mut record.city_name,
        &mut record.municipality_name,
        &mut record.county_name,
        &mut record.postal_code,
        &mut record.plus_four_postal_code,
        &mut record.unnormalized_address,
    ] {
        trim_in_place(field);
    }

    for code in [&mut record.state_code, &mut record.country_code] {
        if let Some(value) = code.as_mut() {
            *value = value.trim().to_ascii_uppercase();
        }
    }

    record
}

pub fn normalize_property(mut record: PropertyRecord) -> PropertyRecord {
    for field in [
        &mut record.parcel_identifier,
        &mut record.property_type,
        &mut record.livable_floor_area,
        &mut record.total_area,
        &mut record.number_of_units_type,
        &mut record.area_under_air,
        &mut record.zoning,
        &mut record.subdivision,
        &mut record.property_legal_description_text,
        &mut record.request_identifier,
    ] {
        trim_in_place(field);
    }
    record
}

fn trim_in_place(field: &mut Option<String>) {
    if let Some(value) = field.as_mut() {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }
}
