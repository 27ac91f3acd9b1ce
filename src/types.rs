//! Record shapes for the property data link graph
//!
//! Documents reference each other through IPLD-style links (`{"/": "<cid>"}`).
//! A metadata root points at relationship records by relation name, and each
//! relationship points at the leaf documents (address, property, ...) it joins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cid::ContentIdentifier;

// ============================================================================
// Links
// ============================================================================

/// Typed pointer to another document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    #[serde(rename = "/")]
    pub target: ContentIdentifier,
}

impl LinkReference {
    pub fn new(target: ContentIdentifier) -> Self {
        Self { target }
    }
}

/// Relationship between two documents
///
/// `to` is mandatory. `from` may be absent when the origin is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<LinkReference>,
    pub to: LinkReference,
}

// ============================================================================
// Relation vocabulary
// ============================================================================

/// Whether a relation holds one link or an ordered list of links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Multi,
}

/// Relation names a metadata document may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationKind {
    PropertyHasAddress,
    PropertyHasStructure,
    PropertyHasLot,
    PropertyHasTaxHistory,
    PropertyHasUtility,
    PropertyHasFloodStormInformation,
    PropertyHasSalesHistory,
    PersonHasProperty,
    CompanyHasProperty,
    PropertyHasLayout,
    PropertyHasFile,
    DeedHasFile,
    PropertyHasFactSheet,
}

impl RelationKind {
    pub const ALL: [RelationKind; 13] = [
        RelationKind::PropertyHasAddress,
        RelationKind::PropertyHasStructure,
        RelationKind::PropertyHasLot,
        RelationKind::PropertyHasTaxHistory,
        RelationKind::PropertyHasUtility,
        RelationKind::PropertyHasFloodStormInformation,
        RelationKind::PropertyHasSalesHistory,
        RelationKind::PersonHasProperty,
        RelationKind::CompanyHasProperty,
        RelationKind::PropertyHasLayout,
        RelationKind::PropertyHasFile,
        RelationKind::DeedHasFile,
        RelationKind::PropertyHasFactSheet,
    ];

    /// Key used in the metadata `relationships` map
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::PropertyHasAddress => "property_has_address",
            RelationKind::PropertyHasStructure => "property_has_structure",
            RelationKind::PropertyHasLot => "property_has_lot",
            RelationKind::PropertyHasTaxHistory => "property_has_tax_history",
            RelationKind::PropertyHasUtility => "property_has_utility",
            RelationKind::PropertyHasFloodStormInformation => {
                "property_has_flood_storm_information"
            }
            RelationKind::PropertyHasSalesHistory => "property_has_sales_history",
            RelationKind::PersonHasProperty => "person_has_property",
            RelationKind::CompanyHasProperty => "company_has_property",
            RelationKind::PropertyHasLayout => "property_has_layout",
            RelationKind::PropertyHasFile => "property_has_file",
            RelationKind::DeedHasFile => "deed_has_file",
            RelationKind::PropertyHasFactSheet => "property_has_fact_sheet",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            RelationKind::PropertyHasAddress
            | RelationKind::PropertyHasStructure
            | RelationKind::PropertyHasLot
            | RelationKind::PropertyHasUtility
            | RelationKind::PropertyHasFloodStormInformation => Cardinality::Single,
            RelationKind::PropertyHasTaxHistory
            | RelationKind::PropertyHasSalesHistory
            | RelationKind::PersonHasProperty
            | RelationKind::CompanyHasProperty
            | RelationKind::PropertyHasLayout
            | RelationKind::PropertyHasFile
            | RelationKind::DeedHasFile
            | RelationKind::PropertyHasFactSheet => Cardinality::Multi,
        }
    }
}

/// Value of one entry in the metadata `relationships` map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationLinks {
    Single(LinkReference),
    Multi(Vec<LinkReference>),
}

impl RelationLinks {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            RelationLinks::Single(_) => Cardinality::Single,
            RelationLinks::Multi(_) => Cardinality::Multi,
        }
    }

    pub fn targets(&self) -> Vec<&ContentIdentifier> {
        match self {
            RelationLinks::Single(link) => vec![&link.target],
            RelationLinks::Multi(links) => links.iter().map(|l| &l.target).collect(),
        }
    }
}

/// Metadata root of a data submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Domain classification, e.g. "County" or "Seed"
    pub label: String,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationLinks>,
}

impl MetadataRecord {
    /// Relationship identifiers for one relation, empty when the relation is absent.
    pub fn links(&self, kind: RelationKind) -> Vec<&ContentIdentifier> {
        self.relationships
            .get(kind.as_str())
            .map(RelationLinks::targets)
            .unwrap_or_default()
    }
}

// ============================================================================
// Leaf records
// ============================================================================

/// Normalized postal address
///
/// Every field is independently optional. An empty string is kept and is
/// distinct from an absent field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_pre_directional_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_suffix_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_post_directional_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plus_four_postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unnormalized_address: Option<String>,
}

/// Normalized property facts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parcel_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_structure_built_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_effective_built_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub livable_floor_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_units: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_units_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_under_air: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_legal_description_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historic_designation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_identifier: Option<String>,
}

// ============================================================================
// Resolution output
// ============================================================================

/// Outcome of one resolution pass
///
/// A field is set only when its leaf was reachable and validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<ContentIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_data_id: Option<ContentIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parcel_identifier: Option<String>,
}

impl ResolutionResult {
    pub fn is_empty(&self) -> bool {
        self.address_id.is_none()
            && self.property_data_id.is_none()
            && self.parcel_identifier.is_none()
    }
}

// ============================================================================
// On-chain events
// ============================================================================

/// Decoded `DataSubmitted` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSubmittedEvent {
    pub submitter: String,
    pub property_hash: String,
    pub data_group_hash: String,
    /// 32-byte sha256 of the metadata document, hex encoded
    pub data_hash: String,
    pub block_number: u64,
    /// Block timestamp in unix seconds
    pub block_timestamp: i64,
    pub log_index: u64,
    pub transaction_hash: String,
}

impl DataSubmittedEvent {
    /// Entity id for the submission (`{tx}-{log_index}`)
    pub fn submission_id(&self) -> String {
        format!("{}-{}", self.transaction_hash, self.log_index)
    }
}

/// Persisted record of a processed data submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSubmission {
    pub id: String,
    pub submitter: String,
    pub property_hash: String,
    pub data_group_hash: String,
    pub content_identifier: ContentIdentifier,
    pub label: String,
    pub block_number: u64,
    pub block_timestamp: chrono::DateTime<chrono::Utc>,
    pub resolution: ResolutionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR_CID: &str = "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku";

    #[test]
    fn test_relation_names_roundtrip() {
        for kind in RelationKind::ALL {
            assert_eq!(RelationKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationKind::from_name("property_has_unicorn"), None);
    }

    #[test]
    fn test_metadata_parsing_single_and_multi() {
        let json = serde_json::json!({
            "label": "County",
            "relationships": {
                "property_has_address": { "/": ADDR_CID },
                "property_has_file": [{ "/": ADDR_CID }, { "/": ADDR_CID }]
            }
        });

        let metadata: MetadataRecord = serde_json::from_value(json).unwrap();
        assert_eq!(metadata.label, "County");
        assert_eq!(metadata.links(RelationKind::PropertyHasAddress).len(), 1);
        assert_eq!(metadata.links(RelationKind::PropertyHasFile).len(), 2);
        assert!(metadata.links(RelationKind::PropertyHasLot).is_empty());
    }

    #[test]
    fn test_relationship_requires_to() {
        let missing_to = serde_json::json!({ "from": { "/": ADDR_CID } });
        assert!(serde_json::from_value::<RelationshipRecord>(missing_to).is_err());

        let to_only = serde_json::json!({ "to": { "/": ADDR_CID } });
        let record: RelationshipRecord = serde_json::from_value(to_only).unwrap();
        assert!(record.from.is_none());
    }

    #[test]
    fn test_resolution_result_serializes_camel_case() {
        let result = ResolutionResult {
            address_id: None,
            property_data_id: Some(ContentIdentifier::parse(ADDR_CID).unwrap()),
            parcel_identifier: Some("12-34".to_string()),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["propertyDataId"], ADDR_CID);
        assert_eq!(value["parcelIdentifier"], "12-34");
        assert!(value.get("addressId").is_none());
    }
}
