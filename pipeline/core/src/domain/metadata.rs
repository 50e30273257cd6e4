// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Closing Metadata
//!
//! Contract, assignment and title records, at most one of each per deal.
//! Upserts replace the record as a whole with field-level overwrite: omitted
//! fields keep the stored value, explicit nulls clear it.
//!
//! Field names serialize in camelCase because jurisdiction profiles address
//! them as `category.fieldName` paths.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::LifecycleError;
use crate::domain::events::EventType;
use crate::domain::patch::Patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataCategory {
    Contract,
    Assignment,
    Title,
}

impl MetadataCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Assignment => "assignment",
            Self::Title => "title",
        }
    }

    pub fn known_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Contract => &[
                "sellerName",
                "buyerName",
                "purchasePrice",
                "earnestMoney",
                "contractDate",
                "inspectionPeriodEnd",
                "documentUrl",
            ],
            Self::Assignment => &[
                "assigneeName",
                "assignmentFee",
                "assignmentDate",
                "documentUrl",
            ],
            Self::Title => &[
                "titleCompany",
                "escrowOfficer",
                "escrowNumber",
                "expectedCloseDate",
                "actualCloseDate",
                "documentUrl",
            ],
        }
    }

    pub fn updated_event(&self) -> EventType {
        match self {
            Self::Contract => EventType::ContractMetadataUpdated,
            Self::Assignment => EventType::AssignmentMetadataUpdated,
            Self::Title => EventType::TitleMetadataUpdated,
        }
    }
}

impl std::fmt::Display for MetadataCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `category.fieldName` reference into a deal's metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub category: MetadataCategory,
    pub field: String,
}

impl FieldPath {
    pub fn new(category: MetadataCategory, field: impl Into<String>) -> Self {
        Self {
            category,
            field: field.into(),
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.category, self.field)
    }
}

impl std::str::FromStr for FieldPath {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, field) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| LifecycleError::validation("field_path", format!("'{}' is not category.field", s)))?;
        let category = match category {
            "contract" => MetadataCategory::Contract,
            "assignment" => MetadataCategory::Assignment,
            "title" => MetadataCategory::Title,
            other => {
                return Err(LifecycleError::validation(
                    "field_path",
                    format!("unknown metadata category '{}'", other),
                ))
            }
        };
        if !category.known_fields().contains(&field) {
            return Err(LifecycleError::validation(
                "field_path",
                format!("unknown {} field '{}'", category, field),
            ));
        }
        Ok(Self::new(category, field))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    pub seller_name: Option<String>,
    pub buyer_name: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub earnest_money: Option<Decimal>,
    pub contract_date: Option<NaiveDate>,
    pub inspection_period_end: Option<NaiveDate>,
    pub document_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentMetadata {
    pub assignee_name: Option<String>,
    pub assignment_fee: Option<Decimal>,
    pub assignment_date: Option<NaiveDate>,
    pub document_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleMetadata {
    pub title_company: Option<String>,
    pub escrow_officer: Option<String>,
    pub escrow_number: Option<String>,
    pub expected_close_date: Option<NaiveDate>,
    pub actual_close_date: Option<NaiveDate>,
    pub document_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Patches
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractMetadataPatch {
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub seller_name: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub buyer_name: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub purchase_price: Patch<Decimal>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub earnest_money: Patch<Decimal>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub contract_date: Patch<NaiveDate>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub inspection_period_end: Patch<NaiveDate>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub document_url: Patch<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssignmentMetadataPatch {
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub assignee_name: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub assignment_fee: Patch<Decimal>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub assignment_date: Patch<NaiveDate>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub document_url: Patch<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TitleMetadataPatch {
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub title_company: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub escrow_officer: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub escrow_number: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub expected_close_date: Patch<NaiveDate>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub actual_close_date: Patch<NaiveDate>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub document_url: Patch<String>,
}

fn write<T>(field: &mut Option<T>, patch: Patch<T>, name: &'static str, changed: &mut Vec<&'static str>) {
    if !patch.is_keep() {
        changed.push(name);
    }
    patch.apply_to(field);
}

impl ContractMetadataPatch {
    /// Overlay onto `existing`; returns the new record and the written field names
    pub fn apply(self, existing: Option<ContractMetadata>) -> (ContractMetadata, Vec<&'static str>) {
        let mut record = existing.unwrap_or_default();
        let mut changed = Vec::new();
        write(&mut record.seller_name, self.seller_name, "sellerName", &mut changed);
        write(&mut record.buyer_name, self.buyer_name, "buyerName", &mut changed);
        write(&mut record.purchase_price, self.purchase_price, "purchasePrice", &mut changed);
        write(&mut record.earnest_money, self.earnest_money, "earnestMoney", &mut changed);
        write(&mut record.contract_date, self.contract_date, "contractDate", &mut changed);
        write(
            &mut record.inspection_period_end,
            self.inspection_period_end,
            "inspectionPeriodEnd",
            &mut changed,
        );
        write(&mut record.document_url, self.document_url, "documentUrl", &mut changed);
        record.updated_at = Some(Utc::now());
        (record, changed)
    }
}

impl AssignmentMetadataPatch {
    pub fn apply(self, existing: Option<AssignmentMetadata>) -> (AssignmentMetadata, Vec<&'static str>) {
        let mut record = existing.unwrap_or_default();
        let mut changed = Vec::new();
        write(&mut record.assignee_name, self.assignee_name, "assigneeName", &mut changed);
        write(&mut record.assignment_fee, self.assignment_fee, "assignmentFee", &mut changed);
        write(&mut record.assignment_date, self.assignment_date, "assignmentDate", &mut changed);
        write(&mut record.document_url, self.document_url, "documentUrl", &mut changed);
        record.updated_at = Some(Utc::now());
        (record, changed)
    }
}

impl TitleMetadataPatch {
    pub fn apply(self, existing: Option<TitleMetadata>) -> (TitleMetadata, Vec<&'static str>) {
        let mut record = existing.unwrap_or_default();
        let mut changed = Vec::new();
        write(&mut record.title_company, self.title_company, "titleCompany", &mut changed);
        write(&mut record.escrow_officer, self.escrow_officer, "escrowOfficer", &mut changed);
        write(&mut record.escrow_number, self.escrow_number, "escrowNumber", &mut changed);
        write(
            &mut record.expected_close_date,
            self.expected_close_date,
            "expectedCloseDate",
            &mut changed,
        );
        write(
            &mut record.actual_close_date,
            self.actual_close_date,
            "actualCloseDate",
            &mut changed,
        );
        write(&mut record.document_url, self.document_url, "documentUrl", &mut changed);
        record.updated_at = Some(Utc::now());
        (record, changed)
    }
}

/// The three optional metadata records of one deal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealMetadata {
    pub contract: Option<ContractMetadata>,
    pub assignment: Option<AssignmentMetadata>,
    pub title: Option<TitleMetadata>,
}

impl DealMetadata {
    /// Whether `path` holds a non-empty value. A missing record counts as empty.
    pub fn is_field_set(&self, path: &FieldPath) -> bool {
        let record = match path.category {
            MetadataCategory::Contract => self.contract.as_ref().map(serde_json::to_value),
            MetadataCategory::Assignment => self.assignment.as_ref().map(serde_json::to_value),
            MetadataCategory::Title => self.title.as_ref().map(serde_json::to_value),
        };
        let Some(Ok(value)) = record else {
            return false;
        };
        match value.get(&path.field) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    pub fn has_document(&self, category: MetadataCategory) -> bool {
        self.is_field_set(&FieldPath::new(category, "documentUrl"))
    }

    pub fn expected_close_date(&self) -> Option<NaiveDate> {
        self.title.as_ref().and_then(|t| t.expected_close_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_patch_survives_json_round_trip() {
        let patch = ContractMetadataPatch {
            buyer_name: Patch::Set("Acme Holdings".to_string()),
            earnest_money: Patch::Clear,
            ..ContractMetadataPatch::default()
        };

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "buyerName": "Acme Holdings", "earnestMoney": null }));

        let parsed: ContractMetadataPatch = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.buyer_name, Patch::Set("Acme Holdings".to_string()));
        assert_eq!(parsed.earnest_money, Patch::Clear);
        assert!(parsed.seller_name.is_keep());
        assert!(parsed.purchase_price.is_keep());
        assert!(parsed.document_url.is_keep());
    }

    #[test]
    fn test_field_path_parsing() {
        let path: FieldPath = "contract.purchasePrice".parse().unwrap();
        assert_eq!(path.category, MetadataCategory::Contract);
        assert_eq!(path.to_string(), "contract.purchasePrice");

        assert!("contract".parse::<FieldPath>().is_err());
        assert!("escrow.number".parse::<FieldPath>().is_err());
        assert!("title.purchasePrice".parse::<FieldPath>().is_err());
    }

    #[test]
    fn test_patch_preserves_omitted_and_clears_nulls() {
        let existing = TitleMetadata {
            title_company: Some("First Title".to_string()),
            escrow_number: Some("E-1".to_string()),
            ..TitleMetadata::default()
        };
        let patch: TitleMetadataPatch =
            serde_json::from_str(r#"{"escrowNumber": null, "expectedCloseDate": "2026-11-30"}"#).unwrap();
        let (record, changed) = patch.apply(Some(existing));

        assert_eq!(record.title_company.as_deref(), Some("First Title"));
        assert_eq!(record.escrow_number, None);
        assert_eq!(record.expected_close_date, NaiveDate::from_ymd_opt(2026, 11, 30));
        assert_eq!(changed, vec!["escrowNumber", "expectedCloseDate"]);
    }

    #[test]
    fn test_is_field_set() {
        let mut metadata = DealMetadata::default();
        let price: FieldPath = "contract.purchasePrice".parse().unwrap();
        let seller: FieldPath = "contract.sellerName".parse().unwrap();
        assert!(!metadata.is_field_set(&price));

        metadata.contract = Some(ContractMetadata {
            purchase_price: Some(dec!(150000)),
            seller_name: Some("   ".to_string()),
            ..ContractMetadata::default()
        });
        assert!(metadata.is_field_set(&price));
        assert!(!metadata.is_field_set(&seller));
    }
}
