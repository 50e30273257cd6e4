// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lead Aggregate
//!
//! A lead is an acquisition target moving through the pipeline. The aggregate
//! owns three invariants:
//!
//! 1. `status` only moves along [`LeadStatus::allowed_transitions`], except
//!    that `dead` is always reachable.
//! 2. Derived underwriting outputs are a pure function of the financial inputs
//!    and are recomputed whenever any financial input is written.
//! 3. The duplicate-detection fingerprint always reflects the current address.
//!
//! Normal deletion is a soft transition to [`LeadStatus::Dead`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::engine_config::UnderwritingConfig;
use crate::domain::errors::LifecycleError;
use crate::domain::identity::{OrgId, UserId};
use crate::domain::patch::Patch;
use crate::domain::underwriting::{compute_underwriting, UnderwritingInputs, UnderwritingOutputs};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub Uuid);

impl LeadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for LeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    OfferMade,
    UnderContract,
    Closed,
    Dead,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 7] = [
        Self::New,
        Self::Contacted,
        Self::Qualified,
        Self::OfferMade,
        Self::UnderContract,
        Self::Closed,
        Self::Dead,
    ];

    /// Directed edges of the status graph. `Dead` is additionally reachable
    /// from every non-terminal status through [`LeadStatus::can_transition_to`].
    /// `Closed` is terminal.
    pub fn allowed_transitions(&self) -> &'static [LeadStatus] {
        use LeadStatus::*;
        match self {
            New => &[Contacted, Qualified, Dead],
            Contacted => &[Qualified, Dead],
            Qualified => &[OfferMade, Dead],
            OfferMade => &[UnderContract, Qualified, Dead],
            UnderContract => &[Closed, Qualified, Dead],
            Closed => &[],
            Dead => &[New],
        }
    }

    pub fn can_transition_to(&self, target: LeadStatus) -> bool {
        match target {
            LeadStatus::Dead => *self != LeadStatus::Closed,
            _ => self.allowed_transitions().contains(&target),
        }
    }

    /// Statuses that block deal creation and qualification changes
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Dead | Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::OfferMade => "offer_made",
            Self::UnderContract => "under_contract",
            Self::Closed => "closed",
            Self::Dead => "dead",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| LifecycleError::validation("status", format!("unknown status '{}'", s)))
    }
}

/// Property location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAddress {
    pub street: String,
    pub city: String,
    /// Two-letter state code, uppercase
    pub state: String,
    pub zip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
}

impl PropertyAddress {
    /// Location fingerprint used for per-organization duplicate detection
    pub fn fingerprint(&self) -> String {
        let zip5: String = self.zip.chars().filter(|c| c.is_ascii_digit()).take(5).collect();
        let canonical = format!(
            "{}|{}|{}|{}",
            normalize_component(&self.street),
            normalize_component(&self.city),
            self.state.trim().to_lowercase(),
            zip5
        );
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

fn normalize_component(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .map(fold_abbreviation)
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_abbreviation(word: &str) -> &str {
    match word {
        "street" => "st",
        "avenue" => "ave",
        "road" => "rd",
        "drive" => "dr",
        "lane" => "ln",
        "boulevard" => "blvd",
        "court" => "ct",
        "place" => "pl",
        "terrace" => "ter",
        "circle" => "cir",
        "highway" => "hwy",
        "north" => "n",
        "south" => "s",
        "east" => "e",
        "west" => "w",
        other => other,
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Input for lead creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadInput {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
    #[serde(default)]
    pub seller_phone: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub arv: Option<Decimal>,
    #[serde(default)]
    pub estimated_repairs: Option<Decimal>,
    #[serde(default)]
    pub investor_multiplier: Option<Decimal>,
    #[serde(default)]
    pub desired_fee: Option<Decimal>,
    #[serde(default)]
    pub offer_price: Option<Decimal>,
}

/// Partial update for an existing lead
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadPatch {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub county: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub seller_name: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub seller_phone: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub source: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub notes: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub arv: Patch<Decimal>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub estimated_repairs: Patch<Decimal>,
    pub investor_multiplier: Option<Decimal>,
    pub desired_fee: Option<Decimal>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub offer_price: Patch<Decimal>,
}

impl LeadPatch {
    pub fn touches_financials(&self) -> bool {
        !self.arv.is_keep()
            || !self.estimated_repairs.is_keep()
            || !self.offer_price.is_keep()
            || self.investor_multiplier.is_some()
            || self.desired_fee.is_some()
    }

    pub fn touches_address(&self) -> bool {
        self.street.is_some()
            || self.city.is_some()
            || self.state.is_some()
            || self.zip.is_some()
            || !self.county.is_keep()
    }
}

/// What an applied [`LeadPatch`] changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadChanges {
    pub fields: Vec<&'static str>,
    pub financials: bool,
    pub address: bool,
}

// ============================================================================
// Aggregate
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub org_id: OrgId,
    pub owner_id: UserId,
    pub address: PropertyAddress,
    pub seller_name: Option<String>,
    pub seller_phone: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub underwriting: UnderwritingInputs,
    #[serde(default)]
    derived: UnderwritingOutputs,
    pub is_qualified: bool,
    pub status: LeadStatus,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Normalize and validate `input`, apply underwriting defaults and compute
    /// the derived outputs.
    pub fn create(
        org_id: OrgId,
        owner_id: UserId,
        input: LeadInput,
        defaults: &UnderwritingConfig,
    ) -> Result<Self, LifecycleError> {
        let address = PropertyAddress {
            street: required_text("street", &input.street)?,
            city: required_text("city", &input.city)?,
            state: normalize_state(&input.state)?,
            zip: normalize_zip(&input.zip)?,
            county: optional_text(input.county),
        };

        let underwriting = UnderwritingInputs {
            arv: non_negative("arv", input.arv)?,
            estimated_repairs: non_negative("estimated_repairs", input.estimated_repairs)?,
            investor_multiplier: validate_multiplier(
                input
                    .investor_multiplier
                    .unwrap_or(defaults.default_investor_multiplier),
            )?,
            desired_fee: non_negative("desired_fee", input.desired_fee)?
                .unwrap_or(defaults.default_desired_fee),
            offer_price: non_negative("offer_price", input.offer_price)?,
        };

        let now = Utc::now();
        let fingerprint = address.fingerprint();
        let mut lead = Self {
            id: LeadId::new(),
            org_id,
            owner_id,
            address,
            seller_name: optional_text(input.seller_name),
            seller_phone: optional_text(input.seller_phone),
            source: optional_text(input.source),
            notes: optional_text(input.notes),
            underwriting,
            derived: UnderwritingOutputs::default(),
            is_qualified: false,
            status: LeadStatus::New,
            fingerprint,
            created_at: now,
            updated_at: now,
        };
        lead.recompute_underwriting();
        Ok(lead)
    }

    pub fn derived(&self) -> &UnderwritingOutputs {
        &self.derived
    }

    pub fn max_offer_amount(&self) -> Option<Decimal> {
        self.derived.max_offer_amount
    }

    pub fn deal_score(&self) -> Option<u8> {
        self.derived.deal_score
    }

    pub fn recompute_underwriting(&mut self) {
        self.derived = compute_underwriting(&self.underwriting);
    }

    /// Merge `patch` into the lead. Financial writes recompute derived outputs
    /// in the same call; address writes recompute the fingerprint.
    pub fn apply_patch(&mut self, patch: LeadPatch) -> Result<LeadChanges, LifecycleError> {
        let mut changes = LeadChanges {
            financials: patch.touches_financials(),
            address: patch.touches_address(),
            ..LeadChanges::default()
        };

        // Validate everything before the first write so a rejected patch leaves the lead untouched
        let street = patch.street.as_deref().map(|s| required_text("street", s)).transpose()?;
        let city = patch.city.as_deref().map(|s| required_text("city", s)).transpose()?;
        let state = patch.state.as_deref().map(normalize_state).transpose()?;
        let zip = patch.zip.as_deref().map(normalize_zip).transpose()?;
        for (field, value) in [
            ("arv", patch.arv.as_set()),
            ("estimated_repairs", patch.estimated_repairs.as_set()),
            ("offer_price", patch.offer_price.as_set()),
            ("desired_fee", patch.desired_fee.as_ref()),
        ] {
            non_negative(field, value.copied())?;
        }
        let multiplier = patch.investor_multiplier.map(validate_multiplier).transpose()?;

        let mut record = |name: &'static str, touched: bool| {
            if touched {
                changes.fields.push(name);
            }
        };
        record("street", street.is_some());
        record("city", city.is_some());
        record("state", state.is_some());
        record("zip", zip.is_some());
        record("county", !patch.county.is_keep());
        record("seller_name", !patch.seller_name.is_keep());
        record("seller_phone", !patch.seller_phone.is_keep());
        record("source", !patch.source.is_keep());
        record("notes", !patch.notes.is_keep());
        record("arv", !patch.arv.is_keep());
        record("estimated_repairs", !patch.estimated_repairs.is_keep());
        record("investor_multiplier", multiplier.is_some());
        record("desired_fee", patch.desired_fee.is_some());
        record("offer_price", !patch.offer_price.is_keep());

        if let Some(street) = street {
            self.address.street = street;
        }
        if let Some(city) = city {
            self.address.city = city;
        }
        if let Some(state) = state {
            self.address.state = state;
        }
        if let Some(zip) = zip {
            self.address.zip = zip;
        }
        trimmed(patch.county).apply_to(&mut self.address.county);
        trimmed(patch.seller_name).apply_to(&mut self.seller_name);
        trimmed(patch.seller_phone).apply_to(&mut self.seller_phone);
        trimmed(patch.source).apply_to(&mut self.source);
        trimmed(patch.notes).apply_to(&mut self.notes);

        patch.arv.apply_to(&mut self.underwriting.arv);
        patch.estimated_repairs.apply_to(&mut self.underwriting.estimated_repairs);
        patch.offer_price.apply_to(&mut self.underwriting.offer_price);
        if let Some(multiplier) = multiplier {
            self.underwriting.investor_multiplier = multiplier;
        }
        if let Some(fee) = patch.desired_fee {
            self.underwriting.desired_fee = fee;
        }

        if changes.financials {
            self.recompute_underwriting();
        }
        if changes.address {
            self.fingerprint = self.address.fingerprint();
        }
        self.updated_at = Utc::now();
        Ok(changes)
    }

    /// Move along the status graph. Returns the previous status.
    pub fn transition_to(&mut self, target: LeadStatus) -> Result<LeadStatus, LifecycleError> {
        if !self.status.can_transition_to(target) {
            return Err(LifecycleError::InvalidStatusTransition {
                from: self.status,
                to: target,
                allowed: self.allowed_next_statuses(),
            });
        }
        Ok(self.force_status(target))
    }

    /// Set the status without consulting the graph. Only deal lifecycle
    /// transactions use this, where the deal owns the transition.
    pub fn force_status(&mut self, target: LeadStatus) -> LeadStatus {
        let previous = self.status;
        self.status = target;
        self.updated_at = Utc::now();
        previous
    }

    pub fn allowed_next_statuses(&self) -> Vec<LeadStatus> {
        let mut allowed = self.status.allowed_transitions().to_vec();
        if !allowed.contains(&LeadStatus::Dead) && !matches!(self.status, LeadStatus::Dead | LeadStatus::Closed) {
            allowed.push(LeadStatus::Dead);
        }
        allowed
    }

    pub fn set_qualified(&mut self, is_qualified: bool) -> Result<bool, LifecycleError> {
        if self.status == LeadStatus::Dead {
            return Err(LifecycleError::InvalidState(format!(
                "lead {} is dead and cannot change qualification",
                self.id
            )));
        }
        let previous = self.is_qualified;
        self.is_qualified = is_qualified;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Pure readiness query; nothing is stored
    pub fn deal_readiness(&self) -> DealReadiness {
        let mut issues = Vec::new();
        if !self.is_qualified {
            issues.push(ReadinessIssue::NotQualified);
        }
        let max_offer = self.derived.max_offer_amount;
        let offer = self.underwriting.offer_price;
        if max_offer.is_none() {
            issues.push(ReadinessIssue::MissingMaxOffer);
        }
        if offer.is_none() {
            issues.push(ReadinessIssue::MissingOfferPrice);
        }
        if let (Some(offer_price), Some(max_offer)) = (offer, max_offer) {
            if offer_price > max_offer {
                issues.push(ReadinessIssue::OfferExceedsMaxOffer {
                    offer_price,
                    max_offer,
                });
            }
        }
        if self.status.is_inactive() {
            issues.push(ReadinessIssue::InactiveStatus {
                status: self.status,
            });
        }
        DealReadiness {
            ready: issues.is_empty(),
            issues,
        }
    }
}

/// Result of [`Lead::deal_readiness`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealReadiness {
    pub ready: bool,
    pub issues: Vec<ReadinessIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReadinessIssue {
    NotQualified,
    MissingMaxOffer,
    MissingOfferPrice,
    OfferExceedsMaxOffer { offer_price: Decimal, max_offer: Decimal },
    InactiveStatus { status: LeadStatus },
}

// ============================================================================
// Normalization helpers
// ============================================================================

fn required_text(field: &str, value: &str) -> Result<String, LifecycleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::validation(field, "is required"));
    }
    Ok(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trimmed(patch: Patch<String>) -> Patch<String> {
    match patch {
        Patch::Set(value) => optional_text(Some(value)).into(),
        other => other,
    }
}

fn normalize_state(value: &str) -> Result<String, LifecycleError> {
    let state = value.trim().to_uppercase();
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LifecycleError::validation("state", "must be a two-letter state code"));
    }
    Ok(state)
}

fn normalize_zip(value: &str) -> Result<String, LifecycleError> {
    let zip = value.trim();
    let leading_digits = zip.chars().take_while(|c| c.is_ascii_digit()).count();
    if leading_digits < 5 {
        return Err(LifecycleError::validation("zip", "must start with a five-digit zip code"));
    }
    Ok(zip.to_string())
}

fn non_negative(field: &str, value: Option<Decimal>) -> Result<Option<Decimal>, LifecycleError> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => {
            Err(LifecycleError::validation(field, "must not be negative"))
        }
        other => Ok(other),
    }
}

fn validate_multiplier(value: Decimal) -> Result<Decimal, LifecycleError> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(LifecycleError::validation(
            "investor_multiplier",
            "must be greater than 0 and at most 1",
        ));
    }
    Ok(value)
}
