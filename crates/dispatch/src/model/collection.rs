//! Collection (pickup request) model

use binroute_core::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Waste classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WasteType {
    Organic,
    Plastic,
    Paper,
    Glass,
    Metal,
    Electronic,
    Hazardous,
    Bulky,
    Mixed,
}

/// Urgency tier, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Medium
    }
}

/// Coarse progress of a collection, mirrored from its mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
}

/// A reported waste pickup request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Collection identifier
    pub collection_id: String,
    /// Owning organization
    pub organization_id: String,
    /// Reporting user
    pub reporter_id: String,
    /// Pickup point
    pub location: GeoPoint,
    /// Waste classification
    pub waste_type: WasteType,
    /// Reported quantity in kilograms
    pub quantity_kg: f64,
    /// Reporter's payload estimate, if different from the quantity
    pub estimated_weight_kg: Option<f64>,
    /// Urgency tier used by route sequencing
    pub urgency: Urgency,
    /// Coarse lifecycle status
    pub status: CollectionStatus,
    /// Creation timestamp (Unix epoch milliseconds)
    pub created_at: u64,
    /// Last update timestamp
    pub updated_at: u64,
}

impl Collection {
    /// Payload weight used for tie-breaking in route sequencing
    pub fn effective_weight_kg(&self) -> f64 {
        self.estimated_weight_kg.unwrap_or(self.quantity_kg)
    }
}

/// Input for reporting a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollection {
    /// Organization the request is filed with
    pub organization_id: String,
    /// Pickup point
    pub location: GeoPoint,
    /// Waste classification
    pub waste_type: WasteType,
    /// Quantity in kilograms
    pub quantity_kg: f64,
    /// Optional payload estimate
    #[serde(default)]
    pub estimated_weight_kg: Option<f64>,
    /// Urgency tier
    #[serde(default)]
    pub urgency: Urgency,
}

impl NewCollection {
    /// Field-level validation
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.organization_id.trim().is_empty() {
            return Err(DispatchError::validation("organizationId", "is required"));
        }
        self.location
            .validate()
            .map_err(|e| DispatchError::validation("location", e.to_string()))?;
        if !self.quantity_kg.is_finite() || self.quantity_kg <= 0.0 {
            return Err(DispatchError::validation(
                "quantityKg",
                "must be a positive number",
            ));
        }
        if let Some(w) = self.estimated_weight_kg {
            if !w.is_finite() || w < 0.0 {
                return Err(DispatchError::validation(
                    "estimatedWeightKg",
                    "must be a non-negative number",
                ));
            }
        }
        Ok(())
    }
}
