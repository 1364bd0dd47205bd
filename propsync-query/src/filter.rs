//! Structured predicates over listings.

use propsync_types::{Property, PropertyKind, PropertyStatus};
use serde::{Deserialize, Serialize};

/// Structured filter predicates. `None` means the predicate is inactive.
///
/// Numeric bounds are inclusive. A listing with no recorded value for an
/// optional numeric field (bedrooms, bathrooms, square feet) counts as zero
/// against the minimum thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PropertyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PropertyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bathrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_square_feet: Option<f64>,
    /// Case-insensitive substring of the address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Case-insensitive substring of the owner name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Filters {
    /// Returns true when no predicate is active.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true when the listing satisfies every active predicate.
    pub fn matches(&self, property: &Property) -> bool {
        if self.kind.is_some_and(|kind| property.kind != kind) {
            return false;
        }
        if self.status.is_some_and(|status| property.status != status) {
            return false;
        }
        if self.min_price.is_some_and(|min| property.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| property.price > max) {
            return false;
        }
        if self
            .min_bedrooms
            .is_some_and(|min| property.bedrooms.unwrap_or(0) < min)
        {
            return false;
        }
        if self
            .min_bathrooms
            .is_some_and(|min| property.bathrooms.unwrap_or(0.0) < min)
        {
            return false;
        }
        if self
            .min_square_feet
            .is_some_and(|min| property.square_feet.unwrap_or(0.0) < min)
        {
            return false;
        }
        if let Some(location) = non_empty(&self.location) {
            let Some(address) = property.address.as_deref() else {
                return false;
            };
            if !contains_folded(address, location) {
                return false;
            }
        }
        if let Some(owner) = non_empty(&self.owner) {
            if !contains_folded(&property.owner, owner) {
                return false;
            }
        }
        true
    }
}

/// Free-text match against name, owner, description and address.
///
/// An empty term matches everything.
pub(crate) fn matches_text(property: &Property, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    [
        Some(property.name.as_str()),
        Some(property.owner.as_str()),
        property.description.as_deref(),
        property.address.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
