//! Single-key ordering of listings.

use propsync_types::Property;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The listing attribute to order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    Owner,
    #[serde(rename = "type")]
    Kind,
    Status,
    Price,
    Latitude,
    Longitude,
    Bedrooms,
    Bathrooms,
    SquareFeet,
    Address,
    Description,
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    /// Wire name of the key, as used in `sortBy` parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Owner => "owner",
            Self::Kind => "type",
            Self::Status => "status",
            Self::Price => "price",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Bedrooms => "bedrooms",
            Self::Bathrooms => "bathrooms",
            Self::SquareFeet => "squareFeet",
            Self::Address => "address",
            Self::Description => "description",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }

    fn value<'a>(&self, p: &'a Property) -> Option<SortValue<'a>> {
        use SortValue::{Number, Text};
        match self {
            Self::Name => Some(Text(&p.name)),
            Self::Owner => Some(Text(&p.owner)),
            Self::Kind => Some(Text(p.kind.as_str())),
            Self::Status => Some(Text(p.status.as_str())),
            Self::Price => Some(Number(p.price)),
            Self::Latitude => Some(Number(p.latitude)),
            Self::Longitude => Some(Number(p.longitude)),
            Self::Bedrooms => p.bedrooms.map(|n| Number(f64::from(n))),
            Self::Bathrooms => p.bathrooms.map(Number),
            Self::SquareFeet => p.square_feet.map(Number),
            Self::Address => p.address.as_deref().map(Text),
            Self::Description => p.description.as_deref().map(Text),
            Self::CreatedAt => Some(Text(&p.created_at)),
            Self::UpdatedAt => Some(Text(&p.updated_at)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [SortKey; 14] = [
            SortKey::Name,
            SortKey::Owner,
            SortKey::Kind,
            SortKey::Status,
            SortKey::Price,
            SortKey::Latitude,
            SortKey::Longitude,
            SortKey::Bedrooms,
            SortKey::Bathrooms,
            SortKey::SquareFeet,
            SortKey::Address,
            SortKey::Description,
            SortKey::CreatedAt,
            SortKey::UpdatedAt,
        ];
        ALL.into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown sort key: {s}"))
    }
}

/// Ascending or descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A sort key plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Compares two listings under this ordering.
    ///
    /// Text keys compare with [`compare_text`], numeric keys with
    /// `f64::total_cmp`. Listings with no value for the key sort after
    /// those that have one, in either direction.
    pub fn compare(&self, a: &Property, b: &Property) -> Ordering {
        let ordering = match (self.key.value(a), self.key.value(b)) {
            (Some(SortValue::Text(x)), Some(SortValue::Text(y))) => compare_text(x, y),
            (Some(SortValue::Number(x)), Some(SortValue::Number(y))) => x.total_cmp(&y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            _ => Ordering::Equal,
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Sorts in place. The sort is stable, so ties keep their input order.
    pub fn sort(&self, items: &mut [Property]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

enum SortValue<'a> {
    Text(&'a str),
    Number(f64),
}

/// Collation-style text ordering.
///
/// Compares case-folded text first so "apple" sorts next to "Apple" rather
/// than after "Zebra". Strings that fold equal fall back to a raw comparison
/// with lowercase first, which keeps the order total.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| b.cmp(a))
}
