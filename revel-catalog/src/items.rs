use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The two kinds of inventoriable item a booking can carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Package,
    Extra,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Package => "PACKAGE",
            ItemType::Extra => "EXTRA",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown item type: {0}")]
pub struct ParseItemTypeError(String);

impl FromStr for ItemType {
    type Err = ParseItemTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PACKAGE" => Ok(ItemType::Package),
            "EXTRA" => Ok(ItemType::Extra),
            other => Err(ParseItemTypeError(other.to_string())),
        }
    }
}

/// Identifies one inventoriable item across both catalog tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub item_type: ItemType,
    pub item_id: Uuid,
}

impl ItemKey {
    pub fn package(id: Uuid) -> Self {
        Self {
            item_type: ItemType::Package,
            item_id: id,
        }
    }

    pub fn extra(id: Uuid) -> Self {
        Self {
            item_type: ItemType::Extra,
            item_id: id,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.item_type, self.item_id)
    }
}

/// A bookable venue hire package (full day, half day, ceremony-only, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_minor: i64,
    pub is_active: bool,
    pub metadata: serde_json::Value,
}

/// An add-on sold alongside a package (catering, AV hire, late licence, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extra {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_minor: i64,
    pub is_active: bool,
    pub metadata: serde_json::Value,
}

/// The priced view the checkout flow needs, independent of which table the
/// item came from.
#[derive(Debug, Clone)]
pub struct PricedItem {
    pub key: ItemKey,
    pub name: String,
    pub price_minor: i64,
    pub is_active: bool,
}

impl From<&Package> for PricedItem {
    fn from(p: &Package) -> Self {
        Self {
            key: ItemKey::package(p.id),
            name: p.name.clone(),
            price_minor: p.price_minor,
            is_active: p.is_active,
        }
    }
}

impl From<&Extra> for PricedItem {
    fn from(e: &Extra) -> Self {
        Self {
            key: ItemKey::extra(e.id),
            name: e.name.clone(),
            price_minor: e.price_minor,
            is_active: e.is_active,
        }
    }
}
