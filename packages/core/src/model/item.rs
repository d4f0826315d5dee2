//! The custodial item abstraction.
//!
//! Custody logic never looks at `Asset` or `Kit` directly; it works on
//! [`CustodialItem`], which exposes one uniform view over both.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entities::{Asset, Kit};
use super::enums::{CalibrationStatus, ItemState, SuspensionCause};

/// Checkout window for kits. Kits ignore their category default.
pub const KIT_MAX_CHECKOUT_HOURS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Asset,
    Kit,
}

impl ItemKind {
    /// Entity type name used in the audit log.
    pub fn entity_type(&self) -> &'static str {
        match self {
            ItemKind::Asset => "asset",
            ItemKind::Kit => "kit",
        }
    }

    /// Table that stores items of this kind.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            ItemKind::Asset => "assets",
            ItemKind::Kit => "kits",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Asset => f.write_str("Asset"),
            ItemKind::Kit => f.write_str("Kit"),
        }
    }
}

/// Typed reference to an asset or a kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: Uuid,
}

impl ItemRef {
    pub fn asset(id: Uuid) -> Self {
        Self {
            kind: ItemKind::Asset,
            id,
        }
    }

    pub fn kit(id: Uuid) -> Self {
        Self {
            kind: ItemKind::Kit,
            id,
        }
    }

    pub fn asset_id(&self) -> Option<Uuid> {
        match self.kind {
            ItemKind::Asset => Some(self.id),
            ItemKind::Kit => None,
        }
    }

    pub fn kit_id(&self) -> Option<Uuid> {
        match self.kind {
            ItemKind::Kit => Some(self.id),
            ItemKind::Asset => None,
        }
    }
}

/// An asset or a kit, whichever the scanned code resolved to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum CustodialItem {
    Asset(Asset),
    Kit(Kit),
}

impl CustodialItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            CustodialItem::Asset(_) => ItemKind::Asset,
            CustodialItem::Kit(_) => ItemKind::Kit,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            CustodialItem::Asset(asset) => asset.id,
            CustodialItem::Kit(kit) => kit.id,
        }
    }

    pub fn item_ref(&self) -> ItemRef {
        ItemRef {
            kind: self.kind(),
            id: self.id(),
        }
    }

    /// Human-facing code (`asset_code` or `kit_code`).
    pub fn display_code(&self) -> &str {
        match self {
            CustodialItem::Asset(asset) => &asset.asset_code,
            CustodialItem::Kit(kit) => &kit.kit_code,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CustodialItem::Asset(asset) => &asset.name,
            CustodialItem::Kit(kit) => &kit.name,
        }
    }

    pub fn state(&self) -> ItemState {
        match self {
            CustodialItem::Asset(asset) => asset.state,
            CustodialItem::Kit(kit) => kit.state,
        }
    }

    pub fn suspension_cause(&self) -> Option<SuspensionCause> {
        match self {
            CustodialItem::Asset(asset) => asset.suspension_cause,
            CustodialItem::Kit(kit) => kit.suspension_cause,
        }
    }

    pub fn max_checkout_hours(&self) -> i64 {
        match self {
            CustodialItem::Asset(asset) => asset.max_checkout_hours,
            CustodialItem::Kit(_) => KIT_MAX_CHECKOUT_HOURS,
        }
    }

    /// Calibration status for calibration-tracked assets, `None` for kits.
    pub fn calibration_status(&self) -> Option<CalibrationStatus> {
        match self {
            CustodialItem::Asset(asset) => Some(asset.calibration_status),
            CustodialItem::Kit(_) => None,
        }
    }
}
