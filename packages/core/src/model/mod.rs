//! Domain model: persisted records, closed enumerations and the
//! custodial item abstraction over assets and kits.

pub mod entities;
pub mod enums;
pub mod item;

pub use entities::*;
pub use enums::*;
pub use item::{CustodialItem, ItemKind, ItemRef, KIT_MAX_CHECKOUT_HOURS};
