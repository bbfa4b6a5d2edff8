//!
//! # Auto-Segments and Auto-Contacts
//!
//! Thin wrappers recording routing intent over the raw wires and contacts:
//! fixed/movable state, invalidation marks cleared at session close, and the
//! alignment groups tying collinear coplanar wires to one shared axis.
//! The engine owns one wrapper per wrapped base object, looked up by key.
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::CompKey;

/// # AutoSegment
///
/// Wrapper over one wire [Segment]. Total ordering for deterministic
/// processing is by `id`, the base segment's creation id.
///
/// [Segment]: crate::db::Segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSegment {
    base: CompKey,
    id: u64,
    /// Pinned in place; set by the outer router, excluded from re-routing
    pub fixed: bool,
    /// Geometry touched since the last session close
    pub invalidated: bool,
    /// Same-layer dogleg the drive phase may flatten; set by the outer router
    pub reduces_dogleg_layer: bool,
    /// Ends on a routing pad; recomputed at session close, reported while
    /// driving
    pub terminal: bool,
    /// Alignment-group membership: collinear coplanar wires sharing an axis
    pub align_group: Option<u32>,
}
impl AutoSegment {
    pub fn new(base: CompKey, id: u64) -> Self {
        Self {
            base,
            id,
            fixed: false,
            invalidated: true,
            reduces_dogleg_layer: false,
            terminal: false,
            align_group: None,
        }
    }
    /// The wrapped segment
    pub fn base(&self) -> CompKey {
        self.base
    }
    /// Base creation id; the `CompareId` total order
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }
    pub fn revalidate(&mut self) {
        self.invalidated = false;
    }
    /// Whether driving the database may flatten this wire onto its
    /// neighbors' layer. Counted in the finalize report.
    pub fn reduce_dogleg_layer(&self) -> bool {
        self.reduces_dogleg_layer
    }
}

/// # AutoContact
///
/// Wrapper over one anchor [Contact]. The `invalidated_cache` mark is set by
/// topology mutations and consumed by `update_net_topology`.
///
/// [Contact]: crate::db::Contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoContact {
    base: CompKey,
    id: u64,
    /// Cached topology is stale; geometry must be recomputed
    pub invalidated_cache: bool,
}
impl AutoContact {
    pub fn new(base: CompKey, id: u64) -> Self {
        Self {
            base,
            id,
            invalidated_cache: true,
        }
    }
    /// The wrapped contact
    pub fn base(&self) -> CompKey {
        self.base
    }
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn invalidate(&mut self) {
        self.invalidated_cache = true;
    }
}
