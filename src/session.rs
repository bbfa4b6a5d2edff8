//!
//! # Mutation Sessions
//!
//! Every topology mutation runs inside a [Session]: a scoped borrow of the
//! engine that coalesces invalidations and defers re-validation to a single
//! flush at close. Because a session holds the engine's unique borrow, a
//! second one cannot be opened while the first is alive; the no-reentry
//! rule is carried by the borrow checker instead of a runtime check.
//!
//! Dropping a session without closing it flushes all the same, so the
//! invariants hold on every exit path.
//!

// Std-lib imports
use std::ops::{Deref, DerefMut};

// Local imports
use crate::engine::{Engine, Propagation};
use crate::error::RouteResult;
use crate::geom::Dir;
use crate::{CompKey, GCellKey, NetKey};

/// # Session
///
/// Scoped mutation context over one [Engine].
pub struct Session<'eng> {
    engine: &'eng mut Engine,
    flushed: bool,
}
impl<'eng> Session<'eng> {
    pub(crate) fn new(engine: &'eng mut Engine) -> Self {
        Self {
            engine,
            flushed: false,
        }
    }

    /// The tile-local anchor contact for `net` on `gcell`, created at the
    /// tile center if absent.
    pub fn gcontact(&mut self, gcell: GCellKey, net: NetKey) -> Option<CompKey> {
        self.engine.gcontact(gcell, net)
    }
    /// Trace a wire between two anchors; see [Engine::create_wire]
    pub fn create_wire(
        &mut self,
        source: CompKey,
        target: CompKey,
        dir: Dir,
    ) -> RouteResult<CompKey> {
        self.engine.create_wire(source, target, dir)
    }
    /// Attach a routing pad into an anchor's ring
    pub fn attach_pad(&mut self, contact: CompKey, pad: CompKey) {
        self.engine.cell_mut().attach_pad(contact, pad);
    }
    /// Split a wire at a tile; see [Engine::break_at]
    pub fn break_at(&mut self, segment: CompKey, break_gcell: GCellKey) -> RouteResult<CompKey> {
        self.engine.break_at(segment, break_gcell)
    }
    /// Merge the two wires meeting at `contact`; see [Engine::unify]
    pub fn unify(&mut self, contact: CompKey) -> bool {
        self.engine.unify(contact)
    }
    /// Remove a wire, optionally propagating; see [Engine::ripup]
    pub fn ripup(&mut self, seed: CompKey, flags: Propagation) {
        self.engine.ripup(seed, flags)
    }
    /// Rerun stale anchor-topology updates on `net`
    pub fn update_net_topology(&mut self, net: NetKey) {
        self.engine.update_net_topology(net)
    }
    /// Pin a wrapped wire in place; see [Engine::set_fixed]
    pub fn set_fixed(&mut self, segment: CompKey) {
        self.engine.set_fixed(segment)
    }
    /// Mark a wrapped wire as a reducible same-layer dogleg;
    /// see [Engine::set_reduces_dogleg]
    pub fn set_reduces_dogleg(&mut self, segment: CompKey) {
        self.engine.set_reduces_dogleg(segment)
    }

    /// Close the session, flushing pending invalidations: alignment groups
    /// are re-axised, touched tiles re-validated, and the overflowed-edge
    /// set rebuilt.
    pub fn close(mut self) {
        self.flush();
    }
    fn flush(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;

        let mut nets = std::mem::take(&mut self.engine.touched_nets);
        nets.sort();
        nets.dedup();
        for net in nets {
            self.engine.compute_net_terminals(net);
            self.engine.alignate(net);
            self.engine.update_net_topology(net);
        }

        let mut gcells = std::mem::take(&mut self.engine.touched_gcells);
        gcells.sort();
        gcells.dedup();
        self.engine.revalidate_gcells(&gcells);

        self.engine.rebuild_ov_edges();
    }
}
impl<'eng> Deref for Session<'eng> {
    type Target = Engine;
    fn deref(&self) -> &Self::Target {
        self.engine
    }
}
impl<'eng> DerefMut for Session<'eng> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine
    }
}
impl<'eng> Drop for Session<'eng> {
    fn drop(&mut self) {
        self.flush();
    }
}
