//!
//! # Per-Net Bookkeeping
//!
//! Search area, terminal count, and the sparsity score ordering nets for
//! routing: nets with many terminals in a small area are dense, score low,
//! and route first.
//!

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::db::{Cell, Component};
use crate::geom::BoundBox;
use crate::units::{DbUnits, Int};
use crate::NetKey;

/// # Per-Net Routing State
///
/// The pre-route extension record other tools may have attached to a net.
/// Read at [NetData] construction, created on demand afterwards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RoutingState {
    /// Net carries a mix of pre-routed and to-route wires
    pub mixed_preroute: bool,
    /// Net is fully fixed; the router must leave it alone
    pub fixed: bool,
    /// Net is electrically unconnected
    pub unconnected: bool,
}

/// # NetData
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetData {
    net: NetKey,
    /// Net creation id; the ordering tiebreak
    id: u64,
    /// Union bounding box over the net's routing pads
    pub search_area: BoundBox,
    /// Routing-pad count
    pub rp_count: usize,
    /// Ordering score; low is dense
    sparsity: Int,
    /// Attached routing-state record, if any
    pub state: Option<RoutingState>,
    /// Whether a global route is currently materialized for this net
    pub global_routed: bool,
    /// Search area spans more than the global-wire threshold
    pub global: bool,
}
impl NetData {
    /// Build the bookkeeping record for `net`: merge its routing-pad boxes
    /// and count them. Mixed pre-routed nets are left with an empty search
    /// area and a zero count, matching their exclusion from ordering.
    /// Nets spreading wider than `global_threshold` on either axis are
    /// flagged global.
    pub fn new(
        cell: &Cell,
        net: NetKey,
        state: Option<RoutingState>,
        global_threshold: DbUnits,
    ) -> Self {
        let id = cell.net(net).map(|n| n.id).unwrap_or(u64::MAX);
        let mut data = Self {
            net,
            id,
            search_area: BoundBox::empty(),
            rp_count: 0,
            sparsity: 0,
            state,
            global_routed: false,
            global: false,
        };
        if let Some(state) = state {
            if state.mixed_preroute {
                return data;
            }
        }
        if let Some(n) = cell.net(net) {
            for key in n.components.iter() {
                if let Some(Component::Pad(pad)) = cell.comp(*key) {
                    data.search_area.merge(&pad.bbox);
                    data.rp_count += 1;
                }
            }
        }
        if !data.search_area.is_empty() {
            let (w, h) = data.search_area.size();
            data.global = w > global_threshold || h > global_threshold;
        }
        data.update();
        data
    }
    pub fn net(&self) -> NetKey {
        self.net
    }
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn sparsity(&self) -> Int {
        self.sparsity
    }
    /// Ascending sort key: sparsity first, net id as tiebreak
    pub fn sparsity_key(&self) -> (Int, u64) {
        (self.sparsity, self.id)
    }
    /// Recompute the sparsity score from the search area and pad count
    fn update(&mut self) {
        if self.rp_count == 0 || self.search_area.is_empty() {
            self.sparsity = 0;
            return;
        }
        let (w, h) = self.search_area.size();
        let (w, h) = (w.raw() as i128, h.raw() as i128);
        let spread = w * h + 2 * (w + h);
        self.sparsity = (spread / self.rp_count as i128) as Int;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::BoundBox;

    #[test]
    fn sparsity_orders_dense_first() {
        let mut cell = Cell::new("t", BoundBox::new(0, 0, 1000, 1000));
        let mut datas = Vec::new();
        for (name, side) in [("big", 30), ("small", 10), ("mid", 20)] {
            let net = cell.add_net(name);
            cell.new_pad(net, BoundBox::new(0, 0, 1, 1));
            cell.new_pad(net, BoundBox::new(side, side, side + 1, side + 1));
            datas.push(NetData::new(&cell, net, None, DbUnits(25)));
        }
        datas.sort_by_key(NetData::sparsity_key);
        let names: Vec<&str> = datas
            .iter()
            .map(|d| cell.net(d.net()).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["small", "mid", "big"]);
    }
}
