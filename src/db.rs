//!
//! # Geometric Database
//!
//! The cell-under-routing: nets and their components. Components come in
//! three kinds: anchor [Contact]s, two-kind wire [Segment]s, and terminal
//! routing [Pad]s. Wires anchor on contacts or pads at both ends; each
//! contact's `slaves` list is its body-hook ring, naming every component
//! electrically attached there.
//!
//! Every net and component carries a small monotonically-assigned id, so
//! enumeration and ordering are deterministic across runs.
//!

// Std-lib imports
use std::collections::HashMap;

// Crates.io
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// Local imports
use crate::geom::{BoundBox, Dir, Point};
use crate::units::DbUnits;
use crate::{CompKey, NetKey};

/// # Net
///
/// A named collection of electrically-connected components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// Stable creation id
    pub id: u64,
    /// Net Name
    pub name: String,
    /// Component membership, in creation order
    pub components: Vec<CompKey>,
}

/// Common interface over the three component kinds
#[enum_dispatch]
pub trait ComponentBase {
    /// The net this component belongs to
    fn net(&self) -> NetKey;
    /// Stable creation id
    fn id(&self) -> u64;
}

/// # Component Enumeration
///
/// Tagged union of the three component kinds. Primitives dispatch once on
/// the tag; there is no deeper kind hierarchy.
#[enum_dispatch(ComponentBase)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Component {
    Contact(Contact),
    Segment(Segment),
    Pad(Pad),
}
impl Component {
    pub fn as_contact(&self) -> Option<&Contact> {
        match self {
            Component::Contact(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Component::Segment(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_pad(&self) -> Option<&Pad> {
        match self {
            Component::Pad(p) => Some(p),
            _ => None,
        }
    }
    pub fn is_contact(&self) -> bool {
        matches!(self, Component::Contact(_))
    }
    pub fn is_segment(&self) -> bool {
        matches!(self, Component::Segment(_))
    }
    pub fn is_pad(&self) -> bool {
        matches!(self, Component::Pad(_))
    }
}

/// # Anchor Contact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    net: NetKey,
    id: u64,
    /// Location
    pub position: Point,
    /// Body-hook ring: segments and pads attached here
    pub slaves: Vec<CompKey>,
}
impl ComponentBase for Contact {
    fn net(&self) -> NetKey {
        self.net
    }
    fn id(&self) -> u64 {
        self.id
    }
}

/// # Wire Segment
///
/// Horizontal or vertical, per `dir`. The off-direction coordinate is
/// `axis`; in-direction endpoints derive from the two anchors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    net: NetKey,
    id: u64,
    /// Direction tag
    pub dir: Dir,
    /// Off-direction coordinate: y for horizontal wires, x for vertical
    pub axis: DbUnits,
    /// Wire width
    pub width: DbUnits,
    /// Source anchor (a [Contact] or [Pad])
    pub source: CompKey,
    /// Target anchor (a [Contact] or [Pad])
    pub target: CompKey,
}
impl ComponentBase for Segment {
    fn net(&self) -> NetKey {
        self.net
    }
    fn id(&self) -> u64 {
        self.id
    }
}
impl Segment {
    /// Given one anchor of ours, the one at the other end
    pub fn opposite(&self, anchor: CompKey) -> CompKey {
        if anchor == self.source {
            self.target
        } else {
            self.source
        }
    }
}

/// # Routing Pad
///
/// A pin-sized terminal shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pad {
    net: NetKey,
    id: u64,
    /// Pin shape outline
    pub bbox: BoundBox,
}
impl ComponentBase for Pad {
    fn net(&self) -> NetKey {
        self.net
    }
    fn id(&self) -> u64 {
        self.id
    }
}
impl Pad {
    /// Anchor position: the pin center
    pub fn position(&self) -> Point {
        self.bbox.center()
    }
}

/// # Cell
///
/// The die under routing: an abutment box, nets, and their components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Cell Name
    pub name: String,
    /// Abutment box: the die area the mesh will tile
    pub abutment: BoundBox,
    nets: SlotMap<NetKey, Net>,
    comps: SlotMap<CompKey, Component>,
    /// Net keys in creation order
    order: Vec<NetKey>,
    /// Name lookup
    by_name: HashMap<String, NetKey>,
    next_net_id: u64,
    next_comp_id: u64,
}
impl Cell {
    /// Create a new and empty [Cell] over abutment box `abutment`
    pub fn new(name: impl Into<String>, abutment: BoundBox) -> Self {
        Self {
            name: name.into(),
            abutment,
            ..Default::default()
        }
    }

    /// Add a net named `name`, or return the existing one.
    pub fn add_net(&mut self, name: impl Into<String>) -> NetKey {
        let name = name.into();
        if let Some(key) = self.by_name.get(&name) {
            return *key;
        }
        let id = self.next_net_id;
        self.next_net_id += 1;
        let key = self.nets.insert(Net {
            id,
            name: name.clone(),
            components: Vec::new(),
        });
        self.order.push(key);
        self.by_name.insert(name, key);
        key
    }
    pub fn net(&self, key: NetKey) -> Option<&Net> {
        self.nets.get(key)
    }
    pub fn net_by_name(&self, name: &str) -> Option<NetKey> {
        self.by_name.get(name).copied()
    }
    /// Net keys in creation order
    pub fn nets(&self) -> impl Iterator<Item = NetKey> + '_ {
        self.order.iter().copied()
    }

    pub fn comp(&self, key: CompKey) -> Option<&Component> {
        self.comps.get(key)
    }
    pub fn contact(&self, key: CompKey) -> Option<&Contact> {
        self.comps.get(key).and_then(Component::as_contact)
    }
    pub fn segment(&self, key: CompKey) -> Option<&Segment> {
        self.comps.get(key).and_then(Component::as_segment)
    }
    pub fn pad(&self, key: CompKey) -> Option<&Pad> {
        self.comps.get(key).and_then(Component::as_pad)
    }

    /// Create a [Contact] on `net` at `position`
    pub fn new_contact(&mut self, net: NetKey, position: Point) -> CompKey {
        let id = self.bump_comp_id();
        let key = self.comps.insert(Component::Contact(Contact {
            net,
            id,
            position,
            slaves: Vec::new(),
        }));
        self.enroll(net, key);
        key
    }
    /// Create a [Pad] on `net` covering `bbox`
    pub fn new_pad(&mut self, net: NetKey, bbox: BoundBox) -> CompKey {
        let id = self.bump_comp_id();
        let key = self.comps.insert(Component::Pad(Pad { net, id, bbox }));
        self.enroll(net, key);
        key
    }
    /// Create a [Segment] on `net` between anchors `source` and `target`,
    /// attaching both ends into their anchor rings.
    pub fn new_segment(
        &mut self,
        net: NetKey,
        dir: Dir,
        axis: DbUnits,
        width: DbUnits,
        source: CompKey,
        target: CompKey,
    ) -> CompKey {
        let id = self.bump_comp_id();
        let key = self.comps.insert(Component::Segment(Segment {
            net,
            id,
            dir,
            axis,
            width,
            source,
            target,
        }));
        self.enroll(net, key);
        self.ring_attach(source, key);
        self.ring_attach(target, key);
        key
    }

    /// Anchor position of `key`: a contact's location or a pad's center.
    /// `None` for segments and stale keys.
    pub fn position(&self, key: CompKey) -> Option<Point> {
        match self.comps.get(key)? {
            Component::Contact(c) => Some(c.position),
            Component::Pad(p) => Some(p.position()),
            Component::Segment(_) => None,
        }
    }
    /// Source endpoint of segment `key`, anchor position overlaid with the axis
    pub fn source_position(&self, key: CompKey) -> Option<Point> {
        let seg = self.segment(key)?;
        let anchor = self.position(seg.source)?;
        Some(endpoint(anchor, seg.dir, seg.axis))
    }
    /// Target endpoint of segment `key`
    pub fn target_position(&self, key: CompKey) -> Option<Point> {
        let seg = self.segment(key)?;
        let anchor = self.position(seg.target)?;
        Some(endpoint(anchor, seg.dir, seg.axis))
    }

    /// Attach `pad` into `contact`'s body-hook ring
    pub fn attach_pad(&mut self, contact: CompKey, pad: CompKey) {
        self.ring_attach(contact, pad);
    }
    /// Move contact `key` to `position`
    pub fn move_contact(&mut self, key: CompKey, position: Point) {
        if let Some(Component::Contact(c)) = self.comps.get_mut(key) {
            c.position = position;
        }
    }
    /// Re-set the off-direction axis of segment `key`
    pub fn set_segment_axis(&mut self, key: CompKey, axis: DbUnits) {
        if let Some(Component::Segment(seg)) = self.comps.get_mut(key) {
            seg.axis = axis;
        }
    }
    /// Re-anchor segment `key`'s target onto `anchor`
    pub fn retarget(&mut self, key: CompKey, anchor: CompKey) {
        let old = match self.segment(key) {
            Some(seg) => seg.target,
            None => return,
        };
        self.ring_detach(old, key);
        if let Some(Component::Segment(seg)) = self.comps.get_mut(key) {
            seg.target = anchor;
        }
        self.ring_attach(anchor, key);
    }

    /// Destroy segment `key`: detach both ends, drop from its net, remove.
    pub fn destroy_segment(&mut self, key: CompKey) {
        let (net, source, target) = match self.segment(key) {
            Some(seg) => (seg.net, seg.source, seg.target),
            None => return,
        };
        self.ring_detach(source, key);
        self.ring_detach(target, key);
        self.unenroll(net, key);
        self.comps.remove(key);
    }
    /// Destroy contact `key`. The ring is expected to be empty by now;
    /// a populated ring is logged as a bug.
    pub fn destroy_contact(&mut self, key: CompKey) {
        let net = match self.contact(key) {
            Some(c) => {
                if !c.slaves.is_empty() {
                    log::error!("Cell::destroy_contact(): ring not empty on {:?}", key);
                }
                c.net()
            }
            None => return,
        };
        self.unenroll(net, key);
        self.comps.remove(key);
    }

    fn bump_comp_id(&mut self) -> u64 {
        let id = self.next_comp_id;
        self.next_comp_id += 1;
        id
    }
    fn enroll(&mut self, net: NetKey, key: CompKey) {
        if let Some(net) = self.nets.get_mut(net) {
            net.components.push(key);
        }
    }
    fn unenroll(&mut self, net: NetKey, key: CompKey) {
        if let Some(net) = self.nets.get_mut(net) {
            net.components.retain(|k| *k != key);
        }
    }
    fn ring_attach(&mut self, anchor: CompKey, key: CompKey) {
        if let Some(Component::Contact(c)) = self.comps.get_mut(anchor) {
            c.slaves.push(key);
        }
    }
    fn ring_detach(&mut self, anchor: CompKey, key: CompKey) {
        if let Some(Component::Contact(c)) = self.comps.get_mut(anchor) {
            c.slaves.retain(|k| *k != key);
        }
    }
}

/// Overlay `axis` onto `anchor` in the off-`dir` coordinate
fn endpoint(anchor: Point, dir: Dir, axis: DbUnits) -> Point {
    match dir {
        Dir::Horiz => Point::new(anchor.x, axis),
        Dir::Vert => Point::new(axis, anchor.y),
    }
}
