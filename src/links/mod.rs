//! Link registry: keeps linked arrow endpoints attached to their targets.
//!
//! A link ties one end of an arrow to a graph node or another annotation via a
//! target-relative magnet. The arrow itself carries the serializable mirror
//! ([`LinkRecord`]); the registry is an index over those mirrors so targets
//! can find their incoming arrows without scanning the store.
//!
//! When a target moves the registry re-resolves the affected endpoints into the
//! live overlay and arms a [`DeferredTask`]. [`LinkRegistry::tick`] folds the
//! whole burst into one history entry once the target has been still for the
//! debounce delay.
//!
//! ## Module Structure
//!
//! - [`deferred`] - cancellable timer used for the debounced resync commit

pub mod deferred;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bevy::log::{debug, warn};
use bevy::math::Vec2;
use indexmap::IndexSet;

use crate::constants::LINK_RESYNC_DEBOUNCE_MS;
use crate::error::{AnnotationError, Result};
use crate::features::{ArrowShape, Feature, FeatureId, LinkRecord, RectFrame, Side, TargetKind};
use crate::host::GraphHost;
use crate::store::{AnnotationEvent, FeatureStore};

pub use deferred::DeferredTask;

pub type LinkId = u64;

/// One indexed arrow-end link
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub arrow: FeatureId,
    pub side: Side,
    pub target: String,
    pub kind: TargetKind,
    pub magnet: Vec2,
}

impl Link {
    pub fn record(&self) -> LinkRecord {
        LinkRecord {
            target: self.target.clone(),
            kind: self.kind,
            magnet: self.magnet,
        }
    }
}

#[derive(Debug)]
pub struct LinkRegistry {
    links: HashMap<LinkId, Link>,
    by_node: HashMap<String, IndexSet<LinkId>>,
    by_annotation: HashMap<FeatureId, IndexSet<LinkId>>,
    by_arrow: HashMap<(FeatureId, Side), LinkId>,
    next_id: LinkId,
    resync: DeferredTask,
    /// Arrows re-resolved into the live overlay, awaiting the debounced commit
    pending: IndexSet<FeatureId>,
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new(Duration::from_millis(LINK_RESYNC_DEBOUNCE_MS))
    }
}

impl LinkRegistry {
    pub fn new(debounce: Duration) -> Self {
        Self {
            links: HashMap::new(),
            by_node: HashMap::new(),
            by_annotation: HashMap::new(),
            by_arrow: HashMap::new(),
            next_id: 0,
            resync: DeferredTask::new(debounce),
            pending: IndexSet::new(),
        }
    }

    // ------------------------------------------------------------------
    // Link edits
    // ------------------------------------------------------------------

    /// Links `side` of `arrow` to `target`, replacing any existing link on that
    /// side. The endpoint is moved onto the resolved anchor and the mirror is
    /// written onto the arrow. Returns false if the arrow or target is missing.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        store: &mut FeatureStore,
        host: &dyn GraphHost,
        arrow: &str,
        side: Side,
        target: &str,
        kind: TargetKind,
        magnet: Vec2,
    ) -> bool {
        if arrow == target {
            warn!("Arrow {} cannot link to itself", arrow);
            return false;
        }
        let Some(shape) = store
            .get_merged_feature(arrow)
            .and_then(|f| f.geometry.as_arrow())
            .cloned()
        else {
            debug!("Link source {} is not an arrow, skipping", arrow);
            return false;
        };
        if !target_exists(store, host, target, kind) {
            debug!("Link target {} ({:?}) not found, skipping", target, kind);
            return false;
        }

        self.detach(arrow, side);
        let record = LinkRecord {
            target: target.to_string(),
            kind,
            magnet,
        };
        let mut linked = shape;
        linked.set_link(side, Some(record.clone()));
        let resolved = resolve_arrow(store, host, &linked);
        write_arrow(store, arrow, resolved);
        self.insert(arrow, side, record);

        debug!("Linked {} {:?} -> {} ({:?})", arrow, side, target, kind);
        store.notify(AnnotationEvent::Linked {
            arrow: arrow.to_string(),
            side,
            target: target.to_string(),
            kind,
        });
        true
    }

    /// Unlinks `side` of `arrow`. Returns false if nothing was linked.
    pub fn remove(&mut self, store: &mut FeatureStore, arrow: &str, side: Side) -> bool {
        if self.detach(arrow, side).is_none() {
            return false;
        }
        strip_mirror(store, arrow, side);
        store.notify(AnnotationEvent::Unlinked {
            arrow: arrow.to_string(),
            side,
        });
        true
    }

    /// Unlinks both ends of `arrow`. Returns how many links were removed.
    pub fn remove_arrow_links(&mut self, store: &mut FeatureStore, arrow: &str) -> usize {
        Side::BOTH
            .iter()
            .filter(|side| self.remove(store, arrow, **side))
            .count()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_arrow_link(&self, arrow: &str, side: Side) -> Option<&Link> {
        self.by_arrow
            .get(&(arrow.to_string(), side))
            .and_then(|id| self.links.get(id))
    }

    pub fn arrow_links(&self, arrow: &str) -> Vec<&Link> {
        Side::BOTH
            .iter()
            .filter_map(|side| self.get_arrow_link(arrow, *side))
            .collect()
    }

    /// Every link whose target is `target`, node or annotation.
    pub fn links_to(&self, target: &str) -> Vec<&Link> {
        self.by_node
            .get(target)
            .into_iter()
            .chain(self.by_annotation.get(target))
            .flatten()
            .filter_map(|id| self.links.get(id))
            .collect()
    }

    /// Distinct arrows with at least one end linked to `target`.
    pub fn incoming_arrows(&self, target: &str) -> Vec<FeatureId> {
        let arrows: IndexSet<FeatureId> = self
            .links_to(target)
            .into_iter()
            .map(|link| link.arrow.clone())
            .collect();
        arrows.into_iter().collect()
    }

    pub fn is_linked(&self, target: &str) -> bool {
        !self.links_to(target).is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    // ------------------------------------------------------------------
    // Structural sync with the store
    // ------------------------------------------------------------------

    /// Re-index every arrow mirror in the store. Mirrors whose target cannot
    /// be found stay on the arrow but are not indexed.
    pub fn rebuild(&mut self, store: &FeatureStore, host: &dyn GraphHost) {
        self.links.clear();
        self.by_node.clear();
        self.by_annotation.clear();
        self.by_arrow.clear();

        let mut unresolved = 0;
        for feature in store.features() {
            let Some(arrow) = feature.geometry.as_arrow() else {
                continue;
            };
            for side in Side::BOTH {
                let Some(record) = arrow.link(side) else {
                    continue;
                };
                if target_exists(store, host, &record.target, record.kind) {
                    self.insert(&feature.id, side, record.clone());
                } else {
                    unresolved += 1;
                }
            }
        }
        if unresolved > 0 {
            debug!("{} link mirrors reference missing targets", unresolved);
        }
        debug!("Link registry rebuilt with {} links", self.links.len());
    }

    /// Re-index one arrow from its committed mirror.
    pub fn sync_arrow(&mut self, store: &FeatureStore, host: &dyn GraphHost, arrow: &str) {
        let shape = store
            .get_feature(arrow)
            .and_then(|f| f.geometry.as_arrow())
            .cloned();
        for side in Side::BOTH {
            let record = shape
                .as_ref()
                .and_then(|s| s.link(side))
                .filter(|r| target_exists(store, host, &r.target, r.kind));
            let current = self.get_arrow_link(arrow, side).map(Link::record);
            if current.as_ref() == record {
                continue;
            }
            self.detach(arrow, side);
            if let Some(record) = record {
                self.insert(arrow, side, record.clone());
            }
        }
    }

    /// A feature entered the store: index its mirrors if it is an arrow, or
    /// pick up dangling mirrors that were waiting for it as a target.
    pub fn on_feature_added(&mut self, store: &FeatureStore, host: &dyn GraphHost, id: &str) {
        let Some(feature) = store.get_feature(id) else {
            return;
        };
        if feature.geometry.as_arrow().is_some() {
            self.sync_arrow(store, host, id);
            return;
        }
        let waiting: Vec<FeatureId> = store
            .features()
            .filter_map(|f| {
                let arrow = f.geometry.as_arrow()?;
                Side::BOTH
                    .iter()
                    .any(|side| {
                        arrow.link(*side).is_some_and(|r| r.target == id)
                            && self.get_arrow_link(&f.id, *side).is_none()
                    })
                    .then(|| f.id.clone())
            })
            .collect();
        for arrow in waiting {
            self.sync_arrow(store, host, &arrow);
        }
    }

    /// A feature left the store. Removing an arrow drops both its links;
    /// removing a target strips the mirror from every arrow linked to it.
    /// Returns the arrows that lost an anchor.
    pub fn on_feature_removed(&mut self, store: &mut FeatureStore, id: &str) -> Vec<FeatureId> {
        for side in Side::BOTH {
            if self.detach(id, side).is_some() {
                store.notify(AnnotationEvent::Unlinked {
                    arrow: id.to_string(),
                    side,
                });
            }
        }
        self.pending.shift_remove(id);
        self.detach_target(store, id)
    }

    /// Removes `id` and unhooks every link touching it, as one history entry.
    pub fn remove_feature(&mut self, store: &mut FeatureStore, id: &str) -> Option<Feature> {
        store.batch_update(|store| {
            let removed = store.remove_feature(id)?;
            self.on_feature_removed(store, id);
            Some(removed)
        })
    }

    /// A graph node disappeared from the host.
    pub fn on_node_removed(&mut self, store: &mut FeatureStore, node: &str) -> Vec<FeatureId> {
        self.detach_target(store, node)
    }

    fn detach_target(&mut self, store: &mut FeatureStore, target: &str) -> Vec<FeatureId> {
        let incoming: Vec<(FeatureId, Side)> = self
            .links_to(target)
            .into_iter()
            .map(|link| (link.arrow.clone(), link.side))
            .collect();
        let mut arrows = IndexSet::new();
        for (arrow, side) in incoming {
            self.remove(store, &arrow, side);
            arrows.insert(arrow);
        }
        if !arrows.is_empty() {
            debug!("Target {} removed, unlinked {} arrows", target, arrows.len());
        }
        arrows.into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Resynchronization
    // ------------------------------------------------------------------

    /// Re-resolve arrows linked to `targets` into the live overlay and arm the
    /// debounced commit. Returns how many arrows moved.
    pub fn refresh_targets(
        &mut self,
        store: &mut FeatureStore,
        host: &dyn GraphHost,
        targets: &[String],
        now: Instant,
    ) -> usize {
        let moved = self.moved_arrows(store, host, targets);
        for (arrow, resolved) in &moved {
            let resolved = resolved.clone();
            store.apply_live_update(arrow, move |f| set_endpoints(f, &resolved));
            self.pending.insert(arrow.clone());
        }
        if !moved.is_empty() {
            self.resync.schedule(now);
            debug!("Resync scheduled for {} arrows", moved.len());
        }
        moved.len()
    }

    /// Re-resolve arrows linked to `targets` straight into committed state.
    /// Meant to run inside the same batch as the edit that moved the targets.
    pub fn follow_targets(
        &mut self,
        store: &mut FeatureStore,
        host: &dyn GraphHost,
        targets: &[String],
    ) -> usize {
        let moved = self.moved_arrows(store, host, targets);
        for (arrow, resolved) in &moved {
            if store.is_live(arrow) {
                store.apply_live_update(arrow, |f| set_endpoints(f, resolved));
            } else {
                store.update_feature(arrow, |f| set_endpoints(f, resolved));
            }
        }
        moved.len()
    }

    /// Drag linked arrows along with targets being edited in the overlay. No
    /// commit is scheduled: the gesture commits them together with the targets.
    pub fn resolve_live(
        &self,
        store: &mut FeatureStore,
        host: &dyn GraphHost,
        targets: &[String],
    ) -> Vec<FeatureId> {
        let moved = self.moved_arrows(store, host, targets);
        for (arrow, resolved) in &moved {
            store.apply_live_update(arrow, |f| set_endpoints(f, resolved));
        }
        moved.into_iter().map(|(arrow, _)| arrow).collect()
    }

    /// Refresh arrows whose targets change shape with zoom or rotation.
    pub fn refresh_view_dependent(
        &mut self,
        store: &mut FeatureStore,
        host: &dyn GraphHost,
        now: Instant,
    ) -> usize {
        let targets: Vec<String> = self
            .by_annotation
            .keys()
            .filter(|id| {
                store
                    .get_merged_feature(id)
                    .is_some_and(|f| f.geometry.is_view_dependent())
            })
            .cloned()
            .collect();
        self.refresh_targets(store, host, &targets, now)
    }

    /// Commit pending resync updates once the debounce delay has passed.
    /// While a gesture is in progress the commit is pushed back.
    pub fn tick(
        &mut self,
        store: &mut FeatureStore,
        host: &dyn GraphHost,
        now: Instant,
    ) -> Vec<FeatureId> {
        if !self.resync.is_due(now) {
            return Vec::new();
        }
        if store.is_dragging() {
            self.resync.schedule(now);
            return Vec::new();
        }
        self.flush(store, host)
    }

    /// Commit pending resync updates immediately.
    ///
    /// Arrows are resolved again first, so an overlay entry dropped by a
    /// cancelled gesture or a target that kept moving still lands where the
    /// targets are now. Arrows held by the gesture session stay pending.
    pub fn flush(&mut self, store: &mut FeatureStore, host: &dyn GraphHost) -> Vec<FeatureId> {
        let (held, ids): (Vec<FeatureId>, Vec<FeatureId>) =
            self.pending.drain(..).partition(|id| store.in_session(id));
        if held.is_empty() {
            self.resync.cancel();
        }
        self.pending.extend(held);
        if ids.is_empty() {
            return Vec::new();
        }
        for (arrow, resolved) in self.changed_arrows(store, host, ids.iter().cloned()) {
            store.apply_live_update(&arrow, |f| set_endpoints(f, &resolved));
        }
        let committed = store.commit_live_updates(Some(&ids));
        debug!("Resync committed {} arrows", committed.len());
        committed
    }

    pub fn has_pending_resync(&self) -> bool {
        self.resync.is_pending()
    }

    fn moved_arrows(
        &self,
        store: &FeatureStore,
        host: &dyn GraphHost,
        targets: &[String],
    ) -> Vec<(FeatureId, ArrowShape)> {
        let arrows: IndexSet<FeatureId> = targets
            .iter()
            .flat_map(|target| self.incoming_arrows(target))
            .collect();
        self.changed_arrows(store, host, arrows)
    }

    /// Arrows whose resolved endpoints differ from what the store shows.
    fn changed_arrows(
        &self,
        store: &FeatureStore,
        host: &dyn GraphHost,
        arrows: impl IntoIterator<Item = FeatureId>,
    ) -> Vec<(FeatureId, ArrowShape)> {
        arrows
            .into_iter()
            .filter_map(|arrow| {
                let shape = store.get_merged_feature(&arrow)?.geometry.as_arrow()?;
                let resolved = resolve_arrow(store, host, shape);
                let unchanged = resolved.start.abs_diff_eq(shape.start, 1e-4)
                    && resolved.end.abs_diff_eq(shape.end, 1e-4);
                (!unchanged).then_some((arrow, resolved))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Index maintenance
    // ------------------------------------------------------------------

    fn insert(&mut self, arrow: &str, side: Side, record: LinkRecord) -> LinkId {
        self.detach(arrow, side);
        self.next_id += 1;
        let id = self.next_id;
        let targets = if record.kind.is_node() {
            &mut self.by_node
        } else {
            &mut self.by_annotation
        };
        targets.entry(record.target.clone()).or_default().insert(id);
        self.by_arrow.insert((arrow.to_string(), side), id);
        self.links.insert(
            id,
            Link {
                id,
                arrow: arrow.to_string(),
                side,
                target: record.target,
                kind: record.kind,
                magnet: record.magnet,
            },
        );
        id
    }

    fn detach(&mut self, arrow: &str, side: Side) -> Option<Link> {
        let id = self.by_arrow.remove(&(arrow.to_string(), side))?;
        let link = self.links.remove(&id)?;
        let targets = if link.kind.is_node() {
            &mut self.by_node
        } else {
            &mut self.by_annotation
        };
        if let Some(ids) = targets.get_mut(&link.target) {
            ids.shift_remove(&id);
            if ids.is_empty() {
                targets.remove(&link.target);
            }
        }
        Some(link)
    }
}

// ----------------------------------------------------------------------
// Resolution
// ----------------------------------------------------------------------

fn target_exists(
    store: &FeatureStore,
    host: &dyn GraphHost,
    target: &str,
    kind: TargetKind,
) -> bool {
    if kind.is_node() {
        host.has_node(target)
    } else {
        target_feature(store, target, kind).is_ok()
    }
}

fn target_feature<'a>(
    store: &'a FeatureStore,
    target: &str,
    kind: TargetKind,
) -> Result<&'a Feature> {
    let feature = store
        .get_merged_feature(target)
        .ok_or_else(|| AnnotationError::UnknownFeature {
            id: target.to_string(),
        })?;
    if TargetKind::for_feature(feature.kind()) != Some(kind) {
        return Err(AnnotationError::TargetKindMismatch {
            id: target.to_string(),
            expected: kind,
        });
    }
    Ok(feature)
}

/// Frame magnets are expressed against, for annotation targets.
fn target_frame(feature: &Feature, host: &dyn GraphHost) -> Option<RectFrame> {
    match feature.geometry.as_polygon() {
        Some(polygon) => Some(polygon.bounding_frame()),
        None => feature.geometry.frame(&host.view()),
    }
}

/// Center of a link target.
pub fn target_center(
    store: &FeatureStore,
    host: &dyn GraphHost,
    target: &str,
    kind: TargetKind,
) -> Result<Vec2> {
    if kind.is_node() {
        return host
            .node(target)
            .map(|n| n.position)
            .ok_or_else(|| AnnotationError::UnknownFeature {
                id: target.to_string(),
            });
    }
    let feature = target_feature(store, target, kind)?;
    target_frame(feature, host)
        .map(|f| f.center)
        .ok_or_else(|| AnnotationError::TargetKindMismatch {
            id: target.to_string(),
            expected: kind,
        })
}

/// Graph position a link record's magnet currently points at.
///
/// Fails if the target is gone or is not the kind the record claims.
pub fn target_anchor(
    store: &FeatureStore,
    host: &dyn GraphHost,
    record: &LinkRecord,
) -> Result<Vec2> {
    if record.kind.is_node() {
        let node = host
            .node(&record.target)
            .ok_or_else(|| AnnotationError::UnknownFeature {
                id: record.target.clone(),
            })?;
        return Ok(node.position + record.magnet.normalize_or_zero() * node.radius);
    }
    let feature = target_feature(store, &record.target, record.kind)?;
    target_frame(feature, host)
        .map(|frame| frame.magnet_point(record.magnet))
        .ok_or_else(|| AnnotationError::TargetKindMismatch {
            id: record.target.clone(),
            expected: record.kind,
        })
}

/// Where a linked endpoint belongs right now.
///
/// A node boundary link hugs the node along the line toward the other end:
/// the other target's center when that end is linked too, otherwise the free
/// endpoint.
pub fn resolve_endpoint(
    store: &FeatureStore,
    host: &dyn GraphHost,
    arrow: &ArrowShape,
    side: Side,
) -> Option<Vec2> {
    let record = arrow.link(side)?;
    if record.kind.is_node() && record.magnet != Vec2::ZERO {
        let node = host.node(&record.target)?;
        let other = side.opposite();
        let toward = arrow
            .link(other)
            .and_then(|r| target_center(store, host, &r.target, r.kind).ok())
            .unwrap_or(arrow.endpoint(other));
        let direction = (toward - node.position)
            .try_normalize()
            .unwrap_or(record.magnet.normalize_or_zero());
        return Some(node.position + direction * node.radius);
    }
    target_anchor(store, host, record).ok()
}

/// Copy of `arrow` with both linked endpoints resolved. Ends whose target is
/// missing keep their current position.
pub fn resolve_arrow(store: &FeatureStore, host: &dyn GraphHost, arrow: &ArrowShape) -> ArrowShape {
    let mut resolved = arrow.clone();
    for side in Side::BOTH {
        if let Some(point) = resolve_endpoint(store, host, arrow, side) {
            resolved.set_endpoint(side, point);
        }
    }
    resolved
}

fn set_endpoints(feature: &mut Feature, resolved: &ArrowShape) {
    if let Some(arrow) = feature.geometry.as_arrow_mut() {
        arrow.start = resolved.start;
        arrow.end = resolved.end;
    }
}

/// Write an arrow shape to wherever the arrow currently lives: the overlay
/// while it is being edited or drawn, committed state otherwise.
fn write_arrow(store: &mut FeatureStore, id: &str, shape: ArrowShape) {
    let edit = move |f: &mut Feature| {
        if let Some(arrow) = f.geometry.as_arrow_mut() {
            *arrow = shape;
        }
    };
    if store.is_live(id) {
        store.apply_live_update(id, edit);
    } else {
        store.update_feature(id, edit);
    }
}

fn strip_mirror(store: &mut FeatureStore, id: &str, side: Side) {
    let edit = move |f: &mut Feature| {
        if let Some(arrow) = f.geometry.as_arrow_mut() {
            arrow.set_link(side, None);
        }
    };
    if store.is_live(id) {
        store.apply_live_update(id, edit);
    } else {
        store.update_feature(id, edit);
    }
}
