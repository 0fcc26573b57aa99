//! Spatial index for annotation hit-testing and snapping.
//!
//! Features are indexed by their graph-space bounding box in an R*-tree. The
//! index only ever sees committed features: it is rebuilt when features are
//! added or removed and patched for the ids a drag session commits, never
//! during live-drag frames.
//!
//! Text and comments are screen-aligned, and fixed-size features scale with
//! zoom, so their boxes depend on the view. [`SpatialIndex::set_view`]
//! recomputes just those entries.
//!
//! Queries return candidates only; callers run the exact predicates in
//! [`crate::detection`] afterwards.


use std::collections::{HashMap, HashSet};

use bevy::log::debug;
use bevy::math::{Rect, Vec2};
use rstar::{AABB, RTree, RTreeObject};

use crate::features::{Feature, FeatureId};
use crate::host::ViewState;
use crate::store::FeatureStore;

/// A feature entry stored in the R*-tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexedFeature {
    envelope: AABB<[f32; 2]>,
    id: FeatureId,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn envelope_of(rect: Rect) -> AABB<[f32; 2]> {
    AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y])
}

#[derive(Default)]
pub struct SpatialIndex {
    tree: RTree<IndexedFeature>,
    envelopes: HashMap<FeatureId, AABB<[f32; 2]>>,
    /// Ids whose bounds change with view rotation or zoom
    view_dependent: HashSet<FeatureId>,
    view: ViewState,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from every committed feature.
    pub fn rebuild(&mut self, store: &FeatureStore, view: ViewState) {
        self.view = view;
        self.envelopes.clear();
        self.view_dependent.clear();
        let entries: Vec<_> = store
            .features()
            .map(|feature| self.entry_for(feature))
            .collect();
        self.tree = RTree::bulk_load(entries);
        debug!("Spatial index rebuilt with {} features", self.tree.size());
    }

    /// Remove and reinsert `ids` from their committed state. Ids no longer in
    /// the store are dropped.
    pub fn patch(&mut self, store: &FeatureStore, ids: &[FeatureId]) {
        for id in ids {
            self.remove(id);
            if let Some(feature) = store.get_feature(id) {
                let entry = self.entry_for(feature);
                self.tree.insert(entry);
            }
        }
    }

    /// Update the view and recompute view-dependent entries if it changed.
    /// Returns how many entries were recomputed.
    pub fn set_view(&mut self, store: &FeatureStore, view: ViewState) -> usize {
        let changed = view.rotation != self.view.rotation || view.zoom != self.view.zoom;
        self.view = view;
        if !changed {
            return 0;
        }
        let ids: Vec<FeatureId> = self.view_dependent.iter().cloned().collect();
        self.patch(store, &ids);
        ids.len()
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    /// Candidate ids whose bounds intersect `rect`, in no particular order.
    pub fn query(&self, rect: Rect) -> Vec<FeatureId> {
        self.tree
            .locate_in_envelope_intersecting(&envelope_of(rect))
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Candidates within `margin` of `point`.
    pub fn query_point(&self, point: Vec2, margin: f32) -> Vec<FeatureId> {
        self.query(Rect::from_center_half_size(point, Vec2::splat(margin.max(0.0))))
    }

    pub fn bounds(&self, id: &str) -> Option<Rect> {
        self.envelopes.get(id).map(|env| {
            let (min, max) = (env.lower(), env.upper());
            Rect::new(min[0], min[1], max[0], max[1])
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.envelopes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    fn entry_for(&mut self, feature: &Feature) -> IndexedFeature {
        let envelope = envelope_of(feature.bounds(&self.view));
        self.envelopes.insert(feature.id.clone(), envelope);
        if feature.geometry.is_view_dependent() {
            self.view_dependent.insert(feature.id.clone());
        }
        IndexedFeature {
            envelope,
            id: feature.id.clone(),
        }
    }

    fn remove(&mut self, id: &str) {
        self.view_dependent.remove(id);
        if let Some(envelope) = self.envelopes.remove(id) {
            self.tree.remove(&IndexedFeature {
                envelope,
                id: id.to_string(),
            });
        }
    }
}
