//! Transactional feature store.
//!
//! The store owns every committed feature, the live-edit overlay, selection,
//! hover and the undo history. It is the single source of truth: the spatial
//! index and link registry are caches fed from its [`AnnotationEvent`]s.
//!
//! ## Live updates
//!
//! Drags write into an overlay ([`FeatureStore::apply_live_update`]) that never
//! touches history. [`FeatureStore::commit_live_updates`] folds the overlay into
//! the committed map as one history entry; [`FeatureStore::cancel_live_updates`]
//! throws it away.
//!
//! The overlay is shared by the user's gesture and by debounced link resyncs.
//! Only ids opened by [`FeatureStore::start_live_update`] or
//! [`FeatureStore::insert_live_feature`] belong to the gesture session: they
//! decide [`FeatureStore::is_dragging`] and are the only entries a cancel drops.
//!
//! ## Module Structure
//!
//! - [`events`] - AnnotationEvent and the subscription bus
//! - [`history`] - snapshot undo/redo stacks

pub mod events;
mod history;


use bevy::log::{debug, warn};
use indexmap::{IndexMap, IndexSet};

use crate::features::{Feature, FeatureId, FeatureType, StylePatch};

pub use events::{AnnotationEvent, EventBus, Subscription};
pub use history::{History, Snapshot};

/// One overlay entry; `created` marks features that do not exist committed yet
#[derive(Debug, Clone)]
struct LiveEntry {
    feature: Feature,
    created: bool,
}

#[derive(Debug)]
pub struct FeatureStore {
    features: IndexMap<FeatureId, Feature>,
    live: IndexMap<FeatureId, LiveEntry>,
    /// Ids owned by the gesture in progress
    session: IndexSet<FeatureId>,
    selection: IndexSet<FeatureId>,
    hovered: IndexSet<FeatureId>,
    history: History,
    /// Committed state as of the last history entry
    baseline: Snapshot,
    batch_depth: usize,
    next_id: u64,
    events: EventBus<AnnotationEvent>,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_HISTORY_DEPTH)
    }
}

impl FeatureStore {
    pub fn new(history_depth: usize) -> Self {
        Self {
            features: IndexMap::new(),
            live: IndexMap::new(),
            session: IndexSet::new(),
            selection: IndexSet::new(),
            hovered: IndexSet::new(),
            history: History::new(history_depth),
            baseline: Snapshot::new(),
            batch_depth: 0,
            next_id: 0,
            events: EventBus::default(),
        }
    }

    /// Fresh id not used by any committed or live feature.
    pub fn generate_id(&mut self, kind: FeatureType) -> FeatureId {
        loop {
            self.next_id += 1;
            let id = format!("{}-{}", kind.id_prefix(), self.next_id);
            if !self.features.contains_key(&id) && !self.live.contains_key(&id) {
                return id;
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Committed feature
    pub fn get_feature(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    /// Committed feature with any pending live update applied
    pub fn get_merged_feature(&self, id: &str) -> Option<&Feature> {
        self.live
            .get(id)
            .map(|entry| &entry.feature)
            .or_else(|| self.features.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.features.contains_key(id)
    }

    /// Committed features in insertion (paint) order
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    /// Current view of every feature, including ones still being drawn
    pub fn merged_features(&self) -> impl Iterator<Item = &Feature> {
        let created = self
            .live
            .values()
            .filter(|entry| entry.created)
            .map(|entry| &entry.feature);
        self.features
            .keys()
            .filter_map(|id| self.get_merged_feature(id))
            .chain(created)
    }

    /// Paint order of a committed feature (later is on top)
    pub fn z_order(&self, id: &str) -> Option<usize> {
        self.features.get_index_of(id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// A gesture session is open.
    pub fn is_dragging(&self) -> bool {
        !self.session.is_empty()
    }

    /// Whether `id` belongs to the gesture session
    pub fn in_session(&self, id: &str) -> bool {
        self.session.contains(id)
    }

    pub fn has_live_updates(&self) -> bool {
        !self.live.is_empty()
    }

    /// Whether `id` has an entry in the live overlay
    pub fn is_live(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    // ------------------------------------------------------------------
    // Committed edits (one history entry each, unless batched)
    // ------------------------------------------------------------------

    /// Adds a feature. Returns false if the id is already taken.
    pub fn add_feature(&mut self, feature: Feature) -> bool {
        if self.features.contains_key(&feature.id) {
            warn!("Feature {} already exists, not adding", feature.id);
            return false;
        }
        let id = feature.id.clone();
        self.live.shift_remove(&id);
        self.features.insert(id.clone(), feature);
        self.events.publish(AnnotationEvent::Added(id));
        self.record();
        true
    }

    /// Removes a feature, dropping it from selection, hover and the overlay.
    pub fn remove_feature(&mut self, id: &str) -> Option<Feature> {
        let removed = self.features.shift_remove(id)?;
        self.live.shift_remove(id);
        self.session.shift_remove(id);
        if self.selection.shift_remove(id) {
            self.events
                .publish(AnnotationEvent::Unselected(vec![id.to_string()]));
        }
        if self.hovered.shift_remove(id) {
            self.publish_hover();
        }
        self.events
            .publish(AnnotationEvent::Removed(id.to_string()));
        self.record();
        Some(removed)
    }

    /// Edits a committed feature in place. Returns false for unknown ids.
    ///
    /// The closure sees the whole feature, so nested style and geometry fields
    /// it does not touch are preserved. The id cannot be changed.
    pub fn update_feature(&mut self, id: &str, edit: impl FnOnce(&mut Feature)) -> bool {
        let Some(feature) = self.features.get_mut(id) else {
            return false;
        };
        let before = feature.clone();
        edit(feature);
        feature.id = before.id.clone();
        if *feature != before {
            self.events
                .publish(AnnotationEvent::Updated(id.to_string()));
            self.record();
        }
        true
    }

    pub fn update_style(&mut self, id: &str, patch: &StylePatch) -> bool {
        self.update_feature(id, |feature| patch.apply_to(feature))
    }

    /// Runs `f` with history recording paused; everything it does lands in a
    /// single history entry (or none if nothing changed).
    pub fn batch_update<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let result = f(self);
        self.end_batch();
        result
    }

    /// Pause history recording. Must be paired with [`end_batch`](Self::end_batch);
    /// prefer [`batch_update`](Self::batch_update) where a closure fits.
    pub(crate) fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    pub(crate) fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.record();
        }
    }

    /// Replaces every feature at once and clears history (used by load).
    pub fn replace_all(&mut self, features: Vec<Feature>) {
        self.discard_overlay();
        self.features = features.into_iter().map(|f| (f.id.clone(), f)).collect();
        self.selection.retain(|id| self.features.contains_key(id));
        self.hovered.retain(|id| self.features.contains_key(id));
        self.events.publish(AnnotationEvent::Reset);
        self.clear_history();
    }

    // ------------------------------------------------------------------
    // Live overlay
    // ------------------------------------------------------------------

    /// Opens an editing session for `ids`, discarding stale overlay entries.
    pub fn start_live_update(&mut self, ids: &[FeatureId]) {
        for id in ids {
            self.live.shift_remove(id);
            self.session.insert(id.clone());
        }
        debug!("Live session started for {:?}", ids);
    }

    /// Merges an edit into the overlay only. Returns false for unknown ids.
    pub fn apply_live_update(&mut self, id: &str, edit: impl FnOnce(&mut Feature)) -> bool {
        let (mut feature, created) = match self.live.get(id) {
            Some(entry) => (entry.feature.clone(), entry.created),
            None => match self.features.get(id) {
                Some(feature) => (feature.clone(), false),
                None => return false,
            },
        };
        edit(&mut feature);
        feature.id = id.to_string();
        self.live
            .insert(id.to_string(), LiveEntry { feature, created });
        true
    }

    /// Puts a brand-new feature into the overlay. It becomes committed on
    /// [`commit_live_updates`](Self::commit_live_updates) and vanishes on cancel.
    pub fn insert_live_feature(&mut self, feature: Feature) -> bool {
        if self.features.contains_key(&feature.id) {
            return false;
        }
        self.session.insert(feature.id.clone());
        self.live.insert(
            feature.id.clone(),
            LiveEntry {
                feature,
                created: true,
            },
        );
        true
    }

    /// Folds the overlay (or just `ids`) into committed features as one
    /// history entry. Returns the ids that were actually committed.
    ///
    /// Committed ids leave the gesture session; committing everything closes it.
    pub fn commit_live_updates(&mut self, ids: Option<&[FeatureId]>) -> Vec<FeatureId> {
        let entries: Vec<(FeatureId, LiveEntry)> = match ids {
            None => {
                self.session.clear();
                self.live.drain(..).collect()
            }
            Some(ids) => {
                for id in ids {
                    self.session.shift_remove(id);
                }
                ids.iter()
                    .filter_map(|id| self.live.shift_remove(id).map(|e| (id.clone(), e)))
                    .collect()
            }
        };

        let mut committed = Vec::new();
        for (id, entry) in entries {
            match self.features.get_mut(&id) {
                Some(existing) => {
                    if *existing != entry.feature {
                        *existing = entry.feature;
                        self.events.publish(AnnotationEvent::Updated(id.clone()));
                        committed.push(id);
                    }
                }
                None if entry.created => {
                    self.features.insert(id.clone(), entry.feature);
                    self.events.publish(AnnotationEvent::Added(id.clone()));
                    committed.push(id);
                }
                // Removed while being edited
                None => {}
            }
        }
        self.record();
        committed
    }

    /// Discards the gesture session's overlay entries. Committed features,
    /// history and pending link resyncs are untouched.
    pub fn cancel_live_updates(&mut self) {
        if !self.session.is_empty() {
            debug!("Cancelled live updates for {:?}", self.session);
        }
        for id in self.session.drain(..) {
            self.live.shift_remove(&id);
        }
    }

    /// Drops every overlay entry, session or not.
    fn discard_overlay(&mut self) {
        self.live.clear();
        self.session.clear();
    }

    // ------------------------------------------------------------------
    // Selection and hover
    // ------------------------------------------------------------------

    pub fn selection(&self) -> Vec<FeatureId> {
        self.selection.iter().cloned().collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Replaces the selection; unknown ids are ignored.
    pub fn set_selection(&mut self, ids: &[FeatureId]) {
        let next: IndexSet<FeatureId> = ids
            .iter()
            .filter(|id| self.features.contains_key(*id))
            .cloned()
            .collect();
        let removed: Vec<_> = self.selection.difference(&next).cloned().collect();
        let added: Vec<_> = next.difference(&self.selection).cloned().collect();
        self.selection = next;
        if !removed.is_empty() {
            self.events.publish(AnnotationEvent::Unselected(removed));
        }
        if !added.is_empty() {
            self.events.publish(AnnotationEvent::Selected(added));
        }
    }

    /// Flips membership of `id`. Returns the new state.
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        if self.selection.shift_remove(id) {
            self.events
                .publish(AnnotationEvent::Unselected(vec![id.to_string()]));
            false
        } else if self.features.contains_key(id) {
            self.selection.insert(id.to_string());
            self.events
                .publish(AnnotationEvent::Selected(vec![id.to_string()]));
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(&[]);
    }

    pub fn hovered(&self) -> Vec<FeatureId> {
        self.hovered.iter().cloned().collect()
    }

    pub fn set_hovered(&mut self, ids: &[FeatureId]) {
        let next: IndexSet<FeatureId> = ids
            .iter()
            .filter(|id| self.features.contains_key(*id))
            .cloned()
            .collect();
        if next != self.hovered {
            self.hovered = next;
            self.publish_hover();
        }
    }

    fn publish_hover(&mut self) {
        let ids = self.hovered();
        self.events.publish(AnnotationEvent::HoverChanged(ids));
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        self.restore(true)
    }

    pub fn redo(&mut self) -> bool {
        self.restore(false)
    }

    fn restore(&mut self, undo: bool) -> bool {
        if self.has_live_updates() {
            warn!("Discarding uncommitted live updates before undo/redo");
            self.discard_overlay();
        }
        let target = if undo {
            self.history.pop_undo()
        } else {
            self.history.pop_redo()
        };
        let Some(snapshot) = target else {
            return false;
        };
        let current = std::mem::replace(&mut self.features, snapshot);
        if undo {
            self.history.push_redo(current);
        } else {
            self.history.push_undo(current);
        }
        self.baseline = self.features.clone();

        let stale: Vec<_> = self
            .selection
            .iter()
            .filter(|id| !self.features.contains_key(*id))
            .cloned()
            .collect();
        if !stale.is_empty() {
            self.selection.retain(|id| !stale.contains(id));
            self.events.publish(AnnotationEvent::Unselected(stale));
        }
        self.hovered.retain(|id| self.features.contains_key(id));

        self.events.publish(AnnotationEvent::Reset);
        self.publish_history();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_count(&self) -> usize {
        self.history.undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.history.redo_count()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.baseline = self.features.clone();
        self.publish_history();
    }

    /// Pushes a history entry if the committed map changed since the last one.
    fn record(&mut self) {
        if self.batch_depth > 0 || self.is_dragging() {
            return;
        }
        if self.features == self.baseline {
            return;
        }
        let previous = std::mem::replace(&mut self.baseline, self.features.clone());
        self.history.push(previous);
        self.publish_history();
    }

    fn publish_history(&mut self) {
        self.events.publish(AnnotationEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self) -> Subscription {
        self.events.subscribe()
    }

    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        self.events.unsubscribe(sub)
    }

    pub fn drain_events(&mut self, sub: Subscription) -> Vec<AnnotationEvent> {
        self.events.drain(sub)
    }

    /// Events `sub` lost since its last drain because it fell behind.
    pub fn dropped_events(&self, sub: Subscription) -> usize {
        self.events.dropped(sub)
    }

    /// Publishes an event on behalf of a collaborator (link registry, tools).
    pub fn notify(&mut self, event: AnnotationEvent) {
        self.events.publish(event);
    }
}
