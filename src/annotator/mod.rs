//! Public facade over the annotation core.
//!
//! [`Annotator`] owns the store, its caches (spatial index, link registry),
//! the interaction controller and the host view of the graph. Every operation
//! goes through the store; afterwards the facade drains its private event
//! subscription and feeds the caches, so handlers and callers never patch
//! them directly.
//!
//! Time never advances on its own: call [`Annotator::tick`] once per frame so
//! debounced link resyncs get committed.

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Instant;

use bevy::log::{debug, info, warn};
use bevy::math::{Rect, Vec2};
use indexmap::IndexSet;

use crate::comments;
use crate::config::AnnotationConfig;
use crate::error::Result;
use crate::features::{Feature, FeatureCollection, FeatureId, Side, StylePatch};
use crate::handlers::{Tool, ToolContext};
use crate::host::{GraphHost, GraphSnapshot};
use crate::interaction::{InteractionController, Key, KeyOutcome, Modifiers};
use crate::links::LinkRegistry;
use crate::persistence;
use crate::spatial::SpatialIndex;
use crate::store::{AnnotationEvent, FeatureStore, Subscription};

pub struct Annotator<H: GraphHost = GraphSnapshot> {
    store: FeatureStore,
    index: SpatialIndex,
    links: LinkRegistry,
    controller: InteractionController,
    config: AnnotationConfig,
    host: H,
    cache_feed: Subscription,
}

impl Default for Annotator<GraphSnapshot> {
    fn default() -> Self {
        Self::new(AnnotationConfig::default(), GraphSnapshot::new())
    }
}

impl<H: GraphHost> Annotator<H> {
    pub fn new(config: AnnotationConfig, host: H) -> Self {
        let mut store = FeatureStore::new(config.history_depth);
        let cache_feed = store.subscribe();
        let mut index = SpatialIndex::new();
        index.rebuild(&store, host.view());
        Self {
            store,
            index,
            links: LinkRegistry::new(config.debounce()),
            controller: InteractionController::new(),
            config,
            host,
            cache_feed,
        }
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    /// Swap the tunables. History depth and resync debounce keep the values
    /// this annotator was built with.
    pub fn set_config(&mut self, config: AnnotationConfig) {
        self.config = config;
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access. Follow node or camera changes with
    /// [`notify_nodes_changed`](Self::notify_nodes_changed) or
    /// [`notify_view_changed`](Self::notify_view_changed).
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn get_feature(&self, id: &str) -> Option<&Feature> {
        self.store.get_feature(id)
    }

    /// Committed state with any in-flight edit applied; what should be drawn.
    pub fn get_merged_feature(&self, id: &str) -> Option<&Feature> {
        self.store.get_merged_feature(id)
    }

    /// Ids whose bounds intersect `rect`, topmost last.
    pub fn features_in(&self, rect: Rect) -> Vec<FeatureId> {
        let mut ids = self.index.query(rect);
        ids.sort_by_key(|id| self.store.z_order(id));
        ids
    }

    // ------------------------------------------------------------------
    // Feature CRUD
    // ------------------------------------------------------------------

    pub fn add_feature(&mut self, feature: Feature) -> bool {
        self.links.flush(&mut self.store, &self.host);
        let added = self.store.add_feature(feature);
        self.sync_caches();
        added
    }

    /// Removes one feature. Comments take their arrows with them and the last
    /// arrow of a comment cannot be removed on its own.
    pub fn remove_feature(&mut self, id: &str) -> bool {
        !self.delete_features(&[id.to_string()]).is_empty()
    }

    /// Removes `ids` as one history entry. Returns what was actually removed.
    pub fn delete_features(&mut self, ids: &[FeatureId]) -> Vec<FeatureId> {
        self.links.flush(&mut self.store, &self.host);
        let removed = comments::delete_features(&mut self.store, &mut self.links, ids);
        self.sync_caches();
        removed
    }

    /// Edits a committed feature. Arrows linked to it follow within the same
    /// history entry.
    pub fn update_feature(&mut self, id: &str, edit: impl FnOnce(&mut Feature)) -> bool {
        self.links.flush(&mut self.store, &self.host);
        let links = &mut self.links;
        let host = &self.host;
        let updated = self.store.batch_update(|store| {
            let updated = store.update_feature(id, edit);
            if updated {
                links.follow_targets(store, host, &[id.to_string()]);
            }
            updated
        });
        self.sync_caches();
        updated
    }

    pub fn update_style(&mut self, id: &str, patch: &StylePatch) -> bool {
        self.links.flush(&mut self.store, &self.host);
        let updated = self.store.update_style(id, patch);
        self.sync_caches();
        updated
    }

    // ------------------------------------------------------------------
    // Collections and persistence
    // ------------------------------------------------------------------

    /// Adds every feature of `collection` as one history entry. Link mirrors
    /// on incoming arrows are re-established against existing targets.
    /// Returns how many features were added.
    pub fn add_collection(&mut self, collection: FeatureCollection) -> usize {
        self.links.flush(&mut self.store, &self.host);
        let total = collection.features.len();
        let added = self.store.batch_update(|store| {
            collection
                .features
                .into_iter()
                .map(|feature| store.add_feature(feature))
                .filter(|added| *added)
                .count()
        });
        self.sync_caches();
        if added < total {
            warn!("Skipped {} features with duplicate ids", total - added);
        }
        self.warn_orphans();
        info!("Imported {} annotations", added);
        added
    }

    pub fn export_collection(&self) -> FeatureCollection {
        FeatureCollection {
            features: self.store.features().cloned().collect(),
        }
    }

    /// Replaces all content with `collection` and clears history.
    pub fn replace_collection(&mut self, collection: FeatureCollection) {
        self.cancel();
        self.links.flush(&mut self.store, &self.host);
        self.store.replace_all(collection.features);
        self.sync_caches();
        self.warn_orphans();
    }

    pub fn save_collection(&self, path: &Path) -> Result<()> {
        persistence::save_collection(path, &self.export_collection())
    }

    /// Loads `path`, replacing current content. Nothing changes on error.
    pub fn load_collection(&mut self, path: &Path) -> Result<usize> {
        let collection = persistence::load_collection(path)?;
        let count = collection.features.len();
        self.replace_collection(collection);
        Ok(count)
    }

    fn warn_orphans(&self) {
        for comment in comments::find_orphaned_comments(&self.store, &self.links) {
            warn!("Comment {} has no arrow attached", comment);
        }
    }

    // ------------------------------------------------------------------
    // Selection and hover
    // ------------------------------------------------------------------

    pub fn selection(&self) -> Vec<FeatureId> {
        self.store.selection()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.store.is_selected(id)
    }

    pub fn set_selection(&mut self, ids: &[FeatureId]) {
        self.store.set_selection(ids);
    }

    pub fn toggle_selection(&mut self, id: &str) -> bool {
        self.store.toggle_selection(id)
    }

    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
    }

    pub fn hovered(&self) -> Vec<FeatureId> {
        self.store.hovered()
    }

    pub fn set_hovered(&mut self, ids: &[FeatureId]) {
        self.store.set_hovered(ids);
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Abandons any gesture in flight, commits pending resyncs, then undoes.
    pub fn undo(&mut self) -> bool {
        self.restore(true)
    }

    pub fn redo(&mut self) -> bool {
        self.restore(false)
    }

    fn restore(&mut self, undo: bool) -> bool {
        let restored = self.with_ctx(|controller, ctx| {
            controller.cancel(ctx);
            ctx.links.flush(ctx.store, ctx.host);
            if undo {
                ctx.store.undo()
            } else {
                ctx.store.redo()
            }
        });
        debug!("{} -> {}", if undo { "Undo" } else { "Redo" }, restored);
        restored
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    pub fn clear_history(&mut self) {
        self.links.flush(&mut self.store, &self.host);
        self.store.clear_history();
        self.sync_caches();
    }

    // ------------------------------------------------------------------
    // Drawing entry points
    // ------------------------------------------------------------------

    /// Start drawing with `tool` at `point` (graph space) right away.
    pub fn start_tool(&mut self, tool: Tool, point: Vec2) {
        self.with_ctx(|controller, ctx| controller.start_tool(ctx, tool, point));
    }

    /// Arm `tool` so the next pointer-down starts drawing.
    pub fn enable_tool(&mut self, tool: Tool) {
        self.controller.arm(tool);
    }

    pub fn armed_tool(&self) -> Option<Tool> {
        self.controller.armed()
    }

    pub fn start_arrow(&mut self, point: Vec2) {
        self.start_tool(Tool::Arrow, point);
    }

    pub fn start_box(&mut self, point: Vec2) {
        self.start_tool(Tool::Box, point);
    }

    pub fn start_text(&mut self, point: Vec2) {
        self.start_tool(Tool::Text, point);
    }

    pub fn start_polygon(&mut self, point: Vec2) {
        self.start_tool(Tool::Polygon, point);
    }

    pub fn start_comment(&mut self, point: Vec2) {
        self.start_tool(Tool::Comment, point);
    }

    pub fn enable_arrow(&mut self) {
        self.enable_tool(Tool::Arrow);
    }

    pub fn enable_box(&mut self) {
        self.enable_tool(Tool::Box);
    }

    pub fn enable_text(&mut self) {
        self.enable_tool(Tool::Text);
    }

    pub fn enable_polygon(&mut self) {
        self.enable_tool(Tool::Polygon);
    }

    pub fn enable_comment(&mut self) {
        self.enable_tool(Tool::Comment);
    }

    // ------------------------------------------------------------------
    // Pointer and keyboard routing (graph-space points)
    // ------------------------------------------------------------------

    pub fn pointer_down(&mut self, point: Vec2, modifiers: Modifiers) {
        self.with_ctx(|controller, ctx| controller.pointer_down(ctx, point, modifiers));
    }

    pub fn pointer_move(&mut self, point: Vec2) {
        self.with_ctx(|controller, ctx| controller.pointer_move(ctx, point));
    }

    pub fn pointer_up(&mut self, point: Vec2) -> Option<FeatureId> {
        self.with_ctx(|controller, ctx| controller.pointer_up(ctx, point))
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> KeyOutcome {
        self.with_ctx(|controller, ctx| controller.key_down(ctx, key, modifiers))
    }

    /// Complete a multi-press drawing (polygon).
    pub fn finish_drawing(&mut self) -> Option<FeatureId> {
        self.with_ctx(|controller, ctx| controller.finish(ctx))
    }

    /// Abandon the gesture in flight. Returns false if nothing was active.
    pub fn cancel(&mut self) -> bool {
        self.with_ctx(|controller, ctx| controller.cancel(ctx))
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    // ------------------------------------------------------------------
    // Host notifications and deferred work
    // ------------------------------------------------------------------

    /// Commits debounced link resyncs that have come due.
    pub fn tick(&mut self, now: Instant) -> Vec<FeatureId> {
        let committed = self.links.tick(&mut self.store, &self.host, now);
        if !committed.is_empty() {
            self.sync_caches();
        }
        committed
    }

    /// Nodes in `ids` moved, appeared or disappeared in the host. Arrows linked
    /// to moved nodes follow in the overlay until the debounced commit; links
    /// to vanished nodes are dropped.
    pub fn notify_nodes_changed(&mut self, ids: &[String], now: Instant) -> usize {
        let (present, gone): (Vec<String>, Vec<String>) =
            ids.iter().cloned().partition(|id| self.host.has_node(id));

        if !gone.is_empty() {
            let links = &mut self.links;
            self.store.batch_update(|store| {
                for node in &gone {
                    links.on_node_removed(store, node);
                }
            });
        }
        for node in &present {
            self.reattach_node(node);
        }
        let moved = self
            .links
            .refresh_targets(&mut self.store, &self.host, &present, now);
        self.sync_caches();
        moved
    }

    /// Index arrows whose mirrors were waiting for `node` to show up.
    fn reattach_node(&mut self, node: &str) {
        let waiting: Vec<FeatureId> = self
            .store
            .features()
            .filter_map(|f| {
                let arrow = f.geometry.as_arrow()?;
                Side::BOTH
                    .iter()
                    .any(|side| {
                        arrow
                            .link(*side)
                            .is_some_and(|r| r.kind.is_node() && r.target == node)
                            && self.links.get_arrow_link(&f.id, *side).is_none()
                    })
                    .then(|| f.id.clone())
            })
            .collect();
        for arrow in waiting {
            self.links.sync_arrow(&self.store, &self.host, &arrow);
        }
    }

    /// The host camera changed. Screen-aligned features get new bounds and
    /// arrows linked to them are resynced.
    pub fn notify_view_changed(&mut self, now: Instant) -> usize {
        let view = self.host.view();
        let previous = self.index.view();
        self.index.set_view(&self.store, view);
        if previous.zoom == view.zoom && previous.rotation == view.rotation {
            return 0;
        }
        let moved = self
            .links
            .refresh_view_dependent(&mut self.store, &self.host, now);
        self.sync_caches();
        moved
    }

    // ------------------------------------------------------------------
    // Comment invariant
    // ------------------------------------------------------------------

    pub fn comment_arrows(&self, comment: &str) -> Vec<FeatureId> {
        comments::comment_arrows(&self.links, comment)
    }

    pub fn delete_arrow_from_comment(&mut self, comment: &str, arrow: &str) -> bool {
        self.links.flush(&mut self.store, &self.host);
        let deleted =
            comments::delete_arrow_from_comment(&mut self.store, &mut self.links, comment, arrow);
        self.sync_caches();
        deleted
    }

    pub fn delete_comment_with_arrows(&mut self, comment: &str) -> bool {
        self.links.flush(&mut self.store, &self.host);
        let deleted =
            comments::delete_comment_with_arrows(&mut self.store, &mut self.links, comment);
        self.sync_caches();
        deleted
    }

    pub fn find_orphaned_comments(&self) -> Vec<FeatureId> {
        comments::find_orphaned_comments(&self.store, &self.links)
    }

    // ------------------------------------------------------------------
    // Change notifications
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self) -> Subscription {
        self.store.subscribe()
    }

    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        sub != self.cache_feed && self.store.unsubscribe(sub)
    }

    pub fn drain_events(&mut self, sub: Subscription) -> Vec<AnnotationEvent> {
        if sub == self.cache_feed {
            return Vec::new();
        }
        self.store.drain_events(sub)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn with_ctx<R>(
        &mut self,
        f: impl FnOnce(&mut InteractionController, &mut ToolContext) -> R,
    ) -> R {
        let mut ctx = ToolContext {
            store: &mut self.store,
            index: &self.index,
            links: &mut self.links,
            host: &self.host,
            config: &self.config,
        };
        let result = f(&mut self.controller, &mut ctx);
        self.sync_caches();
        result
    }

    /// Feed the caches from store events until none are left. Structural
    /// changes rebuild the index; plain updates patch it.
    fn sync_caches(&mut self) {
        loop {
            // A feed that fell behind cannot be patched from what is left
            let lossy = self.store.dropped_events(self.cache_feed) > 0;
            let events = self.store.drain_events(self.cache_feed);
            if events.is_empty() {
                return;
            }
            let mut structural = lossy;
            let mut touched = IndexSet::new();
            for event in events {
                match event {
                    AnnotationEvent::Added(id) => {
                        structural = true;
                        self.links.on_feature_added(&self.store, &self.host, &id);
                    }
                    AnnotationEvent::Removed(id) => {
                        structural = true;
                        self.links.on_feature_removed(&mut self.store, &id);
                    }
                    AnnotationEvent::Updated(id) => {
                        if self
                            .store
                            .get_feature(&id)
                            .is_some_and(|f| f.geometry.as_arrow().is_some())
                        {
                            self.links.sync_arrow(&self.store, &self.host, &id);
                        }
                        touched.insert(id);
                    }
                    AnnotationEvent::Reset => {
                        structural = true;
                        self.links.rebuild(&self.store, &self.host);
                    }
                    _ => {}
                }
            }
            if lossy {
                warn!("Annotation cache feed overflowed, rebuilding caches");
                self.links.rebuild(&self.store, &self.host);
            }
            if structural {
                self.index.rebuild(&self.store, self.host.view());
            } else if !touched.is_empty() {
                let ids: Vec<FeatureId> = touched.into_iter().collect();
                self.index.patch(&self.store, &ids);
            }
        }
    }
}
