//! Comment invariant: every comment hangs off at least one arrow.
//!
//! The invariant is enforced on deletion only. Collections loaded from disk
//! can still contain orphans; [`find_orphaned_comments`] reports them and the
//! importer logs a warning for each, but nothing repairs or deletes them.

use bevy::log::{debug, warn};
use indexmap::IndexSet;

use crate::features::{FeatureId, FeatureType, TargetKind};
use crate::links::LinkRegistry;
use crate::store::FeatureStore;

fn is_comment(store: &FeatureStore, id: &str) -> bool {
    store
        .get_feature(id)
        .is_some_and(|f| f.kind() == FeatureType::Comment)
}

/// Arrows with at least one end linked to `comment`.
pub fn comment_arrows(links: &LinkRegistry, comment: &str) -> Vec<FeatureId> {
    links
        .links_to(comment)
        .into_iter()
        .filter(|link| link.kind == TargetKind::Comment)
        .map(|link| link.arrow.clone())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Comments an arrow is attached to.
pub fn arrow_comments(links: &LinkRegistry, arrow: &str) -> Vec<FeatureId> {
    links
        .arrow_links(arrow)
        .into_iter()
        .filter(|link| link.kind == TargetKind::Comment)
        .map(|link| link.target.clone())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Deletes `arrow` from `comment` unless it is the comment's last arrow.
///
/// Returns false (and leaves everything untouched) if the arrow is not
/// attached to the comment or is the only one left.
pub fn delete_arrow_from_comment(
    store: &mut FeatureStore,
    links: &mut LinkRegistry,
    comment: &str,
    arrow: &str,
) -> bool {
    let arrows = comment_arrows(links, comment);
    if !arrows.iter().any(|a| a == arrow) {
        debug!("Arrow {} is not attached to comment {}", arrow, comment);
        return false;
    }
    if arrows.len() <= 1 {
        warn!(
            "Refusing to delete arrow {}: it is the last arrow of comment {}",
            arrow, comment
        );
        return false;
    }
    links.remove_feature(store, arrow).is_some()
}

/// Deletes a comment together with every arrow attached to it, as one
/// history entry. Returns false if `comment` is not a comment.
pub fn delete_comment_with_arrows(
    store: &mut FeatureStore,
    links: &mut LinkRegistry,
    comment: &str,
) -> bool {
    if !is_comment(store, comment) {
        return false;
    }
    let arrows = comment_arrows(links, comment);
    store.batch_update(|store| {
        for arrow in &arrows {
            links.remove_feature(store, arrow);
        }
        links.remove_feature(store, comment);
    });
    debug!("Deleted comment {} with {} arrows", comment, arrows.len());
    true
}

/// Comments with no arrow attached.
pub fn find_orphaned_comments(store: &FeatureStore, links: &LinkRegistry) -> Vec<FeatureId> {
    store
        .features()
        .filter(|f| f.kind() == FeatureType::Comment)
        .filter(|f| comment_arrows(links, &f.id).is_empty())
        .map(|f| f.id.clone())
        .collect()
}

/// Deletes `ids` as one history entry, honoring the comment invariant:
/// comments take their arrows with them, and an arrow that is the last one
/// on a comment that is not itself being deleted is kept.
///
/// Returns the ids that were actually removed.
pub fn delete_features(
    store: &mut FeatureStore,
    links: &mut LinkRegistry,
    ids: &[FeatureId],
) -> Vec<FeatureId> {
    let (comments, others): (Vec<&FeatureId>, Vec<&FeatureId>) =
        ids.iter().partition(|id| is_comment(store, id));

    let mut removed = Vec::new();
    store.batch_update(|store| {
        for comment in comments {
            let arrows = comment_arrows(links, comment);
            if delete_comment_with_arrows(store, links, comment) {
                removed.extend(arrows);
                removed.push(comment.clone());
            }
        }
        for id in others {
            if !store.contains(id) {
                continue;
            }
            let last_arrow_of = arrow_comments(links, id)
                .into_iter()
                .find(|comment| comment_arrows(links, comment).len() <= 1);
            if let Some(comment) = last_arrow_of {
                warn!(
                    "Keeping arrow {}: it is the last arrow of comment {}",
                    id, comment
                );
                continue;
            }
            if links.remove_feature(store, id).is_some() {
                removed.push(id.clone());
            }
        }
    });
    removed
}
