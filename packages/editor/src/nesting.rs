//! # Nesting Resolver
//!
//! Decides which template every cloned node links to. The answer comes from
//! the relation pointers the source node already has, never from its
//! position:
//!
//! - source is an instance: the clone joins the same template
//! - source is a template: the clone becomes one of its instances
//! - source is plain: the copy held by the main symbol becomes the template
//!   and every other copy (the source included) becomes its instance
//!
//! This keeps symbols nested inside other symbols in a single relation no
//! matter how many times the outer symbol multiplies them.

use crate::errors::{RelationError, SyncWarning};
use crate::relation::RelationIndex;
use composer_model::{NodeId, Tree};
use tracing::warn;

/// Template a clone of `source` joins, if `source` is already related
pub(crate) fn link_target(relations: &RelationIndex, source: &NodeId) -> Option<NodeId> {
    relations
        .template_of(source)
        .cloned()
        .or_else(|| relations.is_template(source).then(|| source.clone()))
}

/// Link a fresh symbol clone (`createSymbol`) to its source.
///
/// `pairs` are `(source, clone)` in pre-order as returned by
/// [`Tree::deep_clone`]. Plain sources become templates of their clone.
pub(crate) fn link_symbol_clone(
    tree: &Tree,
    relations: &mut RelationIndex,
    pairs: &[(NodeId, NodeId)],
) -> Result<(), RelationError> {
    let targets: Vec<NodeId> = pairs
        .iter()
        .map(|(source, _)| link_target(relations, source).unwrap_or_else(|| source.clone()))
        .collect();

    for ((_, clone), target) in pairs.iter().zip(&targets) {
        relations.link(tree, clone, target)?;
    }
    Ok(())
}

/// Link the copies made by an insert fan-out.
///
/// `source` is the inserted subtree in pre-order; each entry of `copies` is
/// `(peer, clones)` with clones in the same order. `canonical_peer` is the
/// main symbol when the insert did not originate there.
pub(crate) fn link_copies(
    tree: &Tree,
    relations: &mut RelationIndex,
    source: &[NodeId],
    copies: &[(NodeId, Vec<NodeId>)],
    canonical_peer: Option<&NodeId>,
) -> Vec<SyncWarning> {
    let targets: Vec<Option<NodeId>> = source
        .iter()
        .map(|id| link_target(relations, id))
        .collect();
    let canonical_copies = canonical_peer.and_then(|main| {
        copies
            .iter()
            .find(|(peer, _)| peer == main)
            .map(|(_, clones)| clones)
    });

    let mut warnings = Vec::new();
    let mut link = |relations: &mut RelationIndex, instance: &NodeId, template: &NodeId| {
        if let Err(error) = relations.link(tree, instance, template) {
            warn!(instance = %instance, template = %template, %error, "Could not link copy");
            warnings.push(SyncWarning::InvalidRelation {
                node: instance.clone(),
                error,
            });
        }
    };

    for (k, (node, target)) in source.iter().zip(&targets).enumerate() {
        let clones = copies.iter().filter_map(|(_, clones)| clones.get(k));

        match target {
            Some(template) => {
                for clone in clones {
                    link(&mut *relations, clone, template);
                }
            }
            None => {
                let canonical = canonical_copies
                    .and_then(|c| c.get(k))
                    .unwrap_or(node)
                    .clone();
                for member in std::iter::once(node).chain(clones) {
                    if *member != canonical {
                        link(&mut *relations, member, &canonical);
                    }
                }
            }
        }
    }

    warnings
}
