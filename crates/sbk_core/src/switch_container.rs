//! Switch-container trees.
//!
//! A switch container selects among alternate media sets based on a runtime
//! switch or state value. Nodes reference their group value by GUID only; the
//! group value itself lives in the asset catalog.

use crate::ids::{Guid, MediaId};
use serde::{Deserialize, Serialize};

/// One node of a switch-container tree.
///
/// Equality is structural and order-insensitive: two nodes are equal when
/// they reference the same group value and default, hold the same media set
/// and have pairwise-equal children in any order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchContainerNode {
    /// Resolved group value gating this node. `None` when the exported
    /// switch value could not be found.
    pub group_value: Option<Guid>,
    pub default_group_value: Option<Guid>,
    pub media: Vec<MediaId>,
    pub children: Vec<SwitchContainerNode>,
}

impl SwitchContainerNode {
    pub fn new(group_value: Option<Guid>) -> Self {
        Self {
            group_value,
            ..Default::default()
        }
    }

    /// Add a media id to this node, ignoring duplicates.
    pub fn add_media(&mut self, id: MediaId) {
        if !self.media.contains(&id) {
            self.media.push(id);
        }
    }

    /// Every media id referenced by this node and its descendants.
    pub fn collect_media(&self, out: &mut Vec<MediaId>) {
        out.extend_from_slice(&self.media);
        for child in &self.children {
            child.collect_media(out);
        }
    }
}

impl PartialEq for SwitchContainerNode {
    fn eq(&self, other: &Self) -> bool {
        self.group_value == other.group_value
            && self.default_group_value == other.default_group_value
            && same_media_set(&self.media, &other.media)
            && trees_equal(&self.children, &other.children)
    }
}

impl Eq for SwitchContainerNode {}

fn same_media_set(a: &[MediaId], b: &[MediaId]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// Compare two forests ignoring sibling order.
///
/// Each node of `a` must be matched to a distinct, equal node of `b`.
pub fn trees_equal(a: &[SwitchContainerNode], b: &[SwitchContainerNode]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut used = vec![false; b.len()];
    'outer: for node in a {
        for (idx, candidate) in b.iter().enumerate() {
            if !used[idx] && node == candidate {
                used[idx] = true;
                continue 'outer;
            }
        }
        return false;
    }

    true
}
