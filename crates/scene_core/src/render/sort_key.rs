//! Render-order sort keys
//!
//! The sort-key generator fills a [`SortKeyInput`] per visible node and the node's
//! geometry expands it into one [`SortKey`] per drawable element. Final ordering
//! belongs to the renderer; [`SortKey::render_order`] is the default it can use.

use std::cmp::Ordering;

use crate::scene::NodeId;

/// Per-node metadata handed to [`crate::render::Geometry::sort_keys`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKeyInput {
    /// Node that owns the geometry
    pub node: NodeId,
    /// Explicit rendering-order tie break from the node
    pub rendering_order: i32,
    /// Hierarchy group id (0 when the node is not hierarchical)
    pub hierarchy_id: u32,
    /// Depth within the hierarchy group (0 when not hierarchical)
    pub hierarchy_depth: u32,
    /// Hash of the node's filtered light set
    pub lights_hash: u64,
    /// Cumulative opacity
    pub opacity: f32,
    /// Distance from the camera (shared across a hierarchy group)
    pub distance_from_camera: f32,
    /// Camera far plane, for normalizing the distance
    pub z_far: f32,
}

/// One drawable element's place in the render order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    /// Node that owns the geometry
    pub node: NodeId,
    /// Geometry element index
    pub element_index: usize,
    /// Explicit rendering-order tie break
    pub rendering_order: i32,
    /// Hierarchy group id
    pub hierarchy_id: u32,
    /// Depth within the hierarchy group
    pub hierarchy_depth: u32,
    /// Hash of the node's filtered light set
    pub lights_hash: u64,
    /// Cumulative opacity
    pub opacity: f32,
    /// Distance from the camera
    pub distance_from_camera: f32,
    /// Camera far plane
    pub z_far: f32,
}

impl SortKey {
    /// Build the key for one element from per-node input
    pub fn from_input(input: &SortKeyInput, element_index: usize) -> Self {
        Self {
            node: input.node,
            element_index,
            rendering_order: input.rendering_order,
            hierarchy_id: input.hierarchy_id,
            hierarchy_depth: input.hierarchy_depth,
            lights_hash: input.lights_hash,
            opacity: input.opacity,
            distance_from_camera: input.distance_from_camera,
            z_far: input.z_far,
        }
    }

    /// Whether the element needs blending
    pub fn is_translucent(&self) -> bool {
        self.opacity < 1.0
    }

    /// Camera distance normalized to `[0, 1]` by the far plane
    pub fn normalized_distance(&self) -> f32 {
        if self.z_far <= 0.0 {
            return 0.0;
        }
        (self.distance_from_camera / self.z_far).clamp(0.0, 1.0)
    }

    /// Default render ordering
    ///
    /// Rendering order first, then opaque before translucent, then hierarchy
    /// group and depth so group members draw together parent-first, then
    /// translucent elements far-to-near and opaque ones near-to-far, then light
    /// set to batch material state. Node and element ids make the order total.
    pub fn render_order(&self, other: &SortKey) -> Ordering {
        self.rendering_order
            .cmp(&other.rendering_order)
            .then_with(|| self.is_translucent().cmp(&other.is_translucent()))
            .then_with(|| self.hierarchy_id.cmp(&other.hierarchy_id))
            .then_with(|| self.hierarchy_depth.cmp(&other.hierarchy_depth))
            .then_with(|| {
                let near_to_far = self.distance_from_camera.total_cmp(&other.distance_from_camera);
                if self.is_translucent() { near_to_far.reverse() } else { near_to_far }
            })
            .then_with(|| self.lights_hash.cmp(&other.lights_hash))
            .then_with(|| self.node.cmp(&other.node))
            .then_with(|| self.element_index.cmp(&other.element_index))
    }
}

/// Sort keys in place with [`SortKey::render_order`]
pub fn sort_for_rendering(keys: &mut [SortKey]) {
    keys.sort_by(SortKey::render_order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(node: u64, opacity: f32, distance: f32) -> SortKey {
        SortKey::from_input(
            &SortKeyInput {
                node: NodeId::from_raw(node),
                rendering_order: 0,
                hierarchy_id: 0,
                hierarchy_depth: 0,
                lights_hash: 0,
                opacity,
                distance_from_camera: distance,
                z_far: 100.0,
            },
            0,
        )
    }

    #[test]
    fn test_opaque_before_translucent() {
        let mut keys = vec![key(1, 0.5, 1.0), key(2, 1.0, 50.0)];
        sort_for_rendering(&mut keys);
        assert_eq!(keys[0].node, NodeId::from_raw(2));
    }

    #[test]
    fn test_translucent_far_to_near() {
        let mut keys = vec![key(1, 0.5, 1.0), key(2, 0.5, 50.0)];
        sort_for_rendering(&mut keys);
        assert_eq!(keys[0].node, NodeId::from_raw(2));
    }

    #[test]
    fn test_rendering_order_wins() {
        let mut late = key(1, 1.0, 1.0);
        late.rendering_order = 5;
        let mut keys = vec![late, key(2, 0.5, 50.0)];
        sort_for_rendering(&mut keys);
        assert_eq!(keys[1].node, NodeId::from_raw(1));
    }

    #[test]
    fn test_normalized_distance() {
        assert!((key(1, 1.0, 25.0).normalized_distance() - 0.25).abs() < 1e-6);
        assert_eq!(key(1, 1.0, 500.0).normalized_distance(), 1.0);
    }
}
