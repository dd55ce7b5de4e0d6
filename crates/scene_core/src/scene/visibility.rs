//! Frustum culling over umbrella boxes
//!
//! Visibility is a frame stamp: a node is visible when its stamp equals the
//! graph's current frame. Culled subtrees are never visited, so their stamps
//! stay stale and every descendant of a culled node is invisible without any
//! per-node work.

use crate::geometry::{Frustum, FrustumResult};
use crate::render::RenderContext;
use crate::scene::{NodeKey, SceneGraph};

impl SceneGraph {
    /// Start a new frame and classify the subtree at `root` against the camera
    ///
    /// Umbrella boxes come from the most recent transform pass. A node with
    /// pending transform work has an untrustworthy umbrella and is treated as
    /// intersecting.
    pub fn update_visibility(&mut self, root: NodeKey, context: &RenderContext) {
        self.thread.assert_owner("update_visibility");
        self.begin_frame();
        if !self.nodes.contains_key(root) {
            log::warn!("update_visibility: node {:?} not found", root);
            return;
        }
        let frustum = context.camera.frustum();
        self.classify_subtree(root, &frustum);
    }

    fn classify_subtree(&mut self, key: NodeKey, frustum: &Frustum) {
        let frame = self.frame;
        let node = &mut self.nodes[key];

        let result = if node.dirty.is_empty() {
            self.frame_stats.frustum_tests += 1;
            frustum.classify_box_with_metadata(&node.umbrella_box, &mut node.frustum_metadata)
        } else {
            FrustumResult::Intersects
        };

        match result {
            FrustumResult::Outside => {}
            FrustumResult::Inside => self.mark_subtree_visible(key, frame),
            FrustumResult::Intersects => {
                node.visibility_frame = frame;
                for index in 0..self.nodes[key].children.len() {
                    let child = self.nodes[key].children[index];
                    self.classify_subtree(child, frustum);
                }
            }
        }
    }

    fn mark_subtree_visible(&mut self, root: NodeKey, frame: u64) {
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let node = &mut self.nodes[key];
            node.visibility_frame = frame;
            stack.extend(node.children.iter().copied());
        }
    }

    /// Whether the node passed frustum testing in the current frame
    pub fn is_visible(&self, key: NodeKey) -> bool {
        self.thread.assert_owner("is_visible");
        self.nodes.get(key).is_some_and(|node| node.visibility_frame == self.frame)
    }

    /// Number of visible nodes in the subtree at `root`
    pub fn count_visible_nodes(&self, root: NodeKey) -> usize {
        self.thread.assert_owner("count_visible_nodes");
        if !self.is_visible(root) {
            return 0;
        }
        let mut count = 0;
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let node = &self.nodes[key];
            if node.visibility_frame == self.frame {
                count += 1;
                stack.extend(node.children.iter().copied());
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::{Camera, Mesh};
    use crate::scene::Node;
    use std::sync::Arc;

    fn context() -> RenderContext {
        RenderContext::new(Camera::perspective(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 60.0, 1.0, 0.1, 100.0), 0.016)
    }

    #[test]
    fn test_stale_stamp_means_invisible() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node();
        graph.compute_transforms(root);
        graph.update_visibility(root, &context());
        assert!(graph.is_visible(root));

        graph.begin_frame();
        assert!(!graph.is_visible(root));
    }

    #[test]
    fn test_outside_node_and_children_invisible() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node();
        let far = graph.insert(
            Node::new()
                .with_position(Vec3::new(0.0, 0.0, 50.0))
                .with_geometry(Arc::new(Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0)))),
        );
        let far_child = graph.create_node();
        graph.add_child(root, far).unwrap();
        graph.add_child(far, far_child).unwrap();

        graph.refresh_dirty_transforms(root);
        graph.update_visibility(root, &context());
        assert!(graph.is_visible(root));
        assert!(!graph.is_visible(far));
        assert!(!graph.is_visible(far_child));
        assert_eq!(graph.count_visible_nodes(root), 1);
    }
}
