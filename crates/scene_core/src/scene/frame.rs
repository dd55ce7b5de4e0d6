//! Per-frame driver and render entry points

use crate::foundation::diagnostics::FrameStats;
use crate::render::{DrawParams, RenderContext, RenderDriver, SortKey};
use crate::scene::{DirtyFlags, NodeKey, SceneGraph};

/// Everything one frame produces for the renderer
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    /// Keys of visible geometry elements, in traversal order
    pub sort_keys: Vec<SortKey>,
    /// Furthest camera distance of any visible geometry
    pub furthest_distance: f32,
    /// Work done this frame
    pub stats: FrameStats,
}

impl SceneGraph {
    /// Run the full per-frame pipeline over the tree at `root`
    ///
    /// Order: property animations, pending transform work, visibility,
    /// transforms, constraints, sort keys (which also runs actions).
    pub fn update_frame(&mut self, root: NodeKey, context: &RenderContext) -> FrameOutput {
        self.thread.assert_owner("update_frame");
        if !self.nodes.contains_key(root) {
            log::warn!("update_frame: node {:?} not found", root);
            return FrameOutput::default();
        }

        self.advance_animations(context.delta_time);

        let before = self.frame_stats.transforms_computed;
        self.refresh_dirty_transforms(root);
        let refreshed = self.frame_stats.transforms_computed - before;

        self.update_visibility(root, context);
        self.frame_stats.transforms_computed += refreshed;

        self.compute_transforms(root);
        self.apply_constraints(root, context);
        let sort_keys = self.update_sort_keys(root, context);

        let stats = self.frame_stats;
        self.total_stats.accumulate(&stats);
        log::trace!(
            "frame {}: {} keys, {} frustum tests, {} transforms",
            self.frame,
            sort_keys.len(),
            stats.frustum_tests,
            stats.transforms_computed
        );

        FrameOutput {
            sort_keys,
            furthest_distance: self.furthest_distance,
            stats,
        }
    }

    /// Advance every queued property animation by `delta_time` seconds
    pub fn advance_animations(&mut self, delta_time: f32) {
        self.thread.assert_owner("advance_animations");
        let moved: Vec<NodeKey> = self
            .nodes
            .iter_mut()
            .filter(|(_, node)| node.has_property_animations())
            .filter_map(|(key, node)| {
                let changed = node.advance_property_animations(delta_time);
                (changed && node.dirty.contains(DirtyFlags::TRANSFORM)).then_some(key)
            })
            .collect();
        for key in moved {
            self.mark_dirty(key);
        }
    }

    /// Draw one element of a node's geometry
    ///
    /// Returns `false` without drawing when the node has no geometry or its
    /// computed opacity is at or below the hidden threshold.
    pub fn render_node(&self, key: NodeKey, element_index: usize, driver: &mut dyn RenderDriver) -> bool {
        self.thread.assert_owner("render_node");
        self.draw(key, element_index, driver, false)
    }

    /// Draw one element of a node's geometry into the silhouette target
    pub fn render_node_silhouette(&self, key: NodeKey, element_index: usize, driver: &mut dyn RenderDriver) -> bool {
        self.thread.assert_owner("render_node_silhouette");
        self.draw(key, element_index, driver, true)
    }

    fn draw(&self, key: NodeKey, element_index: usize, driver: &mut dyn RenderDriver, silhouette: bool) -> bool {
        let Some(node) = self.nodes.get(key) else {
            return false;
        };
        let Some(geometry) = node.geometry() else {
            return false;
        };
        if node.computed_opacity <= self.config.hidden_opacity_threshold {
            return false;
        }

        let params = DrawParams {
            node: node.id(),
            transform: node.world_transform,
            inverse_transpose: node.inverse_transpose,
            opacity: node.computed_opacity,
        };
        if silhouette {
            geometry.render_silhouette(element_index, &params, driver);
        } else {
            geometry.render(element_index, &params, driver);
        }
        true
    }

    /// Start or resume the animations named `name` on every node under `root`
    ///
    /// Returns how many nodes had animations under that name.
    pub fn run_animation_recursive(&mut self, root: NodeKey, name: &str) -> usize {
        self.thread.assert_owner("run_animation_recursive");
        self.for_each_in_subtree(root, |graph, key| graph.nodes[key].run_animation(name))
    }

    /// Pause the animations named `name` on every node under `root`
    pub fn pause_animation_recursive(&mut self, root: NodeKey, name: &str) -> usize {
        self.thread.assert_owner("pause_animation_recursive");
        self.for_each_in_subtree(root, |graph, key| graph.nodes[key].pause_animation(name))
    }

    fn for_each_in_subtree(&mut self, root: NodeKey, mut f: impl FnMut(&mut Self, NodeKey) -> bool) -> usize {
        let mut count = 0;
        for key in self.descendants(root) {
            if f(self, key) {
                count += 1;
            }
            // Animations may set transforms immediately
            if self.nodes[key].dirty.contains(DirtyFlags::TRANSFORM) {
                self.mark_dirty(key);
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

    #[derive(Default)]
    struct RecordingDriver {
        drawn: Vec<(usize, f32)>,
        silhouettes: usize,
    }

    impl RenderDriver for RecordingDriver {
        fn draw_element(&mut self, element_index: usize, params: &DrawParams) {
            self.drawn.push((element_index, params.opacity));
        }

        fn draw_silhouette(&mut self, _element_index: usize, _params: &DrawParams) {
            self.silhouettes += 1;
        }
    }

    fn context() -> RenderContext {
        RenderContext::new(Camera::perspective(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 60.0, 1.0, 0.1, 100.0), 0.016)
    }

    #[test]
    fn test_frame_emits_one_key_per_element() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node();
        let cube = graph.insert(Node::new().with_geometry(Arc::new(Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0)))));
        graph.add_child(root, cube).unwrap();

        let output = graph.update_frame(root, &context());
        assert_eq!(output.sort_keys.len(), 1);
        assert_eq!(output.stats.sort_keys_emitted, 1);
        assert_eq!(graph.total_stats().sort_keys_emitted, 1);
        assert!(output.furthest_distance > 9.0);
    }

    #[test]
    fn test_render_gated_on_opacity() {
        let mut graph = SceneGraph::new();
        let cube = graph.insert(Node::new().with_geometry(Arc::new(Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0)))));
        graph.update_frame(cube, &context());

        let mut driver = RecordingDriver::default();
        assert!(graph.render_node(cube, 0, &mut driver));
        assert!(graph.render_node_silhouette(cube, 0, &mut driver));
        assert_eq!(driver.drawn, vec![(0, 1.0)]);
        assert_eq!(driver.silhouettes, 1);

        graph.node_mut(cube).unwrap().set_opacity(0.0);
        graph.update_frame(cube, &context());
        assert!(!graph.render_node(cube, 0, &mut driver));
        assert_eq!(driver.drawn.len(), 1);
    }
}
