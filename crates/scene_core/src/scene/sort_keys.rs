//! Sort-key generation for visible nodes
//!
//! One pre-order walk over the visible part of the tree. Context that flows
//! down the tree (cumulative opacity, active lights, hierarchy group) lives on
//! explicit stacks that are popped on the way back up, so sibling subtrees never
//! see each other's state.
//!
//! Hierarchy groups: the first node flagged hierarchical on a path starts a
//! group with a fresh id and measures its own camera distance. Every
//! descendant joins that group one level deeper and reuses the group's
//! distance, which keeps members of one logical object from interleaving with
//! unrelated geometry.

use crate::foundation::diagnostics::{self, FrameStats};
use crate::foundation::math::{Mat4Ext, Vec3};
use crate::render::{hash_lights, Light, RenderContext, SortKey, SortKeyInput};
use crate::scene::{NodeKey, NodeKind, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq)]
struct HierarchyFrame {
    id: u32,
    depth: u32,
    distance: f32,
}

/// Per-walk state
struct SortKeyWalk {
    camera_position: Vec3,
    z_far: f32,
    delta_time: f32,
    debug: bool,
    opacities: Vec<f32>,
    lights: Vec<Light>,
    hierarchy: Vec<Option<HierarchyFrame>>,
    next_hierarchy_id: u32,
    keys: Vec<SortKey>,
    furthest_distance: f32,
    stats: FrameStats,
}

impl SceneGraph {
    /// Sort-key pass over the visible part of the subtree at `root`
    ///
    /// Runs node actions, refreshes cumulative opacity, world-space lights and
    /// the filtered light set of every visible node, then collects the sort keys
    /// produced by attached geometry in pre-order. Identical scene state yields
    /// identical keys.
    pub fn update_sort_keys(&mut self, root: NodeKey, context: &RenderContext) -> Vec<SortKey> {
        self.thread.assert_owner("update_sort_keys");
        if !self.nodes.contains_key(root) {
            log::warn!("update_sort_keys: node {:?} not found", root);
            return Vec::new();
        }

        let debug = self.config.debug_sort_order;
        if debug {
            diagnostics::reset_debug_sort_index();
        }

        let parent_opacity = self
            .nodes[root]
            .parent
            .map_or(1.0, |parent| self.nodes[parent].computed_opacity);

        let mut walk = SortKeyWalk {
            camera_position: context.camera.position,
            z_far: context.z_far(),
            delta_time: context.delta_time,
            debug,
            opacities: vec![parent_opacity],
            lights: Vec::new(),
            hierarchy: vec![None],
            next_hierarchy_id: 1,
            keys: Vec::new(),
            furthest_distance: 0.0,
            stats: FrameStats::default(),
        };

        let mut moved = Vec::new();
        self.visit_for_sort_keys(root, 0, &mut walk, &mut moved);

        // Actions that moved nodes take effect in the next transform pass
        for key in moved {
            self.mark_dirty(key);
        }

        self.furthest_distance = walk.furthest_distance;
        self.frame_stats.accumulate(&walk.stats);
        walk.keys
    }

    fn visit_for_sort_keys(&mut self, key: NodeKey, depth: usize, walk: &mut SortKeyWalk, moved: &mut Vec<NodeKey>) {
        let frame = self.frame;
        let node = &mut self.nodes[key];
        if node.visibility_frame != frame {
            return;
        }
        walk.stats.sort_key_visits += 1;

        let executed = node.run_actions(walk.delta_time);
        walk.stats.actions_executed += executed;
        if executed > 0 && !node.dirty.is_empty() {
            moved.push(key);
        }

        let parent_opacity = walk.opacities.last().copied().unwrap_or(1.0);
        node.computed_opacity = parent_opacity * node.opacity() * node.hidden_opacity();
        node.inverse_transpose = node.world_transform.inverse_transpose();

        let lights_mark = walk.lights.len();
        for light in &mut node.lights {
            light.update_world_space(&node.world_transform, &node.world_rotation);
            walk.lights.push(light.clone());
        }
        let receiving_mask = node.light_receiving_mask();
        let bounds = node.bounding_box;
        node.computed_lights = walk
            .lights
            .iter()
            .filter(|light| light.influences(receiving_mask) && light.reaches(&bounds))
            .cloned()
            .collect();
        node.lights_hash = hash_lights(&node.computed_lights);

        let own_distance = (bounds.center() - walk.camera_position).norm();
        let group = match walk.hierarchy.last().copied().flatten() {
            Some(parent) => Some(HierarchyFrame {
                id: parent.id,
                depth: parent.depth + 1,
                distance: parent.distance,
            }),
            None if node.is_hierarchical() => {
                let id = walk.next_hierarchy_id;
                walk.next_hierarchy_id += 1;
                Some(HierarchyFrame { id, depth: 0, distance: own_distance })
            }
            None => None,
        };

        node.sort_keys.clear();
        if let Some(geometry) = node.geometry().cloned() {
            let distance = group.map_or(own_distance, |g| g.distance);
            walk.furthest_distance = walk.furthest_distance.max(bounds.furthest_distance_to_point(&walk.camera_position));

            let input = SortKeyInput {
                node: node.id(),
                rendering_order: node.rendering_order(),
                hierarchy_id: group.map_or(0, |g| g.id),
                hierarchy_depth: group.map_or(0, |g| g.depth),
                lights_hash: node.lights_hash,
                opacity: node.computed_opacity,
                distance_from_camera: distance,
                z_far: walk.z_far,
            };
            geometry.sort_keys(&input, &mut node.sort_keys);
            walk.keys.extend_from_slice(&node.sort_keys);
            walk.stats.sort_keys_emitted += node.sort_keys.len() as u32;
        }

        if let Some(emitter) = node.particle_emitter.as_mut() {
            emitter.update(&node.world_transform, walk.delta_time);
        }

        if walk.debug {
            log::info!(
                "[sort {:>4}] depth {} node {} opacity {:.3} hierarchy {:?} keys {}",
                diagnostics::next_debug_sort_index(),
                depth,
                node.id(),
                node.computed_opacity,
                group.map(|g| (g.id, g.depth)),
                node.sort_keys.len()
            );
        }

        walk.opacities.push(node.computed_opacity);
        walk.hierarchy.push(group);
        for index in 0..self.nodes[key].children.len() {
            let child = self.nodes[key].children[index];
            self.visit_for_sort_keys(child, depth + 1, walk, moved);
        }
        walk.hierarchy.pop();
        walk.opacities.pop();
        walk.lights.truncate(lights_mark);
    }

    /// Keys produced this frame by the visible subtree at `root`
    ///
    /// Children of kind [`NodeKind::Portal`] are not descended into and
    /// [`NodeKind::PortalFrame`] nodes contribute no keys of their own.
    pub fn sort_keys_for_visible_nodes(&self, root: NodeKey) -> Vec<SortKey> {
        self.thread.assert_owner("sort_keys_for_visible_nodes");
        let mut keys = Vec::new();
        if self.is_visible(root) {
            self.collect_sort_keys(root, &mut keys);
        }
        keys
    }

    fn collect_sort_keys(&self, key: NodeKey, keys: &mut Vec<SortKey>) {
        let node = &self.nodes[key];
        if node.kind() != NodeKind::PortalFrame {
            keys.extend_from_slice(&node.sort_keys);
        }
        for child in &node.children {
            let child_node = &self.nodes[*child];
            if child_node.visibility_frame == self.frame && child_node.kind() != NodeKind::Portal {
                self.collect_sort_keys(*child, keys);
            }
        }
    }
}
