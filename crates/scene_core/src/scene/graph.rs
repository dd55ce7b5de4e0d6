//! Arena-backed scene tree
//!
//! Nodes live in a `slotmap` arena owned by [`SceneGraph`]. Children are held as
//! keys in their parent's list and the parent link is a plain key, so there are
//! no reference cycles to break. Every operation asserts that it runs on the
//! thread that created the graph.

use std::sync::Arc;

use slotmap::SlotMap;

use crate::config::SceneConfig;
use crate::error::{SceneError, SceneResult};
use crate::foundation::diagnostics::FrameStats;
use crate::scene::thread::ThreadRestricted;
use crate::scene::node::NEVER_VISIBLE;
use crate::scene::{DirtyFlags, Node, NodeId, NodeKey, PhysicsBody, Scene};

/// The scene tree and its per-frame bookkeeping
pub struct SceneGraph {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    pub(crate) thread: ThreadRestricted,
    pub(crate) config: SceneConfig,
    pub(crate) frame: u64,
    pub(crate) frame_stats: FrameStats,
    pub(crate) total_stats: FrameStats,
    pub(crate) furthest_distance: f32,
}

impl SceneGraph {
    /// Create an empty graph owned by the calling thread
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create an empty graph with custom settings
    pub fn with_config(config: SceneConfig) -> Self {
        log::debug!("Creating scene graph with config: {:?}", config);
        Self {
            nodes: SlotMap::with_key(),
            thread: ThreadRestricted::current(),
            config,
            frame: 0,
            frame_stats: FrameStats::default(),
            total_stats: FrameStats::default(),
            furthest_distance: 0.0,
        }
    }

    /// Current settings
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Replace the settings
    pub fn set_config(&mut self, config: SceneConfig) {
        self.thread.assert_owner("set_config");
        self.config = config;
    }

    /// Whether the calling thread owns this graph
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.thread.is_owner()
    }

    // ---------------------------------------------------------------------
    // Node storage

    /// Create an unparented node with the configured default masks
    pub fn create_node(&mut self) -> NodeKey {
        let mut node = Node::new();
        node.set_light_receiving_mask(self.config.default_light_receiving_mask);
        node.set_shadow_casting_mask(self.config.default_shadow_casting_mask);
        self.insert(node)
    }

    /// Move a node into the graph, unparented
    pub fn insert(&mut self, mut node: Node) -> NodeKey {
        self.thread.assert_owner("insert");
        node.parent = None;
        node.children.clear();
        node.visibility_frame = NEVER_VISIBLE;
        node.dirty |= DirtyFlags::TRANSFORM;
        log::trace!("Inserting node {}", node.id());
        self.nodes.insert(node)
    }

    /// Look up a node
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.thread.assert_owner("node");
        self.nodes.get(key)
    }

    /// Look up a node for mutation
    ///
    /// The node is marked dirty so the next transform pass revisits it even if
    /// it has been culled.
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.thread.assert_owner("node_mut");
        if !self.nodes.contains_key(key) {
            return None;
        }
        self.mark_dirty(key);
        self.nodes.get_mut(key)
    }

    /// Whether the key refers to a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find a node by id
    pub fn find_by_id(&self, id: NodeId) -> Option<NodeKey> {
        self.thread.assert_owner("find_by_id");
        self.nodes.iter().find(|(_, node)| node.id() == id).map(|(key, _)| key)
    }

    /// First node with the given name in the subtree at `root`, pre-order
    pub fn find_by_name(&self, root: NodeKey, name: &str) -> Option<NodeKey> {
        self.descendants(root).into_iter().find(|key| self.nodes[*key].name() == Some(name))
    }

    fn get(&self, key: NodeKey) -> SceneResult<&Node> {
        self.nodes.get(key).ok_or(SceneError::NodeNotFound(key))
    }

    /// Flag a node as changed and its ancestors as having a changed descendant
    pub(crate) fn mark_dirty(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.dirty |= DirtyFlags::TRANSFORM;
        let mut current = node.parent;
        while let Some(ancestor_key) = current {
            let ancestor = &mut self.nodes[ancestor_key];
            if ancestor.dirty.contains(DirtyFlags::DESCENDANT_TRANSFORM) {
                break;
            }
            ancestor.dirty |= DirtyFlags::DESCENDANT_TRANSFORM;
            current = ancestor.parent;
        }
    }

    // ---------------------------------------------------------------------
    // Topology

    /// Parent of a node
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key).and_then(Node::parent)
    }

    /// Children of a node in order
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.node(key).map_or(&[][..], Node::children)
    }

    /// Whether `ancestor` is `key` or one of its ancestors
    pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut current = Some(key);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.nodes.get(k).and_then(|node| node.parent);
        }
        false
    }

    /// The subtree at `root` in pre-order, `root` first
    pub fn descendants(&self, root: NodeKey) -> Vec<NodeKey> {
        self.thread.assert_owner("descendants");
        let mut result = Vec::new();
        if !self.nodes.contains_key(root) {
            return result;
        }
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            result.push(key);
            stack.extend(self.nodes[key].children.iter().rev().copied());
        }
        result
    }

    /// Append `child` to `parent`'s children
    ///
    /// The child is first detached from any previous parent. Its subtree joins
    /// the parent's scene (or leaves its old scene when the parent has none).
    pub fn add_child(&mut self, parent: NodeKey, child: NodeKey) -> SceneResult<()> {
        self.thread.assert_owner("add_child");
        let parent_id = self.get(parent)?.id();
        let child_id = self.get(child)?.id();
        if self.is_ancestor(child, parent) {
            return Err(SceneError::CycleDetected { parent: parent_id, child: child_id });
        }

        if self.nodes[child].parent.is_some() {
            self.unlink(child);
        }

        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        self.link_atomic_parent(child);
        self.mark_subtree_dirty(child);

        let scene = self.nodes[parent].scene();
        match scene {
            Some(scene) => self.attach_subtree(child, &scene),
            None => self.detach_subtree(child),
        }

        log::debug!("Added node {} under {}", child_id, parent_id);
        Ok(())
    }

    /// Detach a node from its parent, leaving it as the root of its own subtree
    ///
    /// The subtree also leaves its scene, unregistering physics bodies.
    pub fn remove_from_parent(&mut self, child: NodeKey) -> SceneResult<()> {
        self.thread.assert_owner("remove_from_parent");
        let node = self.get(child)?;
        if node.parent.is_none() {
            return Err(SceneError::MissingParent(node.id()));
        }
        self.unlink(child);
        self.link_atomic_parent(child);
        self.mark_subtree_dirty(child);
        self.detach_subtree(child);
        Ok(())
    }

    /// Detach `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> SceneResult<()> {
        let parent_id = self.get(parent)?.id();
        let node = self.get(child)?;
        if node.parent != Some(parent) {
            return Err(SceneError::NotAChild { parent: parent_id, child: node.id() });
        }
        self.remove_from_parent(child)
    }

    fn unlink(&mut self, child: NodeKey) {
        let Some(parent) = self.nodes[child].parent.take() else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|k| *k != child);
        }
        // The old parent's umbrella may shrink
        self.mark_dirty(parent);
    }

    fn link_atomic_parent(&mut self, child: NodeKey) {
        let parent_state = self.nodes[child].parent.map(|parent| self.nodes[parent].atomic.clone());
        self.nodes[child].atomic.set_parent(parent_state.as_ref());
    }

    fn mark_subtree_dirty(&mut self, root: NodeKey) {
        self.mark_dirty(root);
        for key in self.descendants(root) {
            self.nodes[key].dirty |= DirtyFlags::TRANSFORM | DirtyFlags::DESCENDANT_TRANSFORM;
        }
    }

    /// Deep-copy a subtree; the copy is unparented and not in any scene
    pub fn clone_subtree(&mut self, root: NodeKey) -> SceneResult<NodeKey> {
        self.thread.assert_owner("clone_subtree");
        self.get(root)?;
        let copy_key = self.duplicate_recursive(root);
        self.mark_subtree_dirty(copy_key);
        log::debug!("Cloned subtree {} as {}", self.nodes[root].id(), self.nodes[copy_key].id());
        Ok(copy_key)
    }

    fn duplicate_recursive(&mut self, key: NodeKey) -> NodeKey {
        let copy_key = self.nodes.insert(self.nodes[key].duplicate());
        for index in 0..self.nodes[key].children.len() {
            let child = self.nodes[key].children[index];
            let child_copy = self.duplicate_recursive(child);
            self.nodes[copy_key].children.push(child_copy);
            self.nodes[child_copy].parent = Some(copy_key);
            self.link_atomic_parent(child_copy);
        }
        copy_key
    }

    /// Remove a subtree from the graph, dropping its nodes
    pub fn destroy_subtree(&mut self, root: NodeKey) -> SceneResult<()> {
        self.thread.assert_owner("destroy_subtree");
        self.get(root)?;
        if self.nodes[root].parent.is_some() {
            self.unlink(root);
        }
        self.detach_subtree(root);
        for key in self.descendants(root) {
            if let Some(node) = self.nodes.remove(key) {
                node.atomic.set_parent(None);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Scene membership and physics

    /// Make `root`'s subtree members of `scene`, registering physics bodies
    pub fn attach_to_scene(&mut self, root: NodeKey, scene: &Arc<Scene>) -> SceneResult<()> {
        self.thread.assert_owner("attach_to_scene");
        self.get(root)?;
        self.attach_subtree(root, scene);
        Ok(())
    }

    /// Remove `root`'s subtree from its scene, unregistering physics bodies
    pub fn detach_from_scene(&mut self, root: NodeKey) -> SceneResult<()> {
        self.thread.assert_owner("detach_from_scene");
        self.get(root)?;
        self.detach_subtree(root);
        Ok(())
    }

    fn attach_subtree(&mut self, root: NodeKey, scene: &Arc<Scene>) {
        for key in self.descendants(root) {
            let current = self.nodes[key].scene();
            if current.as_ref().is_some_and(|current| Arc::ptr_eq(current, scene)) {
                continue;
            }
            if current.is_some() {
                self.leave_scene(key);
            }

            let node = &mut self.nodes[key];
            node.scene = Some(Arc::downgrade(scene));
            scene.add_member(node.id());
            if let Some(body) = node.physics_body.as_ref() {
                scene.physics_world().register(node.id(), body);
            }
        }
    }

    fn detach_subtree(&mut self, root: NodeKey) {
        for key in self.descendants(root) {
            self.leave_scene(key);
        }
    }

    fn leave_scene(&mut self, key: NodeKey) {
        let node = &mut self.nodes[key];
        let Some(weak) = node.scene.take() else {
            return;
        };
        if let Some(scene) = weak.upgrade() {
            if node.physics_body.is_some() {
                scene.physics_world().unregister(node.id());
            }
            scene.remove_member(node.id());
        }
    }

    /// Attach or replace a node's physics body
    ///
    /// When the node is in a scene the old body is unregistered and the new one
    /// registered.
    pub fn set_physics_body(&mut self, key: NodeKey, body: Option<PhysicsBody>) -> SceneResult<()> {
        self.thread.assert_owner("set_physics_body");
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))?;
        let scene = node.scene();
        if let Some(scene) = &scene {
            if node.physics_body.is_some() {
                scene.physics_world().unregister(node.id());
            }
            if let Some(body) = body.as_ref() {
                scene.physics_world().register(node.id(), body);
            }
        }
        node.physics_body = body;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Frame bookkeeping

    /// Start a new frame; visibility from earlier frames lapses
    pub(crate) fn begin_frame(&mut self) {
        self.frame += 1;
        self.frame_stats = FrameStats::default();
    }

    /// Index of the current frame
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Work counters for the current frame
    pub fn frame_stats(&self) -> FrameStats {
        self.frame_stats
    }

    /// Work counters summed over every completed frame
    pub fn total_stats(&self) -> FrameStats {
        self.total_stats
    }

    /// Furthest camera distance of any visible geometry in the last sort-key pass
    pub fn furthest_distance(&self) -> f32 {
        self.furthest_distance
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("nodes", &self.nodes.len())
            .field("frame", &self.frame)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(graph: &mut SceneGraph, length: usize) -> Vec<NodeKey> {
        let keys: Vec<_> = (0..length).map(|_| graph.create_node()).collect();
        for pair in keys.windows(2) {
            graph.add_child(pair[0], pair[1]).unwrap();
        }
        keys
    }

    #[test]
    fn test_add_child_links_both_ways() {
        let mut graph = SceneGraph::new();
        let keys = chain(&mut graph, 2);
        assert_eq!(graph.parent(keys[1]), Some(keys[0]));
        assert_eq!(graph.children(keys[0]), &[keys[1]]);
    }

    #[test]
    fn test_reparenting_moves_child() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node();
        let b = graph.create_node();
        let c = graph.create_node();
        graph.add_child(a, c).unwrap();
        graph.add_child(b, c).unwrap();
        assert!(graph.children(a).is_empty());
        assert_eq!(graph.children(b), &[c]);
        assert_eq!(graph.parent(c), Some(b));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut graph = SceneGraph::new();
        let keys = chain(&mut graph, 3);
        let result = graph.add_child(keys[2], keys[0]);
        assert!(matches!(result, Err(SceneError::CycleDetected { .. })));
        assert!(matches!(graph.add_child(keys[1], keys[1]), Err(SceneError::CycleDetected { .. })));
    }

    #[test]
    fn test_remove_from_parent() {
        let mut graph = SceneGraph::new();
        let keys = chain(&mut graph, 2);
        graph.remove_from_parent(keys[1]).unwrap();
        assert_eq!(graph.parent(keys[1]), None);
        assert!(graph.children(keys[0]).is_empty());
        assert!(matches!(graph.remove_from_parent(keys[1]), Err(SceneError::MissingParent(_))));
    }

    #[test]
    fn test_remove_child_checks_parent() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node();
        let b = graph.create_node();
        assert!(matches!(graph.remove_child(a, b), Err(SceneError::NotAChild { .. })));
    }

    #[test]
    fn test_descendants_pre_order() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node();
        let a = graph.create_node();
        let b = graph.create_node();
        let a1 = graph.create_node();
        graph.add_child(root, a).unwrap();
        graph.add_child(root, b).unwrap();
        graph.add_child(a, a1).unwrap();
        assert_eq!(graph.descendants(root), vec![root, a, a1, b]);
    }

    #[test]
    fn test_destroy_subtree_removes_nodes() {
        let mut graph = SceneGraph::new();
        let keys = chain(&mut graph, 3);
        graph.destroy_subtree(keys[1]).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(!graph.contains(keys[2]));
        assert!(graph.children(keys[0]).is_empty());
        assert!(matches!(graph.destroy_subtree(keys[1]), Err(SceneError::NodeNotFound(_))));
    }

    #[test]
    fn test_node_mut_marks_ancestors() {
        let mut graph = SceneGraph::new();
        let keys = chain(&mut graph, 3);
        for key in &keys {
            graph.nodes[*key].dirty = DirtyFlags::empty();
        }
        graph.node_mut(keys[2]).unwrap();
        assert!(graph.nodes[keys[2]].dirty.contains(DirtyFlags::TRANSFORM));
        assert!(graph.nodes[keys[1]].dirty.contains(DirtyFlags::DESCENDANT_TRANSFORM));
        assert!(graph.nodes[keys[0]].dirty.contains(DirtyFlags::DESCENDANT_TRANSFORM));
        assert!(!graph.nodes[keys[0]].dirty.contains(DirtyFlags::TRANSFORM));
    }

    #[test]
    fn test_create_node_uses_config_masks() {
        let config = SceneConfig { default_light_receiving_mask: 0b110, ..SceneConfig::default() };
        let mut graph = SceneGraph::with_config(config);
        let key = graph.create_node();
        assert_eq!(graph.node(key).unwrap().light_receiving_mask(), 0b110);
    }

    #[test]
    fn test_find_by_name() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node();
        let child = graph.insert(Node::new().with_name("lamp"));
        graph.add_child(root, child).unwrap();
        assert_eq!(graph.find_by_name(root, "lamp"), Some(child));
        assert_eq!(graph.find_by_name(root, "missing"), None);
        let id = graph.node(child).unwrap().id();
        assert_eq!(graph.find_by_id(id), Some(child));
    }
}
