//! Lights attached to scene nodes
//!
//! A light illuminates the subtree of the node it is attached to. Its local
//! position and direction are transformed into world space by the sort-key pass
//! every frame.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::geometry::BoundingBox;

static NEXT_LIGHT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique light identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(u64);

impl LightId {
    fn next() -> Self {
        Self(NEXT_LIGHT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Types of lights supported by the lighting system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Uniform light from every direction
    Ambient,
    /// Directional light (like sunlight) with parallel rays
    Directional,
    /// Point light that radiates in all directions from a position
    Omni,
    /// Spot light that creates a cone of light from a position
    Spot,
}

impl LightType {
    /// Whether this light fades with distance and can be range-culled
    pub fn is_attenuating(&self) -> bool {
        matches!(self, LightType::Omni | LightType::Spot)
    }
}

/// A light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    id: LightId,
    /// The type of light
    pub light_type: LightType,
    /// RGB color values for the light (0.0 to 1.0 range)
    pub color: Vec3,
    /// Light intensity multiplier
    pub intensity: f32,
    /// Position relative to the owning node
    pub position: Vec3,
    /// Direction relative to the owning node (directional/spot)
    pub direction: Vec3,
    /// Distance at which attenuation begins
    pub attenuation_start: f32,
    /// Distance beyond which the light has no effect (omni/spot)
    pub attenuation_end: f32,
    /// Nodes are lit only if their light-receiving mask shares a bit with this mask
    pub influence_bitmask: u32,
    /// Whether this light should cast shadows
    pub casts_shadow: bool,
    world_position: Vec3,
    world_direction: Vec3,
}

impl Light {
    fn with_type(light_type: LightType, color: Vec3, intensity: f32) -> Self {
        Self {
            id: LightId::next(),
            light_type,
            color,
            intensity,
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, 0.0, -1.0),
            attenuation_start: 0.0,
            attenuation_end: 0.0,
            influence_bitmask: 1,
            casts_shadow: false,
            world_position: Vec3::zeros(),
            world_direction: Vec3::new(0.0, 0.0, -1.0),
        }
    }

    /// Create an ambient light
    pub fn ambient(color: Vec3, intensity: f32) -> Self {
        Self::with_type(LightType::Ambient, color, intensity)
    }

    /// Create a directional light
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        let mut light = Self::with_type(LightType::Directional, color, intensity);
        light.direction = direction.normalize();
        light.world_direction = light.direction;
        light
    }

    /// Create an omni (point) light at a node-relative position
    pub fn omni(position: Vec3, color: Vec3, intensity: f32, attenuation_end: f32) -> Self {
        let mut light = Self::with_type(LightType::Omni, color, intensity);
        light.position = position;
        light.world_position = position;
        light.attenuation_end = attenuation_end;
        light
    }

    /// Create a spot light at a node-relative position
    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, attenuation_end: f32) -> Self {
        let mut light = Self::omni(position, color, intensity, attenuation_end);
        light.light_type = LightType::Spot;
        light.direction = direction.normalize();
        light.world_direction = light.direction;
        light
    }

    /// Builder pattern: set the influence bitmask
    pub fn with_influence_bitmask(mut self, mask: u32) -> Self {
        self.influence_bitmask = mask;
        self
    }

    /// Process-unique id of this light
    ///
    /// Clones keep the id, so a light copied into a cloned subtree hashes the same.
    pub fn id(&self) -> LightId {
        self.id
    }

    /// Position in world space as of the last sort-key pass
    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    /// Direction in world space as of the last sort-key pass
    pub fn world_direction(&self) -> Vec3 {
        self.world_direction
    }

    /// Set the world-space position and direction from the owning node's transforms
    pub fn update_world_space(&mut self, transform: &Mat4, rotation: &Mat4) {
        self.world_position = transform.transform_vec3_point(&self.position);
        self.world_direction = rotation
            .transform_vector(&self.direction)
            .try_normalize(f32::EPSILON)
            .unwrap_or(self.direction);
    }

    /// Whether this light can affect anything inside `bounds`
    ///
    /// Ambient and directional lights always can; omni and spot lights only when
    /// the box is within the attenuation end distance.
    pub fn reaches(&self, bounds: &BoundingBox) -> bool {
        !self.light_type.is_attenuating()
            || bounds.distance_to_point(&self.world_position) <= self.attenuation_end
    }

    /// Whether this light influences a node with the given light-receiving mask
    pub fn influences(&self, receiving_mask: u32) -> bool {
        self.influence_bitmask & receiving_mask != 0
    }
}

/// Deterministic hash over an ordered light set, used as a material cache key
///
/// Only light identities contribute, so the hash is stable across frames while
/// the same lights are active.
pub fn hash_lights(lights: &[Light]) -> u64 {
    if lights.is_empty() {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    for light in lights {
        light.id.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_world_space_update() {
        let mut light = Light::omni(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1.0, 5.0);
        let transform = Mat4::new_translation(&Vec3::new(0.0, 3.0, 0.0));
        light.update_world_space(&transform, &Mat4::identity());
        assert_relative_eq!(light.world_position(), Vec3::new(1.0, 3.0, 0.0));
    }

    #[test]
    fn test_range_culling_only_for_attenuating_lights() {
        let far_box = BoundingBox::at_point(Vec3::new(100.0, 0.0, 0.0));
        let omni = Light::omni(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0, 10.0);
        let directional = Light::directional(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1.0);
        let ambient = Light::ambient(Vec3::new(0.2, 0.2, 0.2), 1.0);

        assert!(!omni.reaches(&far_box));
        assert!(omni.reaches(&BoundingBox::at_point(Vec3::new(5.0, 0.0, 0.0))));
        assert!(directional.reaches(&far_box));
        assert!(ambient.reaches(&far_box));
    }

    #[test]
    fn test_influence_mask() {
        let light = Light::ambient(Vec3::new(1.0, 1.0, 1.0), 1.0).with_influence_bitmask(0b10);
        assert!(light.influences(0b11));
        assert!(!light.influences(0b01));
    }

    #[test]
    fn test_hash_is_deterministic_and_order_sensitive() {
        let a = Light::ambient(Vec3::new(1.0, 1.0, 1.0), 1.0);
        let b = Light::ambient(Vec3::new(1.0, 1.0, 1.0), 1.0);
        let forward = hash_lights(&[a.clone(), b.clone()]);
        assert_eq!(forward, hash_lights(&[a.clone(), b.clone()]));
        assert_ne!(forward, hash_lights(&[b, a]));
        assert_eq!(hash_lights(&[]), 0);
    }
}
