//! Geometry attached to scene nodes
//!
//! GPU resources and materials live outside the scene core. The core only needs
//! local bounds, a way to emit sort keys, a draw entry point that forwards to a
//! [`RenderDriver`], and triangle access for exact hit testing.

use std::ops::ControlFlow;

use crate::error::GeometryError;
use crate::foundation::math::{Mat4, Vec3};
use crate::geometry::{BoundingBox, Triangle};
use crate::render::{SortKey, SortKeyInput};
use crate::scene::NodeId;

/// Resolved per-node state needed to draw one element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawParams {
    /// Node being drawn
    pub node: NodeId,
    /// World transform
    pub transform: Mat4,
    /// Inverse-transpose of the world transform, for normals
    pub inverse_transpose: Mat4,
    /// Cumulative opacity
    pub opacity: f32,
}

/// Backend that actually issues draw calls
pub trait RenderDriver {
    /// Draw one geometry element
    fn draw_element(&mut self, element_index: usize, params: &DrawParams);

    /// Draw one geometry element into the silhouette (stencil/outline) target
    fn draw_silhouette(&mut self, element_index: usize, params: &DrawParams) {
        self.draw_element(element_index, params);
    }
}

/// Contract between the scene core and renderable geometry
pub trait Geometry: Send + Sync + std::fmt::Debug {
    /// Bounds in the node's local space
    fn bounding_box(&self) -> BoundingBox;

    /// Number of independently drawable elements
    fn element_count(&self) -> usize;

    /// Visit the triangles of one element in local space
    ///
    /// The visitor may return `ControlFlow::Break` to stop early.
    fn for_each_triangle(&self, element_index: usize, visitor: &mut dyn FnMut(Triangle) -> ControlFlow<()>);

    /// Emit sort keys for this geometry, one per element by default
    fn sort_keys(&self, input: &SortKeyInput, out: &mut Vec<SortKey>) {
        out.extend((0..self.element_count()).map(|index| SortKey::from_input(input, index)));
    }

    /// Draw one element
    fn render(&self, element_index: usize, params: &DrawParams, driver: &mut dyn RenderDriver) {
        driver.draw_element(element_index, params);
    }

    /// Draw one element's silhouette
    fn render_silhouette(&self, element_index: usize, params: &DrawParams, driver: &mut dyn RenderDriver) {
        driver.draw_silhouette(element_index, params);
    }
}

/// Triangle index list sharing the mesh's vertex source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryElement {
    indices: Vec<u32>,
}

impl GeometryElement {
    /// Triangle indices, three per triangle
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// CPU-side triangle mesh
///
/// Validated on construction, so hit testing never meets missing vertices or
/// dangling indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vec3>,
    elements: Vec<GeometryElement>,
    bounds: BoundingBox,
}

impl Mesh {
    /// Build a mesh from a vertex source and one index list per element
    pub fn new(vertices: Vec<Vec3>, elements: Vec<Vec<u32>>) -> Result<Self, GeometryError> {
        let bounds = BoundingBox::from_points(&vertices).ok_or(GeometryError::MissingVertexSource)?;

        let vertex_count = vertices.len();
        let mut validated = Vec::with_capacity(elements.len());
        for indices in elements {
            if indices.len() % 3 != 0 {
                return Err(GeometryError::IncompleteTriangles(indices.len()));
            }
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(GeometryError::IndexOutOfRange { index, vertex_count });
            }
            validated.push(GeometryElement { indices });
        }

        Ok(Self { vertices, elements: validated, bounds })
    }

    /// Axis-aligned box mesh with one element (12 triangles)
    pub fn cuboid(half_extents: Vec3) -> Self {
        let (x, y, z) = (half_extents.x, half_extents.y, half_extents.z);
        let vertices = vec![
            Vec3::new(-x, -y, -z),
            Vec3::new(x, -y, -z),
            Vec3::new(x, y, -z),
            Vec3::new(-x, y, -z),
            Vec3::new(-x, -y, z),
            Vec3::new(x, -y, z),
            Vec3::new(x, y, z),
            Vec3::new(-x, y, z),
        ];
        let indices = vec![
            4, 5, 6, 4, 6, 7, // +Z
            1, 0, 3, 1, 3, 2, // -Z
            5, 1, 2, 5, 2, 6, // +X
            0, 4, 7, 0, 7, 3, // -X
            7, 6, 2, 7, 2, 3, // +Y
            0, 1, 5, 0, 5, 4, // -Y
        ];
        Self {
            bounds: BoundingBox::new(-half_extents, half_extents),
            vertices,
            elements: vec![GeometryElement { indices }],
        }
    }

    /// Vertex source
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Elements
    pub fn elements(&self) -> &[GeometryElement] {
        &self.elements
    }
}

impl Geometry for Mesh {
    fn bounding_box(&self) -> BoundingBox {
        self.bounds
    }

    fn element_count(&self) -> usize {
        self.elements.len()
    }

    fn for_each_triangle(&self, element_index: usize, visitor: &mut dyn FnMut(Triangle) -> ControlFlow<()>) {
        let Some(element) = self.elements.get(element_index) else {
            return;
        };
        for chunk in element.indices.chunks_exact(3) {
            let triangle = Triangle::new(
                self.vertices[chunk[0] as usize],
                self.vertices[chunk[1] as usize],
                self.vertices[chunk[2] as usize],
            );
            if visitor(triangle).is_break() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_validation() {
        assert_eq!(Mesh::new(vec![], vec![]).unwrap_err(), GeometryError::MissingVertexSource);

        let tri = vec![Vec3::zeros(), Vec3::x(), Vec3::y()];
        assert_eq!(
            Mesh::new(tri.clone(), vec![vec![0, 1]]).unwrap_err(),
            GeometryError::IncompleteTriangles(2)
        );
        assert_eq!(
            Mesh::new(tri.clone(), vec![vec![0, 1, 7]]).unwrap_err(),
            GeometryError::IndexOutOfRange { index: 7, vertex_count: 3 }
        );
        assert!(Mesh::new(tri, vec![vec![0, 1, 2]]).is_ok());
    }

    #[test]
    fn test_cuboid_bounds_and_triangles() {
        let mesh = Mesh::cuboid(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.bounding_box().max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.element_count(), 1);

        let mut count = 0;
        mesh.for_each_triangle(0, &mut |_| {
            count += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(count, 12);
    }

    #[test]
    fn test_triangle_iteration_can_stop_early() {
        let mesh = Mesh::cuboid(Vec3::new(1.0, 1.0, 1.0));
        let mut count = 0;
        mesh.for_each_triangle(0, &mut |_| {
            count += 1;
            ControlFlow::Break(())
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_default_sort_keys_one_per_element() {
        let tri = vec![Vec3::zeros(), Vec3::x(), Vec3::y()];
        let mesh = Mesh::new(tri, vec![vec![0, 1, 2], vec![2, 1, 0]]).unwrap();
        let input = SortKeyInput {
            node: NodeId::from_raw(9),
            rendering_order: 0,
            hierarchy_id: 0,
            hierarchy_depth: 0,
            lights_hash: 0,
            opacity: 1.0,
            distance_from_camera: 3.0,
            z_far: 10.0,
        };
        let mut keys = Vec::new();
        mesh.sort_keys(&input, &mut keys);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].element_index, 1);
    }
}
