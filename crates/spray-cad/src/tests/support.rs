//! Mesh fixtures for toolkit doubles.
//!
//! Test toolkits stand in for FreeCAD by writing real STL files, so the
//! conversion checks in [`crate::stl::inspect`] run against genuine output.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::CadError;
use crate::stl::{HEADER_LEN, RECORD_LEN};

/// Indexed triangle mesh that can be written as STL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vertex and returns its index.
    pub fn push_vertex(&mut self, vertex: [f32; 3]) -> u32 {
        self.vertices.push(vertex);
        u32::try_from(self.vertices.len() - 1).unwrap_or(u32::MAX)
    }

    /// Appends a triangle over previously pushed vertices.
    ///
    /// # Errors
    ///
    /// Returns a message when an index is out of range.
    pub fn push_triangle(&mut self, triangle: [u32; 3]) -> Result<(), String> {
        let count = self.vertices.len();
        if let Some(bad) = triangle
            .iter()
            .find(|&&index| usize::try_from(index).map_or(true, |index| index >= count))
        {
            return Err(format!("index {bad} out of range (vertex count = {count})"));
        }
        self.triangles.push(triangle);
        Ok(())
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn corners(&self, triangle: [u32; 3]) -> [[f32; 3]; 3] {
        triangle.map(|index| {
            usize::try_from(index)
                .ok()
                .and_then(|index| self.vertices.get(index))
                .copied()
                .unwrap_or_default()
        })
    }

    /// Encodes the mesh as binary STL.
    #[must_use]
    pub fn to_binary(&self, name: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 4 + self.triangles.len() * RECORD_LEN);
        let header = format!("binary STL: {name}");
        buf.extend(header.bytes().take(HEADER_LEN));
        buf.resize(HEADER_LEN, 0_u8);
        let count = u32::try_from(self.triangles.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());

        for &triangle in &self.triangles {
            let corners = self.corners(triangle);
            for component in facet_normal(&corners) {
                buf.extend_from_slice(&component.to_le_bytes());
            }
            for component in corners.iter().flatten() {
                buf.extend_from_slice(&component.to_le_bytes());
            }
            // Attribute byte count (unused)
            buf.extend_from_slice(&0_u16.to_le_bytes());
        }
        buf
    }

    /// Encodes the mesh as ASCII STL.
    #[must_use]
    pub fn to_ascii(&self, name: &str) -> String {
        let mut out = String::with_capacity(self.triangles.len() * 256);
        let _ = writeln!(out, "solid {name}");
        for &triangle in &self.triangles {
            let corners = self.corners(triangle);
            let [nx, ny, nz] = facet_normal(&corners);
            let _ = writeln!(out, "  facet normal {nx} {ny} {nz}");
            out.push_str("    outer loop\n");
            for [x, y, z] in corners {
                let _ = writeln!(out, "      vertex {x} {y} {z}");
            }
            out.push_str("    endloop\n");
            out.push_str("  endfacet\n");
        }
        let _ = writeln!(out, "endsolid {name}");
        out
    }

    /// Writes the mesh to `path` as binary STL.
    ///
    /// # Errors
    ///
    /// Returns [`CadError::Io`] when the file cannot be written.
    pub fn write_binary(&self, path: &Path, name: &str) -> Result<(), CadError> {
        fs::write(path, self.to_binary(name)).map_err(|err| CadError::io(path, err))
    }
}

fn facet_normal([a, b, c]: &[[f32; 3]; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len > 1e-12 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

#[test]
fn normals_follow_winding() {
    let normal = facet_normal(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    assert_eq!(normal, [0.0, 0.0, 1.0]);
}

#[test]
fn out_of_range_triangle_is_rejected() {
    let mut mesh = TriangleMesh::new();
    mesh.push_vertex([0.0, 0.0, 0.0]);
    assert!(mesh.push_triangle([0, 1, 2]).is_err());
    assert_eq!(mesh.triangle_count(), 0);
}
