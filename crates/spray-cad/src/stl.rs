//! STL reading and writing.
//!
//! Conversion output is verified by reading it back: [`inspect`] accepts
//! both binary and ASCII STL and counts facets and distinct points, the same
//! figures FreeCAD reports for a mesh.
//!
//! Binary STL layout:
//! - 80-byte header (arbitrary text)
//! - u32 triangle count (little-endian)
//! - per triangle: 3×f32 normal, 3×(3×f32) vertices, u16 attribute = 50 bytes

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::CadError;

pub(crate) const HEADER_LEN: usize = 80;
pub(crate) const RECORD_LEN: usize = 50;

/// Encoding of an STL file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StlFormat {
    /// `solid` ... `endsolid` text.
    Ascii,
    /// 80-byte header, triangle count, 50-byte records.
    Binary,
}

/// Counts read back from an STL file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StlSummary {
    /// Encoding the file was read as.
    pub format: StlFormat,
    /// Number of triangles.
    pub facets: u64,
    /// Number of distinct vertex positions.
    pub points: u64,
}

/// Reads and summarises the STL file at `path`.
///
/// # Errors
///
/// [`CadError::MissingOutput`] when the file does not exist,
/// [`CadError::EmptyOutput`] when it holds no triangles, and
/// [`CadError::InvalidStl`] when it is neither valid binary nor ASCII STL.
pub fn inspect(path: &Path) -> Result<StlSummary, CadError> {
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => CadError::MissingOutput {
            path: path.to_path_buf(),
        },
        _ => CadError::io(path, err),
    })?;
    let summary = summarise(&bytes).map_err(|message| CadError::InvalidStl {
        path: path.to_path_buf(),
        message,
    })?;
    if summary.facets == 0 {
        return Err(CadError::EmptyOutput {
            path: path.to_path_buf(),
        });
    }
    Ok(summary)
}

fn summarise(bytes: &[u8]) -> Result<StlSummary, String> {
    if let Some(summary) = summarise_binary(bytes) {
        return Ok(summary);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| String::from("not a binary STL and not UTF-8 text"))?;
    if text.trim().is_empty() {
        return Ok(StlSummary {
            format: StlFormat::Ascii,
            facets: 0,
            points: 0,
        });
    }
    summarise_ascii(text)
}

// Returns `None` when the size does not match the declared triangle count,
// which is how ASCII files starting with "solid" are told apart.
fn summarise_binary(bytes: &[u8]) -> Option<StlSummary> {
    let count: [u8; 4] = bytes.get(HEADER_LEN..HEADER_LEN + 4)?.try_into().ok()?;
    let facets = usize::try_from(u32::from_le_bytes(count)).ok()?;
    let body = bytes.get(HEADER_LEN + 4..)?;
    if facets.checked_mul(RECORD_LEN)? != body.len() {
        return None;
    }

    let mut points = HashSet::new();
    for record in body.chunks_exact(RECORD_LEN) {
        let vertices = record.get(12..48)?;
        for vertex in vertices.chunks_exact(12) {
            let mut key = [0_u32; 3];
            for (slot, component) in key.iter_mut().zip(vertex.chunks_exact(4)) {
                let raw: [u8; 4] = component.try_into().ok()?;
                *slot = point_key(f32::from_le_bytes(raw));
            }
            points.insert(key);
        }
    }
    Some(StlSummary {
        format: StlFormat::Binary,
        facets: facets as u64,
        points: points.len() as u64,
    })
}

fn summarise_ascii(text: &str) -> Result<StlSummary, String> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    match lines.next() {
        Some(first) if first.starts_with("solid") => {}
        _ => return Err(String::from("missing 'solid' header")),
    }

    let mut facets = 0_u64;
    let mut vertices = 0_u64;
    let mut points = HashSet::new();
    for line in lines {
        if line.starts_with("facet") {
            facets += 1;
        } else if let Some(coordinates) = line.strip_prefix("vertex") {
            points.insert(parse_vertex(coordinates)?);
            vertices += 1;
        }
    }
    if vertices != facets * 3 {
        return Err(format!("{facets} facets but {vertices} vertices"));
    }
    Ok(StlSummary {
        format: StlFormat::Ascii,
        facets,
        points: points.len() as u64,
    })
}

fn parse_vertex(coordinates: &str) -> Result<[u32; 3], String> {
    let values = coordinates
        .split_whitespace()
        .map(|value| {
            value
                .parse::<f32>()
                .map_err(|err| format!("bad vertex coordinate '{value}': {err}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x, y, z] => Ok([point_key(*x), point_key(*y), point_key(*z)]),
        _ => Err(format!("vertex needs 3 coordinates, got {}", values.len())),
    }
}

// Adding zero folds -0.0 into 0.0 so both count as one point.
fn point_key(value: f32) -> u32 {
    (value + 0.0).to_bits()
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::tests::support::TriangleMesh;

    /// Unit cube: 8 corners, 12 triangles.
    #[fixture]
    fn cube() -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        for z in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for x in [0.0, 1.0] {
                    mesh.push_vertex([x, y, z]);
                }
            }
        }
        let faces: [[u32; 4]; 6] = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ];
        for [a, b, c, d] in faces {
            mesh.push_triangle([a, b, c]).expect("valid triangle");
            mesh.push_triangle([a, c, d]).expect("valid triangle");
        }
        mesh
    }

    #[rstest]
    fn binary_cube_counts_facets_and_shared_points(cube: TriangleMesh) {
        let summary = summarise(&cube.to_binary("cube")).expect("summarise binary");
        assert_eq!(
            summary,
            StlSummary {
                format: StlFormat::Binary,
                facets: 12,
                points: 8,
            }
        );
    }

    #[rstest]
    fn ascii_cube_counts_facets_and_shared_points(cube: TriangleMesh) {
        let summary = summarise(cube.to_ascii("cube").as_bytes()).expect("summarise ascii");
        assert_eq!(
            summary,
            StlSummary {
                format: StlFormat::Ascii,
                facets: 12,
                points: 8,
            }
        );
    }

    #[rstest]
    fn binary_header_starting_with_solid_is_still_binary(cube: TriangleMesh) {
        let mut bytes = cube.to_binary("cube");
        bytes
            .get_mut(..5)
            .expect("header")
            .copy_from_slice(b"solid");
        let summary = summarise(&bytes).expect("summarise binary");
        assert_eq!(summary.format, StlFormat::Binary);
    }

    #[test]
    fn inspect_distinguishes_missing_empty_and_garbage_files() {
        let dir = TempDir::new().expect("temp dir");

        let missing = dir.path().join("missing.stl");
        assert!(matches!(
            inspect(&missing),
            Err(CadError::MissingOutput { .. })
        ));

        let empty = dir.path().join("empty.stl");
        fs::write(&empty, b"").expect("write empty file");
        assert!(matches!(inspect(&empty), Err(CadError::EmptyOutput { .. })));

        let no_facets = dir.path().join("no_facets.stl");
        fs::write(&no_facets, "solid nothing\nendsolid nothing\n").expect("write stl");
        assert!(matches!(
            inspect(&no_facets),
            Err(CadError::EmptyOutput { .. })
        ));

        let garbage = dir.path().join("garbage.stl");
        fs::write(&garbage, "definitely not a mesh").expect("write garbage");
        assert!(matches!(inspect(&garbage), Err(CadError::InvalidStl { .. })));
    }

    #[rstest]
    fn inspect_reads_written_binary(cube: TriangleMesh) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cube.stl");
        cube.write_binary(&path, "cube").expect("write stl");
        let summary = inspect(&path).expect("inspect stl");
        assert_eq!(summary.facets, 12);
        assert_eq!(summary.points, 8);
    }
}
