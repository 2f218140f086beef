use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use thiserror::Error;

/// Errors from loading a Wavefront OBJ mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("unable to read mesh file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid number {token:?}")]
    BadNumber { line: usize, token: String },

    #[error("line {line}: invalid face index {token:?}")]
    BadIndex { line: usize, token: String },

    #[error("mesh has no triangles")]
    Empty,
}

/// Indexed triangle mesh with one normal per vertex.
#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Load an OBJ file: `v`, `vn` and `f` records (`v`, `v//vn` and
    /// `v/vt/vn` face forms, 1-based or negative indices). Faces with more
    /// than three vertices are fan-triangulated. When the file carries no
    /// usable normals they are computed from the geometry.
    pub fn load_obj(path: &Path) -> Result<Self, MeshError> {
        let reader = BufReader::new(File::open(path)?);
        Self::parse_obj(reader)
    }

    pub fn parse_obj<R: BufRead>(reader: R) -> Result<Self, MeshError> {
        let mut positions: Vec<Point3<f32>> = Vec::new();
        let mut file_normals: Vec<Vector3<f32>> = Vec::new();
        // Per-position accumulated file normal; averaged when several wedges
        // reference the same position.
        let mut accum: Vec<Vector3<f32>> = Vec::new();
        let mut faces: Vec<[u32; 3]> = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let lineno = lineno + 1;
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let p = parse_triplet(&mut tokens, lineno)?;
                    positions.push(Point3::new(p[0], p[1], p[2]));
                    accum.push(Vector3::zeros());
                }
                Some("vn") => {
                    let n = parse_triplet(&mut tokens, lineno)?;
                    file_normals.push(Vector3::new(n[0], n[1], n[2]));
                }
                Some("f") => {
                    let mut verts: Vec<(usize, Option<usize>)> = Vec::new();
                    for token in tokens {
                        verts.push(parse_face_vertex(
                            token,
                            positions.len(),
                            file_normals.len(),
                            lineno,
                        )?);
                    }
                    if verts.len() < 3 {
                        continue;
                    }
                    for (pos, normal) in &verts {
                        if let Some(n) = normal {
                            accum[*pos] += file_normals[*n];
                        }
                    }
                    for i in 1..verts.len() - 1 {
                        faces.push([
                            verts[0].0 as u32,
                            verts[i].0 as u32,
                            verts[i + 1].0 as u32,
                        ]);
                    }
                }
                // vt, usemtl, groups etc. carry nothing we draw with.
                _ => continue,
            }
        }

        if faces.is_empty() {
            return Err(MeshError::Empty);
        }

        let mut mesh = Self {
            positions,
            normals: Vec::new(),
            faces,
        };

        let has_file_normals = accum.iter().any(|n| n.norm_squared() > 0.0);
        if has_file_normals {
            mesh.normals = accum
                .into_iter()
                .map(|n| n.try_normalize(1e-12).unwrap_or_else(Vector3::z))
                .collect();
        } else {
            mesh.compute_vertex_normals();
        }

        Ok(mesh)
    }

    /// Translate the bounding-box centre to the origin and scale uniformly
    /// so the largest dimension is 1.
    pub fn unitize(&mut self) {
        if self.positions.is_empty() {
            return;
        }
        let mut min = self.positions[0];
        let mut max = self.positions[0];
        for p in &self.positions {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        let centre = Point3::new(
            (min.x + max.x) * 0.5,
            (min.y + max.y) * 0.5,
            (min.z + max.z) * 0.5,
        );
        let extent = (max.x - min.x).max(max.y - min.y).max(max.z - min.z);
        let s = if extent > 0.0 { 1.0 / extent } else { 1.0 };
        for p in &mut self.positions {
            *p = Point3::new((p.x - centre.x) * s, (p.y - centre.y) * s, (p.z - centre.z) * s);
        }
    }

    /// Uniform scale about the origin.
    pub fn scale(&mut self, s: f32) {
        for p in &mut self.positions {
            *p *= s;
        }
    }

    /// Area-weighted vertex normals from the face geometry.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vector3::<f32>::zeros(); self.positions.len()];
        for [a, b, c] in &self.faces {
            let pa = self.positions[*a as usize];
            let pb = self.positions[*b as usize];
            let pc = self.positions[*c as usize];
            // Cross product length is twice the face area, so summing the
            // raw cross products area-weights the average.
            let n = (pb - pa).cross(&(pc - pa));
            accum[*a as usize] += n;
            accum[*b as usize] += n;
            accum[*c as usize] += n;
        }
        self.normals = accum
            .into_iter()
            .map(|n| n.try_normalize(1e-12).unwrap_or_else(Vector3::z))
            .collect();
    }
}

fn parse_triplet<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    line: usize,
) -> Result<[f32; 3], MeshError> {
    let mut out = [0.0f32; 3];
    for v in &mut out {
        let token = tokens.next().unwrap_or("");
        *v = token.parse().map_err(|_| MeshError::BadNumber {
            line,
            token: token.to_string(),
        })?;
    }
    Ok(out)
}

fn parse_face_vertex(
    token: &str,
    n_positions: usize,
    n_normals: usize,
    line: usize,
) -> Result<(usize, Option<usize>), MeshError> {
    let mut parts = token.split('/');
    let pos_str = parts.next().unwrap_or("");
    let _tex = parts.next();
    let norm_str = parts.next().unwrap_or("");

    let pos = resolve_index(pos_str, n_positions).ok_or_else(|| MeshError::BadIndex {
        line,
        token: token.to_string(),
    })?;
    let normal = if norm_str.is_empty() {
        None
    } else {
        Some(
            resolve_index(norm_str, n_normals).ok_or_else(|| MeshError::BadIndex {
                line,
                token: token.to_string(),
            })?,
        )
    };
    Ok((pos, normal))
}

/// OBJ indices are 1-based; negative indices count back from the end.
fn resolve_index(token: &str, len: usize) -> Option<usize> {
    let idx: i64 = token.parse().ok()?;
    let resolved = if idx > 0 {
        idx - 1
    } else if idx < 0 {
        len as i64 + idx
    } else {
        return None;
    };
    if resolved < 0 || resolved as usize >= len {
        return None;
    }
    Some(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    const QUAD_OBJ: &str = "\
# flat unit quad
v 0 0 0
v 2 0 0
v 2 2 0
v 0 2 0
f 1 2 3 4
";

    #[test]
    fn parses_and_fan_triangulates() {
        let mesh = TriangleMesh::parse_obj(Cursor::new(QUAD_OBJ)).expect("parse");
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        // Flat quad in the z = 0 plane: every computed normal is +-z.
        for n in &mesh.normals {
            assert_relative_eq!(n.z.abs(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn file_normals_win_over_computed() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 1 0 0
f 1//1 2//1 3//1
";
        let mesh = TriangleMesh::parse_obj(Cursor::new(obj)).expect("parse");
        assert_relative_eq!(mesh.normals[0].x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn negative_indices_resolve_from_end() {
        let obj = "\
v 0 0 0
v 1 0 0
v 0 1 0
f -3 -2 -1
";
        let mesh = TriangleMesh::parse_obj(Cursor::new(obj)).expect("parse");
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn empty_geometry_is_an_error() {
        let err = TriangleMesh::parse_obj(Cursor::new("v 0 0 0\n")).unwrap_err();
        assert!(matches!(err, MeshError::Empty));
    }

    #[test]
    fn bad_coordinate_reports_line() {
        let err = TriangleMesh::parse_obj(Cursor::new("v 0 oops 0\n")).unwrap_err();
        match err {
            MeshError::BadNumber { line, token } => {
                assert_eq!(line, 1);
                assert_eq!(token, "oops");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unitize_then_scale_sets_bounding_extent() {
        let mut mesh = TriangleMesh::parse_obj(Cursor::new(QUAD_OBJ)).expect("parse");
        mesh.unitize();
        let max_x = mesh.positions.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let min_x = mesh.positions.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        assert_relative_eq!(max_x - min_x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(max_x + min_x, 0.0, epsilon = 1e-6);

        mesh.scale(120.0);
        let max_x = mesh.positions.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert_relative_eq!(max_x, 60.0, epsilon = 1e-3);
    }
}
