//! Builds the full mesh graph from node coordinates and cell vertex lists.
//!
//! Faces are derived from the local face tables of each [`CellShape`] and
//! matched across cells by their vertex set. All primary geometry (face
//! centroids and areas, cell volumes and centroids, outward area vectors) is
//! computed here; the derived coefficients are left to
//! [`crate::discretization::geometry`].

use std::collections::{BTreeSet, HashMap};

use log::debug;
use nalgebra::Vector3;

use super::mesh::{Cell, CellId, CellShape, Face, FaceId, FaceShape, Mesh, Node, NodeId, Patch, PatchId};
use crate::error::{FvmError, Result};

/// Raw input of one cell: its topology and global node ids.
#[derive(Clone, Debug)]
pub struct RawCell {
    pub shape: CellShape,
    pub vertices: Vec<usize>,
}

impl RawCell {
    pub fn new(shape: CellShape, vertices: Vec<usize>) -> Self {
        Self { shape, vertices }
    }
}

struct FaceRecord {
    vertices: Vec<usize>,
    cells: [Option<usize>; 2],
}

/// Area vector and centroid of a planar polygon, via a triangle fan around
/// the vertex average.
pub fn polygon_geometry(points: &[Vector3<f64>]) -> (Vector3<f64>, Vector3<f64>) {
    let n = points.len() as f64;
    let center = points.iter().sum::<Vector3<f64>>() / n;

    let mut area_vec = Vector3::zeros();
    let mut weighted = Vector3::zeros();
    let mut total = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        let tri = 0.5 * (a - center).cross(&(b - center));
        let tri_area = tri.norm();
        area_vec += tri;
        weighted += tri_area * (a + b + center) / 3.0;
        total += tri_area;
    }

    let centroid = if total > 0.0 { weighted / total } else { center };
    (area_vec, centroid)
}

/// Assembles a [`Mesh`].
///
/// `classify` receives the (0-based) node ids of every boundary face and
/// returns the name of the patch that face belongs to.
pub fn assemble<F>(coordinates: &[Vector3<f64>], raw_cells: &[RawCell], classify: F) -> Result<Mesh>
where
    F: Fn(&[usize]) -> String,
{
    let mut records: Vec<FaceRecord> = Vec::new();
    let mut lookup: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut cell_faces: Vec<Vec<usize>> = Vec::with_capacity(raw_cells.len());

    for (ci, raw) in raw_cells.iter().enumerate() {
        let expected = raw.shape.node_count();
        if raw.vertices.len() != expected {
            return Err(FvmError::InsufficientVertices {
                cell: ci + 1,
                expected,
                found: raw.vertices.len(),
            });
        }
        if let Some(&bad) = raw.vertices.iter().find(|&&v| v >= coordinates.len()) {
            return Err(FvmError::DanglingReference {
                entity: "cell",
                index: ci + 1,
                target: format!("node {}", bad + 1),
            });
        }

        let vertex_avg =
            raw.vertices.iter().map(|&v| coordinates[v]).sum::<Vector3<f64>>() / expected as f64;

        let mut faces = Vec::with_capacity(raw.shape.face_count());
        for local in raw.shape.local_faces() {
            let mut global: Vec<usize> = local.iter().map(|&k| raw.vertices[k]).collect();
            let mut key = global.clone();
            key.sort_unstable();

            if let Some(&fi) = lookup.get(&key) {
                let rec = &mut records[fi];
                if rec.cells[1].is_some() {
                    return Err(FvmError::NonManifoldFace { cell: ci + 1 });
                }
                rec.cells[1] = Some(ci);
                faces.push(fi);
                continue;
            }

            // Orient the polygon outward from the first cell that owns it.
            let points: Vec<Vector3<f64>> = global.iter().map(|&v| coordinates[v]).collect();
            let (area_vec, centroid) = polygon_geometry(&points);
            if area_vec.dot(&(centroid - vertex_avg)) < 0.0 {
                global.reverse();
            }

            lookup.insert(key, records.len());
            faces.push(records.len());
            records.push(FaceRecord {
                vertices: global,
                cells: [Some(ci), None],
            });
        }
        cell_faces.push(faces);
    }

    let mut mesh = Mesh::default();

    mesh.nodes = coordinates
        .iter()
        .enumerate()
        .map(|(i, &x)| Node::new(i + 1, x, false))
        .collect();

    for (fi, rec) in records.iter().enumerate() {
        let shape = FaceShape::from_vertex_count(fi + 1, rec.vertices.len())?;
        let mut face = match rec.cells {
            [Some(c0), Some(c1)] => Face::internal(fi + 1, shape, CellId(c0), CellId(c1)),
            [c0, c1] => Face::boundary(fi + 1, shape, [c0.map(CellId), c1.map(CellId)]),
        };
        let points: Vec<Vector3<f64>> = rec.vertices.iter().map(|&v| coordinates[v]).collect();
        let (area_vec, centroid) = polygon_geometry(&points);
        face.area = area_vec.norm();
        if face.area <= 0.0 {
            return Err(FvmError::DegenerateGeometry {
                entity: "face",
                index: fi + 1,
                reason: "zero area".into(),
            });
        }
        let n0 = area_vec / face.area;
        face.centroid = centroid;
        face.normals = [n0, -n0];
        face.vertices = rec.vertices.iter().map(|&v| NodeId(v)).collect();
        mesh.faces.push(face);
    }

    for (ci, raw) in raw_cells.iter().enumerate() {
        let mut cell = Cell::new(ci + 1, raw.shape);
        cell.vertices = raw.vertices.iter().map(|&v| NodeId(v)).collect();

        for &fi in &cell_faces[ci] {
            let face = &mesh.faces[fi];
            let side = face.side_of(CellId(ci)).unwrap_or(0);
            cell.surface.push(FaceId(fi));
            cell.adjacency.push(face.cells[1 - side]);
            cell.s.push(face.normals[side] * face.area);
        }

        // Divergence theorem for the volume, pyramid split for the centroid.
        let apex = cell.vertices.iter().map(|&v| coordinates[v.0]).sum::<Vector3<f64>>()
            / cell.vertices.len() as f64;
        let mut volume = 0.0;
        let mut moment = Vector3::zeros();
        for (j, &fid) in cell.surface.iter().enumerate() {
            let xf = mesh.faces[fid.0].centroid;
            let v_pyr = (xf - apex).dot(&cell.s[j]) / 3.0;
            volume += v_pyr;
            moment += v_pyr * (apex + 0.75 * (xf - apex));
        }
        if volume <= 0.0 {
            return Err(FvmError::DegenerateGeometry {
                entity: "cell",
                index: ci + 1,
                reason: format!("non-positive volume {:.3e}", volume),
            });
        }
        cell.volume = volume;
        cell.centroid = moment / volume;

        for &v in &cell.vertices {
            mesh.nodes[v.0].cells.push(CellId(ci));
        }
        mesh.cells.push(cell);
    }

    let mut patch_vertices: Vec<BTreeSet<usize>> = Vec::new();
    for fi in 0..mesh.faces.len() {
        if !mesh.faces[fi].at_boundary() {
            continue;
        }
        let ids: Vec<usize> = mesh.faces[fi].vertices.iter().map(|v| v.0).collect();
        let name = classify(&ids);
        let pid = match mesh.patch_by_name(&name) {
            Some(p) => p,
            None => {
                mesh.patches.push(Patch::new(name));
                patch_vertices.push(BTreeSet::new());
                PatchId(mesh.patches.len() - 1)
            }
        };
        mesh.faces[fi].set_parent(pid)?;
        mesh.patches[pid.0].faces.push(FaceId(fi));
        for &v in &ids {
            mesh.nodes[v].at_boundary = true;
            patch_vertices[pid.0].insert(v);
        }
    }
    for (patch, vertices) in mesh.patches.iter_mut().zip(patch_vertices) {
        patch.vertices = vertices.into_iter().map(NodeId).collect();
    }

    debug!(
        "assembled mesh: {} nodes, {} faces, {} cells, {} patches",
        mesh.nodes.len(),
        mesh.faces.len(),
        mesh.cells.len(),
        mesh.patches.len()
    );

    mesh.validate()?;
    Ok(mesh)
}
