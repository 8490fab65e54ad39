//! Derived geometric coefficients.
//!
//! Three phases, each touching one entity kind only:
//!
//! * node weights for cell-to-node interpolation,
//! * face displacement vectors, interpolation ratios and skewness,
//! * per-cell displacement vectors `d` and the `S = S_E + S_T` split.
//!
//! Every phase reads connectivity and the primary geometry produced by
//! assembly and writes only fields owned by the entity it visits.

use log::{debug, info};
use nalgebra::Vector3;

use super::mesh::{Cell, Face, Mesh, Node};
use crate::config::{DiscretizationConfig, NumericalTolerances};
use crate::error::{FvmError, Result};
use crate::numerics::noc::{DecompositionPolicy, decompose};
use crate::numerics::timing::record_phase;
use crate::numerics::{Weighting, WeightingScheme, try_for_each_mut};

/// Runs all three phases in order.
pub fn calculate_geometric_values(mesh: &mut Mesh, config: &DiscretizationConfig) -> Result<()> {
    record_phase("node weights", || compute_node_weights(mesh, config))?;
    record_phase("face ratios", || compute_face_ratios(mesh, config))?;
    record_phase("cell vectors", || compute_cell_vectors(mesh, config))?;
    info!(
        "geometry done: {} node weights, {} face ratios, {} cells decomposed ({:?})",
        mesh.nodes.len(),
        mesh.faces.len(),
        mesh.cells.len(),
        config.decomposition
    );
    Ok(())
}

/// Normalizes `raw` in place so that it sums to 1.
fn normalize(raw: &mut [f64]) {
    let sum: f64 = raw.iter().sum();
    raw.iter_mut().for_each(|w| *w /= sum);
}

fn node_weights(node: &Node, cells: &[Cell], tol: &NumericalTolerances) -> Result<Weighting<Vec<f64>>> {
    if node.cells.is_empty() {
        return Err(FvmError::DegenerateGeometry {
            entity: "node",
            index: node.index,
            reason: "node belongs to no cell".into(),
        });
    }

    let mut weights = Weighting::splat(Vec::with_capacity(node.cells.len()));
    for &cid in &node.cells {
        let cell = &cells[cid.0];
        let r = (node.coordinate - cell.centroid).norm();
        if r < tol.min_distance {
            return Err(FvmError::DegenerateGeometry {
                entity: "node",
                index: node.index,
                reason: format!("coincides with the centroid of cell {}", cell.index),
            });
        }
        for scheme in WeightingScheme::ALL {
            weights.get_mut(scheme).push(scheme.raw_weight(r, cell.volume));
        }
    }
    for scheme in WeightingScheme::ALL {
        normalize(weights.get_mut(scheme));
    }
    Ok(weights)
}

/// Stage A: cell-to-node interpolation weights for every scheme.
pub fn compute_node_weights(mesh: &mut Mesh, config: &DiscretizationConfig) -> Result<()> {
    let Mesh { nodes, cells, .. } = mesh;
    let cells: &[Cell] = cells;
    let parallel = config.runs_parallel(nodes.len());
    let tol = &config.tolerances;
    try_for_each_mut(nodes, parallel, |_, node| {
        node.weights = node_weights(node, cells, tol)?;
        Ok::<(), FvmError>(())
    })?;
    debug!("node weights computed for {} nodes", nodes.len());
    Ok(())
}

fn face_ratios(face: &mut Face, cells: &[Cell], tol: &NumericalTolerances) -> Result<()> {
    let side_cells = face.cells.map(|c| c.map(|id| &cells[id.0]));

    for (side, cell) in side_cells.iter().enumerate() {
        face.r[side] = match cell {
            Some(c) => face.centroid - c.centroid,
            None => Vector3::zeros(),
        };
    }

    match side_cells {
        [Some(c0), Some(c1)] if !face.at_boundary() => {
            let (l0, l1) = (face.r[0].norm(), face.r[1].norm());
            if l0 < tol.min_distance || l1 < tol.min_distance {
                return Err(FvmError::DegenerateGeometry {
                    entity: "face",
                    index: face.index,
                    reason: "face centroid coincides with a cell centroid".into(),
                });
            }
            for scheme in WeightingScheme::ALL {
                let mut pair = [
                    scheme.raw_weight(l0, c0.volume),
                    scheme.raw_weight(l1, c1.volume),
                ];
                normalize(&mut pair);
                *face.ratios.get_mut(scheme) = pair;
            }

            let e = c1.centroid - c0.centroid;
            let len = e.norm();
            if len < tol.min_distance {
                return Err(FvmError::DegenerateGeometry {
                    entity: "face",
                    index: face.index,
                    reason: "coincident cell centroids".into(),
                });
            }
            face.skewness = e.dot(&face.normals[0]) / len;
        }
        _ => {
            let side = face
                .populated_side()
                .ok_or(FvmError::EmptyConnectivity(face.index))?;
            let mut pair = [0.0; 2];
            pair[side] = 1.0;
            face.ratios = Weighting::splat(pair);

            let len = face.r[side].norm();
            face.skewness = if len < tol.min_distance {
                1.0
            } else {
                face.r[side].dot(&face.normals[side]) / len
            };
        }
    }
    Ok(())
}

/// Stage B: face displacement vectors, interpolation ratios and skewness.
pub fn compute_face_ratios(mesh: &mut Mesh, config: &DiscretizationConfig) -> Result<()> {
    let Mesh { faces, cells, .. } = mesh;
    let cells: &[Cell] = cells;
    let parallel = config.runs_parallel(faces.len());
    let tol = &config.tolerances;
    try_for_each_mut(faces, parallel, |_, face| face_ratios(face, cells, tol))?;
    debug!("face ratios computed for {} faces", faces.len());
    Ok(())
}

fn cell_vectors(
    cell: &mut Cell,
    centroids: &[Vector3<f64>],
    faces: &[Face],
    policy: DecompositionPolicy,
    tol: &NumericalTolerances,
) -> Result<()> {
    cell.check_parallel_lengths()?;
    let n = cell.face_count();
    cell.d.clear();
    cell.s_e.clear();
    cell.s_t.clear();
    cell.d.reserve(n);
    cell.s_e.reserve(n);
    cell.s_t.reserve(n);

    for j in 0..n {
        let face = &faces[cell.surface[j].0];
        let d = match cell.adjacency[j] {
            Some(nb) => centroids[nb.0] - cell.centroid,
            None => face.centroid - cell.centroid,
        };
        let s = cell.s[j];

        let (d_len, s_len) = (d.norm(), s.norm());
        if d_len < tol.min_distance {
            return Err(FvmError::DegenerateGeometry {
                entity: "cell",
                index: cell.index,
                reason: format!("zero displacement across face {}", face.index),
            });
        }
        if d.dot(&s).abs() < tol.min_alignment * d_len * s_len {
            return Err(FvmError::DegenerateGeometry {
                entity: "cell",
                index: cell.index,
                reason: format!("face {} is tangential to its displacement", face.index),
            });
        }

        let (e, t) = decompose(policy, &d, &s);
        cell.d.push(d);
        cell.s_e.push(e);
        cell.s_t.push(t);
    }
    Ok(())
}

/// Stage C: displacement vectors and non-orthogonal decomposition.
///
/// Neighbour centroids are read from a snapshot taken before the loop, so no
/// cell reads a slot another iteration may be writing.
pub fn compute_cell_vectors(mesh: &mut Mesh, config: &DiscretizationConfig) -> Result<()> {
    let Mesh { faces, cells, .. } = mesh;
    let faces: &[Face] = faces;
    let centroids: Vec<Vector3<f64>> = cells.iter().map(|c| c.centroid).collect();
    let parallel = config.runs_parallel(cells.len());
    let policy = config.decomposition;
    let tol = &config.tolerances;
    try_for_each_mut(cells, parallel, |_, cell| {
        cell_vectors(cell, &centroids, faces, policy, tol)
    })?;
    debug!("cell vectors computed for {} cells", cells.len());
    Ok(())
}
