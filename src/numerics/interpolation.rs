//! Cell-to-node and cell-to-face projection of the current cell values.
//!
//! These are pure projections: nothing here writes back into cells.

use nalgebra::Vector3;

use crate::config::DiscretizationConfig;
use crate::discretization::mesh::{Cell, Face, FaceKind, Mesh, Node};
use crate::numerics::{WeightingScheme, for_each_mut};

/// Weighted sum of the dependent cell values of `node`.
#[inline]
pub fn nodal_value(node: &Node, cells: &[Cell], scheme: WeightingScheme) -> f64 {
    node.weights
        .get(scheme)
        .iter()
        .zip(&node.cells)
        .map(|(w, c)| w * cells[c.0].value)
        .sum()
}

/// Updates every node value from the cells around it.
pub fn interpolate_nodal_values(mesh: &mut Mesh, config: &DiscretizationConfig) {
    let Mesh { nodes, cells, .. } = mesh;
    let cells: &[Cell] = cells;
    let scheme = config.nodal_scheme;
    let parallel = config.runs_parallel(nodes.len());
    for_each_mut(nodes, parallel, |_, node| {
        node.value = nodal_value(node, cells, scheme);
    });
}

/// Ratio-weighted combination of a per-cell quantity on the two sides of an
/// internal face. `None` for boundary faces.
#[inline]
fn blend<T, F>(face: &Face, cells: &[Cell], scheme: WeightingScheme, get: F) -> Option<T>
where
    F: Fn(&Cell) -> T,
    T: std::ops::Mul<f64, Output = T> + std::ops::Add<Output = T>,
{
    match (face.cells, &face.kind) {
        ([Some(c0), Some(c1)], FaceKind::Internal { .. }) => {
            let [k0, k1] = *face.ratios.get(scheme);
            Some(get(&cells[c0.0]) * k0 + get(&cells[c1.0]) * k1)
        }
        _ => None,
    }
}

/// Updates internal face values. Boundary face values are owned by the
/// boundary conditions and left as they are.
pub fn interpolate_face_values(mesh: &mut Mesh, config: &DiscretizationConfig) {
    let Mesh { faces, cells, .. } = mesh;
    let cells: &[Cell] = cells;
    let scheme = config.face_scheme;
    let parallel = config.runs_parallel(faces.len());
    for_each_mut(faces, parallel, |_, face| {
        if let Some(v) = blend(face, cells, scheme, |c| c.value) {
            face.value = v;
        }
    });
}

/// Interpolates the stored cell gradients to internal faces.
pub fn interpolate_face_gradients(mesh: &mut Mesh, config: &DiscretizationConfig) {
    let Mesh { faces, cells, .. } = mesh;
    let cells: &[Cell] = cells;
    let scheme = config.face_scheme;
    let parallel = config.runs_parallel(faces.len());
    for_each_mut(faces, parallel, |_, face| {
        let g: Option<Vector3<f64>> = blend(face, cells, scheme, |c| c.grad);
        if let (Some(g), FaceKind::Internal { grad }) = (g, &mut face.kind) {
            *grad = g;
        }
    });
}
