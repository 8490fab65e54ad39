//! Least-squares gradient operators.
//!
//! For a cell with `nF` faces the gradient `g` satisfies, in the least-squares
//! sense, one row per face:
//!
//! ```text
//! internal / Dirichlet:  (d_j / |d_j|) . g = (phi_j - phi_c) / |d_j|
//! Neumann:               n_j . g         = (d phi / d n)_j
//! ```
//!
//! With `J = Q R` (thin), the pseudo-inverse `R^-1 Q^T` only depends on the
//! geometry and on which rows are Neumann rows, so it is computed once per
//! cell and field and applied to a fresh right-hand side whenever the
//! gradient is needed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info};
use nalgebra::{DMatrix, DVector, Matrix3xX, Vector3};

use crate::config::DiscretizationConfig;
use crate::discretization::mesh::{Cell, FaceKind, GradientOperator, Mesh};
use crate::error::{FvmError, Result};
use crate::numerics::interpolation::interpolate_face_gradients;
use crate::numerics::try_map;
use crate::physics::bc::{Field, MathBc};

/// What a face row of the least-squares system constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowKind {
    /// A known value at distance `d` (neighbour centroid or Dirichlet face).
    Value,
    /// A known outward normal gradient (Neumann face).
    NormalGradient,
}

/// Row kinds of every face of `cell` for `field`, in surface order.
pub fn row_kinds(mesh: &Mesh, cell: &Cell, field: &Field) -> Result<Vec<RowKind>> {
    cell.surface
        .iter()
        .map(|&fid| {
            let face = mesh.face(fid);
            if !face.at_boundary() {
                return Ok(RowKind::Value);
            }
            let patch = mesh.patch(face.parent_patch()?);
            match patch.condition(field)? {
                MathBc::Dirichlet => Ok(RowKind::Value),
                MathBc::Neumann => Ok(RowKind::NormalGradient),
                MathBc::Robin => Err(FvmError::RobinNotSupported {
                    cell: cell.index,
                    field: field.to_string(),
                }),
            }
        })
        .collect()
}

/// The `nF x 3` matrix `J` of one cell.
pub fn assemble_jacobian(mesh: &Mesh, cell: &Cell, kinds: &[RowKind]) -> DMatrix<f64> {
    let mut j = DMatrix::zeros(kinds.len(), 3);
    for (row, kind) in kinds.iter().enumerate() {
        let coeffs: Vector3<f64> = match kind {
            RowKind::Value => cell.d[row] / cell.d[row].norm(),
            RowKind::NormalGradient => mesh.outward_unit_normal(cell, row),
        };
        j.set_row(row, &coeffs.transpose());
    }
    j
}

/// `R0^-1 Q0^T` from the thin QR factorization of `j`.
///
/// Returns `None` when `R0` has a diagonal entry below `rank_tolerance`
/// relative to its largest one.
pub fn qr_pseudo_inverse(j: DMatrix<f64>, rank_tolerance: f64) -> Option<Matrix3xX<f64>> {
    let rows = j.nrows();
    if rows < 3 || j.ncols() != 3 {
        return None;
    }

    let qr = j.qr();
    let q0 = qr.q();
    let r0 = qr.r();

    let diag = r0.diagonal().map(f64::abs);
    let largest = diag.max();
    if !(largest > 0.0) || diag.min() < rank_tolerance * largest {
        return None;
    }

    let inv = r0.solve_upper_triangular(&q0.transpose())?;
    Some(Matrix3xX::from_fn(rows, |r, c| inv[(r, c)]))
}

/// Operators of one cell for every field. Fields sharing the same row kinds
/// share one `Arc`.
fn cell_operators(
    mesh: &Mesh,
    cell: &Cell,
    fields: &[Field],
    rank_tolerance: f64,
) -> Result<BTreeMap<Field, GradientOperator>> {
    let faces = cell.face_count();
    if faces < 3 {
        return Err(FvmError::InsufficientFaces {
            cell: cell.index,
            faces,
        });
    }
    if cell.d.len() != faces {
        return Err(FvmError::InconsistentConnectivity {
            cell: cell.index,
            faces,
            adjacency: cell.adjacency.len(),
            areas: cell.d.len(),
        });
    }

    let mut by_kinds: HashMap<Vec<RowKind>, GradientOperator> = HashMap::new();
    let mut out = BTreeMap::new();
    for field in fields {
        let kinds = row_kinds(mesh, cell, field)?;
        let op = match by_kinds.get(&kinds) {
            Some(op) => Arc::clone(op),
            None => {
                let j = assemble_jacobian(mesh, cell, &kinds);
                let op = Arc::new(qr_pseudo_inverse(j, rank_tolerance).ok_or_else(|| {
                    FvmError::RankDeficient {
                        cell: cell.index,
                        field: field.to_string(),
                    }
                })?);
                by_kinds.insert(kinds, Arc::clone(&op));
                op
            }
        };
        out.insert(field.clone(), op);
    }
    Ok(out)
}

/// Summary of one operator build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperatorStats {
    /// One per cell and field.
    pub assigned: usize,
    /// Distinct factorizations actually performed.
    pub factorized: usize,
}

/// Builds the gradient operator of every cell for every field in `fields`.
///
/// Boundary condition types must already be assigned to every patch and the
/// cell vectors computed. Operators are committed only once every cell
/// succeeded. On error the operators of `fields` are dropped from every cell,
/// since the ones from an earlier build no longer match the assigned types.
pub fn build_gradient_operators(
    mesh: &mut Mesh,
    fields: &[Field],
    config: &DiscretizationConfig,
) -> Result<OperatorStats> {
    let rank_tolerance = config.tolerances.rank_tolerance;
    let parallel = config.runs_parallel(mesh.cells.len());

    let built = {
        let view: &Mesh = mesh;
        try_map(&view.cells, parallel, |_, cell| {
            cell_operators(view, cell, fields, rank_tolerance)
        })
    };
    let built = match built {
        Ok(built) => built,
        Err(e) => {
            clear_gradient_operators(mesh, fields);
            return Err(e);
        }
    };

    let mut stats = OperatorStats::default();
    for (cell, ops) in mesh.cells.iter_mut().zip(built) {
        let mut seen: Vec<GradientOperator> = Vec::new();
        for (field, op) in ops {
            if !seen.iter().any(|s| Arc::ptr_eq(s, &op)) {
                seen.push(Arc::clone(&op));
            }
            cell.gradient_operators.insert(field, op);
            stats.assigned += 1;
        }
        stats.factorized += seen.len();
    }

    info!(
        "least-squares operators: {} assigned over {} fields, {} factorized",
        stats.assigned,
        fields.len(),
        stats.factorized
    );
    Ok(stats)
}

/// Removes the operators of `fields` from every cell.
pub fn clear_gradient_operators(mesh: &mut Mesh, fields: &[Field]) {
    for cell in &mut mesh.cells {
        for field in fields {
            cell.gradient_operators.remove(field);
        }
    }
}

/// Right-hand side of the least-squares system of `cell` from current values.
pub fn assemble_rhs(mesh: &Mesh, cell: &Cell, field: &Field) -> Result<DVector<f64>> {
    let kinds = row_kinds(mesh, cell, field)?;
    let mut rhs = DVector::zeros(kinds.len());
    for (j, kind) in kinds.iter().enumerate() {
        let w = 1.0 / cell.d[j].norm();
        let face = mesh.face(cell.surface[j]);
        rhs[j] = match (kind, cell.adjacency[j], &face.kind) {
            (RowKind::Value, Some(nb), _) => w * (mesh.cell(nb).value - cell.value),
            (RowKind::Value, None, _) => w * (face.value - cell.value),
            (RowKind::NormalGradient, _, FaceKind::Boundary { sn_grad, .. }) => *sn_grad,
            (RowKind::NormalGradient, _, FaceKind::Internal { .. }) => {
                return Err(FvmError::NoParentPatch(face.index));
            }
        };
    }
    Ok(rhs)
}

/// Gradient of the current cell values at the centroid of `cell`.
pub fn cell_gradient(mesh: &Mesh, cell: &Cell, field: &Field) -> Result<Vector3<f64>> {
    let op = cell
        .gradient_operator(field)
        .ok_or_else(|| FvmError::MissingGradientOperator {
            cell: cell.index,
            field: field.to_string(),
        })?;
    let rhs = assemble_rhs(mesh, cell, field)?;
    if rhs.len() != op.ncols() {
        return Err(FvmError::InconsistentConnectivity {
            cell: cell.index,
            faces: rhs.len(),
            adjacency: cell.adjacency.len(),
            areas: op.ncols(),
        });
    }
    let g: Vector3<f64> = &**op * &rhs;
    Ok(g)
}

/// Reconstructs and stores the cell gradients of `field`, then interpolates
/// them to internal faces with the configured face scheme.
pub fn reconstruct_gradients(
    mesh: &mut Mesh,
    field: &Field,
    config: &DiscretizationConfig,
) -> Result<()> {
    let parallel = config.runs_parallel(mesh.cells.len());
    let grads = {
        let view: &Mesh = mesh;
        try_map(&view.cells, parallel, |_, cell| cell_gradient(view, cell, field))?
    };
    for (cell, g) in mesh.cells.iter_mut().zip(grads) {
        cell.grad = g;
    }
    interpolate_face_gradients(mesh, config);
    debug!("gradients of {} reconstructed on {} cells", field, mesh.cells.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pseudo_inverse_of_identity_rows() {
        let j = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0],
        );
        let inv = qr_pseudo_inverse(j.clone(), 1e-10).unwrap();
        // Left inverse: inv * J = I
        let prod = DMatrix::from_fn(3, 3, |r, c| (0..4).map(|k| inv[(r, k)] * j[(k, c)]).sum::<f64>());
        assert_relative_eq!(prod, DMatrix::identity(3, 3), epsilon = 1e-12);
    }

    #[test]
    fn coplanar_rows_are_rank_deficient() {
        let j = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0, 0.0],
        );
        assert!(qr_pseudo_inverse(j, 1e-10).is_none());
    }

    #[test]
    fn too_few_rows() {
        let j = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(qr_pseudo_inverse(j, 1e-10).is_none());
    }
}
