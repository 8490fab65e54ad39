use super::assembly::{RawCell, assemble};
use super::mesh::{CellShape, Mesh};
use crate::error::{FvmError, Result};
use glam::{DAffine3, DVec3};
use nalgebra::Vector3;

/// How each hexahedral block of a box mesh is filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockFill {
    Hexahedra,
    /// Six tetrahedra around the main diagonal (Kuhn split).
    Tetrahedra,
    /// Two wedges split along the xy diagonal.
    Wedges,
    /// Hexahedra and wedges alternating column by column.
    Mixed,
}

/// Structured box description. Cell counts per axis are in `n`.
#[derive(Clone, Copy, Debug)]
pub struct BoxSpec {
    pub origin: DVec3,
    pub extent: DVec3,
    pub n: [usize; 3],
    pub fill: BlockFill,
    /// Orientation preserving map applied to every node.
    pub transform: DAffine3,
}

impl BoxSpec {
    pub fn new(origin: DVec3, extent: DVec3, n: [usize; 3]) -> Self {
        Self {
            origin,
            extent,
            n,
            fill: BlockFill::Hexahedra,
            transform: DAffine3::IDENTITY,
        }
    }

    pub fn with_fill(mut self, fill: BlockFill) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_transform(mut self, transform: DAffine3) -> Self {
        self.transform = transform;
        self
    }

    fn node_id(&self, i: usize, j: usize, k: usize) -> usize {
        let [nx, ny, _] = self.n;
        i + (nx + 1) * (j + (ny + 1) * k)
    }

    fn lattice_index(&self, id: usize) -> [usize; 3] {
        let [nx, ny, _] = self.n;
        let i = id % (nx + 1);
        let j = (id / (nx + 1)) % (ny + 1);
        let k = id / ((nx + 1) * (ny + 1));
        [i, j, k]
    }

    /// Box side a boundary face lies on, from the lattice plane all of its
    /// nodes share.
    fn classify(&self, ids: &[usize]) -> Option<BoxSide> {
        let idx: Vec<[usize; 3]> = ids.iter().map(|&v| self.lattice_index(v)).collect();
        let on = |axis: usize, value: usize| idx.iter().all(|p| p[axis] == value);
        let [nx, ny, nz] = self.n;
        if on(0, 0) {
            Some(BoxSide::Left)
        } else if on(0, nx) {
            Some(BoxSide::Right)
        } else if on(1, 0) {
            Some(BoxSide::Down)
        } else if on(1, ny) {
            Some(BoxSide::Up)
        } else if on(2, 0) {
            Some(BoxSide::Back)
        } else if on(2, nz) {
            Some(BoxSide::Front)
        } else {
            None
        }
    }
}

/// The six sides of a box, x-, x+, y-, y+, z-, z+.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxSide {
    Left,
    Right,
    Down,
    Up,
    Back,
    Front,
}

impl BoxSide {
    pub fn name(self) -> &'static str {
        match self {
            BoxSide::Left => "LEFT",
            BoxSide::Right => "RIGHT",
            BoxSide::Down => "DOWN",
            BoxSide::Up => "UP",
            BoxSide::Back => "BACK",
            BoxSide::Front => "FRONT",
        }
    }
}

/// Regular lattice of node positions in `[origin, origin + extent]`.
pub fn create_lattice(spec: &BoxSpec) -> Vec<DVec3> {
    let [nx, ny, nz] = spec.n;
    let step = spec.extent / DVec3::new(nx as f64, ny as f64, nz as f64);
    let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let p = spec.origin + step * DVec3::new(i as f64, j as f64, k as f64);
                points.push(spec.transform.transform_point3(p));
            }
        }
    }
    points
}

/// Cell vertex lists for every block of the lattice.
pub fn create_block_cells(spec: &BoxSpec) -> Vec<RawCell> {
    let [nx, ny, nz] = spec.n;
    let mut cells = Vec::new();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v = [
                    spec.node_id(i, j, k),
                    spec.node_id(i + 1, j, k),
                    spec.node_id(i + 1, j + 1, k),
                    spec.node_id(i, j + 1, k),
                    spec.node_id(i, j, k + 1),
                    spec.node_id(i + 1, j, k + 1),
                    spec.node_id(i + 1, j + 1, k + 1),
                    spec.node_id(i, j + 1, k + 1),
                ];
                let fill = match spec.fill {
                    BlockFill::Mixed if (i + j) % 2 == 1 => BlockFill::Wedges,
                    BlockFill::Mixed => BlockFill::Hexahedra,
                    other => other,
                };
                push_block(&mut cells, &v, fill);
            }
        }
    }
    cells
}

fn push_block(cells: &mut Vec<RawCell>, v: &[usize; 8], fill: BlockFill) {
    let pick = |ids: &[usize]| ids.iter().map(|&k| v[k]).collect::<Vec<_>>();
    match fill {
        BlockFill::Hexahedra | BlockFill::Mixed => {
            cells.push(RawCell::new(CellShape::Hexahedron, v.to_vec()));
        }
        BlockFill::Tetrahedra => {
            for tet in [
                [0, 1, 2, 6],
                [0, 1, 5, 6],
                [0, 3, 2, 6],
                [0, 3, 7, 6],
                [0, 4, 5, 6],
                [0, 4, 7, 6],
            ] {
                cells.push(RawCell::new(CellShape::Tetrahedron, pick(&tet)));
            }
        }
        BlockFill::Wedges => {
            cells.push(RawCell::new(CellShape::Wedge, pick(&[0, 1, 2, 4, 5, 6])));
            cells.push(RawCell::new(CellShape::Wedge, pick(&[0, 2, 3, 4, 6, 7])));
        }
    }
}

/// Build a box mesh with `LEFT/RIGHT`, `DOWN/UP` and `BACK/FRONT` patches on
/// the x, y and z extremes.
pub fn create_box_mesh(spec: &BoxSpec) -> Result<Mesh> {
    create_box_mesh_named(spec, |side| side.name().to_string())
}

/// Like [`create_box_mesh`], with the patch of each side named by `name`.
/// Sides mapped to the same name share one patch.
pub fn create_box_mesh_named<F>(spec: &BoxSpec, name: F) -> Result<Mesh>
where
    F: Fn(BoxSide) -> String,
{
    if spec.n.iter().any(|&n| n == 0) || spec.extent.min_element() <= 0.0 {
        return Err(FvmError::Config(format!(
            "box needs positive extent and cell counts, got {:?} / {:?}",
            spec.extent, spec.n
        )));
    }
    if spec.transform.matrix3.determinant() <= 0.0 {
        return Err(FvmError::Config(
            "box transform must preserve orientation".into(),
        ));
    }

    let coordinates: Vec<Vector3<f64>> = create_lattice(spec)
        .into_iter()
        .map(|p| Vector3::new(p.x, p.y, p.z))
        .collect();
    let cells = create_block_cells(spec);
    assemble(&coordinates, &cells, |ids| {
        spec.classify(ids)
            .map_or_else(|| "UNKNOWN".to_string(), &name)
    })
}

/// Convenience wrapper for an axis-aligned hexahedral box.
pub fn create_hex_box(origin: [f64; 3], extent: [f64; 3], n: [usize; 3]) -> Result<Mesh> {
    create_box_mesh(&BoxSpec::new(
        DVec3::from_array(origin),
        DVec3::from_array(extent),
        n,
    ))
}

/// Shear `x` by `factor * y`, a cheap way to obtain non-orthogonal faces.
pub fn shear_xy(factor: f64) -> DAffine3 {
    DAffine3::from_cols(
        DVec3::X,
        DVec3::new(factor, 1.0, 0.0),
        DVec3::Z,
        DVec3::ZERO,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hex_box_counts() {
        let mesh = create_hex_box([0.0; 3], [1.0; 3], [2, 3, 4]).unwrap();
        assert_eq!(mesh.nodes.len(), 3 * 4 * 5);
        assert_eq!(mesh.cells.len(), 24);
        // x-faces + y-faces + z-faces
        assert_eq!(mesh.faces.len(), 3 * 3 * 4 + 2 * 4 * 4 + 2 * 3 * 5);
        assert_eq!(mesh.patches.len(), 6);
        let total: f64 = mesh.cells.iter().map(|c| c.volume).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn every_fill_tiles_the_box() {
        for fill in [
            BlockFill::Hexahedra,
            BlockFill::Tetrahedra,
            BlockFill::Wedges,
            BlockFill::Mixed,
        ] {
            let spec = BoxSpec::new(DVec3::ZERO, DVec3::new(2.0, 1.0, 1.0), [2, 2, 2]).with_fill(fill);
            let mesh = create_box_mesh(&spec).unwrap();
            let total: f64 = mesh.cells.iter().map(|c| c.volume).sum();
            assert_relative_eq!(total, 2.0, epsilon = 1e-12);
            assert!(mesh.patches.iter().all(|p| p.name != "UNKNOWN"), "{fill:?}");
        }
    }

    #[test]
    fn shear_keeps_volume() {
        let spec = BoxSpec::new(DVec3::ZERO, DVec3::ONE, [3, 3, 1]).with_transform(shear_xy(0.4));
        let mesh = create_box_mesh(&spec).unwrap();
        let total: f64 = mesh.cells.iter().map(|c| c.volume).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn sides_can_share_a_patch() {
        let spec = BoxSpec::new(DVec3::ZERO, DVec3::new(4.0, 1.0, 1.0), [4, 1, 1]);
        let mesh = create_box_mesh_named(&spec, |side| match side {
            BoxSide::Left | BoxSide::Right => side.name().to_string(),
            _ => "WALL".to_string(),
        })
        .unwrap();
        assert_eq!(mesh.patches.len(), 3);
        let wall = mesh.patch_by_name("WALL").unwrap();
        assert_eq!(mesh.patch(wall).faces.len(), 16);
    }

    #[test]
    fn mirrored_transform_is_rejected() {
        let spec = BoxSpec::new(DVec3::ZERO, DVec3::ONE, [1, 1, 1])
            .with_transform(DAffine3::from_scale(DVec3::new(-1.0, 1.0, 1.0)));
        assert!(matches!(create_box_mesh(&spec), Err(FvmError::Config(_))));
    }
}
