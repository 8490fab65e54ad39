use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::{Matrix3xX, Vector3};

use crate::error::{FvmError, Result};
use crate::numerics::Weighting;
use crate::physics::bc::{Field, MathBc, PhysicalBc};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);

        impl $name {
            /// 1-based identity as used in mesh files.
            #[inline]
            pub fn one_based(self) -> usize {
                self.0 + 1
            }

            /// Handle for a 1-based identity read from a mesh file.
            #[inline]
            pub fn from_one_based(index: usize) -> Option<Self> {
                index.checked_sub(1).map($name)
            }
        }
    };
}

entity_id!(
    /// 0-based handle into [`Mesh::nodes`].
    NodeId
);
entity_id!(
    /// 0-based handle into [`Mesh::faces`].
    FaceId
);
entity_id!(
    /// 0-based handle into [`Mesh::cells`].
    CellId
);
entity_id!(
    /// 0-based handle into [`Mesh::patches`].
    PatchId
);

/// Least-squares gradient operator of one cell: a 3 x N matrix, N being the
/// number of faces of the cell. Shared between fields whose rows coincide.
pub type GradientOperator = Arc<Matrix3xX<f64>>;

/// Supported cell topologies with their mesh-file shape codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellShape {
    Tetrahedron,
    Hexahedron,
    Pyramid,
    Wedge,
}

impl CellShape {
    pub fn from_code(index: usize, code: i64) -> Result<Self> {
        match code {
            2 => Ok(CellShape::Tetrahedron),
            4 => Ok(CellShape::Hexahedron),
            5 => Ok(CellShape::Pyramid),
            6 => Ok(CellShape::Wedge),
            _ => Err(FvmError::UnsupportedShape {
                entity: "cell",
                index,
                code,
            }),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            CellShape::Tetrahedron => 2,
            CellShape::Hexahedron => 4,
            CellShape::Pyramid => 5,
            CellShape::Wedge => 6,
        }
    }

    pub fn node_count(self) -> usize {
        match self {
            CellShape::Tetrahedron => 4,
            CellShape::Hexahedron => 8,
            CellShape::Pyramid => 5,
            CellShape::Wedge => 6,
        }
    }

    pub fn face_count(self) -> usize {
        match self {
            CellShape::Tetrahedron => 4,
            CellShape::Hexahedron => 6,
            CellShape::Pyramid => 5,
            CellShape::Wedge => 5,
        }
    }

    /// Local vertex indices of each face. Orientation is fixed up during
    /// assembly, so only the cyclic order matters here.
    pub fn local_faces(self) -> &'static [&'static [usize]] {
        match self {
            CellShape::Tetrahedron => &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]],
            CellShape::Hexahedron => &[
                &[0, 3, 7, 4],
                &[1, 5, 6, 2],
                &[0, 4, 5, 1],
                &[3, 2, 6, 7],
                &[0, 1, 2, 3],
                &[4, 7, 6, 5],
            ],
            CellShape::Pyramid => &[&[0, 3, 2, 1], &[0, 1, 4], &[1, 2, 4], &[2, 3, 4], &[3, 0, 4]],
            CellShape::Wedge => &[
                &[0, 2, 1],
                &[3, 4, 5],
                &[0, 1, 4, 3],
                &[1, 2, 5, 4],
                &[2, 0, 3, 5],
            ],
        }
    }
}

/// Supported face polygons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceShape {
    Triangle,
    Quadrilateral,
}

impl FaceShape {
    pub fn from_code(index: usize, code: i64) -> Result<Self> {
        match code {
            3 => Ok(FaceShape::Triangle),
            4 => Ok(FaceShape::Quadrilateral),
            _ => Err(FvmError::UnsupportedShape {
                entity: "face",
                index,
                code,
            }),
        }
    }

    pub fn from_vertex_count(index: usize, count: usize) -> Result<Self> {
        Self::from_code(index, count as i64)
    }

    pub fn node_count(self) -> usize {
        match self {
            FaceShape::Triangle => 3,
            FaceShape::Quadrilateral => 4,
        }
    }
}

pub struct Node {
    /// 1-based global index.
    pub index: usize,
    pub at_boundary: bool,
    pub coordinate: Vector3<f64>,
    /// Cells sharing this node, in a fixed order.
    pub cells: Vec<CellId>,
    /// Interpolation weights, parallel to `cells`. Each scheme sums to 1.
    pub weights: Weighting<Vec<f64>>,
    pub value: f64,
}

impl Node {
    pub fn new(index: usize, coordinate: Vector3<f64>, at_boundary: bool) -> Self {
        Self {
            index,
            at_boundary,
            coordinate,
            cells: Vec::new(),
            weights: Weighting::default(),
            value: 0.0,
        }
    }
}

/// Internal/boundary specific part of a [`Face`].
#[derive(Clone, Debug, PartialEq)]
pub enum FaceKind {
    Internal {
        grad: Vector3<f64>,
    },
    Boundary {
        patch: Option<PatchId>,
        /// Gradient in the outward (domain) normal direction.
        sn_grad: f64,
    },
}

pub struct Face {
    /// 1-based global index.
    pub index: usize,
    pub shape: FaceShape,
    pub centroid: Vector3<f64>,
    pub area: f64,
    pub vertices: Vec<NodeId>,
    /// `[c0, c1]`. Internal faces have both; boundary faces exactly one.
    pub cells: [Option<CellId>; 2],
    /// Unit normals pointing out of c0 and out of c1 respectively.
    pub normals: [Vector3<f64>; 2],
    pub kind: FaceKind,
    /// Displacement from the centroid of c0 (resp. c1) to the face centroid,
    /// zero when that cell is absent.
    pub r: [Vector3<f64>; 2],
    /// Interpolation ratios toward c0/c1. Each scheme sums to 1.
    pub ratios: Weighting<[f64; 2]>,
    /// Cosine between the cell-to-cell (or cell-to-face) direction and the
    /// face normal; 1 on a perfectly orthogonal face.
    pub skewness: f64,
    pub value: f64,
}

impl Face {
    pub fn internal(index: usize, shape: FaceShape, c0: CellId, c1: CellId) -> Self {
        Self::with_kind(index, shape, [Some(c0), Some(c1)], FaceKind::Internal {
            grad: Vector3::zeros(),
        })
    }

    pub fn boundary(index: usize, shape: FaceShape, cells: [Option<CellId>; 2]) -> Self {
        Self::with_kind(index, shape, cells, FaceKind::Boundary {
            patch: None,
            sn_grad: 0.0,
        })
    }

    fn with_kind(
        index: usize,
        shape: FaceShape,
        cells: [Option<CellId>; 2],
        kind: FaceKind,
    ) -> Self {
        Self {
            index,
            shape,
            centroid: Vector3::zeros(),
            area: 0.0,
            vertices: Vec::new(),
            cells,
            normals: [Vector3::zeros(); 2],
            kind,
            r: [Vector3::zeros(); 2],
            ratios: Weighting::splat([0.5, 0.5]),
            skewness: 1.0,
            value: 0.0,
        }
    }

    #[inline]
    pub fn at_boundary(&self) -> bool {
        matches!(self.kind, FaceKind::Boundary { .. })
    }

    /// Owning patch of a boundary face. Asking an internal face is an error.
    pub fn parent_patch(&self) -> Result<PatchId> {
        match self.kind {
            FaceKind::Boundary { patch: Some(p), .. } => Ok(p),
            FaceKind::Boundary { patch: None, .. } => Err(FvmError::MissingParentPatch(self.index)),
            FaceKind::Internal { .. } => Err(FvmError::NoParentPatch(self.index)),
        }
    }

    pub fn set_parent(&mut self, parent: PatchId) -> Result<()> {
        match &mut self.kind {
            FaceKind::Boundary { patch, .. } => {
                *patch = Some(parent);
                Ok(())
            }
            FaceKind::Internal { .. } => Err(FvmError::NotABoundaryFace(self.index)),
        }
    }

    /// Side (0 or 1) holding the only cell of a boundary face, or the c0 side
    /// of an internal face.
    #[inline]
    pub fn populated_side(&self) -> Option<usize> {
        match self.cells {
            [Some(_), _] => Some(0),
            [None, Some(_)] => Some(1),
            [None, None] => None,
        }
    }

    /// Side of this face on which `cell` sits.
    #[inline]
    pub fn side_of(&self, cell: CellId) -> Option<usize> {
        self.cells.iter().position(|c| *c == Some(cell))
    }
}

pub struct Cell {
    /// 1-based global index.
    pub index: usize,
    pub shape: CellShape,
    pub centroid: Vector3<f64>,
    pub volume: f64,
    pub vertices: Vec<NodeId>,
    /// Bounding faces. `adjacency`, `s`, `s_e`, `s_t` and `d` follow this order.
    pub surface: Vec<FaceId>,
    /// Neighbour across each face, `None` on the domain boundary.
    pub adjacency: Vec<Option<CellId>>,
    /// Outward area vectors.
    pub s: Vec<Vector3<f64>>,
    /// Orthogonal part of `s` (collinear with `d`).
    pub s_e: Vec<Vector3<f64>>,
    /// Non-orthogonal remainder, `s - s_e`.
    pub s_t: Vec<Vector3<f64>>,
    /// Centroid to neighbour centroid, or to face centroid without neighbour.
    pub d: Vec<Vector3<f64>>,
    pub gradient_operators: BTreeMap<Field, GradientOperator>,
    pub value: f64,
    pub grad: Vector3<f64>,
}

impl Cell {
    pub fn new(index: usize, shape: CellShape) -> Self {
        Self {
            index,
            shape,
            centroid: Vector3::zeros(),
            volume: 0.0,
            vertices: Vec::new(),
            surface: Vec::new(),
            adjacency: Vec::new(),
            s: Vec::new(),
            s_e: Vec::new(),
            s_t: Vec::new(),
            d: Vec::new(),
            gradient_operators: BTreeMap::new(),
            value: 0.0,
            grad: Vector3::zeros(),
        }
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.surface.len()
    }

    pub fn gradient_operator(&self, field: &Field) -> Option<&GradientOperator> {
        self.gradient_operators.get(field)
    }

    /// Fails unless faces, neighbours and area vectors line up.
    pub fn check_parallel_lengths(&self) -> Result<()> {
        let n = self.surface.len();
        if self.adjacency.len() != n || self.s.len() != n {
            return Err(FvmError::InconsistentConnectivity {
                cell: self.index,
                faces: n,
                adjacency: self.adjacency.len(),
                areas: self.s.len(),
            });
        }
        Ok(())
    }
}

/// A named group of boundary faces sharing one boundary-condition assignment.
pub struct Patch {
    pub name: String,
    pub faces: Vec<FaceId>,
    pub vertices: Vec<NodeId>,
    pub physical: Option<PhysicalBc>,
    /// Mathematical specification per transported field.
    pub conditions: BTreeMap<Field, MathBc>,
}

impl Patch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: Vec::new(),
            vertices: Vec::new(),
            physical: None,
            conditions: BTreeMap::new(),
        }
    }

    pub fn condition(&self, field: &Field) -> Result<MathBc> {
        self.conditions
            .get(field)
            .copied()
            .ok_or_else(|| FvmError::MissingBoundaryCondition {
                patch: self.name.clone(),
                field: field.to_string(),
            })
    }
}

/// The complete computational grid. Owns every entity; entities refer to
/// each other only through the id handles.
#[derive(Default)]
pub struct Mesh {
    pub nodes: Vec<Node>,
    pub faces: Vec<Face>,
    pub cells: Vec<Cell>,
    pub patches: Vec<Patch>,
}

impl Mesh {
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.0]
    }

    #[inline]
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    #[inline]
    pub fn patch(&self, id: PatchId) -> &Patch {
        &self.patches[id.0]
    }

    pub fn patch_by_name(&self, name: &str) -> Option<PatchId> {
        self.patches.iter().position(|p| p.name == name).map(PatchId)
    }

    /// Counts of nodes, faces and cells, in checkpoint order.
    pub fn counts(&self) -> [usize; 3] {
        [self.nodes.len(), self.faces.len(), self.cells.len()]
    }

    pub fn boundary_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.at_boundary())
            .map(|(i, f)| (FaceId(i), f))
    }

    pub fn internal_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.at_boundary())
            .map(|(i, f)| (FaceId(i), f))
    }

    /// Checks the structural invariants mesh assembly must guarantee.
    pub fn validate(&self) -> Result<()> {
        for face in &self.faces {
            match (&face.kind, face.cells) {
                (_, [None, None]) => return Err(FvmError::EmptyConnectivity(face.index)),
                (FaceKind::Internal { .. }, [Some(_), Some(_)]) => {}
                (FaceKind::Internal { .. }, _) => {
                    return Err(FvmError::InternalFaceMissingNeighbor(face.index));
                }
                (FaceKind::Boundary { .. }, [Some(_), Some(_)]) => {
                    return Err(FvmError::BoundaryFaceWithTwoCells(face.index));
                }
                (FaceKind::Boundary { .. }, _) => {
                    face.parent_patch()?;
                }
            }
        }

        for (ci, cell) in self.cells.iter().enumerate() {
            cell.check_parallel_lengths()?;
            for (&f, &nb) in cell.surface.iter().zip(&cell.adjacency) {
                let face = self.face(f);
                let side = face.cells.iter().position(|c| *c == Some(CellId(ci)));
                if side.is_none_or(|k| face.cells[1 - k] != nb) {
                    return Err(FvmError::AdjacencyMismatch {
                        cell: cell.index,
                        face: face.index,
                    });
                }
            }
            let expected = cell.shape.node_count();
            if cell.vertices.len() != expected {
                return Err(FvmError::InsufficientVertices {
                    cell: cell.index,
                    expected,
                    found: cell.vertices.len(),
                });
            }
            if cell.volume <= 0.0 {
                return Err(FvmError::DegenerateGeometry {
                    entity: "cell",
                    index: cell.index,
                    reason: format!("non-positive volume {:.3e}", cell.volume),
                });
            }
        }

        for patch in &self.patches {
            for &f in &patch.faces {
                if !self.face(f).at_boundary() {
                    return Err(FvmError::NotABoundaryFace(f.one_based()));
                }
            }
        }
        Ok(())
    }

    /// Unit outward normal of face `j` of `cell`, as seen from that cell.
    #[inline]
    pub fn outward_unit_normal(&self, cell: &Cell, j: usize) -> Vector3<f64> {
        cell.s[j] / self.face(cell.surface[j]).area
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_convert_between_bases() {
        assert_eq!(CellId(0).one_based(), 1);
        assert_eq!(NodeId::from_one_based(3), Some(NodeId(2)));
        assert_eq!(FaceId::from_one_based(0), None);
    }

    #[test]
    fn internal_face_has_no_parent_patch() {
        let f = Face::internal(4, FaceShape::Quadrilateral, CellId(0), CellId(1));
        assert!(matches!(f.parent_patch(), Err(FvmError::NoParentPatch(4))));

        let mut f = Face::internal(4, FaceShape::Quadrilateral, CellId(0), CellId(1));
        assert!(matches!(f.set_parent(PatchId(0)), Err(FvmError::NotABoundaryFace(4))));
    }

    #[test]
    fn boundary_face_reports_its_patch_once_assigned() {
        let mut f = Face::boundary(2, FaceShape::Triangle, [Some(CellId(0)), None]);
        assert!(matches!(f.parent_patch(), Err(FvmError::MissingParentPatch(2))));
        f.set_parent(PatchId(1)).unwrap();
        assert_eq!(f.parent_patch().unwrap(), PatchId(1));
        assert_eq!(f.populated_side(), Some(0));
    }

    #[test]
    fn shape_codes_round_trip() {
        for shape in [
            CellShape::Tetrahedron,
            CellShape::Hexahedron,
            CellShape::Pyramid,
            CellShape::Wedge,
        ] {
            assert_eq!(CellShape::from_code(1, shape.code()).unwrap(), shape);
            assert_eq!(shape.local_faces().len(), shape.face_count());
        }
        assert!(matches!(
            CellShape::from_code(9, 3),
            Err(FvmError::UnsupportedShape { entity: "cell", index: 9, code: 3 })
        ));
    }

    #[test]
    fn mismatched_parallel_arrays_are_rejected() {
        let mut c = Cell::new(1, CellShape::Tetrahedron);
        c.surface = vec![FaceId(0), FaceId(1)];
        c.adjacency = vec![None];
        c.s = vec![Vector3::x(), Vector3::y()];
        assert!(matches!(
            c.check_parallel_lengths(),
            Err(FvmError::InconsistentConnectivity { cell: 1, faces: 2, adjacency: 1, areas: 2 })
        ));
    }

    #[test]
    fn boundary_face_between_two_cells_is_rejected() {
        let mut mesh = crate::discretization::generator::create_hex_box([0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1])
            .unwrap();
        let (fid, face) = mesh.internal_faces().next().unwrap();
        let mut flagged = Face::boundary(face.index, face.shape, face.cells);
        flagged.set_parent(PatchId(0)).unwrap();
        mesh.faces[fid.0] = flagged;
        assert!(matches!(
            mesh.validate(),
            Err(FvmError::BoundaryFaceWithTwoCells(i)) if i == fid.one_based()
        ));
    }

    #[test]
    fn adjacency_must_agree_with_face_cells() {
        let mut mesh = crate::discretization::generator::create_hex_box([0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1])
            .unwrap();
        mesh.validate().unwrap();
        let j = mesh.cells[0]
            .adjacency
            .iter()
            .position(|c| c.is_some())
            .unwrap();
        mesh.cells[0].adjacency[j] = None;
        assert!(matches!(
            mesh.validate(),
            Err(FvmError::AdjacencyMismatch { cell: 1, .. })
        ));
    }
}
