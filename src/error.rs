use thiserror::Error;

/// Every failure the discretization core can surface.
///
/// None of these are recoverable within a run: the phase that produced the
/// error is aborted and no default geometry is substituted.
#[derive(Debug, Error)]
pub enum FvmError {
    #[error("unsupported {entity} shape code {code} on {entity} {index}")]
    UnsupportedShape {
        entity: &'static str,
        index: usize,
        code: i64,
    },
    #[error("invalid boundary flag {flag} on {entity} {index}")]
    InvalidBoundaryFlag {
        entity: &'static str,
        index: usize,
        flag: i64,
    },
    #[error("\"{0}\" is not a pre-defined boundary patch")]
    UnexpectedPatch(String),
    #[error("face {0} is listed by a patch but is not a boundary face")]
    NotABoundaryFace(usize),
    #[error("no parent patch for internal face {0}")]
    NoParentPatch(usize),
    #[error("boundary face {0} was never assigned to a patch")]
    MissingParentPatch(usize),
    #[error("cell {cell} expects {expected} vertices, found {found}")]
    InsufficientVertices {
        cell: usize,
        expected: usize,
        found: usize,
    },
    #[error("{entity} {index} references missing {target}")]
    DanglingReference {
        entity: &'static str,
        index: usize,
        target: String,
    },
    #[error("parse error at token {token}: {message}")]
    Parse { token: usize, message: String },

    #[error("Robin boundary condition is not supported (cell {cell}, field {field})")]
    RobinNotSupported { cell: usize, field: String },
    #[error("patch \"{patch}\" has no boundary condition for field {field}")]
    MissingBoundaryCondition { patch: String, field: String },

    #[error(
        "inconsistent connectivity on cell {cell}: {faces} faces, {adjacency} adjacent cells, {areas} area vectors"
    )]
    InconsistentConnectivity {
        cell: usize,
        faces: usize,
        adjacency: usize,
        areas: usize,
    },
    #[error("both c0 and c1 are empty on face {0}")]
    EmptyConnectivity(usize),
    #[error("internal face {0} is missing one of its two cells")]
    InternalFaceMissingNeighbor(usize),
    #[error("boundary face {0} lists two cells")]
    BoundaryFaceWithTwoCells(usize),
    #[error("cell {cell} and face {face} disagree on the cells around the face")]
    AdjacencyMismatch { cell: usize, face: usize },
    #[error("a face of cell {cell} is shared by more than two cells")]
    NonManifoldFace { cell: usize },
    #[error("cell {cell} has only {faces} faces, at least 3 are needed for a gradient")]
    InsufficientFaces { cell: usize, faces: usize },

    #[error("degenerate geometry on {entity} {index}: {reason}")]
    DegenerateGeometry {
        entity: &'static str,
        index: usize,
        reason: String,
    },
    #[error("cell {cell} has no gradient operator for field {field}")]
    MissingGradientOperator { cell: usize, field: String },
    #[error("least-squares system of cell {cell} is rank deficient for field {field}")]
    RankDeficient { cell: usize, field: String },

    #[error("input data is not consistent with the loaded mesh (expected {expected:?}, found {found:?})")]
    InconsistentMesh {
        expected: [usize; 3],
        found: [usize; 3],
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FvmError>;
