//! Geometric coefficients and least-squares gradient operators for a
//! cell-centred finite-volume discretization on unstructured 3D meshes of
//! tetrahedra, hexahedra, pyramids and wedges.
//!
//! Typical use: build or read a [`Mesh`], then run
//! [`numerics::pipeline::setup_discretization`] (or
//! [`numerics::pipeline::prepare_case`] for a [`CaseSetup`]) and
//! reconstruct gradients with [`numerics::least_squares::reconstruct_gradients`].

pub mod config;
pub mod discretization;
pub mod error;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;

pub use config::{DiscretizationConfig, NumericalTolerances};
pub use discretization::mesh::Mesh;
pub use error::{FvmError, Result};
pub use numerics::WeightingScheme;
pub use numerics::noc::DecompositionPolicy;
pub use physics::CaseSetup;
pub use physics::bc::{BCRule, BoundarySpecification, Field, GeneralizedBC, MathBc, PhysicalBc};
