use glam::DVec3;

use crate::discretization::generator::{BoxSide, BoxSpec, create_box_mesh_named};
use crate::discretization::mesh::Mesh;
use crate::error::Result;
use crate::physics::CaseSetup;
use crate::physics::bc::{BCRule, BoundarySpecification, Field, GeneralizedBC, PhysicalBc};

pub const T_LEFT: f64 = 1500.0; // K
pub const T_RIGHT: f64 = 300.0; // K
pub const T0: f64 = 300.0; // K

/// Square duct along x: hot inlet on the left, cold outlet on the right,
/// adiabatic walls.
#[derive(Clone, Debug)]
pub struct Pipe {
    pub spec: BoxSpec,
}

impl Pipe {
    /// Duct of unit cross-section and the given length, `n` cells per axis.
    pub fn new(length: f64, n: [usize; 3]) -> Self {
        Self {
            spec: BoxSpec::new(DVec3::ZERO, DVec3::new(length, 1.0, 1.0), n),
        }
    }
}

impl CaseSetup for Pipe {
    fn name(&self) -> &str {
        "pipe"
    }

    fn build_mesh(&self) -> Result<Mesh> {
        create_box_mesh_named(&self.spec, |side| match side {
            BoxSide::Left | BoxSide::Right => side.name().to_string(),
            _ => "WALL".to_string(),
        })
    }

    fn boundary_specification(&self) -> BoundarySpecification {
        let t = Field::temperature();
        BoundarySpecification::default()
            .with(BCRule::new(t.clone(), "LEFT", PhysicalBc::Inlet, GeneralizedBC::dirichlet(T_LEFT)))
            .with(BCRule::new(t.clone(), "RIGHT", PhysicalBc::Outlet, GeneralizedBC::dirichlet(T_RIGHT)))
            .with(BCRule::new(t, "WALL", PhysicalBc::Wall, GeneralizedBC::neumann(0.0)))
    }

    fn initial_value(&self) -> f64 {
        T0
    }
}
