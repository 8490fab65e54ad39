use glam::DVec3;

use crate::discretization::generator::{BlockFill, BoxSpec, create_box_mesh};
use crate::discretization::mesh::Mesh;
use crate::error::Result;
use crate::physics::CaseSetup;
use crate::physics::bc::{BCRule, BoundarySpecification, Field, GeneralizedBC, PhysicalBc};

pub const T_UP: f64 = 1500.0; // K
pub const T_DOWN: f64 = 300.0; // K
pub const T0: f64 = 300.0; // K

/// Closed box heated from the top wall, cooled at the bottom, the four
/// remaining walls adiabatic.
#[derive(Clone, Debug)]
pub struct Cavity {
    pub spec: BoxSpec,
}

impl Cavity {
    /// Unit cube with `n` cells per axis.
    pub fn new(n: [usize; 3]) -> Self {
        Self {
            spec: BoxSpec::new(DVec3::ZERO, DVec3::ONE, n),
        }
    }

    pub fn with_fill(mut self, fill: BlockFill) -> Self {
        self.spec = self.spec.with_fill(fill);
        self
    }
}

impl CaseSetup for Cavity {
    fn name(&self) -> &str {
        "cavity"
    }

    fn build_mesh(&self) -> Result<Mesh> {
        create_box_mesh(&self.spec)
    }

    fn boundary_specification(&self) -> BoundarySpecification {
        let t = Field::temperature();
        let mut spec = BoundarySpecification::default()
            .with(BCRule::new(t.clone(), "UP", PhysicalBc::Wall, GeneralizedBC::dirichlet(T_UP)))
            .with(BCRule::new(t.clone(), "DOWN", PhysicalBc::Wall, GeneralizedBC::dirichlet(T_DOWN)));
        for side in ["LEFT", "RIGHT", "FRONT", "BACK"] {
            spec.add(BCRule::new(t.clone(), side, PhysicalBc::Wall, GeneralizedBC::neumann(0.0)));
        }
        spec
    }

    fn initial_value(&self) -> f64 {
        T0
    }
}
