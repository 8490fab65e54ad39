pub mod bc;

use crate::discretization::mesh::Mesh;
use crate::error::Result;
use bc::{BoundarySpecification, Field};

/// Defines the contract for a simulation case: its mesh, the fields it
/// transports, their boundary conditions and the initial state.
pub trait CaseSetup {
    fn name(&self) -> &str;

    /// Builds (or loads) the computational mesh.
    fn build_mesh(&self) -> Result<Mesh>;

    /// Transported fields. Default: temperature only.
    fn fields(&self) -> Vec<Field> {
        vec![Field::temperature()]
    }

    /// Boundary conditions for every patch and every field.
    fn boundary_specification(&self) -> BoundarySpecification;

    /// Uniform starting value of cells and internal faces.
    fn initial_value(&self) -> f64;

    /// Applies the initial condition. Boundary faces keep the values the
    /// boundary conditions gave them.
    fn initial_condition(&self, mesh: &mut Mesh) {
        let v0 = self.initial_value();
        mesh.cells.iter_mut().for_each(|c| c.value = v0);
        mesh.faces
            .iter_mut()
            .filter(|f| !f.at_boundary())
            .for_each(|f| f.value = v0);
    }
}
