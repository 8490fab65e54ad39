use std::time::Instant;

use log::info;

use crate::config::DiscretizationConfig;
use crate::discretization::geometry::calculate_geometric_values;
use crate::discretization::mesh::Mesh;
use crate::discretization::quality::SkewnessReport;
use crate::error::Result;
use crate::numerics::interpolation::interpolate_nodal_values;
use crate::numerics::least_squares::{OperatorStats, build_gradient_operators};
use crate::numerics::timing::{TimingStats, finalize_timing, record_phase, reset_timing};
use crate::physics::CaseSetup;
use crate::physics::bc::{BoundarySpecification, Field};

/// What the setup phases produced.
#[derive(Clone, Debug)]
pub struct SetupReport {
    /// Nodes, faces, cells.
    pub counts: [usize; 3],
    pub patches: usize,
    pub fields: Vec<Field>,
    pub skewness: SkewnessReport,
    pub operators: OperatorStats,
    pub timing: TimingStats,
}

/// Runs every setup phase on an assembled mesh, in order: validation,
/// geometric coefficients, skewness check, boundary types, least-squares
/// operators, boundary values. Stops at the first failing phase.
pub fn setup_discretization(
    mesh: &mut Mesh,
    bcs: &BoundarySpecification,
    fields: &[Field],
    config: &DiscretizationConfig,
) -> Result<SetupReport> {
    let start = Instant::now();
    reset_timing();

    config.validate()?;
    mesh.validate()?;
    let [nn, nf, nc] = mesh.counts();
    info!(
        "mesh: {} nodes, {} faces, {} cells, {} patches",
        nn,
        nf,
        nc,
        mesh.patches.len()
    );

    calculate_geometric_values(mesh, config)?;

    let skewness = record_phase("skewness", || {
        SkewnessReport::from_mesh(mesh, config.skewness_bins, false)
    });
    skewness.log();

    record_phase("boundary types", || bcs.assign_types(mesh, fields))?;
    let operators = record_phase("gradient operators", || {
        build_gradient_operators(mesh, fields, config)
    })?;
    record_phase("boundary values", || {
        fields.iter().try_for_each(|field| bcs.apply_values(mesh, field))
    })?;

    let timing = finalize_timing(start.elapsed());
    info!("setup finished in {:.3}s", start.elapsed().as_secs_f64());

    Ok(SetupReport {
        counts: mesh.counts(),
        patches: mesh.patches.len(),
        fields: fields.to_vec(),
        skewness,
        operators,
        timing,
    })
}

/// Builds the mesh of `case`, runs the setup and applies the initial
/// condition, leaving nodal values interpolated from the cells.
pub fn prepare_case<C: CaseSetup + ?Sized>(
    case: &C,
    config: &DiscretizationConfig,
) -> Result<(Mesh, SetupReport)> {
    info!("preparing case \"{}\"", case.name());
    let mut mesh = case.build_mesh()?;
    let fields = case.fields();
    let bcs = case.boundary_specification();
    let report = setup_discretization(&mut mesh, &bcs, &fields, config)?;

    case.initial_condition(&mut mesh);
    interpolate_nodal_values(&mut mesh, config);
    Ok((mesh, report))
}
