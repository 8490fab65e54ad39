use approx::assert_relative_eq;
use glam::DVec3;
use nalgebra::Vector3;

use ufvm_rs::config::DiscretizationConfig;
use ufvm_rs::discretization::assembly::{RawCell, assemble};
use ufvm_rs::discretization::generator::{BlockFill, BoxSpec, create_box_mesh, shear_xy};
use ufvm_rs::discretization::mesh::{CellShape, Mesh};
use ufvm_rs::error::FvmError;
use ufvm_rs::models::Cavity;
use ufvm_rs::numerics::least_squares::reconstruct_gradients;
use ufvm_rs::numerics::pipeline::setup_discretization;
use ufvm_rs::physics::CaseSetup;
use ufvm_rs::physics::bc::{
    BCRule, BoundarySelector, BoundarySpecification, Field, GeneralizedBC, Normal, PhysicalBc, Point,
};

// T = 3 + 1.5 x - 2 y + 0.75 z
const B: [f64; 3] = [1.5, -2.0, 0.75];

fn exact(x: f64, y: f64, z: f64) -> f64 {
    3.0 + B[0] * x + B[1] * y + B[2] * z
}

fn gradient() -> Vector3<f64> {
    Vector3::from(B)
}

fn dirichlet_everywhere() -> BoundarySpecification {
    BoundarySpecification::default().with(BCRule {
        field: Field::temperature(),
        on: BoundarySelector::All,
        physical: PhysicalBc::Wall,
        bc: GeneralizedBC::dirichlet(|p: Point, _: Normal| exact(p.x, p.y, p.z)),
    })
}

/// Dirichlet on the sides, prescribed normal gradient on UP and DOWN.
fn with_neumann_lids() -> BoundarySpecification {
    let flux = |_: Point, n: Normal| B[0] * n.nx + B[1] * n.ny + B[2] * n.nz;
    dirichlet_everywhere()
        .with(BCRule::new("T", "UP", PhysicalBc::Wall, GeneralizedBC::neumann(flux)))
        .with(BCRule::new("T", "DOWN", PhysicalBc::Wall, GeneralizedBC::neumann(flux)))
}

fn assert_linear_gradient_is_exact(name: &str, mesh: &mut Mesh, bcs: &BoundarySpecification) {
    let config = DiscretizationConfig::default();
    let t = Field::temperature();
    setup_discretization(mesh, bcs, std::slice::from_ref(&t), &config)
        .unwrap_or_else(|e| panic!("{name}: setup failed: {e}"));
    for cell in &mut mesh.cells {
        cell.value = exact(cell.centroid.x, cell.centroid.y, cell.centroid.z);
    }
    reconstruct_gradients(mesh, &t, &config).unwrap_or_else(|e| panic!("{name}: {e}"));
    for cell in &mesh.cells {
        assert_relative_eq!(cell.grad, gradient(), epsilon = 1e-9);
    }
}

fn box_mesh(fill: BlockFill, sheared: bool) -> Mesh {
    let mut spec = BoxSpec::new(DVec3::new(-1.0, 0.0, 0.5), DVec3::new(2.0, 1.5, 1.0), [4, 3, 3]).with_fill(fill);
    if sheared {
        spec = spec.with_transform(shear_xy(0.4));
    }
    create_box_mesh(&spec).expect("mesh")
}

/// Unit cube split into six pyramids meeting at its centre.
fn pyramid_cube() -> Mesh {
    let mut coords: Vec<Vector3<f64>> = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ]
    .iter()
    .map(|p| Vector3::from(*p))
    .collect();
    coords.push(Vector3::new(0.5, 0.5, 0.5));

    let cells: Vec<RawCell> = CellShape::Hexahedron
        .local_faces()
        .iter()
        .map(|base| {
            let mut v = base.to_vec();
            v.push(8);
            RawCell::new(CellShape::Pyramid, v)
        })
        .collect();
    assemble(&coords, &cells, |_| "WALL".to_string()).expect("mesh")
}

#[test]
fn exact_on_every_cell_shape() {
    for fill in [
        BlockFill::Hexahedra,
        BlockFill::Tetrahedra,
        BlockFill::Wedges,
        BlockFill::Mixed,
    ] {
        for sheared in [false, true] {
            let name = format!("{fill:?} sheared={sheared}");
            let mut mesh = box_mesh(fill, sheared);
            assert_linear_gradient_is_exact(&name, &mut mesh, &dirichlet_everywhere());
        }
    }
}

#[test]
fn exact_on_pyramids() {
    let mut mesh = pyramid_cube();
    assert_eq!(mesh.cells.len(), 6);
    let volume: f64 = mesh.cells.iter().map(|c| c.volume).sum();
    assert_relative_eq!(volume, 1.0, epsilon = 1e-12);
    assert_linear_gradient_is_exact("pyramids", &mut mesh, &dirichlet_everywhere());
}

#[test]
fn exact_with_normal_gradient_rows() {
    for fill in [BlockFill::Hexahedra, BlockFill::Tetrahedra, BlockFill::Mixed] {
        let mut mesh = box_mesh(fill, true);
        assert_linear_gradient_is_exact(&format!("{fill:?}"), &mut mesh, &with_neumann_lids());
    }
}

#[test]
fn fields_with_matching_conditions_share_operators() {
    let case = Cavity::new([3, 3, 3]);
    let mut mesh = case.build_mesh().expect("mesh");
    let t = Field::temperature();
    let p = Field::from("p");
    let bcs = case.boundary_specification().with(BCRule {
        field: p.clone(),
        on: BoundarySelector::All,
        physical: PhysicalBc::Wall,
        bc: GeneralizedBC::neumann(0.0),
    });

    let report = setup_discretization(&mut mesh, &bcs, &[t.clone(), p.clone()], &DiscretizationConfig::default())
        .expect("setup");

    // Only the middle layer in y touches neither UP nor DOWN, where T and p differ.
    assert_eq!(report.operators.assigned, 2 * 27);
    assert_eq!(report.operators.factorized, 2 * 27 - 9);

    let mut shared = 0;
    for cell in &mesh.cells {
        let a = cell.gradient_operator(&t).expect("T operator");
        let b = cell.gradient_operator(&p).expect("p operator");
        if std::sync::Arc::ptr_eq(a, b) {
            shared += 1;
            let y = cell.centroid.y;
            assert!(y > 1.0 / 3.0 && y < 2.0 / 3.0);
        }
    }
    assert_eq!(shared, 9);
}

#[test]
fn parallel_build_matches_sequential() {
    let bcs = with_neumann_lids();
    let t = Field::temperature();

    let mut seq = box_mesh(BlockFill::Mixed, true);
    setup_discretization(&mut seq, &bcs, std::slice::from_ref(&t), &DiscretizationConfig::sequential())
        .expect("sequential");
    let mut par = box_mesh(BlockFill::Mixed, true);
    setup_discretization(&mut par, &bcs, std::slice::from_ref(&t), &DiscretizationConfig::parallel())
        .expect("parallel");

    for (a, b) in seq.cells.iter().zip(&par.cells) {
        assert_eq!(a.d, b.d);
        assert_eq!(a.s_e, b.s_e);
        let (oa, ob) = (a.gradient_operator(&t).expect("op"), b.gradient_operator(&t).expect("op"));
        assert_eq!(**oa, **ob);
    }
    for (a, b) in seq.nodes.iter().zip(&par.nodes) {
        assert_eq!(a.weights, b.weights);
    }
}

#[test]
fn gradients_need_operators() {
    let mut mesh = box_mesh(BlockFill::Hexahedra, false);
    let err = reconstruct_gradients(&mut mesh, &Field::temperature(), &DiscretizationConfig::default())
        .unwrap_err();
    assert!(matches!(err, FvmError::MissingGradientOperator { cell: 1, .. }));
}
