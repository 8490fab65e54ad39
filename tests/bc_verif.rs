use approx::assert_relative_eq;
use glam::DVec3;

use ufvm_rs::config::DiscretizationConfig;
use ufvm_rs::discretization::generator::{BoxSpec, create_box_mesh, create_hex_box};
use ufvm_rs::discretization::mesh::{Face, FaceKind, Mesh};
use ufvm_rs::error::FvmError;
use ufvm_rs::models::Cavity;
use ufvm_rs::numerics::least_squares::reconstruct_gradients;
use ufvm_rs::numerics::pipeline::setup_discretization;
use ufvm_rs::physics::CaseSetup;
use ufvm_rs::physics::bc::{
    BCRule, BoundarySelector, BoundarySpecification, Field, GeneralizedBC, MathBc, Normal, PhysicalBc,
    Point,
};

fn unit_box(n: usize) -> Mesh {
    create_hex_box([0.0; 3], [1.0; 3], [n, n, n]).expect("mesh")
}

fn catch_all(field: &str, bc: GeneralizedBC) -> BCRule {
    BCRule {
        field: Field::from(field),
        on: BoundarySelector::All,
        physical: PhysicalBc::Wall,
        bc,
    }
}

fn patch_faces<'a>(mesh: &'a Mesh, name: &str) -> impl Iterator<Item = &'a Face> {
    let id = mesh.patch_by_name(name).expect("patch");
    mesh.patch(id).faces.iter().map(move |&f| mesh.face(f))
}

#[test]
fn cavity_values_land_in_the_right_slots() {
    let case = Cavity::new([3, 3, 3]);
    let mut mesh = case.build_mesh().expect("mesh");
    let t = Field::temperature();
    setup_discretization(
        &mut mesh,
        &case.boundary_specification(),
        &case.fields(),
        &DiscretizationConfig::default(),
    )
    .expect("setup");

    for face in patch_faces(&mesh, "UP") {
        assert_eq!(face.value, 1500.0);
    }
    for face in patch_faces(&mesh, "DOWN") {
        assert_eq!(face.value, 300.0);
    }
    for face in patch_faces(&mesh, "LEFT") {
        assert!(matches!(face.kind, FaceKind::Boundary { sn_grad, .. } if sn_grad == 0.0));
    }

    let up = mesh.patch(mesh.patch_by_name("UP").expect("UP"));
    assert_eq!(up.condition(&t).expect("type"), MathBc::Dirichlet);
    assert_eq!(up.physical, Some(PhysicalBc::Wall));
    let left = mesh.patch(mesh.patch_by_name("LEFT").expect("LEFT"));
    assert_eq!(left.condition(&t).expect("type"), MathBc::Neumann);
}

#[test]
fn position_dependent_values_use_face_centroids() {
    let mut mesh = unit_box(2);
    let bcs = BoundarySpecification::default()
        .with(catch_all("T", GeneralizedBC::neumann(|_: Point, n: Normal| 2.0 * n.nx)))
        .with(BCRule::new(
            "T",
            "UP",
            PhysicalBc::Wall,
            GeneralizedBC::dirichlet(|p: Point, _: Normal| 10.0 * p.x),
        ));
    setup_discretization(&mut mesh, &bcs, &[Field::temperature()], &DiscretizationConfig::default())
        .expect("setup");

    for face in patch_faces(&mesh, "UP") {
        assert_relative_eq!(face.value, 10.0 * face.centroid.x, epsilon = 1e-14);
    }
    for face in patch_faces(&mesh, "RIGHT") {
        match face.kind {
            FaceKind::Boundary { sn_grad, .. } => assert_relative_eq!(sn_grad, 2.0, epsilon = 1e-14),
            _ => panic!("internal face on a patch"),
        }
    }
    for face in patch_faces(&mesh, "LEFT") {
        match face.kind {
            FaceKind::Boundary { sn_grad, .. } => assert_relative_eq!(sn_grad, -2.0, epsilon = 1e-14),
            _ => panic!("internal face on a patch"),
        }
    }
}

#[test]
fn robin_fails_and_leaves_no_operator() {
    let mut mesh = unit_box(2);
    let bcs = BoundarySpecification::default()
        .with(catch_all("T", GeneralizedBC::dirichlet(0.0)))
        .with(BCRule::new("T", "FRONT", PhysicalBc::Wall, GeneralizedBC::robin(5.0, 300.0)));

    let err = setup_discretization(&mut mesh, &bcs, &[Field::temperature()], &DiscretizationConfig::default())
        .unwrap_err();
    match err {
        FvmError::RobinNotSupported { field, .. } => assert_eq!(field, "T"),
        other => panic!("unexpected error {other}"),
    }
    assert!(mesh.cells.iter().all(|c| c.gradient_operators.is_empty()));
}

#[test]
fn robin_fails_in_parallel_too() {
    let mut mesh = unit_box(3);
    let bcs = BoundarySpecification::default()
        .with(catch_all("T", GeneralizedBC::neumann(0.0)))
        .with(BCRule::new("T", "BACK", PhysicalBc::Wall, GeneralizedBC::robin(1.0, 1.0)));
    let err = setup_discretization(&mut mesh, &bcs, &[Field::temperature()], &DiscretizationConfig::parallel())
        .unwrap_err();
    assert!(matches!(err, FvmError::RobinNotSupported { .. }));
    assert!(mesh.cells.iter().all(|c| c.gradient_operators.is_empty()));
}

#[test]
fn uncovered_patch_is_unexpected() {
    let mut mesh = unit_box(1);
    let mut bcs = BoundarySpecification::default();
    for side in ["LEFT", "RIGHT", "UP", "DOWN", "BACK"] {
        bcs.add(BCRule::new("T", side, PhysicalBc::Wall, GeneralizedBC::neumann(0.0)));
    }
    let err = setup_discretization(&mut mesh, &bcs, &[Field::temperature()], &DiscretizationConfig::default())
        .unwrap_err();
    assert!(matches!(err, FvmError::UnexpectedPatch(name) if name == "FRONT"));
}

#[test]
fn field_without_rule_is_reported() {
    let mut mesh = unit_box(1);
    let bcs = BoundarySpecification::default().with(catch_all("T", GeneralizedBC::dirichlet(1.0)));
    let fields = [Field::temperature(), Field::from("p")];
    let err = setup_discretization(&mut mesh, &bcs, &fields, &DiscretizationConfig::default()).unwrap_err();
    assert!(matches!(err, FvmError::MissingBoundaryCondition { field, .. } if field == "p"));
}

#[test]
fn apply_values_rejects_unknown_patch() {
    let spec = BoxSpec::new(DVec3::ZERO, DVec3::ONE, [1, 1, 1]);
    let mut mesh = create_box_mesh(&spec).expect("mesh");
    let bcs = BoundarySpecification::default().with(BCRule::new(
        "T",
        "UP",
        PhysicalBc::Wall,
        GeneralizedBC::dirichlet(1.0),
    ));
    let err = bcs.apply_values(&mut mesh, &Field::temperature()).unwrap_err();
    assert!(matches!(err, FvmError::UnexpectedPatch(_)));
}

#[test]
fn failed_rebuild_drops_earlier_operators() {
    let mut mesh = unit_box(3);
    let t = Field::temperature();
    let config = DiscretizationConfig::default();
    let all_dirichlet = BoundarySpecification::default().with(catch_all("T", GeneralizedBC::dirichlet(1.0)));
    setup_discretization(&mut mesh, &all_dirichlet, std::slice::from_ref(&t), &config).expect("setup");
    assert!(mesh.cells.iter().all(|c| c.gradient_operator(&t).is_some()));

    let robin_back = BoundarySpecification::default()
        .with(catch_all("T", GeneralizedBC::neumann(0.0)))
        .with(BCRule::new("T", "BACK", PhysicalBc::Wall, GeneralizedBC::robin(1.0, 1.0)));
    let err = setup_discretization(&mut mesh, &robin_back, std::slice::from_ref(&t), &config).unwrap_err();
    assert!(matches!(err, FvmError::RobinNotSupported { .. }));
    assert!(mesh.cells.iter().all(|c| c.gradient_operator(&t).is_none()));

    let err = reconstruct_gradients(&mut mesh, &t, &config).unwrap_err();
    assert!(matches!(err, FvmError::MissingGradientOperator { .. }));
}
