use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::warn;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::discretization::mesh::{FaceKind, Mesh};
use crate::error::{FvmError, Result};

/// Field identifier stored as a runtime string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Field(pub Arc<str>);

impl Field {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The transported scalar (temperature).
    pub fn temperature() -> Self {
        Self::new("T")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::new(name)
    }
}

impl From<Arc<str>> for Field {
    fn from(name: Arc<str>) -> Self {
        Field(name)
    }
}

impl AsRef<str> for Field {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical classification of a boundary patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicalBc {
    Wall,
    Inlet,
    Outlet,
    Symmetry,
}

/// Mathematical specification of a boundary condition for one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MathBc {
    Dirichlet,
    Neumann,
    Robin,
}

/// Geometric point in space.
#[derive(Clone, Copy, Debug)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vector3<f64>> for Point {
    fn from(v: Vector3<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

/// Outward pointing unit normal.
#[derive(Clone, Copy, Debug)]
pub struct Normal {
    pub nx: f64,
    pub ny: f64,
    pub nz: f64,
}

impl From<Vector3<f64>> for Normal {
    fn from(v: Vector3<f64>) -> Self {
        Self {
            nx: v.x,
            ny: v.y,
            nz: v.z,
        }
    }
}

/// Shared function type for BC coefficients that may depend on position and normal.
pub type SFn = Arc<dyn Fn(Point, Normal) -> f64 + Send + Sync>;

/// Local trait allowing convenient conversion into [`SFn`].
pub trait IntoSFn {
    fn into_sfn(self) -> SFn;
}

/// `alpha * u + beta * du/dn = gamma`, tagged with its mathematical type.
#[derive(Clone)]
pub struct GeneralizedBC {
    pub math: MathBc,
    pub alpha: SFn,
    pub beta: SFn,
    pub gamma: SFn,
}

impl GeneralizedBC {
    pub fn dirichlet(g: impl IntoSFn) -> Self {
        Self {
            math: MathBc::Dirichlet,
            alpha: c(1.0),
            beta: c(0.0),
            gamma: g.into_sfn(),
        }
    }

    pub fn neumann(q: impl IntoSFn) -> Self {
        Self {
            math: MathBc::Neumann,
            alpha: c(0.0),
            beta: c(1.0),
            gamma: q.into_sfn(),
        }
    }

    pub fn robin(k: impl IntoSFn, g: impl IntoSFn) -> Self {
        let kf = k.into_sfn();
        let gf = g.into_sfn();
        Self {
            math: MathBc::Robin,
            alpha: kf.clone(),
            beta: c(1.0),
            gamma: Arc::new(move |x, n| kf(x, n) * gf(x, n)),
        }
    }
}

fn c(val: f64) -> SFn {
    Arc::new(move |_, _| val)
}

impl IntoSFn for f64 {
    fn into_sfn(self) -> SFn {
        c(self)
    }
}

impl<F> IntoSFn for F
where
    F: Fn(Point, Normal) -> f64 + Send + Sync + 'static,
{
    fn into_sfn(self) -> SFn {
        Arc::new(self)
    }
}

#[derive(Clone, Debug)]
pub enum BoundarySelector {
    Label(String),
    /// Every patch not matched by a more specific rule.
    All,
}

impl BoundarySelector {
    fn matches(&self, label: &str) -> bool {
        match self {
            BoundarySelector::Label(l) => l == label,
            BoundarySelector::All => true,
        }
    }
}

#[derive(Clone)]
pub struct BCRule {
    pub field: Field,
    pub on: BoundarySelector,
    pub physical: PhysicalBc,
    pub bc: GeneralizedBC,
}

impl BCRule {
    pub fn new(
        field: impl Into<Field>,
        patch: impl Into<String>,
        physical: PhysicalBc,
        bc: GeneralizedBC,
    ) -> Self {
        Self {
            field: field.into(),
            on: BoundarySelector::Label(patch.into()),
            physical,
            bc,
        }
    }
}

/// Per-patch boundary-condition assignment for every transported field.
/// Later rules take precedence over earlier ones.
#[derive(Clone, Default)]
pub struct BoundarySpecification {
    rules: Vec<BCRule>,
}

impl BoundarySpecification {
    pub fn add(&mut self, rule: BCRule) {
        self.rules.push(rule);
    }

    pub fn with(mut self, rule: BCRule) -> Self {
        self.add(rule);
        self
    }

    pub fn find_for<'a>(&'a self, field: impl AsRef<str>, label: &str) -> Option<&'a BCRule> {
        self.rules
            .iter()
            .rev()
            .find(|r| r.field.as_str() == field.as_ref() && r.on.matches(label))
    }

    fn covers_patch(&self, label: &str) -> bool {
        self.rules.iter().any(|r| r.on.matches(label))
    }

    /// Resolves the physical and mathematical classification of every patch
    /// for `fields`. Must run before any least-squares operator is built.
    /// Patches are only updated once every one of them resolved.
    pub fn assign_types(&self, mesh: &mut Mesh, fields: &[Field]) -> Result<()> {
        for rule in &self.rules {
            if let BoundarySelector::Label(l) = &rule.on {
                if mesh.patch_by_name(l).is_none() {
                    warn!("boundary rule for {} names unknown patch \"{}\"", rule.field, l);
                }
            }
        }

        let mut resolved = Vec::with_capacity(mesh.patches.len());
        for patch in &mesh.patches {
            if !self.covers_patch(&patch.name) {
                return Err(FvmError::UnexpectedPatch(patch.name.clone()));
            }
            let mut physical: Option<PhysicalBc> = None;
            let mut conditions = BTreeMap::new();
            for field in fields {
                let rule = self.find_for(field, &patch.name).ok_or_else(|| {
                    FvmError::MissingBoundaryCondition {
                        patch: patch.name.clone(),
                        field: field.to_string(),
                    }
                })?;
                match physical {
                    None => physical = Some(rule.physical),
                    Some(first) if first != rule.physical => warn!(
                        "patch \"{}\": field {} is {:?}, keeping {:?} from an earlier field",
                        patch.name, field, rule.physical, first
                    ),
                    Some(_) => {}
                }
                conditions.insert(field.clone(), rule.bc.math);
            }
            resolved.push((physical, conditions));
        }

        for (patch, (physical, conditions)) in mesh.patches.iter_mut().zip(resolved) {
            patch.physical = physical;
            patch.conditions = conditions;
        }
        Ok(())
    }

    /// Writes boundary values of `field` into the face slots: the face value
    /// for Dirichlet patches, the outward normal gradient for Neumann ones.
    pub fn apply_values(&self, mesh: &mut Mesh, field: &Field) -> Result<()> {
        let Mesh { faces, patches, .. } = mesh;
        for patch in patches.iter() {
            let rule = self.find_for(field, &patch.name).ok_or_else(|| {
                if self.covers_patch(&patch.name) {
                    FvmError::MissingBoundaryCondition {
                        patch: patch.name.clone(),
                        field: field.to_string(),
                    }
                } else {
                    FvmError::UnexpectedPatch(patch.name.clone())
                }
            })?;

            for &fid in &patch.faces {
                let face = &mut faces[fid.0];
                let side = face
                    .populated_side()
                    .ok_or(FvmError::EmptyConnectivity(face.index))?;
                let p = Point::from(face.centroid);
                let n = Normal::from(face.normals[side]);
                let gamma = (rule.bc.gamma)(p, n);
                match (rule.bc.math, &mut face.kind) {
                    (MathBc::Dirichlet, FaceKind::Boundary { .. }) => {
                        face.value = gamma / (rule.bc.alpha)(p, n);
                    }
                    (MathBc::Neumann, FaceKind::Boundary { sn_grad, .. }) => {
                        *sn_grad = gamma / (rule.bc.beta)(p, n);
                    }
                    (MathBc::Robin, FaceKind::Boundary { .. }) => {
                        let cell = face.cells[side].map_or(0, |c| c.one_based());
                        return Err(FvmError::RobinNotSupported {
                            cell,
                            field: field.to_string(),
                        });
                    }
                    (_, FaceKind::Internal { .. }) => {
                        return Err(FvmError::NotABoundaryFace(face.index));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_bc_by_field_and_label() {
        let mut reg = BoundarySpecification::default();
        reg.add(BCRule::new(
            "T",
            "LEFT",
            PhysicalBc::Inlet,
            GeneralizedBC::dirichlet(1.0),
        ));
        reg.add(BCRule::new(
            "p",
            "LEFT",
            PhysicalBc::Inlet,
            GeneralizedBC::neumann(0.0),
        ));

        let rule = reg.find_for("T", "LEFT").expect("rule not found");
        assert_eq!(rule.field.as_str(), "T");
        assert_eq!(rule.bc.math, MathBc::Dirichlet);
        assert_eq!(reg.find_for("p", "LEFT").unwrap().bc.math, MathBc::Neumann);
        assert!(reg.find_for("T", "RIGHT").is_none());
    }

    #[test]
    fn later_rules_override_catch_all() {
        let reg = BoundarySpecification::default()
            .with(BCRule {
                field: Field::temperature(),
                on: BoundarySelector::All,
                physical: PhysicalBc::Wall,
                bc: GeneralizedBC::neumann(0.0),
            })
            .with(BCRule::new(
                "T",
                "UP",
                PhysicalBc::Wall,
                GeneralizedBC::dirichlet(1500.0),
            ));

        assert_eq!(reg.find_for("T", "UP").unwrap().bc.math, MathBc::Dirichlet);
        assert_eq!(reg.find_for("T", "BACK").unwrap().bc.math, MathBc::Neumann);
    }

    #[test]
    fn robin_combines_coefficients() {
        let bc = GeneralizedBC::robin(2.0, 3.0);
        let p = Point {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        let n = Normal {
            nx: 1.0,
            ny: 0.0,
            nz: 0.0,
        };
        assert_eq!(bc.math, MathBc::Robin);
        assert_eq!((bc.gamma)(p, n), 6.0);
        assert_eq!((bc.alpha)(p, n), 2.0);
    }

    #[test]
    fn failed_assignment_keeps_previous_types() {
        use crate::discretization::generator::create_hex_box;

        let mut mesh = create_hex_box([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap();
        let t = Field::temperature();
        let all_dirichlet = BoundarySpecification::default().with(BCRule {
            field: t.clone(),
            on: BoundarySelector::All,
            physical: PhysicalBc::Wall,
            bc: GeneralizedBC::dirichlet(1.0),
        });
        all_dirichlet.assign_types(&mut mesh, &[t.clone()]).unwrap();

        let mut partial = BoundarySpecification::default();
        for side in ["LEFT", "RIGHT", "UP", "DOWN", "BACK"] {
            partial.add(BCRule::new("T", side, PhysicalBc::Outlet, GeneralizedBC::neumann(0.0)));
        }
        let err = partial.assign_types(&mut mesh, &[t.clone()]).unwrap_err();
        assert!(matches!(err, FvmError::UnexpectedPatch(name) if name == "FRONT"));
        for patch in &mesh.patches {
            assert_eq!(patch.condition(&t).unwrap(), MathBc::Dirichlet);
            assert_eq!(patch.physical, Some(PhysicalBc::Wall));
        }
    }

    #[test]
    fn first_field_decides_the_physical_type() {
        use crate::discretization::generator::create_hex_box;

        let mut mesh = create_hex_box([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap();
        let bcs = BoundarySpecification::default()
            .with(BCRule {
                field: Field::temperature(),
                on: BoundarySelector::All,
                physical: PhysicalBc::Inlet,
                bc: GeneralizedBC::dirichlet(1.0),
            })
            .with(BCRule {
                field: Field::from("p"),
                on: BoundarySelector::All,
                physical: PhysicalBc::Outlet,
                bc: GeneralizedBC::neumann(0.0),
            });
        bcs.assign_types(&mut mesh, &[Field::temperature(), Field::from("p")])
            .unwrap();
        assert!(mesh.patches.iter().all(|p| p.physical == Some(PhysicalBc::Inlet)));
    }
}
