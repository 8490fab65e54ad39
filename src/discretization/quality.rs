use log::{info, warn};

use super::mesh::Mesh;

/// Angle above which a face is reported as highly non-orthogonal.
const SKEWED_WARNING_DEG: f64 = 70.0;

/// Histogram of face non-orthogonality angles, i.e. the angle between the
/// displacement across a face and the face normal.
#[derive(Clone, Debug, PartialEq)]
pub struct SkewnessReport {
    /// Face counts over equal-width bins covering `0..=90` degrees.
    pub bins: Vec<usize>,
    pub max_angle: f64,
    pub mean_angle: f64,
    /// 1-based index of the worst face, if any.
    pub worst_face: Option<usize>,
    pub internal_only: bool,
}

impl SkewnessReport {
    /// Builds the report from the skewness already stored on each face.
    pub fn from_mesh(mesh: &Mesh, bins: usize, internal_only: bool) -> Self {
        let bins = bins.max(1);
        let width = 90.0 / bins as f64;
        let mut report = Self {
            bins: vec![0; bins],
            max_angle: 0.0,
            mean_angle: 0.0,
            worst_face: None,
            internal_only,
        };

        let mut sum = 0.0;
        let mut count = 0usize;
        for face in mesh
            .faces
            .iter()
            .filter(|f| !(internal_only && f.at_boundary()))
        {
            let angle = face.skewness.clamp(-1.0, 1.0).acos().to_degrees();
            let k = ((angle / width) as usize).min(bins - 1);
            report.bins[k] += 1;
            sum += angle;
            count += 1;
            if report.worst_face.is_none() || angle > report.max_angle {
                report.max_angle = angle;
                report.worst_face = Some(face.index);
            }
        }
        if count > 0 {
            report.mean_angle = sum / count as f64;
        }
        report
    }

    pub fn face_count(&self) -> usize {
        self.bins.iter().sum()
    }

    /// `(lower, upper)` angle of bin `k` in degrees.
    pub fn bin_range(&self, k: usize) -> (f64, f64) {
        let width = 90.0 / self.bins.len() as f64;
        (k as f64 * width, (k + 1) as f64 * width)
    }

    pub fn log(&self) {
        info!(
            "skewness over {} faces: max {:.2} deg (face {}), mean {:.2} deg",
            self.face_count(),
            self.max_angle,
            self.worst_face.map_or_else(|| "-".to_string(), |f| f.to_string()),
            self.mean_angle
        );
        for (k, n) in self.bins.iter().enumerate().filter(|(_, n)| **n > 0) {
            let (lo, hi) = self.bin_range(k);
            info!("  {:>5.1} - {:>5.1} deg: {}", lo, hi, n);
        }
        if self.max_angle > SKEWED_WARNING_DEG {
            warn!(
                "highly skewed face {:?} ({:.1} deg), expect large non-orthogonal corrections",
                self.worst_face, self.max_angle
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscretizationConfig;
    use crate::discretization::generator::{BoxSpec, create_box_mesh, create_hex_box, shear_xy};
    use crate::discretization::geometry::calculate_geometric_values;
    use glam::DVec3;

    #[test]
    fn orthogonal_box_lands_in_first_bin() {
        let mut mesh = create_hex_box([0.0; 3], [1.0; 3], [2, 2, 2]).unwrap();
        calculate_geometric_values(&mut mesh, &DiscretizationConfig::default()).unwrap();
        let report = SkewnessReport::from_mesh(&mesh, 9, false);
        assert_eq!(report.face_count(), mesh.faces.len());
        assert_eq!(report.bins[0], mesh.faces.len());
        assert!(report.max_angle < 1e-6);
    }

    #[test]
    fn sheared_box_reports_nonzero_angle() {
        let spec = BoxSpec::new(DVec3::ZERO, DVec3::ONE, [3, 3, 1]).with_transform(shear_xy(0.5));
        let mut mesh = create_box_mesh(&spec).unwrap();
        calculate_geometric_values(&mut mesh, &DiscretizationConfig::default()).unwrap();
        let report = SkewnessReport::from_mesh(&mesh, 9, true);
        assert_eq!(report.face_count(), mesh.internal_faces().count());
        assert!(report.max_angle > 10.0);
        assert!(report.worst_face.is_some());
    }
}
