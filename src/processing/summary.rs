use crate::config::DiscretizationConfig;
use crate::discretization::mesh::Mesh;
use crate::numerics::pipeline::SetupReport;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub struct SetupSummary {
    pub case_name: String,

    // Mesh info
    pub num_cells: usize,
    pub num_faces: usize,
    pub num_boundary_faces: usize,
    pub num_nodes: usize,
    pub num_patches: usize,
    pub bounding_box: ([f64; 3], [f64; 3]),
    pub min_cell_spacing: f64,
    pub max_cell_spacing: f64,
    pub avg_cell_volume: f64,
    pub total_volume: f64,

    // Configuration
    pub decomposition: String,
    pub nodal_scheme: String,
    pub face_scheme: String,

    // Tolerances
    pub min_distance_tol: f64,
    pub min_alignment_tol: f64,
    pub rank_tol: f64,

    // Quality
    pub max_skew_angle: f64,
    pub mean_skew_angle: f64,
    pub worst_face: Option<usize>,

    // Operators
    pub fields: Vec<String>,
    pub operators_assigned: usize,
    pub operators_factorized: usize,

    // Gradient info
    pub max_gradient: Option<f64>,
    pub mean_gradient: Option<f64>,
}

impl SetupSummary {
    pub fn from_setup(
        case_name: &str,
        mesh: &Mesh,
        config: &DiscretizationConfig,
        report: &SetupReport,
    ) -> Self {
        let num_cells = mesh.cells.len();

        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for node in &mesh.nodes {
            for k in 0..3 {
                lo[k] = lo[k].min(node.coordinate[k]);
                hi[k] = hi[k].max(node.coordinate[k]);
            }
        }

        let spacings: Vec<f64> = mesh
            .faces
            .iter()
            .filter_map(|f| match f.cells {
                [Some(k), Some(l)] => Some((mesh.cell(k).centroid - mesh.cell(l).centroid).norm()),
                _ => None,
            })
            .collect();
        let min_spacing = spacings.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_spacing = spacings.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let total_volume: f64 = mesh.cells.iter().map(|c| c.volume).sum();

        Self {
            case_name: case_name.to_string(),
            num_cells,
            num_faces: mesh.faces.len(),
            num_boundary_faces: mesh.boundary_faces().count(),
            num_nodes: mesh.nodes.len(),
            num_patches: mesh.patches.len(),
            bounding_box: (lo, hi),
            min_cell_spacing: min_spacing,
            max_cell_spacing: max_spacing,
            avg_cell_volume: total_volume / num_cells.max(1) as f64,
            total_volume,
            decomposition: format!("{:?}", config.decomposition),
            nodal_scheme: format!("{:?}", config.nodal_scheme),
            face_scheme: format!("{:?}", config.face_scheme),
            min_distance_tol: config.tolerances.min_distance,
            min_alignment_tol: config.tolerances.min_alignment,
            rank_tol: config.tolerances.rank_tolerance,
            max_skew_angle: report.skewness.max_angle,
            mean_skew_angle: report.skewness.mean_angle,
            worst_face: report.skewness.worst_face,
            fields: report.fields.iter().map(|f| f.to_string()).collect(),
            operators_assigned: report.operators.assigned,
            operators_factorized: report.operators.factorized,
            max_gradient: None,
            mean_gradient: None,
        }
    }

    /// Records the magnitude of the cell gradients currently stored on `mesh`.
    pub fn add_gradient_info(&mut self, mesh: &Mesh) {
        if mesh.cells.is_empty() {
            return;
        }
        let norms: Vec<f64> = mesh.cells.iter().map(|c| c.grad.norm()).collect();
        self.max_gradient = Some(norms.iter().cloned().fold(0.0, f64::max));
        self.mean_gradient = Some(norms.iter().sum::<f64>() / norms.len() as f64);
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        self.write_report(&mut file)
    }

    fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out, "DISCRETIZATION SETUP SUMMARY: {}", self.case_name.to_uppercase())?;
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out)?;

        writeln!(out, "MESH STATISTICS")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Number of cells:     {}", self.num_cells)?;
        writeln!(
            out,
            "Number of faces:     {} ({} boundary)",
            self.num_faces, self.num_boundary_faces
        )?;
        writeln!(out, "Number of nodes:     {}", self.num_nodes)?;
        writeln!(out, "Number of patches:   {}", self.num_patches)?;
        let (lo, hi) = self.bounding_box;
        writeln!(
            out,
            "Bounding box:        ({:.4}, {:.4}, {:.4}) to ({:.4}, {:.4}, {:.4})",
            lo[0], lo[1], lo[2], hi[0], hi[1], hi[2]
        )?;
        writeln!(out, "Min cell spacing:    {:.6e}", self.min_cell_spacing)?;
        writeln!(out, "Max cell spacing:    {:.6e}", self.max_cell_spacing)?;
        writeln!(out, "Avg cell volume:     {:.6e}", self.avg_cell_volume)?;
        writeln!(out, "Total volume:        {:.6e}", self.total_volume)?;
        writeln!(out)?;

        writeln!(out, "DISCRETIZATION")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Decomposition:       {}", self.decomposition)?;
        writeln!(out, "Nodal weighting:     {}", self.nodal_scheme)?;
        writeln!(out, "Face weighting:      {}", self.face_scheme)?;
        writeln!(out)?;

        writeln!(out, "NUMERICAL TOLERANCES")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Min distance:        {:.6e}", self.min_distance_tol)?;
        if self.min_cell_spacing.is_finite() {
            writeln!(
                out,
                "  = {:.6e} × min_cell_spacing",
                self.min_distance_tol / self.min_cell_spacing
            )?;
        }
        writeln!(out, "Min alignment:       {:.6e}", self.min_alignment_tol)?;
        writeln!(out, "Rank tolerance:      {:.6e}", self.rank_tol)?;
        writeln!(out)?;

        writeln!(out, "MESH QUALITY")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Max non-orthogonality: {:.3} deg", self.max_skew_angle)?;
        writeln!(out, "Mean non-orthogonality: {:.3} deg", self.mean_skew_angle)?;
        if let Some(face) = self.worst_face {
            writeln!(out, "Worst face:          {}", face)?;
        }
        writeln!(out)?;

        writeln!(out, "LEAST-SQUARES OPERATORS")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Fields:              {}", self.fields.join(", "))?;
        writeln!(out, "Operators assigned:  {}", self.operators_assigned)?;
        writeln!(out, "Factorizations:      {}", self.operators_factorized)?;
        writeln!(out)?;

        if let (Some(max), Some(mean)) = (self.max_gradient, self.mean_gradient) {
            writeln!(out, "RECONSTRUCTED GRADIENTS")?;
            writeln!(out, "{}", "-".repeat(60))?;
            writeln!(out, "Max |grad|:          {:.6e}", max)?;
            writeln!(out, "Mean |grad|:         {:.6e}", mean)?;
            writeln!(out)?;
        }

        writeln!(out, "{}", "=".repeat(60))?;
        Ok(())
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("{:^60}", "SETUP SUMMARY");
        println!("{}", "=".repeat(60));
        println!("Case:                {}", self.case_name);
        println!(
            "Mesh:                {} cells, {} faces, {} nodes",
            self.num_cells, self.num_faces, self.num_nodes
        );
        println!(
            "Cell spacing:        {:.3e} to {:.3e}",
            self.min_cell_spacing, self.max_cell_spacing
        );
        println!("Decomposition:       {}", self.decomposition);
        println!(
            "Skewness:            max {:.2} deg, mean {:.2} deg",
            self.max_skew_angle, self.mean_skew_angle
        );
        println!(
            "Operators:           {} assigned, {} factorized",
            self.operators_assigned, self.operators_factorized
        );
        if let Some(max) = self.max_gradient {
            println!("Max |grad|:          {:.6e}", max);
        }
        println!("{}\n", "=".repeat(60));
    }
}
