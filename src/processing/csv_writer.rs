use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::discretization::mesh::{Cell, Mesh, Node};

/// Write column data to a CSV file with headers
pub fn write_csv<P: AsRef<Path>>(path: P, headers: &[&str], data: &[Vec<f64>]) -> io::Result<()> {
    if !headers.is_empty() && !data.is_empty() && headers.len() != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                data.len()
            ),
        ));
    }

    let mut file = BufWriter::new(File::create(path)?);

    writeln!(file, "{}", headers.join(","))?;

    let n_rows = data.iter().map(|col| col.len()).max().unwrap_or(0);

    for i in 0..n_rows {
        let row: Vec<String> = data
            .iter()
            .map(|col| col.get(i).map_or_else(String::new, |v| format!("{:.15e}", v)))
            .collect();
        writeln!(file, "{}", row.join(","))?;
    }

    file.flush()
}

/// Node coordinates and interpolated nodal values, one row per node.
pub fn write_nodal_field<P: AsRef<Path>>(path: P, mesh: &Mesh, name: &str) -> io::Result<()> {
    let column = |f: fn(&Node) -> f64| -> Vec<f64> { mesh.nodes.iter().map(f).collect() };
    write_csv(
        path,
        &["x", "y", "z", name],
        &[
            column(|n| n.coordinate.x),
            column(|n| n.coordinate.y),
            column(|n| n.coordinate.z),
            column(|n| n.value),
        ],
    )
}

/// Cell centroids, values and reconstructed gradients, one row per cell.
pub fn write_cell_field<P: AsRef<Path>>(path: P, mesh: &Mesh, name: &str) -> io::Result<()> {
    let column = |f: fn(&Cell) -> f64| -> Vec<f64> { mesh.cells.iter().map(f).collect() };
    let gx = format!("d{name}/dx");
    let gy = format!("d{name}/dy");
    let gz = format!("d{name}/dz");
    write_csv(
        path,
        &["x", "y", "z", name, &gx, &gy, &gz],
        &[
            column(|c| c.centroid.x),
            column(|c| c.centroid.y),
            column(|c| c.centroid.z),
            column(|c| c.value),
            column(|c| c.grad.x),
            column(|c| c.grad.y),
            column(|c| c.grad.z),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_hex_box;
    use std::fs;

    #[test]
    fn test_write_csv() {
        let path = std::env::temp_dir().join("ufvm_test_output.csv");
        let headers = &["x", "y", "z"];
        let data = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];

        write_csv(&path, headers, &data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("x,y,z"));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn mismatched_headers_are_rejected() {
        let path = std::env::temp_dir().join("ufvm_never_written.csv");
        let err = write_csv(&path, &["a"], &[vec![1.0], vec![2.0]]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn nodal_field_has_one_row_per_node() {
        let mesh = create_hex_box([0.0; 3], [1.0; 3], [1, 1, 1]).unwrap();
        let path = std::env::temp_dir().join(format!("ufvm_nodal_{}.csv", std::process::id()));
        write_nodal_field(&path, &mesh, "T").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("x,y,z,T"));
        assert_eq!(lines.count(), 8);
    }
}
