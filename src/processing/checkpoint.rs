//! Text checkpoints of the scalar field.
//!
//! ```text
//! iter time
//! nNode nFace nCell
//! value            (one line per node, then per face, then per cell)
//! ```
//!
//! Floats are written in Rust's shortest round-trip form, so reading a
//! checkpoint back reproduces every value bit for bit.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::discretization::mesh::Mesh;
use crate::discretization::mesh_io::Tokens;
use crate::error::{FvmError, Result};

pub const DEFAULT_PREFIX: &str = "ITER";
pub const EXTENSION: &str = "dat";

pub fn write_data<W: Write>(mesh: &Mesh, out: &mut W, iter: usize, time: f64) -> Result<()> {
    writeln!(out, "{iter} {time}")?;
    let [nn, nf, nc] = mesh.counts();
    writeln!(out, "{nn} {nf} {nc}")?;
    for v in mesh.nodes.iter().map(|n| n.value) {
        writeln!(out, "{v}")?;
    }
    for v in mesh.faces.iter().map(|f| f.value) {
        writeln!(out, "{v}")?;
    }
    for v in mesh.cells.iter().map(|c| c.value) {
        writeln!(out, "{v}")?;
    }
    Ok(())
}

/// Reads a checkpoint into `mesh` and returns `(iter, time)`.
///
/// The mesh is only modified once the whole record parsed, and only if its
/// counts match the loaded mesh.
pub fn read_data<R: Read>(mesh: &mut Mesh, mut input: R) -> Result<(usize, f64)> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    let mut t = Tokens::new(&text);

    let iter: usize = t.next("iteration")?;
    let time: f64 = t.next("time")?;
    let found: [usize; 3] = [
        t.next("node count")?,
        t.next("face count")?,
        t.next("cell count")?,
    ];
    let expected = mesh.counts();
    if found != expected {
        return Err(FvmError::InconsistentMesh { expected, found });
    }

    let total: usize = expected.iter().sum();
    let mut values = Vec::with_capacity(total);
    for _ in 0..total {
        values.push(t.next::<f64>("value")?);
    }

    let (node_vals, rest) = values.split_at(expected[0]);
    let (face_vals, cell_vals) = rest.split_at(expected[1]);
    mesh.nodes.iter_mut().zip(node_vals).for_each(|(n, v)| n.value = *v);
    mesh.faces.iter_mut().zip(face_vals).for_each(|(f, v)| f.value = *v);
    mesh.cells.iter_mut().zip(cell_vals).for_each(|(c, v)| c.value = *v);
    Ok((iter, time))
}

/// `dir/PREFIX<iter>.dat`
pub fn checkpoint_path<P: AsRef<Path>>(dir: P, prefix: &str, iter: usize) -> PathBuf {
    dir.as_ref().join(format!("{prefix}{iter}.{EXTENSION}"))
}

pub fn save_checkpoint<P: AsRef<Path>>(
    mesh: &Mesh,
    dir: P,
    prefix: &str,
    iter: usize,
    time: f64,
) -> Result<PathBuf> {
    fs::create_dir_all(dir.as_ref())?;
    let path = checkpoint_path(dir, prefix, iter);
    let mut out = BufWriter::new(File::create(&path)?);
    write_data(mesh, &mut out, iter, time)?;
    out.flush()?;
    debug!("checkpoint written to {}", path.display());
    Ok(path)
}

pub fn load_checkpoint<P: AsRef<Path>>(mesh: &mut Mesh, path: P) -> Result<(usize, f64)> {
    let (iter, time) = read_data(mesh, File::open(path.as_ref())?)?;
    info!(
        "resumed from {} (iter {}, t = {})",
        path.as_ref().display(),
        iter,
        time
    );
    Ok((iter, time))
}

/// Iteration number of a file named `PREFIX<digits>.dat`, where `PREFIX`
/// consists of ASCII letters only.
fn checkpoint_index(file_name: &str, prefix: &str) -> Option<usize> {
    let stem = file_name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
    let split = stem.find(|c: char| c.is_ascii_digit())?;
    let (head, digits) = stem.split_at(split);
    if head != prefix
        || !head.chars().all(|c| c.is_ascii_alphabetic())
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// Most recent checkpoint with the given prefix in `dir`, if any.
pub fn latest_checkpoint<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<Option<(usize, PathBuf)>> {
    let mut latest: Option<(usize, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(idx) = name.to_str().and_then(|n| checkpoint_index(n, prefix)) else {
            continue;
        };
        if latest.as_ref().is_none_or(|(best, _)| idx > *best) {
            latest = Some((idx, entry.path()));
        }
    }
    Ok(latest)
}
