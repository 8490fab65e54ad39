//! Plain-text mesh format.
//!
//! Whitespace separated, 1-based ids, `0` meaning "no cell":
//!
//! ```text
//! nNode nFace nCell nPatch
//! node:  flag x y z  nAdjNode ids..  nDepFace ids..  nDepCell ids..
//! face:  flag shape cx cy cz area  vertices..  c0 c1  n0x n0y n0z  n1x n1y n1z
//! cell:  shape cx cy cz volume  vertices..  faces..  neighbours..  (nx ny nz) per face
//! patch: name nFace nNode  faces..  nodes..
//! ```
//!
//! Boundary flags are `0` (internal) or `1` (boundary).

use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use log::info;
use nalgebra::Vector3;

use super::mesh::{Cell, CellId, CellShape, Face, FaceId, FaceShape, Mesh, Node, NodeId, Patch, PatchId};
use crate::error::{FvmError, Result};

/// Cursor over whitespace separated tokens, counting them for error reports.
pub(crate) struct Tokens<'a> {
    iter: SplitWhitespace<'a>,
    pos: usize,
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            iter: text.split_whitespace(),
            pos: 0,
        }
    }

    pub(crate) fn next<T>(&mut self, what: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.pos += 1;
        let token = self.iter.next().ok_or_else(|| FvmError::Parse {
            token: self.pos,
            message: format!("unexpected end of input, expected {what}"),
        })?;
        token.parse().map_err(|e| FvmError::Parse {
            token: self.pos,
            message: format!("bad {what} \"{token}\": {e}"),
        })
    }

    fn vector(&mut self, what: &str) -> Result<Vector3<f64>> {
        Ok(Vector3::new(self.next(what)?, self.next(what)?, self.next(what)?))
    }

    fn flag(&mut self, entity: &'static str, index: usize) -> Result<bool> {
        match self.next::<i64>("boundary flag")? {
            0 => Ok(false),
            1 => Ok(true),
            flag => Err(FvmError::InvalidBoundaryFlag { entity, index, flag }),
        }
    }

    /// A 1-based reference to one of `count` entities, as a 0-based index.
    fn id(&mut self, entity: &'static str, index: usize, target: &str, count: usize) -> Result<usize> {
        self.opt_id(entity, index, target, count)?
            .ok_or_else(|| FvmError::DanglingReference {
                entity,
                index,
                target: format!("{target} 0"),
            })
    }

    /// Like [`Tokens::id`], `0` meaning absent.
    fn opt_id(
        &mut self,
        entity: &'static str,
        index: usize,
        target: &str,
        count: usize,
    ) -> Result<Option<usize>> {
        let raw: usize = self.next(target)?;
        match raw {
            0 => Ok(None),
            k if k <= count => Ok(Some(k - 1)),
            k => Err(FvmError::DanglingReference {
                entity,
                index,
                target: format!("{target} {k}"),
            }),
        }
    }
}

/// Parses a mesh and checks its structural invariants.
pub fn read_mesh<R: Read>(mut reader: R) -> Result<Mesh> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_mesh(&text)
}

pub fn read_mesh_file<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    read_mesh(File::open(path)?)
}

pub fn parse_mesh(text: &str) -> Result<Mesh> {
    let mut t = Tokens::new(text);
    let n_node: usize = t.next("node count")?;
    let n_face: usize = t.next("face count")?;
    let n_cell: usize = t.next("cell count")?;
    let n_patch: usize = t.next("patch count")?;

    let mut mesh = Mesh::default();

    for i in 1..=n_node {
        let at_boundary = t.flag("node", i)?;
        let mut node = Node::new(i, t.vector("coordinate")?, at_boundary);
        for _ in 0..t.next::<usize>("adjacent node count")? {
            t.id("node", i, "node", n_node)?;
        }
        for _ in 0..t.next::<usize>("dependent face count")? {
            t.id("node", i, "face", n_face)?;
        }
        let n_dep: usize = t.next("dependent cell count")?;
        node.cells = (0..n_dep)
            .map(|_| t.id("node", i, "cell", n_cell).map(CellId))
            .collect::<Result<_>>()?;
        mesh.nodes.push(node);
    }

    for i in 1..=n_face {
        let boundary = t.flag("face", i)?;
        let shape = FaceShape::from_code(i, t.next("face shape")?)?;
        let centroid = t.vector("face centroid")?;
        let area: f64 = t.next("face area")?;
        let vertices = (0..shape.node_count())
            .map(|_| t.id("face", i, "node", n_node).map(NodeId))
            .collect::<Result<Vec<_>>>()?;
        let c0 = t.opt_id("face", i, "cell", n_cell)?.map(CellId);
        let c1 = t.opt_id("face", i, "cell", n_cell)?.map(CellId);

        let mut face = match (boundary, c0, c1) {
            (false, Some(c0), Some(c1)) => Face::internal(i, shape, c0, c1),
            (false, _, _) => return Err(FvmError::InternalFaceMissingNeighbor(i)),
            (true, c0, c1) => Face::boundary(i, shape, [c0, c1]),
        };
        face.centroid = centroid;
        face.area = area;
        face.vertices = vertices;
        face.normals = [t.vector("face normal")?, t.vector("face normal")?];
        mesh.faces.push(face);
    }

    for i in 1..=n_cell {
        let shape = CellShape::from_code(i, t.next("cell shape")?)?;
        let mut cell = Cell::new(i, shape);
        cell.centroid = t.vector("cell centroid")?;
        cell.volume = t.next("cell volume")?;
        let nf = shape.face_count();
        cell.vertices = (0..shape.node_count())
            .map(|_| t.id("cell", i, "node", n_node).map(NodeId))
            .collect::<Result<_>>()?;
        cell.surface = (0..nf)
            .map(|_| t.id("cell", i, "face", n_face).map(FaceId))
            .collect::<Result<_>>()?;
        cell.adjacency = (0..nf)
            .map(|_| t.opt_id("cell", i, "cell", n_cell).map(|c| c.map(CellId)))
            .collect::<Result<_>>()?;
        for j in 0..nf {
            let n = t.vector("cell face normal")?;
            cell.s.push(n * mesh.faces[cell.surface[j].0].area);
        }
        mesh.cells.push(cell);
    }

    for p in 0..n_patch {
        let mut patch = Patch::new(t.next::<String>("patch name")?);
        let nf: usize = t.next("patch face count")?;
        let nn: usize = t.next("patch node count")?;
        for _ in 0..nf {
            let f = t.id("patch", p + 1, "face", n_face)?;
            mesh.faces[f].set_parent(PatchId(p))?;
            patch.faces.push(FaceId(f));
        }
        patch.vertices = (0..nn)
            .map(|_| t.id("patch", p + 1, "node", n_node).map(NodeId))
            .collect::<Result<_>>()?;
        mesh.patches.push(patch);
    }

    mesh.validate()?;
    info!(
        "mesh loaded: {} nodes, {} faces, {} cells, {} patches",
        n_node, n_face, n_cell, n_patch
    );
    Ok(mesh)
}

fn write_ids<W: Write>(out: &mut W, ids: impl IntoIterator<Item = usize>) -> Result<()> {
    for id in ids {
        write!(out, " {id}")?;
    }
    Ok(())
}

fn write_vec<W: Write>(out: &mut W, v: &Vector3<f64>) -> Result<()> {
    write!(out, " {} {} {}", v.x, v.y, v.z)?;
    Ok(())
}

/// Writes `mesh` in the format read by [`read_mesh`].
pub fn write_mesh<W: Write>(mesh: &Mesh, out: &mut W) -> Result<()> {
    let mut node_faces: Vec<Vec<usize>> = vec![Vec::new(); mesh.nodes.len()];
    let mut node_adj: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); mesh.nodes.len()];
    for (fi, face) in mesh.faces.iter().enumerate() {
        let n = face.vertices.len();
        for (k, v) in face.vertices.iter().enumerate() {
            node_faces[v.0].push(fi + 1);
            let next = face.vertices[(k + 1) % n];
            node_adj[v.0].insert(next.one_based());
            node_adj[next.0].insert(v.one_based());
        }
    }

    writeln!(
        out,
        "{} {} {} {}",
        mesh.nodes.len(),
        mesh.faces.len(),
        mesh.cells.len(),
        mesh.patches.len()
    )?;

    for (i, node) in mesh.nodes.iter().enumerate() {
        write!(out, "{}", u8::from(node.at_boundary))?;
        write_vec(out, &node.coordinate)?;
        write!(out, " {}", node_adj[i].len())?;
        write_ids(out, node_adj[i].iter().copied())?;
        write!(out, " {}", node_faces[i].len())?;
        write_ids(out, node_faces[i].iter().copied())?;
        write!(out, " {}", node.cells.len())?;
        write_ids(out, node.cells.iter().map(|c| c.one_based()))?;
        writeln!(out)?;
    }

    for face in &mesh.faces {
        write!(
            out,
            "{} {}",
            u8::from(face.at_boundary()),
            face.shape.node_count()
        )?;
        write_vec(out, &face.centroid)?;
        write!(out, " {}", face.area)?;
        write_ids(out, face.vertices.iter().map(|v| v.one_based()))?;
        write_ids(out, face.cells.iter().map(|c| c.map_or(0, |c| c.one_based())))?;
        write_vec(out, &face.normals[0])?;
        write_vec(out, &face.normals[1])?;
        writeln!(out)?;
    }

    for cell in &mesh.cells {
        write!(out, "{}", cell.shape.code())?;
        write_vec(out, &cell.centroid)?;
        write!(out, " {}", cell.volume)?;
        write_ids(out, cell.vertices.iter().map(|v| v.one_based()))?;
        write_ids(out, cell.surface.iter().map(|f| f.one_based()))?;
        write_ids(out, cell.adjacency.iter().map(|c| c.map_or(0, |c| c.one_based())))?;
        for j in 0..cell.face_count() {
            write_vec(out, &mesh.outward_unit_normal(cell, j))?;
        }
        writeln!(out)?;
    }

    for patch in &mesh.patches {
        write!(out, "{} {} {}", patch.name, patch.faces.len(), patch.vertices.len())?;
        write_ids(out, patch.faces.iter().map(|f| f.one_based()))?;
        write_ids(out, patch.vertices.iter().map(|v| v.one_based()))?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_mesh_file<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_mesh(mesh, &mut out)?;
    out.flush()?;
    Ok(())
}
