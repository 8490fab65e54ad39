pub mod assembly;
pub mod generator;
pub mod geometry;
pub mod mesh;
pub mod mesh_io;
pub mod quality;
