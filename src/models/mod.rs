pub mod cavity;
pub mod pipe;

pub use cavity::Cavity;
pub use pipe::Pipe;
