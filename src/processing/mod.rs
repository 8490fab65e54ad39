pub mod checkpoint;
pub mod csv_writer;
pub mod summary;
