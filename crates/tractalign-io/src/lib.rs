pub mod vtk_io;
pub mod output;

pub use vtk_io::{read_fiber_geometry, write_fiber_geometry, VtkEncoding};
pub use output::{read_transform, write_transform, BackgroundWriter, OutputDirectory};
