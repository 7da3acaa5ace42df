// footprint geometry: contour tracing and prism building

pub mod contour;
pub mod mesh_gen;
pub mod utils;
