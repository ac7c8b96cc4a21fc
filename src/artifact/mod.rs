//! Build outputs the pipeline owns the layout of.
//!
//! - [`disk`] - Raw disk container and the boot blob write

pub mod disk;
