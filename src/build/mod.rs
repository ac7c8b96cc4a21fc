//! Build parameters shared by the stager and the image assembler.
//!
//! - [`context`] - Build mode and per-run context

pub mod context;
