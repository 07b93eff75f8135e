#![forbid(unsafe_code)]

mod entry;
mod ids;
mod merge;
mod registry;
mod staging;
mod text;

pub use entry::*;
pub use ids::*;
pub use merge::*;
pub use registry::*;
pub use staging::*;
pub use text::*;
