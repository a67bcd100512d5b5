//! Utility modules shared by the compiler adapter and the serve loop.

pub mod exec;
pub mod mime;
pub mod path;
