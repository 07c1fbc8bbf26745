//! DataStore backend implementations.

pub mod hfs;
pub mod object;
