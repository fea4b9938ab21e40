//! Response shapes shared by gateway handlers.

pub mod pagination;

pub use pagination::*;
