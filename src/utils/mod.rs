//! Internal utility helpers for money parsing, file paths, and lenient serde shapes.

pub(crate) mod money;
pub(crate) mod paths;
pub(crate) mod serde;
