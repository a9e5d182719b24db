//! Transform adapters from upstream shapes (note bodies, model answers) into entity models.

pub(crate) mod note;
pub(crate) mod shopping_list;
