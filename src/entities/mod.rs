//! Domain models and the note-to-shopping-list workflow used by the CLI.

pub(crate) mod cost;
pub(crate) mod item_cache;
pub(crate) mod note;
pub(crate) mod shopping_list;
pub(crate) mod timing;
