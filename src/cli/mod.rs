pub(crate) mod cmap;
pub(crate) mod extract;
pub(crate) mod index;
