pub mod comment;
pub mod document;
pub mod entry;
pub mod id;
pub mod identity_maps;
pub mod ids;
pub mod index;
pub mod naming;
pub mod visibility;
