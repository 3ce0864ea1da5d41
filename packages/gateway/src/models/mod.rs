pub mod delivery;
pub mod document;
pub mod template;
