pub mod delivery;
pub mod document;
pub mod health;
pub mod template;
