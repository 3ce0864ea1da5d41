mod common;

mod delivery;
mod ops;
mod store;
