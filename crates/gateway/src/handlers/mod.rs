//! API handlers module

pub mod export;
pub mod graph;
pub mod health;
pub mod search;
