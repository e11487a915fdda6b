//! Types shared by the route board core, the reference store, and the planner app.

pub mod domain;
pub mod error;
pub mod protocol;
