//! Cours engine: curriculum roads, exercise generation and grading,
//! learner progression and adaptive reinforcement, served over HTTP.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod expr;
pub mod generators;
pub mod grading;
pub mod loader;
pub mod logic;
pub mod progression;
pub mod protocol;
pub mod reinforcement;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod template;
pub mod util;
