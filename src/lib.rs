//! suitegrader
//!
//! Grades student client/server submissions by replaying scripted test
//! suites against them: processes are started and fed input stage by stage,
//! their console output (and optionally HTTP traffic) is compared with the
//! expected output, and partial credit is awarded per passed stage.

pub mod capture;
pub mod cli;
pub mod compare;
pub mod config;
pub mod database;
pub mod engine;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod process_tree;
pub mod results;
pub mod run_id;
pub mod runner;
pub mod sinks;
pub mod supervisor;
pub mod util;
