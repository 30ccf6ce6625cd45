#![allow(unused_crate_dependencies)]

pub mod analysis;
pub mod cli;
pub mod config;
pub mod core;
pub mod data;
pub mod decision;
pub mod indicators;
pub mod ledger;
pub mod logging;
pub mod report;
pub mod risk;
pub mod simulation;
pub mod strategies;
