//! procman core library.
//!
//! This crate contains the pieces behind the `procman` binary:
//! - Process enumeration and normalization
//! - Filter/sort projection of snapshots
//! - Chooser, confirmation and options-menu interaction
//! - Signal-based termination
//! - Text and CSV export
//! - The refresh-loop controller

pub mod action;
pub mod collect;
pub mod config;
pub mod controller;
pub mod exit_codes;
pub mod export;
pub mod logging;
pub mod render;
pub mod select;
pub mod session;
pub mod view;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
