//! Quit-list input readers.
//!
//! # Responsibility
//! - Turn an input file into indexed rows for the batch controller.
//! - Separate fatal input failures from row-level parse problems.

pub mod quit_csv;
