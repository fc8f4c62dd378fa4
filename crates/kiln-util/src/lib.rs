#![forbid(unsafe_code)]
//! Hashing, filesystem, archive, process and upload helpers for Kiln.

pub mod archive;
pub mod error;
pub mod fs;
pub mod hash;
pub mod maven;
pub mod process;
pub mod upload;
