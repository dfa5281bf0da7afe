//! # discplay Common Library
//!
//! Shared code for the disc player and its front ends:
//! - Disc position algebra (minute:second:frame[.sample])
//! - Table of contents model
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod msf;
pub mod toc;

pub use error::{Error, Result};
pub use msf::{Msf, Msfs};
pub use toc::{DiscToc, TocEntry};
