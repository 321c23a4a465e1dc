#![doc = include_str!("../README.md")]

mod config;
mod error;
mod generator;
mod layout;
mod time;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::layout::*;
pub use crate::time::*;
