//! In-process stores.

pub mod status;
