// src/models/mod.rs
// DOCUMENTATION: Models module organization
// PURPOSE: Re-export model components

pub mod association;
pub mod category;
pub mod image;
pub mod user;

pub use association::*;
pub use category::*;
pub use image::*;
pub use user::*;
