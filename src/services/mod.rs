// src/services/mod.rs
// DOCUMENTATION: Services module organization
// PURPOSE: Re-export service components

pub mod association_service;
pub mod blob_store;
pub mod category_service;
pub mod image_service;
pub mod integrity;
pub mod user_service;

pub use association_service::*;
pub use blob_store::*;
pub use category_service::*;
pub use image_service::*;
pub use integrity::*;
pub use user_service::*;
