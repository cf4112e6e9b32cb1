// src/services/mod.rs
pub mod analysis_client;
pub mod collector;
pub mod image_processor;
pub mod item_store;
pub mod presenter;
pub mod submission;
pub mod validator;

#[cfg(test)]
pub(crate) mod fake_classifier;

pub use analysis_client::Analyzer;
pub use image_processor::ImageProcessor;
pub use item_store::ItemStore;
pub use submission::SessionStore;
