pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use repository::{CvRepository, PgCvRepository};
