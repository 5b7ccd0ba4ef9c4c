pub mod certificate;
pub mod cv;
pub mod education;
pub mod portfolio;
pub mod usage;
pub mod user;
