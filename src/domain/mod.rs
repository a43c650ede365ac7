pub mod catalog;
pub mod detection;
pub mod errors;
pub mod geometry;
pub mod session;
pub mod source;
