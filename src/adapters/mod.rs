pub mod detector;
pub mod http;
