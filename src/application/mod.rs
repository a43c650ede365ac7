pub mod dto;
pub mod font;
pub mod overlay;
pub mod ports;
pub mod services;
