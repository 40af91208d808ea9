pub mod dto;
pub mod lifecycle;
pub mod ports;
pub mod services;
