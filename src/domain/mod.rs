pub mod detection;
pub mod errors;
pub mod lifecycle;
pub mod model;
pub mod settings;
