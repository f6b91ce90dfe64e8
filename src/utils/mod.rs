pub mod crypto;
pub mod geo;
pub mod time;
pub mod token;
pub mod upload;
