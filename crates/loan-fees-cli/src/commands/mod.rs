pub mod bands;
pub mod definition;
pub mod resolve;
