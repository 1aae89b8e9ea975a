pub mod boundary;
pub mod detection;
