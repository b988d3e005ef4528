pub mod geo;
pub mod periodic;
