// src/models/mod.rs
pub mod driver;
pub mod fare;
pub mod ride;
pub mod user;

pub use driver::*;
pub use fare::*;
pub use ride::*;
pub use user::*;
