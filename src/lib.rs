pub mod driver;
pub mod emit;
