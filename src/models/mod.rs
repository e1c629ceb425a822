pub mod appointment;
pub mod offer;
pub mod user;
