pub mod command;
pub mod kubectl;
pub mod structs;
