pub mod cmd;
mod constants;
pub mod logger;
pub mod network;
