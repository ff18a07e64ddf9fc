pub mod dual_homing;
pub mod interfaces;
