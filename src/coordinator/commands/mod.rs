pub mod grid_availability;
pub mod query_register;
pub mod write_register;
