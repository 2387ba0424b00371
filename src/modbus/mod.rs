pub mod arbiter;
pub mod transport;
