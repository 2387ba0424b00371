pub mod codec;
pub mod dt;
pub mod et;
pub mod identity;
pub mod inverter;
pub mod layout;
pub mod profile;
