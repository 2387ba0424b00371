pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::config::{self, Config, ConfigWrapper};
pub use crate::goodwe::identity::{IdentityCache, LogicalUnit, Serial};
pub use crate::modbus::arbiter::Arbiter;
pub use crate::mqtt;
