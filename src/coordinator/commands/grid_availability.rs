use crate::prelude::*;
use crate::command::{Action, Command};

/// Turns a grid availability change into one command per identified unit whose profile
/// reacts to it.
pub struct GridAvailability<'a> {
    cache: &'a IdentityCache,
    units: &'a [LogicalUnit],
    available: bool,
}

impl<'a> GridAvailability<'a> {
    pub fn new(cache: &'a IdentityCache, units: &'a [LogicalUnit], available: bool) -> Self {
        Self {
            cache,
            units,
            available,
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.units
            .iter()
            .filter_map(|unit| {
                let action = unit.profile.availability?;
                let serial = match self.cache.get(unit.address) {
                    Some(serial) => serial,
                    None => {
                        debug!("unit {}: not identified yet, no availability action", unit.address);
                        return None;
                    }
                };

                Some(Command::for_unit(
                    &serial,
                    action.command,
                    Action::Write(action.value(self.available) as f64),
                ))
            })
            .collect()
    }
}
