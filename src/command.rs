use crate::prelude::*;
use crate::error::CommandError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// empty payload: read the register back
    Query,
    Write(f64),
}

/// Which of the accepted inbound topic shapes a command arrived on. The result goes back
/// in the matching shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStyle {
    /// `<serial>/<command>`
    Bare,
    /// `<serial>/<command>/set`
    SetSuffix,
    /// `<serial>/set/<command>`
    SetPrefix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub serial: String,
    pub name: String,
    pub style: TopicStyle,
    pub payload: String,
}

impl Command {
    /// None when the topic isn't a command topic at all (telemetry, results, LWT).
    pub fn from_message(message: &mqtt::Message) -> Option<Self> {
        let parts: Vec<&str> = message.topic.split('/').collect();

        let (serial, name, style) = match parts[..] {
            [serial, "set", name] => (serial, name, TopicStyle::SetPrefix),
            [serial, name, "set"] => (serial, name, TopicStyle::SetSuffix),
            [serial, name] if name != "LWT" => (serial, name, TopicStyle::Bare),
            _ => return None,
        };

        if serial.is_empty() || name.is_empty() || name == "result" {
            return None;
        }

        Some(Self {
            serial: serial.to_string(),
            name: name.to_string(),
            style,
            payload: message.payload.clone(),
        })
    }

    pub fn for_unit(serial: &Serial, name: &str, action: Action) -> Self {
        let payload = match action {
            Action::Query => String::new(),
            Action::Write(value) => value.to_string(),
        };

        Self {
            serial: serial.to_string(),
            name: name.to_string(),
            style: TopicStyle::Bare,
            payload,
        }
    }

    pub fn action(&self) -> Result<Action, CommandError> {
        let payload = self.payload.trim();
        if payload.is_empty() {
            return Ok(Action::Query);
        }

        payload
            .parse::<f64>()
            .map(Action::Write)
            .map_err(|_| CommandError::InvalidPayload(self.payload.clone()))
    }

    pub fn to_result_topic(&self) -> String {
        match self.style {
            TopicStyle::Bare | TopicStyle::SetSuffix => {
                format!("{}/{}/result", self.serial, self.name)
            }
            TopicStyle::SetPrefix => format!("{}/result/{}", self.serial, self.name),
        }
    }
}
