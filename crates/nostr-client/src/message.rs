//! Relay protocol frames
//!
//! Frames are JSON arrays whose first element is a label:
//! - client → relay: `["REQ", <sub>, <filter>...]`, `["CLOSE", <sub>]`
//! - relay → client: `["EVENT", <sub>, <event>]`, `["EOSE", <sub>]`,
//!   `["NOTICE", <msg>]`, `["CLOSED", <sub>, <msg>]`, `["OK", <id>, <bool>, <msg>]`,
//!   `["AUTH", <challenge>]`

use crate::event::{Event, Filter};
use crate::{Error, Result};
use serde_json::Value;

/// Frame sent from the client to a relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Open a subscription
    Req {
        /// Subscription id
        subscription_id: String,
        /// Filters, OR-ed together
        filters: Vec<Filter>,
    },
    /// Close a subscription
    Close {
        /// Subscription id
        subscription_id: String,
    },
}

impl ClientMessage {
    /// Build a `REQ` frame
    pub fn req(subscription_id: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self::Req { subscription_id: subscription_id.into(), filters }
    }

    /// Build a `CLOSE` frame
    pub fn close(subscription_id: impl Into<String>) -> Self {
        Self::Close { subscription_id: subscription_id.into() }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String> {
        let frame = match self {
            ClientMessage::Req { subscription_id, filters } => {
                let mut parts = vec![Value::from("REQ"), Value::from(subscription_id.as_str())];
                for filter in filters {
                    parts.push(serde_json::to_value(filter)?);
                }
                Value::Array(parts)
            }
            ClientMessage::Close { subscription_id } => {
                Value::Array(vec![Value::from("CLOSE"), Value::from(subscription_id.as_str())])
            }
        };
        Ok(frame.to_string())
    }
}

/// Frame received from a relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// An event matching a subscription
    Event {
        /// Subscription id
        subscription_id: String,
        /// Delivered event
        event: Box<Event>,
    },
    /// End of stored events for a subscription
    Eose {
        /// Subscription id
        subscription_id: String,
    },
    /// Human-readable notice
    Notice {
        /// Notice text
        message: String,
    },
    /// The relay closed a subscription
    Closed {
        /// Subscription id
        subscription_id: String,
        /// Reason given by the relay
        message: String,
    },
    /// Acknowledgement of a published event
    Ok {
        /// Event id
        event_id: String,
        /// Whether the relay accepted the event
        accepted: bool,
        /// Reason given by the relay
        message: String,
    },
    /// Authentication challenge
    Auth {
        /// Challenge string
        challenge: String,
    },
}

impl RelayMessage {
    /// Parse a relay text frame
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<Value> = serde_json::from_str(text)?;
        let label = parts
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("frame has no label".to_string()))?;

        let string_at = |index: usize| -> Result<String> {
            parts
                .get(index)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::Protocol(format!("{} frame missing field {}", label, index)))
        };
        // Optional trailing message fields default to empty
        let text_at = |index: usize| -> String {
            parts.get(index).and_then(Value::as_str).unwrap_or_default().to_string()
        };

        match label {
            "EVENT" => {
                let subscription_id = string_at(1)?;
                let raw = parts
                    .get(2)
                    .cloned()
                    .ok_or_else(|| Error::Protocol("EVENT frame missing event".to_string()))?;
                let event: Event = serde_json::from_value(raw)?;
                Ok(RelayMessage::Event { subscription_id, event: Box::new(event) })
            }
            "EOSE" => Ok(RelayMessage::Eose { subscription_id: string_at(1)? }),
            "NOTICE" => Ok(RelayMessage::Notice { message: text_at(1) }),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: string_at(1)?,
                message: text_at(2),
            }),
            "OK" => Ok(RelayMessage::Ok {
                event_id: string_at(1)?,
                accepted: parts.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: text_at(3),
            }),
            "AUTH" => Ok(RelayMessage::Auth { challenge: string_at(1)? }),
            other => Err(Error::Protocol(format!("unknown frame label: {}", other))),
        }
    }
}
