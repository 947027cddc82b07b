//! Pin, supply and port topology from the pin configuration.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::{ModelError, Result};

/// Name of the implicit port that contains every pin.
pub const CATCH_ALL_PORT: &str = "@";

/// Which pins and supplies exist and how pins are grouped into ports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PinTopology {
    pins: IndexSet<String>,
    supplies: IndexSet<String>,
    ports: IndexMap<String, IndexSet<String>>,
}

impl PinTopology {
    pub fn new<I, J, P, S>(pins: I, supplies: J) -> Self
    where
        I: IntoIterator<Item = P>,
        J: IntoIterator<Item = S>,
        P: Into<String>,
        S: Into<String>,
    {
        Self {
            pins: pins.into_iter().map(Into::into).collect(),
            supplies: supplies.into_iter().map(Into::into).collect(),
            ports: IndexMap::new(),
        }
    }

    /// Define a port; every pin must be known and the name must be new.
    pub fn add_port<I, P>(&mut self, name: impl Into<String>, pins: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let name = name.into();
        if name == CATCH_ALL_PORT || self.ports.contains_key(&name) {
            return Err(ModelError::Duplicate {
                kind: "port",
                key: name,
            });
        }
        let mut members = IndexSet::new();
        for pin in pins {
            let pin = pin.into();
            if !self.pins.contains(&pin) {
                return Err(ModelError::NotFound {
                    kind: "pin",
                    key: format!("{pin} (port {name})"),
                });
            }
            members.insert(pin);
        }
        self.ports.insert(name, members);
        Ok(())
    }

    pub fn pins(&self) -> impl Iterator<Item = &str> {
        self.pins.iter().map(String::as_str)
    }

    pub fn supplies(&self) -> impl Iterator<Item = &str> {
        self.supplies.iter().map(String::as_str)
    }

    pub fn is_pin(&self, name: &str) -> bool {
        self.pins.contains(name)
    }

    pub fn is_supply(&self, name: &str) -> bool {
        self.supplies.contains(name)
    }

    /// Explicitly defined port names (the catch-all port is not listed).
    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(String::as_str)
    }

    /// Pins of a port; `@` yields every pin.
    pub fn port_pins(&self, port: &str) -> Option<Vec<&str>> {
        if port == CATCH_ALL_PORT {
            return Some(self.pins().collect());
        }
        self.ports
            .get(port)
            .map(|pins| pins.iter().map(String::as_str).collect())
    }
}
