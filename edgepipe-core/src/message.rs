//! Message envelope exchanged with the hub
//!
//! A message is an opaque byte body plus two property maps:
//! - **application properties**: free-form key/value pairs set by senders and
//!   carried end to end
//! - **system properties**: transport-level metadata such as message id or
//!   content type, owned by the connection
//!
//! Both maps keep insertion order and hold each key once.

use indexmap::IndexMap;

/// Ordered string property map with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: IndexMap<String, String>,
}

impl Properties {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Look up a property
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Remove a property, keeping the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no properties are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        props.extend(iter);
        props
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Properties {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// A message body with its properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    body: Vec<u8>,
    properties: Properties,
    system_properties: Properties,
}

impl Message {
    /// Create a message with the given body and no properties
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Builder-style application property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Builder-style system property
    pub fn with_system_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_properties.insert(key, value);
        self
    }

    /// Raw body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the message, keeping only the body
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Application properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Mutable application properties
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Transport-level properties
    pub fn system_properties(&self) -> &Properties {
        &self.system_properties
    }

    /// Mutable transport-level properties
    pub fn system_properties_mut(&mut self) -> &mut Properties {
        &mut self.system_properties
    }
}

/// Completion status a handler reports back to its dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Message handled, dispatcher may drop it
    Completed,
    /// Message refused, not to be redelivered
    Rejected,
    /// Handler gave up, dispatcher may redeliver
    Abandoned,
}
