//! Module topic layout and property-bag codec
//!
//! ```text
//! devices/{device}/modules/{module}/messages/events/{bag}    outbound
//! devices/{device}/modules/{module}/inputs/{input}/{bag}     inbound
//! ```
//!
//! The bag is `key=value&key=value`, percent-encoded. Keys starting with
//! `$.` are system properties (`$.on` names the output channel, `$.mid` the
//! message id, ...). Everything else is an application property.

use edgepipe_core::{Message, Properties};

/// Prefix marking a system property key
pub const SYSTEM_PREFIX: &str = "$.";

/// System property naming the output channel of an event
pub const OUTPUT_NAME: &str = "$.on";

/// Topic names for one module identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTopics {
    prefix: String,
}

impl ModuleTopics {
    /// Topics for `device_id`/`module_id`
    pub fn new(device_id: &str, module_id: &str) -> Self {
        Self {
            prefix: format!("devices/{device_id}/modules/{module_id}"),
        }
    }

    /// Subscription filter covering every input of the module
    pub fn input_filter(&self) -> String {
        format!("{}/#", self.prefix)
    }

    /// Publish topic for `message`, on `output` if given
    pub fn event_topic(&self, output: Option<&str>, message: &Message) -> String {
        let mut system = message.system_properties().clone();
        if let Some(output) = output {
            system.insert(OUTPUT_NAME, output);
        }
        format!(
            "{}/messages/events/{}",
            self.prefix,
            encode_property_bag(message.properties(), &system)
        )
    }

    /// Parse an inbound publish into its input name and message
    ///
    /// Returns `None` for topics that are not module inputs, e.g. twin or
    /// method traffic under the same prefix.
    pub fn parse_input(&self, topic: &str, payload: &[u8]) -> Option<(String, Message)> {
        let rest = topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix("/inputs/")?;
        let (input, bag) = rest.split_once('/').unwrap_or((rest, ""));
        if input.is_empty() {
            return None;
        }

        let (properties, system) = decode_property_bag(bag);
        let mut message = Message::new(payload.to_vec());
        message.properties_mut().extend(properties.iter());
        message.system_properties_mut().extend(system.iter());
        Some((input.to_owned(), message))
    }
}

/// Encode application and system properties as a topic suffix
pub fn encode_property_bag(properties: &Properties, system: &Properties) -> String {
    let app = properties.iter().map(|(k, v)| {
        format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
    });
    // System keys are a fixed `$.xx` vocabulary and go out unescaped
    let sys = system
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)));
    app.chain(sys).collect::<Vec<_>>().join("&")
}

/// Split a topic suffix into (application, system) properties
pub fn decode_property_bag(bag: &str) -> (Properties, Properties) {
    let mut properties = Properties::new();
    let mut system = Properties::new();

    for pair in bag.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        let value = decode(value);
        if key.starts_with(SYSTEM_PREFIX) {
            system.insert(key, value);
        } else {
            properties.insert(key, value);
        }
    }

    (properties, system)
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> ModuleTopics {
        ModuleTopics::new("dev1", "SampleModule")
    }

    #[test]
    fn telemetry_topic_has_empty_bag() {
        let topic = topics().event_topic(None, &Message::new("{}"));
        assert_eq!(topic, "devices/dev1/modules/SampleModule/messages/events/");
    }

    #[test]
    fn output_topic_carries_output_name() {
        let message = Message::new("hello")
            .with_property("a", "1")
            .with_property("b", "2");
        let topic = topics().event_topic(Some("output1"), &message);
        assert_eq!(
            topic,
            "devices/dev1/modules/SampleModule/messages/events/a=1&b=2&$.on=output1"
        );
    }

    #[test]
    fn special_characters_are_escaped() {
        let props: Properties = [("unit name", "°C & more")].into_iter().collect();
        let bag = encode_property_bag(&props, &Properties::new());
        assert!(!bag.contains(' '));
        assert_eq!(bag.matches('&').count(), 0);

        let (decoded, system) = decode_property_bag(&bag);
        assert!(system.is_empty());
        assert_eq!(decoded.get("unit name"), Some("°C & more"));
    }

    #[test]
    fn parses_input_with_properties() {
        let topic = "devices/dev1/modules/SampleModule/inputs/input1/a=1&b=2&%24.mid=42&$.cdid=dev1";
        let (input, message) = topics().parse_input(topic, b"hello").unwrap();

        assert_eq!(input, "input1");
        assert_eq!(message.body(), b"hello");
        assert_eq!(message.properties().get("a"), Some("1"));
        assert_eq!(message.properties().get("b"), Some("2"));
        assert_eq!(message.system_properties().get("$.mid"), Some("42"));
        assert_eq!(message.system_properties().get("$.cdid"), Some("dev1"));
    }

    #[test]
    fn parses_input_without_bag() {
        let (input, message) = topics()
            .parse_input("devices/dev1/modules/SampleModule/inputs/input1", b"x")
            .unwrap();
        assert_eq!(input, "input1");
        assert!(message.properties().is_empty());

        let (input, _) = topics()
            .parse_input("devices/dev1/modules/SampleModule/inputs/input1/", b"x")
            .unwrap();
        assert_eq!(input, "input1");
    }

    #[test]
    fn ignores_foreign_topics() {
        let t = topics();
        assert!(t.parse_input("devices/dev1/modules/Other/inputs/input1/", b"").is_none());
        assert!(t.parse_input("devices/dev1/modules/SampleModule/twin/res/200/", b"").is_none());
        assert!(t.parse_input("devices/dev1/modules/SampleModule/inputs/", b"").is_none());
    }

    #[test]
    fn key_without_value() {
        let (props, _) = decode_property_bag("flag&k=v");
        assert_eq!(props.get("flag"), Some(""));
        assert_eq!(props.get("k"), Some("v"));
    }
}
