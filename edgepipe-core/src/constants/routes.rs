//! Channel names used by the sample module.

/// Input channel the message pipe is registered on.
pub const INPUT_CHANNEL: &str = "input1";

/// Output channel the message pipe forwards to.
pub const OUTPUT_CHANNEL: &str = "output1";
