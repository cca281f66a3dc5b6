use std::borrow::Cow;

use reactive_fsm_core::InFlightPolicy;

/// Runtime settings for one machine instance.
///
/// ```rust
/// use reactive_fsm::{Config, InFlightPolicy};
///
/// let config = Config::default()
///     .with_name("checkout")
///     .with_in_flight_policy(InFlightPolicy::Abort);
/// assert_eq!(config.name(), "checkout");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    name: Cow<'static, str>,
    in_flight: InFlightPolicy,
}

impl Config {
    /// Name attached to every log event the machine emits.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// How side effects still running at cancellation are treated.
    #[must_use]
    pub fn with_in_flight_policy(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_flight_policy(&self) -> InFlightPolicy {
        self.in_flight
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("state_machine"),
            in_flight: InFlightPolicy::default(),
        }
    }
}
