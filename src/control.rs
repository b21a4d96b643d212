use serde::{Deserialize, Serialize};

use crate::insert::Timed;

/// Common names for the controller numbers that have one.
const CONTROLLER_NAMES: &[(u8, &str)] = &[
    (1, "modulationWheel"),
    (2, "breath"),
    (4, "footController"),
    (5, "portamentoTime"),
    (7, "volume"),
    (8, "balance"),
    (10, "pan"),
    (64, "sustain"),
    (65, "portamentoTime"),
    (66, "sostenuto"),
    (67, "softPedal"),
    (68, "legatoFootswitch"),
    (84, "portamentoControl"),
];

/// Name of a controller number, e.g. `64 -> "sustain"`.
pub fn controller_name(number: u8) -> Option<&'static str> {
    CONTROLLER_NAMES
        .iter()
        .find(|(n, _)| *n == number)
        .map(|(_, name)| *name)
}

/// One controller-value sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "ControlRecord")]
pub struct ControlChange {
    /// Controller number 0-127
    pub number: u8,
    /// Time in seconds
    pub time: f64,
    /// Normalized value 0-1
    pub value: f64,
}

impl ControlChange {
    pub fn new(number: u8, time: f64, value: f64) -> Self {
        Self { number, time, value }
    }

    pub fn name(&self) -> Option<&'static str> {
        controller_name(self.number)
    }
}

impl Timed for ControlChange {
    fn time(&self) -> f64 {
        self.time
    }
}

/// Wire shape of a control change; adds the controller name when it has one.
#[derive(Serialize)]
struct ControlRecord {
    number: u8,
    time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,
    value: f64,
}

impl From<ControlChange> for ControlRecord {
    fn from(cc: ControlChange) -> Self {
        Self { number: cc.number, time: cc.time, name: cc.name(), value: cc.value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_names() {
        assert_eq!(ControlChange::new(64, 0.0, 1.0).name(), Some("sustain"));
        assert_eq!(ControlChange::new(7, 0.0, 1.0).name(), Some("volume"));
        assert_eq!(ControlChange::new(3, 0.0, 1.0).name(), None);
        assert_eq!(controller_name(127), None);
    }

    #[test]
    fn json_carries_the_name() {
        let json = serde_json::to_value(ControlChange::new(64, 1.5, 0.5)).unwrap();
        assert_eq!(json["name"], "sustain");
        assert_eq!(json["number"], 64);
        assert_eq!(json["time"], 1.5);

        let unnamed = serde_json::to_value(ControlChange::new(3, 0.0, 0.0)).unwrap();
        assert!(unnamed.get("name").is_none());
    }

    #[test]
    fn json_name_is_ignored_on_read() {
        let cc: ControlChange =
            serde_json::from_str(r#"{"number":64,"time":2.0,"name":"sustain","value":1.0}"#)
                .unwrap();
        assert_eq!(cc, ControlChange::new(64, 2.0, 1.0));
    }
}
