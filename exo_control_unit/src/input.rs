//! Operator input.
//!
//! Raw key flags ([`KeyStates`]) are decoded by a [`ModeSelector`] into an
//! [`OperatorIntent`], which is the only thing the gait layer sees. Key
//! meanings follow the crutch/keyboard layout:
//!
//! | key | meaning                          |
//! |-----|----------------------------------|
//! | `s` | go (held while moving)           |
//! | `w` | previous menu entry              |
//! | `e` | next menu entry                  |
//! | `x` | confirm menu entry               |
//! | `a` | select feet together             |
//! | `d` | enter test phase                 |
//! | `r` | reset after error / leave test   |
//! | `q` | quit                             |
//! | `0`-`9` | select menu entry directly   |

use exo_common::config::{ConfigError, ConfigLoader};
use exo_common::gait::RobotMode;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown key {0:?}")]
    UnknownKey(char),
}

/// What the operator currently asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperatorIntent {
    /// Go signal; motion only advances while asserted.
    pub go: bool,
    /// Motion confirmed on the menu this tick.
    pub selected: Option<RobotMode>,
    pub reset: bool,
    pub test: bool,
    pub quit: bool,
}

// ─── Keys ───────────────────────────────────────────────────────────

/// Debounced key flags for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyStates {
    pub a: bool,
    pub s: bool,
    pub d: bool,
    pub w: bool,
    pub x: bool,
    pub e: bool,
    pub r: bool,
    pub q: bool,
    pub digit: Option<u8>,
}

impl KeyStates {
    /// Parse a key string such as `"s"` or `"e x"`. Whitespace is ignored.
    pub fn parse(keys: &str) -> Result<Self, InputError> {
        let mut states = Self::default();
        for c in keys.chars().filter(|c| !c.is_whitespace()) {
            match c.to_ascii_lowercase() {
                'a' => states.a = true,
                's' => states.s = true,
                'd' => states.d = true,
                'w' => states.w = true,
                'x' => states.x = true,
                'e' => states.e = true,
                'r' => states.r = true,
                'q' => states.q = true,
                '0'..='9' => states.digit = c.to_digit(10).map(|d| d as u8),
                other => return Err(InputError::UnknownKey(other)),
            }
        }
        Ok(states)
    }

    /// Only the level-triggered part (go).
    pub fn held(self) -> Self {
        Self {
            s: self.s,
            ..Self::default()
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            a: self.a | other.a,
            s: self.s | other.s,
            d: self.d | other.d,
            w: self.w | other.w,
            x: self.x | other.x,
            e: self.e | other.e,
            r: self.r | other.r,
            q: self.q | other.q,
            digit: other.digit.or(self.digit),
        }
    }
}

// ─── Menu ───────────────────────────────────────────────────────────

/// Cursor over [`RobotMode::MENU`].
#[derive(Debug, Clone, Default)]
pub struct ModeSelector {
    cursor: usize,
}

impl ModeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode under the cursor.
    pub fn highlighted(&self) -> RobotMode {
        RobotMode::MENU[self.cursor]
    }

    pub fn decode(&mut self, keys: &KeyStates) -> OperatorIntent {
        let len = RobotMode::MENU.len();
        if keys.e {
            self.cursor = (self.cursor + 1) % len;
            debug!(mode = self.highlighted().label(), "menu next");
        }
        if keys.w {
            self.cursor = (self.cursor + len - 1) % len;
            debug!(mode = self.highlighted().label(), "menu previous");
        }

        let mut selected = None;
        if let Some(d) = keys.digit.map(usize::from).filter(|&d| d < len) {
            self.cursor = d;
            selected = Some(self.highlighted());
        }
        if keys.x {
            selected = Some(self.highlighted());
        }
        if keys.a {
            selected = Some(RobotMode::FeetTogether);
        }
        if let Some(mode) = selected {
            info!(mode = mode.label(), "motion selected");
        }

        OperatorIntent {
            go: keys.s,
            selected,
            reset: keys.r,
            test: keys.d,
            quit: keys.q,
        }
    }
}

// ─── Sources ────────────────────────────────────────────────────────

/// Per-tick intent provider.
pub trait IntentSource: Send {
    fn poll(&mut self, cycle: u64) -> OperatorIntent;
}

/// No operator attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleIntent;

impl IntentSource for IdleIntent {
    fn poll(&mut self, _cycle: u64) -> OperatorIntent {
        OperatorIntent::default()
    }
}

fn default_hold_cycles() -> u64 {
    1
}

/// One scripted key press.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioStep {
    /// Tick on which the keys go down.
    pub at_cycle: u64,
    pub keys: String,
    /// Ticks the go key stays held. Other keys fire once.
    #[serde(default = "default_hold_cycles")]
    pub hold_cycles: u64,
}

/// Scripted operator session loaded from TOML.
///
/// ```toml
/// [[steps]]
/// at_cycle = 10
/// keys = "s"
/// hold_cycles = 2500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

/// Replays a [`Scenario`] by cycle number.
#[derive(Debug, Clone)]
pub struct ScriptedIntent {
    steps: Vec<(ScenarioStep, KeyStates)>,
    selector: ModeSelector,
}

impl ScriptedIntent {
    pub fn new(scenario: Scenario) -> Result<Self, ConfigError> {
        let mut steps = scenario
            .steps
            .into_iter()
            .map(|step| {
                KeyStates::parse(&step.keys)
                    .map(|keys| (step, keys))
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        steps.sort_by_key(|(step, _)| step.at_cycle);
        Ok(Self {
            steps,
            selector: ModeSelector::new(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::new(Scenario::load(path)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::new(Scenario::from_toml(content)?)
    }

    /// Keys down at `cycle`.
    pub fn keys_at(&self, cycle: u64) -> KeyStates {
        self.steps
            .iter()
            .take_while(|(step, _)| step.at_cycle <= cycle)
            .fold(KeyStates::default(), |acc, (step, keys)| {
                if cycle == step.at_cycle {
                    acc.merge(*keys)
                } else if cycle < step.at_cycle.saturating_add(step.hold_cycles) {
                    acc.merge(keys.held())
                } else {
                    acc
                }
            })
    }
}

impl IntentSource for ScriptedIntent {
    fn poll(&mut self, cycle: u64) -> OperatorIntent {
        let keys = self.keys_at(cycle);
        self.selector.decode(&keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keys() {
        let keys = KeyStates::parse("S x 3").unwrap();
        assert!(keys.s && keys.x);
        assert_eq!(keys.digit, Some(3));
        assert_eq!(KeyStates::parse("z"), Err(InputError::UnknownKey('z')));
        assert_eq!(KeyStates::parse("").unwrap(), KeyStates::default());
    }

    #[test]
    fn menu_navigation_wraps() {
        let mut menu = ModeSelector::new();
        assert_eq!(menu.highlighted(), RobotMode::NormalWalk);
        let prev = KeyStates {
            w: true,
            ..Default::default()
        };
        assert_eq!(menu.decode(&prev).selected, None);
        assert_eq!(menu.highlighted(), RobotMode::Uneven);

        let next_and_confirm = KeyStates {
            e: true,
            x: true,
            ..Default::default()
        };
        let intent = menu.decode(&next_and_confirm);
        assert_eq!(intent.selected, Some(RobotMode::NormalWalk));
        assert!(!intent.go);
    }

    #[test]
    fn digits_and_shortcuts_select() {
        let mut menu = ModeSelector::new();
        let intent = menu.decode(&KeyStates::parse("1").unwrap());
        assert_eq!(intent.selected, Some(RobotMode::SitDown));
        assert_eq!(menu.highlighted(), RobotMode::SitDown);

        let intent = menu.decode(&KeyStates::parse("a s").unwrap());
        assert_eq!(intent.selected, Some(RobotMode::FeetTogether));
        assert!(intent.go);
    }

    #[test]
    fn scripted_go_is_held_and_menu_fires_once() {
        let mut script = ScriptedIntent::from_toml(
            r#"
[[steps]]
at_cycle = 20
keys = "s"
hold_cycles = 3

[[steps]]
at_cycle = 5
keys = "1"
hold_cycles = 10
"#,
        )
        .unwrap();

        assert_eq!(script.poll(4), OperatorIntent::default());
        assert_eq!(script.poll(5).selected, Some(RobotMode::SitDown));
        assert_eq!(script.poll(6).selected, None);
        assert!(!script.poll(19).go);
        assert!(script.poll(20).go);
        assert!(script.poll(22).go);
        assert!(!script.poll(23).go);
    }

    #[test]
    fn scenario_rejects_unknown_keys_and_fields() {
        assert!(matches!(
            ScriptedIntent::from_toml("[[steps]]\nat_cycle = 1\nkeys = \"?\""),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(matches!(
            ScriptedIntent::from_toml("[[steps]]\nat_cycle = 1\nkeys = \"s\"\nspeed = 2"),
            Err(ConfigError::ParseError(_))
        ));
        assert_eq!(IdleIntent.poll(0), OperatorIntent::default());
    }
}
