//! Value types exchanged with the device agent

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, U2Error};
use crate::selector::Selector;

/// Screen rectangle in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    /// Overlap of two rectangles; empty when left >= right or top >= bottom
    pub fn intersect(&self, other: &Bounds) -> Bounds {
        Bounds {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Parse the hierarchy dump form `[l,t][r,b]`
    pub fn parse(raw: &str) -> Option<Bounds> {
        let numbers: Vec<i32> = raw
            .split(|c: char| c == '[' || c == ']' || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| s.trim().parse::<i32>())
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        match numbers.as_slice() {
            [left, top, right, bottom] => Some(Bounds::new(*left, *top, *right, *bottom)),
            _ => None,
        }
    }
}

/// Node information as reported by `objInfo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub child_count: u32,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub content_description: Option<String>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_bounds: Option<Bounds>,
    #[serde(default)]
    pub checkable: bool,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub focusable: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub long_clickable: bool,
    #[serde(default)]
    pub scrollable: bool,
    #[serde(default)]
    pub selected: bool,
}

impl ElementInfo {
    /// Whole info as a JSON mapping
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// One attribute by its camelCase name
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.to_value().get(name).cloned()
    }
}

/// What an element reference points at
#[derive(Debug, Clone, PartialEq)]
pub enum UiTarget {
    /// Selector chain resolved by the server on every call
    Selector(Selector),
    /// Object already resolved server-side, addressed by name
    Remote(String),
}

/// Opaque handle to a located (or lazily locatable) UI node
#[derive(Debug, Clone, PartialEq)]
pub struct UiObject {
    target: UiTarget,
}

impl UiObject {
    pub fn new(selector: Selector) -> Self {
        Self {
            target: UiTarget::Selector(selector),
        }
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self {
            target: UiTarget::Remote(name.into()),
        }
    }

    pub fn target(&self) -> &UiTarget {
        &self.target
    }

    pub fn selector(&self) -> Option<&Selector> {
        match &self.target {
            UiTarget::Selector(selector) => Some(selector),
            UiTarget::Remote(_) => None,
        }
    }

    fn require_selector(&self, operation: &str) -> Result<&Selector> {
        self.selector().ok_or_else(|| {
            U2Error::Unsupported(format!("{} on server-side object {}", operation, self))
        })
    }

    pub fn child(&self, child: Selector) -> Result<UiObject> {
        Ok(UiObject::new(self.require_selector("child")?.child(child)))
    }

    pub fn sibling(&self, sibling: Selector) -> Result<UiObject> {
        Ok(UiObject::new(self.require_selector("sibling")?.sibling(sibling)))
    }

    pub fn with_instance(&self, instance: u32) -> Result<UiObject> {
        Ok(UiObject::new(
            self.require_selector("instance")?.with_instance(instance),
        ))
    }

    /// JSON-RPC parameter: the selector object, or the object name
    pub fn to_param(&self) -> Value {
        match &self.target {
            UiTarget::Selector(selector) => selector.to_json(),
            UiTarget::Remote(name) => Value::String(name.clone()),
        }
    }
}

impl From<Selector> for UiObject {
    fn from(selector: Selector) -> Self {
        UiObject::new(selector)
    }
}

impl fmt::Display for UiObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            UiTarget::Selector(selector) => write!(f, "UiObject({})", selector),
            UiTarget::Remote(name) => write!(f, "UiObject(@{})", name),
        }
    }
}

/// Side of an origin element to search on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Gap between `origin` and `other` when `other` lies on this side and
    /// overlaps it on the perpendicular axis
    pub fn distance(self, origin: &Bounds, other: &Bounds) -> Option<i32> {
        let overlap = origin.intersect(other);
        let gap = match self {
            Direction::Left if overlap.top < overlap.bottom => origin.left - other.right,
            Direction::Right if overlap.top < overlap.bottom => other.left - origin.right,
            Direction::Up if overlap.left < overlap.right => origin.top - other.bottom,
            Direction::Down if overlap.left < overlap.right => other.top - origin.bottom,
            _ => return None,
        };
        (gap >= 0).then_some(gap)
    }
}

impl FromStr for Direction {
    type Err = U2Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(U2Error::InvalidArgument(format!(
                "direction must be one of left, right, up, down, got {:?}",
                other
            ))),
        }
    }
}

/// Child lookup strategies that resolve server-side
#[derive(Debug, Clone, PartialEq)]
pub enum ChildQuery {
    Text { text: String, allow_scroll: bool },
    Description { description: String, allow_scroll: bool },
    Instance(u32),
}

/// Scroll operations on a scrollable container
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollAction {
    Forward,
    Backward,
    ToBeginning,
    ToEnd,
    To(Selector),
}

/// Hardware keys accepted by `press_key`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Home,
    Back,
    Left,
    Right,
    Up,
    Down,
    Center,
    Menu,
    Search,
    Enter,
    Delete,
    Recent,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    Camera,
    Power,
}

impl Key {
    pub const NAMES: [&'static str; 18] = [
        "home",
        "back",
        "left",
        "right",
        "up",
        "down",
        "center",
        "menu",
        "search",
        "enter",
        "delete",
        "del",
        "recent",
        "volume_up",
        "volume_down",
        "volume_mute",
        "camera",
        "power",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Key::Home => "home",
            Key::Back => "back",
            Key::Left => "left",
            Key::Right => "right",
            Key::Up => "up",
            Key::Down => "down",
            Key::Center => "center",
            Key::Menu => "menu",
            Key::Search => "search",
            Key::Enter => "enter",
            Key::Delete => "delete",
            Key::Recent => "recent",
            Key::VolumeUp => "volume_up",
            Key::VolumeDown => "volume_down",
            Key::VolumeMute => "volume_mute",
            Key::Camera => "camera",
            Key::Power => "power",
        }
    }
}

impl FromStr for Key {
    type Err = U2Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s {
            "home" => Key::Home,
            "back" => Key::Back,
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            "center" => Key::Center,
            "menu" => Key::Menu,
            "search" => Key::Search,
            "enter" => Key::Enter,
            "delete" | "del" => Key::Delete,
            "recent" => Key::Recent,
            "volume_up" => Key::VolumeUp,
            "volume_down" => Key::VolumeDown,
            "volume_mute" => Key::VolumeMute,
            "camera" => Key::Camera,
            "power" => Key::Power,
            other => {
                return Err(U2Error::InvalidArgument(format!(
                    "unsupported key {:?}, expected one of {}",
                    other,
                    Key::NAMES.join(", ")
                )))
            }
        };
        Ok(key)
    }
}

/// Installed application details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppInfo {
    pub package_name: String,
    pub main_activity: Option<String>,
    /// Launcher label; only the device agent knows it
    pub label: Option<String>,
    pub version_name: Option<String>,
    pub version_code: Option<i64>,
    /// APK size in bytes
    pub size: Option<u64>,
}

/// Foreground application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentApp {
    pub package: String,
    pub activity: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}
