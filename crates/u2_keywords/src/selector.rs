//! uiautomator selectors
//!
//! A selector is an unordered set of matcher criteria. The device agent expects
//! every populated key to be flagged in a bit mask, and child/sibling chains to
//! travel in the parallel `childOrSibling` / `childOrSiblingSelector` arrays.

use serde::ser::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, U2Error};

/// Kind of value a selector key accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Flag,
    Number,
}

/// Every matcher key understood by the uiautomator server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelectorKey {
    Text,
    TextContains,
    TextMatches,
    TextStartsWith,
    ClassName,
    ClassNameMatches,
    Description,
    DescriptionContains,
    DescriptionMatches,
    DescriptionStartsWith,
    Checkable,
    Checked,
    Clickable,
    LongClickable,
    Scrollable,
    Enabled,
    Focusable,
    Focused,
    Selected,
    PackageName,
    PackageNameMatches,
    ResourceId,
    ResourceIdMatches,
    Index,
    Instance,
}

impl SelectorKey {
    pub const ALL: [SelectorKey; 25] = [
        SelectorKey::Text,
        SelectorKey::TextContains,
        SelectorKey::TextMatches,
        SelectorKey::TextStartsWith,
        SelectorKey::ClassName,
        SelectorKey::ClassNameMatches,
        SelectorKey::Description,
        SelectorKey::DescriptionContains,
        SelectorKey::DescriptionMatches,
        SelectorKey::DescriptionStartsWith,
        SelectorKey::Checkable,
        SelectorKey::Checked,
        SelectorKey::Clickable,
        SelectorKey::LongClickable,
        SelectorKey::Scrollable,
        SelectorKey::Enabled,
        SelectorKey::Focusable,
        SelectorKey::Focused,
        SelectorKey::Selected,
        SelectorKey::PackageName,
        SelectorKey::PackageNameMatches,
        SelectorKey::ResourceId,
        SelectorKey::ResourceIdMatches,
        SelectorKey::Index,
        SelectorKey::Instance,
    ];

    /// Wire name of the key (case sensitive)
    pub fn as_str(self) -> &'static str {
        match self {
            SelectorKey::Text => "text",
            SelectorKey::TextContains => "textContains",
            SelectorKey::TextMatches => "textMatches",
            SelectorKey::TextStartsWith => "textStartsWith",
            SelectorKey::ClassName => "className",
            SelectorKey::ClassNameMatches => "classNameMatches",
            SelectorKey::Description => "description",
            SelectorKey::DescriptionContains => "descriptionContains",
            SelectorKey::DescriptionMatches => "descriptionMatches",
            SelectorKey::DescriptionStartsWith => "descriptionStartsWith",
            SelectorKey::Checkable => "checkable",
            SelectorKey::Checked => "checked",
            SelectorKey::Clickable => "clickable",
            SelectorKey::LongClickable => "longClickable",
            SelectorKey::Scrollable => "scrollable",
            SelectorKey::Enabled => "enabled",
            SelectorKey::Focusable => "focusable",
            SelectorKey::Focused => "focused",
            SelectorKey::Selected => "selected",
            SelectorKey::PackageName => "packageName",
            SelectorKey::PackageNameMatches => "packageNameMatches",
            SelectorKey::ResourceId => "resourceId",
            SelectorKey::ResourceIdMatches => "resourceIdMatches",
            SelectorKey::Index => "index",
            SelectorKey::Instance => "instance",
        }
    }

    /// Mask bit announcing the key to the server
    pub fn mask(self) -> u32 {
        1 << (self as u32)
    }

    pub fn kind(self) -> ValueKind {
        match self {
            SelectorKey::Checkable
            | SelectorKey::Checked
            | SelectorKey::Clickable
            | SelectorKey::LongClickable
            | SelectorKey::Scrollable
            | SelectorKey::Enabled
            | SelectorKey::Focusable
            | SelectorKey::Focused
            | SelectorKey::Selected => ValueKind::Flag,
            SelectorKey::Index | SelectorKey::Instance => ValueKind::Number,
            _ => ValueKind::Text,
        }
    }

    pub fn is_key(name: &str) -> bool {
        name.parse::<SelectorKey>().is_ok()
    }
}

impl FromStr for SelectorKey {
    type Err = U2Error;

    fn from_str(s: &str) -> Result<Self> {
        SelectorKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| U2Error::InvalidArgument(format!("unknown selector key: {}", s)))
    }
}

impl fmt::Display for SelectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matcher value attached to a key
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorValue {
    Text(String),
    Flag(bool),
    Number(u32),
}

impl SelectorValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SelectorValue::Text(_) => ValueKind::Text,
            SelectorValue::Flag(_) => ValueKind::Flag,
            SelectorValue::Number(_) => ValueKind::Number,
        }
    }

    /// Parse a raw keyword string into the value kind `key` expects
    pub fn parse(key: SelectorKey, raw: &str) -> Result<Self> {
        match key.kind() {
            ValueKind::Text => Ok(SelectorValue::Text(raw.to_string())),
            ValueKind::Flag => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(SelectorValue::Flag(true)),
                "false" => Ok(SelectorValue::Flag(false)),
                _ => Err(U2Error::InvalidArgument(format!(
                    "selector key {} expects true/false, got {:?}",
                    key, raw
                ))),
            },
            ValueKind::Number => raw.trim().parse::<u32>().map(SelectorValue::Number).map_err(|_| {
                U2Error::InvalidArgument(format!(
                    "selector key {} expects a non-negative integer, got {:?}",
                    key, raw
                ))
            }),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            SelectorValue::Text(s) => json!(s),
            SelectorValue::Flag(b) => json!(b),
            SelectorValue::Number(n) => json!(n),
        }
    }
}

impl From<&str> for SelectorValue {
    fn from(value: &str) -> Self {
        SelectorValue::Text(value.to_string())
    }
}

impl From<String> for SelectorValue {
    fn from(value: String) -> Self {
        SelectorValue::Text(value)
    }
}

impl From<bool> for SelectorValue {
    fn from(value: bool) -> Self {
        SelectorValue::Flag(value)
    }
}

impl From<u32> for SelectorValue {
    fn from(value: u32) -> Self {
        SelectorValue::Number(value)
    }
}

impl fmt::Display for SelectorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorValue::Text(s) => write!(f, "{:?}", s),
            SelectorValue::Flag(b) => write!(f, "{}", b),
            SelectorValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// How a chained selector relates to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Child,
    Sibling,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Child => "child",
            Relation::Sibling => "sibling",
        }
    }
}

/// A set of matcher criteria locating UI elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    fields: BTreeMap<SelectorKey, SelectorValue>,
    chain: Vec<(Relation, Selector)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selector from keyword-style `key=value` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut selector = Selector::new();
        for (key, value) in pairs {
            let key: SelectorKey = key.as_ref().parse()?;
            let value = SelectorValue::parse(key, value.as_ref())?;
            selector.insert(key, value)?;
        }
        Ok(selector)
    }

    /// Insert a criterion, rejecting values of the wrong kind
    pub fn insert(&mut self, key: SelectorKey, value: impl Into<SelectorValue>) -> Result<()> {
        let value = value.into();
        if value.kind() != key.kind() {
            return Err(U2Error::InvalidArgument(format!(
                "selector key {} cannot take value {}",
                key, value
            )));
        }
        self.fields.insert(key, value);
        Ok(())
    }

    fn with(mut self, key: SelectorKey, value: SelectorValue) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.with(SelectorKey::Text, SelectorValue::Text(text.into()))
    }

    pub fn text_contains(self, text: impl Into<String>) -> Self {
        self.with(SelectorKey::TextContains, SelectorValue::Text(text.into()))
    }

    pub fn class_name(self, class_name: impl Into<String>) -> Self {
        self.with(SelectorKey::ClassName, SelectorValue::Text(class_name.into()))
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.with(SelectorKey::Description, SelectorValue::Text(description.into()))
    }

    pub fn resource_id(self, resource_id: impl Into<String>) -> Self {
        self.with(SelectorKey::ResourceId, SelectorValue::Text(resource_id.into()))
    }

    pub fn package_name(self, package: impl Into<String>) -> Self {
        self.with(SelectorKey::PackageName, SelectorValue::Text(package.into()))
    }

    pub fn scrollable(self, scrollable: bool) -> Self {
        self.with(SelectorKey::Scrollable, SelectorValue::Flag(scrollable))
    }

    pub fn focused(self, focused: bool) -> Self {
        self.with(SelectorKey::Focused, SelectorValue::Flag(focused))
    }

    pub fn clickable(self, clickable: bool) -> Self {
        self.with(SelectorKey::Clickable, SelectorValue::Flag(clickable))
    }

    pub fn index(self, index: u32) -> Self {
        self.with(SelectorKey::Index, SelectorValue::Number(index))
    }

    pub fn instance(self, instance: u32) -> Self {
        self.with(SelectorKey::Instance, SelectorValue::Number(instance))
    }

    pub fn get(&self, key: SelectorKey) -> Option<&SelectorValue> {
        self.fields.get(&key)
    }

    /// True when the selector carries no criteria and no chain
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.chain.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn mask(&self) -> u32 {
        self.fields.keys().fold(0, |mask, key| mask | key.mask())
    }

    /// New selector matching children of this one that satisfy `child`
    pub fn child(&self, child: Selector) -> Selector {
        let mut chained = self.clone();
        chained.chain.push((Relation::Child, child));
        chained
    }

    /// New selector matching siblings of this one that satisfy `sibling`
    pub fn sibling(&self, sibling: Selector) -> Selector {
        let mut chained = self.clone();
        chained.chain.push((Relation::Sibling, sibling));
        chained
    }

    pub fn chain(&self) -> &[(Relation, Selector)] {
        &self.chain
    }

    /// Copy with `instance` set on the innermost selector of the chain
    pub fn with_instance(&self, instance: u32) -> Selector {
        let mut updated = self.clone();
        match updated.chain.last_mut() {
            Some((_, last)) => {
                last.fields
                    .insert(SelectorKey::Instance, SelectorValue::Number(instance));
            }
            None => {
                updated
                    .fields
                    .insert(SelectorKey::Instance, SelectorValue::Number(instance));
            }
        }
        updated
    }

    /// Wire representation sent to the uiautomator server
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("mask".to_string(), json!(self.mask()));
        map.insert(
            "childOrSibling".to_string(),
            Value::Array(
                self.chain
                    .iter()
                    .map(|(relation, _)| json!(relation.as_str()))
                    .collect(),
            ),
        );
        map.insert(
            "childOrSiblingSelector".to_string(),
            Value::Array(self.chain.iter().map(|(_, s)| s.to_json()).collect()),
        );
        for (key, value) in &self.fields {
            map.insert(key.as_str().to_string(), value.to_json());
        }
        Value::Object(map)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        write!(f, "{}", parts.join(", "))?;
        for (relation, selector) in &self.chain {
            write!(f, " > {}({})", relation.as_str(), selector)?;
        }
        Ok(())
    }
}
