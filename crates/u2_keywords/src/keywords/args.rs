//! Keyword argument values and the rules that turn loose calls into typed ones

use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::config::{try_secs, MAX_WAIT};
use crate::driver::{UiObject, XmlElement};
use crate::error::{Result, U2Error};
use crate::selector::Selector;

/// What a by-locator keyword operates on
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Element(UiObject),
    Selector(Selector),
}

impl Target {
    /// The element to act on; an empty selector is rejected
    pub fn resolve(&self, keyword: &str) -> Result<UiObject> {
        match self {
            Target::Element(element) => Ok(element.clone()),
            Target::Selector(selector) if selector.is_empty() => {
                Err(U2Error::invalid(keyword, "needs a non-empty selector"))
            }
            Target::Selector(selector) => Ok(UiObject::new(selector.clone())),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Target::Element(_))
    }
}

impl From<UiObject> for Target {
    fn from(element: UiObject) -> Self {
        Target::Element(element)
    }
}

impl From<Selector> for Target {
    fn from(selector: Selector) -> Self {
        Target::Selector(selector)
    }
}

/// What an xpath keyword operates on
#[derive(Debug, Clone, PartialEq)]
pub enum XpathTarget {
    Path(String),
    Element(XmlElement),
}

impl From<&str> for XpathTarget {
    fn from(path: &str) -> Self {
        XpathTarget::Path(path.to_string())
    }
}

impl From<String> for XpathTarget {
    fn from(path: String) -> Self {
        XpathTarget::Path(path)
    }
}

impl From<XmlElement> for XpathTarget {
    fn from(element: XmlElement) -> Self {
        XpathTarget::Element(element)
    }
}

/// Argument and return value of a keyword call
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<KeywordValue>),
    Json(Value),
    Element(UiObject),
    XmlElement(XmlElement),
}

impl KeywordValue {
    /// Parse a literal as written in a step table or on the command line
    ///
    /// Everything but `None` stays text as written; numbers and booleans are
    /// read from it by the parameter that takes them.
    pub fn parse_literal(s: &str) -> KeywordValue {
        let s = s.trim();

        if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
            return KeywordValue::Text(s[1..s.len() - 1].replace("\\n", "\n").replace("\\t", "\t"));
        }
        match s {
            "None" => KeywordValue::None,
            _ => KeywordValue::Text(s.to_string()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            KeywordValue::None => "none",
            KeywordValue::Bool(_) => "bool",
            KeywordValue::Int(_) => "int",
            KeywordValue::Float(_) => "float",
            KeywordValue::Text(_) => "text",
            KeywordValue::List(_) => "list",
            KeywordValue::Json(_) => "mapping",
            KeywordValue::Element(_) => "element",
            KeywordValue::XmlElement(_) => "xpath element",
        }
    }

    /// Number of seconds between zero and `MAX_WAIT`
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            KeywordValue::Int(n) => u64::try_from(*n)
                .ok()
                .map(Duration::from_secs)
                .filter(|d| *d <= MAX_WAIT),
            KeywordValue::Float(f) => try_secs(*f),
            KeywordValue::Text(s) => s.trim().parse::<f64>().ok().and_then(try_secs),
            _ => None,
        }
    }

    /// String form of scalar values
    pub fn as_text(&self) -> Option<String> {
        match self {
            KeywordValue::Text(s) => Some(s.clone()),
            KeywordValue::Int(n) => Some(n.to_string()),
            KeywordValue::Float(f) => Some(f.to_string()),
            KeywordValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeywordValue::Int(n) => Some(*n),
            KeywordValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KeywordValue::Bool(b) => Some(*b),
            KeywordValue::Int(n) => Some(*n != 0),
            KeywordValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert to JSON; handles become their display form
    pub fn to_json(&self) -> Value {
        match self {
            KeywordValue::None => Value::Null,
            KeywordValue::Bool(b) => Value::Bool(*b),
            KeywordValue::Int(n) => Value::from(*n),
            KeywordValue::Float(f) => Value::from(*f),
            KeywordValue::Text(s) => Value::String(s.clone()),
            KeywordValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            KeywordValue::Json(v) => v.clone(),
            KeywordValue::Element(e) => Value::String(e.to_string()),
            KeywordValue::XmlElement(e) => e.info().to_value(),
        }
    }
}

impl fmt::Display for KeywordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordValue::None => write!(f, "None"),
            KeywordValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            KeywordValue::Int(n) => write!(f, "{}", n),
            KeywordValue::Float(v) => write!(f, "{}", v),
            KeywordValue::Text(s) => write!(f, "{}", s),
            KeywordValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            KeywordValue::Json(v) => write!(f, "{}", v),
            KeywordValue::Element(e) => write!(f, "{}", e),
            KeywordValue::XmlElement(e) => write!(f, "<{} text={:?}>", e.tag(), e.text()),
        }
    }
}

impl From<bool> for KeywordValue {
    fn from(b: bool) -> Self {
        KeywordValue::Bool(b)
    }
}

impl From<i64> for KeywordValue {
    fn from(n: i64) -> Self {
        KeywordValue::Int(n)
    }
}

impl From<f64> for KeywordValue {
    fn from(v: f64) -> Self {
        KeywordValue::Float(v)
    }
}

impl From<&str> for KeywordValue {
    fn from(s: &str) -> Self {
        KeywordValue::Text(s.to_string())
    }
}

impl From<String> for KeywordValue {
    fn from(s: String) -> Self {
        KeywordValue::Text(s)
    }
}

impl From<UiObject> for KeywordValue {
    fn from(e: UiObject) -> Self {
        KeywordValue::Element(e)
    }
}

impl From<XmlElement> for KeywordValue {
    fn from(e: XmlElement) -> Self {
        KeywordValue::XmlElement(e)
    }
}

impl<T: Into<KeywordValue>> From<Option<T>> for KeywordValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeywordValue::None, Into::into)
    }
}

/// Role a non-element positional can play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Seconds: timeout, delay or press duration
    Duration,
    /// Free text: the value to type or an attribute name
    Text,
}

impl Role {
    fn name(self) -> &'static str {
        match self {
            Role::Duration => "duration",
            Role::Text => "text",
        }
    }
}

/// Positionals of a by-locator call, sorted by variant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub count: usize,
    pub element: Option<UiObject>,
    pub duration: Option<Duration>,
    pub text: Option<String>,
}

fn unusable(arg: &KeywordValue) -> String {
    match arg {
        KeywordValue::Int(_) | KeywordValue::Float(_) => format!(
            "duration {} is outside 0..={} seconds",
            arg,
            MAX_WAIT.as_secs()
        ),
        _ => format!("cannot use a {} argument {:?}", arg.kind_name(), arg.to_string()),
    }
}

/// Sort positionals into element and primitive slots, rejecting repeats
pub fn classify(keyword: &str, args: &[KeywordValue], roles: &[Role]) -> Result<Shape> {
    if args.len() > roles.len() + 1 {
        return Err(U2Error::wrong_arguments(keyword));
    }

    let mut shape = Shape {
        count: args.len(),
        ..Shape::default()
    };
    for arg in args {
        if let KeywordValue::Element(element) = arg {
            if shape.element.replace(element.clone()).is_some() {
                return Err(U2Error::invalid(keyword, "got two element arguments"));
            }
            continue;
        }

        let role = roles
            .iter()
            .copied()
            .find(|role| match role {
                Role::Duration => arg.as_duration().is_some(),
                Role::Text => arg.as_text().is_some(),
            })
            .ok_or_else(|| U2Error::invalid(keyword, unusable(arg)))?;
        let duplicate = match role {
            Role::Duration => shape
                .duration
                .replace(arg.as_duration().unwrap_or_default())
                .is_some(),
            Role::Text => shape
                .text
                .replace(arg.as_text().unwrap_or_default())
                .is_some(),
        };
        if duplicate {
            return Err(U2Error::invalid(
                keyword,
                format!("got two {} arguments", role.name()),
            ));
        }
    }
    Ok(shape)
}

/// Pick the target of a by-locator call
///
/// An element is used as is and excludes any selector keys. Without an
/// element, the selector must be non-empty and at most one primitive may
/// accompany it.
pub fn locate(keyword: &str, shape: &Shape, selector: Selector) -> Result<Target> {
    match (&shape.element, selector.is_empty()) {
        (Some(element), true) => Ok(Target::Element(element.clone())),
        (None, false) if shape.count <= 1 => Ok(Target::Selector(selector)),
        _ => Err(U2Error::wrong_arguments(keyword)),
    }
}

/// Convert named arguments into a selector
pub fn selector_from(keyword: &str, named: Vec<(String, KeywordValue)>) -> Result<Selector> {
    let mut pairs = Vec::with_capacity(named.len());
    for (key, value) in named {
        let raw = value.as_text().ok_or_else(|| {
            U2Error::invalid(
                keyword,
                format!("selector key {} cannot take a {}", key, value.kind_name()),
            )
        })?;
        pairs.push((key, raw));
    }
    Selector::from_pairs(pairs)
}

/// Arguments bound to a fixed parameter list
#[derive(Debug)]
pub struct Bound {
    keyword: String,
    slots: Vec<(&'static str, Option<KeywordValue>)>,
}

impl Bound {
    fn take(&mut self, name: &str) -> Option<KeywordValue> {
        self.slots
            .iter_mut()
            .find(|(param, _)| *param == name)
            .and_then(|(_, value)| value.take())
            .filter(|value| *value != KeywordValue::None)
    }

    fn missing(&self, name: &str) -> U2Error {
        U2Error::invalid(&self.keyword, format!("missing required argument {}", name))
    }

    fn wrong_type(&self, name: &str, expected: &str, got: &KeywordValue) -> U2Error {
        U2Error::invalid(
            &self.keyword,
            format!("argument {} must be {}, got {}", name, expected, got.kind_name()),
        )
    }

    pub fn text(&mut self, name: &str) -> Result<String> {
        self.opt_text(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn opt_text(&mut self, name: &str) -> Result<Option<String>> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => value
                .as_text()
                .map(Some)
                .ok_or_else(|| self.wrong_type(name, "text", &value)),
        }
    }

    pub fn opt_duration(&mut self, name: &str) -> Result<Option<Duration>> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => value
                .as_duration()
                .map(Some)
                .ok_or_else(|| {
                    let expected = format!("seconds between 0 and {}", MAX_WAIT.as_secs());
                    self.wrong_type(name, &expected, &value)
                }),
        }
    }

    pub fn int(&mut self, name: &str) -> Result<i64> {
        self.opt_int(name)?.ok_or_else(|| self.missing(name))
    }

    pub fn opt_int(&mut self, name: &str) -> Result<Option<i64>> {
        match self.take(name) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(name, "an integer", &value)),
        }
    }

    pub fn coordinate(&mut self, name: &str) -> Result<i32> {
        let value = self.int(name)?;
        i32::try_from(value)
            .map_err(|_| U2Error::invalid(&self.keyword, format!("{} out of range: {}", name, value)))
    }

    pub fn bool(&mut self, name: &str) -> Result<bool> {
        match self.take(name) {
            None => Err(self.missing(name)),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| self.wrong_type(name, "a boolean", &value)),
        }
    }

    pub fn element(&mut self, name: &str) -> Result<UiObject> {
        match self.take(name) {
            Some(KeywordValue::Element(element)) => Ok(element),
            Some(other) => Err(self.wrong_type(name, "an element", &other)),
            None => Err(self.missing(name)),
        }
    }

    pub fn xpath_target(&mut self, name: &str) -> Result<XpathTarget> {
        match self.take(name) {
            Some(KeywordValue::XmlElement(element)) => Ok(XpathTarget::Element(element)),
            Some(KeywordValue::Text(path)) => Ok(XpathTarget::Path(path)),
            Some(other) => Err(self.wrong_type(name, "an xpath or xpath element", &other)),
            None => Err(self.missing(name)),
        }
    }
}

/// Bind positionals in order and named arguments by parameter name
///
/// Named arguments that are not parameters are returned for use as selector
/// keys when `allow_extra` is set, and rejected otherwise.
pub fn bind(
    keyword: &str,
    params: &[&'static str],
    args: Vec<KeywordValue>,
    named: Vec<(String, KeywordValue)>,
    allow_extra: bool,
) -> Result<(Bound, Vec<(String, KeywordValue)>)> {
    if args.len() > params.len() {
        return Err(U2Error::invalid(
            keyword,
            format!(
                "takes at most {} positional arguments, got {}",
                params.len(),
                args.len()
            ),
        ));
    }

    let mut slots: Vec<(&'static str, Option<KeywordValue>)> =
        params.iter().map(|p| (*p, None)).collect();
    for (slot, value) in slots.iter_mut().zip(args) {
        slot.1 = Some(value);
    }

    let mut extra = Vec::new();
    for (name, value) in named {
        match slots.iter_mut().find(|(param, _)| *param == name) {
            Some((_, slot)) if slot.is_some() => {
                return Err(U2Error::invalid(
                    keyword,
                    format!("got multiple values for argument {}", name),
                ))
            }
            Some((_, slot)) => *slot = Some(value),
            None if allow_extra => extra.push((name, value)),
            None => {
                return Err(U2Error::invalid(
                    keyword,
                    format!("got an unexpected argument {}", name),
                ))
            }
        }
    }

    Ok((
        Bound {
            keyword: keyword.to_string(),
            slots,
        },
        extra,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element() -> KeywordValue {
        KeywordValue::Element(UiObject::new(Selector::new().resource_id("id/ok")))
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(KeywordValue::parse_literal("None"), KeywordValue::None);
        assert_eq!(KeywordValue::parse_literal(" 5 "), KeywordValue::from("5"));
        assert_eq!(
            KeywordValue::parse_literal("\"42\""),
            KeywordValue::Text("42".to_string())
        );
        assert_eq!(
            KeywordValue::parse_literal("hello world"),
            KeywordValue::Text("hello world".to_string())
        );
    }

    #[test]
    fn test_literals_keep_source_text() {
        for raw in ["007", "True", "1.50", "+1", "1e3"] {
            let value = KeywordValue::parse_literal(raw);
            assert_eq!(value.as_text().as_deref(), Some(raw));
        }
        assert_eq!(KeywordValue::parse_literal("007").as_i64(), Some(7));
        assert_eq!(KeywordValue::parse_literal("True").as_bool(), Some(true));
        assert_eq!(
            KeywordValue::parse_literal("1.50").as_duration(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_duration_range() {
        assert_eq!(KeywordValue::Int(2).as_duration(), Some(Duration::from_secs(2)));
        assert_eq!(KeywordValue::Int(-1).as_duration(), None);
        assert_eq!(KeywordValue::Int(i64::MAX).as_duration(), None);
        assert_eq!(KeywordValue::Float(1e20).as_duration(), None);
        assert_eq!(KeywordValue::Float(f64::NAN).as_duration(), None);
        assert_eq!(KeywordValue::from("inf").as_duration(), None);
        assert_eq!(KeywordValue::from("soon").as_duration(), None);
        assert_eq!(
            KeywordValue::Int(MAX_WAIT.as_secs() as i64).as_duration(),
            Some(MAX_WAIT)
        );

        let err = classify("k", &[KeywordValue::Float(1e20)], &[Role::Duration]).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn test_classify_is_order_independent() {
        let a = classify("k", &[element(), KeywordValue::Int(3)], &[Role::Duration]).unwrap();
        let b = classify("k", &[KeywordValue::Int(3), element()], &[Role::Duration]).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.duration, Some(Duration::from_secs(3)));
        assert!(a.element.is_some());
    }

    #[test]
    fn test_classify_rejects_same_kind_pairs() {
        let err = classify("click_element_by_locator", &[element(), element()], &[Role::Duration])
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("click_element_by_locator"));

        let err = classify(
            "k",
            &[KeywordValue::Int(1), KeywordValue::Int(2)],
            &[Role::Duration],
        )
        .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_classify_rejects_unusable_kind() {
        let err = classify("k", &[KeywordValue::Text("soon".into())], &[Role::Duration]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_text_role_stringifies_numbers() {
        let shape = classify("k", &[KeywordValue::Int(5)], &[Role::Text]).unwrap();
        assert_eq!(shape.text.as_deref(), Some("5"));
    }

    #[test]
    fn test_locate_rules() {
        let selector = Selector::new().text("OK");
        let one_element = classify("k", &[element()], &[Role::Duration]).unwrap();
        let one_primitive = classify("k", &[KeywordValue::Int(1)], &[Role::Duration]).unwrap();
        let none = Shape::default();

        assert!(locate("k", &one_element, Selector::new()).unwrap().is_element());
        assert!(locate("k", &one_element, selector.clone()).is_err());
        assert_eq!(
            locate("k", &one_primitive, selector.clone()).unwrap(),
            Target::Selector(selector.clone())
        );
        assert!(locate("k", &one_primitive, Selector::new()).is_err());
        assert_eq!(
            locate("k", &none, selector.clone()).unwrap(),
            Target::Selector(selector)
        );
        assert!(locate("k", &none, Selector::new()).is_err());
    }

    #[test]
    fn test_bind_named_and_positional() {
        let (mut bound, extra) = bind(
            "swipe",
            &["fx", "fy", "tx", "ty", "steps"],
            vec![KeywordValue::Int(1), KeywordValue::Int(2)],
            vec![
                ("ty".to_string(), KeywordValue::Int(4)),
                ("tx".to_string(), KeywordValue::Int(3)),
            ],
            false,
        )
        .unwrap();

        assert!(extra.is_empty());
        assert_eq!(bound.coordinate("fx").unwrap(), 1);
        assert_eq!(bound.coordinate("tx").unwrap(), 3);
        assert_eq!(bound.opt_int("steps").unwrap(), None);
    }

    #[test]
    fn test_bind_rejects_duplicates_and_unknown() {
        let dup = bind(
            "k",
            &["x"],
            vec![KeywordValue::Int(1)],
            vec![("x".to_string(), KeywordValue::Int(2))],
            false,
        );
        assert!(dup.unwrap_err().is_invalid_argument());

        let unknown = bind("k", &["x"], vec![], vec![("y".to_string(), KeywordValue::Int(2))], false);
        assert!(unknown.unwrap_err().is_invalid_argument());

        let (_, extra) = bind(
            "k",
            &["x"],
            vec![],
            vec![("text".to_string(), KeywordValue::from("OK"))],
            true,
        )
        .unwrap();
        assert_eq!(extra.len(), 1);
    }

    #[test]
    fn test_selector_from_named() {
        let selector = selector_from(
            "k",
            vec![
                ("text".to_string(), KeywordValue::from("OK")),
                ("instance".to_string(), KeywordValue::Int(2)),
            ],
        )
        .unwrap();
        assert_eq!(selector.len(), 2);

        let err = selector_from("k", vec![("bogus".to_string(), KeywordValue::from("x"))]).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
