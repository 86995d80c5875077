//! Loosely typed keyword dispatch
//!
//! A call is a keyword name plus positional and named `KeywordValue`s, the
//! way a test runner hands them over. By-locator keywords sort positionals
//! by variant and read named arguments as selector keys; every other keyword
//! has a fixed parameter list.

use phf::phf_map;
use serde_json::Value;
use tracing::{debug, info};

use super::args::{bind, classify, locate, selector_from, KeywordValue, Role, Shape, Target};
use super::Mobile;
use crate::driver::{Automation, Connect, U2Device, UiObject};
use crate::error::{Result, U2Error};
use crate::selector::Selector;

/// Keyword name -> usage
static KEYWORDS: phf::Map<&'static str, &'static str> = phf_map! {
    "connect_device" => "[serial]",
    "clear_element_text_by_locator" => "<element> [timeout] | [timeout] key=value...",
    "click_element_by_locator" => "<element> [timeout] | [timeout] key=value...",
    "element_is_existed_by_locator" => "<element> [delay] | [delay] key=value...",
    "find_element_by_locator" => "<element> [timeout] | [timeout] key=value...",
    "find_element_by_locator_with_direction" => "<element> <left|right|up|down> key=value...",
    "find_element_child_by_locator" => "<element> [delay] [key=value...] | [delay] key=value...",
    "find_element_child_by_locator_with_description" => "<parent> <txt> key=value...",
    "find_element_child_by_locator_with_index" => "<parent> <index> key=value...",
    "find_element_child_by_locator_with_text" => "<parent> <txt> key=value...",
    "find_element_sibling_by_locator" => "<element> key=value...",
    "get_element_attribute_by_locator" => "<element> [delay] [attribute] | [delay|attribute] key=value...",
    "get_element_text_by_locator" => "<element> [timeout] | [timeout] key=value...",
    "get_elements_count_by_locator" => "<element> [timeout] | [timeout] key=value...",
    "long_click_element_by_locator" => "<element> [duration] | [duration] key=value...",
    "scroll_backward" => "",
    "scroll_forward" => "",
    "scroll_to_beginning" => "",
    "scroll_to_end" => "",
    "scroll_to_text" => "<text>",
    "set_element_text_by_locator" => "<element> <text> | <text> key=value...",
    "wait_element_visible_by_locator" => "<element> [timeout] | [timeout] key=value...",
    "wait_element_invisible_by_locator" => "<element> [timeout] | [timeout] key=value...",
    "dev_app_clear" => "<package>",
    "dev_app_info" => "<package>",
    "dev_app_install" => "<path or url>",
    "dev_app_start" => "<package>",
    "dev_app_stop" => "<package>",
    "dev_app_uninstall" => "<package>",
    "dev_click_screen" => "<x> <y>",
    "dev_current_app" => "",
    "dev_double_click_screen" => "<x> <y>",
    "dev_get_device_info" => "",
    "dev_get_page_text" => "",
    "dev_get_toast_message" => "",
    "dev_get_window_size" => "",
    "dev_long_click_screen" => "<x> <y> [duration]",
    "dev_press_key" => "<key>",
    "dev_screenshot" => "<filename>",
    "dev_scroll_to_deep_end" => "",
    "dev_show_float_window" => "",
    "dev_swipe_screen" => "<fx> <fy> <tx> <ty> [steps]",
    "dev_turn_screen" => "<status>",
    "dev_wait_activity" => "<activity>",
    "click_element_by_xpath" => "<xpath|element> [timeout]",
    "long_click_element_by_xpath" => "<xpath|element> [timeout]",
    "element_is_existed_by_xpath" => "<xpath> [timeout]",
    "find_element_by_xpath" => "<xpath> [timeout]",
    "find_elements_by_xpath" => "<xpath> [timeout]",
    "find_parent_element_by_xpath" => "<xpath|element> [timeout]",
    "get_element_attribute_by_xpath" => "<xpath|element> [attribute] [timeout]",
    "get_element_text_by_xpath" => "<xpath|element> [timeout]",
    "set_element_text_by_xpath" => "<xpath|element> <text> [timeout]",
    "wait_element_visible_by_xpath" => "<xpath> [timeout]",
    "wait_element_invisible_by_xpath" => "<xpath> [timeout]",
};

/// All keywords with their usage, sorted by name
pub fn keyword_catalog() -> Vec<(&'static str, &'static str)> {
    let mut catalog: Vec<(&'static str, &'static str)> =
        KEYWORDS.entries().map(|(name, usage)| (*name, *usage)).collect();
    catalog.sort_unstable();
    catalog
}

fn normalize(name: &str) -> String {
    name.trim()
        .split(|c: char| c == ' ' || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Resolve a keyword name as the runner spells it; `dev_` is optional
fn canonical(name: &str) -> Result<&'static str> {
    let normalized = normalize(name);
    let prefixed = format!("dev_{}", normalized);
    [normalized.as_str(), prefixed.as_str()]
        .iter()
        .find_map(|candidate| KEYWORDS.get_entry(*candidate).map(|(key, _)| *key))
        .ok_or_else(|| U2Error::InvalidArgument(format!("unknown keyword {:?}", name)))
}

/// Split a by-locator call into its positional shape and target
fn by_locator(
    keyword: &str,
    mut args: Vec<KeywordValue>,
    named: Vec<(String, KeywordValue)>,
    roles: &[Role],
    primitive: Option<&str>,
) -> Result<(Shape, Target)> {
    let mut selector_pairs = Vec::with_capacity(named.len());
    for (name, value) in named {
        if Some(name.as_str()) == primitive {
            args.push(value);
        } else {
            selector_pairs.push((name, value));
        }
    }
    let shape = classify(keyword, &args, roles)?;
    let selector = selector_from(keyword, selector_pairs)?;
    let target = locate(keyword, &shape, selector)?;
    Ok((shape, target))
}

fn none() -> Result<KeywordValue> {
    Ok(KeywordValue::None)
}

fn json<T: serde::Serialize>(value: &T) -> Result<KeywordValue> {
    Ok(KeywordValue::Json(serde_json::to_value(value)?))
}

fn json_value(value: Value) -> KeywordValue {
    match value {
        Value::Null => KeywordValue::None,
        Value::Bool(b) => KeywordValue::Bool(b),
        Value::String(s) => KeywordValue::Text(s),
        Value::Number(n) => match n.as_i64() {
            Some(i) => KeywordValue::Int(i),
            None => KeywordValue::Float(n.as_f64().unwrap_or_default()),
        },
        other => KeywordValue::Json(other),
    }
}

/// Runs keywords by name against one `Mobile`
pub struct KeywordLibrary<A = U2Device> {
    mobile: Mobile<A>,
}

impl<A: Automation + Connect> KeywordLibrary<A> {
    pub fn new(mobile: Mobile<A>) -> Self {
        Self { mobile }
    }

    pub fn mobile(&self) -> &Mobile<A> {
        &self.mobile
    }

    /// Execute `name` with runner-style arguments
    pub async fn run_keyword(
        &self,
        name: &str,
        args: Vec<KeywordValue>,
        named: Vec<(String, KeywordValue)>,
    ) -> Result<KeywordValue> {
        let keyword = canonical(name)?;
        info!("Keyword: {}", keyword);
        debug!("{} args={:?} named={:?}", keyword, args, named);

        let result = self.dispatch(keyword, args, named).await;
        match &result {
            Ok(value) => debug!("{} -> {}", keyword, value),
            Err(e) => info!("{} failed: {}", keyword, e),
        }
        result
    }

    async fn dispatch(
        &self,
        keyword: &'static str,
        args: Vec<KeywordValue>,
        named: Vec<(String, KeywordValue)>,
    ) -> Result<KeywordValue> {
        let ui = self.mobile.ui();
        let device = self.mobile.device();
        let xpath = self.mobile.xpath();
        let timeout = [Role::Duration];

        match keyword {
            "connect_device" => {
                let (mut p, _) = bind(keyword, &["serial"], args, named, false)?;
                let serial = p.opt_text("serial")?;
                self.mobile.connect_device(serial.as_deref()).await?;
                none()
            }

            "clear_element_text_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("timeout"))?;
                ui.clear_element_text_by_locator(&target, shape.duration).await?;
                none()
            }
            "click_element_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("timeout"))?;
                let clicked = ui.click_element_by_locator(&target, shape.duration).await?;
                Ok(KeywordValue::Bool(clicked))
            }
            "element_is_existed_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("delay"))?;
                let existed = ui
                    .element_is_existed_by_locator(&target, shape.duration)
                    .await?;
                Ok(KeywordValue::Bool(existed))
            }
            "find_element_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("timeout"))?;
                let element = ui.find_element_by_locator(&target, shape.duration).await?;
                Ok(KeywordValue::Element(element))
            }
            "find_element_child_by_locator" => self.find_child(keyword, args, named).await,
            "get_element_attribute_by_locator" => {
                let (shape, target) =
                    by_locator(keyword, args, named, &[Role::Duration, Role::Text], None)?;
                let value = ui
                    .get_element_attribute_by_locator(
                        &target,
                        shape.text.as_deref(),
                        shape.duration,
                    )
                    .await?;
                Ok(json_value(value))
            }
            "get_element_text_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("timeout"))?;
                let text = ui.get_element_text_by_locator(&target, shape.duration).await?;
                Ok(KeywordValue::Text(text))
            }
            "get_elements_count_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("timeout"))?;
                let count = ui
                    .get_elements_count_by_locator(&target, shape.duration)
                    .await?;
                Ok(KeywordValue::Int(count as i64))
            }
            "long_click_element_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("duration"))?;
                ui.long_click_element_by_locator(&target, shape.duration)
                    .await?;
                none()
            }
            "set_element_text_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &[Role::Text], None)?;
                let text = shape
                    .text
                    .ok_or_else(|| U2Error::wrong_arguments(keyword))?;
                ui.set_element_text_by_locator(&target, &text, None).await?;
                none()
            }
            "wait_element_visible_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("timeout"))?;
                let visible = ui
                    .wait_element_visible_by_locator(&target, shape.duration)
                    .await?;
                Ok(KeywordValue::Bool(visible))
            }
            "wait_element_invisible_by_locator" => {
                let (shape, target) = by_locator(keyword, args, named, &timeout, Some("timeout"))?;
                let gone = ui
                    .wait_element_invisible_by_locator(&target, shape.duration)
                    .await?;
                Ok(KeywordValue::Bool(gone))
            }

            "find_element_by_locator_with_direction" => {
                let (mut p, extra) = bind(keyword, &["element", "direction"], args, named, true)?;
                let element = p.element("element")?;
                let direction = p.text("direction")?.parse()?;
                let selector = selector_from(keyword, extra)?;
                let found = ui
                    .find_element_by_locator_with_direction(&element, direction, &selector)
                    .await?;
                Ok(found.into())
            }
            "find_element_child_by_locator_with_description" => {
                let (mut p, extra) = bind(keyword, &["parent", "txt"], args, named, true)?;
                let parent = p.element("parent")?;
                let description = p.text("txt")?;
                let selector = selector_from(keyword, extra)?;
                let child = ui
                    .find_element_child_by_locator_with_description(&parent, &description, &selector)
                    .await?;
                Ok(KeywordValue::Element(child))
            }
            "find_element_child_by_locator_with_index" => {
                let (mut p, extra) = bind(keyword, &["parent", "index"], args, named, true)?;
                let parent = p.element("parent")?;
                let index = p.int("index")?;
                let index = u32::try_from(index)
                    .map_err(|_| U2Error::invalid(keyword, format!("index must be >= 0, got {}", index)))?;
                let selector = selector_from(keyword, extra)?;
                let child = ui
                    .find_element_child_by_locator_with_index(&parent, index, &selector)
                    .await?;
                Ok(KeywordValue::Element(child))
            }
            "find_element_child_by_locator_with_text" => {
                let (mut p, extra) = bind(keyword, &["parent", "txt"], args, named, true)?;
                let parent = p.element("parent")?;
                let text = p.text("txt")?;
                let selector = selector_from(keyword, extra)?;
                let child = ui
                    .find_element_child_by_locator_with_text(&parent, &text, &selector)
                    .await?;
                Ok(KeywordValue::Element(child))
            }
            "find_element_sibling_by_locator" => {
                let (mut p, extra) = bind(keyword, &["element"], args, named, true)?;
                let element = p.element("element")?;
                let selector = selector_from(keyword, extra)?;
                Ok(KeywordValue::Element(
                    ui.find_element_sibling_by_locator(&element, &selector)?,
                ))
            }
            "scroll_backward" => {
                bind(keyword, &[], args, named, false)?;
                Ok(KeywordValue::Bool(ui.scroll_backward().await?))
            }
            "scroll_forward" => {
                bind(keyword, &[], args, named, false)?;
                Ok(KeywordValue::Bool(ui.scroll_forward().await?))
            }
            "scroll_to_beginning" => {
                bind(keyword, &[], args, named, false)?;
                Ok(KeywordValue::Bool(ui.scroll_to_beginning().await?))
            }
            "scroll_to_end" => {
                bind(keyword, &[], args, named, false)?;
                Ok(KeywordValue::Bool(ui.scroll_to_end().await?))
            }
            "scroll_to_text" => {
                let (mut p, _) = bind(keyword, &["text"], args, named, false)?;
                let text = p.text("text")?;
                Ok(KeywordValue::Bool(ui.scroll_to_text(&text).await?))
            }

            "dev_app_clear" => {
                let (mut p, _) = bind(keyword, &["package"], args, named, false)?;
                device.app_clear(&p.text("package")?).await?;
                none()
            }
            "dev_app_info" => {
                let (mut p, _) = bind(keyword, &["package"], args, named, false)?;
                json(&device.app_info(&p.text("package")?).await?)
            }
            "dev_app_install" => {
                let (mut p, _) = bind(keyword, &["data"], args, named, false)?;
                device.app_install(&p.text("data")?).await?;
                none()
            }
            "dev_app_start" => {
                let (mut p, _) = bind(keyword, &["package"], args, named, false)?;
                device.app_start(&p.text("package")?).await?;
                none()
            }
            "dev_app_stop" => {
                let (mut p, _) = bind(keyword, &["package"], args, named, false)?;
                device.app_stop(&p.text("package")?).await?;
                none()
            }
            "dev_app_uninstall" => {
                let (mut p, _) = bind(keyword, &["package"], args, named, false)?;
                Ok(KeywordValue::Bool(
                    device.app_uninstall(&p.text("package")?).await?,
                ))
            }
            "dev_click_screen" => {
                let (mut p, _) = bind(keyword, &["x", "y"], args, named, false)?;
                device
                    .click_screen(p.coordinate("x")?, p.coordinate("y")?)
                    .await?;
                none()
            }
            "dev_current_app" => {
                bind(keyword, &[], args, named, false)?;
                json(&device.current_app().await?)
            }
            "dev_double_click_screen" => {
                let (mut p, _) = bind(keyword, &["x", "y"], args, named, false)?;
                device
                    .double_click_screen(p.coordinate("x")?, p.coordinate("y")?)
                    .await?;
                none()
            }
            "dev_get_device_info" => {
                bind(keyword, &[], args, named, false)?;
                Ok(KeywordValue::Json(device.get_device_info().await?))
            }
            "dev_get_page_text" => {
                bind(keyword, &[], args, named, false)?;
                let texts = device.get_page_text().await?;
                Ok(KeywordValue::List(
                    texts.into_iter().map(KeywordValue::Text).collect(),
                ))
            }
            "dev_get_toast_message" => {
                bind(keyword, &[], args, named, false)?;
                Ok(device.get_toast_message().await?.into())
            }
            "dev_get_window_size" => {
                bind(keyword, &[], args, named, false)?;
                let size = device.get_window_size().await?;
                Ok(KeywordValue::List(vec![
                    KeywordValue::Int(size.width.into()),
                    KeywordValue::Int(size.height.into()),
                ]))
            }
            "dev_long_click_screen" => {
                let (mut p, _) = bind(keyword, &["x", "y", "duration"], args, named, false)?;
                let (x, y) = (p.coordinate("x")?, p.coordinate("y")?);
                device
                    .long_click_screen(x, y, p.opt_duration("duration")?)
                    .await?;
                none()
            }
            "dev_press_key" => {
                let (mut p, _) = bind(keyword, &["key"], args, named, false)?;
                Ok(KeywordValue::Bool(device.press_key(&p.text("key")?).await?))
            }
            "dev_screenshot" => {
                let (mut p, _) = bind(keyword, &["filename"], args, named, false)?;
                let path = device.screenshot(p.text("filename")?).await?;
                Ok(KeywordValue::Text(path.display().to_string()))
            }
            "dev_scroll_to_deep_end" => {
                bind(keyword, &[], args, named, false)?;
                device.scroll_to_deep_end().await?;
                none()
            }
            "dev_show_float_window" => {
                bind(keyword, &[], args, named, false)?;
                device.show_float_window().await?;
                none()
            }
            "dev_swipe_screen" => {
                let (mut p, _) =
                    bind(keyword, &["fx", "fy", "tx", "ty", "steps"], args, named, false)?;
                let (fx, fy) = (p.coordinate("fx")?, p.coordinate("fy")?);
                let (tx, ty) = (p.coordinate("tx")?, p.coordinate("ty")?);
                let steps = match p.opt_int("steps")? {
                    Some(steps) => Some(u32::try_from(steps).map_err(|_| {
                        U2Error::invalid(keyword, format!("steps must be >= 0, got {}", steps))
                    })?),
                    None => None,
                };
                device.swipe_screen(fx, fy, tx, ty, steps).await?;
                none()
            }
            "dev_turn_screen" => {
                let (mut p, _) = bind(keyword, &["status"], args, named, false)?;
                device.turn_screen(p.bool("status")?).await?;
                none()
            }
            "dev_wait_activity" => {
                let (mut p, _) = bind(keyword, &["activity"], args, named, false)?;
                Ok(KeywordValue::Bool(
                    device.wait_activity(&p.text("activity")?).await?,
                ))
            }

            "click_element_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let target = p.xpath_target("xpath")?;
                xpath
                    .click_element_by_xpath(&target, p.opt_duration("timeout")?)
                    .await?;
                none()
            }
            "long_click_element_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let target = p.xpath_target("xpath")?;
                xpath
                    .long_click_element_by_xpath(&target, p.opt_duration("timeout")?)
                    .await?;
                none()
            }
            "element_is_existed_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let path = p.text("xpath")?;
                Ok(KeywordValue::Bool(
                    xpath
                        .element_is_existed_by_xpath(&path, p.opt_duration("timeout")?)
                        .await?,
                ))
            }
            "find_element_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let path = p.text("xpath")?;
                let element = xpath
                    .find_element_by_xpath(&path, p.opt_duration("timeout")?)
                    .await?;
                Ok(KeywordValue::XmlElement(element))
            }
            "find_elements_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let path = p.text("xpath")?;
                let elements = xpath
                    .find_elements_by_xpath(&path, p.opt_duration("timeout")?)
                    .await?;
                Ok(KeywordValue::List(
                    elements.into_iter().map(KeywordValue::XmlElement).collect(),
                ))
            }
            "find_parent_element_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let target = p.xpath_target("xpath")?;
                let parent = xpath
                    .find_parent_element_by_xpath(&target, p.opt_duration("timeout")?)
                    .await?;
                Ok(KeywordValue::XmlElement(parent))
            }
            "get_element_attribute_by_xpath" => {
                let (mut p, _) =
                    bind(keyword, &["xpath", "attribute", "timeout"], args, named, false)?;
                let target = p.xpath_target("xpath")?;
                let attribute = p.opt_text("attribute")?;
                let value = xpath
                    .get_element_attribute_by_xpath(
                        &target,
                        attribute.as_deref(),
                        p.opt_duration("timeout")?,
                    )
                    .await?;
                Ok(json_value(value))
            }
            "get_element_text_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let target = p.xpath_target("xpath")?;
                let text = xpath
                    .get_element_text_by_xpath(&target, p.opt_duration("timeout")?)
                    .await?;
                Ok(KeywordValue::Text(text))
            }
            "set_element_text_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "text", "timeout"], args, named, false)?;
                let target = p.xpath_target("xpath")?;
                let text = p.text("text")?;
                xpath
                    .set_element_text_by_xpath(&target, &text, p.opt_duration("timeout")?)
                    .await?;
                none()
            }
            "wait_element_visible_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let path = p.text("xpath")?;
                Ok(KeywordValue::Bool(
                    xpath
                        .wait_element_visible_by_xpath(&path, p.opt_duration("timeout")?)
                        .await?,
                ))
            }
            "wait_element_invisible_by_xpath" => {
                let (mut p, _) = bind(keyword, &["xpath", "timeout"], args, named, false)?;
                let path = p.text("xpath")?;
                Ok(KeywordValue::Bool(
                    xpath
                        .wait_element_invisible_by_xpath(&path, p.opt_duration("timeout")?)
                        .await?,
                ))
            }

            other => Err(U2Error::InvalidArgument(format!(
                "keyword {} has no handler",
                other
            ))),
        }
    }

    /// Child lookup: the selector describes the child, so an element and
    /// selector keys may be combined
    async fn find_child(
        &self,
        keyword: &str,
        args: Vec<KeywordValue>,
        named: Vec<(String, KeywordValue)>,
    ) -> Result<KeywordValue> {
        let mut args = args;
        let mut pairs = Vec::with_capacity(named.len());
        for (name, value) in named {
            if name == "delay" {
                args.push(value);
            } else {
                pairs.push((name, value));
            }
        }
        let shape = classify(keyword, &args, &[Role::Duration])?;
        let selector = selector_from(keyword, pairs)?;

        let (target, child) = match shape.element {
            Some(element) => (Target::Element(element), selector),
            None if shape.count <= 1 && !selector.is_empty() => {
                (Target::Selector(selector), Selector::new())
            }
            None => return Err(U2Error::wrong_arguments(keyword)),
        };
        let child: UiObject = self
            .mobile
            .ui()
            .find_element_child_by_locator(&target, &child, shape.duration)
            .await?;
        Ok(KeywordValue::Element(child))
    }
}

impl<A: Automation + Connect> From<Mobile<A>> for KeywordLibrary<A> {
    fn from(mobile: Mobile<A>) -> Self {
        KeywordLibrary::new(mobile)
    }
}
