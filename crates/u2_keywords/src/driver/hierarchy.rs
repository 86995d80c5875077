//! Xpath queries over a window hierarchy dump
//!
//! Dump nodes are `<node class="android.widget.TextView" ...>`. Before
//! evaluation every element is renamed to its `class`, so queries can be
//! written as `//android.widget.TextView[@text="OK"]`.

use std::collections::BTreeMap;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element, ParentOfChild};
use sxd_document::parser;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{evaluate_xpath, Value};

use super::types::{Bounds, ElementInfo};
use crate::error::{Result, U2Error};

/// Detached copy of one node of the hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    tag: String,
    attributes: BTreeMap<String, String>,
    child_count: usize,
    parent: Option<Box<XmlElement>>,
}

impl XmlElement {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn text(&self) -> &str {
        self.attribute("text").unwrap_or("")
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.attribute("bounds").and_then(Bounds::parse)
    }

    pub fn center(&self) -> Option<(i32, i32)> {
        self.bounds().map(|b| b.center())
    }

    pub fn parent(&self) -> Option<&XmlElement> {
        self.parent.as_deref()
    }

    fn flag(&self, name: &str) -> bool {
        self.attribute(name) == Some("true")
    }

    fn owned(&self, name: &str) -> Option<String> {
        self.attribute(name).map(str::to_string)
    }

    pub fn info(&self) -> ElementInfo {
        ElementInfo {
            bounds: self.bounds().unwrap_or_default(),
            child_count: self.child_count as u32,
            class_name: self.owned("class"),
            content_description: self.owned("content-desc"),
            package_name: self.owned("package"),
            resource_name: self.owned("resource-id"),
            resource_id: self.owned("resource-id"),
            text: self.owned("text"),
            visible_bounds: None,
            checkable: self.flag("checkable"),
            checked: self.flag("checked"),
            clickable: self.flag("clickable"),
            enabled: self.flag("enabled"),
            focusable: self.flag("focusable"),
            focused: self.flag("focused"),
            long_clickable: self.flag("long-clickable"),
            scrollable: self.flag("scrollable"),
            selected: self.flag("selected"),
        }
    }
}

/// Expand the `@resource-id` and bare-text shorthands into full xpath
pub fn normalize_xpath(xpath: &str) -> String {
    let xpath = xpath.trim();
    if let Some(id) = xpath.strip_prefix('@') {
        format!("//*[@resource-id=\"{}\"]", id)
    } else if xpath.starts_with('/') || xpath.starts_with('(') {
        xpath.to_string()
    } else {
        format!("//*[@text=\"{}\"]", xpath)
    }
}

/// All elements of `xml` matching `xpath`, in document order
pub fn select(xml: &str, xpath: &str) -> Result<Vec<XmlElement>> {
    let package = parser::parse(xml)
        .map_err(|e| U2Error::Hierarchy(format!("invalid hierarchy dump: {:?}", e)))?;
    let document = package.as_document();

    for child in document.root().children() {
        if let ChildOfRoot::Element(element) = child {
            rename_by_class(element);
        }
    }

    let expression = normalize_xpath(xpath);
    let value = evaluate_xpath(&document, &expression)
        .map_err(|e| U2Error::Hierarchy(format!("{}: {}", expression, e)))?;

    match value {
        Value::Nodeset(nodes) => Ok(nodes
            .document_order()
            .into_iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(detach(element)),
                _ => None,
            })
            .collect()),
        other => Err(U2Error::Hierarchy(format!(
            "{} selects {:?}, not elements",
            expression, other
        ))),
    }
}

fn rename_by_class(element: Element<'_>) {
    if let Some(class) = element.attribute_value("class").map(str::to_string) {
        element.set_name(class.as_str());
    }
    for child in element.children() {
        if let ChildOfElement::Element(child) = child {
            rename_by_class(child);
        }
    }
}

fn detach(element: Element<'_>) -> XmlElement {
    let attributes = element
        .attributes()
        .into_iter()
        .map(|a| (a.name().local_part().to_string(), a.value().to_string()))
        .collect();
    let child_count = element
        .children()
        .into_iter()
        .filter(|c| matches!(c, ChildOfElement::Element(_)))
        .count();
    let parent = match element.parent() {
        Some(ParentOfChild::Element(parent)) => Some(Box::new(detach(parent))),
        _ => None,
    };
    XmlElement {
        tag: element.name().local_part().to_string(),
        attributes,
        child_count,
        parent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SAMPLE_DUMP as DUMP;

    #[test]
    fn test_select_by_class_tag() {
        let found = select(DUMP, "//android.widget.Button").unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag(), "android.widget.Button");
        assert_eq!(found[0].text(), "Login");
        assert_eq!(found[0].center(), Some((200, 230)));
        assert_eq!(
            found[0].parent().map(|p| p.tag()),
            Some("android.widget.FrameLayout")
        );
    }

    #[test]
    fn test_select_shorthands() {
        assert_eq!(select(DUMP, "@com.example:id/title").unwrap().len(), 1);
        assert_eq!(select(DUMP, "Login").unwrap()[0].tag(), "android.widget.Button");
        assert!(select(DUMP, "//*[@text='Missing']").unwrap().is_empty());
    }

    #[test]
    fn test_info_maps_dump_attributes() {
        let found = select(DUMP, "//*[@content-desc='sign in']").unwrap();
        let info = found[0].info();

        assert_eq!(info.class_name.as_deref(), Some("android.widget.Button"));
        assert_eq!(info.resource_id.as_deref(), Some("com.example:id/login"));
        assert!(info.clickable);
        assert!(info.long_clickable);
        assert!(!info.scrollable);
        assert_eq!(info.bounds, Bounds::new(100, 200, 300, 260));

        let root = select(DUMP, "//android.widget.FrameLayout").unwrap();
        assert_eq!(root[0].info().child_count, 2);
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            select("<hierarchy>", "//node"),
            Err(U2Error::Hierarchy(_))
        ));
        assert!(matches!(select(DUMP, "//*["), Err(U2Error::Hierarchy(_))));
        assert!(matches!(select(DUMP, "count(//*)"), Err(U2Error::Hierarchy(_))));
    }
}
