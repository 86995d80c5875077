//! Xpath keywords, evaluated over polled window hierarchy dumps

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::args::XpathTarget;
use super::session::Session;
use crate::config::{secs, TIMING_CONFIG};
use crate::driver::{deadline_after, hierarchy, Automation, XmlElement};
use crate::error::{Result, U2Error};

/// Attributes readable through `get_element_attribute_by_xpath`
pub const XPATH_ATTRIBUTES: [&str; 14] = [
    "text",
    "focusable",
    "enabled",
    "focused",
    "scrollable",
    "selected",
    "className",
    "bounds",
    "contentDescription",
    "longClickable",
    "packageName",
    "resourceName",
    "resourceId",
    "childCount",
];

pub struct XpathActions<A> {
    session: Arc<Session<A>>,
}

impl<A: Automation> XpathActions<A> {
    pub fn new(session: Arc<Session<A>>) -> Self {
        Self { session }
    }

    fn device(&self) -> Result<&A> {
        self.session.device()
    }

    async fn snapshot(&self, xpath: &str) -> Result<Vec<XmlElement>> {
        let xml = self.device()?.dump_hierarchy().await?;
        hierarchy::select(&xml, xpath)
    }

    /// Poll until `done` accepts the matches or `timeout` passes; returns the last matches
    async fn poll<F>(&self, xpath: &str, timeout: Duration, done: F) -> Result<(bool, Vec<XmlElement>)>
    where
        F: Fn(&[XmlElement]) -> bool,
    {
        let interval = secs(TIMING_CONFIG.xpath.poll_interval);
        let deadline = deadline_after(timeout);
        loop {
            let found = self.snapshot(xpath).await?;
            if done(&found) {
                return Ok((true, found));
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("xpath {} not settled after {:?}", xpath, timeout);
                return Ok((false, found));
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }

    async fn wait_matches(&self, xpath: &str, timeout: Option<Duration>) -> Result<Vec<XmlElement>> {
        let timeout = timeout.unwrap_or_else(|| secs(TIMING_CONFIG.xpath.default_timeout));
        let (_, found) = self.poll(xpath, timeout, |found| !found.is_empty()).await?;
        Ok(found)
    }

    async fn resolve(&self, target: &XpathTarget, timeout: Option<Duration>) -> Result<XmlElement> {
        match target {
            XpathTarget::Element(element) => Ok(element.clone()),
            XpathTarget::Path(xpath) => self.find_element_by_xpath(xpath, timeout).await,
        }
    }

    fn center(element: &XmlElement) -> Result<(i32, i32)> {
        element.center().ok_or_else(|| {
            U2Error::Hierarchy(format!("element <{}> has no bounds", element.tag()))
        })
    }

    pub async fn click_element_by_xpath(
        &self,
        target: &XpathTarget,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let element = self.resolve(target, timeout).await?;
        let (x, y) = Self::center(&element)?;
        self.device()?.click_point(x, y).await
    }

    pub async fn long_click_element_by_xpath(
        &self,
        target: &XpathTarget,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let element = self.resolve(target, timeout).await?;
        let (x, y) = Self::center(&element)?;
        self.device()?
            .long_click_point(x, y, secs(TIMING_CONFIG.device.long_click_duration))
            .await
    }

    pub async fn element_is_existed_by_xpath(
        &self,
        xpath: &str,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        Ok(!self.wait_matches(xpath, timeout).await?.is_empty())
    }

    /// First match, waiting up to `timeout`
    pub async fn find_element_by_xpath(
        &self,
        xpath: &str,
        timeout: Option<Duration>,
    ) -> Result<XmlElement> {
        self.wait_matches(xpath, timeout)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| U2Error::XPathElementNotFound(xpath.to_string()))
    }

    /// All matches once at least one appears
    pub async fn find_elements_by_xpath(
        &self,
        xpath: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<XmlElement>> {
        let found = self.wait_matches(xpath, timeout).await?;
        if found.is_empty() {
            return Err(U2Error::XPathElementNotFound(xpath.to_string()));
        }
        Ok(found)
    }

    pub async fn find_parent_element_by_xpath(
        &self,
        target: &XpathTarget,
        timeout: Option<Duration>,
    ) -> Result<XmlElement> {
        let element = self.resolve(target, timeout).await?;
        element.parent().cloned().ok_or_else(|| {
            U2Error::XPathElementNotFound(format!("parent of <{}>", element.tag()))
        })
    }

    pub async fn get_element_attribute_by_xpath(
        &self,
        target: &XpathTarget,
        attribute: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        if let Some(name) = attribute {
            if !XPATH_ATTRIBUTES.contains(&name) {
                return Err(U2Error::invalid(
                    "get_element_attribute_by_xpath",
                    format!(
                        "unknown attribute {:?}, expected one of {}",
                        name,
                        XPATH_ATTRIBUTES.join(", ")
                    ),
                ));
            }
        }
        let info = self.resolve(target, timeout).await?.info();
        Ok(match attribute {
            Some(name) => info.attribute(name).unwrap_or(Value::Null),
            None => info.to_value(),
        })
    }

    pub async fn get_element_text_by_xpath(
        &self,
        target: &XpathTarget,
        timeout: Option<Duration>,
    ) -> Result<String> {
        Ok(self.resolve(target, timeout).await?.text().to_string())
    }

    /// Focus the element by clicking it, then replace its content
    pub async fn set_element_text_by_xpath(
        &self,
        target: &XpathTarget,
        text: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let element = self.resolve(target, timeout).await?;
        let (x, y) = Self::center(&element)?;
        let device = self.device()?;
        device.click_point(x, y).await?;
        device.send_keys(text, true).await
    }

    pub async fn wait_element_visible_by_xpath(
        &self,
        xpath: &str,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let timeout = timeout.unwrap_or_else(|| secs(TIMING_CONFIG.xpath.default_timeout));
        let (visible, _) = self.poll(xpath, timeout, |found| !found.is_empty()).await?;
        if visible {
            Ok(true)
        } else {
            Err(U2Error::Timeout(format!(
                "xpath {} not visible after {}s",
                xpath,
                timeout.as_secs_f64()
            )))
        }
    }

    pub async fn wait_element_invisible_by_xpath(
        &self,
        xpath: &str,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let timeout = timeout.unwrap_or_else(|| secs(TIMING_CONFIG.xpath.default_timeout));
        let (gone, _) = self.poll(xpath, timeout, |found| found.is_empty()).await?;
        if gone {
            Ok(true)
        } else {
            Err(U2Error::Timeout(format!(
                "xpath {} still visible after {}s",
                xpath,
                timeout.as_secs_f64()
            )))
        }
    }
}
