//! By-locator keywords: operate on an element reference or a fresh selector query

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::args::Target;
use super::session::Session;
use crate::config::{secs, TIMING_CONFIG};
use crate::driver::{Automation, ChildQuery, Direction, ScrollAction, UiObject};
use crate::error::{Result, U2Error};
use crate::selector::Selector;

/// Attributes readable through `get_element_attribute_by_locator`
pub const ELEMENT_ATTRIBUTES: [&str; 17] = [
    "bounds",
    "childCount",
    "className",
    "contentDescription",
    "packageName",
    "resourceName",
    "text",
    "visibleBounds",
    "checkable",
    "checked",
    "clickable",
    "enabled",
    "focusable",
    "focused",
    "longClickable",
    "scrollable",
    "selected",
];

fn timeout_or_default(timeout: Option<Duration>) -> Duration {
    timeout.unwrap_or_else(|| secs(TIMING_CONFIG.locator.default_timeout))
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay.filter(|d| !d.is_zero()) {
        tokio::time::sleep(delay).await;
    }
}

pub struct UiActions<A> {
    session: Arc<Session<A>>,
}

impl<A: Automation> UiActions<A> {
    pub fn new(session: Arc<Session<A>>) -> Self {
        Self { session }
    }

    fn device(&self) -> Result<&A> {
        self.session.device()
    }

    fn scrollable() -> UiObject {
        UiObject::new(Selector::new().scrollable(true))
    }

    pub async fn clear_element_text_by_locator(
        &self,
        target: &Target,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let obj = target.resolve("clear_element_text_by_locator")?;
        let device = self.device()?;
        device.must_wait(&obj, timeout_or_default(timeout)).await?;
        device.clear_text(&obj).await
    }

    /// Returns whether the element showed up in time and was clicked
    pub async fn click_element_by_locator(
        &self,
        target: &Target,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let obj = target.resolve("click_element_by_locator")?;
        let clicked = self
            .device()?
            .click_exists(&obj, timeout_or_default(timeout))
            .await?;
        debug!("click {} -> {}", obj, clicked);
        Ok(clicked)
    }

    /// Checks once after `delay`; absence is `false`, not an error
    pub async fn element_is_existed_by_locator(
        &self,
        target: &Target,
        delay: Option<Duration>,
    ) -> Result<bool> {
        let obj = target.resolve("element_is_existed_by_locator")?;
        let device = self.device()?;
        pause(delay.or_else(|| Some(secs(TIMING_CONFIG.locator.exists_delay)))).await;
        device.exists(&obj).await
    }

    pub async fn find_element_by_locator(
        &self,
        target: &Target,
        timeout: Option<Duration>,
    ) -> Result<UiObject> {
        let obj = target.resolve("find_element_by_locator")?;
        self.device()?
            .must_wait(&obj, timeout_or_default(timeout))
            .await?;
        Ok(obj)
    }

    /// Nearest match of `selector` on the `direction` side of `element`
    pub async fn find_element_by_locator_with_direction(
        &self,
        element: &UiObject,
        direction: Direction,
        selector: &Selector,
    ) -> Result<Option<UiObject>> {
        if selector.is_empty() {
            return Err(U2Error::invalid(
                "find_element_by_locator_with_direction",
                "needs a non-empty selector",
            ));
        }
        self.device()?
            .find_beside(element, direction, selector)
            .await
    }

    /// Child of the target matching `child`; an empty `child` selects any child
    pub async fn find_element_child_by_locator(
        &self,
        target: &Target,
        child: &Selector,
        delay: Option<Duration>,
    ) -> Result<UiObject> {
        let parent = target.resolve("find_element_child_by_locator")?;
        self.device()?;
        pause(delay).await;
        parent.child(child.clone())
    }

    pub async fn find_element_child_by_locator_with_description(
        &self,
        parent: &UiObject,
        description: &str,
        selector: &Selector,
    ) -> Result<UiObject> {
        let query = ChildQuery::Description {
            description: description.to_string(),
            allow_scroll: true,
        };
        self.device()?.child_by(parent, &query, selector).await
    }

    pub async fn find_element_child_by_locator_with_index(
        &self,
        parent: &UiObject,
        instance: u32,
        selector: &Selector,
    ) -> Result<UiObject> {
        self.device()?
            .child_by(parent, &ChildQuery::Instance(instance), selector)
            .await
    }

    pub async fn find_element_child_by_locator_with_text(
        &self,
        parent: &UiObject,
        text: &str,
        selector: &Selector,
    ) -> Result<UiObject> {
        let query = ChildQuery::Text {
            text: text.to_string(),
            allow_scroll: true,
        };
        self.device()?.child_by(parent, &query, selector).await
    }

    pub fn find_element_sibling_by_locator(
        &self,
        element: &UiObject,
        selector: &Selector,
    ) -> Result<UiObject> {
        element.sibling(selector.clone())
    }

    /// One attribute of the element info, or the whole mapping
    pub async fn get_element_attribute_by_locator(
        &self,
        target: &Target,
        attribute: Option<&str>,
        delay: Option<Duration>,
    ) -> Result<Value> {
        const KEYWORD: &str = "get_element_attribute_by_locator";
        if let Some(name) = attribute {
            if !ELEMENT_ATTRIBUTES.contains(&name) {
                return Err(U2Error::invalid(
                    KEYWORD,
                    format!(
                        "unknown attribute {:?}, expected one of {}",
                        name,
                        ELEMENT_ATTRIBUTES.join(", ")
                    ),
                ));
            }
        }
        let obj = target.resolve(KEYWORD)?;
        let device = self.device()?;
        pause(delay).await;

        let info = device.info(&obj).await?;
        Ok(match attribute {
            Some(name) => info.attribute(name).unwrap_or(Value::Null),
            None => info.to_value(),
        })
    }

    pub async fn get_element_text_by_locator(
        &self,
        target: &Target,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let obj = target.resolve("get_element_text_by_locator")?;
        let device = self.device()?;
        device.must_wait(&obj, timeout_or_default(timeout)).await?;
        device.get_text(&obj).await
    }

    /// Matches once something appears within `timeout`, else 0
    pub async fn get_elements_count_by_locator(
        &self,
        target: &Target,
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let obj = target.resolve("get_elements_count_by_locator")?;
        let device = self.device()?;
        if !device.wait(&obj, timeout_or_default(timeout)).await? {
            return Ok(0);
        }
        device.count(&obj).await
    }

    pub async fn long_click_element_by_locator(
        &self,
        target: &Target,
        duration: Option<Duration>,
    ) -> Result<()> {
        let obj = target.resolve("long_click_element_by_locator")?;
        let duration =
            duration.unwrap_or_else(|| secs(TIMING_CONFIG.locator.long_click_duration));
        let device = self.device()?;
        device.must_wait(&obj, timeout_or_default(None)).await?;
        device.long_click(&obj, duration).await
    }

    pub async fn scroll_backward(&self) -> Result<bool> {
        self.device()?
            .scroll(&Self::scrollable(), &ScrollAction::Backward)
            .await
    }

    pub async fn scroll_forward(&self) -> Result<bool> {
        self.device()?
            .scroll(&Self::scrollable(), &ScrollAction::Forward)
            .await
    }

    pub async fn scroll_to_beginning(&self) -> Result<bool> {
        self.device()?
            .scroll(&Self::scrollable(), &ScrollAction::ToBeginning)
            .await
    }

    pub async fn scroll_to_end(&self) -> Result<bool> {
        self.device()?
            .scroll(&Self::scrollable(), &ScrollAction::ToEnd)
            .await
    }

    pub async fn scroll_to_text(&self, text: &str) -> Result<bool> {
        self.device()?
            .scroll(
                &Self::scrollable(),
                &ScrollAction::To(Selector::new().text(text)),
            )
            .await
    }

    pub async fn set_element_text_by_locator(
        &self,
        target: &Target,
        text: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let obj = target.resolve("set_element_text_by_locator")?;
        let timeout = timeout.unwrap_or_else(|| secs(TIMING_CONFIG.locator.set_text_timeout));
        let device = self.device()?;
        device.must_wait(&obj, timeout).await?;
        device.set_text(&obj, text).await?;
        info!("set text of {}", obj);
        Ok(())
    }

    /// `true` once visible; a timeout is an error, never `false`
    pub async fn wait_element_visible_by_locator(
        &self,
        target: &Target,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let obj = target.resolve("wait_element_visible_by_locator")?;
        let timeout = timeout_or_default(timeout);
        if self.device()?.wait(&obj, timeout).await? {
            Ok(true)
        } else {
            Err(U2Error::Timeout(format!(
                "{} not visible after {}s",
                obj,
                timeout.as_secs_f64()
            )))
        }
    }

    /// `true` once gone; a timeout is an error, never `false`
    pub async fn wait_element_invisible_by_locator(
        &self,
        target: &Target,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let obj = target.resolve("wait_element_invisible_by_locator")?;
        let timeout = timeout_or_default(timeout);
        if self.device()?.wait_gone(&obj, timeout).await? {
            Ok(true)
        } else {
            Err(U2Error::Timeout(format!(
                "{} still visible after {}s",
                obj,
                timeout.as_secs_f64()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Bounds;
    use crate::testing::{MockCall, MockDevice};
    use serde_json::json;

    fn actions(device: MockDevice) -> (Arc<Session<MockDevice>>, UiActions<MockDevice>) {
        let session = Arc::new(Session::with_device(device));
        (session.clone(), UiActions::new(session))
    }

    fn login() -> Selector {
        Selector::new().resource_id("com.example:id/login")
    }

    fn mock() -> MockDevice {
        MockDevice::new().with_element(login(), "Login", Bounds::new(100, 200, 300, 260))
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let ui = UiActions::new(Arc::new(Session::<MockDevice>::new()));
        let err = ui
            .click_element_by_locator(&Target::Selector(login()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, U2Error::NotConnected));
    }

    #[tokio::test]
    async fn test_empty_selector_is_invalid() {
        let (_, ui) = actions(mock());
        let err = ui
            .find_element_by_locator(&Target::Selector(Selector::new()), None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_click_uses_default_timeout() {
        let (session, ui) = actions(mock());

        assert!(ui
            .click_element_by_locator(&Target::Selector(login()), None)
            .await
            .unwrap());
        let calls = session.device().unwrap().calls();
        assert_eq!(
            calls[0],
            MockCall::Wait(UiObject::new(login()), Duration::from_secs(10))
        );
        assert_eq!(calls[1], MockCall::Click(UiObject::new(login())));
    }

    #[tokio::test]
    async fn test_find_then_click_handle() {
        let (session, ui) = actions(mock());

        let element = ui
            .find_element_by_locator(&Target::Selector(login()), None)
            .await
            .unwrap();
        assert!(ui
            .click_element_by_locator(&Target::Element(element.clone()), None)
            .await
            .unwrap());
        assert!(session
            .device()
            .unwrap()
            .calls()
            .contains(&MockCall::Click(element)));
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let (_, ui) = actions(mock());
        let err = ui
            .find_element_by_locator(
                &Target::Selector(Selector::new().text("Nope")),
                Some(Duration::ZERO),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, U2Error::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn test_exists_is_false_without_error() {
        let (_, ui) = actions(mock());
        assert!(!ui
            .element_is_existed_by_locator(&Target::Selector(Selector::new().text("Nope")), None)
            .await
            .unwrap());
        assert!(ui
            .element_is_existed_by_locator(&Target::Selector(login()), None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_set_then_get_text() {
        let (session, ui) = actions(mock());
        let target = Target::Selector(login());

        ui.set_element_text_by_locator(&target, "hello", None)
            .await
            .unwrap();
        assert_eq!(
            ui.get_element_text_by_locator(&target, None).await.unwrap(),
            "hello"
        );
        assert!(session.device().unwrap().calls().contains(&MockCall::Wait(
            UiObject::new(login()),
            Duration::from_secs(5)
        )));
    }

    #[tokio::test]
    async fn test_count_is_zero_when_nothing_appears() {
        let (_, ui) = actions(mock());
        let target = Target::Selector(Selector::new().class_name("android.widget.TextView"));
        assert_eq!(
            ui.get_elements_count_by_locator(&target, Some(Duration::ZERO))
                .await
                .unwrap(),
            0
        );

        let rows = Selector::new().class_name("android.widget.ListView");
        let (_, ui) = actions(mock().with_count(rows.clone(), 4));
        assert_eq!(
            ui.get_elements_count_by_locator(&Target::Selector(rows), None)
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_wait_invisible_times_out_while_visible() {
        let (_, ui) = actions(mock());
        let err = ui
            .wait_element_invisible_by_locator(
                &Target::Selector(login()),
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_visible_times_out_when_absent() {
        let (_, ui) = actions(mock());
        assert!(ui
            .wait_element_visible_by_locator(&Target::Selector(login()), None)
            .await
            .unwrap());
        let err = ui
            .wait_element_visible_by_locator(
                &Target::Selector(Selector::new().text("Nope")),
                Some(Duration::ZERO),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_get_attribute() {
        let (_, ui) = actions(mock());
        let target = Target::Selector(login());

        assert_eq!(
            ui.get_element_attribute_by_locator(&target, Some("text"), None)
                .await
                .unwrap(),
            json!("Login")
        );
        let all = ui
            .get_element_attribute_by_locator(&target, None, None)
            .await
            .unwrap();
        assert_eq!(all["clickable"], json!(true));

        let err = ui
            .get_element_attribute_by_locator(&target, Some("password"), None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_long_click_at_center() {
        let (session, ui) = actions(mock());
        ui.long_click_element_by_locator(&Target::Selector(login()), None)
            .await
            .unwrap();
        assert!(session
            .device()
            .unwrap()
            .calls()
            .contains(&MockCall::LongClickPoint(200, 230, Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn test_child_and_sibling_chain_selectors() {
        let (_, ui) = actions(mock());
        let list = Selector::new().class_name("android.widget.ListView");
        let row = Selector::new().text("Row 1");

        let child = ui
            .find_element_child_by_locator(&Target::Selector(list.clone()), &row, None)
            .await
            .unwrap();
        assert_eq!(child, UiObject::new(list.child(row.clone())));

        let sibling = ui
            .find_element_sibling_by_locator(&UiObject::new(list.clone()), &row)
            .unwrap();
        assert_eq!(sibling, UiObject::new(list.sibling(row)));
    }

    #[tokio::test]
    async fn test_child_with_text_enables_scroll_search() {
        let (session, ui) = actions(mock());
        let parent = UiObject::new(Selector::new().scrollable(true));
        let child = ui
            .find_element_child_by_locator_with_text(
                &parent,
                "Settings",
                &Selector::new().class_name("android.widget.TextView"),
            )
            .await
            .unwrap();

        assert_eq!(child, UiObject::remote("child-1"));
        let calls = session.device().unwrap().calls();
        assert!(matches!(
            &calls[0],
            MockCall::ChildBy(_, ChildQuery::Text { allow_scroll: true, .. }, _)
        ));
    }

    #[tokio::test]
    async fn test_scroll_to_text_targets_scrollable() {
        let (session, ui) = actions(mock());
        assert!(ui.scroll_to_text("Bottom").await.unwrap());
        assert_eq!(
            session.device().unwrap().calls()[0],
            MockCall::Scroll(
                UiObject::new(Selector::new().scrollable(true)),
                ScrollAction::To(Selector::new().text("Bottom"))
            )
        );
    }
}
