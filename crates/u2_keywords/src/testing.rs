//! In-memory `Automation` used by the unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

use crate::driver::{
    AppInfo, Automation, Bounds, ChildQuery, Connect, CurrentApp, ElementInfo, Key, ScrollAction,
    UiObject, WindowSize,
};
use crate::error::{Result, U2Error};
use crate::selector::Selector;

pub(crate) const SAMPLE_DUMP: &str = r#"<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="com.example" content-desc="" checkable="false" checked="false" clickable="false" enabled="true" focusable="false" focused="false" scrollable="false" long-clickable="false" password="false" selected="false" bounds="[0,0][1080,2400]">
    <node index="0" text="Welcome" resource-id="com.example:id/title" class="android.widget.TextView" package="com.example" content-desc="" checkable="false" checked="false" clickable="false" enabled="true" focusable="false" focused="false" scrollable="false" long-clickable="false" password="false" selected="false" bounds="[0,0][1080,100]" />
    <node index="1" text="Login" resource-id="com.example:id/login" class="android.widget.Button" package="com.example" content-desc="sign in" checkable="false" checked="false" clickable="true" enabled="true" focusable="true" focused="false" scrollable="false" long-clickable="true" password="false" selected="false" bounds="[100,200][300,260]" />
  </node>
</hierarchy>"#;

/// Everything the mock was asked to do
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MockCall {
    Exists(UiObject),
    Wait(UiObject, Duration),
    WaitGone(UiObject, Duration),
    Info(UiObject),
    Count(UiObject),
    Click(UiObject),
    GetText(UiObject),
    SetText(UiObject, String),
    ClearText(UiObject),
    ChildBy(UiObject, ChildQuery, Selector),
    Scroll(UiObject, ScrollAction),
    ClickPoint(i32, i32),
    LongClickPoint(i32, i32, Duration),
    Swipe(i32, i32, i32, i32, u32),
    PressKey(Key),
    Screen(bool),
    DumpHierarchy,
    AppInstall(String),
    AppStart(String, bool),
    AppStop(String),
    AppClear(String),
    AppUninstall(String),
    ShowFloatWindow,
}

#[derive(Debug, Clone)]
pub(crate) struct MockElement {
    pub object: UiObject,
    pub info: ElementInfo,
    pub visible: bool,
    pub count: usize,
}

#[derive(Default)]
struct MockState {
    elements: Vec<MockElement>,
    hierarchies: Vec<String>,
    dumps_served: usize,
    current: CurrentApp,
    toast: Option<String>,
    screenshot: Vec<u8>,
    child_counter: usize,
    reject_text: bool,
}

#[derive(Default)]
pub(crate) struct MockDevice {
    state: Mutex<MockState>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockDevice {
    pub fn new() -> Self {
        let device = Self::default();
        device.set_hierarchy(SAMPLE_DUMP);
        device
    }

    /// Register a visible element matched by `selector`
    pub fn with_element(self, selector: Selector, text: &str, bounds: Bounds) -> Self {
        self.add(MockElement {
            object: UiObject::new(selector),
            info: ElementInfo {
                bounds,
                text: Some(text.to_string()),
                class_name: Some("android.widget.TextView".to_string()),
                clickable: true,
                enabled: true,
                ..Default::default()
            },
            visible: true,
            count: 1,
        });
        self
    }

    pub fn with_count(self, selector: Selector, count: usize) -> Self {
        self.add(MockElement {
            object: UiObject::new(selector),
            info: ElementInfo::default(),
            visible: true,
            count,
        });
        self
    }

    pub fn add(&self, element: MockElement) {
        self.state.lock().unwrap().elements.push(element);
    }

    pub fn set_hierarchy(&self, xml: &str) {
        self.set_hierarchies(vec![xml.to_string()]);
    }

    /// Dumps served in order; the last one repeats
    pub fn set_hierarchies(&self, dumps: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        state.hierarchies = dumps;
        state.dumps_served = 0;
    }

    pub fn set_current(&self, package: &str, activity: &str) {
        self.state.lock().unwrap().current = CurrentApp {
            package: package.to_string(),
            activity: activity.to_string(),
        };
    }

    pub fn set_toast(&self, toast: Option<&str>) {
        self.state.lock().unwrap().toast = toast.map(str::to_string);
    }

    /// Make `set_text` report that the input refused the text
    pub fn set_reject_text(&self, reject: bool) {
        self.state.lock().unwrap().reject_text = reject;
    }

    pub fn set_screenshot(&self, bytes: Vec<u8>) {
        self.state.lock().unwrap().screenshot = bytes;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn text_of(&self, obj: &UiObject) -> Option<String> {
        self.find(obj).and_then(|e| e.info.text)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn find(&self, obj: &UiObject) -> Option<MockElement> {
        self.state
            .lock()
            .unwrap()
            .elements
            .iter()
            .find(|e| &e.object == obj)
            .cloned()
    }

    fn visible(&self, obj: &UiObject) -> bool {
        self.find(obj).map_or(false, |e| e.visible)
    }

    fn require(&self, obj: &UiObject) -> Result<MockElement> {
        self.find(obj)
            .filter(|e| e.visible)
            .ok_or_else(|| U2Error::ElementNotFound(obj.to_string()))
    }

    fn update_text(&self, obj: &UiObject, text: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(element) = state.elements.iter_mut().find(|e| &e.object == obj) {
            element.info.text = Some(text.to_string());
        }
    }
}

#[async_trait]
impl Connect for MockDevice {
    async fn connect(_address: Option<&str>) -> Result<Self> {
        Ok(MockDevice::new())
    }
}

#[async_trait]
impl Automation for MockDevice {
    async fn exists(&self, obj: &UiObject) -> Result<bool> {
        self.record(MockCall::Exists(obj.clone()));
        Ok(self.visible(obj))
    }

    async fn wait(&self, obj: &UiObject, timeout: Duration) -> Result<bool> {
        self.record(MockCall::Wait(obj.clone(), timeout));
        Ok(self.visible(obj))
    }

    async fn wait_gone(&self, obj: &UiObject, timeout: Duration) -> Result<bool> {
        self.record(MockCall::WaitGone(obj.clone(), timeout));
        Ok(!self.visible(obj))
    }

    async fn info(&self, obj: &UiObject) -> Result<ElementInfo> {
        self.record(MockCall::Info(obj.clone()));
        Ok(self.require(obj)?.info)
    }

    async fn count(&self, obj: &UiObject) -> Result<usize> {
        self.record(MockCall::Count(obj.clone()));
        Ok(self
            .find(obj)
            .filter(|e| e.visible)
            .map_or(0, |e| e.count))
    }

    async fn click(&self, obj: &UiObject) -> Result<bool> {
        self.record(MockCall::Click(obj.clone()));
        self.require(obj)?;
        Ok(true)
    }

    async fn get_text(&self, obj: &UiObject) -> Result<String> {
        self.record(MockCall::GetText(obj.clone()));
        Ok(self.require(obj)?.info.text.unwrap_or_default())
    }

    async fn set_text(&self, obj: &UiObject, text: &str) -> Result<bool> {
        self.record(MockCall::SetText(obj.clone(), text.to_string()));
        self.require(obj)?;
        if self.state.lock().unwrap().reject_text {
            return Ok(false);
        }
        self.update_text(obj, text);
        Ok(true)
    }

    async fn clear_text(&self, obj: &UiObject) -> Result<()> {
        self.record(MockCall::ClearText(obj.clone()));
        self.require(obj)?;
        self.update_text(obj, "");
        Ok(())
    }

    async fn child_by(
        &self,
        parent: &UiObject,
        query: &ChildQuery,
        child: &Selector,
    ) -> Result<UiObject> {
        self.record(MockCall::ChildBy(
            parent.clone(),
            query.clone(),
            child.clone(),
        ));
        let mut state = self.state.lock().unwrap();
        state.child_counter += 1;
        Ok(UiObject::remote(format!("child-{}", state.child_counter)))
    }

    async fn scroll(&self, obj: &UiObject, action: &ScrollAction) -> Result<bool> {
        self.record(MockCall::Scroll(obj.clone(), action.clone()));
        Ok(true)
    }

    async fn click_point(&self, x: i32, y: i32) -> Result<()> {
        self.record(MockCall::ClickPoint(x, y));
        Ok(())
    }

    async fn long_click_point(&self, x: i32, y: i32, duration: Duration) -> Result<()> {
        self.record(MockCall::LongClickPoint(x, y, duration));
        Ok(())
    }

    async fn swipe(&self, fx: i32, fy: i32, tx: i32, ty: i32, steps: u32) -> Result<()> {
        self.record(MockCall::Swipe(fx, fy, tx, ty, steps));
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<bool> {
        self.record(MockCall::PressKey(key));
        Ok(true)
    }

    async fn screen_on(&self) -> Result<()> {
        self.record(MockCall::Screen(true));
        Ok(())
    }

    async fn screen_off(&self) -> Result<()> {
        self.record(MockCall::Screen(false));
        Ok(())
    }

    async fn window_size(&self) -> Result<WindowSize> {
        Ok(WindowSize {
            width: 1080,
            height: 2400,
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.state.lock().unwrap().screenshot.clone())
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        self.record(MockCall::DumpHierarchy);
        let mut state = self.state.lock().unwrap();
        let index = state.dumps_served.min(state.hierarchies.len().saturating_sub(1));
        state.dumps_served += 1;
        state
            .hierarchies
            .get(index)
            .cloned()
            .ok_or_else(|| U2Error::Hierarchy("no hierarchy configured".to_string()))
    }

    async fn device_info(&self) -> Result<Value> {
        Ok(json!({"displayWidth": 1080, "displayHeight": 2400, "sdkInt": 33}))
    }

    async fn last_toast(&self, _cache: Duration) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().toast.clone())
    }

    async fn show_float_window(&self) -> Result<()> {
        self.record(MockCall::ShowFloatWindow);
        Ok(())
    }

    async fn app_install(&self, source: &str) -> Result<()> {
        self.record(MockCall::AppInstall(source.to_string()));
        Ok(())
    }

    async fn app_start(&self, package: &str, stop: bool) -> Result<()> {
        self.record(MockCall::AppStart(package.to_string(), stop));
        self.set_current(package, ".MainActivity");
        Ok(())
    }

    async fn app_stop(&self, package: &str) -> Result<()> {
        self.record(MockCall::AppStop(package.to_string()));
        Ok(())
    }

    async fn app_clear(&self, package: &str) -> Result<()> {
        self.record(MockCall::AppClear(package.to_string()));
        Ok(())
    }

    async fn app_uninstall(&self, package: &str) -> Result<bool> {
        self.record(MockCall::AppUninstall(package.to_string()));
        Ok(true)
    }

    async fn app_info(&self, package: &str) -> Result<AppInfo> {
        Ok(AppInfo {
            package_name: package.to_string(),
            main_activity: Some(".MainActivity".to_string()),
            version_name: Some("1.0".to_string()),
            version_code: Some(1),
            label: Some("Example".to_string()),
            size: Some(4096),
        })
    }

    async fn app_current(&self) -> Result<CurrentApp> {
        Ok(self.state.lock().unwrap().current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_beside_picks_nearest_on_side() {
        let origin = Selector::new().text("Name");
        let fields = Selector::new().class_name("android.widget.EditText");
        let device = MockDevice::new().with_element(
            origin.clone(),
            "Name",
            Bounds::new(0, 100, 100, 150),
        );
        device.add(MockElement {
            object: UiObject::new(fields.clone()),
            info: ElementInfo::default(),
            visible: true,
            count: 2,
        });
        device.add(MockElement {
            object: UiObject::new(fields.with_instance(0)),
            info: ElementInfo {
                bounds: Bounds::new(400, 110, 600, 140),
                ..Default::default()
            },
            visible: true,
            count: 1,
        });
        device.add(MockElement {
            object: UiObject::new(fields.with_instance(1)),
            info: ElementInfo {
                bounds: Bounds::new(150, 100, 350, 150),
                ..Default::default()
            },
            visible: true,
            count: 1,
        });

        let found = device
            .find_beside(
                &UiObject::new(origin),
                crate::driver::Direction::Right,
                &fields,
            )
            .await
            .unwrap();
        assert_eq!(found, Some(UiObject::new(fields.with_instance(1))));
    }

    #[tokio::test]
    async fn test_wait_activity_matches_current() {
        let device = MockDevice::new();
        device.set_current("com.example", ".Home");

        assert!(device
            .wait_activity(".Home", Duration::ZERO)
            .await
            .unwrap());
        assert!(!device
            .wait_activity(".Other", Duration::ZERO)
            .await
            .unwrap());
    }

    fn focused() -> UiObject {
        UiObject::new(Selector::new().focused(true))
    }

    #[tokio::test]
    async fn test_send_keys_replaces_or_appends_focused_text() {
        let device =
            MockDevice::new().with_element(Selector::new().focused(true), "abc", Bounds::default());

        device.send_keys("007", false).await.unwrap();
        assert_eq!(device.text_of(&focused()).as_deref(), Some("abc007"));

        device.send_keys("new", true).await.unwrap();
        assert_eq!(device.text_of(&focused()).as_deref(), Some("new"));
        assert!(device.calls().contains(&MockCall::ClearText(focused())));
    }

    #[tokio::test]
    async fn test_send_keys_without_focused_input() {
        let device = MockDevice::new();
        let err = device.send_keys("x", true).await.unwrap_err();
        assert!(matches!(err, U2Error::ElementNotFound(_)));
        assert!(!device
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::SetText(..))));
    }

    #[tokio::test]
    async fn test_send_keys_reports_rejected_text() {
        let device =
            MockDevice::new().with_element(Selector::new().focused(true), "", Bounds::default());
        device.set_reject_text(true);

        let err = device.send_keys("secret", true).await.unwrap_err();
        assert!(matches!(err, U2Error::CommandFailed(_)));
        assert_eq!(device.text_of(&focused()).as_deref(), Some(""));
    }
}
