//! Device automation layer
//!
//! - `Automation`: the operations keywords are built from
//! - `U2Device`: implementation talking to the uiautomator agent over HTTP and adb
//! - `hierarchy`: xpath over window hierarchy dumps

pub mod adb;
mod device;
pub mod hierarchy;
mod rpc;
mod types;

pub use device::{Endpoint, U2Device};
pub use hierarchy::XmlElement;
pub use types::{
    AppInfo, Bounds, ChildQuery, CurrentApp, Direction, ElementInfo, Key, ScrollAction, UiObject,
    UiTarget, WindowSize,
};

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::MAX_WAIT;
use crate::error::{Result, U2Error};
use crate::selector::Selector;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// `now + timeout`, with the timeout capped at `MAX_WAIT`
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_WAIT)).unwrap_or(now)
}

/// Connected Android device driven through uiautomator
#[async_trait]
pub trait Automation: Send + Sync {
    async fn exists(&self, obj: &UiObject) -> Result<bool>;

    /// Wait up to `timeout` for the object to appear
    async fn wait(&self, obj: &UiObject, timeout: Duration) -> Result<bool>;

    /// Wait up to `timeout` for the object to disappear
    async fn wait_gone(&self, obj: &UiObject, timeout: Duration) -> Result<bool>;

    async fn info(&self, obj: &UiObject) -> Result<ElementInfo>;

    /// Number of matches, 0 when nothing matches
    async fn count(&self, obj: &UiObject) -> Result<usize>;

    async fn click(&self, obj: &UiObject) -> Result<bool>;

    async fn get_text(&self, obj: &UiObject) -> Result<String>;

    async fn set_text(&self, obj: &UiObject, text: &str) -> Result<bool>;

    async fn clear_text(&self, obj: &UiObject) -> Result<()>;

    /// Resolve a child server-side; the returned object is addressed by name
    async fn child_by(
        &self,
        parent: &UiObject,
        query: &ChildQuery,
        child: &Selector,
    ) -> Result<UiObject>;

    async fn scroll(&self, obj: &UiObject, action: &ScrollAction) -> Result<bool>;

    async fn click_point(&self, x: i32, y: i32) -> Result<()>;

    async fn long_click_point(&self, x: i32, y: i32, duration: Duration) -> Result<()>;

    async fn swipe(&self, fx: i32, fy: i32, tx: i32, ty: i32, steps: u32) -> Result<()>;

    async fn press_key(&self, key: Key) -> Result<bool>;

    async fn screen_on(&self) -> Result<()>;

    async fn screen_off(&self) -> Result<()>;

    async fn window_size(&self) -> Result<WindowSize>;

    /// Encoded screenshot bytes (PNG or JPEG)
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn dump_hierarchy(&self) -> Result<String>;

    async fn device_info(&self) -> Result<Value>;

    /// Most recent toast shown within `cache`
    async fn last_toast(&self, cache: Duration) -> Result<Option<String>>;

    async fn show_float_window(&self) -> Result<()>;

    /// Install from a local path or an http(s) URL
    async fn app_install(&self, source: &str) -> Result<()>;

    async fn app_start(&self, package: &str, stop: bool) -> Result<()>;

    async fn app_stop(&self, package: &str) -> Result<()>;

    async fn app_clear(&self, package: &str) -> Result<()>;

    async fn app_uninstall(&self, package: &str) -> Result<bool>;

    async fn app_info(&self, package: &str) -> Result<AppInfo>;

    async fn app_current(&self) -> Result<CurrentApp>;

    /// Type into the focused input through the agent, optionally clearing it first
    async fn send_keys(&self, text: &str, clear: bool) -> Result<()> {
        let focused = UiObject::new(Selector::new().focused(true));
        if !self.exists(&focused).await? {
            return Err(U2Error::ElementNotFound(format!(
                "no focused input to type into ({})",
                focused
            )));
        }
        let typed = if clear {
            self.clear_text(&focused).await?;
            text.to_string()
        } else {
            self.get_text(&focused).await? + text
        };
        if !self.set_text(&focused, &typed).await? {
            return Err(U2Error::CommandFailed(format!(
                "focused input rejected text {:?}",
                typed
            )));
        }
        Ok(())
    }

    /// `wait` that fails with `ElementNotFound` instead of returning false
    async fn must_wait(&self, obj: &UiObject, timeout: Duration) -> Result<()> {
        if self.wait(obj, timeout).await? {
            Ok(())
        } else {
            Err(U2Error::ElementNotFound(obj.to_string()))
        }
    }

    /// Click if the object shows up within `timeout`
    async fn click_exists(&self, obj: &UiObject, timeout: Duration) -> Result<bool> {
        if !self.wait(obj, timeout).await? {
            return Ok(false);
        }
        self.click(obj).await
    }

    async fn long_click(&self, obj: &UiObject, duration: Duration) -> Result<()> {
        let (x, y) = self.info(obj).await?.bounds.center();
        self.long_click_point(x, y, duration).await
    }

    async fn double_click_point(&self, x: i32, y: i32, interval: Duration) -> Result<()> {
        self.click_point(x, y).await?;
        tokio::time::sleep(interval).await;
        self.click_point(x, y).await
    }

    /// Closest match of `selector` on the given side of `origin`
    async fn find_beside(
        &self,
        origin: &UiObject,
        direction: Direction,
        selector: &Selector,
    ) -> Result<Option<UiObject>> {
        let origin_bounds = self.info(origin).await?.bounds;
        let candidates = UiObject::new(selector.clone());
        let total = self.count(&candidates).await?;

        let mut best: Option<(i32, UiObject)> = None;
        for instance in 0..total as u32 {
            let candidate = candidates.with_instance(instance)?;
            let bounds = self.info(&candidate).await?.bounds;
            if let Some(distance) = direction.distance(&origin_bounds, &bounds) {
                if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                    best = Some((distance, candidate));
                }
            }
        }
        Ok(best.map(|(_, obj)| obj))
    }

    /// Poll the foreground activity until it matches or `timeout` passes
    async fn wait_activity(&self, activity: &str, timeout: Duration) -> Result<bool> {
        let deadline = deadline_after(timeout);
        loop {
            let current = self.app_current().await?;
            if current.activity == activity {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Poll for a toast until one shows up or `wait` passes
    async fn toast_message(&self, wait: Duration, cache: Duration) -> Result<Option<String>> {
        let deadline = deadline_after(wait);
        loop {
            if let Some(message) = self.last_toast(cache).await? {
                return Ok(Some(message));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Construction of a connected device from an optional address
#[async_trait]
pub trait Connect: Sized + Send {
    async fn connect(address: Option<&str>) -> Result<Self>;
}
