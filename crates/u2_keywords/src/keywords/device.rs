//! Device-level keywords: apps, screen, keys, toasts

use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::session::Session;
use crate::config::{secs, TIMING_CONFIG};
use crate::driver::{
    hierarchy, AppInfo, Automation, CurrentApp, Key, ScrollAction, UiObject, WindowSize,
};
use crate::error::{Result, U2Error};
use crate::selector::Selector;

const PAGE_TEXT_XPATH: &str = "//android.widget.TextView";

pub struct DeviceActions<A> {
    session: Arc<Session<A>>,
}

impl<A: Automation> DeviceActions<A> {
    pub fn new(session: Arc<Session<A>>) -> Self {
        Self { session }
    }

    fn device(&self) -> Result<&A> {
        self.session.device()
    }

    pub async fn app_clear(&self, package: &str) -> Result<()> {
        info!("Clearing data of {}", package);
        self.device()?.app_clear(package).await
    }

    pub async fn app_info(&self, package: &str) -> Result<AppInfo> {
        self.device()?.app_info(package).await
    }

    /// Install from a local apk path or an http(s) URL
    pub async fn app_install(&self, source: &str) -> Result<()> {
        info!("Installing {}", source);
        self.device()?.app_install(source).await
    }

    /// Stop the app, launch it and wait for it in the foreground
    pub async fn app_start(&self, package: &str) -> Result<()> {
        info!("Starting {}", package);
        self.device()?.app_start(package, true).await
    }

    pub async fn app_stop(&self, package: &str) -> Result<()> {
        self.device()?.app_stop(package).await
    }

    pub async fn app_uninstall(&self, package: &str) -> Result<bool> {
        info!("Uninstalling {}", package);
        self.device()?.app_uninstall(package).await
    }

    pub async fn click_screen(&self, x: i32, y: i32) -> Result<()> {
        self.device()?.click_point(x, y).await
    }

    pub async fn current_app(&self) -> Result<CurrentApp> {
        self.device()?.app_current().await
    }

    pub async fn double_click_screen(&self, x: i32, y: i32) -> Result<()> {
        self.device()?
            .double_click_point(x, y, secs(TIMING_CONFIG.device.double_click_interval))
            .await
    }

    pub async fn get_device_info(&self) -> Result<Value> {
        self.device()?.device_info().await
    }

    /// Text of every `TextView` on screen, in document order
    pub async fn get_page_text(&self) -> Result<Vec<String>> {
        let xml = self.device()?.dump_hierarchy().await?;
        Ok(hierarchy::select(&xml, PAGE_TEXT_XPATH)?
            .iter()
            .map(|element| element.text().to_string())
            .collect())
    }

    /// Latest toast, `None` when none shows up within the configured wait
    pub async fn get_toast_message(&self) -> Result<Option<String>> {
        self.device()?
            .toast_message(
                secs(TIMING_CONFIG.device.toast_wait),
                secs(TIMING_CONFIG.device.toast_cache),
            )
            .await
    }

    pub async fn get_window_size(&self) -> Result<WindowSize> {
        self.device()?.window_size().await
    }

    pub async fn long_click_screen(
        &self,
        x: i32,
        y: i32,
        duration: Option<Duration>,
    ) -> Result<()> {
        let duration =
            duration.unwrap_or_else(|| secs(TIMING_CONFIG.device.long_click_duration));
        self.device()?.long_click_point(x, y, duration).await
    }

    pub async fn press_key(&self, key: &str) -> Result<bool> {
        let key: Key = key.parse()?;
        self.device()?.press_key(key).await
    }

    /// Save a screenshot; the format follows the file extension
    pub async fn screenshot(&self, filename: impl AsRef<Path>) -> Result<PathBuf> {
        let path = filename.as_ref();
        let bytes = self.device()?.screenshot().await?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Decoding and re-encoding is CPU bound
        let target = path.to_path_buf();
        let (width, height) = tokio::task::spawn_blocking(move || -> Result<(u32, u32)> {
            let image = image::load_from_memory(&bytes)?;
            image.save(&target)?;
            Ok((image.width(), image.height()))
        })
        .await
        .map_err(|e| U2Error::CommandFailed(format!("screenshot encoder: {}", e)))??;
        debug!("Screenshot saved: {} ({}x{})", path.display(), width, height);
        Ok(path.to_path_buf())
    }

    /// Keep scrolling to the end until a page adds no new text
    pub async fn scroll_to_deep_end(&self) -> Result<u32> {
        self.scroll_to_deep_end_with(
            secs(TIMING_CONFIG.device.deep_scroll_delay),
            TIMING_CONFIG.device.deep_scroll_max_rounds,
        )
        .await
    }

    /// Returns the number of scroll rounds; fails with a timeout after `max_rounds`
    pub async fn scroll_to_deep_end_with(&self, delay: Duration, max_rounds: u32) -> Result<u32> {
        let device = self.device()?;
        let container = UiObject::new(Selector::new().scrollable(true));
        let mut seen: HashSet<String> = HashSet::new();

        for round in 1..=max_rounds {
            device.scroll(&container, &ScrollAction::ToEnd).await?;
            tokio::time::sleep(delay).await;

            let page: HashSet<String> = self.get_page_text().await?.into_iter().collect();
            let added = page.difference(&seen).count();
            debug!("Deep scroll round {}: {} new texts", round, added);
            if added == 0 {
                return Ok(round);
            }
            seen = page;
        }
        Err(U2Error::Timeout(format!(
            "page still loading new content after {} scroll rounds",
            max_rounds
        )))
    }

    pub async fn show_float_window(&self) -> Result<()> {
        self.device()?.show_float_window().await
    }

    pub async fn swipe_screen(
        &self,
        fx: i32,
        fy: i32,
        tx: i32,
        ty: i32,
        steps: Option<u32>,
    ) -> Result<()> {
        let steps = steps.unwrap_or(TIMING_CONFIG.device.swipe_steps);
        self.device()?.swipe(fx, fy, tx, ty, steps).await
    }

    pub async fn turn_screen(&self, on: bool) -> Result<()> {
        let device = self.device()?;
        if on {
            device.screen_on().await
        } else {
            device.screen_off().await
        }
    }

    /// `true` once the activity is in front; a timeout is an error
    pub async fn wait_activity(&self, activity: &str) -> Result<bool> {
        let timeout = secs(TIMING_CONFIG.device.activity_timeout);
        if self.device()?.wait_activity(activity, timeout).await? {
            Ok(true)
        } else {
            Err(U2Error::Timeout(format!(
                "activity {} not shown after {}s",
                activity,
                timeout.as_secs_f64()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCall, MockDevice};
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn actions(device: MockDevice) -> (Arc<Session<MockDevice>>, DeviceActions<MockDevice>) {
        let session = Arc::new(Session::with_device(device));
        (session.clone(), DeviceActions::new(session))
    }

    fn page(texts: &[&str]) -> String {
        let nodes: String = texts
            .iter()
            .map(|t| {
                format!(
                    r#"<node class="android.widget.TextView" text="{}" bounds="[0,0][10,10]" />"#,
                    t
                )
            })
            .collect();
        format!(
            r#"<hierarchy rotation="0"><node class="android.widget.ListView" scrollable="true">{}</node></hierarchy>"#,
            nodes
        )
    }

    #[tokio::test]
    async fn test_page_text() {
        let (_, device) = actions(MockDevice::new());
        assert_eq!(device.get_page_text().await.unwrap(), vec!["Welcome"]);
    }

    #[tokio::test]
    async fn test_deep_scroll_stops_when_nothing_new() {
        let mock = MockDevice::new();
        mock.set_hierarchies(vec![
            page(&["a", "b"]),
            page(&["b", "c"]),
            page(&["b", "c"]),
        ]);
        let (session, device) = actions(mock);

        let rounds = device
            .scroll_to_deep_end_with(Duration::ZERO, 10)
            .await
            .unwrap();
        assert_eq!(rounds, 3);
        let scrolls = session
            .device()
            .unwrap()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Scroll(_, ScrollAction::ToEnd)))
            .count();
        assert_eq!(scrolls, 3);
    }

    #[tokio::test]
    async fn test_deep_scroll_is_bounded() {
        let mock = MockDevice::new();
        mock.set_hierarchies((0..10).map(|i| page(&[format!("row {}", i).as_str()])).collect());
        let (_, device) = actions(mock);

        let err = device
            .scroll_to_deep_end_with(Duration::ZERO, 4)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains('4'));
    }

    #[tokio::test]
    async fn test_press_key_validates_name() {
        let (session, device) = actions(MockDevice::new());
        assert!(device.press_key("del").await.unwrap());
        assert_eq!(
            session.device().unwrap().calls(),
            vec![MockCall::PressKey(Key::Delete)]
        );
        assert!(device.press_key("escape").await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_swipe_and_long_click_defaults() {
        let (session, device) = actions(MockDevice::new());
        device.swipe_screen(600, 800, 600, 80, None).await.unwrap();
        device.long_click_screen(10, 20, None).await.unwrap();

        let calls = session.device().unwrap().calls();
        assert_eq!(calls[0], MockCall::Swipe(600, 800, 600, 80, 55));
        assert_eq!(
            calls[1],
            MockCall::LongClickPoint(10, 20, Duration::from_secs(1))
        );
    }

    #[tokio::test]
    async fn test_double_click_clicks_twice() {
        let (session, device) = actions(MockDevice::new());
        device.double_click_screen(5, 6).await.unwrap();
        assert_eq!(
            session.device().unwrap().calls(),
            vec![MockCall::ClickPoint(5, 6), MockCall::ClickPoint(5, 6)]
        );
    }

    #[tokio::test]
    async fn test_app_start_stops_first() {
        let (session, device) = actions(MockDevice::new());
        device.app_start("com.example").await.unwrap();
        assert_eq!(
            session.device().unwrap().calls(),
            vec![MockCall::AppStart("com.example".to_string(), true)]
        );
        assert_eq!(device.current_app().await.unwrap().package, "com.example");
    }

    #[tokio::test]
    async fn test_wait_activity_in_front() {
        let mock = MockDevice::new();
        mock.set_current("com.example", ".Home");
        let (_, device) = actions(mock);

        assert!(device.wait_activity(".Home").await.unwrap());
    }

    #[tokio::test]
    async fn test_screenshot_written_in_extension_format() {
        let mut png = Vec::new();
        ImageBuffer::from_pixel(4, 3, Rgb([255u8, 0, 0]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let mock = MockDevice::new();
        mock.set_screenshot(png);
        let (_, device) = actions(mock);

        let dir = tempfile::tempdir().unwrap();
        let path = device
            .screenshot(dir.path().join("shots").join("home.jpg"))
            .await
            .unwrap();

        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (4, 3));
        assert_eq!(
            ImageFormat::from_path(&path).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[tokio::test]
    async fn test_screenshot_rejects_undecodable_bytes() {
        let mock = MockDevice::new();
        mock.set_screenshot(b"not an image".to_vec());
        let (_, device) = actions(mock);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        let err = device.screenshot(&path).await.unwrap_err();
        assert!(matches!(err, U2Error::Image(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_toast_message() {
        let mock = MockDevice::new();
        mock.set_toast(Some("Saved"));
        let (_, device) = actions(mock);
        assert_eq!(
            device.get_toast_message().await.unwrap().as_deref(),
            Some("Saved")
        );
    }

    #[tokio::test]
    async fn test_turn_screen() {
        let (session, device) = actions(MockDevice::new());
        device.turn_screen(false).await.unwrap();
        device.turn_screen(true).await.unwrap();
        assert_eq!(
            session.device().unwrap().calls(),
            vec![MockCall::Screen(false), MockCall::Screen(true)]
        );
    }
}
