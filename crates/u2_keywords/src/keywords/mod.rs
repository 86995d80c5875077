//! Keyword layer
//!
//! `Mobile` owns one `Session` and hands it to three providers:
//! - `UiActions`: by-locator keywords
//! - `DeviceActions`: device keywords
//! - `XpathActions`: xpath keywords
//!
//! `KeywordLibrary` adapts loosely typed calls (name plus positional and
//! named `KeywordValue`s) onto these typed providers.

mod args;
mod device;
mod library;
mod session;
mod ui;
mod xpath;

pub use args::{classify, locate, KeywordValue, Role, Shape, Target, XpathTarget};
pub use device::DeviceActions;
pub use library::{keyword_catalog, KeywordLibrary};
pub use session::Session;
pub use ui::{UiActions, ELEMENT_ATTRIBUTES};
pub use xpath::{XpathActions, XPATH_ATTRIBUTES};

use std::sync::Arc;

use crate::driver::{Automation, Connect, U2Device};
use crate::error::Result;

/// Facade over the three keyword providers sharing one device session
pub struct Mobile<A = U2Device> {
    session: Arc<Session<A>>,
    ui: UiActions<A>,
    device: DeviceActions<A>,
    xpath: XpathActions<A>,
}

impl<A: Automation> Mobile<A> {
    /// Not yet connected; call `connect_device` before any keyword
    pub fn new() -> Self {
        Self::from_session(Arc::new(Session::new()))
    }

    /// Already connected to `device`
    pub fn with_device(device: A) -> Self {
        Self::from_session(Arc::new(Session::with_device(device)))
    }

    fn from_session(session: Arc<Session<A>>) -> Self {
        Self {
            ui: UiActions::new(session.clone()),
            device: DeviceActions::new(session.clone()),
            xpath: XpathActions::new(session.clone()),
            session,
        }
    }

    pub fn session(&self) -> &Session<A> {
        &self.session
    }

    pub fn ui(&self) -> &UiActions<A> {
        &self.ui
    }

    pub fn device(&self) -> &DeviceActions<A> {
        &self.device
    }

    pub fn xpath(&self) -> &XpathActions<A> {
        &self.xpath
    }
}

impl<A: Automation + Connect> Mobile<A> {
    /// Connect on first call; later calls keep the existing device
    ///
    /// `serial` may be an adb serial, a device IP or an agent URL. `None`
    /// picks `ANDROID_SERIAL` or the first online adb device.
    pub async fn connect_device(&self, serial: Option<&str>) -> Result<()> {
        self.session.connect_with(|| A::connect(serial)).await?;
        Ok(())
    }
}

impl<A: Automation> Default for Mobile<A> {
    fn default() -> Self {
        Self::new()
    }
}
