//! u2_keywords: keyword library for Android UI automation
//!
//! Keywords locate widgets through uiautomator selectors or xpath, act on
//! them and report results, talking to the on-device uiautomator agent:
//! - `keywords`: by-locator, device and xpath keywords plus loose dispatch
//! - `driver`: the `Automation` trait and its HTTP/adb implementation
//! - `selector`: typed uiautomator selectors
//! - `config`: timing defaults
//! - `logging`: console and rotating file output
//!
//! # Example
//!
//! ```no_run
//! use u2_keywords::{Mobile, Selector, Target};
//!
//! #[tokio::main]
//! async fn main() -> u2_keywords::Result<()> {
//!     let mobile: Mobile = Mobile::new();
//!     mobile.connect_device(None).await?;
//!
//!     let login = Target::from(Selector::new().resource_id("com.example:id/login"));
//!     let button = mobile.ui().find_element_by_locator(&login, None).await?;
//!     mobile.ui().click_element_by_locator(&button.into(), None).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod keywords;
pub mod logging;
pub mod selector;

#[cfg(test)]
mod testing;

pub use driver::{Automation, Connect, Endpoint, U2Device, UiObject, XmlElement};
pub use error::{Result, U2Error};
pub use keywords::{keyword_catalog, KeywordLibrary, KeywordValue, Mobile, Target, XpathTarget};
pub use logging::init_logging;
pub use selector::{Selector, SelectorKey};
