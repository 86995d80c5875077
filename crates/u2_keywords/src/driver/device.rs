//! `Automation` over the uiautomator agent: JSON-RPC for UI work, adb for the rest

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::adb::Adb;
use super::rpc::JsonRpcClient;
use super::types::{
    AppInfo, ChildQuery, CurrentApp, ElementInfo, Key, ScrollAction, UiObject, WindowSize,
};
use super::{deadline_after, Automation, Connect};
use crate::config::{secs, AGENT_PORT, MAX_WAIT, TIMING_CONFIG};
use crate::error::{Result, U2Error};
use crate::selector::Selector;

const SCROLL_STEPS: u32 = 55;
const SCROLL_MAX_SWIPES: u32 = 500;
const HIERARCHY_MAX_DEPTH: u32 = 50;
const FLOAT_WINDOW_ACTIVITY: &str = "com.github.uiautomator/.ToastActivity";

/// Where the agent is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// First online adb device, or `ANDROID_SERIAL`
    Default,
    /// adb serial, reached through a forwarded port
    Serial(String),
    /// Network device, agent reached directly on its port
    Host(String),
    /// Explicit agent URL
    Url(String),
}

impl Endpoint {
    pub fn parse(address: Option<&str>) -> Endpoint {
        let address = match address.map(str::trim) {
            None | Some("") => return Endpoint::Default,
            Some(address) => address,
        };
        if address.starts_with("http://") || address.starts_with("https://") {
            Endpoint::Url(address.trim_end_matches('/').to_string())
        } else if is_ipv4(address) {
            Endpoint::Host(address.to_string())
        } else {
            Endpoint::Serial(address.to_string())
        }
    }
}

fn is_ipv4(address: &str) -> bool {
    address.parse::<std::net::Ipv4Addr>().is_ok()
}

pub struct U2Device {
    adb: Adb,
    rpc: JsonRpcClient,
    http: reqwest::Client,
    base_url: String,
}

impl U2Device {
    /// Resolve the endpoint, set up adb and check the agent answers
    pub async fn open(endpoint: Endpoint) -> Result<Self> {
        let connect_timeout = secs(TIMING_CONFIG.connection.connect_timeout);
        let host_adb = Adb::default();

        let (serial, base_url) = match endpoint {
            Endpoint::Default => {
                let serial = match env::var("ANDROID_SERIAL") {
                    Ok(serial) if !serial.is_empty() => serial,
                    _ => host_adb
                        .list_devices()
                        .await?
                        .into_iter()
                        .find(|d| d.is_online())
                        .map(|d| d.serial)
                        .ok_or_else(|| {
                            U2Error::DeviceNotFound("no online device in adb devices".to_string())
                        })?,
                };
                let port = Adb::new(Some(serial.clone())).forward(AGENT_PORT).await?;
                (Some(serial), format!("http://127.0.0.1:{}", port))
            }
            Endpoint::Serial(serial) => {
                if serial.contains(':') {
                    host_adb.connect(&serial, connect_timeout).await?;
                }
                let port = Adb::new(Some(serial.clone())).forward(AGENT_PORT).await?;
                (Some(serial), format!("http://127.0.0.1:{}", port))
            }
            Endpoint::Host(host) => {
                let serial = adb_over_network(&host_adb, &host, connect_timeout).await;
                (serial, format!("http://{}:{}", host, AGENT_PORT))
            }
            Endpoint::Url(url) => {
                let host = reqwest::Url::parse(&url)
                    .map_err(|e| U2Error::InvalidArgument(format!("{}: {}", url, e)))?
                    .host_str()
                    .map(str::to_string);
                let serial = match host {
                    Some(host) if is_ipv4(&host) => {
                        adb_over_network(&host_adb, &host, connect_timeout).await
                    }
                    _ => None,
                };
                (serial, url)
            }
        };

        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        let device = Self::with_client(Adb::new(serial), http, base_url);
        device.ping().await?;
        info!(serial = ?device.serial(), url = %device.base_url, "device connected");
        Ok(device)
    }

    fn with_client(adb: Adb, http: reqwest::Client, base_url: String) -> Self {
        Self {
            adb,
            rpc: JsonRpcClient::new(http.clone(), &base_url),
            http,
            base_url,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.adb.serial()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ping(&self) -> Result<()> {
        let reply = self.rpc.call("ping", &[], Duration::ZERO).await?;
        if reply.as_str() == Some("pong") {
            Ok(())
        } else {
            Err(U2Error::DeviceNotFound(format!(
                "agent at {} answered {} to ping",
                self.base_url, reply
            )))
        }
    }

    async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        self.rpc.call(method, params, Duration::ZERO).await
    }

    fn require_selector<'a>(&self, obj: &'a UiObject, operation: &str) -> Result<&'a Selector> {
        obj.selector().ok_or_else(|| {
            U2Error::Unsupported(format!("{} on server-side object {}", operation, obj))
        })
    }

    /// Package details from the agent's HTTP API, which knows the label
    async fn agent_app_info(&self, package: &str) -> Result<Option<AppInfo>> {
        let url = format!("{}/packages/{}/info", self.base_url, package);
        let reply: PackageInfoReply = self
            .http
            .get(&url)
            .timeout(secs(TIMING_CONFIG.connection.rpc_timeout))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(reply.data.filter(|_| reply.success).map(|mut info| {
            info.package_name = package.to_string();
            info
        }))
    }

    async fn download(&self, url: &str) -> Result<tempfile::NamedTempFile> {
        info!(url, "downloading apk");
        let bytes = self
            .http
            .get(url)
            .timeout(Duration::from_secs(600))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let file = tempfile::Builder::new().suffix(".apk").tempfile()?;
        tokio::fs::write(file.path(), &bytes).await?;
        Ok(file)
    }
}

#[derive(Debug, Deserialize)]
struct PackageInfoReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<AppInfo>,
}

/// `adb connect host:5555`; the agent stays usable over HTTP when this fails
async fn adb_over_network(adb: &Adb, host: &str, timeout: Duration) -> Option<String> {
    match adb.connect(host, timeout).await {
        Ok(serial) => Some(serial),
        Err(e) => {
            warn!(host, error = %e, "adb connect failed, adb-backed keywords will not work");
            None
        }
    }
}

fn millis(duration: Duration) -> Value {
    json!(u64::try_from(duration.min(MAX_WAIT).as_millis()).unwrap_or(u64::MAX))
}

#[async_trait]
impl Connect for U2Device {
    async fn connect(address: Option<&str>) -> Result<Self> {
        U2Device::open(Endpoint::parse(address)).await
    }
}

#[async_trait]
impl Automation for U2Device {
    async fn exists(&self, obj: &UiObject) -> Result<bool> {
        let value = self.call("exist", &[obj.to_param()]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn wait(&self, obj: &UiObject, timeout: Duration) -> Result<bool> {
        let value = self
            .rpc
            .call("waitForExists", &[obj.to_param(), millis(timeout)], timeout)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn wait_gone(&self, obj: &UiObject, timeout: Duration) -> Result<bool> {
        let value = self
            .rpc
            .call("waitUntilGone", &[obj.to_param(), millis(timeout)], timeout)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn info(&self, obj: &UiObject) -> Result<ElementInfo> {
        self.rpc
            .call_as("objInfo", &[obj.to_param()], Duration::ZERO)
            .await
    }

    async fn count(&self, obj: &UiObject) -> Result<usize> {
        match obj.selector() {
            Some(selector) => {
                let value = self.call("count", &[selector.to_json()]).await?;
                Ok(value.as_u64().unwrap_or(0) as usize)
            }
            None => Ok(usize::from(self.exists(obj).await?)),
        }
    }

    async fn click(&self, obj: &UiObject) -> Result<bool> {
        let value = self.call("click", &[obj.to_param()]).await?;
        Ok(value.as_bool().unwrap_or(true))
    }

    async fn get_text(&self, obj: &UiObject) -> Result<String> {
        let value = self.call("getText", &[obj.to_param()]).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn set_text(&self, obj: &UiObject, text: &str) -> Result<bool> {
        let value = self.call("setText", &[obj.to_param(), json!(text)]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn clear_text(&self, obj: &UiObject) -> Result<()> {
        self.call("clearTextField", &[obj.to_param()]).await?;
        Ok(())
    }

    async fn child_by(
        &self,
        parent: &UiObject,
        query: &ChildQuery,
        child: &Selector,
    ) -> Result<UiObject> {
        let parent = self.require_selector(parent, "child lookup")?.to_json();
        let child = child.to_json();
        let name = match query {
            ChildQuery::Text { text, allow_scroll } => {
                self.call(
                    "childByText",
                    &[parent, child, json!(text), json!(allow_scroll)],
                )
                .await?
            }
            ChildQuery::Description {
                description,
                allow_scroll,
            } => {
                self.call(
                    "childByDescription",
                    &[parent, child, json!(description), json!(allow_scroll)],
                )
                .await?
            }
            ChildQuery::Instance(instance) => {
                self.call("childByInstance", &[parent, child, json!(instance)])
                    .await?
            }
        };
        match name {
            Value::String(name) => Ok(UiObject::remote(name)),
            other => Err(U2Error::ElementNotFound(format!(
                "child lookup returned {}",
                other
            ))),
        }
    }

    async fn scroll(&self, obj: &UiObject, action: &ScrollAction) -> Result<bool> {
        let selector = self.require_selector(obj, "scroll")?.to_json();
        let value = match action {
            ScrollAction::Forward => {
                self.call("scrollForward", &[selector, json!(true), json!(SCROLL_STEPS)])
                    .await?
            }
            ScrollAction::Backward => {
                self.call("scrollBackward", &[selector, json!(true), json!(SCROLL_STEPS)])
                    .await?
            }
            ScrollAction::ToBeginning => {
                self.call(
                    "scrollToBeginning",
                    &[selector, json!(true), json!(SCROLL_MAX_SWIPES), json!(SCROLL_STEPS)],
                )
                .await?
            }
            ScrollAction::ToEnd => {
                self.call(
                    "scrollToEnd",
                    &[selector, json!(true), json!(SCROLL_MAX_SWIPES), json!(SCROLL_STEPS)],
                )
                .await?
            }
            ScrollAction::To(target) => {
                self.call("scrollTo", &[selector, target.to_json(), json!(true)])
                    .await?
            }
        };
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click_point(&self, x: i32, y: i32) -> Result<()> {
        self.call("click", &[json!(x), json!(y)]).await?;
        Ok(())
    }

    async fn long_click_point(&self, x: i32, y: i32, duration: Duration) -> Result<()> {
        self.adb.long_press(x, y, duration).await
    }

    async fn swipe(&self, fx: i32, fy: i32, tx: i32, ty: i32, steps: u32) -> Result<()> {
        self.call(
            "swipe",
            &[json!(fx), json!(fy), json!(tx), json!(ty), json!(steps)],
        )
        .await?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<bool> {
        let value = self.call("pressKey", &[json!(key.as_str())]).await?;
        Ok(value.as_bool().unwrap_or(true))
    }

    async fn screen_on(&self) -> Result<()> {
        self.call("wakeUp", &[]).await?;
        Ok(())
    }

    async fn screen_off(&self) -> Result<()> {
        self.call("sleep", &[]).await?;
        Ok(())
    }

    async fn window_size(&self) -> Result<WindowSize> {
        let info = self.device_info().await?;
        let width = info.get("displayWidth").and_then(Value::as_u64);
        let height = info.get("displayHeight").and_then(Value::as_u64);
        match (width, height) {
            (Some(width), Some(height)) => Ok(WindowSize {
                width: width as u32,
                height: height as u32,
            }),
            _ => self.adb.window_size().await,
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let value = self.call("takeScreenshot", &[json!(1), json!(80)]).await?;
        match value.as_str() {
            Some(encoded) => Ok(general_purpose::STANDARD.decode(encoded)?),
            None => {
                debug!("takeScreenshot returned nothing, using screencap");
                self.adb.screencap().await
            }
        }
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        let value = self
            .call(
                "dumpWindowHierarchy",
                &[json!(false), json!(HIERARCHY_MAX_DEPTH)],
            )
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| U2Error::Hierarchy("empty hierarchy dump".to_string()))
    }

    async fn device_info(&self) -> Result<Value> {
        self.call("deviceInfo", &[]).await
    }

    async fn last_toast(&self, cache: Duration) -> Result<Option<String>> {
        let value = self.call("getLastToast", &[millis(cache)]).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn show_float_window(&self) -> Result<()> {
        self.adb
            .start_activity(FLOAT_WINDOW_ACTIVITY, &[("showFloatWindow", "true")])
            .await
    }

    async fn app_install(&self, source: &str) -> Result<()> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let apk = self.download(source).await?;
            self.adb.install(apk.path()).await
        } else {
            self.adb.install(std::path::Path::new(source)).await
        }
    }

    async fn app_start(&self, package: &str, stop: bool) -> Result<()> {
        if stop {
            self.adb.force_stop(package).await?;
        }
        self.adb.launch(package).await?;

        let deadline = deadline_after(secs(TIMING_CONFIG.device.app_start_timeout));
        while tokio::time::Instant::now() < deadline {
            match self.adb.current_app().await {
                Ok(current) if current.package == package => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "foreground app not readable yet"),
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        warn!(package, "app did not reach the foreground");
        Ok(())
    }

    async fn app_stop(&self, package: &str) -> Result<()> {
        self.adb.force_stop(package).await
    }

    async fn app_clear(&self, package: &str) -> Result<()> {
        self.adb.clear_data(package).await
    }

    async fn app_uninstall(&self, package: &str) -> Result<bool> {
        self.adb.uninstall(package).await
    }

    async fn app_info(&self, package: &str) -> Result<AppInfo> {
        match self.agent_app_info(package).await {
            Ok(Some(info)) => Ok(info),
            Ok(None) => self.adb.app_info(package).await,
            Err(e) => {
                debug!(package, error = %e, "agent has no package info, asking adb");
                self.adb.app_info(package).await
            }
        }
    }

    async fn app_current(&self) -> Result<CurrentApp> {
        self.adb.current_app().await
    }
}
