//! ADB plumbing: device discovery, port forwarding, package and input commands

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::types::{AppInfo, CurrentApp, WindowSize};
use crate::error::{Result, U2Error};

const SHORT_TIMEOUT: Duration = Duration::from_secs(10);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

lazy_static! {
    static ref FOCUS_RE: Regex =
        Regex::new(r"([A-Za-z0-9_.]+)/([A-Za-z0-9_.$]+)").expect("static regex");
    static ref SIZE_RE: Regex = Regex::new(r"(\d+)x(\d+)").expect("static regex");
    static ref VERSION_NAME_RE: Regex = Regex::new(r"versionName=(\S+)").expect("static regex");
    static ref VERSION_CODE_RE: Regex = Regex::new(r"versionCode=(\d+)").expect("static regex");
}

/// Type of ADB connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Remote,
}

/// One line of `adb devices -l`
#[derive(Debug, Clone, PartialEq)]
pub struct AdbDevice {
    pub serial: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

impl AdbDevice {
    pub fn is_online(&self) -> bool {
        self.status == "device"
    }
}

/// ADB bound to one (optional) device serial
#[derive(Debug, Clone)]
pub struct Adb {
    adb_path: String,
    serial: Option<String>,
}

impl Adb {
    pub fn new(serial: Option<String>) -> Self {
        Self {
            adb_path: "adb".to_string(),
            serial,
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Build ADB command prefix with the device specifier
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd
    }

    /// Run `adb [-s serial] <args>` within `timeout`
    pub async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        debug!(serial = ?self.serial, ?args, "adb");
        let mut cmd = self.command();
        cmd.args(args);

        tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                U2Error::Timeout(format!(
                    "adb {} timed out after {}s",
                    args.join(" "),
                    timeout.as_secs_f64()
                ))
            })?
            .map_err(U2Error::Io)
    }

    /// Run `adb shell <args>` and return stdout
    pub async fn shell(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        let output = self.run(&full, SHORT_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Connect to a remote device via TCP/IP
    pub async fn connect(&self, address: &str, timeout: Duration) -> Result<String> {
        let address = if address.contains(':') {
            address.to_string()
        } else {
            format!("{}:5555", address)
        };

        let output = tokio::time::timeout(
            timeout,
            Command::new(&self.adb_path)
                .arg("connect")
                .arg(&address)
                .output(),
        )
        .await
        .map_err(|_| {
            U2Error::Timeout(format!(
                "adb connect timeout after {}s",
                timeout.as_secs_f64()
            ))
        })?
        .map_err(U2Error::Io)?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let lower = combined.to_lowercase();
        if lower.contains("connected") && !lower.contains("cannot") && !lower.contains("failed") {
            Ok(address)
        } else {
            Err(U2Error::CommandFailed(combined.trim().to_string()))
        }
    }

    /// List all devices known to the adb server
    pub async fn list_devices(&self) -> Result<Vec<AdbDevice>> {
        let output = tokio::time::timeout(
            Duration::from_secs(5),
            Command::new(&self.adb_path)
                .arg("devices")
                .arg("-l")
                .output(),
        )
        .await
        .map_err(|_| U2Error::Timeout("List devices timeout after 5s".to_string()))?
        .map_err(U2Error::Io)?;

        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Forward a free local port to `remote_port` on the device
    pub async fn forward(&self, remote_port: u16) -> Result<u16> {
        let remote = format!("tcp:{}", remote_port);
        let output = self.run(&["forward", "tcp:0", &remote], SHORT_TIMEOUT).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<u16>().map_err(|_| {
            U2Error::CommandFailed(format!(
                "adb forward printed no port: {}{}",
                stdout.trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        })
    }

    pub async fn current_app(&self) -> Result<CurrentApp> {
        let stdout = self.shell(&["dumpsys", "window"]).await?;
        if stdout.is_empty() {
            return Err(U2Error::CommandFailed(
                "No output from dumpsys window".to_string(),
            ));
        }
        parse_current_app(&stdout)
            .ok_or_else(|| U2Error::CommandFailed("no focused window found".to_string()))
    }

    pub async fn window_size(&self) -> Result<WindowSize> {
        let stdout = self.shell(&["wm", "size"]).await?;
        parse_window_size(&stdout)
            .ok_or_else(|| U2Error::CommandFailed(format!("unexpected wm size output: {}", stdout)))
    }

    /// Launch the package's launcher activity
    pub async fn launch(&self, package: &str) -> Result<()> {
        self.shell(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await?;
        Ok(())
    }

    pub async fn force_stop(&self, package: &str) -> Result<()> {
        self.shell(&["am", "force-stop", package]).await?;
        Ok(())
    }

    pub async fn clear_data(&self, package: &str) -> Result<()> {
        let stdout = self.shell(&["pm", "clear", package]).await?;
        if stdout.contains("Success") {
            Ok(())
        } else {
            Err(U2Error::CommandFailed(format!(
                "pm clear {}: {}",
                package,
                stdout.trim()
            )))
        }
    }

    pub async fn install(&self, apk: &Path) -> Result<()> {
        let path = apk.to_string_lossy();
        let output = self.run(&["install", "-r", "-t", &path], INSTALL_TIMEOUT).await?;
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if combined.contains("Success") {
            Ok(())
        } else {
            Err(U2Error::CommandFailed(combined.trim().to_string()))
        }
    }

    /// Returns whether the package was removed
    pub async fn uninstall(&self, package: &str) -> Result<bool> {
        let output = self.run(&["uninstall", package], SHORT_TIMEOUT).await?;
        Ok(String::from_utf8_lossy(&output.stdout).contains("Success"))
    }

    pub async fn app_info(&self, package: &str) -> Result<AppInfo> {
        let dumpsys = self.shell(&["dumpsys", "package", package]).await?;
        let resolved = self
            .shell(&["cmd", "package", "resolve-activity", "--brief", package])
            .await?;
        let mut info = parse_app_info(package, &dumpsys, &resolved)
            .ok_or_else(|| U2Error::CommandFailed(format!("app not installed: {}", package)))?;
        info.size = self.apk_size(package).await;
        Ok(info)
    }

    /// Size of the base APK, `None` when `pm path` or `stat` come up empty
    async fn apk_size(&self, package: &str) -> Option<u64> {
        let paths = self.shell(&["pm", "path", package]).await.ok()?;
        let apk = parse_apk_path(&paths)?;
        let stat = self.shell(&["stat", "-c", "%s", apk]).await.ok()?;
        stat.trim().parse().ok()
    }

    /// Long press at the specified coordinates
    pub async fn long_press(&self, x: i32, y: i32, duration: Duration) -> Result<()> {
        let (x, y) = (x.to_string(), y.to_string());
        let ms = duration.as_millis().to_string();
        self.shell(&["input", "swipe", &x, &y, &x, &y, &ms]).await?;
        Ok(())
    }

    /// Raw PNG from `screencap`
    pub async fn screencap(&self) -> Result<Vec<u8>> {
        let output = self
            .run(&["exec-out", "screencap", "-p"], SHORT_TIMEOUT)
            .await?;
        if output.stdout.is_empty() {
            return Err(U2Error::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }

    pub async fn start_activity(&self, component: &str, extras: &[(&str, &str)]) -> Result<()> {
        let mut args = vec!["am", "start", "-n", component];
        for (key, value) in extras {
            args.extend_from_slice(&["-e", *key, *value]);
        }
        self.shell(&args).await?;
        Ok(())
    }
}

impl Default for Adb {
    fn default() -> Self {
        Self::new(None)
    }
}

fn parse_devices(stdout: &str) -> Vec<AdbDevice> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return None;
            }
            let serial = parts[0].to_string();
            let connection_type = if serial.contains(':') {
                ConnectionType::Remote
            } else {
                ConnectionType::Usb
            };
            let model = parts[2..]
                .iter()
                .find_map(|p| p.strip_prefix("model:"))
                .map(|s| s.to_string());
            Some(AdbDevice {
                serial,
                status: parts[1].to_string(),
                connection_type,
                model,
            })
        })
        .collect()
}

fn parse_current_app(dumpsys: &str) -> Option<CurrentApp> {
    let focus_lines = dumpsys
        .lines()
        .filter(|line| line.contains("mCurrentFocus"))
        .chain(dumpsys.lines().filter(|line| line.contains("mFocusedApp")));

    for line in focus_lines {
        if let Some(caps) = FOCUS_RE.captures(line) {
            return Some(CurrentApp {
                package: caps[1].to_string(),
                activity: caps[2].to_string(),
            });
        }
    }
    None
}

/// Prefers the override size when one is set
fn parse_window_size(stdout: &str) -> Option<WindowSize> {
    let line = stdout
        .lines()
        .find(|l| l.contains("Override size"))
        .or_else(|| stdout.lines().find(|l| l.contains("Physical size")))?;
    let caps = SIZE_RE.captures(line)?;
    Some(WindowSize {
        width: caps[1].parse().ok()?,
        height: caps[2].parse().ok()?,
    })
}

fn parse_app_info(package: &str, dumpsys: &str, resolved: &str) -> Option<AppInfo> {
    let version_name = VERSION_NAME_RE
        .captures(dumpsys)
        .map(|caps| caps[1].to_string());
    let version_code = VERSION_CODE_RE
        .captures(dumpsys)
        .and_then(|caps| caps[1].parse().ok());
    if version_name.is_none() && version_code.is_none() {
        return None;
    }

    let main_activity = resolved
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with(&format!("{}/", package)))
        .and_then(|line| line.split_once('/'))
        .map(|(_, activity)| activity.to_string());

    Some(AppInfo {
        package_name: package.to_string(),
        main_activity,
        version_name,
        version_code,
        ..Default::default()
    })
}

/// First `package:` line of `pm path`; split APKs list the base one first
fn parse_apk_path(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("package:"))
        .filter(|path| !path.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        let stdout = "List of devices attached\n\
            emulator-5554          device product:sdk model:Pixel_6 device:emu\n\
            192.168.1.20:5555      offline\n\n";
        let devices = parse_devices(stdout);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert_eq!(devices[0].model.as_deref(), Some("Pixel_6"));
        assert!(devices[0].is_online());
        assert_eq!(devices[1].connection_type, ConnectionType::Remote);
        assert!(!devices[1].is_online());
    }

    #[test]
    fn test_parse_current_app() {
        let dumpsys = "  mFocusedApp=ActivityRecord{1 u0 com.other/.Other t3}\n\
            mCurrentFocus=Window{4f3a1c2 u0 com.android.settings/com.android.settings.Settings}\n";
        let app = parse_current_app(dumpsys).unwrap();

        assert_eq!(app.package, "com.android.settings");
        assert_eq!(app.activity, "com.android.settings.Settings");
        assert_eq!(parse_current_app("nothing here"), None);
    }

    #[test]
    fn test_parse_window_size_prefers_override() {
        assert_eq!(
            parse_window_size("Physical size: 1080x2400\n"),
            Some(WindowSize {
                width: 1080,
                height: 2400
            })
        );
        assert_eq!(
            parse_window_size("Physical size: 1080x2400\nOverride size: 720x1600\n"),
            Some(WindowSize {
                width: 720,
                height: 1600
            })
        );
    }

    #[test]
    fn test_parse_app_info() {
        let dumpsys = "Packages:\n  Package [com.example] (abc):\n    versionCode=42 minSdk=21 targetSdk=33\n    versionName=1.4.2\n";
        let resolved = "priority=0 preferredOrder=0\ncom.example/.MainActivity\n";
        let info = parse_app_info("com.example", dumpsys, resolved).unwrap();

        assert_eq!(info.version_name.as_deref(), Some("1.4.2"));
        assert_eq!(info.version_code, Some(42));
        assert_eq!(info.main_activity.as_deref(), Some(".MainActivity"));
        assert_eq!(info.size, None);
        assert_eq!(parse_app_info("com.missing", "", ""), None);
    }

    #[test]
    fn test_parse_apk_path() {
        let stdout = "package:/data/app/~~x==/com.example-1/base.apk\r\npackage:/data/app/~~x==/com.example-1/split_config.arm64_v8a.apk\n";
        assert_eq!(
            parse_apk_path(stdout),
            Some("/data/app/~~x==/com.example-1/base.apk")
        );
        assert_eq!(parse_apk_path(""), None);
        assert_eq!(parse_apk_path("package:\n"), None);
    }
}
