use anyhow::{Context, Result, bail};
use log::{debug, warn};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use std::time::Duration;
use tokio::{process::Command, time::timeout};
use trait_variant::make;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Index the secondary DNS server is added at
pub const SECONDARY_DNS_INDEX: u8 = 2;

/// Query and mutation primitives of the OS network-configuration utility
///
/// Every mutation is fire-and-check: `Ok(())` means the command exited
/// successfully, an error carries the command line and its diagnostic output.
#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait NetworkConfigurator {
    async fn query_wlan_interfaces(&self) -> Result<String>;
    async fn query_ip_config(&self, interface: &str) -> Result<String>;
    async fn set_static_address(
        &self,
        interface: &str,
        ip: &str,
        subnet: &str,
        gateway: &str,
    ) -> Result<()>;
    async fn set_dns(&self, interface: &str, dns: &str) -> Result<()>;
    async fn add_dns(&self, interface: &str, dns: &str, index: u8) -> Result<()>;
    async fn set_dhcp_address(&self, interface: &str) -> Result<()>;
    async fn set_dhcp_dns(&self, interface: &str) -> Result<()>;
}

/// `NetworkConfigurator` backed by `netsh.exe`
#[derive(Clone, Debug)]
pub struct NetshClient {
    program: String,
    command_timeout: Duration,
}

impl NetshClient {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            program: String::from("netsh"),
            command_timeout,
        }
    }

    #[cfg(all(test, unix))]
    fn with_program(program: &str, command_timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            command_timeout,
        }
    }

    /// Run the program with `args` and return its stdout
    ///
    /// The child never opens a console window and is killed once the command
    /// timeout elapses.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!("running `{command_line}`");

        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let output = timeout(self.command_timeout, command.output())
            .await
            .with_context(|| {
                format!(
                    "`{command_line}` timed out after {}s",
                    self.command_timeout.as_secs()
                )
            })?
            .with_context(|| format!("failed to spawn `{command_line}`"))?;

        let stdout = decode_output(&command_line, output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostics = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            bail!(
                "`{command_line}` failed with {}: {diagnostics}",
                output.status
            );
        }

        Ok(stdout)
    }
}

/// Decode command output, warning when it is not UTF-8
///
/// netsh writes to a pipe in the console OEM code page, non-ASCII characters
/// (e.g. in an SSID) are then replaced and will not match any profile.
fn decode_output(command_line: &str, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(output) => output,
        Err(e) => {
            warn!(
                "output of `{command_line}` is not valid utf-8, non-ascii characters are replaced: {e}"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

impl NetworkConfigurator for NetshClient {
    async fn query_wlan_interfaces(&self) -> Result<String> {
        self.run(&["wlan", "show", "interfaces"]).await
    }

    async fn query_ip_config(&self, interface: &str) -> Result<String> {
        self.run(&[
            "interface",
            "ip",
            "show",
            "config",
            &format!("name={interface}"),
        ])
        .await
    }

    async fn set_static_address(
        &self,
        interface: &str,
        ip: &str,
        subnet: &str,
        gateway: &str,
    ) -> Result<()> {
        self.run(&[
            "interface",
            "ip",
            "set",
            "address",
            interface,
            "static",
            ip,
            subnet,
            gateway,
        ])
        .await
        .map(|_| ())
    }

    async fn set_dns(&self, interface: &str, dns: &str) -> Result<()> {
        self.run(&[
            "interface",
            "ip",
            "set",
            "dns",
            interface,
            "static",
            dns,
            "primary",
        ])
        .await
        .map(|_| ())
    }

    async fn add_dns(&self, interface: &str, dns: &str, index: u8) -> Result<()> {
        self.run(&[
            "interface",
            "ip",
            "add",
            "dns",
            interface,
            dns,
            &format!("index={index}"),
        ])
        .await
        .map(|_| ())
    }

    async fn set_dhcp_address(&self, interface: &str) -> Result<()> {
        self.run(&["interface", "ip", "set", "address", interface, "dhcp"])
            .await
            .map(|_| ())
    }

    async fn set_dhcp_dns(&self, interface: &str) -> Result<()> {
        self.run(&["interface", "ip", "set", "dns", interface, "dhcp"])
            .await
            .map(|_| ())
    }
}
