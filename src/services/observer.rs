//! Observation of the connected SSID and the interface's IP configuration
//!
//! Query failures are logged and folded into `None`: a failing wireless query
//! is indistinguishable from not being associated with any network.

use crate::netsh_client::NetworkConfigurator;
use log::warn;

/// Where the interface gets its DNS servers from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DnsSource {
    Dhcp,
    Static,
}

/// IPv4 configuration of one interface as reported by `netsh`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpConfiguration {
    pub address: Option<String>,
    pub dhcp_enabled: Option<bool>,
    pub dns_source: Option<DnsSource>,
}

impl IpConfiguration {
    /// Both the address and the DNS servers are obtained via DHCP
    pub fn is_fully_dhcp(&self) -> bool {
        self.dhcp_enabled == Some(true) && self.dns_source == Some(DnsSource::Dhcp)
    }
}

/// Read-only view of the OS network state
pub struct StateObserver;

impl StateObserver {
    /// SSID the wireless `interface` is currently associated with
    ///
    /// # Returns
    /// The SSID, or `None` if `interface` is not associated, not listed or
    /// the query failed
    pub async fn connected_ssid<T>(configurator: &T, interface: &str) -> Option<String>
    where
        T: NetworkConfigurator,
    {
        match configurator.query_wlan_interfaces().await {
            Ok(output) => parse_ssid(&output, interface),
            Err(e) => {
                warn!("failed to get connected ssid: {e:#}");
                None
            }
        }
    }

    /// IPv4 address currently configured on `interface`, static or leased
    pub async fn current_ip<T>(configurator: &T, interface: &str) -> Option<String>
    where
        T: NetworkConfigurator,
    {
        Self::ip_configuration(configurator, interface)
            .await
            .and_then(|config| config.address)
    }

    /// Full IPv4 configuration of `interface`, `None` if the query failed
    pub async fn ip_configuration<T>(configurator: &T, interface: &str) -> Option<IpConfiguration>
    where
        T: NetworkConfigurator,
    {
        match configurator.query_ip_config(interface).await {
            Ok(output) => Some(parse_ip_configuration(&output)),
            Err(e) => {
                warn!("failed to get ip configuration of {interface}: {e:#}");
                None
            }
        }
    }
}

/// Split a `key : value` line of `netsh` output
fn key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(key, value)| (key.trim(), value.trim()))
}

/// Extract the SSID of `interface` from `netsh wlan show interfaces` output
///
/// Each adapter is listed as a block starting with its `Name` line, only the
/// block of `interface` is considered.
pub fn parse_ssid(output: &str, interface: &str) -> Option<String> {
    let mut in_block = false;

    for (key, value) in output.lines().filter_map(key_value) {
        match key {
            "Name" => in_block = value.eq_ignore_ascii_case(interface),
            "SSID" if in_block => {
                return Some(value).filter(|ssid| !ssid.is_empty()).map(str::to_owned);
            }
            _ => {}
        }
    }

    None
}

/// Extract address, DHCP flag and DNS source from
/// `netsh interface ip show config` output
pub fn parse_ip_configuration(output: &str) -> IpConfiguration {
    let mut config = IpConfiguration::default();

    for (key, value) in output.lines().filter_map(key_value) {
        match key {
            "IP Address" if config.address.is_none() && !value.is_empty() => {
                config.address = Some(value.to_string());
            }
            "DHCP enabled" => {
                config.dhcp_enabled = Some(value.eq_ignore_ascii_case("yes"));
            }
            "DNS servers configured through DHCP" => {
                config.dns_source = Some(DnsSource::Dhcp);
            }
            "Statically Configured DNS Servers" => {
                config.dns_source = Some(DnsSource::Static);
            }
            _ => {}
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netsh_client::MockNetworkConfigurator;
    use anyhow::anyhow;

    const WLAN_CONNECTED: &str = r#"
There is 1 interface on the system:

    Name                   : Wi-Fi
    Description            : Intel(R) Wi-Fi 6 AX201 160MHz
    GUID                   : 2b1f7c1e-0000-4a5e-9c3d-5f1e2a3b4c5d
    Physical address       : a4:b1:c1:d2:e3:f4
    State                  : connected
    SSID                   : Office Net
    BSSID                  : 10:20:30:40:50:60
    Network type           : Infrastructure
    Radio type             : 802.11ax
    Authentication         : WPA2-Personal
    Signal                 : 92%

    Hosted network status  : Not available
"#;

    const WLAN_DISCONNECTED: &str = r#"
There is 1 interface on the system:

    Name                   : Wi-Fi
    Description            : Intel(R) Wi-Fi 6 AX201 160MHz
    State                  : disconnected
    Radio status           : Hardware On
                             Software On
"#;

    const IP_CONFIG_DHCP: &str = r#"
Configuration for interface "Wi-Fi"
    DHCP enabled:                         Yes
    IP Address:                           192.168.1.23
    Subnet Prefix:                        192.168.1.0/24 (mask 255.255.255.0)
    Default Gateway:                      192.168.1.1
    Gateway Metric:                       0
    InterfaceMetric:                      35
    DNS servers configured through DHCP:  192.168.1.1
    Register with which suffix:           Primary only
    WINS servers configured through DHCP: None
"#;

    const IP_CONFIG_STATIC: &str = r#"
Configuration for interface "Wi-Fi"
    DHCP enabled:                         No
    IP Address:                           10.0.0.5
    Subnet Prefix:                        10.0.0.0/24 (mask 255.255.255.0)
    Default Gateway:                      10.0.0.1
    Gateway Metric:                       1
    InterfaceMetric:                      35
    Statically Configured DNS Servers:    8.8.8.8
                                          4.2.2.2
    Register with which suffix:           Primary only
    Statically Configured WINS Servers:   None
"#;

    const WLAN_TWO_ADAPTERS: &str = r#"
There are 2 interfaces on the system:

    Name                   : Wi-Fi
    Description            : Intel(R) Wi-Fi 6 AX201 160MHz
    State                  : disconnected
    Radio status           : Hardware On
                             Software On

    Name                   : Wi-Fi 2
    Description            : TP-Link Wireless USB Adapter
    State                  : connected
    SSID                   : work
    BSSID                  : 10:20:30:40:50:61
    Signal                 : 71%

    Hosted network status  : Not available
"#;

    #[test]
    fn parse_ssid_ignores_bssid() {
        assert_eq!(
            parse_ssid(WLAN_CONNECTED, "Wi-Fi"),
            Some("Office Net".to_string())
        );
    }

    #[test]
    fn parse_ssid_when_disconnected() {
        assert_eq!(parse_ssid(WLAN_DISCONNECTED, "Wi-Fi"), None);
        assert_eq!(parse_ssid("", "Wi-Fi"), None);
    }

    #[test]
    fn parse_ssid_empty_value() {
        assert_eq!(
            parse_ssid("    Name : Wi-Fi\n    SSID                   : \n", "Wi-Fi"),
            None
        );
    }

    #[test]
    fn parse_ssid_of_other_interface() {
        assert_eq!(parse_ssid(WLAN_CONNECTED, "Wi-Fi 2"), None);
    }

    #[test]
    fn parse_ssid_with_two_adapters() {
        assert_eq!(parse_ssid(WLAN_TWO_ADAPTERS, "Wi-Fi"), None);
        assert_eq!(
            parse_ssid(WLAN_TWO_ADAPTERS, "Wi-Fi 2"),
            Some("work".to_string())
        );
    }

    #[test]
    fn parse_dhcp_configuration() {
        let config = parse_ip_configuration(IP_CONFIG_DHCP);

        assert_eq!(config.address.as_deref(), Some("192.168.1.23"));
        assert_eq!(config.dhcp_enabled, Some(true));
        assert_eq!(config.dns_source, Some(DnsSource::Dhcp));
        assert!(config.is_fully_dhcp());
    }

    #[test]
    fn parse_static_configuration() {
        let config = parse_ip_configuration(IP_CONFIG_STATIC);

        assert_eq!(config.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.dhcp_enabled, Some(false));
        assert_eq!(config.dns_source, Some(DnsSource::Static));
        assert!(!config.is_fully_dhcp());
    }

    #[test]
    fn parse_configuration_without_address() {
        let config = parse_ip_configuration("Configuration for interface \"Wi-Fi\"\n");

        assert_eq!(config, IpConfiguration::default());
    }

    #[tokio::test]
    async fn connected_ssid_query_failure_is_none() {
        let mut configurator = MockNetworkConfigurator::default();
        configurator
            .expect_query_wlan_interfaces()
            .times(1)
            .returning(|| Box::pin(async { Err(anyhow!("wlan service not running")) }));

        assert_eq!(
            StateObserver::connected_ssid(&configurator, "Wi-Fi").await,
            None
        );
    }

    #[tokio::test]
    async fn current_ip_of_interface() {
        let mut configurator = MockNetworkConfigurator::default();
        configurator
            .expect_query_ip_config()
            .withf(|interface| interface == "Wi-Fi")
            .times(1)
            .returning(|_| Box::pin(async { Ok(IP_CONFIG_STATIC.to_string()) }));

        assert_eq!(
            StateObserver::current_ip(&configurator, "Wi-Fi").await,
            Some("10.0.0.5".to_string())
        );
    }

    #[tokio::test]
    async fn current_ip_query_failure_is_none() {
        let mut configurator = MockNetworkConfigurator::default();
        configurator
            .expect_query_ip_config()
            .returning(|_| Box::pin(async { Err(anyhow!("interface not found")) }));

        assert_eq!(StateObserver::current_ip(&configurator, "Wi-Fi").await, None);
        assert_eq!(
            StateObserver::ip_configuration(&configurator, "Wi-Fi").await,
            None
        );
    }
}
