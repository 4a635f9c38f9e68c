//! SSID-driven reconciliation of the interface's IP configuration
//!
//! Every tick compares the configuration wanted for the connected SSID with
//! what the interface currently has and issues at most one corrective
//! action. The loop is level-triggered: a failed action is simply attempted
//! again on a later tick.

use crate::{
    config::MonitorConfig,
    netsh_client::{NetworkConfigurator, SECONDARY_DNS_INDEX},
    services::{
        observer::StateObserver,
        profile_store::{NetworkProfile, ProfileStore},
    },
};
use anyhow::Result;
use log::{debug, error, info};
use tokio::{sync::broadcast, time::sleep};

/// Desired configuration derived from the connected SSID and the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Not associated with any network, or the query failed
    Disconnected,
    /// Associated with a network that has no profile
    Unmapped(String),
    /// Associated with a network that has a profile
    Mapped {
        ssid: String,
        profile: NetworkProfile,
    },
}

impl Target {
    pub fn resolve(ssid: Option<String>, store: &ProfileStore) -> Self {
        match ssid {
            None => Target::Disconnected,
            Some(ssid) => match store.get(&ssid) {
                Some(profile) => Target::Mapped {
                    profile: profile.clone(),
                    ssid,
                },
                None => Target::Unmapped(ssid),
            },
        }
    }
}

/// Corrective action issued in a tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    ApplyStatic(NetworkProfile),
    ApplyDhcp,
}

/// Steps of a corrective action that failed
///
/// Steps are independent: a failed step does not prevent later ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub attempted: usize,
    pub failed: Vec<&'static str>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, step: &'static str, result: Result<()>) {
        self.attempted += 1;

        if let Err(e) = result {
            error!("failed to {step}: {e:#}");
            self.failed.push(step);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Target unchanged since the last settled tick, nothing was queried
    Unchanged,
    /// Interface already has the profile's address
    AlreadyStatic,
    /// Interface already gets address and DNS servers via DHCP
    AlreadyDhcp,
    Applied(Action, ApplyReport),
}

impl TickOutcome {
    /// Whether the tick left the interface where the target wants it
    fn is_settled(&self) -> bool {
        match self {
            TickOutcome::Applied(_, report) => report.is_complete(),
            _ => true,
        }
    }
}

/// Set static address, primary DNS and, if configured, secondary DNS
///
/// Every step is attempted regardless of earlier failures and nothing is
/// rolled back, so a partial failure leaves a partially applied profile.
pub async fn apply_static_config<T>(
    configurator: &T,
    interface: &str,
    profile: &NetworkProfile,
) -> ApplyReport
where
    T: NetworkConfigurator,
{
    let mut report = ApplyReport::default();

    report.record(
        "set static address",
        configurator
            .set_static_address(interface, &profile.ip, &profile.subnet, &profile.gateway)
            .await,
    );
    report.record(
        "set primary dns",
        configurator
            .set_dns(interface, &profile.preferred_dns)
            .await,
    );
    if let Some(alternate_dns) = &profile.alternate_dns {
        report.record(
            "add secondary dns",
            configurator
                .add_dns(interface, alternate_dns, SECONDARY_DNS_INDEX)
                .await,
        );
    }

    if report.is_complete() {
        info!("static ip set for {interface}: {}", profile.ip);
    }

    report
}

/// Switch address and DNS source of `interface` to DHCP
///
/// Same best-effort policy as [`apply_static_config`].
pub async fn apply_dhcp_config<T>(configurator: &T, interface: &str) -> ApplyReport
where
    T: NetworkConfigurator,
{
    let mut report = ApplyReport::default();

    report.record(
        "set dhcp address",
        configurator.set_dhcp_address(interface).await,
    );
    report.record("set dhcp dns", configurator.set_dhcp_dns(interface).await);

    if report.is_complete() {
        info!("switched {interface} to dhcp");
    }

    report
}

pub struct ReconciliationLoop<T> {
    configurator: T,
    config: MonitorConfig,
    last_target: Option<Target>,
}

impl<T> ReconciliationLoop<T>
where
    T: NetworkConfigurator,
{
    pub fn new(configurator: T, config: MonitorConfig) -> Self {
        Self {
            configurator,
            config,
            last_target: None,
        }
    }

    /// Run ticks until `shutdown` receives a message or is closed
    ///
    /// A failing tick is logged and retried after the poll interval.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "monitoring {} every {}s using {:?}",
            self.config.interface_name,
            self.config.poll_interval.as_secs(),
            self.config.profiles_file
        );

        loop {
            match self.tick().await {
                Ok(outcome) => debug!("tick finished: {outcome:?}"),
                Err(e) => error!("tick failed: {e:#}"),
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {},
                _ = shutdown.recv() => {
                    debug!("shutdown requested");
                    break;
                }
            }
        }

        info!("stopped monitoring {}", self.config.interface_name);
    }

    /// Observe, compare and correct once
    ///
    /// # Errors
    /// Returns error if the profiles file exists but cannot be read
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let ssid =
            StateObserver::connected_ssid(&self.configurator, &self.config.interface_name).await;
        let store = ProfileStore::load(&self.config.profiles_file)?;
        let target = Target::resolve(ssid, &store);

        if !self.config.reevaluate_every_tick && self.last_target.as_ref() == Some(&target) {
            return Ok(TickOutcome::Unchanged);
        }

        let outcome = self.reconcile(&target).await;

        self.last_target = outcome.is_settled().then_some(target);

        Ok(outcome)
    }

    async fn reconcile(&self, target: &Target) -> TickOutcome {
        let interface = self.config.interface_name.as_str();

        match target {
            Target::Mapped { ssid, profile } => {
                let current_ip = StateObserver::current_ip(&self.configurator, interface).await;

                if current_ip.as_deref() == Some(profile.ip.as_str()) {
                    info!("ip already set for ssid '{ssid}'");
                    return TickOutcome::AlreadyStatic;
                }

                info!(
                    "ssid '{ssid}' detected with ip {current_ip:?}, setting static ip {}",
                    profile.ip
                );
                let report = apply_static_config(&self.configurator, interface, profile).await;
                TickOutcome::Applied(Action::ApplyStatic(profile.clone()), report)
            }
            Target::Unmapped(ssid) => {
                info!("ssid '{ssid}' not configured, switching to dhcp");
                self.ensure_dhcp(interface).await
            }
            Target::Disconnected => {
                info!("no ssid connected, switching to dhcp");
                self.ensure_dhcp(interface).await
            }
        }
    }

    async fn ensure_dhcp(&self, interface: &str) -> TickOutcome {
        let ip_config = StateObserver::ip_configuration(&self.configurator, interface).await;

        if ip_config.is_some_and(|config| config.is_fully_dhcp()) {
            info!("{interface} already uses dhcp");
            return TickOutcome::AlreadyDhcp;
        }

        let report = apply_dhcp_config(&self.configurator, interface).await;
        TickOutcome::Applied(Action::ApplyDhcp, report)
    }
}
