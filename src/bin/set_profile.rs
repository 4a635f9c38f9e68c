//! CLI tool to edit the SSID profiles read by wifi-ip-switcher
//!
//! Usage:
//!   set-profile <ssid> <ip> <subnet> <gateway> <preferred_dns> [alternate_dns]
//!   set-profile --list
//!   set-profile --reset
//!
//! The profiles file is taken from `PROFILES_FILE` like the service does.

use anyhow::{Context, Result, anyhow, bail};
use serde_valid::Validate;
use std::env;
use wifi_ip_switcher::{
    config::AppConfig,
    profile_store::{NetworkProfile, ProfileStore},
};

fn main() {
    let args: Vec<String> = env::args().collect();

    if let Err(e) = run(&args) {
        eprintln!("{e:#}");
        eprintln!(
            "Usage: {0} <ssid> <ip> <subnet> <gateway> <preferred_dns> [alternate_dns]\n       {0} --list\n       {0} --reset",
            args.first().map(String::as_str).unwrap_or("set-profile")
        );
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let path = AppConfig::load()?.monitor.profiles_file;

    match args.get(1..).unwrap_or_default() {
        [flag] if flag == "--list" => {
            let store = ProfileStore::load(&path)?;
            if store.is_empty() {
                println!("No profiles in {path:?}");
            }
            for (ssid, profile) in store.iter() {
                println!(
                    "{ssid}: ip={} subnet={} gateway={} dns={} {}",
                    profile.ip,
                    profile.subnet,
                    profile.gateway,
                    profile.preferred_dns,
                    profile.alternate_dns.as_deref().unwrap_or("-")
                );
            }
        }
        [flag] if flag == "--reset" => {
            if ProfileStore::reset(&path)? {
                println!("Removed all profiles from {path:?}");
            } else {
                println!("No profiles file at {path:?}");
            }
        }
        [ssid, ip, subnet, gateway, preferred_dns, rest @ ..] if rest.len() <= 1 => {
            if ssid.is_empty() {
                bail!("ssid is empty");
            }

            let profile = NetworkProfile {
                ip: ip.clone(),
                subnet: subnet.clone(),
                gateway: gateway.clone(),
                preferred_dns: preferred_dns.clone(),
                alternate_dns: rest.first().cloned(),
            };
            profile
                .validate()
                .map_err(|e| anyhow!("{e}"))
                .context("all given fields are required to be non-empty")?;

            let mut store = ProfileStore::load(&path)?;
            let replaced = store.insert(ssid.clone(), profile).is_some();
            store.save(&path)?;

            if replaced {
                println!("Updated profile for SSID '{ssid}' in {path:?}");
            } else {
                println!("Added profile for SSID '{ssid}' to {path:?}");
            }
        }
        _ => bail!("invalid arguments"),
    }

    Ok(())
}
