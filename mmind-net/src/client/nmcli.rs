/// Lazy implementation of the [`crate::client::LinkClient`] trait:
/// provides an interface to the wireless link via the NetworkManager
/// CLI process
use std::{net::IpAddr, process::Command};

use crate::{
    client::{LinkClient, LinkClientError},
    link::{LinkCredentials, LinkState},
};

pub struct NmCliLinkClient {
    device: String,
}

impl NmCliLinkClient {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    fn get_link_state_from_cli(&self) -> Result<LinkState, LinkClientError> {
        let resp = Command::new("nmcli")
            .args(["-t", "-f", "DEVICE,STATE", "device"])
            .output()?;

        if resp.status.success() {
            Ok(NmCliLinkClient::parse_device_state(
                std::str::from_utf8(&resp.stdout)?,
                &self.device,
            ))
        } else {
            Err(LinkClientError::LinkClientErr(format!(
                "Failed CLI Command: exit status {:?}",
                resp.status
            )))
        }
    }

    fn parse_device_state(res: &str, device: &str) -> LinkState {
        for line in res.lines() {
            if let Some((dev, state)) = line.split_once(':') {
                if dev == device {
                    return match state.trim() {
                        "connected" => LinkState::Connected,
                        s if s.starts_with("connecting") => LinkState::Connecting,
                        _ => LinkState::Disconnected,
                    };
                }
            }
        }
        LinkState::Disconnected
    }

    fn get_hardware_addr_from_cli(&self) -> Result<String, LinkClientError> {
        let resp = Command::new("nmcli")
            .args(["-t", "-f", "GENERAL.HWADDR", "device", "show", &self.device])
            .output()?;

        if resp.status.success() {
            NmCliLinkClient::parse_hwaddr_output(std::str::from_utf8(&resp.stdout)?)
        } else {
            Err(LinkClientError::LinkClientErr(format!(
                "Failed CLI Command: exit status {:?}",
                resp.status
            )))
        }
    }

    fn parse_hwaddr_output(res: &str) -> Result<String, LinkClientError> {
        // Terse-mode nmcli escapes the colons in the address field
        res.lines()
            .find_map(|l| l.strip_prefix("GENERAL.HWADDR:"))
            .map(|addr| addr.trim().replace('\\', ""))
            .filter(|addr| !addr.is_empty())
            .ok_or_else(|| {
                LinkClientError::LinkClientErr("No hardware address reported".to_string())
            })
    }

    fn get_local_addr_from_cli(&self) -> Result<IpAddr, LinkClientError> {
        let resp = Command::new("nmcli")
            .args(["-t", "-f", "IP4.ADDRESS", "device", "show", &self.device])
            .output()?;

        if resp.status.success() {
            NmCliLinkClient::parse_addr_output(std::str::from_utf8(&resp.stdout)?)
        } else {
            Err(LinkClientError::LinkClientErr(format!(
                "Failed CLI Command: exit status {:?}",
                resp.status
            )))
        }
    }

    fn parse_addr_output(res: &str) -> Result<IpAddr, LinkClientError> {
        for line in res.lines() {
            if let Some((key, rem)) = line.split_once(':') {
                if key.starts_with("IP4.ADDRESS") {
                    let addr = rem.split('/').next().unwrap_or(rem).trim();
                    return Ok(addr.parse()?);
                }
            }
        }
        Err(LinkClientError::LinkClientErr(
            "No address is currently assigned".to_string(),
        ))
    }
}

impl LinkClient for NmCliLinkClient {
    fn start_join(&self, credentials: &LinkCredentials) -> Result<(), LinkClientError> {
        let resp = Command::new("nmcli")
            .args([
                "device",
                "wifi",
                "connect",
                &credentials.ssid,
                "password",
                &credentials.psk,
                "ifname",
                &self.device,
            ])
            .output()?;

        if resp.status.success() {
            Ok(())
        } else {
            Err(LinkClientError::LinkClientErr(format!(
                "Failed CLI Command: exit status {:?}",
                resp.status
            )))
        }
    }

    fn link_state(&self) -> Result<LinkState, LinkClientError> {
        self.get_link_state_from_cli()
    }

    fn local_addr(&self) -> Result<IpAddr, LinkClientError> {
        self.get_local_addr_from_cli()
    }

    fn hardware_addr(&self) -> Result<String, LinkClientError> {
        self.get_hardware_addr_from_cli()
    }
}
