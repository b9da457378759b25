use std::time::Duration;
use thiserror::Error;

use crate::{
    client::{LinkClient, LinkClientError},
    RetryPolicy, LINK_JOIN_ATTEMPTS, LINK_JOIN_POLL_MILLIS,
};

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Network join failed after {0} attempts")]
    JoinFailed(u32),
    #[error("Link Client Error")]
    Client(#[from] LinkClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Credentials for joining the wireless network. Supplied by the
/// caller at startup, never baked into this crate.
#[derive(Debug, Clone)]
pub struct LinkCredentials {
    pub ssid: String,
    pub psk: String,
}

/// Manages the underlying wireless link via a [`LinkClient`] impl.
///
/// The join is the one bounded wait in the connectivity stack: it polls
/// link state on a fixed interval up to a fixed attempt cap and then
/// reports failure to the caller, who decides whether to retry or
/// proceed degraded. Broker-session recovery above this layer retries
/// forever instead; that asymmetry is deliberate.
pub struct LinkManager {
    link_client: Box<dyn LinkClient>,
    join_policy: RetryPolicy,
}

impl LinkManager {
    pub fn new(link_client: Box<dyn LinkClient>) -> Self {
        Self::with_policy(
            link_client,
            RetryPolicy::bounded(
                LINK_JOIN_ATTEMPTS,
                Duration::from_millis(LINK_JOIN_POLL_MILLIS),
            ),
        )
    }

    pub fn with_policy(link_client: Box<dyn LinkClient>, join_policy: RetryPolicy) -> Self {
        Self {
            link_client,
            join_policy,
        }
    }

    /// Block until the link reaches Connected or the join policy is
    /// exhausted. Exhaustion leaves the link Disconnected and is
    /// non-fatal; the caller owns the fallback decision.
    pub fn connect(&mut self, credentials: &LinkCredentials) -> Result<(), LinkError> {
        if self.status() == LinkState::Connected {
            return Ok(());
        }

        log::info!("Connecting to network {:}", credentials.ssid);
        self.link_client.start_join(credentials)?;

        let mut attempts: u32 = 0;
        while self.status() != LinkState::Connected {
            attempts += 1;
            if self.join_policy.exhausted(attempts) {
                log::warn!(
                    "Network join failed after {attempts:} attempts, check credentials"
                );
                return Err(LinkError::JoinFailed(attempts));
            }
            std::thread::sleep(self.join_policy.delay);
        }

        match self.link_client.local_addr() {
            Ok(addr) => log::info!("Network link up, assigned address {addr:}"),
            Err(e) => log::warn!("Network link up, unable to read assigned address {e:}"),
        }

        Ok(())
    }

    /// Current link state, side-effect free. Client errors are reported
    /// as Disconnected so callers see a single degraded state.
    pub fn status(&self) -> LinkState {
        self.link_client.link_state().unwrap_or_else(|e| {
            log::error!("Link client unable to report state {e:}");
            LinkState::Disconnected
        })
    }

    pub fn hardware_addr(&self) -> Result<String, LinkClientError> {
        self.link_client.hardware_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SimLinkClient;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::bounded(attempts, Duration::from_millis(1))
    }

    #[test]
    fn join_completes_within_attempt_cap() {
        let link_client = SimLinkClient::join_after("AA:BB:CC:DD:EE:FF", 3);
        let mut link = LinkManager::with_policy(Box::new(link_client), policy(10));

        let creds = LinkCredentials {
            ssid: "motorlab".to_string(),
            psk: "hunter2".to_string(),
        };
        assert!(link.connect(&creds).is_ok());
        assert_eq!(link.status(), LinkState::Connected);
    }

    #[test]
    fn join_exhaustion_leaves_link_disconnected() {
        let link_client = SimLinkClient::unjoinable("AA:BB:CC:DD:EE:FF");
        let mut link = LinkManager::with_policy(Box::new(link_client), policy(5));

        let creds = LinkCredentials {
            ssid: "motorlab".to_string(),
            psk: "hunter2".to_string(),
        };
        assert!(matches!(link.connect(&creds), Err(LinkError::JoinFailed(5))));
        assert_ne!(link.status(), LinkState::Connected);
    }
}
