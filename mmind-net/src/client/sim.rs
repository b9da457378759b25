/// In-memory [`LinkClient`] / [`BrokerClient`] impls with scriptable
/// failure behavior, for driving the session and publisher layers with
/// no radio or broker present. Both hand out cloneable handles over
/// shared state so a driver can inject inbound alerts and inspect
/// outbound traffic while the session owns the boxed client.
use std::{
    collections::VecDeque,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex},
};

use crate::{
    client::{BrokerClient, BrokerClientError, InboundMessage, LinkClient, LinkClientError},
    link::{LinkCredentials, LinkState},
};

#[derive(Debug)]
struct SimLink {
    join_started: bool,
    joined: bool,
    /// Number of state polls after a join starts before the link
    /// reports Connected; `u32::MAX` means the join never completes
    polls_until_joined: u32,
    hardware_addr: String,
}

#[derive(Debug, Clone)]
pub struct SimLinkClient {
    state: Arc<Mutex<SimLink>>,
}

impl SimLinkClient {
    /// A link that reaches Connected on the first poll after a join
    pub fn new(hardware_addr: impl Into<String>) -> Self {
        Self::join_after(hardware_addr, 0)
    }

    pub fn join_after(hardware_addr: impl Into<String>, polls: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimLink {
                join_started: false,
                joined: false,
                polls_until_joined: polls,
                hardware_addr: hardware_addr.into(),
            })),
        }
    }

    /// A link whose join never completes, for exercising the bounded
    /// join retry policy
    pub fn unjoinable(hardware_addr: impl Into<String>) -> Self {
        Self::join_after(hardware_addr, u32::MAX)
    }

    /// A link that is already up before any join is requested
    pub fn already_joined(hardware_addr: impl Into<String>) -> Self {
        let client = Self::join_after(hardware_addr, 0);
        {
            let mut link = client.state.lock().expect("sim link lock");
            link.join_started = true;
            link.joined = true;
        }
        client
    }

    pub fn drop_link(&self) {
        let mut link = self.state.lock().expect("sim link lock");
        link.joined = false;
        link.join_started = false;
    }
}

impl LinkClient for SimLinkClient {
    fn start_join(&self, _credentials: &LinkCredentials) -> Result<(), LinkClientError> {
        let mut link = self.state.lock().expect("sim link lock");
        link.join_started = true;
        if link.polls_until_joined == 0 {
            link.joined = true;
        }
        Ok(())
    }

    fn link_state(&self) -> Result<LinkState, LinkClientError> {
        let mut link = self.state.lock().expect("sim link lock");
        if link.joined {
            return Ok(LinkState::Connected);
        }
        if !link.join_started {
            return Ok(LinkState::Disconnected);
        }
        if link.polls_until_joined == u32::MAX {
            return Ok(LinkState::Connecting);
        }
        if link.polls_until_joined <= 1 {
            link.joined = true;
            Ok(LinkState::Connected)
        } else {
            link.polls_until_joined -= 1;
            Ok(LinkState::Connecting)
        }
    }

    fn local_addr(&self) -> Result<IpAddr, LinkClientError> {
        Ok(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 77)))
    }

    fn hardware_addr(&self) -> Result<String, LinkClientError> {
        Ok(self.state.lock().expect("sim link lock").hardware_addr.clone())
    }
}

#[derive(Debug, Default)]
struct SimBroker {
    /// Fail this many handshakes before one succeeds
    connect_failures: u32,
    connect_attempts: u32,
    connected: bool,
    session_id: Option<String>,
    subscriptions: Vec<String>,
    inbound: VecDeque<InboundMessage>,
    published: Vec<(String, Vec<u8>)>,
    fail_next_publish: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimBrokerClient {
    state: Arc<Mutex<SimBroker>>,
}

impl SimBrokerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connects(failures: u32) -> Self {
        let client = Self::default();
        client.state.lock().expect("sim broker lock").connect_failures = failures;
        client
    }

    /// Queue one inbound message for the next poll, as if it had
    /// arrived from the broker on a subscribed topic
    pub fn push_inbound(&self, topic: &str, payload: &[u8]) {
        self.state
            .lock()
            .expect("sim broker lock")
            .inbound
            .push_back(InboundMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
    }

    pub fn set_fail_next_publish(&self) {
        self.state.lock().expect("sim broker lock").fail_next_publish = true;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().expect("sim broker lock").connect_attempts
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().expect("sim broker lock").session_id.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().expect("sim broker lock").subscriptions.clone()
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().expect("sim broker lock").published.clone()
    }
}

impl BrokerClient for SimBrokerClient {
    fn connect(&mut self, session_id: &str) -> Result<(), BrokerClientError> {
        let mut broker = self.state.lock().expect("sim broker lock");
        broker.connect_attempts += 1;
        if broker.connect_failures > 0 {
            broker.connect_failures -= 1;
            return Err(BrokerClientError::Connection(
                "Simulated handshake failure".to_string(),
            ));
        }
        broker.connected = true;
        broker.session_id = Some(session_id.to_string());
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerClientError> {
        let mut broker = self.state.lock().expect("sim broker lock");
        if !broker.connected {
            return Err(BrokerClientError::NotConnected);
        }
        broker.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerClientError> {
        let mut broker = self.state.lock().expect("sim broker lock");
        if !broker.connected {
            return Err(BrokerClientError::NotConnected);
        }
        if broker.fail_next_publish {
            broker.fail_next_publish = false;
            broker.connected = false;
            return Err(BrokerClientError::Connection(
                "Simulated send failure".to_string(),
            ));
        }
        broker.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn poll_inbound(&mut self) -> Result<Vec<InboundMessage>, BrokerClientError> {
        let mut broker = self.state.lock().expect("sim broker lock");
        if !broker.connected {
            return Err(BrokerClientError::NotConnected);
        }
        Ok(broker.inbound.drain(..).collect())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().expect("sim broker lock").connected
    }
}
