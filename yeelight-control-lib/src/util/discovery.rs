use std::cmp::max;
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use log::{debug, error, info};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use crate::util::advertisement::{AdvertisementHeaders, DeviceDescriptor};

const EVENT_CAPACITY: usize = 64;
const MAX_DATAGRAM: usize = 2048;

/// Where and how to search. Every field can be overridden; the rest keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Multicast group devices listen on.
    pub group: Ipv4Addr,
    pub port: u16,
    /// Search target (`ST` header).
    pub service: String,
    /// Discovery verb (`MAN` header), quotes included.
    pub man: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            group: Ipv4Addr::new(239, 255, 255, 250),
            port: 1982,
            service: "wifi_bulb".to_string(),
            man: "\"ssdp:discover\"".to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// The `M-SEARCH` request sent to the group.
    pub fn search_request(&self) -> String {
        [
            "M-SEARCH * HTTP/1.1".to_string(),
            format!("HOST: {}:{}", self.group, self.port),
            format!("MAN: {}", self.man),
            format!("ST: {}", self.service),
        ]
        .join("\r\n")
    }

    fn group_address(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.group, self.port))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    /// Every datagram, whatever it contains.
    Message {
        from: SocketAddr,
        headers: AdvertisementHeaders,
    },
    /// A device id seen for the first time.
    DeviceDiscovered(DeviceDescriptor),
    /// The socket failed and was dropped. Searching again requires a new `start`.
    Closed { reason: String },
}

struct Registry {
    known: Mutex<HashSet<u64>>,
    /// Shared with the listener task, which empties it when receiving fails.
    socket: Mutex<Option<Arc<UdpSocket>>>,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl Registry {
    fn emit(&self, event: DiscoveryEvent) {
        let _ = self.events.send(event);
    }

    fn socket(&self) -> MutexGuard<'_, Option<Arc<UdpSocket>>> {
        self.socket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops `failed` unless a newer socket already replaced it, then reports the close.
    fn release(&self, failed: &Arc<UdpSocket>, reason: String) {
        {
            let mut socket = self.socket();
            if socket
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, failed))
            {
                *socket = None;
            }
        }
        self.emit(DiscoveryEvent::Closed { reason });
    }

    fn handle_datagram(&self, from: SocketAddr, data: &[u8]) -> Option<DeviceDescriptor> {
        let headers = AdvertisementHeaders::parse(&String::from_utf8_lossy(data));
        let device = DeviceDescriptor::from_headers(&headers);
        self.emit(DiscoveryEvent::Message { from, headers });

        let device = device?;
        let newly_seen = self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device.id);
        if !newly_seen {
            debug!("Found device {:#x} again, skipping", device.id);
            return None;
        }

        info!("Found device: {}", device);
        self.emit(DiscoveryEvent::DeviceDiscovered(device.clone()));
        Some(device)
    }
}

/// Listens for device advertisements on the multicast group and sends searches.
pub struct DiscoveryClient {
    config: DiscoveryConfig,
    registry: Arc<Registry>,
    listener: Option<JoinHandle<()>>,
}

impl DiscoveryClient {
    pub fn new(config: DiscoveryConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        DiscoveryClient {
            config,
            registry: Arc::new(Registry {
                known: Mutex::new(HashSet::new()),
                socket: Mutex::new(None),
                events,
            }),
            listener: None,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Registers a listener. Subscribe before [`Self::start`] to see every advertisement.
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.registry.events.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.registry.socket().is_some()
            && self
                .listener
                .as_ref()
                .map(|listener| !listener.is_finished())
                .unwrap_or(false)
    }

    /// Ids of every device reported so far.
    pub fn known_devices(&self) -> HashSet<u64> {
        self.registry
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Binds the control port, joins the group and starts listening.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.is_listening() {
            return Ok(());
        }
        let socket = Arc::new(Self::bind(&self.config)?);
        info!(
            "Listening for devices on {}:{}",
            self.config.group, self.config.port
        );

        *self.registry.socket() = Some(Arc::clone(&socket));
        let registry = Arc::clone(&self.registry);
        self.listener = Some(tokio::spawn(async move {
            listen(socket, registry).await;
        }));
        Ok(())
    }

    fn bind(config: &DiscoveryConfig) -> anyhow::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .context("Failed to create discovery socket")?;
        // Other listeners may already hold the control port.
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;
        socket
            .bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port)).into())
            .with_context(|| format!("Failed to bind discovery port {}", config.port))?;

        let socket = UdpSocket::from_std(socket.into())?;
        socket
            .join_multicast_v4(config.group, Ipv4Addr::UNSPECIFIED)
            .with_context(|| format!("Failed to join multicast group {}", config.group))?;
        Ok(socket)
    }

    /// Sends one search request. Retrying is up to the caller.
    pub async fn search(&self) -> anyhow::Result<()> {
        if !self.is_listening() {
            anyhow::bail!("Discovery client is not started");
        }
        let socket = self
            .registry
            .socket()
            .clone()
            .context("Discovery client is not started")?;
        let request = self.config.search_request();
        socket
            .send_to(request.as_bytes(), self.config.group_address())
            .await
            .context("Failed to send search request")?;
        debug!("Sent search to {}", self.config.group_address());
        Ok(())
    }

    /// Stops listening and drops the socket. Known devices are kept.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.registry.socket().take();
    }

    /**
    Searches once and collects every device that answers before `given_timeout`.

    Some devices answer a single search several times; each id is returned once.
    */
    pub async fn find_devices(
        config: DiscoveryConfig,
        given_timeout: Duration,
    ) -> anyhow::Result<Vec<DeviceDescriptor>> {
        let mut client = DiscoveryClient::new(config);
        let mut events = client.subscribe();
        client.start().await?;
        client.search().await?;

        let mut devices = Vec::new();
        let timeout_end = Instant::now() + given_timeout;
        loop {
            let remaining_time = timeout_end.saturating_duration_since(Instant::now());
            match timeout(remaining_time, events.recv()).await {
                Ok(Ok(DiscoveryEvent::DeviceDiscovered(device))) => devices.push(device),
                Ok(Ok(DiscoveryEvent::Closed { reason })) => {
                    error!("Discovery socket closed: {}", reason);
                    break;
                }
                Ok(Ok(DiscoveryEvent::Message { .. })) => {}
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!("Discovery listener lagged, {} events skipped", skipped);
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Err(_) => {
                    info!("Discovery time complete. If devices are missing, try increasing the search timeout.");
                    break;
                }
            }
        }
        client.stop();
        Ok(devices)
    }

    pub fn pretty_print_devices(devices: &[DeviceDescriptor]) {
        let id_width = devices
            .iter()
            .map(|d| format!("{:#x}", d.id).len())
            .max()
            .unwrap_or(0);
        let address_width = devices
            .iter()
            .map(|d| format!("{}:{}", d.address, d.port).len())
            .max()
            .unwrap_or(0);
        let model_width = devices.iter().map(|d| d.model.len()).max().unwrap_or(0);
        let name_width = devices
            .iter()
            .map(|d| max(d.display_name.len(), 20))
            .max()
            .unwrap_or(0);

        println!(
            "{:<id_width$} {:<address_width$} {:<model_width$} {:<name_width$} {}",
            "Device ID",
            "Address",
            "Model",
            "Name",
            "Power",
            id_width = max(id_width, 9) + 2,
            address_width = max(address_width, 7) + 2,
            model_width = max(model_width, 5) + 2,
            name_width = name_width + 2,
        );
        for device in devices {
            println!(
                "{:<id_width$} {:<address_width$} {:<model_width$} {:<name_width$} {}",
                format!("{:#x}", device.id),
                format!("{}:{}", device.address, device.port),
                device.model,
                device.display_name,
                if device.state.power { "on" } else { "off" },
                id_width = max(id_width, 9) + 2,
                address_width = max(address_width, 7) + 2,
                model_width = max(model_width, 5) + 2,
                name_width = name_width + 2,
            );
        }
    }

    #[cfg(test)]
    fn handle_datagram(&self, from: SocketAddr, data: &[u8]) -> Option<DeviceDescriptor> {
        self.registry.handle_datagram(from, data)
    }
}

impl Drop for DiscoveryClient {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn listen(socket: Arc<UdpSocket>, registry: Arc<Registry>) {
    let mut buffer = [0u8; MAX_DATAGRAM];
    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((number_of_bytes, from)) => {
                registry.handle_datagram(from, &buffer[..number_of_bytes]);
            }
            Err(e) => {
                error!("Failed to receive advertisement: {}", e);
                registry.release(&socket, e.to_string());
                break;
            }
        }
    }
}
