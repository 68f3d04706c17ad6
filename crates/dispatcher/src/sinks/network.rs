//! NetworkSink - UDP fire-and-forget publisher and alert transport

use contracts::{Alert, AlertTransport, ContractError, Publication, Publisher};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max datagram size (UDP payload limit is 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Output that sends each publication or alert as one UDP datagram
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv6() {
            "[::]:0"
        } else {
            "0.0.0.0:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for the dispatcher factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config =
            NetworkSinkConfig::from_params(params).map_err(|e| ContractError::sink_write(&name, e))?;

        Self::new(&name, config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name.clone(),
                message: e.to_string(),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, String> {
        let data = match self.config.format {
            NetworkFormat::Json => {
                serde_json::to_vec(value).map_err(|e| format!("json error: {}", e))?
            }
            NetworkFormat::Bincode => {
                bincode::serialize(value).map_err(|e| format!("bincode error: {}", e))?
            }
        };

        if data.len() > self.config.max_packet_size {
            return Err(format!(
                "datagram of {} bytes exceeds max_packet_size {}",
                data.len(),
                self.config.max_packet_size
            ));
        }
        Ok(data)
    }

    async fn transmit(&self, data: &[u8]) -> std::io::Result<usize> {
        match &self.socket {
            Some(socket) => socket.send(data).await,
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "socket closed",
            )),
        }
    }

    fn close_socket(&mut self) {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
    }
}

impl Publisher for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_emit",
        skip(self, publication),
        fields(sink = %self.name, topic = %publication.topic)
    )]
    async fn emit(&mut self, publication: &Publication) -> Result<(), ContractError> {
        let data = self
            .encode(publication)
            .map_err(|e| ContractError::publish(&self.name, &publication.topic, e))?;
        match self.transmit(&data).await {
            Ok(sent) => {
                debug!(sink = %self.name, bytes = sent, "Sent");
                Ok(())
            }
            Err(e) => {
                error!(sink = %self.name, error = %e, "UDP send failed");
                Err(ContractError::publish(
                    &self.name,
                    &publication.topic,
                    e.to_string(),
                ))
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // UDP doesn't buffer
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.close_socket();
        Ok(())
    }
}

impl AlertTransport for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_post",
        skip(self, alert),
        fields(sink = %self.name, sensor = %alert.sensor)
    )]
    async fn post(&mut self, alert: &Alert) -> Result<(), ContractError> {
        let data = self
            .encode(alert)
            .map_err(|e| ContractError::alert_transport(&self.name, alert.sensor.as_str(), e))?;
        self.transmit(&data).await.map(|_| ()).map_err(|e| {
            ContractError::alert_transport(&self.name, alert.sensor.as_str(), e.to_string())
        })
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.close_socket();
        Ok(())
    }
}
