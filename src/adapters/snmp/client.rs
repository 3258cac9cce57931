use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_snmp::{Auth, Client, Retry, RetryConfigError, Target};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::REDACTED;
use crate::domain::{AgentHost, MonitorError, MonitorResult, Oid, SnmpValue, VarBind};
use crate::ports::SnmpTransport;

use super::wire::{from_wire_value, from_wire_varbind, map_error, to_wire_oid, to_wire_value};

/// Settings for the UDP SNMP client
#[derive(Clone)]
pub struct SnmpClientConfig {
    pub port: u16,
    pub read_community: String,
    pub write_community: String,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    pub max_repetitions: u32,
}

impl Default for SnmpClientConfig {
    fn default() -> Self {
        Self {
            port: 161,
            read_community: "public".to_string(),
            write_community: "private".to_string(),
            timeout: Duration::from_secs(2),
            retries: 2,
            backoff: Duration::from_millis(200),
            max_repetitions: 25,
        }
    }
}

impl fmt::Debug for SnmpClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnmpClientConfig")
            .field("port", &self.port)
            .field("read_community", &REDACTED)
            .field("write_community", &REDACTED)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("backoff", &self.backoff)
            .field("max_repetitions", &self.max_repetitions)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Access {
    Read,
    Write,
}

/// SNMPv2c transport backed by one `async_snmp` client per (agent, community)
pub struct UdpSnmpTransport {
    config: SnmpClientConfig,
    retry: Retry,
    clients: Mutex<HashMap<(String, Access), Client>>,
}

impl UdpSnmpTransport {
    pub fn new(config: SnmpClientConfig) -> Result<Self, RetryConfigError> {
        let retry = backoff_policy(&config)?;
        Ok(Self {
            config,
            retry,
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn target(&self, host: &AgentHost) -> Target {
        match host.as_str().parse::<SocketAddr>() {
            Ok(addr) => Target::from(addr),
            Err(_) => Target::from((host.as_str().to_string(), self.config.port)),
        }
    }

    async fn client(&self, host: &AgentHost, access: Access) -> MonitorResult<Client> {
        let key = (host.as_str().to_string(), access);
        let cached = self.clients.lock().get(&key).cloned();
        if let Some(client) = cached {
            return Ok(client);
        }

        let community = match access {
            Access::Read => self.config.read_community.as_str(),
            Access::Write => self.config.write_community.as_str(),
        };
        let client = Client::builder(self.target(host), Auth::v2c(community))
            .request_timeout(self.config.timeout)
            .retry(self.retry.clone())
            .connect()
            .await
            .map_err(|e| map_error(host, &e))?;

        debug!(host = %host, access = ?access, "Opened SNMP client");
        Ok(self.clients.lock().entry(key).or_insert(client).clone())
    }
}

/// Exponential backoff without jitter: backoff, 2*backoff, 4*backoff, ...
fn backoff_policy(config: &SnmpClientConfig) -> Result<Retry, RetryConfigError> {
    let max_delay = config
        .backoff
        .saturating_mul(2u32.saturating_pow(config.retries));
    Retry::exponential(config.retries)
        .initial_delay(config.backoff)
        .max_delay(max_delay)
        .jitter(0.0)
        .build()
}

#[async_trait]
impl SnmpTransport for UdpSnmpTransport {
    async fn get(&self, host: &AgentHost, oid: &Oid) -> MonitorResult<SnmpValue> {
        let client = self.client(host, Access::Read).await?;
        let wire_oid = to_wire_oid(oid);
        let response = client
            .get(&wire_oid)
            .await
            .map_err(|e| map_error(host, &e))?;

        response
            .varbinds
            .into_iter()
            .find(|vb| vb.oid == wire_oid)
            .map(|vb| from_wire_value(vb.value))
            .ok_or_else(|| MonitorError::protocol(host, format!("response is missing {}", oid)))
    }

    async fn get_bulk(&self, host: &AgentHost, prefix: &Oid) -> MonitorResult<Vec<VarBind>> {
        let client = self.client(host, Access::Read).await?;
        let rows = client
            .bulk_walk(to_wire_oid(prefix), self.config.max_repetitions)
            .map_err(|e| map_error(host, &e))?
            .collect()
            .await
            .map_err(|e| map_error(host, &e))?;

        Ok(rows.into_iter().map(from_wire_varbind).collect())
    }

    async fn set(&self, host: &AgentHost, oid: &Oid, value: SnmpValue) -> MonitorResult<()> {
        let value = to_wire_value(value)?;
        let client = self.client(host, Access::Write).await?;
        let wire_oid = to_wire_oid(oid);
        let response = client
            .set(&wire_oid, value)
            .await
            .map_err(|e| map_error(host, &e))?;

        match response.varbinds.first() {
            Some(vb) if vb.oid == wire_oid && !vb.value.is_exception() => Ok(()),
            _ => Err(MonitorError::protocol(host, format!("SET of {} was not acknowledged", oid))),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_snmp::message::CommunityMessage;
    use async_snmp::{DecodeConfig, Pdu, ResponsePdu, Value, Version};
    use tokio::net::UdpSocket;

    use super::*;
    use crate::domain::oids;

    /// Fake agent answering every request with `answer(request)`
    async fn spawn_agent<F>(answer: F) -> SocketAddr
    where
        F: Fn(&Pdu) -> Vec<async_snmp::VarBind> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let (len, from) = socket.recv_from(&mut buf).await.unwrap();
                let request = CommunityMessage::decode(buf[..len].to_vec().into(), DecodeConfig::default())
                    .unwrap()
                    .value;
                let community = request.community().clone();
                let pdu = request.into_pdu().unwrap();
                let response = ResponsePdu::success(Version::V2c, pdu.request_id(), answer(&pdu)).unwrap();
                let bytes = CommunityMessage::v2c(community, response).unwrap().encode().unwrap();
                socket.send_to(&bytes, from).await.unwrap();
            }
        });
        addr
    }

    fn fast_config() -> SnmpClientConfig {
        SnmpClientConfig {
            timeout: Duration::from_millis(100),
            retries: 1,
            backoff: Duration::from_millis(10),
            ..SnmpClientConfig::default()
        }
    }

    fn wire(oid: Oid, value: Value) -> async_snmp::VarBind {
        async_snmp::VarBind::new(to_wire_oid(&oid), value)
    }

    #[tokio::test]
    async fn test_get_returns_value() {
        let addr = spawn_agent(|_| vec![wire(oids::sys_uptime(), Value::TimeTicks(4200))]).await;

        let transport = UdpSnmpTransport::new(fast_config()).unwrap();
        let value = transport
            .get(&AgentHost::new(addr.to_string()), &oids::sys_uptime())
            .await
            .unwrap();
        assert_eq!(value, SnmpValue::TimeTicks(4200));
    }

    #[tokio::test]
    async fn test_bulk_walk_stops_at_subtree_end() {
        let descr = oids::if_entry_column(oids::IF_DESCR);
        let column = descr.clone();
        let addr = spawn_agent(move |_| {
            vec![
                wire(column.child(1), Value::from("eth0")),
                wire(column.child(2), Value::from("eth1")),
                wire(oids::if_entry_column(oids::IF_MTU).child(1), Value::Integer(1500)),
            ]
        })
        .await;

        let transport = UdpSnmpTransport::new(fast_config()).unwrap();
        let rows = transport
            .get_bulk(&AgentHost::new(addr.to_string()), &descr)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].oid, descr.child(1));
        assert_eq!(rows[1].value.as_text().as_deref(), Some("eth1"));
    }

    #[tokio::test]
    async fn test_set_uses_write_community() {
        let addr = spawn_agent(|pdu| pdu.varbinds().to_vec()).await;

        let transport = UdpSnmpTransport::new(fast_config()).unwrap();
        let host = AgentHost::new(addr.to_string());
        transport
            .set(&host, &oids::if_admin_status(3), SnmpValue::Integer(2))
            .await
            .unwrap();

        let clients = transport.clients.lock();
        assert!(clients.contains_key(&(host.as_str().to_string(), Access::Write)));
        assert!(!clients.contains_key(&(host.as_str().to_string(), Access::Read)));
    }

    #[tokio::test]
    async fn test_silent_agent_is_unreachable() {
        // bound but never answers
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let transport = UdpSnmpTransport::new(fast_config()).unwrap();
        let err = transport
            .get(&AgentHost::new(addr.to_string()), &oids::sys_uptime())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::DeviceUnreachable { .. }));
        drop(socket);
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let config = SnmpClientConfig {
            retries: async_snmp::MAX_RETRIES + 1,
            ..SnmpClientConfig::default()
        };
        assert!(UdpSnmpTransport::new(config).is_err());
        assert_eq!(backoff_policy(&SnmpClientConfig::default()).unwrap().retries(), 2);
    }
}
