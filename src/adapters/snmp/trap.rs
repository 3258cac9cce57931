use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_snmp::{GenericTrap, InformAckOutcome, Notification, NotificationReceiver};
use async_trait::async_trait;
use tracing::warn;

use crate::domain::{oids, InterfaceStatus, Oid, VarBind};
use crate::ports::{LinkEvent, ReceivedTrap, TrapError, TrapReceiver};

use super::wire::{from_wire_oid, from_wire_varbind};

/// Trap listener bound to a local UDP address.
///
/// Only v1/v2c notifications carrying `community` are delivered. Accepted
/// informs are acknowledged before `recv` returns.
pub struct UdpTrapReceiver {
    receiver: NotificationReceiver,
}

impl UdpTrapReceiver {
    pub async fn bind(addr: &str, community: &str) -> Result<Self, TrapError> {
        let receiver = NotificationReceiver::builder()
            .bind(addr)
            .community(community)
            .build()
            .await
            .map_err(|e| TrapError::Receive(e.to_string()))?;
        Ok(Self { receiver })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.receiver.local_addr()
    }
}

#[async_trait]
impl TrapReceiver for UdpTrapReceiver {
    async fn recv(&self) -> Result<ReceivedTrap, TrapError> {
        let received = self
            .receiver
            .recv()
            .await
            .map_err(|e| TrapError::Receive(e.to_string()))?;

        match &received.inform_ack {
            Some(InformAckOutcome::Failed(e)) => {
                warn!(source = %received.source, error = %e, "Failed to acknowledge inform");
            }
            Some(InformAckOutcome::SuppressedBySize) => {
                warn!(source = %received.source, "Inform acknowledgement too large to send");
            }
            Some(InformAckOutcome::Sent) | None => {}
        }

        decode_notification(received.notification, received.source)
    }
}

/// Map an SNMPv1 Trap or SNMPv2c Trap/Inform onto the link event it reports
fn decode_notification(
    notification: Notification,
    source: SocketAddr,
) -> Result<ReceivedTrap, TrapError> {
    let (community, agent_addr, link, varbinds) = match notification {
        Notification::TrapV1 {
            community, trap, ..
        } => {
            let addr = Ipv4Addr::from(trap.agent_addr());
            let link = match trap.generic_trap() {
                GenericTrap::LinkDown => Some(LinkEvent::Down),
                GenericTrap::LinkUp => Some(LinkEvent::Up),
                _ => None,
            };
            let agent_addr = (!addr.is_unspecified()).then_some(IpAddr::V4(addr));
            (community, agent_addr, link, trap.varbinds().to_vec())
        }
        Notification::TrapV2c {
            community,
            trap_oid,
            varbinds,
            ..
        }
        | Notification::InformV2c {
            community,
            trap_oid,
            varbinds,
            ..
        } => (community, None, link_event(&from_wire_oid(&trap_oid)), varbinds),
        _ => {
            return Err(TrapError::Malformed {
                source_addr: source,
                reason: "SNMPv3 notifications are not accepted".to_string(),
            });
        }
    };

    let mut trap = ReceivedTrap {
        source,
        community: String::from_utf8_lossy(community.as_bytes()).into_owned(),
        agent_addr,
        link,
        if_index: None,
        if_descr: None,
        oper_status: None,
    };
    for varbind in varbinds.into_iter().map(from_wire_varbind) {
        read_interface_varbind(&mut trap, &varbind);
    }

    Ok(trap)
}

fn link_event(trap_oid: &Oid) -> Option<LinkEvent> {
    if *trap_oid == oids::link_down_trap() {
        Some(LinkEvent::Down)
    } else if *trap_oid == oids::link_up_trap() {
        Some(LinkEvent::Up)
    } else {
        None
    }
}

/// Pick up ifIndex / ifDescr / ifOperStatus from a notification varbind
fn read_interface_varbind(trap: &mut ReceivedTrap, varbind: &VarBind) {
    let Some(suffix) = varbind.oid.suffix(&oids::if_entry()) else {
        return;
    };
    let [column, index] = suffix else {
        return;
    };

    match *column {
        oids::IF_INDEX => {
            trap.if_index = varbind
                .value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .or(Some(*index));
        }
        oids::IF_DESCR => {
            trap.if_index.get_or_insert(*index);
            trap.if_descr = varbind.value.as_text().filter(|name| !name.is_empty());
        }
        oids::IF_ADMIN_STATUS => {
            trap.if_index.get_or_insert(*index);
        }
        oids::IF_OPER_STATUS => {
            trap.if_index.get_or_insert(*index);
            trap.oper_status = varbind.value.as_i64().map(InterfaceStatus::from_code);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_snmp::{Auth, Client, Retry, TrapV1Pdu, Value};

    use super::*;
    use crate::adapters::snmp::wire::to_wire_oid;

    fn source() -> SocketAddr {
        "10.0.0.1:50000".parse().unwrap()
    }

    fn interface_varbinds(index: u32, descr: Option<&str>) -> Vec<async_snmp::VarBind> {
        let mut varbinds = vec![async_snmp::VarBind::new(
            to_wire_oid(&oids::if_entry_column(oids::IF_INDEX).child(index)),
            Value::Integer(index as i32),
        )];
        if let Some(descr) = descr {
            varbinds.push(async_snmp::VarBind::new(
                to_wire_oid(&oids::if_entry_column(oids::IF_DESCR).child(index)),
                Value::from(descr),
            ));
        }
        varbinds
    }

    fn v2c_trap(trap_oid: Oid, index: u32, descr: Option<&str>) -> Notification {
        Notification::TrapV2c {
            community: "public".into(),
            uptime: 100,
            trap_oid: to_wire_oid(&trap_oid),
            varbinds: interface_varbinds(index, descr),
            request_id: 9,
            decode_anomalies: Vec::new(),
        }
    }

    async fn bind_receiver() -> UdpTrapReceiver {
        UdpTrapReceiver::bind("127.0.0.1:0", "public").await.unwrap()
    }

    async fn sender(addr: SocketAddr, community: &str) -> Client {
        Client::builder(addr.to_string(), Auth::v2c(community))
            .request_timeout(Duration::from_millis(500))
            .retry(Retry::none())
            .connect()
            .await
            .unwrap()
    }

    #[test]
    fn test_decode_v2c_link_up() {
        let trap = decode_notification(v2c_trap(oids::link_up_trap(), 2, Some("eth1")), source()).unwrap();

        assert_eq!(trap.community, "public");
        assert_eq!(trap.link, Some(LinkEvent::Up));
        assert_eq!(trap.if_index, Some(2));
        assert_eq!(trap.if_descr.as_deref(), Some("eth1"));
        assert_eq!(trap.status(), Some(InterfaceStatus::Up));
        assert_eq!(trap.agent_ip(), source().ip());
    }

    #[test]
    fn test_decode_v1_link_down_uses_agent_addr() {
        let pdu = TrapV1Pdu::from_raw_parts(
            async_snmp::Oid::from_slice(&[1, 3, 6, 1, 4, 1, 9]),
            [192, 168, 1, 184],
            GenericTrap::LinkDown,
            0,
            10,
            vec![async_snmp::VarBind::new(
                to_wire_oid(&oids::if_entry_column(oids::IF_OPER_STATUS).child(4)),
                Value::Integer(2),
            )],
        );
        let notification = Notification::TrapV1 {
            community: "public".into(),
            trap: pdu,
            decode_anomalies: Vec::new(),
        };

        let trap = decode_notification(notification, source()).unwrap();
        assert_eq!(trap.agent_ip(), "192.168.1.184".parse::<IpAddr>().unwrap());
        assert_eq!(trap.if_index, Some(4));
        assert_eq!(trap.oper_status, Some(InterfaceStatus::Down));
        assert_eq!(trap.status(), Some(InterfaceStatus::Down));
    }

    #[test]
    fn test_oper_status_varbind_overrides_trap_type() {
        let mut trap = decode_notification(v2c_trap(oids::link_down_trap(), 1, None), source()).unwrap();
        assert_eq!(trap.status(), Some(InterfaceStatus::Down));

        trap.oper_status = Some(InterfaceStatus::Testing);
        assert_eq!(trap.status(), Some(InterfaceStatus::Testing));
    }

    #[test]
    fn test_other_notifications_carry_no_link_event() {
        let cold_start = Oid::from_slice(&[1, 3, 6, 1, 6, 3, 1, 1, 5, 1]);
        let trap = decode_notification(v2c_trap(cold_start, 1, None), source()).unwrap();
        assert_eq!(trap.link, None);
        assert_eq!(trap.status(), None);
    }

    #[tokio::test]
    async fn test_udp_receiver_decodes_traps() {
        let receiver = bind_receiver().await;
        let client = sender(receiver.local_addr(), "public").await;

        client
            .send_trap(
                &to_wire_oid(&oids::link_down_trap()),
                500,
                interface_varbinds(5, Some("ge-0/0/5")),
            )
            .await
            .unwrap();

        let trap = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trap.if_index, Some(5));
        assert_eq!(trap.if_descr.as_deref(), Some("ge-0/0/5"));
        assert_eq!(trap.link, Some(LinkEvent::Down));
    }

    #[tokio::test]
    async fn test_inform_is_acknowledged() {
        let receiver = bind_receiver().await;
        let client = sender(receiver.local_addr(), "public").await;

        let pending = tokio::spawn(async move { receiver.recv().await });

        // send_inform only returns once the Response PDU came back
        client
            .send_inform(
                &to_wire_oid(&oids::link_up_trap()),
                700,
                interface_varbinds(3, None),
            )
            .await
            .unwrap();

        let trap = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(trap.link, Some(LinkEvent::Up));
        assert_eq!(trap.if_index, Some(3));
    }

    #[tokio::test]
    async fn test_wrong_community_is_neither_delivered_nor_acknowledged() {
        let receiver = bind_receiver().await;
        let client = sender(receiver.local_addr(), "guess").await;

        let pending = tokio::spawn(async move { receiver.recv().await });

        let result = client
            .send_inform(&to_wire_oid(&oids::link_down_trap()), 1, Vec::new())
            .await;
        assert!(result.is_err());
        assert!(!pending.is_finished());
        pending.abort();
    }
}
