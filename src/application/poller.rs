use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{
    oids, AgentHost, CounterWidth, InterfaceReading, InterfaceStatus, MonitorError, MonitorResult,
    Oid, SnmpValue, VarBind,
};
use crate::ports::SnmpTransport;

use super::state_cache::{PollUpdate, StateCache};
use super::streamer::{MetricStreamer, StreamEvent};

/// Interface names containing this marker are discard devices (e.g. `Null0`)
const NULL_INTERFACE_MARKER: &str = "Null";

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Consecutive failed cycles before a host is flagged stale
    pub stale_after: u32,
    pub counter_width: CounterWidth,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            stale_after: 3,
            counter_width: CounterWidth::Bits32,
        }
    }
}

/// Periodic per-agent poll of the interface table, uptime and octet counters
pub struct InterfacePoller {
    transport: Arc<dyn SnmpTransport>,
    cache: Arc<StateCache>,
    streamer: Arc<MetricStreamer>,
    settings: PollerSettings,
    /// One cycle per host at a time, so samples reach subscribers in poll order
    cycles: Mutex<HashMap<AgentHost, Arc<tokio::sync::Mutex<()>>>>,
}

impl InterfacePoller {
    pub fn new(
        transport: Arc<dyn SnmpTransport>,
        cache: Arc<StateCache>,
        streamer: Arc<MetricStreamer>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            transport,
            cache,
            streamer,
            settings,
            cycles: Mutex::new(HashMap::new()),
        }
    }

    /// Start one independent polling loop per host
    pub fn spawn_all(self: &Arc<Self>, hosts: &[AgentHost], shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        hosts
            .iter()
            .cloned()
            .map(|host| {
                let poller = Arc::clone(self);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { poller.run(host, shutdown).await })
            })
            .collect()
    }

    async fn run(self: Arc<Self>, host: AgentHost, shutdown: CancellationToken) {
        info!(host = %host, interval_secs = self.settings.interval.as_secs(), "Starting interface poller");

        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(host = %host, "Interface poller: shutting down");
                    break;
                }
                _ = interval.tick() => {
                    // failures are logged and counted inside poll_once
                    let _ = self.poll_once(&host).await;
                }
            }
        }
    }

    /// Run one poll cycle now and publish its results.
    ///
    /// A failed cycle leaves the cached state untouched apart from the
    /// failure count that drives the stale flag. Calls for the same host
    /// wait for each other.
    pub async fn poll_once(&self, host: &AgentHost) -> MonitorResult<()> {
        let cycle = self.cycle_lock(host);
        let _guard = cycle.lock().await;

        let update = match self.read_update(host).await {
            Ok(update) => update,
            Err(e) => {
                match &e {
                    MonitorError::Protocol { .. } => error!(host = %host, error = %e, "Poll cycle failed"),
                    _ => warn!(host = %host, error = %e, "Poll cycle failed"),
                }
                if self.cache.record_failure(host, self.settings.stale_after) {
                    warn!(
                        host = %host,
                        failures = self.settings.stale_after,
                        "Agent marked stale after consecutive poll failures"
                    );
                }
                return Err(e);
            }
        };

        let interfaces = update.interfaces.len();
        let outcome = self.cache.apply(update);
        if !outcome.accepted {
            return Ok(());
        }

        if let Some(uptime) = outcome.uptime {
            self.streamer.publish(host, StreamEvent::Uptime(uptime));
        }
        if let Some(traffic) = outcome.traffic {
            self.streamer.publish(host, StreamEvent::Traffic(traffic));
        }
        for change in outcome.status_changes {
            info!(
                host = %host,
                interface = %change.interface_name,
                status = %change.interface_status,
                "Interface status changed"
            );
            self.streamer.publish(host, StreamEvent::Trap(change));
        }

        debug!(host = %host, interfaces, "Poll cycle completed");
        Ok(())
    }

    fn cycle_lock(&self, host: &AgentHost) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.cycles.lock().entry(host.clone()).or_default())
    }

    async fn read_update(&self, host: &AgentHost) -> MonitorResult<PollUpdate> {
        let timestamp = Utc::now();

        let rows = self.transport.get_bulk(host, &oids::if_entry()).await?;
        let mut interfaces = normalize_interface_table(&rows);

        if self.settings.counter_width == CounterWidth::Bits64 {
            let hc_in = self.transport.get_bulk(host, &oids::if_hc_in_octets()).await?;
            let hc_out = self.transport.get_bulk(host, &oids::if_hc_out_octets()).await?;
            apply_hc_counters(&mut interfaces, &hc_in, &hc_out);
        }

        let uptime_seconds = match self.transport.get(host, &oids::sys_uptime()).await? {
            SnmpValue::TimeTicks(ticks) => Some(u64::from(ticks) / 100),
            other => other.as_u64().map(|ticks| ticks / 100),
        };

        Ok(PollUpdate {
            host: host.clone(),
            timestamp,
            uptime_seconds,
            interfaces,
        })
    }
}

#[derive(Default)]
struct RawRow {
    name: Option<String>,
    mtu: u32,
    speed: u64,
    admin: Option<i64>,
    oper: Option<i64>,
    in_octets: Option<u64>,
    out_octets: Option<u64>,
}

/// Turn walked ifEntry varbinds into one reading per ifIndex, ordered by index
pub fn normalize_interface_table(rows: &[VarBind]) -> Vec<InterfaceReading> {
    let entry = oids::if_entry();
    let mut table: BTreeMap<u32, RawRow> = BTreeMap::new();

    for varbind in rows {
        if varbind.value.is_exception() {
            continue;
        }
        let Some(&[column, index]) = varbind.oid.suffix(&entry) else {
            continue;
        };
        let row = table.entry(index).or_default();
        match column {
            oids::IF_DESCR => row.name = varbind.value.as_text(),
            oids::IF_MTU => row.mtu = varbind.value.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
            oids::IF_SPEED => row.speed = varbind.value.as_u64().unwrap_or(0),
            oids::IF_ADMIN_STATUS => row.admin = varbind.value.as_i64(),
            oids::IF_OPER_STATUS => row.oper = varbind.value.as_i64(),
            oids::IF_IN_OCTETS => row.in_octets = varbind.value.as_u64(),
            oids::IF_OUT_OCTETS => row.out_octets = varbind.value.as_u64(),
            _ => {}
        }
    }

    table
        .into_iter()
        .filter_map(|(index, row)| {
            let name = row
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("if{}", index));
            if name.contains(NULL_INTERFACE_MARKER) {
                return None;
            }

            let status = |code: Option<i64>| code.map_or(InterfaceStatus::Down, InterfaceStatus::from_code);
            let mut reading = InterfaceReading::new(index, name)
                .with_status(status(row.admin), status(row.oper))
                .with_link(row.mtu, row.speed);
            if let (Some(rx), Some(tx)) = (row.in_octets, row.out_octets) {
                reading = reading.with_counters(rx, tx);
            }
            Some(reading)
        })
        .collect()
}

/// Replace 32-bit counters with ifHCInOctets / ifHCOutOctets.
/// Interfaces without HC counters get none, so widths are never mixed.
fn apply_hc_counters(interfaces: &mut [InterfaceReading], hc_in: &[VarBind], hc_out: &[VarBind]) {
    let by_index = |rows: &[VarBind], prefix: Oid| -> BTreeMap<u32, u64> {
        rows.iter()
            .filter_map(|vb| match vb.oid.suffix(&prefix) {
                Some(&[index]) => vb.value.as_u64().map(|v| (index, v)),
                _ => None,
            })
            .collect()
    };
    let rx = by_index(hc_in, oids::if_hc_in_octets());
    let tx = by_index(hc_out, oids::if_hc_out_octets());

    for reading in interfaces {
        reading.in_octets = rx.get(&reading.index).copied();
        reading.out_octets = tx.get(&reading.index).copied();
        if reading.in_octets.is_none() || reading.out_octets.is_none() {
            reading.in_octets = None;
            reading.out_octets = None;
        }
    }
}
