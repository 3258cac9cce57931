use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MonitorError;

/// IF-MIB interface status (ifAdminStatus / ifOperStatus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceStatus {
    Up,
    Down,
    Testing,
}

impl InterfaceStatus {
    /// Map an IF-MIB status code; unknown/dormant/notPresent/lowerLayerDown count as down
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Up,
            3 => Self::Testing,
            _ => Self::Down,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => 2,
            Self::Testing => 3,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Testing => "testing",
        }
    }
}

impl fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses an operator-requested admin status; only `up` and `down` can be set
impl FromStr for InterfaceStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(MonitorError::Validation(format!(
                "invalid interface status '{}', expected 'up' or 'down'",
                other
            ))),
        }
    }
}

/// One interface row as read from the device during a poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceReading {
    pub index: u32,
    pub name: String,
    pub mtu: u32,
    pub speed: u64,
    pub admin_status: InterfaceStatus,
    pub oper_status: InterfaceStatus,
    pub in_octets: Option<u64>,
    pub out_octets: Option<u64>,
}

impl InterfaceReading {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            mtu: 0,
            speed: 0,
            admin_status: InterfaceStatus::Down,
            oper_status: InterfaceStatus::Down,
            in_octets: None,
            out_octets: None,
        }
    }

    pub fn with_status(mut self, admin: InterfaceStatus, oper: InterfaceStatus) -> Self {
        self.admin_status = admin;
        self.oper_status = oper;
        self
    }

    pub fn with_link(mut self, mtu: u32, speed: u64) -> Self {
        self.mtu = mtu;
        self.speed = speed;
        self
    }

    pub fn with_counters(mut self, in_octets: u64, out_octets: u64) -> Self {
        self.in_octets = Some(in_octets);
        self.out_octets = Some(out_octets);
        self
    }
}

/// Interface entity held by the state cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub index: u32,
    pub name: String,
    pub mtu: u32,
    pub speed: u64,
    pub admin_status: InterfaceStatus,
    pub oper_status: InterfaceStatus,
    pub updated_at: DateTime<Utc>,
    /// When `oper_status` was observed (poll start or trap receipt)
    pub oper_status_at: DateTime<Utc>,
}

impl InterfaceRecord {
    pub fn from_reading(reading: &InterfaceReading, at: DateTime<Utc>) -> Self {
        Self {
            index: reading.index,
            name: reading.name.clone(),
            mtu: reading.mtu,
            speed: reading.speed,
            admin_status: reading.admin_status,
            oper_status: reading.oper_status,
            updated_at: at,
            oper_status_at: at,
        }
    }
}
