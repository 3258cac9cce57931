use std::fmt;
use std::str::FromStr;

use super::MonitorError;

/// SNMP object identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self(arcs.to_vec())
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Append one sub-identifier (e.g. a table column instance)
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Oid(arcs)
    }

    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Arcs following `prefix`, or None if this OID is outside the subtree
    pub fn suffix(&self, prefix: &Oid) -> Option<&[u32]> {
        if self.starts_with(prefix) {
            Some(&self.0[prefix.len()..])
        } else {
            None
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s
            .trim()
            .trim_start_matches('.')
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| MonitorError::Validation(format!("invalid OID: {}", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if arcs.len() < 2 {
            return Err(MonitorError::Validation(format!("OID too short: {}", s)));
        }

        Ok(Oid(arcs))
    }
}

/// Value carried by an SNMP variable binding
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// Numeric view of integer-like values (negative integers excluded)
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => u64::try_from(*v).ok(),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Some(u64::from(*v)),
            Self::Counter64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Some(i64::from(*v)),
            Self::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Printable text of an OCTET STRING, with trailing NULs removed
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::OctetString(bytes) => Some(
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string(),
            ),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Self::ObjectId(oid) => Some(oid),
            _ => None,
        }
    }

    /// v2c exception values returned in place of a missing object
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView)
    }
}

/// An (OID, value) pair
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: SnmpValue) -> Self {
        Self { oid, value }
    }

    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: SnmpValue::Null,
        }
    }
}

/// Well-known MIB-II / IF-MIB object identifiers
pub mod oids {
    use super::Oid;

    pub fn sys_uptime() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 3, 0])
    }

    /// ifTable entry: 1.3.6.1.2.1.2.2.1
    pub fn if_entry() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 2, 1])
    }

    pub fn if_entry_column(column: u32) -> Oid {
        if_entry().child(column)
    }

    pub const IF_INDEX: u32 = 1;
    pub const IF_DESCR: u32 = 2;
    pub const IF_MTU: u32 = 4;
    pub const IF_SPEED: u32 = 5;
    pub const IF_ADMIN_STATUS: u32 = 7;
    pub const IF_OPER_STATUS: u32 = 8;
    pub const IF_IN_OCTETS: u32 = 10;
    pub const IF_OUT_OCTETS: u32 = 16;

    pub fn if_admin_status(index: u32) -> Oid {
        if_entry_column(IF_ADMIN_STATUS).child(index)
    }

    /// ifXTable 64-bit counters
    pub fn if_hc_in_octets() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6])
    }

    pub fn if_hc_out_octets() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10])
    }

    pub fn snmp_trap_oid() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0])
    }

    pub fn link_down_trap() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 6, 3, 1, 1, 5, 3])
    }

    pub fn link_up_trap() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 6, 3, 1, 1, 5, 4])
    }
}
