use async_snmp::{ErrorKind, Value};

use crate::domain::{AgentHost, MonitorError, Oid, SnmpValue, VarBind};

pub fn to_wire_oid(oid: &Oid) -> async_snmp::Oid {
    async_snmp::Oid::from_slice(oid.arcs())
}

pub fn from_wire_oid(oid: &async_snmp::Oid) -> Oid {
    Oid::from_slice(oid.arcs())
}

pub fn from_wire_varbind(varbind: async_snmp::VarBind) -> VarBind {
    VarBind::new(from_wire_oid(&varbind.oid), from_wire_value(varbind.value))
}

pub fn from_wire_value(value: Value) -> SnmpValue {
    match value {
        Value::Integer(v) => SnmpValue::Integer(i64::from(v)),
        Value::OctetString(bytes) | Value::Nsap(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        Value::Null => SnmpValue::Null,
        Value::ObjectIdentifier(oid) => SnmpValue::ObjectId(from_wire_oid(&oid)),
        Value::IpAddress(octets) => SnmpValue::IpAddress(octets),
        Value::Counter32(v) => SnmpValue::Counter32(v),
        Value::Gauge32(v) | Value::UInteger32(v) => SnmpValue::Gauge32(v),
        Value::TimeTicks(v) => SnmpValue::TimeTicks(v),
        Value::Opaque(bytes) => SnmpValue::Opaque(bytes.to_vec()),
        Value::Counter64(v) => SnmpValue::Counter64(v),
        Value::NoSuchObject => SnmpValue::NoSuchObject,
        Value::NoSuchInstance => SnmpValue::NoSuchInstance,
        Value::EndOfMibView => SnmpValue::EndOfMibView,
        Value::Unknown { data, .. } => SnmpValue::Opaque(data.to_vec()),
        // future value types carry nothing the dashboard reads
        _ => SnmpValue::Null,
    }
}

/// Convert a value for a SET request; exception values cannot be sent
pub fn to_wire_value(value: SnmpValue) -> Result<Value, MonitorError> {
    Ok(match value {
        SnmpValue::Integer(v) => Value::Integer(i32::try_from(v).map_err(|_| {
            MonitorError::Validation(format!("integer {} does not fit an SNMP INTEGER", v))
        })?),
        SnmpValue::OctetString(bytes) => Value::from(bytes.as_slice()),
        SnmpValue::Null => Value::Null,
        SnmpValue::ObjectId(oid) => Value::ObjectIdentifier(to_wire_oid(&oid)),
        SnmpValue::IpAddress(octets) => Value::IpAddress(octets),
        SnmpValue::Counter32(v) => Value::Counter32(v),
        SnmpValue::Gauge32(v) => Value::Gauge32(v),
        SnmpValue::TimeTicks(v) => Value::TimeTicks(v),
        SnmpValue::Opaque(bytes) => Value::Opaque(bytes.into()),
        SnmpValue::Counter64(v) => Value::Counter64(v),
        SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView => {
            return Err(MonitorError::Validation(
                "exception values cannot be written".to_string(),
            ));
        }
    })
}

/// Timeouts and socket failures mean the agent could not be reached; anything
/// the agent actually answered with is a protocol error
pub fn map_error(host: &AgentHost, err: &async_snmp::Error) -> MonitorError {
    match err.kind() {
        ErrorKind::Timeout
        | ErrorKind::ConstructionTimeout
        | ErrorKind::Network
        | ErrorKind::Closed
        | ErrorKind::Config => MonitorError::unreachable(host, err),
        _ => MonitorError::protocol(host, err),
    }
}
