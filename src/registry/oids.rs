// IF-MIB / IP-MIB columns used by the registry and the bandwidth sampler.

use crate::models::IfIndex;
use crate::transport::Oid;

/// ifDescr: textual interface description, the table names are matched against.
pub const IF_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
/// ifPhysAddress: MAC address octets.
pub const IF_PHYS_ADDRESS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 6];
/// ifOperStatus: 1 = up, 2 = down, others unknown.
pub const IF_OPER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];
/// ifHighSpeed: nominal speed in units of 1 000 000 bits/s.
pub const IF_HIGH_SPEED: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 15];
/// ifHCInOctets: 64-bit received octet counter.
pub const IF_HC_IN_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6];
/// ifHCOutOctets: 64-bit transmitted octet counter.
pub const IF_HC_OUT_OCTETS: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10];
/// ipAdEntIfIndex: rows are indexed by IPv4 address, value is the ifIndex.
pub const IP_AD_ENT_IF_INDEX: &[u32] = &[1, 3, 6, 1, 2, 1, 4, 20, 1, 2];

/// Column OID for one interface row.
pub fn column(column: &[u32], index: IfIndex) -> Oid {
    Oid::new(column).child(index.0)
}

/// The in/out octet counter pair for an interface.
pub fn octet_counters(index: IfIndex) -> [Oid; 2] {
    [
        column(IF_HC_IN_OCTETS, index),
        column(IF_HC_OUT_OCTETS, index),
    ]
}
