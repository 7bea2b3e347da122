//! Interface-name to routing-table-id allocation.

/// Largest allocatable table id; iproute2 reserves 32766/32767 for the
/// main and default tables.
pub const TABLE_MAX: u32 = 32765;

/// Map an interface name to its routing table id, in `[1, TABLE_MAX]`.
///
/// Pure and stable across restarts, so teardown can always recompute the
/// table a previous run installed. Distinct names may collide; the interface
/// name space on a given host is small enough that this is accepted.
pub fn table_for(name: &str) -> u32 {
    fnv1a(name.as_bytes()) % TABLE_MAX + 1
}

/// 32-bit FNV-1a. The stdlib hasher is not used because the output must not
/// change between runs or Rust versions.
fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
