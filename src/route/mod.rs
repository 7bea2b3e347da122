//! Policy-route synthesis and teardown.
//!
//! Traffic sourced from an interface's own address must leave through that
//! interface. Each interface gets a dedicated routing table (`table`)
//! holding a link-scope subnet route and a default route via the interface
//! gateway, selected by a source-address rule (`policy`).

mod policy;
mod table;

pub use policy::{remove_scope, subnet_of, PolicyRouteManager};
pub use table::{table_for, TABLE_MAX};
