//! Counter-side input: fetching, parsing and grouping the
//! load-balancer counter table.

mod group;
mod parser;
mod source;

pub use group::{group_by_service, ServiceGroup};
pub use parser::parse_counter_table;
pub use source::{CounterSource, HttpCounterSource};
