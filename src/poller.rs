//! Polling Layer
//!
//! Walks table columns on every configured host, turns the columnar walk
//! results into row records and hands them to a [`Sink`](crate::sink::Sink).
//!
//! # Architecture
//!
//! - [`WalkClient`]: protocol seam opening one [`WalkSession`] per host per cycle
//! - [`SnmpClient`]: SNMPv2c implementation over GETBULK
//! - [`TablePoller`]: walks every configured column of one host
//! - [`TableAssembler`]: columnar-to-row transposition with default substitution
//! - [`Scheduler`]: fixed-interval cycles with per-host concurrency and graceful stop
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snmp_poller::{AppConfig, ColumnTable, Host, HostSettings, RunContext, Scheduler, SnmpClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::with_hosts(["192.0.2.1"]);
//! let settings = HostSettings::from_config(&config);
//! let hosts = vec![Host::resolve("192.0.2.1", settings).await?];
//! let ctx = RunContext::new(&config, hosts, ColumnTable::bundled()?);
//!
//! let (sink, _rx) = snmp_poller::sink::channel(config.channel_capacity);
//! let scheduler = Scheduler::new(ctx, Arc::new(SnmpClient::new()), Arc::new(sink));
//! scheduler.run().await;
//! # Ok(())
//! # }
//! ```

mod assemble;
mod scheduler;
mod snmp;
mod table;
mod traits;

pub use assemble::{DEFAULT_VALUE, FieldValue, Record, TableAssembler};
pub use scheduler::{CycleStats, HostOutcome, RecordMetadata, RunContext, Scheduler};
pub use snmp::{SnmpClient, parse_oid, render_value};
pub use table::{ColumnarResult, TablePoller};
pub use traits::{PollError, WalkClient, WalkSession};
