//! SNMP table poller
//!
//! Periodically walks a configurable set of table columns (by default the
//! IF-MIB interface table) on a list of hosts, reshapes every table row into
//! a flat record enriched with host and run metadata, and emits the records
//! to a downstream sink.
//!
//! It can be used as a library, or run as a standalone binary with the
//! `snmp-poller` executable which writes JSON lines to stdout or a file.
//!
//! # Architecture
//!
//! - **Config**: YAML configuration with defaults and validation
//! - **Columns**: alias-to-identifier tables, bundled IF-MIB fallback
//! - **Poller**: protocol client, table walks, row assembly and the cycle scheduler
//! - **Sink**: bounded channel producer and JSON-lines writer

pub mod column;
pub mod config;
pub mod host;
pub mod poller;
pub mod sink;

pub use column::{ColumnError, ColumnTable};
pub use config::{AppConfig, ConfigError};
pub use host::{Host, HostSettings};
pub use poller::{
    CycleStats, FieldValue, PollError, Record, RunContext, Scheduler, SnmpClient, WalkClient,
    WalkSession,
};
pub use sink::{ChannelSink, JsonLinesWriter, Sink, SinkError};
