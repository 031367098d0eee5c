//! Polling cycle scheduler.
//!
//! One driver loop fires a cycle per interval. Each cycle spawns one task
//! per host into a `JoinSet`, waits for all of them (join barrier), checks
//! for overrun and then sleeps until the next cycle start. The sleep and the
//! join both race against a [`CancellationToken`].
//!
//! ```text
//! Idle -> Polling -> Sleeping -> Idle ...
//!   \________\__________\______> Stopped
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::column::ColumnTable;
use crate::config::AppConfig;
use crate::host::Host;
use crate::sink::Sink;

use super::assemble::{FieldValue, Record, TableAssembler};
use super::table::TablePoller;
use super::traits::{PollError, WalkClient};

/// Static fields merged into every emitted record.
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    /// Configured interval in seconds.
    pub poll_interval: u64,
    pub device: String,
    pub event_type: String,
    pub custom_fields: BTreeMap<String, serde_json::Value>,
}

impl RecordMetadata {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.interval,
            device: config.device.clone(),
            event_type: config.event_type.clone(),
            custom_fields: config.custom_fields.clone(),
        }
    }

    /// Build the emitted record for one table row.
    ///
    /// Later fields win: `host`, row columns, `poll_interval`/`device`,
    /// custom fields, then `poll_duration`, `type` and `@timestamp`.
    pub fn merge(&self, host: &str, row: Record, poll_duration: Duration) -> Record {
        let mut record = Record::new();
        record.insert("host", host);
        record.append(row);
        record.insert("poll_interval", self.poll_interval);
        record.insert("device", self.device.as_str());
        for (key, value) in &self.custom_fields {
            record.insert(key.as_str(), FieldValue::from(value.clone()));
        }
        record.insert("poll_duration", poll_duration.as_secs_f64());
        record.insert("type", self.event_type.as_str());
        record.insert(
            "@timestamp",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        record
    }
}

/// Read-only state shared by every host task of a run.
#[derive(Debug)]
pub struct RunContext {
    pub hosts: Vec<Host>,
    pub columns: ColumnTable,
    /// Column aliases in record order.
    pub aliases: Vec<String>,
    pub metadata: RecordMetadata,
    pub interval: Duration,
    /// How long in-flight host tasks may run after a stop request.
    pub shutdown_grace: Duration,
}

impl RunContext {
    pub fn new(config: &AppConfig, hosts: Vec<Host>, columns: ColumnTable) -> Self {
        Self {
            hosts,
            columns,
            aliases: config.columns.clone(),
            metadata: RecordMetadata::from_config(config),
            interval: config.interval(),
            shutdown_grace: config.shutdown_grace,
        }
    }
}

/// Result of one host task.
#[derive(Debug, Clone)]
pub struct HostOutcome {
    pub host: String,
    /// Records pushed to the sink.
    pub records: usize,
    pub duration: Duration,
    /// Failure message when the host's contribution was dropped.
    pub error: Option<String>,
}

impl HostOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Bookkeeping of one cycle, discarded after the overrun check.
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub cycle: u64,
    pub started: Instant,
    pub duration: Duration,
    /// Outcomes in completion order.
    pub hosts: Vec<HostOutcome>,
    /// Host tasks aborted after the shutdown grace period.
    pub abandoned: usize,
}

impl CycleStats {
    fn new(cycle: u64, started: Instant) -> Self {
        Self {
            cycle,
            started,
            duration: Duration::ZERO,
            hosts: Vec::new(),
            abandoned: 0,
        }
    }

    /// Total records emitted in the cycle.
    pub fn records(&self) -> usize {
        self.hosts.iter().map(|h| h.records).sum()
    }

    pub fn failed_hosts(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|h| h.failed())
            .map(|h| h.host.as_str())
            .collect()
    }

    pub fn outcome(&self, host: &str) -> Option<&HostOutcome> {
        self.hosts.iter().find(|h| h.host == host)
    }

    pub fn overrun(&self, interval: Duration) -> bool {
        self.duration > interval
    }

    /// Hosts to blame for an overrun.
    ///
    /// Every host slower than the interval, or the slowest host when none
    /// exceeded it on its own. Empty when the cycle did not overrun.
    pub fn overrun_hosts(&self, interval: Duration) -> Vec<&HostOutcome> {
        if !self.overrun(interval) {
            return Vec::new();
        }
        let slow: Vec<&HostOutcome> = self
            .hosts
            .iter()
            .filter(|h| h.duration > interval)
            .collect();
        if !slow.is_empty() {
            return slow;
        }
        self.hosts.iter().max_by_key(|h| h.duration).into_iter().collect()
    }
}

/// Drives polling cycles until stopped.
pub struct Scheduler {
    ctx: Arc<RunContext>,
    client: Arc<dyn WalkClient>,
    sink: Arc<dyn Sink>,
    cancel: CancellationToken,
    cycles: AtomicU64,
    failed_cycles: AtomicU64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("hosts", &self.ctx.hosts.len())
            .field("interval", &self.ctx.interval)
            .field("cycles", &self.cycles.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(ctx: RunContext, client: Arc<dyn WalkClient>, sink: Arc<dyn Sink>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            client,
            sink,
            cancel: CancellationToken::new(),
            cycles: AtomicU64::new(0),
            failed_cycles: AtomicU64::new(0),
        }
    }

    /// Use an externally owned stop signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops this scheduler when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a stop. Takes effect at the next suspension point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Run cycles until the stop signal fires.
    pub async fn run(&self) {
        let interval = self.ctx.interval;
        tracing::info!(
            hosts = self.ctx.hosts.len(),
            columns = self.ctx.aliases.len(),
            interval_secs = interval.as_secs(),
            "Scheduler started"
        );

        while !self.cancel.is_cancelled() {
            let started = Instant::now();
            let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

            let task = tokio::spawn(poll_cycle(
                Arc::clone(&self.ctx),
                Arc::clone(&self.client),
                Arc::clone(&self.sink),
                self.cancel.clone(),
                cycle,
            ));

            self.settle(cycle, task.await);

            let remaining = interval.saturating_sub(started.elapsed());
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(remaining) => {}
            }
        }

        tracing::info!(cycles = self.cycles(), "Scheduler stopped");
    }

    /// Run a single cycle outside the loop and return its stats.
    pub async fn run_cycle(&self) -> CycleStats {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let stats = poll_cycle(
            Arc::clone(&self.ctx),
            Arc::clone(&self.client),
            Arc::clone(&self.sink),
            self.cancel.clone(),
            cycle,
        )
        .await;
        self.report(&stats);
        stats
    }

    /// Cycles whose task terminated abnormally.
    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles.load(Ordering::Relaxed)
    }

    /// Account for a finished cycle task. A failed task is logged and the
    /// loop goes on to its normal sleep.
    fn settle(&self, cycle: u64, joined: Result<CycleStats, JoinError>) -> Option<CycleStats> {
        match joined {
            Ok(stats) => {
                self.report(&stats);
                Some(stats)
            }
            Err(e) => {
                self.failed_cycles.fetch_add(1, Ordering::Relaxed);
                tracing::error!(cycle, error = %e, "Polling cycle aborted, continuing after sleep");
                None
            }
        }
    }

    fn report(&self, stats: &CycleStats) {
        let interval = self.ctx.interval;
        tracing::debug!(
            cycle = stats.cycle,
            duration_ms = stats.duration.as_millis(),
            records = stats.records(),
            failed_hosts = stats.failed_hosts().len(),
            "Polling cycle finished"
        );

        for outcome in stats.overrun_hosts(interval) {
            tracing::warn!(
                host = %outcome.host,
                duration_secs = outcome.duration.as_secs_f64(),
                cycle_secs = stats.duration.as_secs_f64(),
                interval_secs = interval.as_secs(),
                "Polling took longer than the interval; increase the interval for this host if this keeps happening"
            );
        }
    }
}

/// One Polling phase: fan out, join, account.
async fn poll_cycle(
    ctx: Arc<RunContext>,
    client: Arc<dyn WalkClient>,
    sink: Arc<dyn Sink>,
    cancel: CancellationToken,
    cycle: u64,
) -> CycleStats {
    let started = Instant::now();
    let mut stats = CycleStats::new(cycle, started);
    let mut tasks = JoinSet::new();
    let mut names = HashMap::new();

    tracing::debug!(cycle, hosts = ctx.hosts.len(), "Polling cycle started");

    for index in 0..ctx.hosts.len() {
        if cancel.is_cancelled() {
            break;
        }
        let name = ctx.hosts[index].name.clone();
        let (ctx, client, sink) = (Arc::clone(&ctx), Arc::clone(&client), Arc::clone(&sink));
        let handle = tasks.spawn(async move {
            let host = &ctx.hosts[index];
            poll_host(&ctx, client.as_ref(), sink.as_ref(), host).await
        });
        names.insert(handle.id(), name);
    }

    tokio::select! {
        _ = join_all(&mut tasks, &names, &mut stats) => {}
        _ = cancel.cancelled() => {
            tracing::info!(
                cycle,
                in_flight = tasks.len(),
                grace_ms = ctx.shutdown_grace.as_millis(),
                "Stop requested, waiting for in-flight hosts"
            );
            let grace = tokio::time::timeout(
                ctx.shutdown_grace,
                join_all(&mut tasks, &names, &mut stats),
            );
            if grace.await.is_err() {
                stats.abandoned = tasks.len();
                tasks.abort_all();
                tracing::warn!(cycle, abandoned = stats.abandoned, "Shutdown grace elapsed, aborting host tasks");
            }
        }
    }

    stats.duration = started.elapsed();
    stats
}

/// Join barrier over the cycle's host tasks.
async fn join_all(
    tasks: &mut JoinSet<HostOutcome>,
    names: &HashMap<tokio::task::Id, String>,
    stats: &mut CycleStats,
) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => stats.hosts.push(outcome),
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                let host = names.get(&e.id()).cloned().unwrap_or_default();
                tracing::error!(host = %host, error = %e, "Host task panicked");
                stats.hosts.push(HostOutcome {
                    host,
                    records: 0,
                    duration: stats.started.elapsed(),
                    error: Some(e.to_string()),
                });
            }
        }
    }
}

/// Walk, assemble and emit one host. Failures are contained here.
async fn poll_host(
    ctx: &RunContext,
    client: &dyn WalkClient,
    sink: &dyn Sink,
    host: &Host,
) -> HostOutcome {
    let start = Instant::now();
    let result = emit_host(ctx, client, sink, host, start).await;
    let duration = start.elapsed();

    match result {
        Ok(records) => {
            tracing::debug!(host = %host.name, records, duration_ms = duration.as_millis(), "Host polled");
            HostOutcome {
                host: host.name.clone(),
                records,
                duration,
                error: None,
            }
        }
        Err(e) => {
            tracing::error!(host = %host.name, error = %e, "Host walk failed");
            HostOutcome {
                host: host.name.clone(),
                records: 0,
                duration,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn emit_host(
    ctx: &RunContext,
    client: &dyn WalkClient,
    sink: &dyn Sink,
    host: &Host,
    start: Instant,
) -> Result<usize, PollError> {
    let columns = TablePoller::new(&ctx.columns)
        .walk(client, host, &ctx.aliases)
        .await?;
    let rows = TableAssembler::assemble(&ctx.aliases, &columns);
    let count = rows.len();

    for row in rows {
        let record = ctx.metadata.merge(&host.name, row, start.elapsed());
        sink.push(record).await?;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    use super::*;
    use crate::host::HostSettings;
    use crate::poller::traits::WalkSession;
    use crate::sink::SinkError;

    /// Per-host behavior of the scripted client.
    #[derive(Clone, Default)]
    struct Script {
        columns: HashMap<String, Vec<String>>,
        delay: Duration,
        fail: bool,
        panic: bool,
    }

    #[derive(Default)]
    struct ScriptedClient {
        scripts: HashMap<String, Script>,
        opens: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn host(mut self, name: &str, script: Script) -> Self {
            self.scripts.insert(name.to_string(), script);
            self
        }

        fn opens(&self, name: &str) -> usize {
            self.opens.lock().unwrap().iter().filter(|n| *n == name).count()
        }
    }

    struct ScriptedSession(Script);

    #[async_trait::async_trait]
    impl WalkClient for ScriptedClient {
        async fn open(&self, host: &Host) -> Result<Box<dyn WalkSession>, PollError> {
            self.opens.lock().unwrap().push(host.name.clone());
            let script = self.scripts.get(&host.name).cloned().unwrap_or_default();
            Ok(Box::new(ScriptedSession(script)))
        }
    }

    #[async_trait::async_trait]
    impl WalkSession for ScriptedSession {
        async fn walk(&mut self, identifier: &str) -> Result<Vec<String>, PollError> {
            tokio::time::sleep(self.0.delay).await;
            if self.0.panic {
                panic!("scripted agent crashed on {identifier}");
            }
            if self.0.fail {
                return Err(PollError::Timeout {
                    attempts: 6,
                    timeout: Duration::from_secs(5),
                });
            }
            Ok(self.0.columns.get(identifier).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<Record>>,
    }

    impl MemorySink {
        fn hosts(&self) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter_map(|r| match r.get("host") {
                    Some(FieldValue::Text(h)) => Some(h.clone()),
                    _ => None,
                })
                .collect()
        }

        fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Sink for MemorySink {
        async fn push(&self, record: Record) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn interface_script(descr: &[&str]) -> Script {
        let index: Vec<String> = (1..=descr.len()).map(|i| i.to_string()).collect();
        Script {
            columns: [
                ("1.3.6.1.2.1.2.2.1.1".to_string(), index),
                (
                    "1.3.6.1.2.1.2.2.1.2".to_string(),
                    descr.iter().map(|d| d.to_string()).collect(),
                ),
            ]
            .into_iter()
            .collect(),
            ..Script::default()
        }
    }

    fn context(hosts: &[&str], interval_secs: u64) -> RunContext {
        let mut config = AppConfig::with_hosts(hosts.iter().copied());
        config.interval = interval_secs;
        config.columns = vec!["ifIndex".to_string(), "ifDescr".to_string()];
        config.shutdown_grace = Duration::from_secs(1);
        config
            .custom_fields
            .insert("site".to_string(), serde_json::json!("lab"));

        let settings = HostSettings::from_config(&config);
        let hosts = hosts
            .iter()
            .map(|h| Host::new(*h, IpAddr::V4(Ipv4Addr::LOCALHOST), settings.clone()))
            .collect();
        RunContext::new(&config, hosts, ColumnTable::bundled().unwrap())
    }

    fn scheduler(
        ctx: RunContext,
        client: ScriptedClient,
    ) -> (Scheduler, Arc<ScriptedClient>, Arc<MemorySink>) {
        let client = Arc::new(client);
        let sink = Arc::new(MemorySink::default());
        let scheduler = Scheduler::new(ctx, client.clone(), sink.clone());
        (scheduler, client, sink)
    }

    #[test]
    fn test_metadata_merge_fields() {
        let metadata = RecordMetadata {
            poll_interval: 60,
            device: "router".to_string(),
            event_type: "snmp".to_string(),
            custom_fields: [("site".to_string(), serde_json::json!("ams1"))]
                .into_iter()
                .collect(),
        };
        let row: Record = [("ifIndex", FieldValue::Integer(1)), ("ifDescr", "eth0".into())]
            .into_iter()
            .collect();

        let record = metadata.merge("r1", row, Duration::from_millis(1500));

        assert_eq!(record.get("host"), Some(&FieldValue::from("r1")));
        assert_eq!(record.get("ifIndex"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.get("poll_interval"), Some(&FieldValue::Integer(60)));
        assert_eq!(record.get("device"), Some(&FieldValue::from("router")));
        assert_eq!(record.get("site"), Some(&FieldValue::from("ams1")));
        assert_eq!(record.get("poll_duration"), Some(&FieldValue::Float(1.5)));
        assert_eq!(record.get("type"), Some(&FieldValue::from("snmp")));
        assert!(record.contains_key("@timestamp"));
    }

    #[test]
    fn test_metadata_merge_precedence() {
        let metadata = RecordMetadata {
            poll_interval: 30,
            device: "switch".to_string(),
            event_type: "snmp".to_string(),
            custom_fields: [("ifDescr".to_string(), serde_json::json!("custom"))]
                .into_iter()
                .collect(),
        };
        // Row columns override host; metadata and custom fields override row columns
        let row: Record = [("host", "from-row"), ("device", "from-row"), ("ifDescr", "eth0")]
            .into_iter()
            .collect();

        let record = metadata.merge("r1", row, Duration::ZERO);

        assert_eq!(record.get("host"), Some(&FieldValue::from("from-row")));
        assert_eq!(record.get("device"), Some(&FieldValue::from("switch")));
        assert_eq!(record.get("ifDescr"), Some(&FieldValue::from("custom")));
    }

    fn outcome(host: &str, secs: u64) -> HostOutcome {
        HostOutcome {
            host: host.to_string(),
            records: 1,
            duration: Duration::from_secs(secs),
            error: None,
        }
    }

    #[test]
    fn test_overrun_hosts_names_slow_hosts() {
        let mut stats = CycleStats::new(1, Instant::now());
        stats.duration = Duration::from_secs(75);
        stats.hosts = vec![outcome("fast", 2), outcome("slow", 75), outcome("slower", 74)];

        let blamed: Vec<&str> = stats
            .overrun_hosts(Duration::from_secs(60))
            .iter()
            .map(|h| h.host.as_str())
            .collect();

        assert_eq!(blamed, vec!["slow", "slower"]);
    }

    #[test]
    fn test_overrun_hosts_falls_back_to_slowest() {
        let mut stats = CycleStats::new(1, Instant::now());
        stats.duration = Duration::from_secs(61);
        stats.hosts = vec![outcome("a", 59), outcome("b", 60)];

        let blamed = stats.overrun_hosts(Duration::from_secs(60));

        assert_eq!(blamed.len(), 1);
        assert_eq!(blamed[0].host, "b");
    }

    #[test]
    fn test_no_overrun_within_interval() {
        let mut stats = CycleStats::new(1, Instant::now());
        stats.duration = Duration::from_secs(60);
        stats.hosts = vec![outcome("a", 60)];

        assert!(!stats.overrun(Duration::from_secs(60)));
        assert!(stats.overrun_hosts(Duration::from_secs(60)).is_empty());
    }

    #[tokio::test]
    async fn test_cycle_emits_rows_with_metadata() {
        let client = ScriptedClient::default().host("a", interface_script(&["eth0", "eth1"]));
        let (scheduler, _, sink) = scheduler(context(&["a"], 60), client);

        let stats = scheduler.run_cycle().await;

        assert_eq!(stats.records(), 2);
        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].get("ifIndex"), Some(&FieldValue::Integer(1)));
        assert_eq!(records[0].get("ifDescr"), Some(&FieldValue::from("eth0")));
        assert_eq!(records[1].get("ifIndex"), Some(&FieldValue::Integer(2)));
        assert_eq!(records[1].get("ifDescr"), Some(&FieldValue::from("eth1")));
        assert_eq!(records[1].get("host"), Some(&FieldValue::from("a")));
        assert_eq!(records[1].get("site"), Some(&FieldValue::from("lab")));
        assert_eq!(records[1].get("poll_interval"), Some(&FieldValue::Integer(60)));
        assert!(matches!(records[1].get("poll_duration"), Some(FieldValue::Float(_))));
    }

    #[tokio::test]
    async fn test_failed_host_is_isolated() {
        let client = ScriptedClient::default()
            .host("a", interface_script(&["eth0", "eth1"]))
            .host(
                "b",
                Script {
                    fail: true,
                    ..interface_script(&["eth0"])
                },
            );
        let (scheduler, _, sink) = scheduler(context(&["a", "b"], 60), client);

        let stats = scheduler.run_cycle().await;

        assert_eq!(stats.failed_hosts(), vec!["b"]);
        assert_eq!(stats.outcome("a").unwrap().records, 2);
        assert_eq!(stats.outcome("b").unwrap().records, 0);
        assert_eq!(sink.hosts(), vec!["a", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_polled_concurrently() {
        let slow = |descr: &[&str]| Script {
            delay: Duration::from_secs(10),
            ..interface_script(descr)
        };
        let client = ScriptedClient::default()
            .host("a", slow(&["eth0"]))
            .host("b", slow(&["eth0"]))
            .host("c", slow(&["eth0"]));
        let (scheduler, _, _) = scheduler(context(&["a", "b", "c"], 60), client);

        let stats = scheduler.run_cycle().await;

        // Two sequential column walks of 10s each per host, hosts in parallel
        assert_eq!(stats.hosts.len(), 3);
        assert!(stats.duration >= Duration::from_secs(20));
        assert!(stats.duration < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_sleep_prevents_next_cycle() {
        let client = ScriptedClient::default().host("a", interface_script(&["eth0"]));
        let (scheduler, client, sink) = scheduler(context(&["a"], 60), client);
        let scheduler = Arc::new(scheduler);

        let runner = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run().await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.len(), 1);
        scheduler.stop();

        tokio::time::timeout(Duration::from_millis(100), runner)
            .await
            .expect("scheduler should stop without finishing its sleep")
            .unwrap();
        assert_eq!(scheduler.cycles(), 1);
        assert_eq!(client.opens("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_proceeds_to_next_cycle_without_retry() {
        let client = ScriptedClient::default().host(
            "a",
            Script {
                delay: Duration::from_secs(1),
                ..interface_script(&["eth0"])
            },
        );
        // Two 1s walks per cycle against a 1s interval
        let (scheduler, client, _) = scheduler(context(&["a"], 1), client);
        let scheduler = Arc::new(scheduler);

        let runner = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run().await }
        });

        tokio::time::sleep(Duration::from_millis(4500)).await;
        scheduler.stop();
        runner.await.unwrap();

        // Cycles start at 0s, 2s and 4s; the third is cut short by stop.
        assert_eq!(scheduler.cycles(), 3);
        assert_eq!(client.opens("a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_polling_aborts_after_grace() {
        let client = ScriptedClient::default().host(
            "a",
            Script {
                delay: Duration::from_secs(3600),
                ..interface_script(&["eth0"])
            },
        );
        let (scheduler, _, sink) = scheduler(context(&["a"], 60), client);
        let cancel = scheduler.cancellation_token();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cancel.cancel();
        });

        let stats = scheduler.run_cycle().await;
        stopper.await.unwrap();

        assert_eq!(stats.abandoned, 1);
        assert!(stats.hosts.is_empty());
        // 5s until stop plus 1s grace
        assert!(stats.duration < Duration::from_secs(7));
        assert_eq!(sink.len(), 0);
    }

    fn crashing_script() -> Script {
        Script {
            panic: true,
            ..interface_script(&["eth0"])
        }
    }

    #[tokio::test]
    async fn test_panicking_host_is_isolated() {
        let client = ScriptedClient::default()
            .host("a", interface_script(&["eth0", "eth1"]))
            .host("b", crashing_script());
        let (scheduler, _, sink) = scheduler(context(&["a", "b"], 60), client);

        let stats = scheduler.run_cycle().await;

        let crashed = stats.outcome("b").expect("panicked host keeps its name");
        assert!(crashed.failed());
        assert_eq!(crashed.records, 0);
        assert_eq!(stats.outcome("a").unwrap().records, 2);
        assert_eq!(stats.failed_hosts(), vec!["b"]);
        assert_eq!(sink.hosts(), vec!["a", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_continues_after_panicking_host() {
        let client = ScriptedClient::default()
            .host("a", interface_script(&["eth0"]))
            .host("b", crashing_script());
        let (scheduler, client, sink) = scheduler(context(&["a", "b"], 10), client);
        let scheduler = Arc::new(scheduler);

        let runner = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run().await }
        });

        // Cycles start at 0s and 10s
        tokio::time::sleep(Duration::from_secs(15)).await;
        scheduler.stop();
        runner.await.unwrap();

        assert_eq!(scheduler.cycles(), 2);
        assert_eq!(scheduler.failed_cycles(), 0);
        assert_eq!(client.opens("b"), 2);
        assert_eq!(sink.hosts(), vec!["a", "a"]);
    }

    #[tokio::test]
    async fn test_failed_cycle_task_is_counted_and_skipped() {
        let (scheduler, _, _) = scheduler(context(&["a"], 60), ScriptedClient::default());

        let crashed = tokio::spawn(async {
            if scheduler_bookkeeping_fails() {
                panic!("cycle bookkeeping failed");
            }
            CycleStats::new(1, Instant::now())
        })
        .await;
        assert!(crashed.is_err());
        assert!(scheduler.settle(1, crashed).is_none());
        assert_eq!(scheduler.failed_cycles(), 1);

        let finished = Ok(CycleStats::new(2, Instant::now()));
        assert_eq!(scheduler.settle(2, finished).map(|s| s.cycle), Some(2));
        assert_eq!(scheduler.failed_cycles(), 1);
    }

    fn scheduler_bookkeeping_fails() -> bool {
        true
    }

    #[tokio::test]
    async fn test_no_hosts_started_after_stop() {
        let client = ScriptedClient::default().host("a", interface_script(&["eth0"]));
        let (scheduler, client, _) = scheduler(context(&["a"], 60), client);
        scheduler.stop();

        scheduler.run().await;

        assert_eq!(scheduler.cycles(), 0);
        assert_eq!(client.opens("a"), 0);
    }
}
