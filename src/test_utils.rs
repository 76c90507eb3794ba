//! In-memory collaborators for tests and benchmarks
//!
//! Every mock is cheaply cloneable; clones share their recorded state, so a
//! test can hand one clone to the monitor and inspect the other.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::HashSet;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::classifier::{TrainingPoint, TrainingSet};
use crate::link::{Credentials, DriverEvent, RadioDriver};
use crate::transport::{NetConnection, NetTransport, SampleSource, ShortRangeLink};
use crate::{MonitorError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Poll `condition` every millisecond until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .is_ok()
}

/// A training set with tight, well separated clusters.
///
/// Normal beats sit near (amplitude 2600, RR 800), atrial near (2000, 400),
/// ventricular near (3500, 1200).
pub fn clustered_training_set() -> TrainingSet {
    let mut set = TrainingSet::default();
    for (i, p) in set.normal.iter_mut().enumerate() {
        *p = TrainingPoint::new(2600 + i as u16, 800 + i as u16);
    }
    for (i, p) in set.atrial.iter_mut().enumerate() {
        *p = TrainingPoint::new(2000 + i as u16, 400 + i as u16);
    }
    for (i, p) in set.ventricular.iter_mut().enumerate() {
        *p = TrainingPoint::new(3500 + i as u16, 1200 + i as u16);
    }
    set
}

/// Operation recorded by [`MockRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Init(String),
    Configure(Credentials),
    Start,
    Associate,
    Disconnect,
    Stop,
    Deinit,
}

impl RadioCall {
    fn name(&self) -> &'static str {
        match self {
            RadioCall::Init(_) => "init",
            RadioCall::Configure(_) => "configure",
            RadioCall::Start => "start",
            RadioCall::Associate => "associate",
            RadioCall::Disconnect => "disconnect",
            RadioCall::Stop => "stop",
            RadioCall::Deinit => "deinit",
        }
    }
}

#[derive(Debug, Default)]
struct RadioInner {
    calls: Vec<RadioCall>,
    failing: HashSet<&'static str>,
    events: Option<mpsc::UnboundedSender<DriverEvent>>,
    lease: Option<u32>,
}

/// Recording [`RadioDriver`].
///
/// Once wired to an event channel with [`MockRadio::with_events`], every
/// `associate` completes immediately with the configured lease (or fails
/// with `LinkLost` if no lease is set) and every `disconnect` reports
/// `LinkLost`.
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    inner: Arc<Mutex<RadioInner>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a radio together with the event channel it reports on.
    pub fn with_events(lease: Option<u32>) -> (Self, mpsc::UnboundedReceiver<DriverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let radio = Self::new();
        {
            let mut inner = lock(&radio.inner);
            inner.events = Some(tx);
            inner.lease = lease;
        }
        (radio, rx)
    }

    /// Make every later call to `operation` fail with a driver error.
    pub fn fail_on(&self, operation: &'static str) {
        lock(&self.inner).failing.insert(operation);
    }

    /// Undo every earlier [`MockRadio::fail_on`].
    pub fn clear_failures(&self) {
        lock(&self.inner).failing.clear();
    }

    /// Change the address handed out by the next successful association.
    pub fn set_lease(&self, lease: Option<u32>) {
        lock(&self.inner).lease = lease;
    }

    /// Report an unsolicited link drop.
    pub fn drop_link(&self) {
        if let Some(events) = &lock(&self.inner).events {
            let _ = events.send(DriverEvent::LinkLost);
        }
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        lock(&self.inner).calls.clone()
    }

    pub fn count(&self, call: &RadioCall) -> usize {
        lock(&self.inner).calls.iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: RadioCall) -> Result<()> {
        let mut inner = lock(&self.inner);
        let name = call.name();
        if inner.failing.contains(name) {
            return Err(MonitorError::driver(name, "injected failure"));
        }

        let event = match (&call, inner.lease) {
            (RadioCall::Associate, Some(addr)) => Some(DriverEvent::Associated(addr)),
            (RadioCall::Associate, None) | (RadioCall::Disconnect, _) => Some(DriverEvent::LinkLost),
            _ => None,
        };
        inner.calls.push(call);
        if let (Some(events), Some(event)) = (&inner.events, event) {
            let _ = events.send(event);
        }
        Ok(())
    }
}

impl RadioDriver for MockRadio {
    fn init(&mut self, hostname: &str) -> Result<()> {
        self.record(RadioCall::Init(hostname.to_string()))
    }

    fn configure(&mut self, credentials: &Credentials) -> Result<()> {
        self.record(RadioCall::Configure(credentials.clone()))
    }

    fn start(&mut self) -> Result<()> {
        self.record(RadioCall::Start)
    }

    fn associate(&mut self) -> Result<()> {
        self.record(RadioCall::Associate)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.record(RadioCall::Disconnect)
    }

    fn stop(&mut self) -> Result<()> {
        self.record(RadioCall::Stop)
    }

    fn deinit(&mut self) -> Result<()> {
        self.record(RadioCall::Deinit)
    }
}

/// [`ShortRangeLink`] that records every frame it is asked to send.
#[derive(Debug, Clone)]
pub struct RecordingLink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    mtu: usize,
    reject: Arc<AtomicBool>,
}

impl Default for RecordingLink {
    fn default() -> Self {
        Self::new(crate::protocol::MAX_FRAME_SIZE)
    }
}

impl RecordingLink {
    pub fn new(mtu: usize) -> Self {
        Self { sent: Arc::default(), mtu, reject: Arc::default() }
    }

    /// Make every send fail.
    pub fn reject_all(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).clone()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait::async_trait]
impl ShortRangeLink for RecordingLink {
    fn mtu(&self) -> usize {
        self.mtu
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(MonitorError::transport("link rejected frame"));
        }
        if frame.len() > self.mtu {
            return Err(MonitorError::transport(format!(
                "frame of {} bytes exceeds MTU {}",
                frame.len(),
                self.mtu
            )));
        }
        lock(&self.sent).push(frame.to_vec());
        Ok(())
    }
}

/// [`SampleSource`] that replays a fixed waveform in a loop.
#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    waveform: Arc<Vec<u16>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSampler {
    pub fn new(waveform: Vec<u16>) -> Self {
        Self { waveform: Arc::new(waveform), reads: Arc::default() }
    }

    /// A flat baseline with two peaks `rr_samples` apart per burst.
    pub fn two_peaks(baseline: u16, peak: u16, first: usize, rr_samples: usize) -> Self {
        let mut waveform = vec![baseline; crate::sample_buffer::BURST_LEN];
        waveform[first] = peak;
        waveform[first + rr_samples] = peak;
        Self::new(waveform)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SampleSource for ScriptedSampler {
    fn read(&mut self) -> u16 {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.waveform.is_empty() { 0 } else { self.waveform[n % self.waveform.len()] }
    }
}

#[derive(Debug, Default)]
struct NetLog {
    connects: Vec<SocketAddrV4>,
    sent: Vec<(SocketAddrV4, Vec<u8>)>,
    closes: usize,
}

/// In-memory [`NetTransport`].
///
/// All connections share one inbound feed driven by the paired
/// [`MemoryRemote`]. Pushing an empty chunk simulates a remote close.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    log: Arc<Mutex<NetLog>>,
    feed: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
    fail_connect: Arc<AtomicBool>,
    fail_send: Arc<AtomicBool>,
}

/// Remote end of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MemoryRemote {
    pub fn push(&self, bytes: &[u8]) {
        let _ = self.tx.send(bytes.to_vec());
    }

    pub fn close(&self) {
        let _ = self.tx.send(Vec::new());
    }
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryRemote) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            log: Arc::default(),
            feed: Arc::new(tokio::sync::Mutex::new(rx)),
            fail_connect: Arc::default(),
            fail_send: Arc::default(),
        };
        (transport, MemoryRemote { tx })
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> Vec<SocketAddrV4> {
        lock(&self.log).connects.clone()
    }

    pub fn sent(&self) -> Vec<(SocketAddrV4, Vec<u8>)> {
        lock(&self.log).sent.clone()
    }

    pub fn closes(&self) -> usize {
        lock(&self.log).closes
    }
}

#[async_trait::async_trait]
impl NetTransport for MemoryTransport {
    async fn connect(&self, addr: SocketAddrV4) -> Result<Box<dyn NetConnection>> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(MonitorError::transport(format!("connect to {addr} refused")));
        }
        lock(&self.log).connects.push(addr);
        Ok(Box::new(MemoryConnection { addr, transport: self.clone(), open: true }))
    }
}

struct MemoryConnection {
    addr: SocketAddrV4,
    transport: MemoryTransport,
    open: bool,
}

#[async_trait::async_trait]
impl NetConnection for MemoryConnection {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open || self.transport.fail_send.load(Ordering::SeqCst) {
            return Err(MonitorError::transport(format!("send to {} failed", self.addr)));
        }
        lock(&self.transport.log).sent.push((self.addr, bytes.to_vec()));
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut feed = self.transport.feed.lock().await;
        match feed.recv().await {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        if std::mem::take(&mut self.open) {
            lock(&self.transport.log).closes += 1;
        }
    }
}
