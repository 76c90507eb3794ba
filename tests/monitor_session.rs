//! End-to-end session against the public monitor API

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use heartlink::protocol::{Instruction, Message, WifiCredentials, unpack};
use heartlink::{
    Credentials, DriverEvent, Drivers, Label, Monitor, MonitorConfig, MonitorHandle, RadioDriver, Result,
    SampleSource, ShortRangeLink, TcpTransport, TrainingPoint, TrainingSet,
};
use tokio::sync::mpsc;

/// Forwards every outbound frame to the test.
struct ChannelLink(mpsc::UnboundedSender<Vec<u8>>);

#[async_trait::async_trait]
impl ShortRangeLink for ChannelLink {
    fn mtu(&self) -> usize {
        heartlink::protocol::MAX_FRAME_SIZE
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let _ = self.0.send(frame.to_vec());
        Ok(())
    }
}

/// Associates immediately with a fixed address.
struct InstantRadio(mpsc::UnboundedSender<DriverEvent>);

impl RadioDriver for InstantRadio {
    fn init(&mut self, _hostname: &str) -> Result<()> {
        Ok(())
    }
    fn configure(&mut self, _credentials: &Credentials) -> Result<()> {
        Ok(())
    }
    fn start(&mut self) -> Result<()> {
        Ok(())
    }
    fn associate(&mut self) -> Result<()> {
        let _ = self.0.send(DriverEvent::Associated(0x0A00_0009));
        Ok(())
    }
    fn disconnect(&mut self) -> Result<()> {
        let _ = self.0.send(DriverEvent::LinkLost);
        Ok(())
    }
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
    fn deinit(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Baseline with a ventricular-looking beat pair in every burst.
struct Heart(usize);

impl SampleSource for Heart {
    fn read(&mut self) -> u16 {
        let n = self.0 % 256;
        self.0 += 1;
        if n == 30 || n == 150 { 3500 } else { 1700 }
    }
}

fn training_set() -> TrainingSet {
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

fn spawn() -> (MonitorHandle, mpsc::UnboundedReceiver<Vec<u8>>) {
    let _ = tracing_subscriber::fmt::try_init();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (events_tx, radio_events) = mpsc::unbounded_channel();
    let handle = Monitor::spawn(
        MonitorConfig::default(),
        Drivers {
            short_range: ChannelLink(frames_tx),
            radio: InstantRadio(events_tx),
            radio_events,
            net: Arc::new(TcpTransport::default()),
            sampler: Heart(0),
        },
    )
    .unwrap();
    (handle, frames_rx)
}

async fn send(handle: &MonitorHandle, message: Message) {
    let frame = message.to_frame();
    for write in frame.as_bytes().chunks(128) {
        handle.ingress().deliver(write).await.unwrap();
    }
}

async fn next_message(frames: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Message {
    let bytes = tokio::time::timeout(Duration::from_secs(5), frames.recv()).await.unwrap().unwrap();
    unpack(&bytes).unwrap()
}

#[tokio::test(start_paused = true)]
async fn paired_client_receives_classified_beats() {
    let (handle, mut frames) = spawn();
    handle.ingress().connected();
    send(&handle, Message::TrainingSet(training_set())).await;
    send(&handle, Message::Instruction(Instruction::SamplingStart.code())).await;

    // 120 samples of 10 ms between peaks
    let Message::SampleObservation(obs) = next_message(&mut frames).await else {
        panic!("expected an observation");
    };
    assert_eq!(obs.label, Label::Ventricular);
    assert_eq!(obs.amplitude, 3500);
    assert_eq!(obs.period, 1200);

    send(&handle, Message::Instruction(Instruction::SamplingStop.code())).await;
    handle.shutdown().await;
}

#[tokio::test]
async fn wifi_enable_reports_connected_status() {
    let (handle, mut frames) = spawn();
    let mut updates = handle.status_updates();
    assert!(!updates.next().await.unwrap().wifi_connected());

    handle.ingress().connected();
    send(&handle, Message::WifiCredentials(WifiCredentials::new("ward-4", "secret"))).await;
    send(&handle, Message::Instruction(Instruction::WifiEnable.code())).await;

    let connected = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(status) = updates.next().await {
            if status.wifi_connected() {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(connected);

    let Message::Status { status, addr } = next_message(&mut frames).await else {
        panic!("expected status");
    };
    assert!(status.wifi_connected());
    assert_eq!(addr, 0x0A00_0009);
    handle.shutdown().await;
}

#[tokio::test]
async fn frames_queued_while_unpaired_flush_on_connect() {
    let (handle, mut frames) = spawn();
    send(&handle, Message::Instruction(Instruction::TelemetryEnable.code())).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(frames.try_recv().is_err());
    assert!(handle.status().telemetry_enabled());

    handle.ingress().connected();
    let Message::Status { status, .. } = next_message(&mut frames).await else {
        panic!("expected status");
    };
    assert!(status.telemetry_enabled());
    handle.shutdown().await;
}
