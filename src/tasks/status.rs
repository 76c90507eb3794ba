//! Status report to the paired client

use tracing::{debug, error};

use crate::bus::EventBus;
use crate::ipc::IpcSender;
use crate::protocol::Message;
use crate::shared::SharedState;
use crate::types::flag_groups::ble;

/// Queue a `Status` frame for the short-range link and ask it to send.
///
/// Enqueue failures are logged under `task` and otherwise ignored.
pub async fn dispatch_status(
    task: &'static str,
    shared: &SharedState,
    outbound: &IpcSender,
    bus: &EventBus,
) {
    let status = shared.status();
    let addr = shared.lan_addr();
    let frame = Message::Status { status, addr }.to_frame();

    if let Err(e) = outbound.enqueue(0, frame.as_bytes()).await {
        error!(task, kind = e.kind(), error = %e, "Couldn't enqueue status message");
    } else {
        debug!(task, status = status.value(), addr, "Status queued");
    }
    bus.set(ble::SEND_MSG);
}
