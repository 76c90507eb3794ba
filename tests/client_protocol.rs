//! Wire protocol as seen by the paired client
//!
//! The client writes settings in MTU-sized pieces, interleaves them with
//! instructions, and parses the status and observation frames coming back.

use heartlink::protocol::{
    Configuration, FrameAssembler, HEADER_SIZE, Instruction, MAX_FRAME_SIZE, Message, MessageKind,
    SampleObservation, StreamTarget, TelemetryTarget, WifiCredentials, frame_len, pack, unpack,
};
use heartlink::{CodecError, Comparator, DetectorConfig, Label, StatusBits, TrainingPoint, TrainingSet};
use std::net::Ipv4Addr;

const WRITE_SIZE: usize = 128;

fn session() -> Vec<Message> {
    let mut set = TrainingSet::default();
    set.normal[0] = TrainingPoint::new(2600, 800);
    set.atrial[0] = TrainingPoint::new(2000, 400);
    set.ventricular[0] = TrainingPoint::new(3500, 1200);

    vec![
        Message::WifiCredentials(WifiCredentials::new("ward-4", "correct horse")),
        Message::StreamTarget(StreamTarget::new(Ipv4Addr::new(192, 168, 1, 20), 8080, "ekg/live")),
        Message::TelemetryTarget(TelemetryTarget::new(Ipv4Addr::new(192, 168, 1, 21), 9000)),
        Message::TrainingSet(set),
        Message::Configuration(DetectorConfig { threshold: 930, comparator: Comparator::Below }.into()),
        Message::Instruction(Instruction::WifiEnable.code()),
        Message::Instruction(Instruction::SamplingStart.code()),
    ]
}

// Each message becomes its own sequence of writes, the way a client using
// write-without-response would send it.
fn writes(messages: &[Message]) -> Vec<Vec<u8>> {
    messages
        .iter()
        .flat_map(|m| {
            let frame = m.to_frame();
            frame.as_bytes().chunks(WRITE_SIZE).map(<[u8]>::to_vec).collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn a_full_session_decodes_in_order() {
    let messages = session();
    let mut assembler = FrameAssembler::new();
    let mut decoded = Vec::new();
    for write in writes(&messages) {
        assembler.push(&write, |r| decoded.push(r));
    }

    let decoded: Vec<Message> = decoded.into_iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(decoded, messages);
    assert_eq!(assembler.pending(), 0);
}

#[test]
fn line_noise_costs_only_the_damaged_frame() {
    let messages = session();
    let mut all = writes(&messages);
    // Corrupt the marker of the stream target frame
    all[1][0] = 0x00;

    let mut assembler = FrameAssembler::new();
    let mut decoded = Vec::new();
    for write in &all {
        assembler.push(write, |r| decoded.push(r));
    }

    assert!(matches!(decoded[1], Err(CodecError::BadMarker { .. })));
    let good: Vec<_> = decoded.into_iter().filter_map(Result::ok).collect();
    assert!(!good.iter().any(|m| m.kind() == MessageKind::StreamTarget));
    assert_eq!(good.len(), messages.len() - 1);
    assert_eq!(good.last(), messages.last());
}

#[test]
fn device_frames_parse_with_fixed_lengths() {
    let mut buf = [0u8; MAX_FRAME_SIZE];
    let status = Message::Status {
        status: StatusBits::new(StatusBits::WIFI_CONNECTED | StatusBits::RELAY_ENABLED),
        addr: u32::from(Ipv4Addr::new(10, 0, 0, 7)),
    };
    let len = pack(&status, &mut buf);
    assert_eq!(len, HEADER_SIZE + MessageKind::Status.body_size());
    assert_eq!(frame_len(&buf[..len]), Some(len));

    let Ok(Message::Status { status, addr }) = unpack(&buf[..len]) else {
        panic!("expected status");
    };
    assert!(status.wifi_connected() && status.relay_enabled());
    assert!(!status.stream_enabled());
    assert_eq!(Ipv4Addr::from(addr), Ipv4Addr::new(10, 0, 0, 7));

    let observation =
        Message::SampleObservation(SampleObservation { label: Label::Atrial, amplitude: 2010, period: 405 });
    let frame = observation.to_frame();
    assert_eq!(frame.as_bytes(), &[0xFF, 0xFF, 5, 2, 0xDA, 0x07, 0x95, 0x01]);
}

#[test]
fn unknown_comparator_is_carried_but_not_applied() {
    let frame = Message::Configuration(Configuration { comparator: 7, threshold: 100 }).to_frame();
    let Ok(Message::Configuration(config)) = unpack(frame.as_bytes()) else {
        panic!("expected configuration");
    };
    assert_eq!(config.comparator, 7);
    assert_eq!(config.detector_config(), None);
}

#[test]
fn every_instruction_code_is_accepted() {
    for instruction in Instruction::ALL {
        let frame = Message::Instruction(instruction.code()).to_frame();
        let Ok(Message::Instruction(code)) = unpack(frame.as_bytes()) else {
            panic!("expected instruction");
        };
        assert_eq!(Instruction::try_from(code).unwrap(), instruction);
    }
    assert!(Instruction::try_from(Instruction::ALL.len() as u8).is_err());
}
