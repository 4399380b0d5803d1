//! Framing, heartbeats and mesh packets through the client pump.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use mtlink_client::mtlink_protocol::{
    from_radio, mesh_packet, to_radio, Data, FromRadio, MeshPacket, NodeReport, OversizePolicy, PortNum,
    ReportProgress, BROADCAST_ADDR, MAGIC,
};
use mtlink_client::{Client, ClientError, PacketHandler, PortPayload, TextMessage};

fn completed_reports(client: &mut Client<LoopbackTransport>, id: u32) -> Rc<RefCell<Vec<ReportProgress>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    client
        .request_report_with_id(id, move |_: Option<&NodeReport>, progress: ReportProgress| {
            if progress.is_terminal() {
                sink.borrow_mut().push(progress);
            }
        })
        .unwrap();
    log
}

// ============================================================================
// Framing
// ============================================================================

#[test]
fn test_frame_split_across_reads() {
    let (transport, wire) = LoopbackTransport::new();
    let mut client = Client::new(test_config(), transport.with_chunk(1));
    let done = completed_reports(&mut client, 77);

    let bytes = frame(&config_complete(77));
    wire.borrow_mut().rx.extend(bytes.iter().copied());

    for _ in 0..bytes.len() - 1 {
        assert!(client.pump(t(0)).unwrap().progressed);
        assert!(done.borrow().is_empty());
    }
    client.pump(t(0)).unwrap();
    assert_eq!(*done.borrow(), vec![ReportProgress::Done]);
}

#[test]
fn test_bad_magic_discards_buffer() {
    let (mut client, wire) = loopback_client();
    let done = completed_reports(&mut client, 77);

    wire.borrow_mut().rx.extend([0x00, 0x01, 0x02, 0x03, 0x04]);
    pump_until_idle(&mut client, t(0));
    assert!(done.borrow().is_empty());

    push(&wire, &config_complete(77));
    pump_until_idle(&mut client, t(1));
    assert_eq!(*done.borrow(), vec![ReportProgress::Done]);
}

#[test]
fn test_undecodable_frame_is_skipped() {
    let (mut client, wire) = loopback_client();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    client
        .request_report_with_id(9, move |report: Option<&NodeReport>, progress: ReportProgress| {
            sink.borrow_mut().push((report.map(|r| r.node_num), progress));
        })
        .unwrap();

    // Field 2 claims 127 bytes that never follow.
    wire.borrow_mut().rx.extend(raw_frame(&[0x12, 0x7f]));
    client.pump(t(0)).unwrap();
    assert!(log.borrow().is_empty());

    push(&wire, &node_info(7, "After", 1));
    push(&wire, &config_complete(9));
    pump_until_idle(&mut client, t(1));
    assert_eq!(
        *log.borrow(),
        vec![(Some(7), ReportProgress::InProgress), (None, ReportProgress::Done)]
    );
}

#[test]
fn test_oversize_header_with_resync() {
    let (transport, wire) = LoopbackTransport::new();
    let config = test_config().with_oversize_policy(OversizePolicy::Resync);
    let mut client = Client::new(config, transport);
    let done = completed_reports(&mut client, 77);

    wire.borrow_mut().rx.extend([MAGIC[0], MAGIC[1], 0x02, 0x58]);
    pump_until_idle(&mut client, t(0));

    push(&wire, &config_complete(77));
    pump_until_idle(&mut client, t(1));
    assert_eq!(*done.borrow(), vec![ReportProgress::Done]);
}

#[test]
fn test_oversize_header_stalls_by_default() {
    let (mut client, wire) = loopback_client();
    let done = completed_reports(&mut client, 77);

    wire.borrow_mut().rx.extend([MAGIC[0], MAGIC[1], 0x02, 0x58]);
    push(&wire, &config_complete(77));

    client.pump(t(0)).unwrap();
    let tick = client.pump(t(1)).unwrap();
    assert!(tick.link_up);
    assert!(!tick.progressed);
    assert!(done.borrow().is_empty());
    assert_eq!(client.stalled_frame(), Some(0x0258));
}

#[test]
fn test_unknown_variant_is_skipped() {
    let (mut client, wire) = loopback_client();
    let done = completed_reports(&mut client, 77);

    push(&wire, &FromRadio::new(from_radio::PayloadVariant::QueueStatus(vec![1, 2, 3])));
    push(&wire, &FromRadio::new(from_radio::PayloadVariant::LogRecord(vec![4, 5])));
    push(&wire, &config_complete(77));
    pump_until_idle(&mut client, t(0));

    assert_eq!(*done.borrow(), vec![ReportProgress::Done]);
    // Only the request itself went out.
    assert_eq!(sent_count(&wire), 1);
}

#[test]
fn test_one_frame_per_pump() {
    let (mut client, wire) = loopback_client();
    let done = completed_reports(&mut client, 77);

    push(&wire, &node_info(0x10, "A", 1));
    push(&wire, &config_complete(77));

    client.pump(t(0)).unwrap();
    assert!(done.borrow().is_empty());
    client.pump(t(0)).unwrap();
    assert_eq!(*done.borrow(), vec![ReportProgress::Done]);
    assert!(!client.pump(t(0)).unwrap().progressed);
}

// ============================================================================
// Heartbeats
// ============================================================================

#[test]
fn test_heartbeat_schedule() {
    let (transport, wire) = LoopbackTransport::new();
    let mut client = Client::new(test_config(), transport.with_heartbeat());

    client.pump(t(0)).unwrap();
    client.pump(t(59_999)).unwrap();
    assert_eq!(sent_count(&wire), 0);

    client.pump(t(60_000)).unwrap();
    assert_eq!(sent_count(&wire), 1);
    assert!(matches!(
        sent_message(&wire, 0).payload_variant,
        Some(to_radio::PayloadVariant::Heartbeat(_))
    ));

    client.pump(t(60_001)).unwrap();
    client.pump(t(119_999)).unwrap();
    assert_eq!(sent_count(&wire), 1);

    client.pump(t(120_000)).unwrap();
    assert_eq!(sent_count(&wire), 2);
}

#[test]
fn test_no_heartbeat_when_not_wanted() {
    let (mut client, wire) = loopback_client();
    client.pump(t(60_000)).unwrap();
    client.pump(t(600_000)).unwrap();
    assert_eq!(sent_count(&wire), 0);
}

// ============================================================================
// Mesh packets
// ============================================================================

#[derive(Default)]
struct Inbox {
    texts: Vec<TextMessage>,
    payloads: Vec<PortPayload>,
}

struct SharedInbox(Rc<RefCell<Inbox>>);

impl PacketHandler for SharedInbox {
    fn on_text_message(&mut self, message: &TextMessage) {
        self.0.borrow_mut().texts.push(message.clone());
    }

    fn on_port_payload(&mut self, payload: &PortPayload) {
        self.0.borrow_mut().payloads.push(payload.clone());
    }
}

fn packet(from: u32, port: PortNum, payload: &[u8]) -> FromRadio {
    FromRadio::new(from_radio::PayloadVariant::Packet(MeshPacket {
        from,
        to: BROADCAST_ADDR,
        id: 9,
        payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
            portnum: port as i32,
            payload: payload.to_vec(),
            ..Default::default()
        })),
        ..Default::default()
    }))
}

#[test]
fn test_packets_reach_handler() {
    let (mut client, wire) = loopback_client();
    let inbox = Rc::new(RefCell::new(Inbox::default()));

    // No handler yet: dropped.
    push(&wire, &packet(0x42, PortNum::TextMessageApp, b"lost"));
    pump_until_idle(&mut client, t(0));

    client.set_packet_handler(SharedInbox(inbox.clone()));
    push(&wire, &packet(0x42, PortNum::TextMessageApp, b"hello"));
    push(&wire, &packet(0x43, PortNum::TelemetryApp, &[1, 2]));
    pump_until_idle(&mut client, t(1));

    let inbox_ref = inbox.borrow();
    assert_eq!(inbox_ref.texts.len(), 1);
    assert_eq!(inbox_ref.texts[0].text, "hello");
    assert_eq!(inbox_ref.texts[0].header.from, 0x42);
    assert_eq!(inbox_ref.payloads.len(), 1);
    assert_eq!(inbox_ref.payloads[0].port_num(), Some(PortNum::TelemetryApp));
    drop(inbox_ref);

    client.clear_packet_handler();
    push(&wire, &packet(0x42, PortNum::TextMessageApp, b"again"));
    pump_until_idle(&mut client, t(2));
    assert_eq!(inbox.borrow().texts.len(), 1);
}

#[test]
fn test_send_text() {
    let (mut client, wire) = loopback_client();
    let id = client.send_text("hi there", BROADCAST_ADDR, 2).unwrap();

    let sent = sent_message(&wire, 0);
    let Some(to_radio::PayloadVariant::Packet(packet)) = sent.payload_variant else {
        panic!("expected a packet");
    };
    assert_eq!(packet.id, id);
    assert_eq!(packet.to, BROADCAST_ADDR);
    assert_eq!(packet.channel, 2);
    assert!(packet.want_ack);
    match packet.payload_variant {
        Some(mesh_packet::PayloadVariant::Decoded(data)) => {
            assert_eq!(data.portnum, PortNum::TextMessageApp as i32);
            assert_eq!(data.payload, b"hi there");
        }
        other => panic!("unexpected payload {:?}", other),
    }

    let err = client.send_app_data(PortNum::PrivateApp, vec![0; 300], 1, 0).unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)));
    assert_eq!(sent_count(&wire), 1);
}
