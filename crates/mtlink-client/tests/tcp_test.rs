//! The TCP transport against a local socket standing in for the radio.

mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use common::{config_complete, frame, node_info};
use mtlink_client::mtlink_protocol::{to_radio, NodeReport, ReportProgress, ToRadio, HEADER_SIZE, MAGIC};
use mtlink_client::transport::TcpTransport;
use mtlink_client::{Client, ClientConfig, MonotonicClock, Transport};
use prost::Message;

/// Read one frame from a blocking stream.
fn read_frame(stream: &mut impl Read) -> ToRadio {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).unwrap();
    assert_eq!(header[..2], MAGIC);
    let len = u16::from_be_bytes([header[2], header[3]]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).unwrap();
    ToRadio::decode(payload.as_slice()).unwrap()
}

#[test]
fn test_report_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let radio = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let request = read_frame(&mut stream);
        let Some(to_radio::PayloadVariant::WantConfigId(id)) = request.payload_variant else {
            panic!("expected a report request");
        };
        let mut reply = frame(&node_info(0xCAFE, "Radio", 1));
        reply.extend(frame(&config_complete(id)));
        stream.write_all(&reply).unwrap();
        id
    });

    let config = ClientConfig::default().with_name("tcp").with_seed(3);
    let transport = TcpTransport::new("127.0.0.1", port, 2_000, 65_000);
    let mut client = Client::new(config, transport);
    let clock = MonotonicClock::new();
    let deadline = Instant::now() + Duration::from_secs(5);

    while !client.pump(clock.now()).unwrap().link_up {
        assert!(Instant::now() < deadline, "link never came up");
        thread::sleep(client.idle_pause());
    }

    let nodes = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = nodes.clone();
    let id = client
        .request_report(move |node: Option<&NodeReport>, progress: ReportProgress| {
            sink.borrow_mut().push((node.map(|n| n.node_num), progress));
        })
        .unwrap();

    while client.is_report_pending() {
        assert!(Instant::now() < deadline, "report never completed");
        if !client.pump(clock.now()).unwrap().progressed {
            thread::sleep(client.idle_pause());
        }
    }

    assert_eq!(radio.join().unwrap(), id);
    assert_eq!(
        *nodes.borrow(),
        vec![
            (Some(0xCAFE), ReportProgress::InProgress),
            (None, ReportProgress::Done)
        ]
    );
}

#[test]
fn test_connection_refused_retries_later() {
    // Bind then drop to get a port nobody listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut transport = TcpTransport::new("127.0.0.1", port, 10_000, 65_000);
    let t = mtlink_client::Timestamp::from_millis;

    assert!(!transport.connect(t(0)).unwrap());
    assert!(!transport.connect(t(1)).unwrap());
    assert_eq!(transport.lifecycle().next_attempt_at(), t(10_001));
    assert_eq!(transport.lifecycle().attempts(), 1);

    assert!(!transport.connect(t(10_001)).unwrap());
    assert_eq!(transport.lifecycle().attempts(), 2);
}

#[test]
fn test_send_opens_stream_once() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    listener.set_nonblocking(true).unwrap();

    let mut transport = TcpTransport::new("127.0.0.1", port, 2_000, 65_000);
    let t = mtlink_client::Timestamp::from_millis;

    let frame = [MAGIC[0], MAGIC[1], 0x00, 0x00];
    assert_eq!(transport.write(&frame).unwrap(), frame.len());
    assert!(transport.is_connected());

    // Polling afterwards must keep the stream the send opened.
    assert!(transport.connect(t(0)).unwrap());
    assert!(transport.connect(t(1)).unwrap());

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut accepted = 0;
    while Instant::now() < deadline {
        match listener.accept() {
            Ok(_) => accepted += 1,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if accepted > 0 {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => panic!("accept failed: {}", e),
        }
    }
    assert_eq!(accepted, 1);
}
