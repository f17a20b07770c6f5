use bytes::Bytes;
use nexdigi_transport::{MockTransport, TransportDriver, TransportEvent};

#[test]
fn reconnect_after_scripted_failure_then_flows_frames() {
    let mut transport = MockTransport::new();
    transport.fail_next_connect();

    assert!(transport.connect().is_err());
    transport.connect().expect("retry should succeed");

    transport.push_inbound(Bytes::from_static(b"packet-one"));
    transport.push_inbound(Bytes::from_static(b"packet-two"));

    let events = transport.poll();
    assert_eq!(
        events,
        vec![
            TransportEvent::Frame(Bytes::from_static(b"packet-one")),
            TransportEvent::Frame(Bytes::from_static(b"packet-two")),
        ]
    );

    transport.send(Bytes::from_static(b"outbound")).expect("send should succeed");
    assert_eq!(transport.sent_frames(), vec![Bytes::from_static(b"outbound")]);

    transport.disconnect("test teardown");
    assert!(transport.send(Bytes::from_static(b"dropped")).is_err());
}
