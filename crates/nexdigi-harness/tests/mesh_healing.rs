//! End-to-end mesh-healing scenario: a diamond topology loses its shortest
//! link and reroutes application data over the surviving path without the
//! sender ever learning about the failure directly.

use nexdigi_backbone::SendOutcome;
use nexdigi_core::Priority;
use nexdigi_harness::MeshCluster;
use nexdigi_proto::Payload;

fn diamond() -> (MeshCluster, nexdigi_proto::Callsign, nexdigi_proto::Callsign, nexdigi_proto::Callsign, nexdigi_proto::Callsign) {
    let mut cluster = MeshCluster::new();
    let a = cluster.add_node("NODEA").unwrap();
    let b = cluster.add_node("NODEB").unwrap();
    let c = cluster.add_node("NODEC").unwrap();
    let d = cluster.add_node("NODED").unwrap();

    cluster.link(&a, &b, 1).unwrap();
    cluster.link(&b, &c, 1).unwrap();
    cluster.link(&a, &d, 1).unwrap();
    cluster.link(&d, &c, 1).unwrap();

    for (x, y) in [(&a, &b), (&b, &c), (&a, &d), (&d, &c)] {
        cluster.node(x).unwrap().authenticate(y);
        cluster.node(y).unwrap().authenticate(x);
    }

    (cluster, a, b, c, d)
}

#[test]
fn diamond_topology_delivers_via_shortest_path() {
    let (mut cluster, a, _b, c, _d) = diamond();

    cluster.settle(10);

    let outcome = cluster.send_data(&a, &c, Payload::Text("hello".to_owned()), Priority::Normal);
    assert_eq!(outcome, Some(SendOutcome::Ok));

    let delivered = cluster.settle(5);
    assert!(delivered.iter().any(|(to, data)| *to == c && data.payload == Payload::Text("hello".to_owned())));
}

#[test]
fn neighbor_failure_reroutes_via_surviving_path() {
    let (mut cluster, a, b, c, _d) = diamond();

    cluster.settle(10);
    assert_eq!(cluster.send_data(&a, &c, Payload::Text("before".to_owned()), Priority::Normal), Some(SendOutcome::Ok));
    cluster.settle(3);

    cluster.sever(&a, &b, &[c.clone()]).unwrap();

    // Give route discovery enough rounds to flood, reply, and settle.
    cluster.settle(15);

    let outcome = cluster.send_data(&a, &c, Payload::Text("after".to_owned()), Priority::Normal);
    assert_eq!(outcome, Some(SendOutcome::Ok));

    let delivered = cluster.settle(5);
    assert!(delivered.iter().any(|(to, data)| *to == c && data.payload == Payload::Text("after".to_owned())));
}

#[test]
fn unknown_neighbor_sever_is_reported() {
    let mut cluster = MeshCluster::new();
    let a = cluster.add_node("NODEA").unwrap();
    let b = cluster.add_node("NODEB").unwrap();

    assert!(cluster.sever(&a, &b, &[]).is_err());
}
