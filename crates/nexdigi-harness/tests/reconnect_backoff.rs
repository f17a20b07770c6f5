//! Deterministic reconnect-with-backoff test for the KISS-over-TCP
//! transport, run under `turmoil`'s simulated network so the scenario is
//! reproducible rather than timing-sensitive.

use std::time::Duration;

use nexdigi_core::SystemEnvironment;
use nexdigi_transport::{ConnectionStatus, TransportDriver, TransportEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::TcpListener;

use nexdigi_harness::SimTcpKissTransport;

async fn wait_for_status(
    transport: &mut SimTcpKissTransport,
    target: impl Fn(&ConnectionStatus) -> bool,
    deadline: Duration,
) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        for event in transport.poll() {
            if let TransportEvent::Frame(_) = event {
                continue;
            }
        }
        if target(&transport.status()) {
            return true;
        }
        if start.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[test]
fn connects_once_tnc_becomes_reachable() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("tnc", || async {
        // The TNC only starts listening after the client has already tried
        // and failed at least once, forcing the backoff path.
        tokio::time::sleep(Duration::from_secs(3)).await;
        let listener = TcpListener::bind("0.0.0.0:8001").await?;
        let (mut stream, _addr) = listener.accept().await?;

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await?;
        stream.write_all(&buf[..n]).await?;

        Ok(())
    });

    sim.client("node", async {
        let mut transport = SimTcpKissTransport::new("tnc:8001");
        transport.spawn(SystemEnvironment);
        transport.connect().unwrap();

        let connected = wait_for_status(
            &mut transport,
            |status| matches!(status, ConnectionStatus::Connected),
            Duration::from_secs(20),
        )
        .await;
        assert!(connected, "transport never reached the Connected state");

        transport.send(bytes::Bytes::from_static(b"ping")).unwrap();

        let echoed = wait_for_status(
            &mut transport,
            |_| false, // keep polling until the deadline so the echoed frame is drained
            Duration::from_secs(2),
        )
        .await;
        assert!(!echoed);

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn reconnects_after_tnc_drops_the_connection() {
    let mut sim = turmoil::Builder::new().build();

    sim.host("tnc", || async {
        let listener = TcpListener::bind("0.0.0.0:8001").await?;

        // First connection: accept, then drop immediately to simulate a
        // radio link bounce.
        let (stream, _addr) = listener.accept().await?;
        drop(stream);

        // Second connection: accept and hold it open so the reconnect can
        // be observed as successful.
        let (_stream, _addr) = listener.accept().await?;
        tokio::time::sleep(Duration::from_secs(10)).await;

        Ok(())
    });

    sim.client("node", async {
        let mut transport = SimTcpKissTransport::new("tnc:8001");
        transport.spawn(SystemEnvironment);
        transport.connect().unwrap();

        let first_connect = wait_for_status(
            &mut transport,
            |status| matches!(status, ConnectionStatus::Connected),
            Duration::from_secs(10),
        )
        .await;
        assert!(first_connect, "initial connect never completed");

        let disconnected = wait_for_status(
            &mut transport,
            |status| matches!(status, ConnectionStatus::Disconnected { .. }),
            Duration::from_secs(10),
        )
        .await;
        assert!(disconnected, "transport never observed the TNC dropping the link");

        let reconnected = wait_for_status(
            &mut transport,
            |status| matches!(status, ConnectionStatus::Connected),
            Duration::from_secs(20),
        )
        .await;
        assert!(reconnected, "transport never reconnected under backoff");

        Ok(())
    });

    sim.run().expect("simulation failed");
}
