// End-to-end listener tests over loopback
//
// A plain UDP socket plays the part of a DoHome controller: it sends
// announcements and status echoes to the client's bound endpoints.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration};

use dohome_lan::{ClientConfig, ClientEvent, DoHomeClient, DoHomeError, EventReceiver, ListenerState};

const DEVICE_ID: &str = "286dcd00fb6c_DT-WYRGB_W600";

fn pong() -> String {
    format!(
        "cmd=pong&compandy_id=_DOIT&device_type=_DT-WYRGB&device_id={DEVICE_ID}\
         &device_key=abc123&device_name=Desk&host_ip=192.168.4.1&sta_ip=127.0.0.1&chip=W600"
    )
}

fn color_echo(red: u16) -> String {
    format!(
        r#"cmd=echo&dev={DEVICE_ID}&op={{"cmd":25,"r":{red},"g":0,"b":0,"w":0,"m":0}}"#
    )
}

async fn loopback_client() -> DoHomeClient {
    let config = ClientConfig::builder()
        .interfaces([Ipv4Addr::LOCALHOST])
        .command_port(0)
        .discovery_port(0)
        .broadcast_addr(Ipv4Addr::LOCALHOST)
        .settle_delay_ms(10)
        .build();
    DoHomeClient::bind(config).await.unwrap()
}

/// Next event that is not a listener state change.
async fn next_device_event(rx: &mut EventReceiver) -> ClientEvent {
    loop {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap();
        if !matches!(event, ClientEvent::ListenerStateChanged(_)) {
            return event;
        }
    }
}

/// Endpoints of the per-interface sockets, command socket first.
fn interface_endpoints(client: &DoHomeClient) -> Vec<SocketAddr> {
    client
        .local_endpoints()
        .into_iter()
        .filter(|e| !e.ip().is_unspecified())
        .collect()
}

async fn send_to_all(peer: &UdpSocket, endpoints: &[SocketAddr], data: &str) {
    for endpoint in endpoints {
        peer.send_to(data.as_bytes(), endpoint).await.unwrap();
    }
}

#[tokio::test]
async fn test_invalid_interval_leaves_listener_stopped() {
    let client = loopback_client().await;
    let err = client.start_listener(300, 0).await.unwrap_err();
    assert!(matches!(err, DoHomeError::InvalidInterval { .. }));
    assert_eq!(client.listener_state(), ListenerState::Stopped);
}

#[tokio::test]
async fn test_discovery_and_color_echo() {
    let client = loopback_client().await;
    let mut events = client.subscribe();
    let endpoints = interface_endpoints(&client);

    client.start_listener(0, 0).await.unwrap();
    assert_eq!(client.listener_state(), ListenerState::Running);
    assert_eq!(client.timer_units().await, 0);

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // The same announcement on every socket registers one device
    send_to_all(&peer, &endpoints, &pong()).await;
    match next_device_event(&mut events).await {
        ClientEvent::DeviceDiscovered(device) => {
            assert_eq!(device.device_id(), DEVICE_ID);
            assert_eq!(device.short_id(), "fb6c");
        }
        other => panic!("expected discovery, got {other:?}"),
    }

    send_to_all(&peer, &endpoints[..1], &color_echo(4000)).await;
    match next_device_event(&mut events).await {
        ClientEvent::ColorChanged { device, old, new } => {
            assert_eq!(device.device_id(), DEVICE_ID);
            assert_eq!(old, None);
            assert_eq!(new.red(), 4000);
        }
        other => panic!("expected color change, got {other:?}"),
    }
    assert_eq!(client.devices().await.len(), 1);

    let device = client.device(DEVICE_ID).await.unwrap();
    assert_eq!(device.last_known_color().await.map(|c| c.red()), Some(4000));

    client.stop_listener().await;
    timeout(Duration::from_secs(2), client.wait_until_stopped())
        .await
        .unwrap();
    assert_eq!(client.listener_state(), ListenerState::Stopped);
}

#[tokio::test]
async fn test_stopped_listener_ignores_traffic_and_restarts() {
    let client = loopback_client().await;
    let endpoints = interface_endpoints(&client);
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.start_listener(0, 0).await.unwrap();
    client.stop_listener().await;
    timeout(Duration::from_secs(2), client.wait_until_stopped())
        .await
        .unwrap();

    // Stopping again is a no-op
    client.stop_listener().await;
    assert_eq!(client.listener_state(), ListenerState::Stopped);

    // Nothing reads the sockets while stopped
    send_to_all(&peer, &endpoints[1..], "cmd=pong&garbage").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.devices().await.is_empty());

    client.start_listener(0, 0).await.unwrap();
    let mut events = client.subscribe();
    send_to_all(&peer, &endpoints, &pong()).await;
    assert!(matches!(
        next_device_event(&mut events).await,
        ClientEvent::DeviceDiscovered(_)
    ));

    client.stop_listener().await;
    timeout(Duration::from_secs(2), client.wait_until_stopped())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_broadcast_announcement_discovered() {
    let client = loopback_client().await;
    let mut events = client.subscribe();
    let discovery_port = interface_endpoints(&client)[1].port();
    client.start_listener(0, 0).await.unwrap();

    // 127.255.255.255 is the loopback broadcast address on Linux. Sockets
    // bound to 127.0.0.1 never see it, only the wildcard receivers do.
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    peer.set_broadcast(true).unwrap();
    let target = SocketAddrV4::new(Ipv4Addr::new(127, 255, 255, 255), discovery_port);
    peer.send_to(pong().as_bytes(), target).await.unwrap();

    match next_device_event(&mut events).await {
        ClientEvent::DeviceDiscovered(device) => assert_eq!(device.device_id(), DEVICE_ID),
        other => panic!("expected discovery, got {other:?}"),
    }

    client.stop_listener().await;
    timeout(Duration::from_secs(2), client.wait_until_stopped())
        .await
        .unwrap();
}
