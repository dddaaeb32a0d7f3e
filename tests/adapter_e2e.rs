//! End-to-end exercise of the adapter stack over loopback sockets:
//! explicit messaging through the real server, Forward_Open installing
//! runtime entries, cyclic ingress feeding an assembly, and watchdog
//! expiry.

use bytes::{BufMut, BytesMut};
use eipkit_cip::{class, EPath, MessageRouter, MessageRouterRequest};
use eipkit_client::Client;
use eipkit_io::{
    ConnectionManager, ForwardCloseRequest, ForwardOpenRequest, ForwardOpenResponse, IoRuntime,
    Watchdog,
};
use eipkit_objects::AssemblyObject;
use eipkit_server::{Server, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

struct Adapter {
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    runtime: Arc<IoRuntime>,
    assemblies: Arc<AssemblyObject>,
}

async fn spawn_adapter() -> Adapter {
    let assemblies = Arc::new(AssemblyObject::new());
    assemblies.register(100, 4).write(&[1, 2, 3, 4]).unwrap();
    assemblies.register(150, 4);

    let runtime = IoRuntime::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let connmgr = Arc::new(ConnectionManager::new(
        Arc::clone(&runtime),
        Arc::clone(&assemblies),
    ));

    let router = Arc::new(MessageRouter::new());
    router.register(class::ASSEMBLY, Arc::clone(&assemblies) as Arc<dyn eipkit_cip::CipObject>);
    router.register(class::CONNECTION_MANAGER, connmgr);

    let server = Arc::new(
        Server::bind(ServerConfig::new("127.0.0.1:0".parse().unwrap()), router)
            .await
            .unwrap(),
    );
    let tcp_addr = server.local_addr().unwrap();
    let udp_addr = runtime.local_addr().unwrap();

    tokio::spawn(IoRuntime::run_receiver(Arc::clone(&runtime)));
    tokio::spawn(async move { server.run().await });

    Adapter {
        tcp_addr,
        udp_addr,
        runtime,
        assemblies,
    }
}

fn forward_open(serial: u16) -> ForwardOpenRequest {
    ForwardOpenRequest {
        priority_time_tick: 0x0A,
        timeout_ticks: 249,
        ot_connection_id: 0x1000_0001,
        to_connection_id: 0,
        connection_serial: serial,
        vendor_id: 0x1337,
        originator_serial: 5678,
        timeout_mult: 0,
        ot_rpi: 10_000,
        ot_net_params: 0x4200 | 10,
        to_rpi: 10_000,
        to_net_params: 0x4200 | 10,
        transport_trigger: 0x01,
        path: vec![0x20, 0x04, 0x24, 0x96, 0x2C, 0x64],
        large: false,
    }
}

#[tokio::test]
async fn test_explicit_read_through_server() {
    let adapter = spawn_adapter().await;
    let mut client = Client::connect(&adapter.tcp_addr.to_string()).await.unwrap();

    let data = client.get_attribute(class::ASSEMBLY, 100, 3).await.unwrap();
    assert_eq!(data.as_ref(), &[1, 2, 3, 4]);

    client.set_attribute(class::ASSEMBLY, 150, 3, &[9, 9, 9, 9]).await.unwrap();
    assert_eq!(adapter.assemblies.instance(150).unwrap().read(), vec![9, 9, 9, 9]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_forward_open_cyclic_ingress_and_close() {
    let adapter = spawn_adapter().await;
    let mut client = Client::connect(&adapter.tcp_addr.to_string()).await.unwrap();

    // Open: installs a consumer keyed by our O->T id and a producer under a
    // fresh T->O id.
    let open = forward_open(0x0001);
    let request = MessageRouterRequest::new(
        eipkit_cip::service::FORWARD_OPEN,
        EPath::to_object(class::CONNECTION_MANAGER, 1, 0),
        open.encode().freeze(),
    );
    let response = client.session().send_cip_request(&request).await.unwrap();
    response.cip_error().unwrap();
    let open_response = ForwardOpenResponse::decode(&response.data).unwrap();

    assert_eq!(open_response.ot_connection_id, 0x1000_0001);
    assert!(open_response.to_connection_id >= 0x8000_0000);
    assert!(adapter.runtime.contains(0x1000_0001));
    assert!(adapter.runtime.contains(open_response.to_connection_id));

    // Produce one O->T frame; the adapter applies it to assembly 150.
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut payload = BytesMut::new();
    payload.put_u16_le(1); // sequence
    payload.put_u32_le(1); // run
    payload.put_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let frame = eipkit_io::scheduler::build_io_frame(0x1000_0001, &payload);
    socket.send_to(&frame, adapter.udp_addr).await.unwrap();

    // Give the receiver task a moment to demux.
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if adapter.assemblies.instance(150).unwrap().read() == vec![0xDE, 0xAD, 0xBE, 0xEF] {
            break;
        }
    }
    assert_eq!(
        adapter.assemblies.instance(150).unwrap().read(),
        vec![0xDE, 0xAD, 0xBE, 0xEF]
    );

    // Close by triad; both entries disappear.
    let close = ForwardCloseRequest {
        priority_time_tick: 0x0A,
        timeout_ticks: 249,
        connection_serial: 0x0001,
        vendor_id: 0x1337,
        originator_serial: 5678,
        path: vec![0x20, 0x04, 0x24, 0x96, 0x2C, 0x64],
    };
    let request = MessageRouterRequest::new(
        eipkit_cip::service::FORWARD_CLOSE,
        EPath::to_object(class::CONNECTION_MANAGER, 1, 0),
        close.encode().freeze(),
    );
    let response = client.session().send_cip_request(&request).await.unwrap();
    response.cip_error().unwrap();
    assert!(!adapter.runtime.contains(0x1000_0001));
    assert!(!adapter.runtime.contains(open_response.to_connection_id));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_watchdog_expires_silent_consumer() {
    let adapter = spawn_adapter().await;
    let mut client = Client::connect(&adapter.tcp_addr.to_string()).await.unwrap();

    // RPI 10 ms, multiplier 0: a 40 ms silence budget.
    let open = forward_open(0x0002);
    let request = MessageRouterRequest::new(
        eipkit_cip::service::FORWARD_OPEN,
        EPath::to_object(class::CONNECTION_MANAGER, 1, 0),
        open.encode().freeze(),
    );
    client
        .session()
        .send_cip_request(&request)
        .await
        .unwrap()
        .cip_error()
        .unwrap();
    assert!(adapter.runtime.contains(0x1000_0001));

    let watchdog = Arc::new(Watchdog::new(Arc::clone(&adapter.runtime)));
    let handle = {
        let watchdog = Arc::clone(&watchdog);
        tokio::spawn(async move { watchdog.run().await })
    };

    // Never produce; the consumer entry must be gone within a few ticks.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!adapter.runtime.contains(0x1000_0001));

    watchdog.stop();
    let _ = handle.await;
}
