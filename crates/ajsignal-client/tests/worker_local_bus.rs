//! End-to-end: consumer and worker against a service on the local bus

use ajsignal_bus::{LocalAttachment, LocalBus};
use ajsignal_client::{BufferedOutput, ClientWorker, SignalConsumer, SIGNAL_SEPARATOR};
use ajsignal_core::{
    BusAttachment, ClientConfig, InterfaceDescription, Member, MsgArg, SessionPortListener,
    TransportMask,
};
use std::sync::Arc;
use std::time::Duration;

struct OpenPort;
impl SessionPortListener for OpenPort {}

fn sample_interface(att: &LocalAttachment, config: &ClientConfig) -> Arc<InterfaceDescription> {
    let mut iface = att.create_interface(&config.interface_name).unwrap();
    iface.add_signal("nameChanged", "s", "newName").unwrap();
    att.add_interface(iface).unwrap()
}

fn start_service(bus: &LocalBus, config: &ClientConfig) -> (LocalAttachment, Member) {
    let service = LocalAttachment::new(bus, "signalService");
    service.connect(&config.connect_spec).unwrap();
    let iface = sample_interface(&service, config);
    let member = iface.signal("nameChanged").unwrap().clone();
    service
        .register_bus_object(&config.object_path, vec![iface])
        .unwrap();
    service.request_name(&config.well_known_name).unwrap();
    service
        .bind_session_port(config.session_port, Arc::new(OpenPort))
        .unwrap();
    service
        .advertise_name(&config.well_known_name, TransportMask::TCP)
        .unwrap();
    (service, member)
}

#[tokio::test]
async fn test_discover_join_proxy_and_receive() {
    let config = ClientConfig::default();
    let bus = LocalBus::new();
    let (service, member) = start_service(&bus, &config);

    let client = Arc::new(LocalAttachment::new(&bus, config.application_name.clone()));
    client.connect(&config.connect_spec).unwrap();
    sample_interface(&client, &config);

    let (worker, actions) = ClientWorker::new(client.clone(), config.clone());
    let state = worker.state();
    let output = Arc::new(BufferedOutput::new());
    let consumer =
        SignalConsumer::attach(client.as_ref(), &config, Arc::new(actions), output.clone())
            .unwrap();
    let task = tokio::spawn(worker.run());

    client.find_advertised_name(&config.well_known_name).unwrap();

    let proxy = tokio::time::timeout(Duration::from_secs(5), state.wait_for_proxy())
        .await
        .expect("proxy should connect");
    assert_eq!(proxy.service_name, config.well_known_name);
    assert_eq!(proxy.path, "/");
    assert!(proxy.implements(&config.interface_name));
    assert_eq!(state.session_id(), Some(proxy.session_id));
    assert_eq!(bus.session_members(proxy.session_id).map(|m| m.len()), Some(2));

    let delivered = service
        .emit_signal(&member, "/", vec![MsgArg::from("Alice")], Some(proxy.session_id))
        .unwrap();
    assert_eq!(delivered, 1);

    let lines = output.lines();
    assert_eq!(lines[0], "Signal Handler and event have been registered.");
    assert_eq!(
        lines[1],
        "Found Advertised well-known name (name=org.alljoyn.Bus.signal_sample\ttransport=4\tprefix=org.alljoyn.Bus.signal_sample)"
    );
    assert_eq!(lines[2], SIGNAL_SEPARATOR);
    assert_eq!(
        lines[3],
        "'Name Changed' signal received from path: org.alljoyn.Bus.signal_sample/ with new name 'Alice'."
    );
    assert_eq!(lines.len(), 4);

    state.shutdown();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("worker should stop")
        .unwrap();

    consumer.detach(client.as_ref()).unwrap();
    client.stop().unwrap();
    service.stop().unwrap();
    assert_eq!(bus.connection_count(), 0);
}

#[tokio::test]
async fn test_worker_rejoins_restarted_service() {
    let config = ClientConfig::default();
    let bus = LocalBus::new();
    let (first_service, _) = start_service(&bus, &config);

    let client = Arc::new(LocalAttachment::new(&bus, config.application_name.clone()));
    client.connect(&config.connect_spec).unwrap();
    sample_interface(&client, &config);

    let (worker, actions) = ClientWorker::new(client.clone(), config.clone());
    let state = worker.state();
    let output = Arc::new(BufferedOutput::new());
    let _consumer =
        SignalConsumer::attach(client.as_ref(), &config, Arc::new(actions), output.clone())
            .unwrap();
    let task = tokio::spawn(worker.run());

    client.find_advertised_name(&config.well_known_name).unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), state.wait_for_proxy())
        .await
        .expect("first proxy should connect");

    first_service.stop().unwrap();
    assert!(bus.session_members(first.session_id).is_none());

    let (second_service, member) = start_service(&bus, &config);
    let second = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(proxy) = state.proxy().filter(|p| p.session_id != first.session_id) {
                return proxy;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker should rejoin the restarted service");

    assert_eq!(state.session_id(), Some(second.session_id));
    assert_eq!(second.unique_name, second_service.unique_name().unwrap());
    assert_eq!(bus.session_members(second.session_id).map(|m| m.len()), Some(2));
    let found = output
        .lines()
        .iter()
        .filter(|line| line.starts_with("Found Advertised"))
        .count();
    assert_eq!(found, 2);

    let delivered = second_service
        .emit_signal(&member, "/", vec![MsgArg::from("Bob")], Some(second.session_id))
        .unwrap();
    assert_eq!(delivered, 1);

    state.shutdown();
    task.await.unwrap();
    second_service.stop().unwrap();
}

#[tokio::test]
async fn test_worker_reports_failed_join() {
    let config = ClientConfig::default();
    let bus = LocalBus::new();

    // Advertised but no session port bound
    let service = LocalAttachment::new(&bus, "signalService");
    service.connect("null:").unwrap();
    service.request_name(&config.well_known_name).unwrap();
    service
        .advertise_name(&config.well_known_name, TransportMask::TCP)
        .unwrap();

    let client = Arc::new(LocalAttachment::new(&bus, "client"));
    client.connect("null:").unwrap();
    sample_interface(&client, &config);

    let (worker, actions) = ClientWorker::new(client.clone(), config.clone());
    let state = worker.state();
    let _consumer = SignalConsumer::attach(
        client.as_ref(),
        &config,
        Arc::new(actions),
        Arc::new(BufferedOutput::new()),
    )
    .unwrap();
    let task = tokio::spawn(worker.run());

    client.find_advertised_name(&config.well_known_name).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(state.session_id().is_none());
    assert!(state.proxy().is_none());
    assert!(client.unique_name().is_some());

    state.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_worker_stops_when_actions_dropped() {
    let bus = LocalBus::new();
    let client = Arc::new(LocalAttachment::new(&bus, "client"));
    let (worker, actions) = ClientWorker::new(client, ClientConfig::default());
    let task = tokio::spawn(worker.run());
    drop(actions);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("worker should stop")
        .unwrap();
}
