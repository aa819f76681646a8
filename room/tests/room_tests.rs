use chrono::{Duration as ChronoDuration, Utc};
use common::{
    ConnMethod, DeviceId, DiscoveredRoom, ListenedRoom, NetworkLocation, Result, RoomError,
    RoomMessage,
};
use room::mock::{MemoryRepository, RecordingAdapter};
use room::{ConnAdapter, EventDispatcher, LivenessMonitor, RoomEvent, RoomStore};
use std::sync::Arc;
use std::time::Duration;

fn location() -> NetworkLocation {
    NetworkLocation::new("10.0.0.5", 9000)
}

async fn setup() -> Result<(RoomStore, EventDispatcher, Arc<RecordingAdapter>)> {
    let store = RoomStore::new();
    let adapter = Arc::new(RecordingAdapter::new());
    store.update_connection_method(ConnMethod::Udp, Some(adapter.clone() as Arc<dyn ConnAdapter>));
    store
        .sync_database(Arc::new(MemoryRepository::new("me", "Ana")))
        .await?;
    let dispatcher = EventDispatcher::new(store.clone());
    Ok((store, dispatcher, adapter))
}

fn status(dispatcher: &EventDispatcher, id: &str) {
    dispatcher.dispatch(RoomEvent::StatusResponse {
        device_id: id.into(),
        location: location(),
    });
}

/// Backdates the device's last status response past any threshold.
fn go_silent(store: &RoomStore, id: &str) {
    let last_ping = Utc::now() - ChronoDuration::seconds(60);
    store.update(|r| r.record_ping(id.into(), location(), last_ping));
}

fn monitor(store: &RoomStore) -> Result<LivenessMonitor> {
    LivenessMonitor::with_threshold(store.clone(), Duration::from_secs(5), Duration::from_secs(15))
}

fn advertise(dispatcher: &EventDispatcher, id: &str) {
    dispatcher.dispatch(RoomEvent::AdvertiseResponse {
        device_id: id.into(),
        location: location(),
    });
}

#[tokio::test]
async fn test_scenario_discover_listen_stop() -> Result<()> {
    let (store, dispatcher, adapter) = setup().await?;

    // A: an advertisement response lands in discovery
    advertise(&dispatcher, "dev1");
    assert_eq!(
        store.get_discovered(),
        vec![DiscoveredRoom { device_id: "dev1".into(), location: location() }]
    );

    // B: listening moves it out of discovery
    let room = store.add_to_listening_to("dev1").await?;
    assert!(room.is_some());
    assert!(store.get_discovered().is_empty());
    assert_eq!(
        store.get_listened_rooms(),
        vec![ListenedRoom {
            device_id: "dev1".into(),
            location: location(),
            disconnected: false,
            needs_assist: false,
        }]
    );
    assert_eq!(
        adapter.sent(),
        vec![(
            location(),
            RoomMessage::Listening { app_id: "me".into(), responder_name: "Ana".to_string() }
        )]
    );

    // C: the emitter stops broadcasting
    dispatcher.dispatch(RoomEvent::BroadcastStop { device_id: "dev1".into() });
    let rooms = store.get_listened_rooms();
    assert!(rooms[0].disconnected);
    assert!(!rooms[0].needs_assist);
    assert!(store.get_discovered().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_add_to_listening_to_twice() -> Result<()> {
    let (store, dispatcher, adapter) = setup().await?;
    advertise(&dispatcher, "dev1");

    store.add_to_listening_to("dev1").await?;
    assert!(store.add_to_listening_to("dev1").await?.is_none());
    assert_eq!(store.get_listened_rooms().len(), 1);
    assert_eq!(adapter.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_add_to_listening_to_without_adapter_keeps_discovery() -> Result<()> {
    let store = RoomStore::new();
    store
        .sync_database(Arc::new(MemoryRepository::new("me", "Ana")))
        .await?;
    EventDispatcher::new(store.clone()).dispatch(RoomEvent::AdvertiseResponse {
        device_id: "dev1".into(),
        location: location(),
    });

    let err = store.add_to_listening_to("dev1").await.unwrap_err();
    assert!(matches!(err, RoomError::AdapterNotSet));
    assert_eq!(store.get_discovered().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_liveness_sweep_cleans_stale_device() -> Result<()> {
    let (store, dispatcher, _adapter) = setup().await?;
    advertise(&dispatcher, "dev2");
    advertise(&dispatcher, "dev3");
    dispatcher.dispatch(RoomEvent::Listening {
        device_id: "dev2".into(),
        responder_name: "Bea".to_string(),
        location: NetworkLocation::new("10.0.0.8", 7000),
    });
    status(&dispatcher, "dev2");
    status(&dispatcher, "dev3");
    go_silent(&store, "dev2");

    let cleaned = monitor(&store)?.sweep();

    assert_eq!(cleaned, vec![DeviceId::from("dev2")]);
    let discovered = store.get_discovered();
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].device_id.as_str(), "dev3");
    assert!(store.get_listeners().is_empty());
    assert!(store.read(|r| r.liveness("dev2").is_none()));
    Ok(())
}

#[tokio::test]
async fn test_stale_listened_room_is_marked_disconnected() -> Result<()> {
    let (store, dispatcher, _adapter) = setup().await?;
    advertise(&dispatcher, "dev1");
    store.add_to_listening_to("dev1").await?;
    dispatcher.dispatch(RoomEvent::RequestHelp { device_id: "dev1".into() });
    go_silent(&store, "dev1");

    monitor(&store)?.sweep();

    let rooms = store.get_listened_rooms();
    assert_eq!(rooms.len(), 1);
    assert!(rooms[0].disconnected);
    assert!(!rooms[0].needs_assist);

    // A late status response brings it back
    status(&dispatcher, "dev1");
    assert!(!store.get_listened_rooms()[0].disconnected);
    Ok(())
}

#[tokio::test]
async fn test_respond_to_help_skips_disconnected_emitter() -> Result<()> {
    let (store, dispatcher, adapter) = setup().await?;
    advertise(&dispatcher, "dev1");
    store.add_to_listening_to("dev1").await?;
    dispatcher.dispatch(RoomEvent::RequestHelp { device_id: "dev1".into() });

    assert!(store.respond_to_help("dev1").await?);
    assert_eq!(
        adapter.sent().last().map(|(_, m)| m.clone()),
        Some(RoomMessage::RespondToHelp { responder_name: "Ana".to_string() })
    );

    dispatcher.dispatch(RoomEvent::BroadcastStop { device_id: "dev1".into() });
    let before = adapter.sent().len();
    assert!(!store.respond_to_help("dev1").await?);
    assert_eq!(adapter.sent().len(), before);
    Ok(())
}

#[tokio::test]
async fn test_merged_rooms_counts_all_sets() -> Result<()> {
    let (store, dispatcher, _adapter) = setup().await?;
    advertise(&dispatcher, "dev1");
    advertise(&dispatcher, "dev2");
    store.add_to_listening_to("dev2").await?;
    dispatcher.dispatch(RoomEvent::Listening {
        device_id: "rx1".into(),
        responder_name: "Bea".to_string(),
        location: NetworkLocation::new("10.0.0.8", 7000),
    });

    let merged = store.get_merged_rooms();
    let listeners = store.get_listeners().len();
    let listened = store.get_listened_rooms().len();
    let discovered = store.get_discovered().len();
    assert_eq!(merged.len(), listeners + listened + discovered);
    assert_eq!(merged.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_datagrams_reach_handlers() -> Result<()> {
    let (store, dispatcher, _adapter) = setup().await?;
    let from = "10.0.0.5:9000".parse().unwrap();

    let response = br#"{"event":"respondToAdvertise","appId":"dev1"}"#;
    let reply = dispatcher.dispatch_datagram(response, from);
    assert!(reply.is_none());
    assert_eq!(store.get_discovered().len(), 1);

    let reply = dispatcher.dispatch_datagram(br#"{"event":"statusRequest","appId":"dev1"}"#, from);
    assert_eq!(reply, Some(RoomMessage::StatusRequest { app_id: "dev1".into() }));

    assert!(dispatcher.dispatch_datagram(b"\x00\x01garbage", from).is_none());
    assert_eq!(store.get_discovered().len(), 1);

    dispatcher.dispatch_datagram(br#"{"event":"respondToHelp","responderName":"Bea"}"#, from);
    assert_eq!(store.get_incoming_responder().as_deref(), Some("Bea"));
    Ok(())
}
