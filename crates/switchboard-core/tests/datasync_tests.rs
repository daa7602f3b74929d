//! Integration tests for delta application and the data sync service.

mod common;

use common::{deliver, open, respond};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use switchboard::datasync::{
    ArrayCollection, Collection, CollectionIterator, Delta, DeltaProcessor, ItemsEqual,
    SingleItemCollection,
};
use switchboard::services::{DataSync, DataSyncEvent};
use switchboard::{Connector, SwitchboardError};
use tokio::sync::mpsc;

#[test]
fn test_update_by_identity_equality() {
    let colors = ArrayCollection::from_items(vec![json!("red"), json!("blue")]);
    let mut processor = DeltaProcessor::new().with_equality(ItemsEqual::structural());
    processor.register("X", colors.clone());

    processor.process_value(json!({"type": "update", "model": "X", "oldData": "red", "newData": "black"}));

    assert_eq!(colors.snapshot(), vec![json!("black"), json!("blue")]);
}

#[test]
fn test_insert_grows_by_one_with_transform() {
    let players = ArrayCollection::new().with_transform(|mut item| {
        item["seen"] = json!(true);
        item
    });
    let mut processor = DeltaProcessor::new();
    processor.register("Player", players.clone());

    for id in 0..3 {
        let before = players.len();
        let applied = processor
            .process_delta(Delta::Insert {
                model: "Player".into(),
                tag: None,
                data: json!({ "id": id }),
            })
            .unwrap();
        assert!(applied);
        assert_eq!(players.len(), before + 1);
    }
    assert_eq!(players.snapshot()[2], json!({"id": 2, "seen": true}));
}

#[test]
fn test_unmatched_update_and_delete_change_nothing() {
    let players = ArrayCollection::from_items(vec![json!({"id": 1}), json!({"id": 2})]);
    let mut processor = DeltaProcessor::new();
    processor.register("Player", players.clone());

    processor.process_value(json!({"type": "update", "model": "Player", "oldData": {"id": 7}, "newData": {"id": 7, "x": 1}}));
    processor.process_value(json!({"type": "delete", "model": "Player", "data": {"id": 8}}));
    // Items without the identifying field never match under the default predicate.
    processor.process_value(json!({"type": "delete", "model": "Player", "data": {"name": "x"}}));

    assert_eq!(players.snapshot(), vec![json!({"id": 1}), json!({"id": 2})]);
}

#[test]
fn test_removing_while_iterating_visits_every_item_once() {
    let mut numbers = ArrayCollection::from_items((0..6).map(|n| json!(n)).collect());
    let mut visited = Vec::new();
    {
        let mut iter = numbers.iterator();
        while iter.has_next() {
            let item = iter.next().unwrap();
            visited.push(item.clone());
            if item.as_i64().unwrap() % 2 == 0 {
                iter.remove().unwrap();
            }
        }
    }
    assert_eq!(visited, (0..6).map(|n| json!(n)).collect::<Vec<Value>>());
    assert_eq!(numbers.snapshot(), vec![json!(1), json!(3), json!(5)]);
}

#[test]
fn test_iterator_misuse_errors() {
    let mut colors = ArrayCollection::from_items(vec![json!("red")]);
    let mut iter = colors.iterator();

    assert!(matches!(iter.remove(), Err(SwitchboardError::CursorNotPositioned)));
    iter.next().unwrap();
    iter.remove().unwrap();
    assert!(matches!(iter.update(json!("x")), Err(SwitchboardError::CursorOnDeletedItem)));
    assert!(matches!(iter.next(), Err(SwitchboardError::CursorExhausted)));
}

#[test]
fn test_single_item_collection_through_processor() {
    let profile = Arc::new(Mutex::new(Some(json!({"id": 1, "nick": "ann"}))));
    let read = profile.clone();
    let write = profile.clone();
    let clear = profile.clone();
    let collection = SingleItemCollection::new(
        move || read.lock().unwrap().clone(),
        move |item| *write.lock().unwrap() = Some(item),
    )
    .with_remove(move || *clear.lock().unwrap() = None);

    let mut processor = DeltaProcessor::new();
    processor.register("Profile", collection);

    processor.process_value(json!({
        "type": "update", "model": "Profile",
        "oldData": {"id": 1}, "newData": {"id": 1, "nick": "annie"}
    }));
    assert_eq!(*profile.lock().unwrap(), Some(json!({"id": 1, "nick": "annie"})));

    processor.process_value(json!({"type": "insert", "model": "Profile", "data": {"id": 2}}));
    assert_eq!(*profile.lock().unwrap(), Some(json!({"id": 1, "nick": "annie"})));

    processor.process_value(json!({"type": "delete", "model": "Profile", "data": {"id": 1}}));
    assert_eq!(*profile.lock().unwrap(), None);
}

#[test]
fn test_tagged_views_resolve_by_tag() {
    let blue = ArrayCollection::new();
    let red = ArrayCollection::new();
    let mut processor = DeltaProcessor::new();
    processor
        .register_tagged("Player", "bluePlayers", blue.clone())
        .register_tagged("Player", "redPlayers", red.clone());

    processor.process_value(json!({"type": "insert", "model": "Player", "tag": "redPlayers", "data": {"id": 1}}));
    processor.process_value(json!({"type": "insert", "model": "Player", "tag": "greenPlayers", "data": {"id": 2}}));

    assert!(blue.is_empty());
    assert_eq!(red.snapshot(), vec![json!({"id": 1})]);
}

#[tokio::test]
async fn test_datasync_service_applies_and_emits_deltas() {
    let players = ArrayCollection::from_items(vec![json!({"id": 1, "color": "red"})]);
    let mut processor = DeltaProcessor::new();
    processor.register("Player", players.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut builder = Connector::builder();
    let datasync = builder
        .service("datasync", |ch| DataSync::with_processor(ch, processor, tx))
        .unwrap();
    let connector = builder.build();
    let recorder = open(&connector);

    let acquired = datasync.acquire_subscription("token-1");
    assert_eq!(
        recorder.last_message(),
        json!({"command": "acquireSubscription", "params": {"token": "token-1"}, "callId": 0})
    );
    respond(&connector, "datasync", 0, Value::Null);
    acquired.await.unwrap();

    deliver(&connector, "datasync", json!({
        "type": "delta",
        "delta": {"type": "update", "model": "Player",
                  "oldData": {"id": 1, "color": "red"}, "newData": {"id": 1, "color": "blue"}}
    }));
    deliver(&connector, "datasync", json!({"type": "delta", "delta": {"type": "upsert", "model": "Player"}}));
    deliver(&connector, "datasync", json!({"type": "resync"}));

    assert_eq!(players.snapshot(), vec![json!({"id": 1, "color": "blue"})]);
    match rx.try_recv().unwrap() {
        DataSyncEvent::Delta(delta) => assert_eq!(delta.kind(), "update"),
    }
    assert!(rx.try_recv().is_err());

    let late = ArrayCollection::new();
    datasync.processor().register("Team", late.clone());
    deliver(&connector, "datasync", json!({
        "type": "delta",
        "delta": {"type": "insert", "model": "Team", "data": {"id": 9}}
    }));
    assert_eq!(late.len(), 1);
}

#[tokio::test]
async fn test_datasync_service_drops_deltas_for_unregistered_targets() {
    let blue = ArrayCollection::new();
    let mut processor = DeltaProcessor::new();
    processor.register_tagged("Player", "bluePlayers", blue.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut builder = Connector::builder();
    let _datasync = builder
        .service("datasync", |ch| DataSync::with_processor(ch, processor, tx))
        .unwrap();
    let connector = builder.build();
    let _recorder = open(&connector);

    deliver(&connector, "datasync", json!({
        "type": "delta",
        "delta": {"type": "insert", "model": "Ghost", "data": {"id": 1}}
    }));
    deliver(&connector, "datasync", json!({
        "type": "delta",
        "delta": {"type": "insert", "model": "Player", "tag": "greenPlayers", "data": {"id": 2}}
    }));
    assert!(rx.try_recv().is_err());
    assert!(blue.is_empty());

    // A registered view that matches nothing still reports the delta.
    deliver(&connector, "datasync", json!({
        "type": "delta",
        "delta": {"type": "delete", "model": "Player", "tag": "bluePlayers", "data": {"id": 3}}
    }));
    match rx.try_recv().unwrap() {
        DataSyncEvent::Delta(delta) => assert_eq!(delta.tag(), Some("bluePlayers")),
    }
    assert!(rx.try_recv().is_err());
}
