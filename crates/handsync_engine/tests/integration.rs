//! Integration tests for the sync session against a scripted device.

use handsync_codec::ControlKind;
use handsync_engine::{
    AuthOutcome, FileMessageLog, SessionConfig, SessionState, SyncError, SyncSession,
};
use handsync_protocol::{
    decode_record, DeviceInfo, DeviceTime, Item, ItemKind, ItemRecord, Message,
    ParamFormatEntry, ParamType, ParamValue, SchemaError, SyncStateFlags, TodoItem,
};
use handsync_testkit::device::{DeviceData, DeviceLink, DeviceResult, MockDevice};
use handsync_testkit::fixtures::{
    sample_device_info, sample_time, sample_todo, todo_device, todo_format, todo_records,
    DELETED_TODO_ID, MODIFIED_TODO_ID, NEW_TODO_ID,
};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

type DeviceThread = JoinHandle<DeviceResult<DeviceData>>;

fn local_config(device_port: u16) -> SessionConfig {
    SessionConfig::new("127.0.0.1")
        .with_device_port(device_port)
        .with_listen_host("127.0.0.1")
        .with_listen_port(0)
}

/// Binds a device and a listening session, then starts the device.
fn start(
    configure: impl FnOnce(SessionConfig) -> SessionConfig,
    data: DeviceData,
) -> (SyncSession, DeviceThread) {
    let device = MockDevice::bind().unwrap();
    let config = configure(local_config(device.port().unwrap()));
    let mut session = SyncSession::new(config);
    session.listen().unwrap();
    let handle = device.spawn(session.listen_port().unwrap(), data);
    (session, handle)
}

fn finish(handle: DeviceThread) -> DeviceData {
    handle.join().expect("device thread panicked").unwrap()
}

/// Connects a session to a device that runs `script` on the callback leg.
///
/// The thread hands back both device links so they stay open until the
/// test is done with the session.
fn scripted(
    script: impl FnOnce(&mut DeviceLink) + Send + 'static,
) -> (SyncSession, JoinHandle<(DeviceLink, DeviceLink)>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut session = SyncSession::new(local_config(listener.local_addr().unwrap().port()));
    session.listen().unwrap();
    let desktop_port = session.listen_port().unwrap();

    let device = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ready = DeviceLink::new(stream);
        ready.expect_ready().unwrap();
        let mut callback =
            DeviceLink::new(TcpStream::connect(("127.0.0.1", desktop_port)).unwrap());
        script(&mut callback);
        (ready, callback)
    });

    session.connect().unwrap();
    (session, device)
}

fn hang_up(mut session: SyncSession, device: JoinHandle<(DeviceLink, DeviceLink)>) {
    let (ready, callback) = device.join().expect("device script panicked");
    session.finalize();
    ready.close();
    callback.close();
}

#[test]
fn handshake_reaches_state_known() {
    let (mut session, device) = start(|c| c, todo_device());

    let outcome = session.initiate_sync().unwrap();
    assert_eq!(outcome, AuthOutcome::NotRequired);
    assert_eq!(session.state(), SessionState::StateKnown);

    let info = session.device_info().unwrap();
    assert_eq!(info.model_name(), "Zaurus SL-C3200");
    assert_eq!(info.language_code(), "en");
    assert!(!info.requires_auth());

    let flags = session.sync_state().unwrap();
    assert!(flags.needs_slow_sync(ItemKind::Todo));
    assert!(flags.is_synced(ItemKind::Address));

    session.terminate().unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);

    let data = finish(device);
    assert_eq!(data.request_tags(), vec!["RIG", "RSS", "RQT"]);
}

#[test]
fn pull_changes_fetches_new_and_modified_items() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();

    let report = session.pull_changes().unwrap();
    assert_eq!(report.kind, ItemKind::Todo);
    assert!(report.slow_sync);
    assert_eq!(report.deleted(), &[DELETED_TODO_ID]);
    assert_eq!(report.items.len(), 2);

    let first = &report.items[0];
    assert_eq!(first.sync_id(), Some(NEW_TODO_ID));
    assert_eq!(first.title(), Some("Buy milk"));
    match first {
        Item::Todo(todo) => assert_eq!(todo.category.as_deref(), Some(&b"Work"[..])),
        other => panic!("expected a todo, got {other:?}"),
    }
    assert_eq!(report.items[1].sync_id(), Some(MODIFIED_TODO_ID));
    assert_eq!(report.items[1], Item::Todo(todo_records()[1].clone()));

    session.mark_done().unwrap();
    assert_eq!(session.state(), SessionState::Done);
    assert!(session.sync_state().unwrap().is_synced(ItemKind::Todo));
    session.terminate().unwrap();

    let data = finish(device);
    assert!(data.flags.is_synced(ItemKind::Todo));
    assert_eq!(
        data.request_tags(),
        vec!["RIG", "RSS", "RDI", "RSY", "RDR", "RDR", "RDS", "RQT"]
    );
}

#[test]
fn step_by_step_enumeration() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();

    let err = session.fetch_param_values(NEW_TODO_ID).unwrap_err();
    assert!(matches!(
        err,
        SyncError::InvalidState {
            operation: "fetch_param_values",
            state: SessionState::StateKnown
        }
    ));
    assert!(matches!(
        session.fetch_item(NEW_TODO_ID),
        Err(SyncError::Schema(SchemaError::FormatMissing {
            kind: ItemKind::Todo
        }))
    ));

    let fields = session.obtain_param_format().unwrap().len();
    assert_eq!(fields, TodoItem::FIELDS.len() + 1);
    assert_eq!(session.state(), SessionState::FormatKnown);
    assert!(matches!(
        session.obtain_param_format(),
        Err(SyncError::Schema(SchemaError::AlreadyObtained {
            kind: ItemKind::Todo
        }))
    ));

    let ids = session.request_sync_ids().unwrap();
    assert_eq!(ids.changed().collect::<Vec<_>>(), vec![NEW_TODO_ID, MODIFIED_TODO_ID]);
    assert_eq!(session.state(), SessionState::Iterating);

    let values = session.fetch_param_values(NEW_TODO_ID).unwrap();
    assert_eq!(values.len(), fields);
    let item = session.fetch_item(NEW_TODO_ID).unwrap();
    assert_eq!(item, Item::Todo(todo_records()[0].clone()));

    // unknown ids come back with no values
    let missing = session.fetch_item(4242).unwrap_err();
    assert!(matches!(
        missing,
        SyncError::Schema(SchemaError::LengthMismatch { values: 0, .. })
    ));

    session.finalize();
    finish(device);
}

#[test]
fn enumerate_and_fetch_three_field_todo() {
    let format = vec![
        ParamFormatEntry::new(*b"SYID", ParamType::Long),
        ParamFormatEntry::new(*b"CTGR", ParamType::ByteArray),
        ParamFormatEntry::new(*b"TITL", ParamType::Utf8),
    ];
    let values = vec![
        ParamValue::new(7u32.to_le_bytes().to_vec()),
        ParamValue::new(b"Work".to_vec()),
        ParamValue::new(b"Buy milk".to_vec()),
    ];
    let data = DeviceData::new(sample_device_info(), sample_time())
        .with_format(ItemKind::Todo, format)
        .with_new_item(ItemKind::Todo, 7, values);
    let (mut session, device) = start(|c| c, data);
    session.initiate_sync().unwrap();

    let report = session.pull_changes().unwrap();
    assert_eq!(report.ids.new.ids, vec![7]);
    assert!(report.ids.modified.ids.is_empty());
    assert!(report.deleted().is_empty());

    let expected = TodoItem {
        sync_id: Some(7),
        category: Some(b"Work".to_vec()),
        description: Some("Buy milk".to_string()),
        ..TodoItem::default()
    };
    assert_eq!(report.items, vec![Item::Todo(expected)]);

    session.terminate().unwrap();
    finish(device);
}

#[test]
fn select_kind_drops_cached_format() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();
    session.obtain_param_format().unwrap();
    assert!(session.param_format().is_some());

    session.select_kind(ItemKind::Calendar);
    assert!(session.param_format().is_none());
    assert_eq!(session.state(), SessionState::StateKnown);

    // this device advertises no calendar fields
    assert!(session.obtain_param_format().unwrap().is_empty());
    session.terminate().unwrap();
    finish(device);
}

#[test]
fn reset_param_format_after_mark_done() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();
    session.obtain_param_format().unwrap();
    session.mark_done().unwrap();
    assert_eq!(session.state(), SessionState::Done);

    session.reset_param_format();
    assert_eq!(session.state(), SessionState::StateKnown);
    assert!(matches!(
        session.request_sync_ids(),
        Err(SyncError::InvalidState {
            operation: "request_sync_ids",
            state: SessionState::StateKnown
        })
    ));

    session.obtain_param_format().unwrap();
    let item = session.fetch_item(NEW_TODO_ID).unwrap();
    assert_eq!(item.title(), Some("Buy milk"));
    session.terminate().unwrap();
    finish(device);
}

#[test]
fn wrong_password_is_denied() {
    let (mut session, device) = start(
        |c| c.with_password("wrong"),
        todo_device().with_password("secret"),
    );

    let outcome = session.initiate_sync().unwrap();
    assert_eq!(outcome, AuthOutcome::Denied);
    assert_eq!(session.auth_outcome(), Some(AuthOutcome::Denied));
    assert_eq!(session.state(), SessionState::InfoKnown);
    assert!(matches!(
        session.request_sync_state(),
        Err(SyncError::InvalidState {
            operation: "request_sync_state",
            ..
        })
    ));

    session.finalize();
    let data = finish(device);
    assert_eq!(data.request_tags(), vec!["RIG", "RRL"]);
}

#[test]
fn right_password_is_accepted() {
    let (mut session, device) = start(
        |c| c.with_password("secret"),
        todo_device().with_password("secret"),
    );

    assert_eq!(session.initiate_sync().unwrap(), AuthOutcome::NotRequired);
    assert_eq!(session.state(), SessionState::StateKnown);
    session.terminate().unwrap();

    let data = finish(device);
    assert_eq!(data.request_tags(), vec!["RIG", "RRL", "RSS", "RQT"]);
}

#[test]
fn protected_device_without_password_gets_empty_attempt() {
    let (mut session, device) = start(|c| c, todo_device().with_password("secret"));

    assert_eq!(session.initiate_sync().unwrap(), AuthOutcome::Denied);
    session.finalize();

    let data = finish(device);
    assert_eq!(data.requests.len(), 2);
    assert_eq!(
        data.requests[1],
        Message::AuthRequest {
            password: Vec::new()
        }
    );
}

#[test]
fn protected_device_serves_storage_path_after_password() {
    let (mut session, device) = start(
        |c| c.with_password("secret"),
        todo_device().with_password("secret"),
    );

    assert_eq!(session.initiate_sync().unwrap(), AuthOutcome::NotRequired);
    assert!(session.device_info().unwrap().requires_auth());
    assert_eq!(
        session.request_storage_path().unwrap(),
        "/home/zaurus/Applications"
    );
    session.terminate().unwrap();

    let data = finish(device);
    assert!(data.unlocked);
    assert_eq!(data.request_tags(), vec!["RIG", "RRL", "RSS", "RMG", "RQT"]);
}

#[test]
fn writes_and_deletes_reach_the_device() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();
    session.obtain_param_format().unwrap();

    let fresh = sample_todo(0, "Water plants", b"Home");
    let inserted = session.insert_item(&Item::Todo(fresh.clone())).unwrap();
    assert_eq!(inserted, DeviceData::FIRST_INSERTED_ID);

    let renamed = sample_todo(NEW_TODO_ID, "Buy oat milk", b"Work");
    let updated = session
        .update_item(NEW_TODO_ID, &Item::Todo(renamed.clone()))
        .unwrap();
    assert_eq!(updated, NEW_TODO_ID);

    session.delete_items(&[MODIFIED_TODO_ID]).unwrap();
    session.terminate().unwrap();

    let data = finish(device);
    let todo = data.category(ItemKind::Todo).unwrap();
    assert!(!todo.items.contains_key(&MODIFIED_TODO_ID));

    let stored: TodoItem = decode_record(&todo.format, &todo.items[&inserted]).unwrap();
    assert_eq!(stored, fresh);
    let stored: TodoItem = decode_record(&todo.format, &todo.items[&NEW_TODO_ID]).unwrap();
    assert_eq!(stored.description.as_deref(), Some("Buy oat milk"));
}

#[test]
fn writes_need_a_format_for_the_item_kind() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();

    assert!(matches!(
        session.insert_item(&Item::Todo(TodoItem::default())),
        Err(SyncError::InvalidState {
            operation: "insert_item",
            ..
        })
    ));

    session.obtain_param_format().unwrap();
    let calendar = Item::Calendar(Default::default());
    assert!(matches!(
        session.insert_item(&calendar),
        Err(SyncError::Schema(SchemaError::FormatMissing {
            kind: ItemKind::Calendar
        }))
    ));

    session.terminate().unwrap();
    finish(device);
}

#[test]
fn clock_and_storage_path() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();

    assert_eq!(session.request_time().unwrap(), sample_time());
    let later = DeviceTime::from_parts(2025, 1, 2, 3, 4, 5).unwrap();
    session.set_time(later).unwrap();
    assert_eq!(session.request_time().unwrap(), later);
    assert_eq!(
        session.request_storage_path().unwrap(),
        "/home/zaurus/Applications"
    );

    session.terminate().unwrap();
    let data = finish(device);
    assert_eq!(data.time.to_string(), "2025-01-02 03:04:05");
}

#[test]
fn reset_sync_state_cascades() {
    let data = todo_device().with_flags(SyncStateFlags::all_synced());
    let (mut session, device) = start(|c| c, data);
    session.initiate_sync().unwrap();

    let flags = session.reset_sync_state(ItemKind::Calendar).unwrap();
    assert!(flags.is_synced(ItemKind::Todo));
    assert!(flags.needs_slow_sync(ItemKind::Calendar));
    assert!(flags.needs_slow_sync(ItemKind::Address));
    assert_eq!(session.sync_state(), Some(flags));

    session.terminate().unwrap();
    let data = finish(device);
    assert_eq!(data.flags, flags);
}

#[test]
fn device_initiated_session() {
    let device = MockDevice::bind().unwrap();
    let mut session = SyncSession::new(local_config(device.port().unwrap()));
    session.listen().unwrap();
    let handle = device.spawn_initiating(session.listen_port().unwrap(), todo_device());

    session.accept_device().unwrap();
    assert_eq!(session.state(), SessionState::Connected);
    let info = session.request_device_info().unwrap();
    assert_eq!(info, sample_device_info());
    session.terminate().unwrap();

    let data = finish(handle);
    assert_eq!(data.request_tags(), vec!["RIG", "RQT"]);
}

#[test]
fn finalize_twice_then_listen_again() {
    let (mut session, device) = start(|c| c, todo_device());
    session.initiate_sync().unwrap();

    session.finalize();
    session.finalize();
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(matches!(
        session.request_time(),
        Err(SyncError::InvalidState { .. })
    ));
    finish(device);

    session.listen().unwrap();
    assert_eq!(session.state(), SessionState::Listening);
    assert!(session.device_info().is_none());
    assert!(session.sync_state().is_none());
}

#[test]
fn device_hangup_is_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut session = SyncSession::new(local_config(listener.local_addr().unwrap().port()));
    session.listen().unwrap();
    let desktop_port = session.listen_port().unwrap();

    let device = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ready = DeviceLink::new(stream);
        ready.expect_ready().unwrap();
        let callback = TcpStream::connect(("127.0.0.1", desktop_port)).unwrap();
        // hang up before answering anything
        DeviceLink::new(callback).close();
        ready
    });

    session.connect().unwrap();
    let ready = device.join().unwrap();
    let err = session.request_device_info().unwrap_err();
    assert!(err.is_fatal());
    assert!(err.code() < 0);
    ready.close();
}

#[test]
fn message_log_records_the_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("handsync.log");

    let device = MockDevice::bind().unwrap();
    let mut session = SyncSession::new(local_config(device.port().unwrap()))
        .with_log(FileMessageLog::open(&path).unwrap());
    session.listen().unwrap();
    let handle = device.spawn(session.listen_port().unwrap(), todo_device());

    session.initiate_sync().unwrap();
    session.terminate().unwrap();
    finish(handle);
    drop(session);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains(">> RAY (ready)"));
    assert!(text.contains(">> RIG (device info request)"));
    assert!(text.contains("<< AIG (device info)"));
    assert!(text.contains("<< REQ"));
    assert!(text.contains(">> ACK"));
    assert!(text.contains("<< AEX (exchange complete)"));
    assert!(!text.contains("MISMATCH"));
}

#[test]
fn wrong_reply_to_device_info_request() {
    let (mut session, device) = scripted(|link| {
        assert_eq!(link.expect_request().unwrap(), Message::DeviceInfoRequest);
        link.reply(&Message::SyncState {
            flags: SyncStateFlags::default(),
        })
        .unwrap();
    });

    let err = session.request_device_info().unwrap_err();
    match &err {
        SyncError::UnexpectedMessage { expected, actual } => {
            assert_eq!(*expected, "device info");
            assert_eq!(actual, "sync state");
        }
        other => panic!("expected UnexpectedMessage, got {other:?}"),
    }
    assert_eq!(err.code(), -5);
    assert!(!err.is_fatal());
    assert_eq!(session.state(), SessionState::Connected);
    assert!(session.device_info().is_none());
    hang_up(session, device);
}

#[test]
fn abort_without_auth_denied_is_unexpected() {
    let (mut session, device) = scripted(|link| {
        link.expect_request().unwrap();
        link.reply(&Message::DeviceInfo(DeviceInfo {
            auth_state: 1,
            ..sample_device_info()
        }))
        .unwrap();
        assert!(matches!(
            link.expect_request().unwrap(),
            Message::AuthRequest { .. }
        ));
        link.expect_control(ControlKind::Request).unwrap();
        link.send_control(ControlKind::Abort).unwrap();
        link.send_message(&Message::ExchangeComplete).unwrap();
        link.expect_control(ControlKind::Acknowledge).unwrap();
    });

    assert!(session.request_device_info().unwrap().requires_auth());
    let err = session.authenticate(b"secret").unwrap_err();
    match &err {
        SyncError::UnexpectedMessage { expected, actual } => {
            assert_eq!(*expected, "auth denied");
            assert_eq!(actual, "exchange complete");
        }
        other => panic!("expected UnexpectedMessage, got {other:?}"),
    }
    assert_eq!(err.code(), -5);
    assert_eq!(session.auth_outcome(), None);
    assert_eq!(session.state(), SessionState::InfoKnown);
    hang_up(session, device);
}

#[test]
fn delete_and_mark_done_need_exchange_complete() {
    let (mut session, device) = scripted(|link| {
        link.expect_request().unwrap();
        link.reply(&Message::DeviceInfo(sample_device_info())).unwrap();
        link.expect_request().unwrap();
        link.reply(&Message::SyncState {
            flags: SyncStateFlags::default(),
        })
        .unwrap();
        link.expect_request().unwrap();
        link.reply(&Message::ParamFormat {
            entries: todo_format(),
        })
        .unwrap();

        assert!(matches!(
            link.expect_request().unwrap(),
            Message::DeleteItems { .. }
        ));
        link.reply(&Message::ItemWritten {
            sync_id: DELETED_TODO_ID,
        })
        .unwrap();
        assert_eq!(
            link.expect_request().unwrap(),
            Message::SyncDone {
                kind: ItemKind::Todo
            }
        );
        link.reply(&Message::DeviceTime {
            time: sample_time(),
        })
        .unwrap();
    });

    session.request_device_info().unwrap();
    session.request_sync_state().unwrap();
    session.obtain_param_format().unwrap();

    let err = session.delete_items(&[DELETED_TODO_ID]).unwrap_err();
    assert!(matches!(
        &err,
        SyncError::UnexpectedMessage {
            expected: "exchange complete",
            actual,
        } if actual == "item written"
    ));

    let err = session.mark_done().unwrap_err();
    assert!(matches!(
        &err,
        SyncError::UnexpectedMessage {
            expected: "exchange complete",
            actual,
        } if actual == "device time"
    ));
    assert_eq!(session.state(), SessionState::FormatKnown);
    assert!(!session.sync_state().unwrap().is_synced(ItemKind::Todo));
    hang_up(session, device);
}
