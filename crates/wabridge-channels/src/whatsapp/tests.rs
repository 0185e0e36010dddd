use super::client::{recipient_jid, BotConnection, WhatsAppWebClient};
use super::events::{message_text, translate};
use super::WhatsAppWebFactory;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wabridge_core::{
    config::WhatsAppConfig,
    error::WabridgeError,
    traits::{ClientEvent, SessionClient},
};
use wacore::types::events::{
    ConnectFailureReason, Connected, Disconnected, Event, LoggedOut, OfflineSyncCompleted,
    PairSuccess,
};
use wacore::types::message::{MessageInfo, MessageSource};
use wacore_binary::jid::{Jid, JidExt};

/// Stands in for the library client: connected until told to disconnect.
struct FakeConnection {
    connected: AtomicBool,
    disconnects: AtomicUsize,
}

impl FakeConnection {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            disconnects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BotConnection for FakeConnection {
    async fn send(
        &self,
        _to: Jid,
        _message: waproto::whatsapp::Message,
    ) -> Result<String, WabridgeError> {
        Ok("3EB0FAKE".to_string())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[test]
fn test_recipient_jid_maps_legacy_server() {
    let jid = recipient_jid("5511999887766@c.us").unwrap();
    assert_eq!(jid.to_string(), "5511999887766@s.whatsapp.net");
    assert!(!jid.is_group());
}

#[test]
fn test_recipient_jid_keeps_native_servers() {
    let personal = recipient_jid("5511999887766@s.whatsapp.net").unwrap();
    assert_eq!(personal.to_string(), "5511999887766@s.whatsapp.net");

    let group = recipient_jid("120363001234567890@g.us").unwrap();
    assert!(group.is_group(), "g.us JID should be detected as group");
}

#[test]
fn test_recipient_jid_bare_phone() {
    let jid = recipient_jid("34600111222").unwrap();
    assert_eq!(jid.to_string(), "34600111222@s.whatsapp.net");
}

#[test]
fn test_message_text_conversation() {
    let msg = waproto::whatsapp::Message {
        conversation: Some("!ping".to_string()),
        ..Default::default()
    };
    assert_eq!(message_text(&msg).as_deref(), Some("!ping"));
}

#[test]
fn test_message_text_empty_is_none() {
    let empty = waproto::whatsapp::Message::default();
    assert_eq!(message_text(&empty), None);

    let blank = waproto::whatsapp::Message {
        conversation: Some(String::new()),
        ..Default::default()
    };
    assert_eq!(message_text(&blank), None);
}

#[test]
fn test_fresh_session_wipes_store() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().to_str().unwrap();
    let factory = WhatsAppWebFactory::new(WhatsAppConfig::default(), data_dir);

    let session_dir = factory.session_dir();
    std::fs::create_dir_all(&session_dir).unwrap();
    std::fs::write(format!("{session_dir}/whatsapp.db"), b"old keys").unwrap();

    let db_path = factory.prepare_session_dir().unwrap();
    assert!(db_path.ends_with("whatsapp_session/whatsapp.db"));
    assert!(std::path::Path::new(&session_dir).exists());
    assert!(!std::path::Path::new(&db_path).exists());
}

#[test]
fn test_kept_session_survives() {
    let tmp = tempfile::tempdir().unwrap();
    let config = WhatsAppConfig {
        fresh_session: false,
        ..Default::default()
    };
    let factory = WhatsAppWebFactory::new(config, tmp.path().to_str().unwrap());

    let session_dir = factory.session_dir();
    std::fs::create_dir_all(&session_dir).unwrap();
    std::fs::write(format!("{session_dir}/whatsapp.db"), b"keys").unwrap();

    let db_path = factory.prepare_session_dir().unwrap();
    assert_eq!(std::fs::read(db_path).unwrap(), b"keys");
}

#[tokio::test]
async fn test_destroy_disconnects_and_stops_run_task() {
    let conn = FakeConnection::new();
    let alive = Arc::new(());
    let held = alive.clone();
    let run = tokio::spawn(async move {
        let _held = held;
        std::future::pending::<()>().await;
    });

    let client = WhatsAppWebClient::new(conn.clone(), run, 1);
    client.destroy().await.unwrap();

    assert!(!conn.is_connected(), "socket must be closed after destroy");
    assert_eq!(conn.disconnects.load(Ordering::SeqCst), 1);

    // The aborted task drops what it captured.
    for _ in 0..50 {
        if Arc::strong_count(&alive) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(Arc::strong_count(&alive), 1);
}

#[tokio::test]
async fn test_destroy_twice_disconnects_once() {
    let conn = FakeConnection::new();
    let run = tokio::spawn(std::future::pending::<()>());
    let client = WhatsAppWebClient::new(conn.clone(), run, 2);

    client.destroy().await.unwrap();
    client.destroy().await.unwrap();
    assert_eq!(conn.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_send_text_returns_library_message_id() {
    let conn = FakeConnection::new();
    let run = tokio::spawn(std::future::pending::<()>());
    let client = WhatsAppWebClient::new(conn, run, 3);

    let ack = client.send_text("5511999887766@c.us", "hi").await.unwrap();
    assert_eq!(ack.message_id, "3EB0FAKE");
    client.destroy().await.unwrap();
}

#[test]
fn test_translate_qr_code() {
    let event = Event::PairingQrCode {
        code: "2@abc,def,ghi".to_string(),
        timeout: Duration::from_secs(60),
    };
    match translate(event) {
        Some(ClientEvent::Qr(code)) => assert_eq!(code, "2@abc,def,ghi"),
        other => panic!("expected Qr, got {other:?}"),
    }
}

#[test]
fn test_translate_connected_is_ready() {
    assert!(matches!(
        translate(Event::Connected(Connected)),
        Some(ClientEvent::Ready)
    ));
}

#[test]
fn test_translate_connection_loss_is_error() {
    assert!(matches!(
        translate(Event::Disconnected(Disconnected)),
        Some(ClientEvent::Error(_))
    ));

    let logged_out = Event::LoggedOut(LoggedOut {
        on_connect: false,
        reason: ConnectFailureReason::LoggedOut,
    });
    match translate(logged_out) {
        Some(ClientEvent::Error(cause)) => assert!(cause.contains("logged out")),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[test]
fn test_translate_text_message() {
    let chat: Jid = "5511999887766@s.whatsapp.net".parse().unwrap();
    let info = MessageInfo {
        id: "3EB0ABC".to_string(),
        source: MessageSource {
            chat: chat.clone(),
            sender: chat,
            ..Default::default()
        },
        ..Default::default()
    };
    let msg = waproto::whatsapp::Message {
        conversation: Some("!ping".to_string()),
        ..Default::default()
    };

    match translate(Event::Message(Box::new(msg), info)) {
        Some(ClientEvent::Message(inbound)) => {
            assert_eq!(inbound.text, "!ping");
            assert_eq!(inbound.chat, "5511999887766@s.whatsapp.net");
            assert_eq!(inbound.sender_id, "5511999887766");
            assert_eq!(inbound.remote_id.as_deref(), Some("3EB0ABC"));
            assert!(!inbound.from_me);
        }
        other => panic!("expected Message, got {other:?}"),
    }

    let media_only = Event::Message(
        Box::new(waproto::whatsapp::Message::default()),
        MessageInfo::default(),
    );
    assert!(translate(media_only).is_none());
}

#[test]
fn test_translate_ignores_unrelated_events() {
    let paired = Event::PairSuccess(PairSuccess {
        id: Jid::default(),
        lid: Jid::default(),
        business_name: String::new(),
        platform: "android".to_string(),
    });
    assert!(translate(paired).is_none());
    assert!(translate(Event::OfflineSyncCompleted(OfflineSyncCompleted { count: 0 })).is_none());
}
