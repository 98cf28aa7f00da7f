mod support;

use std::time::Duration;

use anyhow::{Context, Result};
use bondster_import::actor::{ActorSystem, Coordinates, Envelope};
use bondster_import::models::Id;
use support::*;
use tokio::sync::{mpsc, watch};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Bus {
    actors: ActorSystem,
    replies: mpsc::UnboundedReceiver<Envelope>,
    _shutdown: watch::Sender<bool>,
}

impl Bus {
    fn new(harness: &Harness) -> Self {
        let (tx, replies) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            actors: ActorSystem::new(harness.ctx.clone(), tx, shutdown_rx),
            replies,
            _shutdown: shutdown,
        }
    }

    fn send(&self, token: &str, payload: &str) {
        let frame = format!("{} BondsterRest {token} req-1 {payload}", self.actors.region());
        self.actors.deliver(&frame);
    }

    async fn reply(&mut self) -> Result<Envelope> {
        tokio::time::timeout(Duration::from_secs(5), self.replies.recv())
            .await
            .context("no reply within timeout")?
            .context("reply channel closed")
    }
}

#[tokio::test]
async fn create_token_replies_and_rejects_duplicates() -> Result<()> {
    let gateway = MockServer::start().await;
    let openbank = MockServer::start().await;
    let harness = Harness::new(&gateway, &openbank);
    let mut bus = Bus::new(&harness);

    bus.send("tok-1", "NT alice secret");
    let reply = bus.reply().await?;
    assert_eq!(reply.payload, "TN");
    assert_eq!(reply.to, Coordinates::new("BondsterRest", "req-1"));
    assert_eq!(reply.from, Coordinates::new("BondsterImport/acme", "tok-1"));
    assert_eq!(
        reply.encode(),
        "BondsterRest BondsterImport/acme req-1 tok-1 TN"
    );

    bus.send("tok-1", "NT bob other");
    assert_eq!(bus.reply().await?.payload, "EE");

    let stored = harness
        .tokens
        .load(&Id::from_string("tok-1"))
        .await?
        .context("token stored")?;
    assert_eq!(stored.username, "alice");
    assert_eq!(harness.metrics.snapshot().tokens_created, 1);

    bus.actors.settle().await;
    bus.actors.drain().await;
    Ok(())
}

#[tokio::test]
async fn delete_during_synchronization_wins() -> Result<()> {
    let gateway = MockServer::start().await;
    let openbank = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN_SCENARIO_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"scenarios": [{"code": "USR_PWD"}]}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&gateway)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN_STEP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": "FINISH",
            "jwt": expiring("jwt-1", "2024-02-15T13:00:00.000Z"),
            "ssid": expiring("ssid-1", "2024-02-15T13:00:00.000Z"),
        })))
        .mount(&gateway)
        .await;
    mount_currencies(&gateway, &["CZK"]).await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    let harness = Harness::new(&gateway, &openbank);
    let mut bus = Bus::new(&harness);

    // creation immediately schedules a synchronization
    bus.send("tok-1", "NT alice secret");
    assert_eq!(bus.reply().await?.payload, "TN");

    bus.send("tok-1", "DT");
    assert_eq!(bus.reply().await?.payload, "TD");

    bus.send("tok-1", "DT");
    assert_eq!(bus.reply().await?.payload, "EE");

    // the running round must not write the record back
    bus.actors.settle().await;
    bus.actors.drain().await;
    let id = Id::from_string("tok-1");
    assert!(harness.tokens.load(&id).await?.is_none());
    assert_eq!(harness.metrics.snapshot().tokens_deleted, 1);
    Ok(())
}

#[tokio::test]
async fn deleted_token_can_be_created_again() -> Result<()> {
    let gateway = MockServer::start().await;
    let openbank = MockServer::start().await;
    let harness = Harness::new(&gateway, &openbank);
    let mut bus = Bus::new(&harness);

    bus.send("tok-1", "NT alice secret");
    assert_eq!(bus.reply().await?.payload, "TN");
    bus.send("tok-1", "DT");
    assert_eq!(bus.reply().await?.payload, "TD");
    bus.send("tok-1", "NT carol other");
    assert_eq!(bus.reply().await?.payload, "TN");

    let stored = harness
        .tokens
        .load(&Id::from_string("tok-1"))
        .await?
        .context("token stored")?;
    assert_eq!(stored.username, "carol");

    bus.actors.settle().await;
    bus.actors.drain().await;
    Ok(())
}

#[tokio::test]
async fn unknown_token_commands() -> Result<()> {
    let gateway = MockServer::start().await;
    let openbank = MockServer::start().await;
    let harness = Harness::new(&gateway, &openbank);
    let mut bus = Bus::new(&harness);

    bus.send("ghost", "DT");
    assert_eq!(bus.reply().await?.payload, "EE");

    // synchronizing a missing token is silently ignored
    bus.send("ghost", "ST");
    bus.actors.settle().await;
    assert!(bus.replies.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn unparseable_messages_get_error_reply() -> Result<()> {
    let gateway = MockServer::start().await;
    let openbank = MockServer::start().await;
    let harness = Harness::new(&gateway, &openbank);
    let mut bus = Bus::new(&harness);

    for payload in ["XX", "NT alice", "NT a b c", "ST now"] {
        bus.send("tok-1", payload);
        let reply = bus.reply().await?;
        assert_eq!(reply.payload, "EE", "payload {payload:?}");
        assert_eq!(reply.from.name, "tok-1");
    }

    // ids that cannot name a storage directory are refused up front
    bus.send("..", "NT alice secret");
    assert_eq!(bus.reply().await?.payload, "EE");

    // frames for another region never reach an actor
    bus.actors
        .deliver("BondsterImport/other BondsterRest tok-1 req-1 NT alice secret");
    bus.actors.settle().await;
    assert!(bus.replies.try_recv().is_err());
    assert!(harness.tokens.list_ids().await?.is_empty());
    Ok(())
}
