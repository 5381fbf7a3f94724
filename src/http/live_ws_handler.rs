use crate::api_error::ApiError;
use crate::auth::jwt_service::JwtService;
use crate::service::live_hub::{is_known_topic, user_topic_owner, LiveEvent, LiveHub};
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Messages a client may send.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Pong,
}

/// Messages the server pushes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Event {
        topic: String,
        payload: serde_json::Value,
    },
    Subscribed { topic: String },
    Unsubscribed { topic: String },
    Ping,
    Error { message: String },
}

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    pub token: String,
}

/// Whether `user_id` may subscribe to `topic`.
pub fn may_subscribe(topic: &str, user_id: Uuid) -> Result<(), &'static str> {
    if !is_known_topic(topic) {
        return Err("Unknown topic");
    }
    match user_topic_owner(topic) {
        Some(Some(owner)) if owner != user_id => Err("Cannot subscribe to another user's topic"),
        _ => Ok(()),
    }
}

/// One WebSocket session relaying hub events for its subscribed topics.
pub struct LiveSocket {
    id: Uuid,
    user_id: Uuid,
    hb: Instant,
    subscriptions: HashSet<String>,
    hub: LiveHub,
}

impl LiveSocket {
    pub fn new(user_id: Uuid, hub: LiveHub) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            hb: Instant::now(),
            subscriptions: HashSet::new(),
            hub,
        }
    }

    fn send(ctx: &mut <Self as Actor>::Context, message: &ServerMessage) {
        if let Ok(json) = serde_json::to_string(message) {
            ctx.text(json);
        }
    }

    /// Ping the client and drop it once it stops answering.
    fn hb(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!(session_id = %act.id, "WebSocket heartbeat timeout, disconnecting");
                ctx.stop();
                return;
            }
            Self::send(ctx, &ServerMessage::Ping);
        });
    }

    fn handle_message(&mut self, msg: &str, ctx: &mut <Self as Actor>::Context) {
        match serde_json::from_str::<ClientMessage>(msg) {
            Ok(ClientMessage::Subscribe { topic }) => match may_subscribe(&topic, self.user_id) {
                Ok(()) => {
                    info!(session_id = %self.id, topic = %topic, "Subscribed to topic");
                    self.subscriptions.insert(topic.clone());
                    Self::send(ctx, &ServerMessage::Subscribed { topic });
                }
                Err(reason) => {
                    warn!(session_id = %self.id, topic = %topic, reason = reason, "Subscription refused");
                    Self::send(
                        ctx,
                        &ServerMessage::Error {
                            message: reason.to_string(),
                        },
                    );
                }
            },
            Ok(ClientMessage::Unsubscribe { topic }) => {
                self.subscriptions.remove(&topic);
                Self::send(ctx, &ServerMessage::Unsubscribed { topic });
            }
            Ok(ClientMessage::Pong) => {
                self.hb = Instant::now();
            }
            Err(e) => {
                debug!(session_id = %self.id, error = %e, "Failed to parse WebSocket message");
                Self::send(
                    ctx,
                    &ServerMessage::Error {
                        message: "Invalid message format".to_string(),
                    },
                );
            }
        }
    }
}

impl Actor for LiveSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session_id = %self.id, user_id = %self.user_id, "Live connection established");
        self.hb(ctx);

        let session_id = self.id;
        let events = futures::stream::unfold(self.hub.subscribe(), move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(session_id = %session_id, skipped = skipped, "Live receiver lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        ctx.add_stream(events);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(session_id = %self.id, "Live connection closed");
    }
}

impl StreamHandler<LiveEvent> for LiveSocket {
    fn handle(&mut self, event: LiveEvent, ctx: &mut Self::Context) {
        if self.subscriptions.contains(&event.topic) {
            Self::send(
                ctx,
                &ServerMessage::Event {
                    topic: event.topic,
                    payload: event.payload,
                },
            );
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for LiveSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.handle_message(&text, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                warn!(session_id = %self.id, "Binary messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session_id = %self.id, reason = ?reason, "Client initiated close");
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// GET /api/live?token=...
pub async fn live_websocket(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<LiveQuery>,
    jwt_service: web::Data<JwtService>,
    hub: web::Data<LiveHub>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = jwt_service
        .validate_access_token(&query.token)
        .await
        .map_err(ApiError::from)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::unauthorized("Invalid token"))?;

    info!(user_id = %user_id, "New live WebSocket connection request");

    ws::start(LiveSocket::new(user_id, hub.get_ref().clone()), &req, stream)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/live", web::get().to(live_websocket));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::live_hub::{tournament_topic, user_topic};

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","topic":"tournament:abc"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                topic: "tournament:abc".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Pong);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn test_server_event_shape() {
        let msg = ServerMessage::Event {
            topic: "user:1".to_string(),
            payload: serde_json::json!({"type": "message_created"}),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["topic"], "user:1");
        assert_eq!(json["payload"]["type"], "message_created");

        let ping = serde_json::to_string(&ServerMessage::Ping).unwrap();
        assert_eq!(ping, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_user_topics_are_private() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(may_subscribe(&user_topic(me), me).is_ok());
        assert!(may_subscribe(&user_topic(other), me).is_err());
        assert!(may_subscribe(&tournament_topic(other), me).is_ok());
        assert!(may_subscribe("weather:today", me).is_err());
        assert!(may_subscribe("user:not-a-uuid", me).is_err());
    }

    #[actix_web::test]
    async fn test_live_requires_access_token() {
        use actix_web::{http::StatusCode, test, App};

        let jwt_service = crate::test_support::test_jwt_service().await;
        let pair = jwt_service
            .generate_token_pair(Uuid::new_v4(), vec!["user".to_string()])
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jwt_service))
                .app_data(web::Data::new(LiveHub::new()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/live?token={}", pair.refresh_token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/live?token=garbage")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
