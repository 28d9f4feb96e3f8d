//! Operator UI WebSocket endpoint.
//!
//! Frames are JSON two-element arrays `[command, payload]` in both
//! directions. `listChargingStations` returns the fleet's station ids;
//! the ATG commands address one station by id. Unknown or malformed
//! commands get a well-formed error frame back.

use crate::fleet::Fleet;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const LIST_CHARGING_STATIONS: &str = "listChargingStations";
const START_ATG: &str = "startAutomaticTransactionGenerator";
const STOP_ATG: &str = "stopAutomaticTransactionGenerator";

pub fn router(fleet: Arc<Fleet>) -> Router {
    Router::new().route("/", get(upgrade)).with_state(fleet)
}

/// Serve the operator UI until the process exits.
pub async fn serve(fleet: Arc<Fleet>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(%host, port, "operator UI listening");
    axum::serve(listener, router(fleet)).await?;
    Ok(())
}

async fn upgrade(ws: WebSocketUpgrade, State(fleet): State<Arc<Fleet>>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, fleet))
}

async fn run_session(mut socket: WebSocket, fleet: Arc<Fleet>) {
    debug!("operator session opened");
    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "operator session read error");
                break;
            }
        };
        let reply = handle_message(&fleet, &text).await;
        if socket.send(Message::Text(reply.to_string())).await.is_err() {
            break;
        }
    }
    debug!("operator session closed");
}

fn error_frame(message: impl Into<String>) -> Value {
    json!(["error", { "error": message.into() }])
}

/// Process one `[command, payload]` frame and build the reply frame.
pub async fn handle_message(fleet: &Fleet, text: &str) -> Value {
    let frame: Vec<Value> = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => return error_frame(format!("malformed frame: {err}")),
    };
    let Some(command) = frame.first().and_then(Value::as_str) else {
        return error_frame("frame must be [command, payload]");
    };
    let payload = frame.get(1).cloned().unwrap_or(Value::Null);

    match command {
        LIST_CHARGING_STATIONS => {
            json!([LIST_CHARGING_STATIONS, fleet.station_ids().await])
        }
        START_ATG | STOP_ATG => match station_of(fleet, &payload).await {
            Ok(station) => {
                if command == START_ATG {
                    station.atg().start().await;
                } else {
                    station.atg().stop(None).await;
                }
                json!([command, { "status": "OK" }])
            }
            Err(message) => error_frame(message),
        },
        unknown => error_frame(format!("unknown command: {unknown}")),
    }
}

async fn station_of(
    fleet: &Fleet,
    payload: &Value,
) -> Result<Arc<evsim_station::Station>, String> {
    let id = payload
        .get("chargingStationId")
        .and_then(Value::as_str)
        .ok_or_else(|| "payload requires chargingStationId".to_string())?;
    fleet
        .station(id)
        .await
        .ok_or_else(|| format!("unknown charging station: {id}"))
}
