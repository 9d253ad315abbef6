//! HTTP command surface for starting, resetting and stopping measurements.

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::StartRejected;
use crate::measure::{SessionHandle, StatusSnapshot};
use crate::pipeline::StopSignal;

#[derive(Clone)]
pub struct ControlState {
    pub session: SessionHandle,
    /// Lets the subject get into position before the start is applied
    pub start_delay: Duration,
    pub stop: StopSignal,
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub seq: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationCommand {
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub msg: String,
}

impl Message {
    fn json(msg: impl Into<String>) -> Json<Self> {
        Json(Self { msg: msg.into() })
    }
}

pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/", get(start_measuring))
        .route("/application", post(application))
        .route("/status", get(status))
        .with_state(state)
}

async fn start_measuring(
    State(state): State<ControlState>,
    Query(query): Query<StartQuery>,
) -> (StatusCode, Json<Message>) {
    tokio::time::sleep(state.start_delay).await;
    let user_id = query.seq.unwrap_or_default();

    match state.session.start(&user_id).await {
        Ok(()) => (StatusCode::OK, Message::json("Success")),
        Err(e @ StartRejected::Unavailable) => {
            (StatusCode::SERVICE_UNAVAILABLE, Message::json(e.to_string()))
        }
        Err(e) => (StatusCode::BAD_REQUEST, Message::json(e.to_string())),
    }
}

async fn application(
    State(state): State<ControlState>,
    Json(body): Json<ApplicationCommand>,
) -> (StatusCode, Json<Message>) {
    match body.command.as_str() {
        "exit" => {
            info!("exit requested over HTTP");
            state.stop.stop();
        }
        "reset" => {
            state.session.reset();
        }
        "reserved" => {}
        _ => return (StatusCode::BAD_REQUEST, Message::json("undefined command.")),
    }
    (StatusCode::OK, Message::json("success"))
}

async fn status(State(state): State<ControlState>) -> Json<StatusSnapshot> {
    Json(state.session.status())
}

/// Serve until the pipeline stop flag is raised
pub async fn serve(addr: &str, state: ControlState) -> Result<()> {
    let stop = state.stop.clone();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control server on {addr}"))?;
    info!("control server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !stop.is_stopped() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await
        .context("control server failed")?;
    info!("control server stopped");
    Ok(())
}
