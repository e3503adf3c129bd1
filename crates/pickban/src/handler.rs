//! Per-connection handler: handshake, message routing and fan-in of
//! session events.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello` → validate version
//!   2. Authenticate token → get `UserId`
//!   3. Send `welcome`
//!   4. Loop: select between client frames and the session's outbound
//!      queue, until either side goes away

use std::sync::Arc;

use pickban_draft::{ConnectionId, DraftCommand, DraftError, SessionHandle};
use pickban_protocol::{
    ClientMessage, Codec, Envelope, ProtocolError, ServerMessage, SessionId,
    Side, UserId, now_millis,
};
use pickban_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::server::ServerState;
use crate::{Authenticator, PickbanError};

/// The session this connection is attached to, and the queue that session
/// writes into.
struct Joined {
    handle: SessionHandle,
    outbound: mpsc::Receiver<ServerMessage>,
}

/// Detaches the connection from its session when the handler exits.
///
/// `Drop` is synchronous, so the leave runs as a fire-and-forget task.
struct SessionGuard {
    connection: ConnectionId,
    joined: Option<Joined>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(joined) = self.joined.take() {
            let connection = self.connection;
            tokio::spawn(async move {
                let _ = joined.handle.leave(connection).await;
            });
        }
    }
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), PickbanError>
where
    A: Authenticator,
    C: Codec,
{
    let connection = ConnectionId::next();
    tracing::debug!(%connection, peer = %conn.peer_addr(), "handling new connection");

    let user = perform_handshake(&conn, &state).await?;
    tracing::info!(%connection, %user, "user authenticated");

    let mut guard = SessionGuard {
        connection,
        joined: None,
    };
    let mut seq: u64 = 1;
    let read_timeout = state.config.read_timeout();
    let mut deadline = Instant::now() + read_timeout;

    loop {
        tokio::select! {
            incoming = tokio::time::timeout_at(deadline, conn.recv()) => {
                let data = match incoming {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%user, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%user, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%user, "connection timed out");
                        break;
                    }
                };
                deadline = Instant::now() + read_timeout;

                let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%user, error = %e, "failed to decode envelope");
                        let err = DraftError::Malformed(e.to_string());
                        send_draft_error(&conn, &state.codec, &err, &mut seq).await?;
                        continue;
                    }
                };

                handle_client_message(
                    &conn,
                    &state,
                    user,
                    &mut guard,
                    envelope.message,
                    &mut seq,
                )
                .await?;
            }

            outbound = recv_outbound(&mut guard.joined) => {
                match outbound {
                    Some(msg) => {
                        send_message(&conn, &state.codec, next_seq(&mut seq), msg).await?;
                    }
                    None => {
                        // The session let go of us: slow queue, shutdown, or
                        // retirement. Nothing useful is left on this socket.
                        if let Some(joined) = guard.joined.take() {
                            tracing::info!(
                                %user,
                                session_id = %joined.handle.session_id(),
                                "session closed the connection"
                            );
                        }
                        let _ = conn.close().await;
                        break;
                    }
                }
            }
        }
    }

    // guard drops here → leave fires if still attached.
    Ok(())
}

/// Receive `hello`, check the version, authenticate, send `welcome`.
async fn perform_handshake<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
) -> Result<UserId, PickbanError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(
        state.config.handshake_timeout(),
        conn.recv(),
    )
    .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before hello".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(PickbanError::Transport(e)),
        Err(_) => {
            return Err(
                ProtocolError::InvalidMessage("handshake timed out".into()).into()
            );
        }
    };

    let message = match state.codec.decode::<Envelope<ClientMessage>>(&data) {
        Ok(envelope) => envelope.message,
        Err(e) => {
            send_error(conn, &state.codec, 400, &e.to_string(), 0).await?;
            return Err(e.into());
        }
    };

    let (version, token) = match message {
        ClientMessage::Hello { version, token } => (version, token),
        other => {
            send_error(conn, &state.codec, 400, "expected hello", 0).await?;
            return Err(ProtocolError::InvalidMessage(format!(
                "first message must be hello, got {}",
                other.kind()
            ))
            .into());
        }
    };

    let expected = state.config.protocol_version;
    if version != expected {
        send_error(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {expected}, got {version}"),
            0,
        )
        .await?;
        return Err(ProtocolError::InvalidMessage(
            "protocol version mismatch".into(),
        )
        .into());
    }

    let user = match state.auth.authenticate(token.as_deref()).await {
        Ok(user) => user,
        Err(e) => {
            send_error(conn, &state.codec, 401, "unauthorized", 0).await?;
            return Err(e.into());
        }
    };

    let welcome = ServerMessage::Welcome {
        user_id: user,
        server_time: now_millis(),
    };
    send_message(conn, &state.codec, 0, welcome).await?;

    Ok(user)
}

/// Routes one decoded client message.
///
/// Refusals go back to this connection as `error` frames; only transport
/// and encode failures end the connection.
async fn handle_client_message<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    user: UserId,
    guard: &mut SessionGuard,
    msg: ClientMessage,
    seq: &mut u64,
) -> Result<(), PickbanError>
where
    A: Authenticator,
    C: Codec,
{
    match msg {
        ClientMessage::Hello { .. } => {
            send_error(conn, &state.codec, 400, "already authenticated", next_seq(seq))
                .await?;
        }

        ClientMessage::Heartbeat { client_time } => {
            let ack = ServerMessage::HeartbeatAck {
                client_time,
                server_time: now_millis(),
            };
            send_message(conn, &state.codec, next_seq(seq), ack).await?;
        }

        ClientMessage::JoinSession { session_id, side } => {
            if let Err(e) = join_session(state, user, guard, session_id, side).await {
                send_draft_error(conn, &state.codec, &e, seq).await?;
            }
        }

        ClientMessage::LeaveSession {} => match guard.joined.take() {
            Some(joined) => {
                if let Err(e) = joined.handle.leave(guard.connection).await {
                    tracing::debug!(%user, error = %e, "leave failed");
                }
            }
            None => {
                send_draft_error(conn, &state.codec, &DraftError::NotInSession, seq)
                    .await?;
            }
        },

        other => {
            let command = match DraftCommand::try_from(other) {
                Ok(command) => command,
                Err(e) => return send_draft_error(conn, &state.codec, &e, seq).await,
            };
            let Some(joined) = guard.joined.as_ref() else {
                return send_draft_error(conn, &state.codec, &DraftError::NotInSession, seq)
                    .await;
            };

            let name = command.name();
            if let Err(e) = joined.handle.command(guard.connection, command).await {
                tracing::debug!(%user, command = name, error = %e, "command rejected");
                if matches!(e, DraftError::Unavailable(_)) {
                    guard.joined = None;
                }
                send_draft_error(conn, &state.codec, &e, seq).await?;
            }
        }
    }

    Ok(())
}

/// Attaches the connection to `session_id`, leaving any previous session.
///
/// The session queues `session_joined` on the new outbound queue itself.
async fn join_session<A, C>(
    state: &ServerState<A, C>,
    user: UserId,
    guard: &mut SessionGuard,
    session_id: SessionId,
    side: Option<Side>,
) -> Result<(), DraftError>
where
    A: Authenticator,
    C: Codec,
{
    if let Some(previous) = guard.joined.take() {
        let _ = previous.handle.leave(guard.connection).await;
    }

    // Lock only for the lookup, never across a session call.
    let handle = {
        let mut registry = state.registry.lock().await;
        if state.config.auto_create_sessions {
            registry.get_or_create(session_id, state.config.session.clone())?
        } else {
            registry.get(&session_id)?
        }
    };

    let (tx, rx) = mpsc::channel(state.config.outbound_capacity);
    let ack = handle.join(guard.connection, user, side, tx).await?;
    tracing::info!(
        %user,
        session_id = %handle.session_id(),
        side = ?ack.side,
        is_captain = ack.is_captain,
        "joined session"
    );
    guard.joined = Some(Joined {
        handle,
        outbound: rx,
    });
    Ok(())
}

/// Next event from the attached session. Pending forever when detached.
async fn recv_outbound(joined: &mut Option<Joined>) -> Option<ServerMessage> {
    match joined {
        Some(joined) => joined.outbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_message(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    seq: u64,
    message: ServerMessage,
) -> Result<(), PickbanError> {
    let bytes = codec.encode(&Envelope::new(seq, message))?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends an `error` frame to this connection only.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    seq: u64,
) -> Result<(), PickbanError> {
    send_message(conn, codec, seq, ServerMessage::error(code, message)).await
}

async fn send_draft_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    err: &DraftError,
    seq: &mut u64,
) -> Result<(), PickbanError> {
    send_error(conn, codec, err.code(), &err.to_string(), next_seq(seq)).await
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
