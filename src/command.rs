//! Typed command dispatch against a live session.
//!
//! Commands only ever go to an endpoint whose session is still connected —
//! dispatch against a dead or absent session fails fast with a typed error
//! and sends nothing. Acknowledged commands wait out the profile's ack
//! window on their own socket; unacknowledged ones are fire-and-forget.

use tracing::{debug, info};

use crate::error::{LinkError, LinkResult};
use crate::profile::Command;
use crate::session::ConnectionSession;
use crate::transport::ProbeTransport;

/// Route a command to the session, enforcing class and liveness contracts.
pub async fn dispatch(session: &ConnectionSession, command: Command) -> LinkResult<()> {
    let class = session.profile().class;
    if command.class() != class {
        return Err(LinkError::UnsupportedCommand {
            class,
            command: command.name(),
        });
    }
    if !session.is_connected() {
        return Err(LinkError::NotConnected(class));
    }
    if command.expects_ack() {
        send_acknowledged(session, command).await
    } else {
        send_fire_and_forget(session, command).await
    }
}

/// Trigger the plank's calibration routine.
///
/// The protocol has no calibration ack; the command is sent once and success
/// is assumed.
pub async fn calibrate(session: &ConnectionSession) -> LinkResult<()> {
    dispatch(session, Command::Calibrate).await
}

/// Apply stimulation parameters, awaiting the device's acknowledgment.
///
/// Out-of-range `mode`/`power` are clamped before serialization. A missing
/// ack is [`LinkError::CommandTimeout`]; any reply other than the success
/// token is [`LinkError::CommandRejected`]. Neither is retried here.
pub async fn set_stimulation(
    session: &ConnectionSession,
    mode: i32,
    power: i32,
) -> LinkResult<()> {
    dispatch(session, Command::SetStimulation { mode, power }).await
}

async fn send_fire_and_forget(session: &ConnectionSession, command: Command) -> LinkResult<()> {
    let wire = command.wire_format();
    let transport = ProbeTransport::bind().await?;
    transport.send_to(wire.as_bytes(), session.endpoint()).await?;
    info!(class = %session.profile().class, %wire, "command sent");
    Ok(())
}

async fn send_acknowledged(session: &ConnectionSession, command: Command) -> LinkResult<()> {
    let profile = session.profile();
    let wire = command.wire_format();
    let transport = ProbeTransport::bind().await?;
    let reply = transport
        .exchange(wire.as_bytes(), session.endpoint(), profile.ack_timeout)
        .await?;

    let Some((reply, _)) = reply else {
        debug!(class = %profile.class, %wire, "no acknowledgment within window");
        return Err(LinkError::CommandTimeout(profile.class));
    };
    match profile.ack_success_token {
        Some(token) if reply == token => {
            info!(class = %profile.class, %wire, "command acknowledged");
            Ok(())
        }
        Some(_) => Err(LinkError::CommandRejected {
            class: profile.class,
            reply,
        }),
        // A profile without an ack token never routes here, but the reply
        // cannot be judged, so accept it.
        None => Ok(()),
    }
}
