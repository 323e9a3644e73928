//! Action execution: validate, serialize and write a merged [`ActionMap`].

use futures_util::{Sink, SinkExt};
use plugbot_proto::{IrcCodec, Message, NickExt, ProtocolError};
use tracing::{debug, warn};

use crate::action::{Action, ActionMap};
use crate::codec::{self, ActionContext};
use crate::error::{ClientError, ClientResult};

/// What happened to one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Wire lines written, in order, without terminators.
    pub sent: Vec<String>,
    /// Actions skipped by validation. The rest of the batch still ran.
    pub rejected: Vec<ClientError>,
}

fn check_body(body: &str) -> ClientResult<()> {
    if body.is_empty() {
        return Err(ClientError::InvalidPayload("empty message body".into()));
    }
    if let Some(c) = body.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
        return Err(ClientError::InvalidPayload(format!(
            "message body contains {:?}",
            c
        )));
    }
    Ok(())
}

/// Check one action against the session and render it.
pub fn prepare(action: &Action, ctx: &ActionContext<'_>) -> ClientResult<(Message, String)> {
    match action {
        Action::SendMessage { body } => check_body(body)?,
        Action::SendPrivateMessage { nick, body } => {
            if !nick.is_valid_nick() {
                return Err(ClientError::InvalidPayload(format!("invalid nick {nick:?}")));
            }
            check_body(body)?;
        }
        Action::Kick { nick, .. } | Action::Ban { nick } => {
            if !ctx.roster.contains(nick) {
                return Err(ClientError::UnknownTarget(nick.clone()));
            }
        }
    }

    let message = codec::serialize(action, ctx)?;
    let line = IrcCodec::new()
        .render(&message)
        .map_err(|e| ClientError::InvalidPayload(e.to_string()))?;
    Ok((message, line))
}

/// Run a batch in kind order. Validation failures skip one action; a write
/// failure aborts the rest of the batch.
pub async fn execute<W>(
    actions: &ActionMap,
    ctx: &ActionContext<'_>,
    writer: &mut W,
) -> ClientResult<ExecutionReport>
where
    W: Sink<Message, Error = ProtocolError> + Unpin,
{
    let mut report = ExecutionReport::default();
    for action in actions.iter() {
        let (message, line) = match prepare(action, ctx) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(action = %action.kind(), error = %e, code = e.error_code(), "action rejected");
                report.rejected.push(e);
                continue;
            }
        };

        writer.send(message).await.map_err(ClientError::from)?;
        debug!(line = %line, "action sent");
        report.sent.push(line);
    }
    Ok(report)
}
