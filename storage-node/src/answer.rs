//! Bounded waiting for a single answer.
//!
//! A round creates a fresh channel with [`answer_channel`], hands the sender
//! to whoever produces the answer (a participant, a stdin reader) and races
//! the receiver against a deadline with [`read_answer_with_timeout`].
//!
//! The channel holds one value, so the producer's write never blocks: it
//! either lands in the slot or fails because the round is already over.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Returned when no answer arrived in time. Valid answers are 0-based option
/// indices, so they are never negative.
pub const INVALID_ANSWER: i32 = -1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerError {
    #[error("the round already has an answer")]
    AlreadyAnswered,
    #[error("nobody is waiting for this answer anymore")]
    Abandoned,
}

pub fn answer_channel() -> (AnswerSender, AnswerReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (AnswerSender { tx }, AnswerReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct AnswerSender {
    tx: mpsc::Sender<i32>,
}

impl AnswerSender {
    /// Delivers `answer` without waiting.
    pub fn answer(&self, answer: i32) -> Result<(), AnswerError> {
        self.tx.try_send(answer).map_err(|err| match err {
            TrySendError::Full(_) => AnswerError::AlreadyAnswered,
            TrySendError::Closed(_) => AnswerError::Abandoned,
        })
    }

    /// True once the receiving side was consumed or dropped.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct AnswerReceiver {
    rx: mpsc::Receiver<i32>,
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Answered(i32),
    TimedOut,
    /// Every sender went away without answering.
    Closed,
}

impl Outcome {
    /// The answer, or [`INVALID_ANSWER`] when there is none.
    pub fn code(self) -> i32 {
        match self {
            Outcome::Answered(answer) => answer,
            Outcome::TimedOut | Outcome::Closed => INVALID_ANSWER,
        }
    }
}

/// Waits at most `deadline` for the answer on `source`.
///
/// A source whose senders are all gone can never produce an answer, so that
/// case returns [`Outcome::Closed`] right away instead of waiting out the
/// deadline. The receiver is consumed: once this returns, late writes fail
/// with [`AnswerError::Abandoned`].
pub async fn wait_for_answer(deadline: Duration, source: AnswerReceiver) -> Outcome {
    let AnswerReceiver { mut rx } = source;
    match tokio::time::timeout(deadline, rx.recv()).await {
        Ok(Some(answer)) => Outcome::Answered(answer),
        Ok(None) => {
            debug!("answer source closed without an answer");
            Outcome::Closed
        }
        Err(_) => {
            warn!(?deadline, "timed out waiting for answer");
            Outcome::TimedOut
        }
    }
}

/// Like [`wait_for_answer`], returning the answer verbatim or
/// [`INVALID_ANSWER`] when the round produced none.
pub async fn read_answer_with_timeout(deadline: Duration, source: AnswerReceiver) -> i32 {
    wait_for_answer(deadline, source).await.code()
}
