//! A communication channel used to send/receive tagged messages to/from the other party.
//!
//! Every message carries a [`Tag`]. Primitive calls that run concurrently always use disjoint
//! tags (see [`crate::tags`]), so a receiver can pair each message with the call waiting for it
//! regardless of the order in which the messages arrive.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    future::Future,
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    sync::{
        Mutex,
        mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
        oneshot,
    },
    time::timeout,
};
use tracing::trace;

use crate::tags::Tag;

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug)]
pub struct Error {
    /// The protocol phase during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug)]
pub enum ErrorKind {
    /// The (serialized) message could not be received over the channel.
    RecvError(String),
    /// The (serialized) message could not be sent over the channel.
    SendError(String),
    /// The message could not be serialized (before sending it out).
    SerdeError(String),
    /// The message is a Vec, but not of the expected length.
    InvalidLength,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ErrorKind::RecvError(e) => write!(f, "could not receive {}: {e}", self.phase),
            ErrorKind::SendError(e) => write!(f, "could not send {}: {e}", self.phase),
            ErrorKind::SerdeError(e) => write!(f, "could not (de)serialize {}: {e}", self.phase),
            ErrorKind::InvalidLength => write!(f, "unexpected message length in {}", self.phase),
        }
    }
}

impl std::error::Error for Error {}

/// A communication channel used to send/receive tagged messages to/from the other party.
///
/// Methods take `&self` so that concurrent primitive calls can share one channel. An
/// implementation must deliver a message only to a receive call with the same tag.
pub trait Channel {
    /// The error that can occur sending messages over the channel.
    type SendError: fmt::Debug;
    /// The error that can occur receiving messages over the channel.
    type RecvError: fmt::Debug;

    /// Sends a message with the given tag to the party with the given index.
    fn send_bytes_to(
        &self,
        party: usize,
        tag: Tag,
        msg: Vec<u8>,
    ) -> impl Future<Output = Result<(), Self::SendError>> + Send;

    /// Awaits the message with the given tag from the party with the given index.
    fn recv_bytes_from(
        &self,
        party: usize,
        tag: Tag,
    ) -> impl Future<Output = Result<Vec<u8>, Self::RecvError>> + Send;
}

/// Serializes and sends a message to the other party.
pub(crate) async fn send_to(
    channel: &impl Channel,
    party: usize,
    tag: Tag,
    phase: &str,
    msg: &impl Serialize,
) -> Result<(), Error> {
    let msg = bincode::serialize(msg).map_err(|e| Error {
        phase: format!("sending {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })?;
    trace!(party, tag, bytes = msg.len(), "sending {phase}");
    channel
        .send_bytes_to(party, tag, msg)
        .await
        .map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::SendError(format!("{e:?}")),
        })
}

/// Receives and deserializes a message from the other party.
pub(crate) async fn recv_from<T: DeserializeOwned>(
    channel: &impl Channel,
    party: usize,
    tag: Tag,
    phase: &str,
) -> Result<T, Error> {
    let msg = channel
        .recv_bytes_from(party, tag)
        .await
        .map_err(|e| Error {
            phase: phase.to_string(),
            reason: ErrorKind::RecvError(format!("{e:?}")),
        })?;
    bincode::deserialize(&msg).map_err(|e| Error {
        phase: format!("receiving {phase}"),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })
}

/// Receives and deserializes a Vec from the other party (while checking the length).
pub(crate) async fn recv_vec_from<T: DeserializeOwned>(
    channel: &impl Channel,
    party: usize,
    tag: Tag,
    phase: &str,
    len: usize,
) -> Result<Vec<T>, Error> {
    let v: Vec<T> = recv_from(channel, party, tag, phase).await?;
    if v.len() == len {
        Ok(v)
    } else {
        Err(Error {
            phase: phase.to_string(),
            reason: ErrorKind::InvalidLength,
        })
    }
}

type Envelope = (Tag, Vec<u8>);

/// Messages from one peer that arrived before anybody asked for their tag, and the receive
/// calls still waiting for theirs.
#[derive(Debug, Default)]
struct Mailbox {
    stash: HashMap<Tag, VecDeque<Vec<u8>>>,
    waiting: HashMap<Tag, VecDeque<oneshot::Sender<Vec<u8>>>>,
}

impl Mailbox {
    fn take_stashed(&mut self, tag: Tag) -> Option<Vec<u8>> {
        let queue = self.stash.get_mut(&tag)?;
        let msg = queue.pop_front();
        if queue.is_empty() {
            self.stash.remove(&tag);
        }
        msg
    }

    /// Hands `msg` to the oldest receive call still waiting for `tag`, or stashes it.
    fn deliver(&mut self, tag: Tag, mut msg: Vec<u8>) {
        if let Some(waiters) = self.waiting.get_mut(&tag) {
            while let Some(waiter) = waiters.pop_front() {
                match waiter.send(msg) {
                    Ok(()) => {
                        if waiters.is_empty() {
                            self.waiting.remove(&tag);
                        }
                        return;
                    }
                    // the receive call was dropped
                    Err(returned) => msg = returned,
                }
            }
            self.waiting.remove(&tag);
        }
        self.stash.entry(tag).or_default().push_back(msg);
    }
}

/// The incoming messages of one peer.
///
/// The mpsc receiver is read by at most one receive call at a time, which routes every message
/// it reads to the call waiting for that tag. The mailbox lock is never held across an await,
/// so a call whose message has already been routed never waits for the reader.
#[derive(Debug)]
struct Inbox {
    receiver: Mutex<UnboundedReceiver<Envelope>>,
    mailbox: Mutex<Mailbox>,
}

impl Inbox {
    fn new(receiver: UnboundedReceiver<Envelope>) -> Self {
        Self {
            receiver: Mutex::new(receiver),
            mailbox: Mutex::new(Mailbox::default()),
        }
    }

    async fn recv(&self, tag: Tag) -> Result<Vec<u8>, AsyncRecvError> {
        let mut delivered = {
            let mut mailbox = self.mailbox.lock().await;
            if let Some(msg) = mailbox.take_stashed(tag) {
                return Ok(msg);
            }
            let (sender, delivered) = oneshot::channel();
            mailbox.waiting.entry(tag).or_default().push_back(sender);
            delivered
        };
        tokio::select! {
            msg = &mut delivered => msg.map_err(|_| AsyncRecvError::Closed),
            mut receiver = self.receiver.lock() => loop {
                tokio::select! {
                    biased;
                    msg = &mut delivered => break msg.map_err(|_| AsyncRecvError::Closed),
                    envelope = receiver.recv() => match envelope {
                        Some((t, msg)) => self.mailbox.lock().await.deliver(t, msg),
                        None => break Err(AsyncRecvError::Closed),
                    },
                }
            },
        }
    }
}

/// A simple in-memory channel using tokio's unbounded mpsc channels.
#[derive(Debug)]
pub struct SimpleChannel {
    s: Vec<Option<UnboundedSender<Envelope>>>,
    r: Vec<Option<Inbox>>,
}

impl SimpleChannel {
    /// Creates the two connected channels of a two-party computation.
    pub fn pair() -> (Self, Self) {
        let (send_0_to_1, recv_0_to_1) = unbounded_channel();
        let (send_1_to_0, recv_1_to_0) = unbounded_channel();
        let p0 = SimpleChannel {
            s: vec![None, Some(send_0_to_1)],
            r: vec![None, Some(Inbox::new(recv_1_to_0))],
        };
        let p1 = SimpleChannel {
            s: vec![Some(send_1_to_0), None],
            r: vec![Some(Inbox::new(recv_0_to_1)), None],
        };
        (p0, p1)
    }
}

/// The error raised by `send` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncSendError {
    /// The receiving side has been dropped.
    Closed,
    /// There is no channel to the given party.
    UnknownParty(usize),
}

/// The error raised by `recv` calls of a [`SimpleChannel`].
#[derive(Debug)]
pub enum AsyncRecvError {
    /// The channel has been closed.
    Closed,
    /// No message was received before the timeout.
    TimeoutElapsed,
    /// There is no channel from the given party.
    UnknownParty(usize),
}

impl Channel for SimpleChannel {
    type SendError = AsyncSendError;
    type RecvError = AsyncRecvError;

    async fn send_bytes_to(&self, p: usize, tag: Tag, msg: Vec<u8>) -> Result<(), AsyncSendError> {
        let sender = self
            .s
            .get(p)
            .and_then(Option::as_ref)
            .ok_or(AsyncSendError::UnknownParty(p))?;
        sender
            .send((tag, msg))
            .map_err(|_| AsyncSendError::Closed)
    }

    async fn recv_bytes_from(&self, p: usize, tag: Tag) -> Result<Vec<u8>, AsyncRecvError> {
        let inbox = self
            .r
            .get(p)
            .and_then(Option::as_ref)
            .ok_or(AsyncRecvError::UnknownParty(p))?;
        timeout(Duration::from_secs(10 * 60), inbox.recv(tag))
            .await
            .map_err(|_| AsyncRecvError::TimeoutElapsed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_are_paired_by_tag() -> Result<(), Error> {
        let (a, b) = SimpleChannel::pair();
        send_to(&a, 1, 7, "first", &vec![1u64, 2]).await?;
        send_to(&a, 1, 3, "second", &vec![3u64]).await?;
        send_to(&a, 1, 7, "third", &vec![4u64, 5]).await?;

        let second: Vec<u64> = recv_vec_from(&b, 0, 3, "second", 1).await?;
        let first: Vec<u64> = recv_vec_from(&b, 0, 7, "first", 2).await?;
        let third: Vec<u64> = recv_vec_from(&b, 0, 7, "third", 2).await?;
        assert_eq!(second, vec![3]);
        assert_eq!(first, vec![1, 2]);
        assert_eq!(third, vec![4, 5]);
        Ok(())
    }

    #[tokio::test]
    async fn length_is_checked() -> Result<(), Error> {
        let (a, b) = SimpleChannel::pair();
        send_to(&b, 0, 0, "short", &vec![1u64]).await?;
        let result = recv_vec_from::<u64>(&a, 1, 0, "short", 2).await;
        assert!(matches!(
            result,
            Err(Error {
                reason: ErrorKind::InvalidLength,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rounds_on_separate_tasks() {
        let (a, b) = SimpleChannel::pair();
        let party = |channel: SimpleChannel, other: usize| {
            tokio::spawn(async move {
                let channel = &channel;
                let chunks = (0..64u64).map(|chunk| async move {
                    let mut value = chunk;
                    for round in 0..8 {
                        let tag = chunk * 8 + round;
                        send_to(channel, other, tag, "round", &value).await?;
                        let theirs: u64 = recv_from(channel, other, tag, "round").await?;
                        value = value.wrapping_add(theirs);
                    }
                    Ok::<_, Error>(value)
                });
                futures::future::try_join_all(chunks).await
            })
        };
        let (p0, p1) = (party(a, 1), party(b, 0));
        let both = timeout(Duration::from_secs(30), async { (p0.await, p1.await) });
        let (r0, r1) = both.await.expect("parties stopped making progress");
        let r0 = r0.expect("party 0 panicked").expect("party 0 failed");
        let r1 = r1.expect("party 1 panicked").expect("party 1 failed");
        let expected: Vec<u64> = (0..64).map(|chunk| chunk << 8).collect();
        assert_eq!(r0, expected);
        assert_eq!(r1, expected);
    }

    #[tokio::test]
    async fn closed_peer_is_reported() {
        let (a, b) = SimpleChannel::pair();
        drop(b);
        let result = recv_from::<Vec<u64>>(&a, 1, 0, "nothing").await;
        assert!(matches!(
            result,
            Err(Error {
                reason: ErrorKind::RecvError(_),
                ..
            })
        ));
    }
}
