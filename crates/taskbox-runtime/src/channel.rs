//! Per-invocation progress channel.
//!
//! The channel carries progress events followed by exactly one terminal
//! result. Sending never blocks the task body; what happens when the reader
//! falls behind depends on the [`ProgressBuffer`] policy.

use taskbox_core::{ProgressEvent, TerminalResult};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

/// Buffering policy of the progress channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressBuffer {
    /// Buffer every update until read. No loss.
    #[default]
    Unbounded,
    /// Keep at most `capacity` unread updates; older ones are dropped and the
    /// reader gets a [`InvocationUpdate::Lagged`] marker instead.
    DropOldest { capacity: usize },
}

/// Largest bound for [`ProgressBuffer::DropOldest`]. The ring is allocated up
/// front, so larger requests are lowered to this.
pub const MAX_PROGRESS_CAPACITY: usize = 1 << 16;

impl ProgressBuffer {
    /// Bounded policy. The capacity is kept within `1..=MAX_PROGRESS_CAPACITY`.
    pub fn drop_oldest(capacity: usize) -> Self {
        Self::DropOldest {
            capacity: bounded_capacity(capacity),
        }
    }
}

fn bounded_capacity(capacity: usize) -> usize {
    capacity.clamp(1, MAX_PROGRESS_CAPACITY)
}

/// One item read from an invocation's channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationUpdate {
    /// A progress event, in emission order.
    Progress(ProgressEvent),
    /// The reader fell behind and `skipped` updates were dropped.
    Lagged { skipped: u64 },
    /// The terminal result. Always the last item.
    Finished(TerminalResult),
}

impl InvocationUpdate {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

pub(crate) enum UpdateSender {
    Unbounded(mpsc::UnboundedSender<InvocationUpdate>),
    Broadcast(broadcast::Sender<InvocationUpdate>),
}

impl UpdateSender {
    /// Never blocks. A dropped reader is not an error.
    pub(crate) fn send(&self, update: InvocationUpdate) {
        match self {
            Self::Unbounded(tx) => {
                tx.send(update).ok();
            }
            Self::Broadcast(tx) => {
                tx.send(update).ok();
            }
        }
    }
}

enum UpdateReceiver {
    Unbounded(mpsc::UnboundedReceiver<InvocationUpdate>),
    Broadcast(broadcast::Receiver<InvocationUpdate>),
}

/// Reading end of an invocation's channel.
pub struct ProgressSubscriber {
    inner: UpdateReceiver,
    finished: bool,
}

impl ProgressSubscriber {
    /// Next update, or `None` once the terminal result has been read.
    pub async fn recv(&mut self) -> Option<InvocationUpdate> {
        if self.finished {
            return None;
        }

        let update = match &mut self.inner {
            UpdateReceiver::Unbounded(rx) => rx.recv().await?,
            UpdateReceiver::Broadcast(rx) => match rx.recv().await {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => InvocationUpdate::Lagged { skipped },
                Err(RecvError::Closed) => return None,
            },
        };

        if update.is_finished() {
            self.finished = true;
        }
        Some(update)
    }
}

pub(crate) fn channel(buffer: ProgressBuffer) -> (UpdateSender, ProgressSubscriber) {
    let (sender, inner) = match buffer {
        ProgressBuffer::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (UpdateSender::Unbounded(tx), UpdateReceiver::Unbounded(rx))
        }
        ProgressBuffer::DropOldest { capacity } => {
            let (tx, rx) = broadcast::channel(bounded_capacity(capacity));
            (UpdateSender::Broadcast(tx), UpdateReceiver::Broadcast(rx))
        }
    };
    (
        sender,
        ProgressSubscriber {
            inner,
            finished: false,
        },
    )
}
