//! Shared state of a live invocation.
//!
//! The record and the channel sender live under one lock, so an event is
//! appended to the log and sent on the channel in the same step, and the
//! terminal result is sent strictly after every accepted event.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use taskbox_core::{
    CoreError, InvocationRecord, InvocationReport, InvocationStatus, ProgressUpdate,
    TerminalResult,
};

use crate::channel::{InvocationUpdate, UpdateSender};

pub(crate) struct InvocationShared {
    state: Mutex<State>,
}

struct State {
    record: InvocationRecord,
    /// Dropped once the terminal result is sent, closing the channel.
    sender: Option<UpdateSender>,
}

impl InvocationShared {
    pub(crate) fn new(record: InvocationRecord, sender: UpdateSender) -> Self {
        Self {
            state: Mutex::new(State {
                record,
                sender: Some(sender),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn start(&self) -> Result<DateTime<Utc>, CoreError> {
        self.lock().record.start()
    }

    /// Record a progress event and forward it to the subscriber.
    pub(crate) fn emit(&self, update: ProgressUpdate) -> Result<(), CoreError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let event = state.record.push_progress(update)?;
        if let Some(sender) = &state.sender {
            sender.send(InvocationUpdate::Progress(event));
        }
        Ok(())
    }

    pub(crate) fn begin_output_validation(&self) -> Result<(), CoreError> {
        self.lock().record.begin_output_validation()
    }

    /// Record the terminal result, deliver it and close the channel.
    pub(crate) fn finish(&self, result: TerminalResult) -> Result<(), CoreError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.record.finish(result.clone())?;
        if let Some(sender) = state.sender.take() {
            sender.send(InvocationUpdate::Finished(result));
        }
        Ok(())
    }

    pub(crate) fn status(&self) -> InvocationStatus {
        self.lock().record.status()
    }

    pub(crate) fn report(&self) -> InvocationReport {
        self.lock().record.report()
    }
}
