//! Progress reporting and cancellation for a conversion run.

use crate::prelude::*;
use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

/// One progress notification. `-1` means "unknown" or "unchanged".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate<'a> {
  pub label: Option<&'a str>,
  pub current: i64,
  pub maximum: i64,
}

impl<'a> ProgressUpdate<'a> {
  pub fn labelled(label: &'a str, current: i64, maximum: i64) -> Self {
    Self {
      label: Some(label),
      current,
      maximum,
    }
  }

  pub fn position(current: i64) -> Self {
    Self {
      label: None,
      current,
      maximum: -1,
    }
  }
}

/// Receives progress notifications from a conversion run.
pub trait ProgressSink {
  fn update(&mut self, update: ProgressUpdate<'_>);

  /// Called once after the image has been fully written.
  fn finished(&mut self) {}

  /// Called once when the run stops with an error, including cancellation.
  fn aborted(&mut self, _error: &Error) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
  fn update(&mut self, _: ProgressUpdate<'_>) {}
}

impl<F> ProgressSink for F
where
  F: FnMut(ProgressUpdate<'_>),
{
  fn update(&mut self, update: ProgressUpdate<'_>) {
    self(update)
  }
}

/// Shared flag polled by a running conversion. Cloning shares the flag.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }

  /// Fails with [`Error::Cancelled`] once [`CancellationToken::cancel`] was called.
  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() {
      Err(Error::Cancelled)
    } else {
      Ok(())
    }
  }
}
