//! Progress reporting decoupled from any frontend. The conversion core calls
//! a [`Reporter`]; frontends decide whether that feeds a terminal, a channel
//! consumed by a UI thread, or nothing at all.

use std::sync::mpsc::Sender;

/// Sink for conversion progress. Implementations must be cheap; the core
/// calls these from its hot loop.
pub trait Reporter: Send + Sync {
    /// Free-form progress line.
    fn message(&self, _msg: &str) {}

    /// Declare the total number of units of upcoming work.
    fn bar_total(&self, _total: usize) {}

    /// One unit of work finished.
    fn bar_advance(&self) {}
}

/// Reporter that discards everything.
#[derive(Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Message emitted by [`ChannelReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportMsg {
    Message(String),
    BarTotal(usize),
    BarAdvance,
}

/// Reporter that forwards every event over an mpsc channel, for frontends
/// that render progress on a dedicated thread.
pub struct ChannelReporter {
    tx: Sender<ReportMsg>,
}

impl ChannelReporter {
    pub fn new(tx: Sender<ReportMsg>) -> Self {
        Self { tx }
    }
}

impl Reporter for ChannelReporter {
    fn message(&self, msg: &str) {
        let _ = self.tx.send(ReportMsg::Message(msg.to_owned()));
    }

    fn bar_total(&self, total: usize) {
        let _ = self.tx.send(ReportMsg::BarTotal(total));
    }

    fn bar_advance(&self) {
        let _ = self.tx.send(ReportMsg::BarAdvance);
    }
}

/// Reporter that mirrors messages into tracing, used by the CLI.
#[derive(Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn message(&self, msg: &str) {
        tracing::info!("{msg}");
    }
}
