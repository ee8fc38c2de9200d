//! Process-level triggers.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGQUIT, SIGHUP)
//! - Merge them with in-process trigger sources (config watcher, tests)
//! - Translate everything into a [`Trigger`]
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP means reload, which the orchestrator implements as a restart
//! - A closed channel source simply stops producing triggers

use std::future::pending;

use tokio::sync::mpsc;

/// What the process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Stop serving and exit.
    Terminate,
    /// Stop serving and start a fresh instance of the process.
    Reload,
}

/// Combined stream of triggers from OS signals and in-process channels.
#[derive(Debug, Default)]
pub struct Triggers {
    signals: Option<SignalSet>,
    channel: Option<mpsc::UnboundedReceiver<Trigger>>,
}

impl Triggers {
    /// Triggers from OS signals only.
    pub fn from_signals() -> std::io::Result<Self> {
        Ok(Self {
            signals: Some(SignalSet::register()?),
            channel: None,
        })
    }

    /// Triggers from a channel only.
    pub fn from_channel(rx: mpsc::UnboundedReceiver<Trigger>) -> Self {
        Self {
            signals: None,
            channel: Some(rx),
        }
    }

    /// Add a channel source.
    pub fn with_channel(mut self, rx: mpsc::UnboundedReceiver<Trigger>) -> Self {
        self.channel = Some(rx);
        self
    }

    /// Wait for the next trigger from any source. Pends forever if there is none.
    pub async fn next(&mut self) -> Trigger {
        let Self { signals, channel } = self;
        tokio::select! {
            trigger = next_signal(signals) => trigger,
            trigger = next_message(channel) => trigger,
        }
    }
}

async fn next_signal(signals: &mut Option<SignalSet>) -> Trigger {
    match signals {
        Some(signals) => signals.recv().await,
        None => pending().await,
    }
}

async fn next_message(channel: &mut Option<mpsc::UnboundedReceiver<Trigger>>) -> Trigger {
    if let Some(rx) = channel {
        if let Some(trigger) = rx.recv().await {
            tracing::info!(?trigger, "Trigger received");
            return trigger;
        }
        *channel = None;
    }
    pending().await
}

#[cfg(unix)]
#[derive(Debug)]
struct SignalSet {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalSet {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) -> Trigger {
        let (name, trigger) = tokio::select! {
            _ = self.terminate.recv() => ("SIGTERM", Trigger::Terminate),
            _ = self.interrupt.recv() => ("SIGINT", Trigger::Terminate),
            _ = self.quit.recv() => ("SIGQUIT", Trigger::Terminate),
            _ = self.hangup.recv() => ("SIGHUP", Trigger::Reload),
        };
        tracing::info!(signal = name, ?trigger, "Signal received");
        trigger
    }
}

#[cfg(not(unix))]
#[derive(Debug)]
struct SignalSet;

#[cfg(not(unix))]
impl SignalSet {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Trigger {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return pending().await;
        }
        tracing::info!(signal = "ctrl-c", "Signal received");
        Trigger::Terminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn channel_triggers_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut triggers = Triggers::from_channel(rx);

        tx.send(Trigger::Reload).unwrap();
        tx.send(Trigger::Terminate).unwrap();
        assert_eq!(triggers.next().await, Trigger::Reload);
        assert_eq!(triggers.next().await, Trigger::Terminate);
    }

    #[tokio::test]
    async fn closed_channel_never_fires() {
        let (tx, rx) = mpsc::unbounded_channel::<Trigger>();
        drop(tx);
        let mut triggers = Triggers::from_channel(rx);

        let waited = tokio::time::timeout(Duration::from_millis(50), triggers.next()).await;
        assert!(waited.is_err());
    }
}
