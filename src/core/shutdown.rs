//! # Sources of shutdown signals.
//!
//! The orchestrator reads signals through [`SignalSource`], so tests and
//! embedders can inject them:
//!
//! - [`OsSignals`] real process signals, registered from a [`SignalPolicy`]
//! - `mpsc::Receiver<Signal>` signals sent over a channel
//! - [`NoSignals`] never yields (cancellation-only runs)
//!
//! `recv` returning `None` means the source is exhausted; the orchestrator then
//! stops listening and relies on its cancellation token.
//!
//! **Unix:** SIGHUP, SIGINT, SIGTERM and SIGQUIT can be registered.
//! **Other platforms:** only Ctrl-C, reported as [`Signal::Interrupt`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::policies::{Signal, SignalPolicy};

/// Something that yields shutdown signals.
#[async_trait]
pub trait SignalSource: Send {
    /// Next signal, or `None` once the source can yield no more.
    async fn recv(&mut self) -> Option<Signal>;
}

/// A source that never yields.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSignals;

#[async_trait]
impl SignalSource for NoSignals {
    async fn recv(&mut self) -> Option<Signal> {
        None
    }
}

#[async_trait]
impl SignalSource for mpsc::Receiver<Signal> {
    async fn recv(&mut self) -> Option<Signal> {
        mpsc::Receiver::recv(self).await
    }
}

/// Process signal listeners for every signal named by a policy.
///
/// Listeners are registered in [`OsSignals::listen`] and live as long as the
/// value.
pub struct OsSignals {
    #[cfg(unix)]
    streams: Vec<(Signal, tokio::signal::unix::Signal)>,
    #[cfg(not(unix))]
    ctrl_c: bool,
}

impl OsSignals {
    /// Registers listeners for the signals in `policy`.
    ///
    /// Returns `Err` if the OS refuses a registration.
    #[cfg(unix)]
    pub fn listen(policy: &SignalPolicy) -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut streams = Vec::new();
        for sig in policy.signals() {
            let kind = match sig {
                Signal::Hangup => SignalKind::hangup(),
                Signal::Interrupt => SignalKind::interrupt(),
                Signal::Terminate => SignalKind::terminate(),
                Signal::Quit => SignalKind::quit(),
            };
            streams.push((sig, signal(kind)?));
        }
        Ok(Self { streams })
    }

    /// Registers Ctrl-C if `policy` names [`Signal::Interrupt`].
    #[cfg(not(unix))]
    pub fn listen(policy: &SignalPolicy) -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: policy.wait_for(Signal::Interrupt).is_some(),
        })
    }
}

#[async_trait]
impl SignalSource for OsSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<Signal> {
        use futures::FutureExt;

        if self.streams.is_empty() {
            return None;
        }
        let waits = self
            .streams
            .iter_mut()
            .map(|(sig, stream)| {
                let sig = *sig;
                async move { stream.recv().await.map(|()| sig) }.boxed()
            })
            .collect::<Vec<_>>();
        let (got, _, _) = futures::future::select_all(waits).await;
        got
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<Signal> {
        if !self.ctrl_c {
            return None;
        }
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(Signal::Interrupt),
            Err(_) => None,
        }
    }
}
