//! Cooperative cancellation for the capture loop.
//!
//! The signal handler only flips a shared flag. The controller checks the
//! flag between polls and releases its resources itself.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM.
///
/// Signals are awaited on a dedicated thread driving a current-thread tokio
/// runtime, so the capture loop itself stays synchronous.
pub fn install_interrupt_handler(token: CancelToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Register before spawning so a failure surfaces to the caller.
    let signals = {
        let _guard = runtime.enter();
        Signals::register()?
    };

    std::thread::Builder::new()
        .name("interrupt-handler".into())
        .spawn(move || {
            if runtime.block_on(signals.wait()) {
                token.cancel();
            }
        })?;

    Ok(())
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn wait(mut self) -> bool {
        tokio::select! {
            _ = self.interrupt.recv() => tracing::info!("Received Ctrl+C, stopping capture"),
            _ = self.terminate.recv() => tracing::info!("Received SIGTERM, stopping capture"),
        }
        true
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> io::Result<Self> {
        Ok(Self)
    }

    async fn wait(self) -> bool {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, stopping capture");
                true
            }
            Err(e) => {
                tracing::warn!("Ctrl+C handler failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
