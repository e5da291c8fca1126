//! Async delivery loops, one per channel, feeding a shared router.

use std::sync::Arc;

use bytes::Bytes;
use kernelgate_wire::Channel;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RouteError;
use crate::router::{ChannelRouter, RouteOutcome};

/// Frame sets queued per channel before the transport is back-pressured.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// Every sender was dropped.
    SendersClosed,
    /// The cancellation token fired.
    Cancelled,
    /// The session was torn down.
    SessionClosed,
}

/// Counts for one pump run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    pub channel: Channel,
    pub dispatched: u64,
    pub unhandled: u64,
    pub failed: u64,
    pub dropped: u64,
    pub exit: PumpExit,
}

/// Route every frame set received on `rx` until the senders close, `cancel`
/// fires or the session is torn down.
///
/// A handler already running when cancellation fires finishes normally.
pub async fn pump_channel(
    router: Arc<ChannelRouter>,
    channel: Channel,
    mut rx: mpsc::Receiver<Vec<Bytes>>,
    cancel: CancellationToken,
) -> PumpReport {
    let mut report = PumpReport {
        channel,
        dispatched: 0,
        unhandled: 0,
        failed: 0,
        dropped: 0,
        exit: PumpExit::SendersClosed,
    };

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.exit = PumpExit::Cancelled;
                break;
            }
            frames = rx.recv() => {
                let Some(frames) = frames else {
                    report.exit = PumpExit::SendersClosed;
                    break;
                };
                match router.handle(channel, &frames) {
                    RouteOutcome::Dispatched => report.dispatched += 1,
                    RouteOutcome::Unhandled => report.unhandled += 1,
                    RouteOutcome::HandlerFailed => report.failed += 1,
                    RouteOutcome::Dropped(RouteError::SessionClosed(_)) => {
                        report.dropped += 1;
                        report.exit = PumpExit::SessionClosed;
                        break;
                    }
                    RouteOutcome::Dropped(_) => report.dropped += 1,
                }
            }
        }
    }

    tracing::debug!(
        channel = %channel,
        kernel_id = router.session().kernel_id(),
        dispatched = report.dispatched,
        unhandled = report.unhandled,
        failed = report.failed,
        dropped = report.dropped,
        exit = ?report.exit,
        "channel pump stopped"
    );
    report
}

/// Per-channel senders and tasks for one session.
#[derive(Debug)]
pub struct SessionPumps {
    senders: Vec<(Channel, mpsc::Sender<Vec<Bytes>>)>,
    tasks: Vec<JoinHandle<PumpReport>>,
    cancel: CancellationToken,
}

impl SessionPumps {
    /// Sender feeding `channel`'s pump.
    pub fn sender(&self, channel: Channel) -> Option<mpsc::Sender<Vec<Bytes>>> {
        self.senders
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, tx)| tx.clone())
    }

    /// Token that stops every pump of this session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel all pumps without waiting for them.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Drop the senders and wait for every pump to drain.
    ///
    /// Reports of pumps that panicked are omitted.
    pub async fn join(self) -> Vec<PumpReport> {
        let Self { senders, tasks, .. } = self;
        drop(senders);

        let mut reports = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(report) => reports.push(report),
                Err(err) => tracing::error!(error = %err, "channel pump task failed"),
            }
        }
        reports
    }
}

/// Spawn one pump per channel, all sharing `router`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_session_pumps(
    router: Arc<ChannelRouter>,
    queue_depth: usize,
    cancel: CancellationToken,
) -> SessionPumps {
    let mut senders = Vec::with_capacity(Channel::ALL.len());
    let mut tasks = Vec::with_capacity(Channel::ALL.len());

    for channel in Channel::ALL {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let task = tokio::spawn(pump_channel(
            Arc::clone(&router),
            channel,
            rx,
            cancel.child_token(),
        ));
        senders.push((channel, tx));
        tasks.push(task);
    }

    SessionPumps {
        senders,
        tasks,
        cancel,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kernelgate_wire::{encode, MessageDraft, ProtocolMessage, Signer};

    use super::*;
    use crate::config::SessionConfig;
    use crate::session::KernelSession;

    fn router() -> Arc<ChannelRouter> {
        let session = KernelSession::new(SessionConfig::new("container-1", "S1", "abc123")).unwrap();
        Arc::new(ChannelRouter::new(Arc::new(session)))
    }

    fn signed(msg_type: &str) -> Vec<Bytes> {
        encode(&MessageDraft::new(msg_type), "kernel", "S1", &Signer::new("abc123")).unwrap()
    }

    #[tokio::test]
    async fn pump_routes_until_senders_close() {
        let router = router();
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&hits);
        router.session().tables().iopub().register(
            "status",
            move |_: Channel, _: &ProtocolMessage| {
                sink.fetch_add(1, Ordering::SeqCst);
            },
        );

        let (tx, rx) = mpsc::channel(8);
        let pump = tokio::spawn(pump_channel(
            Arc::clone(&router),
            Channel::IoPub,
            rx,
            CancellationToken::new(),
        ));

        tx.send(signed("status")).await.unwrap();
        tx.send(signed("stream")).await.unwrap();
        tx.send(vec![Bytes::from_static(b"junk")]).await.unwrap();
        drop(tx);

        let report = pump.await.unwrap();
        assert_eq!(report.exit, PumpExit::SendersClosed);
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.unhandled, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pump_stops_on_cancel() {
        let router = router();
        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump_channel(router, Channel::Shell, rx, cancel.clone()));

        cancel.cancel();

        let report = pump.await.unwrap();
        assert_eq!(report.exit, PumpExit::Cancelled);
        assert_eq!(report.dispatched, 0);
    }

    #[tokio::test]
    async fn pump_stops_when_session_closes() {
        let router = router();
        let (tx, rx) = mpsc::channel(8);
        let pump = tokio::spawn(pump_channel(
            Arc::clone(&router),
            Channel::Shell,
            rx,
            CancellationToken::new(),
        ));

        router.session().close();
        tx.send(signed("kernel_info_reply")).await.unwrap();

        let report = pump.await.unwrap();
        assert_eq!(report.exit, PumpExit::SessionClosed);
        assert_eq!(report.dropped, 1);
        assert_eq!(router.stats().dropped, report.dropped);
    }

    #[tokio::test]
    async fn panicking_handler_keeps_the_channel_alive() {
        let router = router();
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&hits);
        let shell = router.session().tables().shell();
        shell.register("boom", |_: Channel, _: &ProtocolMessage| {
            panic!("handler exploded");
        });
        shell.register(
            "kernel_info_reply",
            move |_: Channel, _: &ProtocolMessage| {
                sink.fetch_add(1, Ordering::SeqCst);
            },
        );

        let pumps = spawn_session_pumps(Arc::clone(&router), DEFAULT_QUEUE_DEPTH, CancellationToken::new());
        let tx = pumps.sender(Channel::Shell).unwrap();
        tx.send(signed("boom")).await.unwrap();
        tx.send(signed("kernel_info_reply")).await.unwrap();
        drop(tx);

        let reports = pumps.join().await;
        assert_eq!(reports.len(), 4);
        let shell_report = reports
            .iter()
            .find(|r| r.channel == Channel::Shell)
            .unwrap();
        assert_eq!(shell_report.exit, PumpExit::SendersClosed);
        assert_eq!(shell_report.failed, 1);
        assert_eq!(shell_report.dispatched, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(router.stats().failed, 1);
    }

    #[tokio::test]
    async fn session_pumps_share_one_router() {
        let router = router();
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&hits);
        router.session().tables().shell().register(
            "shutdown_reply",
            move |_: Channel, _: &ProtocolMessage| {
                sink.fetch_add(1, Ordering::SeqCst);
            },
        );

        let pumps = spawn_session_pumps(Arc::clone(&router), DEFAULT_QUEUE_DEPTH, CancellationToken::new());
        for channel in [Channel::Shell, Channel::Control] {
            pumps
                .sender(channel)
                .unwrap()
                .send(signed("shutdown_reply"))
                .await
                .unwrap();
        }

        let reports = pumps.join().await;
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.exit == PumpExit::SendersClosed));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(router.stats().dispatched, 2);
    }

    #[tokio::test]
    async fn shutdown_cancels_every_pump() {
        let pumps = spawn_session_pumps(router(), 4, CancellationToken::new());
        let _held: Vec<_> = Channel::ALL
            .iter()
            .filter_map(|c| pumps.sender(*c))
            .collect();

        pumps.shutdown();
        let reports = pumps.join().await;
        assert!(reports.iter().all(|r| r.exit == PumpExit::Cancelled));
    }
}
