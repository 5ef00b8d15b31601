//! Event-driven playback
//!
//! Applies [`ReceiverEvent`]s to a [`DecodeSession`] on the thread that owns
//! the session, so `feed` and `release` never race. The player stops at the
//! first disconnect or error and releases the session; reconnecting needs a
//! fresh session.

use std::ops::ControlFlow;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::client::ReceiverEvent;
use crate::stats::PlaybackStats;

use super::accelerator::Platform;
use super::decode::DecodeSession;

/// Drives a decode session from receiver events
pub struct Player<'s, P: Platform> {
    session: DecodeSession<'s, P>,
    stats: PlaybackStats,
    last_error: Option<String>,
}

impl<'s, P: Platform> Player<'s, P> {
    /// Wrap a session. It should already be configured; feeds to an
    /// unconfigured session are ignored.
    pub fn new(session: DecodeSession<'s, P>) -> Self {
        Self {
            session,
            stats: PlaybackStats::new(),
            last_error: None,
        }
    }

    /// Apply one event. `Break` once the stream is over.
    pub fn handle(&mut self, event: ReceiverEvent) -> ControlFlow<()> {
        match event {
            ReceiverEvent::Frame(nal) => {
                self.stats.frames += 1;
                self.session.feed(&nal, None);
                ControlFlow::Continue(())
            }
            ReceiverEvent::ConnectionChanged {
                connected: true, ..
            } => {
                tracing::info!("Streaming started");
                self.stats.started_at = Some(Instant::now());
                ControlFlow::Continue(())
            }
            ReceiverEvent::ConnectionChanged {
                connected: false,
                message,
            } => {
                tracing::info!(
                    reason = message.as_deref().unwrap_or("Connection lost"),
                    frames = self.stats.frames,
                    elapsed = %self.stats.elapsed_hms(),
                    "Streaming stopped"
                );
                self.stop();
                ControlFlow::Break(())
            }
            ReceiverEvent::Error(message) => {
                tracing::error!(error = %message, "Receiver error");
                self.last_error = Some(message);
                self.stop();
                ControlFlow::Break(())
            }
        }
    }

    /// Consume events from a synchronous thread until the stream is over or
    /// the channel closes.
    ///
    /// Panics if called from within an async execution context.
    pub fn run_blocking(&mut self, events: &mut mpsc::Receiver<ReceiverEvent>) {
        while let Some(event) = events.blocking_recv() {
            if self.handle(event).is_break() {
                return;
            }
        }
        self.stop();
    }

    /// Async counterpart of [`run_blocking`](Self::run_blocking)
    pub async fn run(&mut self, events: &mut mpsc::Receiver<ReceiverEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                return;
            }
        }
        self.stop();
    }

    fn stop(&mut self) {
        if self.stats.stopped_at.is_none() {
            self.stats.stopped_at = Some(Instant::now());
        }
        self.session.release();
    }

    pub fn session(&self) -> &DecodeSession<'s, P> {
        &self.session
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    /// Message of the error that ended playback, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn into_session(self) -> DecodeSession<'s, P> {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DecoderConfig;
    use crate::media::NalUnit;
    use crate::session::mock::{MockPlatform, MockSurface};
    use crate::session::DecodeState;

    fn frame(bytes: &[u8]) -> ReceiverEvent {
        ReceiverEvent::Frame(NalUnit::new(bytes.to_vec()))
    }

    fn connected() -> ReceiverEvent {
        ReceiverEvent::ConnectionChanged {
            connected: true,
            message: None,
        }
    }

    #[test]
    fn test_frames_fed_in_order_until_disconnect() {
        let platform = MockPlatform::new();
        let surface = MockSurface::new();
        let mut session = DecodeSession::new(platform.clone(), DecoderConfig::default());
        session.configure(1920, 1080, &surface).unwrap();
        let mut player = Player::new(session);

        let (tx, mut rx) = mpsc::channel(16);
        tx.try_send(connected()).unwrap();
        tx.try_send(frame(&[0, 0, 0, 1, 0x67, 0x42])).unwrap();
        tx.try_send(frame(&[0, 0, 0, 1, 0x68, 0xCE])).unwrap();
        tx.try_send(frame(&[0, 0, 0, 1, 0x65, 0x88])).unwrap();
        tx.try_send(ReceiverEvent::ConnectionChanged {
            connected: false,
            message: Some("Stream ended".into()),
        })
        .unwrap();
        // Never reached
        tx.try_send(frame(&[0, 0, 0, 1, 0x41, 0x9A])).unwrap();

        player.run_blocking(&mut rx);

        assert_eq!(player.stats().frames, 3);
        assert!(player.stats().started_at.is_some());
        assert!(player.stats().stopped_at.is_some());
        assert_eq!(player.session().state(), DecodeState::Released);
        assert!(player.last_error().is_none());

        let journal = platform.journal();
        let types: Vec<u8> = journal.submitted.iter().map(|s| s.0[4] & 0x1F).collect();
        assert_eq!(types, vec![7, 8, 5]);
        assert_eq!(journal.released, 1);
    }

    #[test]
    fn test_error_releases_session() {
        let platform = MockPlatform::new();
        let surface = MockSurface::new();
        let mut session = DecodeSession::new(platform.clone(), DecoderConfig::default());
        session.configure(1920, 1080, &surface).unwrap();
        let mut player = Player::new(session);

        assert!(player.handle(connected()).is_continue());
        assert!(player
            .handle(ReceiverEvent::Error("Stream error: reset".into()))
            .is_break());

        assert_eq!(player.last_error(), Some("Stream error: reset"));
        assert_eq!(player.session().state(), DecodeState::Released);
        // Late frames are ignored by the released session
        assert!(player.handle(frame(&[0, 0, 0, 1, 0x65, 0x88])).is_continue());
        assert!(platform.journal().submitted.is_empty());
    }

    #[test]
    fn test_closed_channel_releases_session() {
        let platform = MockPlatform::new();
        let surface = MockSurface::new();
        let mut session = DecodeSession::new(platform.clone(), DecoderConfig::default());
        session.configure(1920, 1080, &surface).unwrap();
        let mut player = Player::new(session);

        let (tx, mut rx) = mpsc::channel(4);
        drop(tx);
        player.run_blocking(&mut rx);

        assert_eq!(player.session().state(), DecodeState::Released);
        assert_eq!(platform.journal().released, 1);
    }

    #[tokio::test]
    async fn test_async_run() {
        let platform = MockPlatform::new();
        let surface = MockSurface::new();
        let mut session = DecodeSession::new(platform.clone(), DecoderConfig::default());
        session.configure(1920, 1080, &surface).unwrap();
        let mut player = Player::new(session);

        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(async move {
            tx.send(connected()).await.unwrap();
            tx.send(frame(&[0, 0, 0, 1, 0x65, 0x88])).await.unwrap();
        });

        player.run(&mut rx).await;
        assert_eq!(player.stats().frames, 1);
        assert_eq!(player.session().stats().rendered, 1);
        assert_eq!(player.session().state(), DecodeState::Released);
    }

    #[test]
    fn test_run_waits_for_events() {
        let platform = MockPlatform::new();
        let surface = MockSurface::new();
        let mut session = DecodeSession::new(platform.clone(), DecoderConfig::default());
        session.configure(1920, 1080, &surface).unwrap();
        let mut player = Player::new(session);

        let (tx, mut rx) = mpsc::channel(4);
        {
            let mut run = tokio_test::task::spawn(player.run(&mut rx));
            tokio_test::assert_pending!(run.poll());

            tx.try_send(frame(&[0, 0, 0, 1, 0x65, 0x88])).unwrap();
            assert!(run.is_woken());
            tokio_test::assert_pending!(run.poll());

            drop(tx);
            tokio_test::assert_ready!(run.poll());
        }

        assert_eq!(player.stats().frames, 1);
        assert_eq!(player.session().state(), DecodeState::Released);
        assert_eq!(platform.journal().submitted.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_over_tcp() {
        use crate::client::{NalReceiver, ReceiverConfig};
        use crate::session::BufferFlags;
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ReceiverConfig::with_addr(listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let stream: Vec<u8> = [
                &[0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xC0, 0x1E][..],
                &[0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80][..],
                &[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00][..],
                &[0x00, 0x00, 0x00, 0x01, 0x41, 0x9A, 0x21][..],
            ]
            .concat();
            socket.write_all(&stream).await.unwrap();
        });

        let platform = MockPlatform::new();
        let surface = MockSurface::new();
        let mut session = DecodeSession::new(platform.clone(), DecoderConfig::default());
        session.configure(1920, 1080, &surface).unwrap();
        let mut player = Player::new(session);

        let (mut receiver, mut events) = NalReceiver::new(config);
        assert!(receiver.connect().await);
        assert!(receiver.start());

        tokio::time::timeout(std::time::Duration::from_secs(5), player.run(&mut events))
            .await
            .expect("stream did not end");
        receiver.disconnect().await;

        assert_eq!(player.stats().frames, 4);
        assert_eq!(player.session().state(), DecodeState::Released);
        assert_eq!(player.session().stats().rendered, 2);

        let journal = platform.journal();
        let submitted: Vec<(u8, BufferFlags)> = journal
            .submitted
            .iter()
            .map(|s| (s.0[4] & 0x1F, s.2))
            .collect();
        assert_eq!(
            submitted,
            vec![
                (7, BufferFlags::CODEC_CONFIG),
                (8, BufferFlags::CODEC_CONFIG),
                (5, BufferFlags::NONE),
                (1, BufferFlags::NONE),
            ]
        );
    }
}
