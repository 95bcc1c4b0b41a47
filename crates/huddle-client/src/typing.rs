//! Keystroke debouncer for typing indicators

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Signal {
    Keystroke,
    Stop,
}

/// Turns a stream of keystrokes into `typing:true` on the first one and
/// `typing:false` once `quiet` has passed without another. While keystrokes
/// keep coming, `typing:true` is repeated at most once per `quiet / 2` so the
/// server's expiry never fires mid-burst. Dropping the debouncer ends an
/// active indicator.
#[derive(Debug)]
pub struct TypingDebouncer {
    signals: mpsc::UnboundedSender<Signal>,
    task: JoinHandle<()>,
}

impl TypingDebouncer {
    pub fn spawn<F>(quiet: Duration, emit: F) -> Self
    where
        F: Fn(bool) + Send + 'static,
    {
        let refresh = quiet / 2;
        let (signals, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            loop {
                // Idle until someone types
                match rx.recv().await {
                    Some(Signal::Keystroke) => emit(true),
                    Some(Signal::Stop) => continue,
                    None => return,
                }
                let mut last_sent = Instant::now();

                loop {
                    tokio::select! {
                        signal = rx.recv() => match signal {
                            Some(Signal::Keystroke) => {
                                if last_sent.elapsed() >= refresh {
                                    emit(true);
                                    last_sent = Instant::now();
                                }
                            }
                            Some(Signal::Stop) => {
                                emit(false);
                                break;
                            }
                            None => {
                                emit(false);
                                return;
                            }
                        },
                        () = tokio::time::sleep(quiet) => {
                            emit(false);
                            break;
                        }
                    }
                }
            }
        });
        Self { signals, task }
    }

    pub fn keystroke(&self) {
        let _ = self.signals.send(Signal::Keystroke);
    }

    /// End the indicator now, e.g. because the message was sent
    pub fn stop(&self) {
        let _ = self.signals.send(Signal::Stop);
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::time::advance;

    fn recorder() -> (Arc<Mutex<Vec<(bool, Instant)>>>, impl Fn(bool) + Send + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, move |typing| sink.lock().push((typing, Instant::now())))
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn values(log: &Mutex<Vec<(bool, Instant)>>) -> Vec<bool> {
        log.lock().iter().map(|(v, _)| *v).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_burst_emits_true_once_then_false_after_quiet_period() {
        let (log, emit) = recorder();
        let debouncer = TypingDebouncer::spawn(Duration::from_secs(3), emit);
        let start = Instant::now();

        for _ in 0..3 {
            debouncer.keystroke();
            settle().await;
            advance(Duration::from_millis(500)).await;
        }
        assert_eq!(values(&log), vec![true]);

        // Last keystroke was at 1.0s; false is due at 4.0s
        advance(Duration::from_millis(2600)).await;
        settle().await;
        assert_eq!(values(&log), vec![true, false]);
        let cleared_at = log.lock()[1].1;
        assert!(cleared_at - start <= Duration::from_millis(4100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_burst_keeps_the_indicator_alive() {
        let quiet = Duration::from_secs(3);
        let (log, emit) = recorder();
        let debouncer = TypingDebouncer::spawn(quiet, emit);
        let start = Instant::now();

        // Ten seconds of steady typing
        for _ in 0..20 {
            debouncer.keystroke();
            settle().await;
            advance(Duration::from_millis(500)).await;
        }

        let sent = log.lock().clone();
        assert!(sent.iter().all(|(typing, _)| *typing));
        assert!(sent.len() > 1 && sent.len() <= 10, "not throttled: {}", sent.len());

        // The server expires an indicator `quiet` after the last true
        let mut previous = start;
        for (_, at) in &sent {
            assert!(*at - previous < quiet);
            previous = *at;
        }
        assert!(Instant::now() - previous < quiet);

        advance(quiet + Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(log.lock().last().map(|(typing, _)| *typing), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_immediately() {
        let (log, emit) = recorder();
        let debouncer = TypingDebouncer::spawn(Duration::from_secs(3), emit);

        debouncer.keystroke();
        settle().await;
        debouncer.stop();
        settle().await;
        assert_eq!(values(&log), vec![true, false]);

        // Stop while idle sends nothing
        debouncer.stop();
        settle().await;
        assert_eq!(values(&log), vec![true, false]);

        debouncer.keystroke();
        settle().await;
        assert_eq!(values(&log), vec![true, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_ends_an_active_indicator() {
        let (log, emit) = recorder();
        let debouncer = TypingDebouncer::spawn(Duration::from_secs(3), emit);
        debouncer.keystroke();
        settle().await;

        drop(debouncer);
        settle().await;
        assert_eq!(values(&log), vec![true, false]);
    }
}
