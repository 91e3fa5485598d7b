use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;
use crate::models::state::StopReason;

struct StopShared {
    stopped: AtomicBool,
    reason: Mutex<Option<StopReason>>,
    wakeup: Condvar,
}

/// Cancellation token shared between the capture loop and whatever may stop it.
///
/// Trips once; the first reason is kept and later triggers are no-ops. The
/// capture loop sleeps on it between drain cycles, so a trigger cuts the sleep
/// short instead of waiting out the poll interval.
#[derive(Clone)]
pub struct StopToken {
    shared: Arc<StopShared>,
}

impl StopToken {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(StopShared {
                stopped: AtomicBool::new(false),
                reason: Mutex::new(None),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Request a stop. Returns `true` if this call tripped the token.
    pub fn trigger(&self, reason: StopReason) -> bool {
        let mut current = self.shared.reason.lock();
        if current.is_some() {
            return false;
        }
        *current = Some(reason);
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.wakeup.notify_all();
        log::info!("stop requested: {:?}", reason);
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.shared.reason.lock()
    }

    /// Sleep up to `timeout`, waking early if the token trips. Returns whether it is tripped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut reason = self.shared.reason.lock();
        while reason.is_none() {
            if self.shared.wakeup.wait_until(&mut reason, deadline).timed_out() {
                break;
            }
        }
        reason.is_some()
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for one line on an input stream and trips a [`StopToken`].
///
/// End of input and read errors also trip the token, so a parent process that
/// closes the pipe stops the capture instead of leaving it running forever.
pub struct StopListener<R> {
    input: R,
}

impl<R: BufRead + Send + 'static> StopListener<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Start listening on a dedicated thread.
    pub fn spawn(self, stop: StopToken) -> Result<ListenerHandle, CaptureError> {
        let mut input = self.input;
        let fired = Arc::new(AtomicBool::new(false));
        let thread_fired = Arc::clone(&fired);

        let handle = thread::Builder::new()
            .name("stop-listener".into())
            .spawn(move || {
                let mut line = String::new();
                let reason = match input.read_line(&mut line) {
                    Ok(0) => StopReason::InputClosed,
                    Ok(_) => StopReason::Input,
                    Err(e) => {
                        log::warn!("stop input read failed: {}", e);
                        StopReason::InputError
                    }
                };
                thread_fired.store(true, Ordering::SeqCst);
                stop.trigger(reason);
            })
            .map_err(|e| CaptureError::Setup(format!("failed to spawn stop listener: {}", e)))?;

        Ok(ListenerHandle { handle, fired })
    }
}

/// How the listener thread was disposed of at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Joined,
    /// Still blocked on input after another trigger stopped the capture.
    Detached,
}

/// Running stop listener. Joined exactly once, by the capture loop during shutdown.
pub struct ListenerHandle {
    handle: thread::JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl ListenerHandle {
    /// Join the listener thread.
    ///
    /// A listener that has seen its input is done (or about to be) and is
    /// joined. If something else tripped the token, the thread may be parked in
    /// a read that cannot be interrupted; it is detached instead, and whatever
    /// it does later only re-triggers an already tripped token.
    pub fn join(self) -> ListenerExit {
        if self.fired.load(Ordering::SeqCst) || self.handle.is_finished() {
            if self.handle.join().is_err() {
                log::error!("stop listener panicked");
            }
            ListenerExit::Joined
        } else {
            log::debug!("stop listener still waiting for input, detaching");
            ListenerExit::Detached
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, BufReader, Cursor, Read};
    use std::sync::mpsc;

    #[test]
    fn first_trigger_wins() {
        let stop = StopToken::new();
        assert!(!stop.is_stopped());
        assert_eq!(stop.reason(), None);

        assert!(stop.trigger(StopReason::Interrupt));
        assert!(!stop.trigger(StopReason::Input));
        assert!(stop.is_stopped());
        assert_eq!(stop.reason(), Some(StopReason::Interrupt));
    }

    #[test]
    fn wait_times_out_when_untriggered() {
        let stop = StopToken::new();
        let started = Instant::now();
        assert!(!stop.wait_timeout(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn trigger_cuts_wait_short() {
        let stop = StopToken::new();
        let remote = stop.clone();
        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.trigger(StopReason::Input);
        });

        let started = Instant::now();
        assert!(stop.wait_timeout(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        trigger.join().unwrap();
    }

    #[test]
    fn wait_returns_immediately_once_tripped() {
        let stop = StopToken::new();
        stop.trigger(StopReason::MaxDuration);
        let started = Instant::now();
        assert!(stop.wait_timeout(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn line_of_input_trips_token() {
        let stop = StopToken::new();
        let listener = StopListener::new(Cursor::new(b"\n".to_vec())).spawn(stop.clone()).unwrap();

        assert!(stop.wait_timeout(Duration::from_secs(10)));
        assert_eq!(listener.join(), ListenerExit::Joined);
        assert_eq!(stop.reason(), Some(StopReason::Input));
    }

    #[test]
    fn closed_input_trips_token() {
        let stop = StopToken::new();
        let listener = StopListener::new(Cursor::new(Vec::new())).spawn(stop.clone()).unwrap();

        assert!(stop.wait_timeout(Duration::from_secs(10)));
        assert_eq!(listener.join(), ListenerExit::Joined);
        assert_eq!(stop.reason(), Some(StopReason::InputClosed));
    }

    struct FailingInput;

    impl Read for FailingInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe gone"))
        }
    }

    #[test]
    fn read_error_trips_token() {
        let stop = StopToken::new();
        let listener = StopListener::new(BufReader::new(FailingInput)).spawn(stop.clone()).unwrap();

        assert!(stop.wait_timeout(Duration::from_secs(10)));
        assert_eq!(listener.join(), ListenerExit::Joined);
        assert_eq!(stop.reason(), Some(StopReason::InputError));
    }

    /// Input that blocks until its sender sends or hangs up.
    struct ChannelInput(mpsc::Receiver<Vec<u8>>);

    impl Read for ChannelInput {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn blocked_listener_is_detached_after_other_trigger() {
        let (tx, rx) = mpsc::channel();
        let stop = StopToken::new();
        let listener = StopListener::new(BufReader::new(ChannelInput(rx))).spawn(stop.clone()).unwrap();

        stop.trigger(StopReason::Interrupt);
        assert_eq!(listener.join(), ListenerExit::Detached);

        // The late line does not overwrite the recorded reason.
        tx.send(b"\n".to_vec()).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(stop.reason(), Some(StopReason::Interrupt));
    }
}
