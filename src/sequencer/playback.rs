/// Tick clock - feeds fixed-period ticks into the sequencer event queue
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::Event;
use crate::logging::target;

pub struct TickClock {
    is_running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    period: Duration,
}

impl TickClock {
    pub fn new(period: Duration) -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            handle: None,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts sending `Event::Tick` on `sender` every period. Ticks share
    /// the queue with controller events, so they are handled in order.
    pub fn start(&mut self, sender: Sender<Event>) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let is_running = Arc::clone(&self.is_running);
        let period = self.period;
        tracing::debug!(target: target::PLAYHEAD, "Tick clock started, {:?} period", period);

        self.handle = Some(thread::spawn(move || {
            let mut next = Instant::now() + period;
            while is_running.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now < next {
                    thread::sleep(next - now);
                    continue;
                }
                // the consumer hung up
                if sender.send(Event::Tick).is_err() {
                    break;
                }
                next += period;
                // skip ticks missed while the consumer was busy rather than bursting
                if next < now {
                    next = now + period;
                }
            }
            is_running.store(false, Ordering::SeqCst);
        }));
    }

    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

impl Drop for TickClock {
    fn drop(&mut self) {
        self.stop();
    }
}
