use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use diesel::prelude::*;

use crate::handlers::Pool;
use crate::schema::memos::dsl::{expires_at, memos};

/// Periodic bulk deletion of expired memos, independent of request traffic.
/// Failed ticks are logged and left for the next tick to pick up.
pub struct Sweeper {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweep thread. The first sweep runs one full interval after
    /// start.
    pub fn start(pool: Pool, interval: Duration) -> Sweeper {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => sweep(&pool),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Sweeper { stop_tx, handle }
    }

    /// Signals the thread and waits for it to exit. Interrupts the wait, so
    /// stopping never blocks for the remainder of an interval.
    pub fn stop(self) {
        // send only fails if the thread is already gone
        let _ = self.stop_tx.send(());
        let _ = self.handle.join();
    }
}

fn sweep(pool: &Pool) {
    let mut connection = match pool.get() {
        Ok(connection) => connection,
        Err(err) => {
            log::error!("sweep skipped, no connection available: {}", err);
            return;
        }
    };

    match diesel::delete(memos.filter(expires_at.lt(SystemTime::now()))).execute(&mut connection) {
        Ok(0) => {}
        Ok(count) => log::info!("swept {} expired memos", count),
        Err(err) => log::error!("sweep failed: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::{pg::PgConnection, r2d2::ConnectionManager};

    #[test]
    fn stop_does_not_wait_out_the_interval() {
        let manager = ConnectionManager::<PgConnection>::new("postgres://localhost/unused");
        let pool = r2d2::Pool::builder().build_unchecked(manager);

        let started = std::time::Instant::now();
        let sweeper = Sweeper::start(pool, Duration::from_secs(3600));
        sweeper.stop();

        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
