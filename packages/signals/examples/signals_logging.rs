//! Shows the log output of connection lifecycle events.
//!
//! The subscriber is configured for `trace` level, which includes every connect, disconnect and
//! emit as well as teardown of both sides.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use signals::{Emitter, HasReceiver, PerObjectLock, Receiver};
use tracing::Level;

#[derive(Debug, Default)]
struct Tally {
    receiver: Receiver<PerObjectLock>,
    total: AtomicU32,
}

impl Tally {
    fn add(&self, amount: u32) {
        self.total.fetch_add(amount, Ordering::Relaxed);
    }
}

impl HasReceiver<PerObjectLock> for Tally {
    fn receiver(&self) -> &Receiver<PerObjectLock> {
        &self.receiver
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_target(false)
        .init();

    let sold = Emitter::<u32, PerObjectLock>::builder()
        .name("items_sold")
        .build();

    let daily = Arc::new(Tally::default());
    let weekly = Arc::new(Tally::default());

    sold.connect(&daily, Tally::add);
    sold.connect(&weekly, Tally::add);
    sold.emit(3);

    let restocking = sold.clone();
    restocking.emit(2);

    // New day: the daily tally starts over.
    drop(daily);
    sold.emit(4);

    drop(restocking);

    println!("weekly total: {}", weekly.total.load(Ordering::Relaxed));
}
