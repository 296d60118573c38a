//! Connecting a few receiver objects to an emitter, copying both sides and letting them go out
//! of scope in arbitrary order.

use std::sync::Arc;

use parking_lot::Mutex;
use signals::{Emitter, HasReceiver, Receiver};

/// A thermostat display that shows the last temperature it was told about.
#[derive(Debug, Clone)]
struct Display {
    receiver: Receiver,
    room: &'static str,
    shown: Arc<Mutex<Option<f32>>>,
}

impl Display {
    fn new(room: &'static str) -> Arc<Self> {
        Arc::new(Self {
            receiver: Receiver::new(),
            room,
            shown: Arc::new(Mutex::new(None)),
        })
    }

    fn show(&self, celsius: f32) {
        *self.shown.lock() = Some(celsius);
        println!("{}: {celsius:.1} C", self.room);
    }
}

impl HasReceiver for Display {
    fn receiver(&self) -> &Receiver {
        &self.receiver
    }
}

fn main() {
    let temperature_changed = Emitter::<f32>::builder()
        .name("temperature_changed")
        .build();

    let kitchen = Display::new("kitchen");
    let hallway = Display::new("hallway");

    temperature_changed.connect(&kitchen, Display::show);
    temperature_changed.connect(&hallway, Display::show);

    println!("Two displays connected:");
    temperature_changed.emit(21.5);

    // A duplicate of a display is connected wherever the original is.
    let kitchen_mirror = kitchen.duplicate();
    println!("After duplicating the kitchen display:");
    temperature_changed.emit(22.0);

    // Dropping a display removes its connections.
    drop(hallway);
    println!("After removing the hallway display:");
    temperature_changed.emit(22.5);

    // A copy of the emitter reaches the same displays.
    let forecast = temperature_changed.clone();
    drop(temperature_changed);
    println!("Through a copy of the emitter, after dropping the original:");
    forecast.emit(19.0);

    println!(
        "Connections: {}, kitchen shows {:?}, mirror shows {:?}",
        forecast.connection_count(),
        *kitchen.shown.lock(),
        *kitchen_mirror.shown.lock()
    );
}
