use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Orbit, Rocket};
use tokio::sync::{mpsc, Mutex, OnceCell};

/// Pairs a fairing that reports the bound port at liftoff with a handle that
/// waits for it. Lets a server configured with port 0 tell callers where it
/// ended up.
pub fn create_pair() -> (PortSaver, Port) {
    let (tx, rx) = mpsc::channel(1);
    (PortSaver { sender: tx }, Port::new(rx))
}

pub struct Port {
    port: OnceCell<u16>,
    rx: Mutex<mpsc::Receiver<u16>>,
}

impl Port {
    fn new(rx: mpsc::Receiver<u16>) -> Port {
        Port {
            port: OnceCell::new(),
            rx: Mutex::new(rx),
        }
    }

    /// Waits for liftoff. `None` if the server went away before it got there.
    pub async fn get(&self) -> Option<u16> {
        self.port
            .get_or_try_init(|| async { self.rx.lock().await.recv().await.ok_or(()) })
            .await
            .ok()
            .copied()
    }
}

pub struct PortSaver {
    sender: mpsc::Sender<u16>,
}

#[rocket::async_trait]
impl Fairing for PortSaver {
    fn info(&self) -> Info {
        Info {
            name: "Port Saver",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let port = rocket.config().port;
        tracing::info!(port, "Server is listening");
        if self.sender.send(port).await.is_err() {
            tracing::warn!(port, "Nobody is waiting for the bound port");
        }
    }
}
