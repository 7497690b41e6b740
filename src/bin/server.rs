use clap::Parser;
use memkv::config::Config;
use memkv::server::{Server, ShutdownHandle};
use memkv::Error;
use std::thread;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info};

fn main() -> Result<(), Error> {
    let config = Config::parse();

    let _ = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let server = Server::bind(&config)?;
    let handle = server.shutdown_handle();

    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || watch_signals(handle))?;

    server.run()
}

/// Waits for SIGINT or SIGTERM on its own small runtime, then stops the server.
fn watch_signals(handle: ShutdownHandle) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start signal watcher: {}", e);
            return;
        }
    };

    let res: std::io::Result<()> = runtime.block_on(async {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }

        Ok(())
    });

    if let Err(e) = res {
        error!("Failed to install signal handlers: {}", e);
        return;
    }

    info!("Shutting down gracefully");
    if let Err(e) = handle.shutdown() {
        error!("Failed to wake the event loop: {}", e);
    }
}
