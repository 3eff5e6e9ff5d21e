//! File log sink.
//!
//! `env_logger` formats records into an in-memory channel; a pingora
//! background service drains the channel into the configured file.

use std::{
    io::{self, Write},
    path::Path,
};

use async_trait::async_trait;
use env_logger::{Builder, Env, Target};
use pingora::{
    server::{ListenFds, ShutdownWatch},
    services::Service,
};
use tokio::{
    fs::{create_dir_all, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::config;

/// `io::Write` adapter that hands each formatted record to the channel.
pub struct ChannelWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .send(buf.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            sender,
            receiver,
            config,
        }
    }

    pub fn writer(&self) -> ChannelWriter {
        ChannelWriter {
            sender: self.sender.clone(),
        }
    }

    /// Installs the global logger. `RUST_LOG` still applies; the default
    /// level is `info`.
    pub fn init_env_logger(&self) {
        Builder::from_env(Env::default().default_filter_or("info"))
            .target(Target::Pipe(Box::new(self.writer())))
            .init();
    }

    async fn open(&self) -> io::Result<BufWriter<File>> {
        let path = Path::new(&self.config.path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        Ok(BufWriter::new(file))
    }
}

#[async_trait]
impl Service for Logger {
    async fn start_service(&mut self, _fds: Option<ListenFds>, mut shutdown: ShutdownWatch) {
        let mut file = match self.open().await {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Failed to open log file {}: {e}", self.config.path);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                },
                data = self.receiver.recv() => {
                    let Some(data) = data else { break };
                    if let Err(e) = file.write_all(&data).await {
                        eprintln!("Failed to write log file: {e}");
                    }
                }
            }
        }

        // Drain whatever was logged during shutdown.
        while let Ok(data) = self.receiver.try_recv() {
            if file.write_all(&data).await.is_err() {
                break;
            }
        }
        if let Err(e) = file.flush().await {
            eprintln!("Failed to flush log file: {e}");
        }
    }

    fn name(&self) -> &'static str {
        "log sink"
    }

    fn threads(&self) -> Option<usize> {
        Some(1)
    }
}
