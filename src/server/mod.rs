//! The MJPEG HTTP server: an acceptor thread handing each connection to its
//! own worker thread, all sharing one bounded frame ring.

mod client;
pub mod ring;

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use ring::FrameRing;

use crate::error::{AppError, Result};
use crate::video::frame::EncodedFrame;

pub const DEFAULT_RING_CAPACITY: usize = 5;

pub struct MjpegServer {
    ring: Arc<FrameRing>,
    stop_flag: Arc<AtomicBool>,
    bound_port: u16,
    acceptor: Option<JoinHandle<()>>,
}

impl MjpegServer {
    /// Bind a TCP listener on 127.0.0.1 at `port` (0 = ephemeral) and start
    /// accepting connections. Returns the server and the port actually
    /// bound.
    pub fn start(port: u16, ring_capacity: usize) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .map_err(|e| AppError::HttpBindFailed(e.to_string()))?;
        let bound_port = listener
            .local_addr()
            .map_err(|e| AppError::HttpBindFailed(e.to_string()))?
            .port();

        let ring = Arc::new(FrameRing::new(ring_capacity));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let ring_for_acceptor = ring.clone();
        let stop_for_acceptor = stop_flag.clone();
        let acceptor = std::thread::Builder::new()
            .name("simulator-server-acceptor".into())
            .spawn(move || accept_loop(listener, ring_for_acceptor, stop_for_acceptor))
            .expect("failed to spawn acceptor thread");

        Ok(Self {
            ring,
            stop_flag,
            bound_port,
            acceptor: Some(acceptor),
        })
    }

    pub fn bound_port(&self) -> u16 {
        self.bound_port
    }

    pub fn stream_url(&self) -> String {
        format!("http://127.0.0.1:{}/stream.mjpeg", self.bound_port)
    }

    /// A cloned handle to the shared ring, for a producer (the surface
    /// callback thread) that doesn't otherwise need the rest of the server.
    pub fn ring_handle(&self) -> Arc<FrameRing> {
        self.ring.clone()
    }

    /// Append an encoded frame to the shared ring for every client to pick
    /// up on its next poll.
    pub fn submit(&self, jpeg: Vec<u8>, sequence: u64) {
        self.ring.push(EncodedFrame::new(jpeg, sequence));
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        // The acceptor thread is blocked in accept(); a loopback self-connect
        // is the simplest way to unblock it without OS-specific shutdown APIs.
        let _ = TcpStream::connect(("127.0.0.1", self.bound_port));
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(listener: TcpListener, ring: Arc<FrameRing>, stop_flag: Arc<AtomicBool>) {
    for incoming in listener.incoming() {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }
        let stream = match incoming {
            Ok(stream) => stream,
            Err(_) => break,
        };
        let ring = ring.clone();
        let spawned = std::thread::Builder::new()
            .name("simulator-server-client".into())
            .spawn(move || {
                if let Err(e) = client::serve_client(stream, ring) {
                    tracing::debug!(error = %e, "client connection closed");
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to spawn client worker thread");
        }
    }
}
