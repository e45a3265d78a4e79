//! Per-client connection handling: read and discard the HTTP request, write
//! the multipart response headers, then loop draining the frame ring.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use super::ring::FrameRing;
use crate::error::{AppError, Result};

const BOUNDARY: &str = "--mjpegstream";
const REQUEST_READ_LIMIT: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Runs for the lifetime of one accepted connection. Returns once the client
/// disconnects or a write fails; errors are logged by the caller, not
/// propagated further, since one client's failure must never affect others.
pub fn serve_client(mut stream: TcpStream, ring: Arc<FrameRing>) -> Result<()> {
    discard_request(&mut stream)?;
    write_response_headers(&mut stream)?;

    let snapshot = ring.snapshot();
    let mut cursor = ring.latest_index();
    for frame in &snapshot {
        write_frame(&mut stream, frame.as_bytes())?;
    }

    loop {
        let (frames, new_cursor) = ring.drain_after(cursor);
        if frames.is_empty() {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }
        for frame in &frames {
            write_frame(&mut stream, frame.as_bytes())?;
        }
        cursor = new_cursor;
    }
}

fn discard_request(stream: &mut TcpStream) -> Result<()> {
    let mut buf = [0u8; 512];
    let mut total = Vec::new();
    loop {
        let n = stream
            .read(&mut buf)
            .map_err(|e| AppError::ClientWriteError(e.to_string()))?;
        if n == 0 {
            break;
        }
        total.extend_from_slice(&buf[..n]);
        if total.windows(4).any(|w| w == b"\r\n\r\n") || total.len() >= REQUEST_READ_LIMIT {
            break;
        }
    }
    Ok(())
}

fn response_headers() -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: multipart/x-mixed-replace; boundary={boundary}\r\n\
         Cache-Control: no-cache, no-store, must-revalidate\r\n\
         Connection: close\r\n\
         \r\n",
        boundary = BOUNDARY
    )
}

fn write_response_headers(stream: &mut TcpStream) -> Result<()> {
    stream
        .write_all(response_headers().as_bytes())
        .map_err(|e| AppError::ClientWriteError(e.to_string()))
}

fn write_frame(stream: &mut TcpStream, jpeg: &[u8]) -> Result<()> {
    let part_header = format!(
        "{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {len}\r\n\r\n",
        boundary = BOUNDARY,
        len = jpeg.len()
    );
    stream
        .write_all(part_header.as_bytes())
        .map_err(|e| AppError::ClientWriteError(e.to_string()))?;
    stream
        .write_all(jpeg)
        .map_err(|e| AppError::ClientWriteError(e.to_string()))?;
    stream
        .write_all(b"\r\n")
        .map_err(|e| AppError::ClientWriteError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_header_shape() {
        let header = format!(
            "{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {len}\r\n\r\n",
            boundary = BOUNDARY,
            len = 42
        );
        assert!(header.starts_with("--mjpegstream\r\n"));
        assert!(header.contains("Content-Length: 42"));
        assert!(header.ends_with("\r\n\r\n"));
    }

    #[test]
    fn response_headers_use_the_literal_boundary_value() {
        let headers = response_headers();
        assert!(headers.contains("boundary=--mjpegstream\r\n"));
        assert!(headers.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(headers.contains("Content-Type: multipart/x-mixed-replace"));
        assert!(headers.ends_with("\r\n\r\n"));
    }
}
