use std::io::{Read, Write};

use cosim_types::{CoSimError, Result};

use crate::socket::BlockingStream;

/// Size of the length header prefixing every frame on the wire (spec §6:
/// `[u32 little-endian total-length][u8 frame-kind][payload…]`).
pub const HEADER_SIZE: usize = 4;

/// Default size of each internal buffer (spec §4.2).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Hard ceiling on a single frame's declared length: large enough that
/// legitimate step payloads (spec testable property: "frames larger than
/// the 64 KiB channel buffer are fragmented across internal flushes
/// transparently") never hit it, small enough that a corrupt length
/// header is rejected instead of causing an unbounded allocation.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Wraps one connected, blocking stream with length-prefixed framing
/// (spec §4.2). A frame is assembled entirely in memory before being
/// handed to the socket — this keeps the header-written-last invariant
/// trivially true ("no partial frame is ever observable to the peer")
/// while still looping over partial underlying sends, and lets a frame
/// exceed the default buffer size without a protocol-level continuation
/// scheme (see `DESIGN.md`).
pub struct Channel {
    stream: BlockingStream,
    write_buf: Vec<u8>,
    read_buf: Vec<u8>,
    read_pos: usize,
    read_len: usize,
    current_frame_len: Option<usize>,
}

impl Channel {
    #[must_use]
    pub fn new(stream: BlockingStream) -> Self {
        let mut write_buf = Vec::with_capacity(DEFAULT_BUFFER_SIZE);
        write_buf.resize(HEADER_SIZE, 0);
        Self {
            stream,
            write_buf,
            read_buf: vec![0; DEFAULT_BUFFER_SIZE],
            read_pos: 0,
            read_len: 0,
            current_frame_len: None,
        }
    }

    /// Appends `bytes` to the outgoing frame (spec §4.2 Writer contract).
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Finalizes the frame: writes the total length into the reserved
    /// header slot and drains the whole buffer to the socket with a loop
    /// over partial sends, then resets the write cursor past the header
    /// slot of the next frame (spec §4.2 `EndWrite`).
    pub fn end_write(&mut self) -> Result<()> {
        let total_len = self.write_buf.len() as u32;
        self.write_buf[0..HEADER_SIZE].copy_from_slice(&total_len.to_le_bytes());
        self.stream.send_all(&self.write_buf)?;
        self.write_buf.clear();
        self.write_buf.resize(HEADER_SIZE, 0);
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes of the current frame's payload,
    /// refilling from the socket as needed (spec §4.2 Reader contract).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.current_frame_len {
            Some(remaining) if remaining < buf.len() => {
                return Err(CoSimError::Protocol(
                    "read past end of frame".into(),
                ));
            }
            Some(remaining) => {
                let remaining = remaining - buf.len();
                self.current_frame_len = if remaining == 0 { None } else { Some(remaining) };
            }
            None => {
                return Err(CoSimError::Protocol(
                    "read before begin_read_frame".into(),
                ));
            }
        }
        self.read_raw(buf)
    }

    /// Whether we are positioned at a frame boundary (no partially-read
    /// frame in progress).
    #[must_use]
    pub fn at_frame_boundary(&self) -> bool {
        self.current_frame_len.is_none()
    }

    /// Begins reading the next frame, returning its total length
    /// (header-inclusive, per spec §6) without consuming any payload.
    /// Callers read exactly `length - HEADER_SIZE` further bytes
    /// (typically starting with the frame-kind byte) before the next
    /// call to this method.
    pub fn begin_read_frame(&mut self) -> Result<u32> {
        let mut header = [0u8; HEADER_SIZE];
        self.read_raw(&mut header)?;
        let total_len = u32::from_le_bytes(header);
        if (total_len as usize) < HEADER_SIZE {
            return Err(CoSimError::Protocol(format!("frame length {total_len} too small")));
        }
        let payload_len = total_len as usize - HEADER_SIZE;
        if payload_len > MAX_FRAME_SIZE {
            return Err(CoSimError::Protocol(format!(
                "frame length {total_len} exceeds maximum frame size {MAX_FRAME_SIZE}"
            )));
        }
        if payload_len > self.read_buf.len() {
            self.read_buf.resize(payload_len, 0);
        }
        self.current_frame_len = Some(payload_len);
        Ok(total_len)
    }

    /// Refills the read buffer directly from the socket, bypassing the
    /// frame-length bookkeeping (used to read the header itself).
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.read_pos == self.read_len {
                self.refill()?;
            }
            let available = self.read_len - self.read_pos;
            let take = available.min(buf.len() - filled);
            buf[filled..filled + take]
                .copy_from_slice(&self.read_buf[self.read_pos..self.read_pos + take]);
            self.read_pos += take;
            filled += take;
        }
        Ok(())
    }

    /// Reads at least one more byte from the socket into the buffer.
    /// Surplus bytes already sitting past `read_pos` (e.g. the prefix of
    /// the next frame arriving with the tail of this one) are preserved
    /// in place rather than re-read (spec §4.2: "the surplus is moved to
    /// the front of the buffer").
    fn refill(&mut self) -> Result<()> {
        if self.read_pos > 0 {
            self.read_buf.copy_within(self.read_pos..self.read_len, 0);
            self.read_len -= self.read_pos;
            self.read_pos = 0;
        }
        if self.read_len == self.read_buf.len() {
            return Err(CoSimError::Protocol("receive buffer full without a complete header".into()));
        }
        let n = self.stream.read_some(&mut self.read_buf[self.read_len..])?;
        self.read_len += n;
        Ok(())
    }
}

impl cosim_types::Writer for Channel {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write(bytes)
    }
}

impl cosim_types::Reader for Channel {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read(buf)
    }
}

impl BlockingStream {
    /// Performs a single, possibly-short, read — unlike `receive_all`,
    /// which loops until the span is complete. Used by the channel's
    /// refill, which only needs "at least one more byte".
    pub(crate) fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let n = match self {
                Self::Tcp(s) => s.read(buf),
                Self::Unix(s) => s.read(buf),
            };
            match n {
                Ok(0) => return Err(CoSimError::Disconnected),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::os::unix::net::UnixStream;

    use cosim_types::{Reader, Writer};

    use super::*;

    fn pair() -> (Channel, Channel) {
        let (a, b) = UnixStream::pair().expect("socketpair");
        (Channel::new(BlockingStream::Unix(a)), Channel::new(BlockingStream::Unix(b)))
    }

    #[test]
    fn roundtrips_a_simple_frame() {
        let (mut writer, mut reader) = pair();
        writer.write_u8(7).unwrap();
        writer.write_string("hello").unwrap();
        writer.end_write().unwrap();

        reader.begin_read_frame().unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert!(reader.at_frame_boundary());
    }

    #[test]
    fn roundtrips_a_frame_larger_than_default_buffer() {
        let (mut writer, mut reader) = pair();
        let payload = vec![0xABu8; DEFAULT_BUFFER_SIZE * 3];
        writer.write_u32(payload.len() as u32).unwrap();
        writer.write(&payload).unwrap();
        writer.end_write().unwrap();

        reader.begin_read_frame().unwrap();
        let len = reader.read_u32().unwrap() as usize;
        let mut got = vec![0u8; len];
        reader.read(&mut got).unwrap();
        assert_eq!(got, payload);
    }

    #[test]
    fn pipelines_two_frames_written_back_to_back() {
        let (mut writer, mut reader) = pair();
        writer.write_u32(1).unwrap();
        writer.end_write().unwrap();
        writer.write_u32(2).unwrap();
        writer.end_write().unwrap();

        reader.begin_read_frame().unwrap();
        assert_eq!(reader.read_u32().unwrap(), 1);
        reader.begin_read_frame().unwrap();
        assert_eq!(reader.read_u32().unwrap(), 2);
    }
}
