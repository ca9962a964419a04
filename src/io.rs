//! The byte-stream endpoints that the live codecs talk to.
//!
//! A [`MidiSource`] hands bytes to a [`MidiIn`](crate::MidiIn) one at a time,
//! with a peek/consume split so that the receiver never loses a byte it has
//! not committed to. A [`MidiSink`] accepts bytes from a
//! [`MidiOut`](crate::MidiOut), optionally advertising a low-latency path for
//! System Realtime bytes.
//!
//! In-memory implementations are provided for `VecDeque<u8>` (a refillable
//! queue), `std::io::Cursor` (a fixed buffer) and `parking_lot::Mutex<Vec<u8>>`
//! (a shareable output buffer). Device backends implement these traits over
//! their own handles.

use std::collections::VecDeque;
use std::io::{self, Cursor};

use parking_lot::Mutex;

/// A source of raw MIDI bytes, presumably a cable.
pub trait MidiSource {
    /// Return the next byte without consuming it.
    ///
    /// May block until a byte arrives. `Ok(None)` means the stream has ended;
    /// a source that can be refilled later is free to report the end and
    /// produce more bytes on a subsequent call.
    fn peek(&mut self) -> io::Result<Option<u8>>;

    /// Consume the byte last returned by [`peek`](MidiSource::peek).
    fn consume(&mut self);

    /// How many bytes can be read right now without blocking.
    fn in_avail(&self) -> usize;

    /// Ask the source to pick up any bytes waiting on the far side of its
    /// buffer. Must not block waiting for new data to be produced.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink for raw MIDI bytes.
///
/// All methods take `&self` so that a System Realtime byte can be injected
/// from one thread while another is holding the transmit lock halfway through
/// a longer message. In-memory sinks get their interior mutability from a
/// mutex; device sinks usually write through an OS handle that allows this
/// naturally.
pub trait MidiSink {
    /// Write the given bytes, in order.
    fn put(&self, bytes: &[u8]) -> io::Result<()>;

    /// Write a single System Realtime byte, ahead of any bytes the sink has
    /// buffered but not yet transmitted.
    ///
    /// Only called when [`is_realtime`](MidiSink::is_realtime) reported
    /// `true`. The default implementation is a plain ordered write.
    fn put_realtime(&self, byte: u8) -> io::Result<()> {
        self.put(&[byte])
    }

    /// Whether this sink has a true low-latency realtime path.
    ///
    /// Probed once when a [`MidiOut`](crate::MidiOut) takes ownership of the
    /// sink, and cached for the lifetime of the codec.
    fn is_realtime(&self) -> bool {
        false
    }
}

impl MidiSource for VecDeque<u8> {
    fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.front().copied())
    }

    fn consume(&mut self) {
        self.pop_front();
    }

    fn in_avail(&self) -> usize {
        self.len()
    }
}

impl<T: AsRef<[u8]>> MidiSource for Cursor<T> {
    fn peek(&mut self) -> io::Result<Option<u8>> {
        let pos = self.position() as usize;
        Ok(self.get_ref().as_ref().get(pos).copied())
    }

    fn consume(&mut self) {
        self.set_position(self.position() + 1);
    }

    fn in_avail(&self) -> usize {
        let data = self.get_ref().as_ref();
        data.len().saturating_sub(self.position() as usize)
    }
}

impl MidiSink for Mutex<Vec<u8>> {
    fn put(&self, bytes: &[u8]) -> io::Result<()> {
        self.lock().extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: MidiSink + ?Sized> MidiSink for &S {
    fn put(&self, bytes: &[u8]) -> io::Result<()> {
        (**self).put(bytes)
    }

    fn put_realtime(&self, byte: u8) -> io::Result<()> {
        (**self).put_realtime(byte)
    }

    fn is_realtime(&self) -> bool {
        (**self).is_realtime()
    }
}
