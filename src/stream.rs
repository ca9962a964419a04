//! Stateful codecs for live MIDI byte streams: reception with timestamps and
//! transmission with running-status compression.
//!
//! A live MIDI stream is not a sequence of delimited packets. Status bytes
//! may be omitted when they repeat (running status), single-byte System
//! Realtime messages may show up *between the bytes* of any other message,
//! and a receiver may be switched on in the middle of somebody else's
//! transmission. [`MidiIn`] and [`MidiOut`] own the per-stream state needed
//! to cope with all of this: a partial-message buffer and the running-status
//! latch on the receive side, the latch and the realtime capability of the
//! sink on the transmit side.

use std::mem;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::io::{MidiSink, MidiSource};
use crate::message::{
    data_len, is_realtime_byte, is_status, is_system_byte, ChannelMessage, MidiMessage,
};
use crate::prelude::*;

/// A completed message, together with the reception time of its first byte.
///
/// When a System Realtime byte arrives in the middle of another message it is
/// delivered first, as its own `TimedMessage`, stamped with its own arrival
/// time. The interrupted message keeps the timestamp of its first byte, so
/// its `time` may be earlier than that of a message delivered before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedMessage {
    pub time: Instant,
    pub msg: MidiMessage,
}

/// Reception state: the bytes collected since the last delivered message,
/// the arrival time of the first of them, and the running-status latch.
struct RxState<S> {
    source: S,
    pending: Vec<u8>,
    pending_time: Option<Instant>,
    last_status: u8,
}

impl<S: MidiSource> RxState<S> {
    /// Look at the next byte. In non-blocking mode, gives the source one
    /// `sync` to cough up buffered bytes and reports `None` if there is
    /// still nothing; in blocking mode the source itself decides how to
    /// wait, and running dry is an end-of-stream error.
    fn peek(&mut self, block: bool) -> Result<Option<u8>> {
        if !block && self.source.in_avail() == 0 {
            self.source.sync()?;
            if self.source.in_avail() == 0 {
                return Ok(None);
            }
        }
        match self.source.peek()? {
            Some(byte) => Ok(Some(byte)),
            None => Err(Error::Eof),
        }
    }

    /// Consume one byte. Realtime bytes stay out of the pending buffer; they
    /// are transparent to message assembly.
    fn get(&mut self, block: bool) -> Result<Option<u8>> {
        let byte = self.peek(block)?;
        if let Some(byte) = byte {
            self.source.consume();
            if !is_realtime_byte(byte) {
                self.pending.push(byte);
            }
        }
        Ok(byte)
    }

    /// Give up on whatever was pending. Used for protocol failures that
    /// leave no way to tell where the next message starts.
    fn fail(&mut self, msg: &'static str) -> Error {
        debug!("receive failed: {}", msg);
        self.pending.clear();
        self.last_status = 0;
        Error::Malformed(msg)
    }

    /// Deliver a standalone realtime byte. The invalid bytes `0xF9` and
    /// `0xFD` poison the stream state like any other bad status.
    fn realtime(&mut self, status: u8, time: Instant) -> Result<TimedMessage> {
        match MidiMessage::decode(status, &[]) {
            Ok(msg) => Ok(TimedMessage { time, msg }),
            Err(_) => Err(self.fail("invalid status byte")),
        }
    }

    fn run(&mut self, block: bool) -> Result<Option<TimedMessage>> {
        if self.pending.is_empty() {
            if self.last_status == 0 {
                // Nothing to resume and no running status to lean on:
                // resynchronize by discarding bytes until a status byte shows
                // up. An 0xF7 cannot begin a message, so it is dropped too.
                loop {
                    let byte = match self.peek(block)? {
                        Some(byte) => byte,
                        None => return Ok(None),
                    };
                    if is_status(byte) && byte != 0xF7 {
                        break;
                    }
                    trace!("dropping byte {:#04x} while resynchronizing", byte);
                    self.source.consume();
                }
            }
            let byte = match self.get(block)? {
                Some(byte) => byte,
                None => return Ok(None),
            };
            let now = Instant::now();
            self.pending_time = Some(now);
            if is_realtime_byte(byte) {
                return self.realtime(byte, now).map(Some);
            }
        }

        let (status, new_status) = if is_status(self.pending[0]) {
            (self.pending[0], true)
        } else {
            (self.last_status, false)
        };
        let len = match data_len(status) {
            Ok(len) => len,
            Err(_) => return Err(self.fail("invalid status byte")),
        };

        // Sysex runs until its closing 0xF7; everything else has a known
        // size and completes as soon as the last data byte arrives.
        let wanted = match len {
            Some(len) => len + new_status as usize,
            None => usize::MAX,
        };
        while self.pending.len() < wanted {
            let byte = match self.get(block)? {
                Some(byte) => byte,
                None => return Ok(None),
            };
            if is_realtime_byte(byte) {
                // Delivered immediately; the pending message stays put and
                // the next call carries on where this one left off.
                return self.realtime(byte, Instant::now()).map(Some);
            }
            if is_status(byte) {
                if len.is_none() && byte == 0xF7 {
                    break;
                }
                // A status byte mid-message aborts the pending message. The
                // new status stays pending so the next call picks it up.
                self.pending.clear();
                self.pending.push(byte);
                self.pending_time = Some(Instant::now());
                debug!("status byte {:#04x} interrupted a pending message", byte);
                return Err(Error::Malformed("unexpected status byte"));
            }
        }

        if is_system_byte(status) {
            self.last_status = 0;
        } else {
            self.last_status = status;
        }

        let time = self.pending_time.take().unwrap_or_else(Instant::now);
        let msg = if len.is_none() {
            // Keep the 0xF0/0xF7 sentinels in the payload.
            MidiMessage::SysEx(mem::take(&mut self.pending))
        } else {
            let msg = MidiMessage::decode(status, &self.pending[new_status as usize..])?;
            self.pending.clear();
            msg
        };
        Ok(Some(TimedMessage { time, msg }))
    }
}

/// The receiving end of a live MIDI byte stream.
///
/// Owns the byte source together with the reception state. All entry points
/// take the receive lock for the duration of the call, so a `MidiIn` can be
/// shared between threads; messages are handed out in arrival order.
pub struct MidiIn<S> {
    rx: Mutex<RxState<S>>,
}

impl<S: MidiSource> MidiIn<S> {
    /// Wrap a byte source in a fresh receiver, with an empty pending buffer
    /// and no running status.
    pub fn new(source: S) -> MidiIn<S> {
        MidiIn {
            rx: Mutex::new(RxState {
                source,
                pending: Vec::new(),
                pending_time: None,
                last_status: 0,
            }),
        }
    }

    /// Return the next completed message, blocking inside the source while
    /// waiting for bytes.
    ///
    /// Realtime bytes embedded in another message are returned immediately,
    /// before the message they interrupted. The timestamp of a multi-byte
    /// message is the arrival time of its first byte.
    ///
    /// # Errors
    ///
    /// - [`Error::Eof`]: the source ran out. Pending reception state is
    ///   retained; a call after the source is refilled resumes mid-message.
    /// - [`Error::Malformed`]: an invalid or unexpected status byte. The
    ///   receiver is left ready to consume the next message.
    /// - [`Error::Io`]: the source failed; the stream is no longer trusted.
    pub fn extract(&self) -> Result<TimedMessage> {
        let mut rx = self.rx.lock();
        match rx.run(true)? {
            Some(msg) => Ok(msg),
            None => Err(Error::Eof),
        }
    }

    /// Like [`extract`](MidiIn::extract), but never waits for new bytes.
    ///
    /// If no byte is immediately available, the source is given one
    /// [`sync`](MidiSource::sync) to surface buffered data, and `Ok(None)`
    /// is returned if there is still nothing. Any partially received message
    /// stays pending for later calls.
    pub fn try_extract(&self) -> Result<Option<TimedMessage>> {
        self.rx.lock().run(false)
    }

    /// Run a closure with mutable access to the underlying source, e.g. to
    /// refill an in-memory queue. Takes the receive lock.
    pub fn with_source<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.rx.lock().source)
    }

    /// Tear down the receiver and get the source back. Any partially
    /// received message is discarded.
    pub fn into_source(self) -> S {
        self.rx.into_inner().source
    }
}

/// Transmission state: just the running-status latch.
struct TxState {
    last_status: u8,
}

/// The transmitting end of a live MIDI byte stream.
///
/// Owns the byte sink together with the transmission state, and applies
/// running-status compression plus the note-off-as-note-on-velocity-0
/// optimization. Non-realtime messages serialize on the transmit lock;
/// realtime messages bypass it entirely, so another thread can slip a
/// [`TimingClock`](MidiMessage::TimingClock) between the bytes of a message
/// that is being written out.
pub struct MidiOut<S> {
    sink: S,
    tx: Mutex<TxState>,
    realtime_sink: bool,
    optimize_note_off: bool,
}

impl<S: MidiSink> MidiOut<S> {
    /// Wrap a byte sink in a fresh transmitter.
    ///
    /// The sink's realtime capability is probed here, once, and cached; the
    /// sink cannot be swapped afterwards. Note-off optimization defaults to
    /// enabled.
    pub fn new(sink: S) -> MidiOut<S> {
        let realtime_sink = sink.is_realtime();
        MidiOut {
            sink,
            tx: Mutex::new(TxState { last_status: 0 }),
            realtime_sink,
            optimize_note_off: true,
        }
    }

    /// Choose whether note-off messages may be rewritten as note-on with
    /// velocity 0 whenever that enables running status.
    ///
    /// Very few devices implement note-off velocity, and the receiving end
    /// reads such a note-on as a note-off with velocity `0x40`. When
    /// disabled, the rewrite is still applied to note-offs whose velocity is
    /// exactly `0x40`, where it is lossless.
    pub fn with_note_off_optimization(mut self, enable: bool) -> MidiOut<S> {
        self.optimize_note_off = enable;
        self
    }

    /// Serialize one message into the sink.
    ///
    /// Meta messages and invalid messages are silently dropped. Realtime
    /// messages are written through the sink's realtime path when it has
    /// one, without taking the transmit lock and without touching the
    /// running-status latch.
    ///
    /// A sink failure surfaces as [`Error::Io`]; partially written messages
    /// are not undone.
    pub fn emit(&self, msg: &MidiMessage) -> Result<()> {
        if msg.is_meta() || !msg.is_valid() {
            return Ok(());
        }
        if let Some(status) = msg.realtime_status() {
            return if self.realtime_sink {
                self.sink.put_realtime(status)
            } else {
                self.sink.put(&[status])
            }
            .map_err(Error::from);
        }

        let mut tx = self.tx.lock();
        match msg {
            MidiMessage::Channel { channel, msg } => {
                let mut msg = *msg;
                if let ChannelMessage::NoteEvent { key, vel, on: false } = msg {
                    // A note-off can ride the latch of a preceding note-on
                    // when sent as note-on with velocity 0.
                    if tx.last_status == (0x90 | channel)
                        && (self.optimize_note_off || vel == 0x40)
                    {
                        msg = ChannelMessage::NoteEvent { key, vel: 0, on: true };
                    }
                }
                let full = MidiMessage::Channel {
                    channel: *channel,
                    msg,
                };
                let mut buf = [0; 3];
                let bytes = full.encode(&mut buf);
                let skip = (tx.last_status == bytes[0]) as usize;
                tx.last_status = bytes[0];
                self.sink.put(&bytes[skip..])?;
            }
            MidiMessage::SysEx(data) => {
                scan_sysex_statuses(data, &mut tx.last_status);
                self.sink.put(data)?;
            }
            msg => {
                // System common: canonical bytes, then break running status.
                let mut buf = [0; 3];
                let bytes = msg.encode(&mut buf);
                tx.last_status = 0;
                self.sink.put(bytes)?;
            }
        }
        Ok(())
    }

    /// Forget the running-status latch, forcing the next channel message to
    /// carry an explicit status byte.
    pub fn clear_status(&self) {
        self.tx.lock().last_status = 0;
    }

    /// The underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Tear down the transmitter and get the sink back.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Track the effect of a raw sysex blob on the running-status latch, as if
/// every embedded status byte had been transmitted on its own.
///
/// Callers may pass multi-segment blobs or escape-style payloads containing
/// arbitrary messages, so: a channel status latches, a non-realtime system
/// status clears, realtime bytes are skipped, and everything between an
/// `0xF0` and the matching `0xF7` is opaque payload.
fn scan_sysex_statuses(data: &[u8], last_status: &mut u8) {
    let mut in_sysex = false;
    for &byte in data {
        if in_sysex {
            if byte == 0xF7 {
                in_sysex = false;
                *last_status = 0;
            }
        } else if is_status(byte) && !is_realtime_byte(byte) {
            if byte == 0xF0 {
                in_sysex = true;
            } else if is_system_byte(byte) {
                *last_status = 0;
            } else {
                *last_status = byte;
            }
        }
    }
}
