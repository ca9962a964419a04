//! # Overview
//!
//! `midiwire` encodes and decodes the MIDI 1.0 byte protocol in its two
//! framings: the live serial stream and the Standard MIDI File (`.mid`)
//! container.
//!
//! - [`MidiMessage`] is the message algebra shared by both framings.
//! - [`MidiIn`] is a stateful receiver for a raw, undelimited byte stream:
//!   it reassembles possibly-fragmented input, resolves running status,
//!   delivers System Realtime bytes embedded inside other messages, and
//!   timestamps every message with the arrival of its first byte.
//! - [`MidiOut`] is the matching transmitter: it applies running-status
//!   compression and the note-off-as-note-on-velocity-0 optimization, and
//!   routes realtime bytes through a low-latency sink path when one exists.
//! - [`MidiFile`] reads a `.mid` file into tracks of tick-ordered messages.
//!
//! # Reading live bytes
//!
//! ```
//! use std::collections::VecDeque;
//! use midiwire::{ChannelMessage, MidiIn, MidiMessage};
//!
//! let source: VecDeque<u8> = [0x90, 0x3C, 0x40].into_iter().collect();
//! let input = MidiIn::new(source);
//! let note = input.extract().unwrap();
//! assert_eq!(
//!     note.msg,
//!     MidiMessage::Channel {
//!         channel: 0,
//!         msg: ChannelMessage::NoteEvent { key: 0x3C, vel: 0x40, on: true },
//!     }
//! );
//! ```
//!
//! # Writing live bytes
//!
//! ```
//! use midiwire::{ChannelMessage, MidiMessage, MidiOut};
//! use parking_lot::Mutex;
//!
//! let output = MidiOut::new(Mutex::new(Vec::new()));
//! output
//!     .emit(&MidiMessage::Channel {
//!         channel: 0,
//!         msg: ChannelMessage::NoteEvent { key: 0x3C, vel: 0x40, on: true },
//!     })
//!     .unwrap();
//! assert_eq!(&*output.sink().lock(), &[0x90, 0x3C, 0x40]);
//! ```
//!
//! # Reading a `.mid` file
//!
//! ```
//! use midiwire::{MidiFile, Timing};
//!
//! let bytes = [
//!     0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, // MThd, 6 bytes
//!     0x00, 0x00, 0x00, 0x01, 0x00, 0x60, // format 0, 1 track, 96 ticks/quarter
//!     0x4D, 0x54, 0x72, 0x6B, 0x00, 0x00, 0x00, 0x04, // MTrk, 4 bytes
//!     0x00, 0xFF, 0x2F, 0x00, // end of track
//! ];
//! let file = MidiFile::parse(&bytes).unwrap();
//! assert_eq!(file.timing, Timing::Metrical(96));
//! assert_eq!(file.tracks.len(), 1);
//! ```
//!
//! # Concurrency
//!
//! Both codecs own their stream endpoint and a per-stream state block behind
//! a mutex, so they can be shared between threads. The one deliberate hole:
//! [`MidiOut::emit`] of a System Realtime message takes no lock at all, so a
//! realtime byte can be injected between the bytes of a message that another
//! thread is in the middle of writing.

mod prelude {
    pub(crate) use crate::error::{Error, Result};
}

mod error;
mod file;
pub mod io;
mod message;
mod primitive;
mod stream;

pub use crate::error::{Error, Result};
pub use crate::file::{MidiFile, Timing, Track};
pub use crate::message::{
    ChannelMessage, Fps, MessageKind, MetaMessage, MidiMessage, MtcKind, PitchBend, SmpteTime,
};
pub use crate::stream::{MidiIn, MidiOut, TimedMessage};

#[cfg(test)]
mod test;
