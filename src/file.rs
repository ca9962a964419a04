//! The Standard MIDI File container: chunk location, header, and tracks.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::message::{
    data_len, is_realtime_byte, is_status, is_system_byte, Fps, MetaMessage, MidiMessage,
    SmpteTime,
};
use crate::prelude::*;
use crate::primitive::{read_slice, read_u16, read_u24, read_u8, read_varlen};

/// How many bytes the track chunks of a file must add up to before parsing
/// them on multiple threads pays off.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// A single track: absolute tick to the messages that fire on it, ordered by
/// tick ascending, with messages on the same tick kept in file order.
///
/// Ticks that carried an event with no message payload (for example a
/// channel-prefix meta event) are present with an empty list.
pub type Track = BTreeMap<u64, Vec<MidiMessage>>;

/// A parsed `.mid` Standard MIDI File.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFile {
    /// `true` iff the file declares SMF format 2, where each track is an
    /// independent sequence rather than a voice of the same song.
    pub asynchronous_tracks: bool,
    /// What a tick means, as declared by the header division field.
    pub timing: Timing,
    pub tracks: Vec<Track>,
}

impl MidiFile {
    /// Read a MIDI file out of a seekable byte stream.
    ///
    /// Foreign chunks before or between the `MThd` and `MTrk` chunks are
    /// skipped. Structural violations surface as [`Error::Malformed`], a
    /// truncated stream as [`Error::Eof`]; no partial file is returned.
    pub fn read<R: Read + Seek>(input: &mut R) -> Result<MidiFile> {
        let size = find_chunk(input, b"MThd")?;
        let header = read_chunk(input, size)?;
        let raw = &mut &header[..];
        let format = read_u16(raw)?;
        let num_tracks = read_u16(raw)?;
        let division = read_u16(raw)?;

        if format == 0 && num_tracks != 1 {
            return Err(Error::Malformed("incorrect number of tracks"));
        }
        if format > 2 {
            return Err(Error::Malformed("invalid smf format"));
        }
        let timing = Timing::from_bits(division)?;
        debug!(
            "midi file: format {}, {} tracks, {:?}",
            format, num_tracks, timing
        );

        let mut chunks = Vec::with_capacity(num_tracks as usize);
        for _ in 0..num_tracks {
            let size = find_chunk(input, b"MTrk")?;
            chunks.push(read_chunk(input, size)?);
        }

        Ok(MidiFile {
            asynchronous_tracks: format == 2,
            timing,
            tracks: parse_tracks(&chunks)?,
        })
    }

    /// Parse a MIDI file already held in memory.
    pub fn parse(bytes: &[u8]) -> Result<MidiFile> {
        MidiFile::read(&mut Cursor::new(bytes))
    }

    /// Open and read a `.mid` file from the filesystem.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MidiFile> {
        MidiFile::read(&mut BufReader::new(File::open(path)?))
    }
}

/// What a MIDI tick means. This can be in ticks/beat or ticks/second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    /// Ticks per quarter note, as a 15-bit integer.
    ///
    /// The wall-clock length of a quarter note comes from `Tempo` meta
    /// messages inside the tracks.
    Metrical(u16),
    /// Ticks per second, as frames per second divided into subdivisions.
    /// The length of a tick is `1 / fps / subdivision`.
    Timecode(Fps, u8),
}

impl Timing {
    /// Decode the 16-bit division field of an SMF header.
    ///
    /// The high bit selects SMPTE timecode, in which case the high byte is
    /// the *negation* of the frame rate and the low byte counts ticks per
    /// frame.
    pub fn from_bits(bits: u16) -> Result<Timing> {
        if bits & 0x8000 == 0 {
            Ok(Timing::Metrical(bits))
        } else {
            let fps = Fps::from_u8(((bits >> 8) as i8).wrapping_neg() as u8)
                .ok_or(Error::Malformed("invalid smpte frame rate"))?;
            Ok(Timing::Timecode(fps, bits as u8))
        }
    }
}

/// Read 4-byte-tag / 4-byte-big-endian-size chunk headers off the stream,
/// seeking past every chunk whose tag does not match, until the wanted chunk
/// is found. Running out of chunks is an end-of-input error.
fn find_chunk<R: Read + Seek>(input: &mut R, want: &[u8; 4]) -> Result<u32> {
    loop {
        let mut head = [0; 8];
        input.read_exact(&mut head)?;
        let size = u32::from_be_bytes([head[4], head[5], head[6], head[7]]);
        if &head[..4] == want {
            return Ok(size);
        }
        debug!("skipping foreign chunk of {} bytes", size);
        input.seek(SeekFrom::Current(size as i64))?;
    }
}

/// Buffer a whole chunk body in memory so the track parser works on a
/// bounded window.
fn read_chunk<R: Read>(input: &mut R, size: u32) -> Result<Vec<u8>> {
    let mut data = vec![0; size as usize];
    input.read_exact(&mut data)?;
    Ok(data)
}

fn parse_tracks(chunks: &[Vec<u8>]) -> Result<Vec<Track>> {
    #[cfg(feature = "parallel")]
    {
        let body_len = chunks.iter().map(Vec::len).sum::<usize>();
        if body_len >= PARALLEL_ENABLE_THRESHOLD {
            use rayon::prelude::*;

            return chunks
                .par_iter()
                .map(|chunk| read_track(&mut &chunk[..]))
                .collect();
        }
    }
    chunks.iter().map(|chunk| read_track(&mut &chunk[..])).collect()
}

/// Parse the body of one `MTrk` chunk.
///
/// Delta times accumulate into absolute ticks. Every event reserves an entry
/// for its tick, even when it produces no message. The loop ends at the
/// end-of-track meta event; whatever follows it in the chunk is ignored.
fn read_track(raw: &mut &[u8]) -> Result<Track> {
    let mut track = Track::new();
    let mut time: u64 = 0;
    let mut last_status: u8 = 0;
    let mut in_sysex = false;
    let mut meta_channel: Option<u8> = None;

    loop {
        time += read_varlen(raw)? as u64;
        let at = track.entry(time).or_default();
        let byte = read_u8(raw)?;
        match byte {
            0xFF => {
                last_status = 0;
                if !read_meta_event(raw, &mut meta_channel, at)? {
                    debug!("track ended at tick {}", time);
                    return Ok(track);
                }
            }
            0xF7 => {
                last_status = 0;
                meta_channel = None;
                read_escape_event(raw, &mut last_status, &mut in_sysex, at)?;
            }
            0xF0 => {
                last_status = 0;
                meta_channel = None;
                read_sysex_event(raw, &mut in_sysex, at)?;
            }
            _ => {
                in_sysex = false;
                meta_channel = None;
                at.push(read_channel_event(byte, raw, &mut last_status)?);
            }
        }
    }
}

/// Parse a meta event, after its `0xFF` marker. Returns `false` for the
/// end-of-track event.
///
/// A channel-prefix event (type `0x20`) updates `meta_channel` and emits
/// nothing; every emitted meta message carries the prefix active at its
/// position.
fn read_meta_event(
    raw: &mut &[u8],
    meta_channel: &mut Option<u8>,
    out: &mut Vec<MidiMessage>,
) -> Result<bool> {
    let kind = read_u8(raw)?;
    let size = read_varlen(raw)? as usize;
    let fixed = |want: usize| -> Result<()> {
        if size == want {
            Ok(())
        } else {
            Err(Error::Malformed("incorrect meta event size"))
        }
    };
    let msg = match kind {
        0x00 => {
            fixed(2)?;
            MetaMessage::SequenceNumber(read_u16(raw)?)
        }
        0x01..=0x07 => {
            let text = read_slice(raw, size)?.to_vec();
            match kind {
                0x01 => MetaMessage::Text(text),
                0x02 => MetaMessage::Copyright(text),
                0x03 => MetaMessage::TrackName(text),
                0x04 => MetaMessage::InstrumentName(text),
                0x05 => MetaMessage::Lyric(text),
                0x06 => MetaMessage::Marker(text),
                _ => MetaMessage::CuePoint(text),
            }
        }
        0x20 => {
            fixed(1)?;
            let channel = read_u8(raw)?;
            if channel > 15 {
                return Err(Error::Malformed("invalid channel number"));
            }
            *meta_channel = Some(channel);
            return Ok(true);
        }
        0x2F => return Ok(false),
        0x51 => {
            fixed(3)?;
            MetaMessage::Tempo(read_u24(raw)?)
        }
        0x54 => {
            fixed(5)?;
            let v = read_slice(raw, 5)?;
            MetaMessage::SmpteOffset(SmpteTime::from_bytes([v[0], v[1], v[2], v[3], v[4]]))
        }
        0x58 => {
            fixed(4)?;
            let v = read_slice(raw, 4)?;
            MetaMessage::TimeSignature(v[0], v[1], v[2], v[3])
        }
        0x59 => {
            fixed(2)?;
            let v = read_slice(raw, 2)?;
            MetaMessage::KeySignature(v[0] as i8, v[1] != 0)
        }
        _ => MetaMessage::Unknown {
            kind,
            data: read_slice(raw, size)?.to_vec(),
        },
    };
    out.push(MidiMessage::Meta {
        channel: *meta_channel,
        msg,
    });
    Ok(true)
}

/// Parse a sysex event, after its `0xF0` marker: a declared-size payload
/// that gets the literal `0xF0` prepended.
///
/// If the payload does not end in `0xF7` the dump continues in a later
/// `0xF7` event, and the track enters sysex-continuation mode.
fn read_sysex_event(
    raw: &mut &[u8],
    in_sysex: &mut bool,
    out: &mut Vec<MidiMessage>,
) -> Result<()> {
    let size = read_varlen(raw)? as usize;
    let body = read_slice(raw, size)?;
    let mut data = Vec::with_capacity(size + 1);
    data.push(0xF0);
    data.extend_from_slice(body);
    *in_sysex = data.last() != Some(&0xF7);
    out.push(MidiMessage::SysEx(data));
    Ok(())
}

/// Parse an escape event, after its `0xF7` marker: a declared-size window of
/// arbitrary stream bytes.
///
/// In sysex-continuation mode, bytes accumulate into a sysex piece that is
/// emitted at the closing `0xF7`. Otherwise an `0xF0` opens a sysex, a bare
/// `0xF7` flushes whatever accumulated as a sysex, and any other byte is
/// parsed as a channel/system/realtime message, with running status local to
/// the escape window. A leftover at the end of the window is emitted as an
/// unterminated sysex piece.
fn read_escape_event(
    raw: &mut &[u8],
    last_status: &mut u8,
    in_sysex: &mut bool,
    out: &mut Vec<MidiMessage>,
) -> Result<()> {
    let size = read_varlen(raw)? as usize;
    let mut window = read_slice(raw, size)?;
    let sub = &mut window;
    let mut data: Vec<u8> = Vec::new();

    while !sub.is_empty() {
        let byte = read_u8(sub)?;
        if *in_sysex {
            data.push(byte);
            if byte == 0xF7 {
                out.push(MidiMessage::SysEx(std::mem::take(&mut data)));
                *in_sysex = false;
                *last_status = 0;
            }
            continue;
        }
        match byte {
            0xF0 => {
                data.push(byte);
                *in_sysex = true;
                *last_status = 0;
            }
            0xF7 => {
                data.push(byte);
                out.push(MidiMessage::SysEx(std::mem::take(&mut data)));
                *last_status = 0;
            }
            _ => {
                let status = if is_status(byte) { byte } else { *last_status };
                if status == 0 {
                    return Err(Error::Malformed("missing status byte"));
                }
                data.push(byte);
                // Sysex starts were handled above, so the length is known.
                if let Some(len) = data_len(status)? {
                    let have = usize::from(!is_status(byte));
                    for _ in have..len {
                        if sub.is_empty() {
                            return Err(Error::Malformed("message extends past end of escape"));
                        }
                        data.push(read_u8(sub)?);
                    }
                }
                if !is_realtime_byte(status) {
                    *last_status = if is_system_byte(status) { 0 } else { status };
                }
                let tail = if is_status(byte) { &data[1..] } else { &data[..] };
                out.push(MidiMessage::decode(status, tail)?);
                data.clear();
            }
        }
    }
    if !data.is_empty() {
        out.push(MidiMessage::SysEx(data));
    }
    *last_status = 0;
    Ok(())
}

/// Parse a channel (or, non-standard but accepted, system) event given its
/// first byte, resolving running status.
fn read_channel_event(first: u8, raw: &mut &[u8], last_status: &mut u8) -> Result<MidiMessage> {
    let status = if is_status(first) { first } else { *last_status };
    if let 0x00 | 0xF0 | 0xF7 = status {
        return Err(Error::Malformed("invalid status byte"));
    }

    let mut data = [0u8; 2];
    let mut have = 0;
    if !is_status(first) {
        data[0] = first;
        have = 1;
    }
    // 0xF0 and 0xF7 were rejected above, so the length is always known.
    let len = data_len(status)?.unwrap_or(0);
    for slot in data.iter_mut().take(len).skip(have) {
        *slot = read_u8(raw)?;
    }

    if !is_realtime_byte(status) {
        *last_status = if is_system_byte(status) { 0 } else { status };
    }
    MidiMessage::decode(status, &data[..len])
}
