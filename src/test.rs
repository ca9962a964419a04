use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::io::MidiSink;
use crate::{
    ChannelMessage, Error, Fps, MetaMessage, MidiFile, MidiIn, MidiMessage, MidiOut, MtcKind,
    PitchBend, Timing,
};

fn receiver(bytes: &[u8]) -> MidiIn<VecDeque<u8>> {
    MidiIn::new(bytes.iter().copied().collect())
}

fn note(channel: u8, key: u8, vel: u8, on: bool) -> MidiMessage {
    MidiMessage::Channel {
        channel,
        msg: ChannelMessage::NoteEvent { key, vel, on },
    }
}

fn control(channel: u8, control: u8, value: u8) -> MidiMessage {
    MidiMessage::Channel {
        channel,
        msg: ChannelMessage::ControlChange { control, value },
    }
}

/// Build an in-memory `.mid` file from raw track bodies.
fn smf(format: u16, division: u16, tracks: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&format.to_be_bytes());
    out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());
    for track in tracks {
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track.len() as u32).to_be_bytes());
        out.extend_from_slice(track);
    }
    out
}

mod receive {
    use super::*;

    #[test]
    fn running_status() {
        let input = receiver(&[0x90, 0x3C, 0x40, 0x3E, 0x40]);
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, true));
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3E, 0x40, true));
    }

    #[test]
    fn realtime_interleaved() {
        let input = receiver(&[0x90, 0x3C, 0xF8, 0x40]);
        let clock = input.extract().unwrap();
        assert_eq!(clock.msg, MidiMessage::TimingClock);
        let pending = input.extract().unwrap();
        assert_eq!(pending.msg, note(0, 0x3C, 0x40, true));
        // The interrupted message keeps the timestamp of its first byte.
        assert!(pending.time <= clock.time);
    }

    #[test]
    fn note_on_velocity_zero_is_note_off() {
        let input = receiver(&[0x90, 0x3C, 0x00]);
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, false));
    }

    #[test]
    fn sysex_delivered_verbatim() {
        let bytes = [0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7];
        let input = receiver(&bytes);
        assert_eq!(input.extract().unwrap().msg, MidiMessage::SysEx(bytes.to_vec()));
    }

    #[test]
    fn resynchronization_skips_garbage() {
        // Data bytes and a stray 0xF7 cannot start a message.
        let input = receiver(&[0x12, 0x34, 0xF7, 0x90, 0x3C, 0x40]);
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, true));
    }

    #[test]
    fn invalid_status_fails_then_recovers() {
        let input = receiver(&[0xF4, 0x90, 0x3C, 0x40]);
        assert!(matches!(input.extract(), Err(Error::Malformed(_))));
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, true));
    }

    #[test]
    fn invalid_realtime_byte_fails_then_recovers() {
        let input = receiver(&[0xF9, 0x90, 0x3C, 0x40]);
        assert!(matches!(input.extract(), Err(Error::Malformed(_))));
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, true));
    }

    #[test]
    fn unexpected_status_repositions_pending() {
        let input = receiver(&[0x90, 0x3C, 0xB0, 0x07, 0x64]);
        assert!(matches!(input.extract(), Err(Error::Malformed(_))));
        // The interrupting status byte starts the next message.
        assert_eq!(input.extract().unwrap().msg, control(0, 0x07, 0x64));
    }

    #[test]
    fn system_common_clears_running_status() {
        let input = receiver(&[0xF6, 0x3C]);
        assert_eq!(input.extract().unwrap().msg, MidiMessage::TuneRequest);
        // With no running status the stray data byte is discarded, and the
        // source then runs dry.
        assert!(matches!(input.extract(), Err(Error::Eof)));
    }

    #[test]
    fn song_position_and_mtc() {
        let input = receiver(&[0xF2, 0x45, 0x46, 0xF1, 0x23]);
        assert_eq!(
            input.extract().unwrap().msg,
            MidiMessage::SongPosition(0x45 | (0x46 << 7))
        );
        assert_eq!(
            input.extract().unwrap().msg,
            MidiMessage::Mtc(MtcKind::SecondsLo, 0x3)
        );
    }

    #[test]
    fn try_extract_never_blocks() {
        let input = MidiIn::new(VecDeque::new());
        assert!(matches!(input.try_extract(), Ok(None)));
        input.with_source(|src| src.extend([0x90, 0x3C]));
        // Only a fragment so far; state must be kept across calls.
        assert!(matches!(input.try_extract(), Ok(None)));
        input.with_source(|src| src.push_back(0x40));
        let msg = input.try_extract().unwrap().unwrap();
        assert_eq!(msg.msg, note(0, 0x3C, 0x40, true));
    }

    #[test]
    fn eof_retains_pending_message() {
        let input = receiver(&[0x90, 0x3C]);
        assert!(matches!(input.extract(), Err(Error::Eof)));
        input.with_source(|src| src.push_back(0x40));
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, true));
    }

    #[test]
    fn realtime_between_messages() {
        let input = receiver(&[0xFA, 0x90, 0x3C, 0x40, 0xFC]);
        assert_eq!(input.extract().unwrap().msg, MidiMessage::Start);
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, true));
        assert_eq!(input.extract().unwrap().msg, MidiMessage::Stop);
    }
}

mod transmit {
    use super::*;
    use std::io;

    fn transmitter() -> MidiOut<Mutex<Vec<u8>>> {
        MidiOut::new(Mutex::new(Vec::new()))
    }

    fn written(out: &MidiOut<Mutex<Vec<u8>>>) -> Vec<u8> {
        out.sink().lock().clone()
    }

    #[test]
    fn running_status_compression() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&note(0, 0x3E, 0x40, true)).unwrap();
        // One status byte plus two data bytes per message.
        assert_eq!(written(&out), [0x90, 0x3C, 0x40, 0x3E, 0x40]);
    }

    #[test]
    fn note_off_optimization() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&note(0, 0x3C, 0x40, false)).unwrap();
        // The note-off goes out as note-on velocity 0, riding the latch.
        assert_eq!(written(&out), [0x90, 0x3C, 0x40, 0x3C, 0x00]);
    }

    #[test]
    fn note_off_optimization_round_trips() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&note(0, 0x3C, 0x00, false)).unwrap();
        let input = receiver(&written(&out));
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, true));
        // Velocity 0 comes back as the receiver-normalized 0x40.
        assert_eq!(input.extract().unwrap().msg, note(0, 0x3C, 0x40, false));
    }

    #[test]
    fn note_off_optimization_disabled() {
        let out = transmitter().with_note_off_optimization(false);
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&note(0, 0x3E, 0x30, false)).unwrap();
        // Velocity is not 0x40, so the rewrite would be lossy: full form.
        assert_eq!(written(&out), [0x90, 0x3C, 0x40, 0x80, 0x3E, 0x30]);

        let out = transmitter().with_note_off_optimization(false);
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&note(0, 0x3C, 0x40, false)).unwrap();
        // Velocity exactly 0x40 is lossless and still optimized.
        assert_eq!(written(&out), [0x90, 0x3C, 0x40, 0x3C, 0x00]);
    }

    #[test]
    fn note_off_without_latch_is_explicit() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, false)).unwrap();
        assert_eq!(written(&out), [0x80, 0x3C, 0x40]);
    }

    #[test]
    fn sysex_verbatim_and_latch_cleared() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&MidiMessage::SysEx(vec![0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]))
            .unwrap();
        out.emit(&note(0, 0x3E, 0x40, true)).unwrap();
        // The sysex bytes go out untouched and the note after it carries an
        // explicit status byte again.
        assert_eq!(
            written(&out),
            [0x90, 0x3C, 0x40, 0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7, 0x90, 0x3E, 0x40]
        );
    }

    #[test]
    fn escape_style_sysex_updates_latch() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        // A raw blob holding a channel message latches its status as if it
        // had been emitted normally.
        out.emit(&MidiMessage::SysEx(vec![0xB1, 0x07, 0x64])).unwrap();
        out.emit(&control(1, 0x0A, 0x20)).unwrap();
        assert_eq!(
            written(&out),
            [0x90, 0x3C, 0x40, 0xB1, 0x07, 0x64, 0x0A, 0x20]
        );
    }

    #[test]
    fn system_common_breaks_running_status() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&MidiMessage::TuneRequest).unwrap();
        out.emit(&note(0, 0x3E, 0x40, true)).unwrap();
        assert_eq!(written(&out), [0x90, 0x3C, 0x40, 0xF6, 0x90, 0x3E, 0x40]);
    }

    #[test]
    fn realtime_does_not_touch_latch() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&MidiMessage::TimingClock).unwrap();
        out.emit(&note(0, 0x3E, 0x40, true)).unwrap();
        // Running status keeps working across the interleaved clock.
        assert_eq!(written(&out), [0x90, 0x3C, 0x40, 0xF8, 0x3E, 0x40]);
    }

    #[test]
    fn meta_and_invalid_messages_dropped() {
        let out = transmitter();
        out.emit(&MidiMessage::Meta {
            channel: None,
            msg: MetaMessage::Tempo(500_000),
        })
        .unwrap();
        out.emit(&note(0, 0x3C, 0xC0, true)).unwrap(); // velocity out of range
        out.emit(&note(16, 0x3C, 0x40, true)).unwrap(); // channel out of range
        assert!(written(&out).is_empty());
    }

    #[test]
    fn clear_status_forces_status_byte() {
        let out = transmitter();
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.clear_status();
        out.emit(&note(0, 0x3E, 0x40, true)).unwrap();
        assert_eq!(written(&out), [0x90, 0x3C, 0x40, 0x90, 0x3E, 0x40]);
    }

    /// A sink with a dedicated low-latency lane for realtime bytes.
    #[derive(Default)]
    struct RtSink {
        normal: Mutex<Vec<u8>>,
        realtime: Mutex<Vec<u8>>,
    }

    impl MidiSink for RtSink {
        fn put(&self, bytes: &[u8]) -> io::Result<()> {
            self.normal.lock().extend_from_slice(bytes);
            Ok(())
        }

        fn put_realtime(&self, byte: u8) -> io::Result<()> {
            self.realtime.lock().push(byte);
            Ok(())
        }

        fn is_realtime(&self) -> bool {
            true
        }
    }

    #[test]
    fn realtime_capable_sink_gets_out_of_band_bytes() {
        let out = MidiOut::new(RtSink::default());
        out.emit(&note(0, 0x3C, 0x40, true)).unwrap();
        out.emit(&MidiMessage::Start).unwrap();
        assert_eq!(*out.sink().normal.lock(), [0x90, 0x3C, 0x40]);
        assert_eq!(*out.sink().realtime.lock(), [0xFA]);
    }

    #[test]
    fn encode_then_receive_round_trips() {
        let messages = [
            note(3, 0x3C, 0x40, true),
            note(3, 0x3C, 0x40, false),
            MidiMessage::Channel {
                channel: 5,
                msg: ChannelMessage::KeyPressure { key: 0x21, value: 0x11 },
            },
            control(9, 0x07, 0x64),
            MidiMessage::Channel {
                channel: 0xF,
                msg: ChannelMessage::ProgramChange { program: 0x33 },
            },
            MidiMessage::Channel {
                channel: 2,
                msg: ChannelMessage::ChannelPressure { value: 0x7F },
            },
            MidiMessage::Channel {
                channel: 0,
                msg: ChannelMessage::PitchBend {
                    bend: PitchBend::from_u16(0x2345),
                },
            },
            MidiMessage::Mtc(MtcKind::HoursHi, 0x2),
            MidiMessage::SongPosition(0x1234),
            MidiMessage::SongSelect(0x08),
            MidiMessage::TuneRequest,
            MidiMessage::TimingClock,
            MidiMessage::Continue,
            MidiMessage::Reset,
            MidiMessage::SysEx(vec![0xF0, 0x43, 0x12, 0x00, 0xF7]),
        ];
        for msg in &messages {
            let out = transmitter();
            out.emit(msg).unwrap();
            let input = receiver(&written(&out));
            assert_eq!(&input.extract().unwrap().msg, msg, "wire round trip");
        }
    }
}

mod smf {
    use super::*;

    const END_OF_TRACK: &[u8] = &[0x00, 0xFF, 0x2F, 0x00];

    #[test]
    fn header_fields() {
        let file = MidiFile::parse(&smf(0, 0x0060, &[END_OF_TRACK])).unwrap();
        assert!(!file.asynchronous_tracks);
        assert_eq!(file.timing, Timing::Metrical(96));
        assert_eq!(file.tracks.len(), 1);
    }

    #[test]
    fn smpte_division() {
        // High byte 0xE7 is -25: 25 fps, 40 ticks per frame.
        let file = MidiFile::parse(&smf(1, 0xE728, &[END_OF_TRACK])).unwrap();
        assert_eq!(file.timing, Timing::Timecode(Fps::Fps25, 40));
    }

    #[test]
    fn format_two_is_asynchronous() {
        let file = MidiFile::parse(&smf(2, 0x0060, &[END_OF_TRACK, END_OF_TRACK])).unwrap();
        assert!(file.asynchronous_tracks);
        assert_eq!(file.tracks.len(), 2);
    }

    #[test]
    fn format_zero_requires_one_track() {
        let err = MidiFile::parse(&smf(0, 0x0060, &[END_OF_TRACK, END_OF_TRACK]));
        assert!(matches!(err, Err(Error::Malformed(_))));
    }

    #[test]
    fn tempo_event() {
        let track = [&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20][..], END_OF_TRACK].concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(
            file.tracks[0][&0],
            [MidiMessage::Meta {
                channel: None,
                msg: MetaMessage::Tempo(500_000),
            }]
        );
    }

    #[test]
    fn running_status_in_track() {
        let track = [
            &[0x00, 0x90, 0x3C, 0x40][..],
            &[0x10, 0x3E, 0x40][..],
            END_OF_TRACK,
        ]
        .concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(file.tracks[0][&0x00], [note(0, 0x3C, 0x40, true)]);
        assert_eq!(file.tracks[0][&0x10], [note(0, 0x3E, 0x40, true)]);
    }

    #[test]
    fn multi_byte_delta_time() {
        let track = [&[0x81, 0x48, 0x90, 0x3C, 0x40][..], END_OF_TRACK].concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(file.tracks[0][&200], [note(0, 0x3C, 0x40, true)]);
    }

    #[test]
    fn overlong_delta_time_is_malformed() {
        let track = [&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F, 0x90, 0x3C, 0x40][..], END_OF_TRACK].concat();
        let err = MidiFile::parse(&smf(0, 0x0060, &[&track]));
        assert!(matches!(err, Err(Error::Malformed(_))));
    }

    #[test]
    fn channel_prefix_attaches_until_non_meta_event() {
        let track = [
            &[0x00, 0xFF, 0x20, 0x01, 0x05][..],             // channel prefix 5
            &[0x00, 0xFF, 0x06, 0x03, b'a', b'b', b'c'][..], // marker, prefixed
            &[0x00, 0x90, 0x3C, 0x40][..],                   // channel event resets it
            &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20][..], // tempo, unprefixed
            END_OF_TRACK,
        ]
        .concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(
            file.tracks[0][&0],
            [
                MidiMessage::Meta {
                    channel: Some(5),
                    msg: MetaMessage::Marker(b"abc".to_vec()),
                },
                note(0, 0x3C, 0x40, true),
                MidiMessage::Meta {
                    channel: None,
                    msg: MetaMessage::Tempo(500_000),
                },
            ]
        );
    }

    #[test]
    fn channel_prefix_reserves_an_empty_tick() {
        let track = [&[0x20, 0xFF, 0x20, 0x01, 0x03][..], &[0x00, 0xFF, 0x2F, 0x00][..]].concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert!(file.tracks[0][&0x20].is_empty());
    }

    #[test]
    fn fixed_size_meta_length_mismatch() {
        let track = [&[0x00, 0xFF, 0x51, 0x02, 0x07, 0xA1][..], END_OF_TRACK].concat();
        let err = MidiFile::parse(&smf(0, 0x0060, &[&track]));
        assert!(matches!(err, Err(Error::Malformed(_))));
    }

    #[test]
    fn unknown_meta_kept_raw() {
        let track = [&[0x00, 0xFF, 0x60, 0x02, 0xAB, 0xCD][..], END_OF_TRACK].concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(
            file.tracks[0][&0],
            [MidiMessage::Meta {
                channel: None,
                msg: MetaMessage::Unknown {
                    kind: 0x60,
                    data: vec![0xAB, 0xCD],
                },
            }]
        );
    }

    #[test]
    fn complete_sysex_event() {
        let track = [&[0x00, 0xF0, 0x05, 0x7E, 0x7F, 0x06, 0x01, 0xF7][..], END_OF_TRACK].concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(
            file.tracks[0][&0],
            [MidiMessage::SysEx(vec![0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7])]
        );
    }

    #[test]
    fn split_sysex_continues_in_escape_event() {
        let track = [
            &[0x00, 0xF0, 0x03, 0x7E, 0x7F, 0x06][..], // no trailing 0xF7
            &[0x10, 0xF7, 0x02, 0x01, 0xF7][..],       // continuation piece
            END_OF_TRACK,
        ]
        .concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(
            file.tracks[0][&0x00],
            [MidiMessage::SysEx(vec![0xF0, 0x7E, 0x7F, 0x06])]
        );
        assert_eq!(file.tracks[0][&0x10], [MidiMessage::SysEx(vec![0x01, 0xF7])]);
    }

    #[test]
    fn escape_event_with_channel_messages() {
        // A control change followed by a running-status control change.
        let track = [&[0x00, 0xF7, 0x05, 0xB0, 0x07, 0x64, 0x0A, 0x20][..], END_OF_TRACK].concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        assert_eq!(
            file.tracks[0][&0],
            [control(0, 0x07, 0x64), control(0, 0x0A, 0x20)]
        );
    }

    #[test]
    fn escape_event_message_must_fit() {
        let track = [&[0x00, 0xF7, 0x02, 0xB0, 0x07][..], END_OF_TRACK].concat();
        let err = MidiFile::parse(&smf(0, 0x0060, &[&track]));
        assert!(matches!(err, Err(Error::Malformed(_))));
    }

    #[test]
    fn foreign_chunks_are_skipped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"XFIR");
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        bytes.extend_from_slice(&smf(0, 0x0060, &[END_OF_TRACK]));
        let file = MidiFile::parse(&bytes).unwrap();
        assert_eq!(file.tracks.len(), 1);
    }

    #[test]
    fn truncated_file_is_eof() {
        let mut bytes = smf(0, 0x0060, &[END_OF_TRACK]);
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(MidiFile::parse(&bytes), Err(Error::Eof)));
    }

    #[test]
    fn missing_track_chunk_is_eof() {
        let mut bytes = smf(1, 0x0060, &[END_OF_TRACK]);
        // Claim two tracks but provide one.
        bytes[10] = 0;
        bytes[11] = 2;
        assert!(matches!(MidiFile::parse(&bytes), Err(Error::Eof)));
    }

    #[test]
    fn smpte_offset_and_signatures() {
        let track = [
            &[0x00, 0xFF, 0x54, 0x05, 0x61, 0x02, 0x03, 0x04, 0x05][..],
            &[0x00, 0xFF, 0x58, 0x04, 0x06, 0x03, 0x24, 0x08][..],
            &[0x00, 0xFF, 0x59, 0x02, 0xFD, 0x01][..],
            END_OF_TRACK,
        ]
        .concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        let msgs = &file.tracks[0][&0];
        match &msgs[0] {
            MidiMessage::Meta {
                msg: MetaMessage::SmpteOffset(time),
                ..
            } => {
                assert_eq!(time.fps, Fps::Fps30); // hour byte 0x61 carries rate code 3
                assert_eq!(time.hour, 0x01);
                assert_eq!(time.minute, 0x02);
                assert_eq!(time.second, 0x03);
                assert_eq!(time.frame, 0x04);
                assert_eq!(time.subframe, 0x05);
            }
            other => panic!("expected smpte offset, got {:?}", other),
        }
        assert_eq!(
            msgs[1],
            MidiMessage::Meta {
                channel: None,
                msg: MetaMessage::TimeSignature(0x06, 0x03, 0x24, 0x08),
            }
        );
        assert_eq!(
            msgs[2],
            MidiMessage::Meta {
                channel: None,
                msg: MetaMessage::KeySignature(-3, true),
            }
        );
    }

    #[test]
    fn ticks_walk_non_decreasing() {
        let track = [
            &[0x00, 0x90, 0x3C, 0x40][..],
            &[0x60, 0x3C, 0x00][..],
            &[0x81, 0x00, 0x91, 0x40, 0x50][..],
            &[0x00, 0x81, 0x40, 0x40][..],
            END_OF_TRACK,
        ]
        .concat();
        let file = MidiFile::parse(&smf(0, 0x0060, &[&track])).unwrap();
        for track in &file.tracks {
            let mut last = 0;
            for (&tick, _) in track.iter() {
                assert!(tick >= last);
                last = tick;
            }
        }
        let events: usize = file.tracks[0].values().map(Vec::len).sum();
        assert_eq!(events, 4);
    }
}

mod algebra {
    use super::*;
    use crate::MessageKind;

    #[test]
    fn classification() {
        assert_eq!(note(0, 0, 0, true).classify(), MessageKind::Channel);
        assert_eq!(
            MidiMessage::SysEx(vec![0xF0, 0xF7]).classify(),
            MessageKind::SystemCommon
        );
        assert_eq!(MidiMessage::TimingClock.classify(), MessageKind::SystemRealtime);
        assert!(MidiMessage::ActiveSensing.is_realtime());
        assert!(MidiMessage::Meta {
            channel: None,
            msg: MetaMessage::EndOfTrack,
        }
        .is_meta());
        assert!(MidiMessage::SongSelect(1).is_system());
    }

    #[test]
    fn validity() {
        assert!(note(15, 0x7F, 0x7F, false).is_valid());
        assert!(!note(16, 0x00, 0x00, false).is_valid());
        assert!(!note(0, 0x80, 0x00, true).is_valid());
        assert!(!MidiMessage::SongPosition(0x4000).is_valid());
        assert!(!MidiMessage::Mtc(MtcKind::FramesLo, 0x10).is_valid());
        assert!(!MidiMessage::SysEx(vec![]).is_valid());
        assert!(MidiMessage::Meta {
            channel: Some(15),
            msg: MetaMessage::EndOfTrack,
        }
        .is_valid());
        assert!(!MidiMessage::Meta {
            channel: Some(16),
            msg: MetaMessage::EndOfTrack,
        }
        .is_valid());
    }

    #[test]
    fn pitch_bend_wire_halves() {
        let bend = PitchBend::from_u16(0x2345);
        assert_eq!(bend.as_u16(), 0x2345);
        assert_eq!(bend.as_i16(), 0x0345);
        assert_eq!(PitchBend::from_i16(0).as_u16(), 0x2000);
        assert_eq!(PitchBend::from_u16(0).as_i16(), PitchBend::MIN);
        assert_eq!(PitchBend::from_u16(0x3FFF).as_i16(), PitchBend::MAX);
    }

    #[test]
    fn fps_conversions() {
        assert_eq!(Fps::from_u8(29), Some(Fps::Fps29));
        assert_eq!(Fps::from_u8(31), None);
        assert_eq!(Fps::Fps29.as_u8(), 29);
        assert_eq!(Fps::from_code(Fps::Fps30.as_code()), Fps::Fps30);
        assert!((Fps::Fps29.as_f32() - 29.97).abs() < 0.01);
    }

    #[test]
    fn mtc_kind_bits() {
        for bits in 0..8 {
            assert_eq!(MtcKind::from_bits(bits).as_bits(), bits);
        }
    }
}
