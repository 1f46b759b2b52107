// Wire codec: length-delimited framing plus JSON encoding of `NetMessage`.
//
// Frame format: a 4-byte big-endian length prefix, then a JSON payload of
// exactly that many bytes. The prefix makes messages self-delimiting over a
// TCP byte stream; JSON keeps the payload debuggable with tcpdump.
//
// Error classification matters more than the framing itself. A reader must
// distinguish:
// - `Malformed`: the frame arrived intact but the payload didn't parse. The
//   stream is still aligned on a frame boundary — callers drop the message
//   and keep reading.
// - `FrameTooLarge` on read: the length prefix is garbage, which means the
//   stream is no longer aligned. Unrecoverable; the session must die.
// - `Io`: the transport failed or closed. The session must die.
// `CodecError::is_recoverable` encodes that distinction for read loops.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::message::NetMessage;

/// Maximum allowed frame size. Commands, acks and chat lines are tiny; 64 KB
/// is generous headroom and bounds allocation from a corrupt length prefix.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

/// Failure while encoding or decoding one wire message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o failure on message stream: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge(u32),
    #[error("malformed message payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl CodecError {
    /// True if the stream is still aligned on a frame boundary and the
    /// caller may keep reading from it.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::Malformed(_))
    }
}

/// Serialize a message and write it as one frame. Flushes, so a message is
/// fully on the wire when this returns.
pub fn write_message<W: Write>(writer: &mut W, msg: &NetMessage) -> Result<(), CodecError> {
    let payload = serde_json::to_vec(msg)?;
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(len));
    }
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame and deserialize it. Blocks until a full frame arrives.
///
/// Returns `Io` with `UnexpectedEof` when the stream closes cleanly between
/// frames, `FrameTooLarge` on a garbage prefix, and `Malformed` when the
/// payload is not a valid `NetMessage` (the frame itself was consumed, so
/// the stream stays usable).
pub fn read_message<R: Read>(reader: &mut R) -> Result<NetMessage, CodecError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    let msg = serde_json::from_slice(&payload)?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::command::{Command, WorldPos};
    use crate::message::PlayerInput;
    use crate::types::{PlayerNumber, SimTick, UnitId};

    fn sample_input() -> NetMessage {
        NetMessage::Input(PlayerInput {
            player: PlayerNumber(3),
            tick: SimTick(120),
            command: Command::MoveUnit {
                unit: UnitId(9),
                target: WorldPos { x: 64.0, y: 48.5 },
            },
        })
    }

    #[test]
    fn roundtrip_input_message() {
        let msg = sample_input();
        let mut wire = Vec::new();
        write_message(&mut wire, &msg).unwrap();

        let mut cursor = Cursor::new(&wire);
        let back = read_message(&mut cursor).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn consecutive_frames_stay_aligned() {
        let first = sample_input();
        let second = NetMessage::InputNone {
            player: PlayerNumber(1),
            tick: SimTick(121),
        };
        let mut wire = Vec::new();
        write_message(&mut wire, &first).unwrap();
        write_message(&mut wire, &second).unwrap();

        let mut cursor = Cursor::new(&wire);
        assert_eq!(read_message(&mut cursor).unwrap(), first);
        assert_eq!(read_message(&mut cursor).unwrap(), second);
    }

    #[test]
    fn malformed_payload_is_recoverable_and_leaves_stream_aligned() {
        // A well-framed frame whose payload is not a NetMessage, followed by
        // a valid message.
        let junk = b"{\"NoSuchVariant\":true}";
        let mut wire = Vec::new();
        wire.extend_from_slice(&u32::try_from(junk.len()).unwrap().to_be_bytes());
        wire.extend_from_slice(junk);
        let valid = sample_input();
        write_message(&mut wire, &valid).unwrap();

        let mut cursor = Cursor::new(&wire);
        let err = read_message(&mut cursor).unwrap_err();
        assert!(err.is_recoverable(), "expected Malformed, got {err:?}");
        assert_eq!(read_message(&mut cursor).unwrap(), valid);
    }

    #[test]
    fn oversized_prefix_is_fatal() {
        let mut cursor = Cursor::new((MAX_FRAME_SIZE + 1).to_be_bytes().to_vec());
        let err = read_message(&mut cursor).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn truncated_stream_is_io_error() {
        // Two bytes where four are needed for the prefix.
        let mut cursor = Cursor::new(vec![0u8, 1]);
        let err = read_message(&mut cursor).unwrap_err();
        match err {
            CodecError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
