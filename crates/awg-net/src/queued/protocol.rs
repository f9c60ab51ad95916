use std::io::Read;

use awg_core::MAX_WORDS_PER_FRAME;

use crate::error::ProtocolError;

/// One decoded record from the queued control stream. §4.4/§6: single-byte
/// tag, big-endian multi-byte fields, no acknowledgement.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    PreloadBegin { list_id: u8, total_frames: u32 },
    PreloadPush { list_id: u8, words: Vec<u32> },
    PreloadEnd { list_id: u8 },
    Reset,
    Shutdown,
}

/// Read and decode one record. Returns `Ok(None)` only when the peer closed
/// the connection cleanly between records (zero bytes read for the tag
/// byte) — that is the ordinary end of a session, not a protocol error.
/// Anything else that goes wrong mid-record is a [`ProtocolError`].
pub fn read_command(stream: &mut impl Read) -> Result<Option<Command>, ProtocolError> {
    let mut tag = [0u8; 1];
    match stream.read(&mut tag)? {
        0 => return Ok(None),
        _ => {}
    }

    let command = match tag[0] {
        b'B' => {
            let list_id = read_list_id(stream)?;
            let total_frames = read_u32(stream)?;
            Command::PreloadBegin { list_id, total_frames }
        }
        b'P' => {
            let list_id = read_list_id(stream)?;
            let count = read_u16(stream)?;
            if count == 0 || count as usize > MAX_WORDS_PER_FRAME {
                return Err(ProtocolError::Overlength(count));
            }
            let mut words = Vec::with_capacity(count as usize);
            for _ in 0..count {
                words.push(read_u32(stream)?);
            }
            Command::PreloadPush { list_id, words }
        }
        b'E' => Command::PreloadEnd { list_id: read_list_id(stream)? },
        b'Z' => Command::Reset,
        b'X' => Command::Shutdown,
        other => return Err(ProtocolError::BadOpcode(other)),
    };
    Ok(Some(command))
}

fn read_list_id(stream: &mut impl Read) -> Result<u8, ProtocolError> {
    let id = read_u8(stream)?;
    if id > 1 {
        return Err(ProtocolError::InvalidListId(id));
    }
    Ok(id)
}

fn read_u8(stream: &mut impl Read) -> Result<u8, ProtocolError> {
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(stream: &mut impl Read) -> Result<u16, ProtocolError> {
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32(stream: &mut impl Read) -> Result<u32, ProtocolError> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decodes_preload_begin() {
        let mut bytes = vec![b'B', 0u8];
        bytes.extend_from_slice(&42u32.to_be_bytes());
        let mut cursor = Cursor::new(bytes);
        assert_eq!(
            read_command(&mut cursor).unwrap(),
            Some(Command::PreloadBegin { list_id: 0, total_frames: 42 })
        );
    }

    #[test]
    fn decodes_preload_push_with_words() {
        let mut bytes = vec![b'P', 1u8];
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&0xABCD_0001u32.to_be_bytes());
        bytes.extend_from_slice(&0xABCD_0002u32.to_be_bytes());
        let mut cursor = Cursor::new(bytes);
        assert_eq!(
            read_command(&mut cursor).unwrap(),
            Some(Command::PreloadPush { list_id: 1, words: vec![0xABCD_0001, 0xABCD_0002] })
        );
    }

    #[test]
    fn rejects_zero_and_oversized_push_counts() {
        for count in [0u16, 65u16] {
            let mut bytes = vec![b'P', 0u8];
            bytes.extend_from_slice(&count.to_be_bytes());
            let mut cursor = Cursor::new(bytes);
            assert!(matches!(read_command(&mut cursor), Err(ProtocolError::Overlength(_))));
        }
    }

    #[test]
    fn rejects_invalid_list_id() {
        let bytes = vec![b'E', 2u8];
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(read_command(&mut cursor), Err(ProtocolError::InvalidListId(2))));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let bytes = vec![b'Q'];
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(read_command(&mut cursor), Err(ProtocolError::BadOpcode(b'Q'))));
    }

    #[test]
    fn empty_stream_is_a_clean_close_not_an_error() {
        let mut cursor = Cursor::new(Vec::new());
        assert_eq!(read_command(&mut cursor).unwrap(), None);
    }

    #[test]
    fn decodes_reset_and_shutdown() {
        assert_eq!(read_command(&mut Cursor::new(vec![b'Z'])).unwrap(), Some(Command::Reset));
        assert_eq!(read_command(&mut Cursor::new(vec![b'X'])).unwrap(), Some(Command::Shutdown));
    }
}
