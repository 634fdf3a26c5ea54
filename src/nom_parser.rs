use nom::bytes::streaming::take;
use nom::combinator::map_opt;
use nom::number::streaming::u8;
use nom::Err::Incomplete;
use nom::IResult;

use crate::checksum;
use crate::frame::StartByte;
use crate::types::Address;

type Buf = [u8];
type Res<'a, O> = IResult<&'a Buf, O>;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub(crate) enum FrameToken<'a> {
    /// A complete frame with a valid checksum.
    Frame {
        start: StartByte,
        address: Address,
        payload: &'a [u8],
    },
    /// A complete frame whose checksum byte doesn't match its content.
    ChecksumMismatch {
        address: Address,
        expected: u8,
        received: u8,
    },
    /// The first byte can't start a frame.
    InvalidStart(u8),
    NeedData,
}

/// Parse one frame from the start of `buf`.
///
/// Returns the number of bytes consumed along with the token, zero if more
/// data is needed. An invalid start byte consumes only that byte.
pub(crate) fn parse_frame(buf: &Buf) -> (usize, FrameToken<'_>) {
    match frame(buf) {
        Ok((remaining, token)) => (buf.len() - remaining.len(), token),
        Err(Incomplete(_)) => (0, FrameToken::NeedData),
        // start_byte is the only parser that can fail, and it has consumed one byte
        Err(_) => (1, FrameToken::InvalidStart(buf[0])),
    }
}

fn frame(input: &Buf) -> Res<'_, FrameToken<'_>> {
    let (buf, start) = start_byte(input)?;
    let (buf, header) = byte(buf)?;
    let (buf, payload) = data(buf, usize::from(header & 0x0f))?;
    let (remaining, received) = byte(buf)?;

    let address = Address::from_header(header);
    let expected = checksum(&input[..input.len() - buf.len()]);
    if expected != received {
        return Ok((
            remaining,
            FrameToken::ChecksumMismatch {
                address,
                expected,
                received,
            },
        ));
    }
    Ok((
        remaining,
        FrameToken::Frame {
            start,
            address,
            payload,
        },
    ))
}

fn start_byte(buf: &Buf) -> Res<'_, StartByte> {
    map_opt(byte, StartByte::from_byte)(buf)
}

fn byte(buf: &Buf) -> Res<'_, u8> {
    u8(buf)
}

fn data(buf: &Buf, len: usize) -> Res<'_, &Buf> {
    take(len)(buf)
}
