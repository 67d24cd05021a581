//! MySQL 프로토콜 패킷 처리
//!
//! 4 바이트 헤더(3 bytes length + 1 byte sequence)로 프레이밍된 패킷을 읽고 쓴다.

use crate::error::{BinlogError, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// 한 프레임에 담을 수 있는 최대 페이로드. 이 길이의 프레임 뒤에는 이어지는 프레임이 온다.
pub const MAX_PAYLOAD_LEN: usize = 0xFF_FFFF;

const EOF_HEADER: u8 = 0xFE;
const ERR_HEADER: u8 = 0xFF;

/// 요청 패킷을 내보내는 쪽
pub trait PacketSink {
    fn send_packet(&mut self, payload: &[u8], sequence: u8) -> Result<()>;
}

/// 프레임을 그대로 버퍼에 쌓는다. 비동기 채널로 보내기 전 단계에서 쓴다.
impl PacketSink for Vec<u8> {
    fn send_packet(&mut self, payload: &[u8], sequence: u8) -> Result<()> {
        write_frame(self, payload, sequence)
    }
}

/// 페이로드 하나를 프레임으로 감싸 `out`에 추가
pub fn write_frame(out: &mut Vec<u8>, payload: &[u8], sequence: u8) -> Result<()> {
    let mut sequence = sequence;
    let mut chunks = payload.chunks(MAX_PAYLOAD_LEN).peekable();

    if chunks.peek().is_none() {
        out.write_u24::<LittleEndian>(0)?;
        WriteBytesExt::write_u8(&mut *out, sequence)?;
        return Ok(());
    }

    while let Some(chunk) = chunks.next() {
        out.write_u24::<LittleEndian>(chunk.len() as u32)?;
        WriteBytesExt::write_u8(&mut *out, sequence)?;
        out.extend_from_slice(chunk);
        sequence = sequence.wrapping_add(1);

        // 정확히 최대 길이로 끝나면 빈 프레임으로 마무리
        if chunks.peek().is_none() && chunk.len() == MAX_PAYLOAD_LEN {
            out.write_u24::<LittleEndian>(0)?;
            WriteBytesExt::write_u8(&mut *out, sequence)?;
        }
    }
    Ok(())
}

/// MySQL 패킷 채널
pub struct PacketChannel<S> {
    stream: S,
}

impl<S> PacketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        PacketChannel { stream }
    }

    /// 패킷 읽기. 여러 프레임으로 나뉜 페이로드는 하나로 합친다.
    pub async fn read_packet(&mut self) -> Result<Bytes> {
        let mut payload = BytesMut::new();

        loop {
            let mut len_buf = [0u8; 3];
            self.stream
                .read_exact(&mut len_buf)
                .await
                .map_err(|e| BinlogError::Io(format!("Failed to read packet length: {}", e)))?;
            let length = u32::from_le_bytes([len_buf[0], len_buf[1], len_buf[2], 0]) as usize;

            let _sequence = self
                .stream
                .read_u8()
                .await
                .map_err(|e| BinlogError::Io(format!("Failed to read sequence: {}", e)))?;

            let start = payload.len();
            payload.resize(start + length, 0);
            self.stream
                .read_exact(&mut payload[start..])
                .await
                .map_err(|e| BinlogError::Io(format!("Failed to read packet body: {}", e)))?;

            if length < MAX_PAYLOAD_LEN {
                break;
            }
        }

        Ok(payload.freeze())
    }

    /// 이미 프레이밍된 바이트 전송
    pub async fn write_frames(&mut self, frames: &[u8]) -> Result<()> {
        self.stream
            .write_all(frames)
            .await
            .map_err(|e| BinlogError::Io(format!("Failed to write data: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| BinlogError::Io(format!("Failed to flush: {}", e)))?;
        Ok(())
    }
}

/// Error 패킷 확인
pub fn is_error_packet(data: &[u8]) -> bool {
    !data.is_empty() && data[0] == ERR_HEADER
}

/// EOF 패킷 확인 (0xFE, 패킷 길이 < 9)
pub fn is_eof_packet(data: &[u8]) -> bool {
    !data.is_empty() && data[0] == EOF_HEADER && data.len() < 9
}

/// Error 패킷을 에러로 변환
///
/// 레이아웃: 0xFF, error_code(u16le), ['#' + 5 바이트 SQL state], message
pub fn parse_error_packet(data: &[u8]) -> BinlogError {
    if data.len() < 3 {
        return BinlogError::ServerError {
            code: 0,
            message: "truncated error packet".to_string(),
        };
    }

    let code = u16::from_le_bytes([data[1], data[2]]);
    let rest = &data[3..];
    let message = if rest.first() == Some(&b'#') && rest.len() >= 6 {
        &rest[6..]
    } else {
        rest
    };

    BinlogError::ServerError {
        code,
        message: String::from_utf8_lossy(message).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_error_packet() {
        assert!(is_error_packet(&[0xFF, 0x01, 0x02]));
        assert!(!is_error_packet(&[0x00, 0x01, 0x02]));
    }

    #[test]
    fn test_is_eof_packet() {
        assert!(is_eof_packet(&[0xFE, 0x00, 0x00, 0x02, 0x00]));
        // 0xFE로 시작해도 9 바이트 이상이면 EOF가 아니다
        assert!(!is_eof_packet(&[0xFE; 9]));
        assert!(!is_eof_packet(&[]));
    }

    #[test]
    fn test_parse_error_packet_with_sql_state() {
        let mut data = vec![0xFF, 0x29, 0x05, b'#'];
        data.extend_from_slice(b"HY000");
        data.extend_from_slice(b"Could not find first log file name");

        match parse_error_packet(&data) {
            BinlogError::ServerError { code, message } => {
                assert_eq!(code, 1321);
                assert_eq!(message, "Could not find first log file name");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_write_frame() {
        let mut out = Vec::new();
        write_frame(&mut out, &[0x12, 0x34], 3).unwrap();
        assert_eq!(out, vec![0x02, 0x00, 0x00, 0x03, 0x12, 0x34]);

        let mut empty = Vec::new();
        write_frame(&mut empty, &[], 9).unwrap();
        assert_eq!(empty, vec![0x00, 0x00, 0x00, 0x09]);
    }

    #[test]
    fn test_write_frame_exact_max_adds_empty_frame() {
        let payload = vec![0x11; MAX_PAYLOAD_LEN];
        let mut out = Vec::new();
        write_frame(&mut out, &payload, 0).unwrap();

        assert_eq!(out.len(), 4 + MAX_PAYLOAD_LEN + 4);
        assert_eq!(&out[..4], &[0xFF, 0xFF, 0xFF, 0x00]);
        assert_eq!(&out[out.len() - 4..], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn test_read_packet_joins_split_payload() {
        let first = vec![0xAB; MAX_PAYLOAD_LEN];
        let mut input = Vec::new();
        input.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0x00]);
        input.extend_from_slice(&first);
        input.extend_from_slice(&[0x01, 0x00, 0x00, 0x01, 0xCD]);

        let mock = tokio_test::io::Builder::new().read(&input).build();
        let mut channel = PacketChannel::new(mock);
        let packet = channel.read_packet().await.unwrap();

        assert_eq!(packet.len(), MAX_PAYLOAD_LEN + 1);
        assert_eq!(packet[packet.len() - 1], 0xCD);
    }
}
