//! 커서 기반 패킷 리더
//!
//! 모든 정수는 little-endian. 남은 바이트보다 많이 읽으려 하면
//! `BinlogError::OutOfBounds`를 돌려준다.

use crate::error::{BinlogError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// 패킷 한 개에 대한 읽기 커서
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Packet<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Packet { buf, offset: 0 }
    }

    /// 현재 읽기 위치
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 패킷 끝 위치
    pub fn end(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// EOF 패킷 여부 (0xFE 마커, 9 바이트 미만)
    pub fn is_eof(&self) -> bool {
        crate::protocol::is_eof_packet(self.buf)
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if needed > available {
            return Err(BinlogError::OutOfBounds {
                offset: self.offset,
                needed,
                available,
            });
        }
        let start = self.offset;
        self.offset += needed;
        Ok(&self.buf[start..self.offset])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// 남은 바이트 전부
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.offset..];
        self.offset = self.buf.len();
        rest
    }
}

/// 바이트를 그대로 코드 포인트로 옮기는 단일 바이트 디코딩 (latin1)
pub fn binary_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
