//! Binlog 스트림 및 문자셋 코덱 에러 타입

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BinlogError {
    #[error("패킷 범위 초과: offset={offset}, 필요={needed}, 남은 바이트={available}")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("이벤트 헤더 파싱 에러: {0}")]
    InvalidHeader(String),

    #[error("유효하지 않은 이벤트 (type={event_type}): {reason}")]
    InvalidEvent { event_type: u8, reason: String },

    #[error("서버 에러 {code}: {message}")]
    ServerError { code: u16, message: String },

    #[error("스트림이 이미 종료되었습니다")]
    StreamEnded,

    #[error("I/O 에러: {0}")]
    Io(String),

    #[error("코덱 에러: {0}")]
    Codec(#[from] CodecError),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("채널이 닫혔습니다")]
    ChannelClosed,
}

impl BinlogError {
    /// 스트림을 더 이상 사용할 수 없는 에러인지 여부
    ///
    /// 페이로드 단위 에러(`InvalidEvent`)는 해당 이벤트만 버리고 계속 읽을 수 있다.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BinlogError::InvalidEvent { .. } | BinlogError::Codec(_))
    }
}

impl From<io::Error> for BinlogError {
    fn from(err: io::Error) -> Self {
        BinlogError::Io(err.to_string())
    }
}

/// 문자셋 변환 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("알 수 없는 인코딩: {0}")]
    UnknownEncoding(String),

    #[error("{encoding} 인코딩으로 변환할 수 없습니다")]
    Unencodable { encoding: String },

    #[error("{encoding} 입력이 잘못되었습니다: {reason}")]
    InvalidInput { encoding: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BinlogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let header = BinlogError::InvalidHeader("short".to_string());
        assert!(header.is_fatal());

        let payload = BinlogError::InvalidEvent {
            event_type: 2,
            reason: "short".to_string(),
        };
        assert!(!payload.is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let err: BinlogError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, BinlogError::Io(_)));
    }
}
