//! MySQL Binlog 이벤트 스트림 디코더
//!
//! 복제 연결 위에서 binlog 스트림을 받아 이벤트 단위로 해석합니다.
//! 주요 기능:
//! - COM_BINLOG_DUMP 요청 및 스트림 상태 관리
//! - 이벤트 헤더 / 이벤트 데이터 파싱 (타입 코드별 디코더 테이블)
//! - 쿼리 이벤트 status variables 파싱
//! - 문자셋 인코딩/디코딩 및 코덱 캐시

pub mod binlog;
pub mod binlog_client;
pub mod charset;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod packet;
pub mod protocol;
pub mod status_vars;
pub mod stream;

pub use binlog::{BinlogParser, EventRegistry};
pub use binlog_client::{BinlogClient, BinlogDumpRequest};
pub use codec::{DecodeOptions, EncodeOptions, TextCodec};
pub use config::StreamConfig;
pub use error::{BinlogError, CodecError, Result};
pub use events::{BinlogEvent, EventData, EventHeader, EventType, StatusVars};
pub use protocol::PacketChannel;
pub use stream::{BinlogListener, BinlogStream, StreamNotification, StreamState};
