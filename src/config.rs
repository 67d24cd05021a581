//! Binlog 스트림 설정

use crate::binlog_client::BinlogDumpRequest;
use crate::codec::{TextCodec, DEFAULT_CACHE_CAPACITY};
use std::env;
use std::str::FromStr;

/// 스트림 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// replica로서 서버에 알릴 ID
    pub server_id: u32,
    /// 시작 binlog 파일명 (빈 문자열이면 서버의 첫 파일)
    pub binlog_filename: String,
    /// 시작 위치. binlog은 4 바이트 매직 넘버 뒤부터 시작한다
    pub binlog_position: u32,
    pub dump_flags: u16,
    pub codec_cache_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            server_id: 1,
            binlog_filename: String::new(),
            binlog_position: 4,
            dump_flags: 0,
            codec_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl StreamConfig {
    pub fn new(binlog_filename: impl Into<String>, binlog_position: u32) -> Self {
        StreamConfig {
            binlog_filename: binlog_filename.into(),
            binlog_position,
            ..Default::default()
        }
    }

    /// 환경 변수로 기본값 덮어쓰기
    ///
    /// BINLOG_SERVER_ID, BINLOG_FILE, BINLOG_POSITION, BINLOG_DUMP_FLAGS,
    /// BINLOG_CODEC_CACHE_CAPACITY. 파싱할 수 없는 값은 무시한다.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = StreamConfig::default();
        StreamConfig {
            server_id: parse_or(lookup("BINLOG_SERVER_ID"), defaults.server_id),
            binlog_filename: lookup("BINLOG_FILE").unwrap_or(defaults.binlog_filename),
            binlog_position: parse_or(lookup("BINLOG_POSITION"), defaults.binlog_position),
            dump_flags: parse_or(lookup("BINLOG_DUMP_FLAGS"), defaults.dump_flags),
            codec_cache_capacity: parse_or(
                lookup("BINLOG_CODEC_CACHE_CAPACITY"),
                defaults.codec_cache_capacity,
            ),
        }
    }

    pub fn dump_request(&self) -> BinlogDumpRequest {
        BinlogDumpRequest::new(self.server_id, self.binlog_filename.clone(), self.binlog_position)
            .with_flags(self.dump_flags)
    }

    /// 설정된 캐시 용량으로 코덱 생성
    pub fn text_codec(&self) -> TextCodec {
        TextCodec::with_capacity(self.codec_cache_capacity)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
