//! MySQL Binlog 이벤트 타입 및 데이터 구조 정의

use crate::charset;
use crate::codec::TextCodec;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MySQL Binlog 이벤트 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    /// 알 수 없는 이벤트
    Unknown = 0,
    StartV3 = 1,
    /// 쿼리 이벤트 (DDL, BEGIN, statement 기반 DML)
    QueryEvent = 2,
    StopEvent = 3,
    /// 로테이션 이벤트 (새 binlog 파일)
    RotateEvent = 4,
    IntvarEvent = 5,
    /// 포맷 설명 이벤트 (스트림 첫 이벤트)
    FormatDescriptionEvent = 15,
    /// XID 이벤트 (트랜잭션 커밋)
    XidEvent = 16,
    /// 테이블 맵 이벤트 (스키마 정보)
    TableMapEvent = 19,
    /// Rows Query 이벤트 (원본 쿼리)
    RowsQueryEvent = 29,
    /// WRITE_ROWS 이벤트 (INSERT)
    WriteRowsEvent = 30,
    /// UPDATE_ROWS 이벤트 (UPDATE)
    UpdateRowsEvent = 31,
    /// DELETE_ROWS 이벤트 (DELETE)
    DeleteRowsEvent = 32,
    /// GTID 이벤트 (Global Transaction ID)
    GtidEvent = 33,
    /// 익명 GTID 이벤트
    AnonymousGtidEvent = 34,
    PreviousGtidsEvent = 35,
    /// 트랜잭션 페이로드 이벤트
    TransactionPayloadEvent = 40,
}

impl EventType {
    pub fn from_u8(val: u8) -> Self {
        match val {
            1 => EventType::StartV3,
            2 => EventType::QueryEvent,
            3 => EventType::StopEvent,
            4 => EventType::RotateEvent,
            5 => EventType::IntvarEvent,
            15 => EventType::FormatDescriptionEvent,
            16 => EventType::XidEvent,
            19 => EventType::TableMapEvent,
            29 => EventType::RowsQueryEvent,
            30 => EventType::WriteRowsEvent,
            31 => EventType::UpdateRowsEvent,
            32 => EventType::DeleteRowsEvent,
            33 => EventType::GtidEvent,
            34 => EventType::AnonymousGtidEvent,
            35 => EventType::PreviousGtidsEvent,
            40 => EventType::TransactionPayloadEvent,
            _ => EventType::Unknown,
        }
    }
}

/// Binlog 이벤트 헤더 (19 바이트 고정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    /// 이벤트 타임스탬프 (초 단위)
    pub timestamp: u32,
    /// 이벤트 타입 코드
    pub event_type: u8,
    /// MySQL 서버 ID
    pub server_id: u32,
    /// 이벤트 길이 (헤더 포함, 바이트)
    pub event_size: u32,
    /// 다음 이벤트 위치
    pub log_pos: u32,
    /// 이벤트 플래그
    pub flags: u16,
}

impl EventHeader {
    pub fn kind(&self) -> EventType {
        EventType::from_u8(self.event_type)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.timestamp), 0)
    }
}

/// 쿼리 이벤트의 status variables
///
/// 원본 바이트에 없던 항목은 `None`(목록은 비어 있음)으로 남는다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusVars {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_mode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_increment_increment: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_increment_offset: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_charset: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_collation: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_charset: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_nz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lc_time_names: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_charset: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_for_update1: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_for_update2: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_data_written: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoker_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoker_hostname: Option<String>,
    #[serde(rename = "updatedDBs", skip_serializing_if = "Vec::is_empty", default)]
    pub updated_dbs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microseconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_defaults_for_timestamp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddl_xid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_collation_for_utf8mb4: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_require_primary_key: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_table_encryption: Option<u8>,
}

/// 쿼리 이벤트 데이터 (2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvent {
    /// 쿼리를 실행한 스레드 ID
    pub slave_proxy_id: u32,
    /// 실행 시간 (초)
    pub execution_time: u32,
    pub error_code: u16,
    /// 기본 데이터베이스명 (단일 바이트 디코딩)
    pub schema: String,
    /// 쿼리 문자열 (단일 바이트 디코딩)
    pub query: String,
    pub status_vars: StatusVars,
}

impl QueryEvent {
    /// 클라이언트 문자셋으로 쿼리 문자열을 다시 디코딩
    ///
    /// 문자셋 정보가 없거나 매핑되지 않은 collation이면 원본 문자열을 그대로 돌려준다.
    pub fn decode_query(&self, codec: &TextCodec) -> Result<String> {
        let encoding = self
            .status_vars
            .client_charset
            .and_then(charset::encoding_for_collation);

        match encoding {
            Some(encoding) => {
                // 단일 바이트 디코딩은 손실이 없으므로 원래 바이트로 되돌릴 수 있다
                let raw: Vec<u8> = self.query.chars().map(|c| c as u32 as u8).collect();
                Ok(codec.decode(&raw, encoding, 0, raw.len(), None)?)
            }
            None => Ok(self.query.clone()),
        }
    }
}

/// 회전 이벤트 데이터 (4)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateEvent {
    /// 새 파일의 시작 위치
    pub position: u64,
    /// 새 바이너리 로그 파일명
    pub next_binlog: String,
}

/// 포맷 설명 이벤트 데이터 (15)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptionEvent {
    pub binlog_version: u16,
    pub server_version: String,
    pub create_timestamp: u32,
    /// 항상 19. 이후 헤더 길이 계산에는 쓰지 않는다.
    pub event_header_length: u8,
    /// 이벤트 타입별 post-header 길이 (디코딩하지 않음)
    pub events_length: Vec<u8>,
}

/// XID 이벤트 데이터 (16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XidEvent {
    pub xid: u64,
}

/// 타입별 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventData {
    Query(QueryEvent),
    Rotate(RotateEvent),
    FormatDescription(FormatDescriptionEvent),
    Xid(XidEvent),
    Unknown,
}

impl EventData {
    pub fn name(&self) -> &'static str {
        match self {
            EventData::Query(_) => "QueryEvent",
            EventData::Rotate(_) => "RotateEvent",
            EventData::FormatDescription(_) => "FormatDescriptionEvent",
            EventData::Xid(_) => "XidEvent",
            EventData::Unknown => "UNKNOWN",
        }
    }
}

/// 완성된 Binlog 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinlogEvent {
    /// 이벤트 헤더
    pub header: EventHeader,
    /// 이벤트 데이터
    pub data: EventData,
}

impl BinlogEvent {
    pub fn name(&self) -> &'static str {
        self.data.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_from_u8() {
        assert_eq!(EventType::from_u8(2), EventType::QueryEvent);
        assert_eq!(EventType::from_u8(15), EventType::FormatDescriptionEvent);
        assert_eq!(EventType::from_u8(250), EventType::Unknown);

        for code in [1u8, 2, 3, 4, 5, 15, 16, 19, 29, 30, 31, 32, 33, 34, 35, 40] {
            assert_eq!(EventType::from_u8(code) as u8, code);
        }
    }

    #[test]
    fn test_header_datetime() {
        let header = EventHeader {
            timestamp: 1_700_000_000,
            event_type: 16,
            server_id: 1,
            event_size: 31,
            log_pos: 100,
            flags: 0,
        };
        assert_eq!(header.kind(), EventType::XidEvent);
        assert_eq!(header.datetime().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_absent_status_vars_are_omitted() {
        let vars = StatusVars {
            server_charset: Some(33),
            ..Default::default()
        };
        let json = serde_json::to_value(&vars).unwrap();
        assert_eq!(json, serde_json::json!({ "serverCharset": 33 }));
    }

    #[test]
    fn test_decode_query_uses_client_charset() {
        let codec = TextCodec::new();
        let utf8 = "SELECT '한글'";
        let event = QueryEvent {
            slave_proxy_id: 1,
            execution_time: 0,
            error_code: 0,
            schema: "test".to_string(),
            query: crate::packet::binary_string(utf8.as_bytes()),
            status_vars: StatusVars {
                client_charset: Some(45),
                ..Default::default()
            },
        };
        assert_eq!(event.decode_query(&codec).unwrap(), utf8);

        let without_charset = QueryEvent {
            status_vars: StatusVars::default(),
            ..event
        };
        assert_eq!(
            without_charset.decode_query(&codec).unwrap(),
            without_charset.query
        );
    }
}
