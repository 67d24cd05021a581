//! Binlog 이벤트 파싱
//!
//! 각 이벤트:
//!   - Timestamp (4 bytes)
//!   - Type (1 byte)
//!   - Server ID (4 bytes)
//!   - Event Length (4 bytes)
//!   - Next Position (4 bytes)
//!   - Flags (2 bytes)
//!   - Event Data (variable)
//!
//! 이벤트 데이터는 타입 코드로 등록된 디코더가 해석한다.

use crate::error::{BinlogError, Result};
use crate::events::*;
use crate::packet::{binary_string, Packet};
use crate::status_vars::parse_status_vars;

pub const EVENT_HEADER_SIZE: usize = 19;
const SERVER_VERSION_LEN: usize = 50;

/// 이벤트 데이터 디코더. 헤더 뒤의 나머지 바이트를 받는다.
pub type PayloadDecoder = fn(&mut Packet<'_>) -> Result<EventData>;

/// Binlog 이벤트 파서
pub struct BinlogParser;

impl BinlogParser {
    /// 이벤트 헤더 파싱
    pub fn parse_header(packet: &mut Packet<'_>) -> Result<EventHeader> {
        if packet.remaining() < EVENT_HEADER_SIZE {
            return Err(BinlogError::InvalidHeader(format!(
                "too short: {} bytes at offset {}",
                packet.remaining(),
                packet.offset()
            )));
        }

        Ok(EventHeader {
            timestamp: packet.read_u32()?,
            event_type: packet.read_u8()?,
            server_id: packet.read_u32()?,
            event_size: packet.read_u32()?,
            log_pos: packet.read_u32()?,
            flags: packet.read_u16()?,
        })
    }

    /// QUERY 이벤트 파싱 (2)
    pub fn parse_query_event(packet: &mut Packet<'_>) -> Result<EventData> {
        let slave_proxy_id = packet.read_u32()?;
        let execution_time = packet.read_u32()?;
        let schema_len = packet.read_u8()? as usize;
        let error_code = packet.read_u16()?;
        let status_len = packet.read_u16()? as usize;

        let status_vars = parse_status_vars(packet.read_bytes(status_len)?);
        let schema = binary_string(packet.read_bytes(schema_len)?);

        // schema 뒤의 0x00
        if packet.remaining() > 0 {
            packet.read_u8()?;
        }
        let query = binary_string(packet.read_rest());

        Ok(EventData::Query(QueryEvent {
            slave_proxy_id,
            execution_time,
            error_code,
            schema,
            query,
            status_vars,
        }))
    }

    /// ROTATE 이벤트 파싱 (4)
    pub fn parse_rotate_event(packet: &mut Packet<'_>) -> Result<EventData> {
        let low = packet.read_u32()?;
        let high = packet.read_u32()?;
        let next_binlog = binary_string(packet.read_rest());

        Ok(EventData::Rotate(RotateEvent {
            position: u64::from(high) << 32 | u64::from(low),
            next_binlog,
        }))
    }

    /// FORMAT_DESCRIPTION 이벤트 파싱 (15)
    pub fn parse_format_description_event(packet: &mut Packet<'_>) -> Result<EventData> {
        let binlog_version = packet.read_u16()?;
        let version_bytes = packet.read_bytes(SERVER_VERSION_LEN)?;
        let version_len = version_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(version_bytes.len());
        let server_version = binary_string(&version_bytes[..version_len]);
        let create_timestamp = packet.read_u32()?;
        let event_header_length = packet.read_u8()?;
        let events_length = packet.read_rest().to_vec();

        Ok(EventData::FormatDescription(FormatDescriptionEvent {
            binlog_version,
            server_version,
            create_timestamp,
            event_header_length,
            events_length,
        }))
    }

    /// XID 이벤트 파싱 (16)
    pub fn parse_xid_event(packet: &mut Packet<'_>) -> Result<EventData> {
        Ok(EventData::Xid(XidEvent {
            xid: packet.read_u64()?,
        }))
    }
}

/// 타입 코드별 디코더 테이블
#[derive(Clone)]
pub struct EventRegistry {
    decoders: [Option<PayloadDecoder>; 256],
}

impl Default for EventRegistry {
    fn default() -> Self {
        let mut registry = EventRegistry::empty();
        registry.register(EventType::QueryEvent as u8, BinlogParser::parse_query_event);
        registry.register(EventType::RotateEvent as u8, BinlogParser::parse_rotate_event);
        registry.register(
            EventType::FormatDescriptionEvent as u8,
            BinlogParser::parse_format_description_event,
        );
        registry.register(EventType::XidEvent as u8, BinlogParser::parse_xid_event);
        registry
    }
}

impl EventRegistry {
    /// 아무 디코더도 없는 테이블. 모든 이벤트가 `Unknown`이 된다.
    pub fn empty() -> Self {
        EventRegistry {
            decoders: [None; 256],
        }
    }

    /// 디코더 등록. 이전에 등록된 디코더가 있으면 돌려준다.
    pub fn register(&mut self, event_type: u8, decoder: PayloadDecoder) -> Option<PayloadDecoder> {
        self.decoders[event_type as usize].replace(decoder)
    }

    pub fn get(&self, event_type: u8) -> Option<PayloadDecoder> {
        self.decoders[event_type as usize]
    }

    pub fn is_registered(&self, event_type: u8) -> bool {
        self.decoders[event_type as usize].is_some()
    }

    /// 헤더와 데이터를 읽어 이벤트 하나를 만든다
    ///
    /// 헤더를 읽지 못하면 `InvalidHeader`, 데이터를 읽지 못하면 `InvalidEvent`.
    pub fn decode_event(&self, packet: &mut Packet<'_>) -> Result<BinlogEvent> {
        let header = BinlogParser::parse_header(packet)?;

        let data = match self.get(header.event_type) {
            Some(decoder) => decoder(packet).map_err(|e| BinlogError::InvalidEvent {
                event_type: header.event_type,
                reason: e.to_string(),
            })?,
            None => EventData::Unknown,
        };

        Ok(BinlogEvent { header, data })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 헤더 + 데이터로 이벤트 바이트 생성 (OK 상태 바이트 제외)
    pub(crate) fn event_bytes(event_type: u8, log_pos: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        buf.push(event_type);
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&((EVENT_HEADER_SIZE + payload.len()) as u32).to_le_bytes());
        buf.extend_from_slice(&log_pos.to_le_bytes());
        buf.extend_from_slice(&0x0008u16.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    pub(crate) fn query_payload(schema: &str, status_vars: &[u8], query: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&42u32.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.push(schema.len() as u8);
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&(status_vars.len() as u16).to_le_bytes());
        buf.extend_from_slice(status_vars);
        buf.extend_from_slice(schema.as_bytes());
        buf.push(0);
        buf.extend_from_slice(query.as_bytes());
        buf
    }

    pub(crate) fn format_description_payload(server_version: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u16.to_le_bytes());
        let mut version = [0u8; SERVER_VERSION_LEN];
        version[..server_version.len()].copy_from_slice(server_version.as_bytes());
        buf.extend_from_slice(&version);
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.push(EVENT_HEADER_SIZE as u8);
        buf.extend_from_slice(&[0x38, 0x0d, 0x00, 0x08]);
        buf
    }

    #[test]
    fn test_parse_header() {
        let bytes = event_bytes(16, 1234, &[]);
        let mut packet = Packet::new(&bytes);
        let header = BinlogParser::parse_header(&mut packet).unwrap();

        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.event_type, 16);
        assert_eq!(header.server_id, 7);
        assert_eq!(header.event_size, 19);
        assert_eq!(header.log_pos, 1234);
        assert_eq!(header.flags, 8);
        assert_eq!(packet.offset(), EVENT_HEADER_SIZE);
    }

    #[test]
    fn test_short_header_is_fatal() {
        let bytes = event_bytes(16, 4, &[]);
        let mut packet = Packet::new(&bytes[..18]);
        let err = BinlogParser::parse_header(&mut packet).unwrap_err();
        assert!(matches!(err, BinlogError::InvalidHeader(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_parse_query_event() {
        let payload = query_payload("test", &[0x04, 0x21, 0x00, 0x21, 0x00, 0x08, 0x00], "BEGIN");
        let mut packet = Packet::new(&payload);

        match BinlogParser::parse_query_event(&mut packet).unwrap() {
            EventData::Query(event) => {
                assert_eq!(event.slave_proxy_id, 42);
                assert_eq!(event.execution_time, 3);
                assert_eq!(event.error_code, 0);
                assert_eq!(event.schema, "test");
                assert_eq!(event.query, "BEGIN");
                assert_eq!(event.status_vars.client_charset, Some(33));
                assert_eq!(event.status_vars.server_charset, Some(8));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_query_event_short_status_block() {
        let mut payload = query_payload("db", &[], "x");
        // status_len을 실제보다 크게
        payload[11] = 0xff;
        let mut packet = Packet::new(&payload);
        assert!(BinlogParser::parse_query_event(&mut packet).is_err());
    }

    #[test]
    fn test_query_event_ends_after_schema() {
        let mut payload = query_payload("shop", &[], "");
        // 예약 바이트 없이 schema에서 끝남
        payload.pop();
        let mut packet = Packet::new(&payload);

        match BinlogParser::parse_query_event(&mut packet).unwrap() {
            EventData::Query(event) => {
                assert_eq!(event.schema, "shop");
                assert_eq!(event.query, "");
                assert_eq!(event.status_vars, StatusVars::default());
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(packet.is_eof());
    }

    #[test]
    fn test_rotate_event_without_name() {
        let payload = 120u64.to_le_bytes();
        let mut packet = Packet::new(&payload);

        match BinlogParser::parse_rotate_event(&mut packet).unwrap() {
            EventData::Rotate(event) => {
                assert_eq!(event.position, 120);
                assert_eq!(event.next_binlog, "");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_format_description_without_events_length() {
        let mut payload = format_description_payload("5.7.44-log");
        payload.truncate(payload.len() - 4);
        let mut packet = Packet::new(&payload);

        match BinlogParser::parse_format_description_event(&mut packet).unwrap() {
            EventData::FormatDescription(event) => {
                assert_eq!(event.server_version, "5.7.44-log");
                assert_eq!(event.event_header_length, 19);
                assert!(event.events_length.is_empty());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rotate_event_full_position() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&4u32.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(b"mysql-bin.000002");
        let mut packet = Packet::new(&payload);

        match BinlogParser::parse_rotate_event(&mut packet).unwrap() {
            EventData::Rotate(event) => {
                assert_eq!(event.position, (1u64 << 32) | 4);
                assert_eq!(event.next_binlog, "mysql-bin.000002");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_format_description_event() {
        let payload = format_description_payload("8.0.36");
        let mut packet = Packet::new(&payload);

        match BinlogParser::parse_format_description_event(&mut packet).unwrap() {
            EventData::FormatDescription(event) => {
                assert_eq!(event.binlog_version, 4);
                assert_eq!(event.server_version, "8.0.36");
                assert_eq!(event.event_header_length, 19);
                assert_eq!(event.events_length, vec![0x38, 0x0d, 0x00, 0x08]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_type_is_unknown() {
        let registry = EventRegistry::default();
        let bytes = event_bytes(250, 99, &[1, 2, 3]);
        let event = registry.decode_event(&mut Packet::new(&bytes)).unwrap();

        assert_eq!(event.data, EventData::Unknown);
        assert_eq!(event.name(), "UNKNOWN");
        assert_eq!(event.header.event_type, 250);
        assert_eq!(event.header.log_pos, 99);
    }

    #[test]
    fn test_payload_failure_is_local() {
        let registry = EventRegistry::default();
        let bytes = event_bytes(EventType::XidEvent as u8, 10, &[1, 2, 3]);
        let err = registry.decode_event(&mut Packet::new(&bytes)).unwrap_err();

        assert!(matches!(err, BinlogError::InvalidEvent { event_type: 16, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_register_custom_decoder() {
        fn stop_as_xid(_: &mut Packet<'_>) -> Result<EventData> {
            Ok(EventData::Xid(XidEvent { xid: 0 }))
        }

        let mut registry = EventRegistry::empty();
        assert!(!registry.is_registered(3));
        assert!(registry.register(3, stop_as_xid).is_none());

        let bytes = event_bytes(3, 10, &[]);
        let event = registry.decode_event(&mut Packet::new(&bytes)).unwrap();
        assert_eq!(event.name(), "XidEvent");
    }
}
