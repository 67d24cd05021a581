//! 쿼리 이벤트 status variables 디코딩
//!
//! 태그 1 바이트 + 태그별 고정 폭 또는 길이 접두 값이 반복된다.
//! 남은 바이트가 부족하거나 모르는 태그를 만나면 그 자리에서 멈추고
//! 지금까지 읽은 값만 돌려준다.

use crate::events::StatusVars;
use byteorder::{ByteOrder, LittleEndian};

/// UPDATED_DB_NAMES의 count가 이 값이면 목록 없이 "너무 많음"을 뜻한다
const OVER_MAX_DBS_IN_EVENT_MTS: u8 = 254;

/// Status variable 태그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusVarKey {
    Flags2 = 0,
    SqlMode = 1,
    /// 길이 + 문자열 + NUL
    Catalog = 2,
    /// auto_increment_increment(u16) + auto_increment_offset(u16)
    AutoIncrement = 3,
    /// character_set_client, collation_connection, collation_server (각 u16)
    Charset = 4,
    TimeZone = 5,
    CatalogNz = 6,
    LcTimeNames = 7,
    CharsetDatabase = 8,
    TableMapForUpdate = 9,
    MasterDataWritten = 10,
    /// 길이 접두 user, 길이 접두 host
    Invokers = 11,
    /// count + NUL로 끝나는 db 이름들
    UpdatedDbNames = 12,
    /// 3 바이트 unsigned
    Microseconds = 13,
    ExplicitDefaultsForTimestamp = 16,
    DdlLoggedWithXid = 17,
    DefaultCollationForUtf8mb4 = 18,
    SqlRequirePrimaryKey = 19,
    DefaultTableEncryption = 20,
}

impl TryFrom<u8> for StatusVarKey {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusVarKey::Flags2),
            1 => Ok(StatusVarKey::SqlMode),
            2 => Ok(StatusVarKey::Catalog),
            3 => Ok(StatusVarKey::AutoIncrement),
            4 => Ok(StatusVarKey::Charset),
            5 => Ok(StatusVarKey::TimeZone),
            6 => Ok(StatusVarKey::CatalogNz),
            7 => Ok(StatusVarKey::LcTimeNames),
            8 => Ok(StatusVarKey::CharsetDatabase),
            9 => Ok(StatusVarKey::TableMapForUpdate),
            10 => Ok(StatusVarKey::MasterDataWritten),
            11 => Ok(StatusVarKey::Invokers),
            12 => Ok(StatusVarKey::UpdatedDbNames),
            13 => Ok(StatusVarKey::Microseconds),
            16 => Ok(StatusVarKey::ExplicitDefaultsForTimestamp),
            17 => Ok(StatusVarKey::DdlLoggedWithXid),
            18 => Ok(StatusVarKey::DefaultCollationForUtf8mb4),
            19 => Ok(StatusVarKey::SqlRequirePrimaryKey),
            20 => Ok(StatusVarKey::DefaultTableEncryption),
            x => Err(x),
        }
    }
}

/// 범위를 벗어나면 `None`을 돌려주는 커서
struct VarCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> VarCursor<'a> {
    fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    fn u64(&mut self) -> Option<u64> {
        self.take(8).map(LittleEndian::read_u64)
    }

    /// 1 바이트 길이 + 문자열
    fn length_prefixed(&mut self) -> Option<String> {
        let len = self.u8()? as usize;
        self.take(len).map(lossy)
    }

    /// 다음 0 바이트(또는 버퍼 끝)까지의 문자열. 종료 바이트는 건너뛴다.
    fn nul_terminated(&mut self) -> Option<String> {
        if !self.has_remaining() {
            return None;
        }
        let rest = &self.buf[self.pos..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let value = lossy(&rest[..len]);
        self.pos = (self.pos + len + 1).min(self.buf.len());
        Some(value)
    }

    fn skip_terminator(&mut self) {
        if self.has_remaining() {
            self.pos += 1;
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// status variables 블록 파싱
pub fn parse_status_vars(buf: &[u8]) -> StatusVars {
    let mut vars = StatusVars::default();
    let mut cursor = VarCursor { buf, pos: 0 };

    while let Some(tag) = cursor.u8() {
        let key = match StatusVarKey::try_from(tag) {
            Ok(key) => key,
            // 폭을 모르면 다음 태그 위치를 알 수 없다
            Err(_) => break,
        };
        if decode_var(key, &mut cursor, &mut vars).is_none() {
            break;
        }
    }

    vars
}

fn decode_var(key: StatusVarKey, cursor: &mut VarCursor<'_>, vars: &mut StatusVars) -> Option<()> {
    match key {
        StatusVarKey::Flags2 => vars.flags = Some(cursor.u32()?),
        StatusVarKey::SqlMode => {
            // 8 바이트 중 문서화된 플래그는 하위 4 바이트에 있다
            let value = cursor.u64()?;
            vars.sql_mode = Some(value as u32);
        }
        StatusVarKey::Catalog => {
            vars.catalog = Some(cursor.length_prefixed()?);
            cursor.skip_terminator();
        }
        StatusVarKey::AutoIncrement => {
            let bytes = cursor.take(4)?;
            vars.auto_increment_increment = Some(LittleEndian::read_u16(&bytes[0..2]));
            vars.auto_increment_offset = Some(LittleEndian::read_u16(&bytes[2..4]));
        }
        StatusVarKey::Charset => {
            let bytes = cursor.take(6)?;
            vars.client_charset = Some(LittleEndian::read_u16(&bytes[0..2]));
            vars.connection_collation = Some(LittleEndian::read_u16(&bytes[2..4]));
            vars.server_charset = Some(LittleEndian::read_u16(&bytes[4..6]));
        }
        StatusVarKey::TimeZone => vars.time_zone = Some(cursor.length_prefixed()?),
        StatusVarKey::CatalogNz => vars.catalog_nz = Some(cursor.length_prefixed()?),
        StatusVarKey::LcTimeNames => vars.lc_time_names = Some(cursor.u16()?),
        StatusVarKey::CharsetDatabase => vars.schema_charset = Some(cursor.u16()?),
        StatusVarKey::TableMapForUpdate => {
            let bytes = cursor.take(8)?;
            vars.map_for_update1 = Some(LittleEndian::read_u32(&bytes[0..4]));
            vars.map_for_update2 = Some(LittleEndian::read_u32(&bytes[4..8]));
        }
        StatusVarKey::MasterDataWritten => vars.master_data_written = Some(cursor.u32()?),
        StatusVarKey::Invokers => {
            vars.invoker_username = Some(cursor.length_prefixed()?);
            vars.invoker_hostname = Some(cursor.length_prefixed()?);
        }
        StatusVarKey::UpdatedDbNames => {
            let count = cursor.u8()?;
            if count != OVER_MAX_DBS_IN_EVENT_MTS {
                for _ in 0..count {
                    vars.updated_dbs.push(cursor.nul_terminated()?);
                }
            }
        }
        StatusVarKey::Microseconds => {
            let bytes = cursor.take(3)?;
            let low = u32::from(LittleEndian::read_u16(&bytes[0..2]));
            vars.microseconds = Some(low | u32::from(bytes[2]) << 16);
        }
        StatusVarKey::ExplicitDefaultsForTimestamp => {
            vars.explicit_defaults_for_timestamp = Some(cursor.u8()? != 0)
        }
        StatusVarKey::DdlLoggedWithXid => vars.ddl_xid = Some(cursor.u64()?),
        StatusVarKey::DefaultCollationForUtf8mb4 => {
            vars.default_collation_for_utf8mb4 = Some(cursor.u16()?)
        }
        StatusVarKey::SqlRequirePrimaryKey => vars.sql_require_primary_key = Some(cursor.u8()?),
        StatusVarKey::DefaultTableEncryption => {
            vars.default_table_encryption = Some(cursor.u8()?)
        }
    }
    Some(())
}
