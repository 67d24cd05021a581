//! 문자셋 인코딩/디코딩
//!
//! utf8, latin1(binary), ascii, utf16le(ucs2), hex, base64(url)은 직접 변환한다.
//! 그 밖의 문자셋은 `encoding_rs`로 해석하고, 해석 결과를 LRU 캐시에 보관한다.

use crate::error::CodecError;
use crate::packet::binary_string;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use encoding_rs::{CoderResult, Decoder, Encoder, EncoderResult, Encoding};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 캐시에 보관할 최대 코덱 수
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const LENIENT_BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 디코딩 옵션
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeOptions {
    /// 앞머리 BOM 제거
    pub strip_bom: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions { strip_bom: true }
    }
}

/// 인코딩 옵션
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeOptions {
    /// 유니코드 인코딩일 때 BOM 추가
    pub add_bom: bool,
}

/// 직접 변환하는 문자셋
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Utf8,
    Latin1,
    Ascii,
    Utf16Le,
    Hex,
    Base64,
    Base64Url,
}

impl Builtin {
    fn from_normalized(name: &str) -> Option<Self> {
        match name {
            "utf8" => Some(Builtin::Utf8),
            "latin1" | "binary" => Some(Builtin::Latin1),
            "ascii" => Some(Builtin::Ascii),
            "utf16le" | "ucs2" => Some(Builtin::Utf16Le),
            "hex" => Some(Builtin::Hex),
            "base64" => Some(Builtin::Base64),
            "base64url" => Some(Builtin::Base64Url),
            _ => None,
        }
    }

    fn decode(self, bytes: &[u8]) -> String {
        match self {
            Builtin::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Builtin::Latin1 => binary_string(bytes),
            Builtin::Ascii => bytes.iter().map(|&b| char::from(b & 0x7f)).collect(),
            Builtin::Utf16Le => {
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Builtin::Hex => bytes.iter().map(|b| format!("{:02x}", b)).collect(),
            Builtin::Base64 => STANDARD.encode(bytes),
            Builtin::Base64Url => URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    fn encode(self, text: &str, encoding: &str) -> Result<Vec<u8>, CodecError> {
        let invalid = |reason: String| CodecError::InvalidInput {
            encoding: encoding.to_string(),
            reason,
        };

        Ok(match self {
            Builtin::Utf8 => text.as_bytes().to_vec(),
            // 0xFF를 넘는 코드 포인트는 하위 바이트만 남는다
            Builtin::Latin1 | Builtin::Ascii => text.chars().map(|c| c as u32 as u8).collect(),
            Builtin::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Builtin::Hex => {
                let mut out = Vec::with_capacity(text.len() / 2);
                for pair in text.as_bytes().chunks_exact(2) {
                    match (hex_value(pair[0]), hex_value(pair[1])) {
                        (Some(high), Some(low)) => out.push(high << 4 | low),
                        _ => break,
                    }
                }
                out
            }
            Builtin::Base64 => LENIENT_BASE64
                .decode(text)
                .map_err(|e| invalid(e.to_string()))?,
            Builtin::Base64Url => LENIENT_BASE64_URL
                .decode(text)
                .map_err(|e| invalid(e.to_string()))?,
        })
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// 소문자로 바꾸고 영숫자만 남긴다 ("UTF-8" -> "utf8")
pub fn normalize_encoding(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// WHATWG 라벨에 없는 MySQL 계열 이름
fn alias(normalized: &str) -> Option<&'static Encoding> {
    match normalized {
        "utf8mb4" | "utf8mb3" => Some(encoding_rs::UTF_8),
        "utf16" => Some(encoding_rs::UTF_16LE),
        "utf16be" | "ucs2be" => Some(encoding_rs::UTF_16BE),
        "euckr" => Some(encoding_rs::EUC_KR),
        "eucjp" | "ujis" | "eucjpms" => Some(encoding_rs::EUC_JP),
        "cp932" | "shiftjis" => Some(encoding_rs::SHIFT_JIS),
        "iso2022jp" => Some(encoding_rs::ISO_2022_JP),
        "koi8r" => Some(encoding_rs::KOI8_R),
        "koi8u" => Some(encoding_rs::KOI8_U),
        "tis620" => Some(encoding_rs::WINDOWS_874),
        "latin7" => Some(encoding_rs::ISO_8859_13),
        "macroman" => Some(encoding_rs::MACINTOSH),
        _ => None,
    }
}

/// 정규화된 이름만으로 인코딩을 찾는다
///
/// 캐시 키가 정규화된 이름이므로 결과도 그 이름에만 의존해야 한다.
/// `label`은 에러 메시지에만 쓰인다.
fn resolve_encoding(label: &str, normalized: &str) -> Result<&'static Encoding, CodecError> {
    alias(normalized)
        .or_else(|| Encoding::for_label(normalized.as_bytes()))
        .or_else(|| {
            // "windows1252" -> "windows-1252", "iso885915" -> "iso-8859-15"
            let dashed = if let Some(code) = normalized.strip_prefix("windows") {
                format!("windows-{}", code)
            } else if let Some(part) = normalized.strip_prefix("iso8859") {
                format!("iso-8859-{}", part)
            } else {
                return None;
            };
            Encoding::for_label(dashed.as_bytes())
        })
        .ok_or_else(|| CodecError::UnknownEncoding(label.to_string()))
}

/// 해석이 끝난 문자셋. 캐시에 보관되어 여러 호출에서 재사용된다.
#[derive(Debug)]
pub struct Charset {
    encoding: &'static Encoding,
    strip_bom: bool,
}

impl Charset {
    pub fn resolve(label: &str, options: Option<&DecodeOptions>) -> Result<Self, CodecError> {
        let encoding = resolve_encoding(label, &normalize_encoding(label))?;
        Ok(Charset {
            encoding,
            strip_bom: options.copied().unwrap_or_default().strip_bom,
        })
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut decoder = if self.strip_bom {
            self.encoding.new_decoder_with_bom_removal()
        } else {
            self.encoding.new_decoder_without_bom_handling()
        };

        let mut out = String::new();
        decode_into(&mut decoder, bytes, &mut out, false);

        // 남아 있던 불완전한 시퀀스 처리
        let mut trail = String::new();
        decode_into(&mut decoder, &[], &mut trail, true);
        if !trail.is_empty() {
            out.push_str(&trail);
        }
        out
    }
}

fn decode_into(decoder: &mut Decoder, mut src: &[u8], dst: &mut String, last: bool) {
    loop {
        let needed = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or(src.len() * 3 + 16);
        dst.reserve(needed);

        let (result, read, _) = decoder.decode_to_string(src, dst, last);
        src = &src[read..];
        if let CoderResult::InputEmpty = result {
            return;
        }
    }
}

fn encode_into(encoder: &mut Encoder, mut src: &str, dst: &mut Vec<u8>, last: bool) {
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(src.len())
            .unwrap_or(src.len() * 4 + 16);
        dst.reserve(needed);

        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(src, dst, last);
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => return,
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(_) => dst.push(b'?'),
        }
    }
}

fn encode_with(encoding: &'static Encoding, text: &str, options: &EncodeOptions) -> Result<Vec<u8>, CodecError> {
    if encoding == encoding_rs::REPLACEMENT {
        return Err(CodecError::Unencodable {
            encoding: encoding.name().to_string(),
        });
    }

    let mut out = Vec::new();
    if options.add_bom {
        if encoding == encoding_rs::UTF_8 {
            out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
        } else if encoding == encoding_rs::UTF_16LE {
            out.extend_from_slice(&[0xFF, 0xFE]);
        } else if encoding == encoding_rs::UTF_16BE {
            out.extend_from_slice(&[0xFE, 0xFF]);
        }
    }

    // encoding_rs는 UTF-16 출력 인코더를 제공하지 않는다
    if encoding == encoding_rs::UTF_16LE {
        out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        return Ok(out);
    }
    if encoding == encoding_rs::UTF_16BE {
        out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
        return Ok(out);
    }

    let mut encoder = encoding.new_encoder();
    encode_into(&mut encoder, text, &mut out, false);

    let mut trail = Vec::new();
    encode_into(&mut encoder, "", &mut trail, true);
    if !trail.is_empty() {
        out.extend_from_slice(&trail);
    }
    Ok(out)
}

struct CacheEntry {
    charset: Arc<Charset>,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
}

/// 용량 제한이 있는 LRU 코덱 캐시
pub struct CodecCache {
    capacity: usize,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CodecCache {
    pub fn new(capacity: usize) -> Self {
        CodecCache {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 최근 사용 순서를 바꾸지 않고 존재 여부만 확인
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// 캐시에서 꺼내거나, 없으면 `make`로 만들어 넣는다
    pub fn get_or_try_insert_with<F>(&self, key: &str, make: F) -> Result<Arc<Charset>, CodecError>
    where
        F: FnOnce() -> Result<Charset, CodecError>,
    {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;

        if let Some(entry) = state.entries.get_mut(key) {
            entry.last_used = tick;
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.charset));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let charset = Arc::new(make()?);

        if state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                charset: Arc::clone(&charset),
                last_used: tick,
            },
        );
        Ok(charset)
    }
}

impl Default for CodecCache {
    fn default() -> Self {
        CodecCache::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[derive(Serialize)]
struct CacheKey<'a> {
    encoding: &'a str,
    options: &'a DecodeOptions,
}

/// 문자셋 코덱 서비스. 캐시를 소유하며 스레드 간에 공유할 수 있다.
#[derive(Default)]
pub struct TextCodec {
    cache: CodecCache,
}

impl TextCodec {
    pub fn new() -> Self {
        TextCodec::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        TextCodec {
            cache: CodecCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &CodecCache {
        &self.cache
    }

    /// `bytes[start..end]`를 `encoding`으로 디코딩. 범위는 버퍼 길이로 잘린다.
    pub fn decode(
        &self,
        bytes: &[u8],
        encoding: &str,
        start: usize,
        end: usize,
        options: Option<&DecodeOptions>,
    ) -> Result<String, CodecError> {
        let end = end.min(bytes.len());
        let slice = &bytes[start.min(end)..end];
        let normalized = normalize_encoding(encoding);

        if let Some(builtin) = Builtin::from_normalized(&normalized) {
            return Ok(builtin.decode(slice));
        }

        let key = match options {
            None => normalized,
            Some(options) => serde_json::to_string(&CacheKey {
                encoding: &normalized,
                options,
            })
            .map_err(|e| CodecError::InvalidInput {
                encoding: encoding.to_string(),
                reason: e.to_string(),
            })?,
        };

        let charset = self
            .cache
            .get_or_try_insert_with(&key, || Charset::resolve(encoding, options))?;
        Ok(charset.decode(slice))
    }

    /// 문자열을 `encoding` 바이트로 변환
    pub fn encode(
        &self,
        text: &str,
        encoding: &str,
        options: Option<&EncodeOptions>,
    ) -> Result<Vec<u8>, CodecError> {
        let normalized = normalize_encoding(encoding);
        if let Some(builtin) = Builtin::from_normalized(&normalized) {
            return builtin.encode(text, encoding);
        }

        let resolved = resolve_encoding(encoding, &normalized)?;
        encode_with(resolved, text, &options.copied().unwrap_or_default())
    }
}
