//! MySQL collation ID → 코덱 인코딩 이름

/// status variable의 charset/collation ID를 `TextCodec`이 아는 인코딩 이름으로 변환
///
/// 대응하는 코덱이 없는 문자셋(utf32, armscii8 등)은 `None`.
pub fn encoding_for_collation(id: u16) -> Option<&'static str> {
    let name = match id {
        1 | 84 => "big5",
        7 | 74 => "koi8r",
        8 | 15 | 31 | 47 | 48 | 49 | 94 => "cp1252",
        9 | 21 | 27 | 77 => "latin2",
        11 | 65 => "ascii",
        12 | 91 => "eucjp",
        13 | 88 => "shift_jis",
        14 | 23 | 50 | 51 | 52 => "cp1251",
        16 | 71 => "iso-8859-8",
        18 | 89 => "tis620",
        19 | 85 => "euckr",
        22 | 75 => "koi8u",
        24 | 86 => "gb2312",
        25 | 70 => "greek",
        26 | 34 | 44 | 66 | 99 => "cp1250",
        28 | 87 => "gbk",
        30 | 78 => "latin5",
        33 | 76 | 83 | 192..=215 | 223 => "utf8",
        35 | 90 | 128..=151 | 159 => "utf16be",
        36 | 68 => "cp866",
        39 | 53 => "macroman",
        41 | 42 | 79 | 20 => "latin7",
        45 | 46 | 224..=247 | 255..=323 => "utf8",
        54 | 55 | 101..=124 => "utf16be",
        56 | 62 => "utf16le",
        57 | 67 => "cp1256",
        29 | 58 | 59 => "cp1257",
        63 => "binary",
        95 | 96 => "cp932",
        97 | 98 => "eucjpms",
        248..=250 => "gb18030",
        _ => return None,
    };
    Some(name)
}
