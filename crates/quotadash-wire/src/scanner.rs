//! フィールド単位の前方スキャン
//!
//! ペイロードは解釈せず、1 フィールドが占めるバイト範囲 `[start, end)` だけを返す。
//! スキャナは状態を持たない純粋関数で、呼び出し側が `end` を次のオフセットに使う。

use crate::error::WireError;
use crate::varint::decode_varint;

/// protobuf のフィールド番号上限 (2^29 - 1)
pub const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

/// サポートする wire type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// タグ下位 3 ビットから変換する（group 3/4 と 6/7 は `None`）
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }

    pub fn raw(self) -> u8 {
        self as u8
    }
}

/// タグ値 `(field_number << 3) | wire_type` を組み立てる
pub fn make_tag(field_number: u32, wire_type: WireType) -> u64 {
    (u64::from(field_number) << 3) | u64::from(wire_type.raw())
}

/// 1 フィールドが元バッファ上で占める範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub field_number: u32,
    pub wire_type: WireType,
    /// タグ先頭
    pub start: usize,
    /// ペイロード先頭（LengthDelimited は長さ Varint の直後）
    pub payload_start: usize,
    /// ペイロード末尾（排他的）
    pub end: usize,
}

impl FieldSpan {
    /// タグからペイロード末尾までのバイト数
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// フィールド全体のバイト列
    pub fn bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.end]
    }

    /// ペイロード部分のバイト列
    pub fn payload<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.payload_start..self.end]
    }
}

/// フィールド番号が protobuf の範囲 `1..=MAX_FIELD_NUMBER` にあるか
///
/// `offset` はエラーに載せる位置（書き込み前の検査では 0）。
pub fn check_field_number(field_number: u64, offset: usize) -> Result<(), WireError> {
    if field_number == 0 || field_number > MAX_FIELD_NUMBER {
        return Err(WireError::InvalidFieldNumber {
            field_number,
            offset,
        });
    }
    Ok(())
}

/// `offset` から 1 フィールドを読み、その範囲を返す
///
/// # エラー
/// - `WireError::MalformedVarint`: タグ/値/長さの Varint が壊れている
/// - `WireError::UnsupportedWireType`: group などサポート外の wire type
/// - `WireError::InvalidFieldNumber`: フィールド番号 0 または上限超え
/// - `WireError::TruncatedBuffer`: ペイロードがバッファ末尾を超える
pub fn next_field_span(buf: &[u8], offset: usize) -> Result<FieldSpan, WireError> {
    let (tag, after_tag) = decode_varint(buf, offset)?;
    let raw_wire_type = (tag & 0x7) as u8;
    let field_number = tag >> 3;

    // group は「読み飛ばし」ではなく常にエラー
    let wire_type = WireType::from_raw(raw_wire_type).ok_or(WireError::UnsupportedWireType {
        wire_type: raw_wire_type,
        field_number,
        offset,
    })?;

    check_field_number(field_number, offset)?;

    let (payload_start, end) = match wire_type {
        WireType::Varint => {
            let (_, next) = decode_varint(buf, after_tag)?;
            (after_tag, next)
        }
        WireType::Fixed64 => (after_tag, advance(buf, after_tag, 8)?),
        WireType::LengthDelimited => {
            let (length, body) = decode_varint(buf, after_tag)?;
            (body, advance(buf, body, length)?)
        }
        WireType::Fixed32 => (after_tag, advance(buf, after_tag, 4)?),
    };

    Ok(FieldSpan {
        field_number: field_number as u32,
        wire_type,
        start: offset,
        payload_start,
        end,
    })
}

/// `offset` から `needed` バイト進めた位置（バッファ末尾を超えるならエラー）
fn advance(buf: &[u8], offset: usize, needed: u64) -> Result<usize, WireError> {
    let available = buf.len().saturating_sub(offset);
    match usize::try_from(needed) {
        Ok(n) if n <= available => Ok(offset + n),
        _ => Err(WireError::TruncatedBuffer {
            offset,
            needed,
            available,
        }),
    }
}

/// バッファ全体を先頭から走査するイテレータ
///
/// 最初のエラーを 1 回だけ返し、以降は `None` を返す。
pub fn field_spans(buf: &[u8]) -> FieldSpans<'_> {
    FieldSpans {
        buf,
        offset: 0,
        failed: false,
    }
}

/// [`field_spans`] の戻り値
pub struct FieldSpans<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl Iterator for FieldSpans<'_> {
    type Item = Result<FieldSpan, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }

        match next_field_span(self.buf, self.offset) {
            Ok(span) => {
                // タグは最低 1 バイトあるので必ず前進する
                self.offset = span.end;
                Some(Ok(span))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
