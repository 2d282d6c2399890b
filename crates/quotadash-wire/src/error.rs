//! quotadash-wire エラー型

use thiserror::Error;

/// wire format の走査・デコードのエラー
///
/// いずれも入力バイト列が壊れていることを示す。部分的な復旧は行わない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// 終端バイト（継続ビットが 0）に達する前にバッファが尽きた、または 10 バイトを超えた
    #[error("malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },

    /// 固定長/長さ付きペイロードがバッファ末尾を超える
    #[error("truncated buffer at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedBuffer {
        offset: usize,
        needed: u64,
        available: usize,
    },

    /// group (3/4) や未定義 (6/7) の wire type
    #[error("unsupported wire type {wire_type} (field {field_number}) at offset {offset}")]
    UnsupportedWireType {
        wire_type: u8,
        field_number: u64,
        offset: usize,
    },

    /// フィールド番号が 0 または protobuf の上限を超える
    #[error("invalid field number {field_number} at offset {offset}")]
    InvalidFieldNumber { field_number: u64, offset: usize },

    /// クレデンシャルのサブメッセージを protobuf としてデコードできない
    #[error("credential decode failed: {0}")]
    Decode(prost::DecodeError),
}
