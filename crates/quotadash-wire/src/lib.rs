//! # quotadash-wire
//!
//! スキーマ不明の protobuf メッセージを、タグの wire type だけを頼りに
//! 走査・部分書き換えするためのユーティリティ。
//!
//! ## 基本方針
//!
//! 保持するフィールドのペイロードは一切解釈しない。スキャナはフィールドの
//! バイト範囲（タグ先頭からペイロード末尾まで）を返すだけで、除去処理は
//! その範囲をそのままコピーする。対象外のフィールドはバイト単位で同一に保たれる。
//!
//! ## フィールドの Wire Format
//!
//! ```text
//! [tag: varint][payload...]
//!
//! tag = (field_number << 3) | wire_type
//!
//! wire_type:
//!   0 = Varint           [varint]
//!   1 = Fixed64          [8 bytes]
//!   2 = LengthDelimited  [length: varint][length bytes]
//!   5 = Fixed32          [4 bytes]
//!   3, 4 (group) はサポートしない（エラー）
//! ```
//!
//! ## クレデンシャルのサブメッセージ
//!
//! ```text
//! field N (LengthDelimited):
//!   1: access_token   (string, 無い場合は省略)
//!   2: token_type     (string, 常に "Bearer")
//!   3: refresh_token  (string)
//!   4: expiry         (message Timestamp { 1: seconds (varint) })
//! ```

#![no_std]
extern crate alloc;

pub mod credential;
pub mod error;
pub mod remove;
pub mod scanner;
pub mod varint;

pub use credential::{
    build_credential_field, build_credential_payload, decode_credential, encode_len_delimited_field,
    encode_string_field, Credential, OAuthTokenInfo, TOKEN_TYPE_BEARER,
};
pub use error::WireError;
pub use remove::{find_field, remove_field, remove_field_counted};
pub use scanner::{
    check_field_number, field_spans, make_tag, next_field_span, FieldSpan, FieldSpans, WireType,
    MAX_FIELD_NUMBER,
};
pub use varint::{decode_varint, encode_varint, encode_varint_into, encoded_len};
