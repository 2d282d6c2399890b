//! クレデンシャルフィールドの組み立てと読み戻し
//!
//! 組み立ては手書きのエンコードで行い、サブフィールドの順序とバイト列を固定する。
//! 読み戻しは prost の [`OAuthTokenInfo`] でデコードする。

use alloc::string::String;
use alloc::vec::Vec;

use prost::Message;

use crate::error::WireError;
use crate::scanner::{make_tag, WireType};
use crate::varint::{encode_varint_into, encoded_len};

/// token_type に書き込む固定値
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// クレデンシャルストアから受け取るトークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// `None` の場合、サブフィールド 1 は書き込まない（空文字列も書かない）
    pub access_token: Option<String>,
    pub refresh_token: String,
    /// 有効期限（Unix 秒）
    pub expiry_epoch_seconds: u64,
}

/// クレデンシャルのサブメッセージ（読み戻し用）
#[derive(Clone, PartialEq, Message)]
pub struct OAuthTokenInfo {
    #[prost(string, optional, tag = "1")]
    pub access_token: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub token_type: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub refresh_token: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub expiry: Option<prost_types::Timestamp>,
}

/// LengthDelimited フィールド（タグ + 長さ + ペイロード）をエンコードする
pub fn encode_len_delimited_field(field_number: u32, payload: &[u8]) -> Vec<u8> {
    let tag = make_tag(field_number, WireType::LengthDelimited);
    let len = payload.len() as u64;
    let mut buf = Vec::with_capacity(encoded_len(tag) + encoded_len(len) + payload.len());
    put_len_delimited(&mut buf, field_number, payload);
    buf
}

/// 文字列フィールドをエンコードする
pub fn encode_string_field(field_number: u32, value: &str) -> Vec<u8> {
    encode_len_delimited_field(field_number, value.as_bytes())
}

fn put_len_delimited(buf: &mut Vec<u8>, field_number: u32, payload: &[u8]) {
    encode_varint_into(make_tag(field_number, WireType::LengthDelimited), buf);
    encode_varint_into(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

/// サブメッセージ本体（外側のタグと長さを含まない）を組み立てる
///
/// ```text
/// 1: access_token   (Some の場合のみ)
/// 2: "Bearer"
/// 3: refresh_token
/// 4: { 1: expiry_epoch_seconds (varint) }
/// ```
pub fn build_credential_payload(credential: &Credential) -> Vec<u8> {
    let mut payload = Vec::new();

    if let Some(access_token) = &credential.access_token {
        put_len_delimited(&mut payload, 1, access_token.as_bytes());
    }
    put_len_delimited(&mut payload, 2, TOKEN_TYPE_BEARER.as_bytes());
    put_len_delimited(&mut payload, 3, credential.refresh_token.as_bytes());

    // Timestamp { seconds = 1 }。0 秒でも省略せずに書く
    let mut expiry = Vec::with_capacity(11);
    encode_varint_into(make_tag(1, WireType::Varint), &mut expiry);
    encode_varint_into(credential.expiry_epoch_seconds, &mut expiry);
    put_len_delimited(&mut payload, 4, &expiry);

    payload
}

/// `target` 番号の LengthDelimited フィールドとしてクレデンシャルを組み立てる
pub fn build_credential_field(target: u32, credential: &Credential) -> Vec<u8> {
    encode_len_delimited_field(target, &build_credential_payload(credential))
}

/// クレデンシャルフィールドのペイロードを [`Credential`] に戻す
///
/// refresh_token が無い場合は空文字列、expiry が無い場合は 0 になる。
pub fn decode_credential(payload: &[u8]) -> Result<Credential, WireError> {
    let info = OAuthTokenInfo::decode(payload).map_err(WireError::Decode)?;

    Ok(Credential {
        access_token: info.access_token,
        refresh_token: info.refresh_token.unwrap_or_default(),
        // int64 の seconds は u64 と同じ Varint ビット列なのでそのまま戻す
        expiry_epoch_seconds: info.expiry.map_or(0, |ts| ts.seconds as u64),
    })
}
