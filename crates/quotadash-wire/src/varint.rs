//! Base-128 Varint（protobuf 形式）
//!
//! ```text
//! 300 = 0b1_0010_1100
//!   → [0xAC, 0x02]
//!      ↑ 下位 7 ビット + 継続ビット
//! ```

use alloc::vec::Vec;

use crate::error::WireError;

/// u64 を表現するのに必要な最大バイト数（7 ビット × 10）
pub const MAX_VARINT_LEN: usize = 10;

/// u64 を Varint バイト列にエンコードする
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    encode_varint_into(value, &mut buf);
    buf
}

/// バッファの末尾に Varint を追記する
///
/// 下位 7 ビットのグループから順に出力し、最後のバイト以外は
/// 継続ビット (0x80) を立てる。
pub fn encode_varint_into(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// エンコード後のバイト数
pub fn encoded_len(value: u64) -> usize {
    // 0 も 1 バイトになるよう最下位ビットを立ててから数える
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// `offset` から Varint を 1 つ読む
///
/// # 戻り値
/// `(値, 次のオフセット)`
///
/// # エラー
/// - `WireError::MalformedVarint`: 終端バイトの前にバッファが尽きた、
///   または 64 ビットに収まらない（11 バイト目以降が必要、10 バイト目に余分なビット）
pub fn decode_varint(buf: &[u8], offset: usize) -> Result<(u64, usize), WireError> {
    let mut value = 0u64;
    let mut pos = offset;

    for i in 0..MAX_VARINT_LEN {
        let byte = *buf.get(pos).ok_or(WireError::MalformedVarint { offset })?;
        pos += 1;

        let group = u64::from(byte & 0x7F);
        // 10 バイト目で有効なのは bit 63 の 1 ビットだけ
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(WireError::MalformedVarint { offset });
        }
        value |= group << (7 * i);

        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
    }

    Err(WireError::MalformedVarint { offset })
}
