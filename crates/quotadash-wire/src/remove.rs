//! 指定フィールド番号の除去と検索

use alloc::vec::Vec;

use crate::error::WireError;
use crate::scanner::{field_spans, WireType};

/// `target` 番号のフィールドをすべて取り除いたバイト列を返す
///
/// 残すフィールドはタグからペイロード末尾までそのままコピーし、順序も保つ。
/// `target` が現れない場合、出力は入力とバイト単位で一致する。
///
/// # エラー
/// 走査中のエラーはそのまま返す（途中までの結果は返さない）
pub fn remove_field(buf: &[u8], target: u32) -> Result<Vec<u8>, WireError> {
    remove_field_counted(buf, target).map(|(kept, _)| kept)
}

/// [`remove_field`] と同じ。取り除いたフィールド数も返す
pub fn remove_field_counted(buf: &[u8], target: u32) -> Result<(Vec<u8>, usize), WireError> {
    let mut kept = Vec::with_capacity(buf.len());
    let mut removed = 0;

    for span in field_spans(buf) {
        let span = span?;
        if span.field_number == target {
            removed += 1;
        } else {
            kept.extend_from_slice(span.bytes(buf));
        }
    }

    Ok((kept, removed))
}

/// `target` 番号の LengthDelimited フィールドのペイロードを返す
///
/// 複数ある場合は最後のもの（protobuf デコーダと同じく後勝ち）。
/// 見つからなくてもバッファ全体を走査し、壊れていればエラーにする。
pub fn find_field(buf: &[u8], target: u32) -> Result<Option<&[u8]>, WireError> {
    let mut found = None;

    for span in field_spans(buf) {
        let span = span?;
        if span.field_number == target && span.wire_type == WireType::LengthDelimited {
            found = Some(span.payload(buf));
        }
    }

    Ok(found)
}
