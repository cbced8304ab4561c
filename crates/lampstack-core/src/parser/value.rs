//! エントリ値の取り出し
//!
//! KDLのエントリは位置引数とプロパティが混在するため、
//! 位置引数は名前のないエントリだけを数える。

use crate::error::{Result, StackError};
use kdl::{KdlNode, KdlValue};
use tracing::warn;

/// n番目の位置引数
pub(super) fn arg(node: &KdlNode, index: usize) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .nth(index)
        .map(|e| e.value())
}

/// n番目の位置引数（文字列）
pub(super) fn string_arg(node: &KdlNode, index: usize) -> Option<&str> {
    arg(node, index).and_then(|v| v.as_string())
}

/// すべての位置引数（文字列）
pub(super) fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

/// 先頭の位置引数を論理IDとして取り出す
pub(super) fn name_arg(node: &KdlNode) -> Result<String> {
    string_arg(node, 0)
        .map(|s| s.to_string())
        .ok_or_else(|| StackError::MissingField {
            node: node.name().value().to_string(),
            field: "name".to_string(),
        })
}

/// 先頭の位置引数（文字列・必須）
pub(super) fn required_string_arg(node: &KdlNode) -> Result<String> {
    string_arg(node, 0)
        .map(|s| s.to_string())
        .ok_or_else(|| StackError::MissingField {
            node: node.name().value().to_string(),
            field: "value".to_string(),
        })
}

/// プロパティ（文字列）
pub(super) fn prop_str<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    node.get(key).and_then(|v| v.as_string())
}

/// プロパティ（文字列・必須）
pub(super) fn required_prop(node: &KdlNode, key: &str) -> Result<String> {
    prop_str(node, key)
        .map(|s| s.to_string())
        .ok_or_else(|| StackError::MissingField {
            node: node.name().value().to_string(),
            field: key.to_string(),
        })
}

fn to_int<T: TryFrom<i128>>(node: &KdlNode, key: &str, value: &KdlValue) -> Result<T> {
    let raw = value.as_integer().ok_or_else(|| StackError::InvalidValue {
        node: node.name().value().to_string(),
        message: format!("{} は整数である必要があります", key),
    })?;
    T::try_from(raw).map_err(|_| StackError::InvalidValue {
        node: node.name().value().to_string(),
        message: format!("{} の値 {} は範囲外です", key, raw),
    })
}

/// プロパティ（整数）
pub(super) fn prop_int<T: TryFrom<i128>>(node: &KdlNode, key: &str) -> Result<Option<T>> {
    node.get(key).map(|v| to_int(node, key, v)).transpose()
}

/// プロパティ（整数・必須）
pub(super) fn required_prop_int<T: TryFrom<i128>>(node: &KdlNode, key: &str) -> Result<T> {
    prop_int(node, key)?.ok_or_else(|| StackError::MissingField {
        node: node.name().value().to_string(),
        field: key.to_string(),
    })
}

/// 先頭の位置引数（整数・必須）
pub(super) fn required_int_arg<T: TryFrom<i128>>(node: &KdlNode) -> Result<T> {
    let value = arg(node, 0).ok_or_else(|| StackError::MissingField {
        node: node.name().value().to_string(),
        field: "value".to_string(),
    })?;
    to_int(node, "value", value)
}

/// ブール値を解釈する
///
/// KDL v2 では `#true`/`#false` を使う。文字列 `"true"` は警告付きで受け付ける。
fn to_bool(node: &KdlNode, key: &str, value: &KdlValue) -> Result<bool> {
    if let Some(b) = value.as_bool() {
        return Ok(b);
    }
    match value.as_string() {
        Some(s @ ("true" | "false")) => {
            warn!(
                node = node.name().value(),
                key,
                "'\"{s}\"' is a string, not a boolean. Hint: in KDL v2 use '#{s}'"
            );
            Ok(s == "true")
        }
        _ => Err(StackError::InvalidValue {
            node: node.name().value().to_string(),
            message: format!("{} は #true または #false である必要があります", key),
        }),
    }
}

/// プロパティ（ブール）
pub(super) fn prop_bool(node: &KdlNode, key: &str) -> Result<Option<bool>> {
    node.get(key).map(|v| to_bool(node, key, v)).transpose()
}

/// 先頭の位置引数（ブール・必須）
pub(super) fn required_bool_arg(node: &KdlNode) -> Result<bool> {
    let value = arg(node, 0).ok_or_else(|| StackError::MissingField {
        node: node.name().value().to_string(),
        field: "value".to_string(),
    })?;
    to_bool(node, "value", value)
}

/// 列挙値をパースし、失敗時は候補を示す
pub(super) fn parse_enum<T>(
    node: &KdlNode,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
    expected: &str,
) -> Result<T> {
    parse(value).ok_or_else(|| StackError::InvalidValue {
        node: node.name().value().to_string(),
        message: format!("'{}' は無効です（{} のいずれか）", value, expected),
    })
}

/// 同じIDの宣言があれば置き換え、なければ末尾に追加
pub(super) fn upsert<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &str) {
    let key = id(&item).to_string();
    if let Some(existing) = items.iter_mut().find(|x| id(x) == key) {
        *existing = item;
    } else {
        items.push(item);
    }
}
