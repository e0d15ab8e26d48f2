//! String manipulation. Indices count characters, not bytes.

use crate::ast::LslType::{self, Integer, List, String as Str};
use crate::eval::value::Value;

use super::lists::selected;
use super::{
    HostCall, HostEffect::Pure, HostFunction, HostHandler, HostOutput, HostRegistry, HostResult,
};

pub(super) fn register(registry: &mut HostRegistry) {
    let pure = |name: &'static str, params: &'static [LslType], ty: LslType, handler: HostHandler| {
        HostFunction::new(name, params, Some(ty), Pure, handler)
    };
    registry.register(pure("llStringLength", &[Str], LslType::Integer, ll_string_length));
    registry.register(pure(
        "llGetSubString",
        &[Str, Integer, Integer],
        LslType::String,
        ll_get_sub_string,
    ));
    registry.register(pure(
        "llDeleteSubString",
        &[Str, Integer, Integer],
        LslType::String,
        ll_delete_sub_string,
    ));
    registry.register(pure(
        "llInsertString",
        &[Str, Integer, Str],
        LslType::String,
        ll_insert_string,
    ));
    registry.register(pure("llSubStringIndex", &[Str, Str], LslType::Integer, ll_sub_string_index));
    registry.register(pure("llToUpper", &[Str], LslType::String, ll_to_upper));
    registry.register(pure("llToLower", &[Str], LslType::String, ll_to_lower));
    registry.register(pure("llStringTrim", &[Str, Integer], LslType::String, ll_string_trim));
    registry.register(pure(
        "llReplaceSubString",
        &[Str, Str, Str, Integer],
        LslType::String,
        ll_replace_sub_string,
    ));
    registry.register(pure(
        "llDumpList2String",
        &[List, Str],
        LslType::String,
        ll_dump_list2string,
    ));
    registry.register(pure(
        "llParseString2List",
        &[Str, List, List],
        LslType::List,
        ll_parse_string2list,
    ));
    registry.register(pure(
        "llParseStringKeepNulls",
        &[Str, List, List],
        LslType::List,
        ll_parse_string_keep_nulls,
    ));
    registry.register(pure("llList2CSV", &[List], LslType::String, ll_list2csv));
    registry.register(pure("llCSV2List", &[Str], LslType::List, ll_csv2list));
    registry.register(pure("llEscapeURL", &[Str], LslType::String, ll_escape_url));
    registry.register(pure("llUnescapeURL", &[Str], LslType::String, ll_unescape_url));
}

fn string(s: String) -> HostResult<HostOutput> {
    Ok(HostOutput::value(s))
}

fn ll_string_length(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.string(0).chars().count() as i32))
}

pub fn get_sub_string(src: &str, start: i32, end: i32) -> String {
    let keep = selected(src.chars().count(), start, end);
    src.chars()
        .enumerate()
        .filter(|(i, _)| keep(*i))
        .map(|(_, c)| c)
        .collect()
}

pub fn delete_sub_string(src: &str, start: i32, end: i32) -> String {
    let drop = selected(src.chars().count(), start, end);
    src.chars()
        .enumerate()
        .filter(|(i, _)| !drop(*i))
        .map(|(_, c)| c)
        .collect()
}

fn ll_get_sub_string(call: &HostCall) -> HostResult<HostOutput> {
    string(get_sub_string(&call.string(0), call.int(1), call.int(2)))
}

fn ll_delete_sub_string(call: &HostCall) -> HostResult<HostOutput> {
    string(delete_sub_string(&call.string(0), call.int(1), call.int(2)))
}

fn ll_insert_string(call: &HostCall) -> HostResult<HostOutput> {
    let dst = call.string(0);
    let src = call.string(2);
    let pos = (call.int(1).max(0) as usize).min(dst.chars().count());
    let mut out: String = dst.chars().take(pos).collect();
    out.push_str(&src);
    out.extend(dst.chars().skip(pos));
    string(out)
}

pub fn sub_string_index(src: &str, pattern: &str) -> i32 {
    match src.find(pattern) {
        Some(byte) => src[..byte].chars().count() as i32,
        None => -1,
    }
}

fn ll_sub_string_index(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(sub_string_index(&call.string(0), &call.string(1))))
}

fn ll_to_upper(call: &HostCall) -> HostResult<HostOutput> {
    string(call.string(0).to_uppercase())
}

fn ll_to_lower(call: &HostCall) -> HostResult<HostOutput> {
    string(call.string(0).to_lowercase())
}

/// `STRING_TRIM_HEAD` = 1, `STRING_TRIM_TAIL` = 2, both = 3.
fn ll_string_trim(call: &HostCall) -> HostResult<HostOutput> {
    let src = call.string(0);
    let mode = call.int(1);
    let mut s = src.as_str();
    if mode & 1 != 0 {
        s = s.trim_start();
    }
    if mode & 2 != 0 {
        s = s.trim_end();
    }
    string(s.to_string())
}

/// `count == 0` replaces all, positive counts from the left, negative from
/// the right.
pub fn replace_sub_string(src: &str, pattern: &str, replacement: &str, count: i32) -> String {
    if pattern.is_empty() {
        return src.to_string();
    }
    let positions: Vec<usize> = src.match_indices(pattern).map(|(i, _)| i).collect();
    let chosen: &[usize] = match count {
        0 => &positions,
        n if n > 0 => &positions[..positions.len().min(n as usize)],
        n => {
            let take = positions.len().min(n.unsigned_abs() as usize);
            &positions[positions.len() - take..]
        }
    };
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for &at in chosen {
        out.push_str(&src[last..at]);
        out.push_str(replacement);
        last = at + pattern.len();
    }
    out.push_str(&src[last..]);
    out
}

fn ll_replace_sub_string(call: &HostCall) -> HostResult<HostOutput> {
    string(replace_sub_string(
        &call.string(0),
        &call.string(1),
        &call.string(2),
        call.int(3),
    ))
}

fn ll_dump_list2string(call: &HostCall) -> HostResult<HostOutput> {
    let separator = call.string(1);
    let parts: Vec<String> = call.list(0).iter().map(Value::to_string).collect();
    string(parts.join(&separator))
}

/// Splits `src` at separators (dropped) and spacers (kept as tokens).
pub fn parse_string(
    src: &str,
    separators: &[String],
    spacers: &[String],
    keep_nulls: bool,
) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut rest = src;

    'scan: while let Some(c) = rest.chars().next() {
        for separator in separators.iter().filter(|s| !s.is_empty()) {
            if let Some(after) = rest.strip_prefix(separator.as_str()) {
                tokens.push(std::mem::take(&mut current));
                rest = after;
                continue 'scan;
            }
        }
        for spacer in spacers.iter().filter(|s| !s.is_empty()) {
            if let Some(after) = rest.strip_prefix(spacer.as_str()) {
                tokens.push(std::mem::take(&mut current));
                tokens.push(spacer.clone());
                rest = after;
                continue 'scan;
            }
        }
        current.push(c);
        rest = &rest[c.len_utf8()..];
    }
    tokens.push(current);

    if !keep_nulls {
        tokens.retain(|t| !t.is_empty());
    }
    tokens
}

fn parse_call(call: &HostCall, keep_nulls: bool) -> HostResult<HostOutput> {
    let strings = |i| -> Vec<String> { call.list(i).iter().map(Value::to_string).collect() };
    let tokens = parse_string(&call.string(0), &strings(1), &strings(2), keep_nulls);
    Ok(HostOutput::value(Value::List(
        tokens.into_iter().map(Value::String).collect(),
    )))
}

fn ll_parse_string2list(call: &HostCall) -> HostResult<HostOutput> {
    parse_call(call, false)
}

fn ll_parse_string_keep_nulls(call: &HostCall) -> HostResult<HostOutput> {
    parse_call(call, true)
}

fn ll_list2csv(call: &HostCall) -> HostResult<HostOutput> {
    let parts: Vec<String> = call.list(0).iter().map(Value::to_string).collect();
    string(parts.join(", "))
}

/// Commas inside `<...>` do not split.
pub fn csv_to_list(src: &str) -> Vec<String> {
    if src.is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in src.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => items.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    items.push(current.trim().to_string());
    items
}

fn ll_csv2list(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(Value::List(
        csv_to_list(&call.string(0))
            .into_iter()
            .map(Value::String)
            .collect(),
    )))
}

fn ll_escape_url(call: &HostCall) -> HostResult<HostOutput> {
    let mut out = String::new();
    for byte in call.string(0).bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    string(out)
}

fn ll_unescape_url(call: &HostCall) -> HostResult<HostOutput> {
    let src = call.string(0);
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = |b: u8| (b as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    string(String::from_utf8_lossy(&out).into_owned())
}
