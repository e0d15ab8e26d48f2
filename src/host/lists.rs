//! List functions. Negative indices count from the end.

use std::cmp::Ordering;

use crate::ast::LslType::{self, Integer, List};
use crate::eval::operator::strict_equal;
use crate::eval::value::Value;

use super::{
    HostCall, HostEffect::Pure, HostFunction, HostHandler, HostOutput, HostRegistry, HostResult,
};

pub(super) fn register(registry: &mut HostRegistry) {
    let pure = |name: &'static str, params: &'static [LslType], ty: LslType, handler: HostHandler| {
        HostFunction::new(name, params, Some(ty), Pure, handler)
    };
    registry.register(pure("llGetListLength", &[List], LslType::Integer, ll_get_list_length));
    registry.register(pure("llList2Integer", &[List, Integer], LslType::Integer, ll_list2integer));
    registry.register(pure("llList2Float", &[List, Integer], LslType::Float, ll_list2float));
    registry.register(pure("llList2String", &[List, Integer], LslType::String, ll_list2string));
    registry.register(pure("llList2Key", &[List, Integer], LslType::Key, ll_list2key));
    registry.register(pure("llList2Vector", &[List, Integer], LslType::Vector, ll_list2vector));
    registry.register(pure("llList2Rot", &[List, Integer], LslType::Rotation, ll_list2rot));
    registry.register(pure(
        "llGetListEntryType",
        &[List, Integer],
        LslType::Integer,
        ll_get_list_entry_type,
    ));
    registry.register(pure("llList2List", &[List, Integer, Integer], LslType::List, ll_list2list));
    registry.register(pure(
        "llList2ListStrided",
        &[List, Integer, Integer, Integer],
        LslType::List,
        ll_list2list_strided,
    ));
    registry.register(pure(
        "llDeleteSubList",
        &[List, Integer, Integer],
        LslType::List,
        ll_delete_sub_list,
    ));
    registry.register(pure(
        "llListInsertList",
        &[List, List, Integer],
        LslType::List,
        ll_list_insert_list,
    ));
    registry.register(pure(
        "llListReplaceList",
        &[List, List, Integer, Integer],
        LslType::List,
        ll_list_replace_list,
    ));
    registry.register(pure("llListFindList", &[List, List], LslType::Integer, ll_list_find_list));
    registry.register(pure("llListSort", &[List, Integer, Integer], LslType::List, ll_list_sort));
}

/// Membership test for LSL's inclusive `[start, end]` ranges over `len`
/// items. Negative bounds count from the end; `start > end` selects
/// everything outside the range.
pub(super) fn selected(len: usize, start: i32, end: i32) -> impl Fn(usize) -> bool {
    let len = len as i64;
    let mut start = start as i64;
    let mut end = end as i64;
    if start < 0 {
        start += len;
    }
    if end < 0 {
        end += len;
    }
    move |i| {
        let i = i as i64;
        if start <= end {
            i >= start && i <= end
        } else {
            i <= end || i >= start
        }
    }
}

fn resolve_index(len: usize, index: i32) -> Option<usize> {
    let index = if index < 0 {
        len as i64 + index as i64
    } else {
        index as i64
    };
    usize::try_from(index).ok().filter(|i| *i < len)
}

fn element(call: &HostCall) -> Option<Value> {
    let items = call.list(0);
    resolve_index(items.len(), call.int(1)).map(|i| items[i].clone())
}

fn convert(call: &HostCall, ty: LslType) -> HostResult<HostOutput> {
    Ok(HostOutput::value(match element(call) {
        Some(v) => v.coerce(ty),
        None => Value::default_of(ty),
    }))
}

fn list(items: Vec<Value>) -> HostResult<HostOutput> {
    Ok(HostOutput::value(Value::List(items)))
}

fn ll_get_list_length(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(call.list(0).len() as i32))
}

fn ll_list2integer(call: &HostCall) -> HostResult<HostOutput> {
    convert(call, LslType::Integer)
}

fn ll_list2float(call: &HostCall) -> HostResult<HostOutput> {
    convert(call, LslType::Float)
}

fn ll_list2string(call: &HostCall) -> HostResult<HostOutput> {
    convert(call, LslType::String)
}

fn ll_list2key(call: &HostCall) -> HostResult<HostOutput> {
    convert(call, LslType::Key)
}

fn ll_list2vector(call: &HostCall) -> HostResult<HostOutput> {
    convert(call, LslType::Vector)
}

fn ll_list2rot(call: &HostCall) -> HostResult<HostOutput> {
    convert(call, LslType::Rotation)
}

/// `TYPE_*` code of the element, `TYPE_INVALID` (0) when out of range.
fn ll_get_list_entry_type(call: &HostCall) -> HostResult<HostOutput> {
    let code = match element(call).map(|v| v.type_of()) {
        Some(LslType::Integer) => 1,
        Some(LslType::Float) => 2,
        Some(LslType::String) => 3,
        Some(LslType::Key) => 4,
        Some(LslType::Vector) => 5,
        Some(LslType::Rotation) => 6,
        Some(LslType::List) | None => 0,
    };
    Ok(HostOutput::value(code))
}

pub fn sub_list(items: &[Value], start: i32, end: i32) -> Vec<Value> {
    let keep = selected(items.len(), start, end);
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| keep(*i))
        .map(|(_, v)| v.clone())
        .collect()
}

pub fn delete_sub_list(items: &[Value], start: i32, end: i32) -> Vec<Value> {
    let drop = selected(items.len(), start, end);
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| !drop(*i))
        .map(|(_, v)| v.clone())
        .collect()
}

fn ll_list2list(call: &HostCall) -> HostResult<HostOutput> {
    list(sub_list(&call.list(0), call.int(1), call.int(2)))
}

/// Every `stride`-th element of the range, starting at its first element.
fn ll_list2list_strided(call: &HostCall) -> HostResult<HostOutput> {
    let items = call.list(0);
    let stride = call.int(3).max(1) as usize;
    let len = items.len();
    let start = resolve_index(len, call.int(1)).unwrap_or(0);
    let end = if call.int(2) < 0 {
        resolve_index(len, call.int(2)).unwrap_or(0)
    } else {
        (call.int(2) as usize).min(len.saturating_sub(1))
    };
    let picked = items
        .iter()
        .enumerate()
        .filter(|(i, _)| *i >= start && *i <= end && (i - start) % stride == 0)
        .map(|(_, v)| v.clone())
        .collect();
    list(picked)
}

fn ll_delete_sub_list(call: &HostCall) -> HostResult<HostOutput> {
    list(delete_sub_list(&call.list(0), call.int(1), call.int(2)))
}

fn ll_list_insert_list(call: &HostCall) -> HostResult<HostOutput> {
    let mut dest = call.list(0);
    let src = call.list(1);
    let len = dest.len() as i64;
    let pos = call.int(2) as i64;
    let pos = if pos < 0 { pos + len } else { pos }.clamp(0, len) as usize;
    dest.splice(pos..pos, src);
    list(dest)
}

/// With `start > end` the retained middle of `dest` is followed by `src`.
pub fn replace_list(dest: &[Value], src: &[Value], start: i32, end: i32) -> Vec<Value> {
    let len = dest.len() as i64;
    let mut s = start as i64;
    let mut e = end as i64;
    if s < 0 {
        s += len;
    }
    if e < 0 {
        e += len;
    }
    if s <= e {
        let head = s.clamp(0, len) as usize;
        let tail = (e + 1).clamp(0, len) as usize;
        let mut out = dest[..head].to_vec();
        out.extend_from_slice(src);
        out.extend_from_slice(&dest[tail..]);
        out
    } else {
        let from = (e + 1).clamp(0, len) as usize;
        let to = s.clamp(0, len) as usize;
        let mut out = dest[from..to.max(from)].to_vec();
        out.extend_from_slice(src);
        out
    }
}

fn ll_list_replace_list(call: &HostCall) -> HostResult<HostOutput> {
    list(replace_list(
        &call.list(0),
        &call.list(1),
        call.int(2),
        call.int(3),
    ))
}

/// Index of the first occurrence of `test` as a contiguous run, or -1.
pub fn find_list(src: &[Value], test: &[Value]) -> i32 {
    if test.is_empty() {
        return 0;
    }
    if test.len() > src.len() {
        return -1;
    }
    src.windows(test.len())
        .position(|w| w.iter().zip(test).all(|(a, b)| strict_equal(a, b)))
        .map_or(-1, |i| i as i32)
}

fn ll_list_find_list(call: &HostCall) -> HostResult<HostOutput> {
    Ok(HostOutput::value(find_list(&call.list(0), &call.list(1))))
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (x, y) if x.is_numeric() && y.is_numeric() => x
            .as_float()
            .partial_cmp(&y.as_float())
            .unwrap_or(Ordering::Equal),
        (Value::String(x) | Value::Key(x), Value::String(y) | Value::Key(y)) => x.cmp(y),
        (Value::Vector(x), Value::Vector(y)) => x
            .magnitude()
            .partial_cmp(&y.magnitude())
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Sorts `stride`-sized blocks by their first element. A list whose length
/// is not a multiple of `stride` is returned unchanged.
pub fn sort_list(items: &[Value], stride: i32, ascending: bool) -> Vec<Value> {
    let stride = stride.max(1) as usize;
    if items.len() % stride != 0 {
        return items.to_vec();
    }
    let mut blocks: Vec<&[Value]> = items.chunks(stride).collect();
    blocks.sort_by(|a, b| {
        let order = compare(&a[0], &b[0]);
        if ascending {
            order
        } else {
            order.reverse()
        }
    });
    blocks.concat()
}

fn ll_list_sort(call: &HostCall) -> HostResult<HostOutput> {
    list(sort_list(&call.list(0), call.int(1), call.int(2) != 0))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{call, env, list};
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(v: &[i32]) -> Vec<Value> {
        v.iter().map(|i| Value::Integer(*i)).collect()
    }

    #[test]
    fn test_element_access() {
        let (env, _) = env();
        let l = list(vec![Value::Integer(7), Value::from("12abc"), Value::Float(2.9)]);
        let get = |name: &str, i: i32| call(&env, name, vec![l.clone(), Value::Integer(i)]).value;
        assert_eq!(get("llList2Integer", 1), Value::Integer(12));
        assert_eq!(get("llList2Integer", -1), Value::Integer(2));
        assert_eq!(get("llList2String", 2), Value::from("2.900000"));
        assert_eq!(get("llList2Integer", 9), Value::Integer(0));
        assert_eq!(get("llGetListEntryType", 1), Value::Integer(3));
        assert_eq!(get("llGetListEntryType", 5), Value::Integer(0));
    }

    #[test]
    fn test_ranges() {
        let l = ints(&[0, 1, 2, 3, 4]);
        assert_eq!(sub_list(&l, 1, 2), ints(&[1, 2]));
        assert_eq!(sub_list(&l, -2, -1), ints(&[3, 4]));
        assert_eq!(sub_list(&l, 3, 1), ints(&[0, 1, 3, 4]));
        assert_eq!(delete_sub_list(&l, 1, 3), ints(&[0, 4]));
        assert_eq!(replace_list(&l, &ints(&[9]), 1, 3), ints(&[0, 9, 4]));
    }

    #[test]
    fn test_insert_and_find() {
        let (env, _) = env();
        let out = call(
            &env,
            "llListInsertList",
            vec![list(ints(&[1, 4])), list(ints(&[2, 3])), Value::Integer(1)],
        );
        assert_eq!(out.value, list(ints(&[1, 2, 3, 4])));
        assert_eq!(find_list(&ints(&[1, 2, 3]), &ints(&[2, 3])), 1);
        assert_eq!(find_list(&ints(&[1, 2, 3]), &[Value::Float(2.0)]), -1);
    }

    #[test]
    fn test_sort() {
        assert_eq!(sort_list(&ints(&[3, 1, 2]), 1, true), ints(&[1, 2, 3]));
        assert_eq!(
            sort_list(
                &[Value::from("b"), Value::Integer(1), Value::from("a"), Value::Integer(2)],
                2,
                false
            ),
            vec![Value::from("b"), Value::Integer(1), Value::from("a"), Value::Integer(2)]
        );
        assert_eq!(sort_list(&ints(&[3, 1, 2]), 2, true), ints(&[3, 1, 2]));
    }

    #[test]
    fn test_strided() {
        let (env, _) = env();
        let out = call(
            &env,
            "llList2ListStrided",
            vec![
                list(ints(&[0, 1, 2, 3, 4, 5])),
                Value::Integer(0),
                Value::Integer(-1),
                Value::Integer(2),
            ],
        );
        assert_eq!(out.value, list(ints(&[0, 2, 4])));
    }
}
