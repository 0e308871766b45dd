//! Bracketed query-string parsing.
//!
//! Turns `filter[age][gte]=18&filter[tags][in][]=a` into nested
//! [`FilterValue`]s. Keys are form-decoded here. Values stay encoded: the
//! operator parser decodes every operand exactly once, so decoding them
//! here too would decode twice.

use indexmap::IndexMap;
use tracing::trace;

use crate::logging::{COMPONENT, KEY_COUNT, SUBSYSTEM};
use crate::value::{url_decode, FilterValue, RawFilterMap};

/// One bracket segment of a parameter name.
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    /// `[]`
    Append,
    /// `[name]`
    Name(String),
}

/// Parse an `application/x-www-form-urlencoded` string into a nested map.
///
/// Never fails. A leading `?` is ignored, pairs without `=` get an empty
/// value, repeated scalar keys keep the last value, and a parameter name
/// with malformed brackets is kept as a literal key.
pub fn parse_query(raw: &str) -> RawFilterMap {
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    let mut params = RawFilterMap::new();

    for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = url_decode(name);
        if name.is_empty() {
            continue;
        }

        let value = FilterValue::Text(value.to_string());
        match split_name(&name) {
            Some((base, path)) => {
                let slot = params.entry(base.to_string()).or_insert(FilterValue::Null);
                assign(slot, &path, value);
            }
            None => {
                params.insert(name, value);
            }
        }
    }

    trace!(
        { SUBSYSTEM } = "filter",
        { COMPONENT } = "query_string",
        { KEY_COUNT } = params.len(),
        "filter: query string parsed"
    );
    params
}

/// The nested filter map stored under `request_key`.
///
/// Missing or non-map entries yield an empty map, which applies no filters.
pub fn extract_filters(params: &RawFilterMap, request_key: &str) -> RawFilterMap {
    match params.get(request_key) {
        Some(FilterValue::Map(filters)) => filters.clone(),
        _ => RawFilterMap::new(),
    }
}

/// Split `base[a][]` into `base` and its segments. `None` for a plain name or
/// malformed brackets.
fn split_name(name: &str) -> Option<(&str, Vec<Segment>)> {
    let open = name.find('[')?;
    let (base, mut rest) = name.split_at(open);
    if base.is_empty() {
        return None;
    }

    let mut path = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let segment = &inner[..close];
        if segment.contains('[') {
            return None;
        }
        path.push(if segment.is_empty() {
            Segment::Append
        } else {
            Segment::Name(segment.to_string())
        });
        rest = &inner[close + 1..];
    }
    Some((base, path))
}

fn assign(slot: &mut FilterValue, path: &[Segment], value: FilterValue) {
    match path.split_first() {
        None => *slot = value,
        Some((segment, rest)) => assign(child_slot(slot, segment), rest, value),
    }
}

/// The slot `segment` addresses inside `slot`, creating containers as needed.
///
/// Lists start at `[]` or `[0]` and grow by `[]` or the next sequential
/// index. Any other name turns the list into a map keyed by position.
fn child_slot<'a>(slot: &'a mut FilterValue, segment: &Segment) -> &'a mut FilterValue {
    let starts_list = match segment {
        Segment::Append => true,
        Segment::Name(name) => name == "0",
    };
    if starts_list && !matches!(slot, FilterValue::List(_) | FilterValue::Map(_)) {
        *slot = FilterValue::List(Vec::new());
    }

    let index = match (&*slot, segment) {
        (FilterValue::List(items), Segment::Append) => Some(items.len()),
        (FilterValue::List(items), Segment::Name(name)) => {
            name.parse::<usize>().ok().filter(|i| *i <= items.len())
        }
        _ => None,
    };

    match (slot, index) {
        (FilterValue::List(items), Some(i)) => {
            if i == items.len() {
                items.push(FilterValue::Null);
            }
            &mut items[i]
        }
        (slot, _) => {
            let map = as_map(slot);
            let key = match segment {
                Segment::Append => map.len().to_string(),
                Segment::Name(name) => name.clone(),
            };
            map.entry(key).or_insert(FilterValue::Null)
        }
    }
}

fn as_map(slot: &mut FilterValue) -> &mut IndexMap<String, FilterValue> {
    match slot {
        FilterValue::Map(map) => map,
        other => {
            let entries = match std::mem::replace(other, FilterValue::Null) {
                FilterValue::List(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), item))
                    .collect(),
                _ => IndexMap::new(),
            };
            *other = FilterValue::Map(entries);
            as_map(other)
        }
    }
}
