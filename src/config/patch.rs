use serde_json::{Map, Value};

/// Finds the stored key matching `key` case-insensitively.
pub(crate) fn ci_find<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.keys()
        .find(|candidate| candidate.eq_ignore_ascii_case(key))
        .map(String::as_str)
}

pub(crate) fn ci_get<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

pub(crate) fn ci_get_mut<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Value> {
    map.iter_mut()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

/// Append/replace patching: objects recurse, arrays append deep-cloned patch
/// elements, anything else is replaced by the patch value. Key matching is
/// case-insensitive and keeps the source's original key casing.
pub(crate) fn patch_object(source: &mut Value, patch: &Value) {
    if !source.is_object() || !patch.is_object() {
        *source = patch.clone();
        return;
    }
    let Some(patch_map) = patch.as_object() else {
        return;
    };
    let Some(source_map) = source.as_object_mut() else {
        return;
    };

    for (key, patch_value) in patch_map {
        let existing = ci_find(source_map, key).map(str::to_owned);
        match existing {
            Some(source_key) => {
                let Some(slot) = source_map.get_mut(&source_key) else {
                    continue;
                };
                if slot.is_object() && patch_value.is_object() {
                    patch_object(slot, patch_value);
                } else if let (Value::Array(items), Value::Array(patch_items)) =
                    (&mut *slot, patch_value)
                {
                    items.extend(patch_items.iter().cloned());
                } else {
                    *slot = patch_value.clone();
                }
            }
            None => {
                source_map.insert(key.clone(), patch_value.clone());
            }
        }
    }
}

/// Variable-scope merging: objects recurse, arrays are replaced, null overlay
/// values keep the target entry. Distinct from [`patch_object`], which
/// appends arrays.
pub(crate) fn merge_variables(target: &mut Value, overlay: &Value) {
    if !target.is_object() || !overlay.is_object() {
        if !overlay.is_null() {
            *target = overlay.clone();
        }
        return;
    }
    let Some(overlay_map) = overlay.as_object() else {
        return;
    };
    let Some(target_map) = target.as_object_mut() else {
        return;
    };

    for (key, overlay_value) in overlay_map {
        if overlay_value.is_null() {
            continue;
        }
        match target_map.get_mut(key) {
            Some(slot) if slot.is_object() && overlay_value.is_object() => {
                merge_variables(slot, overlay_value);
            }
            Some(slot) => *slot = overlay_value.clone(),
            None => {
                target_map.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}
