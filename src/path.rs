use serde_json::Value;

/// 按点号路径（如 `labels.service`）读取嵌套 JSON 中的值。
///
/// 只访问对象自身的键；数组按十进制下标访问。任一段缺失、或中间值不可遍历时
/// 返回 `None`，根节点不是对象或数组时同样返回 `None`。
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if !is_traversable(root) {
        return None;
    }

    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

fn is_traversable(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
