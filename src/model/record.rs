//! 记录引用（DataRef）：共享整份文档，只记录走过的路径，不复制大值

use std::sync::Arc;

use serde_json::Value;

/// JSON 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
}

impl NodeKind {
    pub fn of(v: &Value) -> Self {
        match v {
            Value::Object(_) => NodeKind::Object,
            Value::Array(_) => NodeKind::Array,
            Value::String(_) => NodeKind::String,
            Value::Number(_) => NodeKind::Number,
            Value::Bool(_) => NodeKind::Bool,
            Value::Null => NodeKind::Null,
        }
    }

    /// 对象与数组可以继续导航，其余为终值
    pub fn is_composite(self) -> bool {
        matches!(self, NodeKind::Object | NodeKind::Array)
    }
}

/// 路径中的一段：对象键或数组下标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn lookup<'v>(&self, v: &'v Value) -> Option<&'v Value> {
        match (self, v) {
            (Segment::Key(k), Value::Object(map)) => map.get(k),
            (Segment::Index(i), Value::Array(arr)) => arr.get(*i),
            _ => None,
        }
    }
}

static NULL: Value = Value::Null;

/// 指向已加载文档内某个位置的引用
#[derive(Debug, Clone)]
pub struct DataRef {
    doc: Arc<Value>,
    path: Vec<Segment>,
}

impl DataRef {
    pub fn new(doc: Arc<Value>) -> Self {
        Self { doc, path: Vec::new() }
    }

    /// 整份文档（缓存中的同一份内存）
    pub fn document(&self) -> &Arc<Value> {
        &self.doc
    }

    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    /// 当前位置的值
    pub fn value(&self) -> &Value {
        // 路径只经由 field 校验后追加
        self.path
            .iter()
            .try_fold(&*self.doc, |v, seg| seg.lookup(v))
            .unwrap_or(&NULL)
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::of(self.value())
    }

    /// 按名称前进一步：对象按键查找，数组按下标（名称须为数字）
    pub fn field(&self, name: &str) -> Option<DataRef> {
        let seg = match self.value() {
            Value::Object(map) if map.contains_key(name) => Segment::Key(name.to_string()),
            Value::Array(arr) => match name.parse::<usize>() {
                Ok(i) if i < arr.len() => Segment::Index(i),
                _ => return None,
            },
            _ => return None,
        };
        Some(self.push(seg))
    }

    /// 数组长度；非数组返回 None
    pub fn len(&self) -> Option<usize> {
        self.value().as_array().map(Vec::len)
    }

    fn push(&self, seg: Segment) -> DataRef {
        let mut path = self.path.clone();
        path.push(seg);
        DataRef { doc: Arc::clone(&self.doc), path }
    }

    /// 是否与另一个引用指向同一份内存中的同一位置
    pub fn same_as(&self, other: &DataRef) -> bool {
        Arc::ptr_eq(&self.doc, &other.doc) && self.path == other.path
    }

    pub fn to_value(&self) -> Value {
        self.value().clone()
    }

    /// RFC 9535 JSONPath 形式的位置（用于诊断输出）
    pub fn json_path(&self) -> String {
        let mut out = String::from("$");
        for seg in &self.path {
            match seg {
                // 字段含特殊字符时使用 bracket-notation
                Segment::Key(k) if k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                    out.push('.');
                    out.push_str(k);
                }
                Segment::Key(k) => out.push_str(&format!("['{}']", k.replace('\'', "\\'"))),
                Segment::Index(i) => out.push_str(&format!("[{}]", i)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_walk_shares_document() {
        let doc = Arc::new(json!({"user": {"profile": {"name": "张三"}}}));
        let root = DataRef::new(Arc::clone(&doc));

        let name = root.field("user").and_then(|u| u.field("profile")).and_then(|p| p.field("name")).unwrap();
        assert_eq!(name.value(), &json!("张三"));
        assert!(Arc::ptr_eq(name.document(), &doc));
        assert_eq!(name.json_path(), "$.user.profile.name");
        assert_eq!(root.path().len(), 0, "原引用不应被修改");
    }

    #[test]
    fn test_array_field_by_numeric_name() {
        let root = DataRef::new(Arc::new(json!({"items": [1, 2, 3]})));
        let items = root.field("items").unwrap();

        assert_eq!(items.len(), Some(3));
        assert_eq!(items.field("1").unwrap().value(), &json!(2));
        assert!(items.field("3").is_none());
        assert!(items.field("x").is_none());
        assert_eq!(items.field("2").unwrap().json_path(), "$.items[2]");
    }

    #[test]
    fn test_missing_field_and_scalar_walk() {
        let root = DataRef::new(Arc::new(json!({"a": 5})));
        assert!(root.field("b").is_none());
        assert!(root.field("a").unwrap().field("x").is_none());
    }

    #[test]
    fn test_special_key_paths() {
        let root = DataRef::new(Arc::new(json!({
            "normal_key": 1,
            "key with spaces": 2,
            "key'with'quotes": 3
        })));

        assert_eq!(root.field("normal_key").unwrap().json_path(), "$.normal_key");
        assert_eq!(root.field("key with spaces").unwrap().json_path(), "$['key with spaces']");
        assert_eq!(root.field("key'with'quotes").unwrap().json_path(), "$['key\\'with\\'quotes']");
    }

    #[test]
    fn test_kind_and_composites() {
        let root = DataRef::new(Arc::new(json!({
            "title": "辩论记录",
            "object": {"nested": "value"},
            "array": [1, 2, 3, 4, 5],
            "null_value": null
        })));

        assert_eq!(root.kind(), NodeKind::Object);
        assert!(root.kind().is_composite());
        assert_eq!(root.field("title").unwrap().kind(), NodeKind::String);
        assert!(root.field("object").unwrap().kind().is_composite());
        assert_eq!(root.field("array").unwrap().kind(), NodeKind::Array);
        assert_eq!(root.field("array").unwrap().len(), Some(5));
        let null = root.field("null_value").unwrap();
        assert_eq!(null.kind(), NodeKind::Null);
        assert!(!null.kind().is_composite());
    }
}
