//! 导航结果：继续可导航的对象，或已解析的终值

use std::fmt;

use serde_json::Value;

use crate::model::error::{AccessError, Result, StepKind};
use crate::model::record::NodeKind;
use crate::vm::accessor::NavIter;
use crate::vm::partial::Nav;

/// 一步导航的结果
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Nav(Nav<'a>),
    /// 标量（字符串、数字、布尔、null）
    Value(Value),
}

impl<'a> Resolved<'a> {
    fn terminal_error(v: &Value, step: StepKind) -> AccessError {
        AccessError::NotIndexable {
            step,
            target: format!("终值 {:?} {}", NodeKind::of(v), v),
        }
    }

    pub fn attr(&self, name: &str) -> Result<Resolved<'a>> {
        match self {
            Resolved::Nav(nav) => nav.attr(name),
            Resolved::Value(v) => Err(Self::terminal_error(v, StepKind::Attr)),
        }
    }

    pub fn item(&self, key: &str) -> Result<Resolved<'a>> {
        match self {
            Resolved::Nav(nav) => nav.item(key),
            Resolved::Value(v) => Err(Self::terminal_error(v, StepKind::Item)),
        }
    }

    pub fn iter(&self) -> Result<NavIter<'a>> {
        match self {
            Resolved::Nav(nav) => nav.iter(),
            Resolved::Value(v) => Err(Self::terminal_error(v, StepKind::Iter)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Resolved::Value(_))
    }

    pub fn as_nav(&self) -> Option<&Nav<'a>> {
        match self {
            Resolved::Nav(nav) => Some(nav),
            Resolved::Value(_) => None,
        }
    }

    pub fn into_nav(self) -> Option<Nav<'a>> {
        match self {
            Resolved::Nav(nav) => Some(nav),
            Resolved::Value(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&Value> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Nav(_) => None,
        }
    }

    /// 终值或导航对象持有的复合值；尚未取出记录时为 None
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Resolved::Value(v) => Some(v.clone()),
            Resolved::Nav(nav) => nav.data().map(|d| d.to_value()),
        }
    }
}

impl fmt::Display for Resolved<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Nav(nav) => write!(f, "{}", nav),
            Resolved::Value(v) => write!(f, "{}", v),
        }
    }
}
