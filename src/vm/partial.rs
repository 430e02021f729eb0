//! PartialData：尚未完全解析的访问路径，每一步都产生新的实例

use std::fmt;
use std::sync::Arc;

use crate::model::error::Result;
use crate::model::record::DataRef;
use crate::model::type_tree::{TypeId, TypeTree};
use crate::vm::accessor::{Accessor, NavIter};
use crate::vm::bridge::Resolved;

/// 访问路径所处的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// 初始：位于类型树根
    Root,
    /// 类型已解析为类别（非叶子）
    Category,
    /// 类型已解析为数据源，尚无id；名称步骤累积为待解析字段路径
    Source,
    /// 类型为类别且id已确定，记录尚未取出
    Keyed,
    /// 持有已解析的复合值（对象或数组）
    Data,
}

impl NavState {
    /// 转移表中的下标
    pub(crate) fn index(self) -> usize {
        match self {
            NavState::Root => 0,
            NavState::Category => 1,
            NavState::Source => 2,
            NavState::Keyed => 3,
            NavState::Data => 4,
        }
    }
}

/// 导航对象：(类型, id, 数据, 待解析字段路径, 状态)
#[derive(Clone)]
pub struct Nav<'a> {
    pub(crate) accessor: &'a Accessor,
    pub(crate) tree: Arc<TypeTree>,
    pub(crate) ty: TypeId,
    pub(crate) id: Option<String>,
    pub(crate) data: Option<DataRef>,
    pub(crate) pending: Vec<String>,
    pub(crate) state: NavState,
}

impl<'a> Nav<'a> {
    pub(crate) fn root(accessor: &'a Accessor, tree: Arc<TypeTree>) -> Self {
        let ty = tree.root();
        Self {
            accessor,
            tree,
            ty,
            id: None,
            data: None,
            pending: Vec::new(),
            state: NavState::Root,
        }
    }

    // 以下 with_* 构造函数都返回新实例，原实例保持不变

    pub(crate) fn with_type(&self, ty: TypeId, state: NavState) -> Self {
        Self { ty, state, ..self.clone() }
    }

    pub(crate) fn with_id(&self, id: &str, state: NavState) -> Self {
        Self {
            id: Some(id.to_string()),
            state,
            ..self.clone()
        }
    }

    pub(crate) fn with_pending(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.pending.push(name.to_string());
        next
    }

    /// 记录已取出：待解析路径已并入 data
    pub(crate) fn with_data(&self, data: DataRef) -> Self {
        Self {
            data: Some(data),
            pending: Vec::new(),
            state: NavState::Data,
            ..self.clone()
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    /// 类型在树中的完整路径（诊断用）
    pub fn type_path(&self) -> String {
        self.tree.path_of(self.ty)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn data(&self) -> Option<&DataRef> {
        self.data.as_ref()
    }

    /// 在id确定前累积的字段名
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// 按名称前进一步
    pub fn attr(&self, name: &str) -> Result<Resolved<'a>> {
        self.accessor.step_attr(self, name)
    }

    /// 按键前进一步
    pub fn item(&self, key: &str) -> Result<Resolved<'a>> {
        self.accessor.step_item(self, key)
    }

    /// 枚举子项
    pub fn iter(&self) -> Result<NavIter<'a>> {
        self.accessor.step_iter(self)
    }

    /// 当前类型定义的id（类别或数据源）
    pub fn ids(&self) -> Result<Vec<String>> {
        self.accessor
            .with_registry(|reg| self.tree.list_ids(self.ty, reg))
    }
}

impl fmt::Debug for Nav<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nav")
            .field("type", &self.type_path())
            .field("id", &self.id)
            .field("data", &self.data.as_ref().map(DataRef::json_path))
            .field("pending", &self.pending)
            .field("state", &self.state)
            .finish()
    }
}

impl fmt::Display for Nav<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_path())?;
        if let Some(id) = &self.id {
            write!(f, "[{}]", id)?;
        }
        for name in &self.pending {
            write!(f, ".{}", name)?;
        }
        if let Some(data) = &self.data {
            write!(f, " {}", data.json_path())?;
        }
        Ok(())
    }
}
