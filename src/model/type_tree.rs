//! 类型树（Type Tree）：类别与数据源的层级，节点存于数组中，父节点以下标反向引用

use std::collections::BTreeMap;

use crate::model::config::SourceConfig;
use crate::model::error::{AccessError, Result};
use crate::model::record::DataRef;

/// 根节点名称
pub const ROOT_NAME: &str = "rootType";

/// 节点在树中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

/// id 来源：自身的数据源，或委托给某个子节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdBinding {
    Source(String),
    Delegate(TypeId),
}

/// 为类型树提供记录与id的存储（由 SourceRegistry 实现）
pub trait RecordStore {
    fn source_ids(&mut self, source: &str) -> Result<Vec<String>>;
    fn source_record(&mut self, source: &str, id: &str) -> Result<DataRef>;
}

#[derive(Debug, Clone)]
pub struct TypeNode {
    name: String,
    parent: Option<TypeId>,
    children: BTreeMap<String, TypeId>,
    /// 记录来源（数据源名称）；有记录来源的节点必为叶子
    records: Option<String>,
    ids: Option<IdBinding>,
}

impl TypeNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }

    pub fn is_top(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// 数据源节点对应的数据源名称
    pub fn source(&self) -> Option<&str> {
        self.records.as_deref()
    }

    pub fn id_binding(&self) -> Option<&IdBinding> {
        self.ids.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct TypeTree {
    nodes: Vec<TypeNode>,
}

impl Default for TypeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTree {
    /// 只含根节点的树
    pub fn new() -> Self {
        Self {
            nodes: vec![TypeNode {
                name: ROOT_NAME.to_string(),
                parent: None,
                children: BTreeMap::new(),
                records: None,
                ids: None,
            }],
        }
    }

    /// 从位置配置构建：根 -> 类别 -> 数据源，并校验每个顶层类别都有id来源
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let mut tree = Self::new();
        let root = tree.root();
        let mut id_claims: BTreeMap<String, Vec<(String, TypeId)>> = BTreeMap::new();

        for (source, loc) in &config.sources {
            let category = match tree.child(root, &loc.data_type) {
                Ok(existing) => existing,
                Err(_) => tree.add_category(root, &loc.data_type)?,
            };
            let node = tree.add_source(category, source, source)?;
            if loc.has_ids {
                id_claims
                    .entry(loc.data_type.clone())
                    .or_default()
                    .push((source.clone(), node));
            }
        }

        for (category, claims) in id_claims {
            if claims.len() > 1 {
                return Err(AccessError::ConflictingIdSource {
                    category,
                    sources: claims.into_iter().map(|(name, _)| name).collect(),
                });
            }
            let cat = tree.child(root, &category)?;
            let (_, child) = &claims[0];
            tree.designate_id_source(cat, *child)?;
        }

        tree.validate()?;
        Ok(tree)
    }

    pub fn root(&self) -> TypeId {
        TypeId(0)
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn parent(&self, id: TypeId) -> Option<TypeId> {
        self.nodes[id.0].parent
    }

    pub fn is_leaf(&self, id: TypeId) -> bool {
        self.nodes[id.0].is_leaf()
    }

    pub fn children(&self, id: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        self.nodes[id.0].children.values().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn find_by_name(&self, name: &str) -> Option<TypeId> {
        self.nodes.iter().position(|n| n.name == name).map(TypeId)
    }

    fn push_child(&mut self, parent: TypeId, name: &str, records: Option<String>) -> Result<TypeId> {
        if self.find_by_name(name).is_some() {
            return Err(AccessError::DuplicateType(name.to_string()));
        }
        if let Some(source) = self.nodes[parent.0].source() {
            return Err(AccessError::Config(format!(
                "数据源节点 {} 不能拥有子节点 {}",
                source, name
            )));
        }
        let id = TypeId(self.nodes.len());
        let ids = records.clone().map(IdBinding::Source);
        self.nodes.push(TypeNode {
            name: name.to_string(),
            parent: Some(parent),
            children: BTreeMap::new(),
            records,
            ids,
        });
        self.nodes[parent.0].children.insert(name.to_string(), id);
        Ok(id)
    }

    /// 添加类别节点；名称在整棵树中必须唯一
    pub fn add_category(&mut self, parent: TypeId, name: &str) -> Result<TypeId> {
        self.push_child(parent, name, None)
    }

    /// 添加数据源节点，记录与id均来自同名（或指定的）数据源
    pub fn add_source(&mut self, parent: TypeId, name: &str, source: &str) -> Result<TypeId> {
        self.push_child(parent, name, Some(source.to_string()))
    }

    /// 指定某个直接子节点作为类别的id来源；已指定其他子节点时报冲突
    pub fn designate_id_source(&mut self, category: TypeId, child: TypeId) -> Result<()> {
        if self.nodes[child.0].parent != Some(category) {
            return Err(AccessError::Config(format!(
                "{} 不是 {} 的子节点",
                self.name(child),
                self.name(category)
            )));
        }
        match &self.nodes[category.0].ids {
            Some(IdBinding::Delegate(existing)) if *existing != child => {
                Err(AccessError::ConflictingIdSource {
                    category: self.name(category).to_string(),
                    sources: vec![self.name(*existing).to_string(), self.name(child).to_string()],
                })
            }
            _ => {
                self.nodes[category.0].ids = Some(IdBinding::Delegate(child));
                Ok(())
            }
        }
    }

    /// 每个顶层类型都必须有可用的id来源
    pub fn validate(&self) -> Result<()> {
        let mut missing: Vec<String> = self
            .children(self.root())
            .filter(|&c| self.nodes[c.0].ids.is_none())
            .map(|c| self.name(c).to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            Err(AccessError::MissingIdSource(missing))
        }
    }

    /// 直接子节点
    pub fn child(&self, id: TypeId, name: &str) -> Result<TypeId> {
        self.nodes[id.0]
            .children
            .get(name)
            .copied()
            .ok_or_else(|| AccessError::TypeNotFound {
                name: name.to_string(),
                within: self.path_of(id),
            })
    }

    /// 在子树中深度优先查找名为 name 的类型（不含自身）
    pub fn find_descendant(&self, id: TypeId, name: &str) -> Result<TypeId> {
        self.search(id, name).ok_or_else(|| AccessError::TypeNotFound {
            name: name.to_string(),
            within: self.path_of(id),
        })
    }

    fn search(&self, id: TypeId, name: &str) -> Option<TypeId> {
        for child in self.children(id) {
            if self.name(child) == name {
                return Some(child);
            }
            if let Some(found) = self.search(child, name) {
                return Some(found);
            }
        }
        None
    }

    /// 该类型定义的全部id（自身来源或委托的子节点来源）
    pub fn list_ids(&self, id: TypeId, store: &mut dyn RecordStore) -> Result<Vec<String>> {
        match &self.nodes[id.0].ids {
            Some(IdBinding::Source(source)) => store.source_ids(source),
            Some(IdBinding::Delegate(child)) => self.list_ids(*child, store),
            None => Err(AccessError::NoIdSource(self.path_of(id))),
        }
    }

    /// 该类型在给定id下的记录
    pub fn load_record(&self, id: TypeId, record_id: &str, store: &mut dyn RecordStore) -> Result<DataRef> {
        match &self.nodes[id.0].records {
            Some(source) => store.source_record(source, record_id),
            None => Err(AccessError::NoRecordSource(self.path_of(id))),
        }
    }

    /// 诊断用路径：rootType -> debates -> transcripts
    pub fn path_of(&self, id: TypeId) -> String {
        match self.parent(id) {
            Some(parent) => format!("{} -> {}", self.path_of(parent), self.name(id)),
            None => self.name(id).to_string(),
        }
    }
}
