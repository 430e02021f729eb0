//! AccessError：导航、加载与构建阶段的统一错误类型

use std::path::PathBuf;

use thiserror::Error;

/// 导航步骤的种类（用于 NotIndexable 诊断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Attr,
    Item,
    Iter,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Attr => f.write_str(".name"),
            StepKind::Item => f.write_str("[key]"),
            StepKind::Iter => f.write_str("iter"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("类型未找到: {name}（位于 {within}）")]
    TypeNotFound { name: String, within: String },
    #[error("未配置的数据源: {0}")]
    UnknownSource(String),
    #[error("类型 {0} 没有数据来源")]
    NoRecordSource(String),
    #[error("类型 {0} 没有id来源")]
    NoIdSource(String),
    #[error("id {id} 不存在于 {within}")]
    IdNotFound { id: String, within: String },
    #[error("字段 {field} 不存在于 {within}")]
    FieldNotFound { field: String, within: String },
    #[error("{step} 不适用于 {target}")]
    NotIndexable { step: StepKind, target: String },
    #[error("以下数据类型没有id来源: {0:?}")]
    MissingIdSource(Vec<String>),
    #[error("数据类型 {category} 有多个id来源: {sources:?}")]
    ConflictingIdSource { category: String, sources: Vec<String> },
    #[error("类型名重复: {0}")]
    DuplicateType(String),
    #[error("配置错误: {0}")]
    Config(String),
    #[error("IO失败: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON解析失败: {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("状态错误: {0}")]
    State(String),
}

impl AccessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AccessError::Io { path: path.into(), source }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        AccessError::Parse { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
