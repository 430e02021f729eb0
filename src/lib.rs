//! 惰性路径导航数据访问库
//!
//! 按类型树（类别 -> 数据源）组织磁盘上的 JSON/文本记录，
//! 通过链式的名称、键与枚举步骤访问数据，首次访问时加载并缓存直到 reset

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::config::{Encoding, SourceConfig, SourceLocation};
pub use model::error::{AccessError, Result, StepKind};
pub use model::record::{DataRef, NodeKind, Segment};
pub use model::source_registry::{LoadStats, SourceRegistry};
pub use model::type_tree::{IdBinding, RecordStore, TypeId, TypeNode, TypeTree, ROOT_NAME};
pub use vm::accessor::{Accessor, NavIter};
pub use vm::bridge::Resolved;
pub use vm::partial::{Nav, NavState};
