//! SourceRegistry：数据源位置、类型树与惰性记录缓存

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::model::config::{Encoding, SourceConfig};
use crate::model::error::{AccessError, Result};
use crate::model::record::DataRef;
use crate::model::type_tree::{RecordStore, TypeTree};
use crate::utils::fs::{read_json_file, read_text_file, record_path, scan_record_ids};

/// 某个数据源在缓存中的形态
#[derive(Debug)]
enum CacheEntry {
    /// 单文件数据源：整份文档
    Single(Arc<Value>),
    /// 每个id一个文件：None 表示尚未加载
    PerId(BTreeMap<String, Option<Arc<Value>>>),
}

/// 磁盘读取计数（reset 时清零）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// 目录扫描次数
    pub id_scans: u64,
    /// 单条记录文件读取次数
    pub record_reads: u64,
    /// 单文件数据源读取次数
    pub single_reads: u64,
}

/// 记录读取所需的位置信息（从配置复制，避免借用冲突）
struct ReadPlan {
    dir: PathBuf,
    extension: String,
    is_json: bool,
    encoding: Encoding,
}

impl ReadPlan {
    fn read(&self, path: &Path) -> Result<Value> {
        if self.is_json {
            read_json_file(path, self.encoding)
        } else {
            read_text_file(path, self.encoding).map(Value::String)
        }
    }
}

#[derive(Debug)]
pub struct SourceRegistry {
    config: SourceConfig,
    tree: Arc<TypeTree>,
    cache: HashMap<String, CacheEntry>,
    stats: LoadStats,
}

impl SourceRegistry {
    /// 从配置构建；任何顶层类别缺少id来源时构建失败
    pub fn new(config: SourceConfig) -> Result<Self> {
        let tree = Arc::new(TypeTree::from_config(&config)?);
        tracing::info!(
            "数据源注册完成: {} 个数据源，{} 个类型节点",
            config.sources.len(),
            tree.len()
        );
        Ok(Self {
            config,
            tree,
            cache: HashMap::new(),
            stats: LoadStats::default(),
        })
    }

    /// 读取 `<top>/<locations>` 并构建
    pub fn open(top: &Path, locations: &Path) -> Result<Self> {
        Self::new(SourceConfig::from_file(top, locations)?)
    }

    /// 类型树的根（共享同一棵树，reset 后换新树）
    pub fn tree(&self) -> Arc<TypeTree> {
        Arc::clone(&self.tree)
    }

    pub fn schema_path(&self) -> Option<PathBuf> {
        self.config.schema_path()
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// 数据源是否已被访问过（id或文档已进入缓存）
    pub fn is_cached(&self, source: &str) -> bool {
        self.cache.contains_key(source)
    }

    fn plan(&self, source: &str) -> Result<ReadPlan> {
        let loc = self.config.location(source)?;
        Ok(ReadPlan {
            dir: self.config.source_dir(source)?,
            extension: loc.extension.clone(),
            is_json: loc.is_json,
            encoding: loc.encoding,
        })
    }

    /// 首次访问时载入数据源的id：单文件数据源载入整份文档，否则只扫描目录
    pub fn ensure_ids_loaded(&mut self, source: &str) -> Result<()> {
        let single = self.config.location(source)?.single;
        if self.cache.contains_key(source) {
            return Ok(());
        }
        let plan = self.plan(source)?;
        let start = Instant::now();

        let entry = if single {
            // 单文件：<dir>/<basename(dir)>.<ext>
            let base = plan
                .dir
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| AccessError::Config(format!("数据源 {} 的目录无效", source)))?;
            let path = record_path(&plan.dir, base, &plan.extension);
            let doc = plan.read(&path)?;
            self.stats.single_reads += 1;
            tracing::info!(
                "单文件数据源加载完成: {} ({})，耗时: {}ms",
                source,
                path.display(),
                start.elapsed().as_millis()
            );
            CacheEntry::Single(Arc::new(doc))
        } else {
            let ids = match scan_record_ids(&plan.dir, &plan.extension)? {
                Some(ids) => ids,
                None => {
                    tracing::warn!("数据源目录不存在: {} ({})", source, plan.dir.display());
                    Vec::new()
                }
            };
            self.stats.id_scans += 1;
            tracing::debug!("数据源 {} 扫描到 {} 个id", source, ids.len());
            CacheEntry::PerId(ids.into_iter().map(|id| (id, None)).collect())
        };

        self.cache.insert(source.to_string(), entry);
        Ok(())
    }

    /// 载入单条记录；已加载时不重复读取
    pub fn load_record(&mut self, source: &str, id: &str) -> Result<()> {
        self.ensure_ids_loaded(source)?;
        let plan = self.plan(source)?;

        match self.cache.get_mut(source) {
            Some(CacheEntry::Single(doc)) => {
                if doc.get(id).is_some() {
                    Ok(())
                } else {
                    Err(AccessError::IdNotFound { id: id.to_string(), within: source.to_string() })
                }
            }
            Some(CacheEntry::PerId(slots)) => {
                let slot = slots.get_mut(id).ok_or_else(|| AccessError::IdNotFound {
                    id: id.to_string(),
                    within: source.to_string(),
                })?;
                if slot.is_none() {
                    let path = record_path(&plan.dir, id, &plan.extension);
                    // 读取失败不写入缓存，下次访问会重新读取
                    let value = plan.read(&path)?;
                    self.stats.record_reads += 1;
                    tracing::debug!("记录加载完成: {}[{}]", source, id);
                    *slot = Some(Arc::new(value));
                }
                Ok(())
            }
            None => Err(AccessError::State(format!("数据源 {} 未初始化", source))),
        }
    }

    /// 返回缓存中的记录，必要时先加载
    pub fn get_record(&mut self, source: &str, id: &str) -> Result<DataRef> {
        self.load_record(source, id)?;
        match self.cache.get(source) {
            Some(CacheEntry::Single(doc)) => DataRef::new(Arc::clone(doc))
                .field(id)
                .ok_or_else(|| AccessError::IdNotFound { id: id.to_string(), within: source.to_string() }),
            Some(CacheEntry::PerId(slots)) => match slots.get(id) {
                Some(Some(record)) => Ok(DataRef::new(Arc::clone(record))),
                _ => Err(AccessError::IdNotFound { id: id.to_string(), within: source.to_string() }),
            },
            None => Err(AccessError::State(format!("数据源 {} 未初始化", source))),
        }
    }

    /// 数据源的全部id（升序）
    pub fn list_ids(&mut self, source: &str) -> Result<Vec<String>> {
        self.ensure_ids_loaded(source)?;
        match self.cache.get(source) {
            Some(CacheEntry::Single(doc)) => {
                let map = doc
                    .as_object()
                    .ok_or_else(|| AccessError::NoIdSource(source.to_string()))?;
                let mut ids: Vec<String> = map.keys().cloned().collect();
                ids.sort();
                Ok(ids)
            }
            Some(CacheEntry::PerId(slots)) => Ok(slots.keys().cloned().collect()),
            None => Err(AccessError::State(format!("数据源 {} 未初始化", source))),
        }
    }

    /// 载入数据源的全部记录，返回记录数
    pub fn preload(&mut self, source: &str) -> Result<usize> {
        let start = Instant::now();
        let ids = self.list_ids(source)?;
        for id in &ids {
            self.load_record(source, id)?;
        }
        tracing::info!("数据源 {} 预加载 {} 条记录，耗时: {}ms", source, ids.len(), start.elapsed().as_millis());
        Ok(ids.len())
    }

    /// 重新读取配置、重建类型树并清空缓存；配置无效时保持原状态
    pub fn reset(&mut self) -> Result<()> {
        let config = self.config.reload()?;
        let tree = TypeTree::from_config(&config)?;
        self.config = config;
        self.tree = Arc::new(tree);
        self.cache.clear();
        self.stats = LoadStats::default();
        tracing::info!("数据源缓存已重置");
        Ok(())
    }
}

impl RecordStore for SourceRegistry {
    fn source_ids(&mut self, source: &str) -> Result<Vec<String>> {
        self.list_ids(source)
    }

    fn source_record(&mut self, source: &str, id: &str) -> Result<DataRef> {
        self.get_record(source, id)
    }
}
