//! Accessor：按 (状态, 步骤种类) 查表执行导航转移，并持有数据源注册表

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::model::config::SourceConfig;
use crate::model::error::{AccessError, Result, StepKind};
use crate::model::record::DataRef;
use crate::model::source_registry::SourceRegistry;
use crate::vm::bridge::Resolved;
use crate::vm::partial::{Nav, NavState};

type AttrFn = for<'a> fn(&Nav<'a>, &str) -> Result<Resolved<'a>>;
type ItemFn = for<'a> fn(&Nav<'a>, &str) -> Result<Resolved<'a>>;
type IterFn = for<'a> fn(&Nav<'a>) -> Result<NavIter<'a>>;

/// 名称步骤：Root, Category, Source, Keyed, Data；每个状态都接受名称步骤
const ATTR_TRANSITIONS: [AttrFn; 5] = [
    attr_resolve_type,
    attr_resolve_type,
    attr_accumulate,
    attr_keyed_source,
    attr_data_field,
];

/// 键步骤：只有类别与数据源可以按id索引
const ITEM_TRANSITIONS: [Option<ItemFn>; 5] = [
    None,
    Some(item_category_id),
    Some(item_source_id),
    None,
    None,
];

const ITER_TRANSITIONS: [Option<IterFn>; 5] = [
    None,
    Some(iter_category_ids),
    Some(iter_source_ids),
    None,
    Some(iter_data_sequence),
];

/// 导航引擎：所有导航对象共享同一个注册表（以互斥锁保护）
#[derive(Debug)]
pub struct Accessor {
    registry: Mutex<SourceRegistry>,
}

impl Accessor {
    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self::from_registry(SourceRegistry::new(config)?))
    }

    /// 读取 `<top>/<locations>` 位置文件并构建
    pub fn open(top: &Path, locations: &Path) -> Result<Self> {
        Ok(Self::from_registry(SourceRegistry::open(top, locations)?))
    }

    pub fn from_registry(registry: SourceRegistry) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SourceRegistry>> {
        self.registry.lock().map_err(|_| {
            tracing::error!("数据源注册表锁已中毒");
            AccessError::State("数据源注册表锁已中毒".into())
        })
    }

    /// 在锁内访问注册表
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut SourceRegistry) -> Result<R>) -> Result<R> {
        let mut guard = self.lock()?;
        f(&mut guard)
    }

    /// 导航入口：类型树根
    pub fn root(&self) -> Result<Nav<'_>> {
        let tree = self.lock()?.tree();
        Ok(Nav::root(self, tree))
    }

    /// 等价于 `root()?.attr(name)`
    pub fn attr(&self, name: &str) -> Result<Resolved<'_>> {
        self.root()?.attr(name)
    }

    /// 等价于 `root()?.item(key)`
    pub fn item(&self, key: &str) -> Result<Resolved<'_>> {
        self.root()?.item(key)
    }

    /// 清空缓存并按配置重建类型树；已产生的导航对象继续引用旧树
    pub fn reset(&self) -> Result<()> {
        tracing::info!("正在重置...");
        self.lock()?.reset()
    }

    pub(crate) fn step_attr<'a>(&'a self, nav: &Nav<'a>, name: &str) -> Result<Resolved<'a>> {
        ATTR_TRANSITIONS[nav.state.index()](nav, name)
    }

    pub(crate) fn step_item<'a>(&'a self, nav: &Nav<'a>, key: &str) -> Result<Resolved<'a>> {
        match ITEM_TRANSITIONS[nav.state.index()] {
            Some(f) => f(nav, key),
            None => Err(not_indexable(nav, StepKind::Item)),
        }
    }

    pub(crate) fn step_iter<'a>(&'a self, nav: &Nav<'a>) -> Result<NavIter<'a>> {
        match ITER_TRANSITIONS[nav.state.index()] {
            Some(f) => f(nav),
            None => Err(not_indexable(nav, StepKind::Iter)),
        }
    }
}

fn not_indexable(nav: &Nav<'_>, step: StepKind) -> AccessError {
    AccessError::NotIndexable {
        step,
        target: format!("{} ({:?})", nav, nav.state),
    }
}

/// 复合值继续导航，标量直接返回
fn resolve_data<'a>(nav: &Nav<'a>, data: DataRef) -> Resolved<'a> {
    if data.kind().is_composite() {
        Resolved::Nav(nav.with_data(data))
    } else {
        Resolved::Value(data.to_value())
    }
}

/// Root/Category：在子树中查找类型，叶子为数据源，否则为类别
fn attr_resolve_type<'a>(nav: &Nav<'a>, name: &str) -> Result<Resolved<'a>> {
    let ty = nav.tree.find_descendant(nav.ty, name)?;
    let state = if nav.tree.is_leaf(ty) {
        NavState::Source
    } else {
        NavState::Category
    };
    Ok(Resolved::Nav(nav.with_type(ty, state)))
}

/// Source：id 未知前只记录字段名
fn attr_accumulate<'a>(nav: &Nav<'a>, name: &str) -> Result<Resolved<'a>> {
    Ok(Resolved::Nav(nav.with_pending(name)))
}

/// Keyed：以已知id取出子数据源的记录
fn attr_keyed_source<'a>(nav: &Nav<'a>, name: &str) -> Result<Resolved<'a>> {
    let ty = nav.tree.find_descendant(nav.ty, name)?;
    let id = nav
        .id
        .as_deref()
        .ok_or_else(|| AccessError::State(format!("{} 缺少id", nav)))?;
    let next = nav.with_type(ty, NavState::Keyed);
    let ids = nav.accessor.with_registry(|reg| nav.tree.list_ids(ty, reg))?;
    if !ids.iter().any(|known| known == id) {
        return Err(AccessError::IdNotFound {
            id: id.to_string(),
            within: nav.tree.path_of(ty),
        });
    }
    if !nav.tree.is_leaf(ty) {
        // 嵌套类别：保持 Keyed，继续按名称查找数据源
        return Ok(Resolved::Nav(next));
    }
    let record = nav.accessor.with_registry(|reg| nav.tree.load_record(ty, id, reg))?;
    Ok(resolve_data(&next, record))
}

/// Data：在当前复合值中按名称（数组按下标）前进
fn attr_data_field<'a>(nav: &Nav<'a>, name: &str) -> Result<Resolved<'a>> {
    let data = nav
        .data
        .as_ref()
        .ok_or_else(|| AccessError::State(format!("{} 缺少数据", nav)))?;
    let next = data.field(name).ok_or_else(|| AccessError::FieldNotFound {
        field: name.to_string(),
        within: format!("{} {}", nav.tree.path_of(nav.ty), data.json_path()),
    })?;
    Ok(resolve_data(nav, next))
}

fn ensure_known_id(nav: &Nav<'_>, key: &str) -> Result<()> {
    let ids = nav.accessor.with_registry(|reg| nav.tree.list_ids(nav.ty, reg))?;
    if ids.iter().any(|id| id == key) {
        Ok(())
    } else {
        Err(AccessError::IdNotFound {
            id: key.to_string(),
            within: nav.type_path(),
        })
    }
}

/// Category：校验id（委托的id来源）
fn item_category_id<'a>(nav: &Nav<'a>, key: &str) -> Result<Resolved<'a>> {
    ensure_known_id(nav, key)?;
    Ok(Resolved::Nav(nav.with_id(key, NavState::Keyed)))
}

/// Source：校验id，取出记录并沿累积的字段路径前进
fn item_source_id<'a>(nav: &Nav<'a>, key: &str) -> Result<Resolved<'a>> {
    ensure_known_id(nav, key)?;
    fetch_and_walk(nav, key)
}

fn fetch_and_walk<'a>(nav: &Nav<'a>, key: &str) -> Result<Resolved<'a>> {
    let record = nav.accessor.with_registry(|reg| nav.tree.load_record(nav.ty, key, reg))?;
    let mut data = record;
    for name in &nav.pending {
        data = data.field(name).ok_or_else(|| AccessError::FieldNotFound {
            field: name.clone(),
            within: format!("{}[{}] {}", nav.type_path(), key, data.json_path()),
        })?;
    }
    Ok(resolve_data(&nav.with_id(key, NavState::Source), data))
}

/// 枚举时id来自同一集合，不再重复校验
fn keyed_unchecked<'a>(nav: &Nav<'a>, key: &str) -> Result<Resolved<'a>> {
    Ok(Resolved::Nav(nav.with_id(key, NavState::Keyed)))
}

fn iter_category_ids<'a>(nav: &Nav<'a>) -> Result<NavIter<'a>> {
    Ok(NavIter::new(nav.clone(), nav.ids()?, keyed_unchecked))
}

fn iter_source_ids<'a>(nav: &Nav<'a>) -> Result<NavIter<'a>> {
    Ok(NavIter::new(nav.clone(), nav.ids()?, fetch_and_walk))
}

/// Data：只有数组可以枚举，每个下标按名称步骤解析
fn iter_data_sequence<'a>(nav: &Nav<'a>) -> Result<NavIter<'a>> {
    let len = nav
        .data
        .as_ref()
        .and_then(DataRef::len)
        .ok_or_else(|| not_indexable(nav, StepKind::Iter))?;
    let keys = (0..len).map(|i| i.to_string()).collect();
    Ok(NavIter::new(nav.clone(), keys, attr_data_field))
}

/// 惰性枚举：键一次取出，每个子项在 next() 时才解析
pub struct NavIter<'a> {
    base: Nav<'a>,
    keys: std::vec::IntoIter<String>,
    step: fn(&Nav<'a>, &str) -> Result<Resolved<'a>>,
}

impl<'a> NavIter<'a> {
    fn new(base: Nav<'a>, keys: Vec<String>, step: fn(&Nav<'a>, &str) -> Result<Resolved<'a>>) -> Self {
        Self {
            base,
            keys: keys.into_iter(),
            step,
        }
    }

    /// 剩余的键（id或下标）
    pub fn keys(&self) -> &[String] {
        self.keys.as_slice()
    }
}

impl<'a> Iterator for NavIter<'a> {
    type Item = Result<Resolved<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        Some((self.step)(&self.base, &key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl ExactSizeIterator for NavIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::SourceLocation;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let p = dir.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, content).unwrap();
    }

    fn accessor() -> (TempDir, Accessor) {
        let dir = TempDir::new().expect("创建临时目录失败");
        let data = dir.path().to_path_buf();
        write(&data, "debates/metadata/1.json", r#"{"date": "2016/01/14", "moderators": ["holt"], "a": {"b": 5}}"#);
        write(&data, "debates/metadata/2.json", r#"{"date": "2016/02/06", "moderators": [], "a": {"b": 6}}"#);
        write(&data, "debates/transcripts/1.json", "HOLT: Good evening.");
        write(&data, "debates/transcripts/2.json", "RADDATZ: Welcome.");

        let config = SourceConfig::new(&data)
            .source("debateMetadata", SourceLocation::new("debates", "debates/metadata").with_ids())
            .source("transcripts", SourceLocation::new("debates", "debates/transcripts").text());
        (dir, Accessor::new(config).unwrap())
    }

    fn nav<'a>(r: Result<Resolved<'a>>) -> Nav<'a> {
        match r.unwrap() {
            Resolved::Nav(n) => n,
            Resolved::Value(v) => panic!("应该是导航对象，得到终值 {}", v),
        }
    }

    #[test]
    fn test_state_progression() {
        let (_dir, acc) = accessor();
        let root = acc.root().unwrap();
        assert_eq!(root.state(), NavState::Root);

        let debates = nav(root.attr("debates"));
        assert_eq!(debates.state(), NavState::Category);
        let meta = nav(debates.attr("debateMetadata"));
        assert_eq!(meta.state(), NavState::Source);
        let direct = nav(root.attr("debateMetadata"));
        assert_eq!(direct.state(), NavState::Source, "根可直接解析到后代数据源");

        let keyed = nav(debates.item("1"));
        assert_eq!(keyed.state(), NavState::Keyed);
        assert_eq!(keyed.id(), Some("1"));

        let record = nav(meta.item("1"));
        assert_eq!(record.state(), NavState::Data);
        assert_eq!(record.data().unwrap().value()["date"], json!("2016/01/14"));
    }

    #[test]
    fn test_name_step_never_not_indexable() {
        let (_dir, acc) = accessor();
        let root = acc.root().unwrap();
        let debates = nav(root.attr("debates"));
        let meta = nav(debates.attr("debateMetadata"));
        let keyed = nav(debates.item("1"));
        let record = nav(meta.item("1"));

        // 每个状态的名称步骤都有对应转移，失败时只会是查找错误
        for (from, name) in [(&root, "nope"), (&debates, "nope"), (&keyed, "nope"), (&record, "nope")] {
            let err = from.attr(name).unwrap_err();
            assert!(!matches!(err, AccessError::NotIndexable { .. }), "{:?}: {}", from.state(), err);
        }
        assert_eq!(nav(meta.attr("nope")).pending(), &["nope".to_string()]);
    }

    #[test]
    fn test_steps_do_not_mutate_previous_objects() {
        let (_dir, acc) = accessor();
        let meta = nav(acc.attr("debateMetadata"));
        let with_a = nav(meta.attr("a"));
        let with_ab = nav(with_a.attr("b"));

        assert!(meta.pending().is_empty());
        assert_eq!(with_a.pending(), &["a".to_string()]);
        assert_eq!(with_ab.pending(), &["a".to_string(), "b".to_string()]);

        assert_eq!(with_ab.item("2").unwrap().as_terminal(), Some(&json!(6)));
        assert_eq!(with_a.item("1").unwrap().to_value(), Some(json!({"b": 5})));
    }

    #[test]
    fn test_not_indexable_transitions() {
        let (_dir, acc) = accessor();
        let root = acc.root().unwrap();
        assert!(matches!(root.item("1"), Err(AccessError::NotIndexable { step: StepKind::Item, .. })));
        assert!(matches!(root.iter(), Err(AccessError::NotIndexable { step: StepKind::Iter, .. })));

        let keyed = nav(acc.attr("debates").and_then(|d| d.item("1")));
        assert!(matches!(keyed.item("2"), Err(AccessError::NotIndexable { .. })));
        assert!(matches!(keyed.iter(), Err(AccessError::NotIndexable { .. })));

        let record = nav(acc.attr("debateMetadata").and_then(|m| m.item("1")));
        assert!(matches!(record.item("a"), Err(AccessError::NotIndexable { .. })));
        assert!(matches!(record.iter(), Err(AccessError::NotIndexable { .. })), "对象不可枚举");
    }

    #[test]
    fn test_keyed_then_source_validates_id() {
        let (dir, acc) = accessor();
        // 类别id来自 debateMetadata，transcripts 中缺少 3
        write(dir.path(), "debates/metadata/3.json", r#"{"date": "2016/03/01"}"#);

        let keyed = nav(acc.attr("debates").and_then(|d| d.item("3")));
        assert!(matches!(keyed.attr("transcripts"), Err(AccessError::IdNotFound { .. })));
        assert!(matches!(keyed.attr("nope"), Err(AccessError::TypeNotFound { .. })));
    }

    #[test]
    fn test_sequence_iteration_and_index_names() {
        let (_dir, acc) = accessor();
        let moderators = nav(acc.attr("debateMetadata").and_then(|m| m.item("1")).and_then(|r| r.attr("moderators")));

        let values: Vec<_> = moderators
            .iter()
            .unwrap()
            .map(|r| r.unwrap().to_value().unwrap())
            .collect();
        assert_eq!(values, vec![json!("holt")]);
        assert_eq!(moderators.attr("0").unwrap().as_terminal(), Some(&json!("holt")));
        assert!(matches!(moderators.attr("1"), Err(AccessError::FieldNotFound { .. })));
    }

    #[test]
    fn test_iterator_is_lazy() {
        let (_dir, acc) = accessor();
        let meta = nav(acc.attr("debateMetadata"));
        let mut it = meta.iter().unwrap();

        assert_eq!(it.len(), 2);
        assert_eq!(acc.with_registry(|r| Ok(r.stats().record_reads)).unwrap(), 0);
        it.next().unwrap().unwrap();
        assert_eq!(acc.with_registry(|r| Ok(r.stats().record_reads)).unwrap(), 1);
        assert_eq!(it.keys(), &["2".to_string()]);
    }
}
