//! 数据源位置配置（locations 文件）

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::error::{AccessError, Result};
use crate::utils::fs::read_typed_json;

/// 文本文件编码，未指定时按 latin1 读取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[serde(alias = "utf-8")]
    Utf8,
    #[default]
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

fn default_extension() -> String {
    "json".to_string()
}

/// 单个数据源的存储位置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// 所属的顶层数据类型（类别）
    pub data_type: String,
    /// 相对于数据根目录的存储目录
    pub dir: PathBuf,
    /// 整个数据源存放在一个文件中
    #[serde(default)]
    pub single: bool,
    /// 记录为JSON；否则为原始文本
    #[serde(default = "default_true")]
    pub is_json: bool,
    /// 该数据源为所属类别提供id
    #[serde(default)]
    pub has_ids: bool,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub encoding: Encoding,
}

fn default_true() -> bool {
    true
}

impl SourceLocation {
    pub fn new(data_type: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            data_type: data_type.into(),
            dir: dir.into(),
            single: false,
            is_json: true,
            has_ids: false,
            extension: default_extension(),
            encoding: Encoding::default(),
        }
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn text(mut self) -> Self {
        self.is_json = false;
        self
    }

    pub fn with_ids(mut self) -> Self {
        self.has_ids = true;
        self
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationsFile {
    #[serde(default)]
    schema_dir: Option<PathBuf>,
    #[serde(default)]
    schema: Option<String>,
    data_dir: PathBuf,
    data_sources: BTreeMap<String, SourceLocation>,
}

/// 位置文件的来源：顶层目录与相对文件名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOrigin {
    pub top: PathBuf,
    pub file: PathBuf,
}

/// 完整的数据源配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// 数据根目录（已解析为绝对或相对于工作目录的路径）
    pub data_dir: PathBuf,
    pub schema_dir: Option<PathBuf>,
    pub schema: Option<String>,
    pub sources: BTreeMap<String, SourceLocation>,
    /// 配置来源文件；reset 时重新读取
    pub origin: Option<ConfigOrigin>,
}

impl SourceConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            schema_dir: None,
            schema: None,
            sources: BTreeMap::new(),
            origin: None,
        }
    }

    pub fn source(mut self, name: impl Into<String>, location: SourceLocation) -> Self {
        self.sources.insert(name.into(), location);
        self
    }

    /// 读取 `<top>/<file>`，目录相对于 top 解析
    pub fn from_file(top: &Path, file: &Path) -> Result<Self> {
        let path = top.join(file);
        let raw: LocationsFile = read_typed_json(&path)?;
        if raw.data_sources.is_empty() {
            return Err(AccessError::Config(format!("{} 未声明任何数据源", path.display())));
        }
        tracing::debug!("读取位置配置: {} ({} 个数据源)", path.display(), raw.data_sources.len());
        Ok(Self {
            data_dir: top.join(raw.data_dir),
            schema_dir: raw.schema_dir.map(|d| top.join(d)),
            schema: raw.schema,
            sources: raw.data_sources,
            origin: Some(ConfigOrigin {
                top: top.to_path_buf(),
                file: file.to_path_buf(),
            }),
        })
    }

    /// 重新读取来源文件（若有），否则返回自身副本
    pub fn reload(&self) -> Result<Self> {
        match &self.origin {
            Some(origin) => Self::from_file(&origin.top, &origin.file),
            None => Ok(self.clone()),
        }
    }

    pub fn location(&self, source: &str) -> Result<&SourceLocation> {
        self.sources
            .get(source)
            .ok_or_else(|| AccessError::UnknownSource(source.to_string()))
    }

    /// 数据源的存储目录
    pub fn source_dir(&self, source: &str) -> Result<PathBuf> {
        Ok(self.data_dir.join(&self.location(source)?.dir))
    }

    pub fn schema_path(&self) -> Option<PathBuf> {
        match (&self.schema_dir, &self.schema) {
            (Some(dir), Some(schema)) => Some(dir.join(schema)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_locations_file_defaults() {
        let dir = TempDir::new().expect("创建临时目录失败");
        std::fs::create_dir(dir.path().join("schema")).unwrap();
        std::fs::write(
            dir.path().join("schema/locs.json"),
            r#"{
                "dataDir": "data",
                "dataSources": {
                    "transcripts": {"dataType": "debates", "dir": "debates/transcripts", "isJson": false, "encoding": "utf-8"},
                    "peopleMetadata": {"dataType": "people", "dir": "people", "single": true, "hasIds": true},
                    "peopleNotes": {"dataType": "people", "dir": "people/notes", "hasIds": false}
                }
            }"#,
        )
        .unwrap();

        let config = SourceConfig::from_file(dir.path(), Path::new("schema/locs.json")).unwrap();
        assert_eq!(config.data_dir, dir.path().join("data"));
        assert_eq!(config.schema_path(), None);

        let tx = config.location("transcripts").unwrap();
        assert!(!tx.is_json && !tx.single && !tx.has_ids);
        assert_eq!(tx.encoding, Encoding::Utf8);
        assert_eq!(tx.extension, "json");

        let people = config.location("peopleMetadata").unwrap();
        assert!(people.is_json && people.single && people.has_ids);
        assert_eq!(people.encoding, Encoding::Latin1);
        // hasIds 为布尔值，显式 false 不认领id
        assert!(!config.location("peopleNotes").unwrap().has_ids);
        assert_eq!(config.source_dir("peopleMetadata").unwrap(), dir.path().join("data").join("people"));
        assert!(matches!(config.location("nope"), Err(AccessError::UnknownSource(_))));
    }

    #[test]
    fn test_empty_locations_rejected() {
        let dir = TempDir::new().expect("创建临时目录失败");
        std::fs::write(dir.path().join("locs.json"), r#"{"dataDir": "data", "dataSources": {}}"#).unwrap();

        assert!(matches!(
            SourceConfig::from_file(dir.path(), Path::new("locs.json")),
            Err(AccessError::Config(_))
        ));
    }

    #[test]
    fn test_reload_without_origin_is_clone() {
        let config = SourceConfig::new("/data").source("s", SourceLocation::new("cat", "s").with_ids());
        assert_eq!(config.reload().unwrap(), config);
    }
}
