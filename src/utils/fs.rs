//! IO helper: record files, id scans and locations file reads

use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;
use serde_json::Value;

use crate::model::config::Encoding;
use crate::model::error::{AccessError, Result};

/// 按编码读取文本文件
pub fn read_text_file(p: &Path, encoding: Encoding) -> Result<String> {
    let bytes = std::fs::read(p).map_err(|e| AccessError::io(p, e))?;
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes).map_err(|e| {
            AccessError::io(p, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        }),
        // latin1 每个字节即一个码位
        Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// 从文件读取JSON数据
pub fn read_json_file(p: &Path, encoding: Encoding) -> Result<Value> {
    match encoding {
        Encoding::Utf8 => read_typed_json(p),
        Encoding::Latin1 => {
            let text = read_text_file(p, encoding)?;
            serde_json::from_str(&text).map_err(|e| AccessError::parse(p, e))
        }
    }
}

/// 读取并反序列化为任意类型（用于位置配置文件）
pub fn read_typed_json<T: for<'de> Deserialize<'de>>(p: &Path) -> Result<T> {
    let f = File::open(p).map_err(|e| AccessError::io(p, e))?;
    let rdr = BufReader::new(f);
    serde_json::from_reader(rdr).map_err(|e| AccessError::parse(p, e))
}

/// 记录文件路径：<dir>/<id>.<ext>
pub fn record_path(dir: &Path, id: &str, ext: &str) -> std::path::PathBuf {
    dir.join(format!("{}.{}", id, ext.trim_start_matches('.')))
}

/// 列出目录中扩展名为 ext 的文件的 id（去掉扩展名的文件名）
///
/// 目录不存在时返回 `None`，由调用方决定如何处理。
pub fn scan_record_ids(dir: &Path, ext: &str) -> Result<Option<Vec<String>>> {
    let suffix = format!(".{}", ext.trim_start_matches('.'));
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AccessError::io(dir, e)),
    };

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AccessError::io(dir, e))?;
        if !entry.file_type().map_err(|e| AccessError::io(entry.path(), e))?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::warn!("跳过非UTF-8文件名: {}", entry.path().display());
            continue;
        };
        if let Some(id) = name.strip_suffix(&suffix) {
            if !id.is_empty() {
                ids.push(id.to_string());
            }
        }
    }
    ids.sort();
    Ok(Some(ids))
}
