//! 程序入口：初始化日志、打开数据源位置文件，并按命令行步骤导航
//!
//! 用法: lazy_nav <top> <locations-file> [step...]
//! 步骤: `name` 按名称，`[key]` 按键，`*` 枚举（其后的步骤作用于每个子项）

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context};
use lazy_nav::{Accessor, Resolved};
use tracing_subscriber::fmt::SubscriberBuilder;

/// 命令行中的一步
enum Step<'s> {
    Attr(&'s str),
    Item(&'s str),
    Iter,
}

fn parse_step(raw: &str) -> Step<'_> {
    if raw == "*" {
        Step::Iter
    } else if let Some(key) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Step::Item(key)
    } else {
        Step::Attr(raw)
    }
}

fn walk(current: Resolved<'_>, steps: &[String], out: &mut Vec<String>) -> anyhow::Result<()> {
    let Some((first, rest)) = steps.split_first() else {
        out.push(render(&current)?);
        return Ok(());
    };
    match parse_step(first) {
        Step::Attr(name) => walk(current.attr(name)?, rest, out),
        Step::Item(key) => walk(current.item(key)?, rest, out),
        Step::Iter => {
            for item in current.iter()? {
                walk(item?, rest, out)?;
            }
            Ok(())
        }
    }
}

/// 终值与复合值输出为 JSON，尚未取出记录的对象列出其id
fn render(resolved: &Resolved<'_>) -> anyhow::Result<String> {
    if let Some(value) = resolved.to_value() {
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    match resolved.as_nav() {
        Some(nav) => match nav.ids() {
            Ok(ids) => Ok(format!("{} ids: {}", nav, ids.join(", "))),
            Err(_) => Ok(nav.to_string()),
        },
        None => Ok(resolved.to_string()),
    }
}

fn main() -> anyhow::Result<()> {
    // 初始化日志输出
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("用法: lazy_nav <top> <locations-file> [step...]");
    }

    let accessor = Accessor::open(Path::new(&args[0]), Path::new(&args[1]))
        .with_context(|| format!("无法打开数据源位置文件 {}", args[1]))?;
    tracing::info!("数据源已加载: {}", args[1]);

    let start = Instant::now();
    let mut out = Vec::new();
    walk(Resolved::Nav(accessor.root()?), &args[2..], &mut out)?;
    for line in &out {
        println!("{}", line);
    }
    tracing::info!("导航完成: {} 个结果，耗时: {}ms", out.len(), start.elapsed().as_millis());
    Ok(())
}
