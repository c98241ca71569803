use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("无法打开 {}：{source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("读取 {} 失败：{source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("写入输出失败：{0}")]
    Write(#[source] io::Error),

    #[error(
        "组件 <{component}>（{}）没有 <slot>，但调用处提供了内容",
        path.display()
    )]
    SlotlessComponent { component: String, path: PathBuf },

    #[error("组件循环引用：{}", format_chain(chain))]
    CircularReference { chain: Vec<PathBuf> },

    #[error("{} 中的 <{tag}> 缺少结束标签 </{tag}>", path.display())]
    UnterminatedElement { tag: String, path: PathBuf },
}

impl CompileError {
    pub fn open(path: &Path, source: io::Error) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn read(path: &Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" → ")
}
