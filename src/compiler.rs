pub mod error;
pub mod frame;
pub mod resolver;

use crate::config::CompileConfig;
use crate::tokenizer::Tokenizer;
use error::CompileError;
use frame::{Ancestry, Compiler, Frame};
use std::io::{Read, Write};
use std::path::Path;

/// 编译入口文档：递归内联所有组件与 slot，结果写入 `out`。
///
/// `source` 决定组件的查找目录。返回写出的字节数；失败前已写出的内容不会回滚。
pub fn compile_reader(
    source: &Path,
    reader: impl Read,
    out: &mut dyn Write,
    config: &CompileConfig,
) -> Result<u64, CompileError> {
    let mut cursor = Tokenizer::new(reader);
    let root = frame::canonical(source);

    let mut compiler = Compiler::new(out, config);
    compiler.compile(Frame {
        source,
        terminator: None,
        cursor: &mut cursor,
        filler: None,
        ancestry: &Ancestry::root(&root),
    })?;
    compiler.flush()?;

    let written = compiler.written();
    tracing::info!("已编译 {}（{} 字节）", source.display(), written);
    Ok(written)
}
