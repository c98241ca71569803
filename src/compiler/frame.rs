use crate::compiler::error::CompileError;
use crate::compiler::resolver;
use crate::config::CompileConfig;
use crate::tokenizer::{TokenKind, TokenStream, Tokenizer};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// 正在展开的组件链（规范化路径），用于发现循环引用
#[derive(Debug, Clone, Copy)]
pub struct Ancestry<'a> {
    path: &'a Path,
    parent: Option<&'a Ancestry<'a>>,
}

impl<'a> Ancestry<'a> {
    pub fn root(path: &'a Path) -> Self {
        Self { path, parent: None }
    }

    fn iter(&self) -> impl Iterator<Item = &'a Path> {
        std::iter::successors(Some(self), |a| a.parent).map(|a| a.path)
    }

    fn contains(&self, path: &Path) -> bool {
        self.iter().any(|p| p == path)
    }

    /// 从根到当前，再以重复出现的路径收尾
    fn chain(&self, repeated: &Path) -> Vec<PathBuf> {
        let mut chain: Vec<PathBuf> = self.iter().map(Path::to_path_buf).collect();
        chain.reverse();
        chain.push(repeated.to_path_buf());
        chain
    }
}

/// 调用方内容：借用外层帧的 cursor，最多填充一个 slot
pub struct Filler<'f> {
    pub source: &'f Path,
    /// 调用处组件标签名，读到对应结束标签即结束填充
    pub terminator: &'f str,
    pub cursor: &'f mut dyn TokenStream,
    /// 拥有该 cursor 的帧的组件链
    pub ancestry: &'f Ancestry<'f>,
}

/// 一次递归编译的全部状态
pub struct Frame<'f> {
    pub source: &'f Path,
    /// `None` 表示一直编译到流末尾
    pub terminator: Option<&'f str>,
    pub cursor: &'f mut dyn TokenStream,
    pub filler: Option<Filler<'f>>,
    pub ancestry: &'f Ancestry<'f>,
}

pub struct Compiler<'a> {
    out: &'a mut dyn Write,
    config: &'a CompileConfig,
    written: u64,
}

impl<'a> Compiler<'a> {
    pub fn new(out: &'a mut dyn Write, config: &'a CompileConfig) -> Self {
        Self {
            out,
            config,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<(), CompileError> {
        self.out.flush().map_err(CompileError::Write)
    }

    /// 驱动 `frame.cursor` 直到结束标签或流末尾。
    ///
    /// 返回值表示本帧是否有 slot 由调用方内容填充，调用方据此判断
    /// 自己的组件结束标签是否已被消费。
    pub fn compile(&mut self, frame: Frame<'_>) -> Result<bool, CompileError> {
        let Frame {
            source,
            terminator,
            cursor,
            mut filler,
            ancestry,
        } = frame;
        let mut consumed_slot = false;

        loop {
            let Some(token) = cursor
                .next_token()
                .map_err(|e| CompileError::read(source, e))?
            else {
                if let Some(tag) = terminator
                    && self.config.strict_termination
                {
                    return Err(CompileError::UnterminatedElement {
                        tag: tag.to_owned(),
                        path: source.to_path_buf(),
                    });
                }
                return Ok(consumed_slot);
            };

            let name = token.tag_name().unwrap_or_default();
            match token.kind {
                TokenKind::StartTag | TokenKind::SelfClosingTag if name == "slot" => {
                    // 填充过一次后 filler 即失效，其余 slot 使用默认内容
                    if let Some(f) = filler.take() {
                        let before = self.written;
                        self.fill_slot(source, f)?;
                        consumed_slot = true;
                        // 调用方内容为空时保留默认内容
                        let filled = self.written > before;
                        if filled
                            && token.kind == TokenKind::StartTag
                            && !self.config.keep_slot_default
                        {
                            self.skip_slot_default(source, cursor)?;
                        }
                    }
                    continue;
                }
                TokenKind::StartTag | TokenKind::SelfClosingTag => {
                    if let Some(path) = resolver::find_component(source, name) {
                        let with_body = token.kind == TokenKind::StartTag;
                        self.inline_component(source, name, &path, cursor, ancestry, with_body)?;
                        continue;
                    }
                }
                TokenKind::EndTag if terminator == Some(name) => return Ok(consumed_slot),
                TokenKind::EndTag if name == "slot" => continue,
                _ => {}
            }

            self.write(&token.raw)?;
        }
    }

    fn fill_slot(&mut self, slot_source: &Path, filler: Filler<'_>) -> Result<(), CompileError> {
        tracing::debug!(
            "以 {} 中 <{}> 的内容填充 {} 的 slot",
            filler.source.display(),
            filler.terminator,
            slot_source.display()
        );
        self.compile(Frame {
            source: filler.source,
            terminator: Some(filler.terminator),
            cursor: filler.cursor,
            filler: None,
            ancestry: filler.ancestry,
        })?;
        Ok(())
    }

    /// 丢弃已填充 slot 的默认内容，直到对应的 </slot>
    fn skip_slot_default(
        &mut self,
        source: &Path,
        cursor: &mut dyn TokenStream,
    ) -> Result<(), CompileError> {
        let mut depth = 0usize;
        loop {
            let Some(token) = cursor
                .next_token()
                .map_err(|e| CompileError::read(source, e))?
            else {
                if self.config.strict_termination {
                    return Err(CompileError::UnterminatedElement {
                        tag: "slot".to_owned(),
                        path: source.to_path_buf(),
                    });
                }
                return Ok(());
            };
            if token.kind == TokenKind::StartTag && token.tag_name() == Some("slot") {
                depth += 1;
            } else if token.is_end_tag("slot") {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
        }
    }

    fn inline_component(
        &mut self,
        host: &Path,
        tag: &str,
        path: &Path,
        cursor: &mut dyn TokenStream,
        ancestry: &Ancestry<'_>,
        with_body: bool,
    ) -> Result<(), CompileError> {
        let canonical = canonical(path);
        if ancestry.contains(&canonical) {
            return Err(CompileError::CircularReference {
                chain: ancestry.chain(&canonical),
            });
        }

        tracing::debug!("内联组件 <{}>：{}", tag, path.display());

        let consumed = {
            // 组件文件句柄只在本作用域内存活，任何返回路径都会关闭
            let file = File::open(path).map_err(|e| CompileError::open(path, e))?;
            let mut component = Tokenizer::new(file);
            let scope = Ancestry {
                path: &canonical,
                parent: Some(ancestry),
            };
            let filler = if with_body {
                Some(Filler {
                    source: host,
                    terminator: tag,
                    cursor: &mut *cursor,
                    ancestry,
                })
            } else {
                None
            };
            self.compile(Frame {
                source: path,
                terminator: None,
                cursor: &mut component,
                filler,
                ancestry: &scope,
            })?
        };

        if with_body && !consumed {
            // 组件没有取用调用方内容，调用方的结束标签必须紧随其后
            match cursor
                .next_token()
                .map_err(|e| CompileError::read(host, e))?
            {
                Some(token) if token.is_end_tag(tag) => {}
                None if self.config.strict_termination => {
                    return Err(CompileError::UnterminatedElement {
                        tag: tag.to_owned(),
                        path: host.to_path_buf(),
                    });
                }
                // 流末尾同样不是结束标签，宽松模式下也按无 slot 报错
                Some(_) | None => {
                    return Err(CompileError::SlotlessComponent {
                        component: tag.to_owned(),
                        path: path.to_path_buf(),
                    });
                }
            }
        }

        Ok(())
    }

    fn write(&mut self, raw: &[u8]) -> Result<(), CompileError> {
        self.out.write_all(raw).map_err(CompileError::Write)?;
        self.written += raw.len() as u64;
        Ok(())
    }
}

/// 规范化路径；文件不存在等情况下退回原路径
pub fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
