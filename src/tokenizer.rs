use std::collections::VecDeque;
use std::io::{self, Read};

/// 每次从底层读取的块大小
const CHUNK_SIZE: usize = 8 * 1024;

/// 内容按原始文本处理的元素，直到遇见对应结束标签
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// HTML Token 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// 文本（含无法识别为标记的 `<`）
    Text,
    /// <name ...>
    StartTag,
    /// </name>
    EndTag,
    /// <name ... />
    SelfClosingTag,
    /// <!-- ... --> 以及 <? ... > 形式的伪注释
    Comment,
    /// <!DOCTYPE ...> 等声明
    Doctype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// 源文件中的原始字节，透传时原样写出
    pub raw: Vec<u8>,
    /// 标签名（已转为 ASCII 小写），仅标签类 Token 有值
    pub name: Option<String>,
}

impl Token {
    fn text(raw: Vec<u8>) -> Self {
        Self {
            kind: TokenKind::Text,
            raw,
            name: None,
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_end_tag(&self, name: &str) -> bool {
        self.kind == TokenKind::EndTag && self.tag_name() == Some(name)
    }
}

/// 编译器驱动的拉取式 Token 源。
///
/// `Ok(None)` 表示流正常结束，`Err` 只代表真正的读取失败。
pub trait TokenStream {
    fn next_token(&mut self) -> io::Result<Option<Token>>;
}

/// 逐字节拉取的 HTML 词法分析器，持有底层 reader（文件句柄随之释放）
pub struct Tokenizer<R> {
    reader: R,
    lookahead: VecDeque<u8>,
    eof: bool,
    /// 刚进入 script/style 等元素时记录其名称
    raw_text_tag: Option<String>,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lookahead: VecDeque::new(),
            eof: false,
            raw_text_tag: None,
        }
    }

    /// 查看第 n 个未消费字节，必要时从 reader 补充
    fn peek(&mut self, n: usize) -> io::Result<Option<u8>> {
        while self.lookahead.len() <= n && !self.eof {
            let mut chunk = [0u8; CHUNK_SIZE];
            let read = loop {
                match self.reader.read(&mut chunk) {
                    Ok(read) => break read,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            if read == 0 {
                self.eof = true;
            } else {
                self.lookahead.extend(&chunk[..read]);
            }
        }
        Ok(self.lookahead.get(n).copied())
    }

    /// 消费一个字节并追加到 raw
    fn bump(&mut self, raw: &mut Vec<u8>) -> io::Result<Option<u8>> {
        let b = self.peek(0)?;
        if let Some(b) = b {
            self.lookahead.pop_front();
            raw.push(b);
        }
        Ok(b)
    }

    fn starts_with(&mut self, prefix: &[u8]) -> io::Result<bool> {
        for (i, expected) in prefix.iter().enumerate() {
            match self.peek(i)? {
                Some(b) if b.eq_ignore_ascii_case(expected) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    fn read_token(&mut self) -> io::Result<Option<Token>> {
        if let Some(tag) = self.raw_text_tag.take() {
            let raw = self.raw_text(&tag)?;
            if !raw.is_empty() {
                return Ok(Some(Token::text(raw)));
            }
        }

        let Some(first) = self.peek(0)? else {
            return Ok(None);
        };

        if first == b'<' {
            match self.peek(1)? {
                Some(b) if b.is_ascii_alphabetic() => return self.tag(TokenKind::StartTag, 1),
                Some(b'/') if self.peek(2)?.is_some_and(|b| b.is_ascii_alphabetic()) => {
                    return self.tag(TokenKind::EndTag, 2);
                }
                Some(b'!') if self.starts_with(b"<!--")? => return self.comment(),
                Some(b'!') => return self.declaration(TokenKind::Doctype),
                Some(b'?') => return self.declaration(TokenKind::Comment),
                _ => {}
            }
        }

        self.text().map(Some)
    }

    /// 文本：至少消费一个字节，直到下一个 `<`
    fn text(&mut self) -> io::Result<Token> {
        let mut raw = Vec::new();
        self.bump(&mut raw)?;
        while let Some(b) = self.peek(0)? {
            if b == b'<' {
                break;
            }
            self.bump(&mut raw)?;
        }
        Ok(Token::text(raw))
    }

    fn tag(&mut self, kind: TokenKind, prefix_len: usize) -> io::Result<Option<Token>> {
        let mut raw = Vec::new();
        for _ in 0..prefix_len {
            self.bump(&mut raw)?;
        }

        let mut name = Vec::new();
        while let Some(b) = self.peek(0)? {
            if b.is_ascii_whitespace() || b == b'/' || b == b'>' {
                break;
            }
            self.bump(&mut raw)?;
            name.push(b.to_ascii_lowercase());
        }

        // 属性区：引号内的 `>` 不结束标签
        let mut prev = 0u8;
        let mut after_eq = false;
        loop {
            let Some(b) = self.bump(&mut raw)? else {
                // 标签未闭合即到达流末尾，剩余字节按文本保留
                return Ok(Some(Token::text(raw)));
            };
            match b {
                b'>' => break,
                b'"' | b'\'' if after_eq => {
                    loop {
                        match self.bump(&mut raw)? {
                            Some(q) if q == b => break,
                            Some(_) => {}
                            None => return Ok(Some(Token::text(raw))),
                        }
                    }
                    after_eq = false;
                    prev = b;
                    continue;
                }
                b'=' => after_eq = true,
                b if b.is_ascii_whitespace() => {}
                _ => after_eq = false,
            }
            if !b.is_ascii_whitespace() {
                prev = b;
            }
        }

        let name = String::from_utf8_lossy(&name).into_owned();
        let kind = if kind == TokenKind::StartTag && prev == b'/' {
            TokenKind::SelfClosingTag
        } else {
            kind
        };
        if kind == TokenKind::StartTag && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text_tag = Some(name.clone());
        }

        Ok(Some(Token {
            kind,
            raw,
            name: Some(name),
        }))
    }

    /// 原始文本元素内容：直到 `</tag` 后接空白、`/`、`>` 或流末尾
    fn raw_text(&mut self, tag: &str) -> io::Result<Vec<u8>> {
        let mut raw = Vec::new();
        loop {
            if self.peek(0)? == Some(b'<') && self.peek(1)? == Some(b'/') {
                let mut closes = true;
                for (i, expected) in tag.bytes().enumerate() {
                    if self.peek(i + 2)?.map(|b| b.to_ascii_lowercase()) != Some(expected) {
                        closes = false;
                        break;
                    }
                }
                if closes {
                    let delimiter = self.peek(tag.len() + 2)?;
                    if delimiter.is_none_or(|b| b.is_ascii_whitespace() || b == b'/' || b == b'>') {
                        return Ok(raw);
                    }
                }
            }
            if self.bump(&mut raw)?.is_none() {
                return Ok(raw);
            }
        }
    }

    fn comment(&mut self) -> io::Result<Option<Token>> {
        let mut raw = Vec::new();
        for _ in 0..4 {
            self.bump(&mut raw)?;
        }
        // `<!-->` 与 `<!--->` 是空注释
        let empty_close = if self.starts_with(b">")? {
            1
        } else if self.starts_with(b"->")? {
            2
        } else {
            0
        };
        if empty_close > 0 {
            for _ in 0..empty_close {
                self.bump(&mut raw)?;
            }
            return Ok(Some(Token {
                kind: TokenKind::Comment,
                raw,
                name: None,
            }));
        }
        while self.bump(&mut raw)?.is_some() {
            if raw.len() >= 7 && raw.ends_with(b"-->") {
                break;
            }
        }
        Ok(Some(Token {
            kind: TokenKind::Comment,
            raw,
            name: None,
        }))
    }

    fn declaration(&mut self, kind: TokenKind) -> io::Result<Option<Token>> {
        let mut raw = Vec::new();
        while let Some(b) = self.bump(&mut raw)? {
            if b == b'>' {
                break;
            }
        }
        Ok(Some(Token {
            kind,
            raw,
            name: None,
        }))
    }
}

impl<R: Read> TokenStream for Tokenizer<R> {
    fn next_token(&mut self) -> io::Result<Option<Token>> {
        self.read_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tokens(input: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(input.as_bytes());
        let mut out = Vec::new();
        while let Some(token) = tokenizer.next_token().unwrap() {
            out.push(token);
        }
        out
    }

    fn kinds(input: &str) -> Vec<(TokenKind, Option<String>)> {
        tokens(input)
            .into_iter()
            .map(|t| (t.kind, t.name))
            .collect()
    }

    #[rstest]
    #[case("")]
    #[case("plain text only")]
    #[case("<!DOCTYPE html><html lang=\"en\"><body><p class='a>b'>x &amp; y</p></body></html>")]
    #[case("<script>if (a < b && c > d) { x = '</p>'; }</script>")]
    #[case("<!-- a <b> comment --><br/><img src=\"x.png\" />")]
    #[case("1 < 2 and </ 3 <")]
    #[case("<div unterminated")]
    #[case("<!-- never closed")]
    #[case("<!-->x")]
    #[case("<!--->x")]
    #[case("<?xml version=\"1.0\"?><p>ok</p>")]
    #[case("中文内容<p>段落</p>")]
    fn raw_bytes_reassemble_input(#[case] input: &str) {
        let joined: Vec<u8> = tokens(input).into_iter().flat_map(|t| t.raw).collect();
        assert_eq!(joined, input.as_bytes());
    }

    #[test]
    fn classifies_tags() {
        assert_eq!(
            kinds("<Box id=x>hi</BOX><br/>"),
            vec![
                (TokenKind::StartTag, Some("box".into())),
                (TokenKind::Text, None),
                (TokenKind::EndTag, Some("box".into())),
                (TokenKind::SelfClosingTag, Some("br".into())),
            ]
        );
    }

    #[test]
    fn quoted_attribute_may_contain_angle_bracket() {
        let toks = tokens("<a title=\"x > y\">link</a>");
        assert_eq!(toks[0].kind, TokenKind::StartTag);
        assert_eq!(toks[0].raw, b"<a title=\"x > y\">");
        assert_eq!(toks[1].raw, b"link");
    }

    #[test]
    fn script_content_is_raw_text() {
        assert_eq!(
            kinds("<script><slot></slot></script>"),
            vec![
                (TokenKind::StartTag, Some("script".into())),
                (TokenKind::Text, None),
                (TokenKind::EndTag, Some("script".into())),
            ]
        );
    }

    #[test]
    fn empty_script_has_no_text_token() {
        assert_eq!(
            kinds("<style></style>"),
            vec![
                (TokenKind::StartTag, Some("style".into())),
                (TokenKind::EndTag, Some("style".into())),
            ]
        );
    }

    #[test]
    fn comments_and_declarations() {
        assert_eq!(
            kinds("<!doctype html><!----><?php ?>"),
            vec![
                (TokenKind::Doctype, None),
                (TokenKind::Comment, None),
                (TokenKind::Comment, None),
            ]
        );
    }

    #[rstest]
    #[case("<!-->x", "<!-->")]
    #[case("<!--->x", "<!--->")]
    #[case("<!---->x", "<!---->")]
    #[case("<!--->-->x", "<!--->")]
    fn empty_comments_close_early(#[case] input: &str, #[case] comment: &str) {
        let toks = tokens(input);
        assert_eq!(toks[0].kind, TokenKind::Comment);
        assert_eq!(toks[0].raw, comment.as_bytes());
        assert_eq!(toks.last().unwrap().kind, TokenKind::Text);
    }

    #[test]
    fn unterminated_tag_is_text() {
        assert_eq!(kinds("<p"), vec![(TokenKind::Text, None)]);
    }

    #[test]
    fn small_reads_are_stitched() {
        // 每次只读一个字节的 reader，检验跨块前瞻
        struct OneByte<'a>(&'a [u8]);
        impl Read for OneByte<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }

        let mut tokenizer = Tokenizer::new(OneByte(b"<!--c--></slot>"));
        let first = tokenizer.next_token().unwrap().unwrap();
        assert_eq!(first.kind, TokenKind::Comment);
        let second = tokenizer.next_token().unwrap().unwrap();
        assert!(second.is_end_tag("slot"));
        assert!(tokenizer.next_token().unwrap().is_none());
    }

    #[test]
    fn read_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }

        let mut tokenizer = Tokenizer::new(Broken);
        assert!(tokenizer.next_token().is_err());
    }
}
