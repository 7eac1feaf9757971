use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};
use crate::token::{Keyword, Token};

/// Tokenizes Jack source text and exposes it through a `peek`/`advance`
/// cursor. Tokenization itself happens eagerly in `new`; `peek`/`advance`
/// walk the resulting sequence.
pub struct Tokenizer {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
}

impl Tokenizer {
    pub fn new(source: &str, file_id: u16) -> (Self, Vec<Diagnostic>) {
        let (tokens, diagnostics) = Scanner::new(source, file_id).scan();
        (Tokenizer { tokens, pos: 0 }, diagnostics)
    }

    /// The current token, or `None` at end-of-stream.
    pub fn peek(&self) -> Option<&Spanned<Token>> {
        self.tokens.get(self.pos)
    }

    /// The span of the current token, or the span just past the last
    /// token if the stream is exhausted (useful for "unexpected
    /// end-of-input" diagnostics).
    pub fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(t) => t.span,
            None => self.tokens.last().map(|t| t.span).unwrap_or(Span::dummy()),
        }
    }

    /// The current token and advance past it.
    pub fn advance(&mut self) -> Option<Spanned<Token>> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// The one-shot scanner that turns source bytes into a token sequence.
/// Not exposed outside this module; `Tokenizer` is the public surface.
struct Scanner<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Scanner<'src> {
    fn new(source: &'src str, file_id: u16) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    fn scan(mut self) -> (Vec<Spanned<Token>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.source.len() {
                break;
            }
            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                tokens.push(self.scan_ident_or_keyword());
                continue;
            }
            if ch.is_ascii_digit() {
                tokens.push(self.scan_number());
                continue;
            }
            if ch == b'"' {
                tokens.push(self.scan_string());
                continue;
            }
            if let Some(tok) = self.scan_symbol(start) {
                tokens.push(tok);
                continue;
            }
            // scan_symbol recorded an error; skip the offending byte and resume.
            self.pos += 1;
        }
        (tokens, self.diagnostics)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'*'
            {
                let start = self.pos;
                self.pos += 2;
                let mut closed = false;
                while self.pos + 1 < self.source.len() {
                    if self.source[self.pos] == b'*' && self.source[self.pos + 1] == b'/' {
                        self.pos += 2;
                        closed = true;
                        break;
                    }
                    self.pos += 1;
                }
                if !closed {
                    self.pos = self.source.len();
                    self.diagnostics.push(
                        Diagnostic::error(
                            "unterminated block comment".to_string(),
                            Span::new(self.file_id, start as u32, self.pos as u32),
                        )
                        .with_help("add a closing '*/' before end of file".to_string()),
                    );
                }
                continue;
            }

            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Token> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        let token = match Keyword::from_str(text) {
            Some(kw) => Token::Keyword(kw),
            None => Token::Identifier(text.to_string()),
        };
        self.make_token(token, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Token> {
        let start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap();
        match text.parse::<u32>() {
            Ok(n) if n <= 32767 => self.make_token(Token::IntegerConstant(n as u16), start, self.pos),
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("integer literal '{}' out of range", text),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help("integer constants must fit in 0..=32767".to_string()),
                );
                self.make_token(Token::IntegerConstant(0), start, self.pos)
            }
        }
    }

    fn scan_string(&mut self) -> Spanned<Token> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let text_start = self.pos;
        while self.pos < self.source.len()
            && self.source[self.pos] != b'"'
            && self.source[self.pos] != b'\n'
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[text_start..self.pos])
            .unwrap()
            .to_string();

        if self.pos < self.source.len() && self.source[self.pos] == b'"' {
            self.pos += 1; // closing quote
        } else {
            self.diagnostics.push(
                Diagnostic::error(
                    "unterminated string constant".to_string(),
                    Span::new(self.file_id, start as u32, self.pos as u32),
                )
                .with_help("string constants cannot contain a newline or span end of file".to_string()),
            );
        }
        self.make_token(Token::StringConstant(text), start, self.pos)
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Token>> {
        let ch = self.source[self.pos];
        if crate::token::SYMBOLS.contains(&ch) {
            self.pos += 1;
            Some(self.make_token(Token::Symbol(ch as char), start, self.pos))
        } else {
            let end = (self.pos + 1).min(self.source.len());
            let fragment = std::str::from_utf8(&self.source[start..end]).unwrap_or("?");
            self.diagnostics.push(Diagnostic::error(
                format!("unknown token '{}'", fragment),
                Span::new(self.file_id, start as u32, end as u32),
            ));
            None
        }
    }

    fn make_token(&self, token: Token, start: usize, end: usize) -> Spanned<Token> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
