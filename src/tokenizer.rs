use crate::error::{NeedMoreReason, SyntaxError};

/// Reserved words of the host language.
pub const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not",
    "or", "pass", "raise", "return", "try", "while", "with", "yield", "True", "False", "None",
];

/// Operators, longest first so that matching is greedy.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "->", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "=",
    "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "@", "&", "|", "^", "~",
];

/// Deepest bracket nesting accepted.
pub const MAX_BRACKET_DEPTH: usize = 200;

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Token payloads produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

/// A token with its location in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character of the token.
    pub position: usize,
    /// 1-based line number.
    pub line: usize,
    /// 0-based column, counted in characters.
    pub column: usize,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Op(o) if o == op)
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Name(n) if n == name)
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Name(n) => n.clone(),
            TokenKind::Int(n) => n.to_string(),
            TokenKind::Float(f) => f.to_string(),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Op(op) => op.to_string(),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::EndMarker => "end of input".to_string(),
        }
    }
}

/// Tokenize a whole source text.
///
/// Indentation produces `Indent`/`Dedent` tokens and newlines outside
/// brackets produce `Newline`. Blank and comment-only lines produce nothing.
///
/// With `imply_dedent == false` (interactive mode) open indentation levels
/// are only closed at end of input when the last physical line is blank, so
/// an indented block without a terminating blank line stays open and the
/// parser reports it as incomplete.
pub fn tokenize(source: &str, imply_dedent: bool) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(source);
    lexer.run()?;
    let terminated = imply_dedent || ends_with_blank_line(source);
    Ok(lexer.finish(terminated))
}

/// True if the source has more than one physical line and the last one is
/// whitespace-only.
pub fn ends_with_blank_line(source: &str) -> bool {
    match source.rfind('\n') {
        Some(idx) => source[idx + 1..].trim().is_empty(),
        None => false,
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
    indents: Vec<usize>,
    brackets: Vec<(char, usize, usize)>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
            indents: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    fn column_of(&self, position: usize) -> usize {
        self.src[self.line_start..position].chars().count()
    }

    fn column(&self) -> usize {
        self.column_of(self.pos)
    }

    fn invalid(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::invalid(message, self.line, self.column())
    }

    fn incomplete(&self, reason: NeedMoreReason) -> SyntaxError {
        SyntaxError::incomplete(reason, self.line, self.column())
    }

    fn push(&mut self, kind: TokenKind, position: usize, line: usize, column: usize) {
        self.tokens.push(Token {
            kind,
            position,
            line,
            column,
        });
    }

    fn push_here(&mut self, kind: TokenKind) {
        let (pos, line, column) = (self.pos, self.line, self.column());
        self.push(kind, pos, line, column);
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        loop {
            if self.at_line_start && self.brackets.is_empty() {
                if !self.start_logical_line()? {
                    return Ok(());
                }
                continue;
            }

            while matches!(self.peek(), Some(' ') | Some('\t') | Some('\x0c') | Some('\r')) {
                self.bump();
            }

            let Some(c) = self.peek() else {
                return self.check_brackets_closed();
            };

            match c {
                '\n' => {
                    if self.brackets.is_empty() {
                        self.push_here(TokenKind::Newline);
                        self.at_line_start = true;
                    }
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\\' => {
                    self.bump();
                    match self.peek() {
                        Some('\n') => {
                            self.bump();
                        }
                        None => return Err(self.incomplete(NeedMoreReason::TrailingBackslash)),
                        Some(_) => {
                            return Err(self.invalid(
                                "unexpected character after line continuation character",
                            ))
                        }
                    }
                }
                '\'' | '"' => self.string(false)?,
                c if c.is_ascii_digit() => self.number()?,
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.name()?,
                _ => self.operator()?,
            }
        }
    }

    /// Measure indentation at the start of a line and emit Indent/Dedent.
    /// Returns `false` at end of input.
    fn start_logical_line(&mut self) -> Result<bool, SyntaxError> {
        let mut col = 0;
        loop {
            match self.peek() {
                Some(' ') => col += 1,
                Some('\t') => col = (col / 8 + 1) * 8,
                Some('\x0c') => col = 0,
                Some('\r') => {}
                _ => break,
            }
            self.bump();
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n') => {
                self.bump();
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.bump();
                }
                return Ok(true);
            }
            Some(_) => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if col > current {
            self.indents.push(col);
            self.push_here(TokenKind::Indent);
        } else if col < current {
            while col < *self.indents.last().unwrap_or(&0) {
                self.indents.pop();
                self.push_here(TokenKind::Dedent);
            }
            if col != *self.indents.last().unwrap_or(&0) {
                return Err(self.invalid("unindent does not match any outer indentation level"));
            }
        }
        self.at_line_start = false;
        Ok(true)
    }

    fn skip_comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.bump();
        }
    }

    fn check_brackets_closed(&self) -> Result<(), SyntaxError> {
        match self.brackets.last() {
            Some(&(_, line, column)) => Err(SyntaxError::incomplete(
                NeedMoreReason::UnclosedBracket,
                line,
                column,
            )),
            None => Ok(()),
        }
    }

    fn name(&mut self) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column());
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let word = &self.src[start..self.pos];
        if matches!(self.peek(), Some('\'') | Some('"')) {
            let lower = word.to_ascii_lowercase();
            if matches!(lower.as_str(), "r" | "u" | "ur" | "b" | "br" | "rb") {
                return self.string_from(start, line, column, lower.contains('r'));
            }
        }
        let word = word.to_string();
        self.push(TokenKind::Name(word), start, line, column);
        Ok(())
    }

    fn string(&mut self, raw: bool) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column());
        self.string_from(start, line, column, raw)
    }

    fn string_from(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
        raw: bool,
    ) -> Result<(), SyntaxError> {
        let quote = match self.bump() {
            Some(q) => q,
            None => return Err(self.invalid("invalid syntax")),
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(if triple {
                    SyntaxError::incomplete(NeedMoreReason::UnterminatedTripleQuote, line, column)
                } else {
                    SyntaxError::invalid("EOL while scanning string literal", line, column)
                });
            };
            match c {
                '\n' if !triple => {
                    return Err(SyntaxError::invalid(
                        "EOL while scanning string literal",
                        line,
                        column,
                    ))
                }
                '\\' => {
                    let Some(next) = self.bump() else {
                        return Err(self.incomplete(if triple {
                            NeedMoreReason::UnterminatedTripleQuote
                        } else {
                            NeedMoreReason::TrailingBackslash
                        }));
                    };
                    if raw {
                        value.push('\\');
                        value.push(next);
                    } else {
                        self.escape(next, &mut value)?;
                    }
                }
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                }
                c => value.push(c),
            }
        }

        // Adjacent literals concatenate into one token.
        if let Some(Token {
            kind: TokenKind::Str(prev),
            ..
        }) = self.tokens.last_mut()
        {
            prev.push_str(&value);
            return Ok(());
        }
        self.push(TokenKind::Str(value), start, line, column);
        Ok(())
    }

    fn escape(&mut self, next: char, value: &mut String) -> Result<(), SyntaxError> {
        match next {
            '\n' => {}
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0' => value.push('\0'),
            'a' => value.push('\x07'),
            'b' => value.push('\x08'),
            'f' => value.push('\x0c'),
            'v' => value.push('\x0b'),
            '\\' | '\'' | '"' => value.push(next),
            'x' | 'u' => {
                let width = if next == 'x' { 2 } else { 4 };
                let mut digits = String::new();
                for _ in 0..width {
                    match self.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            digits.push(d);
                            self.bump();
                        }
                        _ => return Err(self.invalid("truncated escape sequence")),
                    }
                }
                let code = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.invalid("invalid escape sequence"))?;
                value.push(code);
            }
            other => {
                value.push('\\');
                value.push(other);
            }
        }
        Ok(())
    }

    fn number(&mut self) -> Result<(), SyntaxError> {
        let (start, line, column) = (self.pos, self.line, self.column());

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.bump();
                self.bump();
                let digits_start = self.pos;
                while self.peek().is_some_and(|c| c.is_digit(radix) || c == '_') {
                    self.bump();
                }
                let digits = self.src[digits_start..self.pos].replace('_', "");
                let value = i64::from_str_radix(&digits, radix)
                    .map_err(|_| SyntaxError::invalid("invalid integer literal", line, column))?;
                self.check_number_end()?;
                self.push(TokenKind::Int(value), start, line, column);
                return Ok(());
            }
        }

        let mut is_float = false;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..digit_at {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        self.check_number_end()?;

        let text = self.src[start..self.pos].replace('_', "");
        let kind = if is_float {
            TokenKind::Float(
                text.parse()
                    .map_err(|_| SyntaxError::invalid("invalid float literal", line, column))?,
            )
        } else {
            TokenKind::Int(
                text.parse()
                    .map_err(|_| SyntaxError::invalid("integer literal too large", line, column))?,
            )
        };
        self.push(kind, start, line, column);
        Ok(())
    }

    fn check_number_end(&self) -> Result<(), SyntaxError> {
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            Err(self.invalid("invalid syntax"))
        } else {
            Ok(())
        }
    }

    fn operator(&mut self) -> Result<(), SyntaxError> {
        let rest = &self.src[self.pos..];
        let Some(op) = OPERATORS.iter().copied().find(|op| rest.starts_with(op)) else {
            return Err(self.invalid("invalid character"));
        };
        let (start, line, column) = (self.pos, self.line, self.column());

        match op {
            "(" | "[" | "{" => {
                if self.brackets.len() >= MAX_BRACKET_DEPTH {
                    return Err(self.invalid("too many nested parentheses"));
                }
                let open = op.chars().next().unwrap_or('(');
                self.brackets.push((open, line, column));
            }
            ")" | "]" | "}" => {
                let expected = match op {
                    ")" => '(',
                    "]" => '[',
                    _ => '{',
                };
                match self.brackets.pop() {
                    Some((open, _, _)) if open == expected => {}
                    _ => return Err(self.invalid("invalid syntax")),
                }
            }
            _ => {}
        }

        self.pos += op.len();
        self.push(TokenKind::Op(op), start, line, column);
        Ok(())
    }

    fn finish(mut self, terminated: bool) -> Vec<Token> {
        if !self.at_line_start {
            self.push_here(TokenKind::Newline);
        }
        if terminated {
            while self.indents.len() > 1 {
                self.indents.pop();
                self.push_here(TokenKind::Dedent);
            }
        }
        self.push_here(TokenKind::EndMarker);
        self.tokens
    }
}

// ========== Highlighting scan ==========

/// Lexical class of a highlighting span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Keyword,
    Name,
    Number,
    Str,
    Comment,
    Op,
}

/// A token with its position in the original input string.
/// Used by the syntax highlighter to map tokens back to byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenWithPosition {
    pub text: String,
    pub class: TokenClass,
    /// Byte offset of the start of this token in the original input.
    pub position: usize,
}

/// Scan a single line into highlight spans. Never fails: unterminated
/// strings run to the end of the line.
pub fn tokenize_with_positions(line: &str) -> Vec<TokenWithPosition> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let class = if c == '#' {
            while chars.next().is_some() {}
            TokenClass::Comment
        } else if c == '\'' || c == '"' {
            chars.next();
            scan_string_body(line, start + 1, c, &mut chars);
            TokenClass::Str
        } else if c.is_ascii_digit() {
            while chars
                .peek()
                .is_some_and(|&(_, d)| d.is_ascii_alphanumeric() || d == '.' || d == '_')
            {
                chars.next();
            }
            TokenClass::Number
        } else if c.is_alphabetic() || c == '_' {
            while chars.peek().is_some_and(|&(_, d)| d.is_alphanumeric() || d == '_') {
                chars.next();
            }
            let end = chars.peek().map_or(line.len(), |&(i, _)| i);
            let word = &line[start..end];
            match chars.peek() {
                Some(&(_, q)) if (q == '\'' || q == '"') && word.len() <= 2 && is_prefix(word) => {
                    chars.next();
                    scan_string_body(line, end + 1, q, &mut chars);
                    TokenClass::Str
                }
                _ if is_keyword(word) => TokenClass::Keyword,
                _ => TokenClass::Name,
            }
        } else {
            chars.next();
            TokenClass::Op
        };

        let end = chars.peek().map_or(line.len(), |&(i, _)| i);
        tokens.push(TokenWithPosition {
            text: line[start..end].to_string(),
            class,
            position: start,
        });
    }

    tokens
}

fn is_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "ur" | "b" | "br" | "rb"
    )
}

fn scan_string_body(
    line: &str,
    body_start: usize,
    quote: char,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) {
    let triple = line[body_start..].starts_with(&format!("{quote}{quote}"));
    if triple {
        chars.next();
        chars.next();
    }
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            if !triple {
                return;
            }
            if line[i + 1..].starts_with(&format!("{quote}{quote}")) {
                chars.next();
                chars.next();
                return;
            }
        }
    }
}
