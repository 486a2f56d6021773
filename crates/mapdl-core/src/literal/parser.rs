use super::{LiteralDocument, LiteralError, Value};

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Punct(char),
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{}'", name),
            Self::Str(_) => "string literal".to_string(),
            Self::Int(value) => format!("integer {}", value),
            Self::Float(value) => format!("number {}", value),
            Self::Punct(ch) => format!("'{}'", ch),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    line: usize,
}

const PUNCTUATION: [char; 10] = ['[', ']', '{', '}', '(', ')', ':', ',', '=', '.'];

fn tokenize(source: &str) -> Result<Vec<Token>, LiteralError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        match ch {
            '\n' => {
                line += 1;
                index += 1;
            }
            c if c.is_whitespace() => index += 1,
            '#' | '!' => {
                while index < chars.len() && chars[index] != '\n' {
                    index += 1;
                }
            }
            '\'' | '"' => {
                let (text, next) = read_string(&chars, index, line)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    line,
                });
                index = next;
            }
            c if c.is_ascii_digit() || starts_signed_number(&chars, index) => {
                let (kind, next) = read_number(&chars, index, line)?;
                tokens.push(Token { kind, line });
                index = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = index;
                while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_')
                {
                    index += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..index].iter().collect()),
                    line,
                });
            }
            c if PUNCTUATION.contains(&c) => {
                tokens.push(Token {
                    kind: TokenKind::Punct(c),
                    line,
                });
                index += 1;
            }
            other => return Err(LiteralError::UnexpectedChar { line, ch: other }),
        }
    }

    Ok(tokens)
}

fn starts_signed_number(chars: &[char], index: usize) -> bool {
    let ch = chars[index];
    let next = chars.get(index + 1).copied();
    match ch {
        '-' | '+' => matches!(next, Some(c) if c.is_ascii_digit() || c == '.'),
        '.' => matches!(next, Some(c) if c.is_ascii_digit()),
        _ => false,
    }
}

fn read_string(chars: &[char], start: usize, line: usize) -> Result<(String, usize), LiteralError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut index = start + 1;
    while index < chars.len() {
        let ch = chars[index];
        if ch == quote {
            return Ok((text, index + 1));
        }
        if ch == '\n' {
            break;
        }
        if ch == '\\' {
            if let Some(escaped) = chars.get(index + 1) {
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                index += 2;
                continue;
            }
        }
        text.push(ch);
        index += 1;
    }
    Err(LiteralError::UnterminatedString { line })
}

fn read_number(chars: &[char], start: usize, line: usize) -> Result<(TokenKind, usize), LiteralError> {
    let mut index = start;
    if matches!(chars[index], '-' | '+') {
        index += 1;
    }
    let mut is_float = false;
    while index < chars.len() {
        let ch = chars[index];
        if ch.is_ascii_digit() {
            index += 1;
        } else if ch == '.' {
            is_float = true;
            index += 1;
        } else if matches!(ch, 'e' | 'E') {
            is_float = true;
            index += 1;
            if index < chars.len() && matches!(chars[index], '-' | '+') {
                index += 1;
            }
        } else {
            break;
        }
    }

    let text: String = chars[start..index].iter().collect();
    let kind = if is_float {
        text.parse::<f64>().map(TokenKind::Float)
            .map_err(|_| LiteralError::InvalidNumber { line, text: text.clone() })?
    } else {
        match text.parse::<i64>() {
            Ok(value) => TokenKind::Int(value),
            // Integers wider than i64 still carry a usable magnitude.
            Err(_) => text
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| LiteralError::InvalidNumber { line, text: text.clone() })?,
        }
    };
    Ok((kind, index))
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn next(&mut self, expected: &'static str) -> Result<Token, LiteralError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(LiteralError::UnexpectedEnd { expected })?;
        self.position += 1;
        Ok(token)
    }

    fn at_punct(&self, punct: char) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Punct(p), .. }) if *p == punct)
    }

    fn at_ident(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Ident(name), .. }) if name == keyword)
    }

    fn expect_punct(&mut self, punct: char, expected: &'static str) -> Result<(), LiteralError> {
        let token = self.next(expected)?;
        match token.kind {
            TokenKind::Punct(p) if p == punct => Ok(()),
            other => Err(LiteralError::UnexpectedToken {
                line: token.line,
                expected,
                found: other.describe(),
            }),
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, LiteralError> {
        let token = self.next(expected)?;
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(LiteralError::UnexpectedToken {
                line: token.line,
                expected,
                found: other.describe(),
            }),
        }
    }

    fn document(&mut self) -> Result<LiteralDocument, LiteralError> {
        let mut document = LiteralDocument::default();

        if self.at_ident("class") {
            self.position += 1;
            document.class_name = Some(self.expect_ident("class name")?);
            if self.at_punct('(') {
                self.position += 1;
                while !self.at_punct(')') {
                    self.next("')' closing base class list")?;
                }
                self.position += 1;
            }
            self.expect_punct(':', "':' after class header")?;
        }

        if self.at_ident("def") {
            self.position += 1;
            self.expect_ident("constructor name")?;
            self.expect_punct('(', "'(' in constructor header")?;
            self.expect_ident("receiver name")?;
            self.expect_punct(')', "')' in constructor header")?;
            self.expect_punct(':', "':' after constructor header")?;
        }

        while self.peek().is_some() {
            let (name, value) = self.assignment()?;
            document.fields.push((name, value));
        }

        Ok(document)
    }

    fn assignment(&mut self) -> Result<(String, Value), LiteralError> {
        let mut name = self.expect_ident("field assignment")?;
        let is_member = matches!(
            self.peek(),
            Some(Token { kind: TokenKind::Punct('.'), .. })
        ) && matches!(self.peek_at(1), Some(Token { kind: TokenKind::Ident(_), .. }));
        if is_member {
            self.position += 1;
            name = self.expect_ident("field name")?;
        }
        self.expect_punct('=', "'=' in field assignment")?;
        let value = self.value()?;
        Ok((name, value))
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        let token = self.next("literal value")?;
        match token.kind {
            TokenKind::Str(text) => Ok(Value::Str(text)),
            TokenKind::Int(value) => Ok(Value::Int(value)),
            TokenKind::Float(value) => Ok(Value::Float(value)),
            TokenKind::Ident(name) => match name.as_str() {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                "None" => Ok(Value::None),
                _ => Err(LiteralError::UnexpectedToken {
                    line: token.line,
                    expected: "literal value",
                    found: format!("identifier '{}'", name),
                }),
            },
            TokenKind::Punct('[') => Ok(Value::List(self.sequence(']')?)),
            TokenKind::Punct('(') => Ok(Value::List(self.sequence(')')?)),
            TokenKind::Punct('{') => self.mapping(),
            other => Err(LiteralError::UnexpectedToken {
                line: token.line,
                expected: "literal value",
                found: other.describe(),
            }),
        }
    }

    fn sequence(&mut self, close: char) -> Result<Vec<Value>, LiteralError> {
        let mut items = Vec::new();
        loop {
            if self.at_punct(close) {
                self.position += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            if self.at_punct(',') {
                self.position += 1;
            } else if !self.at_punct(close) {
                let expected = if close == ']' {
                    "',' or ']' in list"
                } else {
                    "',' or ')' in tuple"
                };
                return Err(self.unexpected(expected));
            }
        }
    }

    fn mapping(&mut self) -> Result<Value, LiteralError> {
        let mut entries = Vec::new();
        loop {
            if self.at_punct('}') {
                self.position += 1;
                return Ok(Value::Map(entries));
            }
            let key = self.value()?;
            self.expect_punct(':', "':' after mapping key")?;
            let value = self.value()?;
            entries.push((key, value));
            if self.at_punct(',') {
                self.position += 1;
            } else if !self.at_punct('}') {
                return Err(self.unexpected("',' or '}' in mapping"));
            }
        }
    }

    fn unexpected(&self, expected: &'static str) -> LiteralError {
        match self.peek() {
            Some(token) => LiteralError::UnexpectedToken {
                line: token.line,
                expected,
                found: token.kind.describe(),
            },
            None => LiteralError::UnexpectedEnd { expected },
        }
    }
}

pub(super) fn parse_document(source: &str) -> Result<LiteralDocument, LiteralError> {
    let tokens = tokenize(source)?;
    Parser {
        tokens,
        position: 0,
    }
    .document()
}

pub(super) fn parse_value(source: &str) -> Result<Value, LiteralError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let value = parser.value()?;
    if parser.peek().is_some() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(value)
}
