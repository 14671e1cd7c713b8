use std::vec::IntoIter;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, PartialOrd)]
pub enum LexerError {
    #[error("The character '{0}' could not be represented")]
    UnknownCharacter(char),
    #[error("Could not convert the number \"{0}\" to a number.")]
    InvalidNumber(String),
    #[error("Identifiers can not start with numbers.")]
    IdentifierStartedWithNumber,
    #[error("The string literal is missing its closing quote.")]
    UnterminatedString,
    #[error("A block comment is missing its closing \"*/\".")]
    UnterminatedBlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub line: usize,
    pub column: usize,
}

#[derive(PartialEq, PartialOrd, Debug, Clone)]
pub enum TokenKind {
    Eof,
    Identifier(String),
    IntConstant(i32),
    FloatConstant(f64),
    BoolConstant(bool),
    StringConstant(String),

    OpenParen,    // (
    CloseParen,   // )
    OpenBrace,    // {
    CloseBrace,   // }
    OpenBracket,  // [
    CloseBracket, // ]
    Semicolon,    // ;
    Comma,        // ,

    // Operator
    Assign,         // =
    Minus,          // -
    Plus,           // +
    Asterisk,       // *
    Slash,          // /
    Not,            // !
    And,            // &&
    Or,             // ||
    Equal,          // ==
    NotEqual,       // !=
    LessThan,       // <
    GreaterThan,    // >
    LessOrEqual,    // <=
    GreaterOrEqual, // >=

    // Keywords
    KWBool,
    KWInt,
    KWFloat,
    KWString,
    KWVoid,
    KWIf,
    KWElse,
    KWWhile,
    KWReturn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

impl TokenKind {
    pub fn from_string(string: &str) -> Self {
        match string {
            "bool" => Self::KWBool,
            "int" => Self::KWInt,
            "float" => Self::KWFloat,
            "string" => Self::KWString,
            "void" => Self::KWVoid,
            "if" => Self::KWIf,
            "else" => Self::KWElse,
            "while" => Self::KWWhile,
            "return" => Self::KWReturn,
            "true" => Self::BoolConstant(true),
            "false" => Self::BoolConstant(false),
            _ => Self::Identifier(string.to_owned()),
        }
    }
}

#[derive(Debug)]
pub struct Lexer {
    _input: String,
    chars: IntoIter<char>,
    loc: Loc,

    ch: char,
    peek_ch: char,
}

impl Lexer {
    pub fn new(input: String) -> Self {
        let mut lexer = Self {
            chars: input.chars().collect::<Vec<_>>().into_iter(),
            _input: input,
            ch: '\0',
            peek_ch: '\0',

            loc: Loc { column: 0, line: 1 },
        };

        lexer.peek_ch = lexer.chars.next().unwrap_or('\0');
        lexer.read_char();
        lexer
    }

    fn peek_char(&self) -> char {
        self.peek_ch
    }

    fn is_digit(&self) -> bool {
        self.ch.is_ascii_digit()
    }

    fn is_valid_identifier_char(&self) -> bool {
        match self.ch {
            'a'..='z' => true,
            'A'..='Z' => true,
            '_' => true,
            _ => self.is_digit(),
        }
    }

    fn read_char(&mut self) {
        if self.ch == '\n' {
            self.loc.column = 0;
            self.loc.line += 1;
        }
        self.ch = self.peek_ch;
        self.peek_ch = self.chars.next().unwrap_or('\0');
        self.loc.column += 1;
    }

    /// Skips whitespace plus `//` and `/* */` comments.
    fn skip_trivia(&mut self) -> Result<(), LexerError> {
        loop {
            while self.ch == ' ' || self.ch == '\n' || self.ch == '\r' || self.ch == '\t' {
                self.read_char();
            }

            if self.ch == '/' && self.peek_ch == '/' {
                while self.ch != '\n' && self.ch != '\0' {
                    self.read_char();
                }
                continue;
            }

            if self.ch == '/' && self.peek_ch == '*' {
                self.read_char();
                self.read_char();
                loop {
                    if self.ch == '\0' {
                        return Err(LexerError::UnterminatedBlockComment);
                    }
                    if self.ch == '*' && self.peek_ch == '/' {
                        self.read_char();
                        self.read_char();
                        break;
                    }
                    self.read_char();
                }
                continue;
            }

            return Ok(());
        }
    }

    fn read_constant(&mut self) -> Result<Token, LexerError> {
        let old_loc = self.loc;
        let mut string = String::new();

        while self.is_digit() {
            string.push(self.ch);
            self.read_char();
        }

        // A '.' with a digit behind it makes this a float constant.
        if self.ch == '.' && self.peek_char().is_ascii_digit() {
            string.push(self.ch);
            self.read_char();
            while self.is_digit() {
                string.push(self.ch);
                self.read_char();
            }

            if self.is_valid_identifier_char() {
                return Err(LexerError::IdentifierStartedWithNumber);
            }

            let num: f64 = string
                .parse()
                .or(Err(LexerError::InvalidNumber(string.to_owned())))?;

            return Ok(Token {
                kind: TokenKind::FloatConstant(num),
                loc: old_loc,
            });
        }

        if self.is_valid_identifier_char() {
            return Err(LexerError::IdentifierStartedWithNumber);
        }

        let num: i32 = string
            .parse()
            .or(Err(LexerError::InvalidNumber(string.to_owned())))?;

        Ok(Token {
            kind: TokenKind::IntConstant(num),
            loc: old_loc,
        })
    }

    fn read_identifier(&mut self) -> Token {
        let old_loc = self.loc;
        let mut string = String::new();

        while self.is_valid_identifier_char() {
            string.push(self.ch);
            self.read_char();
        }
        Token {
            kind: TokenKind::from_string(&string),
            loc: old_loc,
        }
    }

    // Expects to sit on the opening quote.
    fn read_string(&mut self) -> Result<Token, LexerError> {
        let old_loc = self.loc;
        let mut string = String::new();

        self.read_char();
        while self.ch != '"' {
            if self.ch == '\0' {
                return Err(LexerError::UnterminatedString);
            }
            if self.ch == '\\' {
                self.read_char();
                string.push(match self.ch {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            } else {
                string.push(self.ch);
            }
            self.read_char();
        }
        self.read_char();

        Ok(Token {
            kind: TokenKind::StringConstant(string),
            loc: old_loc,
        })
    }

    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_trivia()?;

        let old_loc = self.loc;

        let result = match self.ch {
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Asterisk,
            '/' => TokenKind::Slash,
            '&' => match self.peek_char() {
                '&' => {
                    self.read_char();
                    TokenKind::And
                }
                _ => return Err(LexerError::UnknownCharacter(self.ch)),
            },
            '|' => match self.peek_char() {
                '|' => {
                    self.read_char();
                    TokenKind::Or
                }
                _ => return Err(LexerError::UnknownCharacter(self.ch)),
            },
            '!' => match self.peek_char() {
                '=' => {
                    self.read_char();
                    TokenKind::NotEqual
                }
                _ => TokenKind::Not,
            },
            '<' => match self.peek_char() {
                '=' => {
                    self.read_char();
                    TokenKind::LessOrEqual
                }
                _ => TokenKind::LessThan,
            },
            '>' => match self.peek_char() {
                '=' => {
                    self.read_char();
                    TokenKind::GreaterOrEqual
                }
                _ => TokenKind::GreaterThan,
            },
            '=' => {
                if self.peek_char() == '=' {
                    self.read_char();
                    TokenKind::Equal
                } else {
                    TokenKind::Assign
                }
            }
            '"' => return self.read_string(),
            '\0' => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    loc: self.loc,
                })
            }
            _ => {
                if self.is_digit() {
                    return self.read_constant();
                } else if self.is_valid_identifier_char() {
                    return Ok(self.read_identifier());
                }

                return Err(LexerError::UnknownCharacter(self.ch));
            }
        };

        self.read_char();
        Ok(Token {
            kind: result,
            loc: old_loc,
        })
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();

        if let Ok(ref tok) = token {
            if let TokenKind::Eof = tok.kind {
                return None;
            }
        }

        Some(token)
    }
}
