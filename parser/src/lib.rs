pub mod ast;
pub mod lexer;

use std::{
    collections::HashMap,
    mem::{self, Discriminant},
};

use ast::BinaryOperator;
use thiserror::Error;

use crate::lexer::{Lexer, LexerError, Loc, Token, TokenKind};

#[derive(PartialEq, PartialOrd)]
enum Precedence {
    Lowest = 0,
    Or,
    And,
    Equal,
    Ordered, // < <= > >=
    Sum,
    Product,
    Prefix,
}

impl Precedence {
    pub fn from_token(token: &TokenKind) -> Option<Self> {
        Some(match token {
            TokenKind::Plus => Self::Sum,
            TokenKind::Minus => Self::Sum,
            TokenKind::Asterisk => Self::Product,
            TokenKind::Slash => Self::Product,
            TokenKind::Or => Self::Or,
            TokenKind::And => Self::And,
            TokenKind::Equal | TokenKind::NotEqual => Self::Equal,
            TokenKind::LessThan
            | TokenKind::LessOrEqual
            | TokenKind::GreaterThan
            | TokenKind::GreaterOrEqual => Self::Ordered,
            _ => return None,
        })
    }
}

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("{0}")]
    LexerError(#[from] LexerError),
    #[error("Unexpected Token, expected: \"{expected:?}\", actual: \"{actual:?}\"")]
    UnexpectedToken { expected: TokenKind, actual: Token },
    #[error("Unexpected Token, expected one of: {expected:?}, actual: \"{actual:?}\"")]
    UnexpectedTokens {
        expected: Vec<TokenKind>,
        actual: Token,
    },
    #[error("Could not find a prefix function for \"{0:?}\".")]
    NoPrefixFunction(Token),
    #[error("Array sizes must be positive integer constants. Got \"{0:?}\"")]
    InvalidArraySize(Token),
    #[error("The left side of an assignment must be a variable or an array element. Got \"{0:?}\"")]
    InvalidAssignmentTarget(Token),
}

type PrefixFunction = fn(&mut Parser) -> Result<ast::Expression, ParserError>;
type InfixFunction = fn(&mut Parser, ast::Expression) -> Result<ast::Expression, ParserError>;

#[derive(Debug)]
pub struct Parser {
    lexer: Lexer,
    cur_token: Token,
    peek_token: Token,

    prefix_functions: HashMap<Discriminant<TokenKind>, PrefixFunction>,
    infix_functions: HashMap<Discriminant<TokenKind>, InfixFunction>,
}

impl Parser {
    pub fn try_build(lexer: Lexer) -> Result<Self, ParserError> {
        let mut parser = Self {
            lexer,
            cur_token: Token {
                kind: TokenKind::Eof,
                loc: Loc { line: 0, column: 0 },
            },
            peek_token: Token {
                kind: TokenKind::Eof,
                loc: Loc { line: 0, column: 0 },
            },
            prefix_functions: HashMap::new(),
            infix_functions: HashMap::new(),
        };
        // Prefix
        parser.register_prefix(&TokenKind::IntConstant(1), Self::parse_constant);
        parser.register_prefix(&TokenKind::FloatConstant(1.0), Self::parse_constant);
        parser.register_prefix(&TokenKind::BoolConstant(true), Self::parse_constant);
        parser.register_prefix(&TokenKind::StringConstant(String::new()), Self::parse_constant);
        parser.register_prefix(&TokenKind::Minus, Self::parse_unary);
        parser.register_prefix(&TokenKind::Not, Self::parse_unary);
        parser.register_prefix(&TokenKind::OpenParen, Self::parse_grouped_expression);
        parser.register_prefix(
            &TokenKind::Identifier(String::new()),
            Self::parse_identifier,
        );

        // Infix
        parser.register_infix(&TokenKind::Plus, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::Minus, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::Asterisk, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::Slash, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::Or, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::And, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::LessThan, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::LessOrEqual, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::GreaterThan, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::GreaterOrEqual, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::Equal, Self::parse_binary_expression);
        parser.register_infix(&TokenKind::NotEqual, Self::parse_binary_expression);

        parser.next_token()?;
        parser.next_token()?;

        Ok(parser)
    }

    fn next_token(&mut self) -> Result<Token, LexerError> {
        let old_peek_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token()?);
        Ok(std::mem::replace(&mut self.cur_token, old_peek_token))
    }

    fn register_prefix(&mut self, token: &TokenKind, func: PrefixFunction) {
        self.prefix_functions.insert(mem::discriminant(token), func);
    }

    fn register_infix(&mut self, token: &TokenKind, func: InfixFunction) {
        self.infix_functions.insert(mem::discriminant(token), func);
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), ParserError> {
        if mem::discriminant(&expected) == mem::discriminant(&self.cur_token.kind) {
            Ok(())
        } else {
            Err(ParserError::UnexpectedToken {
                expected,
                actual: self.cur_token.clone(),
            })
        }
    }

    fn expect_peek(&mut self, expected: TokenKind) -> Result<(), ParserError> {
        if mem::discriminant(&expected) == mem::discriminant(&self.peek_token.kind) {
            self.next_token()?;
            Ok(())
        } else {
            Err(ParserError::UnexpectedToken {
                expected,
                actual: self.peek_token.clone(),
            })
        }
    }

    fn peek_token_is(&self, token: TokenKind) -> bool {
        mem::discriminant(&self.peek_token.kind) == mem::discriminant(&token)
    }

    fn cur_token_is(&self, token: TokenKind) -> bool {
        mem::discriminant(&self.cur_token.kind) == mem::discriminant(&token)
    }

    fn peek_precedence(&self) -> Precedence {
        Precedence::from_token(&self.peek_token.kind).unwrap_or(Precedence::Lowest)
    }

    fn cur_precedence(&self) -> Precedence {
        Precedence::from_token(&self.cur_token.kind).unwrap_or(Precedence::Lowest)
    }

    pub fn parse_program(&mut self) -> Result<ast::Program, ParserError> {
        let mut functions = vec![];

        while !self.cur_token_is(TokenKind::Eof) {
            functions.push(self.parse_function()?);
            self.next_token()?;
        }

        Ok(ast::Program { functions })
    }

    // Expects to be on the return type.
    fn parse_function(&mut self) -> Result<ast::Function, ParserError> {
        let return_type = match &self.cur_token.kind {
            TokenKind::KWVoid => None,
            _ => Some(self.parse_type()?),
        };

        self.expect_peek(TokenKind::Identifier(String::new()))?;
        let name = match &self.cur_token.kind {
            TokenKind::Identifier(content) => content.clone(),
            _ => unreachable!(),
        };

        self.expect_peek(TokenKind::OpenParen)?;
        let params = self.parse_param_list()?;

        self.expect_peek(TokenKind::OpenBrace)?;
        let body = self.parse_block()?;

        Ok(ast::Function {
            return_type,
            name,
            params,
            body,
        })
    }

    fn parse_type(&self) -> Result<ast::Type, ParserError> {
        match &self.cur_token.kind {
            TokenKind::KWBool => Ok(ast::Type::Bool),
            TokenKind::KWInt => Ok(ast::Type::Int),
            TokenKind::KWFloat => Ok(ast::Type::Float),
            TokenKind::KWString => Ok(ast::Type::String),
            _ => Err(ParserError::UnexpectedTokens {
                expected: vec![
                    TokenKind::KWBool,
                    TokenKind::KWInt,
                    TokenKind::KWFloat,
                    TokenKind::KWString,
                ],
                actual: self.cur_token.clone(),
            }),
        }
    }

    // Expects to be on (
    fn parse_param_list(&mut self) -> Result<Vec<ast::Param>, ParserError> {
        let mut params = vec![];

        if self.peek_token_is(TokenKind::CloseParen) {
            self.next_token()?;
            return Ok(params);
        }

        loop {
            self.next_token()?;
            let ty = self.parse_type()?;
            self.expect_peek(TokenKind::Identifier(String::new()))?;
            let name = match &self.cur_token.kind {
                TokenKind::Identifier(content) => content.clone(),
                _ => unreachable!(),
            };
            params.push(ast::Param { ty, name });

            match &self.peek_token.kind {
                TokenKind::Comma => {
                    self.next_token()?;
                }
                TokenKind::CloseParen => {
                    self.next_token()?;
                    return Ok(params);
                }
                _ => {
                    return Err(ParserError::UnexpectedTokens {
                        expected: vec![TokenKind::Comma, TokenKind::CloseParen],
                        actual: self.peek_token.clone(),
                    })
                }
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<ast::Statement>, ParserError> {
        let mut body: Vec<ast::Statement> = vec![];
        while !self.peek_token_is(TokenKind::CloseBrace) {
            self.next_token()?;
            body.push(self.parse_statement()?);
        }
        self.next_token()?; // Eat CloseBrace
                            // }
                            // ^
        Ok(body)
    }

    // Statements

    fn parse_statement(&mut self) -> Result<ast::Statement, ParserError> {
        match &self.cur_token.kind {
            TokenKind::KWBool | TokenKind::KWInt | TokenKind::KWFloat | TokenKind::KWString => {
                self.parse_declaration_statement()
            }
            TokenKind::KWIf => self.parse_if_statement(),
            TokenKind::KWWhile => self.parse_while_statement(),
            TokenKind::KWReturn => self.parse_return_statement(),
            TokenKind::OpenBrace => self.parse_compound_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    // Expects to be on the type keyword.
    fn parse_declaration_statement(&mut self) -> Result<ast::Statement, ParserError> {
        let ty = self.parse_type()?;

        let size = if self.peek_token_is(TokenKind::OpenBracket) {
            self.next_token()?;
            self.expect_peek(TokenKind::IntConstant(0))?;
            let count = match self.cur_token.kind {
                TokenKind::IntConstant(val) => val,
                _ => unreachable!(),
            };
            if count < 1 {
                return Err(ParserError::InvalidArraySize(self.cur_token.clone()));
            }
            self.expect_peek(TokenKind::CloseBracket)?;
            Some(count as usize)
        } else {
            None
        };

        self.expect_peek(TokenKind::Identifier(String::new()))?;
        let name = match &self.cur_token.kind {
            TokenKind::Identifier(content) => content.clone(),
            _ => unreachable!(),
        };
        self.expect_peek(TokenKind::Semicolon)?;

        Ok(ast::Statement::Declaration(ast::Declaration {
            ty,
            size,
            name,
        }))
    }

    // Parses both expression statements and assignments. Which one it is
    // only becomes clear once the expression in front of a possible '='
    // has been consumed.
    fn parse_expression_statement(&mut self) -> Result<ast::Statement, ParserError> {
        let expr = self.parse_expression(Precedence::Lowest)?;

        if self.peek_token_is(TokenKind::Assign) {
            let (name, index) = match expr {
                ast::Expression::Var(name) => (name, None),
                ast::Expression::ArrayElement { name, index } => (name, Some(*index)),
                _ => {
                    return Err(ParserError::InvalidAssignmentTarget(
                        self.peek_token.clone(),
                    ))
                }
            };
            self.next_token()?;
            self.next_token()?;
            let value = self.parse_expression(Precedence::Lowest)?;
            self.expect_peek(TokenKind::Semicolon)?;
            return Ok(ast::Statement::Assignment(ast::Assignment {
                name,
                index,
                value,
            }));
        }

        self.expect_peek(TokenKind::Semicolon)?;
        Ok(ast::Statement::Expression(expr))
    }

    fn parse_while_statement(&mut self) -> Result<ast::Statement, ParserError> {
        self.expect_peek(TokenKind::OpenParen)?;
        self.next_token()?;
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::CloseParen)?;
        self.next_token()?;
        let stmt = self.parse_statement()?;
        Ok(ast::Statement::While {
            condition: expr,
            body: Box::new(stmt),
        })
    }

    fn parse_return_statement(&mut self) -> Result<ast::Statement, ParserError> {
        if self.peek_token_is(TokenKind::Semicolon) {
            self.next_token()?;
            return Ok(ast::Statement::Return(None));
        }

        self.next_token()?;
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::Semicolon)?;

        Ok(ast::Statement::Return(Some(expr)))
    }

    fn parse_compound_statement(&mut self) -> Result<ast::Statement, ParserError> {
        let block = self.parse_block()?;
        Ok(ast::Statement::Compound(block))
    }

    fn parse_if_statement(&mut self) -> Result<ast::Statement, ParserError> {
        self.expect_peek(TokenKind::OpenParen)?;
        self.next_token()?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::CloseParen)?;
        self.next_token()?;
        let stmt = self.parse_statement()?;

        let else_stmt = match self.peek_token.kind {
            TokenKind::KWElse => {
                self.next_token()?;
                self.next_token()?;
                Some(Box::new(self.parse_statement()?))
            }
            _ => None,
        };

        Ok(ast::Statement::If {
            condition,
            then: Box::new(stmt),
            r#else: else_stmt,
        })
    }

    // Expressions

    fn parse_expression(&mut self, precedence: Precedence) -> Result<ast::Expression, ParserError> {
        let prefix = self
            .prefix_functions
            .get(&mem::discriminant(&self.cur_token.kind));

        match prefix {
            Some(prefix) => {
                let mut left_exp = prefix(self)?;

                while !self.peek_token_is(TokenKind::Semicolon)
                    && precedence < self.peek_precedence()
                {
                    if self
                        .infix_functions
                        .contains_key(&mem::discriminant(&self.peek_token.kind))
                    {
                        self.next_token()?;
                        left_exp = self.infix_functions[&mem::discriminant(&self.cur_token.kind)](
                            self, left_exp,
                        )?;
                    } else {
                        return Ok(left_exp);
                    }
                }

                Ok(left_exp)
            }
            None => Err(ParserError::NoPrefixFunction(self.cur_token.clone())),
        }
    }

    fn parse_binary_expression(
        &mut self,
        left: ast::Expression,
    ) -> Result<ast::Expression, ParserError> {
        let bin = match &self.cur_token.kind {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Subtract,
            TokenKind::Asterisk => BinaryOperator::Multiply,
            TokenKind::Slash => BinaryOperator::Divide,
            TokenKind::And => BinaryOperator::And,
            TokenKind::Or => BinaryOperator::Or,
            TokenKind::Equal => BinaryOperator::Equal,
            TokenKind::NotEqual => BinaryOperator::NotEqual,
            TokenKind::LessThan => BinaryOperator::LessThan,
            TokenKind::LessOrEqual => BinaryOperator::LessOrEqual,
            TokenKind::GreaterThan => BinaryOperator::GreaterThan,
            TokenKind::GreaterOrEqual => BinaryOperator::GreaterOrEqual,
            _ => {
                unreachable!("Wrong token passed to parse_binary_expression, should not happen. Offending Token: {:?}", &self.cur_token)
            }
        };

        let precedence = self.cur_precedence();
        self.next_token()?;
        let right = self.parse_expression(precedence)?;

        Ok(ast::Expression::Binary {
            op: bin,
            lhs: Box::new(left),
            rhs: Box::new(right),
        })
    }

    fn parse_constant(&mut self) -> Result<ast::Expression, ParserError> {
        match &self.cur_token.kind {
            TokenKind::IntConstant(val) => Ok(ast::Expression::IntConstant(*val)),
            TokenKind::FloatConstant(val) => Ok(ast::Expression::FloatConstant(*val)),
            TokenKind::BoolConstant(val) => Ok(ast::Expression::BoolConstant(*val)),
            TokenKind::StringConstant(val) => Ok(ast::Expression::StringConstant(val.clone())),
            _ => Err(ParserError::UnexpectedTokens {
                expected: vec![
                    TokenKind::IntConstant(0),
                    TokenKind::FloatConstant(0.0),
                    TokenKind::BoolConstant(true),
                    TokenKind::StringConstant(String::new()),
                ],
                actual: self.cur_token.clone(),
            }),
        }
    }

    fn parse_argument_list(&mut self) -> Result<Vec<ast::Expression>, ParserError> {
        self.expect(TokenKind::OpenParen)?;

        let mut args = vec![];

        if !self.peek_token_is(TokenKind::CloseParen) {
            self.next_token()?;
            loop {
                args.push(self.parse_expression(Precedence::Lowest)?);

                if self.peek_token_is(TokenKind::CloseParen) {
                    self.next_token()?;
                    break Ok(args);
                }
                self.expect_peek(TokenKind::Comma)?;
                self.next_token()?;
            }
        } else {
            self.next_token()?;
            Ok(args)
        }
    }

    fn parse_identifier(&mut self) -> Result<ast::Expression, ParserError> {
        if let TokenKind::Identifier(val) = self.cur_token.kind.clone() {
            match &self.peek_token.kind {
                TokenKind::OpenParen => {
                    self.next_token()?;
                    let args = self.parse_argument_list()?;
                    Ok(ast::Expression::FunctionCall(val, args))
                }
                TokenKind::OpenBracket => {
                    self.next_token()?;
                    self.next_token()?;
                    let index = self.parse_expression(Precedence::Lowest)?;
                    self.expect_peek(TokenKind::CloseBracket)?;
                    Ok(ast::Expression::ArrayElement {
                        name: val,
                        index: Box::new(index),
                    })
                }
                _ => Ok(ast::Expression::Var(val)),
            }
        } else {
            Err(ParserError::UnexpectedToken {
                expected: TokenKind::Identifier(String::new()),
                actual: self.cur_token.clone(),
            })
        }
    }

    fn parse_unary(&mut self) -> Result<ast::Expression, ParserError> {
        match &self.cur_token.kind {
            TokenKind::Minus => {
                self.next_token()?;
                let expr = self.parse_expression(Precedence::Prefix)?;
                Ok(ast::Expression::Unary {
                    op: ast::UnaryOperator::Negate,
                    expression: Box::new(expr),
                })
            }
            TokenKind::Not => {
                self.next_token()?;
                let expr = self.parse_expression(Precedence::Prefix)?;
                Ok(ast::Expression::Unary {
                    op: ast::UnaryOperator::Not,
                    expression: Box::new(expr),
                })
            }
            _ => unreachable!("Wrong token passed to parse_unary, should not happen."),
        }
    }

    fn parse_grouped_expression(&mut self) -> Result<ast::Expression, ParserError> {
        self.next_token()?;

        let expr = self.parse_expression(Precedence::Lowest)?;

        self.expect_peek(TokenKind::CloseParen)?;

        Ok(expr)
    }
}
