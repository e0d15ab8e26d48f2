//! Recursive-descent parser from significant tokens to the [`Script`] AST.
//!
//! Every parse function takes the current token position and returns the
//! position after the construct together with the parsed node.

use crate::ast::{
    AssignOp, Axis, BinaryOperator, EventHandlerDef, Expression, FunctionDef, GlobalVar, IncDecOp,
    LValue, Literal, LslType, Parameter, Script, StateDef, Statement, UnaryOperator, DEFAULT_STATE,
};
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal as TokenLiteral,
    symbol::{Delimiter, Operator},
    Token, TokenSpan,
};

use super::core::{ParseError, ParseResult};

pub struct ScriptParser<'a> {
    tokens: &'a [TokenSpan],
}

impl<'a> ScriptParser<'a> {
    /// `tokens` must already be stripped of trivia.
    pub fn new(tokens: &'a [TokenSpan]) -> Self {
        Self { tokens }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn parse(&self) -> Result<Script, ParseError> {
        let mut script = Script::default();
        let mut pos = 0;

        while pos < self.tokens.len() {
            match self.peek(pos) {
                Some(Token::Keyword(Keyword::Default)) => {
                    let (next, state) = self.parse_state_body(pos + 1)?;
                    self.insert_state(&mut script, DEFAULT_STATE, state, pos)?;
                    pos = next;
                }
                Some(Token::Keyword(Keyword::State)) => {
                    let (next, name) = self.expect_identifier(pos + 1)?;
                    let (next, state) = self.parse_state_body(next)?;
                    self.insert_state(&mut script, &name, state, pos)?;
                    pos = next;
                }
                Some(Token::Type(ty)) => {
                    let ty = *ty;
                    let (next, name) = self.expect_identifier(pos + 1)?;
                    if self.is_delimiter(next, Delimiter::OpenParen) {
                        let (next, function) = self.parse_function(next, Some(ty))?;
                        self.insert_function(&mut script, &name, function, pos)?;
                        pos = next;
                    } else {
                        let (next, init) = self.parse_initializer(next)?;
                        let next = self.expect_delimiter(next, Delimiter::Semicolon)?;
                        if script.globals.iter().any(|g| g.name == name) {
                            return Err(self.error(pos, &format!("duplicate global `{}`", name)));
                        }
                        script.globals.push(GlobalVar { name, ty, init });
                        pos = next;
                    }
                }
                Some(Token::Identifier(name)) => {
                    let name = name.clone();
                    let (next, function) = self.parse_function(pos + 1, None)?;
                    self.insert_function(&mut script, &name, function, pos)?;
                    pos = next;
                }
                _ => {
                    return Err(self.error(
                        pos,
                        "expected global variable, function or state definition",
                    ))
                }
            }
        }

        Ok(script)
    }

    fn insert_state(
        &self,
        script: &mut Script,
        name: &str,
        state: StateDef,
        pos: usize,
    ) -> Result<(), ParseError> {
        if script.states.contains_key(name) {
            return Err(self.error(pos, &format!("duplicate state `{}`", name)));
        }
        script.states.insert(name.to_string(), state);
        Ok(())
    }

    fn insert_function(
        &self,
        script: &mut Script,
        name: &str,
        function: FunctionDef,
        pos: usize,
    ) -> Result<(), ParseError> {
        if script.functions.contains_key(name) {
            return Err(self.error(pos, &format!("duplicate function `{}`", name)));
        }
        script.functions.insert(name.to_string(), function);
        Ok(())
    }

    fn parse_function(&self, pos: usize, return_type: Option<LslType>) -> ParseResult<FunctionDef> {
        let (pos, params) = self.parse_params(pos)?;
        let (pos, body) = self.parse_block(pos)?;
        Ok((
            pos,
            FunctionDef {
                return_type,
                params,
                body,
            },
        ))
    }

    fn parse_state_body(&self, pos: usize) -> ParseResult<StateDef> {
        let mut pos = self.expect_delimiter(pos, Delimiter::OpenBrace)?;
        let mut state = StateDef::default();
        while !self.is_delimiter(pos, Delimiter::CloseBrace) {
            let (next, event) = self.expect_identifier(pos)?;
            let (next, params) = self.parse_params(next)?;
            let (next, body) = self.parse_block(next)?;
            if state.handlers.contains_key(&event) {
                return Err(self.error(pos, &format!("duplicate handler `{}`", event)));
            }
            state
                .handlers
                .insert(event, EventHandlerDef { params, body });
            pos = next;
        }
        Ok((pos + 1, state))
    }

    fn parse_params(&self, pos: usize) -> ParseResult<Vec<Parameter>> {
        let mut pos = self.expect_delimiter(pos, Delimiter::OpenParen)?;
        let mut params = Vec::new();
        if self.is_delimiter(pos, Delimiter::CloseParen) {
            return Ok((pos + 1, params));
        }
        loop {
            let ty = match self.peek(pos) {
                Some(Token::Type(ty)) => *ty,
                _ => return Err(self.error(pos, "expected parameter type")),
            };
            let (next, name) = self.expect_identifier(pos + 1)?;
            params.push(Parameter { ty, name });
            if self.is_delimiter(next, Delimiter::Comma) {
                pos = next + 1;
            } else {
                pos = self.expect_delimiter(next, Delimiter::CloseParen)?;
                return Ok((pos, params));
            }
        }
    }

    fn parse_block(&self, pos: usize) -> ParseResult<Vec<Statement>> {
        let mut pos = self.expect_delimiter(pos, Delimiter::OpenBrace)?;
        let mut body = Vec::new();
        while !self.is_delimiter(pos, Delimiter::CloseBrace) {
            if pos >= self.tokens.len() {
                return Err(ParseError::UnexpectedEOF("expected `}`".to_string()));
            }
            let (next, statement) = self.parse_statement(pos)?;
            body.push(statement);
            pos = next;
        }
        Ok((pos + 1, body))
    }

    fn parse_initializer(&self, pos: usize) -> ParseResult<Option<Expression>> {
        if self.is_operator(pos, Operator::Assign) {
            let (pos, expr) = self.parse_expression(pos + 1)?;
            Ok((pos, Some(expr)))
        } else {
            Ok((pos, None))
        }
    }

    pub fn parse_statement(&self, pos: usize) -> ParseResult<Statement> {
        match self.peek(pos) {
            Some(Token::Delimiter(Delimiter::Semicolon)) => Ok((pos + 1, Statement::Empty)),
            Some(Token::Delimiter(Delimiter::OpenBrace)) => {
                let (pos, body) = self.parse_block(pos)?;
                Ok((pos, Statement::Compound { body }))
            }
            Some(Token::Type(ty)) => {
                let ty = *ty;
                let (pos, name) = self.expect_identifier(pos + 1)?;
                let (pos, init) = self.parse_initializer(pos)?;
                let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
                Ok((pos, Statement::Declaration { name, ty, init }))
            }
            Some(Token::Keyword(Keyword::If)) => {
                let (pos, condition) = self.parse_condition(pos + 1)?;
                let (pos, then_branch) = self.parse_statement(pos)?;
                let (pos, else_branch) = if self.is_keyword(pos, Keyword::Else) {
                    let (pos, stmt) = self.parse_statement(pos + 1)?;
                    (pos, Some(Box::new(stmt)))
                } else {
                    (pos, None)
                };
                Ok((
                    pos,
                    Statement::If {
                        condition,
                        then_branch: Box::new(then_branch),
                        else_branch,
                    },
                ))
            }
            Some(Token::Keyword(Keyword::While)) => {
                let (pos, condition) = self.parse_condition(pos + 1)?;
                let (pos, body) = self.parse_statement(pos)?;
                Ok((
                    pos,
                    Statement::While {
                        condition,
                        body: Box::new(body),
                    },
                ))
            }
            Some(Token::Keyword(Keyword::Do)) => {
                let (pos, body) = self.parse_statement(pos + 1)?;
                if !self.is_keyword(pos, Keyword::While) {
                    return Err(self.error(pos, "expected `while` after do body"));
                }
                let (pos, condition) = self.parse_condition(pos + 1)?;
                let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
                Ok((
                    pos,
                    Statement::DoWhile {
                        body: Box::new(body),
                        condition,
                    },
                ))
            }
            Some(Token::Keyword(Keyword::For)) => self.parse_for(pos + 1),
            Some(Token::Keyword(Keyword::Return)) => {
                if self.is_delimiter(pos + 1, Delimiter::Semicolon) {
                    return Ok((pos + 2, Statement::Return { value: None }));
                }
                let (pos, value) = self.parse_expression(pos + 1)?;
                let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
                Ok((pos, Statement::Return { value: Some(value) }))
            }
            Some(Token::Keyword(Keyword::State)) => {
                let (pos, state) = match self.peek(pos + 1) {
                    Some(Token::Keyword(Keyword::Default)) => (pos + 2, DEFAULT_STATE.to_string()),
                    _ => self.expect_identifier(pos + 1)?,
                };
                let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
                Ok((pos, Statement::StateChange { state }))
            }
            Some(Token::Keyword(Keyword::Jump)) => {
                let (pos, label) = self.expect_identifier(pos + 1)?;
                let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
                Ok((pos, Statement::Jump { label }))
            }
            Some(Token::Operator(Operator::At)) => {
                let (pos, name) = self.expect_identifier(pos + 1)?;
                let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
                Ok((pos, Statement::Label { name }))
            }
            Some(Token::Keyword(Keyword::Break)) => {
                let pos = self.expect_delimiter(pos + 1, Delimiter::Semicolon)?;
                Ok((pos, Statement::Break))
            }
            Some(Token::Keyword(Keyword::Continue)) => {
                let pos = self.expect_delimiter(pos + 1, Delimiter::Semicolon)?;
                Ok((pos, Statement::Continue))
            }
            Some(_) => {
                let (pos, expr) = self.parse_expression(pos)?;
                let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
                let statement = match expr {
                    Expression::Assign { target, op, value } => Statement::Assignment {
                        target,
                        op,
                        value: *value,
                    },
                    expr => Statement::Expression { expr },
                };
                Ok((pos, statement))
            }
            None => Err(ParseError::UnexpectedEOF("expected statement".to_string())),
        }
    }

    fn parse_condition(&self, pos: usize) -> ParseResult<Expression> {
        let pos = self.expect_delimiter(pos, Delimiter::OpenParen)?;
        let (pos, condition) = self.parse_expression(pos)?;
        let pos = self.expect_delimiter(pos, Delimiter::CloseParen)?;
        Ok((pos, condition))
    }

    fn parse_for(&self, pos: usize) -> ParseResult<Statement> {
        let pos = self.expect_delimiter(pos, Delimiter::OpenParen)?;
        let (pos, init) = self.parse_expression_list(pos, Delimiter::Semicolon)?;
        let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
        let (pos, condition) = if self.is_delimiter(pos, Delimiter::Semicolon) {
            (pos, None)
        } else {
            let (pos, cond) = self.parse_expression(pos)?;
            (pos, Some(cond))
        };
        let pos = self.expect_delimiter(pos, Delimiter::Semicolon)?;
        let (pos, step) = self.parse_expression_list(pos, Delimiter::CloseParen)?;
        let pos = self.expect_delimiter(pos, Delimiter::CloseParen)?;
        let (pos, body) = self.parse_statement(pos)?;
        Ok((
            pos,
            Statement::For {
                init,
                condition,
                step,
                body: Box::new(body),
            },
        ))
    }

    /// Comma separated expressions up to (not including) `end`.
    fn parse_expression_list(&self, pos: usize, end: Delimiter) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();
        if self.is_delimiter(pos, end) {
            return Ok((pos, items));
        }
        let mut pos = pos;
        loop {
            let (next, expr) = self.parse_expression(pos)?;
            items.push(expr);
            if self.is_delimiter(next, Delimiter::Comma) {
                pos = next + 1;
            } else {
                return Ok((next, items));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    pub fn parse_expression(&self, pos: usize) -> ParseResult<Expression> {
        let (next, lhs) = self.parse_binary(pos, 0)?;
        let op = match self.peek(next) {
            Some(Token::Operator(Operator::Assign)) => AssignOp::Assign,
            Some(Token::Operator(Operator::PlusAssign)) => AssignOp::Add,
            Some(Token::Operator(Operator::MinusAssign)) => AssignOp::Subtract,
            Some(Token::Operator(Operator::MultiplyAssign)) => AssignOp::Multiply,
            Some(Token::Operator(Operator::DivideAssign)) => AssignOp::Divide,
            Some(Token::Operator(Operator::ModuloAssign)) => AssignOp::Modulo,
            _ => return Ok((next, lhs)),
        };
        let target = self.to_lvalue(pos, lhs)?;
        let (next, value) = self.parse_expression(next + 1)?;
        Ok((
            next,
            Expression::Assign {
                target,
                op,
                value: Box::new(value),
            },
        ))
    }

    fn to_lvalue(&self, pos: usize, expr: Expression) -> Result<LValue, ParseError> {
        match expr {
            Expression::Identifier { name } => Ok(LValue::Identifier { name }),
            Expression::Component { target, axis } => match *target {
                Expression::Identifier { name } => Ok(LValue::Component { name, axis }),
                _ => Err(self.error(pos, "component assignment needs a variable")),
            },
            Expression::Subscript { list, index } => match *list {
                Expression::Identifier { name } => Ok(LValue::Element { name, index }),
                _ => Err(self.error(pos, "element assignment needs a list variable")),
            },
            _ => Err(self.error(pos, "left side of assignment is not assignable")),
        }
    }

    /// Precedence climbing over the binary operator table.
    fn parse_binary(&self, pos: usize, min_level: usize) -> ParseResult<Expression> {
        if min_level >= BINARY_LEVELS.len() {
            return self.parse_unary(pos);
        }
        let (mut pos, mut left) = self.parse_binary(pos, min_level + 1)?;
        while let Some(op) = self.binary_at(pos, min_level) {
            let (next, right) = self.parse_binary(pos + 1, min_level + 1)?;
            left = Expression::binary(op, left, right);
            pos = next;
        }
        Ok((pos, left))
    }

    fn binary_at(&self, pos: usize, level: usize) -> Option<BinaryOperator> {
        match self.peek(pos) {
            Some(Token::Operator(op)) => BINARY_LEVELS[level]
                .iter()
                .find(|(candidate, _)| candidate == op)
                .map(|(_, bin)| *bin),
            _ => None,
        }
    }

    fn parse_unary(&self, pos: usize) -> ParseResult<Expression> {
        let unary = |op: UnaryOperator, pos: usize| -> ParseResult<Expression> {
            let (pos, operand) = self.parse_unary(pos)?;
            Ok((
                pos,
                Expression::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ))
        };
        match self.peek(pos) {
            Some(Token::Operator(Operator::Minus)) => unary(UnaryOperator::Negate, pos + 1),
            Some(Token::Operator(Operator::Plus)) => unary(UnaryOperator::Plus, pos + 1),
            Some(Token::Operator(Operator::Not)) => unary(UnaryOperator::Not, pos + 1),
            Some(Token::Operator(Operator::Tilde)) => unary(UnaryOperator::BitNot, pos + 1),
            Some(Token::Operator(Operator::Increment)) => {
                self.parse_prefix(pos, IncDecOp::Increment)
            }
            Some(Token::Operator(Operator::Decrement)) => {
                self.parse_prefix(pos, IncDecOp::Decrement)
            }
            Some(Token::Delimiter(Delimiter::OpenParen)) => {
                if let (Some(Token::Type(ty)), true) = (
                    self.peek(pos + 1),
                    self.is_delimiter(pos + 2, Delimiter::CloseParen),
                ) {
                    let ty = *ty;
                    let (pos, expr) = self.parse_unary(pos + 3)?;
                    return Ok((
                        pos,
                        Expression::Cast {
                            ty,
                            expr: Box::new(expr),
                        },
                    ));
                }
                self.parse_postfix(pos)
            }
            _ => self.parse_postfix(pos),
        }
    }

    fn parse_prefix(&self, pos: usize, op: IncDecOp) -> ParseResult<Expression> {
        let (next, operand) = self.parse_postfix(pos + 1)?;
        let target = self.to_lvalue(pos + 1, operand)?;
        Ok((
            next,
            Expression::IncDec {
                op,
                prefix: true,
                target,
            },
        ))
    }

    fn parse_postfix(&self, pos: usize) -> ParseResult<Expression> {
        let (mut pos, mut expr) = self.parse_primary(pos)?;
        loop {
            match self.peek(pos) {
                Some(Token::Operator(Operator::Dot)) => {
                    let (next, name) = self.expect_identifier(pos + 1)?;
                    let axis = name
                        .parse::<Axis>()
                        .map_err(|_| self.error(pos + 1, "expected component x, y, z or s"))?;
                    expr = Expression::Component {
                        target: Box::new(expr),
                        axis,
                    };
                    pos = next;
                }
                Some(Token::Delimiter(Delimiter::OpenBracket)) => {
                    let (next, index) = self.parse_expression(pos + 1)?;
                    if self.is_delimiter(next, Delimiter::Colon) {
                        let (next, end) = self.parse_expression(next + 1)?;
                        let next = self.expect_delimiter(next, Delimiter::CloseBracket)?;
                        expr = Expression::Slice {
                            list: Box::new(expr),
                            start: Box::new(index),
                            end: Box::new(end),
                        };
                        pos = next;
                    } else {
                        let next = self.expect_delimiter(next, Delimiter::CloseBracket)?;
                        expr = Expression::Subscript {
                            list: Box::new(expr),
                            index: Box::new(index),
                        };
                        pos = next;
                    }
                }
                Some(Token::Operator(op @ (Operator::Increment | Operator::Decrement))) => {
                    let op = if *op == Operator::Increment {
                        IncDecOp::Increment
                    } else {
                        IncDecOp::Decrement
                    };
                    let target = self.to_lvalue(pos, expr)?;
                    return Ok((
                        pos + 1,
                        Expression::IncDec {
                            op,
                            prefix: false,
                            target,
                        },
                    ));
                }
                _ => return Ok((pos, expr)),
            }
        }
    }

    fn parse_primary(&self, pos: usize) -> ParseResult<Expression> {
        match self.peek(pos) {
            Some(Token::Literal(literal)) => {
                let value = match literal {
                    TokenLiteral::Integer(i) => Literal::Integer(*i),
                    TokenLiteral::Float(f) => Literal::Float(*f),
                    TokenLiteral::String(s) => Literal::String(s.clone()),
                };
                Ok((pos + 1, Expression::Literal { value }))
            }
            Some(Token::Identifier(name)) => {
                if self.is_delimiter(pos + 1, Delimiter::OpenParen) {
                    let (next, args) = self.parse_expression_list(pos + 2, Delimiter::CloseParen)?;
                    let next = self.expect_delimiter(next, Delimiter::CloseParen)?;
                    Ok((next, Expression::call(name, args)))
                } else {
                    Ok((pos + 1, Expression::ident(name)))
                }
            }
            Some(Token::Delimiter(Delimiter::OpenParen)) => {
                let (next, expr) = self.parse_expression(pos + 1)?;
                let next = self.expect_delimiter(next, Delimiter::CloseParen)?;
                Ok((next, expr))
            }
            Some(Token::Delimiter(Delimiter::OpenBracket)) => {
                let (next, items) = self.parse_expression_list(pos + 1, Delimiter::CloseBracket)?;
                let next = self.expect_delimiter(next, Delimiter::CloseBracket)?;
                Ok((next, Expression::ListLiteral { items }))
            }
            Some(Token::Operator(Operator::Less)) => self.parse_vector_literal(pos + 1),
            Some(_) => Err(self.error(pos, "expected expression")),
            None => Err(ParseError::UnexpectedEOF("expected expression".to_string())),
        }
    }

    /// `<x, y, z>` or `<x, y, z, s>`. Components stop above the relational
    /// level so the closing `>` is not read as a comparison.
    fn parse_vector_literal(&self, pos: usize) -> ParseResult<Expression> {
        let mut parts = Vec::with_capacity(4);
        let mut pos = pos;
        loop {
            let (next, component) = self.parse_binary(pos, COMPONENT_LEVEL)?;
            parts.push(component);
            if self.is_delimiter(next, Delimiter::Comma) && parts.len() < 4 {
                pos = next + 1;
                continue;
            }
            if !self.is_operator(next, Operator::Greater) {
                return Err(self.error(next, "expected `>` closing vector or rotation"));
            }
            pos = next + 1;
            break;
        }
        let mut parts = parts.into_iter().map(Box::new);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(x), Some(y), Some(z), None) => Ok((pos, Expression::VectorLiteral { x, y, z })),
            (Some(x), Some(y), Some(z), Some(s)) => {
                Ok((pos, Expression::RotationLiteral { x, y, z, s }))
            }
            _ => Err(self.error(pos, "vector needs 3 components, rotation needs 4")),
        }
    }

    // ---------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------

    fn peek(&self, pos: usize) -> Option<&Token> {
        self.tokens.get(pos).map(|t| &t.token)
    }

    fn is_delimiter(&self, pos: usize, delimiter: Delimiter) -> bool {
        matches!(self.peek(pos), Some(Token::Delimiter(d)) if *d == delimiter)
    }

    fn is_operator(&self, pos: usize, operator: Operator) -> bool {
        matches!(self.peek(pos), Some(Token::Operator(o)) if *o == operator)
    }

    fn is_keyword(&self, pos: usize, keyword: Keyword) -> bool {
        matches!(self.peek(pos), Some(Token::Keyword(k)) if *k == keyword)
    }

    fn expect_delimiter(&self, pos: usize, delimiter: Delimiter) -> Result<usize, ParseError> {
        if self.is_delimiter(pos, delimiter) {
            Ok(pos + 1)
        } else {
            Err(self.error(pos, &format!("expected `{}`", delimiter)))
        }
    }

    fn expect_identifier(&self, pos: usize) -> ParseResult<String> {
        match self.peek(pos) {
            Some(Token::Identifier(name)) => Ok((pos + 1, name.clone())),
            _ => Err(self.error(pos, "expected identifier")),
        }
    }

    fn error(&self, pos: usize, message: &str) -> ParseError {
        match self.tokens.get(pos) {
            Some(span) => ParseError::ParseError {
                message: message.to_string(),
                found: span.token.to_string(),
                span: span.span(),
            },
            None => ParseError::UnexpectedEOF(message.to_string()),
        }
    }
}

/// Binary operators from loosest to tightest binding.
const BINARY_LEVELS: &[&[(Operator, BinaryOperator)]] = &[
    &[(Operator::Or, BinaryOperator::Or)],
    &[(Operator::And, BinaryOperator::And)],
    &[(Operator::BitOr, BinaryOperator::BitOr)],
    &[(Operator::BitXor, BinaryOperator::BitXor)],
    &[(Operator::BitAnd, BinaryOperator::BitAnd)],
    &[
        (Operator::EqualEqual, BinaryOperator::Equal),
        (Operator::NotEqual, BinaryOperator::NotEqual),
    ],
    &[
        (Operator::Less, BinaryOperator::LessThan),
        (Operator::LessEqual, BinaryOperator::LessThanEqual),
        (Operator::Greater, BinaryOperator::GreaterThan),
        (Operator::GreaterEqual, BinaryOperator::GreaterThanEqual),
    ],
    &[
        (Operator::ShiftLeft, BinaryOperator::ShiftLeft),
        (Operator::ShiftRight, BinaryOperator::ShiftRight),
    ],
    &[
        (Operator::Plus, BinaryOperator::Add),
        (Operator::Minus, BinaryOperator::Subtract),
    ],
    &[
        (Operator::Multiply, BinaryOperator::Multiply),
        (Operator::Divide, BinaryOperator::Divide),
        (Operator::Modulo, BinaryOperator::Modulo),
    ],
];

/// Index of the shift level in [`BINARY_LEVELS`].
const COMPONENT_LEVEL: usize = 7;
