use crate::error::{ParseError, ParseResult};
use crate::lexer::tokenize;
use crate::stream::TokenStream;
use crate::token::{Token, TokenKind};
use cinder_ast::ast::{
    BinOp, BlockItem, Declaration, Expr, Function, Item, Program, Stmt, UnOp, MAX_ARGS,
};

/// Maximum nesting of statements and expressions, counting each operator
/// folded into a left-associative chain as one level.
pub const MAX_DEPTH: usize = 256;

pub fn parse_str(file: &str, src: &str) -> ParseResult<Program> {
    let tokens = tokenize(src)?;
    let program = parse_tokens(tokens)?;
    tracing::debug!(file, items = program.items.len(), "parsed program");
    Ok(program)
}

pub fn parse_tokens(tokens: Vec<Token>) -> ParseResult<Program> {
    Parser::new(TokenStream::new(tokens)).parse_program()
}

struct Parser {
    toks: TokenStream,
    depth: usize,
}

// operator tiers, lowest binding first
const OR_OPS: &[(TokenKind, BinOp)] = &[(TokenKind::OrOr, BinOp::Or)];
const AND_OPS: &[(TokenKind, BinOp)] = &[(TokenKind::AndAnd, BinOp::And)];
const EQUALITY_OPS: &[(TokenKind, BinOp)] =
    &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::BangEq, BinOp::Ne)];
const RELATIONAL_OPS: &[(TokenKind, BinOp)] = &[
    (TokenKind::Lt, BinOp::Lt),
    (TokenKind::Le, BinOp::Le),
    (TokenKind::Gt, BinOp::Gt),
    (TokenKind::Ge, BinOp::Ge),
];
const ADDITIVE_OPS: &[(TokenKind, BinOp)] =
    &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)];
const TERM_OPS: &[(TokenKind, BinOp)] = &[
    (TokenKind::Star, BinOp::Mul),
    (TokenKind::Slash, BinOp::Div),
    (TokenKind::Percent, BinOp::Mod),
];

impl Parser {
    fn new(toks: TokenStream) -> Self {
        Self { toks, depth: 0 }
    }

    fn bump(&mut self) -> ParseResult<Token> {
        self.toks
            .next()
            .ok_or_else(|| ParseError::expected("token", None))
    }

    fn at(&self, k: TokenKind) -> bool {
        self.toks.peek_kind() == Some(k)
    }

    fn expect(&mut self, k: TokenKind) -> ParseResult<Token> {
        match self.toks.next() {
            Some(t) if t.kind == k => Ok(t),
            other => Err(ParseError::expected(quoted(k), other.as_ref())),
        }
    }

    fn parse_ident(&mut self) -> ParseResult<String> {
        Ok(self.expect(TokenKind::Ident)?.text)
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ======= program / items =======

    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut items = Vec::new();
        while !self.toks.is_empty() {
            items.push(self.parse_item()?);
        }
        Ok(Program { items })
    }

    /// `int name (` starts a function, anything else after `int name` is a
    /// global declaration. Both tokens are pushed back before dispatching.
    fn parse_item(&mut self) -> ParseResult<Item> {
        let int_kw = self.expect(TokenKind::KwInt)?;
        let name = self.expect(TokenKind::Ident)?;
        let is_function = self.at(TokenKind::LParen);
        self.toks.push_back(name);
        self.toks.push_back(int_kw);

        if is_function {
            self.parse_function()
        } else {
            Ok(Item::Declaration(self.parse_declaration()?))
        }
    }

    fn parse_function(&mut self) -> ParseResult<Item> {
        self.expect(TokenKind::KwInt)?;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        if params.len() > MAX_ARGS {
            return Err(ParseError::TooManyParameters {
                function: name,
                count: params.len(),
            });
        }

        // forward declaration
        if self.at(TokenKind::Semicolon) {
            self.bump()?;
            return Ok(Item::Prototype { name, params });
        }

        let body = self.parse_block_body()?;
        Ok(Item::Function(Function { name, params, body }))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();

        // Empty param list: ()
        if self.at(TokenKind::RParen) {
            return Ok(params);
        }

        params.push(self.parse_param()?);
        while self.at(TokenKind::Comma) {
            self.bump()?;
            params.push(self.parse_param()?);
        }

        Ok(params)
    }

    /// `[int] name`
    fn parse_param(&mut self) -> ParseResult<String> {
        if self.at(TokenKind::KwInt) {
            self.bump()?;
        }
        self.parse_ident()
    }

    // ======= blocks and statements =======

    /// `{ block-item* }`
    fn parse_block_body(&mut self) -> ParseResult<Vec<BlockItem>> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        loop {
            match self.toks.peek_kind() {
                Some(TokenKind::RBrace) => break,
                Some(_) => items.push(self.parse_block_item()?),
                None => return Err(ParseError::expected(quoted(TokenKind::RBrace), None)),
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(items)
    }

    fn parse_block_item(&mut self) -> ParseResult<BlockItem> {
        if self.at(TokenKind::KwInt) {
            Ok(BlockItem::Declaration(self.parse_declaration()?))
        } else {
            Ok(BlockItem::Stmt(self.parse_statement()?))
        }
    }

    /// `int name [= expr];`
    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        self.expect(TokenKind::KwInt)?;
        let name = self.parse_ident()?;
        let init = if self.at(TokenKind::Eq) {
            self.bump()?;
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Declaration { name, init })
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        self.enter()?;
        let stmt = match self.toks.peek_kind() {
            Some(TokenKind::KwReturn) => {
                self.bump()?;
                let value = self.parse_option_expression()?;
                self.expect(TokenKind::Semicolon)?;
                Stmt::Return(value)
            }
            Some(TokenKind::KwIf) => self.parse_if()?,
            Some(TokenKind::LBrace) => Stmt::Compound(self.parse_block_body()?),
            Some(TokenKind::KwFor) => self.parse_for()?,
            Some(TokenKind::KwWhile) => self.parse_while()?,
            Some(TokenKind::KwDo) => self.parse_do_while()?,
            Some(TokenKind::KwBreak) => {
                self.bump()?;
                self.expect(TokenKind::Semicolon)?;
                Stmt::Break
            }
            Some(TokenKind::KwContinue) => {
                self.bump()?;
                self.expect(TokenKind::Semicolon)?;
                Stmt::Continue
            }
            _ => {
                let expr = self.parse_option_expression()?;
                self.expect(TokenKind::Semicolon)?;
                Stmt::Expr(expr)
            }
        };
        self.leave();
        Ok(stmt)
    }

    /// `if ( expr ) stmt [else stmt]`; a dangling `else` binds to the
    /// innermost `if` because the nested call consumes it first.
    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::KwIf)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;

        let then_ = Box::new(self.parse_statement()?);
        let else_ = if self.at(TokenKind::KwElse) {
            self.bump()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If { cond, then_, else_ })
    }

    /// Peeks past `for (` to pick the declaration or expression form.
    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let for_kw = self.expect(TokenKind::KwFor)?;
        let paren = self.expect(TokenKind::LParen)?;
        let declares = self.at(TokenKind::KwInt);
        self.toks.push_back(paren);
        self.toks.push_back(for_kw);

        if declares {
            self.parse_for_declaration()
        } else {
            self.parse_for_expression()
        }
    }

    /// `for ( [expr] ; [expr] ; [expr] ) stmt`
    fn parse_for_expression(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::KwFor)?;
        self.expect(TokenKind::LParen)?;
        let init = self.parse_option_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let cond = self.parse_option_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let post = self.parse_option_expression()?;
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
        })
    }

    /// `for ( declaration [expr] ; [expr] ) stmt`; the declaration carries
    /// its own `;`.
    fn parse_for_declaration(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::KwFor)?;
        self.expect(TokenKind::LParen)?;
        let init = self.parse_declaration()?;
        let cond = self.parse_option_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let post = self.parse_option_expression()?;
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::ForDecl {
            init,
            cond,
            post,
            body,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::KwWhile)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { cond, body })
    }

    /// `do stmt while ( expr ) ;`
    fn parse_do_while(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::KwDo)?;
        let body = Box::new(self.parse_statement()?);
        self.expect(TokenKind::KwWhile)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::DoWhile { body, cond })
    }

    // ======= expressions =======
    //
    // One routine per tier (low -> high):
    //   assignment (right-assoc)
    //   ?: (right-assoc)
    //   ||
    //   &&
    //   == !=
    //   < <= > >=
    //   + -
    //   * / %
    //   unary - ~ !
    //   factor

    /// An expression, or nothing when the next token is `;` or `)`.
    fn parse_option_expression(&mut self) -> ParseResult<Option<Expr>> {
        match self.toks.peek_kind() {
            Some(TokenKind::Semicolon) | Some(TokenKind::RParen) => Ok(None),
            _ => Ok(Some(self.parse_expression()?)),
        }
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let is_assign = self.at(TokenKind::Ident)
            && self.toks.peek_nth(1).map(|t| t.kind) == Some(TokenKind::Eq);
        if !is_assign {
            return self.parse_conditional();
        }

        let name = self.parse_ident()?;
        self.expect(TokenKind::Eq)?;
        self.enter()?;
        let value = self.parse_expression()?;
        self.leave();
        Ok(Expr::Assign {
            name,
            value: Box::new(value),
        })
    }

    /// The false branch recurses into another conditional, so
    /// `a ? b : c ? d : e` groups as `a ? b : (c ? d : e)`.
    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_binary_tier(0)?;
        if !self.at(TokenKind::Question) {
            return Ok(cond);
        }
        self.bump()?;
        self.enter()?;
        let then_ = self.parse_expression()?;
        self.expect(TokenKind::Colon)?;
        let else_ = self.parse_conditional()?;
        self.leave();
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then_: Box::new(then_),
            else_: Box::new(else_),
        })
    }

    /// Left-associative binary tiers, `tier` indexing into the table from
    /// loosest (`||`) to tightest (`* / %`).
    fn parse_binary_tier(&mut self, tier: usize) -> ParseResult<Expr> {
        const TIERS: [&[(TokenKind, BinOp)]; 6] = [
            OR_OPS,
            AND_OPS,
            EQUALITY_OPS,
            RELATIONAL_OPS,
            ADDITIVE_OPS,
            TERM_OPS,
        ];
        let operand = |p: &mut Self| {
            if tier + 1 < TIERS.len() {
                p.parse_binary_tier(tier + 1)
            } else {
                p.parse_unary()
            }
        };

        let mut lhs = operand(self)?;
        // each fold nests the tree one level deeper
        let mut folded = 0;
        while let Some(op) = self
            .toks
            .peek_kind()
            .and_then(|k| TIERS[tier].iter().find(|(tk, _)| *tk == k))
            .map(|(_, op)| *op)
        {
            self.bump()?;
            self.enter()?;
            folded += 1;
            let rhs = operand(self)?;
            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }
        self.depth -= folded;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.toks.peek_kind() {
            Some(TokenKind::Minus) => UnOp::Neg,
            Some(TokenKind::Tilde) => UnOp::BitNot,
            Some(TokenKind::Bang) => UnOp::Not,
            _ => return self.parse_factor(),
        };
        self.bump()?;
        self.enter()?;
        let inner = self.parse_unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            expr: Box::new(inner),
        })
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let Some(tok) = self.toks.next() else {
            return Err(ParseError::expected("expression", None));
        };

        match tok.kind {
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.parse_expression()?;
                self.leave();
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident if self.at(TokenKind::LParen) => self.parse_call(tok.text),
            TokenKind::Ident => Ok(Expr::Var(tok.text)),
            TokenKind::IntLiteral => {
                let value = tok
                    .text
                    .parse::<i64>()
                    .map_err(|_| ParseError::IntegerOverflow {
                        text: tok.text.clone(),
                    })?;
                Ok(Expr::Constant(value))
            }
            _ => Err(ParseError::expected("expression", Some(&tok))),
        }
    }

    /// Call arguments; the callee name is already consumed.
    fn parse_call(&mut self, name: String) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            self.enter()?;
            loop {
                args.push(self.parse_expression()?);
                if self.at(TokenKind::Comma) {
                    self.bump()?;
                    continue;
                }
                break;
            }
            self.leave();
        }
        self.expect(TokenKind::RParen)?;

        if args.len() > MAX_ARGS {
            return Err(ParseError::TooManyArguments {
                function: name,
                count: args.len(),
            });
        }
        Ok(Expr::Call { name, args })
    }
}

fn quoted(k: TokenKind) -> String {
    match k {
        TokenKind::Ident | TokenKind::IntLiteral => k.to_string(),
        _ => format!("`{k}`"),
    }
}
