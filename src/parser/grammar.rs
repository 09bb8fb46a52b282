//! SQL Grammar/Parser
//!
//! A recursive descent parser for the SELECT dialect of SQLite. It builds
//! the raw tree in [`crate::parser::ast`] with the same rewrites SQLite's
//! grammar actions perform. [`parse_with_hook`] reports a root-level SELECT
//! to a [`SelectHook`] once its statement has been terminated.

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::parser::ast::*;
use crate::parser::tokenizer::{dequote, Token, TokenKind, Tokenizer};

/// Maximum nesting of expressions and subqueries
const MAX_DEPTH: usize = 100;

/// Maximum number of branches in a compound SELECT
const MAX_COMPOUND_SELECT: usize = 500;

/// Maximum height of an expression tree
const MAX_EXPR_DEPTH: usize = 1000;

// ============================================================================
// Statements
// ============================================================================

/// A top-level statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Select(Box<Select>),
    Explain { query_plan: bool, stmt: Box<Stmt> },
    /// Any statement other than a query, kept as its source text
    Other(String),
}

impl Stmt {
    /// The query this statement consists of, looking through EXPLAIN
    pub fn root_select(&self) -> Option<&Select> {
        match self {
            Stmt::Select(select) => Some(select),
            Stmt::Explain { stmt, .. } => stmt.root_select(),
            Stmt::Other(_) => None,
        }
    }
}

/// Observer for root-level SELECT statements.
///
/// The select is only borrowed for the duration of the call.
pub trait SelectHook {
    fn on_select(&mut self, select: &Select);
}

// ============================================================================
// Parser
// ============================================================================

/// SQL parser
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    /// Tokenizer failure behind the trailing `Illegal` token
    lex_error: Option<Error>,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given SQL source
    pub fn new(source: &'a str) -> Self {
        let (tokens, lex_error) = Tokenizer::new(source).tokenize_prefix();
        Parser {
            source,
            tokens,
            pos: 0,
            depth: 0,
            lex_error,
        }
    }

    /// Parse the next statement, or `None` at end of input.
    ///
    /// A statement is complete only once its `;` or the end of input has
    /// been reached; anything else after it is a syntax error.
    pub fn next_stmt(&mut self) -> Result<Option<Stmt>> {
        self.skip_semicolons();
        if self.is_eof() {
            return Ok(None);
        }

        let stmt = if self.match_token(TokenKind::Explain) {
            let query_plan =
                self.check(TokenKind::Query) && self.peek().kind == TokenKind::Plan;
            if query_plan {
                self.advance();
                self.advance();
            }
            Stmt::Explain {
                query_plan,
                stmt: Box::new(self.parse_cmd()?),
            }
        } else {
            self.parse_cmd()?
        };

        if !self.check(TokenKind::Semicolon) && !self.is_eof() {
            return Err(self.error());
        }
        Ok(Some(stmt))
    }

    /// Check if at end of file
    pub fn is_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn parse_cmd(&mut self) -> Result<Stmt> {
        let start = self.pos;
        match self.current().kind {
            TokenKind::Select | TokenKind::Values => {
                let select = self.parse_select()?;
                debug!(branches = select.branch_count(), "parsed SELECT statement");
                Ok(Stmt::Select(Box::new(select)))
            }
            TokenKind::With => {
                let with = self.parse_with_clause()?;
                if self.check(TokenKind::Select) || self.check(TokenKind::Values) {
                    let mut select = self.parse_compound_select()?;
                    select.with = Some(with);
                    debug!(
                        branches = select.branch_count(),
                        ctes = select.with.as_ref().map_or(0, |w| w.ctes.len()),
                        "parsed SELECT statement"
                    );
                    Ok(Stmt::Select(Box::new(select)))
                } else {
                    self.skip_statement(start)
                }
            }
            kind if kind.is_word() => self.skip_statement(start),
            _ => Err(self.error()),
        }
    }

    /// Skip a statement that is not a query, up to its terminator.
    ///
    /// Semicolons inside parentheses and inside a trigger body do not end
    /// the statement.
    fn skip_statement(&mut self, start: usize) -> Result<Stmt> {
        let is_create = self.tokens[start].kind == TokenKind::Create;
        let mut paren_depth = 0usize;
        let mut trigger = false;
        let mut in_body = false;
        let mut case_depth = 0usize;

        loop {
            match self.current().kind {
                TokenKind::Eof => break,
                TokenKind::Illegal => return Err(self.error()),
                TokenKind::Semicolon if paren_depth == 0 && !in_body => break,
                TokenKind::LParen => paren_depth += 1,
                TokenKind::RParen => paren_depth = paren_depth.saturating_sub(1),
                TokenKind::Trigger if is_create => trigger = true,
                TokenKind::Begin if trigger && !in_body => in_body = true,
                TokenKind::Case if in_body => case_depth += 1,
                TokenKind::End if in_body => {
                    if case_depth > 0 {
                        case_depth -= 1;
                    } else {
                        in_body = false;
                    }
                }
                _ => {}
            }
            self.advance();
        }

        let text = &self.source[self.tokens[start].start..self.prev_end()];
        debug!(
            keyword = self.tokens[start].text(self.source),
            "skipped statement"
        );
        Ok(Stmt::Other(text.to_string()))
    }

    // ========================================================================
    // SELECT
    // ========================================================================

    fn parse_select(&mut self) -> Result<Select> {
        self.nested(Self::parse_select_inner)
    }

    fn parse_select_inner(&mut self) -> Result<Select> {
        let with = if self.check(TokenKind::With) {
            Some(self.parse_with_clause()?)
        } else {
            None
        };

        let mut select = self.parse_compound_select()?;
        if with.is_some() {
            select.with = with;
        }
        Ok(select)
    }

    /// Branches joined by set operators, linked from right to left
    fn parse_compound_select(&mut self) -> Result<Select> {
        let mut root = self.parse_one_select()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Union => {
                    self.advance();
                    if self.match_token(TokenKind::All) {
                        CompoundOp::UnionAll
                    } else {
                        CompoundOp::Union
                    }
                }
                TokenKind::Intersect => {
                    self.advance();
                    CompoundOp::Intersect
                }
                TokenKind::Except => {
                    self.advance();
                    CompoundOp::Except
                }
                _ => break,
            };

            if root.order_by.is_some() || root.limit.is_some() {
                let clause = if root.order_by.is_some() {
                    "ORDER BY"
                } else {
                    "LIMIT"
                };
                return Err(self.invalid(format!(
                    "{} clause should come after {} not before",
                    clause,
                    op.as_str()
                )));
            }

            let mut rhs = self.parse_one_select()?;
            if rhs.is_compound() {
                // multi-row VALUES on the right of a set operator
                let mut from = SrcList::new();
                from.items.push(SrcItem::subquery(rhs));
                rhs = Select::star_from(from);
            }
            rhs.op = Some(op);
            rhs.prior = Some(Box::new(root));
            root = rhs;
        }

        if root.is_compound()
            && !root
                .flags
                .intersects(SelectFlags::VALUES | SelectFlags::MULTI_VALUE)
            && root.branch_count() > MAX_COMPOUND_SELECT
        {
            return Err(self.invalid("too many terms in compound SELECT"));
        }

        Ok(root)
    }

    fn parse_one_select(&mut self) -> Result<Select> {
        if self.match_token(TokenKind::Values) {
            return self.parse_values();
        }
        self.expect(TokenKind::Select)?;

        let mut select = Select::default();
        if self.match_token(TokenKind::Distinct) {
            select.flags |= SelectFlags::DISTINCT;
        } else if self.match_token(TokenKind::All) {
            select.flags |= SelectFlags::ALL;
        }

        select.columns = self.parse_result_columns()?;

        if self.match_token(TokenKind::From) {
            select.from = self.parse_from_clause()?;
        }

        if self.match_token(TokenKind::Where) {
            select.where_clause = Some(Box::new(self.parse_expr()?));
        }

        if self.match_token(TokenKind::Group) {
            self.expect(TokenKind::By)?;
            select.group_by = Some(self.parse_expr_list()?);
        }

        if self.match_token(TokenKind::Having) {
            select.having = Some(Box::new(self.parse_expr()?));
        }

        if self.window_is_keyword() {
            self.advance();
            select.window_defs = self.parse_window_defs()?;
        }

        if self.match_token(TokenKind::Order) {
            self.expect(TokenKind::By)?;
            select.order_by = Some(self.parse_sort_list()?);
        }

        if self.match_token(TokenKind::Limit) {
            select.limit = Some(self.parse_limit()?);
        }

        Ok(select)
    }

    /// `VALUES (..), (..)`: one select per row, chained with UNION ALL
    fn parse_values(&mut self) -> Result<Select> {
        let mut root = self.parse_values_row()?;

        while self.match_token(TokenKind::Comma) {
            let mut row = self.parse_values_row()?;
            root.flags.remove(SelectFlags::MULTI_VALUE);
            row.flags |= SelectFlags::MULTI_VALUE;
            row.op = Some(CompoundOp::UnionAll);
            row.prior = Some(Box::new(root));
            root = row;
        }

        Ok(root)
    }

    fn parse_values_row(&mut self) -> Result<Select> {
        self.expect(TokenKind::LParen)?;
        let columns = self.parse_expr_list()?;
        self.expect(TokenKind::RParen)?;

        let mut select = Select::new(columns);
        select.flags = SelectFlags::VALUES;
        Ok(select)
    }

    fn parse_result_columns(&mut self) -> Result<ExprList> {
        let mut columns = ExprList::new();
        loop {
            self.parse_result_column(&mut columns)?;
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_result_column(&mut self, columns: &mut ExprList) -> Result<()> {
        if self.match_token(TokenKind::Star) {
            columns.push(Expr::Asterisk);
            return Ok(());
        }

        // table.*
        if is_name(self.current().kind)
            && self.peek().kind == TokenKind::Dot
            && self.peek_at(2).kind == TokenKind::Star
        {
            let table = dequote(self.current_text());
            self.advance();
            self.advance();
            self.advance();
            columns.push(Expr::Dot {
                left: Box::new(Expr::Id(table)),
                right: Box::new(Expr::Asterisk),
            });
            return Ok(());
        }

        let start = self.current().start;
        let expr = self.parse_expr()?;
        let span = self.source[start..self.prev_end()].to_string();
        let alias = self.parse_alias()?;

        let item = columns.push(expr);
        item.name = Some(match alias {
            Some(alias) => EName::Name(alias),
            None => EName::Span(span),
        });
        Ok(())
    }

    fn parse_limit(&mut self) -> Result<Limit> {
        let first = self.parse_expr()?;

        if self.match_token(TokenKind::Offset) {
            let offset = self.parse_expr()?;
            Ok(Limit {
                limit: Box::new(first),
                offset: Some(Box::new(offset)),
            })
        } else if self.match_token(TokenKind::Comma) {
            // LIMIT <offset>, <count>
            let limit = self.parse_expr()?;
            Ok(Limit {
                limit: Box::new(limit),
                offset: Some(Box::new(first)),
            })
        } else {
            Ok(Limit {
                limit: Box::new(first),
                offset: None,
            })
        }
    }

    // ========================================================================
    // WITH
    // ========================================================================

    fn parse_with_clause(&mut self) -> Result<With> {
        self.expect(TokenKind::With)?;
        let recursive = self.match_token(TokenKind::Recursive);

        let mut ctes: Vec<Cte> = Vec::new();
        loop {
            let cte = self.parse_cte()?;
            if ctes.iter().any(|c| c.name.eq_ignore_ascii_case(&cte.name)) {
                return Err(self.invalid(format!("duplicate WITH table name: {}", cte.name)));
            }
            ctes.push(cte);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        Ok(With { recursive, ctes })
    }

    fn parse_cte(&mut self) -> Result<Cte> {
        let name = self.expect_name()?;

        let columns = if self.match_token(TokenKind::LParen) {
            let names = self.parse_name_list()?;
            self.expect(TokenKind::RParen)?;
            Some(names)
        } else {
            None
        };

        self.expect(TokenKind::As)?;
        let materialized = if self.match_token(TokenKind::Materialized) {
            Materialized::Yes
        } else if self.check(TokenKind::Not) && self.peek().kind == TokenKind::Materialized {
            self.advance();
            self.advance();
            Materialized::No
        } else {
            Materialized::Any
        };

        self.expect(TokenKind::LParen)?;
        let select = self.parse_select()?;
        self.expect(TokenKind::RParen)?;

        Ok(Cte {
            name,
            columns,
            materialized,
            select: Box::new(select),
        })
    }

    // ========================================================================
    // FROM
    // ========================================================================

    fn parse_from_clause(&mut self) -> Result<SrcList> {
        let mut from = SrcList::new();
        self.parse_src_item(&mut from, JoinFlags::empty())?;

        loop {
            let join_type = if self.match_token(TokenKind::Comma) {
                JoinFlags::empty()
            } else if let Some(flags) = self.parse_join_op()? {
                flags
            } else {
                break;
            };
            self.parse_src_item(&mut from, join_type)?;
        }

        Ok(from)
    }

    /// `JOIN`, or up to three join keywords followed by `JOIN`
    fn parse_join_op(&mut self) -> Result<Option<JoinFlags>> {
        if self.match_token(TokenKind::Join) {
            return Ok(Some(JoinFlags::INNER));
        }
        if !self.current().kind.is_join_keyword() {
            return Ok(None);
        }

        let start = self.pos;
        let mut flags = JoinFlags::empty();
        let mut words = Vec::new();
        while self.current().kind.is_join_keyword() && words.len() < 3 {
            flags |= match self.current().kind {
                TokenKind::Inner => JoinFlags::INNER,
                TokenKind::Cross => JoinFlags::INNER | JoinFlags::CROSS,
                TokenKind::Natural => JoinFlags::NATURAL,
                TokenKind::Left => JoinFlags::LEFT | JoinFlags::OUTER,
                TokenKind::Right => JoinFlags::RIGHT | JoinFlags::OUTER,
                TokenKind::Full => JoinFlags::LEFT | JoinFlags::RIGHT | JoinFlags::OUTER,
                _ => JoinFlags::OUTER,
            };
            words.push(self.current_text());
            self.advance();
        }

        let outer_only = (flags & (JoinFlags::OUTER | JoinFlags::LEFT | JoinFlags::RIGHT))
            == JoinFlags::OUTER;
        if flags.contains(JoinFlags::INNER | JoinFlags::OUTER) || outer_only {
            let message = format!("unknown join type: {}", words.join(" "));
            return Err(self.invalid_at(start, message));
        }

        self.expect(TokenKind::Join)?;
        Ok(Some(flags))
    }

    /// Parse one FROM term and append it; a leading parenthesized join
    /// list with nothing attached is flattened into `from`.
    fn parse_src_item(&mut self, from: &mut SrcList, join_type: JoinFlags) -> Result<()> {
        let mut item = if self.match_token(TokenKind::LParen) {
            if self.starts_select() {
                let select = self.parse_select()?;
                self.expect(TokenKind::RParen)?;
                let mut item = SrcItem::subquery(select);
                item.alias = self.parse_alias()?;
                item
            } else {
                let mut inner = self.parse_from_clause()?;
                self.expect(TokenKind::RParen)?;
                let alias = self.parse_alias()?;
                let constraint = self.parse_join_constraint()?;

                if from.is_empty() && alias.is_none() && constraint.is_none() {
                    from.items.append(&mut inner.items);
                    return Ok(());
                }

                let mut item = match inner.items.pop() {
                    Some(single) if inner.items.is_empty() => SrcItem {
                        func_args: single.func_args,
                        ..SrcItem::from_source(single.source)
                    },
                    last => {
                        inner.items.extend(last);
                        let mut select = Select::star_from(inner);
                        select.flags |= SelectFlags::NESTED_FROM;
                        SrcItem::subquery(select)
                    }
                };
                item.alias = alias;
                item.constraint = constraint;
                return self.push_src_item(from, item, join_type);
            }
        } else {
            let name = self.parse_qualified_name()?;
            let mut item = SrcItem::table(name);
            if self.match_token(TokenKind::LParen) {
                if !self.check(TokenKind::RParen) {
                    item.func_args = Some(self.parse_expr_list()?);
                }
                self.expect(TokenKind::RParen)?;
                item.alias = self.parse_alias()?;
            } else {
                item.alias = self.parse_alias()?;
                item.indexed_by = self.parse_indexed_by()?;
            }
            item
        };

        item.constraint = self.parse_join_constraint()?;
        self.push_src_item(from, item, join_type)
    }

    fn push_src_item(&self, from: &mut SrcList, mut item: SrcItem, join_type: JoinFlags) -> Result<()> {
        if from.is_empty() {
            if let Some(constraint) = &item.constraint {
                let clause = match constraint {
                    JoinConstraint::On(_) => "ON",
                    JoinConstraint::Using(_) => "USING",
                };
                return Err(self.invalid(format!("a JOIN clause is required before {}", clause)));
            }
        }
        item.join_type = join_type;
        from.items.push(item);
        Ok(())
    }

    fn parse_indexed_by(&mut self) -> Result<Option<IndexedBy>> {
        if self.match_token(TokenKind::Indexed) {
            self.expect(TokenKind::By)?;
            Ok(Some(IndexedBy::Index(self.expect_name()?)))
        } else if self.check(TokenKind::Not) && self.peek().kind == TokenKind::Indexed {
            self.advance();
            self.advance();
            Ok(Some(IndexedBy::NotIndexed))
        } else {
            Ok(None)
        }
    }

    fn parse_join_constraint(&mut self) -> Result<Option<JoinConstraint>> {
        if self.match_token(TokenKind::On) {
            Ok(Some(JoinConstraint::On(Box::new(self.parse_expr()?))))
        } else if self.match_token(TokenKind::Using) {
            self.expect(TokenKind::LParen)?;
            let columns = self.parse_name_list()?;
            self.expect(TokenKind::RParen)?;
            Ok(Some(JoinConstraint::Using(columns)))
        } else {
            Ok(None)
        }
    }

    // ========================================================================
    // Windows
    // ========================================================================

    /// Named windows of a WINDOW clause, in declaration order.
    ///
    /// A definition based on an earlier one inherits its PARTITION BY and
    /// ORDER BY.
    fn parse_window_defs(&mut self) -> Result<Vec<Window>> {
        let mut defs: Vec<Window> = Vec::new();
        let mut implicit_frames: Vec<bool> = Vec::new();

        loop {
            let name = self.expect_name()?;
            self.expect(TokenKind::As)?;
            self.expect(TokenKind::LParen)?;
            let (mut window, implicit_frame) = self.parse_window_body()?;
            self.expect(TokenKind::RParen)?;
            window.name = Some(name);

            if !defs.is_empty() {
                self.inherit_window(&mut window, &defs, &implicit_frames)?;
            }
            defs.push(window);
            implicit_frames.push(implicit_frame);

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        Ok(defs)
    }

    fn inherit_window(&self, window: &mut Window, defs: &[Window], implicit_frames: &[bool]) -> Result<()> {
        let Some(base) = window.base.clone() else {
            return Ok(());
        };

        let found = defs.iter().zip(implicit_frames).find(|(def, _)| {
            def.name
                .as_deref()
                .map_or(false, |name| name.eq_ignore_ascii_case(&base))
        });
        let Some((existing, &implicit_frame)) = found else {
            return Err(self.invalid(format!("no such window: {}", base)));
        };

        let conflict = if window.partition_by.is_some() {
            Some("PARTITION clause")
        } else if existing.order_by.is_some() && window.order_by.is_some() {
            Some("ORDER BY clause")
        } else if !implicit_frame {
            Some("frame specification")
        } else {
            None
        };
        if let Some(clause) = conflict {
            return Err(self.invalid(format!("cannot override {} of window: {}", clause, base)));
        }

        window.partition_by = existing.partition_by.clone();
        if existing.order_by.is_some() {
            window.order_by = existing.order_by.clone();
        }
        window.base = None;
        Ok(())
    }

    /// Body of `OVER (...)` or of a WINDOW definition; the flag reports
    /// whether the frame was left implicit
    fn parse_window_body(&mut self) -> Result<(Window, bool)> {
        let mut window = Window::default();

        let kind = self.current().kind;
        if is_name(kind)
            && !matches!(
                kind,
                TokenKind::Partition | TokenKind::Rows | TokenKind::Range | TokenKind::Groups
            )
        {
            window.base = Some(self.expect_name()?);
        }

        if self.match_token(TokenKind::Partition) {
            self.expect(TokenKind::By)?;
            window.partition_by = Some(self.parse_expr_list()?);
        }

        if self.match_token(TokenKind::Order) {
            self.expect(TokenKind::By)?;
            window.order_by = Some(self.parse_sort_list()?);
        }

        let (frame, implicit) = match self.parse_frame()? {
            Some(frame) => (frame, false),
            None => (WindowFrame::implicit(), true),
        };
        window.frame = Some(frame);
        Ok((window, implicit))
    }

    fn parse_frame(&mut self) -> Result<Option<WindowFrame>> {
        let mode = match self.current().kind {
            TokenKind::Rows => FrameMode::Rows,
            TokenKind::Range => FrameMode::Range,
            TokenKind::Groups => FrameMode::Groups,
            _ => return Ok(None),
        };
        self.advance();

        let (start, end) = if self.match_token(TokenKind::Between) {
            let start = self.parse_frame_bound(true)?;
            self.expect(TokenKind::And)?;
            let end = self.parse_frame_bound(false)?;
            (start, end)
        } else {
            let start = self.parse_frame_bound(true)?;
            (start, FrameBound::new(BoundKind::CurrentRow))
        };

        let exclude = if self.match_token(TokenKind::Exclude) {
            Some(self.parse_frame_exclude()?)
        } else {
            None
        };

        let unsupported = matches!(
            (start.kind, end.kind),
            (BoundKind::CurrentRow, BoundKind::Preceding)
                | (BoundKind::Following, BoundKind::Preceding)
                | (BoundKind::Following, BoundKind::CurrentRow)
        );
        if unsupported {
            return Err(self.invalid("unsupported frame specification"));
        }

        Ok(Some(WindowFrame {
            mode,
            start,
            end,
            exclude,
        }))
    }

    /// A frame start may be UNBOUNDED PRECEDING, a frame end UNBOUNDED
    /// FOLLOWING; never the other way round
    fn parse_frame_bound(&mut self, is_start: bool) -> Result<FrameBound> {
        if self.match_token(TokenKind::Unbounded) {
            self.expect(if is_start {
                TokenKind::Preceding
            } else {
                TokenKind::Following
            })?;
            return Ok(FrameBound::new(BoundKind::Unbounded));
        }

        if self.check(TokenKind::Current) && self.peek().kind == TokenKind::Row {
            self.advance();
            self.advance();
            return Ok(FrameBound::new(BoundKind::CurrentRow));
        }

        let expr = self.parse_expr()?;
        let kind = if self.match_token(TokenKind::Preceding) {
            BoundKind::Preceding
        } else if self.match_token(TokenKind::Following) {
            BoundKind::Following
        } else {
            return Err(self.error());
        };
        Ok(FrameBound {
            kind,
            expr: Some(Box::new(expr)),
        })
    }

    fn parse_frame_exclude(&mut self) -> Result<FrameExclude> {
        let exclude = match self.current().kind {
            TokenKind::No if self.peek().kind == TokenKind::Others => {
                self.advance();
                FrameExclude::NoOthers
            }
            TokenKind::Current if self.peek().kind == TokenKind::Row => {
                self.advance();
                FrameExclude::CurrentRow
            }
            TokenKind::Group => FrameExclude::Group,
            TokenKind::Ties => FrameExclude::Ties,
            _ => return Err(self.error()),
        };
        self.advance();
        Ok(exclude)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expr(&mut self) -> Result<Expr> {
        self.nested(Self::parse_or_expr)
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        let mut height = left.height();

        while self.match_token(TokenKind::Or) {
            let right = self.parse_and_expr()?;
            height = self.check_height(height.max(right.height()) + 1)?;
            left = Expr::binary(Opcode::OR, left, right);
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;
        let mut height = left.height();

        while self.match_token(TokenKind::And) {
            let right = self.parse_not_expr()?;
            // a side that is always false (`x IN ()`) folds the whole AND
            if is_always_false(&left) || is_always_false(&right) {
                left = Expr::integer("0");
                height = 1;
            } else {
                height = self.check_height(height.max(right.height()) + 1)?;
                left = Expr::binary(Opcode::AND, left, right);
            }
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.match_token(TokenKind::Not) {
            let operand = self.nested(Self::parse_not_expr)?;
            self.check_height(operand.height() + 1)?;
            return Ok(Expr::not(operand));
        }

        self.parse_equality_expr()
    }

    /// `=`, `!=`, IS, IN, BETWEEN, LIKE and the postfix null tests, all
    /// left-associative at one level
    fn parse_equality_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational_expr()?;

        loop {
            left = match self.current().kind {
                TokenKind::Eq | TokenKind::EqEq => {
                    self.advance();
                    let right = self.parse_relational_expr()?;
                    Expr::binary(Opcode::EQ, left, right)
                }
                TokenKind::Ne | TokenKind::BangEq => {
                    self.advance();
                    let right = self.parse_relational_expr()?;
                    Expr::binary(Opcode::NE, left, right)
                }
                TokenKind::Is => {
                    self.advance();
                    self.parse_is_expr(left)?
                }
                TokenKind::Isnull => {
                    self.advance();
                    Expr::IsNull(Box::new(left))
                }
                TokenKind::Notnull => {
                    self.advance();
                    Expr::NotNull(Box::new(left))
                }
                TokenKind::Between => {
                    self.advance();
                    self.parse_between_expr(left)?
                }
                TokenKind::In => {
                    self.advance();
                    self.parse_in_expr(left, false)?
                }
                TokenKind::Like | TokenKind::Glob | TokenKind::Regexp | TokenKind::Match => {
                    self.parse_like_expr(left)?
                }
                TokenKind::Not => match self.peek().kind {
                    TokenKind::Null => {
                        self.advance();
                        self.advance();
                        Expr::NotNull(Box::new(left))
                    }
                    TokenKind::Between => {
                        self.advance();
                        self.advance();
                        Expr::not(self.parse_between_expr(left)?)
                    }
                    TokenKind::In => {
                        self.advance();
                        self.advance();
                        self.parse_in_expr(left, true)?
                    }
                    TokenKind::Like | TokenKind::Glob | TokenKind::Regexp | TokenKind::Match => {
                        self.advance();
                        Expr::not(self.parse_like_expr(left)?)
                    }
                    _ => break,
                },
                _ => break,
            };
            self.check_height(left.height())?;
        }

        Ok(left)
    }

    /// Right side of IS; comparing with NULL becomes a null test
    fn parse_is_expr(&mut self, left: Expr) -> Result<Expr> {
        let negated = self.match_token(TokenKind::Not);
        let distinct = if self.match_token(TokenKind::Distinct) {
            self.expect(TokenKind::From)?;
            true
        } else {
            false
        };
        // IS DISTINCT FROM means IS NOT
        let is_not = negated != distinct;

        let right = self.parse_relational_expr()?;
        if right == Expr::Null {
            return Ok(if is_not {
                Expr::NotNull(Box::new(left))
            } else {
                Expr::IsNull(Box::new(left))
            });
        }

        let op = if is_not { Opcode::ISNOT } else { Opcode::IS };
        Ok(Expr::binary(op, left, right))
    }

    fn parse_between_expr(&mut self, expr: Expr) -> Result<Expr> {
        let low = self.parse_relational_expr()?;
        self.expect(TokenKind::And)?;
        let high = self.parse_relational_expr()?;
        Ok(Expr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
        })
    }

    /// `x LIKE y ESCAPE z` is the call `like(y, x, z)`, named by the
    /// operator as written
    fn parse_like_expr(&mut self, left: Expr) -> Result<Expr> {
        let name = self.current_text().to_string();
        self.advance();

        let pattern = self.parse_relational_expr()?;
        let mut args = ExprList::from_exprs([pattern, left]);
        if self.match_token(TokenKind::Escape) {
            args.push(self.parse_bitwise_expr()?);
        }

        Ok(Expr::Function(Box::new(FunctionCall::new(name, Some(args)))))
    }

    fn parse_in_expr(&mut self, left: Expr, negated: bool) -> Result<Expr> {
        let expr = if self.match_token(TokenKind::LParen) {
            if self.starts_select() {
                let select = self.parse_select()?;
                self.expect(TokenKind::RParen)?;
                Expr::In {
                    expr: Box::new(left),
                    rhs: InRhs::Select(Box::new(select)),
                }
            } else if self.match_token(TokenKind::RParen) {
                return Ok(Expr::Boolean(negated));
            } else {
                let list = self.parse_expr_list()?;
                self.expect(TokenKind::RParen)?;
                self.build_in_list(left, list)?
            }
        } else {
            // x IN table
            let mut item = SrcItem::table(self.parse_qualified_name()?);
            if self.match_token(TokenKind::LParen) {
                if !self.check(TokenKind::RParen) {
                    item.func_args = Some(self.parse_expr_list()?);
                }
                self.expect(TokenKind::RParen)?;
            }
            let mut from = SrcList::new();
            from.items.push(item);
            Expr::In {
                expr: Box::new(left),
                rhs: InRhs::Select(Box::new(Select::star_from(from))),
            }
        };

        Ok(if negated { Expr::not(expr) } else { expr })
    }

    fn build_in_list(&self, left: Expr, mut list: ExprList) -> Result<Expr> {
        let is_vector = matches!(left, Expr::Vector(_));

        if list.len() == 1 {
            match list.items.pop() {
                // x IN (c) is x = +c
                Some(ExprListItem { mut expr, .. }) if !is_vector && expr.is_constant() => {
                    fold_true_false(&mut expr);
                    let value = Expr::unary(UnaryOp::Pos, expr);
                    return Ok(Expr::binary(Opcode::EQ, left, value));
                }
                Some(ExprListItem {
                    expr: Expr::Subquery(select),
                    ..
                }) => {
                    return Ok(Expr::In {
                        expr: Box::new(left),
                        rhs: InRhs::Select(select),
                    });
                }
                item => list.items.extend(item),
            }
        }

        if let Expr::Vector(columns) = &left {
            let values = self.in_values(columns.len(), list)?;
            return Ok(Expr::In {
                expr: Box::new(left),
                rhs: InRhs::Select(Box::new(values)),
            });
        }

        Ok(Expr::In {
            expr: Box::new(left),
            rhs: InRhs::List(list),
        })
    }

    /// Rows of `(a, b) IN ((1, 2), (3, 4))` as a VALUES chain
    fn in_values(&self, width: usize, list: ExprList) -> Result<Select> {
        let mut root: Option<Select> = None;

        for item in list.items {
            let row = match item.expr {
                Expr::Vector(row) if row.len() == width => row,
                other => {
                    let terms = match &other {
                        Expr::Vector(row) => row.len(),
                        _ => 1,
                    };
                    return Err(self.invalid(format!(
                        "IN(...) element has {} term{} - expected {}",
                        terms,
                        if terms > 1 { "s" } else { "" },
                        width
                    )));
                }
            };

            let mut select = Select::new(row);
            select.flags = SelectFlags::VALUES;
            if let Some(prior) = root.take() {
                select.op = Some(CompoundOp::UnionAll);
                select.prior = Some(Box::new(prior));
            }
            root = Some(select);
        }

        root.ok_or_else(|| self.error())
    }

    fn parse_relational_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitwise_expr()?;
        let mut height = left.height();

        loop {
            let op = match self.current().kind {
                TokenKind::Lt => Opcode::LT,
                TokenKind::Le => Opcode::LE,
                TokenKind::Gt => Opcode::GT,
                TokenKind::Ge => Opcode::GE,
                _ => break,
            };
            self.advance();
            let right = self.parse_bitwise_expr()?;
            height = self.check_height(height.max(right.height()) + 1)?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// `&`, `|`, `<<` and `>>` share one level
    fn parse_bitwise_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive_expr()?;
        let mut height = left.height();

        loop {
            let op = match self.current().kind {
                TokenKind::Ampersand => Opcode::BITAND,
                TokenKind::Pipe => Opcode::BITOR,
                TokenKind::LtLt => Opcode::LSHIFT,
                TokenKind::GtGt => Opcode::RSHIFT,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive_expr()?;
            height = self.check_height(height.max(right.height()) + 1)?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;
        let mut height = left.height();

        loop {
            let op = match self.current().kind {
                TokenKind::Plus => Opcode::PLUS,
                TokenKind::Minus => Opcode::MINUS,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expr()?;
            height = self.check_height(height.max(right.height()) + 1)?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_concat_expr()?;
        let mut height = left.height();

        loop {
            let op = match self.current().kind {
                TokenKind::Star => Opcode::STAR,
                TokenKind::Slash => Opcode::SLASH,
                TokenKind::Percent => Opcode::REM,
                _ => break,
            };
            self.advance();
            let right = self.parse_concat_expr()?;
            height = self.check_height(height.max(right.height()) + 1)?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    /// `||`, plus the JSON operators `->` and `->>`, which become calls
    /// named after the operator
    fn parse_concat_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_collate_expr()?;
        let mut height = left.height();

        loop {
            match self.current().kind {
                TokenKind::DoublePipe => {
                    self.advance();
                    let right = self.parse_collate_expr()?;
                    height = self.check_height(height.max(right.height()) + 1)?;
                    left = Expr::binary(Opcode::CONCAT, left, right);
                }
                TokenKind::Arrow | TokenKind::LongArrow => {
                    let name = self.current_text().to_string();
                    self.advance();
                    let right = self.parse_collate_expr()?;
                    height = self.check_height(height.max(right.height()) + 1)?;
                    let args = ExprList::from_exprs([left, right]);
                    left = Expr::Function(Box::new(FunctionCall::new(name, Some(args))));
                }
                _ => break,
            }
        }

        Ok(left)
    }

    fn parse_collate_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary_expr()?;
        let mut height = expr.height();

        while self.match_token(TokenKind::Collate) {
            height = self.check_height(height + 1)?;
            let kind = self.current().kind;
            if kind != TokenKind::Identifier && kind != TokenKind::String && !kind.is_fallback_id()
            {
                return Err(self.error());
            }
            let collation = dequote(self.current_text());
            self.advance();
            expr = Expr::Collate {
                expr: Box::new(expr),
                collation,
            };
        }

        Ok(expr)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => return self.parse_primary_expr(),
        };
        self.advance();

        let operand = self.nested(Self::parse_unary_expr)?;
        self.check_height(operand.height() + 1)?;
        Ok(match operand {
            // -+x is -x
            Expr::Unary {
                op: UnaryOp::Pos,
                operand,
            } if op != UnaryOp::BitNot => Expr::Unary { op, operand },
            operand => Expr::unary(op, operand),
        })
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        let kind = self.current().kind;
        match kind {
            TokenKind::Integer => {
                let expr = Expr::integer(self.current_text());
                self.advance();
                Ok(expr)
            }
            TokenKind::Float => {
                let expr = Expr::Float(self.current_text().to_string());
                self.advance();
                Ok(expr)
            }
            TokenKind::String => {
                let expr = Expr::String(dequote(self.current_text()));
                self.advance();
                Ok(expr)
            }
            TokenKind::Blob => {
                let expr = Expr::Blob(self.current_text().to_string());
                self.advance();
                Ok(expr)
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Variable => {
                let expr = Expr::Variable(self.current_text().to_string());
                self.advance();
                Ok(expr)
            }
            TokenKind::CurrentDate | TokenKind::CurrentTime | TokenKind::CurrentTimestamp => {
                let call = FunctionCall::new(self.current_text(), None);
                self.advance();
                Ok(Expr::Function(Box::new(call)))
            }
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::Case => self.parse_case_expr(),
            TokenKind::Cast => self.parse_cast_expr(),
            TokenKind::Raise => self.parse_raise_expr(),
            TokenKind::Exists => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let select = self.parse_select()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Exists(Box::new(select)))
            }
            TokenKind::Not => self.parse_not_expr(),
            kind if is_id(kind) => self.parse_identifier_expr(),
            _ => Err(self.error()),
        }
    }

    /// Subquery, row value, or a parenthesized expression
    fn parse_paren_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;

        if self.starts_select() {
            let select = self.parse_select()?;
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::Subquery(Box::new(select)));
        }

        let first = self.parse_expr()?;
        if self.match_token(TokenKind::Comma) {
            let mut values = ExprList::from_exprs([first]);
            loop {
                values.push(self.parse_expr()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::Vector(values));
        }

        self.expect(TokenKind::RParen)?;
        Ok(first)
    }

    fn parse_case_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Case)?;

        let operand = if self.check(TokenKind::When) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };

        let mut list = ExprList::new();
        self.expect(TokenKind::When)?;
        loop {
            list.push(self.parse_expr()?);
            self.expect(TokenKind::Then)?;
            list.push(self.parse_expr()?);
            if !self.match_token(TokenKind::When) {
                break;
            }
        }

        if self.match_token(TokenKind::Else) {
            list.push(self.parse_expr()?);
        }
        self.expect(TokenKind::End)?;

        Ok(Expr::Case {
            operand,
            list: Some(list),
        })
    }

    /// CAST keeps its target type as written, e.g. `VARCHAR(10)`
    fn parse_cast_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Cast)?;
        self.expect(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::As)?;

        let start = self.current().start;
        let mut words = 0;
        while is_type_word(self.current().kind) {
            self.advance();
            words += 1;
        }
        if words > 0 && self.match_token(TokenKind::LParen) {
            self.parse_signed_number()?;
            if self.match_token(TokenKind::Comma) {
                self.parse_signed_number()?;
            }
            self.expect(TokenKind::RParen)?;
        }

        let type_name = if words == 0 {
            String::new()
        } else {
            let text = &self.source[start..self.prev_end()];
            if text.starts_with(['\'', '"', '`', '[']) {
                dequote(text)
            } else {
                text.to_string()
            }
        };
        self.expect(TokenKind::RParen)?;

        Ok(Expr::Cast {
            expr: Box::new(expr),
            type_name,
        })
    }

    fn parse_signed_number(&mut self) -> Result<()> {
        if !self.match_token(TokenKind::Plus) {
            self.match_token(TokenKind::Minus);
        }
        if self.check(TokenKind::Integer) || self.check(TokenKind::Float) {
            self.advance();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn parse_raise_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Raise)?;
        self.expect(TokenKind::LParen)?;

        let action = match self.current().kind {
            TokenKind::Ignore => RaiseAction::Ignore,
            TokenKind::Rollback => RaiseAction::Rollback,
            TokenKind::Abort => RaiseAction::Abort,
            TokenKind::Fail => RaiseAction::Fail,
            _ => return Err(self.error()),
        };
        self.advance();

        let message = if action == RaiseAction::Ignore {
            None
        } else {
            self.expect(TokenKind::Comma)?;
            Some(self.expect_name()?)
        };
        self.expect(TokenKind::RParen)?;

        Ok(Expr::Raise { action, message })
    }

    /// Column reference, `a.b`, `a.b.c`, or a function call
    fn parse_identifier_expr(&mut self) -> Result<Expr> {
        let name = dequote(self.current_text());
        self.advance();

        if self.check(TokenKind::LParen) {
            return self.parse_function_call(name);
        }

        if self.match_token(TokenKind::Dot) {
            let second = self.expect_name()?;
            let right = if self.match_token(TokenKind::Dot) {
                let third = self.expect_name()?;
                Expr::Dot {
                    left: Box::new(Expr::Id(second)),
                    right: Box::new(Expr::Id(third)),
                }
            } else {
                Expr::Id(second)
            };
            return Ok(Expr::Dot {
                left: Box::new(Expr::Id(name)),
                right: Box::new(right),
            });
        }

        Ok(Expr::Id(name))
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut call = FunctionCall::new(name, None);

        if self.match_token(TokenKind::Star) {
            self.expect(TokenKind::RParen)?;
        } else {
            if self.match_token(TokenKind::Distinct) {
                call.distinct = true;
            } else {
                self.match_token(TokenKind::All);
            }

            if !self.check(TokenKind::RParen) && !self.check(TokenKind::Order) {
                call.args = Some(self.parse_expr_list()?);
            }

            if self.match_token(TokenKind::Order) {
                self.expect(TokenKind::By)?;
                let order_by = self.parse_sort_list()?;
                // ORDER BY on an argument-less call is dropped
                if call.args.is_some() {
                    call.order_by = Some(order_by);
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        let mut filter = None;
        if self.check(TokenKind::Filter) && self.peek().kind == TokenKind::LParen {
            self.advance();
            self.advance();
            self.expect(TokenKind::Where)?;
            filter = Some(Box::new(self.parse_expr()?));
            self.expect(TokenKind::RParen)?;
        }

        let over = self.check(TokenKind::Over)
            && (self.peek().kind == TokenKind::LParen || is_name(self.peek().kind));
        if over {
            self.advance();
            let mut window = if self.match_token(TokenKind::LParen) {
                let (window, _) = self.parse_window_body()?;
                self.expect(TokenKind::RParen)?;
                window
            } else {
                Window {
                    name: Some(self.expect_name()?),
                    ..Window::default()
                }
            };
            window.filter = filter;

            if call.distinct {
                return Err(self.invalid("DISTINCT is not supported for window functions"));
            }
            if call.order_by.is_some() {
                return Err(self.invalid(format!(
                    "ORDER BY may not be used with non-aggregate {}()",
                    call.name
                )));
            }
            call.over = Some(Box::new(window));
        } else {
            call.filter = filter;
        }

        trace!(name = %call.name, window = call.over.is_some(), "function call");
        Ok(Expr::Function(Box::new(call)))
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn current_text(&self) -> &'a str {
        self.current().text(self.source)
    }

    fn peek(&self) -> &Token {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    /// A possibly quoted name; keywords that double as names are accepted
    fn expect_name(&mut self) -> Result<String> {
        if is_name(self.current().kind) {
            let name = dequote(self.current_text());
            self.advance();
            Ok(name)
        } else {
            Err(self.error())
        }
    }

    /// `AS name`, or a bare identifier or string
    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.match_token(TokenKind::As) {
            return Ok(Some(self.expect_name()?));
        }

        let is_alias = match self.current().kind {
            TokenKind::Identifier | TokenKind::String => true,
            TokenKind::Filter | TokenKind::Over => true,
            TokenKind::Window => !self.window_is_keyword(),
            kind => kind.is_fallback_id(),
        };
        if !is_alias {
            return Ok(None);
        }

        let alias = dequote(self.current_text());
        self.advance();
        Ok(Some(alias))
    }

    fn parse_qualified_name(&mut self) -> Result<QualifiedName> {
        let first = self.expect_name()?;

        if self.match_token(TokenKind::Dot) {
            let second = self.expect_name()?;
            Ok(QualifiedName::with_schema(first, second))
        } else {
            Ok(QualifiedName::new(first))
        }
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_name()?];
        while self.match_token(TokenKind::Comma) {
            names.push(self.expect_name()?);
        }
        Ok(names)
    }

    fn parse_expr_list(&mut self) -> Result<ExprList> {
        let mut list = ExprList::new();
        loop {
            list.push(self.parse_expr()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(list)
    }

    /// Ordering terms: `expr [ASC|DESC] [NULLS FIRST|LAST]`
    fn parse_sort_list(&mut self) -> Result<ExprList> {
        let mut list = ExprList::new();
        loop {
            let expr = self.parse_expr()?;

            let order = if self.match_token(TokenKind::Desc) {
                SortOrder::Desc
            } else {
                self.match_token(TokenKind::Asc);
                SortOrder::Asc
            };

            let nulls = if self.match_token(TokenKind::Nulls) {
                if self.match_token(TokenKind::First) {
                    Some(NullsOrder::First)
                } else if self.match_token(TokenKind::Last) {
                    Some(NullsOrder::Last)
                } else {
                    return Err(self.error());
                }
            } else {
                None
            };

            let item = list.push(expr);
            item.order = order;
            item.nulls = nulls;

            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        Ok(list)
    }

    fn starts_select(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Select | TokenKind::Values | TokenKind::With
        )
    }

    /// `WINDOW` opens a WINDOW clause only when followed by `name AS`
    fn window_is_keyword(&self) -> bool {
        self.check(TokenKind::Window)
            && is_name(self.peek().kind)
            && self.peek_at(2).kind == TokenKind::As
    }

    fn skip_semicolons(&mut self) {
        while self.match_token(TokenKind::Semicolon) {}
    }

    /// End offset of the last consumed token
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end
        }
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.invalid("parser stack overflow"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Pass `height` through, or fail if an expression that tall is
    /// rejected
    fn check_height(&self, height: usize) -> Result<usize> {
        if height > MAX_EXPR_DEPTH {
            return Err(self.invalid(format!(
                "Expression tree is too large (maximum depth {})",
                MAX_EXPR_DEPTH
            )));
        }
        Ok(height)
    }

    /// Error for an unexpected current token
    fn error(&self) -> Error {
        let token = self.current();
        match token.kind {
            TokenKind::Illegal => self.lex_error.clone().unwrap_or_else(|| Error::Syntax {
                near: token.text(self.source).to_string(),
                line: token.line,
                column: token.column,
            }),
            TokenKind::Eof => Error::Incomplete,
            _ => Error::Syntax {
                near: token.text(self.source).to_string(),
                line: token.line,
                column: token.column,
            },
        }
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        self.invalid_at(self.pos, message)
    }

    fn invalid_at(&self, pos: usize, message: impl Into<String>) -> Error {
        let token = &self.tokens[pos];
        Error::Invalid {
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }
}

// ============================================================================
// Token Classes
// ============================================================================

/// Tokens usable as a name: identifiers, strings, and keywords that
/// double as identifiers
fn is_name(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::String
            | TokenKind::Indexed
            | TokenKind::Filter
            | TokenKind::Over
            | TokenKind::Window
    ) || kind.is_join_keyword()
        || kind.is_fallback_id()
}

/// Tokens that start a column reference or function call
fn is_id(kind: TokenKind) -> bool {
    kind != TokenKind::String && is_name(kind)
}

fn is_type_word(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::Identifier | TokenKind::String) || kind.is_fallback_id()
}

fn is_always_false(expr: &Expr) -> bool {
    matches!(expr, Expr::Boolean(false))
}

/// Turn the identifiers `true` and `false` into boolean literals
fn fold_true_false(expr: &mut Expr) {
    match expr {
        Expr::Id(name) if name.eq_ignore_ascii_case("true") => *expr = Expr::Boolean(true),
        Expr::Id(name) if name.eq_ignore_ascii_case("false") => *expr = Expr::Boolean(false),
        Expr::Unary { operand, .. }
        | Expr::IsNull(operand)
        | Expr::NotNull(operand)
        | Expr::Truth { operand, .. } => fold_true_false(operand),
        Expr::Cast { expr, .. } | Expr::Collate { expr, .. } | Expr::Span { expr, .. } => {
            fold_true_false(expr)
        }
        Expr::Binary { left, right, .. } => {
            fold_true_false(left);
            fold_true_false(right);
        }
        Expr::Between { expr, low, high } => {
            fold_true_false(expr);
            fold_true_false(low);
            fold_true_false(high);
        }
        Expr::Case { operand, list } => {
            if let Some(operand) = operand {
                fold_true_false(operand);
            }
            for item in list.iter_mut().flat_map(|l| l.items.iter_mut()) {
                fold_true_false(&mut item.expr);
            }
        }
        Expr::Vector(list) => {
            for item in &mut list.items {
                fold_true_false(&mut item.expr);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a single SQL statement
pub fn parse(sql: &str) -> Result<Stmt> {
    let mut parser = Parser::new(sql);
    parser.next_stmt()?.ok_or(Error::Incomplete)
}

/// Parse multiple SQL statements
pub fn parse_all(sql: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(sql);
    let mut stmts = Vec::new();

    while let Some(stmt) = parser.next_stmt()? {
        stmts.push(stmt);
    }

    Ok(stmts)
}

/// Parse the first statement in `sql` and hand it to `hook` if it is a
/// query.
///
/// Like `sqlite3_prepare`, only one statement is compiled: whatever follows
/// its terminator is left unread. Leading empty statements (`;`) are
/// skipped.
pub fn parse_with_hook(sql: &str, hook: &mut dyn SelectHook) -> Result<()> {
    let mut parser = Parser::new(sql);

    match parser.next_stmt()? {
        Some(stmt) => match stmt.root_select() {
            Some(select) => hook.on_select(select),
            None => trace!("first statement has no root SELECT"),
        },
        None => trace!("no statement in input"),
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn select_of(sql: &str) -> Select {
        match parse(sql).unwrap() {
            Stmt::Select(select) => *select,
            other => panic!("expected Select, got {:?}", other),
        }
    }

    fn column(sql: &str) -> Expr {
        select_of(sql).columns.items[0].expr.clone()
    }

    fn where_of(sql: &str) -> Expr {
        *select_of(sql).where_clause.unwrap()
    }

    #[test]
    fn test_parse_simple_select() {
        let select = select_of("SELECT * FROM users");
        assert_eq!(select.columns.items[0].expr, Expr::Asterisk);
        assert_eq!(select.from.len(), 1);
        assert!(!select.is_compound());
    }

    #[test]
    fn test_parse_select_clauses() {
        let select = select_of(
            "SELECT DISTINCT a, count(*) FROM t WHERE a > 1 GROUP BY a HAVING count(*) > 2 \
             ORDER BY a DESC LIMIT 10 OFFSET 5",
        );
        assert!(select.flags.contains(SelectFlags::DISTINCT));
        assert_eq!(select.columns.len(), 2);
        assert!(select.where_clause.is_some());
        assert_eq!(select.group_by.as_ref().map(ExprList::len), Some(1));
        assert!(select.having.is_some());
        let order_by = select.order_by.unwrap();
        assert_eq!(order_by.items[0].order, SortOrder::Desc);
        let limit = select.limit.unwrap();
        assert_eq!(*limit.limit, Expr::int(10));
        assert_eq!(limit.offset.as_deref(), Some(&Expr::int(5)));
    }

    #[test]
    fn test_parse_limit_comma_swaps_operands() {
        let limit = select_of("SELECT a FROM t LIMIT 5, 10").limit.unwrap();
        assert_eq!(*limit.limit, Expr::int(10));
        assert_eq!(limit.offset.as_deref(), Some(&Expr::int(5)));
    }

    #[test]
    fn test_result_column_names() {
        let select = select_of("SELECT a AS x, b y, 'z' AS \"q\", c + 1, t.* FROM t");
        let names: Vec<_> = select.columns.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names[0], Some(EName::Name("x".to_string())));
        assert_eq!(names[1], Some(EName::Name("y".to_string())));
        assert_eq!(names[2], Some(EName::Name("q".to_string())));
        assert_eq!(names[3], Some(EName::Span("c + 1".to_string())));
        assert_eq!(names[4], None);
        assert_eq!(
            select.columns.items[4].expr,
            Expr::Dot {
                left: Box::new(Expr::id("t")),
                right: Box::new(Expr::Asterisk),
            }
        );
    }

    #[test]
    fn test_qualified_column_nests_right() {
        let expr = column("SELECT main.t.c");
        assert_eq!(
            expr,
            Expr::Dot {
                left: Box::new(Expr::id("main")),
                right: Box::new(Expr::Dot {
                    left: Box::new(Expr::id("t")),
                    right: Box::new(Expr::id("c")),
                }),
            }
        );
    }

    #[test]
    fn test_operator_precedence() {
        let expr = column("SELECT 1 + 2 * 3");
        assert_eq!(
            expr,
            Expr::binary(
                Opcode::PLUS,
                Expr::int(1),
                Expr::binary(Opcode::STAR, Expr::int(2), Expr::int(3)),
            )
        );

        let expr = where_of("SELECT 1 WHERE a = 1 OR b = 2 AND c = 3");
        match expr {
            Expr::Binary { op, right, .. } => {
                assert_eq!(op, Opcode::OR);
                assert_eq!(right.opcode(), Opcode::AND);
            }
            other => panic!("expected OR, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_plus_folds_into_minus() {
        assert_eq!(
            column("SELECT -+x"),
            Expr::unary(UnaryOp::Neg, Expr::id("x"))
        );
        assert_eq!(
            column("SELECT -5"),
            Expr::unary(UnaryOp::Neg, Expr::int(5))
        );
    }

    #[test]
    fn test_is_null_forms() {
        for sql in ["SELECT 1 WHERE a IS NULL", "SELECT 1 WHERE a ISNULL"] {
            assert_eq!(where_of(sql), Expr::IsNull(Box::new(Expr::id("a"))));
        }
        for sql in [
            "SELECT 1 WHERE a IS NOT NULL",
            "SELECT 1 WHERE a NOTNULL",
            "SELECT 1 WHERE a NOT NULL",
        ] {
            assert_eq!(where_of(sql), Expr::NotNull(Box::new(Expr::id("a"))));
        }
    }

    #[test]
    fn test_is_distinct_from() {
        assert_eq!(
            where_of("SELECT 1 WHERE a IS DISTINCT FROM b").opcode(),
            Opcode::ISNOT
        );
        assert_eq!(
            where_of("SELECT 1 WHERE a IS NOT DISTINCT FROM b").opcode(),
            Opcode::IS
        );
        assert_eq!(where_of("SELECT 1 WHERE a IS b").opcode(), Opcode::IS);
    }

    #[test]
    fn test_like_becomes_function() {
        let expr = where_of("SELECT 1 WHERE name NOT LIKE 'a%' ESCAPE '\\'");
        let Expr::Unary { op: UnaryOp::Not, operand } = expr else {
            panic!("expected NOT");
        };
        let Expr::Function(call) = *operand else {
            panic!("expected function");
        };
        assert_eq!(call.name, "LIKE");
        let args = call.args.unwrap();
        assert_eq!(args.items[0].expr, Expr::string("a%"));
        assert_eq!(args.items[1].expr, Expr::id("name"));
        assert_eq!(args.items[2].expr, Expr::string("\\"));
    }

    #[test]
    fn test_between_and_not_between() {
        let expr = where_of("SELECT 1 WHERE x NOT BETWEEN 1 AND 2 AND y");
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected AND");
        };
        assert_eq!(op, Opcode::AND);
        let Expr::Unary { op: UnaryOp::Not, operand } = *left else {
            panic!("expected NOT");
        };
        assert_eq!(operand.opcode(), Opcode::BETWEEN);
    }

    #[test]
    fn test_in_rewrites() {
        assert_eq!(where_of("SELECT 1 WHERE x IN ()"), Expr::Boolean(false));
        assert_eq!(where_of("SELECT 1 WHERE x NOT IN ()"), Expr::Boolean(true));
        assert_eq!(
            where_of("SELECT 1 WHERE x IN (5)"),
            Expr::binary(
                Opcode::EQ,
                Expr::id("x"),
                Expr::unary(UnaryOp::Pos, Expr::int(5))
            )
        );
        match where_of("SELECT 1 WHERE x IN (1, 2)") {
            Expr::In {
                rhs: InRhs::List(list),
                ..
            } => assert_eq!(list.len(), 2),
            other => panic!("expected IN list, got {:?}", other),
        }
        match where_of("SELECT 1 WHERE x IN ((SELECT y FROM t))") {
            Expr::In {
                rhs: InRhs::Select(_),
                ..
            } => {}
            other => panic!("expected IN select, got {:?}", other),
        }
    }

    #[test]
    fn test_in_always_false_folds_and() {
        assert_eq!(where_of("SELECT 1 WHERE a AND x IN ()"), Expr::int(0));
    }

    #[test]
    fn test_in_table_becomes_select_star() {
        let Expr::Unary { operand, .. } = where_of("SELECT 1 WHERE x NOT IN main.t") else {
            panic!("expected NOT");
        };
        let Expr::In {
            rhs: InRhs::Select(select),
            ..
        } = *operand
        else {
            panic!("expected IN select");
        };
        assert_eq!(select.columns.items[0].expr, Expr::Asterisk);
        assert_eq!(
            select.from.items[0].source,
            TableSource::Table(QualifiedName::with_schema("main", "t"))
        );
    }

    #[test]
    fn test_vector_in_becomes_values() {
        let Expr::In {
            rhs: InRhs::Select(values),
            ..
        } = where_of("SELECT 1 WHERE (a, b) IN ((1, 2), (3, 4))")
        else {
            panic!("expected IN select");
        };
        assert_eq!(values.branch_count(), 2);
        assert_eq!(values.op, Some(CompoundOp::UnionAll));
        assert!(values.flags.contains(SelectFlags::VALUES));
    }

    #[test]
    fn test_vector_in_term_mismatch() {
        let err = parse("SELECT 1 WHERE (a, b) IN ((1, 2), 3)").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("IN(...) element has 1 term - expected 2"));
    }

    #[test]
    fn test_paren_forms() {
        assert_eq!(column("SELECT (1)"), Expr::int(1));
        assert!(matches!(column("SELECT (1, 2)"), Expr::Vector(ref l) if l.len() == 2));
        assert!(matches!(column("SELECT (SELECT 1)"), Expr::Subquery(_)));
    }

    #[test]
    fn test_case_cast_collate() {
        let Expr::Case { operand, list } =
            column("SELECT CASE x WHEN 1 THEN 'a' WHEN 2 THEN 'b' ELSE 'c' END")
        else {
            panic!("expected CASE");
        };
        assert!(operand.is_some());
        assert_eq!(list.map(|l| l.len()), Some(5));

        assert_eq!(
            column("SELECT CAST(x AS VARCHAR(10))"),
            Expr::Cast {
                expr: Box::new(Expr::id("x")),
                type_name: "VARCHAR(10)".to_string(),
            }
        );
        assert_eq!(
            column("SELECT x COLLATE \"nocase\""),
            Expr::Collate {
                expr: Box::new(Expr::id("x")),
                collation: "nocase".to_string(),
            }
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(column("SELECT 'it''s'"), Expr::string("it's"));
        assert_eq!(column("SELECT X'00ff'"), Expr::Blob("X'00ff'".to_string()));
        assert_eq!(column("SELECT :name"), Expr::Variable(":name".to_string()));
        assert_eq!(column("SELECT 1.5"), Expr::Float("1.5".to_string()));
        assert_eq!(
            column("SELECT 99999999999"),
            Expr::Integer {
                text: "99999999999".to_string(),
                value: None,
            }
        );
        let Expr::Function(call) = column("SELECT current_timestamp") else {
            panic!("expected function");
        };
        assert_eq!(call.name, "current_timestamp");
        assert!(call.args.is_none());
    }

    #[test]
    fn test_function_calls() {
        let Expr::Function(call) = column("SELECT count(*)") else {
            panic!("expected function");
        };
        assert!(call.args.is_none());

        let Expr::Function(call) = column("SELECT group_concat(DISTINCT x ORDER BY y)") else {
            panic!("expected function");
        };
        assert!(call.distinct);
        assert_eq!(call.args.map(|a| a.len()), Some(1));
        assert_eq!(call.order_by.map(|o| o.len()), Some(1));

        let Expr::Function(call) = column("SELECT count(x) FILTER (WHERE x > 0)") else {
            panic!("expected function");
        };
        assert!(call.filter.is_some());
        assert!(call.over.is_none());
    }

    #[test]
    fn test_json_arrow_is_function() {
        let Expr::Function(call) = column("SELECT data ->> '$.a'") else {
            panic!("expected function");
        };
        assert_eq!(call.name, "->>");
        assert_eq!(call.args.map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_window_function() {
        let Expr::Function(call) = column(
            "SELECT sum(x) FILTER (WHERE x > 0) OVER (PARTITION BY g ORDER BY y)",
        ) else {
            panic!("expected function");
        };
        assert!(call.filter.is_none());
        let window = call.over.unwrap();
        assert!(window.filter.is_some());
        assert_eq!(window.partition_by.map(|p| p.len()), Some(1));
        assert_eq!(window.frame, Some(WindowFrame::implicit()));

        let Expr::Function(call) = column("SELECT rank() OVER w") else {
            panic!("expected function");
        };
        let window = call.over.unwrap();
        assert_eq!(window.name.as_deref(), Some("w"));
        assert!(window.frame.is_none());
    }

    #[test]
    fn test_window_frames() {
        let Expr::Function(call) = column(
            "SELECT sum(x) OVER (ORDER BY y ROWS BETWEEN 1 PRECEDING AND UNBOUNDED FOLLOWING \
             EXCLUDE NO OTHERS)",
        ) else {
            panic!("expected function");
        };
        let frame = call.over.unwrap().frame.unwrap();
        assert_eq!(frame.mode, FrameMode::Rows);
        assert_eq!(frame.start.kind, BoundKind::Preceding);
        assert_eq!(frame.start.expr.as_deref(), Some(&Expr::int(1)));
        assert_eq!(frame.end.kind, BoundKind::Unbounded);
        assert_eq!(frame.exclude, Some(FrameExclude::NoOthers));

        let Expr::Function(call) = column("SELECT sum(x) OVER (GROUPS 2 PRECEDING)") else {
            panic!("expected function");
        };
        let frame = call.over.unwrap().frame.unwrap();
        assert_eq!(frame.end.kind, BoundKind::CurrentRow);
    }

    #[test]
    fn test_window_frame_errors() {
        let err = parse("SELECT sum(x) OVER (ROWS BETWEEN CURRENT ROW AND 1 PRECEDING)")
            .unwrap_err();
        assert!(err.to_string().starts_with("unsupported frame specification"));

        let err = parse("SELECT sum(x) OVER (ROWS UNBOUNDED FOLLOWING)").unwrap_err();
        assert!(matches!(err, Error::Syntax { ref near, .. } if near == "FOLLOWING"));
    }

    #[test]
    fn test_window_function_errors() {
        let err = parse("SELECT count(DISTINCT x) OVER ()").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("DISTINCT is not supported for window functions"));

        let err = parse("SELECT sum(x ORDER BY y) OVER ()").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("ORDER BY may not be used with non-aggregate sum()"));
    }

    #[test]
    fn test_window_clause_inherits_base() {
        let select = select_of(
            "SELECT sum(x) OVER b FROM t WINDOW a AS (PARTITION BY g), b AS (a ORDER BY y)",
        );
        assert_eq!(select.window_defs.len(), 2);
        let b = &select.window_defs[1];
        assert_eq!(b.name.as_deref(), Some("b"));
        assert!(b.base.is_none());
        assert_eq!(b.partition_by, select.window_defs[0].partition_by);
        assert!(b.order_by.is_some());

        let err = parse("SELECT 1 FROM t WINDOW a AS (ROWS 1 PRECEDING), b AS (a)").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("cannot override frame specification of window: a"));
    }

    #[test]
    fn test_window_as_identifier() {
        let select = select_of("SELECT window FROM t window");
        assert_eq!(select.columns.items[0].expr, Expr::id("window"));
        assert_eq!(select.from.items[0].alias.as_deref(), Some("window"));
    }

    #[test]
    fn test_compound_chain() {
        let select = select_of("SELECT 1 UNION ALL SELECT 2 EXCEPT SELECT 3 ORDER BY 1");
        assert_eq!(select.branch_count(), 3);
        assert_eq!(select.op, Some(CompoundOp::Except));
        assert!(select.order_by.is_some());
        let middle = select.prior.as_deref().unwrap();
        assert_eq!(middle.op, Some(CompoundOp::UnionAll));
        assert_eq!(middle.prior.as_deref().unwrap().op, None);
    }

    #[test]
    fn test_compound_order_by_misplaced() {
        let err = parse("SELECT 1 ORDER BY 1 UNION SELECT 2").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("ORDER BY clause should come after UNION not before"));

        let err = parse("SELECT 1 LIMIT 1 INTERSECT SELECT 2").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("LIMIT clause should come after INTERSECT not before"));
    }

    #[test]
    fn test_too_many_compound_terms() {
        let sql = vec!["SELECT 1"; MAX_COMPOUND_SELECT + 1].join(" UNION ");
        let err = parse(&sql).unwrap_err();
        assert!(err.to_string().starts_with("too many terms in compound SELECT"));

        let sql = vec!["SELECT 1"; MAX_COMPOUND_SELECT].join(" UNION ");
        assert!(parse(&sql).is_ok());
    }

    #[test]
    fn test_values() {
        let select = select_of("VALUES (1, 2), (3, 4), (5, 6)");
        assert_eq!(select.branch_count(), 3);
        assert!(select.flags.contains(SelectFlags::VALUES | SelectFlags::MULTI_VALUE));

        let select = select_of("SELECT 1 UNION VALUES (2), (3)");
        assert_eq!(select.branch_count(), 2);
        assert_eq!(select.op, Some(CompoundOp::Union));
        assert!(matches!(
            select.from.items[0].source,
            TableSource::Subquery(ref values) if values.branch_count() == 2
        ));
    }

    #[test]
    fn test_with_clause() {
        let select = select_of(
            "WITH RECURSIVE c(n) AS NOT MATERIALIZED (SELECT 1), d AS MATERIALIZED (SELECT 2) \
             SELECT n FROM c",
        );
        let with = select.with.unwrap();
        assert!(with.recursive);
        assert_eq!(with.ctes[0].columns, Some(vec!["n".to_string()]));
        assert_eq!(with.ctes[0].materialized, Materialized::No);
        assert_eq!(with.ctes[1].materialized, Materialized::Yes);

        let err = parse("WITH a AS (SELECT 1), A AS (SELECT 2) SELECT 1").unwrap_err();
        assert!(err.to_string().starts_with("duplicate WITH table name: A"));
    }

    #[test]
    fn test_join_types() {
        let select = select_of(
            "SELECT * FROM a, b JOIN c LEFT OUTER JOIN d USING (id) NATURAL FULL JOIN e \
             CROSS JOIN f ON 1",
        );
        let flags: Vec<_> = select.from.items.iter().map(|i| i.join_type).collect();
        assert_eq!(flags[0], JoinFlags::empty());
        assert_eq!(flags[1], JoinFlags::empty());
        assert_eq!(flags[2], JoinFlags::INNER);
        assert_eq!(flags[3], JoinFlags::LEFT | JoinFlags::OUTER);
        assert_eq!(
            flags[4],
            JoinFlags::NATURAL | JoinFlags::LEFT | JoinFlags::RIGHT | JoinFlags::OUTER
        );
        assert_eq!(flags[5], JoinFlags::INNER | JoinFlags::CROSS);
        assert_eq!(
            select.from.items[3].constraint,
            Some(JoinConstraint::Using(vec!["id".to_string()]))
        );
    }

    #[test]
    fn test_unknown_join_type() {
        let err = parse("SELECT * FROM a INNER OUTER JOIN b").unwrap_err();
        assert!(err.to_string().starts_with("unknown join type: INNER OUTER"));
    }

    #[test]
    fn test_on_requires_join() {
        let err = parse("SELECT * FROM a ON 1").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("a JOIN clause is required before ON"));
    }

    #[test]
    fn test_from_items() {
        let select = select_of(
            "SELECT * FROM main.t AS x INDEXED BY i, generate_series(1, 10) g, (SELECT 1) s",
        );
        let items = &select.from.items;
        assert_eq!(
            items[0].source,
            TableSource::Table(QualifiedName::with_schema("main", "t"))
        );
        assert_eq!(items[0].alias.as_deref(), Some("x"));
        assert_eq!(items[0].indexed_by, Some(IndexedBy::Index("i".to_string())));
        assert_eq!(items[1].func_args.as_ref().map(ExprList::len), Some(2));
        assert_eq!(items[1].alias.as_deref(), Some("g"));
        assert!(items[2].subquery_select().is_some());
    }

    #[test]
    fn test_parenthesized_from() {
        // leading join list is flattened
        let select = select_of("SELECT * FROM (a JOIN b)");
        assert_eq!(select.from.len(), 2);

        // single item is unwrapped under the new alias
        let select = select_of("SELECT * FROM x, (t AS inner_alias) AS outer_alias");
        assert_eq!(select.from.len(), 2);
        assert_eq!(select.from.items[1].alias.as_deref(), Some("outer_alias"));
        assert_eq!(
            select.from.items[1].source,
            TableSource::Table(QualifiedName::new("t"))
        );

        // several items become a nested subquery
        let select = select_of("SELECT * FROM x JOIN (a JOIN b) ON 1");
        let nested = select.from.items[1].subquery_select().unwrap();
        assert!(nested.flags.contains(SelectFlags::NESTED_FROM));
        assert_eq!(nested.from.len(), 2);
    }

    #[test]
    fn test_explain_and_other_statements() {
        let stmts = parse_all(
            "CREATE TABLE t(a, b); EXPLAIN QUERY PLAN SELECT a FROM t; \
             CREATE TRIGGER tr AFTER INSERT ON t BEGIN SELECT CASE WHEN 1 THEN 2 END; END; \
             INSERT INTO t VALUES (1, 2)",
        )
        .unwrap();
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[0], Stmt::Other(ref s) if s == "CREATE TABLE t(a, b)"));
        assert!(matches!(stmts[1], Stmt::Explain { query_plan: true, .. }));
        assert!(stmts[1].root_select().is_some());
        assert!(matches!(stmts[2], Stmt::Other(ref s) if s.ends_with("END; END")));
        assert!(stmts[3].root_select().is_none());
    }

    #[test]
    fn test_with_before_other_statement_is_skipped() {
        let stmt = parse("WITH x AS (SELECT 1) DELETE FROM t").unwrap();
        assert!(matches!(stmt, Stmt::Other(ref s) if s.starts_with("WITH x")));
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse("SELECT FROM t").unwrap_err();
        assert_eq!(
            err,
            Error::Syntax {
                near: "FROM".to_string(),
                line: 1,
                column: 8,
            }
        );

        assert_eq!(parse("SELECT 1 +").unwrap_err(), Error::Incomplete);
        assert!(matches!(
            parse("SELECT 1 2").unwrap_err(),
            Error::Syntax { ref near, .. } if near == "2"
        ));
        assert!(matches!(
            parse("SELECT 'abc").unwrap_err(),
            Error::UnrecognizedToken { .. }
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("SELECT {}1{}", "(".repeat(150), ")".repeat(150));
        let err = parse(&deep).unwrap_err();
        assert!(err.to_string().starts_with("parser stack overflow"));

        let shallow = format!("SELECT {}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse(&shallow).is_ok());
    }

    fn plus_chain(terms: usize) -> String {
        format!("SELECT 1{}", "+1".repeat(terms - 1))
    }

    #[test]
    fn test_expression_height_limit() {
        let expr = column(&plus_chain(1000));
        assert_eq!(expr.height(), 1000);

        let err = parse(&plus_chain(1001)).unwrap_err();
        match err {
            Error::Invalid { message, line, .. } => {
                assert_eq!(message, "Expression tree is too large (maximum depth 1000)");
                assert_eq!(line, 1);
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_expression_height_limit_every_operator_level() {
        let chains = [
            format!("SELECT a{}", " OR a".repeat(1000)),
            format!("SELECT a{}", " AND a".repeat(1000)),
            format!("SELECT a{}", " ISNULL".repeat(1000)),
            format!("SELECT a{}", " < a".repeat(1000)),
            format!("SELECT a{}", " | a".repeat(1000)),
            format!("SELECT a{}", " * a".repeat(1000)),
            format!("SELECT a{}", " || a".repeat(1000)),
            format!("SELECT a{}", " -> a".repeat(1000)),
            format!("SELECT a{}", " COLLATE x".repeat(1000)),
        ];
        for sql in &chains {
            let err = parse(sql).unwrap_err();
            assert!(
                err.to_string().starts_with("Expression tree is too large"),
                "{}: {}",
                &sql[..20],
                err
            );
        }
    }

    #[test]
    fn test_expression_height_spans_subqueries() {
        let inner = format!("(SELECT 1{})", "+1".repeat(998));
        assert!(parse(&format!("SELECT {}", inner)).is_ok());
        let err = parse(&format!("SELECT {}+1", inner)).unwrap_err();
        assert!(err.to_string().starts_with("Expression tree is too large"));
    }

    #[test]
    fn test_very_long_chain_is_rejected() {
        let err = parse(&plus_chain(200_000)).unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    struct Collect(Vec<usize>);

    impl SelectHook for Collect {
        fn on_select(&mut self, select: &Select) {
            self.0.push(select.columns.len());
        }
    }

    #[test]
    fn test_hook_sees_root_selects_only() {
        let mut hook = Collect(Vec::new());
        parse_with_hook("CREATE VIEW v AS SELECT 1, 2, 3; SELECT a", &mut hook).unwrap();
        assert!(hook.0.is_empty());

        let mut hook = Collect(Vec::new());
        parse_with_hook("SELECT a, b WHERE x IN (SELECT 1)", &mut hook).unwrap();
        assert_eq!(hook.0, vec![2]);

        let mut hook = Collect(Vec::new());
        parse_with_hook(";; EXPLAIN SELECT a", &mut hook).unwrap();
        assert_eq!(hook.0, vec![1]);
    }

    #[test]
    fn test_hook_parses_first_statement_only() {
        let mut hook = Collect(Vec::new());
        parse_with_hook("SELECT a; SELECT a, b", &mut hook).unwrap();
        assert_eq!(hook.0, vec![1]);

        // the rest of the input is never read
        let mut hook = Collect(Vec::new());
        parse_with_hook("SELECT a, b; SELECT FROM", &mut hook).unwrap();
        assert_eq!(hook.0, vec![2]);

        let mut hook = Collect(Vec::new());
        parse_with_hook("SELECT 1; SELECT 'open", &mut hook).unwrap();
        assert_eq!(hook.0, vec![1]);
    }

    #[test]
    fn test_hook_not_called_for_bad_statement() {
        let mut hook = Collect(Vec::new());
        let result = parse_with_hook("SELECT a, b garbage here", &mut hook);
        assert!(result.is_err());
        assert!(hook.0.is_empty());

        let mut hook = Collect(Vec::new());
        let result = parse_with_hook("SELECT 'open", &mut hook);
        assert!(matches!(result, Err(Error::UnrecognizedToken { .. })));
        assert!(hook.0.is_empty());
    }
}
