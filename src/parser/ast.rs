//! Abstract Syntax Tree
//!
//! The raw tree the grammar builds for a SELECT statement. Nothing here is
//! resolved: names are plain strings, compound selects are a chain of
//! branches linked from right to left, and grammar rewrites (LIKE as an
//! infix function, `x IN (c)` as an equality) are kept as produced.

use std::fmt;

use bitflags::bitflags;

// ============================================================================
// Core Types
// ============================================================================

/// A qualified name (optional schema.name)
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        QualifiedName {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        QualifiedName {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref schema) = self.schema {
            write!(f, "{}.{}", schema, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Explicit NULLS FIRST / NULLS LAST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            NullsOrder::First => "FIRST",
            NullsOrder::Last => "LAST",
        }
    }
}

// ============================================================================
// Opcodes
// ============================================================================

/// Raw numeric node opcode.
///
/// Every expression reports one; binary nodes keep the opcode of the
/// operator token they were built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const NOT: Opcode = Opcode(19);
    pub const EXISTS: Opcode = Opcode(20);
    pub const CAST: Opcode = Opcode(36);
    pub const OR: Opcode = Opcode(43);
    pub const AND: Opcode = Opcode(44);
    pub const IS: Opcode = Opcode(45);
    pub const MATCH: Opcode = Opcode(46);
    pub const LIKE_KW: Opcode = Opcode(47);
    pub const BETWEEN: Opcode = Opcode(48);
    pub const IN: Opcode = Opcode(49);
    pub const ISNULL: Opcode = Opcode(50);
    pub const NOTNULL: Opcode = Opcode(51);
    pub const NE: Opcode = Opcode(52);
    pub const EQ: Opcode = Opcode(53);
    pub const GT: Opcode = Opcode(54);
    pub const LE: Opcode = Opcode(55);
    pub const LT: Opcode = Opcode(56);
    pub const GE: Opcode = Opcode(57);
    pub const ID: Opcode = Opcode(59);
    pub const RAISE: Opcode = Opcode(72);
    pub const BITAND: Opcode = Opcode(102);
    pub const BITOR: Opcode = Opcode(103);
    pub const LSHIFT: Opcode = Opcode(104);
    pub const RSHIFT: Opcode = Opcode(105);
    pub const PLUS: Opcode = Opcode(106);
    pub const MINUS: Opcode = Opcode(107);
    pub const STAR: Opcode = Opcode(108);
    pub const SLASH: Opcode = Opcode(109);
    pub const REM: Opcode = Opcode(110);
    pub const CONCAT: Opcode = Opcode(111);
    pub const PTR: Opcode = Opcode(112);
    pub const COLLATE: Opcode = Opcode(113);
    pub const BITNOT: Opcode = Opcode(114);
    pub const STRING: Opcode = Opcode(117);
    pub const NULL: Opcode = Opcode(122);
    pub const SELECT: Opcode = Opcode(139);
    pub const DOT: Opcode = Opcode(142);
    pub const FLOAT: Opcode = Opcode(154);
    pub const BLOB: Opcode = Opcode(155);
    pub const INTEGER: Opcode = Opcode(156);
    pub const VARIABLE: Opcode = Opcode(157);
    pub const CASE: Opcode = Opcode(158);
    pub const TRUEFALSE: Opcode = Opcode(170);
    pub const ISNOT: Opcode = Opcode(171);
    pub const FUNCTION: Opcode = Opcode(172);
    pub const UMINUS: Opcode = Opcode(173);
    pub const UPLUS: Opcode = Opcode(174);
    pub const TRUTH: Opcode = Opcode(175);
    pub const VECTOR: Opcode = Opcode(177);
    pub const ASTERISK: Opcode = Opcode(180);
    pub const SPAN: Opcode = Opcode(181);
}

// ============================================================================
// Expressions
// ============================================================================

/// SQL expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal; `value` is set when the token fits in an `i32`
    Integer { text: String, value: Option<i32> },
    Float(String),
    /// String literal, dequoted
    String(String),
    /// Blob literal as written, including the `X'...'` quoting
    Blob(String),
    Null,
    Boolean(bool),

    /// Bare identifier
    Id(String),
    /// `left.right`; `a.b.c` nests to the right
    Dot { left: Box<Expr>, right: Box<Expr> },
    /// `*` in a result column
    Asterisk,
    /// Bound parameter, named by its full token text
    Variable(String),

    Cast { expr: Box<Expr>, type_name: String },
    /// `list` alternates WHEN and THEN expressions; an odd trailing
    /// element is the ELSE branch
    Case {
        operand: Option<Box<Expr>>,
        list: Option<ExprList>,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    In { expr: Box<Expr>, rhs: InRhs },
    Exists(Box<Select>),
    Subquery(Box<Select>),
    Collate { expr: Box<Expr>, collation: String },
    Function(Box<FunctionCall>),

    Unary { op: UnaryOp, operand: Box<Expr> },
    IsNull(Box<Expr>),
    NotNull(Box<Expr>),
    /// `operand IS [NOT] TRUE|FALSE`
    Truth {
        operand: Box<Expr>,
        negated: bool,
        value: bool,
    },
    Raise {
        action: RaiseAction,
        message: Option<String>,
    },
    /// Row value `(a, b, ...)`
    Vector(ExprList),
    /// An expression carried with the source text it was parsed from
    Span { text: String, expr: Box<Expr> },
    Binary {
        op: Opcode,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Integer literal from its token text
    pub fn integer(text: impl Into<String>) -> Self {
        let text = text.into();
        let value = int32_value(&text);
        Expr::Integer { text, value }
    }

    pub fn int(value: i32) -> Self {
        Expr::Integer {
            text: value.to_string(),
            value: Some(value),
        }
    }

    pub fn id(name: impl Into<String>) -> Self {
        Expr::Id(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::String(value.into())
    }

    pub fn binary(op: Opcode, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn not(operand: Expr) -> Self {
        Expr::unary(UnaryOp::Not, operand)
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Expr::Integer { .. } => Opcode::INTEGER,
            Expr::Float(_) => Opcode::FLOAT,
            Expr::String(_) => Opcode::STRING,
            Expr::Blob(_) => Opcode::BLOB,
            Expr::Null => Opcode::NULL,
            Expr::Boolean(_) => Opcode::TRUEFALSE,
            Expr::Id(_) => Opcode::ID,
            Expr::Dot { .. } => Opcode::DOT,
            Expr::Asterisk => Opcode::ASTERISK,
            Expr::Variable(_) => Opcode::VARIABLE,
            Expr::Cast { .. } => Opcode::CAST,
            Expr::Case { .. } => Opcode::CASE,
            Expr::Between { .. } => Opcode::BETWEEN,
            Expr::In { .. } => Opcode::IN,
            Expr::Exists(_) => Opcode::EXISTS,
            Expr::Subquery(_) => Opcode::SELECT,
            Expr::Collate { .. } => Opcode::COLLATE,
            Expr::Function(_) => Opcode::FUNCTION,
            Expr::Unary { op, .. } => op.opcode(),
            Expr::IsNull(_) => Opcode::ISNULL,
            Expr::NotNull(_) => Opcode::NOTNULL,
            Expr::Truth { .. } => Opcode::TRUTH,
            Expr::Raise { .. } => Opcode::RAISE,
            Expr::Vector(_) => Opcode::VECTOR,
            Expr::Span { .. } => Opcode::SPAN,
            Expr::Binary { op, .. } => *op,
        }
    }

    /// Whether the expression is built from literals alone.
    ///
    /// `true` and `false` count as literals even though they parse as
    /// identifiers.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Integer { .. }
            | Expr::Float(_)
            | Expr::String(_)
            | Expr::Blob(_)
            | Expr::Null
            | Expr::Boolean(_)
            | Expr::Variable(_) => true,
            Expr::Id(name) => {
                name.eq_ignore_ascii_case("true") || name.eq_ignore_ascii_case("false")
            }
            Expr::Cast { expr, .. } | Expr::Collate { expr, .. } => expr.is_constant(),
            Expr::Unary { operand, .. }
            | Expr::IsNull(operand)
            | Expr::NotNull(operand)
            | Expr::Truth { operand, .. } => operand.is_constant(),
            Expr::Span { expr, .. } => expr.is_constant(),
            Expr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::Between { expr, low, high } => {
                expr.is_constant() && low.is_constant() && high.is_constant()
            }
            Expr::Case { operand, list } => {
                operand.as_ref().map_or(true, |e| e.is_constant())
                    && list.as_ref().map_or(true, ExprList::is_constant)
            }
            Expr::Vector(list) => list.is_constant(),
            Expr::In { expr, rhs } => match rhs {
                InRhs::List(list) => expr.is_constant() && list.is_constant(),
                InRhs::Select(_) => false,
            },
            Expr::Dot { .. }
            | Expr::Asterisk
            | Expr::Exists(_)
            | Expr::Subquery(_)
            | Expr::Function(_)
            | Expr::Raise { .. } => false,
        }
    }

    /// Depth of the tree below and including this node. Subqueries count
    /// with the height of their own expressions, like SQLite's
    /// expression-height limit.
    pub fn height(&self) -> usize {
        let below = match self {
            Expr::Integer { .. }
            | Expr::Float(_)
            | Expr::String(_)
            | Expr::Blob(_)
            | Expr::Null
            | Expr::Boolean(_)
            | Expr::Id(_)
            | Expr::Asterisk
            | Expr::Variable(_)
            | Expr::Raise { .. } => 0,
            Expr::Dot { left, right } | Expr::Binary { left, right, .. } => {
                left.height().max(right.height())
            }
            Expr::Cast { expr, .. } | Expr::Collate { expr, .. } | Expr::Span { expr, .. } => {
                expr.height()
            }
            Expr::Unary { operand, .. }
            | Expr::IsNull(operand)
            | Expr::NotNull(operand)
            | Expr::Truth { operand, .. } => operand.height(),
            Expr::Case { operand, list } => operand
                .as_ref()
                .map_or(0, |e| e.height())
                .max(list.as_ref().map_or(0, ExprList::height)),
            Expr::Between { expr, low, high } => {
                expr.height().max(low.height()).max(high.height())
            }
            Expr::In { expr, rhs } => expr.height().max(match rhs {
                InRhs::List(list) => list.height(),
                InRhs::Select(select) => select.height(),
            }),
            Expr::Exists(select) | Expr::Subquery(select) => select.height(),
            Expr::Function(call) => call.height(),
            Expr::Vector(list) => list.height(),
        };
        below + 1
    }
}

/// Value of an integer token when it fits a signed 32-bit integer.
///
/// Hex literals qualify only below 0x80000000.
pub fn int32_value(text: &str) -> Option<i32> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        let digits = hex.trim_start_matches('0');
        if digits.len() > 8 {
            return None;
        }
        let value = if digits.is_empty() {
            0
        } else {
            u32::from_str_radix(digits, 16).ok()?
        };
        return i32::try_from(value).ok();
    }
    cleaned.parse::<i32>().ok()
}

/// Right-hand side of IN
#[derive(Debug, Clone, PartialEq)]
pub enum InRhs {
    Select(Box<Select>),
    List(ExprList),
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    BitNot,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "NOT",
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            UnaryOp::Neg => Opcode::UMINUS,
            UnaryOp::Pos => Opcode::UPLUS,
            UnaryOp::BitNot => Opcode::BITNOT,
            UnaryOp::Not => Opcode::NOT,
        }
    }
}

/// RAISE action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseAction {
    Ignore,
    Rollback,
    Abort,
    Fail,
}

impl RaiseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaiseAction::Ignore => "IGNORE",
            RaiseAction::Rollback => "ROLLBACK",
            RaiseAction::Abort => "ABORT",
            RaiseAction::Fail => "FAIL",
        }
    }
}

/// Function call, including aggregate and window invocations
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// `None` for `f()` and `f(*)`
    pub args: Option<ExprList>,
    pub distinct: bool,
    /// `ORDER BY` inside the argument list of an aggregate
    pub order_by: Option<ExprList>,
    pub over: Option<Box<Window>>,
    /// `FILTER (WHERE ...)` with no OVER clause; with OVER the filter
    /// lives on the window instead
    pub filter: Option<Box<Expr>>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Option<ExprList>) -> Self {
        FunctionCall {
            name: name.into(),
            args,
            distinct: false,
            order_by: None,
            over: None,
            filter: None,
        }
    }

    fn height(&self) -> usize {
        let lists = [&self.args, &self.order_by];
        let mut height = lists
            .into_iter()
            .flatten()
            .map(ExprList::height)
            .max()
            .unwrap_or(0);
        if let Some(filter) = &self.filter {
            height = height.max(filter.height());
        }
        if let Some(window) = &self.over {
            height = height.max(window.height());
        }
        height
    }
}

// ============================================================================
// Expression Lists
// ============================================================================

/// How an expression list item got its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EName {
    /// Written by the user (`AS x`)
    Name(String),
    /// Copied from the source text of the expression
    Span(String),
}

/// One slot of an expression list
#[derive(Debug, Clone, PartialEq)]
pub struct ExprListItem {
    pub expr: Expr,
    pub name: Option<EName>,
    pub order: SortOrder,
    /// Only set when NULLS FIRST/LAST was written
    pub nulls: Option<NullsOrder>,
}

impl ExprListItem {
    pub fn new(expr: Expr) -> Self {
        ExprListItem {
            expr,
            name: None,
            order: SortOrder::Asc,
            nulls: None,
        }
    }

    /// The user-given alias, ignoring span names
    pub fn alias(&self) -> Option<&str> {
        match &self.name {
            Some(EName::Name(name)) => Some(name),
            _ => None,
        }
    }
}

/// Ordered list of expressions with per-slot metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExprList {
    pub items: Vec<ExprListItem>,
}

impl ExprList {
    pub fn new() -> Self {
        ExprList::default()
    }

    pub fn from_exprs(exprs: impl IntoIterator<Item = Expr>) -> Self {
        ExprList {
            items: exprs.into_iter().map(ExprListItem::new).collect(),
        }
    }

    pub fn push(&mut self, expr: Expr) -> &mut ExprListItem {
        self.items.push(ExprListItem::new(expr));
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExprListItem> {
        self.items.iter()
    }

    fn is_constant(&self) -> bool {
        self.items.iter().all(|item| item.expr.is_constant())
    }

    /// Height of the tallest item
    pub fn height(&self) -> usize {
        self.items.iter().map(|item| item.expr.height()).max().unwrap_or(0)
    }
}

// ============================================================================
// SELECT Statement
// ============================================================================

bitflags! {
    /// Flags on a single select branch
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SelectFlags: u32 {
        const DISTINCT    = 0x0001;
        const ALL         = 0x0002;
        /// Built from a VALUES clause
        const VALUES      = 0x0200;
        /// One row of a multi-row VALUES clause
        const MULTI_VALUE = 0x0400;
        /// Synthesized for a parenthesized join in FROM
        const NESTED_FROM = 0x0800;
    }
}

/// Compound select operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    Union,
    UnionAll,
    Intersect,
    Except,
}

impl CompoundOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompoundOp::Union => "UNION",
            CompoundOp::UnionAll => "UNION ALL",
            CompoundOp::Intersect => "INTERSECT",
            CompoundOp::Except => "EXCEPT",
        }
    }
}

/// One SELECT branch.
///
/// A compound select is a chain: the rightmost branch is the root, `op`
/// joins it to the branch in `prior`, and so on back to the leftmost
/// branch, whose `op` is `None`. ORDER BY, LIMIT and WITH sit on the root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub op: Option<CompoundOp>,
    pub flags: SelectFlags,
    pub columns: ExprList,
    pub from: SrcList,
    pub where_clause: Option<Box<Expr>>,
    pub group_by: Option<ExprList>,
    pub having: Option<Box<Expr>>,
    /// WINDOW clause definitions in declaration order
    pub window_defs: Vec<Window>,
    pub order_by: Option<ExprList>,
    pub limit: Option<Limit>,
    pub with: Option<With>,
    pub prior: Option<Box<Select>>,
}

impl Select {
    pub fn new(columns: ExprList) -> Self {
        Select {
            columns,
            ..Select::default()
        }
    }

    /// `SELECT * FROM <from>`
    pub fn star_from(from: SrcList) -> Self {
        Select {
            columns: ExprList::from_exprs([Expr::Asterisk]),
            from,
            ..Select::default()
        }
    }

    pub fn is_compound(&self) -> bool {
        self.prior.is_some()
    }

    /// Number of branches in the compound chain rooted here
    pub fn branch_count(&self) -> usize {
        let mut count = 1;
        let mut cur = self;
        while let Some(prior) = cur.prior.as_deref() {
            count += 1;
            cur = prior;
        }
        count
    }

    /// Height of the tallest expression in any branch of the chain
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cur = Some(self);
        while let Some(select) = cur {
            let exprs = [&select.where_clause, &select.having];
            let lists = [&select.group_by, &select.order_by];
            height = exprs
                .into_iter()
                .flatten()
                .map(|e| e.height())
                .chain(lists.into_iter().flatten().map(ExprList::height))
                .chain(select.window_defs.iter().map(Window::height))
                .chain(select.limit.iter().map(Limit::height))
                .fold(height, usize::max)
                .max(select.columns.height())
                .max(select.from.height());
            cur = select.prior.as_deref();
        }
        height
    }
}

/// LIMIT clause
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub limit: Box<Expr>,
    pub offset: Option<Box<Expr>>,
}

impl Limit {
    fn height(&self) -> usize {
        let offset = self.offset.as_ref().map_or(0, |e| e.height());
        self.limit.height().max(offset)
    }
}

// ============================================================================
// FROM Clause
// ============================================================================

bitflags! {
    /// Join type flags, stored on the right-hand item of a join
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct JoinFlags: u8 {
        const INNER   = 0x01;
        const CROSS   = 0x02;
        const NATURAL = 0x04;
        const LEFT    = 0x08;
        const RIGHT   = 0x10;
        const OUTER   = 0x20;
    }
}

/// List of FROM items
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SrcList {
    pub items: Vec<SrcItem>,
}

impl SrcList {
    pub fn new() -> Self {
        SrcList::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Height of the tallest subquery, ON expression or function argument
    pub fn height(&self) -> usize {
        self.items
            .iter()
            .map(|item| {
                let source = match &item.source {
                    TableSource::Table(_) => 0,
                    TableSource::Subquery(select) => select.height(),
                };
                let on = match &item.constraint {
                    Some(JoinConstraint::On(expr)) => expr.height(),
                    Some(JoinConstraint::Using(_)) | None => 0,
                };
                let args = item.func_args.as_ref().map_or(0, ExprList::height);
                source.max(on).max(args)
            })
            .max()
            .unwrap_or(0)
    }
}

/// What a FROM item reads from
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// Table, view, or table-valued function name
    Table(QualifiedName),
    Subquery(Box<Select>),
}

/// Join constraint
#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Box<Expr>),
    Using(Vec<String>),
}

/// INDEXED BY clause
#[derive(Debug, Clone, PartialEq)]
pub enum IndexedBy {
    Index(String),
    NotIndexed,
}

/// One FROM item
#[derive(Debug, Clone, PartialEq)]
pub struct SrcItem {
    pub source: TableSource,
    pub alias: Option<String>,
    /// How this item joins to the item before it
    pub join_type: JoinFlags,
    pub constraint: Option<JoinConstraint>,
    pub indexed_by: Option<IndexedBy>,
    /// Arguments of a table-valued function call
    pub func_args: Option<ExprList>,
}

impl SrcItem {
    pub fn table(name: QualifiedName) -> Self {
        SrcItem::from_source(TableSource::Table(name))
    }

    pub fn subquery(select: Select) -> Self {
        SrcItem::from_source(TableSource::Subquery(Box::new(select)))
    }

    pub fn from_source(source: TableSource) -> Self {
        SrcItem {
            source,
            alias: None,
            join_type: JoinFlags::empty(),
            constraint: None,
            indexed_by: None,
            func_args: None,
        }
    }

    /// The subquery this item reads from, if any
    pub fn subquery_select(&self) -> Option<&Select> {
        match &self.source {
            TableSource::Subquery(select) => Some(select),
            TableSource::Table(_) => None,
        }
    }
}

// ============================================================================
// WITH Clause
// ============================================================================

/// WITH clause
#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
}

/// Materialization hint of a CTE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Materialized {
    #[default]
    Any,
    Yes,
    No,
}

/// Common table expression
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub columns: Option<Vec<String>>,
    pub materialized: Materialized,
    pub select: Box<Select>,
}

// ============================================================================
// Windows
// ============================================================================

/// Window frame unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Rows,
    Range,
    Groups,
}

impl FrameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameMode::Rows => "ROWS",
            FrameMode::Range => "RANGE",
            FrameMode::Groups => "GROUPS",
        }
    }
}

/// Kind of a frame boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Unbounded,
    CurrentRow,
    Preceding,
    Following,
}

impl BoundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundKind::Unbounded => "UNBOUNDED",
            BoundKind::CurrentRow => "CURRENT ROW",
            BoundKind::Preceding => "PRECEDING",
            BoundKind::Following => "FOLLOWING",
        }
    }
}

/// Frame boundary; `expr` is set for `<expr> PRECEDING|FOLLOWING`
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBound {
    pub kind: BoundKind,
    pub expr: Option<Box<Expr>>,
}

impl FrameBound {
    pub fn new(kind: BoundKind) -> Self {
        FrameBound { kind, expr: None }
    }
}

/// EXCLUDE clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameExclude {
    NoOthers,
    CurrentRow,
    Group,
    Ties,
}

impl FrameExclude {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameExclude::NoOthers => "NO OTHERS",
            FrameExclude::CurrentRow => "CURRENT ROW",
            FrameExclude::Group => "GROUP",
            FrameExclude::Ties => "TIES",
        }
    }
}

/// Window frame
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub mode: FrameMode,
    pub start: FrameBound,
    pub end: FrameBound,
    pub exclude: Option<FrameExclude>,
}

impl WindowFrame {
    /// `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`
    pub fn implicit() -> Self {
        WindowFrame {
            mode: FrameMode::Range,
            start: FrameBound::new(BoundKind::Unbounded),
            end: FrameBound::new(BoundKind::CurrentRow),
            exclude: None,
        }
    }
}

/// Window specification, either named in a WINDOW clause or inline
/// in an OVER clause
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    pub name: Option<String>,
    pub base: Option<String>,
    pub partition_by: Option<ExprList>,
    pub order_by: Option<ExprList>,
    pub frame: Option<WindowFrame>,
    pub filter: Option<Box<Expr>>,
}

impl Window {
    fn height(&self) -> usize {
        let lists = [&self.partition_by, &self.order_by];
        let bounds = self
            .frame
            .iter()
            .flat_map(|frame| [&frame.start.expr, &frame.end.expr])
            .chain([&self.filter]);
        lists
            .into_iter()
            .flatten()
            .map(ExprList::height)
            .chain(bounds.flatten().map(|e| e.height()))
            .max()
            .unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_display() {
        assert_eq!(QualifiedName::new("t").to_string(), "t");
        assert_eq!(QualifiedName::with_schema("main", "t").to_string(), "main.t");
    }

    #[test]
    fn test_int32_value() {
        assert_eq!(int32_value("42"), Some(42));
        assert_eq!(int32_value("2147483647"), Some(i32::MAX));
        assert_eq!(int32_value("2147483648"), None);
        assert_eq!(int32_value("0x7fffffff"), Some(i32::MAX));
        assert_eq!(int32_value("0x80000000"), None);
        assert_eq!(int32_value("0x0000000010"), Some(16));
        assert_eq!(int32_value("1_000"), Some(1000));
        assert_eq!(int32_value("99999999999"), None);
    }

    #[test]
    fn test_opcode_of_binary_is_its_operator() {
        let expr = Expr::binary(Opcode::PTR, Expr::id("a"), Expr::string("$.x"));
        assert_eq!(expr.opcode(), Opcode::PTR);
        assert_eq!(Expr::not(Expr::Null).opcode(), Opcode::NOT);
    }

    #[test]
    fn test_is_constant() {
        assert!(Expr::int(5).is_constant());
        assert!(Expr::unary(UnaryOp::Neg, Expr::int(5)).is_constant());
        assert!(Expr::id("TRUE").is_constant());
        assert!(!Expr::id("a").is_constant());
        assert!(!Expr::binary(Opcode::PLUS, Expr::int(1), Expr::id("a")).is_constant());
        let call = Expr::Function(Box::new(FunctionCall::new("abs", None)));
        assert!(!call.is_constant());
    }

    #[test]
    fn test_alias_ignores_span_names() {
        let mut list = ExprList::new();
        list.push(Expr::id("a")).name = Some(EName::Span("a".to_string()));
        list.push(Expr::id("b")).name = Some(EName::Name("x".to_string()));
        assert_eq!(list.items[0].alias(), None);
        assert_eq!(list.items[1].alias(), Some("x"));
    }

    #[test]
    fn test_branch_count() {
        let mut first = Select::new(ExprList::from_exprs([Expr::int(1)]));
        first.op = None;
        let mut second = Select::new(ExprList::from_exprs([Expr::int(2)]));
        second.op = Some(CompoundOp::Union);
        second.prior = Some(Box::new(first));
        assert!(second.is_compound());
        assert_eq!(second.branch_count(), 2);
    }

    #[test]
    fn test_join_flags() {
        let flags = JoinFlags::LEFT | JoinFlags::OUTER;
        assert!(flags.contains(JoinFlags::LEFT));
        assert!(!flags.contains(JoinFlags::RIGHT));
        assert!(JoinFlags::default().is_empty());
    }
}
