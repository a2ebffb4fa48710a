pub mod ast {
    use serde::Serialize;

    /// Upper bound on function parameters and call arguments; one per
    /// argument register.
    pub const MAX_ARGS: usize = 3;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Program {
        pub items: Vec<Item>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Item {
        Function(Function),
        /// `int f(int a);` -- a forward declaration; generates nothing.
        Prototype { name: String, params: Vec<String> },
        /// A global variable.
        Declaration(Declaration),
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Function {
        pub name: String,
        pub params: Vec<String>,
        pub body: Vec<BlockItem>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct Declaration {
        pub name: String,
        pub init: Option<Expr>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum BlockItem {
        Declaration(Declaration),
        Stmt(Stmt),
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Stmt {
        Return(Option<Expr>),
        /// Expression statement; `None` is the null statement `;`.
        Expr(Option<Expr>),
        If {
            cond: Expr,
            then_: Box<Stmt>,
            else_: Option<Box<Stmt>>,
        },
        Compound(Vec<BlockItem>),
        For {
            init: Option<Expr>,
            cond: Option<Expr>,
            post: Option<Expr>,
            body: Box<Stmt>,
        },
        ForDecl {
            init: Declaration,
            cond: Option<Expr>,
            post: Option<Expr>,
            body: Box<Stmt>,
        },
        While {
            cond: Expr,
            body: Box<Stmt>,
        },
        DoWhile {
            body: Box<Stmt>,
            cond: Expr,
        },
        Break,
        Continue,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Expr {
        Constant(i64),
        Var(String),
        Unary {
            op: UnOp,
            expr: Box<Expr>,
        },
        Binary {
            lhs: Box<Expr>,
            op: BinOp,
            rhs: Box<Expr>,
        },
        Assign {
            name: String,
            value: Box<Expr>,
        },
        /// `cond ? then_ : else_`
        Conditional {
            cond: Box<Expr>,
            then_: Box<Expr>,
            else_: Box<Expr>,
        },
        Call {
            name: String,
            args: Vec<Expr>,
        },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum UnOp {
        Neg,
        BitNot,
        Not,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum BinOp {
        // logical
        Or,
        And,
        // equality
        Eq,
        Ne,
        // relational
        Lt,
        Le,
        Gt,
        Ge,
        // arithmetic
        Add,
        Sub,
        Mul,
        Div,
        Mod,
    }

    impl Expr {
        /// The value of an integer literal, or of a negated one.
        pub fn as_constant(&self) -> Option<i64> {
            match self {
                Expr::Constant(v) => Some(*v),
                Expr::Unary {
                    op: UnOp::Neg,
                    expr,
                } => match **expr {
                    Expr::Constant(v) => v.checked_neg(),
                    _ => None,
                },
                _ => None,
            }
        }
    }

    impl BinOp {
        pub fn is_short_circuit(self) -> bool {
            matches!(self, BinOp::Or | BinOp::And)
        }
    }
}
