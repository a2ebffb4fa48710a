//! Tree-walking emitter producing AT&T-syntax x86-64 assembly.
//!
//! Every expression leaves its value in `%rax`. Binary operators evaluate
//! the right operand first, park it on the stack, evaluate the left operand
//! and then pop the right one into `%rcx`. Locals occupy one word each below
//! `%rbp`; a block pops its own words when it closes.

use cinder_ast::ast::{
    BinOp, BlockItem, Declaration, Expr, Function, Item, Program, Stmt, UnOp,
};

use crate::context::{Context, LoopLabels, WORD};
use crate::error::{CodegenError, CodegenResult};
use crate::labels::{LabelAllocator, LabelKind};
use crate::{GenOptions, ParamBinding};

/// Argument registers in parameter order.
pub const ARG_REGISTERS: [&str; 3] = ["%rdi", "%rsi", "%rdx"];

/// Required `%rsp` alignment at a call instruction.
const CALL_ALIGNMENT: i64 = 16;

pub struct Generator<'l> {
    out: String,
    ctx: Context,
    labels: &'l mut LabelAllocator,
    options: GenOptions,
    epilogue: String,
}

impl<'l> Generator<'l> {
    pub fn new(labels: &'l mut LabelAllocator, options: GenOptions) -> Self {
        Self {
            out: String::new(),
            ctx: Context::new(),
            labels,
            options,
            epilogue: String::new(),
        }
    }

    /// The assembly emitted so far.
    pub fn finish(self) -> String {
        self.out
    }

    fn emit(&mut self, instr: impl AsRef<str>) {
        self.out.push_str("    ");
        self.out.push_str(instr.as_ref());
        self.out.push('\n');
    }

    fn label(&mut self, label: &str) {
        self.out.push_str(label);
        self.out.push_str(":\n");
    }

    fn comment(&mut self, text: impl AsRef<str>) {
        self.out.push_str("# ");
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn fresh(&mut self, kind: LabelKind) -> String {
        self.labels.next(kind)
    }

    // ======= program / items =======

    pub fn program(&mut self, program: &Program) -> CodegenResult<()> {
        self.emit(".globl _main");
        self.emit(".text");

        for item in &program.items {
            match item {
                Item::Function(f) => self.function(f)?,
                Item::Prototype { .. } => {}
                Item::Declaration(decl) => self.global(decl)?,
            }
        }

        self.out.push_str(".section data\n");
        let globals = self.ctx.globals().to_vec();
        for (name, value) in globals {
            self.emit(format!(".globl _{name}"));
            self.emit(".p2align 3");
            self.label(&format!("_{name}"));
            self.emit(format!(".quad {value}"));
        }
        Ok(())
    }

    fn global(&mut self, decl: &Declaration) -> CodegenResult<()> {
        let value = match &decl.init {
            None => None,
            Some(init) => Some(init.as_constant().ok_or_else(|| {
                CodegenError::unsupported(format!(
                    "initializer of global '{}' is not an integer constant",
                    decl.name
                ))
            })?),
        };
        self.ctx.declare_global(&decl.name, value);
        Ok(())
    }

    fn function(&mut self, f: &Function) -> CodegenResult<()> {
        tracing::debug!(function = %f.name, params = f.params.len(), "emitting function");
        self.ctx.enter_function();
        self.epilogue = format!("end_label_{}", f.name);

        self.out.push('\n');
        self.label(&format!("_{}", f.name));
        self.emit("push %rbp");
        self.emit("movq %rsp, %rbp");
        self.emit("movq $0, %rax");

        for (param, register) in f.params.iter().zip(ARG_REGISTERS) {
            match self.options.param_binding {
                ParamBinding::Spill => {
                    self.ctx.declare_local(param);
                    self.emit(format!("push {register}"));
                }
                ParamBinding::Register => self.ctx.bind_register(param, register),
            }
        }

        for item in &f.body {
            self.block_item(item)?;
        }

        let epilogue = std::mem::take(&mut self.epilogue);
        self.label(&epilogue);
        self.emit("movq %rbp, %rsp");
        self.emit("pop %rbp");
        self.emit("ret");

        self.ctx.exit_function();
        Ok(())
    }

    // ======= blocks and statements =======

    fn block_item(&mut self, item: &BlockItem) -> CodegenResult<()> {
        match item {
            BlockItem::Declaration(decl) => self.local(decl),
            BlockItem::Stmt(stmt) => self.stmt(stmt),
        }
    }

    /// Reserve a slot, then store the initializer into it.
    fn local(&mut self, decl: &Declaration) -> CodegenResult<()> {
        let slot = self.ctx.declare_local(&decl.name);
        self.emit("push %rax");
        if let Some(init) = &decl.init {
            self.expr(init)?;
            self.emit(format!("movq %rax, {slot}"));
        }
        Ok(())
    }

    fn close_scope(&mut self) {
        let words = self.ctx.pop_scope();
        tracing::trace!(words, "closing scope");
        if words > 0 {
            self.emit(format!("add ${}, %rsp", words * WORD));
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        match stmt {
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.expr(value)?;
                }
                let epilogue = self.epilogue.clone();
                self.emit(format!("jmp {epilogue}"));
            }
            Stmt::Expr(expr) => {
                if let Some(expr) = expr {
                    self.expr(expr)?;
                }
            }
            Stmt::If { cond, then_, else_ } => {
                let false_branch = self.fresh(LabelKind::FalseBranch);
                let post = self.fresh(LabelKind::PostConditional);
                self.expr(cond)?;
                self.emit("cmp $0, %rax");
                self.emit(format!("je {false_branch}"));
                self.stmt(then_)?;
                self.emit(format!("jmp {post}"));
                self.label(&false_branch);
                if let Some(else_) = else_ {
                    self.stmt(else_)?;
                }
                self.label(&post);
            }
            Stmt::Compound(items) => {
                self.ctx.push_scope();
                for item in items {
                    self.block_item(item)?;
                }
                self.close_scope();
            }
            Stmt::While { cond, body } => {
                let start = self.fresh(LabelKind::WhileStart);
                let end = self.fresh(LabelKind::WhileEnd);

                self.label(&start);
                self.expr(cond)?;
                self.emit("cmp $0, %rax");
                self.emit(format!("je {end}"));
                self.loop_body(body, &start, &end, &start)?;
                self.emit(format!("jmp {start}"));
                self.label(&end);
            }
            Stmt::DoWhile { body, cond } => {
                let start = self.fresh(LabelKind::WhileStart);
                let end = self.fresh(LabelKind::WhileEnd);

                self.label(&start);
                self.loop_body(body, &start, &end, &start)?;
                self.expr(cond)?;
                self.emit("cmp $0, %rax");
                self.emit(format!("jne {start}"));
                self.label(&end);
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    self.expr(init)?;
                }
                self.for_loop(cond.as_ref(), post.as_ref(), body)?;
            }
            Stmt::ForDecl {
                init,
                cond,
                post,
                body,
            } => {
                self.ctx.push_scope();
                self.local(init)?;
                self.for_loop(cond.as_ref(), post.as_ref(), body)?;
                self.close_scope();
            }
            Stmt::Break => {
                let target = self.unwind_to_loop("break")?.end;
                self.emit(format!("jmp {target}"));
            }
            Stmt::Continue => {
                let target = self.unwind_to_loop("continue")?.post;
                self.emit(format!("jmp {target}"));
            }
        }
        Ok(())
    }

    /// Condition, body and post expression of both `for` forms; the
    /// initializer has already run.
    fn for_loop(
        &mut self,
        cond: Option<&Expr>,
        post: Option<&Expr>,
        body: &Stmt,
    ) -> CodegenResult<()> {
        let start = self.fresh(LabelKind::ForStart);
        let end = self.fresh(LabelKind::ForEnd);
        let post_label = self.fresh(LabelKind::ForPost);

        self.label(&start);
        match cond {
            Some(cond) => self.expr(cond)?,
            None => self.emit("movq $1, %rax"),
        }
        self.emit("cmp $0, %rax");
        self.emit(format!("je {end}"));
        self.loop_body(body, &start, &end, &post_label)?;
        self.label(&post_label);
        if let Some(post) = post {
            self.expr(post)?;
        }
        self.emit(format!("jmp {start}"));
        self.label(&end);
        Ok(())
    }

    /// Emit `body` with `break` bound to `end` and `continue` to `post`,
    /// restoring the enclosing loop's targets afterwards.
    fn loop_body(&mut self, body: &Stmt, start: &str, end: &str, post: &str) -> CodegenResult<()> {
        let saved = self.ctx.enter_loop(LoopLabels {
            start: start.to_string(),
            end: end.to_string(),
            post: post.to_string(),
            stack_offset: self.ctx.stack_offset(),
        });
        let result = self.stmt(body);
        self.ctx.exit_loop(saved);
        result
    }

    /// Pop every block word allocated since the innermost loop began, and
    /// hand back that loop's labels.
    fn unwind_to_loop(&mut self, keyword: &str) -> CodegenResult<LoopLabels> {
        let labels = self
            .ctx
            .loop_labels()
            .cloned()
            .ok_or_else(|| CodegenError::unsupported(format!("'{keyword}' outside of a loop")))?;
        let bytes = labels.stack_offset - self.ctx.stack_offset();
        if bytes > 0 {
            self.emit(format!("add ${bytes}, %rsp"));
        }
        Ok(labels)
    }

    // ======= expressions =======

    fn expr(&mut self, expr: &Expr) -> CodegenResult<()> {
        match expr {
            Expr::Constant(value) => self.emit(format!("movq ${value}, %rax")),
            Expr::Var(name) => {
                let location = self.ctx.resolve(name)?;
                self.emit(format!("movq {location}, %rax"));
            }
            Expr::Assign { name, value } => {
                self.expr(value)?;
                let location = self.ctx.resolve(name)?;
                self.emit(format!("movq %rax, {location}"));
            }
            Expr::Unary { op, expr } => {
                self.expr(expr)?;
                match op {
                    UnOp::Neg => self.emit("neg %rax"),
                    UnOp::BitNot => self.emit("not %rax"),
                    UnOp::Not => {
                        self.emit("cmp $0, %rax");
                        self.set_flag("sete");
                    }
                }
            }
            Expr::Binary { lhs, op, rhs } if op.is_short_circuit() => {
                self.short_circuit(*op, lhs, rhs)?
            }
            Expr::Binary { lhs, op, rhs } => {
                self.expr(rhs)?;
                self.emit("push %rax");
                self.expr(lhs)?;
                self.emit("pop %rcx");
                self.arith(*op);
            }
            Expr::Conditional { cond, then_, else_ } => {
                let false_branch = self.fresh(LabelKind::FalseBranch);
                let post = self.fresh(LabelKind::PostConditional);
                self.expr(cond)?;
                self.emit("cmp $0, %rax");
                self.emit(format!("je {false_branch}"));
                self.expr(then_)?;
                self.emit(format!("jmp {post}"));
                self.label(&false_branch);
                self.expr(else_)?;
                self.label(&post);
            }
            Expr::Call { name, args } => self.call(name, args)?,
        }
        Ok(())
    }

    /// `%rax := %rax OP %rcx`
    fn arith(&mut self, op: BinOp) {
        match op {
            BinOp::Add => self.emit("add %rcx, %rax"),
            BinOp::Sub => self.emit("sub %rcx, %rax"),
            BinOp::Mul => self.emit("imul %rcx, %rax"),
            BinOp::Div => {
                self.emit("cqo");
                self.emit("idiv %rcx");
            }
            BinOp::Mod => {
                self.emit("cqo");
                self.emit("idiv %rcx");
                self.emit("movq %rdx, %rax");
            }
            BinOp::Eq => self.compare("sete"),
            BinOp::Ne => self.compare("setne"),
            BinOp::Lt => self.compare("setl"),
            BinOp::Le => self.compare("setle"),
            BinOp::Gt => self.compare("setg"),
            BinOp::Ge => self.compare("setge"),
            BinOp::And | BinOp::Or => {
                unreachable!("`&&` and `||` are lowered by short_circuit")
            }
        }
    }

    fn compare(&mut self, set: &str) {
        self.emit("cmp %rcx, %rax");
        self.set_flag(set);
    }

    /// Materialise a flag as 0/1 in `%rax`.
    fn set_flag(&mut self, set: &str) {
        self.emit(format!("{set} %al"));
        self.emit("movzbq %al, %rax");
    }

    /// The right operand's code is only reached when the left one did not
    /// decide the result.
    fn short_circuit(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> CodegenResult<()> {
        let clause = self.fresh(LabelKind::Clause);
        let end = self.fresh(LabelKind::End);

        self.expr(lhs)?;
        self.emit("cmp $0, %rax");
        if op == BinOp::Or {
            self.emit(format!("je {clause}"));
            self.emit("movq $1, %rax");
        } else {
            self.emit(format!("jne {clause}"));
        }
        self.emit(format!("jmp {end}"));
        self.label(&clause);
        self.expr(rhs)?;
        self.emit("cmp $0, %rax");
        self.set_flag("setne");
        self.label(&end);
        Ok(())
    }

    /// Save the argument registers, pad `%rsp` so it is aligned at the call,
    /// load the arguments, call, then undo both in reverse.
    fn call(&mut self, name: &str, args: &[Expr]) -> CodegenResult<()> {
        self.comment(format!("call {name}"));
        for register in ARG_REGISTERS {
            self.emit(format!("push {register}"));
        }

        // pad so that %rsp is aligned once the pad amount itself is pushed
        self.emit("movq %rsp, %rax");
        self.emit(format!("sub ${WORD}, %rax"));
        self.emit("cqo");
        self.emit(format!("movq ${CALL_ALIGNMENT}, %rcx"));
        self.emit("idiv %rcx");
        self.emit("sub %rdx, %rsp");
        self.emit("push %rdx");

        for (arg, register) in args.iter().zip(ARG_REGISTERS) {
            self.expr(arg)?;
            self.emit(format!("movq %rax, {register}"));
        }
        self.emit(format!("callq _{name}"));

        self.emit("pop %rdx");
        self.emit("add %rdx, %rsp");
        for register in ARG_REGISTERS.iter().rev() {
            self.emit(format!("pop {register}"));
        }
        Ok(())
    }
}
