/// The control-flow constructs that need jump targets. Each kind has its own
/// counter and its own label prefix, so labels only need to be unique
/// within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Right-hand side of `&&` / `||`.
    Clause,
    /// Join point after `&&` / `||`.
    End,
    FalseBranch,
    PostConditional,
    WhileStart,
    WhileEnd,
    ForStart,
    ForEnd,
    ForPost,
}

impl LabelKind {
    pub const ALL: [LabelKind; 9] = [
        LabelKind::Clause,
        LabelKind::End,
        LabelKind::FalseBranch,
        LabelKind::PostConditional,
        LabelKind::WhileStart,
        LabelKind::WhileEnd,
        LabelKind::ForStart,
        LabelKind::ForEnd,
        LabelKind::ForPost,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            LabelKind::Clause => "clause",
            LabelKind::End => "end",
            LabelKind::FalseBranch => "false_branch",
            LabelKind::PostConditional => "post_conditional",
            LabelKind::WhileStart => "while_start",
            LabelKind::WhileEnd => "while_end",
            LabelKind::ForStart => "for_start",
            LabelKind::ForEnd => "for_end",
            LabelKind::ForPost => "for_post_expression",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Hands out fresh labels. One allocator belongs to one compilation
/// session; reusing it across compilations keeps every label unique for
/// the allocator's lifetime.
#[derive(Debug, Default, Clone)]
pub struct LabelAllocator {
    next: [u32; LabelKind::ALL.len()],
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, kind: LabelKind) -> String {
        let n = &mut self.next[kind.index()];
        let label = format!("{}_{}", kind.prefix(), n);
        *n += 1;
        label
    }

    /// How many labels of `kind` have been issued so far.
    pub fn issued(&self, kind: LabelKind) -> u32 {
        self.next[kind.index()]
    }

    pub fn reset(&mut self) {
        self.next = Default::default();
    }
}
