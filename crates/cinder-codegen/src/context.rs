// Compile-time state threaded through code generation: where each variable
// lives, how much of the frame is in use, and which loop `break`/`continue`
// currently target.

use std::collections::HashMap;
use std::fmt;

use crate::error::{CodegenError, CodegenResult};

/// Bytes per stack slot.
pub const WORD: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// An argument register, e.g. `%rdi`.
    Register(&'static str),
    /// Offset from the frame pointer.
    Stack(i64),
    /// A data-section symbol; rendered with the leading underscore.
    Global(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Location::Register(reg) => f.write_str(reg),
            Location::Stack(offset) => write!(f, "{}(%rbp)", offset),
            Location::Global(name) => write!(f, "_{}(%rip)", name),
        }
    }
}

/// Jump targets of the innermost loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopLabels {
    /// Top of the loop.
    pub start: String,
    /// Target of `break`.
    pub end: String,
    /// Target of `continue`.
    pub post: String,
    /// Stack cursor when the loop was entered; `break`/`continue` free
    /// whatever blocks opened since.
    pub stack_offset: i64,
}

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Location>,
    /// Stack words owned by this scope.
    words: i64,
}

#[derive(Debug, Default)]
pub struct Context {
    scopes: Vec<Scope>,
    /// Offset of the next free slot relative to `%rbp`.
    stack_offset: i64,
    loop_labels: Option<LoopLabels>,
    /// Globals in first-declaration order.
    globals: Vec<(String, i64)>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack_offset(&self) -> i64 {
        self.stack_offset
    }

    /// Start a fresh frame: one empty scope, the cursor at the first slot
    /// below `%rbp` and no enclosing loop.
    pub fn enter_function(&mut self) {
        self.scopes = vec![Scope::default()];
        self.stack_offset = -WORD;
        self.loop_labels = None;
    }

    pub fn exit_function(&mut self) {
        self.scopes.clear();
        self.stack_offset = 0;
        self.loop_labels = None;
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Drop the innermost scope and give its stack words back. Returns the
    /// number of words the caller must pop.
    pub fn pop_scope(&mut self) -> i64 {
        let words = self.scopes.pop().map_or(0, |scope| scope.words);
        self.stack_offset += words * WORD;
        words
    }

    fn innermost(&mut self) -> &mut Scope {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Bind `name` to the next stack slot in the innermost scope. A second
    /// declaration in the same scope replaces the first binding.
    pub fn declare_local(&mut self, name: &str) -> Location {
        let location = Location::Stack(self.stack_offset);
        self.stack_offset -= WORD;
        let scope = self.innermost();
        scope.words += 1;
        scope.bindings.insert(name.to_string(), location.clone());
        location
    }

    pub fn bind_register(&mut self, name: &str, register: &'static str) {
        self.innermost()
            .bindings
            .insert(name.to_string(), Location::Register(register));
    }

    /// Record a global. Without an initializer an existing value is kept.
    pub fn declare_global(&mut self, name: &str, value: Option<i64>) {
        match self.globals.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                if let Some(v) = value {
                    entry.1 = v;
                }
            }
            None => self.globals.push((name.to_string(), value.unwrap_or(0))),
        }
    }

    pub fn globals(&self) -> &[(String, i64)] {
        &self.globals
    }

    /// Innermost binding first, then globals.
    pub fn resolve(&self, name: &str) -> CodegenResult<Location> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name).cloned())
            .or_else(|| {
                self.globals
                    .iter()
                    .any(|(n, _)| n == name)
                    .then(|| Location::Global(name.to_string()))
            })
            .ok_or_else(|| CodegenError::UnresolvedSymbol {
                name: name.to_string(),
            })
    }

    /// Make `labels` the active loop, returning the enclosing loop's labels
    /// for `exit_loop`.
    pub fn enter_loop(&mut self, labels: LoopLabels) -> Option<LoopLabels> {
        self.loop_labels.replace(labels)
    }

    pub fn exit_loop(&mut self, saved: Option<LoopLabels>) {
        self.loop_labels = saved;
    }

    pub fn loop_labels(&self) -> Option<&LoopLabels> {
        self.loop_labels.as_ref()
    }
}
