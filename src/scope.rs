use tracing::debug;

pub const GLOBAL_SCOPE: &str = "Global";
pub const PROGRAM_SCOPE: &str = "Program";

/// The names declared in one lexical region: the globals, the top-level
/// program, or a single function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub name: String,
    /// Name of the enclosing scope. Informational only; lookups never walk it.
    pub parent: Option<String>,
    names: Vec<String>,
}

impl Scope {
    pub fn new(name: &str, parent: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            names: Vec::new(),
        }
    }

    /// Adds `name` unless it is already declared here.
    pub fn declare(&mut self, name: &str) {
        if !self.find(name) {
            self.names.push(name.to_string());
        }
    }

    pub fn find(&self, name: &str) -> bool {
        self.names.iter().any(|declared| declared == name)
    }

    /// Declared names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Stack of scopes built while parsing. Index 0 is the global scope and
/// index 1 the program scope; both outlive every push/pop.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![
                Scope::new(GLOBAL_SCOPE, None),
                Scope::new(PROGRAM_SCOPE, Some(GLOBAL_SCOPE.to_string())),
            ],
        }
    }

    pub fn push_scope(&mut self, name: &str) {
        let parent = self.current().name.clone();
        debug!(scope = name, parent = %parent, "push scope");
        self.scopes.push(Scope::new(name, Some(parent)));
    }

    /// Pops the innermost function scope. The global and program scopes are
    /// never removed; popping at that depth returns `None`.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() <= 2 {
            return None;
        }
        let scope = self.scopes.pop();
        if let Some(ref scope) = scope {
            debug!(scope = %scope.name, names = scope.names.len(), "pop scope");
        }
        scope
    }

    /// Declares `name` in the innermost scope.
    pub fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.declare(name);
        }
    }

    pub fn declare_global(&mut self, name: &str) {
        self.scopes[0].declare(name);
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn program(&self) -> &Scope {
        &self.scopes[1]
    }

    pub fn current(&self) -> &Scope {
        // The table is never shorter than two scopes.
        &self.scopes[self.scopes.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}
