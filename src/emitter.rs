use crate::symbol::{Symbol, SymbolKind};

/// A thin, stateless writer of VM instructions. Every method appends one
/// or more `\n`-terminated lines to the output buffer; nothing here
/// decides *when* to emit, only *how*.
pub struct Emitter {
    out: String,
}

impl Emitter {
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    pub fn into_output(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn push(&mut self, segment: &str, offset: u16) {
        self.line(&format!("push {} {}", segment, offset));
    }

    pub fn pop(&mut self, segment: &str, offset: u16) {
        self.line(&format!("pop {} {}", segment, offset));
    }

    pub fn label(&mut self, name: &str) {
        self.line(&format!("label {}", name));
    }

    pub fn goto(&mut self, name: &str) {
        self.line(&format!("goto {}", name));
    }

    pub fn if_goto(&mut self, name: &str) {
        self.line(&format!("if-goto {}", name));
    }

    pub fn function(&mut self, class_name: &str, sub_name: &str, n_locals: u16) {
        self.line(&format!("function {}.{} {}", class_name, sub_name, n_locals));
    }

    pub fn call(&mut self, class_name: &str, sub_name: &str, n_args: u16) {
        self.line(&format!("call {}.{} {}", class_name, sub_name, n_args));
    }

    pub fn return_(&mut self) {
        self.line("return");
    }

    pub fn add(&mut self) {
        self.line("add");
    }
    pub fn sub(&mut self) {
        self.line("sub");
    }
    pub fn neg(&mut self) {
        self.line("neg");
    }
    pub fn eq(&mut self) {
        self.line("eq");
    }
    pub fn gt(&mut self) {
        self.line("gt");
    }
    pub fn lt(&mut self) {
        self.line("lt");
    }
    pub fn and(&mut self) {
        self.line("and");
    }
    pub fn or(&mut self) {
        self.line("or");
    }
    pub fn not(&mut self) {
        self.line("not");
    }

    /// Maps a symbol's storage kind to the VM segment that holds it.
    fn segment_of(kind: SymbolKind) -> &'static str {
        match kind {
            SymbolKind::Static => "static",
            SymbolKind::Field => "this",
            SymbolKind::Arg => "argument",
            SymbolKind::Var => "local",
        }
    }

    pub fn push_symbol(&mut self, sym: &Symbol) {
        self.push(Self::segment_of(sym.kind), sym.index);
    }

    pub fn pop_symbol(&mut self, sym: &Symbol) {
        self.pop(Self::segment_of(sym.kind), sym.index);
    }

    pub fn push_int(&mut self, n: u16) {
        self.push("constant", n);
    }

    /// Emits the string-construction sequence: `String.new` sized for
    /// the literal, then one `String.appendChar` call per character.
    /// `appendChar` returns the receiver, so the string stays on the
    /// stack throughout.
    pub fn push_string(&mut self, s: &str) {
        self.push_int(s.chars().count() as u16);
        self.call("String", "new", 1);
        for c in s.chars() {
            self.push_int(c as u16);
            self.call("String", "appendChar", 2);
        }
    }

    /// Inverts a condition already on the stack and jumps away if it was
    /// false — the shape both `if` and `while` use.
    pub fn write_if_false(&mut self, label: &str) {
        self.not();
        self.if_goto(label);
    }

    pub fn write_function(&mut self, class_name: &str, sub_name: &str, var_count: u16) {
        self.function(class_name, sub_name, var_count);
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
