use std::collections::HashMap;

/// The storage class of a declared name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Static,
    Field,
    Arg,
    Var,
}

/// A resolved name: its storage class, declared type, and index within
/// that class's counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub declared_type: String,
    pub index: u16,
}

/// The class-level scope: `static` and `field` symbols, shared across
/// every subroutine of the class.
pub struct ClassScope {
    name: String,
    symbols: HashMap<String, Symbol>,
    static_count: u16,
    field_count: u16,
}

impl ClassScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
            static_count: 0,
            field_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_static(&mut self, name: &str, declared_type: &str) {
        let index = self.static_count;
        self.static_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Static,
                declared_type: declared_type.to_string(),
                index,
            },
        );
    }

    pub fn add_field(&mut self, name: &str, declared_type: &str) {
        let index = self.field_count;
        self.field_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Field,
                declared_type: declared_type.to_string(),
                index,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn field_count(&self) -> u16 {
        self.field_count
    }
}

/// The subroutine-level scope: `arg` and `var` symbols, plus the
/// enclosing class it falls back to on lookup miss.
pub struct SubroutineScope<'class> {
    class: &'class ClassScope,
    name: String,
    kind: SubroutineKind,
    return_type: String,
    symbols: HashMap<String, Symbol>,
    arg_count: u16,
    var_count: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

impl<'class> SubroutineScope<'class> {
    pub fn new(
        class: &'class ClassScope,
        name: impl Into<String>,
        kind: SubroutineKind,
        return_type: impl Into<String>,
    ) -> Self {
        let mut scope = Self {
            class,
            name: name.into(),
            kind,
            return_type: return_type.into(),
            symbols: HashMap::new(),
            arg_count: 0,
            var_count: 0,
        };
        // A method's receiver occupies argument slot 0, inserted before
        // any source-declared parameters.
        if kind == SubroutineKind::Method {
            scope.add_arg("this", class.name());
        }
        scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SubroutineKind {
        self.kind
    }

    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn add_arg(&mut self, name: &str, declared_type: &str) {
        let index = self.arg_count;
        self.arg_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Arg,
                declared_type: declared_type.to_string(),
                index,
            },
        );
    }

    pub fn add_var(&mut self, name: &str, declared_type: &str) {
        let index = self.var_count;
        self.var_count += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind: SymbolKind::Var,
                declared_type: declared_type.to_string(),
                index,
            },
        );
    }

    /// Looks up a name in this subroutine's own symbols first, falling
    /// back to the enclosing class scope. Subroutine symbols therefore
    /// shadow class symbols of the same name.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name).or_else(|| self.class.get(name))
    }

    pub fn var_count(&self) -> u16 {
        self.var_count
    }

    pub fn field_count(&self) -> u16 {
        self.class.field_count()
    }
}
