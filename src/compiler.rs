use crate::diagnostic::Diagnostic;
use crate::emitter::Emitter;
use crate::span::{Span, Spanned};
use crate::symbol::{ClassScope, SubroutineScope, SubroutineKind};
use crate::token::{Keyword, Token};
use crate::tokenizer::Tokenizer;

const BINARY_OPS: &[char] = &['+', '-', '*', '/', '&', '|', '<', '>', '='];

/// A recursive-descent parser whose productions emit VM code as they
/// recognize each construct. One instance consumes exactly one class
/// declaration.
pub struct CompilationEngine {
    tokenizer: Tokenizer,
    emitter: Emitter,
    label_counter: u32,
}

impl CompilationEngine {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            emitter: Emitter::new(),
            label_counter: 0,
        }
    }

    /// Consumes the single class declaration and returns the VM text
    /// emitted for it, or the first fatal diagnostic encountered.
    pub fn compile_class(mut self) -> Result<String, Diagnostic> {
        self.expect_keyword(Keyword::Class)?;
        let name = self.expect_ident()?;
        self.expect_symbol('{')?;

        let mut class = ClassScope::new(name.node);

        while self.at_keyword(Keyword::Static) || self.at_keyword(Keyword::Field) {
            self.compile_class_var_dec(&mut class)?;
        }

        while self.at_keyword(Keyword::Constructor)
            || self.at_keyword(Keyword::Function)
            || self.at_keyword(Keyword::Method)
        {
            self.compile_subroutine_dec(&class)?;
        }

        self.expect_symbol('}')?;
        Ok(self.emitter.into_output())
    }

    // --- classVarDec / varDec / type ---

    fn compile_class_var_dec(&mut self, class: &mut ClassScope) -> Result<(), Diagnostic> {
        let is_static = self.at_keyword(Keyword::Static);
        self.advance(); // `static` or `field`
        let ty = self.compile_type()?;

        let first = self.expect_ident()?;
        if is_static {
            class.add_static(&first.node, &ty);
        } else {
            class.add_field(&first.node, &ty);
        }
        while self.eat_symbol(',') {
            let next = self.expect_ident()?;
            if is_static {
                class.add_static(&next.node, &ty);
            } else {
                class.add_field(&next.node, &ty);
            }
        }
        self.expect_symbol(';')?;
        Ok(())
    }

    fn compile_var_dec(&mut self, sub: &mut SubroutineScope) -> Result<(), Diagnostic> {
        self.expect_keyword(Keyword::Var)?;
        let ty = self.compile_type()?;
        let first = self.expect_ident()?;
        sub.add_var(&first.node, &ty);
        while self.eat_symbol(',') {
            let next = self.expect_ident()?;
            sub.add_var(&next.node, &ty);
        }
        self.expect_symbol(';')?;
        Ok(())
    }

    fn compile_type(&mut self) -> Result<String, Diagnostic> {
        match self.peek() {
            Some(Token::Keyword(Keyword::Int)) => {
                self.advance();
                Ok("int".to_string())
            }
            Some(Token::Keyword(Keyword::Char)) => {
                self.advance();
                Ok("char".to_string())
            }
            Some(Token::Keyword(Keyword::Boolean)) => {
                self.advance();
                Ok("boolean".to_string())
            }
            Some(Token::Identifier(_)) => Ok(self.expect_ident()?.node),
            _ => Err(self.error_at_current(&format!(
                "expected a type, found {}",
                self.describe_current()
            ))),
        }
    }

    // --- subroutineDec / parameterList / subroutineBody ---

    fn compile_subroutine_dec(&mut self, class: &ClassScope) -> Result<(), Diagnostic> {
        let kind = match self.peek() {
            Some(Token::Keyword(Keyword::Constructor)) => SubroutineKind::Constructor,
            Some(Token::Keyword(Keyword::Function)) => SubroutineKind::Function,
            Some(Token::Keyword(Keyword::Method)) => SubroutineKind::Method,
            _ => {
                return Err(self.error_at_current("expected 'constructor', 'function', or 'method'"))
            }
        };
        self.advance();

        let return_type = if self.at_keyword(Keyword::Void) {
            self.advance();
            "void".to_string()
        } else {
            self.compile_type()?
        };

        let name = self.expect_ident()?;
        self.expect_symbol('(')?;

        let mut sub = SubroutineScope::new(class, name.node, kind, return_type);
        self.compile_parameter_list(&mut sub)?;
        self.expect_symbol(')')?;

        self.compile_subroutine_body(class, &mut sub, kind)?;
        Ok(())
    }

    fn compile_parameter_list(&mut self, sub: &mut SubroutineScope) -> Result<(), Diagnostic> {
        if self.at_symbol(')') {
            return Ok(());
        }
        loop {
            let ty = self.compile_type()?;
            let name = self.expect_ident()?;
            sub.add_arg(&name.node, &ty);
            if !self.eat_symbol(',') {
                break;
            }
        }
        Ok(())
    }

    fn compile_subroutine_body(
        &mut self,
        class: &ClassScope,
        sub: &mut SubroutineScope,
        kind: SubroutineKind,
    ) -> Result<(), Diagnostic> {
        self.expect_symbol('{')?;

        while self.at_keyword(Keyword::Var) {
            self.compile_var_dec(sub)?;
        }

        self.emitter
            .write_function(class.name(), sub.name(), sub.var_count());

        match kind {
            SubroutineKind::Constructor => {
                self.emitter.push_int(sub.field_count());
                self.emitter.call("Memory", "alloc", 1);
                self.emitter.pop("pointer", 0);
            }
            SubroutineKind::Method => {
                self.emitter.push("argument", 0);
                self.emitter.pop("pointer", 0);
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements(class, sub)?;
        self.expect_symbol('}')?;
        Ok(())
    }

    // --- statements ---

    fn compile_statements(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<(), Diagnostic> {
        loop {
            match self.peek() {
                Some(Token::Keyword(Keyword::Let)) => self.compile_let_statement(class, sub)?,
                Some(Token::Keyword(Keyword::If)) => self.compile_if_statement(class, sub)?,
                Some(Token::Keyword(Keyword::While)) => self.compile_while_statement(class, sub)?,
                Some(Token::Keyword(Keyword::Do)) => self.compile_do_statement(class, sub)?,
                Some(Token::Keyword(Keyword::Return)) => self.compile_return_statement(class, sub)?,
                _ => break,
            }
        }
        Ok(())
    }

    fn compile_let_statement(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<(), Diagnostic> {
        self.expect_keyword(Keyword::Let)?;
        let name = self.expect_ident()?;

        if self.eat_symbol('[') {
            let sym = self.resolve(sub, &name)?;
            self.compile_expression(class, sub)?;
            self.expect_symbol(']')?;
            self.expect_symbol('=')?;

            self.emitter.push_symbol(&sym);
            self.emitter.add();
            // The RHS is compiled while the element address sits on the
            // stack, not in `pointer 1` -- if it contains another array
            // access, that access must not clobber `that` before we've
            // rebased it for *this* assignment.
            self.compile_expression(class, sub)?;
            self.expect_symbol(';')?;

            self.emitter.pop("temp", 0);
            self.emitter.pop("pointer", 1);
            self.emitter.push("temp", 0);
            self.emitter.pop("that", 0);
        } else {
            let sym = self.resolve(sub, &name)?;
            self.expect_symbol('=')?;
            self.compile_expression(class, sub)?;
            self.expect_symbol(';')?;
            self.emitter.pop_symbol(&sym);
        }
        Ok(())
    }

    fn compile_if_statement(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<(), Diagnostic> {
        self.expect_keyword(Keyword::If)?;
        self.expect_symbol('(')?;
        self.compile_expression(class, sub)?;
        self.expect_symbol(')')?;

        let l_false = self.fresh_label();
        let l_end = self.fresh_label();
        self.emitter.write_if_false(&l_false);

        self.expect_symbol('{')?;
        self.compile_statements(class, sub)?;
        self.expect_symbol('}')?;
        self.emitter.goto(&l_end);

        self.emitter.label(&l_false);
        if self.eat_keyword(Keyword::Else) {
            self.expect_symbol('{')?;
            self.compile_statements(class, sub)?;
            self.expect_symbol('}')?;
        }
        self.emitter.label(&l_end);
        Ok(())
    }

    fn compile_while_statement(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<(), Diagnostic> {
        self.expect_keyword(Keyword::While)?;
        let l_top = self.fresh_label();
        self.emitter.label(&l_top);

        self.expect_symbol('(')?;
        self.compile_expression(class, sub)?;
        self.expect_symbol(')')?;

        let l_end = self.fresh_label();
        self.emitter.write_if_false(&l_end);

        self.expect_symbol('{')?;
        self.compile_statements(class, sub)?;
        self.expect_symbol('}')?;

        self.emitter.goto(&l_top);
        self.emitter.label(&l_end);
        Ok(())
    }

    fn compile_do_statement(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<(), Diagnostic> {
        self.expect_keyword(Keyword::Do)?;
        let name = self.expect_ident()?;
        self.compile_call(class, sub, name)?;
        self.expect_symbol(';')?;
        self.emitter.pop("temp", 0);
        Ok(())
    }

    fn compile_return_statement(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<(), Diagnostic> {
        self.expect_keyword(Keyword::Return)?;
        if self.at_symbol(';') {
            self.emitter.push_int(0);
        } else {
            self.compile_expression(class, sub)?;
        }
        self.expect_symbol(';')?;
        self.emitter.return_();
        Ok(())
    }

    // --- expressions ---

    fn compile_expression(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<(), Diagnostic> {
        self.compile_term(class, sub)?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(c)) if BINARY_OPS.contains(c) => *c,
                _ => break,
            };
            self.advance();
            self.compile_term(class, sub)?;
            match op {
                '+' => self.emitter.add(),
                '-' => self.emitter.sub(),
                '&' => self.emitter.and(),
                '|' => self.emitter.or(),
                '<' => self.emitter.lt(),
                '>' => self.emitter.gt(),
                '=' => self.emitter.eq(),
                '*' => self.emitter.call("Math", "multiply", 2),
                '/' => self.emitter.call("Math", "divide", 2),
                _ => unreachable!("BINARY_OPS is exhaustive"),
            }
        }
        Ok(())
    }

    fn compile_term(&mut self, class: &ClassScope, sub: &SubroutineScope) -> Result<(), Diagnostic> {
        match self.peek().cloned() {
            Some(Token::IntegerConstant(n)) => {
                self.advance();
                self.emitter.push_int(n);
            }
            Some(Token::StringConstant(s)) => {
                self.advance();
                self.emitter.push_string(&s);
            }
            Some(Token::Keyword(Keyword::True)) => {
                self.advance();
                self.emitter.push_int(0);
                self.emitter.not();
            }
            Some(Token::Keyword(Keyword::False)) | Some(Token::Keyword(Keyword::Null)) => {
                self.advance();
                self.emitter.push_int(0);
            }
            Some(Token::Keyword(Keyword::This)) => {
                self.advance();
                self.emitter.push("pointer", 0);
            }
            Some(Token::Symbol('(')) => {
                self.advance();
                self.compile_expression(class, sub)?;
                self.expect_symbol(')')?;
            }
            Some(Token::Symbol('-')) => {
                self.advance();
                self.compile_term(class, sub)?;
                self.emitter.neg();
            }
            Some(Token::Symbol('~')) => {
                self.advance();
                self.compile_term(class, sub)?;
                self.emitter.not();
            }
            Some(Token::Identifier(_)) => {
                let name = self.expect_ident()?;
                if self.eat_symbol('[') {
                    let sym = self.resolve(sub, &name)?;
                    self.compile_expression(class, sub)?;
                    self.expect_symbol(']')?;
                    self.emitter.push_symbol(&sym);
                    self.emitter.add();
                    self.emitter.pop("pointer", 1);
                    self.emitter.push("that", 0);
                } else if self.at_symbol('.') || self.at_symbol('(') {
                    self.compile_call(class, sub, name)?;
                } else {
                    let sym = self.resolve(sub, &name)?;
                    self.emitter.push_symbol(&sym);
                }
            }
            _ => {
                return Err(self.error_at_current(&format!(
                    "expected an expression, found {}",
                    self.describe_current()
                )))
            }
        }
        Ok(())
    }

    /// Compiles a subroutine call whose leading identifier has already
    /// been consumed. Classifies the call per the three cases: a bare
    /// `name(...)` is a method call on the current object; `a.b(...)`
    /// is either a method call on a resolved local/field, or a static
    /// call on an unresolved (presumed class) name.
    fn compile_call(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
        first: Spanned<String>,
    ) -> Result<(), Diagnostic> {
        if self.eat_symbol('.') {
            let second = self.expect_ident()?;
            self.expect_symbol('(')?;
            match sub.get(&first.node).cloned() {
                Some(sym) => {
                    self.emitter.push_symbol(&sym);
                    let n = self.compile_expression_list(class, sub)?;
                    self.expect_symbol(')')?;
                    self.emitter.call(&sym.declared_type, &second.node, n + 1);
                }
                None => {
                    let n = self.compile_expression_list(class, sub)?;
                    self.expect_symbol(')')?;
                    self.emitter.call(&first.node, &second.node, n);
                }
            }
        } else {
            self.expect_symbol('(')?;
            self.emitter.push("pointer", 0);
            let n = self.compile_expression_list(class, sub)?;
            self.expect_symbol(')')?;
            self.emitter.call(class.name(), &first.node, n + 1);
        }
        Ok(())
    }

    fn compile_expression_list(
        &mut self,
        class: &ClassScope,
        sub: &SubroutineScope,
    ) -> Result<u16, Diagnostic> {
        if self.at_symbol(')') {
            return Ok(0);
        }
        let mut count: u16 = 0;
        loop {
            self.compile_expression(class, sub)?;
            count += 1;
            if !self.eat_symbol(',') {
                break;
            }
        }
        Ok(count)
    }

    fn resolve(
        &self,
        sub: &SubroutineScope,
        name: &Spanned<String>,
    ) -> Result<crate::symbol::Symbol, Diagnostic> {
        sub.get(&name.node).cloned().ok_or_else(|| {
            Diagnostic::error(
                format!("reference to undeclared identifier '{}'", name.node),
                name.span,
            )
        })
    }

    fn fresh_label(&mut self) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!("L{}", n)
    }

    // --- token-consumption utilities ---

    fn peek(&self) -> Option<&Token> {
        self.tokenizer.peek().map(|t| &t.node)
    }

    fn current_span(&self) -> Span {
        self.tokenizer.current_span()
    }

    fn advance(&mut self) -> Option<Spanned<Token>> {
        self.tokenizer.advance()
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Some(Token::Keyword(k)) if *k == kw)
    }

    fn at_symbol(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token::Symbol(s)) if *s == c)
    }

    fn eat_symbol(&mut self, c: char) -> bool {
        if self.at_symbol(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), Diagnostic> {
        if self.eat_symbol(c) {
            Ok(())
        } else {
            Err(self.error_at_current(&format!(
                "expected '{}', found {}",
                c,
                self.describe_current()
            )))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<(), Diagnostic> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error_at_current(&format!(
                "expected '{}', found {}",
                kw.text(),
                self.describe_current()
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, Diagnostic> {
        match self.tokenizer.peek().cloned() {
            Some(Spanned {
                node: Token::Identifier(name),
                span,
            }) => {
                self.advance();
                Ok(Spanned::new(name, span))
            }
            _ => Err(self.error_at_current(&format!(
                "expected identifier, found {}",
                self.describe_current()
            ))),
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(t) => t.description(),
            None => "end of file".to_string(),
        }
    }

    fn error_at_current(&self, msg: &str) -> Diagnostic {
        Diagnostic::error(msg.to_string(), self.current_span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> String {
        let (tokenizer, diags) = Tokenizer::new(source, 0);
        assert!(diags.is_empty(), "unexpected lex errors: {:?}", diags);
        CompilationEngine::new(tokenizer)
            .compile_class()
            .unwrap_or_else(|d| panic!("unexpected compile error: {}", d.message))
    }

    fn compile_err(source: &str) -> Diagnostic {
        let (tokenizer, diags) = Tokenizer::new(source, 0);
        assert!(diags.is_empty(), "unexpected lex errors: {:?}", diags);
        CompilationEngine::new(tokenizer)
            .compile_class()
            .expect_err("expected a compile error")
    }

    #[test]
    fn test_scenario_function_returning_constant() {
        let vm = compile("class A { function int seven() { return 7; } }");
        assert_eq!(vm, "function A.seven 0\npush constant 7\nreturn\n");
    }

    #[test]
    fn test_scenario_constructor() {
        let vm = compile(
            "class A { field int x; constructor A new() { let x = 0; return this; } }",
        );
        assert_eq!(
            vm,
            "function A.new 0\n\
             push constant 1\n\
             call Memory.alloc 1\n\
             pop pointer 0\n\
             push constant 0\n\
             pop this 0\n\
             push pointer 0\n\
             return\n"
        );
    }

    #[test]
    fn test_scenario_method_this_at_arg_zero() {
        let vm = compile("class A { method int id(int y) { return y; } }");
        assert_eq!(
            vm,
            "function A.id 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push argument 1\n\
             return\n"
        );
    }

    #[test]
    fn test_scenario_if_else() {
        let vm = compile(
            "class A { function void f() { if (1 = 1) { return; } else { return; } } }",
        );
        assert_eq!(
            vm,
            "function A.f 0\n\
             push constant 1\n\
             push constant 1\n\
             eq\n\
             not\n\
             if-goto L0\n\
             push constant 0\n\
             return\n\
             goto L1\n\
             label L0\n\
             push constant 0\n\
             return\n\
             label L1\n"
        );
    }

    #[test]
    fn test_scenario_static_call_unknown_class() {
        let vm = compile("class A { function void f() { do Output.printInt(2+3); return; } }");
        assert_eq!(
            vm,
            "function A.f 0\n\
             push constant 2\n\
             push constant 3\n\
             add\n\
             call Output.printInt 1\n\
             pop temp 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_scenario_array_assignment_clobber_avoidance() {
        let vm = compile(
            "class A { field Array a; method void set(int i, int v) { let a[i] = v; return; } }",
        );
        assert_eq!(
            vm,
            "function A.set 0\n\
             push argument 0\n\
             pop pointer 0\n\
             push argument 1\n\
             push this 0\n\
             add\n\
             push argument 2\n\
             pop temp 0\n\
             pop pointer 1\n\
             push temp 0\n\
             pop that 0\n\
             push constant 0\n\
             return\n"
        );
    }

    #[test]
    fn test_empty_class_emits_nothing() {
        let vm = compile("class Empty { }");
        assert_eq!(vm, "");
    }

    #[test]
    fn test_while_loop_labels() {
        let vm = compile("class A { function void f() { while (true) { return; } return; } }");
        assert!(vm.starts_with("function A.f 0\nlabel L0\n"));
        assert!(vm.contains("if-goto L1"));
        assert!(vm.contains("goto L0"));
        assert!(vm.contains("label L1"));
    }

    #[test]
    fn test_unqualified_call_pushes_this() {
        let vm = compile(
            "class A { method void helper() { return; } method void run() { do helper(); return; } }",
        );
        assert!(vm.contains("push pointer 0\ncall A.helper 1\npop temp 0"));
    }

    #[test]
    fn test_qualified_call_on_resolved_field() {
        let vm = compile(
            "class A { field B b; method void run() { do b.go(); return; } }",
        );
        assert!(vm.contains("push this 0\ncall B.go 1\npop temp 0"));
    }

    #[test]
    fn test_labels_are_unique_across_subroutines() {
        let vm = compile(
            "class A { \
             function void f() { if (true) { return; } return; } \
             function void g() { if (true) { return; } return; } \
             }",
        );
        // f's if-block uses L0/L1; g's reuses neither.
        assert!(vm.contains("label L0"));
        assert!(vm.contains("label L1"));
        assert!(vm.contains("label L2"));
        assert!(vm.contains("label L3"));
    }

    #[test]
    fn test_error_undeclared_identifier() {
        let diag = compile_err("class A { function void f() { let x = 1; return; } }");
        assert!(
            diag.message.contains("undeclared identifier"),
            "{}",
            diag.message
        );
    }

    #[test]
    fn test_error_unexpected_token() {
        let diag = compile_err("class A { function void f() return; } }");
        assert!(diag.message.contains("expected"), "{}", diag.message);
    }

    #[test]
    fn test_error_missing_semicolon() {
        let diag = compile_err("class A { function void f() { return }");
        assert!(diag.message.contains("';'"), "{}", diag.message);
    }
}
