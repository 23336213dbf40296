//! Single-pass Pratt compiler: tokens straight to bytecode, with
//! compile-time local-scope resolution and jump patching. There is no
//! intermediate AST — every expression emits its operand bytecode and
//! then its operator bytecode as it is parsed.

use crate::scanner::{Scanner, Token, TokenKind};
use ember_core::{Chunk, FunctionObj, Heap, ObjHandle, OpCode, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Shift,
    BAnd,
    Xor,
    BOr,
    Term,
    Factor,
    Unary,
    Exponent,
    Call,
    Subscript,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Shift,
            Precedence::Shift => Precedence::BAnd,
            Precedence::BAnd => Precedence::Xor,
            Precedence::Xor => Precedence::BOr,
            Precedence::BOr => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Exponent,
            Precedence::Exponent => Precedence::Call,
            Precedence::Call => Precedence::Subscript,
            Precedence::Subscript | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'src, 'heap> = fn(&mut Compiler<'src, 'heap>, bool);

struct ParseRule<'src, 'heap> {
    prefix: Option<ParseFn<'src, 'heap>>,
    infix: Option<ParseFn<'src, 'heap>>,
    precedence: Precedence,
}

fn get_rule<'src, 'heap>(kind: TokenKind) -> ParseRule<'src, 'heap> {
    match kind {
        TokenKind::LeftParen => ParseRule {
            prefix: Some(Compiler::grouping),
            infix: Some(Compiler::call),
            precedence: Precedence::Call,
        },
        TokenKind::LeftBracket => ParseRule {
            prefix: Some(Compiler::list),
            infix: Some(Compiler::subscript),
            precedence: Precedence::Subscript,
        },
        TokenKind::Minus => ParseRule {
            prefix: Some(Compiler::unary),
            infix: Some(Compiler::binary),
            precedence: Precedence::Term,
        },
        TokenKind::Plus => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Term,
        },
        TokenKind::Tilde => ParseRule {
            prefix: Some(Compiler::unary),
            infix: None,
            precedence: Precedence::Term,
        },
        TokenKind::Slash | TokenKind::SlashSlash | TokenKind::Star | TokenKind::Percent => {
            ParseRule {
                prefix: None,
                infix: Some(Compiler::binary),
                precedence: Precedence::Factor,
            }
        }
        TokenKind::StarStar => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Exponent,
        },
        TokenKind::Bang => ParseRule {
            prefix: Some(Compiler::unary),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::BangEqual | TokenKind::EqualEqual => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Equality,
        },
        TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less | TokenKind::LessEqual => {
            ParseRule {
                prefix: None,
                infix: Some(Compiler::binary),
                precedence: Precedence::Comparison,
            }
        }
        TokenKind::LessLess | TokenKind::GreaterGreater => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Shift,
        },
        TokenKind::Amp => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::BAnd,
        },
        TokenKind::Caret => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Xor,
        },
        TokenKind::Pipe => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::BOr,
        },
        TokenKind::Identifier => ParseRule {
            prefix: Some(Compiler::variable),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::String => ParseRule {
            prefix: Some(Compiler::string),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::Number => ParseRule {
            prefix: Some(Compiler::number),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::And => ParseRule {
            prefix: None,
            infix: Some(Compiler::and_),
            precedence: Precedence::And,
        },
        TokenKind::Or => ParseRule {
            prefix: None,
            infix: Some(Compiler::or_),
            precedence: Precedence::Or,
        },
        TokenKind::Not => ParseRule {
            prefix: Some(Compiler::not_),
            infix: None,
            precedence: Precedence::None,
        },
        TokenKind::True | TokenKind::False | TokenKind::None => ParseRule {
            prefix: Some(Compiler::literal),
            infix: None,
            precedence: Precedence::None,
        },
        _ => ParseRule {
            prefix: None,
            infix: None,
            precedence: Precedence::None,
        },
    }
}

struct Local<'src> {
    name: &'src str,
    depth: i32,
}

struct LoopState {
    loop_start: usize,
    break_jumps: Vec<usize>,
}

struct FunctionScope<'src> {
    function: FunctionObj,
    locals: Vec<Local<'src>>,
    scope_depth: i32,
    loops: Vec<LoopState>,
}

impl<'src> FunctionScope<'src> {
    fn new(arity: u8, name: Option<ObjHandle>, initial_depth: i32) -> Self {
        FunctionScope {
            function: FunctionObj::new(arity, name),
            // Slot 0 is reserved for the callee itself; it has no
            // source name so user code can never resolve it.
            locals: vec![Local {
                name: "",
                depth: initial_depth,
            }],
            scope_depth: initial_depth,
            loops: Vec::new(),
        }
    }
}

pub struct Compiler<'src, 'heap> {
    heap: &'heap mut Heap,
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    scopes: Vec<FunctionScope<'src>>,
}

const MAX_LOCALS: usize = 256;
const MAX_CONSTANTS: usize = 256;
const MAX_PARAMETERS: u8 = 255;
const MAX_ARGUMENTS: u8 = 255;
const MAX_BREAKS_PER_LOOP: usize = 256;

/// Compiles `source` into a top-level `<script>` function, or returns
/// `None` if any compile error was reported (matching every diagnostic
/// to stderr as it happens, per the panic-mode recovery scheme below).
pub fn compile(source: &str, heap: &mut Heap) -> Option<ObjHandle> {
    let (function, had_error) = {
        let mut compiler = Compiler::new(source, heap);
        while !compiler.match_token(TokenKind::Eof) {
            compiler.declaration();
        }
        let function = compiler.end_function();
        (function, compiler.had_error)
    };
    if had_error {
        Option::None
    } else {
        Some(heap.alloc_function(function))
    }
}

impl<'src, 'heap> Compiler<'src, 'heap> {
    fn new(source: &'src str, heap: &'heap mut Heap) -> Self {
        let mut scanner = Scanner::new(source);
        let first = scanner.scan_token();
        Compiler {
            heap,
            scanner,
            previous: first,
            current: first,
            had_error: false,
            panic_mode: false,
            scopes: vec![FunctionScope::new(0, Option::None, 0)],
        }
    }

    // ---- token stream -------------------------------------------------

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.bump();
            return;
        }
        self.error_at_current(message);
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.bump();
        true
    }

    /// Advances the token stream by one, skipping and reporting any
    /// error tokens the scanner produces along the way.
    fn bump(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme.to_string();
            self.error_at_current(&message);
        }
    }

    // ---- diagnostics ----------------------------------------------------

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        eprint!("[line {}] Error", token.line);
        match token.kind {
            TokenKind::Eof => eprint!(" at end"),
            TokenKind::Error => {}
            _ => eprint!(" at '{}'", token.lexeme),
        }
        eprintln!(": {message}");
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Def
                | TokenKind::Var
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Return => return,
                _ => {}
            }
            self.bump();
        }
    }

    // ---- scope plumbing -------------------------------------------------

    fn scope(&self) -> &FunctionScope<'src> {
        self.scopes.last().expect("at least one function scope")
    }

    fn scope_mut(&mut self) -> &mut FunctionScope<'src> {
        self.scopes.last_mut().expect("at least one function scope")
    }

    fn chunk_mut(&mut self) -> &mut Chunk {
        &mut self.scope_mut().function.chunk
    }

    fn chunk(&self) -> &Chunk {
        &self.scope().function.chunk
    }

    // ---- bytecode emission ------------------------------------------------

    fn emit_byte(&mut self, byte: u8, line: u32) {
        self.chunk_mut().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode, line: u32) {
        self.chunk_mut().write_op(op, line);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        let line = self.previous.line;
        self.emit_op(op, line);
        self.chunk_mut().emit_jump_placeholder(line)
    }

    fn patch_jump(&mut self, offset: usize) {
        if let Err(message) = self.chunk_mut().patch_jump(offset) {
            self.error(&message);
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        let line = self.previous.line;
        self.emit_op(OpCode::Loop, line);
        let offset = self.chunk().len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
            return;
        }
        self.emit_byte(((offset >> 8) & 0xff) as u8, line);
        self.emit_byte((offset & 0xff) as u8, line);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        if self.chunk().constants.len() >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        self.chunk_mut().add_constant(value) as u8
    }

    fn emit_constant(&mut self, value: Value, line: u32) {
        let idx = self.make_constant(value);
        self.emit_op(OpCode::Constant, line);
        self.emit_byte(idx, line);
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let handle = self.heap.intern_str(name);
        self.make_constant(Value::Object(handle))
    }

    // ---- variable resolution ---------------------------------------------

    fn resolve_local(&mut self, name: &str) -> Option<u8> {
        let locals = &self.scope().locals;
        for (idx, local) in locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    self.error("Can't read local variable in its own initializer.");
                }
                return Some(idx as u8);
            }
        }
        Option::None
    }

    fn declare_variable(&mut self, name: &'src str) {
        if self.scope().scope_depth == 0 {
            return;
        }
        let depth = self.scope().scope_depth;
        let mut duplicate = false;
        for local in self.scope().locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if local.name == name {
                duplicate = true;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        if self.scope().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.scope_mut().locals.push(Local { name, depth: -1 });
    }

    fn mark_initialized(&mut self) {
        let scope = self.scope_mut();
        if scope.scope_depth == 0 {
            return;
        }
        let last = scope.locals.len() - 1;
        scope.locals[last].depth = scope.scope_depth;
    }

    /// Declares `name` at the current scope and, for a global, interns
    /// its name into the constant pool. Returns `None` for a local.
    fn declare_and_slot(&mut self, name: &'src str) -> Option<u8> {
        self.declare_variable(name);
        if self.scope().scope_depth > 0 {
            Option::None
        } else {
            Some(self.identifier_constant(name))
        }
    }

    fn define_variable(&mut self, global: Option<u8>, line: u32) {
        match global {
            Some(idx) => {
                self.emit_op(OpCode::DefineGlobal, line);
                self.emit_byte(idx, line);
            }
            Option::None => self.mark_initialized(),
        }
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let line = self.previous.line;
        if let Some(slot) = self.resolve_local(name) {
            if can_assign && self.match_token(TokenKind::Equal) {
                self.expression();
                self.emit_op(OpCode::SetLocal, line);
            } else {
                self.emit_op(OpCode::GetLocal, line);
            }
            self.emit_byte(slot, line);
        } else {
            let idx = self.identifier_constant(name);
            if can_assign && self.match_token(TokenKind::Equal) {
                self.expression();
                self.emit_op(OpCode::SetGlobal, line);
            } else {
                self.emit_op(OpCode::GetGlobal, line);
            }
            self.emit_byte(idx, line);
        }
    }

    // ---- declarations and statements --------------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else if self.match_token(TokenKind::Def) {
            self.def_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        loop {
            self.consume(TokenKind::Identifier, "Expect variable name.");
            let name = self.previous.lexeme;
            let line = self.previous.line;
            let global = self.declare_and_slot(name);
            if self.match_token(TokenKind::Equal) {
                self.expression();
            } else {
                self.emit_op(OpCode::None, line);
            }
            self.define_variable(global, line);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
    }

    fn def_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect function name.");
        let name = self.previous.lexeme;
        let line = self.previous.line;
        let global = self.declare_and_slot(name);
        self.mark_initialized();
        let name_handle = self.heap.intern_str(name);
        self.function(Some(name_handle));
        self.define_variable(global, line);
    }

    fn function(&mut self, name: Option<ObjHandle>) {
        self.scopes.push(FunctionScope::new(0, name, 1));
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.scope().function.arity == MAX_PARAMETERS {
                    self.error_at_current("Can't have more than 255 parameters.");
                } else {
                    self.scope_mut().function.arity += 1;
                }
                self.consume(TokenKind::Identifier, "Expect parameter name.");
                let name = self.previous.lexeme;
                self.declare_variable(name);
                self.mark_initialized();
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::Colon, "Expect ':' after function signature.");
        self.block_until(&[TokenKind::End]);
        self.consume(TokenKind::End, "Expect 'end' after function body.");
        let function = self.end_function();
        let handle = self.heap.alloc_function(function);
        let line = self.previous.line;
        self.emit_constant(Value::Object(handle), line);
    }

    /// Appends the implicit `none; return` every function falls through
    /// to and pops this function's scope off the compiler.
    fn end_function(&mut self) -> FunctionObj {
        let line = self.previous.line;
        self.emit_op(OpCode::None, line);
        self.emit_op(OpCode::Return, line);
        self.scopes.pop().expect("matching function scope").function
    }

    fn block_until(&mut self, terminators: &[TokenKind]) {
        while !terminators.contains(&self.current.kind) && self.current.kind != TokenKind::Eof {
            self.declaration();
        }
    }

    /// Body loop for if/elif/else/while blocks. Unlike [`Self::block_until`]
    /// this dispatches `statement()` only, so a `var`/`def` inside one of
    /// these bodies is "Expect expression." the same way it is at the
    /// start of any other expression position; only the top level and
    /// function bodies may declare.
    fn statement_block_until(&mut self, terminators: &[TokenKind]) {
        while !terminators.contains(&self.current.kind) && self.current.kind != TokenKind::Eof {
            self.statement();
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::Break) {
            self.break_statement();
        } else if self.match_token(TokenKind::Continue) {
            self.continue_statement();
        } else {
            self.expression_statement();
        }
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        let line = self.previous.line;
        self.emit_op(OpCode::Pop, line);
    }

    fn if_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Colon, "Expect ':' after condition.");
        let mut then_jump = self.emit_jump(OpCode::JumpIfFalse);
        let mut pop_line = self.previous.line;
        self.emit_op(OpCode::Pop, pop_line);

        self.statement_block_until(&[TokenKind::Elif, TokenKind::Else, TokenKind::End]);

        let mut end_jumps = vec![self.emit_jump(OpCode::Jump)];
        self.patch_jump(then_jump);
        pop_line = self.previous.line;
        self.emit_op(OpCode::Pop, pop_line);

        while self.check(TokenKind::Elif) {
            self.bump();
            self.expression();
            self.consume(TokenKind::Colon, "Expect ':' after condition.");
            then_jump = self.emit_jump(OpCode::JumpIfFalse);
            pop_line = self.previous.line;
            self.emit_op(OpCode::Pop, pop_line);

            self.statement_block_until(&[TokenKind::Elif, TokenKind::Else, TokenKind::End]);

            end_jumps.push(self.emit_jump(OpCode::Jump));
            self.patch_jump(then_jump);
            pop_line = self.previous.line;
            self.emit_op(OpCode::Pop, pop_line);
        }

        if self.match_token(TokenKind::Else) {
            self.statement_block_until(&[TokenKind::End]);
        }

        self.consume(TokenKind::End, "Expect 'end' after if statement.");
        for jump in end_jumps {
            self.patch_jump(jump);
        }
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk().len();
        self.scope_mut().loops.push(LoopState {
            loop_start,
            break_jumps: Vec::new(),
        });

        self.expression();
        self.consume(TokenKind::Colon, "Expect ':' after condition.");
        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        let mut line = self.previous.line;
        self.emit_op(OpCode::Pop, line);

        self.statement_block_until(&[TokenKind::End]);

        self.consume(TokenKind::End, "Expect 'end' after while body.");
        self.emit_loop(loop_start);
        self.patch_jump(exit_jump);
        line = self.previous.line;
        self.emit_op(OpCode::Pop, line);

        let loop_state = self.scope_mut().loops.pop().expect("loop state pushed above");
        for jump in loop_state.break_jumps {
            self.patch_jump(jump);
        }
    }

    fn break_statement(&mut self) {
        if self.scope().loops.is_empty() {
            self.error("Can't use 'break' outside of a loop.");
            self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.");
            return;
        }
        let jump = self.emit_jump(OpCode::Jump);
        let loop_state = self.scope_mut().loops.last_mut().unwrap();
        loop_state.break_jumps.push(jump);
        if loop_state.break_jumps.len() > MAX_BREAKS_PER_LOOP {
            self.error("Too many break statements in one loop.");
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.");
    }

    fn continue_statement(&mut self) {
        if self.scope().loops.is_empty() {
            self.error("Can't use 'continue' outside of a loop.");
            self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.");
            return;
        }
        let loop_start = self.scope().loops.last().unwrap().loop_start;
        self.emit_loop(loop_start);
        self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.");
    }

    fn return_statement(&mut self) {
        if self.scopes.len() == 1 {
            self.error("Can't return from top-level code.");
        }
        let line = self.previous.line;
        if self.match_token(TokenKind::Semicolon) {
            self.emit_op(OpCode::None, line);
            self.emit_op(OpCode::Return, line);
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return, line);
        }
    }

    // ---- expressions -------------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.bump();
        let Some(prefix) = get_rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= get_rule(self.current.kind).precedence {
            self.bump();
            match get_rule(self.previous.kind).infix {
                Some(infix) => infix(self, can_assign),
                Option::None => break,
            }
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        let value: f64 = self.previous.lexeme.parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value), line);
    }

    fn string(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        let lexeme = self.previous.lexeme;
        let inner = &lexeme[1..lexeme.len() - 1];
        let handle = self.heap.intern_str(inner);
        self.emit_constant(Value::Object(handle), line);
    }

    fn literal(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        match self.previous.kind {
            TokenKind::True => self.emit_op(OpCode::True, line),
            TokenKind::False => self.emit_op(OpCode::False, line),
            TokenKind::None => self.emit_op(OpCode::None, line),
            _ => unreachable!("literal() only invoked for true/false/none"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme;
        self.named_variable(name, can_assign);
    }

    fn unary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        let line = self.previous.line;
        self.parse_precedence(Precedence::Unary);
        match op_kind {
            TokenKind::Minus => self.emit_op(OpCode::Negate, line),
            TokenKind::Bang => self.emit_op(OpCode::Not, line),
            TokenKind::Tilde => self.emit_op(OpCode::BitNot, line),
            _ => unreachable!("unary() only invoked for - ! ~"),
        }
    }

    fn not_(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        self.parse_precedence(Precedence::Unary);
        self.emit_op(OpCode::Not, line);
    }

    fn binary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        let line = self.previous.line;
        let rule = get_rule(op_kind);
        // `**` is right-associative: parse the RHS at its own
        // precedence so a chain of `**` nests to the right instead of
        // the left.
        let rhs_precedence = if op_kind == TokenKind::StarStar {
            rule.precedence
        } else {
            rule.precedence.next()
        };
        self.parse_precedence(rhs_precedence);

        match op_kind {
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal, line),
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal, line);
                self.emit_op(OpCode::Not, line);
            }
            TokenKind::Greater => self.emit_op(OpCode::Greater, line),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less, line);
                self.emit_op(OpCode::Not, line);
            }
            TokenKind::Less => self.emit_op(OpCode::Less, line),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater, line);
                self.emit_op(OpCode::Not, line);
            }
            TokenKind::Plus => self.emit_op(OpCode::Add, line),
            TokenKind::Minus => self.emit_op(OpCode::Subtract, line),
            TokenKind::Star => self.emit_op(OpCode::Multiply, line),
            TokenKind::Slash => self.emit_op(OpCode::Divide, line),
            TokenKind::SlashSlash => self.emit_op(OpCode::IntDiv, line),
            TokenKind::Percent => self.emit_op(OpCode::Mod, line),
            TokenKind::StarStar => self.emit_op(OpCode::Pow, line),
            TokenKind::Amp => self.emit_op(OpCode::BitAnd, line),
            TokenKind::Pipe => self.emit_op(OpCode::BitOr, line),
            TokenKind::Caret => self.emit_op(OpCode::BitXor, line),
            TokenKind::LessLess => self.emit_op(OpCode::ShiftLeft, line),
            TokenKind::GreaterGreater => self.emit_op(OpCode::ShiftRight, line),
            _ => unreachable!("binary() only invoked for known infix operators"),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop, line);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop, line);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        let arg_count = self.argument_list();
        self.emit_op(OpCode::Call, line);
        self.emit_byte(arg_count, line);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: u8 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count == MAX_ARGUMENTS {
                    self.error("Can't have more than 255 arguments.");
                } else {
                    count += 1;
                }
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count
    }

    fn list(&mut self, _can_assign: bool) {
        let line = self.previous.line;
        let mut count: u32 = 0;
        if !self.check(TokenKind::RightBracket) {
            loop {
                if self.check(TokenKind::RightBracket) {
                    break;
                }
                self.expression();
                count += 1;
                if count > u8::MAX as u32 {
                    self.error("Too many elements in list literal.");
                }
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "Expect ']' after list elements.");
        self.emit_op(OpCode::BuildList, line);
        self.emit_byte(count as u8, line);
    }

    fn subscript(&mut self, can_assign: bool) {
        let line = self.previous.line;
        self.expression();
        self.consume(TokenKind::RightBracket, "Expect ']' after index.");
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op(OpCode::StoreSubscr, line);
        } else {
            self.emit_op(OpCode::IndexSubscr, line);
        }
    }
}
