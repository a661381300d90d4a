use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"_[ \t]*\r?\n")]
pub enum Token {
    // Keywords
    #[token("print", ignore(ascii_case))]
    Print,
    #[token("let", ignore(ascii_case))]
    Let,
    #[token("dim", ignore(ascii_case))]
    Dim,
    #[token("redim", ignore(ascii_case))]
    Redim,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("if", ignore(ascii_case))]
    If,
    #[token("then", ignore(ascii_case))]
    Then,
    #[token("else", ignore(ascii_case))]
    Else,
    #[token("elseif", ignore(ascii_case))]
    ElseIf,
    #[token("end", ignore(ascii_case))]
    End,
    #[token("while", ignore(ascii_case))]
    While,
    #[token("wend", ignore(ascii_case))]
    Wend,
    #[token("do", ignore(ascii_case))]
    Do,
    #[token("loop", ignore(ascii_case))]
    Loop,
    #[token("until", ignore(ascii_case))]
    Until,
    #[token("for", ignore(ascii_case))]
    For,
    #[token("to", ignore(ascii_case))]
    To,
    #[token("step", ignore(ascii_case))]
    Step,
    #[token("next", ignore(ascii_case))]
    Next,
    #[token("exit", ignore(ascii_case))]
    Exit,
    #[token("goto", ignore(ascii_case))]
    Goto,
    #[token("gosub", ignore(ascii_case))]
    Gosub,
    #[token("return", ignore(ascii_case))]
    Return,
    #[token("function", ignore(ascii_case))]
    Function,
    #[token("sub", ignore(ascii_case))]
    Sub,
    #[token("call", ignore(ascii_case))]
    Call,
    #[token("byref", ignore(ascii_case))]
    ByRef,
    #[token("byval", ignore(ascii_case))]
    ByVal,
    #[token("input", ignore(ascii_case))]
    Input,
    #[token("line", ignore(ascii_case))]
    Line,
    #[token("open", ignore(ascii_case))]
    Open,
    #[token("close", ignore(ascii_case))]
    Close,
    #[token("seek", ignore(ascii_case))]
    Seek,
    #[token("output", ignore(ascii_case))]
    Output,
    #[token("append", ignore(ascii_case))]
    Append,
    #[token("on", ignore(ascii_case))]
    On,
    #[token("error", ignore(ascii_case))]
    Error,
    #[token("resume", ignore(ascii_case))]
    Resume,
    #[token("cls", ignore(ascii_case))]
    Cls,
    #[token("color", ignore(ascii_case))]
    Color,
    #[token("locate", ignore(ascii_case))]
    Locate,
    #[token("randomize", ignore(ascii_case))]
    Randomize,
    #[token("select", ignore(ascii_case))]
    Select,
    #[token("case", ignore(ascii_case))]
    Case,
    #[token("is", ignore(ascii_case))]
    Is,
    #[token("class", ignore(ascii_case))]
    Class,
    #[token("type", ignore(ascii_case))]
    Type,
    #[token("new", ignore(ascii_case))]
    New,
    #[token("me", ignore(ascii_case))]
    Me,
    #[token("delete", ignore(ascii_case))]
    Delete,
    #[token("lbound", ignore(ascii_case))]
    LBound,
    #[token("ubound", ignore(ascii_case))]
    UBound,
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,

    // Type names
    #[token("integer", ignore(ascii_case))]
    Integer,
    #[token("long", ignore(ascii_case))]
    Long,
    #[token("double", ignore(ascii_case))]
    Double,
    #[token("single", ignore(ascii_case))]
    Single,
    #[token("string", ignore(ascii_case))]
    StringKw,
    #[token("boolean", ignore(ascii_case))]
    Boolean,

    // Word operators
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("xor", ignore(ascii_case))]
    Xor,
    #[token("mod", ignore(ascii_case))]
    Mod,
    #[token("andalso", ignore(ascii_case))]
    AndAlso,
    #[token("orelse", ignore(ascii_case))]
    OrElse,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    #[regex(r"&[hH][0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok())]
    IntLit(i64),

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?|\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLit(f64),

    #[regex(r#""([^"\r\n]|"")*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len() - 1].replace("\"\"", "\""))
    })]
    StringLit(String),

    // Identifiers, with an optional type suffix
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*[$#%]?")]
    Ident,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("\\")]
    Backslash,
    #[token("^")]
    Caret,
    #[token("&")]
    Amp,
    #[token("=")]
    Eq,
    #[token("<>")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("#")]
    Hash,

    // Line breaks end statements
    #[regex(r"\r?\n")]
    Newline,

    // Comments (skipped by `lex`)
    #[regex(r"'[^\r\n]*")]
    #[regex(r"rem([ \t][^\r\n]*)?", priority = 10, ignore(ascii_case))]
    Comment,
}

impl Token {
    /// Human-readable name used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            Token::IntLit(n) => format!("integer {n}"),
            Token::FloatLit(f) => format!("number {f}"),
            Token::StringLit(s) => format!("string \"{s}\""),
            Token::Ident => "identifier".to_string(),
            Token::Newline => "end of line".to_string(),
            other => format!("'{other}'"),
        }
    }
}

/// Returns true if the given word is reserved.
pub fn is_keyword(s: &str) -> bool {
    let mut lexer = Token::lexer(s);
    match (lexer.next(), lexer.next()) {
        (Some(Ok(tok)), None) => !matches!(
            tok,
            Token::Ident | Token::IntLit(_) | Token::FloatLit(_) | Token::StringLit(_) | Token::Comment
        ) && s.chars().all(|c| c.is_ascii_alphabetic()),
        _ => false,
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Print => write!(f, "PRINT"),
            Token::Let => write!(f, "LET"),
            Token::Dim => write!(f, "DIM"),
            Token::Redim => write!(f, "REDIM"),
            Token::As => write!(f, "AS"),
            Token::If => write!(f, "IF"),
            Token::Then => write!(f, "THEN"),
            Token::Else => write!(f, "ELSE"),
            Token::ElseIf => write!(f, "ELSEIF"),
            Token::End => write!(f, "END"),
            Token::While => write!(f, "WHILE"),
            Token::Wend => write!(f, "WEND"),
            Token::Do => write!(f, "DO"),
            Token::Loop => write!(f, "LOOP"),
            Token::Until => write!(f, "UNTIL"),
            Token::For => write!(f, "FOR"),
            Token::To => write!(f, "TO"),
            Token::Step => write!(f, "STEP"),
            Token::Next => write!(f, "NEXT"),
            Token::Exit => write!(f, "EXIT"),
            Token::Goto => write!(f, "GOTO"),
            Token::Gosub => write!(f, "GOSUB"),
            Token::Return => write!(f, "RETURN"),
            Token::Function => write!(f, "FUNCTION"),
            Token::Sub => write!(f, "SUB"),
            Token::Call => write!(f, "CALL"),
            Token::ByRef => write!(f, "BYREF"),
            Token::ByVal => write!(f, "BYVAL"),
            Token::Input => write!(f, "INPUT"),
            Token::Line => write!(f, "LINE"),
            Token::Open => write!(f, "OPEN"),
            Token::Close => write!(f, "CLOSE"),
            Token::Seek => write!(f, "SEEK"),
            Token::Output => write!(f, "OUTPUT"),
            Token::Append => write!(f, "APPEND"),
            Token::On => write!(f, "ON"),
            Token::Error => write!(f, "ERROR"),
            Token::Resume => write!(f, "RESUME"),
            Token::Cls => write!(f, "CLS"),
            Token::Color => write!(f, "COLOR"),
            Token::Locate => write!(f, "LOCATE"),
            Token::Randomize => write!(f, "RANDOMIZE"),
            Token::Select => write!(f, "SELECT"),
            Token::Case => write!(f, "CASE"),
            Token::Is => write!(f, "IS"),
            Token::Class => write!(f, "CLASS"),
            Token::Type => write!(f, "TYPE"),
            Token::New => write!(f, "NEW"),
            Token::Me => write!(f, "ME"),
            Token::Delete => write!(f, "DELETE"),
            Token::LBound => write!(f, "LBOUND"),
            Token::UBound => write!(f, "UBOUND"),
            Token::True => write!(f, "TRUE"),
            Token::False => write!(f, "FALSE"),
            Token::Integer => write!(f, "INTEGER"),
            Token::Long => write!(f, "LONG"),
            Token::Double => write!(f, "DOUBLE"),
            Token::Single => write!(f, "SINGLE"),
            Token::StringKw => write!(f, "STRING"),
            Token::Boolean => write!(f, "BOOLEAN"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Not => write!(f, "NOT"),
            Token::Xor => write!(f, "XOR"),
            Token::Mod => write!(f, "MOD"),
            Token::AndAlso => write!(f, "ANDALSO"),
            Token::OrElse => write!(f, "ORELSE"),
            Token::IntLit(n) => write!(f, "{n}"),
            Token::FloatLit(n) => write!(f, "{n}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Ident => write!(f, "identifier"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Backslash => write!(f, "\\"),
            Token::Caret => write!(f, "^"),
            Token::Amp => write!(f, "&"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtEq => write!(f, ">="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Hash => write!(f, "#"),
            Token::Newline => write!(f, "newline"),
            Token::Comment => write!(f, "comment"),
        }
    }
}
