use crate::error::SprigError;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Punctuation
    LeftParen,
    RightParen,
    Comma,
    Equal,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,

    // Comparison and boolean operators
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    AndAnd,
    OrOr,

    // Literals
    Identifier,
    Integer,
    Float,
    String,

    // Keywords
    If,
    Elif,
    Else,
    End,
    While,
    Def,
    Print,
    Puts,
    Gets,
    Not,
    And,
    Or,
    Is,
    True,
    False,
    Nil,
}

impl TokenKind {
    /// Reserved words.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::End
                | TokenKind::While
                | TokenKind::Def
                | TokenKind::Print
                | TokenKind::Puts
                | TokenKind::Gets
                | TokenKind::Not
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Is
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
        )
    }

    pub fn is_number_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::StarStar
                | TokenKind::Slash
                | TokenKind::Percent
        )
    }

    /// A physical line ending in one of these continues on the next line.
    pub fn is_line_concatenator(self) -> bool {
        matches!(
            self,
            TokenKind::Comma
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Star
                | TokenKind::StarStar
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Bang
                | TokenKind::OrOr
                | TokenKind::AndAnd
                | TokenKind::Not
                | TokenKind::Or
                | TokenKind::And
                | TokenKind::If
                | TokenKind::Elif
                | TokenKind::Is
                | TokenKind::EqualEqual
                | TokenKind::BangEqual
                | TokenKind::Greater
                | TokenKind::Less
                | TokenKind::GreaterEqual
                | TokenKind::LessEqual
                | TokenKind::While
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, line: u32) -> Self {
        Self { kind, lexeme, line }
    }
}

/// Splits source text into logical lines of tokens.
///
/// Physical lines are merged while parentheses are open or while a line ends
/// in an operator that expects more input. Comments (`#` to end of line) and
/// blank lines never reach the parser.
pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: u32,
    keywords: HashMap<&'static str, TokenKind>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("if", TokenKind::If);
        keywords.insert("elif", TokenKind::Elif);
        keywords.insert("else", TokenKind::Else);
        keywords.insert("end", TokenKind::End);
        keywords.insert("while", TokenKind::While);
        keywords.insert("def", TokenKind::Def);
        keywords.insert("print", TokenKind::Print);
        keywords.insert("puts", TokenKind::Puts);
        keywords.insert("gets", TokenKind::Gets);
        keywords.insert("not", TokenKind::Not);
        keywords.insert("and", TokenKind::And);
        keywords.insert("or", TokenKind::Or);
        keywords.insert("is", TokenKind::Is);
        keywords.insert("true", TokenKind::True);
        keywords.insert("false", TokenKind::False);
        keywords.insert("nil", TokenKind::Nil);

        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            keywords,
        }
    }

    pub fn scan_lines(&mut self) -> Result<Vec<Vec<Token>>, SprigError> {
        let mut lines = Vec::new();
        let mut pending: Vec<Token> = Vec::new();
        let mut paren_depth: i32 = 0;

        while !self.is_at_end() {
            let physical = self.scan_physical_line()?;
            for token in &physical {
                match token.kind {
                    TokenKind::LeftParen => paren_depth += 1,
                    TokenKind::RightParen => paren_depth -= 1,
                    _ => {}
                }
            }
            pending.extend(physical);

            let continues = paren_depth > 0
                || pending
                    .last()
                    .is_some_and(|token| token.kind.is_line_concatenator());
            if !continues && !pending.is_empty() {
                lines.push(std::mem::take(&mut pending));
                paren_depth = 0;
            }
        }

        // A dangling continuation is handed over as-is; the parser reports
        // the missing operand with a proper message.
        if !pending.is_empty() {
            lines.push(pending);
        }

        Ok(lines)
    }

    fn scan_physical_line(&mut self) -> Result<Vec<Token>, SprigError> {
        while !self.is_at_end() {
            self.start = self.current;
            if self.peek() == '\n' {
                self.advance();
                self.line += 1;
                break;
            }
            self.scan_token()?;
        }
        Ok(std::mem::take(&mut self.tokens))
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) -> Result<(), SprigError> {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            ',' => self.add_token(TokenKind::Comma),
            '+' => self.add_token(TokenKind::Plus),
            '-' => self.add_token(TokenKind::Minus),
            '/' => self.add_token(TokenKind::Slash),
            '%' => self.add_token(TokenKind::Percent),
            '*' => {
                let kind = if self.match_char('*') {
                    TokenKind::StarStar
                } else {
                    TokenKind::Star
                };
                self.add_token(kind);
            }
            '!' => {
                let kind = if self.match_char('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.add_token(kind);
            }
            '&' if self.match_char('&') => self.add_token(TokenKind::AndAnd),
            '|' if self.match_char('|') => self.add_token(TokenKind::OrOr),
            '#' => {
                while !self.is_at_end() && self.peek() != '\n' {
                    self.advance();
                }
            }
            ' ' | '\r' | '\t' => {}
            '"' => self.string()?,
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.identifier()?,
            _ => {
                return Err(SprigError::lex_error(
                    self.line,
                    format!("Illegal symbol '{}' on line {}", c, self.line),
                ));
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.current += 1;
            true
        }
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn string(&mut self) -> Result<(), SprigError> {
        let mut content = String::new();

        loop {
            if self.is_at_end() || self.peek() == '\n' {
                return Err(SprigError::lex_error(
                    self.line,
                    format!("Unterminated string on line {}", self.line),
                ));
            }
            match self.advance() {
                '"' => break,
                '\\' => {
                    let escaped = match self.advance() {
                        'n' => '\n',
                        't' => '\t',
                        '"' => '"',
                        '\\' => '\\',
                        other => {
                            return Err(SprigError::lex_error(
                                self.line,
                                format!("Unknown escape '\\{}' on line {}", other, self.line),
                            ));
                        }
                    };
                    content.push(escaped);
                }
                c => content.push(c),
            }
        }

        self.add_token_with_content(TokenKind::String, content);
        Ok(())
    }

    fn number(&mut self) -> Result<(), SprigError> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text = self.lexeme();
        if is_float {
            if text.parse::<f64>().is_err() {
                return Err(SprigError::lex_error(
                    self.line,
                    format!("Invalid float '{}' on line {}", text, self.line),
                ));
            }
            self.add_token_with_content(TokenKind::Float, text);
        } else {
            if text.parse::<i64>().is_err() {
                return Err(SprigError::lex_error(
                    self.line,
                    format!("Invalid integer '{}' on line {}", text, self.line),
                ));
            }
            self.add_token_with_content(TokenKind::Integer, text);
        }

        Ok(())
    }

    fn identifier(&mut self) -> Result<(), SprigError> {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.lexeme();
        if text == "$" {
            return Err(SprigError::lex_error(
                self.line,
                format!("Illegal symbol '$' on line {}", self.line),
            ));
        }

        let kind = self
            .keywords
            .get(text.as_str())
            .copied()
            .unwrap_or(TokenKind::Identifier);
        self.add_token_with_content(kind, text);
        Ok(())
    }

    fn add_token(&mut self, kind: TokenKind) {
        let text = self.lexeme();
        self.add_token_with_content(kind, text);
    }

    fn add_token_with_content(&mut self, kind: TokenKind, lexeme: String) {
        self.tokens.push(Token::new(kind, lexeme, self.line));
    }
}

/// Whether `source` stops in the middle of a statement: inside an unclosed
/// `if`/`while`/`def` block, inside parentheses, or after an operator.
pub fn is_incomplete(source: &str) -> bool {
    let lines = match Lexer::new(source).scan_lines() {
        Ok(lines) => lines,
        Err(_) => return false,
    };

    if let Some(last) = lines.last() {
        let open: i32 = last
            .iter()
            .map(|token| match token.kind {
                TokenKind::LeftParen => 1,
                TokenKind::RightParen => -1,
                _ => 0,
            })
            .sum();
        let dangling = last
            .last()
            .is_some_and(|token| token.kind.is_line_concatenator());
        if open > 0 || dangling {
            return true;
        }
    }

    let mut depth: i32 = 0;
    for line in &lines {
        match line.first().map(|token| token.kind) {
            Some(TokenKind::If | TokenKind::While | TokenKind::Def) => depth += 1,
            Some(TokenKind::End) => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Vec<TokenKind>> {
        Lexer::new(source)
            .scan_lines()
            .unwrap()
            .iter()
            .map(|line| line.iter().map(|token| token.kind).collect())
            .collect()
    }

    #[test]
    fn splits_lines_and_drops_blank_ones() {
        assert_eq!(
            kinds("x = 1\n\n\nprint x\n"),
            vec![
                vec![TokenKind::Identifier, TokenKind::Equal, TokenKind::Integer],
                vec![TokenKind::Print, TokenKind::Identifier],
            ]
        );
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(
            kinds("# a comment\nputs 1 # trailing\n"),
            vec![vec![TokenKind::Puts, TokenKind::Integer]]
        );
    }

    #[test]
    fn trailing_operator_joins_next_line() {
        let lines = Lexer::new("x = 1 +\n  2\nputs x").scan_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 5);
        assert_eq!(lines[0][4].line, 2);
    }

    #[test]
    fn open_parenthesis_joins_next_line() {
        let lines = Lexer::new("f(1,\n2\n)\nputs 3").scan_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].last().unwrap().kind, TokenKind::RightParen);
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            kinds("a ** b == c != d >= e <= f && g || h"),
            vec![vec![
                TokenKind::Identifier,
                TokenKind::StarStar,
                TokenKind::Identifier,
                TokenKind::EqualEqual,
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::GreaterEqual,
                TokenKind::Identifier,
                TokenKind::LessEqual,
                TokenKind::Identifier,
                TokenKind::AndAnd,
                TokenKind::Identifier,
                TokenKind::OrOr,
                TokenKind::Identifier,
            ]]
        );
    }

    #[test]
    fn literals_and_global_identifiers() {
        let lines = Lexer::new("$total = 1.25, 7, \"a \\\"b\\\"\"")
            .scan_lines()
            .unwrap();
        let line = &lines[0];
        assert_eq!(line[0].kind, TokenKind::Identifier);
        assert_eq!(line[0].lexeme, "$total");
        assert_eq!(line[2].kind, TokenKind::Float);
        assert_eq!(line[4].kind, TokenKind::Integer);
        assert_eq!(line[6].kind, TokenKind::String);
        assert_eq!(line[6].lexeme, "a \"b\"");
    }

    #[test]
    fn illegal_symbol_reports_line() {
        let error = Lexer::new("x = 1\ny = @").scan_lines().unwrap_err();
        assert_eq!(error.line, 2);
        assert!(error.message.contains("Illegal symbol '@'"));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let error = Lexer::new("puts \"oops\nputs 1").scan_lines().unwrap_err();
        assert!(error.message.contains("Unterminated string"));
    }

    #[test]
    fn incomplete_input_detection() {
        assert!(is_incomplete("if x > 1\nputs x"));
        assert!(is_incomplete("def f(a)\n"));
        assert!(is_incomplete("x = 1 +"));
        assert!(is_incomplete("f(1,"));
        assert!(!is_incomplete("if x > 1\nputs x\nend"));
        assert!(!is_incomplete("x = 1"));
    }
}
