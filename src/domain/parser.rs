//! Expression parser for billing formulas.
//!
//! This module implements a recursive descent parser for arithmetic
//! expressions such as `(consumption * rate_per_unit) - discount`. Function
//! calls are resolved against the closed [`Builtin`] set while parsing, so the
//! resulting AST cannot name anything outside it.
//!
//! # BNF Grammar
//!
//! ```bnf
//! Expression     ::= Addition
//! Addition       ::= Multiplication ( ( "+" | "-" ) Multiplication )*
//! Multiplication ::= Unary ( ( "*" | "/" ) Unary )*
//! Unary          ::= ( "+" | "-" ) Unary | Power
//! Power          ::= Primary ( "^" Unary )?
//! Primary        ::= Number | Variable | FunctionCall | "(" Expression ")"
//! FunctionCall   ::= ( "min" | "max" ) "(" Expression ( "," Expression )+ ")"
//! Variable       ::= [A-Za-z_] [A-Za-z0-9_]*
//! Number         ::= ( [0-9]+ ( "." [0-9]* )? | "." [0-9]+ ) ( [eE] [+-]? [0-9]+ )?
//! ```
//!
//! Precedence notes:
//! - `^` is right-associative: `2 ^ 3 ^ 2` is `2 ^ (3 ^ 2)`
//! - unary minus binds looser than `^` on its left: `-2 ^ 2` is `-(2 ^ 2)`
//! - the exponent may itself be negated: `2 ^ -1` is `0.5`
//!
//! Offsets reported in [`ParseError`] are zero-based character positions.

use super::errors::{ParseError, ParseErrorKind};
use super::policy::Builtin;

/// Longest expression, in characters, the parser accepts.
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Deepest nesting of parentheses, unary operators and exponents.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Represents a token in the expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    // End of input
    Eof,
}

/// Represents an Abstract Syntax Tree node for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable {
        name: String,
        offset: usize,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        function: Builtin,
        args: Vec<Expr>,
    },
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl Expr {
    /// Names of all variables the expression reads, in first-use order and
    /// without repeats.
    ///
    /// ```
    /// use billcalc::domain::parser::parse;
    ///
    /// let ast = parse("max(a, b) * a - discount").unwrap();
    /// assert_eq!(ast.referenced_variables(), vec!["a", "b", "discount"]);
    /// ```
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable { name, .. } => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Unary { operand, .. } => operand.collect_variables(names),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }
}

/// Lexical analyzer for tokenizing expressions.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    token_start: usize,
}

impl Lexer {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
            token_start: 0,
        }
    }

    /// Offset of the first character of the most recently returned token.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Reads a numeric literal: integer or decimal with an optional exponent.
    fn read_number(&mut self) -> Result<f64, ParseError> {
        let start = self.position;
        let mut number_str = String::new();
        let mut seen_dot = false;
        let mut malformed = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                number_str.push(ch);
            } else if ch == '.' {
                if seen_dot {
                    malformed = true;
                }
                seen_dot = true;
                number_str.push(ch);
            } else {
                break;
            }
            self.advance();
        }

        if matches!(self.current_char, Some('e' | 'E')) {
            number_str.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current_char {
                number_str.push(sign);
                self.advance();
            }
            let mut exponent_digits = 0;
            while let Some(ch) = self.current_char {
                if ch.is_ascii_digit() {
                    number_str.push(ch);
                    exponent_digits += 1;
                    self.advance();
                } else {
                    break;
                }
            }
            if exponent_digits == 0 {
                malformed = true;
            }
        }

        let invalid = || {
            ParseError::new(
                ParseErrorKind::InvalidNumberLiteral,
                format!("Invalid number: {}", number_str),
                start,
            )
        };

        if malformed {
            return Err(invalid());
        }
        match number_str.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(invalid()),
        }
    }

    /// Reads an identifier; case is preserved.
    fn read_identifier(&mut self) -> String {
        let mut identifier = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                identifier.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    /// Gets the next token from the input.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        self.token_start = self.position;

        let Some(ch) = self.current_char else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            '0'..='9' => return self.read_number().map(Token::Number),
            '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => {
                return self.read_number().map(Token::Number);
            }
            '.' => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidNumberLiteral,
                    "Invalid number: .",
                    self.position,
                ));
            }
            'A'..='Z' | 'a'..='z' | '_' => return Ok(Token::Identifier(self.read_identifier())),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Multiply,
            '/' => Token::Divide,
            '^' => Token::Power,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            ',' => Token::Comma,
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken,
                    format!("Unexpected character: '{}'", ch),
                    self.position,
                ));
            }
        };

        self.advance();
        Ok(token)
    }
}

/// Recursive descent parser for billing formula expressions.
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_offset: usize,
    open_parens: usize,
    depth: usize,
}

impl Parser {
    /// Creates a new parser for the given expression.
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let length = input.chars().count();
        if length > MAX_EXPRESSION_LENGTH {
            return Err(ParseError::new(
                ParseErrorKind::ExpressionTooComplex,
                format!(
                    "Expression is {} characters long; the limit is {}",
                    length, MAX_EXPRESSION_LENGTH
                ),
                MAX_EXPRESSION_LENGTH,
            ));
        }

        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        let current_offset = lexer.token_start();

        Ok(Self {
            lexer,
            current_token,
            current_offset,
            open_parens: 0,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        self.current_offset = self.lexer.token_start();
        Ok(())
    }

    fn unexpected(&self) -> ParseError {
        let message = match &self.current_token {
            Token::Eof => "Unexpected end of expression".to_string(),
            token => format!("Unexpected token: {:?}", token),
        };
        ParseError::new(ParseErrorKind::UnexpectedToken, message, self.current_offset)
    }

    /// Consumes the `)` matching the `(` at `open_offset`.
    fn expect_closing_paren(&mut self, open_offset: usize) -> Result<(), ParseError> {
        match self.current_token {
            Token::RightParen => {
                self.open_parens -= 1;
                self.advance()
            }
            Token::Eof => Err(ParseError::new(
                ParseErrorKind::UnbalancedParentheses,
                "Unclosed '('",
                open_offset,
            )),
            _ => Err(self.unexpected()),
        }
    }

    /// Parses the whole input as a single expression.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        if self.current_token == Token::Eof {
            return Err(ParseError::new(
                ParseErrorKind::EmptyExpression,
                "Expression is empty",
                0,
            ));
        }

        let expr = self.parse_addition()?;

        match self.current_token {
            Token::Eof => Ok(expr),
            Token::RightParen => Err(ParseError::new(
                ParseErrorKind::UnbalancedParentheses,
                "Unmatched ')'",
                self.current_offset,
            )),
            _ => Err(self.unexpected()),
        }
    }

    /// Parses addition and subtraction expressions.
    fn parse_addition(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplication()?;

        loop {
            let operator = match self.current_token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_multiplication()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parses multiplication and division expressions.
    fn parse_multiplication(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let operator = match self.current_token {
                Token::Multiply => BinaryOp::Multiply,
                Token::Divide => BinaryOp::Divide,
                _ => break,
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parses unary expressions. Every recursive path passes through here,
    /// so this is where nesting depth is bounded.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                ParseErrorKind::ExpressionTooComplex,
                format!("Expression nests deeper than {} levels", MAX_NESTING_DEPTH),
                self.current_offset,
            ));
        }

        self.depth += 1;
        let result = self.parse_unary_inner();
        self.depth -= 1;
        result
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ParseError> {
        let operator = match self.current_token {
            Token::Plus => UnaryOp::Plus,
            Token::Minus => UnaryOp::Minus,
            _ => return self.parse_power(),
        };
        self.advance()?;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    /// Parses power expressions (right-associative).
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_primary()?;

        if self.current_token == Token::Power {
            self.advance()?;
            let right = self.parse_unary()?;
            Ok(Expr::Binary {
                left: Box::new(left),
                operator: BinaryOp::Power,
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    /// Parses primary expressions (highest precedence).
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match &self.current_token {
            Token::Number(value) => {
                let value = *value;
                self.advance()?;
                Ok(Expr::Number(value))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                let offset = self.current_offset;
                self.advance()?;

                if self.current_token == Token::LeftParen {
                    self.parse_call(name, offset)
                } else {
                    Ok(Expr::Variable { name, offset })
                }
            }
            Token::LeftParen => {
                let open_offset = self.current_offset;
                self.open_parens += 1;
                self.advance()?;
                let expr = self.parse_addition()?;
                self.expect_closing_paren(open_offset)?;
                Ok(expr)
            }
            Token::RightParen if self.open_parens == 0 => Err(ParseError::new(
                ParseErrorKind::UnbalancedParentheses,
                "Unmatched ')'",
                self.current_offset,
            )),
            _ => Err(self.unexpected()),
        }
    }

    /// Parses `name(args...)` once the name has been consumed.
    fn parse_call(&mut self, name: String, name_offset: usize) -> Result<Expr, ParseError> {
        let function = Builtin::lookup(&name).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UnknownFunction,
                format!("Unknown function: {}", name),
                name_offset,
            )
        })?;

        let open_offset = self.current_offset;
        self.open_parens += 1;
        self.advance()?;
        let args = self.parse_argument_list()?;
        self.expect_closing_paren(open_offset)?;

        if args.len() < function.min_arity() {
            return Err(ParseError::new(
                ParseErrorKind::WrongArgumentCount,
                format!(
                    "{} expects at least {} arguments, got {}",
                    function,
                    function.min_arity(),
                    args.len()
                ),
                name_offset,
            ));
        }

        Ok(Expr::Call { function, args })
    }

    /// Parses function argument lists.
    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if self.current_token == Token::RightParen {
            return Ok(args);
        }

        args.push(self.parse_addition()?);

        while self.current_token == Token::Comma {
            self.advance()?;
            args.push(self.parse_addition()?);
        }

        Ok(args)
    }
}

/// Whether `name` is a well-formed variable reference: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

/// Parses an expression string into an AST.
///
/// ```
/// use billcalc::domain::parser::{parse, Expr};
///
/// assert_eq!(parse("42").unwrap(), Expr::Number(42.0));
/// assert!(parse("import(\"fs\")").is_err());
/// ```
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn var(name: &str, offset: usize) -> Expr {
        Expr::Variable {
            name: name.to_string(),
            offset,
        }
    }

    fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    fn kind_of(input: &str) -> ParseErrorKind {
        parse(input).unwrap_err().kind
    }

    #[test]
    fn test_lexer_numbers() {
        let mut lexer = Lexer::new("42 3.75 0.5 .25 5. 1e3 2.5E-2 7e+1");
        assert_eq!(lexer.next_token().unwrap(), Token::Number(42.0));
        assert_eq!(lexer.next_token().unwrap(), Token::Number(3.75));
        assert_eq!(lexer.next_token().unwrap(), Token::Number(0.5));
        assert_eq!(lexer.next_token().unwrap(), Token::Number(0.25));
        assert_eq!(lexer.next_token().unwrap(), Token::Number(5.0));
        assert_eq!(lexer.next_token().unwrap(), Token::Number(1000.0));
        assert_eq!(lexer.next_token().unwrap(), Token::Number(0.025));
        assert_eq!(lexer.next_token().unwrap(), Token::Number(70.0));
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_lexer_operators_and_delimiters() {
        let mut lexer = Lexer::new("+ - * / ^ ( ) ,");
        assert_eq!(lexer.next_token().unwrap(), Token::Plus);
        assert_eq!(lexer.next_token().unwrap(), Token::Minus);
        assert_eq!(lexer.next_token().unwrap(), Token::Multiply);
        assert_eq!(lexer.next_token().unwrap(), Token::Divide);
        assert_eq!(lexer.next_token().unwrap(), Token::Power);
        assert_eq!(lexer.next_token().unwrap(), Token::LeftParen);
        assert_eq!(lexer.next_token().unwrap(), Token::RightParen);
        assert_eq!(lexer.next_token().unwrap(), Token::Comma);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_lexer_identifiers_keep_case() {
        let mut lexer = Lexer::new("rate_per_unit Consumption _tmp x1");
        assert_eq!(lexer.next_token().unwrap(), Token::Identifier("rate_per_unit".to_string()));
        assert_eq!(lexer.next_token().unwrap(), Token::Identifier("Consumption".to_string()));
        assert_eq!(lexer.next_token().unwrap(), Token::Identifier("_tmp".to_string()));
        assert_eq!(lexer.next_token().unwrap(), Token::Identifier("x1".to_string()));
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_lexer_token_offsets() {
        let mut lexer = Lexer::new("  ab *  3");
        lexer.next_token().unwrap();
        assert_eq!(lexer.token_start(), 2);
        lexer.next_token().unwrap();
        assert_eq!(lexer.token_start(), 5);
        lexer.next_token().unwrap();
        assert_eq!(lexer.token_start(), 8);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
        assert_eq!(lexer.token_start(), 9);
    }

    #[test]
    fn test_parser_precedence() {
        assert_eq!(
            parse("2 + 3 * 4").unwrap(),
            binary(
                Expr::Number(2.0),
                BinaryOp::Add,
                binary(Expr::Number(3.0), BinaryOp::Multiply, Expr::Number(4.0)),
            )
        );
    }

    #[test]
    fn test_parser_power_right_associative() {
        assert_eq!(
            parse("2 ^ 3 ^ 2").unwrap(),
            binary(
                Expr::Number(2.0),
                BinaryOp::Power,
                binary(Expr::Number(3.0), BinaryOp::Power, Expr::Number(2.0)),
            )
        );
    }

    #[test]
    fn test_parser_unary_minus_looser_than_power() {
        assert_eq!(
            parse("-2 ^ 2").unwrap(),
            Expr::Unary {
                operator: UnaryOp::Minus,
                operand: Box::new(binary(Expr::Number(2.0), BinaryOp::Power, Expr::Number(2.0))),
            }
        );
    }

    #[test]
    fn test_parser_negative_exponent() {
        assert_eq!(
            parse("2^-1").unwrap(),
            binary(
                Expr::Number(2.0),
                BinaryOp::Power,
                Expr::Unary {
                    operator: UnaryOp::Minus,
                    operand: Box::new(Expr::Number(1.0)),
                },
            )
        );
    }

    #[test]
    fn test_parser_variables_record_offsets() {
        assert_eq!(
            parse("(consumption * rate_per_unit) - discount").unwrap(),
            binary(
                binary(var("consumption", 1), BinaryOp::Multiply, var("rate_per_unit", 15)),
                BinaryOp::Subtract,
                var("discount", 32),
            )
        );
    }

    #[test]
    fn test_parser_function_calls() {
        assert_eq!(
            parse("max(a, b, 10)").unwrap(),
            Expr::Call {
                function: Builtin::Max,
                args: vec![var("a", 4), var("b", 7), Expr::Number(10.0)],
            }
        );
    }

    #[test]
    fn test_parser_variable_named_like_function() {
        assert_eq!(parse("min + 1").unwrap(), binary(var("min", 0), BinaryOp::Add, Expr::Number(1.0)));
    }

    #[test]
    fn test_parser_is_deterministic() {
        let input = "max(a, b) * (c - 2.5e1) ^ -d";
        assert_eq!(parse(input), parse(input));
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(kind_of(""), ParseErrorKind::EmptyExpression);
        assert_eq!(kind_of("   \t "), ParseErrorKind::EmptyExpression);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = parse("(1 + 2").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedParentheses);
        assert_eq!(err.offset, 0);

        let err = parse("1 + 2)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedParentheses);
        assert_eq!(err.offset, 5);

        assert_eq!(kind_of("1 + )"), ParseErrorKind::UnbalancedParentheses);
        assert_eq!(kind_of("max(1, 2"), ParseErrorKind::UnbalancedParentheses);
        assert_eq!(kind_of("((1)"), ParseErrorKind::UnbalancedParentheses);
    }

    #[test]
    fn test_unexpected_token() {
        let err = parse("2x").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(err.offset, 1);

        assert_eq!(kind_of("1 +"), ParseErrorKind::UnexpectedToken);
        assert_eq!(kind_of("()"), ParseErrorKind::UnexpectedToken);
        assert_eq!(kind_of("1 $ 2"), ParseErrorKind::UnexpectedToken);
        assert_eq!(kind_of("a b"), ParseErrorKind::UnexpectedToken);
        assert_eq!(kind_of("max(1,,2)"), ParseErrorKind::UnexpectedToken);
        assert_eq!(kind_of("1, 2"), ParseErrorKind::UnexpectedToken);
        assert_eq!(kind_of("\"text\""), ParseErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_invalid_number_literals() {
        let err = parse("1 + 1.2.3").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidNumberLiteral);
        assert_eq!(err.offset, 4);

        assert_eq!(kind_of("1e"), ParseErrorKind::InvalidNumberLiteral);
        assert_eq!(kind_of("1e+"), ParseErrorKind::InvalidNumberLiteral);
        assert_eq!(kind_of("."), ParseErrorKind::InvalidNumberLiteral);
        assert_eq!(kind_of("1e999"), ParseErrorKind::InvalidNumberLiteral);
    }

    #[test]
    fn test_unknown_functions_never_parse() {
        for input in ["import('fs')", "parse(\"1+1\")", "evaluate(x)", "simplify(x)", "derivative(x, y)", "MIN(1, 2)", "sqrt(4)"] {
            assert_eq!(kind_of(input), ParseErrorKind::UnknownFunction, "{input}");
        }

        let err = parse("1 + evaluate(2)").unwrap_err();
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_wrong_argument_count() {
        assert_eq!(kind_of("min(1)"), ParseErrorKind::WrongArgumentCount);
        assert_eq!(kind_of("max()"), ParseErrorKind::WrongArgumentCount);
    }

    #[test]
    fn test_too_complex() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(kind_of(&deep), ParseErrorKind::ExpressionTooComplex);

        let negations = format!("{}1", "-".repeat(200));
        assert_eq!(kind_of(&negations), ParseErrorKind::ExpressionTooComplex);

        let long = "1+".repeat(MAX_EXPRESSION_LENGTH) + "1";
        assert_eq!(kind_of(&long), ParseErrorKind::ExpressionTooComplex);

        let nested = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(parse(&nested).unwrap(), Expr::Number(1.0));
    }

    #[test]
    fn test_referenced_variables() {
        let ast = parse("a + b * a - min(c, 1)").unwrap();
        assert_eq!(ast.referenced_variables(), vec!["a", "b", "c"]);
        assert!(parse("1 + 2").unwrap().referenced_variables().is_empty());
    }

    #[test]
    fn test_is_identifier() {
        for name in ["a", "rate_per_unit", "_x", "A1", "consumption"] {
            assert!(is_identifier(name), "{name}");
        }
        for name in ["", "1a", "rate-per-unit", "with space", "é"] {
            assert!(!is_identifier(name), "{name}");
        }
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(input in "\\PC{0,64}") {
            let _ = parse(&input);
        }

        #[test]
        fn prop_parse_is_deterministic(input in "[a-c0-9+*/^() .,-]{0,40}") {
            prop_assert_eq!(parse(&input), parse(&input));
        }
    }
}
