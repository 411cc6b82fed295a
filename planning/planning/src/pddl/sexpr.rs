use crate::errors::{Span, Spanned};
use crate::pddl::input::Input;
use crate::utils::disp_iter;
use crate::{Message, Res, Sym};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub type SAtom = Sym;

#[derive(Clone)]
pub struct SList {
    list: Vec<SExpr>,
    source: Arc<Input>,
    span: std::ops::Range<usize>,
}

impl SList {
    pub fn iter(&self) -> ListIter {
        ListIter {
            elems: self.list.as_slice(),
            source: self.source.clone(),
            span: self.span.clone(),
        }
    }

    pub fn loc(&self) -> Span {
        Span::new(self.source.clone(), self.span.clone())
    }

    pub fn invalid(&self, error: impl ToString) -> Message {
        let error = error.to_string();
        Message::error(&error).snippet(self.loc().error(error))
    }
}

impl std::ops::Index<usize> for SList {
    type Output = SExpr;

    fn index(&self, index: usize) -> &Self::Output {
        &self.list[index]
    }
}

#[derive(Clone)]
pub enum SExpr {
    Atom(SAtom),
    List(SList),
}

impl SExpr {
    pub fn loc(&self) -> Span {
        match self {
            SExpr::Atom(atom) => atom.span_or_default(),
            SExpr::List(list) => list.loc(),
        }
    }

    pub fn invalid(&self, error: impl ToString) -> Message {
        let error = error.to_string();
        Message::error(&error).snippet(self.loc().error(error))
    }

    pub fn is_atom(&self, expected_atom: &str) -> bool {
        self.as_atom().map(|a| a.canonical_str() == expected_atom).unwrap_or(false)
    }

    /// If this s-expression is the application of the function `function_name`, returns
    /// the arguments of the application.
    pub fn as_application(&self, function_name: &str) -> Option<&[SExpr]> {
        match self {
            SExpr::Atom(_) => None,
            SExpr::List(l) => match l.list.as_slice() {
                [SExpr::Atom(head), rest @ ..] if head.canonical_str() == function_name => Some(rest),
                _ => None,
            },
        }
    }

    pub fn as_list(&self) -> Option<&SList> {
        match &self {
            SExpr::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list_iter(&self) -> Option<ListIter> {
        match &self {
            SExpr::List(v) => Some(v.iter()),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&SAtom> {
        match self {
            SExpr::Atom(a) => Some(a),
            _ => None,
        }
    }
}

pub struct ListIter<'a> {
    elems: &'a [SExpr],
    source: Arc<Input>,
    span: std::ops::Range<usize>,
}

impl<'a> ListIter<'a> {
    pub fn peek(&self) -> Option<&'a SExpr> {
        self.elems.first()
    }

    pub fn pop(&mut self) -> Res<&'a SExpr> {
        self.next().ok_or_else(|| self.invalid("Unexpected end of list"))
    }

    pub fn loc(&self) -> Span {
        Span::new(self.source.clone(), self.span.clone())
    }

    pub fn invalid(&self, error: impl ToString) -> Message {
        let error = error.to_string();
        Message::error(&error).snippet(self.loc().error(error))
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn pop_known_atom(&mut self, expected: &str) -> Res<()> {
        match self.next() {
            None => Err(self.invalid(format!("Expected atom `{expected}` but got end of list"))),
            Some(sexpr) => {
                let atom = sexpr
                    .as_atom()
                    .ok_or_else(|| sexpr.invalid(format!("Expected atom `{expected}`")))?;
                if atom.canonical_str() == expected {
                    Ok(())
                } else {
                    Err(sexpr.invalid(format!("Expected the atom `{expected}`")))
                }
            }
        }
    }

    pub fn pop_atom(&mut self) -> Res<&'a SAtom> {
        match self.next() {
            None => Err(self.invalid("Expected an atom but got end of list.")),
            Some(sexpr) => sexpr.as_atom().ok_or_else(|| sexpr.invalid("Expected an atom")),
        }
    }

    pub fn pop_list(&mut self) -> Res<&'a SList> {
        match self.next() {
            None => Err(self.invalid("Expected a list but got end of list.")),
            Some(sexpr) => sexpr.as_list().ok_or_else(|| sexpr.invalid("Expected a list")),
        }
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a SExpr;

    fn next(&mut self) -> Option<Self::Item> {
        match self.elems.split_first() {
            None => None,
            Some((head, tail)) => {
                self.elems = tail;
                Some(head)
            }
        }
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self {
            SExpr::Atom(a) => write!(f, "{a}"),
            SExpr::List(l) => {
                write!(f, "(")?;
                disp_iter(f, &l.list, " ")?;
                write!(f, ")")
            }
        }
    }
}

impl Debug for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Sym { start: usize, end: usize },
    LParen(usize),
    RParen(usize),
}

/// Parses the input into a single s-expression.
pub fn parse(s: Arc<Input>) -> Res<SExpr> {
    let tokenized = tokenize(&s);
    let mut tokens = tokenized.iter().peekable();
    let result = read(&mut tokens, &s)?;
    if let Some(tok) = tokens.next() {
        let pos = match tok {
            Token::Sym { start, .. } | Token::LParen(start) | Token::RParen(start) => *start,
        };
        return Err(Message::error("Unexpected trailing input")
            .snippet(Span::new(s.clone(), pos..pos + 1).error("expected end of input")));
    }
    Ok(result)
}

/// Parses the input into a sequence of s-expressions (e.g. the lines of a plan file).
pub fn parse_many(s: Arc<Input>) -> Res<Vec<SExpr>> {
    let tokenized = tokenize(&s);
    let mut tokens = tokenized.iter().peekable();
    let mut result = Vec::new();
    while tokens.peek().is_some() {
        result.push(read(&mut tokens, &s)?);
    }
    Ok(result)
}

/// Parse the input into a sequence of tokens.
///
/// Handles `;` line comments and records byte offsets for error reporting.
fn tokenize(source: &Arc<Input>) -> Vec<Token> {
    let s = source.text.as_str();
    let mut tokens = Vec::new();

    // start index of the symbol currently being read
    let mut cur_start = None;
    // true if we are currently inside a comment (between a ';' and a '\n')
    let mut is_in_comment = false;

    for (index, n) in s.char_indices() {
        if n.is_whitespace() || n == '(' || n == ')' || n == ';' || is_in_comment {
            // if we were parsing a symbol, we have reached its end
            if let Some(start) = cur_start {
                tokens.push(Token::Sym { start, end: index });
                cur_start = None;
            }

            if n == '\n' {
                is_in_comment = false;
            } else if n == ';' {
                is_in_comment = true;
            } else if n == '(' {
                tokens.push(Token::LParen(index));
            } else if n == ')' {
                tokens.push(Token::RParen(index));
            }
        } else if cur_start.is_none() {
            cur_start = Some(index);
        }
    }
    if let Some(start) = cur_start {
        tokens.push(Token::Sym { start, end: s.len() });
    }
    tokens
}

fn read(tokens: &mut std::iter::Peekable<core::slice::Iter<Token>>, src: &Arc<Input>) -> Res<SExpr> {
    match tokens.next() {
        Some(&Token::Sym { start, end }) => {
            let symbol = src.text[start..end].to_ascii_lowercase();
            let atom = Sym::with_source(symbol, Span::new(src.clone(), start..end));
            Ok(SExpr::Atom(atom))
        }
        Some(&Token::LParen(start)) => {
            let mut es = Vec::new();
            loop {
                match tokens.peek() {
                    Some(&&Token::RParen(end)) => {
                        let _ = tokens.next(); // consume
                        let list = SList {
                            list: es,
                            source: src.clone(),
                            span: start..end + 1,
                        };
                        break Ok(SExpr::List(list));
                    }
                    Some(_) => {
                        let e = read(tokens, src)?;
                        es.push(e);
                    }
                    None => {
                        break Err(Message::error("Unclosed parenthesis")
                            .snippet(Span::new(src.clone(), start..start + 1).error("opened here")))
                    }
                }
            }
        }
        Some(&Token::RParen(pos)) => Err(Message::error("Unexpected closing parenthesis")
            .snippet(Span::new(src.clone(), pos..pos + 1).error("unmatched"))),
        None => Err(Message::error("Unexpected end of input")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats_as(input: &str, output: &str) {
        let res = parse(Arc::new(Input::from_string(input))).unwrap();
        let formatted = format!("{res}");
        assert_eq!(&formatted, output);
    }

    #[test]
    fn parsing() {
        formats_as("aa", "aa");
        formats_as(" aa", "aa");
        formats_as("aa ", "aa");
        formats_as(" aa ", "aa");
        formats_as("(a b)", "(a b)");
        formats_as("(a (b c) d)", "(a (b c) d)");
        formats_as(" ( a  ( b  c )   d  )   ", "(a (b c) d)");
        formats_as(
            " ( a  (
        b  c )   d  )   ",
            "(a (b c) d)",
        );
        formats_as(
            " ( a  ( b ; (y x)
         c )   d
           )
          ",
            "(a (b c) d)",
        );
    }

    #[test]
    fn case_folding() {
        formats_as("(Move ?R - Robot)", "(move ?r - robot)");
    }

    #[test]
    fn errors() {
        assert!(parse(Arc::new(Input::from_string("(a (b)"))).is_err());
        assert!(parse(Arc::new(Input::from_string("a)"))).is_err());
        assert!(parse_many(Arc::new(Input::from_string("(a) (b c)"))).unwrap().len() == 2);
    }
}
