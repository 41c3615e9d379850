use log::{debug, trace};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1, take_while_m_n};
use nom::character::complete::char as cchar;
use nom::character::complete::{digit0, digit1, one_of};
use nom::combinator::{map, map_res, not, opt, recognize, value, verify};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use regex_vis_util::read_unicode_escape;

use crate::ast::{
    attach, combine, Anchor, Backref, Class, Escaped, ExprRoot, Group,
    Literal, Look, Node, Or, Quantifier, Range, Visitor,
};
use crate::error::ParseError;

type NResult<'a, T> = IResult<&'a str, T>;

/// Maximum nesting of groups and lookarounds accepted by default.
pub const DEFAULT_NEST_LIMIT: u32 = 250;

/// A regular expression parser.
///
/// Scans the pattern left to right and assembles the tree with [`combine`]
/// and [`attach`]. Groups are tracked with an explicit stack, so the
/// nesting depth is bounded by [`Parser::nest_limit`] and not by the call
/// stack.
#[derive(Debug, Clone)]
pub struct Parser {
    debug: bool,
    nest_limit: u32,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self { debug: false, nest_limit: DEFAULT_NEST_LIMIT }
    }

    /// When true, [`Parser::parse`] checks that the resulting tree renders
    /// back into the original pattern, and returns
    /// [`ParseError::RoundTrip`] if it doesn't.
    pub fn debug(mut self, yes: bool) -> Self {
        self.debug = yes;
        self
    }

    /// Maximum number of groups and lookarounds that can be nested inside
    /// each other.
    pub fn nest_limit(mut self, limit: u32) -> Self {
        self.nest_limit = limit;
        self
    }

    pub fn parse(&self, pattern: &str) -> Result<ExprRoot, ParseError> {
        let scanner =
            Scanner { pattern, rest: pattern, nest_limit: self.nest_limit };

        let mut root = ExprRoot::new(scanner.run()?);
        root.number_groups();

        if self.debug {
            let parsed = root.stringify(false);
            if parsed != pattern {
                return Err(ParseError::RoundTrip {
                    pattern: pattern.to_string(),
                    parsed,
                });
            }
        }

        let mut counter = NodeCounter(0);
        root.travel(&mut counter, false);
        debug!("parsed `{}` into {} nodes", pattern, counter.0);

        Ok(root)
    }
}

struct NodeCounter(usize);

impl Visitor for NodeCounter {
    fn visit_pre(&mut self, node: Option<&Node>) {
        if node.is_some() {
            self.0 += 1;
        }
    }
}

/// How a parenthesized expression was opened.
#[derive(Debug, Clone)]
enum Opener {
    Capture,
    NonCapture,
    Named(String),
    Lookahead { negative: bool },
    Lookbehind { negative: bool },
}

impl Opener {
    fn close(self, expr: Option<Node>) -> Node {
        match self {
            Opener::Capture => Node::Group(Group::new(expr, true, None)),
            Opener::NonCapture => Node::Group(Group::new(expr, false, None)),
            Opener::Named(name) => {
                Node::Group(Group::new(expr, true, Some(name)))
            }
            Opener::Lookahead { negative } => {
                Node::Lookahead(Look::new(expr, negative))
            }
            Opener::Lookbehind { negative } => {
                Node::Lookbehind(Look::new(expr, negative))
            }
        }
    }
}

/// A parenthesized expression that is still open.
struct Frame {
    opener: Opener,
    /// What was accumulated before the opening parenthesis.
    outer: Option<Node>,
    offset: usize,
}

struct Scanner<'a> {
    pattern: &'a str,
    rest: &'a str,
    nest_limit: u32,
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Result<Option<Node>, ParseError> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut acc: Option<Node> = None;

        while let Some(c) = self.peek() {
            let offset = self.offset();
            let atom = match c {
                '|' => {
                    self.bump(1);
                    acc = combine(acc, Some(Node::Or(Or::pending())))
                        .map_err(|err| err.at(offset))?;
                    continue;
                }
                '(' => {
                    let (rest, opener) = group_open(self.rest).map_err(|_| {
                        self.error("invalid group", self.fragment(4))
                    })?;
                    if frames.len() >= self.nest_limit as usize {
                        return Err(ParseError::NestLimitExceeded {
                            limit: self.nest_limit,
                            offset,
                        });
                    }
                    trace!("{:?} at offset {}", opener, offset);
                    self.rest = rest;
                    frames.push(Frame { opener, outer: acc.take(), offset });
                    continue;
                }
                ')' => {
                    let frame = frames.pop().ok_or_else(|| {
                        self.error("unmatched closing parenthesis", ")")
                    })?;
                    self.bump(1);
                    let inner = std::mem::replace(&mut acc, frame.outer);
                    frame.opener.close(inner)
                }
                c => self.atom(c)?,
            };
            let atom = self.quantify(atom)?;
            acc = combine(acc, Some(atom)).map_err(|err| err.at(offset))?;
        }

        if let Some(frame) = frames.last() {
            return Err(ParseError::syntax(
                "missing closing parenthesis",
                &self.pattern[frame.offset..],
            )
            .at(frame.offset));
        }

        Ok(acc)
    }

    #[inline]
    fn offset(&self) -> usize {
        self.pattern.len() - self.rest.len()
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    /// Consumes `len` bytes and returns them.
    fn bump(&mut self, len: usize) -> &'a str {
        let (consumed, rest) = self.rest.split_at(len);
        self.rest = rest;
        consumed
    }

    /// The next `n` characters, used for error messages.
    fn fragment(&self, n: usize) -> String {
        self.rest.chars().take(n).collect()
    }

    fn error<M: Into<String>, F: Into<String>>(
        &self,
        msg: M,
        fragment: F,
    ) -> ParseError {
        ParseError::syntax(msg, fragment).at(self.offset())
    }

    fn atom(&mut self, c: char) -> Result<Node, ParseError> {
        let node = match c {
            '.' => {
                self.bump(1);
                Node::Any
            }
            '^' => {
                self.bump(1);
                Node::Anchor(Anchor::Start)
            }
            '$' => {
                self.bump(1);
                Node::Anchor(Anchor::End)
            }
            '[' => self.class()?,
            '\\' => self.escape(false)?,
            '*' | '+' | '?' => {
                return Err(self.error("nothing to repeat", c.to_string()))
            }
            '{' if quantifier(self.rest).is_ok() => {
                return Err(self.error("nothing to repeat", self.fragment(8)))
            }
            c => Node::Literal(Literal::new(self.bump(c.len_utf8()))),
        };
        Ok(node)
    }

    /// Applies the quantifier that follows `atom`, if any.
    fn quantify(&mut self, atom: Node) -> Result<Node, ParseError> {
        let Ok((rest, text)) = quantifier(self.rest) else {
            return Ok(atom);
        };
        let offset = self.offset();
        let q = Quantifier::new(text).map_err(|err| err.at(offset))?;
        self.rest = rest;
        attach(atom, Some(Node::Quantifier(q))).map_err(|err| err.at(offset))
    }

    fn escape(&mut self, in_class: bool) -> Result<Node, ParseError> {
        let Some(e) = self.rest.chars().nth(1) else {
            return Err(self.error("trailing backslash", "\\"));
        };

        let node = match e {
            'b' if !in_class => {
                self.bump(2);
                Node::Anchor(Anchor::WordBoundary)
            }
            'B' if !in_class => {
                self.bump(2);
                Node::Anchor(Anchor::NonWordBoundary)
            }
            '0' => match octal_escape(self.rest) {
                Ok((rest, text)) => {
                    self.rest = rest;
                    Node::Escaped(Escaped::new(text))
                }
                Err(_) => Node::Escaped(Escaped::new(self.bump(2))),
            },
            'b' | 'B' | 'd' | 'D' | 'w' | 'W' | 's' | 'S' | 'n' | 'r' | 't'
            | 'f' | 'v' => Node::Escaped(Escaped::new(self.bump(2))),
            'x' => {
                let (rest, text) = hex_escape(self.rest).map_err(|_| {
                    self.error("invalid hex escape", self.fragment(4))
                })?;
                self.rest = rest;
                Node::Escaped(Escaped::new(text))
            }
            'u' => {
                let rest = match read_unicode_escape(self.rest) {
                    Ok((_, rest)) => rest,
                    Err(err) => {
                        return Err(self.error(err.to_string(), self.fragment(12)))
                    }
                };
                let len = self.rest.len() - rest.len();
                Node::Escaped(Escaped::new(self.bump(len)))
            }
            '1'..='9' if !in_class => {
                let (rest, id) = backref_number(self.rest).map_err(|_| {
                    self.error("invalid backreference", self.fragment(12))
                })?;
                self.rest = rest;
                Node::Backref(Backref::Number(id))
            }
            'k' if !in_class => {
                let (rest, name) = backref_name(self.rest).map_err(|_| {
                    self.error("invalid named backreference", self.fragment(4))
                })?;
                self.rest = rest;
                Node::Backref(Backref::Name(name.to_string()))
            }
            e => Node::Literal(Literal::new(self.bump(1 + e.len_utf8()))),
        };

        Ok(node)
    }

    fn class(&mut self) -> Result<Node, ParseError> {
        let start = self.offset();
        self.bump(1);

        let negative = self.rest.starts_with('^');
        if negative {
            self.bump(1);
        }

        let mut members: Option<Node> = None;

        loop {
            let Some(c) = self.peek() else {
                return Err(ParseError::syntax(
                    "missing closing bracket",
                    &self.pattern[start..],
                )
                .at(start));
            };

            if c == ']' {
                self.bump(1);
                break;
            }

            let member_offset = self.offset();
            let (first, first_text) = self.class_atom(c)?;

            // A `-` makes a range only when there's something other than
            // the closing bracket after it.
            let after_dash = self
                .rest
                .strip_prefix('-')
                .and_then(|rest| rest.chars().next())
                .filter(|c| *c != ']');

            let Some(c) = after_dash.filter(|_| is_range_endpoint(&first))
            else {
                members = combine(members, Some(first))
                    .map_err(|err| err.at(member_offset))?;
                continue;
            };

            self.bump(1);
            let (second, second_text) = self.class_atom(c)?;

            if is_range_endpoint(&second) {
                let range = Range::new(first_text, second_text)
                    .map_err(|err| err.at(member_offset))?;
                members = combine(members, Some(Node::Range(range)))
                    .map_err(|err| err.at(member_offset))?;
            } else {
                for node in [first, Node::Literal(Literal::new("-")), second] {
                    members = combine(members, Some(node))
                        .map_err(|err| err.at(member_offset))?;
                }
            }
        }

        match members {
            Some(members) => Ok(Node::Class(Class::new(members, negative))),
            None => Err(ParseError::syntax(
                "empty character class",
                &self.pattern[start..self.offset()],
            )
            .at(start)),
        }
    }

    /// Parses a single class member, returning it together with the text
    /// it was parsed from.
    fn class_atom(&mut self, c: char) -> Result<(Node, &'a str), ParseError> {
        let before = self.rest;
        let node = match c {
            '\\' => self.escape(true)?,
            c => Node::Literal(Literal::new(self.bump(c.len_utf8()))),
        };
        Ok((node, &before[..before.len() - self.rest.len()]))
    }
}

/// Only members that denote exactly one character can be range endpoints.
fn is_range_endpoint(node: &Node) -> bool {
    match node {
        Node::Literal(lit) => lit.units().count() == 1,
        Node::Escaped(e) => e.decoded().is_some(),
        _ => false,
    }
}

fn parse_u32(input: &str) -> NResult<u32> {
    map_res(recognize(digit1), str::parse)(input)
}

fn group_name(input: &str) -> NResult<&str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn group_open(input: &str) -> NResult<Opener> {
    alt((
        value(Opener::NonCapture, tag("(?:")),
        value(Opener::Lookahead { negative: false }, tag("(?=")),
        value(Opener::Lookahead { negative: true }, tag("(?!")),
        value(Opener::Lookbehind { negative: false }, tag("(?<=")),
        value(Opener::Lookbehind { negative: true }, tag("(?<!")),
        map(delimited(tag("(?<"), group_name, cchar('>')), |name: &str| {
            Opener::Named(name.to_string())
        }),
        value(Opener::Capture, terminated(cchar('('), not(cchar('?')))),
    ))(input)
}

/// Recognizes `?`, `*`, `+`, `{m}`, `{m,}`, `{m,n}` and `{,n}`, with an
/// optional lazy (`?`) or possessive (`+`) suffix. A brace that doesn't
/// form a valid quantifier is left alone, and is taken as a literal.
fn quantifier(input: &str) -> NResult<&str> {
    recognize(pair(
        alt((
            recognize(one_of("?*+")),
            verify(
                recognize(tuple((
                    cchar('{'),
                    digit0,
                    opt(pair(cchar(','), digit0)),
                    cchar('}'),
                ))),
                |s: &str| s.bytes().any(|b| b.is_ascii_digit()),
            ),
        )),
        opt(one_of("?+")),
    ))(input)
}

fn hex_escape(input: &str) -> NResult<&str> {
    recognize(pair(
        tag("\\x"),
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
    ))(input)
}

fn octal_escape(input: &str) -> NResult<&str> {
    recognize(pair(
        tag("\\0"),
        take_while_m_n(2, 2, |c: char| matches!(c, '0'..='7')),
    ))(input)
}

fn backref_number(input: &str) -> NResult<u32> {
    preceded(cchar('\\'), parse_u32)(input)
}

fn backref_name(input: &str) -> NResult<&str> {
    delimited(tag("\\k<"), group_name, cchar('>'))(input)
}
