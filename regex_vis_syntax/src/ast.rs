/*!
Syntax tree of a regular expression.

The tree is assembled left to right by [`combine`] and [`attach`] while the
pattern is being scanned. Both functions take care of operator precedence:
alternation binds weaker than concatenation, and a quantifier binds to the
single atom that precedes it.
*/

use derive_getters::Getters;
use either::{Left, Right};
use itertools::Itertools;

use regex_vis_util::decode_escape;

use crate::error::ParseError;

/// A node in the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(Literal),
    Escaped(Escaped),
    Anchor(Anchor),
    Any,
    Range(Range),
    Quantifier(Quantifier),
    Sequence(Sequence),
    Class(Class),
    Group(Group),
    Backref(Backref),
    Lookahead(Look),
    Lookbehind(Look),
    Or(Or),
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Literal(_) => "Literal",
            Node::Escaped(_) => "Escaped",
            Node::Anchor(_) => "Anchor",
            Node::Any => "Any",
            Node::Range(_) => "Range",
            Node::Quantifier(_) => "Quantifier",
            Node::Sequence(_) => "Sequence",
            Node::Class(_) => "Class",
            Node::Group(_) => "Group",
            Node::Backref(_) => "Backref",
            Node::Lookahead(_) => "Lookahead",
            Node::Lookbehind(_) => "Lookbehind",
            Node::Or(_) => "Or",
        }
    }

    /// Returns the direct children of this node, in pattern order. Empty
    /// alternatives in an [`Or`] are returned as `None`.
    pub fn children(&self) -> impl Iterator<Item = Option<&Node>> + '_ {
        match self {
            Node::Sequence(seq) => Left(Left(seq.nodes.iter().map(Some))),
            Node::Or(or) => Left(Right(or.items.iter().map(Option::as_ref))),
            Node::Quantifier(q) => {
                Right(q.prev.as_deref().map(Some).into_iter())
            }
            Node::Class(cls) => Right(Some(Some(&*cls.members)).into_iter()),
            Node::Group(group) => {
                Right(group.expr.as_deref().map(Some).into_iter())
            }
            Node::Lookahead(look) | Node::Lookbehind(look) => {
                Right(look.expr.as_deref().map(Some).into_iter())
            }
            Node::Literal(_)
            | Node::Escaped(_)
            | Node::Anchor(_)
            | Node::Any
            | Node::Range(_)
            | Node::Backref(_) => Right(None.into_iter()),
        }
    }

    /// Walks the subtree rooted at this node calling `visit_pre` before the
    /// children of a node are visited, and `visit_post` after. When `reverse`
    /// is true children are visited from last to first.
    pub fn travel<V: Visitor + ?Sized>(&self, visitor: &mut V, reverse: bool) {
        visitor.visit_pre(Some(self));
        let mut children = self.children().collect_vec();
        if reverse {
            children.reverse();
        }
        for child in children {
            match child {
                Some(node) => node.travel(visitor, reverse),
                None => {
                    visitor.visit_pre(None);
                    visitor.visit_post(None);
                }
            }
        }
        visitor.visit_post(Some(self));
    }
}

/// Receives the nodes of a tree traversed by [`Node::travel`]. `None`
/// stands for an empty alternative.
pub trait Visitor {
    fn visit_pre(&mut self, _node: Option<&Node>) {}
    fn visit_post(&mut self, _node: Option<&Node>) {}
}

/// Owner of a whole syntax tree. The expression is `None` for the empty
/// pattern.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ExprRoot {
    expr: Option<Node>,
}

impl ExprRoot {
    pub fn new(expr: Option<Node>) -> Self {
        Self { expr }
    }

    pub fn travel<V: Visitor + ?Sized>(&self, visitor: &mut V, reverse: bool) {
        if let Some(expr) = &self.expr {
            expr.travel(visitor, reverse);
        }
    }

    /// Assigns ids to groups in pre-order: capturing groups get 1, 2, 3...
    /// and non-capturing ones get 0.
    pub fn number_groups(&mut self) {
        let mut next_id = 1;
        let mut stack: Vec<&mut Node> = self.expr.iter_mut().collect();

        while let Some(node) = stack.pop() {
            match node {
                Node::Group(group) => {
                    if group.capture {
                        group.id = next_id;
                        next_id += 1;
                    } else {
                        group.id = 0;
                    }
                    stack.extend(group.expr.as_deref_mut());
                }
                Node::Sequence(seq) => stack.extend(seq.nodes.iter_mut().rev()),
                Node::Or(or) => {
                    stack.extend(or.items.iter_mut().rev().flatten())
                }
                Node::Quantifier(q) => stack.extend(q.prev.as_deref_mut()),
                Node::Class(cls) => stack.push(cls.members.as_mut()),
                Node::Lookahead(look) | Node::Lookbehind(look) => {
                    stack.extend(look.expr.as_deref_mut())
                }
                _ => {}
            }
        }
    }
}

/// A run of plain characters, kept both as written in the pattern
/// (`escaped`) and with escapes removed (`chars`).
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Literal {
    escaped: String,
    chars: String,
}

impl Literal {
    pub fn new<S: Into<String>>(escaped: S) -> Self {
        let escaped = escaped.into();
        let chars = units(&escaped)
            .map(|unit| match unit.strip_prefix('\\') {
                Some(c) if !c.is_empty() => c,
                _ => unit,
            })
            .collect();
        Self { escaped, chars }
    }

    pub fn append(&mut self, rhs: Literal) {
        self.escaped.push_str(&rhs.escaped);
        self.chars.push_str(&rhs.chars);
    }

    /// Iterates over the characters of the literal as written in the
    /// pattern. A backslash and the character following it are one unit.
    pub fn units(&self) -> impl Iterator<Item = &str> + '_ {
        units(&self.escaped)
    }
}

fn units(s: &str) -> impl Iterator<Item = &str> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let mut chars = s[pos..].chars();
        let first = chars.next()?;
        let mut len = first.len_utf8();
        if first == '\\' {
            len += chars.next().map_or(0, char::len_utf8);
        }
        let unit = &s[pos..pos + len];
        pos += len;
        Some(unit)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeKind {
    /// `\xHH`
    Hex,
    /// `\uHHHH`, or a `\uHHHH\uHHHH` surrogate pair.
    Unicode,
    /// `\0oo`, two octal digits after the zero.
    Octal,
    /// `\d \D \w \W \s \S`
    Class,
    /// `\n \r \t \f \v \0`, and `\b` inside a character class.
    Control,
}

/// An escape sequence that isn't a plain escaped character.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Escaped {
    text: String,
}

impl Escaped {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }

    pub fn kind(&self) -> EscapeKind {
        match self.text.get(1..2) {
            Some("x") => EscapeKind::Hex,
            Some("u") => EscapeKind::Unicode,
            Some("0") if self.text.len() == 4 => EscapeKind::Octal,
            Some("d" | "D" | "w" | "W" | "s" | "S") => EscapeKind::Class,
            _ => EscapeKind::Control,
        }
    }

    /// The character denoted by the escape, if it denotes exactly one.
    pub fn decoded(&self) -> Option<char> {
        decode_char(&self.text)
    }
}

/// Decodes a single character as written in a pattern: a plain character,
/// a backslash-escaped one, a control escape, `\0oo`, `\xHH` or `\uHHHH`.
pub fn decode_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next()?, chars.next(), chars.next()) {
        (c, None, _) => Some(c),
        ('\\', Some(c), None) => match c {
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'f' => Some('\x0C'),
            'v' => Some('\x0B'),
            '0' => Some('\0'),
            'b' => Some('\x08'),
            'd' | 'D' | 'w' | 'W' | 's' | 'S' | 'B' => None,
            c => Some(c),
        },
        ('\\', Some('0'), Some(_)) => text
            .get(2..)
            .and_then(|digits| u32::from_str_radix(digits, 8).ok())
            .and_then(char::from_u32),
        _ => decode_escape(text).ok(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `^`
    Start,
    /// `$`
    End,
    /// `\b`
    WordBoundary,
    /// `\B`
    NonWordBoundary,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Start => "^",
            Anchor::End => "$",
            Anchor::WordBoundary => "\\b",
            Anchor::NonWordBoundary => "\\B",
        }
    }
}

/// A character range inside a class, like `a-z` or `\x00-\x7f`. Endpoints
/// are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Range {
    start: String,
    end: String,
}

impl Range {
    pub fn new<S: Into<String>>(start: S, end: S) -> Result<Self, ParseError> {
        let range = Self { start: start.into(), end: end.into() };
        if !range.is_valid() {
            return Err(ParseError::syntax(
                "range out of order",
                format!("[{}-{}]", range.start, range.end),
            ));
        }
        Ok(range)
    }

    /// Both endpoints decoded as characters, if possible.
    pub fn bounds(&self) -> Option<(char, char)> {
        Some((decode_char(&self.start)?, decode_char(&self.end)?))
    }

    fn is_valid(&self) -> bool {
        if self.start.len() > self.end.len() {
            return false;
        }
        if let Some((a, b)) = self.bounds() {
            return a <= b;
        }
        if self.start.len() != self.end.len() {
            return false;
        }
        // Endpoints that can't be decoded are compared as text, ignoring
        // case so that `\xaa-\xFa` stays valid.
        self.start
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(self.end.bytes().map(|b| b.to_ascii_lowercase()))
            .is_le()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierMode {
    Greedy,
    Lazy,
    Possessive,
}

impl QuantifierMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantifierMode::Greedy => "greedy",
            QuantifierMode::Lazy => "lazy",
            QuantifierMode::Possessive => "possessive",
        }
    }
}

/// A repetition of the `prev` expression between `min` and `max` times.
/// `max` is `None` for an unbounded repetition.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Quantifier {
    text: String,
    min: u32,
    max: Option<u32>,
    mode: QuantifierMode,
    prev: Option<Box<Node>>,
}

impl Quantifier {
    /// Creates a quantifier from its text (`?`, `*`, `+`, `{m}`, `{m,}`,
    /// `{m,n}` or `{,n}`, optionally followed by `?` or `+`). The quantifier
    /// doesn't have an operand until [`Quantifier::attach`] is called.
    pub fn new<S: Into<String>>(text: S) -> Result<Self, ParseError> {
        let text = text.into();

        let (core, mode) = match text.len() {
            len if len > 1 && text.ends_with('?') => {
                (&text[..len - 1], QuantifierMode::Lazy)
            }
            len if len > 1 && text.ends_with('+') => {
                (&text[..len - 1], QuantifierMode::Possessive)
            }
            _ => (text.as_str(), QuantifierMode::Greedy),
        };

        let (min, max) = match core {
            "?" => (0, Some(1)),
            "*" => (0, None),
            "+" => (1, None),
            _ => parse_bounds(core).ok_or_else(|| {
                ParseError::syntax("invalid quantifier", text.clone())
            })?,
        };

        if max.is_some_and(|max| max < min) {
            return Err(ParseError::syntax(
                "numbers out of order in quantifier",
                text,
            ));
        }

        Ok(Self { text, min, max, mode, prev: None })
    }

    pub fn attach(&mut self, node: Node) -> Result<(), ParseError> {
        if self.prev.is_some() {
            return Err(ParseError::syntax(
                "quantifier already has an operand",
                self.text.clone(),
            ));
        }
        self.prev = Some(Box::new(node));
        Ok(())
    }

    /// The bounds in canonical `{min,max}` form, with the mode suffix.
    pub fn canonical(&self) -> String {
        let suffix = match self.mode {
            QuantifierMode::Greedy => "",
            QuantifierMode::Lazy => "?",
            QuantifierMode::Possessive => "+",
        };
        match self.max {
            Some(max) => format!("{{{},{}}}{}", self.min, max, suffix),
            None => format!("{{{},}}{}", self.min, suffix),
        }
    }
}

fn parse_bounds(core: &str) -> Option<(u32, Option<u32>)> {
    let inner = core.strip_prefix('{')?.strip_suffix('}')?;
    match inner.split_once(',') {
        None => {
            let n = inner.parse().ok()?;
            Some((n, Some(n)))
        }
        Some((min, max)) => {
            let min = if min.is_empty() { 0 } else { min.parse().ok()? };
            let max = if max.is_empty() { None } else { Some(max.parse().ok()?) };
            Some((min, max))
        }
    }
}

/// Concatenation of nodes. Never contains another `Sequence`, nor two
/// consecutive literals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Getters)]
pub struct Sequence {
    nodes: Vec<Node>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node at the end, merging it into the last node when both
    /// are literals.
    pub fn push(&mut self, node: Node) {
        match node {
            Node::Literal(rhs) => match self.nodes.last_mut() {
                Some(Node::Literal(lhs)) => lhs.append(rhs),
                _ => self.nodes.push(Node::Literal(rhs)),
            },
            node => self.nodes.push(node),
        }
    }

    /// Like [`Sequence::push`], but a `Sequence` is flattened into this one.
    pub fn append(&mut self, node: Node) {
        match node {
            Node::Sequence(seq) => {
                for node in seq.nodes {
                    self.push(node);
                }
            }
            node => self.push(node),
        }
    }
}

/// A character class. `members` is a single member or a [`Sequence`] of
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Class {
    members: Box<Node>,
    negative: bool,
}

impl Class {
    pub fn new(members: Node, negative: bool) -> Self {
        Self { members: Box::new(members), negative }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Group {
    expr: Option<Box<Node>>,
    capture: bool,
    id: u32,
    name: Option<String>,
}

impl Group {
    pub fn new(expr: Option<Node>, capture: bool, name: Option<String>) -> Self {
        Self { expr: expr.map(Box::new), capture, id: 0, name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backref {
    /// `\N`
    Number(u32),
    /// `\k<name>`
    Name(String),
}

/// Body of a lookahead or lookbehind assertion.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Look {
    expr: Option<Box<Node>>,
    negative: bool,
}

impl Look {
    pub fn new(expr: Option<Node>, negative: bool) -> Self {
        Self { expr: expr.map(Box::new), negative }
    }
}

/// Alternation. An item is `None` when the alternative is empty, like the
/// second one in `a|`.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct Or {
    items: Vec<Option<Node>>,
}

impl Or {
    /// The alternation produced by a `|` before its operands are known.
    pub fn pending() -> Self {
        Self { items: vec![None, None] }
    }

    fn is_pending(&self) -> bool {
        self.items.len() >= 2 && self.items[0].is_none()
    }

    /// Sets the first alternative, which must be empty.
    pub fn append_left(&mut self, node: Node) -> Result<(), ParseError> {
        if !self.is_pending() {
            return Err(ParseError::syntax(
                "alternation already has a left operand",
                node.kind_name(),
            ));
        }
        self.items[0] = Some(node);
        Ok(())
    }

    /// Concatenates `node` to the last alternative. If `node` is a pending
    /// alternation its alternatives are added to this one instead.
    pub fn append(&mut self, node: Node) -> Result<(), ParseError> {
        if let Node::Or(or) = node {
            if !or.is_pending() {
                return Err(ParseError::syntax(
                    "alternation already has a left operand",
                    "Or",
                ));
            }
            self.items.extend(or.items.into_iter().skip(1));
            return Ok(());
        }

        let Some(last) = self.items.last_mut() else {
            return Err(ParseError::syntax("empty alternation", "Or"));
        };
        *last = match last.take() {
            None => Some(node),
            Some(Node::Sequence(mut seq)) => {
                seq.append(node);
                Some(Node::Sequence(seq))
            }
            Some(prev) => {
                let mut seq = Sequence::new();
                seq.append(prev);
                seq.append(node);
                Some(Node::Sequence(seq))
            }
        };
        Ok(())
    }
}

/// Concatenates two subtrees. When one of them is an alternation the other
/// one goes into the adjacent alternative, so `|` keeps the lowest
/// precedence. An alternation on the right must still be pending, as
/// produced by [`Or::pending`].
pub fn combine(a: Option<Node>, b: Option<Node>) -> Result<Option<Node>, ParseError> {
    let (a, b) = match (a, b) {
        (a, None) => return Ok(a),
        (None, b) => return Ok(b),
        (Some(a), Some(b)) => (a, b),
    };

    if let Node::Or(mut or) = a {
        or.append(b)?;
        return Ok(Some(Node::Or(or)));
    }

    if let Node::Or(mut or) = b {
        or.append_left(a)?;
        return Ok(Some(Node::Or(or)));
    }

    let seq = match a {
        Node::Sequence(mut seq) => {
            seq.append(b);
            seq
        }
        a => {
            let mut seq = Sequence::new();
            seq.append(a);
            seq.append(b);
            seq
        }
    };

    Ok(Some(Node::Sequence(seq)))
}

/// Makes `a` the operand of the quantifier `b`, and returns the quantifier.
/// If `b` is `None`, `a` is returned unchanged.
pub fn attach(a: Node, b: Option<Node>) -> Result<Node, ParseError> {
    match b {
        None => Ok(a),
        Some(Node::Quantifier(mut q)) => {
            q.attach(a)?;
            Ok(Node::Quantifier(q))
        }
        Some(other) => Err(ParseError::syntax(
            "expecting a quantifier",
            other.kind_name(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn lit(s: &str) -> Option<Node> {
        Some(Node::Literal(Literal::new(s)))
    }

    #[test]
    fn literals_merge() {
        let ab = combine(lit("a"), lit("\\.")).unwrap();
        let node = combine(ab, lit("b")).unwrap().unwrap();
        let Node::Sequence(seq) = node else { panic!() };
        assert_eq!(seq.nodes().len(), 1);
        let Node::Literal(l) = &seq.nodes()[0] else { panic!() };
        assert_eq!(l.escaped(), "a\\.b");
        assert_eq!(l.chars(), "a.b");
        assert_eq!(l.units().collect_vec(), vec!["a", "\\.", "b"]);
    }

    #[test]
    fn alternation_precedence() {
        // a b | c d  =>  Or[ab, cd]
        let mut acc = combine(lit("a"), lit("b")).unwrap();
        for node in [
            Node::Or(Or::pending()),
            Node::Literal(Literal::new("c")),
            Node::Any,
            Node::Or(Or::pending()),
        ] {
            acc = combine(acc, Some(node)).unwrap();
        }

        let Some(Node::Or(or)) = acc else { panic!() };
        assert_eq!(or.items().len(), 3);
        assert!(matches!(&or.items()[0], Some(Node::Sequence(_))));
        assert!(matches!(&or.items()[1], Some(Node::Sequence(s)) if s.nodes().len() == 2));
        assert!(or.items()[2].is_none());
    }

    #[test]
    fn complete_alternation_is_not_reused() {
        let mut or = Or::pending();
        or.append_left(Node::Any).unwrap();
        or.append(Node::Literal(Literal::new("b"))).unwrap();
        let complete = Node::Or(or);

        // Neither the left alternative nor the right one may be dropped.
        assert!(combine(lit("a"), Some(complete.clone())).is_err());
        let pending = Some(Node::Or(Or::pending()));
        assert!(combine(pending, Some(complete)).is_err());
    }

    #[test]
    fn nested_sequences_flatten() {
        let ab = combine(lit("a"), Some(Node::Any)).unwrap();
        let cd = combine(Some(Node::Any), lit("d")).unwrap();
        let Some(Node::Sequence(seq)) = combine(ab, cd).unwrap() else { panic!() };
        assert_eq!(seq.nodes().len(), 4);
        assert!(seq.nodes().iter().all(|n| !matches!(n, Node::Sequence(_))));
    }

    #[test]
    fn attach_quantifier() {
        let q = Node::Quantifier(Quantifier::new("{2,5}?").unwrap());
        let node = attach(Node::Any, Some(q)).unwrap();
        let Node::Quantifier(q) = &node else { panic!() };
        assert_eq!(*q.min(), 2);
        assert_eq!(*q.max(), Some(5));
        assert_eq!(*q.mode(), QuantifierMode::Lazy);
        assert_eq!(q.prev().as_deref(), Some(&Node::Any));

        assert!(attach(Node::Any, Some(Node::Any)).is_err());
        assert_eq!(attach(Node::Any, None).unwrap(), Node::Any);
    }

    #[test]
    fn quantifier_bounds() {
        assert!(Quantifier::new("{5,2}").is_err());
        let q = Quantifier::new("{,3}+").unwrap();
        assert_eq!((*q.min(), *q.max()), (0, Some(3)));
        assert_eq!(*q.mode(), QuantifierMode::Possessive);
        assert_eq!(q.canonical(), "{0,3}+");
        let q = Quantifier::new("{4}").unwrap();
        assert_eq!(q.canonical(), "{4,4}");
        let q = Quantifier::new("*").unwrap();
        assert_eq!(q.canonical(), "{0,}");
    }

    #[test]
    fn range_order() {
        assert!(Range::new("a", "z").is_ok());
        assert!(Range::new("z", "a").is_err());
        assert!(Range::new("\\xaa", "\\xFa").is_ok());
        assert!(Range::new("\\u1234", "\\uaBf0").is_ok());
        assert!(Range::new("\\uaBf0", "\\u1234").is_err());
        assert_eq!(Range::new("a", "\\x7a").unwrap().bounds(), Some(('a', 'z')));
        // A start written longer than the end is out of order, even when
        // the characters are not.
        assert!(Range::new("\\x61", "z").is_err());
    }

    #[test]
    fn group_numbering() {
        let inner = Node::Group(Group::new(Some(Node::Any), true, None));
        let non_capture = Node::Group(Group::new(Some(inner), false, None));
        let last = Node::Group(Group::new(None, true, Some("x".to_string())));
        let mut root = ExprRoot::new(combine(Some(non_capture), Some(last)).unwrap());
        root.number_groups();

        struct Ids(Vec<u32>);

        impl Visitor for Ids {
            fn visit_pre(&mut self, node: Option<&Node>) {
                if let Some(Node::Group(g)) = node {
                    self.0.push(*g.id());
                }
            }
        }

        let mut ids = Ids(vec![]);
        root.travel(&mut ids, false);
        assert_eq!(ids.0, vec![0, 1, 2]);

        let mut ids = Ids(vec![]);
        root.travel(&mut ids, true);
        assert_eq!(ids.0, vec![2, 0, 1]);
    }
}
