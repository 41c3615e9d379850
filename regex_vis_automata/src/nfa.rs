use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use derive_getters::Getters;
use itertools::Itertools;
use log::{debug, warn};

use regex_vis_syntax::{EscapeKind, Escaped, ExprRoot, Node, Quantifier, Range};

use crate::tokens::{Token, Tokens, EPSILON};
use crate::Error;

/// Identifier of an automaton state.
pub type State = usize;

/// Initial state of every NFA.
pub const START: State = 0;

/// Accepting state of every NFA.
pub const ACCEPT: State = 1;

/// Default for [`NfaBuilder::max_states`].
pub const DEFAULT_MAX_STATES: usize = 100_000;

/// Default for [`NfaBuilder::range_expansion_limit`].
pub const DEFAULT_RANGE_EXPANSION_LIMIT: u32 = 256;

/// A state of an NFA. Each token leads to a set of states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct NfaState {
    edges: BTreeMap<Token, BTreeSet<State>>,
}

impl NfaState {
    /// States reached from this one through `token`.
    pub fn targets(&self, token: Token) -> impl Iterator<Item = State> + '_ {
        self.edges.get(&token).into_iter().flatten().copied()
    }
}

/// Nondeterministic finite automaton. State [`START`] is the initial
/// state and [`ACCEPT`] the only accepting one.
#[derive(Debug, Clone, Getters)]
pub struct Nfa {
    states: Vec<NfaState>,
    tokens: Rc<Tokens>,
}

impl Nfa {
    /// Builds the NFA for `root` with default limits.
    pub fn generate(root: &ExprRoot, utf8_encoding: bool) -> Result<Nfa, Error> {
        NfaBuilder::new().utf8_encoding(utf8_encoding).build(root)
    }

    /// Total number of transitions, epsilon ones included.
    pub fn edge_count(&self) -> usize {
        self.states
            .iter()
            .flat_map(|s| s.edges.values())
            .map(|targets| targets.len())
            .sum()
    }
}

impl Display for Nfa {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (id, state) in self.states.iter().enumerate() {
            let mark = match id {
                START => '>',
                ACCEPT => '*',
                _ => ' ',
            };
            write!(f, "{}{:>4}:", mark, id)?;
            for (token, targets) in &state.edges {
                write!(
                    f,
                    " {} -> [{}]",
                    self.tokens.name(*token).unwrap_or("?"),
                    targets.iter().join(", ")
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Whether the children of a sequence are concatenated, or are parallel
/// members of a character class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Default,
    InClass,
}

/// Builds an [`Nfa`] out of a syntax tree using Thompson's construction.
#[derive(Debug, Clone)]
pub struct NfaBuilder {
    utf8_encoding: bool,
    max_states: usize,
    range_expansion_limit: u32,
}

impl Default for NfaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NfaBuilder {
    pub fn new() -> Self {
        Self {
            utf8_encoding: false,
            max_states: DEFAULT_MAX_STATES,
            range_expansion_limit: DEFAULT_RANGE_EXPANSION_LIMIT,
        }
    }

    /// When true, `\xHH`, `\0oo` and `\uHHHH` escapes produce a token
    /// named after the character they denote. Otherwise unicode escapes
    /// produce a `(U+HHHH)` marker and the rest keep their text.
    pub fn utf8_encoding(mut self, yes: bool) -> Self {
        self.utf8_encoding = yes;
        self
    }

    /// Building fails with [`Error::TooLarge`] if the NFA would need more
    /// than this number of states.
    pub fn max_states(mut self, n: usize) -> Self {
        self.max_states = n;
        self
    }

    /// Ranges spanning more than this number of characters are not
    /// expanded, they become a single `start-end` token instead.
    pub fn range_expansion_limit(mut self, n: u32) -> Self {
        self.range_expansion_limit = n;
        self
    }

    pub fn build(&self, root: &ExprRoot) -> Result<Nfa, Error> {
        let mut compiler = Compiler::new(self);
        compiler.compile(root.expr().as_ref())?;

        let nfa = Nfa {
            states: compiler.states,
            tokens: Rc::new(compiler.tokens),
        };

        debug!(
            "NFA built: {} states, {} edges, {} tokens",
            nfa.states.len(),
            nfa.edge_count(),
            nfa.tokens.len()
        );

        Ok(nfa)
    }
}

struct Compiler<'b> {
    config: &'b NfaBuilder,
    states: Vec<NfaState>,
    tokens: Tokens,
}

impl<'b> Compiler<'b> {
    fn new(config: &'b NfaBuilder) -> Self {
        Self {
            config,
            states: vec![NfaState::default(), NfaState::default()],
            tokens: Tokens::new(),
        }
    }

    /// Connects [`START`] and [`ACCEPT`] through the automaton for `expr`.
    ///
    /// Each item in the stack is a node that must be compiled between two
    /// existing states. Compiling a node adds edges and pushes its
    /// children, so the depth of the tree doesn't affect the call stack.
    fn compile<'a>(&mut self, expr: Option<&'a Node>) -> Result<(), Error> {
        let mut stack: Vec<(Option<&'a Node>, State, State, Mode)> =
            vec![(expr, START, ACCEPT, Mode::Default)];

        while let Some((node, begin, end, mode)) = stack.pop() {
            let Some(node) = node else {
                self.add_edge(begin, EPSILON, end);
                continue;
            };

            match node {
                Node::Or(or) => {
                    for item in or.items().iter().rev() {
                        stack.push((item.as_ref(), begin, end, Mode::Default));
                    }
                }
                Node::Sequence(seq) if mode == Mode::InClass => {
                    for member in seq.nodes().iter().rev() {
                        stack.push((Some(member), begin, end, Mode::InClass));
                    }
                }
                Node::Sequence(seq) => {
                    let nodes = seq.nodes();
                    let mut items = Vec::with_capacity(nodes.len());
                    let mut from = begin;
                    for (i, child) in nodes.iter().enumerate() {
                        let to = if i + 1 == nodes.len() {
                            end
                        } else {
                            self.new_state()?
                        };
                        items.push((Some(child), from, to, Mode::Default));
                        from = to;
                    }
                    if items.is_empty() {
                        self.add_edge(begin, EPSILON, end);
                    }
                    stack.extend(items.into_iter().rev());
                }
                Node::Quantifier(q) => {
                    self.quantifier(q, begin, end, &mut stack)?;
                }
                Node::Class(cls) => {
                    if *cls.negative() {
                        return Err(Error::Unsupported(
                            "negative character class".to_string(),
                        ));
                    }
                    stack.push((
                        Some(cls.members().as_ref()),
                        begin,
                        end,
                        Mode::InClass,
                    ));
                }
                Node::Group(group) => {
                    stack.push((group.expr().as_deref(), begin, end, mode));
                }
                Node::Range(range) => self.range(range, begin, end),
                Node::Literal(lit) => {
                    let units = lit.units().collect_vec();
                    let mut from = begin;
                    for (i, unit) in units.iter().enumerate() {
                        let to = if mode == Mode::InClass || i + 1 == units.len()
                        {
                            end
                        } else {
                            self.new_state()?
                        };
                        self.add_symbol(from, unit, to);
                        if mode == Mode::Default {
                            from = to;
                        }
                    }
                }
                Node::Anchor(anchor) => {
                    self.add_symbol(begin, &format!("({})", anchor.as_str()), end)
                }
                Node::Any => self.add_symbol(begin, "(.)", end),
                Node::Escaped(e) => {
                    let name = self.escape_name(e);
                    self.add_symbol(begin, &name, end)
                }
                Node::Backref(_) | Node::Lookahead(_) | Node::Lookbehind(_) => {
                    return Err(Error::Unsupported(node.kind_name().to_string()))
                }
            }
        }

        Ok(())
    }

    /// Unrolls the quantifier into copies of its operand. The copies are
    /// pushed into `stack` for being compiled later.
    fn quantifier<'a>(
        &mut self,
        q: &'a Quantifier,
        begin: State,
        end: State,
        stack: &mut Vec<(Option<&'a Node>, State, State, Mode)>,
    ) -> Result<(), Error> {
        let operand = q.prev().as_deref();
        let min = *q.min();

        match *q.max() {
            Some(0) => {
                self.add_edge(begin, EPSILON, end);
            }
            Some(max) if max == min => {
                let mut from = begin;
                for i in 0..min {
                    let to = if i + 1 == min { end } else { self.new_state()? };
                    stack.push((operand, from, to, Mode::Default));
                    from = to;
                }
            }
            Some(max) => {
                let from = self.mandatory_copies(operand, begin, min, stack)?;
                self.add_edge(from, EPSILON, end);
                let optional = max - min;
                let mut from = from;
                for i in 0..optional {
                    let to = if i + 1 == optional {
                        end
                    } else {
                        self.new_state()?
                    };
                    stack.push((operand, from, to, Mode::Default));
                    if to != end {
                        self.add_edge(to, EPSILON, end);
                    }
                    from = to;
                }
            }
            None => {
                let from = self.mandatory_copies(operand, begin, min, stack)?;
                let repeat = self.new_state()?;
                self.add_edge(from, EPSILON, repeat);
                self.add_edge(repeat, EPSILON, end);
                stack.push((operand, repeat, repeat, Mode::Default));
            }
        }

        Ok(())
    }

    /// Pushes `n` chained copies of `operand` starting at `begin`, and
    /// returns the state where the last one ends.
    fn mandatory_copies<'a>(
        &mut self,
        operand: Option<&'a Node>,
        begin: State,
        n: u32,
        stack: &mut Vec<(Option<&'a Node>, State, State, Mode)>,
    ) -> Result<State, Error> {
        let mut from = begin;
        for _ in 0..n {
            let to = self.new_state()?;
            stack.push((operand, from, to, Mode::Default));
            from = to;
        }
        Ok(from)
    }

    fn range(&mut self, range: &Range, begin: State, end: State) {
        let limit = self.config.range_expansion_limit;
        match range.bounds() {
            Some((a, b))
                if (b as u32).checked_sub(a as u32).is_some_and(|n| n < limit) =>
            {
                for c in a..=b {
                    self.add_symbol(begin, c.encode_utf8(&mut [0; 4]), end);
                }
            }
            _ => {
                let name = format!("{}-{}", range.start(), range.end());
                warn!(
                    "range `{}` spans more than {} characters, it's kept as a single token",
                    name, limit
                );
                self.add_symbol(begin, &name, end);
            }
        }
    }

    fn escape_name(&self, e: &Escaped) -> String {
        let kind = e.kind();
        let decodable =
            matches!(kind, EscapeKind::Hex | EscapeKind::Octal | EscapeKind::Unicode);

        match e.decoded() {
            Some(c) if self.config.utf8_encoding && decodable => c.to_string(),
            Some(c) if kind == EscapeKind::Unicode => {
                format!("(U+{:04X})", c as u32)
            }
            _ => format!("({})", e.text()),
        }
    }

    fn new_state(&mut self) -> Result<State, Error> {
        if self.states.len() >= self.config.max_states {
            return Err(Error::TooLarge {
                what: "NFA",
                limit: self.config.max_states,
            });
        }
        self.states.push(NfaState::default());
        Ok(self.states.len() - 1)
    }

    fn add_symbol(&mut self, from: State, name: &str, to: State) {
        let token = self.tokens.intern(name);
        self.add_edge(from, token, to);
    }

    #[inline]
    fn add_edge(&mut self, from: State, token: Token, to: State) {
        self.states[from].edges.entry(token).or_default().insert(to);
    }
}
