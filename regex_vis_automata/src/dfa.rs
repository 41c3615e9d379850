use std::fmt::{Display, Formatter};
use std::iter;
use std::rc::Rc;

use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use itertools::Itertools;
use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::nfa::{Nfa, State, ACCEPT, START};
use crate::tokens::{Token, Tokens, EPSILON};
use crate::Error;

/// Default for [`DfaBuilder::max_states`].
pub const DEFAULT_MAX_STATES: usize = 10_000;

/// Deterministic finite automaton. The initial state is always 0.
///
/// Minimization doesn't renumber states, it marks the ones that were
/// dropped or merged as not valid. Only valid states appear in the
/// transitions of other valid states.
#[derive(Debug, Clone)]
pub struct Dfa {
    /// For each state, the destination of every token, indexed by token.
    table: Vec<Vec<Option<State>>>,
    /// For each state, the set of NFA states it was built from.
    subsets: Vec<BitVec>,
    terminals: BitVec,
    valids: BitVec,
    tokens: Rc<Tokens>,
}

impl Dfa {
    /// Builds the minimized DFA for `nfa` with default limits.
    pub fn generate(nfa: &Nfa) -> Result<Dfa, Error> {
        DfaBuilder::new().build(nfa)
    }

    /// Number of states, including the ones that are no longer valid.
    #[inline]
    pub fn states(&self) -> usize {
        self.table.len()
    }

    /// Iterates over the states that survived minimization.
    pub fn valid_states(&self) -> impl Iterator<Item = State> + '_ {
        self.valids.iter_ones()
    }

    #[inline]
    pub fn is_valid(&self, state: State) -> bool {
        state < self.valids.len() && self.valids[state]
    }

    #[inline]
    pub fn is_accepted(&self, state: State) -> bool {
        self.is_valid(state) && self.terminals[state]
    }

    /// Destination of `state` through `token`, if any.
    pub fn next(&self, state: State, token: Token) -> Option<State> {
        if !self.is_valid(state) {
            return None;
        }
        self.table[state].get(token).copied().flatten()
    }

    #[inline]
    pub fn token_name(&self, token: Token) -> Option<&str> {
        self.tokens.name(token)
    }

    #[inline]
    pub fn tokens(&self) -> &Rc<Tokens> {
        &self.tokens
    }

    /// The NFA states `state` was built from.
    pub fn subset(&self, state: State) -> Option<&BitSlice> {
        self.subsets.get(state).map(|s| s.as_bitslice())
    }

    /// Drops the states that aren't reachable from the initial state or
    /// can't reach a terminal one, and then merges the equivalent ones.
    pub fn minimize(&mut self) {
        self.prune();
        self.merge_equivalent();
        debug!(
            "DFA minimized: {} of {} states remain",
            self.valids.count_ones(),
            self.table.len()
        );
    }

    fn prune(&mut self) {
        let n = self.table.len();

        let mut reachable: BitVec = BitVec::repeat(false, n);
        let mut stack = Vec::new();
        if self.is_valid(START) {
            reachable.set(START, true);
            stack.push(START);
        }
        while let Some(s) = stack.pop() {
            for &t in self.table[s].iter().flatten() {
                if self.valids[t] && !reachable[t] {
                    reachable.set(t, true);
                    stack.push(t);
                }
            }
        }

        let mut reverse: Vec<Vec<State>> = vec![Vec::new(); n];
        for s in reachable.iter_ones() {
            for &t in self.table[s].iter().flatten() {
                reverse[t].push(s);
            }
        }

        let mut productive: BitVec = BitVec::repeat(false, n);
        let mut stack = reachable
            .iter_ones()
            .filter(|s| self.terminals[*s])
            .collect_vec();
        for &s in &stack {
            productive.set(s, true);
        }
        while let Some(s) = stack.pop() {
            for &p in &reverse[s] {
                if reachable[p] && !productive[p] {
                    productive.set(p, true);
                    stack.push(p);
                }
            }
        }

        for (s, row) in self.table.iter_mut().enumerate() {
            if !productive[s] {
                row.fill(None);
                continue;
            }
            for edge in row.iter_mut() {
                if edge.is_some_and(|t| !productive[t]) {
                    *edge = None;
                }
            }
        }

        self.valids = productive;
    }

    /// Moore's partition refinement. States start split into terminal and
    /// non-terminal blocks, and a block is split while its states go to
    /// different blocks through the same token.
    fn merge_equivalent(&mut self) {
        let states = self.valids.iter_ones().collect_vec();
        if states.is_empty() {
            return;
        }

        let mut block = vec![usize::MAX; self.table.len()];
        for &s in &states {
            block[s] = usize::from(self.terminals[s]);
        }
        let mut blocks = states.iter().map(|s| block[*s]).unique().count();

        loop {
            let mut signatures: FxHashMap<(usize, Vec<Option<usize>>), usize> =
                FxHashMap::default();
            let mut refined = vec![usize::MAX; self.table.len()];

            for &s in &states {
                let signature = self.table[s]
                    .iter()
                    .map(|edge| edge.map(|t| block[t]))
                    .collect_vec();
                let next_id = signatures.len();
                refined[s] =
                    *signatures.entry((block[s], signature)).or_insert(next_id);
            }

            block = refined;
            let stable = signatures.len() == blocks;
            blocks = signatures.len();
            trace!("partition refined into {} blocks", blocks);
            if stable {
                break;
            }
        }

        // `states` is sorted, so the first state seen in a block is the
        // one with the lowest id.
        let mut representatives: FxHashMap<usize, State> = FxHashMap::default();
        for &s in &states {
            representatives.entry(block[s]).or_insert(s);
        }

        for &s in &states {
            if representatives[&block[s]] != s {
                self.valids.set(s, false);
                self.table[s].fill(None);
                continue;
            }
            for edge in self.table[s].iter_mut() {
                if let Some(t) = edge {
                    *t = representatives[&block[*t]];
                }
            }
        }
    }
}

impl Display for Dfa {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbols = self.tokens.symbols().collect_vec();
        let width = symbols
            .iter()
            .map(|(_, name)| name.chars().count())
            .chain(iter::once(self.table.len().to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:6}", "")?;
        for (_, name) in &symbols {
            write!(f, " {:>w$}", name, w = width)?;
        }
        writeln!(f)?;

        for s in self.valid_states() {
            let start = if s == START { '>' } else { ' ' };
            let accept = if self.terminals[s] { '*' } else { ' ' };
            write!(f, "{}{}{:>4}", start, accept, s)?;
            for (token, _) in &symbols {
                match self.next(s, *token) {
                    Some(t) => write!(f, " {:>w$}", t, w = width)?,
                    None => write!(f, " {:>w$}", "-", w = width)?,
                }
            }
            writeln!(f)?;
        }

        writeln!(
            f,
            "terminals: [{}]",
            self.valid_states().filter(|s| self.terminals[*s]).join(", ")
        )
    }
}

/// Builds a [`Dfa`] out of an [`Nfa`] with the subset construction.
#[derive(Debug, Clone)]
pub struct DfaBuilder {
    max_states: usize,
    minimize: bool,
}

impl Default for DfaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DfaBuilder {
    pub fn new() -> Self {
        Self { max_states: DEFAULT_MAX_STATES, minimize: true }
    }

    /// Building fails with [`Error::TooLarge`] if the subset construction
    /// produces more than this number of states.
    pub fn max_states(mut self, n: usize) -> Self {
        self.max_states = n;
        self
    }

    /// Whether [`Dfa::minimize`] is called on the result.
    pub fn minimize(mut self, yes: bool) -> Self {
        self.minimize = yes;
        self
    }

    pub fn build(&self, nfa: &Nfa) -> Result<Dfa, Error> {
        let closures = epsilon_closures(nfa);
        let num_tokens = nfa.tokens().len();

        let mut subsets = vec![closures[START].clone()];
        let mut table: Vec<Vec<Option<State>>> = Vec::new();

        // Subsets are processed in creation order, new ones are appended
        // at the end while the loop runs.
        while table.len() < subsets.len() {
            let current = table.len();
            let mut row = vec![None; num_tokens];

            for token in (0..num_tokens).filter(|t| *t != EPSILON) {
                let mut target: BitVec = BitVec::repeat(false, closures.len());
                for s in subsets[current].iter_ones() {
                    for t in nfa.states()[s].targets(token) {
                        target |= closures[t].as_bitslice();
                    }
                }

                if target.not_any() {
                    continue;
                }

                let id = match subsets.iter().position(|s| *s == target) {
                    Some(id) => id,
                    None => {
                        if subsets.len() >= self.max_states {
                            return Err(Error::TooLarge {
                                what: "DFA",
                                limit: self.max_states,
                            });
                        }
                        subsets.push(target);
                        subsets.len() - 1
                    }
                };

                row[token] = Some(id);
            }

            trace!(
                "DFA state {} = NFA states {{{}}}",
                current,
                subsets[current].iter_ones().join(", ")
            );

            table.push(row);
        }

        let terminals: BitVec = subsets.iter().map(|s| s[ACCEPT]).collect();
        let valids = BitVec::repeat(true, table.len());

        debug!(
            "DFA built: {} states out of {} NFA states",
            table.len(),
            closures.len()
        );

        let mut dfa = Dfa {
            table,
            subsets,
            terminals,
            valids,
            tokens: nfa.tokens().clone(),
        };

        if self.minimize {
            dfa.minimize();
        }

        Ok(dfa)
    }
}

/// Computes the epsilon closure of every NFA state. Closures are computed
/// in increasing state order, and the ones already known are reused.
fn epsilon_closures(nfa: &Nfa) -> Vec<BitVec> {
    let n = nfa.states().len();
    let mut closures: Vec<BitVec> = Vec::with_capacity(n);
    let mut stack = Vec::new();

    for state in 0..n {
        let mut closure: BitVec = BitVec::repeat(false, n);
        closure.set(state, true);
        stack.push(state);

        while let Some(s) = stack.pop() {
            for t in nfa.states()[s].targets(EPSILON) {
                if closure[t] {
                    continue;
                }
                match closures.get(t) {
                    Some(known) => closure |= known.as_bitslice(),
                    None => {
                        closure.set(t, true);
                        stack.push(t);
                    }
                }
            }
        }

        closures.push(closure);
    }

    closures
}
