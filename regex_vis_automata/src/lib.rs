/*! Finite automata built from regular expression syntax trees.

An [`Nfa`] is built from an [`ExprRoot`](regex_vis_syntax::ExprRoot) with
Thompson's construction, and a [`Dfa`] is built from the NFA with the subset
construction followed by minimization.

```
use regex_vis_automata::{Dfa, Nfa};

let root = regex_vis_syntax::parse("a|b", false).unwrap();
let nfa = Nfa::generate(&root, false).unwrap();
let dfa = Dfa::generate(&nfa).unwrap();

assert_eq!(dfa.valid_states().count(), 2);
```
*/

use thiserror::Error;

pub use dfa::{Dfa, DfaBuilder};
pub use nfa::{Nfa, NfaBuilder, NfaState, State, ACCEPT, START};
pub use tokens::{Token, Tokens, EPSILON};

mod dfa;
mod nfa;
mod tokens;


/// Errors returned while building automata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The expression contains something that can't be represented by a
    /// finite automaton, like a backreference or a lookaround.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("the {what} exceeds the limit of {limit} states")]
    TooLarge { what: &'static str, limit: usize },
}
