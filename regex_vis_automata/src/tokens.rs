use rustc_hash::FxHashMap;

/// Identifier of an interned alphabet symbol.
pub type Token = usize;

/// The empty transition. Always the first token in a [`Tokens`] table.
pub const EPSILON: Token = 0;

const EPSILON_NAME: &str = "ε";

/// Table that interns the symbols an automaton transitions on: single
/// characters, escapes and synthetic markers like `(.)` or `(^)`.
///
/// Ids are handed out in increasing order and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    names: Vec<String>,
    ids: FxHashMap<String, Token>,
}

impl Default for Tokens {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokens {
    pub fn new() -> Self {
        let mut tokens =
            Self { names: Vec::new(), ids: FxHashMap::default() };
        tokens.intern(EPSILON_NAME);
        tokens
    }

    /// Returns the id of `name`, adding it to the table if needed.
    pub fn intern(&mut self, name: &str) -> Token {
        if let Some(token) = self.ids.get(name) {
            return *token;
        }
        let token = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), token);
        token
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<Token> {
        self.ids.get(name).copied()
    }

    #[inline]
    pub fn name(&self, token: Token) -> Option<&str> {
        self.names.get(token).map(|s| s.as_str())
    }

    /// Number of tokens, epsilon included.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// A table always contains epsilon, so it's never empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over every token except epsilon.
    pub fn symbols(&self) -> impl Iterator<Item = (Token, &str)> + '_ {
        self.names.iter().map(|s| s.as_str()).enumerate().skip(1)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Tokens, EPSILON};

    #[test]
    fn interning() {
        let mut tokens = Tokens::new();
        assert_eq!(tokens.get("ε"), Some(EPSILON));
        assert_eq!(tokens.intern("a"), 1);
        assert_eq!(tokens.intern("(.)"), 2);
        assert_eq!(tokens.intern("a"), 1);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens.name(2), Some("(.)"));
        assert_eq!(tokens.name(3), None);
        assert_eq!(
            tokens.symbols().collect::<Vec<_>>(),
            vec![(1, "a"), (2, "(.)")]
        );
    }
}
