/*! Syntax tree of regular expressions.

This crate parses a pattern into an [`ExprRoot`] and renders the tree back
into pattern syntax, an indented tree dump or XML.

```
let root = regex_vis_syntax::parse("a(b|c)*", true).unwrap();
assert_eq!(root.stringify(false), "a(b|c)*");
```
*/

pub use ast::*;
pub use error::ParseError;
pub use parser::{Parser, DEFAULT_NEST_LIMIT};

mod ast;
mod error;
mod parser;
mod render;

#[cfg(test)]
mod tests;

/// Parses `pattern` with the default settings. With `debug` the resulting
/// tree is checked to render back into `pattern`.
pub fn parse(pattern: &str, debug: bool) -> Result<ExprRoot, ParseError> {
    Parser::new().debug(debug).parse(pattern)
}
