use pretty_assertions::assert_eq;

use crate::{parse, Anchor, Backref, EscapeKind, Node, ParseError, Parser};

fn syntax_error(pattern: &str) -> (String, String, usize) {
    match parse(pattern, false) {
        Err(ParseError::Syntax { msg, fragment, offset }) => {
            (msg, fragment, offset)
        }
        other => panic!("expecting a syntax error for `{}`, got {:?}", pattern, other),
    }
}

#[test]
fn round_trip() {
    let patterns = [
        "",
        "abc",
        r"..??.+.*.{3,}a?b*c+d{2}|a??b*?c+?d{2}?e{1,4}",
        r"a*+b++c?+d{2,}+e{,3}f{,3}?",
        r"a[-0-9xxa-z-]b[^-A-Z_0-9]?|[\[\](){}\n\d]{4}",
        r"\\.\+\?\*\||\[\]\(\)\{\}|\b\B\s\S\w\W\d|[\b\B\s\S\w\W\d]",
        r"((((a)))(b){4,})|((c)(d))*(((((e)[0-9])+)))(?:no cap\d+)",
        r"sss(?=ahead+(abc[0-9]\d))xxx(?!ahead+(abc[0-9]\d))sss(?<=behind+(abc[0-9]\d))xxx(?<!behind+(abc[0-9]\d))",
        "|aa|||bb||",
        r"[\x00-\x7f\u00e0-\u00ff]+\u20ac\ud834\udd1e\x41\012",
        r"(?<year>\d{4})-(?<month>\d\d)\k<year>\2",
        r"^a{2,3}$|x{|}y",
        "()|(?:)",
    ];

    for pattern in patterns {
        let root = parse(pattern, true)
            .unwrap_or_else(|err| panic!("`{}`: {}", pattern, err));
        assert_eq!(root.stringify(false), pattern);
    }
}

#[test]
fn literal_runs_merge() {
    let root = parse("ab", false).unwrap();
    let Some(Node::Sequence(seq)) = root.expr() else { panic!() };
    assert_eq!(seq.nodes().len(), 1);
    let Node::Literal(lit) = &seq.nodes()[0] else { panic!() };
    assert_eq!(lit.chars(), "ab");
}

#[test]
fn alternation() {
    let root = parse("a|b", false).unwrap();
    let Some(Node::Or(or)) = root.expr() else { panic!() };
    assert_eq!(or.items().len(), 2);
    assert!(or
        .items()
        .iter()
        .all(|item| matches!(item, Some(Node::Literal(_)))));
}

#[test]
fn quantifiers() {
    let root = parse("a{2,5}", false).unwrap();
    let Some(Node::Quantifier(q)) = root.expr() else { panic!() };
    assert_eq!((*q.min(), *q.max()), (2, Some(5)));

    let root = parse("a*", false).unwrap();
    let Some(Node::Quantifier(q)) = root.expr() else { panic!() };
    assert_eq!((*q.min(), *q.max()), (0, None));

    // A brace that isn't a quantifier is a literal.
    let root = parse("x{a}", false).unwrap();
    assert_eq!(root.format(0, false), "<Literal x{a}>");
}

#[test]
fn escapes() {
    let root = parse(r"\b[\b]\012\0", false).unwrap();
    let Some(Node::Sequence(seq)) = root.expr() else { panic!() };
    assert_eq!(seq.nodes()[0], Node::Anchor(Anchor::WordBoundary));

    let Node::Class(cls) = &seq.nodes()[1] else { panic!() };
    let Node::Escaped(e) = cls.members().as_ref() else { panic!() };
    assert_eq!(e.decoded(), Some('\x08'));

    let Node::Escaped(e) = &seq.nodes()[2] else { panic!() };
    assert_eq!(e.kind(), EscapeKind::Octal);
    assert_eq!(e.decoded(), Some('\n'));

    let Node::Escaped(e) = &seq.nodes()[3] else { panic!() };
    assert_eq!(e.kind(), EscapeKind::Control);
    assert_eq!(e.decoded(), Some('\0'));
}

#[test]
fn backrefs() {
    let root = parse(r"(?<x>a)\k<x>\1", false).unwrap();
    let Some(Node::Sequence(seq)) = root.expr() else { panic!() };
    assert_eq!(seq.nodes()[1], Node::Backref(Backref::Name("x".to_string())));
    assert_eq!(seq.nodes()[2], Node::Backref(Backref::Number(1)));
}

#[test]
fn bad_quantifiers() {
    assert_eq!(
        syntax_error("a{5,2}"),
        (
            "numbers out of order in quantifier".to_string(),
            "{5,2}".to_string(),
            1
        )
    );
    assert_eq!(syntax_error("*a").0, "nothing to repeat");
    assert_eq!(syntax_error("a|{2}").0, "nothing to repeat");
    assert_eq!(syntax_error("(+)").2, 1);
}

#[test]
fn bad_ranges() {
    assert_eq!(
        syntax_error("x[z-a]"),
        ("range out of order".to_string(), "[z-a]".to_string(), 2)
    );
    assert!(parse("[a-z]", false).is_ok());
    assert!(parse(r"[\x7a-\x61]", false).is_err());
    assert_eq!(
        syntax_error(r"[\x61-z]"),
        ("range out of order".to_string(), r"[\x61-z]".to_string(), 1)
    );
    assert!(parse(r"[a-\x7a]", false).is_ok());
    // Class shorthands can't be range endpoints, the dash is a literal.
    assert!(parse(r"[\d-z]", false).is_ok());
}

#[test]
fn unbalanced() {
    assert_eq!(syntax_error("a(b").0, "missing closing parenthesis");
    assert_eq!(syntax_error("a(b").1, "(b");
    assert_eq!(syntax_error("ab)").2, 2);
    assert_eq!(syntax_error("[ab").0, "missing closing bracket");
    assert_eq!(syntax_error("[]").0, "empty character class");
    assert_eq!(syntax_error("(?x)").0, "invalid group");
}

#[test]
fn bad_escapes() {
    assert_eq!(syntax_error("ab\\").0, "trailing backslash");
    assert_eq!(syntax_error(r"\x4g").0, "invalid hex escape");
    assert_eq!(
        syntax_error(r"\uD834x").0,
        "missing low surrogate after high surrogate"
    );
    assert_eq!(
        syntax_error(r"\uDD1E").0,
        "low surrogate without high surrogate"
    );
    assert_eq!(syntax_error(r"\k<>").0, "invalid named backreference");
}

#[test]
fn nest_limit() {
    let parser = Parser::new().nest_limit(2);
    assert!(parser.parse("((a))").is_ok());
    assert_eq!(
        parser.parse("(((a)))").unwrap_err(),
        ParseError::NestLimitExceeded { limit: 2, offset: 2 }
    );
}

#[test]
fn format() {
    assert_eq!(parse("ab", false).unwrap().format(2, false), "\n<Literal ab>\n");
    assert_eq!(parse("", false).unwrap().format(2, false), "\n<Empty>\n");

    assert_eq!(
        parse("a|b", false).unwrap().format(2, false),
        "\n(\n  <Literal a>\n) OR (\n  <Literal b>\n)\n"
    );

    assert_eq!(
        parse("a|", false).unwrap().format(0, false),
        "(<Literal a>) OR (<Empty>)"
    );

    assert_eq!(
        parse("(a){2,3}?", false).unwrap().format(0, false),
        "(Group#1<Literal a>#1)<Quantifier {2,3}?>"
    );

    assert_eq!(
        parse(r"[^a-c\d]", false).unwrap().format(0, false),
        r"[Neg-Class<Range a-c><Escaped \d>]"
    );

    assert_eq!(
        parse(r"(?<y>a)\k<y>(?!b)", false).unwrap().format(0, false),
        r"(Group#1<y><Literal a>#1<y>)<Ref \k<y>><Neg-Lookahead<Literal b>>"
    );

    assert_eq!(
        parse("(?:x)+", false).unwrap().format(1, false),
        "\n(Group\n <Literal x>\n)<Quantifier {1,}>\n"
    );
}

#[test]
fn xml() {
    assert_eq!(
        parse("a*", false).unwrap().xml(),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<RegularExpression expr="a*">
  <Quantifier min="0" max="Infinity" mode="greedy">
    <Literal>a</Literal>
  </Quantifier>
</RegularExpression>"#
    );

    assert_eq!(
        parse(r"(?<n>\x41)|[^<]", false).unwrap().xml(),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<RegularExpression expr="(?&lt;n&gt;\x41)|[^&lt;]">
  <Alternation>
    <Group id="1" name="n">
      <Hex>\x41</Hex>
    </Group>
    <Class negative="true">
      <Literal>&lt;</Literal>
    </Class>
  </Alternation>
</RegularExpression>"#
    );
}

#[test]
fn colors() {
    let root = parse("(a)|b+", false).unwrap();
    let plain = root.stringify(false);
    let colored = root.stringify(true);
    assert_eq!(plain, "(a)|b+");
    assert_ne!(colored, plain);
    assert!(colored.contains('a'));
    assert_ne!(root.format(2, true), root.format(2, false));
}
