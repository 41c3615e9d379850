use itertools::Itertools;
use yansi::{Color, Paint};

use regex_vis_util::escape_xml;

use crate::ast::{Anchor, Backref, EscapeKind, ExprRoot, Look, Node};

const PALETTE: [Color; 6] = [
    Color::Green,
    Color::Blue,
    Color::Yellow,
    Color::Magenta,
    Color::Red,
    Color::Cyan,
];

/// Indentation used by the XML output.
const XML_INDENT: usize = 2;

impl ExprRoot {
    /// Renders the tree back into pattern syntax. With `color` every
    /// construct except literals is painted with a cycling palette.
    pub fn stringify(&self, color: bool) -> String {
        match self.expr() {
            Some(expr) => Renderer::new(color, 0).str(expr),
            None => String::new(),
        }
    }

    /// Dumps the tree one node per line, nested nodes indented by `indent`
    /// spaces. With `indent == 0` everything goes in a single line.
    pub fn format(&self, indent: usize, color: bool) -> String {
        let mut r = Renderer::new(color, indent);
        let body = match self.expr() {
            Some(expr) => r.fmt(expr),
            None => format!("{}<Empty>", r.prefix()),
        };
        if indent > 0 {
            body + "\n"
        } else {
            body
        }
    }

    pub fn xml(&self) -> String {
        let mut r = Renderer::new(false, XML_INDENT);
        let mut s = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        s.push_str(&format!(
            "\n<RegularExpression expr=\"{}\">",
            escape_xml(&self.stringify(false))
        ));
        r.depth += 1;
        if let Some(expr) = self.expr() {
            s.push_str(&r.xml(expr));
        }
        s.push_str("\n</RegularExpression>");
        s
    }
}

impl Node {
    pub fn stringify(&self, color: bool) -> String {
        Renderer::new(color, 0).str(self)
    }
}

/// State shared by the renderings of a single tree: the next palette
/// color and the current nesting depth.
struct Renderer {
    color: bool,
    next_color: usize,
    indent: usize,
    depth: usize,
}

impl Renderer {
    fn new(color: bool, indent: usize) -> Self {
        Self { color, next_color: 0, indent, depth: 0 }
    }

    fn pick(&mut self) -> Option<Color> {
        if !self.color {
            return None;
        }
        let c = PALETTE[self.next_color % PALETTE.len()];
        self.next_color += 1;
        Some(c)
    }

    fn prefix(&self) -> String {
        if self.indent > 0 {
            format!("\n{}", " ".repeat(self.depth * self.indent))
        } else {
            String::new()
        }
    }

    fn nested<F: FnOnce(&mut Self) -> String>(&mut self, f: F) -> String {
        self.depth += 1;
        let s = f(self);
        self.depth -= 1;
        s
    }

    fn str(&mut self, node: &Node) -> String {
        let c = match node {
            Node::Literal(_) | Node::Sequence(_) => None,
            _ => self.pick(),
        };
        match node {
            Node::Literal(lit) => lit.escaped().clone(),
            Node::Escaped(e) => paint(c, e.text()),
            Node::Anchor(anchor) => paint(c, anchor.as_str()),
            Node::Any => paint(c, "."),
            Node::Range(range) => {
                paint(c, &format!("{}-{}", range.start(), range.end()))
            }
            Node::Quantifier(q) => {
                let prev = q.prev().as_deref().map(|p| self.str(p));
                prev.unwrap_or_default() + &paint(c, q.text())
            }
            Node::Sequence(seq) => {
                seq.nodes().iter().map(|n| self.str(n)).collect()
            }
            Node::Class(cls) => {
                let open = if *cls.negative() { "[^" } else { "[" };
                paint(c, open) + &self.str(cls.members()) + &paint(c, "]")
            }
            Node::Group(group) => {
                let open = match (group.name(), *group.capture()) {
                    (Some(name), _) => format!("(?<{}>", name),
                    (None, true) => "(".to_string(),
                    (None, false) => "(?:".to_string(),
                };
                paint(c, &open) + &self.opt_str(group.expr()) + &paint(c, ")")
            }
            Node::Backref(backref) => paint(c, &backref_str(backref)),
            Node::Lookahead(look) => self.look_str(c, look, "(?=", "(?!"),
            Node::Lookbehind(look) => self.look_str(c, look, "(?<=", "(?<!"),
            Node::Or(or) => {
                let sep = paint(c, "|");
                or.items()
                    .iter()
                    .map(|item| item.as_ref().map(|n| self.str(n)).unwrap_or_default())
                    .join(&sep)
            }
        }
    }

    fn opt_str(&mut self, expr: &Option<Box<Node>>) -> String {
        expr.as_deref().map(|n| self.str(n)).unwrap_or_default()
    }

    fn look_str(
        &mut self,
        c: Option<Color>,
        look: &Look,
        positive: &str,
        negative: &str,
    ) -> String {
        let open = if *look.negative() { negative } else { positive };
        paint(c, open) + &self.opt_str(look.expr()) + &paint(c, ")")
    }

    fn fmt(&mut self, node: &Node) -> String {
        let c = match node {
            Node::Literal(_) | Node::Sequence(_) => None,
            _ => self.pick(),
        };
        let prefix = self.prefix();
        match node {
            Node::Literal(lit) => format!("{}<Literal {}>", prefix, lit.chars()),
            Node::Escaped(e) => {
                prefix + &paint(c, &format!("<Escaped {}>", e.text()))
            }
            Node::Anchor(anchor) => {
                prefix + &paint(c, &format!("<Anchor {}>", anchor.as_str()))
            }
            Node::Any => prefix + &paint(c, "<Any .>"),
            Node::Range(range) => {
                let s = format!("<Range {}-{}>", range.start(), range.end());
                prefix + &paint(c, &s)
            }
            Node::Quantifier(q) => {
                let prev = match q.prev().as_deref() {
                    Some(prev) => self.fmt(prev),
                    None => prefix,
                };
                let s = format!("<Quantifier {}>", q.canonical());
                prev + &paint(c, &s)
            }
            Node::Sequence(seq) => {
                seq.nodes().iter().map(|n| self.fmt(n)).collect()
            }
            Node::Class(cls) => {
                let open =
                    if *cls.negative() { "[Neg-Class" } else { "[Class" };
                let members = self.nested(|r| r.fmt(cls.members()));
                format!("{}{}{}{}{}", prefix, paint(c, open), members, prefix, paint(c, "]"))
            }
            Node::Group(group) => {
                let mut gid = match *group.capture() {
                    true => format!("#{}", group.id()),
                    false => String::new(),
                };
                if let Some(name) = group.name() {
                    gid.push_str(&format!("<{}>", name));
                }
                let expr = self.nested(|r| r.opt_fmt(group.expr()));
                format!(
                    "{}{}{}{}{}",
                    prefix,
                    paint(c, &format!("(Group{}", gid)),
                    expr,
                    prefix,
                    paint(c, &format!("{})", gid))
                )
            }
            Node::Backref(backref) => {
                let s = format!("<Ref {}>", backref_str(backref));
                prefix + &paint(c, &s)
            }
            Node::Lookahead(look) => {
                self.look_fmt(c, look, "<Lookahead", "<Neg-Lookahead")
            }
            Node::Lookbehind(look) => {
                self.look_fmt(c, look, "<Lookbehind", "<Neg-Lookbehind")
            }
            Node::Or(or) => {
                let mut s = prefix.clone() + &paint(c, "(");
                for (i, item) in or.items().iter().enumerate() {
                    if i > 0 {
                        s.push_str(&prefix);
                        s.push_str(&paint(c, ") OR ("));
                    }
                    s.push_str(&self.nested(|r| match item {
                        Some(n) => r.fmt(n),
                        None => format!("{}<Empty>", r.prefix()),
                    }));
                }
                s + &prefix + &paint(c, ")")
            }
        }
    }

    fn opt_fmt(&mut self, expr: &Option<Box<Node>>) -> String {
        match expr.as_deref() {
            Some(n) => self.fmt(n),
            None => format!("{}<Empty>", self.prefix()),
        }
    }

    fn look_fmt(
        &mut self,
        c: Option<Color>,
        look: &Look,
        positive: &str,
        negative: &str,
    ) -> String {
        let prefix = self.prefix();
        let open = if *look.negative() { negative } else { positive };
        let expr = self.nested(|r| r.opt_fmt(look.expr()));
        format!("{}{}{}{}{}", prefix, paint(c, open), expr, prefix, paint(c, ">"))
    }

    fn xml(&mut self, node: &Node) -> String {
        let prefix = self.prefix();
        match node {
            Node::Literal(lit) => {
                format!("{}<Literal>{}</Literal>", prefix, escape_xml(lit.chars()))
            }
            Node::Escaped(e) => {
                let text = e.text();
                let tag = match e.kind() {
                    EscapeKind::Hex => "Hex",
                    EscapeKind::Unicode => "Unicode",
                    EscapeKind::Octal => "Octal",
                    _ => "Escaped",
                };
                format!("{}<{}>{}</{}>", prefix, tag, escape_xml(text), tag)
            }
            Node::Anchor(anchor) => {
                let tag = match anchor {
                    Anchor::Start => "<StartOfLine/>",
                    Anchor::End => "<EndOfLine/>",
                    Anchor::WordBoundary => "<WordBoundary/>",
                    Anchor::NonWordBoundary => "<NonWordBoundary/>",
                };
                prefix + tag
            }
            Node::Any => prefix + "<Any/>",
            Node::Range(range) => format!(
                "{}<Range start=\"{}\" end=\"{}\"/>",
                prefix,
                escape_xml(range.start()),
                escape_xml(range.end())
            ),
            Node::Quantifier(q) => {
                let max = match q.max() {
                    Some(max) => max.to_string(),
                    None => "Infinity".to_string(),
                };
                let prev = self.nested(|r| match q.prev().as_deref() {
                    Some(prev) => r.xml(prev),
                    None => String::new(),
                });
                format!(
                    "{}<Quantifier min=\"{}\" max=\"{}\" mode=\"{}\">{}{}</Quantifier>",
                    prefix,
                    q.min(),
                    max,
                    q.mode().as_str(),
                    prev,
                    prefix
                )
            }
            Node::Sequence(seq) => {
                seq.nodes().iter().map(|n| self.xml(n)).collect()
            }
            Node::Class(cls) => {
                let attrs = if *cls.negative() { " negative=\"true\"" } else { "" };
                let members = self.nested(|r| r.xml(cls.members()));
                format!("{}<Class{}>{}{}</Class>", prefix, attrs, members, prefix)
            }
            Node::Group(group) => {
                let attrs = match (*group.capture(), group.name()) {
                    (true, Some(name)) => {
                        format!(" id=\"{}\" name=\"{}\"", group.id(), escape_xml(name))
                    }
                    (true, None) => format!(" id=\"{}\"", group.id()),
                    (false, _) => " capture=\"false\"".to_string(),
                };
                let expr = self.nested(|r| r.opt_xml(group.expr()));
                format!("{}<Group{}>{}{}</Group>", prefix, attrs, expr, prefix)
            }
            Node::Backref(Backref::Number(id)) => {
                format!("{}<Reference id=\"{}\"/>", prefix, id)
            }
            Node::Backref(Backref::Name(name)) => {
                format!("{}<Reference name=\"{}\"/>", prefix, escape_xml(name))
            }
            Node::Lookahead(look) => self.look_xml(look, "Lookahead"),
            Node::Lookbehind(look) => self.look_xml(look, "Lookbehind"),
            Node::Or(or) => {
                let items = self.nested(|r| {
                    or.items()
                        .iter()
                        .map(|item| match item {
                            Some(n) => r.xml(n),
                            None => format!("{}<Empty/>", r.prefix()),
                        })
                        .collect::<String>()
                });
                format!("{}<Alternation>{}{}</Alternation>", prefix, items, prefix)
            }
        }
    }

    fn opt_xml(&mut self, expr: &Option<Box<Node>>) -> String {
        expr.as_deref().map(|n| self.xml(n)).unwrap_or_default()
    }

    fn look_xml(&mut self, look: &Look, tag: &str) -> String {
        let prefix = self.prefix();
        let attrs = if *look.negative() { " negative=\"true\"" } else { "" };
        let expr = self.nested(|r| r.opt_xml(look.expr()));
        format!("{}<{}{}>{}{}</{}>", prefix, tag, attrs, expr, prefix, tag)
    }
}

fn paint(c: Option<Color>, s: &str) -> String {
    match c {
        Some(c) => s.fg(c).to_string(),
        None => s.to_string(),
    }
}

fn backref_str(backref: &Backref) -> String {
    match backref {
        Backref::Number(id) => format!("\\{}", id),
        Backref::Name(name) => format!("\\k<{}>", name),
    }
}
