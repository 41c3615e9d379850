use anyhow::Context;
use log::info;

use regex_vis_automata::{Dfa, Nfa};
use regex_vis_syntax::{parse, ExprRoot};
use regex_vis_util::utf8_to_uhhhh;

const PATTERNS: [&str; 6] = [
    "ab|cb",
    "a{2,3}",
    "(ab)+c?",
    "[a-c_]x*",
    "€(?<cur>\\d+)",
    "hell[a-z]+o+(?=!)",
];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    for pattern in PATTERNS {
        // Non-ASCII input is turned into `\uHHHH` escapes, which the
        // parser renders back as written.
        let pattern = utf8_to_uhhhh(pattern);
        let root = parse(&pattern, true)
            .with_context(|| format!("parsing `{}`", pattern))?;

        println!("==== {}", root.stringify(true));
        print!("{}", root.format(2, true));
        println!("{}", root.xml());
        show_automata(&root, &pattern);
        println!();
    }

    Ok(())
}

fn show_automata(root: &ExprRoot, pattern: &str) {
    let dfa = Nfa::generate(root, true).and_then(|nfa| {
        println!("-- NFA");
        print!("{}", nfa);
        Dfa::generate(&nfa)
    });

    match dfa {
        Ok(dfa) => {
            println!("-- DFA");
            print!("{}", dfa);
            info!(
                "`{}`: {} DFA states after minimization",
                pattern,
                dfa.valid_states().count()
            );
        }
        Err(err) => println!("-- no automaton: {}", err),
    }
}
