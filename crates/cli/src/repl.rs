//! Line-oriented REPL over an open engine.
//!
//! Commands mirror the one-shot subcommands; `set` takes the rest of the
//! line as the formula so it may contain spaces.

use std::io::{self, BufRead, Write};

use celltab_engine::{Engine, Updates};

const HELP: &str = "\
commands:
  set <cell> <formula>   install a formula
  get <cell>             show value and formula
  del <cell>             delete a formula
  copy <dest> <src>      copy a formula, rebasing relative refs
  dump                   list non-empty cells in dependency order
  clear                  wipe the sheet
  help                   this text
  quit                   exit";

#[derive(Debug)]
enum Reply {
    Text(String),
    Quit,
}

pub fn run(engine: &mut Engine) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout();

    writeln!(out, "celltab: sheet `{}` (type `help`)", engine.name())?;
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match dispatch(engine, line) {
            Ok(Reply::Quit) => break,
            Ok(Reply::Text(text)) => {
                if !text.is_empty() {
                    writeln!(out, "{text}")?;
                }
            }
            Err(err) => writeln!(out, "{err}")?,
        }
    }
    Ok(())
}

fn dispatch(engine: &mut Engine, line: &str) -> anyhow::Result<Reply> {
    let (command, rest) = split_word(line);
    match command {
        "set" => {
            let (cell, formula) = split_word(rest);
            if cell.is_empty() || formula.is_empty() {
                anyhow::bail!("usage: set <cell> <formula>");
            }
            Ok(Reply::Text(render_updates(&engine.eval(cell, formula)?)))
        }
        "get" => {
            let (cell, extra) = split_word(rest);
            if cell.is_empty() || !extra.is_empty() {
                anyhow::bail!("usage: get <cell>");
            }
            let content = engine.query(cell)?;
            Ok(Reply::Text(format!(
                "{} = {}  [{}]",
                cell, content.value, content.formula
            )))
        }
        "del" => {
            let (cell, extra) = split_word(rest);
            if cell.is_empty() || !extra.is_empty() {
                anyhow::bail!("usage: del <cell>");
            }
            Ok(Reply::Text(render_updates(&engine.delete(cell)?)))
        }
        "copy" => {
            let (dest, rest) = split_word(rest);
            let (src, extra) = split_word(rest);
            if dest.is_empty() || src.is_empty() || !extra.is_empty() {
                anyhow::bail!("usage: copy <dest> <src>");
            }
            Ok(Reply::Text(render_updates(&engine.copy(dest, src)?)))
        }
        "dump" => {
            let rows = engine.dump()?;
            let lines: Vec<String> = rows
                .iter()
                .map(|(id, formula)| format!("{id}\t{formula}"))
                .collect();
            Ok(Reply::Text(lines.join("\n")))
        }
        "clear" => {
            engine.clear()?;
            Ok(Reply::Text(String::new()))
        }
        "help" => Ok(Reply::Text(HELP.to_string())),
        "quit" | "exit" => Ok(Reply::Quit),
        other => anyhow::bail!("unknown command `{other}` (type `help`)"),
    }
}

fn render_updates(updates: &Updates) -> String {
    let lines: Vec<String> = updates
        .iter()
        .map(|(id, value)| format!("{id} = {value}"))
        .collect();
    lines.join("\n")
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(at) => (&input[..at], input[at..].trim_start()),
        None => (input, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_word() {
        assert_eq!(split_word("set a1 1+2"), ("set", "a1 1+2"));
        assert_eq!(split_word("  dump  "), ("dump", ""));
        assert_eq!(split_word(""), ("", ""));
    }

    #[test]
    fn test_set_formula_keeps_spaces() {
        let mut engine = Engine::in_memory("repl").unwrap();
        let reply = dispatch(&mut engine, "set a1 (1 + 2) * 3").unwrap();
        match reply {
            Reply::Text(text) => assert_eq!(text, "a1 = 9"),
            Reply::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn test_engine_errors_render_with_code() {
        let mut engine = Engine::in_memory("repl").unwrap();
        let err = dispatch(&mut engine, "set a1 1+").unwrap_err();
        assert!(err.to_string().starts_with("SYNTAX"));
    }

    #[test]
    fn test_unknown_command() {
        let mut engine = Engine::in_memory("repl").unwrap();
        assert!(dispatch(&mut engine, "frobnicate").is_err());
    }
}
