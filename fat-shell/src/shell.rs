//! 交互模式：逐行读取命令，直到`exit`或输入结束。

use std::io::{self, BufRead, Write};

use clap::Parser;
use tinyfat::FatFileSystem;

use crate::cli::{Command, Line};

const PROMPT: &str = "fat> ";

pub fn run(fs: &mut FatFileSystem, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
    write!(out, "{PROMPT}")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        match split_line(&line) {
            Ok(words) if words.is_empty() => {}
            Ok(words) if matches!(words[0].as_str(), "exit" | "quit") => break,
            Ok(words) => match Line::try_parse_from(words) {
                Ok(Line {
                    command: Command::Shell,
                }) => writeln!(out, "already in the shell")?,
                Ok(Line { command }) => {
                    if let Err(e) = crate::execute(fs, command, out) {
                        log::debug!("{line:?} failed: {e:?}");
                        writeln!(out, "error: {e}")?;
                    }
                }
                Err(e) => write!(out, "{e}")?,
            },
            Err(e) => writeln!(out, "error: {e}")?,
        }

        write!(out, "{PROMPT}")?;
        out.flush()?;
    }

    writeln!(out)
}

/// 按空白切分一行，双引号括起的部分算作一个词。
fn split_line(line: &str) -> Result<Vec<String>, &'static str> {
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                word.get_or_insert_with(String::new);
            }
            c if c.is_whitespace() && !quoted => words.extend(word.take()),
            c => word.get_or_insert_with(String::new).push(c),
        }
    }
    if quoted {
        return Err("unterminated quote");
    }
    words.extend(word);

    Ok(words)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use block_dev::RamDisk;
    use tinyfat::Geometry;

    use super::*;

    #[test]
    fn words() {
        assert_eq!(
            Ok(vec!["write".into(), "hello world".into(), "3".into(), "/f".into()]),
            split_line(r#"write "hello world" 3 /f"#)
        );
        assert_eq!(Ok(vec!["ls".into()]), split_line("  ls \t"));
        assert_eq!(Ok(vec![String::new()]), split_line(r#""""#));
        assert_eq!(Err("unterminated quote"), split_line(r#"write "oops"#));
    }

    #[test]
    fn session() {
        let geometry = Geometry::new(256, 32).unwrap();
        let disk = Arc::new(RamDisk::new(geometry.image_bytes()));
        let mut fs = FatFileSystem::format(disk, geometry).unwrap();

        let input = b"mkdir /docs\ncreate /docs/a\nwrite \"ab\" 3 /docs/a\nappend x 2 /docs/a\n\
                      read /docs/a\nunlink /docs\nbogus\nexit\nmkdir /never\n";
        let mut out = Vec::new();
        run(&mut fs, &input[..], &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("abababxx\n"), "{out}");
        assert!(out.contains("error: directory not empty"), "{out}");
        assert!(out.contains("bogus"), "{out}");
        assert_eq!(Err(vfs::Error::NotFound), fs.resolve_directory("/never"));
        assert_eq!(8, fs.stat("/docs/a").unwrap().size);
    }
}
