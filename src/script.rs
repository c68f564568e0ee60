//! 场景脚本的解析
//!
//! 每行一条命令：
//!   succ SET foo bar
//!   fail GET
//!   sorted KEYS "*o*"
//!   loose RANDOMKEY
//!   succ SET blob "\x00\xff"

use anyhow::{anyhow, bail, Result};
use bytes::Bytes;

use crate::{
    command::{self, Command},
    value::Arg,
};

/// 解析一个脚本文件，出错时带上行号
pub fn parse(source: &str) -> Result<Vec<Command>> {
    let mut commands = Vec::new();

    for (lineno, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cmd = parse_line(line).map_err(|e| anyhow!("line {}: {}", lineno + 1, e))?;
        commands.push(cmd);
    }

    Ok(commands)
}

fn parse_line(line: &str) -> Result<Command> {
    let mut tokens = tokenize(line)?.into_iter();

    let kind = tokens.next().ok_or_else(|| anyhow!("empty line"))?;
    let name = match tokens.next() {
        Some(name) => String::from_utf8(name).map_err(|_| anyhow!("command name is not utf-8"))?,
        None => bail!("missing command name"),
    };
    let args = tokens.map(to_arg).collect();

    match &kind[..] {
        b"succ" => Ok(command::succ(name, args)),
        b"fail" => Ok(command::fail(name, args)),
        b"sorted" => Ok(command::succ_sorted(name, args)),
        b"loose" => Ok(command::succ_loosely(name, args)),
        other => bail!(
            "unknown expectation `{}`, expected succ, fail, sorted or loose",
            String::from_utf8_lossy(other)
        ),
    }
}

fn to_arg(token: Vec<u8>) -> Arg {
    match String::from_utf8(token) {
        Ok(text) => Arg::Text(text),
        Err(err) => Arg::Blob(Bytes::from(err.into_bytes())),
    }
}

fn tokenize(line: &str) -> Result<Vec<Vec<u8>>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = Vec::new();
        if c == '"' {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => token.push(b'\n'),
                        Some('r') => token.push(b'\r'),
                        Some('t') => token.push(b'\t'),
                        Some('\\') => token.push(b'\\'),
                        Some('"') => token.push(b'"'),
                        Some('x') => {
                            let hex: String = chars.by_ref().take(2).collect();
                            let byte = u8::from_str_radix(&hex, 16)
                                .map_err(|_| anyhow!("invalid hex escape: \\x{}", hex))?;
                            token.push(byte);
                        }
                        Some(c) => bail!("unknown escape: \\{}", c),
                        None => bail!("unterminated string"),
                    },
                    Some(c) => {
                        let mut buf = [0; 4];
                        token.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    }
                    None => bail!("unterminated string"),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                let mut buf = [0; 4];
                token.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}
