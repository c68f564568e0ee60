use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use std::string::FromUtf8Error;

/// RESP协议中的一个完整的帧，请求和响应都用它来表示
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    // 单行字符串：+OK\r\n
    Simple(String),
    // 错误：-ERR unknown command\r\n
    Error(String),
    // 整数：:-2\r\n，TTL之类的命令会返回负数，所以这里用i64
    Integer(i64),
    // RESP3的浮点数：,3.14\r\n
    Double(f64),
    // 块字符串：$6\r\nfoobar\r\n
    Bulk(Bytes),
    // $-1\r\n 或者 *-1\r\n
    Null,
    // *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<Frame>),
}

#[derive(Debug)]
pub enum Error {
    // buffer中的数据还不足以解析出一个完整的帧
    Incomplete,
    Other(crate::Error),
}

impl Frame {
    // 检查src能否被完整的解码
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), Error> {
        check_nested(src, 0)
    }

    // 调用之前需要先用check确认buffer中已经有一个完整的帧
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
        parse_nested(src, 0)
    }

    // 将帧按照RESP协议写入dst
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(s) => {
                dst.put_u8(b'-');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(v) => {
                dst.put_u8(b':');
                dst.put_slice(v.to_string().as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Double(v) => {
                dst.put_u8(b',');
                dst.put_slice(v.to_string().as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                dst.put_u8(b'$');
                dst.put_slice(data.len().to_string().as_bytes());
                dst.put_slice(b"\r\n");
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Array(parts) => {
                dst.put_u8(b'*');
                dst.put_slice(parts.len().to_string().as_bytes());
                dst.put_slice(b"\r\n");
                for part in parts {
                    part.encode(dst);
                }
            }
        }
    }
}

// 数组最多嵌套的层数，超过之后当作协议错误
const MAX_DEPTH: usize = 128;

fn check_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<(), Error> {
    match get_u8(src)? {
        b'+' | b'-' | b',' => {
            get_line(src)?;
            Ok(())
        }
        b':' => {
            get_integer(src)?;
            Ok(())
        }
        // $5\r\nhello\r\n
        b'$' => {
            if b'-' == peek_u8(src)? {
                // skip -1\r\n
                skip(src, 4)
            } else {
                let len = get_bulk_len(src)?;
                skip(src, len)
            }
        }
        // *3\r\n$3\r\nfoo\r\n$3\r\nbar\r\n$3\r\nbaz\r\n
        b'*' => {
            if b'-' == peek_u8(src)? {
                return skip(src, 4);
            }
            if depth >= MAX_DEPTH {
                return Err("protocol error; array nested too deeply".into());
            }
            let len = get_decimal(src)?;
            for _ in 0..len {
                check_nested(src, depth + 1)?;
            }
            Ok(())
        }
        actual => Err(format!("protocol error; invalid frame type byte `{}`", actual).into()),
    }
}

fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, Error> {
    match get_u8(src)? {
        b'+' => {
            let line = get_line(src)?.to_vec();
            let string = String::from_utf8(line)?;
            Ok(Frame::Simple(string))
        }
        b'-' => {
            let line = get_line(src)?.to_vec();
            let string = String::from_utf8(line)?;
            Ok(Frame::Error(string))
        }
        b':' => {
            let value = get_integer(src)?;
            Ok(Frame::Integer(value))
        }
        b',' => {
            let line = get_line(src)?;
            std::str::from_utf8(line)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .map(Frame::Double)
                .ok_or_else(|| "protocol error; invalid double".into())
        }
        b'$' => {
            if b'-' == peek_u8(src)? {
                let line = get_line(src)?;
                if line != b"-1" {
                    return Err("protocol error; invalid frame format".into());
                }

                Ok(Frame::Null)
            } else {
                // $6\r\nfoobar\r\n
                let n = get_bulk_len(src)?;
                if src.remaining() < n {
                    return Err(Error::Incomplete);
                }
                let data = Bytes::copy_from_slice(&src.chunk()[..n - 2]);
                skip(src, n)?;
                Ok(Frame::Bulk(data))
            }
        }
        b'*' => {
            if b'-' == peek_u8(src)? {
                let line = get_line(src)?;
                if line != b"-1" {
                    return Err("protocol error; invalid frame format".into());
                }

                return Ok(Frame::Null);
            }
            if depth >= MAX_DEPTH {
                return Err("protocol error; array nested too deeply".into());
            }
            let len = get_decimal(src)?;
            // 长度来自对端，不能直接用来预分配
            let mut res = Vec::with_capacity(len.min(src.remaining() as u64) as usize);

            for _ in 0..len {
                res.push(parse_nested(src, depth + 1)?);
            }

            Ok(Frame::Array(res))
        }
        actual => Err(format!("protocol error; invalid frame type byte `{}`", actual).into()),
    }
}

// 块字符串的长度，包括结尾的\r\n
fn get_bulk_len(src: &mut Cursor<&[u8]>) -> Result<usize, Error> {
    let len = get_decimal(src)?;
    usize::try_from(len)
        .ok()
        .and_then(|len| len.checked_add(2))
        .ok_or_else(|| "protocol error; invalid frame format".into())
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<u64, Error> {
    // 1234556\r\n => 1234556
    use atoi::atoi;

    let line = get_line(src)?;

    atoi::<u64>(line).ok_or_else(|| "protocol error; invalid frame format".into())
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    use atoi::atoi;

    let line = get_line(src)?;

    atoi::<i64>(line).ok_or_else(|| "protocol error; invalid integer".into())
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len().saturating_sub(1);

    for i in start..end {
        if src.get_ref()[i] == b'\r' && src.get_ref()[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            let line: &[u8] = &src.get_ref()[start..i];
            return Ok(line);
        }
    }

    Err(Error::Incomplete)
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), Error> {
    if src.remaining() < n {
        return Err(Error::Incomplete);
    }
    src.advance(n);
    Ok(())
}

fn peek_u8(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

impl From<String> for Error {
    fn from(value: String) -> Error {
        Error::Other(value.into())
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Error {
        value.to_string().into()
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        "protocol error; invalid frame format".into()
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Incomplete => "stream ended early".fmt(f),
            Error::Other(err) => err.fmt(f),
        }
    }
}
