use std::fmt;

use bytes::Bytes;

use crate::frame::Frame;

/// 命令参数，编码时统一作为块字符串发送
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Text(String),
    Blob(Bytes),
    Int(i64),
    Float(f64),
}

impl Arg {
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Arg::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            Arg::Blob(b) => b.clone(),
            Arg::Int(v) => Bytes::from(v.to_string()),
            Arg::Float(v) => Bytes::from(v.to_string()),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Blob(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(value: &[u8; N]) -> Self {
        Arg::Blob(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Blob(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Text(s) => write!(f, "{:?}", s),
            Arg::Blob(b) => write!(f, "{:?}", b),
            Arg::Int(v) => write!(f, "{}", v),
            Arg::Float(v) => write!(f, "{}", v),
        }
    }
}

/// 服务端的一个响应值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Float(f64),
    Status(String),
    Bulk(Bytes),
    Array(Vec<Value>),
    /// 数组中嵌套的错误，比如EXEC中某条命令执行失败，顶层的错误不会出现在这里
    Error(String),
}

impl Value {
    /// 类型名称，用于结构比较和诊断输出
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Status(_) => "status",
            Value::Bulk(_) => "bulk",
            Value::Array(_) => "array",
            Value::Error(_) => "error",
        }
    }

    fn from_nested(frame: Frame) -> Value {
        match frame {
            Frame::Simple(s) => Value::Status(s),
            Frame::Error(msg) => Value::Error(msg),
            Frame::Integer(v) => Value::Int(v),
            Frame::Double(v) => Value::Float(v),
            Frame::Bulk(data) => Value::Bulk(data),
            Frame::Null => Value::Nil,
            Frame::Array(parts) => Value::Array(parts.into_iter().map(Value::from_nested).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => "(nil)".fmt(f),
            Value::Int(v) => write!(f, "(integer) {}", v),
            Value::Float(v) => write!(f, "(float) {}", v),
            Value::Status(s) => write!(f, "{}", s),
            Value::Bulk(b) => write!(f, "{:?}", b),
            Value::Error(msg) => write!(f, "(error) {}", msg),
            Value::Array(items) => {
                "[".fmt(f)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        ", ".fmt(f)?;
                    }
                    item.fmt(f)?;
                }
                "]".fmt(f)
            }
        }
    }
}

/// 一条命令在一个server上执行失败的原因
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeError {
    /// server返回了错误响应
    Reply(String),
    /// 连接出错或者已经被关闭，比如QUIT之后
    Connection(String),
}

impl OutcomeError {
    /// 错误码，也就是错误信息的第一个单词，比如ERR、WRONGTYPE
    pub fn code(&self) -> Option<&str> {
        match self {
            OutcomeError::Reply(msg) => msg.split_whitespace().next(),
            OutcomeError::Connection(_) => None,
        }
    }
}

impl fmt::Display for OutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeError::Reply(msg) => write!(f, "(error) {}", msg),
            OutcomeError::Connection(msg) => write!(f, "(connection) {}", msg),
        }
    }
}

impl std::error::Error for OutcomeError {}

/// 一条命令在一个server上的执行结果
pub type Outcome = Result<Value, OutcomeError>;

/// 将响应帧转换为执行结果，只有顶层的错误帧会变成 `Err`
pub fn outcome_from_frame(frame: Frame) -> Outcome {
    match frame {
        Frame::Error(msg) => Err(OutcomeError::Reply(msg)),
        frame => Ok(Value::from_nested(frame)),
    }
}
