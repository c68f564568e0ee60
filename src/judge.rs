//! 比较同一条命令在两个server上的执行结果

use std::{cmp::Ordering, fmt, str::FromStr};

use crate::{
    command::{Command, Policy},
    sink::FailureSink,
    value::{Outcome, OutcomeError, Value},
};

/// 两边都返回错误时，错误之间如何比较
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorRule {
    /// 只要求错误的类别相同（错误响应 / 连接错误），不同实现的错误信息通常不一样
    #[default]
    Kind,
    /// 类别相同，并且错误码（ERR、WRONGTYPE等）相同
    Prefix,
    /// 错误信息完全相同
    Message,
}

impl ErrorRule {
    pub fn matches(&self, a: &OutcomeError, b: &OutcomeError) -> bool {
        match (a, b) {
            (OutcomeError::Reply(a), OutcomeError::Reply(b)) => self.matches_reply(a, b),
            (OutcomeError::Connection(a), OutcomeError::Connection(b)) => match self {
                ErrorRule::Message => a == b,
                ErrorRule::Kind | ErrorRule::Prefix => true,
            },
            _ => false,
        }
    }

    fn matches_reply(&self, a: &str, b: &str) -> bool {
        match self {
            ErrorRule::Kind => true,
            ErrorRule::Prefix => a.split_whitespace().next() == b.split_whitespace().next(),
            ErrorRule::Message => a == b,
        }
    }
}

impl FromStr for ErrorRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kind" => Ok(ErrorRule::Kind),
            "prefix" => Ok(ErrorRule::Prefix),
            "message" => Ok(ErrorRule::Message),
            other => Err(format!(
                "unknown error rule `{}`, expected kind, prefix or message",
                other
            )),
        }
    }
}

impl fmt::Display for ErrorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorRule::Kind => "kind".fmt(f),
            ErrorRule::Prefix => "prefix".fmt(f),
            ErrorRule::Message => "message".fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Candidate,
    Reference,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Candidate => "candidate".fmt(f),
            Side::Reference => "reference".fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceKind {
    /// 期望返回错误，但是这一边执行成功了
    MissingError(Side),
    /// 期望执行成功，但是这一边返回了错误
    UnexpectedError(Side),
    /// 两边都返回了错误，但是错误不一致
    ErrorMismatch,
    /// 两边的响应值不一致
    ValueMismatch,
    /// 按集合比较时，这一边的响应不是块字符串数组
    NotBlobSequence(Side),
}

/// 一次不一致的记录，带上命令以及两边的原始结果方便排查
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    pub command: Command,
    pub kind: DivergenceKind,
    pub candidate: Outcome,
    pub reference: Outcome,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DivergenceKind::MissingError(side) => write!(f, "got no error from {}", side)?,
            DivergenceKind::UnexpectedError(side) => write!(f, "got an error from {}", side)?,
            DivergenceKind::ErrorMismatch => "errors differ".fmt(f)?,
            DivergenceKind::ValueMismatch => "values differ".fmt(f)?,
            DivergenceKind::NotBlobSequence(side) => {
                write!(f, "{} reply is not a list of bulk strings", side)?
            }
        }
        write!(
            f,
            ". command: {} (expect {}, {:?}) reference: {} candidate: {}",
            self.command,
            if self.command.expect_error() { "error" } else { "success" },
            self.command.policy(),
            DisplayOutcome(&self.reference),
            DisplayOutcome(&self.candidate),
        )
    }
}

struct DisplayOutcome<'a>(&'a Outcome);

impl fmt::Display for DisplayOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ok(value) => value.fmt(f),
            Err(err) => err.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Judge {
    error_rule: ErrorRule,
}

impl Judge {
    pub fn new(error_rule: ErrorRule) -> Judge {
        Judge { error_rule }
    }

    pub fn error_rule(&self) -> ErrorRule {
        self.error_rule
    }

    /// 比较两边的结果，不一致的话记录到sink里，返回是否一致
    pub fn check(
        &self,
        command: &Command,
        candidate: Outcome,
        reference: Outcome,
        sink: &dyn FailureSink,
    ) -> bool {
        match self.judge(command, &candidate, &reference) {
            None => true,
            Some(kind) => {
                sink.record(Divergence {
                    command: command.clone(),
                    kind,
                    candidate,
                    reference,
                });
                false
            }
        }
    }

    pub fn judge(
        &self,
        command: &Command,
        candidate: &Outcome,
        reference: &Outcome,
    ) -> Option<DivergenceKind> {
        // 先检查错误是否出现，再比较值
        if command.expect_error() {
            if reference.is_ok() {
                return Some(DivergenceKind::MissingError(Side::Reference));
            }
            if candidate.is_ok() {
                return Some(DivergenceKind::MissingError(Side::Candidate));
            }
        } else {
            if reference.is_err() {
                return Some(DivergenceKind::UnexpectedError(Side::Reference));
            }
            if candidate.is_err() {
                return Some(DivergenceKind::UnexpectedError(Side::Candidate));
            }
        }

        match (candidate, reference) {
            (Err(c), Err(r)) => {
                if self.error_rule.matches(c, r) {
                    None
                } else {
                    Some(DivergenceKind::ErrorMismatch)
                }
            }
            (Ok(c), Ok(r)) => self.compare(command.policy(), c, r),
            // 上面已经排除了只有一边出错的情况
            _ => None,
        }
    }

    fn compare(&self, policy: Policy, candidate: &Value, reference: &Value) -> Option<DivergenceKind> {
        let equal = match policy {
            Policy::Exact => self.exact(candidate, reference),
            Policy::SetEquality => {
                let candidate = match sorted_blobs(candidate) {
                    Some(v) => v,
                    None => return Some(DivergenceKind::NotBlobSequence(Side::Candidate)),
                };
                let reference = match sorted_blobs(reference) {
                    Some(v) => v,
                    None => return Some(DivergenceKind::NotBlobSequence(Side::Reference)),
                };
                self.exact(&candidate, &reference)
            }
            Policy::StructuralOnly => structural(candidate, reference),
        };

        if equal {
            None
        } else {
            Some(DivergenceKind::ValueMismatch)
        }
    }

    fn exact(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b) == Ordering::Equal,
            (Value::Status(a), Value::Status(b)) => a == b,
            (Value::Bulk(a), Value::Bulk(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => self.error_rule.matches_reply(a, b),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| self.exact(a, b))
            }
            _ => false,
        }
    }
}

// 只比较类型和数组长度，递归到嵌套的数组里
fn structural(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| structural(a, b))
        }
        (a, b) => a.kind() == b.kind(),
    }
}

// 块字符串数组按字节序排序，其他类型返回None
fn sorted_blobs(value: &Value) -> Option<Value> {
    let items = match value {
        Value::Array(items) => items,
        _ => return None,
    };

    let mut blobs = items
        .iter()
        .map(|item| match item {
            Value::Bulk(data) => Some(data.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    blobs.sort();

    Some(Value::Array(blobs.into_iter().map(Value::Bulk).collect()))
}
